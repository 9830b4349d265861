//! Vertex microcode to GLSL.
//!
//! Every instruction becomes one or more calls to the prelude's opcode macros
//! (`MOV(dest, mask, src)` and friends), which pad and swizzle like the hardware does. The
//! MAC and ILU units commit in the same cycle, so when both are active the MAC result is
//! staged in `_temp_vec` and written back after the ILU statement.

pub mod decode;

use std::fmt::Write;

use thiserror::Error;

use crate::state::{MicrocodeProgram, MAX_PROGRAM_LENGTH};
use decode::{
    fog_mask_components, mask_components, output_register_name, remap_constant_index, Field,
    IluOp, InputSlot, MacOp, Operand, ParamMux, Token, OUTPUT_REG_FOG,
};

/// Added before flooring in `ARL`; host GPUs disagree on how `17/255*255` rounds.
pub const ARL_ROUNDING_BIAS: f32 = 0.001;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VshError {
    #[error("vertex program of {length} instructions has no FINAL instruction")]
    MissingFinal { length: usize },
    #[error("vertex program of {length} instructions exceeds {MAX_PROGRAM_LENGTH} slots", MAX_PROGRAM_LENGTH = MAX_PROGRAM_LENGTH)]
    ProgramTooLong { length: usize },
    #[error("slot {slot}: invalid MAC opcode {opcode}")]
    InvalidMacOpcode { slot: usize, opcode: u8 },
    #[error("slot {slot}: input {operand} has invalid register mux")]
    InvalidParamMux { slot: usize, operand: InputSlot },
    #[error("slot {slot}: writes to constant registers are not supported")]
    ConstantOutput { slot: usize },
    #[error("slot {slot}: output register {reg} is reserved")]
    InvalidOutputRegister { slot: usize, reg: u8 },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Unit {
    Mac,
    Ilu,
}

/// Appends the register prelude to `header` and the translated program plus the
/// screen-space epilogue to `body`.
pub fn translate(
    program: &MicrocodeProgram,
    header: &mut String,
    body: &mut String,
) -> Result<(), VshError> {
    let length = program.tokens.len();
    if length > MAX_PROGRAM_LENGTH {
        return Err(VshError::ProgramTooLong { length });
    }

    let mut has_final = false;
    let mut code = String::new();
    for (slot, token) in program.tokens.iter().enumerate() {
        let _ = writeln!(
            code,
            "  /* Slot {slot}: 0x{:08X} 0x{:08X} 0x{:08X} 0x{:08X} */",
            token[0], token[1], token[2], token[3]
        );
        code.push_str(&decode_token(slot, token)?);
        code.push('\n');

        if Field::Final.get(token) != 0 {
            has_final = true;
            break;
        }
    }
    if !has_final {
        return Err(VshError::MissingFinal { length });
    }

    write_prelude(header);
    body.push_str(&code);
    write_epilogue(body, program.z_perspective);
    Ok(())
}

fn decode_token(slot: usize, token: &Token) -> Result<String, VshError> {
    let mac_raw = Field::Mac.get(token);
    let mac = MacOp::from_raw(mac_raw).ok_or(VshError::InvalidMacOpcode {
        slot,
        opcode: mac_raw,
    })?;
    let ilu = IluOp::from_raw(Field::Ilu.get(token));
    if mac == MacOp::Nop && ilu == IluOp::Nop {
        return Ok(String::new());
    }

    // C is shared by both units; scalar ILU macros pick `.x` themselves.
    let needs_c = mac.params()[2] || ilu != IluOp::Nop;
    let input_c = if needs_c {
        Some(render_operand(slot, token, InputSlot::C)?)
    } else {
        None
    };

    let mut out = String::new();
    let mut mac_suffix = String::new();
    if mac != MacOp::Nop {
        let mut inputs = String::new();
        let [a, b, c] = mac.params();
        if a {
            inputs.push_str(", ");
            inputs.push_str(&render_operand(slot, token, InputSlot::A)?);
        }
        if b {
            inputs.push_str(", ");
            inputs.push_str(&render_operand(slot, token, InputSlot::B)?);
        }
        if c {
            inputs.push_str(", ");
            inputs.push_str(input_c.as_deref().unwrap_or_default());
        }
        emit_op(
            slot,
            token,
            Unit::Mac,
            Field::OutMacMask.get(token),
            mac.name(),
            mac == MacOp::Arl,
            &inputs,
            &mut out,
            Some(&mut mac_suffix),
        )?;
    }

    if ilu != IluOp::Nop {
        let inputs = format!(", {}", input_c.as_deref().unwrap_or_default());
        emit_op(
            slot,
            token,
            Unit::Ilu,
            Field::OutIluMask.get(token),
            ilu.name(),
            false,
            &inputs,
            &mut out,
            None,
        )?;
    }

    out.push_str(&mac_suffix);
    Ok(out)
}

fn render_operand(slot: usize, token: &Token, input: InputSlot) -> Result<String, VshError> {
    let operand = Operand::decode(token, input);
    let mux = ParamMux::from_raw(operand.mux).ok_or(VshError::InvalidParamMux {
        slot,
        operand: input,
    })?;

    let mut out = String::new();
    if operand.negate {
        out.push('-');
    }
    match mux {
        ParamMux::Temp => {
            let _ = write!(out, "R{}", operand.reg);
        }
        ParamMux::Input => {
            let _ = write!(out, "v{}", Field::V.get(token));
        }
        ParamMux::Constant => {
            let index = remap_constant_index(Field::Const.get(token));
            if Field::A0X.get(token) != 0 {
                let _ = write!(out, "c[A0+{index}]");
            } else {
                let _ = write!(out, "c[{index}]");
            }
        }
    }

    out.push_str(&operand.swizzle.suffix());
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn emit_op(
    slot: usize,
    token: &Token,
    unit: Unit,
    mut mask: u8,
    opcode: &str,
    is_arl: bool,
    inputs: &str,
    out: &mut String,
    suffix: Option<&mut String>,
) -> Result<(), VshError> {
    let mut reg = Field::OutR.get(token);
    let paired = match unit {
        Unit::Mac => Field::Ilu.get(token) != 0,
        Unit::Ilu => Field::Mac.get(token) != 0,
    };
    let use_temp = unit == Unit::Mac && paired;
    if use_temp && reg == 1 {
        // The paired ILU owns R1.
        mask = 0;
    } else if unit == Unit::Ilu && paired {
        reg = 1;
    }

    let out_mux = match unit {
        Unit::Mac => 0,
        Unit::Ilu => 1,
    };
    let o_mask = Field::OutOMask.get(token);
    if Field::OutMux.get(token) == out_mux && o_mask != 0 {
        if Field::OutOrb.get(token) == 0 {
            return Err(VshError::ConstantOutput { slot });
        }
        let out_reg = Field::OutAddress.get(token) & 0xF;
        let name = output_register_name(out_reg).ok_or(VshError::InvalidOutputRegister {
            slot,
            reg: out_reg,
        })?;
        if is_arl {
            tracing::warn!(slot, "ARL routed to an output register; ignoring output write");
        } else {
            let components = if out_reg == OUTPUT_REG_FOG {
                fog_mask_components(o_mask)
            } else {
                mask_components(o_mask)
            };
            let _ = writeln!(out, "  {opcode}({name},{components}{inputs});");
        }
    }

    let components = mask_components(mask);
    match suffix {
        Some(suffix) if use_temp => {
            if is_arl {
                let _ = writeln!(out, "  ARL(_temp_addr{inputs});");
                suffix.push_str("  A0 = _temp_addr;\n");
            } else if mask > 0 {
                let _ = writeln!(out, "  {opcode}(_temp_vec,{components}{inputs});");
                let _ = writeln!(suffix, "  R{reg}.{components} = _temp_vec.{components};");
            }
        }
        _ => {
            if is_arl {
                let _ = writeln!(out, "  ARL(A0{inputs});");
            } else if mask > 0 {
                let _ = writeln!(out, "  {opcode}(R{reg},{components}{inputs});");
            }
        }
    }
    Ok(())
}

fn write_prelude(header: &mut String) {
    header.push_str("\nint A0 = 0;\n\n");
    for i in 0..12 {
        let _ = writeln!(header, "vec4 R{i} = vec4(0.0,0.0,0.0,0.0);");
    }
    // R12 aliases the position output.
    header.push_str("#define R12 oPos\n\n");
    header.push_str("vec4 _temp_vec;\nint _temp_addr;\n\n");
    header.push_str(PRELUDE_OPS);
    let _ = write!(
        header,
        "#define ARL(dest, src) dest = _ARL(_in(src).x)\n\
         int _ARL(float src)\n\
         {{\n\
         \x20 return int(floor(src + {ARL_ROUNDING_BIAS:?}));\n\
         }}\n\n"
    );
    header.push_str(PRELUDE_ILU_OPS);
}

fn write_epilogue(body: &mut String, z_perspective: bool) {
    body.push_str(
        "  if (oPos.w == 0.0 || isinf(oPos.w)) {\n\
         \x20   vtx_inv_w = 1.0;\n\
         \x20 } else {\n\
         \x20   vtx_inv_w = 1.0 / oPos.w;\n\
         \x20 }\n\
         \x20 vtx_inv_w_flat = vtx_inv_w;\n",
    );
    // Programs leave positions in screen space.
    body.push_str(
        "  oPos.x = 2.0 * (oPos.x - surfaceSize.x * 0.5) / surfaceSize.x;\n\
         \x20 oPos.y = -2.0 * (oPos.y - surfaceSize.y * 0.5) / surfaceSize.y;\n",
    );
    if z_perspective {
        body.push_str("  oPos.z = oPos.w;\n");
    }
    body.push_str(
        "  if (clipRange.y != clipRange.x) {\n\
         \x20   oPos.z = (oPos.z - clipRange.x)/(0.5*(clipRange.y - clipRange.x)) - 1;\n\
         \x20 }\n\
         \x20 if (oPos.w < 0.0) {\n\
         \x20   oPos.xyz *= oPos.w;\n\
         \x20 } else {\n\
         \x20   oPos.w = 1.0;\n\
         \x20 }\n",
    );
}

const PRELUDE_OPS: &str = r#"/* Converts the input to vec4, pads with last component */
vec4 _in(float v) { return vec4(v); }
vec4 _in(vec2 v) { return v.xyyy; }
vec4 _in(vec3 v) { return v.xyzz; }
vec4 _in(vec4 v) { return v.xyzw; }

#define INFINITY (1.0 / 0.0)

#define MOV(dest, mask, src) dest.mask = _MOV(_in(src)).mask
vec4 _MOV(vec4 src)
{
  return src;
}

#define MUL(dest, mask, src0, src1) dest.mask = _MUL(_in(src0), _in(src1)).mask
vec4 _MUL(vec4 src0, vec4 src1)
{
  vec4 zero_components = sign(src0) * sign(src1);
  vec4 ret = src0 * src1;
  if (zero_components.x == 0.0) { ret.x = 0.0; }
  if (zero_components.y == 0.0) { ret.y = 0.0; }
  if (zero_components.z == 0.0) { ret.z = 0.0; }
  if (zero_components.w == 0.0) { ret.w = 0.0; }
  return ret;
}

#define ADD(dest, mask, src0, src1) dest.mask = _ADD(_in(src0), _in(src1)).mask
vec4 _ADD(vec4 src0, vec4 src1)
{
  return src0 + src1;
}

#define MAD(dest, mask, src0, src1, src2) dest.mask = _MAD(_in(src0), _in(src1), _in(src2)).mask
vec4 _MAD(vec4 src0, vec4 src1, vec4 src2)
{
  return _MUL(src0, src1) + src2;
}

#define DP3(dest, mask, src0, src1) dest.mask = _DP3(_in(src0), _in(src1)).mask
vec4 _DP3(vec4 src0, vec4 src1)
{
  return vec4(dot(src0.xyz, src1.xyz));
}

#define DPH(dest, mask, src0, src1) dest.mask = _DPH(_in(src0), _in(src1)).mask
vec4 _DPH(vec4 src0, vec4 src1)
{
  return vec4(dot(vec4(src0.xyz, 1.0), src1));
}

#define DP4(dest, mask, src0, src1) dest.mask = _DP4(_in(src0), _in(src1)).mask
vec4 _DP4(vec4 src0, vec4 src1)
{
  return vec4(dot(src0, src1));
}

#define DST(dest, mask, src0, src1) dest.mask = _DST(_in(src0), _in(src1)).mask
vec4 _DST(vec4 src0, vec4 src1)
{
  return vec4(1.0,
              src0.y * src1.y,
              src0.z,
              src1.w);
}

#define MIN(dest, mask, src0, src1) dest.mask = _MIN(_in(src0), _in(src1)).mask
vec4 _MIN(vec4 src0, vec4 src1)
{
  return min(src0, src1);
}

#define MAX(dest, mask, src0, src1) dest.mask = _MAX(_in(src0), _in(src1)).mask
vec4 _MAX(vec4 src0, vec4 src1)
{
  return max(src0, src1);
}

#define SLT(dest, mask, src0, src1) dest.mask = _SLT(_in(src0), _in(src1)).mask
vec4 _SLT(vec4 src0, vec4 src1)
{
  return vec4(lessThan(src0, src1));
}

#define SGE(dest, mask, src0, src1) dest.mask = _SGE(_in(src0), _in(src1)).mask
vec4 _SGE(vec4 src0, vec4 src1)
{
  return vec4(greaterThanEqual(src0, src1));
}

"#;

const PRELUDE_ILU_OPS: &str = r#"#define RCP(dest, mask, src) dest.mask = _RCP(_in(src).x).mask
vec4 _RCP(float src)
{
  return vec4(1.0 / src);
}

#define RCC(dest, mask, src) dest.mask = _RCC(_in(src).x).mask
vec4 _RCC(float src)
{
  float t = 1.0 / src;
  if (t > 0.0) {
    t = clamp(t, 5.42101e-020, 1.884467e+019);
  } else {
    t = clamp(t, -1.884467e+019, -5.42101e-020);
  }
  return vec4(t);
}

#define RSQ(dest, mask, src) dest.mask = _RSQ(_in(src).x).mask
vec4 _RSQ(float src)
{
  if (src == 0.0) { return vec4(INFINITY); }
  if (isinf(src)) { return vec4(0.0); }
  return vec4(inversesqrt(abs(src)));
}

#define EXP(dest, mask, src) dest.mask = _EXP(_in(src).x).mask
vec4 _EXP(float src)
{
  vec4 result;
  result.x = exp2(floor(src));
  result.y = src - floor(src);
  result.z = exp2(src);
  result.w = 1.0;
  return result;
}

#define LOG(dest, mask, src) dest.mask = _LOG(_in(src).x).mask
vec4 _LOG(float src)
{
  float tmp = abs(src);
  if (tmp == 0.0) { return vec4(-INFINITY, 1.0f, -INFINITY, 1.0f); }
  vec4 result;
  result.x = floor(log2(tmp));
  result.y = tmp / exp2(floor(log2(tmp)));
  result.z = log2(tmp);
  result.w = 1.0;
  return result;
}

#define LIT(dest, mask, src) dest.mask = _LIT(_in(src)).mask
vec4 _LIT(vec4 src)
{
  vec4 s = src;
  float epsilon = 1.0 / 256.0;
  s.w = clamp(s.w, -(128.0 - epsilon), 128.0 - epsilon);
  s.x = max(s.x, 0.0);
  s.y = max(s.y, 0.0);
  vec4 t = vec4(1.0, 0.0, 0.0, 1.0);
  t.y = s.x;
  t.z = (s.x > 0.0) ? exp2(s.w * log2(s.y)) : 0.0;
  return t;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn operand(mux: ParamMux, reg: u8) -> Operand {
        Operand {
            mux: mux.raw(),
            reg,
            negate: false,
            swizzle: decode::Swizzle::IDENTITY,
        }
    }

    fn mac_token(op: u8, out_reg: u8, o_mask: u8, final_: bool) -> Token {
        let mut token = [0u32; 4];
        Field::Mac.set(&mut token, op);
        operand(ParamMux::Input, 0).encode(&mut token, InputSlot::A);
        Field::OutOrb.set(&mut token, 1);
        Field::OutAddress.set(&mut token, out_reg);
        Field::OutOMask.set(&mut token, o_mask);
        Field::Final.set(&mut token, final_ as u8);
        token
    }

    fn run(tokens: Vec<Token>) -> Result<(String, String), VshError> {
        let mut header = String::new();
        let mut body = String::new();
        translate(
            &MicrocodeProgram {
                tokens,
                z_perspective: false,
            },
            &mut header,
            &mut body,
        )?;
        Ok((header, body))
    }

    #[test]
    fn mov_to_position() {
        let (header, body) = run(vec![mac_token(1, 0, 0xF, true)]).unwrap();
        assert!(body.contains("  MOV(oPos,xyzw, v0);\n"), "{body}");
        assert!(header.contains("#define R12 oPos"), "{header}");
        assert!(header.contains("floor(src + 0.001)"), "{header}");
    }

    #[test]
    fn stops_at_final() {
        let (_, body) = run(vec![
            mac_token(1, 3, 0xF, true),
            mac_token(1, 0, 0xF, false),
        ])
        .unwrap();
        assert!(body.contains("/* Slot 0:"), "{body}");
        assert!(!body.contains("/* Slot 1:"), "{body}");
    }

    #[test]
    fn missing_final_is_an_error() {
        let err = run(vec![mac_token(1, 0, 0xF, false)]).unwrap_err();
        assert_eq!(err, VshError::MissingFinal { length: 1 });
        assert_eq!(run(Vec::new()).unwrap_err(), VshError::MissingFinal { length: 0 });
    }

    #[test]
    fn paired_mac_is_committed_after_ilu() {
        let mut token = mac_token(2, 0, 0, true);
        operand(ParamMux::Temp, 2).encode(&mut token, InputSlot::B);
        operand(ParamMux::Temp, 3).encode(&mut token, InputSlot::C);
        Field::Ilu.set(&mut token, 2);
        Field::OutR.set(&mut token, 4);
        Field::OutMacMask.set(&mut token, 0xF);
        Field::OutIluMask.set(&mut token, 0x8);

        let (_, body) = run(vec![token]).unwrap();
        let mac = body.find("  MUL(_temp_vec,xyzw, v0, R2);").expect(&body);
        let ilu = body.find("  RCP(R1,x, R3);").expect(&body);
        let commit = body.find("  R4.xyzw = _temp_vec.xyzw;").expect(&body);
        assert!(mac < ilu && ilu < commit, "{body}");
    }

    #[test]
    fn scalar_ilu_keeps_shared_c_swizzle_for_mac() {
        let mut token = mac_token(3, 0, 0, true);
        Operand {
            mux: ParamMux::Temp.raw(),
            reg: 2,
            negate: true,
            swizzle: decode::Swizzle([2, 0, 1, 3]),
        }
        .encode(&mut token, InputSlot::C);
        Field::Ilu.set(&mut token, 2);
        Field::OutR.set(&mut token, 4);
        Field::OutMacMask.set(&mut token, 0xF);
        Field::OutIluMask.set(&mut token, 0x8);

        let (_, body) = run(vec![token]).unwrap();
        assert!(body.contains("  ADD(_temp_vec,xyzw, v0, -R2.zxyw);"), "{body}");
        assert!(body.contains("  RCP(R1,x, -R2.zxyw);"), "{body}");
        assert!(!body.contains("-R2.z)"), "{body}");
    }

    #[test]
    fn relative_constant_addressing() {
        let mut token = mac_token(1, 0, 0xF, true);
        operand(ParamMux::Constant, 0).encode(&mut token, InputSlot::A);
        Field::Const.set(&mut token, 0x60 + 4);
        Field::A0X.set(&mut token, 1);

        let (_, body) = run(vec![token]).unwrap();
        assert!(body.contains("MOV(oPos,xyzw, c[A0+100]);"), "{body}");
    }

    #[test]
    fn fog_output_uses_packed_mask() {
        let token = mac_token(1, OUTPUT_REG_FOG, 0b0010, true);
        let (_, body) = run(vec![token]).unwrap();
        assert!(body.contains("MOV(oFog,x, v0);"), "{body}");
    }

    #[test]
    fn arl_writes_address_register() {
        let mut token = mac_token(13, 0, 0, true);
        operand(ParamMux::Constant, 0).encode(&mut token, InputSlot::A);
        let (_, body) = run(vec![token]).unwrap();
        assert!(body.contains("  ARL(A0, c[0]);"), "{body}");
    }

    #[test]
    fn constant_output_is_rejected() {
        let mut token = mac_token(1, 0, 0xF, true);
        Field::OutOrb.set(&mut token, 0);
        assert_eq!(
            run(vec![token]).unwrap_err(),
            VshError::ConstantOutput { slot: 0 }
        );
    }

    #[test]
    fn invalid_mux_is_rejected() {
        let mut token = mac_token(1, 0, 0xF, true);
        Field::AMux.set(&mut token, 0);
        assert_eq!(
            run(vec![token]).unwrap_err(),
            VshError::InvalidParamMux {
                slot: 0,
                operand: InputSlot::A
            }
        );
    }

    #[test]
    fn z_perspective_epilogue() {
        let mut header = String::new();
        let mut body = String::new();
        translate(
            &MicrocodeProgram {
                tokens: vec![mac_token(1, 0, 0xF, true)],
                z_perspective: true,
            },
            &mut header,
            &mut body,
        )
        .unwrap();
        assert!(body.contains("  oPos.z = oPos.w;\n"), "{body}");
        assert!(body.contains("vtx_inv_w_flat = vtx_inv_w;"), "{body}");
    }
}
