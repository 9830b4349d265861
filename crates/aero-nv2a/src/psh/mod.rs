//! Register-combiner pixel state to GLSL.
//!
//! The fragment stage runs in three parts: the texture shader fills `t0..t3`, up to eight
//! general combiners update `r0`/`r1` (and may overwrite `v0`, `v1` or the `tN`), and the
//! final combiner produces `fragColor`. Each general combiner computes its AB, CD and
//! mux/sum results before any destination is written, matching the hardware's single
//! commit per stage.
//!
//! Translation never fails. Reserved encodings log a warning and read as zero.

pub mod decode;
mod texture;

use std::fmt::Write;

use tracing::warn;

use crate::state::{CompareFunc, PshState, MAX_TEXTURES};
use crate::vertex::{vertex_data, Shading};
use decode::{
    combiner_stages, CombinerControl, CombinerInputs, CombinerOutput, FinalCombiner,
    FinalSettings, Input, OutputMapping, Register, TextureMode,
};
use texture::TextureUnits;

/// Stage index used for constant names in the final combiner.
const FINAL_STAGE: usize = 8;

/// A combiner operand after its input mapping. Operands reading the zero register are
/// folded so constant inputs simplify the final combiner.
#[derive(Clone, Debug, PartialEq)]
enum Operand {
    Const(f32),
    Expr(String),
}

impl Operand {
    fn is(&self, value: f32) -> bool {
        matches!(self, Operand::Const(v) if *v == value)
    }

    fn render(&self, alpha: bool) -> String {
        match self {
            Operand::Const(v) if alpha => format!("{v:?}"),
            Operand::Const(v) => format!("vec3({v:?})"),
            Operand::Expr(expr) => expr.clone(),
        }
    }

    fn vec3(&self) -> String {
        match self {
            Operand::Const(v) => format!("vec3({v:?})"),
            Operand::Expr(expr) => format!("vec3({expr})"),
        }
    }
}

/// Which half of a combiner is being generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Portion {
    Rgb,
    Alpha,
}

impl Portion {
    fn mask(self) -> &'static str {
        match self {
            Portion::Rgb => "rgb",
            Portion::Alpha => "a",
        }
    }

    fn caster(self) -> &'static str {
        match self {
            Portion::Rgb => "vec3",
            Portion::Alpha => "",
        }
    }

    fn swizzle(self, input: Input) -> &'static str {
        match (self, input.alpha) {
            (Portion::Rgb, false) => "rgb",
            (Portion::Rgb, true) => "aaa",
            (Portion::Alpha, false) => "b",
            (Portion::Alpha, true) => "a",
        }
    }
}

struct Translator {
    control: CombinerControl,
    final_combiner: Option<FinalCombiner>,
    stage: usize,
    /// `vec4` locals the combiners use, declared after the texture fetches.
    var_refs: Vec<&'static str>,
    const_refs: Vec<String>,
    /// Rendered E and F inputs while the final combiner is generated.
    ef: Option<(String, String)>,
    code: String,
}

impl Translator {
    fn new(state: &PshState) -> Self {
        Self {
            control: CombinerControl::from_raw(state.combiner_control),
            final_combiner: FinalCombiner::from_raw(state.final_inputs_0, state.final_inputs_1),
            stage: 0,
            var_refs: Vec::new(),
            const_refs: Vec::new(),
            ef: None,
            code: String::new(),
        }
    }

    fn add_var_ref(&mut self, name: &'static str) {
        if !self.var_refs.contains(&name) {
            self.var_refs.push(name);
        }
    }

    fn constant(&mut self, slot: u8, unique: bool) -> String {
        let stage = if unique || self.stage == FINAL_STAGE {
            self.stage
        } else {
            0
        };
        let name = format!("c{slot}_{stage}");
        if !self.const_refs.contains(&name) {
            self.const_refs.push(name.clone());
        }
        name
    }

    /// GLSL for reading `reg`; `None` when it reads as zero.
    fn source(&mut self, reg: Register) -> Option<String> {
        Some(match reg {
            Register::Zero => return None,
            Register::C0 => self.constant(0, self.control.unique_c0),
            Register::C1 => self.constant(1, self.control.unique_c1),
            Register::Fog => "pFog".to_owned(),
            Register::V0 => "v0".to_owned(),
            Register::V1 => "v1".to_owned(),
            Register::T0 => "t0".to_owned(),
            Register::T1 => "t1".to_owned(),
            Register::T2 => "t2".to_owned(),
            Register::T3 => "t3".to_owned(),
            Register::R0 => {
                self.add_var_ref("r0");
                "r0".to_owned()
            }
            Register::R1 => {
                self.add_var_ref("r1");
                "r1".to_owned()
            }
            Register::V1R0Sum => {
                self.add_var_ref("r0");
                let settings = self
                    .final_combiner
                    .map_or(FinalSettings::empty(), |fc| fc.settings);
                let v1 = if settings.contains(FinalSettings::COMPLEMENT_V1) {
                    "(1.0 - v1)"
                } else {
                    "v1"
                };
                let r0 = if settings.contains(FinalSettings::COMPLEMENT_R0) {
                    "(1.0 - r0)"
                } else {
                    "r0"
                };
                let sum = format!("vec4({v1}.rgb + {r0}.rgb, 0.0)");
                if settings.contains(FinalSettings::CLAMP_SUM) {
                    format!("clamp({sum}, 0.0, 1.0)")
                } else {
                    sum
                }
            }
            Register::EfProd => {
                let Some((e, f)) = &self.ef else {
                    warn!(stage = self.stage, "EF_PROD read outside the final combiner; reading zero");
                    return None;
                };
                format!("vec4({e} * {f}, 0.0)")
            }
        })
    }

    /// Name of a writable destination register; `None` discards the result.
    fn destination(&mut self, raw: u8) -> Option<&'static str> {
        let reg = Register::from_raw(raw);
        Some(match reg {
            Some(Register::Zero) => return None,
            Some(Register::V0) => "v0",
            Some(Register::V1) => "v1",
            Some(Register::T0) => "t0",
            Some(Register::T1) => "t1",
            Some(Register::T2) => "t2",
            Some(Register::T3) => "t3",
            Some(Register::R0) => {
                self.add_var_ref("r0");
                "r0"
            }
            Some(Register::R1) => {
                self.add_var_ref("r1");
                "r1"
            }
            _ => {
                warn!(stage = self.stage, raw, "combiner output to a read-only register; discarding");
                return None;
            }
        })
    }

    fn input(&mut self, input: Input, portion: Portion) -> Operand {
        let reg = input.reg().unwrap_or_else(|| {
            warn!(stage = self.stage, raw = input.register, "reserved combiner register; reading zero");
            Register::Zero
        });
        match self.source(reg) {
            None => Operand::Const(input.mapping.fold(0.0)),
            Some(var) => {
                let read = format!("{var}.{}", portion.swizzle(input));
                Operand::Expr(input.mapping.apply(&read))
            }
        }
    }

    fn output_mapping(&self, output: &CombinerOutput) -> OutputMapping {
        output.mapping().unwrap_or_else(|| {
            warn!(stage = self.stage, bits = output.mapping_bits, "reserved output mapping; using identity");
            OutputMapping::Identity
        })
    }

    /// Appends the AB/CD/mux-sum computations to `code` and returns the register writes,
    /// which are committed only after both portions of the stage are computed.
    fn stage_code(
        &mut self,
        inputs: CombinerInputs,
        output: CombinerOutput,
        portion: Portion,
    ) -> String {
        let alpha = portion == Portion::Alpha;
        let a = self.input(inputs.a, portion).render(alpha);
        let b = self.input(inputs.b, portion).render(alpha);
        let c = self.input(inputs.c, portion).render(alpha);
        let d = self.input(inputs.d, portion).render(alpha);
        let mask = portion.mask();
        let caster = portion.caster();
        let mapping = self.output_mapping(&output);

        let ab = if output.ab_dot {
            format!("dot({a}, {b})")
        } else {
            format!("({a} * {b})")
        };
        let cd = if output.cd_dot {
            format!("dot({c}, {d})")
        } else {
            format!("({c} * {d})")
        };

        let mut writes = String::new();
        if let Some(dest) = self.destination(output.ab) {
            let _ = writeln!(
                self.code,
                "ab.{mask} = clamp({caster}({}), -1.0, 1.0);",
                mapping.apply(&ab)
            );
            let _ = writeln!(writes, "{dest}.{mask} = ab.{mask};");
            if !alpha && output.ab_blue_to_alpha {
                let _ = writeln!(writes, "{dest}.a = ab.b;");
            }
        }
        if let Some(dest) = self.destination(output.cd) {
            let _ = writeln!(
                self.code,
                "cd.{mask} = clamp({caster}({}), -1.0, 1.0);",
                mapping.apply(&cd)
            );
            let _ = writeln!(writes, "{dest}.{mask} = cd.{mask};");
            if !alpha && output.cd_blue_to_alpha {
                let _ = writeln!(writes, "{dest}.a = cd.b;");
            }
        }
        if let Some(dest) = self.destination(output.mux_sum) {
            let mux_sum = if output.mux {
                self.add_var_ref("r0");
                let select = if self.control.mux_msb {
                    "r0.a >= 0.5"
                } else {
                    "(uint(r0.a * 255.0) & 1u) == 1u"
                };
                format!("(({select}) ? {caster}({cd}) : {caster}({ab}))")
            } else {
                format!("({ab} + {cd})")
            };
            let _ = writeln!(
                self.code,
                "mux_sum.{mask} = clamp({caster}({}), -1.0, 1.0);",
                mapping.apply(&mux_sum)
            );
            let _ = writeln!(writes, "{dest}.{mask} = mux_sum.{mask};");
        }
        writes
    }

    fn final_code(&mut self, fc: FinalCombiner) {
        let e = self.input(fc.e, Portion::Rgb).render(false);
        let f = self.input(fc.f, Portion::Rgb).render(false);
        self.ef = Some((e, f));

        let a = self.input(fc.a, Portion::Rgb);
        let b = self.input(fc.b, Portion::Rgb);
        let c = self.input(fc.c, Portion::Rgb);
        let d = self.input(fc.d, Portion::Rgb);
        let g = self.input(fc.g, Portion::Alpha);
        self.ef = None;

        let _ = writeln!(self.code, "fragColor.rgb = {};", final_color(a, b, c, d));
        let _ = writeln!(self.code, "fragColor.a = {};", g.render(true));
    }
}

/// `D + mix(C, B, A)` with constant operands simplified away.
fn final_color(a: Operand, b: Operand, c: Operand, d: Operand) -> String {
    let mixed = if a.is(0.0) {
        c
    } else if a.is(1.0) {
        b
    } else if b.is(1.0) && c.is(0.0) {
        a
    } else if matches!((&b, &c), (Operand::Const(x), Operand::Const(y)) if x == y) {
        c
    } else {
        Operand::Expr(format!("mix({}, {}, {})", c.vec3(), b.vec3(), a.vec3()))
    };

    if d.is(0.0) {
        mixed.render(false)
    } else if mixed.is(0.0) {
        d.render(false)
    } else {
        format!("{} + {}", d.render(false), mixed.render(false))
    }
}

const HELPERS: &str = r#"float sign1(float x) {
    x *= 255.0;
    return (x-128.0)/127.0;
}
float sign2(float x) {
    x *= 255.0;
    if (x >= 128.0) return (x-255.5)/127.5;
               else return (x+0.5)/127.5;
}
float sign3(float x) {
    x *= 255.0;
    if (x >= 128.0) return (x-256.0)/127.0;
               else return (x)/127.0;
}
float sign3_to_0_to_1(float x) {
    if (x >= 0) return x/2;
           else return 1+x/2;
}
vec3 dotmap_zero_to_one(vec4 col) {
    return col.rgb;
}
vec3 dotmap_minus1_to_1_d3d(vec4 col) {
    return vec3(sign1(col.r),sign1(col.g),sign1(col.b));
}
vec3 dotmap_minus1_to_1_gl(vec4 col) {
    return vec3(sign2(col.r),sign2(col.g),sign2(col.b));
}
vec3 dotmap_minus1_to_1(vec4 col) {
    return vec3(sign3(col.r),sign3(col.g),sign3(col.b));
}
vec3 dotmap_hilo_1(vec4 col) {
    uint hi_i = uint(col.a * float(0xff)) << 8
              | uint(col.r * float(0xff));
    uint lo_i = uint(col.g * float(0xff)) << 8
              | uint(col.b * float(0xff));
    float hi_f = float(hi_i) / float(0xffff);
    float lo_f = float(lo_i) / float(0xffff);
    return vec3(hi_f, lo_f, 1.0);
}
"#;

/// Hemisphere reconstruction for hi-lo textures is not modelled; these pass the texel
/// through so dependent reads still produce something.
const HILO_HEMISPHERE_HELPERS: &str = r#"vec3 dotmap_hilo_hemisphere_d3d(vec4 col) {
    return col.rgb;
}
vec3 dotmap_hilo_hemisphere_gl(vec4 col) {
    return col.rgb;
}
vec3 dotmap_hilo_hemisphere(vec4 col) {
    return col.rgb;
}
"#;

const CONVOLUTION_HELPERS: &str = r#"const float[9] gaussian3x3 = float[9](
    1.0/16.0, 2.0/16.0, 1.0/16.0,
    2.0/16.0, 4.0/16.0, 2.0/16.0,
    1.0/16.0, 2.0/16.0, 1.0/16.0);
const vec2[9] convolution3x3 = vec2[9](
    vec2(-1.0,-1.0),vec2(0.0,-1.0),vec2(1.0,-1.0),
    vec2(-1.0, 0.0),vec2(0.0, 0.0),vec2(1.0, 0.0),
    vec2(-1.0, 1.0),vec2(0.0, 1.0),vec2(1.0, 1.0));
vec4 gaussianFilter2DRectProj(sampler2DRect sampler, vec3 texCoord) {
    vec4 sum = vec4(0.0);
    for (int i = 0; i < 9; i++) {
        sum += gaussian3x3[i]*textureProj(sampler,
                   texCoord + vec3(convolution3x3[i], 0.0));
    }
    return sum;
}
"#;

fn window_clip(exclusive: bool) -> String {
    let mut clip = String::new();
    let kind = if exclusive { "Exclusive" } else { "Inclusive" };
    let _ = writeln!(clip, "/*  Window-clip ({kind}) */");
    if !exclusive {
        clip.push_str("bool clipContained = false;\n");
    }
    clip.push_str(
        "vec2 coord = gl_FragCoord.xy - 0.5;\n\
         for (int i = 0; i < 8; i++) {\n\
         \x20 bool outside = any(bvec4(\n\
         \x20     lessThan(coord, vec2(clipRegion[i].xy)),\n\
         \x20     greaterThanEqual(coord, vec2(clipRegion[i].zw))));\n\
         \x20 if (!outside) {\n",
    );
    if exclusive {
        clip.push_str("    discard;\n");
    } else {
        clip.push_str("    clipContained = true;\n    break;\n");
    }
    clip.push_str("  }\n}\n");
    if !exclusive {
        clip.push_str("if (!clipContained) {\n  discard;\n}\n");
    }
    clip
}

/// Generates the complete fragment stage for `state`.
pub fn translate(state: &PshState, shading: Shading) -> String {
    let mut preflight = vertex_data(shading, "in", "", "");
    preflight.push_str("\nout vec4 fragColor;\n\nuniform vec4 fogColor;\n");
    preflight.push_str(HELPERS);
    preflight.push_str(HILO_HEMISPHERE_HELPERS);
    preflight.push_str(CONVOLUTION_HELPERS);
    preflight.push_str("uniform ivec4 clipRegion[8];\n");

    let clip = window_clip(state.window_clip_exclusive);

    // Colors are perspective-divided here; flat colors use the provoking vertex's w.
    let mut vars = String::new();
    let inv_w = shading.inv_w();
    for color in ["D0", "D1", "B0", "B1"] {
        let _ = writeln!(vars, "vec4 p{color} = vtx{color} / {inv_w};");
    }
    vars.push_str("vec4 pFog = vec4(fogColor.rgb, clamp(vtxFog / vtx_inv_w, 0.0, 1.0));\n");
    for i in 0..3 {
        let _ = writeln!(vars, "vec4 pT{i} = vtxT{i} / vtx_inv_w;");
    }
    if state.point_sprite {
        if state.textures[3].rect {
            warn!("point sprite coordinates replace a rectangle texture on unit 3");
        }
        vars.push_str("vec4 pT3 = vec4(gl_PointCoord, 1.0, 1.0);\n");
    } else {
        vars.push_str("vec4 pT3 = vtxT3 / vtx_inv_w;\n");
    }
    vars.push_str(
        "\nvec4 v0 = pD0;\nvec4 v1 = pD1;\nvec4 ab;\nvec4 cd;\nvec4 mux_sum;\n",
    );

    let units = TextureUnits::new(state);
    for unit in 0..MAX_TEXTURES {
        units.write_unit(unit, &mut preflight, &mut vars);
    }

    let mut ps = Translator::new(state);
    let stages = combiner_stages(state, ps.control.stages);
    if ps.control.stages > stages.len() {
        warn!(stages = ps.control.stages, "combiner stage count above hardware maximum; truncating");
    }
    for (i, stage) in stages.into_iter().enumerate() {
        ps.stage = i;
        let _ = writeln!(ps.code, "// Stage {i}");
        let color = ps.stage_code(stage.rgb_inputs, stage.rgb_output, Portion::Rgb);
        let alpha = ps.stage_code(stage.alpha_inputs, stage.alpha_output, Portion::Alpha);
        ps.code.push_str(&color);
        ps.code.push_str(&alpha);
    }

    ps.stage = FINAL_STAGE;
    match ps.final_combiner {
        Some(fc) => {
            ps.code.push_str("// Final Combiner\n");
            ps.final_code(fc);
        }
        None => {
            ps.add_var_ref("r0");
            ps.code.push_str("fragColor = r0;\n");
        }
    }

    if state.alpha_test {
        match state.alpha_func.glsl_op() {
            Some(op) => {
                preflight.push_str("uniform float alphaRef;\n");
                let _ = writeln!(ps.code, "if (!(fragColor.a {op} alphaRef)) discard;");
            }
            None if state.alpha_func == CompareFunc::Never => {
                preflight.push_str("uniform float alphaRef;\n");
                ps.code.push_str("discard;\n");
            }
            None => {}
        }
    }

    for name in &ps.const_refs {
        let _ = writeln!(preflight, "uniform vec4 {name};");
    }

    for name in &ps.var_refs {
        let _ = writeln!(vars, "vec4 {name};");
        if *name == "r0" {
            // r0.a starts out as the first texture's alpha.
            if units.mode(0) == Some(TextureMode::None) {
                vars.push_str("r0.a = 1.0;\n");
            } else {
                vars.push_str("r0.a = t0.a;\n");
            }
        }
    }

    let mut out = String::with_capacity(
        preflight.len() + clip.len() + vars.len() + ps.code.len() + 64,
    );
    out.push_str("#version 400\n\n");
    out.push_str(&preflight);
    out.push_str("void main() {\n");
    out.push_str(&clip);
    out.push_str(&vars);
    out.push_str(&ps.code);
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const V0_RGB: u32 = 0x04;
    const R0_RGB: u32 = 0x0C;
    const ONE: u32 = 0x20;

    fn final_words(a: u32, b: u32, c: u32, d: u32, e: u32, f: u32, g: u32, settings: u32) -> (u32, u32) {
        ((a << 24) | (b << 16) | (c << 8) | d, (e << 24) | (f << 16) | (g << 8) | settings)
    }

    #[test]
    fn operand_folding_in_final_color() {
        let v0 = Operand::Expr("max(v0.rgb, 0.0)".into());
        assert_eq!(
            final_color(v0.clone(), Operand::Const(1.0), Operand::Const(0.0), Operand::Const(0.0)),
            "max(v0.rgb, 0.0)"
        );
        assert_eq!(
            final_color(Operand::Const(0.0), Operand::Const(1.0), v0.clone(), Operand::Const(0.0)),
            "max(v0.rgb, 0.0)"
        );
        assert_eq!(
            final_color(Operand::Const(0.0), v0.clone(), Operand::Const(0.0), Operand::Const(0.0)),
            "vec3(0.0)"
        );
        assert_eq!(
            final_color(v0.clone(), Operand::Const(0.5), Operand::Const(-1.0), v0),
            "max(v0.rgb, 0.0) + mix(vec3(-1.0), vec3(0.5), vec3(max(v0.rgb, 0.0)))"
        );
    }

    #[test]
    fn layout_and_window_clip() {
        let glsl = translate(&PshState::default(), Shading::Flat);
        assert!(glsl.starts_with("#version 400\n\n"), "{glsl}");
        assert!(glsl.contains("flat in vec4 vtxD0;"), "{glsl}");
        assert!(glsl.contains("uniform ivec4 clipRegion[8];"), "{glsl}");
        assert!(glsl.contains("/*  Window-clip (Inclusive) */\nbool clipContained = false;"), "{glsl}");
        assert!(glsl.contains("vec4 pD0 = vtxD0 / vtx_inv_w_flat;"), "{glsl}");
        assert!(glsl.ends_with("}\n"), "{glsl}");
    }

    #[test]
    fn exclusive_window_clip_discards_inside() {
        let clip = window_clip(true);
        assert!(clip.contains("    discard;\n  }\n}\n"), "{clip}");
        assert!(!clip.contains("clipContained"), "{clip}");
    }

    #[test]
    fn disabled_final_combiner_outputs_r0() {
        let glsl = translate(&PshState::default(), Shading::Flat);
        assert!(glsl.contains("vec4 r0;\nr0.a = 1.0;\n"), "{glsl}");
        assert!(glsl.contains("fragColor = r0;\n}"), "{glsl}");
    }

    #[test]
    fn general_stage_writes_after_compute() {
        let mut state = PshState {
            combiner_control: 1,
            ..Default::default()
        };
        // RGB: r0 = v0 * 1 (AB), shifted left.
        state.rgb_inputs[0] = (V0_RGB << 24) | (ONE << 16);
        state.rgb_outputs[0] = (0xC << 4) | (0x10 << 12);
        // Alpha: r1.a = v1.b * t0.a
        state.alpha_inputs[0] = (0x05 << 24) | (0x18 << 16);
        state.alpha_outputs[0] = 0xD << 4;

        let glsl = translate(&state, Shading::Flat);
        let expected = "// Stage 0\n\
             ab.rgb = clamp(vec3(((max(v0.rgb, 0.0) * vec3(1.0)) * 2.0)), -1.0, 1.0);\n\
             ab.a = clamp(((max(v1.b, 0.0) * max(t0.a, 0.0))), -1.0, 1.0);\n\
             r0.rgb = ab.rgb;\n\
             r1.a = ab.a;\n";
        assert!(glsl.contains(expected), "{glsl}");
        assert!(glsl.contains("vec4 r0;\n"), "{glsl}");
        assert!(glsl.contains("vec4 r1;\n"), "{glsl}");
    }

    #[test]
    fn mux_selects_on_r0_alpha() {
        let mut state = PshState {
            combiner_control: 1 | (0x1 << 8),
            ..Default::default()
        };
        state.rgb_inputs[0] = (V0_RGB << 24) | (ONE << 16) | (R0_RGB << 8) | ONE;
        state.rgb_outputs[0] = (0xC << 8) | (0x04 << 12);
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("(r0.a >= 0.5) ? vec3("), "{glsl}");
        assert!(glsl.contains("r0.rgb = mux_sum.rgb;"), "{glsl}");
    }

    #[test]
    fn unique_constants_are_per_stage() {
        let mut state = PshState {
            combiner_control: 2 | (0x10 << 8),
            ..Default::default()
        };
        for i in 0..2 {
            state.rgb_inputs[i] = (0x01 << 24) | (0x02 << 16);
            state.rgb_outputs[i] = 0xC << 4;
        }
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("uniform vec4 c0_0;"), "{glsl}");
        assert!(glsl.contains("uniform vec4 c0_1;"), "{glsl}");
        assert!(glsl.contains("uniform vec4 c1_0;"), "{glsl}");
        assert!(!glsl.contains("c1_1"), "{glsl}");
    }

    #[test]
    fn final_combiner_sum_and_product_registers() {
        let (w0, w1) = final_words(0x0E, ONE, 0, 0x0F, V0_RGB, 0x05, ONE, 0x80 | 0x40);
        let state = PshState {
            final_inputs_0: w0,
            final_inputs_1: w1,
            ..Default::default()
        };
        let glsl = translate(&state, Shading::Flat);
        assert!(
            glsl.contains("max(clamp(vec4((1.0 - v1).rgb + r0.rgb, 0.0), 0.0, 1.0).rgb, 0.0)"),
            "{glsl}"
        );
        assert!(
            glsl.contains("max(vec4(max(v0.rgb, 0.0) * max(v1.rgb, 0.0), 0.0).rgb, 0.0)"),
            "{glsl}"
        );
        assert!(!glsl.contains("uniform vec4 c0_8;"), "{glsl}");
        assert!(glsl.contains("fragColor.a = 1.0;"), "{glsl}");
    }

    #[test]
    fn final_constants_use_stage_eight() {
        let (w0, w1) = final_words(ONE, 0x01, 0, 0, 0, 0, 0x12, 0);
        let state = PshState {
            final_inputs_0: w0,
            final_inputs_1: w1,
            ..Default::default()
        };
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("uniform vec4 c0_8;"), "{glsl}");
        assert!(glsl.contains("fragColor.rgb = max(c0_8.rgb, 0.0);"), "{glsl}");
        assert!(glsl.contains("fragColor.a = max(c1_8.a, 0.0);"), "{glsl}");
    }

    #[test]
    fn alpha_test_functions() {
        let mut state = PshState {
            alpha_test: true,
            alpha_func: CompareFunc::GreaterEqual,
            ..Default::default()
        };
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("uniform float alphaRef;"), "{glsl}");
        assert!(glsl.contains("if (!(fragColor.a >= alphaRef)) discard;"), "{glsl}");

        state.alpha_func = CompareFunc::Never;
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("fragColor = r0;\ndiscard;\n"), "{glsl}");

        state.alpha_func = CompareFunc::Always;
        let glsl = translate(&state, Shading::Flat);
        assert!(!glsl.contains("alphaRef"), "{glsl}");
    }

    #[test]
    fn point_sprite_replaces_t3() {
        let state = PshState {
            point_sprite: true,
            ..Default::default()
        };
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("vec4 pT3 = vec4(gl_PointCoord, 1.0, 1.0);"), "{glsl}");
    }

    #[test]
    fn r0_alpha_seeded_from_t0() {
        let state = PshState {
            shader_stage_program: 0x01,
            ..Default::default()
        };
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("vec4 r0;\nr0.a = t0.a;\n"), "{glsl}");
    }

    #[test]
    fn reserved_register_reads_zero() {
        let (w0, w1) = final_words(ONE, 0x06, 0, 0, 0, 0, ONE, 0);
        let state = PshState {
            final_inputs_0: w0,
            final_inputs_1: w1,
            ..Default::default()
        };
        let glsl = translate(&state, Shading::Flat);
        assert!(glsl.contains("fragColor.rgb = vec3(0.0);"), "{glsl}");
    }
}
