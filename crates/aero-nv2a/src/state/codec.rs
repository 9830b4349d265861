//! Little-endian image of a [`ShaderState`].
//!
//! The layout is versioned by a leading byte; any change to the field order must bump
//! [`FORMAT_VERSION`] so stale disk entries fail to decode instead of aliasing.

use thiserror::Error;

use super::*;

pub const FORMAT_VERSION: u8 = 2;

const TAG_MICROCODE: u8 = 0;
const TAG_FIXED_FUNCTION: u8 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateDecodeError {
    #[error("unexpected end of state image at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("unsupported state image version {found}")]
    Version { found: u8 },
    #[error("invalid {field} value {value}")]
    InvalidValue { field: &'static str, value: u32 },
    #[error("{remaining} trailing bytes after state image")]
    TrailingBytes { remaining: usize },
}

pub(super) fn encode(state: &ShaderState) -> Vec<u8> {
    let mut w = Writer::default();
    w.u8(FORMAT_VERSION);

    let vsh = &state.vsh;
    match &vsh.program {
        VertexProgram::Microcode(program) => {
            w.u8(TAG_MICROCODE);
            w.bool(program.z_perspective);
            w.u32(program.tokens.len() as u32);
            for token in &program.tokens {
                for &word in token {
                    w.u32(word);
                }
            }
        }
        VertexProgram::FixedFunction(ff) => {
            w.u8(TAG_FIXED_FUNCTION);
            w.u8(ff.skinning.raw());
            w.bool(ff.normalization);
            for &enable in &ff.texture_matrix_enable {
                w.bool(enable);
            }
            for stage in &ff.texgen {
                for &gen in stage {
                    w.u8(gen.raw());
                }
            }
            w.bool(ff.lighting);
            for &light in &ff.lights {
                w.u8(light.raw());
            }
            w.u8(ff.emission_src.raw());
            w.u8(ff.ambient_src.raw());
            w.u8(ff.diffuse_src.raw());
            w.u8(ff.specular_src.raw());
        }
    }
    w.u16(vsh.compressed_attrs);
    w.u32(vsh.surface_scale_factor);
    w.bool(vsh.fog.enable);
    w.u8(vsh.fog.mode.raw());
    w.u8(vsh.fog.gen.raw());
    w.bool(vsh.point.params_enable);
    w.f32(vsh.point.size);
    for &p in &vsh.point.params {
        w.f32(p);
    }

    let geom = &state.geom;
    w.u8(geom.primitive_mode.raw());
    w.u8(geom.polygon_front_mode.raw());
    w.u8(geom.polygon_back_mode.raw());

    let psh = &state.psh;
    w.u32(psh.combiner_control);
    w.u32(psh.shader_stage_program);
    w.u32(psh.other_stage_input);
    w.u32(psh.final_inputs_0);
    w.u32(psh.final_inputs_1);
    for words in [
        &psh.rgb_inputs,
        &psh.rgb_outputs,
        &psh.alpha_inputs,
        &psh.alpha_outputs,
    ] {
        for &word in words {
            w.u32(word);
        }
    }
    for tex in &psh.textures {
        w.bool(tex.rect);
        w.bool(tex.snorm);
        w.bool(tex.shadow_map);
        w.bool(tex.alphakill);
        for &mode in &tex.compare_mode {
            w.bool(mode);
        }
        w.u8(tex.convolution.raw());
        for &v in tex.border_logical_size.iter().chain(&tex.border_inv_real_size) {
            w.f32(v);
        }
    }
    w.u8(psh.shadow_depth_func.raw());
    w.bool(psh.alpha_test);
    w.u8(psh.alpha_func.raw());
    w.bool(psh.point_sprite);
    w.bool(psh.window_clip_exclusive);

    w.bool(state.smooth_shading);
    w.buf
}

pub(super) fn decode(bytes: &[u8]) -> Result<ShaderState, StateDecodeError> {
    let mut r = Reader { bytes, pos: 0 };

    let version = r.u8()?;
    if version != FORMAT_VERSION {
        return Err(StateDecodeError::Version { found: version });
    }

    let program = match r.u8()? {
        TAG_MICROCODE => {
            let z_perspective = r.bool()?;
            let len = r.u32()? as usize;
            if len > MAX_PROGRAM_LENGTH {
                return Err(StateDecodeError::InvalidValue {
                    field: "program length",
                    value: len as u32,
                });
            }
            let mut tokens = Vec::with_capacity(len);
            for _ in 0..len {
                let mut token = [0u32; VSH_TOKEN_SIZE];
                for word in &mut token {
                    *word = r.u32()?;
                }
                tokens.push(token);
            }
            VertexProgram::Microcode(MicrocodeProgram {
                tokens,
                z_perspective,
            })
        }
        TAG_FIXED_FUNCTION => {
            let mut ff = FixedFunctionState {
                skinning: r.enumerated("skinning", Skinning::from_raw)?,
                normalization: r.bool()?,
                ..Default::default()
            };
            for enable in &mut ff.texture_matrix_enable {
                *enable = r.bool()?;
            }
            for stage in &mut ff.texgen {
                for gen in stage {
                    *gen = r.enumerated("texgen", Texgen::from_raw)?;
                }
            }
            ff.lighting = r.bool()?;
            for light in &mut ff.lights {
                *light = r.enumerated("light type", LightType::from_raw)?;
            }
            ff.emission_src = r.enumerated("emission source", MaterialColorSource::from_raw)?;
            ff.ambient_src = r.enumerated("ambient source", MaterialColorSource::from_raw)?;
            ff.diffuse_src = r.enumerated("diffuse source", MaterialColorSource::from_raw)?;
            ff.specular_src = r.enumerated("specular source", MaterialColorSource::from_raw)?;
            VertexProgram::FixedFunction(ff)
        }
        other => {
            return Err(StateDecodeError::InvalidValue {
                field: "program kind",
                value: other.into(),
            })
        }
    };

    let mut vsh = VshState {
        program,
        compressed_attrs: r.u16()?,
        surface_scale_factor: r.u32()?,
        fog: FogState {
            enable: r.bool()?,
            mode: r.enumerated("fog mode", FogMode::from_raw)?,
            gen: r.enumerated("fog gen", FogGen::from_raw)?,
        },
        point: PointState {
            params_enable: r.bool()?,
            size: r.f32()?,
            ..Default::default()
        },
    };
    for p in &mut vsh.point.params {
        *p = r.f32()?;
    }

    let geom = GeomState {
        primitive_mode: r.enumerated("primitive mode", PrimitiveMode::from_raw)?,
        polygon_front_mode: r.enumerated("polygon mode", PolygonMode::from_raw)?,
        polygon_back_mode: r.enumerated("polygon mode", PolygonMode::from_raw)?,
    };

    let mut psh = PshState {
        combiner_control: r.u32()?,
        shader_stage_program: r.u32()?,
        other_stage_input: r.u32()?,
        final_inputs_0: r.u32()?,
        final_inputs_1: r.u32()?,
        ..Default::default()
    };
    for words in [
        &mut psh.rgb_inputs,
        &mut psh.rgb_outputs,
        &mut psh.alpha_inputs,
        &mut psh.alpha_outputs,
    ] {
        for word in words.iter_mut() {
            *word = r.u32()?;
        }
    }
    for tex in &mut psh.textures {
        tex.rect = r.bool()?;
        tex.snorm = r.bool()?;
        tex.shadow_map = r.bool()?;
        tex.alphakill = r.bool()?;
        for mode in &mut tex.compare_mode {
            *mode = r.bool()?;
        }
        tex.convolution = r.enumerated("convolution filter", ConvolutionFilter::from_raw)?;
        for v in tex.border_logical_size.iter_mut() {
            *v = r.f32()?;
        }
        for v in tex.border_inv_real_size.iter_mut() {
            *v = r.f32()?;
        }
    }
    psh.shadow_depth_func = r.enumerated("shadow depth func", CompareFunc::from_raw)?;
    psh.alpha_test = r.bool()?;
    psh.alpha_func = r.enumerated("alpha func", CompareFunc::from_raw)?;
    psh.point_sprite = r.bool()?;
    psh.window_clip_exclusive = r.bool()?;
    let smooth_shading = r.bool()?;

    let remaining = bytes.len() - r.pos;
    if remaining != 0 {
        return Err(StateDecodeError::TrailingBytes { remaining });
    }

    Ok(ShaderState {
        vsh,
        geom,
        psh,
        smooth_shading,
    })
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: RawF32) {
        self.u32(v.0.to_bits());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], StateDecodeError> {
        let end = self.pos + N;
        let chunk = self
            .bytes
            .get(self.pos..end)
            .ok_or(StateDecodeError::UnexpectedEof { offset: self.pos })?;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, StateDecodeError> {
        Ok(self.take::<1>()?[0])
    }

    fn bool(&mut self) -> Result<bool, StateDecodeError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StateDecodeError::InvalidValue {
                field: "bool",
                value: other.into(),
            }),
        }
    }

    fn u16(&mut self) -> Result<u16, StateDecodeError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, StateDecodeError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn f32(&mut self) -> Result<RawF32, StateDecodeError> {
        Ok(RawF32(f32::from_bits(self.u32()?)))
    }

    fn enumerated<T>(
        &mut self,
        field: &'static str,
        from_raw: fn(u8) -> Option<T>,
    ) -> Result<T, StateDecodeError> {
        let raw = self.u8()?;
        from_raw(raw).ok_or(StateDecodeError::InvalidValue {
            field,
            value: raw.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn busy_state() -> ShaderState {
        let mut state = ShaderState::default();
        state.vsh.program = VertexProgram::Microcode(MicrocodeProgram {
            tokens: vec![[0, 0x0020_001b, 0x0836_106c, 0x2070_f800]],
            z_perspective: true,
        });
        state.vsh.compressed_attrs = 0b1000_0000_0000_0100;
        state.vsh.fog = FogState {
            enable: true,
            mode: FogMode::Exp2Abs,
            gen: FogGen::Planar,
        };
        state.vsh.point.size = RawF32(-0.0);
        state.geom.primitive_mode = PrimitiveMode::QuadStrip;
        state.geom.polygon_front_mode = PolygonMode::Line;
        state.geom.polygon_back_mode = PolygonMode::Line;
        state.psh.rgb_inputs[3] = 0xdead_beef;
        state.psh.textures[2].convolution = ConvolutionFilter::Gaussian;
        state.psh.textures[1].border_logical_size = [RawF32(64.0), RawF32(32.0), RawF32(1.0)];
        state.psh.alpha_func = CompareFunc::GreaterEqual;
        state.smooth_shading = true;
        state
    }

    #[test]
    fn decodes_what_it_encodes() {
        let state = busy_state();
        let bytes = state.to_bytes();
        assert_eq!(ShaderState::from_bytes(&bytes).unwrap(), state);
    }

    #[test]
    fn rejects_truncated_image() {
        let bytes = busy_state().to_bytes();
        let err = ShaderState::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, StateDecodeError::UnexpectedEof { .. }), "{err}");
    }

    #[test]
    fn rejects_other_versions_and_trailing_bytes() {
        let mut bytes = ShaderState::default().to_bytes();
        bytes.push(0);
        assert_eq!(
            ShaderState::from_bytes(&bytes).unwrap_err(),
            StateDecodeError::TrailingBytes { remaining: 1 }
        );

        bytes.pop();
        bytes[0] = FORMAT_VERSION + 1;
        assert_eq!(
            ShaderState::from_bytes(&bytes).unwrap_err(),
            StateDecodeError::Version {
                found: FORMAT_VERSION + 1
            }
        );
    }
}
