//! Field decoding for the register-combiner and texture-shader words of [`PshState`].
//!
//! Nothing here fails: values the hardware documents as reserved decode to `None` and the
//! translator substitutes a neutral value.

use std::fmt;

use bitflags::bitflags;

use crate::state::{PshState, MAX_COMBINER_STAGES, MAX_TEXTURES};

/// Combiner register selector (low nibble of an input byte, or an output nibble).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    /// Reads as zero; as a destination the result is discarded.
    Zero,
    C0,
    C1,
    Fog,
    V0,
    V1,
    T0,
    T1,
    T2,
    T3,
    R0,
    R1,
    /// Final combiner only: `V1 + R0` with optional complement and clamp.
    V1R0Sum,
    /// Final combiner only: `E * F`.
    EfProd,
}

impl Register {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw & 0xF {
            0x0 => Register::Zero,
            0x1 => Register::C0,
            0x2 => Register::C1,
            0x3 => Register::Fog,
            0x4 => Register::V0,
            0x5 => Register::V1,
            0x8 => Register::T0,
            0x9 => Register::T1,
            0xA => Register::T2,
            0xB => Register::T3,
            0xC => Register::R0,
            0xD => Register::R1,
            0xE => Register::V1R0Sum,
            0xF => Register::EfProd,
            _ => return None,
        })
    }
}

/// Input mapping applied to a combiner operand (bits 5..8 of the input byte).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputMapping {
    UnsignedIdentity,
    UnsignedInvert,
    ExpandNormal,
    ExpandNegate,
    HalfBiasNormal,
    HalfBiasNegate,
    SignedIdentity,
    SignedNegate,
}

impl InputMapping {
    pub fn from_raw(raw: u8) -> Self {
        match (raw >> 5) & 7 {
            0 => InputMapping::UnsignedIdentity,
            1 => InputMapping::UnsignedInvert,
            2 => InputMapping::ExpandNormal,
            3 => InputMapping::ExpandNegate,
            4 => InputMapping::HalfBiasNormal,
            5 => InputMapping::HalfBiasNegate,
            6 => InputMapping::SignedIdentity,
            _ => InputMapping::SignedNegate,
        }
    }

    /// Wraps a GLSL expression in the mapping.
    pub fn apply(self, value: &str) -> String {
        match self {
            InputMapping::UnsignedIdentity => format!("max({value}, 0.0)"),
            InputMapping::UnsignedInvert => format!("(1.0 - clamp({value}, 0.0, 1.0))"),
            InputMapping::ExpandNormal => format!("(2.0 * max({value}, 0.0) - 1.0)"),
            InputMapping::ExpandNegate => format!("(-2.0 * max({value}, 0.0) + 1.0)"),
            InputMapping::HalfBiasNormal => format!("(max({value}, 0.0) - 0.5)"),
            InputMapping::HalfBiasNegate => format!("(-max({value}, 0.0) + 0.5)"),
            InputMapping::SignedIdentity => value.to_owned(),
            InputMapping::SignedNegate => format!("-{value}"),
        }
    }

    /// The mapping evaluated on a constant input.
    pub fn fold(self, x: f32) -> f32 {
        let unsigned = x.max(0.0);
        match self {
            InputMapping::UnsignedIdentity => unsigned,
            InputMapping::UnsignedInvert => 1.0 - x.clamp(0.0, 1.0),
            InputMapping::ExpandNormal => 2.0 * unsigned - 1.0,
            InputMapping::ExpandNegate => -2.0 * unsigned + 1.0,
            InputMapping::HalfBiasNormal => unsigned - 0.5,
            InputMapping::HalfBiasNegate => -unsigned + 0.5,
            InputMapping::SignedIdentity => x,
            // Keeps `-0.0` from reaching the generated source.
            InputMapping::SignedNegate => 0.0 - x,
        }
    }
}

/// One combiner operand as encoded in a byte of an input word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Input {
    pub register: u8,
    /// Bit 4: read alpha instead of RGB (color combiner) or blue (alpha combiner).
    pub alpha: bool,
    pub mapping: InputMapping,
}

impl Input {
    pub fn from_raw(raw: u8) -> Self {
        Self {
            register: raw & 0xF,
            alpha: raw & 0x10 != 0,
            mapping: InputMapping::from_raw(raw),
        }
    }

    pub fn reg(self) -> Option<Register> {
        Register::from_raw(self.register)
    }
}

/// The four operands of a general combiner, packed A (high byte) to D (low byte).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CombinerInputs {
    pub a: Input,
    pub b: Input,
    pub c: Input,
    pub d: Input,
}

impl CombinerInputs {
    pub fn from_raw(word: u32) -> Self {
        let [d, c, b, a] = word.to_le_bytes();
        Self {
            a: Input::from_raw(a),
            b: Input::from_raw(b),
            c: Input::from_raw(c),
            d: Input::from_raw(d),
        }
    }
}

/// Scale/bias applied to every output of a combiner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputMapping {
    Identity,
    Bias,
    ShiftLeft1,
    ShiftLeft1Bias,
    ShiftLeft2,
    ShiftRight1,
}

impl OutputMapping {
    /// `flags` are the bits above the three destination nibbles.
    pub fn from_flags(flags: u32) -> Option<Self> {
        Some(match flags & 0x38 {
            0x00 => OutputMapping::Identity,
            0x08 => OutputMapping::Bias,
            0x10 => OutputMapping::ShiftLeft1,
            0x18 => OutputMapping::ShiftLeft1Bias,
            0x20 => OutputMapping::ShiftLeft2,
            0x30 => OutputMapping::ShiftRight1,
            _ => return None,
        })
    }

    pub fn apply(self, value: &str) -> String {
        match self {
            OutputMapping::Identity => value.to_owned(),
            OutputMapping::Bias => format!("({value} - 0.5)"),
            OutputMapping::ShiftLeft1 => format!("({value} * 2.0)"),
            OutputMapping::ShiftLeft1Bias => format!("(({value} - 0.5) * 2.0)"),
            OutputMapping::ShiftLeft2 => format!("({value} * 4.0)"),
            OutputMapping::ShiftRight1 => format!("({value} / 2.0)"),
        }
    }
}

/// Destinations and operation flags of one general combiner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CombinerOutput {
    pub ab: u8,
    pub cd: u8,
    pub mux_sum: u8,
    pub ab_dot: bool,
    pub cd_dot: bool,
    /// Selects between AB and CD on the R0 alpha bit instead of summing them.
    pub mux: bool,
    /// Raw mapping bits; see [`OutputMapping::from_flags`].
    pub mapping_bits: u32,
    pub ab_blue_to_alpha: bool,
    pub cd_blue_to_alpha: bool,
}

impl CombinerOutput {
    pub fn from_raw(word: u32) -> Self {
        let flags = word >> 12;
        Self {
            cd: (word & 0xF) as u8,
            ab: ((word >> 4) & 0xF) as u8,
            mux_sum: ((word >> 8) & 0xF) as u8,
            cd_dot: flags & 0x01 != 0,
            ab_dot: flags & 0x02 != 0,
            mux: flags & 0x04 != 0,
            mapping_bits: flags & 0x38,
            ab_blue_to_alpha: flags & 0x80 != 0,
            cd_blue_to_alpha: flags & 0x40 != 0,
        }
    }

    pub fn mapping(&self) -> Option<OutputMapping> {
        OutputMapping::from_flags(self.mapping_bits)
    }
}

bitflags! {
    /// Low byte of the second final-combiner word.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct FinalSettings: u8 {
        /// Use `1 - r0` in the V1R0 sum.
        const COMPLEMENT_R0 = 1 << 5;
        /// Use `1 - v1` in the V1R0 sum.
        const COMPLEMENT_V1 = 1 << 6;
        /// Clamp the V1R0 sum to `[0, 1]`.
        const CLAMP_SUM = 1 << 7;
    }
}

/// The final combiner: `rgb = D + mix(C, B, A)`, `alpha = G`, with E and F feeding the
/// `EF_PROD` register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FinalCombiner {
    pub a: Input,
    pub b: Input,
    pub c: Input,
    pub d: Input,
    pub e: Input,
    pub f: Input,
    pub g: Input,
    pub settings: FinalSettings,
}

impl FinalCombiner {
    /// `None` when both final-combiner words are zero, which disables the stage.
    pub fn from_raw(word0: u32, word1: u32) -> Option<Self> {
        if word0 == 0 && word1 == 0 {
            return None;
        }
        let abcd = CombinerInputs::from_raw(word0);
        let efg = CombinerInputs::from_raw(word1);
        Some(Self {
            a: abcd.a,
            b: abcd.b,
            c: abcd.c,
            d: abcd.d,
            e: efg.a,
            f: efg.b,
            g: efg.c,
            settings: FinalSettings::from_bits_truncate(word1 as u8),
        })
    }
}

/// Decoded `combiner_control` word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombinerControl {
    /// Number of general stages as programmed (may exceed [`MAX_COMBINER_STAGES`]).
    pub stages: usize,
    /// Mux on bit 7 of R0 alpha instead of bit 0.
    pub mux_msb: bool,
    pub unique_c0: bool,
    pub unique_c1: bool,
}

impl CombinerControl {
    pub fn from_raw(word: u32) -> Self {
        let flags = word >> 8;
        Self {
            stages: (word & 0xFF) as usize,
            mux_msb: flags & 0x001 != 0,
            unique_c0: flags & 0x010 != 0,
            unique_c1: flags & 0x100 != 0,
        }
    }
}

/// Texture shader program of one texture unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureMode {
    None = 0x00,
    Project2D = 0x01,
    Project3D = 0x02,
    Cubemap = 0x03,
    Passthru = 0x04,
    ClipPlane = 0x05,
    BumpEnvMap = 0x06,
    BumpEnvMapLum = 0x07,
    Brdf = 0x08,
    DotSt = 0x09,
    DotZw = 0x0A,
    DotReflectDiffuse = 0x0B,
    DotReflectSpecular = 0x0C,
    DotStr3D = 0x0D,
    DotStrCube = 0x0E,
    DependentAr = 0x0F,
    DependentGb = 0x10,
    DotProduct = 0x11,
    DotReflectSpecularConst = 0x12,
}

impl TextureMode {
    const ALL: [TextureMode; 19] = [
        TextureMode::None,
        TextureMode::Project2D,
        TextureMode::Project3D,
        TextureMode::Cubemap,
        TextureMode::Passthru,
        TextureMode::ClipPlane,
        TextureMode::BumpEnvMap,
        TextureMode::BumpEnvMapLum,
        TextureMode::Brdf,
        TextureMode::DotSt,
        TextureMode::DotZw,
        TextureMode::DotReflectDiffuse,
        TextureMode::DotReflectSpecular,
        TextureMode::DotStr3D,
        TextureMode::DotStrCube,
        TextureMode::DependentAr,
        TextureMode::DependentGb,
        TextureMode::DotProduct,
        TextureMode::DotReflectSpecularConst,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureMode::None => "NONE",
            TextureMode::Project2D => "PROJECT2D",
            TextureMode::Project3D => "PROJECT3D",
            TextureMode::Cubemap => "CUBEMAP",
            TextureMode::Passthru => "PASSTHRU",
            TextureMode::ClipPlane => "CLIPPLANE",
            TextureMode::BumpEnvMap => "BUMPENVMAP",
            TextureMode::BumpEnvMapLum => "BUMPENVMAP_LUM",
            TextureMode::Brdf => "BRDF",
            TextureMode::DotSt => "DOT_ST",
            TextureMode::DotZw => "DOT_ZW",
            TextureMode::DotReflectDiffuse => "DOT_RFLCT_DIFF",
            TextureMode::DotReflectSpecular => "DOT_RFLCT_SPEC",
            TextureMode::DotStr3D => "DOT_STR_3D",
            TextureMode::DotStrCube => "DOT_STR_CUBE",
            TextureMode::DependentAr => "DPNDNT_AR",
            TextureMode::DependentGb => "DPNDNT_GB",
            TextureMode::DotProduct => "DOTPRODUCT",
            TextureMode::DotReflectSpecularConst => "DOT_RFLCT_SPEC_CONST",
        }
    }
}

impl fmt::Display for TextureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conversion of a fetched texel into the vector used by the dot-product texture modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DotMapping {
    ZeroToOne,
    Minus1To1D3d,
    Minus1To1Gl,
    Minus1To1,
    HiLo1,
    HiLoHemisphereD3d,
    HiLoHemisphereGl,
    HiLoHemisphere,
}

impl DotMapping {
    pub const ALL: [DotMapping; 8] = [
        DotMapping::ZeroToOne,
        DotMapping::Minus1To1D3d,
        DotMapping::Minus1To1Gl,
        DotMapping::Minus1To1,
        DotMapping::HiLo1,
        DotMapping::HiLoHemisphereD3d,
        DotMapping::HiLoHemisphereGl,
        DotMapping::HiLoHemisphere,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Name of the GLSL helper implementing the mapping.
    pub fn function(self) -> &'static str {
        match self {
            DotMapping::ZeroToOne => "dotmap_zero_to_one",
            DotMapping::Minus1To1D3d => "dotmap_minus1_to_1_d3d",
            DotMapping::Minus1To1Gl => "dotmap_minus1_to_1_gl",
            DotMapping::Minus1To1 => "dotmap_minus1_to_1",
            DotMapping::HiLo1 => "dotmap_hilo_1",
            DotMapping::HiLoHemisphereD3d => "dotmap_hilo_hemisphere_d3d",
            DotMapping::HiLoHemisphereGl => "dotmap_hilo_hemisphere_gl",
            DotMapping::HiLoHemisphere => "dotmap_hilo_hemisphere",
        }
    }

    /// The hi-lo mappings are approximations in the generated helpers.
    pub fn is_exact(self) -> bool {
        !matches!(
            self,
            DotMapping::HiLo1
                | DotMapping::HiLoHemisphereD3d
                | DotMapping::HiLoHemisphereGl
                | DotMapping::HiLoHemisphere
        )
    }
}

/// Per-unit texture shader configuration decoded from `shader_stage_program` and
/// `other_stage_input`. Raw values are kept so the translator can report reserved ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureStages {
    pub modes: [u8; MAX_TEXTURES],
    pub dot_maps: [u8; MAX_TEXTURES],
    /// Texture unit whose result feeds dependent reads and dot products of each unit.
    pub input_tex: [u8; MAX_TEXTURES],
}

impl TextureStages {
    pub fn from_state(state: &PshState) -> Self {
        let program = state.shader_stage_program;
        let other = state.other_stage_input;
        let nibble = |shift: u32| ((other >> shift) & 0xF) as u8;
        Self {
            modes: std::array::from_fn(|i| ((program >> (i * 5)) & 0x1F) as u8),
            dot_maps: [0, nibble(0), nibble(4), nibble(8)],
            input_tex: [0, 0, nibble(16), nibble(20)],
        }
    }
}

/// Decoded general combiner stages, truncated to the hardware maximum.
pub fn combiner_stages(state: &PshState, count: usize) -> Vec<Stage> {
    (0..count.min(MAX_COMBINER_STAGES))
        .map(|i| Stage {
            rgb_inputs: CombinerInputs::from_raw(state.rgb_inputs[i]),
            rgb_output: CombinerOutput::from_raw(state.rgb_outputs[i]),
            alpha_inputs: CombinerInputs::from_raw(state.alpha_inputs[i]),
            alpha_output: CombinerOutput::from_raw(state.alpha_outputs[i]),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    pub rgb_inputs: CombinerInputs,
    pub rgb_output: CombinerOutput,
    pub alpha_inputs: CombinerInputs,
    pub alpha_output: CombinerOutput,
}
