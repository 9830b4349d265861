//! Immutable shader configuration snapshot.
//!
//! A [`ShaderState`] is built by the PGRAPH state tracker once per draw and identifies a
//! compiled program. Equality is byte-exact over the canonical image produced by
//! [`ShaderState::to_bytes`]; floats compare by bit pattern so `0.0` and `-0.0` are distinct
//! keys, matching the raw-memory comparison the hardware state would get.

pub mod codec;
pub mod topology;

use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::xxh3_64;

use crate::vertex::Shading;

pub use codec::StateDecodeError;
pub use topology::{PolygonMode, PrimitiveAssembly, PrimitiveMode};

pub const MAX_TEXTURES: usize = 4;
pub const MAX_LIGHTS: usize = 8;
pub const MAX_COMBINER_STAGES: usize = 8;
/// Transform program slots available to vertex microcode.
pub const MAX_PROGRAM_LENGTH: usize = 136;
pub const VSH_TOKEN_SIZE: usize = 4;
pub const VERTEX_ATTRIBUTES: usize = 16;
pub const VERTEX_CONSTANTS: usize = 192;
pub const POINT_PARAMS: usize = 8;

/// `f32` that compares and hashes by bit pattern.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawF32(pub f32);

impl PartialEq for RawF32 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for RawF32 {}

impl Hash for RawF32 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f32> for RawF32 {
    fn from(v: f32) -> Self {
        Self(v)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShaderState {
    pub vsh: VshState,
    pub geom: GeomState,
    pub psh: PshState,
    /// Gouraud shading; flat shading takes colors from the provoking vertex. Applies to
    /// every stage so the varying qualifiers agree at link time.
    pub smooth_shading: bool,
}

impl ShaderState {
    /// Canonical byte image; the disk cache stores exactly these bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StateDecodeError> {
        codec::decode(bytes)
    }

    /// 64-bit content hash of [`Self::to_bytes`], used as the cache key and on-disk name.
    pub fn content_hash(&self) -> u64 {
        xxh3_64(&self.to_bytes())
    }

    pub fn shading(&self) -> Shading {
        Shading::from_smooth(self.smooth_shading)
    }

    pub fn is_fixed_function(&self) -> bool {
        matches!(self.vsh.program, VertexProgram::FixedFunction(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VshState {
    pub program: VertexProgram,
    /// Bit `i` set means attribute `v{i}` arrives packed as 11-11-10 in an `int`.
    pub compressed_attrs: u16,
    pub surface_scale_factor: u32,
    pub fog: FogState,
    pub point: PointState,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VertexProgram {
    Microcode(MicrocodeProgram),
    FixedFunction(FixedFunctionState),
}

impl Default for VertexProgram {
    fn default() -> Self {
        Self::FixedFunction(FixedFunctionState::default())
    }
}

/// Vertex microcode as uploaded to the transform program slots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MicrocodeProgram {
    pub tokens: Vec<[u32; VSH_TOKEN_SIZE]>,
    pub z_perspective: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FogState {
    pub enable: bool,
    pub mode: FogMode,
    pub gen: FogGen,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PointState {
    pub params_enable: bool,
    pub size: RawF32,
    pub params: [RawF32; POINT_PARAMS],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FixedFunctionState {
    pub skinning: Skinning,
    pub normalization: bool,
    pub texture_matrix_enable: [bool; MAX_TEXTURES],
    /// Texgen mode per texture stage, per S/T/R/Q component.
    pub texgen: [[Texgen; 4]; MAX_TEXTURES],
    pub lighting: bool,
    pub lights: [LightType; MAX_LIGHTS],
    pub emission_src: MaterialColorSource,
    pub ambient_src: MaterialColorSource,
    pub diffuse_src: MaterialColorSource,
    pub specular_src: MaterialColorSource,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GeomState {
    pub primitive_mode: PrimitiveMode,
    pub polygon_front_mode: PolygonMode,
    pub polygon_back_mode: PolygonMode,
}

/// Register-combiner configuration, kept as the raw PGRAPH register words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PshState {
    pub combiner_control: u32,
    pub shader_stage_program: u32,
    pub other_stage_input: u32,
    pub final_inputs_0: u32,
    pub final_inputs_1: u32,
    pub rgb_inputs: [u32; MAX_COMBINER_STAGES],
    pub rgb_outputs: [u32; MAX_COMBINER_STAGES],
    pub alpha_inputs: [u32; MAX_COMBINER_STAGES],
    pub alpha_outputs: [u32; MAX_COMBINER_STAGES],
    pub textures: [TextureUnitState; MAX_TEXTURES],
    pub shadow_depth_func: CompareFunc,
    pub alpha_test: bool,
    pub alpha_func: CompareFunc,
    pub point_sprite: bool,
    pub window_clip_exclusive: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureUnitState {
    pub rect: bool,
    pub snorm: bool,
    pub shadow_map: bool,
    pub alphakill: bool,
    /// Clip-plane comparison per component: `true` discards on `>= 0`, `false` on `< 0`.
    pub compare_mode: [bool; 4],
    pub convolution: ConvolutionFilter,
    /// Zero in the first component means the texture has no border.
    pub border_logical_size: [RawF32; 3],
    pub border_inv_real_size: [RawF32; 3],
}

macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            pub fn from_raw(raw: u8) -> Option<Self> {
                match raw {
                    $(v if v == $value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn raw(self) -> u8 {
                self as u8
            }
        }
    };
}

raw_enum! {
    /// Fog factor curve. Hardware values 2 and 6 are unused.
    pub enum FogMode {
        #[default]
        Linear = 0,
        Exp = 1,
        Exp2 = 3,
        LinearAbs = 4,
        ExpAbs = 5,
        Exp2Abs = 7,
    }
}

impl FogMode {
    pub fn is_abs(self) -> bool {
        matches!(self, Self::LinearAbs | Self::ExpAbs | Self::Exp2Abs)
    }
}

raw_enum! {
    /// Source of the fog distance in the fixed-function pipeline.
    pub enum FogGen {
        #[default]
        SpecAlpha = 0,
        Radial = 1,
        Planar = 2,
        AbsPlanar = 3,
        FogX = 4,
    }
}

raw_enum! {
    pub enum Skinning {
        #[default]
        Off = 0,
        OneWeight = 1,
        TwoWeightsTwoMatrices = 2,
        TwoWeights = 3,
        ThreeWeightsThreeMatrices = 4,
        ThreeWeights = 5,
        FourWeightsFourMatrices = 6,
    }
}

impl Skinning {
    /// `(derived final weight, matrix count)`.
    pub fn blend(self) -> (bool, u32) {
        match self {
            Self::Off => (false, 0),
            Self::OneWeight => (true, 2),
            Self::TwoWeightsTwoMatrices => (false, 2),
            Self::TwoWeights => (true, 3),
            Self::ThreeWeightsThreeMatrices => (false, 3),
            Self::ThreeWeights => (true, 4),
            Self::FourWeightsFourMatrices => (false, 4),
        }
    }
}

raw_enum! {
    pub enum Texgen {
        #[default]
        Disable = 0,
        EyeLinear = 1,
        ObjectLinear = 2,
        SphereMap = 3,
        NormalMap = 4,
        ReflectionMap = 5,
    }
}

raw_enum! {
    pub enum LightType {
        #[default]
        Off = 0,
        Infinite = 1,
        Local = 2,
        Spot = 3,
    }
}

raw_enum! {
    pub enum MaterialColorSource {
        #[default]
        Material = 0,
        Diffuse = 1,
        Specular = 2,
    }
}

raw_enum! {
    /// Depth/alpha comparison, in the hardware's NEVER..ALWAYS order.
    pub enum CompareFunc {
        Never = 0,
        Less = 1,
        Equal = 2,
        LessEqual = 3,
        Greater = 4,
        NotEqual = 5,
        GreaterEqual = 6,
        #[default]
        Always = 7,
    }
}

impl CompareFunc {
    /// GLSL operator for the comparing variants.
    pub fn glsl_op(self) -> Option<&'static str> {
        match self {
            Self::Never | Self::Always => None,
            Self::Less => Some("<"),
            Self::Equal => Some("=="),
            Self::LessEqual => Some("<="),
            Self::Greater => Some(">"),
            Self::NotEqual => Some("!="),
            Self::GreaterEqual => Some(">="),
        }
    }
}

raw_enum! {
    pub enum ConvolutionFilter {
        #[default]
        Disabled = 0,
        Quincunx = 1,
        Gaussian = 2,
    }
}
