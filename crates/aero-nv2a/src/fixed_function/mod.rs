//! Vertex stage synthesized from the fixed-function transform and lighting registers.
//!
//! The generated code reads the same `c[]` constant file a microcode program would; the
//! state tracker uploads the transform context (matrices, texgen planes, eye position) into
//! the slots named in [`xf`]. Lighting context lives in three extra uniform arrays.

pub mod shader_gen;

pub use shader_gen::generate;

/// Transform-context slot layout inside the vertex constant file and the lighting arrays.
pub mod xf {
    pub const CMAT0: usize = 0x00;
    pub const PMAT0: usize = 0x04;
    pub const MMAT0: usize = 0x08;
    pub const IMMAT0: usize = 0x0C;
    pub const MMAT1: usize = 0x10;
    pub const IMMAT1: usize = 0x14;
    pub const MMAT2: usize = 0x18;
    pub const IMMAT2: usize = 0x1C;
    pub const MMAT3: usize = 0x20;
    pub const IMMAT3: usize = 0x24;
    pub const EYEP: usize = 0x38;
    pub const FOG: usize = 0x39;
    pub const TG0MAT: usize = 0x40;
    pub const TG1MAT: usize = 0x44;
    pub const TG2MAT: usize = 0x48;
    pub const TG3MAT: usize = 0x4C;
    pub const T0MAT: usize = 0x50;
    pub const T1MAT: usize = 0x54;
    pub const T2MAT: usize = 0x58;
    pub const T3MAT: usize = 0x5C;

    pub const MODEL_VIEW: [usize; 4] = [MMAT0, MMAT1, MMAT2, MMAT3];
    pub const INV_MODEL_VIEW: [usize; 4] = [IMMAT0, IMMAT1, IMMAT2, IMMAT3];
    pub const TEXGEN_PLANES: [usize; 4] = [TG0MAT, TG1MAT, TG2MAT, TG3MAT];
    pub const TEXTURE_MATRIX: [usize; 4] = [T0MAT, T1MAT, T2MAT, T3MAT];

    pub const LTCTXA_COUNT: usize = 26;
    pub const LTCTXB_COUNT: usize = 52;
    pub const LTC1_COUNT: usize = 20;

    pub const LTCTXA_FR_AMB: usize = 0x0C;
    pub const LTCTXA_CM_COL: usize = 0x0D;
    pub const LTCTXA_L0_K: usize = 0x0E;
    pub const LTCTXA_L0_SPT: usize = 0x0F;
    pub const LTCTXB_L0_AMB: usize = 0x03;
    pub const LTCTXB_L0_DIF: usize = 0x04;
    pub const LTCTXB_L0_SPC: usize = 0x05;
    pub const LTC1_R0: usize = 0x0C;
}
