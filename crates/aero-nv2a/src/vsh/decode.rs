//! Bit-level decoding of transform-program instructions.
//!
//! Each instruction is four little-endian words. Word 0 is unused by the hardware; the
//! remaining 96 bits carry two opcodes (MAC and ILU), three shared input operands and the
//! output routing.

use std::fmt;

use crate::state::VSH_TOKEN_SIZE;

pub type Token = [u32; VSH_TOKEN_SIZE];

/// Offset applied to the signed constant bank so `c[-96]..c[95]` lands on `0..191`.
pub const CONSTANT_INDEX_CORRECTION: i16 = 96;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Ilu,
    Mac,
    Const,
    V,
    ANeg,
    ASwzX,
    ASwzY,
    ASwzZ,
    ASwzW,
    AR,
    AMux,
    BNeg,
    BSwzX,
    BSwzY,
    BSwzZ,
    BSwzW,
    BR,
    BMux,
    CNeg,
    CSwzX,
    CSwzY,
    CSwzZ,
    CSwzW,
    CRHigh,
    CRLow,
    CMux,
    OutMacMask,
    OutR,
    OutIluMask,
    OutOMask,
    OutOrb,
    OutAddress,
    OutMux,
    A0X,
    Final,
}

impl Field {
    /// `(word, first bit, width)`.
    const fn location(self) -> (usize, u32, u32) {
        match self {
            Field::Ilu => (1, 25, 3),
            Field::Mac => (1, 21, 4),
            Field::Const => (1, 13, 8),
            Field::V => (1, 9, 4),
            Field::ANeg => (1, 8, 1),
            Field::ASwzX => (1, 6, 2),
            Field::ASwzY => (1, 4, 2),
            Field::ASwzZ => (1, 2, 2),
            Field::ASwzW => (1, 0, 2),
            Field::AR => (2, 28, 4),
            Field::AMux => (2, 26, 2),
            Field::BNeg => (2, 25, 1),
            Field::BSwzX => (2, 23, 2),
            Field::BSwzY => (2, 21, 2),
            Field::BSwzZ => (2, 19, 2),
            Field::BSwzW => (2, 17, 2),
            Field::BR => (2, 13, 4),
            Field::BMux => (2, 11, 2),
            Field::CNeg => (2, 10, 1),
            Field::CSwzX => (2, 8, 2),
            Field::CSwzY => (2, 6, 2),
            Field::CSwzZ => (2, 4, 2),
            Field::CSwzW => (2, 2, 2),
            Field::CRHigh => (2, 0, 2),
            Field::CRLow => (3, 30, 2),
            Field::CMux => (3, 28, 2),
            Field::OutMacMask => (3, 24, 4),
            Field::OutR => (3, 20, 4),
            Field::OutIluMask => (3, 16, 4),
            Field::OutOMask => (3, 12, 4),
            Field::OutOrb => (3, 11, 1),
            Field::OutAddress => (3, 3, 8),
            Field::OutMux => (3, 2, 1),
            Field::A0X => (3, 1, 1),
            Field::Final => (3, 0, 1),
        }
    }

    pub fn get(self, token: &Token) -> u8 {
        let (word, shift, width) = self.location();
        ((token[word] >> shift) & ((1u32 << width) - 1)) as u8
    }

    pub fn set(self, token: &mut Token, value: u8) {
        let (word, shift, width) = self.location();
        let mask = ((1u32 << width) - 1) << shift;
        token[word] = (token[word] & !mask) | ((u32::from(value) << shift) & mask);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MacOp {
    Nop,
    Mov,
    Mul,
    Add,
    Mad,
    Dp3,
    Dph,
    Dp4,
    Dst,
    Min,
    Max,
    Slt,
    Sge,
    Arl,
}

impl MacOp {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => MacOp::Nop,
            1 => MacOp::Mov,
            2 => MacOp::Mul,
            3 => MacOp::Add,
            4 => MacOp::Mad,
            5 => MacOp::Dp3,
            6 => MacOp::Dph,
            7 => MacOp::Dp4,
            8 => MacOp::Dst,
            9 => MacOp::Min,
            10 => MacOp::Max,
            11 => MacOp::Slt,
            12 => MacOp::Sge,
            13 => MacOp::Arl,
            _ => return None,
        })
    }

    /// Macro name used in the generated GLSL. Upper case is required by the prelude.
    pub fn name(self) -> &'static str {
        match self {
            MacOp::Nop => "NOP",
            MacOp::Mov => "MOV",
            MacOp::Mul => "MUL",
            MacOp::Add => "ADD",
            MacOp::Mad => "MAD",
            MacOp::Dp3 => "DP3",
            MacOp::Dph => "DPH",
            MacOp::Dp4 => "DP4",
            MacOp::Dst => "DST",
            MacOp::Min => "MIN",
            MacOp::Max => "MAX",
            MacOp::Slt => "SLT",
            MacOp::Sge => "SGE",
            MacOp::Arl => "ARL",
        }
    }

    /// Which of the A/B/C inputs the opcode reads.
    pub fn params(self) -> [bool; 3] {
        match self {
            MacOp::Nop => [false, false, false],
            MacOp::Mov | MacOp::Arl => [true, false, false],
            MacOp::Add => [true, false, true],
            MacOp::Mad => [true, true, true],
            MacOp::Mul
            | MacOp::Dp3
            | MacOp::Dph
            | MacOp::Dp4
            | MacOp::Dst
            | MacOp::Min
            | MacOp::Max
            | MacOp::Slt
            | MacOp::Sge => [true, true, false],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IluOp {
    Nop,
    Mov,
    Rcp,
    Rcc,
    Rsq,
    Exp,
    Log,
    Lit,
}

impl IluOp {
    pub fn from_raw(raw: u8) -> Self {
        match raw & 7 {
            0 => IluOp::Nop,
            1 => IluOp::Mov,
            2 => IluOp::Rcp,
            3 => IluOp::Rcc,
            4 => IluOp::Rsq,
            5 => IluOp::Exp,
            6 => IluOp::Log,
            _ => IluOp::Lit,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IluOp::Nop => "NOP",
            IluOp::Mov => "MOV",
            IluOp::Rcp => "RCP",
            IluOp::Rcc => "RCC",
            IluOp::Rsq => "RSQ",
            IluOp::Exp => "EXP",
            IluOp::Log => "LOG",
            IluOp::Lit => "LIT",
        }
    }
}

/// Source register file of an input operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamMux {
    Temp,
    Input,
    Constant,
}

impl ParamMux {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(ParamMux::Temp),
            2 => Some(ParamMux::Input),
            3 => Some(ParamMux::Constant),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            ParamMux::Temp => 1,
            ParamMux::Input => 2,
            ParamMux::Constant => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputSlot {
    A,
    B,
    C,
}

impl InputSlot {
    fn neg_field(self) -> Field {
        match self {
            InputSlot::A => Field::ANeg,
            InputSlot::B => Field::BNeg,
            InputSlot::C => Field::CNeg,
        }
    }

    fn swizzle_fields(self) -> [Field; 4] {
        match self {
            InputSlot::A => [Field::ASwzX, Field::ASwzY, Field::ASwzZ, Field::ASwzW],
            InputSlot::B => [Field::BSwzX, Field::BSwzY, Field::BSwzZ, Field::BSwzW],
            InputSlot::C => [Field::CSwzX, Field::CSwzY, Field::CSwzZ, Field::CSwzW],
        }
    }

    fn mux_field(self) -> Field {
        match self {
            InputSlot::A => Field::AMux,
            InputSlot::B => Field::BMux,
            InputSlot::C => Field::CMux,
        }
    }
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputSlot::A => "A",
            InputSlot::B => "B",
            InputSlot::C => "C",
        })
    }
}

/// Component selectors, each `0..=3` for `x..=w`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [u8; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([0, 1, 2, 3]);

    /// Shortest GLSL suffix selecting the same components, including the leading dot.
    ///
    /// Trailing repeats are dropped since the prelude's `_in` pads with the last component.
    pub fn suffix(self) -> String {
        let [x, y, z, w] = self.0;
        let len = if self == Self::IDENTITY {
            0
        } else if x == y && y == z && z == w {
            1
        } else if y == z && z == w {
            2
        } else if z == w {
            3
        } else {
            4
        };
        if len == 0 {
            return String::new();
        }
        let mut out = String::with_capacity(len + 1);
        out.push('.');
        for &c in &self.0[..len] {
            out.push(component_char(c));
        }
        out
    }

    /// Inverse of [`Self::suffix`].
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        if suffix.is_empty() {
            return Some(Self::IDENTITY);
        }
        let letters = suffix.strip_prefix('.')?.as_bytes();
        if letters.is_empty() || letters.len() > 4 {
            return None;
        }
        let mut out = [0u8; 4];
        for (i, slot) in out.iter_mut().enumerate() {
            let c = letters[i.min(letters.len() - 1)];
            *slot = match c {
                b'x' => 0,
                b'y' => 1,
                b'z' => 2,
                b'w' => 3,
                _ => return None,
            };
        }
        Some(Self(out))
    }
}

fn component_char(c: u8) -> char {
    ['x', 'y', 'z', 'w'][usize::from(c & 3)]
}

/// Decoded input operand; decoding is lossless so it can be written back bit-for-bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Operand {
    pub mux: u8,
    /// Temporary register number; only meaningful for [`ParamMux::Temp`].
    pub reg: u8,
    pub negate: bool,
    pub swizzle: Swizzle,
}

impl Operand {
    pub fn decode(token: &Token, slot: InputSlot) -> Self {
        let reg = match slot {
            InputSlot::A => Field::AR.get(token),
            InputSlot::B => Field::BR.get(token),
            InputSlot::C => (Field::CRHigh.get(token) << 2) | Field::CRLow.get(token),
        };
        let fields = slot.swizzle_fields();
        Self {
            mux: slot.mux_field().get(token),
            reg,
            negate: slot.neg_field().get(token) != 0,
            swizzle: Swizzle(fields.map(|f| f.get(token))),
        }
    }

    pub fn encode(&self, token: &mut Token, slot: InputSlot) {
        match slot {
            InputSlot::A => Field::AR.set(token, self.reg),
            InputSlot::B => Field::BR.set(token, self.reg),
            InputSlot::C => {
                Field::CRHigh.set(token, self.reg >> 2);
                Field::CRLow.set(token, self.reg & 3);
            }
        }
        slot.mux_field().set(token, self.mux);
        slot.neg_field().set(token, self.negate as u8);
        for (field, c) in slot.swizzle_fields().into_iter().zip(self.swizzle.0) {
            field.set(token, c);
        }
    }
}

/// Flattens the encoded signed constant bank into `0..=255`.
pub fn remap_constant_index(encoded: u8) -> i16 {
    let bank = i16::from((encoded >> 5) & 7) - 3;
    bank * 32 + i16::from(encoded & 31) + CONSTANT_INDEX_CORRECTION
}

/// Inverse of [`remap_constant_index`]; `None` outside the encodable range.
pub fn encode_constant_index(index: i16) -> Option<u8> {
    let shifted = index - CONSTANT_INDEX_CORRECTION;
    let bank = shifted.div_euclid(32) + 3;
    if !(0..8).contains(&bank) {
        return None;
    }
    Some(((bank as u8) << 5) | shifted.rem_euclid(32) as u8)
}

/// Write-mask suffix for a 4-bit `xyzw` mask (bit 3 is `x`).
pub fn mask_components(mask: u8) -> &'static str {
    const MASKS: [&str; 16] = [
        "", "w", "z", "zw", "y", "yw", "yz", "yzw", "x", "xw", "xz", "xzw", "xy", "xyw", "xyz",
        "xyzw",
    ];
    MASKS[usize::from(mask & 0xF)]
}

/// `oFog` only stores one value: the most significant written component lands in `x`, the
/// rest are packed so the four-wide macros still type check.
pub fn fog_mask_components(mask: u8) -> &'static str {
    const MASKS: [&str; 16] = [
        "", "x", "x", "xy", "x", "xy", "xy", "xyz", "x", "xy", "xy", "xyz", "xy", "xyz", "xyz",
        "xyzw",
    ];
    MASKS[usize::from(mask & 0xF)]
}

pub const OUTPUT_REG_FOG: u8 = 5;

/// GLSL name of an output register, `None` for the reserved slots.
pub fn output_register_name(reg: u8) -> Option<&'static str> {
    Some(match reg & 0xF {
        0 => "oPos",
        3 => "oD0",
        4 => "oD1",
        5 => "oFog",
        6 => "oPts",
        7 => "oB0",
        8 => "oB1",
        9 => "oT0",
        10 => "oT1",
        11 => "oT2",
        12 => "oT3",
        _ => return None,
    })
}
