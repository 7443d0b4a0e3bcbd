// This module implements EVEX compressed displacement (disp8*N). An EVEX memory operand
// may store its displacement as one signed byte that the CPU scales by N, where N depends
// on the instruction's tuple type, vector length, EVEX.W and EVEX.b (broadcast). The
// scale factor is an exhaustive match over TupleType so that adding a tuple type is a
// compile-time obligation; shapes with no compressed form yield N = 0. compress() checks
// exact divisibility with a power-of-two mask and then the signed-byte range. Both are
// pure functions, safe to call from any thread. EvexDescriptor can also be read straight
// from the P1/P2 payload bytes of an EVEX prefix, and Displacement::select picks the
// 8-bit or 32-bit displacement form for the encoder.

//! EVEX disp8*N scale factors and displacement compression.

use std::fmt;

/// EVEX tuple types, with the template byte codes used by the instruction tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TupleType {
    /// Full vector.
    Fv = 0o01,
    /// Half vector.
    Hv = 0o02,
    /// Full vector memory.
    Fvm = 0o03,
    /// Tuple1 scalar, 8-bit element.
    T1s8 = 0o04,
    /// Tuple1 scalar, 16-bit element.
    T1s16 = 0o05,
    /// Tuple1 scalar, element size from EVEX.W.
    T1s = 0o06,
    /// Tuple1 fixed 32-bit.
    T1f32 = 0o07,
    /// Tuple1 fixed 64-bit.
    T1f64 = 0o10,
    /// Two elements.
    T2 = 0o11,
    /// Four elements.
    T4 = 0o12,
    /// Eight elements.
    T8 = 0o13,
    /// Half vector memory.
    Hvm = 0o14,
    /// Quarter vector memory.
    Qvm = 0o15,
    /// Eighth vector memory.
    Ovm = 0o16,
    /// 128-bit memory.
    M128 = 0o17,
    /// Duplicated (MOVDDUP).
    Dup = 0o20,
}

impl TupleType {
    pub const ALL: [TupleType; 16] = [
        TupleType::Fv,
        TupleType::Hv,
        TupleType::Fvm,
        TupleType::T1s8,
        TupleType::T1s16,
        TupleType::T1s,
        TupleType::T1f32,
        TupleType::T1f64,
        TupleType::T2,
        TupleType::T4,
        TupleType::T8,
        TupleType::Hvm,
        TupleType::Qvm,
        TupleType::Ovm,
        TupleType::M128,
        TupleType::Dup,
    ];

    /// Template byte code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Tuple type for a template byte code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            TupleType::Fv => "FV",
            TupleType::Hv => "HV",
            TupleType::Fvm => "FVM",
            TupleType::T1s8 => "T1S8",
            TupleType::T1s16 => "T1S16",
            TupleType::T1s => "T1S",
            TupleType::T1f32 => "T1F32",
            TupleType::T1f64 => "T1F64",
            TupleType::T2 => "T2",
            TupleType::T4 => "T4",
            TupleType::T8 => "T8",
            TupleType::Hvm => "HVM",
            TupleType::Qvm => "QVM",
            TupleType::Ovm => "OVM",
            TupleType::M128 => "M128",
            TupleType::Dup => "DUP",
        }
    }
}

impl fmt::Display for TupleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for TupleType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        Self::from_code(code).ok_or(code)
    }
}

/// EVEX.L'L vector length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VectorLength {
    Vl128 = 0,
    Vl256 = 1,
    Vl512 = 2,
}

impl VectorLength {
    /// Ordinal 0..=2.
    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    /// Decode L'L; `3` is reserved.
    pub const fn from_ll(ll: u8) -> Option<Self> {
        match ll {
            0 => Some(VectorLength::Vl128),
            1 => Some(VectorLength::Vl256),
            2 => Some(VectorLength::Vl512),
            _ => None,
        }
    }

    pub const fn bits(self) -> u32 {
        128 << self.ordinal()
    }
}

/// EVEX.P1 bit 7: W.
pub const EVEX_P1W: u8 = 0x80;
/// EVEX.P2 bit 4: broadcast / rounding / SAE.
pub const EVEX_P2B: u8 = 0x10;
/// EVEX.P2 bits 6:5: vector length.
pub const EVEX_P2LL: u8 = 0x60;

/// The EVEX fields that decide disp8*N for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvexDescriptor {
    pub tuple_type: TupleType,
    pub vector_length: VectorLength,
    /// EVEX.W
    pub width: bool,
    /// EVEX.b
    pub broadcast: bool,
}

impl EvexDescriptor {
    pub const fn new(
        tuple_type: TupleType,
        vector_length: VectorLength,
        width: bool,
        broadcast: bool,
    ) -> Self {
        Self {
            tuple_type,
            vector_length,
            width,
            broadcast,
        }
    }

    /// Read W, b and L'L from the P1 and P2 payload bytes of an EVEX prefix.
    pub fn from_prefix(tuple_type: TupleType, p1: u8, p2: u8) -> Option<Self> {
        let vector_length = VectorLength::from_ll((p2 & EVEX_P2LL) >> 5)?;
        Some(Self {
            tuple_type,
            vector_length,
            width: p1 & EVEX_P1W != 0,
            broadcast: p2 & EVEX_P2B != 0,
        })
    }

    /// The disp8 scale factor N; `0` means no compressed form exists.
    pub fn scale_factor(&self) -> u32 {
        scale_factor(self)
    }
}

/// FV: `[W][b][VL]`.
const FV_N: [[[u32; 3]; 2]; 2] = [[[16, 32, 64], [4, 4, 4]], [[16, 32, 64], [8, 8, 8]]];
/// HV: `[b][VL]`.
const HV_N: [[u32; 3]; 2] = [[8, 16, 32], [4, 4, 4]];
/// DUP: `[VL]`.
const DUP_N: [u32; 3] = [8, 32, 64];

/// Compute the disp8 scale factor N for an instruction.
///
/// Returns `0` when the shape has no compressed displacement, which tells the
/// caller to fall back to a full 32-bit displacement.
pub fn scale_factor(desc: &EvexDescriptor) -> u32 {
    let vl = desc.vector_length.ordinal();
    let w = desc.width as u32;
    let b = desc.broadcast as usize;
    let code = desc.tuple_type.code() as u32;

    match desc.tuple_type {
        TupleType::Fv => FV_N[w as usize][b][vl as usize],
        TupleType::Hv => HV_N[b][vl as usize],
        TupleType::Fvm => 1 << (vl + 4),
        TupleType::T1s8 | TupleType::T1s16 => code - TupleType::T1s8.code() as u32 + 1,
        TupleType::T1s => {
            if desc.width {
                8
            } else {
                4
            }
        }
        TupleType::T1f32 => 4,
        TupleType::T1f64 => 8,
        TupleType::T2 | TupleType::T4 | TupleType::T8 => {
            let tuple = code - TupleType::T2.code() as u32;
            if vl + 7 <= (w + 5) + (tuple + 1) {
                0
            } else {
                1 << (tuple + w + 3)
            }
        }
        TupleType::Hvm | TupleType::Qvm | TupleType::Ovm => {
            1 << (TupleType::Ovm.code() as u32 - code + vl + 1)
        }
        TupleType::M128 => 16,
        TupleType::Dup => DUP_N[vl as usize],
    }
}

/// Compress `offset` to a scaled signed byte.
///
/// Fails when `n` is zero, `offset` is not an exact multiple of `n`, or the
/// scaled value does not fit in `i8`. Every valid `n` is a power of two; any
/// other `n`, or one too large for an `i32` offset, never compresses.
pub fn compress(offset: i32, n: u32) -> Option<i8> {
    if !n.is_power_of_two() {
        return None;
    }
    let Ok(n) = i32::try_from(n) else {
        return None;
    };
    if offset & (n - 1) != 0 {
        log::trace!("disp8*{n}: offset {offset} is not a multiple");
        return None;
    }

    // Exact multiple, so truncating division is exact for negative offsets too.
    let scaled = offset / n;
    match i8::try_from(scaled) {
        Ok(disp8) => Some(disp8),
        Err(_) => {
            log::trace!("disp8*{n}: offset {offset} scales to {scaled}, out of range");
            None
        }
    }
}

/// Displacement form chosen for an EVEX memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Displacement {
    /// Compressed byte, scaled by N at run time.
    Disp8(i8),
    /// Full 32-bit displacement.
    Disp32(i32),
}

impl Displacement {
    /// Pick disp8*N when `offset` compresses, else disp32.
    pub fn select(desc: &EvexDescriptor, offset: i32) -> Self {
        match compress(offset, scale_factor(desc)) {
            Some(disp8) => Displacement::Disp8(disp8),
            None => Displacement::Disp32(offset),
        }
    }

    /// Bytes the displacement occupies in the encoding.
    pub fn size(&self) -> usize {
        match self {
            Displacement::Disp8(_) => 1,
            Displacement::Disp32(_) => 4,
        }
    }

    /// ModRM.mod value for a base register without a zero-displacement form.
    pub fn modrm_mod(&self) -> u8 {
        match self {
            Displacement::Disp8(_) => 0b01,
            Displacement::Disp32(_) => 0b10,
        }
    }

    /// Little-endian displacement bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            Displacement::Disp8(d) => vec![d as u8],
            Displacement::Disp32(d) => d.to_le_bytes().to_vec(),
        }
    }
}
