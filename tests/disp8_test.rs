//! Integration tests for EVEX disp8*N compression.
//!
//! Besides the scale factor table itself, the chosen displacement form is
//! cross-checked against the bytes iced-x86 emits for real EVEX instructions.

use iced_x86::code_asm::*;
use iced_x86::IcedError;
use proptest::prelude::*;
use x86_encode_core::x86::{compress, scale_factor, Displacement, EvexDescriptor, TupleType, VectorLength};

fn desc(tuple: TupleType, vl: VectorLength, w: bool, b: bool) -> EvexDescriptor {
    EvexDescriptor::new(tuple, vl, w, b)
}

/// Assemble one instruction at address 0.
fn assemble<F>(emit: F) -> Vec<u8>
where
    F: FnOnce(&mut CodeAssembler) -> Result<(), IcedError>,
{
    let mut a = CodeAssembler::new(64).unwrap();
    a.set_prefer_vex(false);
    emit(&mut a).unwrap();
    a.assemble(0).unwrap()
}

/// Displacement of an EVEX instruction with a one-byte opcode and `[rax+disp]` operand.
fn evex_displacement(bytes: &[u8]) -> Displacement {
    assert_eq!(bytes[0], 0x62, "not EVEX encoded: {bytes:02X?}");
    let modrm = bytes[5];
    assert_eq!(modrm & 0b111, 0, "expected rax base: {bytes:02X?}");
    match modrm >> 6 {
        0b01 => Displacement::Disp8(bytes[6] as i8),
        0b10 => Displacement::Disp32(i32::from_le_bytes(bytes[6..10].try_into().unwrap())),
        m => panic!("unexpected mod {m:#b} in {bytes:02X?}"),
    }
}

#[test]
fn test_fv_512_offset_128() {
    let d = desc(TupleType::Fv, VectorLength::Vl512, false, false);
    assert_eq!(scale_factor(&d), 64);
    assert_eq!(compress(128, 64), Some(2));
}

#[test]
fn test_fv_w1_broadcast_128() {
    let d = desc(TupleType::Fv, VectorLength::Vl128, true, true);
    let n = scale_factor(&d);
    assert_eq!(n, 8);
    assert_eq!(compress(24, n), Some(3));
    assert_eq!(compress(20, n), None);
}

#[test]
fn test_t1s_w1_out_of_range() {
    let n = scale_factor(&desc(TupleType::T1s, VectorLength::Vl128, true, false));
    assert_eq!(n, 8);
    assert_eq!(compress(1024, n), None);
}

#[test]
fn test_m128_ignores_other_fields() {
    for vl in [VectorLength::Vl128, VectorLength::Vl256, VectorLength::Vl512] {
        for w in [false, true] {
            for b in [false, true] {
                assert_eq!(scale_factor(&desc(TupleType::M128, vl, w, b)), 16);
            }
        }
    }
    assert_eq!(compress(-32, 16), Some(-2));
}

#[test]
fn test_invalid_tuple_shape_never_compresses() {
    let n = scale_factor(&desc(TupleType::T2, VectorLength::Vl128, true, false));
    assert_eq!(n, 0);
    for offset in [0, 8, 16, -16, 1024] {
        assert_eq!(compress(offset, n), None);
    }
}

#[test]
fn test_cross_check_full_vector() {
    let d = desc(TupleType::Fv, VectorLength::Vl512, false, false);
    for offset in [0x80, -0x40, 0x1fc0, 100, 0x2000, -0x2040] {
        let bytes = assemble(|a| a.vaddps(zmm0, zmm1, zmmword_ptr(rax + offset)));
        assert_eq!(evex_displacement(&bytes), Displacement::select(&d, offset), "offset {offset}");
    }
}

#[test]
fn test_cross_check_broadcast() {
    let d = desc(TupleType::Fv, VectorLength::Vl512, true, true);
    for offset in [24, -1024, 20, 1024] {
        let bytes = assemble(|a| a.vaddpd(zmm0, zmm1, qword_bcst(rax + offset)));
        assert_eq!(evex_displacement(&bytes), Displacement::select(&d, offset), "offset {offset}");
    }
}

#[test]
fn test_cross_check_scalar() {
    let d = desc(TupleType::T1s, VectorLength::Vl128, false, false);
    for offset in [508, -512, 1020, 6] {
        let bytes = assemble(|a| a.vmovss(xmm16, dword_ptr(rax + offset)));
        assert_eq!(evex_displacement(&bytes), Displacement::select(&d, offset), "offset {offset}");
    }
}

#[test]
fn test_cross_check_tuple4() {
    let d = desc(TupleType::T4, VectorLength::Vl512, false, false);
    assert_eq!(scale_factor(&d), 16);
    for offset in [48, -2048, 40] {
        let bytes = assemble(|a| a.vbroadcastf32x4(zmm0, xmmword_ptr(rax + offset)));
        assert_eq!(evex_displacement(&bytes), Displacement::select(&d, offset), "offset {offset}");
    }
}

proptest! {
    #[test]
    fn prop_round_trip(k in -128i32..=127, shift in 0u32..=6) {
        let n = 1u32 << shift;
        prop_assert_eq!(compress(k * n as i32, n), Some(k as i8));
    }

    #[test]
    fn prop_non_multiple_rejected(offset in any::<i32>(), shift in 1u32..=6) {
        let n = 1u32 << shift;
        prop_assume!(offset % n as i32 != 0);
        prop_assert_eq!(compress(offset, n), None);
    }

    #[test]
    fn prop_any_scale_is_safe(offset in any::<i32>(), n in any::<u32>()) {
        if let Some(disp8) = compress(offset, n) {
            prop_assert!(n.is_power_of_two());
            prop_assert_eq!(i64::from(disp8) * i64::from(n), i64::from(offset));
        }
    }

    #[test]
    fn prop_scale_factor_is_zero_or_power_of_two(
        code in 1u8..=0o20,
        ll in 0u8..3,
        w in any::<bool>(),
        b in any::<bool>(),
    ) {
        let tuple = TupleType::from_code(code).unwrap();
        let vl = VectorLength::from_ll(ll).unwrap();
        let n = scale_factor(&desc(tuple, vl, w, b));
        prop_assert!(n == 0 || (n.is_power_of_two() && n <= 64));
    }
}
