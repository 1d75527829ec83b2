//! Tests for `scalar` module

use super::scalar::*;
use crate::error::Error;
use half::f16;

#[test]
fn test_bytes_for_each_kind() {
    assert_eq!(ScalarKind::F64.bytes_for(10), 80);
    assert_eq!(ScalarKind::F32.bytes_for(10), 40);
    assert_eq!(ScalarKind::F16.bytes_for(10), 20);
    assert_eq!(ScalarKind::F8.bytes_for(10), 10);
    assert_eq!(ScalarKind::B1.bytes_for(10), 2);
    assert_eq!(ScalarKind::B1.bytes_for(16), 2);
    assert_eq!(ScalarKind::B1.bytes_for(17), 3);
}

#[test]
fn test_f32_encoding_is_little_endian() {
    let bytes = ScalarKind::F32.encode(&[1.0]);
    assert_eq!(bytes, 1.0f32.to_le_bytes().to_vec());
}

#[test]
fn test_exact_kinds_preserve_values() {
    let v = [0.25f32, -1.5, 3.0, 0.0];
    for kind in [ScalarKind::F32, ScalarKind::F64, ScalarKind::F16] {
        let decoded = kind.decode(&kind.encode(&v), v.len());
        assert_eq!(decoded, v.to_vec(), "{kind} should be exact for these values");
    }
}

#[test]
fn test_f8_quantizes_to_hundredths_and_clamps() {
    let bytes = ScalarKind::F8.encode(&[0.5, -0.333, 2.0, -9.0]);
    assert_eq!(bytes.iter().map(|b| *b as i8).collect::<Vec<_>>(), vec![50, -33, 127, -127]);

    let decoded = ScalarKind::F8.decode(&bytes, 4);
    assert!((decoded[0] - 0.5).abs() < 1e-6);
    assert!((decoded[1] + 0.33).abs() < 1e-6);
    assert!((decoded[2] - 1.27).abs() < 1e-6);
}

#[test]
fn test_b1_packs_msb_first() {
    let bytes = ScalarKind::B1.encode(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
    assert_eq!(bytes, vec![0b1000_0001, 0b1000_0000]);

    let decoded = ScalarKind::B1.decode(&bytes, 9);
    assert_eq!(decoded, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
}

#[test]
fn test_b1_negative_and_zero_are_unset() {
    let bytes = ScalarKind::B1.encode(&[-1.0, 0.0, 0.1]);
    assert_eq!(bytes, vec![0b0010_0000]);
}

#[test]
fn test_convert_same_kind_borrows() {
    let bytes = ScalarKind::F32.encode(&[1.0, 2.0]);
    let converted = ScalarKind::F32.convert(ScalarKind::F32, &bytes, 2);
    assert!(matches!(converted, std::borrow::Cow::Borrowed(_)));
}

#[test]
fn test_convert_f64_to_f16() {
    let src = ScalarKind::F64.encode(&[0.5, -2.0]);
    let converted = ScalarKind::F16.convert(ScalarKind::F64, &src, 2);
    assert_eq!(converted.len(), 4);
    assert_eq!(ScalarKind::F16.decode(&converted, 2), vec![0.5, -2.0]);
}

#[test]
fn test_check_len_reports_dimensions() {
    let err = ScalarKind::F32
        .check_len(&[0u8; 12], 4)
        .expect_err("3 floats for 4 dimensions");
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 4,
            actual: 3
        }
    ));
    assert!(ScalarKind::B1.check_len(&[0u8; 2], 12).is_ok());
}

#[test]
fn test_scalar_names_round_trip() {
    for kind in ScalarKind::ALL {
        assert_eq!(kind.name().parse::<ScalarKind>().ok(), Some(kind));
        assert_eq!(ScalarKind::from_tag(kind.tag()), Some(kind));
    }
    assert_eq!("Half".parse::<ScalarKind>().ok(), Some(ScalarKind::F16));
    assert!("u4".parse::<ScalarKind>().is_err());
}

#[test]
fn test_scalar_kind_serde_uses_lowercase_names() {
    let json = serde_json::to_string(&ScalarKind::F16).expect("serialize");
    assert_eq!(json, "\"f16\"");
}

#[test]
fn test_vector_ref_bytes_match_codec() {
    let v32 = vec![0.5f32, 1.0];
    let v64 = [0.5f64, 1.0];
    let v16 = [f16::from_f32(0.5), f16::from_f32(1.0)];
    let v8 = [50i8, 100];

    let r32 = VectorRef::from(&v32);
    assert_eq!(r32.kind(), ScalarKind::F32);
    assert_eq!(r32.to_bytes().as_ref(), ScalarKind::F32.encode(&v32).as_slice());
    assert_eq!(
        VectorRef::from(&v64[..]).to_bytes().as_ref(),
        ScalarKind::F64.encode(&v32).as_slice()
    );
    assert_eq!(
        VectorRef::from(&v16[..]).to_bytes().as_ref(),
        ScalarKind::F16.encode(&v32).as_slice()
    );
    assert_eq!(
        VectorRef::from(&v8[..]).to_bytes().as_ref(),
        ScalarKind::F8.encode(&v32).as_slice()
    );
}

#[test]
fn test_lanes_iterate_components_in_order() {
    let wide = ScalarKind::F64.encode(&[1.5, -2.0]);
    let narrow = ScalarKind::F16.encode(&[0.25, 4.0, -1.0]);
    let fixed = ScalarKind::F8.encode(&[0.5, -0.25]);

    let lanes: Vec<f64> = F64Lanes::iter(&wide).collect();

    assert_eq!(lanes, vec![1.5, -2.0]);
    assert_eq!(F16Lanes::iter(&narrow).collect::<Vec<_>>(), vec![0.25, 4.0, -1.0]);
    assert_eq!(F8Lanes::iter(&fixed).collect::<Vec<_>>(), vec![0.5, -0.25]);
    assert_eq!(F32Lanes::iter(&narrow[..5]).count(), 1);
}
