//! Deterministic encoding vectors, checked against both the verifier and
//! the canonical encoder.

use proptest::prelude::*;
use wbn_cbor::{check_deterministic, CanonicalCodec, CiboriumCodec, DeterminismError, Value};

const INTEGER_VECTORS: &[(u64, &[u8])] = &[
    (0, &[0x00]),
    (23, &[0x17]),
    (24, &[0x18, 0x18]),
    (45, &[0x18, 0x2d]),
    (255, &[0x18, 0xff]),
    (256, &[0x19, 0x01, 0x00]),
    (65535, &[0x19, 0xff, 0xff]),
    (65536, &[0x1a, 0x00, 0x01, 0x00, 0x00]),
    (4294967295, &[0x1a, 0xff, 0xff, 0xff, 0xff]),
    (
        4294967296,
        &[0x1b, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
    ),
];

/// Encode `value` as an unsigned integer with exactly `width` argument bytes.
fn encode_with_width(value: u64, width: usize) -> Vec<u8> {
    let info = match width {
        1 => 24,
        2 => 25,
        4 => 26,
        8 => 27,
        _ => panic!("unsupported width {width}"),
    };
    let mut out = vec![info];
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    out
}

fn minimal_width(value: u64) -> usize {
    match value {
        0..=23 => 0,
        24..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    }
}

#[test]
fn test_integer_vectors_are_deterministic() {
    for (value, bytes) in INTEGER_VECTORS {
        assert_eq!(
            check_deterministic(bytes),
            Ok(()),
            "{value} encoded as {bytes:02x?} MUST be accepted"
        );
        assert_eq!(
            &CiboriumCodec.encode(&Value::Unsigned(*value)).unwrap()[..],
            *bytes,
            "encoder must produce the shortest form of {value}"
        );
    }
}

#[test]
fn test_padded_integers_rejected() {
    for (value, width) in [(0u64, 1usize), (23, 1), (45, 2), (255, 2), (256, 4), (65536, 8)] {
        let bytes = encode_with_width(value, width);
        assert!(
            matches!(
                check_deterministic(&bytes),
                Err(DeterminismError::NonMinimalArgument { .. })
            ),
            "{value} with {width} argument bytes MUST be rejected"
        );
    }
}

#[test]
fn test_map_order_from_canonical_encoder_verifies() {
    let map = Value::Map(vec![
        (Value::from("webBundleId"), Value::from("x")),
        (Value::from("b"), Value::from(1u64)),
        (Value::from("aa"), Value::Null),
    ]);
    let bytes = CiboriumCodec.encode(&map).unwrap();
    assert_eq!(check_deterministic(&bytes), Ok(()));
}

#[test]
fn test_truncated_wide_header() {
    assert!(matches!(
        check_deterministic(&[0x1b, 0x00, 0x00]),
        Err(DeterminismError::TruncatedHeader { offset: 0, .. })
    ));
}

/// Every value here has at least one wider encoding.
fn narrower_than_u64() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..24,
        24u64..256,
        256u64..65536,
        65536u64..(1u64 << 32),
    ]
}

#[test]
fn test_every_generated_width_has_a_wider_encoding() {
    for value in [0u64, 23, 24, 255, 256, 65535, 65536, u32::MAX as u64] {
        assert!(minimal_width(value) < 8, "{value} needs a wider encoding");
    }
    assert_eq!(minimal_width(1u64 << 32), 8);
}

proptest! {
    #[test]
    fn prop_canonical_integer_is_deterministic(value in any::<u64>()) {
        let bytes = CiboriumCodec.encode(&Value::Unsigned(value)).unwrap();
        prop_assert_eq!(bytes.len(), 1 + minimal_width(value));
        prop_assert!(check_deterministic(&bytes).is_ok());
    }

    #[test]
    fn prop_wider_than_minimal_is_rejected(value in narrower_than_u64(), pick in 0usize..4) {
        let wider: Vec<usize> = [1usize, 2, 4, 8]
            .into_iter()
            .filter(|w| *w > minimal_width(value))
            .collect();
        let width = wider[pick % wider.len()];
        let bytes = encode_with_width(value, width);
        prop_assert!(
            matches!(
                check_deterministic(&bytes),
                Err(DeterminismError::NonMinimalArgument { .. })
            ),
            "{} with {} argument bytes MUST be rejected",
            value,
            width
        );
    }

    #[test]
    fn prop_canonical_byte_strings_verify(data in proptest::collection::vec(any::<u8>(), 0..600)) {
        let bytes = CiboriumCodec.encode(&Value::Bytes(data)).unwrap();
        prop_assert!(check_deterministic(&bytes).is_ok());
    }
}
