//! Variable-length quantities: 7 data bits per byte, big-endian, high bit
//! set on every byte except the last.

use crate::error::{Error, Result};

/// Decode one quantity from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed. Any number of
/// continuation bytes is accepted as long as the value fits in 64 bits.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if value > (u64::MAX >> 7) {
            return Err(Error::format("variable-length quantity overflows 64 bits"));
        }
        value = (value << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::format("truncated variable-length quantity"))
}

/// Append the encoding of `value` to `out`.
pub fn encode(value: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    let mut rest = value;
    loop {
        groups[n] = (rest & 0x7F) as u8;
        n += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

/// Encode into a fresh buffer.
pub fn to_bytes(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    encode(value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_encodings() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (127, &[0x7F]),
            (128, &[0x81, 0x00]),
            (16383, &[0xFF, 0x7F]),
            (16384, &[0x81, 0x80, 0x00]),
            (2_097_151, &[0xFF, 0xFF, 0x7F]),
        ];
        for (value, bytes) in cases {
            assert_eq!(to_bytes(value), bytes, "encoding {value}");
            assert_eq!(decode(bytes).unwrap(), (value, bytes.len()), "decoding {value}");
        }
    }

    #[test]
    fn test_decode_stops_at_last_byte() {
        assert_eq!(decode(&[0x81, 0x00, 0x90, 0x3C]).unwrap(), (128, 2));
    }

    #[test]
    fn test_more_than_four_bytes() {
        let bytes = to_bytes(1 << 35);
        assert_eq!(bytes.len(), 6);
        assert_eq!(decode(&bytes).unwrap().0, 1 << 35);
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(decode(&[0x81, 0x80]), Err(Error::Format(_))));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_overflow() {
        let bytes = [0xFF; 12];
        assert!(matches!(decode(&bytes), Err(Error::Format(_))));
    }

    proptest! {
        #[test]
        fn test_round_trip(value in any::<u64>()) {
            let bytes = to_bytes(value);
            prop_assert_eq!(decode(&bytes).unwrap(), (value, bytes.len()));
        }

        #[test]
        fn test_reencode_reproduces_bytes(value in 0u64..(1 << 28)) {
            let bytes = to_bytes(value);
            let (decoded, _) = decode(&bytes).unwrap();
            prop_assert_eq!(to_bytes(decoded), bytes);
        }
    }
}
