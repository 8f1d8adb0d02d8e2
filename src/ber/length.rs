//! BER length encoding (X.690 Section 8.1.3).

use crate::error::{DecodeErrorKind, Error, Result};

/// Maximum length we accept while decoding (one UDP datagram).
pub const MAX_LENGTH: usize = 0x00FF_FFFF;

/// Encode a length in definite form.
///
/// Returns the bytes in reverse order (for the reverse encode buffer) and the
/// number of valid bytes at the start of the array.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut out = [0u8; 5];
    if len < 0x80 {
        out[0] = len as u8;
        return (out, 1);
    }

    let mut n = 0;
    let mut v = len;
    while v > 0 && n < 4 {
        out[n] = (v & 0xFF) as u8;
        v >>= 8;
        n += 1;
    }
    out[n] = 0x80 | n as u8;
    (out, n + 1)
}

/// Decode a length starting at `data[0]`.
///
/// Returns `(length, octets_consumed)`.
pub fn decode_length(data: &[u8], offset: usize) -> Result<(usize, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::decode(offset, DecodeErrorKind::TruncatedData));
    };

    if first < 0x80 {
        return Ok((first as usize, 1));
    }
    if first == 0x80 {
        return Err(Error::decode(offset, DecodeErrorKind::IndefiniteLength));
    }

    let octets = (first & 0x7F) as usize;
    if octets > 4 {
        return Err(Error::decode(
            offset,
            DecodeErrorKind::LengthTooLong { octets },
        ));
    }
    if data.len() < 1 + octets {
        return Err(Error::decode(offset, DecodeErrorKind::TruncatedData));
    }

    let len = data[1..=octets]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len > MAX_LENGTH {
        return Err(Error::decode(offset, DecodeErrorKind::InvalidLength));
    }
    Ok((len, 1 + octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward(len: usize) -> Vec<u8> {
        let (bytes, count) = encode_length(len);
        let mut v: Vec<u8> = bytes[..count].to_vec();
        v.reverse();
        v
    }

    #[test]
    fn test_encode_length_short_and_long_form() {
        assert_eq!(forward(0), vec![0x00]);
        assert_eq!(forward(127), vec![0x7F]);
        assert_eq!(forward(128), vec![0x81, 0x80]);
        assert_eq!(forward(256), vec![0x82, 0x01, 0x00]);
    }

    #[test]
    fn test_decode_length() {
        assert_eq!(decode_length(&[0x05], 0).unwrap(), (5, 1));
        assert_eq!(decode_length(&[0x81, 0x80], 0).unwrap(), (128, 2));
        assert_eq!(decode_length(&[0x82, 0x01, 0x00], 0).unwrap(), (256, 3));
        assert!(decode_length(&[0x80], 0).is_err());
        assert!(decode_length(&[0x82, 0x01], 0).is_err());
        assert!(decode_length(&[], 0).is_err());
    }
}
