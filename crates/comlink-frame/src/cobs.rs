//! Consistent overhead byte stuffing for comlink frames.
//!
//! The byte transform is the `cobs` crate's; this module pins it to the
//! frame layer's limits. Inputs are 1 to [`MAX_INPUT_LEN`] bytes, encoded
//! output is at most one byte longer than the input, and every decode
//! failure surfaces as [`FrameError::Malformed`].
//!
//! The 0x00 frame delimiter is not produced here; the framing layer appends
//! it after the encoded bytes.

use bytes::BytesMut;

use crate::error::{FrameError, Result};

/// Largest input accepted by [`encode`].
pub const MAX_INPUT_LEN: usize = 254;

/// Worst-case bytes added by [`encode`] for inputs up to [`MAX_INPUT_LEN`].
pub const OVERHEAD_MAX: usize = 1;

const BLOCK_EMPTY: u8 = 0x01;

/// Upper bound on the encoded size of `len` input bytes.
pub fn max_encoded_len(len: usize) -> usize {
    ::cobs::max_encoding_length(len).max(1)
}

/// Encode `src` and append the result to `dst`.
///
/// Returns the number of bytes appended. `src` must hold between 1 and
/// [`MAX_INPUT_LEN`] bytes.
pub fn encode(src: &[u8], dst: &mut BytesMut) -> Result<usize> {
    if src.is_empty() || src.len() > MAX_INPUT_LEN {
        return Err(FrameError::InvalidCodecLength {
            len: src.len(),
            max: MAX_INPUT_LEN,
        });
    }

    // One spare byte: some encoder versions close a full block with an
    // empty one.
    let mut scratch = [0u8; MAX_INPUT_LEN + OVERHEAD_MAX + 1];
    let mut len = ::cobs::encode(src, &mut scratch);
    if len > src.len() + OVERHEAD_MAX && scratch[len - 1] == BLOCK_EMPTY {
        len -= 1;
    }

    dst.extend_from_slice(&scratch[..len]);
    Ok(len)
}

/// Decode `src` (without its trailing delimiter) and append the result to
/// `dst`.
///
/// Returns the number of bytes appended, or [`FrameError::Malformed`] when a
/// code byte points past the end of `src` or `src` contains a zero byte.
pub fn decode(src: &[u8], dst: &mut BytesMut) -> Result<usize> {
    if src.is_empty() {
        return Err(FrameError::Malformed("empty frame"));
    }
    if src.contains(&0) {
        return Err(FrameError::Malformed("zero byte inside frame"));
    }
    check_blocks(src)?;

    let start = dst.len();
    dst.resize(start + src.len(), 0);
    match ::cobs::decode(src, &mut dst[start..]) {
        Ok(len) => {
            dst.truncate(start + len);
            Ok(len)
        }
        Err(_) => {
            dst.truncate(start);
            Err(FrameError::Malformed("invalid COBS encoding"))
        }
    }
}

/// The chain of code bytes must land exactly on the end of `src`.
fn check_blocks(src: &[u8]) -> Result<()> {
    let mut idx = 0usize;
    while idx < src.len() {
        idx += usize::from(src[idx]);
        if idx > src.len() {
            return Err(FrameError::Malformed("block length points past end of frame"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(src: &[u8]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        encode(src, &mut dst).unwrap();
        dst.to_vec()
    }

    fn decoded(src: &[u8]) -> Result<Vec<u8>> {
        let mut dst = BytesMut::new();
        decode(src, &mut dst)?;
        Ok(dst.to_vec())
    }

    #[test]
    fn known_vectors() {
        assert_eq!(encoded(&[0x00]), [0x01, 0x01]);
        assert_eq!(encoded(&[0x00, 0x00]), [0x01, 0x01, 0x01]);
        assert_eq!(
            encoded(&[0x11, 0x22, 0x00, 0x33]),
            [0x03, 0x11, 0x22, 0x02, 0x33]
        );
        assert_eq!(
            encoded(&[0x11, 0x22, 0x33, 0x44]),
            [0x05, 0x11, 0x22, 0x33, 0x44]
        );
        assert_eq!(
            encoded(&[0x11, 0x00, 0x00, 0x00]),
            [0x02, 0x11, 0x01, 0x01, 0x01]
        );
    }

    #[test]
    fn full_block_has_no_trailing_code() {
        let src: Vec<u8> = (1..=254).map(|b| b as u8).collect();
        let out = encoded(&src);
        assert_eq!(out.len(), 255);
        assert_eq!(out[0], 0xFF);
        assert_eq!(&out[1..], src.as_slice());
        assert_eq!(decoded(&out).unwrap(), src);
    }

    #[test]
    fn roundtrip_every_length_and_pattern() {
        let mut seed = 0x2545_F491u32;
        for len in 1..=MAX_INPUT_LEN {
            let zeros = vec![0u8; len];
            let no_zeros: Vec<u8> = (0..len).map(|i| (i % 255) as u8 + 1).collect();
            let noise: Vec<u8> = (0..len)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    (seed % 4) as u8 * 0x55
                })
                .collect();

            for src in [&zeros, &no_zeros, &noise] {
                let out = encoded(src);
                assert!(out.len() <= src.len() + OVERHEAD_MAX, "len {len}");
                assert!(!out.contains(&0), "delimiter leaked at len {len}");
                assert_eq!(&decoded(&out).unwrap(), src, "len {len}");
            }
        }
    }

    #[test]
    fn appends_to_existing_buffer() {
        let mut dst = BytesMut::from(&b"xy"[..]);
        assert_eq!(encode(&[0x00, 0x01], &mut dst).unwrap(), 3);
        assert_eq!(dst.as_ref(), &[b'x', b'y', 0x01, 0x02, 0x01]);
    }

    #[test]
    fn rejects_out_of_range_lengths() {
        let mut dst = BytesMut::new();
        assert!(matches!(
            encode(&[], &mut dst),
            Err(FrameError::InvalidCodecLength { len: 0, .. })
        ));
        assert!(matches!(
            encode(&[1u8; 255], &mut dst),
            Err(FrameError::InvalidCodecLength { len: 255, .. })
        ));
        assert!(dst.is_empty());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(decoded(&[]), Err(FrameError::Malformed(_))));
        assert!(matches!(decoded(&[0x05, 0x11]), Err(FrameError::Malformed(_))));
        assert!(matches!(
            decoded(&[0x03, 0x11, 0x00]),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(decoded(&[0x00]), Err(FrameError::Malformed(_))));
    }

    #[test]
    fn encoded_size_bound() {
        assert_eq!(max_encoded_len(0), 1);
        assert_eq!(max_encoded_len(1), 2);
        assert_eq!(max_encoded_len(254), 255);
    }

    #[test]
    fn failed_decode_leaves_buffer_untouched() {
        let mut dst = BytesMut::from(&b"keep"[..]);
        assert!(decode(&[0x05, 0x11], &mut dst).is_err());
        assert_eq!(dst.as_ref(), b"keep");
    }
}
