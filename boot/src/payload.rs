/*++

Licensed under the Apache-2.0 license.

File Name:

    payload.rs

Abstract:

    Places the package2 payloads into the destination region.

--*/

use core::ops::Range;

use secmon_error::SecmonError;
use secmon_pkg2::{KeyGeneration, Package2Meta, PAYLOAD_COUNT};

use crate::{FatalErrorHandler, TrustAnchor};

struct Segment {
    src: Range<usize>,
    dst: Range<usize>,
}

fn checked_range(start: usize, size: usize, limit: usize) -> Option<Range<usize>> {
    let end = start.checked_add(size)?;
    if end <= limit {
        Some(start..end)
    } else {
        None
    }
}

/// Decrypts (or copies) each payload into `dst`.
///
/// Payloads are consumed back to back from `src` in declaration order and
/// written at their metadata-specified offsets in `dst`, which need not be
/// ascending or contiguous. All metadata must already be authenticated.
/// Every segment is bounds-checked before the first byte is written.
pub fn decrypt_and_load_package2_payloads(
    trust: &dyn TrustAnchor,
    fatal: &mut dyn FatalErrorHandler,
    dst: &mut [u8],
    meta: &Package2Meta,
    src: &[u8],
    encrypted: bool,
) {
    let payloads = meta.payloads();

    let mut segments: [Option<Segment>; PAYLOAD_COUNT] = Default::default();
    let mut cursor = 0usize;
    for (segment, payload) in segments.iter_mut().zip(payloads.iter()) {
        let size = payload.size as usize;
        let Some(src_range) = checked_range(cursor, size, src.len()) else {
            fatal.fatal_error(
                SecmonError::BOOT_PACKAGE2_PAYLOAD_OUT_OF_BOUNDS,
                "package2 payload exceeds source image",
            );
        };
        let Some(dst_range) = checked_range(payload.offset as usize, size, dst.len()) else {
            fatal.fatal_error(
                SecmonError::BOOT_PACKAGE2_PAYLOAD_OUT_OF_BOUNDS,
                "package2 payload exceeds destination region",
            );
        };
        cursor = src_range.end;
        *segment = Some(Segment {
            src: src_range,
            dst: dst_range,
        });
    }

    let key_generation = KeyGeneration::new(meta.key_generation());

    for (segment, payload) in segments.iter().flatten().zip(payloads.iter()) {
        let dst = &mut dst[segment.dst.clone()];
        let src = &src[segment.src.clone()];
        if encrypted {
            let Some(key_generation) = key_generation else {
                fatal.fatal_error(
                    SecmonError::BOOT_PACKAGE2_INVALID_KEY_GENERATION,
                    "package2 key generation out of range",
                );
            };
            if trust
                .decrypt(dst, src, &payload.iv, key_generation)
                .is_err()
            {
                fatal.fatal_error(
                    SecmonError::BOOT_PACKAGE2_DECRYPT_FAILURE,
                    "package2 payload decryption failed",
                );
            }
        } else {
            dst.copy_from_slice(src);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{expect_halt, PanicHandler, XorAnchor};
    use secmon_pkg2::{PayloadDescriptor, IV_SIZE};
    use zerocopy::FromZeros;

    const SIZES: [u32; 3] = [16, 32, 8];
    const OFFSETS: [u32; 3] = [0, 64, 128];

    fn meta_with(sizes: [u32; 3], offsets: [u32; 3]) -> Package2Meta {
        let mut meta = Package2Meta::new_zeroed();
        meta.set_key_generation(3);
        for i in 0..3 {
            meta.set_payload(
                i,
                &PayloadDescriptor {
                    offset: offsets[i],
                    size: sizes[i],
                    iv: [0x10 * (i as u8 + 1); IV_SIZE],
                },
            );
        }
        meta
    }

    fn source() -> Vec<u8> {
        (0..56u8).collect()
    }

    #[test]
    fn test_segments_read_contiguously() {
        let anchor = XorAnchor::new();
        let meta = meta_with(SIZES, OFFSETS);
        let src = source();
        *anchor.src_base.borrow_mut() = src.as_ptr() as usize;
        let mut dst = [0xFFu8; 136];

        decrypt_and_load_package2_payloads(
            &anchor,
            &mut PanicHandler,
            &mut dst,
            &meta,
            &src,
            true,
        );

        let calls = anchor.calls.borrow();
        let offsets: Vec<usize> = calls.iter().map(|c| c.0).collect();
        assert_eq!(offsets, vec![0, 16, 48]);
        assert!(calls.iter().all(|c| c.2 == 3));

        let mut cursor = 0;
        for i in 0..3 {
            let iv = [0x10 * (i as u8 + 1); IV_SIZE];
            for j in 0..SIZES[i] as usize {
                assert_eq!(
                    dst[OFFSETS[i] as usize + j],
                    src[cursor + j] ^ XorAnchor::keystream(&iv, 3, j)
                );
            }
            cursor += SIZES[i] as usize;
        }
        // Gaps between segments are untouched.
        assert!(dst[16..64].iter().all(|&b| b == 0xFF));
        assert!(dst[96..128].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_descending_destination_offsets() {
        let anchor = XorAnchor::new();
        let meta = meta_with(SIZES, [128, 64, 0]);
        let src = source();
        let mut dst = [0u8; 160];

        decrypt_and_load_package2_payloads(
            &anchor,
            &mut PanicHandler,
            &mut dst,
            &meta,
            &src,
            false,
        );

        assert_eq!(&dst[128..144], &src[0..16]);
        assert_eq!(&dst[64..96], &src[16..48]);
        assert_eq!(&dst[0..8], &src[48..56]);
        assert!(anchor.calls.borrow().is_empty());
    }

    #[test]
    fn test_destination_overflow_writes_nothing() {
        let anchor = XorAnchor::new();
        let meta = meta_with(SIZES, [0, 64, 132]);
        let src = source();
        let mut dst = [0u8; 136];

        let halted = expect_halt(|| {
            decrypt_and_load_package2_payloads(
                &anchor,
                &mut PanicHandler,
                &mut dst,
                &meta,
                &src,
                false,
            )
        });
        assert_eq!(halted.error, SecmonError::BOOT_PACKAGE2_PAYLOAD_OUT_OF_BOUNDS);
        assert!(dst.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_source_overflow() {
        let anchor = XorAnchor::new();
        let meta = meta_with(SIZES, OFFSETS);
        let src = source();
        let mut dst = [0u8; 136];

        let halted = expect_halt(|| {
            decrypt_and_load_package2_payloads(
                &anchor,
                &mut PanicHandler,
                &mut dst,
                &meta,
                &src[..50],
                true,
            )
        });
        assert_eq!(halted.message, "package2 payload exceeds source image");
    }
}
