/*++

Licensed under the Apache-2.0 license.

File Name:

    package2.rs

Abstract:

    Package2 header authentication: signature policy, metadata decryption
    and structural / anti-downgrade validation.

--*/

use secmon_config::Package2Policy;
use secmon_error::SecmonError;
use secmon_pkg2::{KeyGeneration, Package2Header, Package2Meta, HEADER_SIZE, PAYLOAD_ALIGNMENT};
use zerocopy::IntoBytes;

use crate::{check_verify_result, FatalErrorHandler, Package2KeySet, TrustAnchor};

/// Advisory check for an image that was delivered in plaintext.
///
/// True when every signature byte holds the same value and the metadata
/// magic is readable without decryption. This never gates verification.
pub fn is_package2_decrypted(header: &Package2Header) -> bool {
    let first = header.signature[0];
    header.signature.iter().all(|&b| b == first) && header.meta.is_magic_valid()
}

fn verify_package2_signature(
    trust: &dyn TrustAnchor,
    header: &Package2Header,
    key_set: Package2KeySet,
) -> bool {
    trust.verify_signature(
        &header.signature,
        header.meta.as_bytes(),
        trust.package2_modulus(key_set),
    )
}

/// Verifies the header signature according to the device's key policy.
///
/// Units locked to the production key always verify. Other units verify
/// against the development key only when `verify` is set.
pub fn verify_package2_header_signature(
    trust: &dyn TrustAnchor,
    fatal: &mut dyn FatalErrorHandler,
    header: &Package2Header,
    verify: bool,
) {
    if trust.is_production_for_public_key() {
        check_verify_result(
            fatal,
            verify_package2_signature(trust, header, Package2KeySet::Production),
            SecmonError::BOOT_PACKAGE2_INVALID_SIGNATURE,
            "package2 header sign verification failed",
        );
    } else if verify {
        check_verify_result(
            fatal,
            verify_package2_signature(trust, header, Package2KeySet::Development),
            SecmonError::BOOT_PACKAGE2_INVALID_SIGNATURE,
            "package2 header sign verification failed",
        );
    }
}

/// Copies `src` into `dst`, decrypting it first when `encrypted` is set.
///
/// The key is selected by the generation encoded in `src`'s plaintext
/// prefix, and that prefix is also the IV.
pub fn decrypt_package2_header(
    trust: &dyn TrustAnchor,
    fatal: &mut dyn FatalErrorHandler,
    dst: &mut Package2Meta,
    src: &Package2Meta,
    encrypted: bool,
) {
    if encrypted {
        let Some(key_generation) = KeyGeneration::new(src.key_generation()) else {
            fatal.fatal_error(
                SecmonError::BOOT_PACKAGE2_INVALID_KEY_GENERATION,
                "package2 key generation out of range",
            );
        };

        if trust
            .decrypt(dst.as_mut_bytes(), src.as_bytes(), &src.header_iv, key_generation)
            .is_err()
        {
            fatal.fatal_error(
                SecmonError::BOOT_PACKAGE2_DECRYPT_FAILURE,
                "package2 header decryption failed",
            );
        }

        restore_header_iv(dst, src);
    } else {
        *dst = *src;
    }
}

/// Puts back the plaintext prefix the cipher overwrote.
pub fn restore_header_iv(dst: &mut Package2Meta, src: &Package2Meta) {
    dst.header_iv = src.header_iv;
}

/// Structural checks on decrypted metadata.
///
/// Non-empty payloads must each carry their own IV.
pub fn verify_package2_meta(meta: &Package2Meta, policy: &Package2Policy) -> bool {
    if !meta.is_magic_valid() {
        return false;
    }

    let size = meta.size();
    if size as usize <= HEADER_SIZE || size > policy.package2_size_max {
        return false;
    }

    if KeyGeneration::new(meta.key_generation()).is_none() {
        return false;
    }

    let entrypoint = meta.entrypoint.get();
    if entrypoint % PAYLOAD_ALIGNMENT != 0 {
        return false;
    }

    let payloads = meta.payloads();
    if payloads.iter().any(|p| p.size % PAYLOAD_ALIGNMENT != 0) {
        return false;
    }

    let total = payloads
        .iter()
        .fold(HEADER_SIZE as u64, |acc, p| acc + u64::from(p.size));
    if total != u64::from(size) {
        return false;
    }

    // Every payload must fit in the destination region without wrapping.
    for payload in payloads.iter() {
        match payload.end() {
            Some(end) if end <= policy.payload_region_size => {}
            _ => return false,
        }
    }

    for (i, a) in payloads.iter().enumerate() {
        if payloads.iter().skip(i + 1).any(|b| a.overlaps(b)) {
            return false;
        }
    }

    let mut non_empty = payloads.iter().filter(|p| p.size != 0);
    while let Some(a) = non_empty.next() {
        if non_empty.clone().any(|b| a.iv == b.iv) {
            return false;
        }
    }

    payloads.iter().any(|p| {
        p.offset <= entrypoint && u64::from(entrypoint) < u64::from(p.offset) + u64::from(p.size)
    })
}

/// Anti-downgrade checks on decrypted metadata.
pub fn verify_package2_version(meta: &Package2Meta, policy: &Package2Policy) -> bool {
    meta.package2_version >= policy.minimum_package2_version
        && meta.bootloader_version <= policy.current_bootloader_version
}

/// Validates decrypted metadata, halting on any failure.
pub fn verify_package2_header(
    fatal: &mut dyn FatalErrorHandler,
    meta: &Package2Meta,
    policy: &Package2Policy,
) {
    check_verify_result(
        fatal,
        verify_package2_meta(meta, policy),
        SecmonError::BOOT_PACKAGE2_INVALID_META,
        "package2 meta verification failed",
    );

    check_verify_result(
        fatal,
        verify_package2_version(meta, policy),
        SecmonError::BOOT_PACKAGE2_INVALID_VERSION,
        "package2 version verification failed",
    );
}
