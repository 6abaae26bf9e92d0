/*++

Licensed under the Apache-2.0 license.

File Name:

    load_flow.rs

Abstract:

    Package2 load flow: authenticates the package2 image handed over by the
    bootloader and places its payloads for execution.

--*/

use core::fmt::Write;

use montime::HexWord;
use secmon_error::SecmonError;
use secmon_pkg1::BootloaderState;
use secmon_pkg2::{Package2Header, Package2Meta, HEADER_SIZE};
use zerocopy::{FromZeros, IntoBytes};

use crate::package2::{
    decrypt_package2_header, verify_package2_header, verify_package2_header_signature,
};
use crate::payload::decrypt_and_load_package2_payloads;
use crate::{SecmonBootStatus, SecmonEnv};

/// Result of a successful package2 load.
#[derive(Clone, Copy, Debug)]
pub struct LoadedPackage2 {
    /// Authenticated, decrypted metadata.
    pub meta: Package2Meta,
    /// Entrypoint, relative to the start of the payload region.
    pub entrypoint: u32,
    /// Whether the payloads were run through the cipher.
    pub encrypted: bool,
}

pub struct Package2LoadFlow {}

impl Package2LoadFlow {
    /// Loads `image` into `payload_region`.
    ///
    /// Returns only when the image is authentic and well formed; every
    /// failure ends in the environment's fatal error handler.
    pub fn run(env: &mut SecmonEnv, image: &[u8], payload_region: &mut [u8]) -> LoadedPackage2 {
        env.platform
            .wait_for_bootloader(BootloaderState::LoadedPackage2);
        montime::println!("[secmon] Loading package2");
        env.platform
            .set_boot_checkpoint(SecmonBootStatus::Package2Available.into());

        let Some(header_bytes) = image.get(..HEADER_SIZE) else {
            env.fatal.fatal_error(
                SecmonError::BOOT_PACKAGE2_IMAGE_TRUNCATED,
                "package2 image shorter than header",
            );
        };
        env.platform.make_coherent(header_bytes);
        let mut header = Package2Header::new_zeroed();
        header.as_mut_bytes().copy_from_slice(header_bytes);
        env.platform
            .set_boot_checkpoint(SecmonBootStatus::Package2HeaderLoaded.into());

        env.boot_config.update_for_package2_header(&header);
        let signed_data = &env.boot_config.boot_config().signed_data;
        let verify = !signed_data.is_package2_signature_verification_disabled();
        let encrypted = !signed_data.is_package2_encryption_disabled();

        verify_package2_header_signature(env.trust, &mut *env.fatal, &header, verify);
        env.platform
            .set_boot_checkpoint(SecmonBootStatus::Package2SignatureVerified.into());

        let mut meta = Package2Meta::new_zeroed();
        decrypt_package2_header(env.trust, &mut *env.fatal, &mut meta, &header.meta, encrypted);
        env.platform
            .set_boot_checkpoint(SecmonBootStatus::Package2MetaDecrypted.into());

        verify_package2_header(&mut *env.fatal, &meta, &env.config.package2);
        env.platform
            .set_boot_checkpoint(SecmonBootStatus::Package2MetaVerified.into());
        montime::println!(
            "[secmon] Package2 version {} size {}",
            meta.package2_version,
            HexWord(meta.size())
        );

        let Some(payload_bytes) = image.get(HEADER_SIZE..meta.size() as usize) else {
            env.fatal.fatal_error(
                SecmonError::BOOT_PACKAGE2_IMAGE_TRUNCATED,
                "package2 image shorter than declared size",
            );
        };
        env.platform.make_coherent(payload_bytes);
        decrypt_and_load_package2_payloads(
            env.trust,
            &mut *env.fatal,
            payload_region,
            &meta,
            payload_bytes,
            encrypted,
        );
        montime::flush_data_cache(payload_region);
        montime::data_synchronization_barrier_inner_shareable();
        env.platform
            .set_boot_checkpoint(SecmonBootStatus::Package2PayloadsLoaded.into());

        let entrypoint = meta.entrypoint.get();
        montime::println!("[secmon] Package2 loaded, entrypoint {}", HexWord(entrypoint));

        LoadedPackage2 {
            meta,
            entrypoint,
            encrypted,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{expect_halt, PanicHandler, XorAnchor};
    use crate::BootPlatform;
    use secmon_config::SecmonConfig;
    use secmon_pkg1::BOOT_CONFIG_SIZE;
    use secmon_pkg2::{PayloadDescriptor, IV_SIZE, MAGIC, META_SIZE, SIGNATURE_SIZE};
    use std::vec::Vec;

    struct NullPlatform;

    impl BootPlatform for NullPlatform {
        fn wait_for_bootloader(&mut self, _state: BootloaderState) {}
        fn set_boot_checkpoint(&mut self, _checkpoint: u16) {}
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Checkpoint(u16),
        Coherent {
            addr: usize,
            len: usize,
            decrypts: usize,
        },
    }

    /// Records checkpoints and coherence requests, noting how many cipher
    /// calls had been made when each range was made coherent.
    struct CoherencePlatform<'a> {
        anchor: &'a XorAnchor,
        events: Vec<Event>,
    }

    impl BootPlatform for CoherencePlatform<'_> {
        fn wait_for_bootloader(&mut self, _state: BootloaderState) {}

        fn set_boot_checkpoint(&mut self, checkpoint: u16) {
            self.events.push(Event::Checkpoint(checkpoint));
        }

        fn make_coherent(&mut self, buf: &[u8]) {
            self.events.push(Event::Coherent {
                addr: buf.as_ptr() as usize,
                len: buf.len(),
                decrypts: self.anchor.calls.borrow().len(),
            });
        }
    }

    /// Plaintext image with an all-zero signature and two payloads.
    fn plaintext_image() -> Vec<u8> {
        let mut header = Package2Header::new_zeroed();
        let meta = &mut header.meta;
        meta.magic = MAGIC;
        meta.entrypoint.set(0x20);
        meta.package2_version = 1;
        meta.set_key_generation(0);
        meta.set_payload(
            0,
            &PayloadDescriptor {
                offset: 0x100,
                size: 0x10,
                iv: [0x10; IV_SIZE],
            },
        );
        meta.set_payload(
            1,
            &PayloadDescriptor {
                offset: 0,
                size: 0x40,
                iv: [0x20; IV_SIZE],
            },
        );
        meta.set_size((HEADER_SIZE + 0x50) as u32);

        let mut image = header.as_bytes().to_vec();
        image.extend((0..0x50u8).map(|b| b.wrapping_mul(3)));
        image
    }

    /// `plaintext_image` with its metadata run through the test cipher and a
    /// signature that does not look like a plaintext marker.
    fn encrypted_image() -> Vec<u8> {
        let mut image = plaintext_image();
        image[0] = 0x01;
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&image[SIGNATURE_SIZE..SIGNATURE_SIZE + IV_SIZE]);
        for i in IV_SIZE..META_SIZE {
            image[SIGNATURE_SIZE + i] ^= XorAnchor::keystream(&iv, 0, i);
        }
        image
    }

    #[test]
    fn test_payload_source_coherent_before_read() {
        let anchor = XorAnchor::new();
        let mut platform = CoherencePlatform {
            anchor: &anchor,
            events: Vec::new(),
        };
        let mut fatal = PanicHandler;
        let image = encrypted_image();
        let mut region = [0u8; 0x200];

        let mut env = SecmonEnv::new(
            &anchor,
            &mut platform,
            &mut fatal,
            SecmonConfig::default(),
            &[0u8; BOOT_CONFIG_SIZE],
        );
        let loaded = Package2LoadFlow::run(&mut env, &image, &mut region);
        drop(env);

        assert!(loaded.encrypted);
        // Header decrypt plus three payloads.
        assert_eq!(anchor.calls.borrow().len(), 4);

        let base = image.as_ptr() as usize;
        let header_loaded = u16::from(SecmonBootStatus::Package2HeaderLoaded);
        let meta_verified = u16::from(SecmonBootStatus::Package2MetaVerified);
        let payloads_loaded = u16::from(SecmonBootStatus::Package2PayloadsLoaded);
        let position = |event: &Event| platform.events.iter().position(|e| e == event).unwrap();

        let header = Event::Coherent {
            addr: base,
            len: HEADER_SIZE,
            decrypts: 0,
        };
        let payloads = Event::Coherent {
            addr: base + HEADER_SIZE,
            len: 0x50,
            decrypts: 1,
        };
        assert!(position(&header) < position(&Event::Checkpoint(header_loaded)));
        assert!(position(&Event::Checkpoint(meta_verified)) < position(&payloads));
        assert!(position(&payloads) < position(&Event::Checkpoint(payloads_loaded)));
    }

    #[test]
    fn test_plaintext_image_is_copied() {
        let anchor = XorAnchor::new();
        let mut platform = NullPlatform;
        let mut fatal = PanicHandler;
        let image = plaintext_image();
        let mut region = [0u8; 0x200];

        let mut env = SecmonEnv::new(
            &anchor,
            &mut platform,
            &mut fatal,
            SecmonConfig::default(),
            &[0u8; BOOT_CONFIG_SIZE],
        );
        let loaded = Package2LoadFlow::run(&mut env, &image, &mut region);

        assert!(!loaded.encrypted);
        assert_eq!(loaded.entrypoint, 0x20);
        assert!(env.boot_config.boot_config().signed_data.is_package2_decrypted());
        assert_eq!(&region[0x100..0x110], &image[HEADER_SIZE..HEADER_SIZE + 0x10]);
        assert_eq!(&region[0..0x40], &image[HEADER_SIZE + 0x10..HEADER_SIZE + 0x50]);
        assert!(anchor.calls.borrow().is_empty());
    }

    #[test]
    fn test_image_shorter_than_declared_size() {
        let anchor = XorAnchor::new();
        let mut platform = NullPlatform;
        let mut fatal = PanicHandler;
        let image = plaintext_image();
        let mut region = [0u8; 0x200];

        let mut env = SecmonEnv::new(
            &anchor,
            &mut platform,
            &mut fatal,
            SecmonConfig::default(),
            &[0u8; BOOT_CONFIG_SIZE],
        );
        let halted = expect_halt(|| {
            Package2LoadFlow::run(&mut env, &image[..image.len() - 1], &mut region);
        });
        assert_eq!(halted.error, SecmonError::BOOT_PACKAGE2_IMAGE_TRUNCATED);
        assert!(region.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_image_shorter_than_header() {
        let anchor = XorAnchor::new();
        let mut platform = NullPlatform;
        let mut fatal = PanicHandler;
        let mut region = [0u8; 0x10];

        let mut env = SecmonEnv::new(
            &anchor,
            &mut platform,
            &mut fatal,
            SecmonConfig::default(),
            &[0u8; BOOT_CONFIG_SIZE],
        );
        let halted = expect_halt(|| {
            Package2LoadFlow::run(&mut env, &[0u8; HEADER_SIZE - 1], &mut region);
        });
        assert_eq!(halted.message, "package2 image shorter than header");
    }
}
