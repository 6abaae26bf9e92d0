// Licensed under the Apache-2.0 license

use secmon_boot::{Package2Cipher, Package2KeySet};
use secmon_pkg1::{BootConfig, BOOT_CONFIG_SIZE, ECID_SIZE};
use secmon_pkg2::{
    KeyGeneration, Package2Header, Package2Meta, PayloadDescriptor, IV_SIZE, HEADER_SIZE, MAGIC,
    PAYLOAD_COUNT, SIGNATURE_SIZE,
};
use zerocopy::{FromZeros, IntoBytes};

use crate::FakeTrustAnchor;

const HEADER_IV_SEED: [u8; IV_SIZE] = [
    0x3c, 0x91, 0x5e, 0x07, 0x00, 0x6a, 0xd2, 0x48, 0x1f, 0xb3, 0x84, 0x29, 0xe6, 0x70, 0xcd, 0x15,
];

/// How the built header is signed.
#[derive(Clone, Copy, Debug)]
pub enum Package2Signing {
    Key(Package2KeySet),
    Raw([u8; SIGNATURE_SIZE]),
}

#[derive(Clone, Debug)]
struct BuilderPayload {
    offset: u32,
    data: Vec<u8>,
    iv: [u8; IV_SIZE],
}

/// Builds package2 images the way the packaging tools lay them out.
#[derive(Clone, Debug)]
pub struct Package2Builder {
    payloads: [BuilderPayload; PAYLOAD_COUNT],
    entrypoint: u32,
    package2_version: u8,
    bootloader_version: u8,
    key_generation: u8,
    encrypted: bool,
    signing: Package2Signing,
    declared_size: Option<u32>,
}

impl Package2Builder {
    /// Encrypted image, development-signed, with a kernel and an ini payload.
    pub fn new() -> Self {
        Self {
            payloads: [
                BuilderPayload {
                    offset: 0,
                    data: (0..0x100u32).map(|i| (i * 7) as u8).collect(),
                    iv: [0x01; IV_SIZE],
                },
                BuilderPayload {
                    offset: 0x1000,
                    data: (0..0x40u32).map(|i| (i ^ 0x5a) as u8).collect(),
                    iv: [0x02; IV_SIZE],
                },
                BuilderPayload {
                    offset: 0,
                    data: Vec::new(),
                    iv: [0x03; IV_SIZE],
                },
            ],
            entrypoint: 0,
            package2_version: 1,
            bootloader_version: 0,
            key_generation: 1,
            encrypted: true,
            signing: Package2Signing::Key(Package2KeySet::Development),
            declared_size: None,
        }
    }

    pub fn payload(mut self, index: usize, offset: u32, data: &[u8]) -> Self {
        self.payloads[index].offset = offset;
        self.payloads[index].data = data.to_vec();
        self
    }

    pub fn entrypoint(mut self, entrypoint: u32) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    pub fn package2_version(mut self, version: u8) -> Self {
        self.package2_version = version;
        self
    }

    pub fn bootloader_version(mut self, version: u8) -> Self {
        self.bootloader_version = version;
        self
    }

    pub fn key_generation(mut self, key_generation: u8) -> Self {
        self.key_generation = key_generation;
        self
    }

    /// Leaves header and payloads unencrypted.
    pub fn plaintext(mut self) -> Self {
        self.encrypted = false;
        self
    }

    pub fn signing(mut self, signing: Package2Signing) -> Self {
        self.signing = signing;
        self
    }

    /// Overrides the size encoded in the header.
    pub fn declared_size(mut self, size: u32) -> Self {
        self.declared_size = Some(size);
        self
    }

    /// Plaintext payload bytes as they should appear in the payload region.
    pub fn payload_data(&self, index: usize) -> &[u8] {
        &self.payloads[index].data
    }

    pub fn payload_offset(&self, index: usize) -> u32 {
        self.payloads[index].offset
    }

    /// Plaintext metadata as the monitor should see it after decryption.
    pub fn meta(&self) -> Package2Meta {
        let mut meta = Package2Meta::new_zeroed();
        meta.header_iv = HEADER_IV_SEED;
        meta.set_key_generation(self.key_generation);
        meta.magic = MAGIC;
        meta.entrypoint.set(self.entrypoint);
        meta.package2_version = self.package2_version;
        meta.bootloader_version = self.bootloader_version;
        for (index, payload) in self.payloads.iter().enumerate() {
            meta.set_payload(
                index,
                &PayloadDescriptor {
                    offset: payload.offset,
                    size: payload.data.len() as u32,
                    iv: payload.iv,
                },
            );
        }
        let payload_size: usize = self.payloads.iter().map(|p| p.data.len()).sum();
        meta.set_size(
            self.declared_size
                .unwrap_or((HEADER_SIZE + payload_size) as u32),
        );
        meta
    }

    /// Produces the image bytes, encrypting with `anchor`'s keys.
    pub fn build(&self, anchor: &FakeTrustAnchor) -> Vec<u8> {
        let plain = self.meta();
        let mut header = Package2Header::new_zeroed();

        let key_generation = KeyGeneration::new(self.key_generation);
        match key_generation {
            Some(key_generation) if self.encrypted => {
                // CTR is symmetric; the cipher's decrypt doubles as encrypt.
                anchor
                    .cipher
                    .decrypt(
                        header.meta.as_mut_bytes(),
                        plain.as_bytes(),
                        &plain.header_iv,
                        key_generation,
                    )
                    .expect("header encryption");
                header.meta.header_iv = plain.header_iv;
            }
            _ => header.meta = plain,
        }

        header.signature = match self.signing {
            Package2Signing::Key(key_set) => anchor.sign_package2(header.meta.as_bytes(), key_set),
            Package2Signing::Raw(signature) => signature,
        };

        let mut image = header.as_bytes().to_vec();
        for payload in self.payloads.iter() {
            match key_generation {
                Some(key_generation) if self.encrypted => {
                    let mut out = vec![0u8; payload.data.len()];
                    anchor
                        .cipher
                        .decrypt(&mut out, &payload.data, &payload.iv, key_generation)
                        .expect("payload encryption");
                    image.extend_from_slice(&out);
                }
                _ => image.extend_from_slice(&payload.data),
            }
        }
        image
    }
}

impl Default for Package2Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the boot config block the bootloader hands to the monitor.
#[derive(Clone, Debug)]
pub struct BootConfigBuilder {
    device_id: [u8; ECID_SIZE],
    flags1: u8,
    signed: bool,
}

impl BootConfigBuilder {
    pub fn new(device_id: [u8; ECID_SIZE]) -> Self {
        Self {
            device_id,
            flags1: 0,
            signed: true,
        }
    }

    pub fn disable_package2_encryption(mut self) -> Self {
        self.flags1 |= 1 << 0;
        self
    }

    pub fn disable_package2_signature_verification(mut self) -> Self {
        self.flags1 |= 1 << 1;
        self
    }

    /// Leaves the signature zero.
    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    pub fn build(&self, anchor: &FakeTrustAnchor) -> [u8; BOOT_CONFIG_SIZE] {
        let mut config = BootConfig::new_zeroed();
        config.signed_data.ecid = self.device_id;
        config.signed_data.flags1[0] = self.flags1;
        if self.signed {
            config.signature = anchor.sign_boot_config(config.signed_data.as_bytes());
        }

        let mut bytes = [0u8; BOOT_CONFIG_SIZE];
        bytes.copy_from_slice(config.as_bytes());
        bytes
    }
}
