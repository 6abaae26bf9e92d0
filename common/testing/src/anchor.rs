// Licensed under the Apache-2.0 license

use std::cell::RefCell;

use secmon_boot::{
    DeviceIdentity, FuseState, Package2Cipher, Package2KeySet, PublicModuli, SignatureVerifier,
    SoftwarePackage2Cipher, PACKAGE2_KEY_SIZE,
};
use secmon_error::SecmonResult;
use secmon_pkg1::ECID_SIZE;
use secmon_pkg2::{KeyGeneration, IV_SIZE, KEY_GENERATION_COUNT, SIGNATURE_SIZE};
use sha2::{Digest, Sha256};

pub const MODULUS_SIZE: usize = 0x100;
pub const DEFAULT_DEVICE_ID: [u8; ECID_SIZE] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

/// Key installed for `key_generation` by [`FakeTrustAnchor::new`].
pub fn package2_key(key_generation: KeyGeneration) -> [u8; PACKAGE2_KEY_SIZE] {
    core::array::from_fn(|i| (i as u8).wrapping_mul(0x11) ^ key_generation.get() ^ 0xa5)
}

/// One call into the fake cipher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecryptCall {
    pub len: usize,
    pub key_generation: u8,
}

/// Trust anchor for host tests.
///
/// Signatures are a stand-in scheme: SHA-256 of modulus and message,
/// repeated to fill the signature. Package2 decryption is real AES-128-CTR.
pub struct FakeTrustAnchor {
    pub production: bool,
    pub production_for_public_key: bool,
    pub device_id: [u8; ECID_SIZE],
    pub boot_config_modulus: [u8; MODULUS_SIZE],
    pub production_modulus: [u8; MODULUS_SIZE],
    pub development_modulus: [u8; MODULUS_SIZE],
    pub cipher: SoftwarePackage2Cipher,
    pub decrypt_calls: RefCell<Vec<DecryptCall>>,
}

impl FakeTrustAnchor {
    /// Development unit with every key generation provisioned.
    pub fn new() -> Self {
        let mut cipher = SoftwarePackage2Cipher::new();
        for raw in 0..KEY_GENERATION_COUNT as u8 {
            if let Some(key_generation) = KeyGeneration::new(raw) {
                cipher.set_key(key_generation, &package2_key(key_generation));
            }
        }
        Self {
            production: false,
            production_for_public_key: false,
            device_id: DEFAULT_DEVICE_ID,
            boot_config_modulus: [0xb0; MODULUS_SIZE],
            production_modulus: [0xa0; MODULUS_SIZE],
            development_modulus: [0xd0; MODULUS_SIZE],
            cipher,
            decrypt_calls: RefCell::new(Vec::new()),
        }
    }

    /// Retail unit: boot config ignored, production key enforced.
    pub fn production() -> Self {
        Self {
            production: true,
            production_for_public_key: true,
            ..Self::new()
        }
    }

    pub fn sign(&self, message: &[u8], modulus: &[u8]) -> [u8; SIGNATURE_SIZE] {
        let digest = Sha256::new()
            .chain_update(modulus)
            .chain_update(message)
            .finalize();
        let mut signature = [0u8; SIGNATURE_SIZE];
        for chunk in signature.chunks_mut(digest.len()) {
            chunk.copy_from_slice(&digest[..chunk.len()]);
        }
        signature
    }

    pub fn sign_package2(&self, message: &[u8], key_set: Package2KeySet) -> [u8; SIGNATURE_SIZE] {
        self.sign(message, self.package2_modulus(key_set))
    }

    pub fn sign_boot_config(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.sign(message, &self.boot_config_modulus)
    }
}

impl Default for FakeTrustAnchor {
    fn default() -> Self {
        Self::new()
    }
}

impl FuseState for FakeTrustAnchor {
    fn is_production(&self) -> bool {
        self.production
    }

    fn is_production_for_public_key(&self) -> bool {
        self.production_for_public_key
    }
}

impl DeviceIdentity for FakeTrustAnchor {
    fn device_unique_id(&self) -> [u8; ECID_SIZE] {
        self.device_id
    }
}

impl PublicModuli for FakeTrustAnchor {
    fn boot_config_modulus(&self) -> &[u8] {
        &self.boot_config_modulus
    }

    fn package2_modulus(&self, key_set: Package2KeySet) -> &[u8] {
        match key_set {
            Package2KeySet::Production => &self.production_modulus,
            Package2KeySet::Development => &self.development_modulus,
        }
    }
}

impl SignatureVerifier for FakeTrustAnchor {
    fn verify_signature(&self, signature: &[u8], message: &[u8], modulus: &[u8]) -> bool {
        signature == self.sign(message, modulus)
    }
}

impl Package2Cipher for FakeTrustAnchor {
    fn decrypt(
        &self,
        dst: &mut [u8],
        src: &[u8],
        iv: &[u8; IV_SIZE],
        key_generation: KeyGeneration,
    ) -> SecmonResult<()> {
        self.decrypt_calls.borrow_mut().push(DecryptCall {
            len: src.len(),
            key_generation: key_generation.get(),
        });
        self.cipher.decrypt(dst, src, iv, key_generation)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_signature_bound_to_modulus() {
        let anchor = FakeTrustAnchor::new();
        let signature = anchor.sign_package2(b"meta", Package2KeySet::Development);
        assert!(anchor.verify_signature(&signature, b"meta", &anchor.development_modulus));
        assert!(!anchor.verify_signature(&signature, b"meta", &anchor.production_modulus));
        assert!(!anchor.verify_signature(&signature, b"metb", &anchor.development_modulus));
    }
}
