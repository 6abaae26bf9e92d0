/*++

Licensed under the Apache-2.0 license.

File Name:

    crypto.rs

Abstract:

    Software package2 cipher backed by the RustCrypto AES-128-CTR
    implementation.

--*/

use ctr::cipher::{KeyIvInit, StreamCipher};
use secmon_error::{SecmonError, SecmonResult};
use secmon_pkg2::{KeyGeneration, IV_SIZE, KEY_GENERATION_COUNT};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Package2Cipher;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

pub const PACKAGE2_KEY_SIZE: usize = 0x10;

/// Package2 cipher holding one AES-128 key per key generation.
///
/// Keys are wiped on drop. Decrypting with a generation whose key was never
/// provisioned is an error.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SoftwarePackage2Cipher {
    keys: [[u8; PACKAGE2_KEY_SIZE]; KEY_GENERATION_COUNT],
    provisioned: u32,
}

impl SoftwarePackage2Cipher {
    pub fn new() -> Self {
        Self {
            keys: [[0; PACKAGE2_KEY_SIZE]; KEY_GENERATION_COUNT],
            provisioned: 0,
        }
    }

    pub fn set_key(&mut self, key_generation: KeyGeneration, key: &[u8; PACKAGE2_KEY_SIZE]) {
        self.keys[key_generation.index()] = *key;
        self.provisioned |= 1 << key_generation.index();
    }
}

impl Default for SoftwarePackage2Cipher {
    fn default() -> Self {
        Self::new()
    }
}

impl Package2Cipher for SoftwarePackage2Cipher {
    fn decrypt(
        &self,
        dst: &mut [u8],
        src: &[u8],
        iv: &[u8; IV_SIZE],
        key_generation: KeyGeneration,
    ) -> SecmonResult<()> {
        if self.provisioned & (1 << key_generation.index()) == 0 {
            Err(SecmonError::BOOT_PACKAGE2_DECRYPT_FAILURE)?;
        }
        let key = &self.keys[key_generation.index()];
        let mut cipher = Aes128Ctr::new(key.into(), iv.into());
        cipher
            .apply_keystream_b2b(src, dst)
            .map_err(|_| SecmonError::BOOT_PACKAGE2_DECRYPT_FAILURE)
    }
}
