// Licensed under the Apache-2.0 license

//! Hardware capabilities the boot flow consumes but does not implement.
//!
//! A platform provides one object implementing all of these; tests provide
//! deterministic fakes.

use secmon_error::SecmonResult;
use secmon_pkg1::ECID_SIZE;
use secmon_pkg2::{KeyGeneration, IV_SIZE};

/// Production fuse state.
pub trait FuseState {
    /// Whether this is a shipped (production-fused) unit.
    fn is_production(&self) -> bool;

    /// Whether package2 must verify against the production public key.
    fn is_production_for_public_key(&self) -> bool;
}

pub trait DeviceIdentity {
    /// Hardware-burned identifier of this physical unit.
    fn device_unique_id(&self) -> [u8; ECID_SIZE];
}

/// Which package2 public key a header is checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Package2KeySet {
    Production,
    Development,
}

pub trait PublicModuli {
    fn boot_config_modulus(&self) -> &[u8];
    fn package2_modulus(&self, key_set: Package2KeySet) -> &[u8];
}

pub trait SignatureVerifier {
    /// Verifies an RSA signature over `message` with the public `modulus`.
    fn verify_signature(&self, signature: &[u8], message: &[u8], modulus: &[u8]) -> bool;
}

/// Keyed decrypt primitive for package2 data.
pub trait Package2Cipher {
    /// Decrypts `src` into `dst` with the key selected by `key_generation`.
    ///
    /// `dst` and `src` must be the same length. Any error is a platform fault.
    fn decrypt(
        &self,
        dst: &mut [u8],
        src: &[u8],
        iv: &[u8; IV_SIZE],
        key_generation: KeyGeneration,
    ) -> SecmonResult<()>;
}

/// Every capability the boot flow needs from the root of trust.
pub trait TrustAnchor:
    FuseState + DeviceIdentity + PublicModuli + SignatureVerifier + Package2Cipher
{
}

impl<T> TrustAnchor for T where
    T: FuseState + DeviceIdentity + PublicModuli + SignatureVerifier + Package2Cipher
{
}
