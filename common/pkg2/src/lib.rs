// Licensed under the Apache-2.0 license

//! Package2 image layout.
//!
//! A package2 image is a `Package2Header` (signature followed by metadata)
//! immediately followed by `PAYLOAD_COUNT` payloads stored back to back in
//! declaration order.

#![cfg_attr(not(test), no_std)]

use core::mem::size_of;

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const PAYLOAD_COUNT: usize = 3;
pub const IV_SIZE: usize = 0x10;
pub const SIGNATURE_SIZE: usize = 0x100;
pub const META_SIZE: usize = 0x100;
pub const HEADER_SIZE: usize = SIGNATURE_SIZE + META_SIZE;
pub const PAYLOAD_HASH_SIZE: usize = 0x20;
pub const PAYLOAD_ALIGNMENT: u32 = 4;
pub const MAGIC: [u8; 4] = *b"PK21";

/// Width of the key rotation ladder.
pub const KEY_GENERATION_COUNT: usize = 0x20;

/// Index selecting one key of the package2 key ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyGeneration(u8);

impl KeyGeneration {
    pub const fn new(raw: u8) -> Option<Self> {
        if (raw as usize) < KEY_GENERATION_COUNT {
            Some(KeyGeneration(raw))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Placement of one payload segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadDescriptor {
    /// Offset into the destination region.
    pub offset: u32,
    pub size: u32,
    pub iv: [u8; IV_SIZE],
}

impl PayloadDescriptor {
    /// End of the segment in the destination region, or `None` on overflow.
    pub fn end(&self) -> Option<u32> {
        self.offset.checked_add(self.size)
    }

    pub fn overlaps(&self, other: &PayloadDescriptor) -> bool {
        if self.size == 0 || other.size == 0 {
            return false;
        }
        let (Some(self_end), Some(other_end)) = (self.end(), other.end()) else {
            return true;
        };
        self.offset < other_end && other.offset < self_end
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Package2Meta {
    /// Plaintext prefix. Serves as the header IV and carries the obfuscated
    /// image size (bytes 0..4) and key generation (byte 4).
    pub header_iv: [u8; IV_SIZE],
    pub payload_ivs: [[u8; IV_SIZE]; PAYLOAD_COUNT],
    pub padding_40: [u8; 0x10],
    pub magic: [u8; 4],
    pub entrypoint: U32<LittleEndian>,
    pub reserved_58: u8,
    pub package2_version: u8,
    pub bootloader_version: u8,
    pub padding_5b: u8,
    pub reserved_5c: U32<LittleEndian>,
    pub payload_sizes: [U32<LittleEndian>; PAYLOAD_COUNT],
    pub padding_6c: U32<LittleEndian>,
    pub payload_offsets: [U32<LittleEndian>; PAYLOAD_COUNT],
    pub padding_7c: U32<LittleEndian>,
    pub payload_hashes: [[u8; PAYLOAD_HASH_SIZE]; PAYLOAD_COUNT],
    pub padding_e0: [u8; 0x20],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Package2Header {
    pub signature: [u8; SIGNATURE_SIZE],
    pub meta: Package2Meta,
}

const _: () = assert!(size_of::<Package2Meta>() == META_SIZE);
const _: () = assert!(size_of::<Package2Header>() == HEADER_SIZE);

fn load_le32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

impl Package2Meta {
    /// Raw key generation, decoded from the plaintext prefix.
    pub fn key_generation(&self) -> u8 {
        let iv = &self.header_iv;
        (iv[4] ^ iv[6] ^ iv[7]).saturating_sub(1)
    }

    /// Total image size (header plus payloads), decoded from the plaintext prefix.
    pub fn size(&self) -> u32 {
        let iv = &self.header_iv;
        load_le32(&iv[0..4]) ^ load_le32(&iv[8..12]) ^ load_le32(&iv[12..16])
    }

    /// Encodes `key_generation` into the prefix without disturbing the encoded size.
    pub fn set_key_generation(&mut self, key_generation: u8) {
        let iv = &mut self.header_iv;
        iv[4] = key_generation.wrapping_add(1) ^ iv[6] ^ iv[7];
    }

    /// Encodes `size` into the prefix without disturbing the encoded key generation.
    pub fn set_size(&mut self, size: u32) {
        let mask = load_le32(&self.header_iv[8..12]) ^ load_le32(&self.header_iv[12..16]);
        self.header_iv[0..4].copy_from_slice(&(size ^ mask).to_le_bytes());
    }

    pub fn is_magic_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn payload(&self, index: usize) -> PayloadDescriptor {
        PayloadDescriptor {
            offset: self.payload_offsets[index].get(),
            size: self.payload_sizes[index].get(),
            iv: self.payload_ivs[index],
        }
    }

    pub fn payloads(&self) -> [PayloadDescriptor; PAYLOAD_COUNT] {
        core::array::from_fn(|i| self.payload(i))
    }

    pub fn set_payload(&mut self, index: usize, payload: &PayloadDescriptor) {
        self.payload_offsets[index].set(payload.offset);
        self.payload_sizes[index].set(payload.size);
        self.payload_ivs[index] = payload.iv;
    }
}
