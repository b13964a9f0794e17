//! Per-session result encryption.
//!
//! The key is derived from the entire raw decoded payload, not just the
//! password, so the ciphertext is bound to exactly the frame that was
//! demodulated. The receiving side derives the same key from the payload it
//! transmitted. Counter-mode only, no authentication tag: the key lives for
//! one short session and the result message carries no secrets beyond the
//! device address.

use aes::Aes128;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ctr::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest, Sha256};

use crate::error::Result;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// First 16 bytes of the SHA-256 digest of the raw payload.
pub fn derive_key(raw_payload: &[u8]) -> [u8; 16] {
    let digest = Sha256::digest(raw_payload);
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

/// 128-bit big-endian counter block with initial value `channel`.
fn counter_block(channel: u16) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[14..].copy_from_slice(&channel.to_be_bytes());
    block
}

/// Encrypt `plaintext` with AES-128-CTR and encode the ciphertext as base64.
/// Deterministic for fixed inputs: the counter is the channel id, there is
/// no random nonce.
pub fn encrypt(channel: u16, key_material: &[u8], plaintext: &[u8]) -> String {
    let key = derive_key(key_material);
    let mut buf = plaintext.to_vec();
    let mut cipher = Aes128Ctr::new(&key.into(), &counter_block(channel).into());
    cipher.apply_keystream(&mut buf);
    BASE64.encode(buf)
}

/// Inverse of [`encrypt`]; what the subscriber on the result topic runs.
pub fn decrypt(channel: u16, key_material: &[u8], encoded: &str) -> Result<Vec<u8>> {
    let mut buf = BASE64.decode(encoded)?;
    let key = derive_key(key_material);
    let mut cipher = Aes128Ctr::new(&key.into(), &counter_block(channel).into());
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}
