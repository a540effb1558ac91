//! Token encryption at rest.
//!
//! Access tokens are sealed with AES-256-GCM under a key stretched from a
//! fixed passphrase with PBKDF2-HMAC-SHA256. The nonce and tag are kept in
//! their own columns so a row can be inspected without parsing a blob.

use std::num::NonZeroU32;

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::types::credential::EncryptedData;
use crate::types::errors::CryptoError;

const KDF_ROUNDS: u32 = 100_000;
const KEY_BYTES: usize = 32;
const TAG_BYTES: usize = 16;

/// Derived key material, wiped from memory on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn aead(&self) -> Result<LessSafeKey, CryptoError> {
        if self.0.len() != KEY_BYTES {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} key bytes, got {}",
                KEY_BYTES,
                self.0.len()
            )));
        }
        UnboundKey::new(&AES_256_GCM, &self.0)
            .map(LessSafeKey::new)
            .map_err(|_| CryptoError::InvalidKey("rejected by AES-256-GCM".to_string()))
    }
}

/// The operations the credential store needs from a cipher.
pub trait CryptoServiceTrait {
    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<SecretKey, CryptoError>;

    /// Seals `plaintext` under a fresh random nonce.
    fn encrypt_aes256gcm(&self, plaintext: &[u8], key: &SecretKey) -> Result<EncryptedData, CryptoError>;

    /// Opens a sealed record. Fails if the key is wrong or any part was
    /// modified. The plaintext is wiped when the returned buffer drops.
    fn decrypt_aes256gcm(&self, encrypted: &EncryptedData, key: &SecretKey)
        -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    fn generate_random_bytes(&self, length: usize) -> Result<Vec<u8>, CryptoError>;

    /// Seals a UTF-8 token.
    fn seal_token(&self, token: &str, key: &SecretKey) -> Result<EncryptedData, CryptoError> {
        self.encrypt_aes256gcm(token.as_bytes(), key)
    }

    /// Opens a record produced by [`seal_token`](Self::seal_token).
    fn open_token(&self, encrypted: &EncryptedData, key: &SecretKey) -> Result<String, CryptoError> {
        let bytes = self.decrypt_aes256gcm(encrypted, key)?;
        std::str::from_utf8(&bytes)
            .map(str::to_owned)
            .map_err(|e| CryptoError::Decryption(format!("token is not UTF-8: {}", e)))
    }
}

/// [`CryptoServiceTrait`] backed by `ring`.
pub struct CryptoService {
    rng: SystemRandom,
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoService {
    pub fn new() -> Self {
        Self { rng: SystemRandom::new() }
    }

    fn fresh_nonce(&self) -> Result<[u8; NONCE_LEN], CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| CryptoError::RandomGeneration("nonce".to_string()))?;
        Ok(nonce)
    }
}

impl CryptoServiceTrait for CryptoService {
    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<SecretKey, CryptoError> {
        let rounds = NonZeroU32::new(KDF_ROUNDS)
            .ok_or_else(|| CryptoError::KeyDerivation("zero PBKDF2 rounds".to_string()))?;
        let mut out = vec![0u8; KEY_BYTES];
        pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, rounds, salt, passphrase.as_bytes(), &mut out);
        Ok(SecretKey(out))
    }

    fn encrypt_aes256gcm(&self, plaintext: &[u8], key: &SecretKey) -> Result<EncryptedData, CryptoError> {
        let aead = key.aead()?;
        let nonce = self.fresh_nonce()?;

        let mut ciphertext = plaintext.to_vec();
        let tag = aead
            .seal_in_place_separate_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut ciphertext)
            .map_err(|_| CryptoError::Encryption("seal failed".to_string()))?;

        Ok(EncryptedData {
            ciphertext,
            iv: nonce.to_vec(),
            auth_tag: tag.as_ref().to_vec(),
        })
    }

    fn decrypt_aes256gcm(&self, encrypted: &EncryptedData, key: &SecretKey)
        -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let aead = key.aead()?;
        let nonce = Nonce::try_assume_unique_for_key(&encrypted.iv)
            .map_err(|_| CryptoError::Decryption(format!("bad nonce length {}", encrypted.iv.len())))?;
        if encrypted.auth_tag.len() != TAG_BYTES {
            return Err(CryptoError::Decryption(format!(
                "bad tag length {}",
                encrypted.auth_tag.len()
            )));
        }

        let mut buffer = Zeroizing::new([encrypted.ciphertext.as_slice(), encrypted.auth_tag.as_slice()].concat());
        let plain_len = aead
            .open_in_place(nonce, Aad::empty(), buffer.as_mut_slice())
            .map_err(|_| CryptoError::Decryption("wrong key or tampered record".to_string()))?
            .len();
        buffer.truncate(plain_len);
        Ok(buffer)
    }

    fn generate_random_bytes(&self, length: usize) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = vec![0u8; length];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| CryptoError::RandomGeneration("system RNG unavailable".to_string()))?;
        Ok(bytes)
    }
}
