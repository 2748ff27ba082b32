//! Laravel-compatible cookie decryption.
//!
//! A cookie value is `base64(json({iv, value, mac}))` where `value` is
//! AES-256-CBC ciphertext and `mac` is hex HMAC-SHA256 over `iv ‖ value`
//! (both as their base64 text).

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use sha2::Sha256;

use relay_core::error::AppError;
use relay_core::result::AppResult;

use crate::compare::constant_time_eq;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_LEN: usize = 32;

/// Hex HMAC-SHA1 plus the `|` separator.
const COOKIE_PREFIX_LEN: usize = 41;

#[derive(Debug, Deserialize)]
struct EncryptedPayload {
    iv: String,
    value: String,
    mac: String,
}

/// Decrypts values encrypted with the shared application key.
#[derive(Clone)]
pub struct Encrypter {
    key: Vec<u8>,
}

impl std::fmt::Debug for Encrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encrypter").finish_non_exhaustive()
    }
}

impl Encrypter {
    /// Builds an encrypter from an application key, either
    /// `base64:<32 bytes>` or 32 raw bytes.
    pub fn from_app_key(app_key: &str) -> AppResult<Self> {
        let key = match app_key.strip_prefix("base64:") {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map_err(|e| AppError::configuration(format!("App key is not valid base64: {e}")))?,
            None => app_key.as_bytes().to_vec(),
        };

        if key.len() != KEY_LEN {
            return Err(AppError::configuration(format!(
                "App key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        Ok(Self { key })
    }

    /// Authenticates and decrypts an encoded cookie value.
    pub fn decrypt_cookie(&self, encoded: &str) -> Result<Vec<u8>, AuthError> {
        let json = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::Malformed(format!("cookie is not base64: {e}")))?;
        let payload: EncryptedPayload = serde_json::from_slice(&json)
            .map_err(|e| AuthError::Malformed(format!("cookie payload is missing fields: {e}")))?;

        self.verify_mac(&payload)?;
        self.decrypt(&payload)
    }

    /// Verifies and strips the `hmac_sha1(cookie_name + "v2")|` prefix
    /// when present. Values without a prefix are returned unchanged.
    pub fn strip_cookie_prefix<'a>(
        &self,
        cookie_name: &str,
        plaintext: &'a [u8],
    ) -> Result<&'a [u8], AuthError> {
        if plaintext.len() <= COOKIE_PREFIX_LEN || plaintext[COOKIE_PREFIX_LEN - 1] != b'|' {
            return Ok(plaintext);
        }

        let (prefix, rest) = plaintext.split_at(COOKIE_PREFIX_LEN);
        let expected = self.cookie_prefix(cookie_name)?;
        if !constant_time_eq(prefix, expected.as_bytes()) {
            return Err(AuthError::Integrity("cookie prefix does not match".to_string()));
        }
        Ok(rest)
    }

    /// The prefix the web application prepends to `cookie_name` values.
    pub fn cookie_prefix(&self, cookie_name: &str) -> Result<String, AuthError> {
        let mut mac = <HmacSha1 as Mac>::new_from_slice(&self.key)
            .map_err(|_| AuthError::Malformed("invalid HMAC key".to_string()))?;
        mac.update(cookie_name.as_bytes());
        mac.update(b"v2");
        Ok(format!("{}|", hex::encode(mac.finalize().into_bytes())))
    }

    fn verify_mac(&self, payload: &EncryptedPayload) -> Result<(), AuthError> {
        let reference = hex::decode(&payload.mac)
            .map_err(|_| AuthError::Integrity("mac is not hex".to_string()))?;

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|_| AuthError::Malformed("invalid HMAC key".to_string()))?;
        mac.update(payload.iv.as_bytes());
        mac.update(payload.value.as_bytes());
        let computed = mac.finalize().into_bytes();

        if !constant_time_eq(&computed, &reference) {
            return Err(AuthError::Integrity("mac does not match".to_string()));
        }
        Ok(())
    }

    fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, AuthError> {
        let iv = STANDARD
            .decode(&payload.iv)
            .map_err(|e| AuthError::Malformed(format!("iv is not base64: {e}")))?;
        let ciphertext = STANDARD
            .decode(&payload.value)
            .map_err(|e| AuthError::Malformed(format!("value is not base64: {e}")))?;

        let decryptor = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|_| AuthError::Malformed(format!("iv has invalid length {}", iv.len())))?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| AuthError::Integrity("could not decrypt value".to_string()))
    }
}
