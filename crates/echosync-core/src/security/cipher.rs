//! AES-256-GCM encryption for individual credentials.
//!
//! Each value is encrypted with a fresh random nonce and stored as
//! `ivHex:cipherHex`. The 256-bit key lives hex-encoded in a key file that is
//! created on first use.

use std::fs;
use std::path::Path;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use tracing::{error, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{SecurityError, SecurityResult};

/// AES-256 key length in bytes.
const KEY_LENGTH: usize = 32;

/// Nonce length for AES-GCM.
const NONCE_LENGTH: usize = 12;

/// Encryption key wrapper that zeroizes on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct EncryptionKey {
    bytes: [u8; KEY_LENGTH],
}

impl EncryptionKey {
    fn random() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        Self { bytes }
    }

    fn from_hex(encoded: &str) -> SecurityResult<Self> {
        let mut decoded =
            hex::decode(encoded.trim()).map_err(|e| SecurityError::InvalidKey(e.to_string()))?;
        if decoded.len() != KEY_LENGTH {
            let len = decoded.len();
            decoded.zeroize();
            return Err(SecurityError::InvalidKey(format!(
                "expected {} bytes, found {}",
                KEY_LENGTH, len
            )));
        }
        let mut bytes = [0u8; KEY_LENGTH];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }
}

/// Encrypts and decrypts credential values with one symmetric key.
pub struct CredentialCipher {
    key: EncryptionKey,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Creates a cipher with a fresh in-memory key.
    #[must_use]
    pub fn generate() -> Self {
        Self { key: EncryptionKey::random() }
    }

    /// Loads the key from `key_path`, or generates and persists a new one when
    /// the file is missing or does not hold a valid key.
    ///
    /// # Errors
    ///
    /// Returns an error if a new key cannot be written.
    pub fn load_or_create(key_path: &Path) -> SecurityResult<Self> {
        if key_path.exists() {
            match fs::read_to_string(key_path)
                .map_err(SecurityError::from)
                .and_then(|contents| EncryptionKey::from_hex(&contents))
            {
                Ok(key) => return Ok(Self { key }),
                Err(e) => {
                    warn!(path = %key_path.display(), error = %e, "Encryption key unusable, regenerating");
                }
            }
        }

        let cipher = Self::generate();
        cipher.save_key(key_path)?;
        info!(path = %key_path.display(), "Generated new encryption key");
        Ok(cipher)
    }

    /// Writes the key hex-encoded with 0600 permissions.
    fn save_key(&self, key_path: &Path) -> SecurityResult<()> {
        if let Some(dir) = key_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let mut encoded = hex::encode(self.key.bytes);
        let written = fs::write(key_path, encoded.as_bytes());
        encoded.zeroize();
        written?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(key_path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key.bytes))
    }

    /// Encrypts `plaintext` into `ivHex:cipherHex`.
    ///
    /// Returns `None` (after logging) if encryption fails.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> Option<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        match self.cipher().encrypt(&nonce, plaintext.as_bytes()) {
            Ok(ciphertext) => Some(format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext))),
            Err(e) => {
                error!(error = %e, "Credential encryption failed");
                None
            }
        }
    }

    /// Decrypts an `ivHex:cipherHex` value.
    ///
    /// Returns `None` (after logging) for malformed input, a wrong key, or
    /// tampered ciphertext.
    #[must_use]
    pub fn decrypt(&self, stored: &str) -> Option<String> {
        match self.try_decrypt(stored) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                error!(error = %e, "Credential decryption failed");
                None
            }
        }
    }

    fn try_decrypt(&self, stored: &str) -> SecurityResult<String> {
        let (iv_hex, cipher_hex) = stored
            .split_once(':')
            .ok_or_else(|| SecurityError::EncryptionError("missing ':' separator".to_string()))?;

        let iv = hex::decode(iv_hex)
            .map_err(|e| SecurityError::EncryptionError(format!("Invalid IV: {}", e)))?;
        if iv.len() != NONCE_LENGTH {
            return Err(SecurityError::EncryptionError(format!(
                "IV must be {} bytes, found {}",
                NONCE_LENGTH,
                iv.len()
            )));
        }
        let ciphertext = hex::decode(cipher_hex)
            .map_err(|e| SecurityError::EncryptionError(format!("Invalid ciphertext: {}", e)))?;

        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|e| SecurityError::EncryptionError(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| SecurityError::EncryptionError(format!("Invalid UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_is_exact() {
        let cipher = CredentialCipher::generate();
        let secret = "sk-proj-ÄÖÜ-1234567890";
        let stored = cipher.encrypt(secret).unwrap();
        assert_eq!(cipher.decrypt(&stored).as_deref(), Some(secret));
    }

    #[test]
    fn test_stored_form_is_iv_colon_ciphertext() {
        let cipher = CredentialCipher::generate();
        let stored = cipher.encrypt("abc").unwrap();
        let (iv, ct) = stored.split_once(':').unwrap();
        assert_eq!(iv.len(), NONCE_LENGTH * 2);
        assert!(hex::decode(ct).is_ok());
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let cipher = CredentialCipher::generate();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_corrupted_ciphertext_is_absent() {
        let cipher = CredentialCipher::generate();
        let stored = cipher.encrypt("secret-value").unwrap();
        let (iv, ct) = stored.split_once(':').unwrap();
        let mut bytes = hex::decode(ct).unwrap();
        bytes[0] ^= 0xff;
        let tampered = format!("{}:{}", iv, hex::encode(bytes));

        assert_eq!(cipher.decrypt(&tampered), None);
        assert_eq!(cipher.decrypt("no-separator"), None);
        assert_eq!(cipher.decrypt("zz:zz"), None);
        assert_eq!(cipher.decrypt("abcd:abcd"), None);
    }

    #[test]
    fn test_wrong_key_is_absent() {
        let stored = CredentialCipher::generate().encrypt("secret").unwrap();
        assert_eq!(CredentialCipher::generate().decrypt(&stored), None);
    }

    #[test]
    fn test_key_file_persists_across_loads() {
        let temp = TempDir::new().unwrap();
        let key_path = temp.path().join("keys").join(".encryption_key");

        let first = CredentialCipher::load_or_create(&key_path).unwrap();
        let stored = first.encrypt("persisted").unwrap();
        assert_eq!(fs::read_to_string(&key_path).unwrap().len(), KEY_LENGTH * 2);

        let second = CredentialCipher::load_or_create(&key_path).unwrap();
        assert_eq!(second.decrypt(&stored).as_deref(), Some("persisted"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_corrupt_key_file_is_regenerated() {
        let temp = TempDir::new().unwrap();
        let key_path = temp.path().join(".encryption_key");
        fs::write(&key_path, "not-hex").unwrap();

        let cipher = CredentialCipher::load_or_create(&key_path).unwrap();
        let contents = fs::read_to_string(&key_path).unwrap();
        assert_eq!(hex::decode(contents).unwrap().len(), KEY_LENGTH);
        assert!(cipher.encrypt("x").is_some());
    }
}
