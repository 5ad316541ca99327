//! Credential encryption.
//!
//! Proxies carry their credential as an opaque token in node metadata. The
//! token is AES-256-GCM ciphertext encoded as unpadded URL-safe base64:
//!
//! ```text
//! base64url( nonce[12] || ciphertext || tag[16] )
//! ```
//!
//! Keys are 32 random bytes in the same encoding.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// Credential decryption failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// The token does not decrypt under this key: bad encoding, truncated,
    /// or produced with another key.
    #[error("token failed authentication")]
    InvalidToken,

    /// The token decrypted but its plaintext is unusable.
    #[error("malformed token: {reason}")]
    Malformed {
        /// What was wrong with it.
        reason: String,
    },

    /// The configured key is unusable.
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What was wrong with it.
        reason: String,
    },

    /// The system random source failed.
    #[error("random source unavailable")]
    Random,
}

impl CipherError {
    fn malformed(reason: &str) -> Self {
        Self::Malformed {
            reason: reason.to_string(),
        }
    }
}

/// Symmetric decryption capability used by the auth gate.
///
/// Decryption may suspend, so implementations backed by a remote key
/// service fit the same interface.
#[async_trait]
pub trait CredentialCipher: Send + Sync + fmt::Debug {
    /// Decrypt a credential token to its plaintext secret.
    async fn decrypt(&self, token: &str) -> Result<String, CipherError>;
}

/// AES-256-GCM cipher keyed by a single configured key.
pub struct AesGcmCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmCipher {
    /// Create a cipher from an encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] if the key is not 32 bytes of
    /// URL-safe base64.
    pub fn new(encoded_key: &str) -> Result<Self, CipherError> {
        let bytes = decode(encoded_key.trim()).map_err(|_| CipherError::InvalidKey {
            reason: "key is not URL-safe base64".into(),
        })?;
        let unbound = UnboundKey::new(&AES_256_GCM, &bytes).map_err(|_| CipherError::InvalidKey {
            reason: format!("expected {} key bytes, got {}", AES_256_GCM.key_len(), bytes.len()),
        })?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Generate a new encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Random`] if the system random source fails.
    pub fn generate_key() -> Result<String, CipherError> {
        let mut key = [0u8; 32];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| CipherError::Random)?;
        Ok(URL_SAFE_NO_PAD.encode(key))
    }

    /// Encrypt a secret into a credential token.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Random`] if no nonce can be generated.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::Random)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CipherError::malformed("plaintext too large"))?;

        let mut token = Vec::with_capacity(NONCE_LEN + in_out.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&in_out);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Decrypt a credential token.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidToken`] for tokens that are not base64,
    /// are too short, or fail authentication, and [`CipherError::Malformed`]
    /// when the plaintext is not UTF-8.
    pub fn decrypt_token(&self, token: &str) -> Result<String, CipherError> {
        let bytes = decode(token.trim()).map_err(|_| CipherError::InvalidToken)?;
        if bytes.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CipherError::InvalidToken);
        }

        let (nonce_bytes, sealed) = bytes.split_at(NONCE_LEN);
        let nonce =
            Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CipherError::InvalidToken)?;
        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CipherError::InvalidToken)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CipherError::malformed("plaintext is not UTF-8"))
    }
}

impl fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialCipher for AesGcmCipher {
    async fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        self.decrypt_token(token)
    }
}

/// Decode URL-safe base64, with or without padding.
fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))
}
