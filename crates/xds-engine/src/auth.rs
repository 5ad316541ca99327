//! Credential verification for discovery requests.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use subtle::{Choice, ConstantTimeEq};
use tracing::{debug, warn};
use xds_core::{AuthError, DiscoveryRequest, XdsError, XdsResult};

use crate::crypto::{AesGcmCipher, CipherError, CredentialCipher};
use crate::metrics::EngineMetrics;

/// Accepted plaintext secrets. `Debug` never prints them.
#[derive(Clone, Default)]
pub struct SecretSet(Vec<String>);

impl SecretSet {
    /// Wrap a list of accepted secrets.
    pub fn new(secrets: Vec<String>) -> Self {
        Self(secrets)
    }

    /// Constant-time membership test.
    ///
    /// Every configured secret is compared, whether or not an earlier one
    /// matched.
    pub fn contains(&self, candidate: &str) -> bool {
        let candidate = candidate.as_bytes();
        let matched = self
            .0
            .iter()
            .fold(Choice::from(0), |acc, secret| acc | secret.as_bytes().ct_eq(candidate));
        bool::from(matched)
    }

    /// Number of accepted secrets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no secret is accepted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretSet({} redacted)", self.0.len())
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Disabled,
    Enabled {
        cipher: Arc<dyn CredentialCipher>,
        secrets: SecretSet,
    },
}

/// Verifies the encrypted credential carried in node metadata.
///
/// Failures are never retried within a request.
#[derive(Debug, Clone)]
pub struct AuthGate {
    mode: Mode,
    metrics: EngineMetrics,
}

impl AuthGate {
    /// A gate that lets every request through.
    pub fn disabled() -> Self {
        Self {
            mode: Mode::Disabled,
            metrics: EngineMetrics::new(),
        }
    }

    /// A gate that requires a credential decrypting to one of `secrets`.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`] if no cipher is available, since
    /// the gate could not verify anything.
    pub fn enabled(
        cipher: Option<Arc<dyn CredentialCipher>>,
        secrets: SecretSet,
    ) -> XdsResult<Self> {
        let cipher = cipher.ok_or_else(|| {
            XdsError::Configuration(
                "authentication is enabled but no encryption key is configured".into(),
            )
        })?;
        if secrets.is_empty() {
            warn!("authentication is enabled with no accepted secrets; every request will be rejected");
        }
        Ok(Self {
            mode: Mode::Enabled { cipher, secrets },
            metrics: EngineMetrics::new(),
        })
    }

    /// Build a gate from configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`] if authentication is enabled and
    /// the key is missing or unusable.
    pub fn from_settings(
        enabled: bool,
        encryption_key: Option<&str>,
        passwords: &[String],
    ) -> XdsResult<Self> {
        if !enabled {
            return Ok(Self::disabled());
        }
        let cipher = encryption_key
            .map(AesGcmCipher::new)
            .transpose()
            .map_err(|e| XdsError::Configuration(format!("encryption key rejected: {e}")))?
            .map(|c| Arc::new(c) as Arc<dyn CredentialCipher>);
        Self::enabled(cipher, SecretSet::new(passwords.to_vec()))
    }

    /// Report outcomes to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Whether credentials are checked at all.
    pub fn is_enabled(&self) -> bool {
        matches!(self.mode, Mode::Enabled { .. })
    }

    /// Verify a request's credential.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingCredential`] if node metadata has no credential
    /// - [`AuthError::InvalidCredential`] if it does not decrypt or matches
    ///   no accepted secret
    /// - [`AuthError::MalformedCredential`] for anything else the decryption
    ///   layer rejects
    pub async fn authenticate(&self, request: &DiscoveryRequest) -> Result<(), AuthError> {
        let Mode::Enabled { cipher, secrets } = &self.mode else {
            return Ok(());
        };

        let result = verify(cipher.as_ref(), secrets, request).await;
        match &result {
            Ok(()) => {
                debug!(node = %request.node.id, "authenticated discovery request");
                self.metrics.auth_succeeded();
            }
            Err(err) => {
                debug!(node = %request.node.id, reason = err.kind(), "authentication failed");
                self.metrics.auth_failed(err.kind());
            }
        }
        result
    }
}

async fn verify(
    cipher: &dyn CredentialCipher,
    secrets: &SecretSet,
    request: &DiscoveryRequest,
) -> Result<(), AuthError> {
    let token = match request.credential() {
        None => {
            return Err(AuthError::MissingCredential {
                node_id: request.node.id.clone(),
            })
        }
        Some(Value::String(token)) => token,
        Some(_) => {
            return Err(AuthError::MalformedCredential {
                reason: "auth field is not a string".into(),
            })
        }
    };

    match cipher.decrypt(token).await {
        Ok(plaintext) if secrets.contains(&plaintext) => Ok(()),
        Ok(_) | Err(CipherError::InvalidToken) => Err(AuthError::InvalidCredential),
        Err(err) => Err(AuthError::MalformedCredential {
            reason: err.to_string(),
        }),
    }
}
