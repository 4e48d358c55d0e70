//! Credential storage — per-provider secrets, obfuscated at rest.
//!
//! Secrets live in the `credentials` section of config.json, base64-encoded
//! with a SHA-256 fingerprint alongside. Environment variables always win
//! over stored values so a key never has to touch disk at all.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::provider::Provider;

/// A secret string that masks its value in Debug output.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ── Stored forms (config.json) ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredGeminiCredential {
    /// Base64-obfuscated API key.
    pub api_key: String,
    /// SHA-256 of the plaintext key, for display and change detection.
    pub fingerprint: String,
    /// Whether the setup connectivity test passed when this was entered.
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBedrockCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    pub region: String,
    pub fingerprint: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default)]
    pub gemini: Option<StoredGeminiCredential>,
    #[serde(default)]
    pub bedrock: Option<StoredBedrockCredential>,
}

/// Resolved Bedrock credential material, ready for request signing.
#[derive(Debug, Clone)]
pub struct BedrockCredentials {
    pub access_key_id: Secret,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
    pub region: String,
}

// ── Store ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CredentialStore {
    cfg: CredentialConfig,
}

impl CredentialStore {
    pub fn new(cfg: CredentialConfig) -> Self {
        Self { cfg }
    }

    /// True when the provider has usable credential material, stored or
    /// from the environment. This is the gate for provider switching.
    pub fn is_configured(&self, provider: Provider) -> bool {
        match provider {
            Provider::Gemini => self.gemini_key().is_some(),
            Provider::Bedrock => self.bedrock().is_some(),
        }
    }

    /// True when the stored set passed its setup connectivity test.
    /// Environment-supplied credentials count as verified.
    pub fn is_verified(&self, provider: Provider) -> bool {
        match provider {
            Provider::Gemini => {
                if env_non_empty("GEMINI_API_KEY").is_some() {
                    return true;
                }
                self.cfg.gemini.as_ref().map(|c| c.verified).unwrap_or(false)
            }
            Provider::Bedrock => {
                if env_non_empty("AWS_ACCESS_KEY_ID").is_some()
                    && env_non_empty("AWS_SECRET_ACCESS_KEY").is_some()
                {
                    return true;
                }
                self.cfg.bedrock.as_ref().map(|c| c.verified).unwrap_or(false)
            }
        }
    }

    pub fn gemini_key(&self) -> Option<Secret> {
        if let Some(key) = env_non_empty("GEMINI_API_KEY") {
            return Some(Secret::new(key));
        }
        let stored = self.cfg.gemini.as_ref()?;
        reveal(&stored.api_key).map(Secret::new)
    }

    pub fn bedrock(&self) -> Option<BedrockCredentials> {
        let env_access = env_non_empty("AWS_ACCESS_KEY_ID");
        let env_secret = env_non_empty("AWS_SECRET_ACCESS_KEY");
        if let (Some(access), Some(secret)) = (env_access, env_secret) {
            return Some(BedrockCredentials {
                access_key_id: Secret::new(access),
                secret_access_key: Secret::new(secret),
                session_token: env_non_empty("AWS_SESSION_TOKEN").map(Secret::new),
                region: env_non_empty("AWS_REGION").unwrap_or_else(|| {
                    self.cfg
                        .bedrock
                        .as_ref()
                        .map(|c| c.region.clone())
                        .unwrap_or_else(|| "us-east-1".into())
                }),
            });
        }

        let stored = self.cfg.bedrock.as_ref()?;
        Some(BedrockCredentials {
            access_key_id: Secret::new(reveal(&stored.access_key_id)?),
            secret_access_key: Secret::new(reveal(&stored.secret_access_key)?),
            session_token: stored
                .session_token
                .as_deref()
                .and_then(reveal)
                .map(Secret::new),
            region: stored.region.clone(),
        })
    }
}

/// Build the stored form of a Gemini credential from plaintext.
pub fn store_gemini(api_key: &str, verified: bool) -> StoredGeminiCredential {
    StoredGeminiCredential {
        api_key: obfuscate(api_key),
        fingerprint: fingerprint(api_key),
        verified,
    }
}

/// Build the stored form of a Bedrock credential set from plaintext.
pub fn store_bedrock(
    access_key_id: &str,
    secret_access_key: &str,
    session_token: Option<&str>,
    region: &str,
    verified: bool,
) -> StoredBedrockCredential {
    StoredBedrockCredential {
        access_key_id: obfuscate(access_key_id),
        secret_access_key: obfuscate(secret_access_key),
        session_token: session_token.map(obfuscate),
        region: region.to_string(),
        fingerprint: fingerprint(secret_access_key),
        verified,
    }
}

/// SHA-256 hex digest of a secret, safe to display and compare.
pub fn fingerprint(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn obfuscate(plain: &str) -> String {
    BASE64.encode(plain.as_bytes())
}

fn reveal(stored: &str) -> Option<String> {
    let bytes = BASE64.decode(stored.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_masks_in_debug() {
        let s = Secret::new("AIzaSyExample123");
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("AIza"));
        assert!(dbg.contains("***"));
    }

    #[test]
    fn obfuscation_roundtrips() {
        let stored = store_gemini("AIzaSyExample123", false);
        assert_ne!(stored.api_key, "AIzaSyExample123");
        assert_eq!(reveal(&stored.api_key).unwrap(), "AIzaSyExample123");
        assert_eq!(stored.fingerprint.len(), 64);
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }

    #[test]
    fn unconfigured_store_has_nothing() {
        // Guard against ambient AWS/Gemini env vars leaking into the test.
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");

        let store = CredentialStore::new(CredentialConfig::default());
        assert!(!store.is_configured(Provider::Gemini));
        assert!(!store.is_configured(Provider::Bedrock));
        assert!(!store.is_verified(Provider::Gemini));
    }

    #[test]
    fn stored_credentials_resolve() {
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");

        let cfg = CredentialConfig {
            gemini: Some(store_gemini("AIzaSyExample123", true)),
            bedrock: Some(store_bedrock("AKIAEXAMPLE", "secret", None, "eu-west-1", false)),
        };
        let store = CredentialStore::new(cfg);

        assert!(store.is_configured(Provider::Gemini));
        assert!(store.is_verified(Provider::Gemini));
        assert_eq!(store.gemini_key().unwrap().as_str(), "AIzaSyExample123");

        assert!(store.is_configured(Provider::Bedrock));
        assert!(!store.is_verified(Provider::Bedrock));
        let bedrock = store.bedrock().unwrap();
        assert_eq!(bedrock.access_key_id.as_str(), "AKIAEXAMPLE");
        assert_eq!(bedrock.region, "eu-west-1");
        assert!(bedrock.session_token.is_none());
    }
}
