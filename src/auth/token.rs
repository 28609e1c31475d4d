//! Webhook token provisioning and verification primitives.
//!
//! The webhook endpoint is guarded by a single secret bearer token. Only the
//! SHA-256 digest of the secret is persisted (table `TOKEN`, column `VALUE_`);
//! the plaintext is disclosed once, at provisioning time, through a
//! warning-level log line and is not recoverable afterwards.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::BridgeResult;
use crate::storage::BridgeRepository;

/// Number of random bytes in a generated secret (256 bits of entropy).
const SECRET_BYTES: usize = 32;

/// Hash a secret for storage or comparison (lowercase hex SHA-256).
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new URL-safe secret with 256 bits of entropy.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time equality check for two hex digests.
///
/// `ct_eq` only runs on equal-length inputs; a length mismatch is an
/// immediate reject (the digest length is public anyway).
pub fn digests_match(presented: &str, stored: &str) -> bool {
    if presented.len() != stored.len() {
        return false;
    }
    presented.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// Lazily provisions the webhook token and hands out its digest.
///
/// The store is the authority: every call reads the database, and no digest is
/// cached across calls. Provisioning happens on the first request that
/// consults the verifier, not at startup, so the store is only written once
/// the application is serving real traffic.
#[derive(Clone)]
pub struct TokenProvisioner {
    repository: BridgeRepository,
}

impl TokenProvisioner {
    /// Create a provisioner backed by the given repository.
    pub fn new(repository: BridgeRepository) -> Self {
        Self { repository }
    }

    /// Return the stored token digest, generating and persisting one if absent.
    ///
    /// Two requests may race through the absent branch; both inserts are
    /// well-formed and `find_token_digest` decides which one wins. A secret
    /// disclosed for a losing insert simply stops authenticating.
    pub async fn get_or_create_digest(&self) -> BridgeResult<String> {
        if let Some(digest) = self.repository.find_token_digest().await? {
            return Ok(digest);
        }

        let secret = generate_secret();
        let digest = hash_secret(&secret);
        self.repository.insert_token_digest(&digest).await?;

        // The only moment the plaintext is observable. Never logged again and
        // never persisted in recoverable form.
        tracing::warn!(
            "\n\nUsing generated token for authenticating webhook messages from RapidPro: {}\n\n\
             This token cannot be recovered so it should be kept safe and secure. This message \
             will NOT appear again unless you truncate the table 'TOKEN' to generate a new token.\n",
            secret
        );

        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePool;

    async fn setup_provisioner() -> (TokenProvisioner, BridgeRepository) {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        let repo = BridgeRepository::new(pool);
        repo.init_schema().await.expect("Failed to init schema");
        (TokenProvisioner::new(repo.clone()), repo)
    }

    #[test]
    fn test_hash_secret_known_vectors() {
        assert_eq!(
            hash_secret(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generate_secret_is_url_safe_and_unique() {
        let a = generate_secret();
        let b = generate_secret();

        // 32 bytes base64-encoded without padding
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(a, b);
    }

    #[test]
    fn test_digests_match() {
        let digest = hash_secret("secret");
        assert!(digests_match(&digest, &digest));
        assert!(!digests_match(&hash_secret("other"), &digest));
        assert!(!digests_match("short", &digest));
    }

    #[tokio::test]
    async fn test_provisioning_creates_exactly_one_record() {
        let (provisioner, repo) = setup_provisioner().await;

        let digest = provisioner.get_or_create_digest().await.unwrap();
        assert_eq!(repo.count_token_rows().await.unwrap(), 1);
        assert_eq!(repo.find_token_digest().await.unwrap().unwrap(), digest);

        // Second call returns the stored digest without provisioning again
        let again = provisioner.get_or_create_digest().await.unwrap();
        assert_eq!(again, digest);
        assert_eq!(repo.count_token_rows().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_existing_digest_wins_over_generation() {
        let (provisioner, repo) = setup_provisioner().await;

        let digest = hash_secret("pre-seeded-secret");
        repo.insert_token_digest(&digest).await.unwrap();

        assert_eq!(provisioner.get_or_create_digest().await.unwrap(), digest);
        assert_eq!(repo.count_token_rows().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_secret_authenticates() {
        let (provisioner, repo) = setup_provisioner().await;

        // Simulate provisioning with a known secret
        let secret = generate_secret();
        repo.insert_token_digest(&hash_secret(&secret)).await.unwrap();

        let stored = provisioner.get_or_create_digest().await.unwrap();
        assert!(digests_match(&hash_secret(&secret), &stored));
        assert!(!digests_match(&hash_secret("wrong"), &stored));
    }
}
