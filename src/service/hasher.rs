use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// One-way transform from a plaintext secret to a fixed-length digest.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> String;

    fn verify(&self, secret: &str, expected_hex: &str) -> bool {
        let actual = self.hash(secret);
        bool::from(actual.as_bytes().ct_eq(expected_hex.as_bytes()))
    }
}

/// Unsalted, single-pass SHA-256 rendered as 64 lowercase hex chars.
///
/// Deterministic by construction; it offers no resistance to offline
/// dictionary attacks on leaked digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl CredentialHasher for Sha256Hasher {
    fn hash(&self, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_sha256_vector() {
        assert_eq!(
            Sha256Hasher.hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_is_deterministic_lowercase_hex() {
        let first = Sha256Hasher.hash("admin123");
        let second = Sha256Hasher.hash("admin123");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(
            first
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn verify_accepts_own_digest_only() {
        let digest = Sha256Hasher.hash("correct horse");
        assert!(Sha256Hasher.verify("correct horse", &digest));
        assert!(!Sha256Hasher.verify("correct horse ", &digest));
        assert!(!Sha256Hasher.verify("Correct horse", &digest));
    }

    #[test]
    fn verify_rejects_malformed_digests() {
        let digest = Sha256Hasher.hash("pw");
        assert!(!Sha256Hasher.verify("pw", &digest.to_uppercase()));
        assert!(!Sha256Hasher.verify("pw", &digest[..63]));
        assert!(!Sha256Hasher.verify("pw", ""));
    }

    #[test]
    fn empty_secret_still_hashes() {
        assert_eq!(
            Sha256Hasher.hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
