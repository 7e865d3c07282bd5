//! 面板口令校验：SHA-256 摘要与常量时间比较。

use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// 持有唯一的参考口令摘要。
#[derive(Clone)]
pub struct CredentialChecker {
    digest: Option<[u8; 32]>,
}

#[derive(Debug)]
pub struct InvalidDigest(String);

impl fmt::Display for InvalidDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PANEL_PASSWORD_HASH is not a hex SHA-256 digest: {}", self.0)
    }
}

impl std::error::Error for InvalidDigest {}

impl CredentialChecker {
    /// 优先使用预先计算的十六进制摘要，否则由明文口令计算。
    pub fn from_config(
        password_hash: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, InvalidDigest> {
        if let Some(hash) = password_hash.map(str::trim).filter(|hash| !hash.is_empty()) {
            let bytes = hex::decode(hash).map_err(|err| InvalidDigest(err.to_string()))?;
            let digest: [u8; 32] = bytes
                .try_into()
                .map_err(|bytes: Vec<u8>| InvalidDigest(format!("{} bytes", bytes.len())))?;
            return Ok(Self {
                digest: Some(digest),
            });
        }
        Ok(Self {
            digest: password
                .filter(|password| !password.is_empty())
                .map(digest_of),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.digest.is_some()
    }

    /// 未配置摘要时恒为 false。
    pub fn verify(&self, candidate: &str) -> bool {
        let Some(reference) = self.digest.as_ref() else {
            return false;
        };
        let candidate = digest_of(candidate);
        candidate[..].ct_eq(&reference[..]).into()
    }
}

impl fmt::Debug for CredentialChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialChecker")
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn digest_of(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hunter2")
    const HUNTER2: &str = "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7";

    #[test]
    fn plaintext_password_is_hashed_at_startup() {
        let checker = CredentialChecker::from_config(None, Some("hunter2")).expect("config");
        assert!(checker.verify("hunter2"));
        assert!(!checker.verify("hunter3"));
        assert!(!checker.verify(""));
    }

    #[test]
    fn precomputed_digest_takes_precedence() {
        let checker =
            CredentialChecker::from_config(Some(HUNTER2), Some("other")).expect("config");
        assert!(checker.verify("hunter2"));
        assert!(!checker.verify("other"));

        let upper = HUNTER2.to_uppercase();
        let checker = CredentialChecker::from_config(Some(&upper), None).expect("config");
        assert!(checker.verify("hunter2"));
    }

    #[test]
    fn unconfigured_checker_rejects_everything() {
        let checker = CredentialChecker::from_config(None, None).expect("config");
        assert!(!checker.is_configured());
        assert!(!checker.verify(""));
        assert!(!checker.verify("anything"));
    }

    #[test]
    fn malformed_digest_is_rejected() {
        assert!(CredentialChecker::from_config(Some("not-hex"), None).is_err());
        assert!(CredentialChecker::from_config(Some("abcd"), None).is_err());
    }

    #[test]
    fn near_miss_prefix_never_matches() {
        let checker = CredentialChecker::from_config(None, Some("hunter2")).expect("config");
        for candidate in ["hunter", "hunter22", "Hunter2", "hunter2 "] {
            assert!(!checker.verify(candidate), "{candidate} must not match");
        }
    }
}
