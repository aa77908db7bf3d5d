use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::IdentityError;

/// The address and public key fingerprint a client needs to dial a relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerIdentity {
    pub ip: String,
    pub port: u16,
    pub fingerprint: String,
}

impl ServerIdentity {
    pub fn new(ip: impl Into<String>, port: u16, fingerprint: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            fingerprint: fingerprint.into(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let raw = std::fs::read_to_string(path)?;
        let identity: Self = serde_json::from_str(&raw)?;
        if identity.fingerprint.is_empty() {
            return Err(IdentityError::malformed("empty fingerprint"));
        }
        Ok(identity)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IdentityError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let dir = std::env::temp_dir().join("vcsms-identity-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("identity.json");
        let identity = ServerIdentity::new("127.0.0.1", 6000, "a".repeat(64));
        identity.save(&path).unwrap();
        let loaded = ServerIdentity::load(&path).unwrap();
        assert_eq!(identity, loaded);
    }

    #[test]
    fn rejects_empty_fingerprint() {
        let dir = std::env::temp_dir().join("vcsms-identity-test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("identity.json");
        std::fs::write(&path, r#"{"ip":"127.0.0.1","port":6000,"fingerprint":""}"#).unwrap();
        assert!(ServerIdentity::load(&path).is_err());
    }
}
