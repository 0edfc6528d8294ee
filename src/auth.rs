//! Access tiers and passkey verification.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Access tier of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May browse an export loaded for this session only
    Guest,
    /// May also browse the stored archive
    Club,
    /// May also import, fetch and clear the stored archive
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Club => "club",
            Role::Admin => "admin",
        }
    }

}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase hex SHA-256 of a passkey.
pub fn hash_passkey(passkey: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(passkey.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares passkeys against configured SHA-256 digests.
///
/// Plain string equality on the digests; not constant time.
#[derive(Debug, Clone, Default)]
pub struct PasskeyVerifier {
    admin_hash: Option<String>,
    club_hash: Option<String>,
}

fn normalize(hash: Option<String>) -> Option<String> {
    hash.map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
}

impl PasskeyVerifier {
    pub fn new(admin_hash: Option<String>, club_hash: Option<String>) -> Self {
        Self {
            admin_hash: normalize(admin_hash),
            club_hash: normalize(club_hash),
        }
    }

    /// True when at least one digest is set.
    pub fn is_configured(&self) -> bool {
        self.admin_hash.is_some() || self.club_hash.is_some()
    }

    /// Role granted by `passkey`; the admin digest is checked first.
    pub fn verify(&self, passkey: &str) -> Option<Role> {
        if passkey.is_empty() {
            return None;
        }
        let digest = hash_passkey(passkey);
        if self.admin_hash.as_deref() == Some(digest.as_str()) {
            return Some(Role::Admin);
        }
        if self.club_hash.as_deref() == Some(digest.as_str()) {
            return Some(Role::Club);
        }
        None
    }
}
