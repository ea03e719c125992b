use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::path::Path;

/// Content fingerprint of a template source (hex encoded SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of_bytes(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn of_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        std::fs::read(path).map(|content| Self::of_bytes(&content))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Twelve hex digits are plenty for log lines.
        write!(f, "{}", &self.0[..12])
    }
}
