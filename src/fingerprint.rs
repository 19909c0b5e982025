use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::Path;

/// SHA-256 digest of a file's contents, used to tell whether cached findings are stale
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Self(digest)
    }

    pub fn of_file(path: &Path) -> io::Result<Self> {
        std::fs::read(path).map(|bytes| Self::of_bytes(&bytes))
    }

    /// Like [`Fingerprint::of_file`], but a file that cannot be read has no fingerprint
    pub fn try_of_file(path: &Path) -> Option<Self> {
        match Self::of_file(path) {
            Ok(fingerprint) => Some(fingerprint),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "cannot fingerprint file");
                None
            }
        }
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint(")?;
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}
