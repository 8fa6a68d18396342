//! # liftgate-creds
//!
//! Pre-shared credential pool for the dispatcher DTLS session.
//!
//! Credentials are loaded once from a text file (one per line) and the pool
//! is read-only afterwards. Each new session takes exactly one credential,
//! chosen by the configured [`SelectionPolicy`]:
//!
//! - `First` - lexicographically smallest credential, deterministic.
//! - `Random` - uniform choice.
//! - `Deterministic` - index derived from a caller-supplied identity via a
//!   reproducible polynomial hash.
//!
//! The deterministic hash (`h = 31·h + byte`, wrapping) is intentionally
//! weak and reproducible so that test fixtures can predict the selected
//! credential. It is not a security primitive; the credential bytes
//! themselves are the secret.

use std::path::Path;

/// Maximum credential length in bytes (one line of the pool file).
pub const MAX_CREDENTIAL_LEN: usize = 64;

/// Random selection skips empty credentials for up to this many draws.
const RANDOM_RETRIES: usize = 5;

/// Error types for credential-store operations.
#[derive(Debug, thiserror::Error)]
pub enum CredsError {
    /// The pool file produced no usable credentials.
    #[error("no credentials loaded")]
    NoCredentialsLoaded,

    /// A credential line exceeds [`MAX_CREDENTIAL_LEN`].
    #[error("credential on line {line} is {len} bytes, max {MAX_CREDENTIAL_LEN}")]
    BufferTooSmall {
        /// 1-based line number in the pool file.
        line: usize,
        /// Length of the offending credential.
        len: usize,
    },

    /// The pool file could not be read.
    #[error("credential file error: {0}")]
    Io(String),
}

/// How a credential is chosen for a new session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionPolicy {
    First,
    Random,
    Deterministic,
}

/// Read-only pool of pre-shared credentials.
#[derive(Debug)]
pub struct CredentialStore {
    credentials: Vec<Vec<u8>>,
}

impl CredentialStore {
    /// Load the pool from a text file, one credential per line.
    ///
    /// Trailing whitespace is trimmed and blank lines are skipped. The pool
    /// is sorted so that [`CredentialStore::first`] is the lexical minimum.
    ///
    /// # Errors
    ///
    /// Returns [`CredsError::Io`] if the file cannot be read,
    /// [`CredsError::BufferTooSmall`] if a line is oversized, and
    /// [`CredsError::NoCredentialsLoaded`] if nothing usable remains.
    pub fn load(path: &Path) -> Result<Self, CredsError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CredsError::Io(e.to_string()))?;
        Self::from_lines(content.lines())
    }

    /// Build the pool from pre-split lines. Used by [`CredentialStore::load`]
    /// and by tests.
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Self, CredsError> {
        let mut credentials = Vec::new();
        for (idx, line) in lines.enumerate() {
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.len() > MAX_CREDENTIAL_LEN {
                return Err(CredsError::BufferTooSmall {
                    line: idx + 1,
                    len: trimmed.len(),
                });
            }
            credentials.push(trimmed.as_bytes().to_vec());
        }
        if credentials.is_empty() {
            return Err(CredsError::NoCredentialsLoaded);
        }
        credentials.sort();
        tracing::info!(count = credentials.len(), "credential pool loaded");
        Ok(Self { credentials })
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the pool is empty. Never true after a successful load.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Select a credential under the given policy.
    ///
    /// `identity` feeds the deterministic policy; the other policies ignore
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`CredsError::NoCredentialsLoaded`] if the pool is empty or
    /// random selection keeps drawing empty credentials.
    pub fn select(&self, policy: SelectionPolicy, identity: &[u8]) -> Result<&[u8], CredsError> {
        match policy {
            SelectionPolicy::First => self.first(),
            SelectionPolicy::Random => self.random(),
            SelectionPolicy::Deterministic => self.deterministic(identity),
        }
    }

    /// The lexically first credential.
    pub fn first(&self) -> Result<&[u8], CredsError> {
        self.credentials
            .first()
            .map(Vec::as_slice)
            .ok_or(CredsError::NoCredentialsLoaded)
    }

    /// A uniformly random credential, skipping empty entries for up to five
    /// draws.
    pub fn random(&self) -> Result<&[u8], CredsError> {
        use rand::Rng;

        if self.credentials.is_empty() {
            return Err(CredsError::NoCredentialsLoaded);
        }
        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_RETRIES {
            let idx = rng.gen_range(0..self.credentials.len());
            if !self.credentials[idx].is_empty() {
                return Ok(&self.credentials[idx]);
            }
        }
        Err(CredsError::NoCredentialsLoaded)
    }

    /// The credential at index `hash(identity) % len`.
    pub fn deterministic(&self, identity: &[u8]) -> Result<&[u8], CredsError> {
        if self.credentials.is_empty() {
            return Err(CredsError::NoCredentialsLoaded);
        }
        let idx = (identity_hash(identity) % self.credentials.len() as u64) as usize;
        Ok(&self.credentials[idx])
    }
}

/// Reproducible polynomial hash over the identity bytes:
/// `h_0 = 0; h_i = 31·h_{i-1} + byte_i` with wrapping arithmetic.
///
/// Weak by design so peers and tests can reproduce the index. Not a
/// security primitive.
pub fn identity_hash(identity: &[u8]) -> u64 {
    identity
        .iter()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_trims_and_skips_blanks() {
        let store =
            CredentialStore::from_lines("alpha  \n\nbravo\n   \ncharlie\n".lines())
                .expect("load");
        assert_eq!(store.len(), 3);
        assert_eq!(store.first().expect("first"), b"alpha");
    }

    #[test]
    fn test_empty_pool_rejected() {
        let result = CredentialStore::from_lines("\n   \n".lines());
        assert!(matches!(result, Err(CredsError::NoCredentialsLoaded)));
    }

    #[test]
    fn test_oversized_credential_rejected() {
        let long = "x".repeat(MAX_CREDENTIAL_LEN + 1);
        let result = CredentialStore::from_lines(long.lines());
        match result {
            Err(CredsError::BufferTooSmall { line, len }) => {
                assert_eq!(line, 1);
                assert_eq!(len, MAX_CREDENTIAL_LEN + 1);
            }
            other => unreachable!("expected BufferTooSmall, got {other:?}"),
        }
    }

    #[test]
    fn test_first_is_lexical_minimum() {
        let store = CredentialStore::from_lines("zulu\nalpha\nmike\n".lines()).expect("load");
        assert_eq!(store.first().expect("first"), b"alpha");
    }

    #[test]
    fn test_pool_of_one_all_policies_agree() {
        let store = CredentialStore::from_lines("only\n".lines()).expect("load");
        assert_eq!(store.first().expect("first"), b"only");
        assert_eq!(store.random().expect("random"), b"only");
        assert_eq!(store.deterministic(b"anything").expect("det"), b"only");
        assert_eq!(
            store
                .select(SelectionPolicy::Deterministic, b"gateway")
                .expect("select"),
            b"only"
        );
    }

    #[test]
    fn test_identity_hash_vector() {
        // h("ab") = 31*97 + 98 = 3105
        assert_eq!(identity_hash(b"ab"), 3105);
        assert_eq!(identity_hash(b""), 0);
    }

    #[test]
    fn test_deterministic_is_reproducible() {
        let store =
            CredentialStore::from_lines("alpha\nbravo\ncharlie\ndelta\n".lines()).expect("load");
        let a = store.deterministic(b"gateway-7").expect("det").to_vec();
        let b = store.deterministic(b"gateway-7").expect("det").to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "secret-a").expect("write");
        writeln!(file, "secret-b").expect("write");
        let store = CredentialStore::load(file.path()).expect("load");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = CredentialStore::load(Path::new("/nonexistent/creds.txt"));
        assert!(matches!(result, Err(CredsError::Io(_))));
    }
}
