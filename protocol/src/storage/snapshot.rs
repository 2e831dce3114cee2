//! # Integrity-Checked Snapshots
//!
//! A [`Snapshot`] is a versioned envelope around any serializable ledger
//! state. The payload is bincode-encoded and sealed with its BLAKE3 digest,
//! so a snapshot that was truncated or edited on disk is rejected on load
//! instead of silently restoring corrupted balances.
//!
//! ```text
//! file = bincode(Envelope { version, taken_at, digest, payload })
//! digest = BLAKE3(payload)
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;
use thiserror::Error;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised while writing or reading snapshots.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bincode encode/decode failure.
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// The stored digest does not match the payload.
    #[error("snapshot integrity check failed: expected {expected}, computed {computed}")]
    DigestMismatch {
        /// Digest recorded in the envelope (hex).
        expected: String,
        /// Digest of the payload as read (hex).
        computed: String,
    },

    /// The snapshot was written by an incompatible format version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
}

/// Result alias for snapshot operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    taken_at: DateTime<Utc>,
    digest: [u8; 32],
    payload: Vec<u8>,
}

/// A sealed, encoded copy of a `T`.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    taken_at: DateTime<Utc>,
    digest: [u8; 32],
    payload: Vec<u8>,
    _state: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> Snapshot<T> {
    /// Encodes and seals `state`.
    pub fn capture(state: &T) -> StorageResult<Self> {
        let payload = bincode::serialize(state)?;
        let digest = *blake3::hash(&payload).as_bytes();
        Ok(Self {
            taken_at: Utc::now(),
            digest,
            payload,
            _state: PhantomData,
        })
    }

    /// Decodes the sealed state.
    pub fn restore(&self) -> StorageResult<T> {
        self.verify()?;
        Ok(bincode::deserialize(&self.payload)?)
    }

    /// Checks the payload against the recorded digest.
    pub fn verify(&self) -> StorageResult<()> {
        let computed = blake3::hash(&self.payload);
        if computed.as_bytes() != &self.digest {
            return Err(StorageError::DigestMismatch {
                expected: hex::encode(self.digest),
                computed: computed.to_hex().to_string(),
            });
        }
        Ok(())
    }

    /// Hex digest of the payload. Two snapshots of identical state have the
    /// same digest, which makes this a cheap state fingerprint.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// When the snapshot was captured.
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Size of the encoded payload in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Writes the snapshot to `path`, replacing any existing file.
    ///
    /// The bytes go to a sibling temp file, are flushed to disk and then
    /// renamed into place, so a crash mid-write leaves the previous snapshot
    /// intact. The temp file is removed if any step fails.
    pub fn save(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            taken_at: self.taken_at,
            digest: self.digest,
            payload: self.payload.clone(),
        };
        let bytes = bincode::serialize(&envelope)?;

        let tmp = path.with_extension("tmp");
        if let Err(err) = write_synced(&tmp, &bytes).and_then(|()| std::fs::rename(&tmp, path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err.into());
        }

        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            digest = %self.digest_hex(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Reads and verifies a snapshot from `path`.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let envelope: Envelope = bincode::deserialize(&bytes)?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: envelope.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let snapshot = Self {
            taken_at: envelope.taken_at,
            digest: envelope.digest,
            payload: envelope.payload,
            _state: PhantomData,
        };
        snapshot.verify()?;
        Ok(snapshot)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Book {
        balances: BTreeMap<String, u128>,
        height: u64,
    }

    fn book() -> Book {
        let mut balances = BTreeMap::new();
        balances.insert("alice".to_string(), 100);
        balances.insert("bob".to_string(), 7);
        Book {
            balances,
            height: 3,
        }
    }

    #[test]
    fn capture_and_restore_in_memory() {
        let snap = Snapshot::capture(&book()).unwrap();
        assert_eq!(snap.restore().unwrap(), book());
        assert!(snap.payload_len() > 0);
    }

    #[test]
    fn identical_state_identical_digest() {
        let a = Snapshot::capture(&book()).unwrap();
        let b = Snapshot::capture(&book()).unwrap();
        assert_eq!(a.digest_hex(), b.digest_hex());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.snap");

        Snapshot::capture(&book()).unwrap().save(&path).unwrap();
        let loaded: Snapshot<Book> = Snapshot::load(&path).unwrap();
        assert_eq!(loaded.restore().unwrap(), book());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        // A directory in the way makes the final rename fail.
        std::fs::create_dir(&path).unwrap();

        let err = Snapshot::capture(&book()).unwrap().save(&path).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(!dir.path().join("ledger.tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn tampered_payload_rejected() {
        let mut snap = Snapshot::capture(&book()).unwrap();
        let last = snap.payload.len() - 1;
        snap.payload[last] ^= 0xFF;
        assert!(matches!(
            snap.restore(),
            Err(StorageError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn truncated_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        Snapshot::capture(&book()).unwrap().save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(Snapshot::<Book>::load(&path).is_err());
    }
}
