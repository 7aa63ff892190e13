//! Flat binary files for the precomputed heuristic tables.
//!
//! Every file is one postcard-encoded envelope: a 4-byte magic tag, a
//! format version and the payload. A wrong tag or version is reported as
//! a corrupt file; the caller has to regenerate it offline.

use crate::error::{PlannerError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    magic: [u8; 4],
    version: u32,
    payload: T,
}

pub fn save<T: Serialize>(path: &Path, magic: [u8; 4], payload: &T) -> Result<()> {
    let envelope = Envelope {
        magic,
        version: FORMAT_VERSION,
        payload,
    };
    let bytes = postcard::to_stdvec(&envelope)?;

    let mut file = fs::File::create(path)?;
    file.write_all(&bytes)?;
    file.flush()?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

pub fn load<T: DeserializeOwned>(path: &Path, magic: [u8; 4]) -> Result<T> {
    let bytes = fs::read(path)?;
    let envelope: Envelope<T> = postcard::from_bytes(&bytes).map_err(|e| {
        PlannerError::Persist(format!("{} is corrupt: {}", path.display(), e))
    })?;

    if envelope.magic != magic {
        return Err(PlannerError::Persist(format!(
            "{} has tag {:?}, expected {:?}",
            path.display(),
            envelope.magic,
            magic
        )));
    }
    if envelope.version != FORMAT_VERSION {
        return Err(PlannerError::Persist(format!(
            "{} has format version {}, expected {}",
            path.display(),
            envelope.version,
            FORMAT_VERSION
        )));
    }
    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wrong_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.bin");
        save(&path, *b"NHOL", &vec![1u16, 2, 3]).unwrap();

        let err = load::<Vec<u16>>(&path, *b"HOLO").unwrap_err();
        assert!(matches!(err, PlannerError::Persist(_)));
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.bin");
        save(&path, *b"NHOL", &vec![7u16; 64]).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(
            load::<Vec<u16>>(&path, *b"NHOL"),
            Err(PlannerError::Persist(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load::<Vec<u16>>(&dir.path().join("absent.bin"), *b"NHOL").unwrap_err();
        assert!(matches!(err, PlannerError::Io(_)));
    }
}
