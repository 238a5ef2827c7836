//! File signatures for change detection.
//!
//! The cheap signature is size + mtime from a single `stat`. The content
//! signature adds a partial hash (first and last 64 KiB), which catches edits
//! that keep size and mtime on filesystems with coarse mtime resolution.

use sha2::{Digest, Sha256};
use std::fs::{File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::config::SignatureMode;
use crate::model::Signature;

/// Bytes hashed from each end of a file in content mode.
const SAMPLE_LEN: u64 = 64 * 1024;

/// Compute the signature of `path` in the given mode.
pub fn compute(path: &Path, mode: SignatureMode) -> std::io::Result<Signature> {
    let metadata = std::fs::metadata(path)?;
    let mut signature = from_metadata(&metadata);
    if mode == SignatureMode::Content {
        signature.content_hash = Some(compute_file_hash(path)?);
    }
    Ok(signature)
}

/// Cheap signature from already-fetched metadata.
pub fn from_metadata(metadata: &Metadata) -> Signature {
    let mtime_ns = metadata
        .modified()
        .ok()
        .map(|t| match t.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as i128,
            Err(e) => -(e.duration().as_nanos() as i128),
        })
        .unwrap_or(0);

    Signature {
        size: metadata.len(),
        mtime_ns,
        content_hash: None,
    }
}

/// SHA-256 over the file size, the first [`SAMPLE_LEN`] bytes and the last
/// [`SAMPLE_LEN`] bytes, as lowercase hex. Small files are hashed whole.
pub fn compute_file_hash(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut hasher = Sha256::new();
    hasher.update(len.to_le_bytes());

    if len > SAMPLE_LEN * 2 {
        std::io::copy(&mut file.by_ref().take(SAMPLE_LEN), &mut hasher)?;
        file.seek(SeekFrom::End(-(SAMPLE_LEN as i64)))?;
    }
    std::io::copy(&mut file, &mut hasher)?;

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cheap_signature_has_no_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"hello").unwrap();

        let sig = compute(&path, SignatureMode::Cheap).unwrap();
        assert_eq!(sig.size, 5);
        assert!(sig.mtime_ns > 0);
        assert!(sig.content_hash.is_none());
    }

    #[test]
    fn test_content_signature_detects_same_size_edit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.mp3");

        std::fs::write(&path, b"Content A").unwrap();
        let before = compute(&path, SignatureMode::Content).unwrap();

        std::fs::write(&path, b"Content B").unwrap();
        let after = compute(&path, SignatureMode::Content).unwrap();

        assert_eq!(before.size, after.size);
        assert_ne!(before.content_hash, after.content_hash);
    }

    #[test]
    fn test_hash_is_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.flac");
        std::fs::write(&path, b"Hello, world!").unwrap();

        let h1 = compute_file_hash(&path).unwrap();
        let h2 = compute_file_hash(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_large_file_uses_sampled_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.wav");
        let mut data = vec![0u8; (SAMPLE_LEN * 3) as usize];
        std::fs::write(&path, &data).unwrap();
        let h1 = compute_file_hash(&path).unwrap();

        // Middle bytes are outside the sampled chunks
        data[(SAMPLE_LEN + 10) as usize] = 1;
        std::fs::write(&path, &data).unwrap();
        assert_eq!(compute_file_hash(&path).unwrap(), h1);

        // The tail is sampled
        let last = data.len() - 1;
        data[last] = 1;
        std::fs::write(&path, &data).unwrap();
        assert_ne!(compute_file_hash(&path).unwrap(), h1);
    }

    #[test]
    fn test_head_sample_and_whole_small_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.flac");

        let mut data = vec![0u8; (SAMPLE_LEN * 3) as usize];
        std::fs::write(&path, &data).unwrap();
        let h1 = compute_file_hash(&path).unwrap();
        data[0] = 1;
        std::fs::write(&path, &data).unwrap();
        assert_ne!(compute_file_hash(&path).unwrap(), h1);

        // At exactly two samples long every byte counts
        let mut data = vec![0u8; (SAMPLE_LEN * 2) as usize];
        std::fs::write(&path, &data).unwrap();
        let h1 = compute_file_hash(&path).unwrap();
        data[SAMPLE_LEN as usize] = 1;
        std::fs::write(&path, &data).unwrap();
        assert_ne!(compute_file_hash(&path).unwrap(), h1);
    }
}
