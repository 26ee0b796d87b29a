//! BLAKE3 digests of files on disk.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Hex BLAKE3 digest of a file's contents.
///
/// Streams the file in 64KB chunks, so multi-hundred-megabyte model files
/// are never held in memory.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; 65536];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_matches_in_memory_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        let data = vec![7u8; 200_000];
        std::fs::write(&path, &data).unwrap();

        let hash = content_hash(&path).unwrap();
        assert_eq!(hash, blake3::hash(&data).to_hex().to_string());
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_content_hash_missing_file() {
        assert!(content_hash(Path::new("/nonexistent/model.onnx")).is_err());
    }
}
