// Checksum-file reading and content digests for source artifacts
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checksum file {0} is empty")]
    EmptyChecksum(PathBuf),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Read a precomputed checksum: the first line of the file, trimmed
pub fn read_checksum_file(path: &Path) -> StorageResult<String> {
    let contents = fs::read_to_string(path)?;
    let checksum = contents.lines().next().unwrap_or("").trim().to_string();
    if checksum.is_empty() {
        return Err(StorageError::EmptyChecksum(path.to_path_buf()));
    }
    Ok(checksum)
}

/// Calculate the MD5 digest of raw data
pub fn calculate_md5(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// MD5 digest of one file's contents
pub fn file_digest(path: &Path) -> StorageResult<String> {
    let data = fs::read(path)?;
    Ok(calculate_md5(&data))
}

/// MD5 digest over a set of files, concatenated in the given order
pub fn files_digest(paths: &[PathBuf]) -> StorageResult<String> {
    let mut data = Vec::new();
    for path in paths {
        data.extend(fs::read(path)?);
    }
    Ok(calculate_md5(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_calculate_md5() {
        let hash = calculate_md5(b"hello world");
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_read_checksum_file_takes_first_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("biopfam.md5sum");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "5eb63bbbe01eeed093cb22bb8f5acdc3  Pfam-A.biosynthetic.hmm").unwrap();
        writeln!(file, "ignored second line").unwrap();

        let checksum = read_checksum_file(&path).unwrap();
        assert_eq!(
            checksum,
            "5eb63bbbe01eeed093cb22bb8f5acdc3  Pfam-A.biosynthetic.hmm"
        );
    }

    #[test]
    fn test_empty_checksum_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.md5sum");
        fs::write(&path, "\n").unwrap();

        let err = read_checksum_file(&path).unwrap_err();
        assert!(matches!(err, StorageError::EmptyChecksum(_)));
    }

    #[test]
    fn test_files_digest_is_order_sensitive() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.hmm");
        let b = temp_dir.path().join("b.hmm");
        fs::write(&a, "first").unwrap();
        fs::write(&b, "second").unwrap();

        let forward = files_digest(&[a.clone(), b.clone()]).unwrap();
        let reverse = files_digest(&[b, a]).unwrap();
        assert_ne!(forward, reverse);
        assert_eq!(forward, calculate_md5(b"firstsecond"));
    }
}
