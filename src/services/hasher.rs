//! Content digests used as ETags and as metadata record addresses.
//!
//! MD5 over the raw bytes, rendered as 32 lowercase hex characters. Input is
//! consumed in fixed 4 KiB chunks so memory use does not grow with object
//! size.

use crate::errors::{StorageError, StorageResult};
use md5::Context;
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt},
};

/// Read size used for hashing and for streaming files into the store.
pub const CHUNK_SIZE: usize = 4 * 1024;

/// Length of a rendered digest.
pub const DIGEST_HEX_LEN: usize = 32;

pub struct ContentHasher;

impl ContentHasher {
    /// Hash everything `reader` yields. Read errors surface as `StorageError::Read`.
    pub async fn hash_reader<R>(mut reader: R) -> StorageResult<String>
    where
        R: AsyncRead + Unpin,
    {
        let mut digest = Context::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await.map_err(StorageError::Read)?;
            if n == 0 {
                break;
            }
            digest.consume(&buf[..n]);
        }
        Ok(format!("{:x}", digest.compute()))
    }

    pub async fn hash_file(path: &Path) -> StorageResult<String> {
        let file = File::open(path).await.map_err(StorageError::Read)?;
        Self::hash_reader(file).await
    }

    pub fn hash_bytes(bytes: &[u8]) -> String {
        format!("{:x}", md5::compute(bytes))
    }

    /// True when `candidate` looks like a digest this hasher produced.
    pub fn is_digest(candidate: &str) -> bool {
        candidate.len() == DIGEST_HEX_LEN
            && candidate
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::TempDir;

    #[test]
    fn known_digest() {
        assert_eq!(
            ContentHasher::hash_bytes(b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            ContentHasher::hash_bytes(b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[tokio::test]
    async fn reader_matches_in_memory_digest_across_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = ContentHasher::hash_reader(&data[..]).await.unwrap();
        assert_eq!(streamed, ContentHasher::hash_bytes(&data));
    }

    #[tokio::test]
    async fn rehashing_a_file_is_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.csv");
        tokio::fs::write(&path, b"id,name\n1,x\n").await.unwrap();

        let first = ContentHasher::hash_file(&path).await.unwrap();
        let second = ContentHasher::hash_file(&path).await.unwrap();
        assert_eq!(first, second);
        assert!(ContentHasher::is_digest(&first));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_failure() {
        let temp = TempDir::new().unwrap();
        let err = ContentHasher::hash_file(&temp.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Read(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn digest_shape() {
        assert!(ContentHasher::is_digest("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(!ContentHasher::is_digest("../../etc/passwd"));
        assert!(!ContentHasher::is_digest("D41D8CD98F00B204E9800998ECF8427E"));
    }
}
