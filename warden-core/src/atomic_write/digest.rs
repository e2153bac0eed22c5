use std::io;
use std::path::Path;

use sha2::{Digest, Sha512};
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// SHA-512 of a file's contents, streamed.
pub(crate) async fn sha512_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha512::new();
    let mut buffer = vec![0_u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(buffer.get(..read).unwrap_or_default());
    }
    Ok(hasher.finalize().to_vec())
}

/// Whether both files can be read and hold identical bytes. Used to detect a
/// rename that reported failure but actually landed (seen on Windows).
pub(crate) async fn same_contents(a: &Path, b: &Path) -> bool {
    match tokio::try_join!(sha512_file(a), sha512_file(b)) {
        Ok((left, right)) => left == right,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn identical_files_compare_equal() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        let payload = vec![7_u8; READ_CHUNK * 2 + 13];
        tokio::fs::write(&a, &payload).await.unwrap();
        tokio::fs::write(&b, &payload).await.unwrap();
        tokio::fs::write(&c, b"different").await.unwrap();

        assert!(same_contents(&a, &b).await);
        assert!(!same_contents(&a, &c).await);
        assert!(!same_contents(&a, &dir.path().join("missing")).await);
    }
}
