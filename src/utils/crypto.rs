use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// `Ok(None)` when the file does not exist.
pub fn sha256_file(path: &Path) -> io::Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(Some(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn file_and_memory_digests_agree() {
        let path = std::env::temp_dir().join(format!("tiwut-hash-{}", Uuid::new_v4()));
        std::fs::write(&path, b"v2.3").expect("write marker");

        let from_file = sha256_file(&path).expect("hash file").expect("file exists");
        assert_eq!(from_file, sha256_hex(b"v2.3"));
        assert_eq!(from_file.len(), 64);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_has_no_digest() {
        let path = std::env::temp_dir().join(format!("tiwut-missing-{}", Uuid::new_v4()));
        assert_eq!(sha256_file(&path).expect("hash missing"), None);
    }
}
