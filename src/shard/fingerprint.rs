//! Shard-set fingerprinting.
//!
//! The merge cache needs a stable identity for "this exact set of parts"
//! that is cheap to compute. Shards can run to tens of gigabytes, so the
//! fingerprint hashes metadata only: filename, byte size, and
//! integer-truncated mtime of every member, in lexicographic filename order.
//! A member replaced with different content but identical name/size/mtime is
//! therefore indistinguishable — acceptable for a cache key, not an
//! integrity check.

use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use super::ShardSet;

/// Hex length of the truncated digest. Collisions at 64 bits are not a
/// realistic concern for a per-user cache directory.
const FINGERPRINT_LEN: usize = 16;

impl ShardSet {
    /// Computes the metadata fingerprint for this set.
    ///
    /// Members whose metadata cannot be read contribute their filename only
    /// rather than aborting the pipeline.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for path in &self.shards {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match std::fs::metadata(path) {
                Ok(meta) => {
                    hasher.update(name.as_bytes());
                    hasher.update(meta.len().to_string().as_bytes());
                    let mtime_secs = meta
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                        .map(|d| d.as_secs())
                        .unwrap_or(0);
                    hasher.update(mtime_secs.to_string().as_bytes());
                    hasher.update(b"\n");
                }
                Err(_) => {
                    hasher.update(name.as_bytes());
                    hasher.update(b"\n");
                }
            }
        }
        let mut hex = format!("{:x}", hasher.finalize());
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::super::ShardSet;
    use super::FINGERPRINT_LEN;

    fn touch(dir: &std::path::Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn deterministic_under_shuffle() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "m-00001-of-00003.gguf", b"aaa");
        let b = touch(tmp.path(), "m-00002-of-00003.gguf", b"bbb");
        let c = touch(tmp.path(), "m-00003-of-00003.gguf", b"ccc");

        let fp1 = ShardSet::from_paths(vec![a.clone(), b.clone(), c.clone()]).fingerprint();
        let fp2 = ShardSet::from_paths(vec![c, a, b]).fingerprint();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), FINGERPRINT_LEN);
        assert!(fp1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sensitive_to_member_size() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "m-00001-of-00002.gguf", b"aaa");
        let b = touch(tmp.path(), "m-00002-of-00002.gguf", b"bbb");
        let before = ShardSet::from_paths(vec![a.clone(), b.clone()]).fingerprint();

        std::fs::write(&b, b"bbbb-longer").unwrap();
        let after = ShardSet::from_paths(vec![a, b]).fingerprint();
        assert_ne!(before, after);
    }

    #[test]
    fn sensitive_to_member_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "m-00001-of-00002.gguf", b"aaa");
        let b = touch(tmp.path(), "m-00002-of-00002.gguf", b"bbb");
        let before = ShardSet::from_paths(vec![a.clone(), b.clone()]).fingerprint();

        // Same name and size, mtime pushed into the past.
        let past = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        let file = std::fs::File::options().write(true).open(&b).unwrap();
        file.set_modified(past).unwrap();
        drop(file);

        let after = ShardSet::from_paths(vec![a, b]).fingerprint();
        assert_ne!(before, after);
    }

    #[test]
    fn unreadable_member_falls_back_to_name_only() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "m-00001-of-00002.gguf", b"aaa");
        let ghost = tmp.path().join("m-00002-of-00002.gguf"); // never created

        // Must not panic or error; the ghost contributes its name only.
        let fp = ShardSet::from_paths(vec![a, ghost]).fingerprint();
        assert_eq!(fp.len(), FINGERPRINT_LEN);
    }
}
