//! Shard detection.
//!
//! Multi-part GGUFs are named by a small closed set of conventions:
//!
//! * `model-00001-of-00003.gguf` — zero-padded index-of-count, 5 digits wide
//! * `model-0001-of-0003.gguf`   — same, 4 digits wide
//! * `model-part-1.gguf`
//! * `model.part1.gguf`
//!
//! A filename matching one of these is itself enough to mark the artifact
//! split. Independently, stripping the suffix yields a base name whose
//! directory is scanned (non-recursive) for sibling parts — two or more
//! qualifying siblings also mark it split, which covers the first shard of
//! sets whose own name escaped the conventions.

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

fn split_suffix_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)-\d{5}-of-\d{5}\.gguf$",
            r"(?i)-\d{4}-of-\d{4}\.gguf$",
            r"(?i)-part-\d+\.gguf$",
            r"(?i)\.part\d+\.gguf$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

/// Loose qualifier used when scanning a directory for sibling parts.
fn sibling_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)-\d{4,5}-of-\d{4,5}|part-?\d+").expect("static regex"))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Strips the first matching split suffix, leaving the shared base name.
fn base_name(file_name: &str) -> String {
    let mut base = file_name.to_string();
    for re in split_suffix_res() {
        base = re.replace(&base, "").into_owned();
    }
    base
}

fn is_gguf(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".gguf")
}

/// Scans `dir` for files sharing `base` that look like shard parts.
/// Filesystem errors degrade to an empty result; sibling discovery is a
/// heuristic and must never abort the pipeline.
fn sibling_parts(dir: &Path, base: &str) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("sibling scan failed for {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut parts = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(base) && is_gguf(&name) && sibling_re().is_match(&name) {
            parts.push(entry.path());
        }
    }
    parts
}

/// Returns true if `path` is one part of a multi-part model: either its own
/// filename matches a split convention, or at least two sibling parts share
/// its base name.
pub fn is_split(path: &Path) -> bool {
    let name = file_name_of(path);
    if split_suffix_res().iter().any(|re| re.is_match(&name)) {
        return true;
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    sibling_parts(dir, &base_name(&name)).len() > 1
}

/// An ordered, non-empty set of artifact locations. Sorted by filename so
/// that discovery order never leaks into downstream identity; a singleton
/// set means "not sharded".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSet {
    pub(crate) shards: Vec<PathBuf>,
}

impl ShardSet {
    /// Builds a set from explicit members, sorting by filename.
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        paths.sort_by_key(|p| file_name_of(p));
        Self { shards: paths }
    }

    /// Enumerates the shard set that `path` belongs to. Falls back to a
    /// singleton of `path` itself when no sibling parts are found.
    pub fn discover(path: &Path) -> Self {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let base = base_name(&file_name_of(path));
        let parts = sibling_parts(dir, &base);
        if parts.is_empty() {
            Self::from_paths(vec![path.to_path_buf()])
        } else {
            Self::from_paths(parts)
        }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// First shard in lexicographic order; the merge tool wants this one.
    pub fn first(&self) -> &Path {
        &self.shards[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.shards.iter().map(|p| p.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"gguf").unwrap();
        path
    }

    #[test]
    fn split_suffix_alone_marks_split() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "m-00002-of-00003.gguf",
            "m-0002-of-0003.gguf",
            "m-part-2.gguf",
            "m.part2.gguf",
            "M-00002-OF-00003.GGUF",
        ] {
            let path = touch(tmp.path(), name);
            assert!(is_split(&path), "expected split: {name}");
        }
    }

    #[test]
    fn lone_file_is_not_split() {
        let tmp = tempfile::tempdir().unwrap();
        let path = touch(tmp.path(), "model.gguf");
        assert!(!is_split(&path));
    }

    #[test]
    fn three_part_set_is_detected_and_ordered() {
        let tmp = tempfile::tempdir().unwrap();
        // Create out of order; the set must still sort lexicographically.
        touch(tmp.path(), "m-00003-of-00003.gguf");
        let first = touch(tmp.path(), "m-00001-of-00003.gguf");
        touch(tmp.path(), "m-00002-of-00003.gguf");

        assert!(is_split(&first));
        let set = ShardSet::discover(&first);
        assert_eq!(set.len(), 3);
        let names: Vec<String> = set
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "m-00001-of-00003.gguf",
                "m-00002-of-00003.gguf",
                "m-00003-of-00003.gguf"
            ]
        );
    }

    #[test]
    fn sibling_scan_marks_unsuffixed_first_file() {
        // The probed file itself carries a part suffix variant the strict
        // conventions cover, but detection must also work purely from
        // siblings sharing the base name.
        let tmp = tempfile::tempdir().unwrap();
        let probed = touch(tmp.path(), "big-model-part-1.gguf");
        touch(tmp.path(), "big-model-part-2.gguf");
        assert!(is_split(&probed));
        assert_eq!(ShardSet::discover(&probed).len(), 2);
    }

    #[test]
    fn discover_on_lone_file_is_singleton() {
        let tmp = tempfile::tempdir().unwrap();
        let path = touch(tmp.path(), "solo.gguf");
        let set = ShardSet::discover(&path);
        assert_eq!(set.len(), 1);
        assert_eq!(set.first(), path.as_path());
    }

    #[test]
    fn missing_directory_degrades_to_not_split() {
        let path = Path::new("/definitely/not/here/m-00001-of-00002.gguf");
        // Suffix still wins even though the scan fails.
        assert!(is_split(path));
        let lone = Path::new("/definitely/not/here/model.gguf");
        assert!(!is_split(lone));
        assert_eq!(ShardSet::discover(lone).len(), 1);
    }
}
