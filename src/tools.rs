//! Discovery of the external executables the pipeline shells out to.

use std::path::{Path, PathBuf};

#[cfg(not(target_os = "windows"))]
pub const GGUF_SPLIT_EXECUTABLE: &str = "llama-gguf-split";
#[cfg(target_os = "windows")]
pub const GGUF_SPLIT_EXECUTABLE: &str = "llama-gguf-split.exe";

/// PATH lookup for an executable name.
pub fn which(executable: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(executable);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(target_os = "windows")]
        {
            let with_ext = dir.join(format!("{executable}.exe"));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
    }
    None
}

/// Locates `llama-gguf-split`, needed to merge sharded GGUFs.
///
/// A caller-supplied path may point at the executable itself or at a
/// llama.cpp checkout/install directory (the binary is then expected at the
/// top level or under `bin/`). Falls back to PATH.
pub fn find_gguf_split(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = custom_path {
        if p.is_file() {
            return Some(p.to_path_buf());
        }
        if p.is_dir() {
            for candidate in [p.join(GGUF_SPLIT_EXECUTABLE), p.join("bin").join(GGUF_SPLIT_EXECUTABLE)] {
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    which(GGUF_SPLIT_EXECUTABLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn which_finds_sh() {
        assert!(which("sh").is_some());
        assert!(which("definitely-not-a-real-tool-xyz").is_none());
    }

    #[test]
    fn custom_file_path_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = tmp.path().join(GGUF_SPLIT_EXECUTABLE);
        std::fs::write(&tool, b"#!/bin/sh\n").unwrap();

        assert_eq!(find_gguf_split(Some(&tool)), Some(tool.clone()));
        // Directory form resolves to the same binary.
        assert_eq!(find_gguf_split(Some(tmp.path())), Some(tool.clone()));

        // bin/ subdirectory form.
        let nested = tempfile::tempdir().unwrap();
        let bin = nested.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let nested_tool = bin.join(GGUF_SPLIT_EXECUTABLE);
        std::fs::write(&nested_tool, b"#!/bin/sh\n").unwrap();
        assert_eq!(find_gguf_split(Some(nested.path())), Some(nested_tool));
    }
}
