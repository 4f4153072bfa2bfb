//! Architecture classification.
//!
//! GGUF metadata usually names the model family within the first few
//! kilobytes of the file, so a bounded prefix read is cheap and almost
//! always sufficient. When the embedded metadata is absent or
//! unconventional, the filename is the fallback evidence; failing both, the
//! classifier returns the default family rather than erroring — a wrong
//! template is recoverable, a refusal is not.

use std::{
    io::Read,
    path::Path,
    sync::OnceLock,
};

use regex::Regex;

use crate::error::{PrepError, PrepResult};

/// How much of the file to inspect for content signatures.
const PREFIX_LEN: u64 = 16 * 1024;

/// The closed set of supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchKind {
    #[default]
    Llama3,
    Mistral,
    Phi3,
    Gemma2,
    Qwen,
    Nemotron,
}

impl ArchKind {
    pub const ALL: [ArchKind; 6] = [
        ArchKind::Llama3,
        ArchKind::Mistral,
        ArchKind::Phi3,
        ArchKind::Gemma2,
        ArchKind::Qwen,
        ArchKind::Nemotron,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchKind::Llama3 => "llama3",
            ArchKind::Mistral => "mistral",
            ArchKind::Phi3 => "phi3",
            ArchKind::Gemma2 => "gemma2",
            ArchKind::Qwen => "qwen",
            ArchKind::Nemotron => "nemotron",
        }
    }

    /// Comma-separated registered set, for diagnostics.
    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolves an explicitly requested family name. Unknown names fail
    /// listing exactly the registered set.
    pub fn from_name(name: &str) -> PrepResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| PrepError::UnsupportedArchitecture {
                requested: name.to_string(),
                supported: Self::supported(),
            })
    }

    /// Classifies the artifact at `path`. Content evidence wins over the
    /// filename; no evidence at all yields the default family.
    pub fn detect(path: &Path) -> Self {
        let content = read_prefix(path).to_ascii_lowercase();
        for (re, kind) in content_signatures() {
            if re.is_match(&content) {
                return *kind;
            }
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        for (re, kind) in filename_signatures() {
            if re.is_match(&filename) {
                return *kind;
            }
        }

        Self::default()
    }
}

impl std::fmt::Display for ArchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort bounded prefix read, decoded permissively. Unreadable files
/// simply contribute no content evidence.
fn read_prefix(path: &Path) -> String {
    let Ok(file) = std::fs::File::open(path) else {
        return String::new();
    };
    let mut buf = Vec::with_capacity(PREFIX_LEN as usize);
    if file.take(PREFIX_LEN).read_to_end(&mut buf).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn compile(patterns: &[(&str, ArchKind)]) -> Vec<(Regex, ArchKind)> {
    patterns
        .iter()
        .map(|(p, kind)| (Regex::new(p).expect("static regex"), *kind))
        .collect()
}

/// Ordered content signatures; first match wins.
fn content_signatures() -> &'static [(Regex, ArchKind)] {
    static RES: OnceLock<Vec<(Regex, ArchKind)>> = OnceLock::new();
    RES.get_or_init(|| {
        compile(&[
            (r"llama.*3\.[0-9]|llama3|llama-3", ArchKind::Llama3),
            (r"mistral|mixtral", ArchKind::Mistral),
            (r"phi-3|phi3|phi-4|phi4", ArchKind::Phi3),
            (r"gemma.*2|gemma-2", ArchKind::Gemma2),
            (r"qwen.*2|qwen-2", ArchKind::Qwen),
        ])
    })
}

/// Ordered filename signatures, looser than the content set. Nemotron is
/// filename-only: its GGUFs carry llama-family metadata.
fn filename_signatures() -> &'static [(Regex, ArchKind)] {
    static RES: OnceLock<Vec<(Regex, ArchKind)>> = OnceLock::new();
    RES.get_or_init(|| {
        compile(&[
            (r"nemotron", ArchKind::Nemotron),
            (r"llama.*3", ArchKind::Llama3),
            (r"mistral|mixtral", ArchKind::Mistral),
            (r"phi", ArchKind::Phi3),
            (r"gemma", ArchKind::Gemma2),
            (r"qwen", ArchKind::Qwen),
        ])
    })
}
