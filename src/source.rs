//! Model-source parsing.
//!
//! Users hand us anything from a bare `owner/repo` to a full
//! `https://huggingface.co/...` URL to a pasted `ollama run hf.co/...:Q4_0`
//! command to a plain local path. [`ModelSource::parse`] normalizes all of
//! those into one structured value without touching the filesystem.

use std::{path::PathBuf, sync::OnceLock};

use regex::Regex;

/// A normalized model source: either a Hugging Face repository (with an
/// optional quantization tag taken from a `:Q4_K_M`-style suffix) or a local
/// path left for the caller to resolve.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ModelSource {
    Remote {
        repo_id: String,
        quant_hint: Option<String>,
    },
    Local {
        path: PathBuf,
    },
}

fn wrapper_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*ollama\s+(?:run|pull)\s+(?P<rest>.+)$").expect("static regex")
    })
}

fn hf_host_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:https?://)?(?:hf\.co|huggingface\.co)/").expect("static regex")
    })
}

fn owner_repo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<owner>[^/\s]+)/(?P<repo>[^/\s]+)$").expect("static regex")
    })
}

/// Splits a `repo:Q4_0` segment into the repo name and the optional tag.
fn split_repo_segment(segment: &str) -> (String, Option<String>) {
    match segment.split_once(':') {
        Some((name, suffix)) => {
            let suffix = suffix.trim();
            (
                name.trim().to_string(),
                if suffix.is_empty() {
                    None
                } else {
                    Some(suffix.to_string())
                },
            )
        }
        None => (segment.to_string(), None),
    }
}

impl ModelSource {
    /// Parses a free-form source string. Pure: no filesystem or network
    /// access; an unrecognized token becomes [`ModelSource::Local`] verbatim
    /// and existence is the caller's problem.
    ///
    /// Any token of the exact shape `word/word` is treated as a remote repo
    /// id, even though it is also a legal relative path. This matches the
    /// tool's long-standing behavior; changing it would silently reclassify
    /// inputs, so it stays.
    pub fn parse(input: &str) -> Self {
        let mut s = input.trim();

        // Accept pasted `ollama run ...` / `ollama pull ...` command lines.
        if let Some(caps) = wrapper_re().captures(s) {
            s = caps.name("rest").map(|m| m.as_str()).unwrap_or(s).trim();
        }

        // Only the first whitespace-delimited token matters.
        let token = s.split_whitespace().next().unwrap_or("");

        if hf_host_re().is_match(token) {
            let stripped = hf_host_re().replace(token, "");
            let mut segments = stripped.split('/').filter(|seg| !seg.is_empty());
            if let (Some(owner), Some(repo_segment)) = (segments.next(), segments.next()) {
                let (repo_name, quant_hint) = split_repo_segment(repo_segment);
                return ModelSource::Remote {
                    repo_id: format!("{owner}/{repo_name}"),
                    quant_hint,
                };
            }
        }

        if let Some(caps) = owner_repo_re().captures(token) {
            let owner = &caps["owner"];
            let (repo_name, quant_hint) = split_repo_segment(&caps["repo"]);
            return ModelSource::Remote {
                repo_id: format!("{owner}/{repo_name}"),
                quant_hint,
            };
        }

        ModelSource::Local {
            path: PathBuf::from(token),
        }
    }

    pub fn repo_id(&self) -> Option<&str> {
        match self {
            ModelSource::Remote { repo_id, .. } => Some(repo_id),
            ModelSource::Local { .. } => None,
        }
    }

    pub fn quant_hint(&self) -> Option<&str> {
        match self {
            ModelSource::Remote { quant_hint, .. } => quant_hint.as_deref(),
            ModelSource::Local { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_repo_id() {
        let src = ModelSource::parse("unsloth/Llama-3.2-3B-Instruct-GGUF");
        assert_eq!(
            src,
            ModelSource::Remote {
                repo_id: "unsloth/Llama-3.2-3B-Instruct-GGUF".into(),
                quant_hint: None,
            }
        );
    }

    #[test]
    fn parses_repo_id_with_quant_suffix() {
        let src = ModelSource::parse("unsloth/some-model-GGUF:Q4_K_M");
        assert_eq!(src.repo_id(), Some("unsloth/some-model-GGUF"));
        assert_eq!(src.quant_hint(), Some("Q4_K_M"));
    }

    #[test]
    fn parses_hf_co_url_forms() {
        for input in [
            "hf.co/unsloth/model-GGUF:Q4_0",
            "https://hf.co/unsloth/model-GGUF:Q4_0",
            "https://huggingface.co/unsloth/model-GGUF:Q4_0",
        ] {
            let src = ModelSource::parse(input);
            assert_eq!(src.repo_id(), Some("unsloth/model-GGUF"), "input: {input}");
            assert_eq!(src.quant_hint(), Some("Q4_0"), "input: {input}");
        }
    }

    #[test]
    fn strips_ollama_command_wrapper() {
        let src = ModelSource::parse("ollama run hf.co/owner/repo:Q4_0");
        assert_eq!(src.repo_id(), Some("owner/repo"));
        assert_eq!(src.quant_hint(), Some("Q4_0"));

        let src = ModelSource::parse("ollama pull owner/repo");
        assert_eq!(src.repo_id(), Some("owner/repo"));
    }

    #[test]
    fn only_first_token_is_considered() {
        let src = ModelSource::parse("owner/repo --some-flag");
        assert_eq!(src.repo_id(), Some("owner/repo"));
    }

    #[test]
    fn local_paths_pass_through_verbatim() {
        for input in ["/models/llama.gguf", "model.gguf", "./a/b/c.gguf"] {
            match ModelSource::parse(input) {
                ModelSource::Local { path } => assert_eq!(path, PathBuf::from(input)),
                other => panic!("expected local for {input}, got {other:?}"),
            }
        }
    }

    #[test]
    fn word_slash_word_is_always_remote() {
        // Also a valid relative path, but the remote interpretation wins.
        let src = ModelSource::parse("models/llama.gguf");
        assert_eq!(src.repo_id(), Some("models/llama.gguf"));
    }

    #[test]
    fn empty_quant_suffix_is_dropped() {
        let src = ModelSource::parse("owner/repo:");
        assert_eq!(src.repo_id(), Some("owner/repo"));
        assert_eq!(src.quant_hint(), None);
    }
}
