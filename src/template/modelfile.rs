//! Modelfile rendering — the configuration blob handed to `ollama create`.
//!
//! Directive ordering is load-bearing in one place: when a context length is
//! set, `PARAMETER num_ctx` must appear immediately before the fixed
//! `PARAMETER num_predict -1` line; Ollama's Modelfile parser reads them as
//! a pair.

use std::path::Path;

use crate::{
    arch::ArchKind,
    error::{PrepError, PrepResult},
};

/// Caller-supplied customization, layered onto the family defaults.
#[derive(Debug, Clone)]
pub struct ModelfileOptions {
    /// `num_ctx`; must be positive when set. When unset, no directive is
    /// emitted and Ollama/model defaults apply.
    pub context_length: Option<i64>,
    pub temperature: f32,
    /// Appended after the family's stop tokens; duplicates suppressed.
    pub extra_stop: Vec<String>,
    /// Overrides the family's default system message.
    pub system_message: Option<String>,
}

impl Default for ModelfileOptions {
    fn default() -> Self {
        Self {
            context_length: None,
            temperature: 0.7,
            extra_stop: Vec::new(),
            system_message: None,
        }
    }
}

/// Renders a Modelfile for `artifact` using the family's registered
/// template descriptor.
pub fn render_modelfile(
    artifact: &Path,
    kind: ArchKind,
    opts: &ModelfileOptions,
) -> PrepResult<String> {
    if let Some(n) = opts.context_length {
        if n <= 0 {
            return Err(PrepError::InvalidConfiguration {
                field: "context length",
                reason: format!("must be a positive integer, got {n}"),
            });
        }
    }

    let desc = super::descriptor(kind)?;

    let mut out: Vec<String> = vec![
        "# Generated by ollama-prep".to_string(),
        format!("# Architecture: {kind}"),
        String::new(),
        format!("FROM {}", artifact.display()),
        String::new(),
        format!("TEMPLATE \"\"\"{}\"\"\"", desc.chat_template),
        String::new(),
    ];

    if let (Some(renderer), Some(parser)) = (desc.renderer, desc.parser) {
        out.push(format!("RENDERER {renderer}"));
        out.push(format!("PARSER {parser}"));
        out.push(String::new());
    }

    let stops = layered_stops(&desc.stop_tokens, &opts.extra_stop);
    if !stops.is_empty() {
        out.push("# Stop sequences".to_string());
        for stop in stops {
            out.push(format!("PARAMETER stop \"{stop}\""));
        }
        out.push(String::new());
    }

    out.push("# Model parameters".to_string());
    out.push(format!("PARAMETER temperature {}", opts.temperature));
    if let Some(n) = opts.context_length {
        out.push(format!("PARAMETER num_ctx {n}"));
    }
    out.push("PARAMETER num_predict -1".to_string());

    if desc.template_inert {
        // The renderer owns system and tool formatting; a SYSTEM directive
        // would be silently ignored, so it is suppressed outright.
        if opts.system_message.is_some() {
            tracing::warn!("system message ignored for template-inert family {kind}");
        }
    } else {
        let system = opts
            .system_message
            .as_deref()
            .or(desc.system_message)
            .unwrap_or_default();
        out.push(String::new());
        out.push("# System message".to_string());
        out.push(format!("SYSTEM \"\"\"{system}\"\"\""));
    }

    out.push(String::new());
    Ok(out.join("\n"))
}

/// Family defaults first, then extras, first-seen order, duplicates dropped.
fn layered_stops<'a>(defaults: &'a [&'a str], extras: &'a [String]) -> Vec<&'a str> {
    let mut seen = std::collections::HashSet::new();
    defaults
        .iter()
        .copied()
        .chain(extras.iter().map(|s| s.as_str()))
        .filter(|stop| seen.insert(*stop))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ModelfileOptions {
        ModelfileOptions::default()
    }

    #[test]
    fn default_family_renders_full_template_without_renderer() {
        // Scenario: an artifact with no recognizable evidence classifies to
        // the default family and gets its complete generic template.
        let text =
            render_modelfile(Path::new("/models/weights.gguf"), ArchKind::Llama3, &opts())
                .unwrap();
        assert!(text.contains("FROM /models/weights.gguf"));
        assert!(text.contains("<|start_header_id|>"));
        assert!(text.contains("PARAMETER stop \"<|eot_id|>\""));
        assert!(text.contains("SYSTEM \"\"\""));
        assert!(!text.contains("RENDERER"));
        assert!(!text.contains("PARSER"));
        assert!(!text.contains("num_ctx"));
    }

    #[test]
    fn num_ctx_sits_immediately_before_num_predict() {
        let mut options = opts();
        options.context_length = Some(8192);
        let text =
            render_modelfile(Path::new("/m.gguf"), ArchKind::Qwen, &options).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let ctx_idx = lines
            .iter()
            .position(|l| *l == "PARAMETER num_ctx 8192")
            .expect("num_ctx line");
        assert_eq!(lines[ctx_idx + 1], "PARAMETER num_predict -1");
    }

    #[test]
    fn omitted_context_length_emits_no_num_ctx() {
        let text = render_modelfile(Path::new("/m.gguf"), ArchKind::Mistral, &opts()).unwrap();
        assert!(!text.contains("num_ctx"));
        assert!(text.contains("PARAMETER num_predict -1"));
    }

    #[test]
    fn non_positive_context_length_is_rejected() {
        for bad in [0, -1, -4096] {
            let mut options = opts();
            options.context_length = Some(bad);
            let err =
                render_modelfile(Path::new("/m.gguf"), ArchKind::Llama3, &options).unwrap_err();
            assert!(matches!(err, PrepError::InvalidConfiguration { .. }), "{bad}");
        }
    }

    #[test]
    fn extra_stops_append_without_duplicates() {
        let mut options = opts();
        options.extra_stop = vec![
            "<|eot_id|>".to_string(), // duplicate of a family default
            "<|start_of_turn|>".to_string(),
        ];
        let text = render_modelfile(Path::new("/m.gguf"), ArchKind::Llama3, &options).unwrap();
        assert_eq!(text.matches("PARAMETER stop \"<|eot_id|>\"").count(), 1);
        assert!(text.contains("PARAMETER stop \"<|start_of_turn|>\""));

        // Family defaults come first.
        let first_stop = text
            .lines()
            .find(|l| l.starts_with("PARAMETER stop"))
            .unwrap();
        assert_eq!(first_stop, "PARAMETER stop \"<|start_header_id|>\"");
    }

    #[test]
    fn caller_system_message_overrides_family_default() {
        let mut options = opts();
        options.system_message = Some("Custom guidance.".to_string());
        let text = render_modelfile(Path::new("/m.gguf"), ArchKind::Phi3, &options).unwrap();
        assert!(text.contains("SYSTEM \"\"\"Custom guidance.\"\"\""));
        assert!(!text.contains(super::super::SYSTEM_MESSAGE));
    }

    #[test]
    fn template_inert_family_suppresses_system_and_emits_renderer() {
        let mut options = opts();
        options.system_message = Some("should be dropped".to_string());
        let text = render_modelfile(Path::new("/m.gguf"), ArchKind::Nemotron, &options).unwrap();
        assert!(text.contains("RENDERER nemotron"));
        assert!(text.contains("PARSER nemotron"));
        assert!(!text.contains("SYSTEM"));
        assert!(!text.contains("PARAMETER stop"));
    }

    #[test]
    fn temperature_is_emitted_verbatim() {
        let mut options = opts();
        options.temperature = 0.2;
        let text = render_modelfile(Path::new("/m.gguf"), ArchKind::Gemma2, &options).unwrap();
        assert!(text.contains("PARAMETER temperature 0.2"));
    }
}
