//! The family-to-template registry.
//!
//! Each supported architecture family maps to one immutable
//! [`TemplateDescriptor`]: the Go-template chat syntax Ollama expects, the
//! family's stop tokens, and a default system message. Families whose turn
//! structure cannot be expressed through the generic template mechanism
//! instead name an external renderer/parser pair; for those the descriptor
//! is *template-inert* — empty stop list, no generic system message or tool
//! preamble, because Ollama silently ignores them once a renderer is set.

mod modelfile;

use std::{collections::HashMap, sync::LazyLock};

pub use modelfile::{render_modelfile, ModelfileOptions};

use crate::{
    arch::ArchKind,
    error::{PrepError, PrepResult},
};

/// Default system message for tool-capable chat templates.
pub const SYSTEM_MESSAGE: &str = "You are a helpful AI assistant with tool calling capabilities. \
     You can help with code, answer questions, and use tools when needed.";

/// Guidance spliced into each template's `{{- if .Tools }}` block.
const TOOLS_PREAMBLE: &str = "You are a helpful assistant with tool calling capabilities. When \
     you receive a tool call response, use the output to format an answer to the original user \
     question.";

/// Everything the emitter needs to know about one architecture family.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDescriptor {
    pub chat_template: String,
    /// Ordered, de-duplicated (first-seen). Empty only for template-inert
    /// families.
    pub stop_tokens: Vec<&'static str>,
    pub renderer: Option<&'static str>,
    pub parser: Option<&'static str>,
    pub system_message: Option<&'static str>,
    pub tools_preamble: Option<&'static str>,
    /// Defers all chat/tool formatting to the named renderer/parser; the
    /// emitter must suppress SYSTEM and tool fields.
    pub template_inert: bool,
}

static REGISTRY: LazyLock<HashMap<ArchKind, TemplateDescriptor>> = LazyLock::new(|| {
    HashMap::from([
        (ArchKind::Llama3, llama3()),
        (ArchKind::Mistral, mistral()),
        (ArchKind::Phi3, phi3()),
        (ArchKind::Gemma2, gemma2()),
        (ArchKind::Qwen, qwen()),
        (ArchKind::Nemotron, nemotron()),
    ])
});

/// Resolves the descriptor for a classified family.
pub fn descriptor(kind: ArchKind) -> PrepResult<&'static TemplateDescriptor> {
    REGISTRY
        .get(&kind)
        .ok_or_else(|| PrepError::UnsupportedArchitecture {
            requested: kind.to_string(),
            supported: ArchKind::supported(),
        })
}

fn generic(
    chat_template_parts: &[&str],
    stop_tokens: Vec<&'static str>,
) -> TemplateDescriptor {
    TemplateDescriptor {
        chat_template: chat_template_parts.concat(),
        stop_tokens,
        renderer: None,
        parser: None,
        system_message: Some(SYSTEM_MESSAGE),
        tools_preamble: Some(TOOLS_PREAMBLE),
        template_inert: false,
    }
}

fn llama3() -> TemplateDescriptor {
    generic(
        &[
            "{{ if .Messages }}\n",
            "{{- if or .System .Tools }}<|start_header_id|>system<|end_header_id|>\n",
            "{{- if .System }}\n\n",
            "{{ .System }}\n",
            "{{- end }}\n",
            "{{- if .Tools }}\n\n",
            TOOLS_PREAMBLE,
            "\n",
            "{{- end }}<|eot_id|>\n",
            "{{- end }}\n",
            "{{- range .Messages }}\n",
            "<|start_header_id|>{{ .Role }}<|end_header_id|>\n\n",
            "{{ .Content }}<|eot_id|>\n",
            "{{- end }}\n",
            "{{- else }}\n",
            "<|start_header_id|>system<|end_header_id|>\n\n",
            "{{ .System }}<|eot_id|>\n",
            "<|start_header_id|>user<|end_header_id|>\n\n",
            "{{ .Prompt }}<|eot_id|>\n",
            "<|start_header_id|>assistant<|end_header_id|>\n",
            "{{- end }}",
        ],
        vec!["<|start_header_id|>", "<|end_header_id|>", "<|eot_id|>"],
    )
}

fn mistral() -> TemplateDescriptor {
    generic(
        &[
            "{{ if .Messages }}\n",
            "{{- if or .System .Tools }}[INST]\n",
            "{{- if .System }}{{ .System }}\n",
            "{{- end }}\n",
            "{{- if .Tools }}\n\n",
            TOOLS_PREAMBLE,
            "\n",
            "{{- end }}[/INST]\n",
            "{{- end }}\n",
            "{{- range .Messages }}\n",
            "{{- if eq .Role \"user\" }}[INST] {{ .Content }} [/INST]\n",
            "{{- else if eq .Role \"assistant\" }}{{ .Content }}</s>\n",
            "{{- end }}\n",
            "{{- end }}\n",
            "{{- else }}[INST] {{ if .System }}{{ .System }}\n\n",
            "{{ end }}{{ .Prompt }} [/INST]\n",
            "{{- end }}",
        ],
        vec!["</s>", "[INST]", "[/INST]"],
    )
}

fn phi3() -> TemplateDescriptor {
    generic(
        &[
            "{{ if .Messages }}\n",
            "{{- if or .System .Tools }}<|system|>\n",
            "{{- if .System }}{{ .System }}\n",
            "{{- end }}\n",
            "{{- if .Tools }}\n\n",
            TOOLS_PREAMBLE,
            "\n",
            "{{- end }}<|end|>\n",
            "{{- end }}\n",
            "{{- range .Messages }}\n",
            "<|{{ .Role }}|>\n",
            "{{ .Content }}<|end|>\n",
            "{{- end }}\n",
            "<|assistant|>\n",
            "{{- else }}<|system|>\n",
            "{{ .System }}<|end|>\n",
            "<|user|>\n",
            "{{ .Prompt }}<|end|>\n",
            "<|assistant|>\n",
            "{{- end }}",
        ],
        vec!["<|end|>", "<|system|>", "<|user|>", "<|assistant|>"],
    )
}

fn gemma2() -> TemplateDescriptor {
    generic(
        &[
            "{{ if .Messages }}\n",
            "{{- if or .System .Tools }}<start_of_turn>model\n",
            "{{- if .System }}{{ .System }}\n",
            "{{- end }}\n",
            "{{- if .Tools }}\n\n",
            TOOLS_PREAMBLE,
            "\n",
            "{{- end }}<end_of_turn>\n",
            "{{- end }}\n",
            "{{- range .Messages }}\n",
            "<start_of_turn>{{ .Role }}\n",
            "{{ .Content }}<end_of_turn>\n",
            "{{- end }}\n",
            "<start_of_turn>model\n",
            "{{- else }}<start_of_turn>system\n",
            "{{ .System }}<end_of_turn>\n",
            "<start_of_turn>user\n",
            "{{ .Prompt }}<end_of_turn>\n",
            "<start_of_turn>model\n",
            "{{- end }}",
        ],
        vec!["<end_of_turn>", "<start_of_turn>"],
    )
}

fn qwen() -> TemplateDescriptor {
    generic(
        &[
            "{{ if .Messages }}\n",
            "{{- if or .System .Tools }}<|im_start|>system\n",
            "{{- if .System }}\n",
            "{{ .System }}\n",
            "{{- end }}\n",
            "{{- if .Tools }}\n\n",
            TOOLS_PREAMBLE,
            "\n",
            "{{- end }}<|im_end|>\n",
            "{{- end }}\n",
            "{{- range .Messages }}\n",
            "<|im_start|>{{ .Role }}\n",
            "{{ .Content }}<|im_end|>\n",
            "{{- end }}\n",
            "<|im_start|>assistant\n",
            "{{- else }}<|im_start|>system\n",
            "{{ .System }}<|im_end|>\n",
            "<|im_start|>user\n",
            "{{ .Prompt }}<|im_end|>\n",
            "<|im_start|>assistant\n",
            "{{- end }}",
        ],
        vec!["<|im_start|>", "<|im_end|>"],
    )
}

/// Template-inert: turn and tool-call formatting is delegated entirely to
/// Ollama's named renderer/parser pair, so the template is a bare
/// pass-through and the stop list is empty by design.
fn nemotron() -> TemplateDescriptor {
    TemplateDescriptor {
        chat_template: "{{ .Prompt }}".to_string(),
        stop_tokens: Vec::new(),
        renderer: Some("nemotron"),
        parser: Some("nemotron"),
        system_message: None,
        tools_preamble: None,
        template_inert: true,
    }
}
