//! Ollama registration collaborator.
//!
//! Thin captured-output wrappers around the `ollama` CLI. Non-zero exits
//! surface the tool's combined output; interpretation is left to the caller.

use std::{path::Path, process::Command};

use crate::error::{PrepError, PrepResult};

const OLLAMA_EXECUTABLE: &str = "ollama";
const OLLAMA_REMEDIATION: &str =
    "Install Ollama from https://ollama.ai and make sure the daemon is running";

pub fn ensure_available() -> PrepResult<()> {
    if crate::tools::which(OLLAMA_EXECUTABLE).is_none() {
        return Err(PrepError::ToolNotFound {
            tool: OLLAMA_EXECUTABLE,
            remediation: OLLAMA_REMEDIATION,
        });
    }
    Ok(())
}

pub fn create_model(model_name: &str, modelfile: &Path) -> PrepResult<String> {
    run(&[
        "create",
        model_name,
        "-f",
        &modelfile.to_string_lossy(),
    ])
}

pub fn list_models() -> PrepResult<String> {
    run(&["list"])
}

pub fn run_model(model_name: &str, prompt: &str) -> PrepResult<String> {
    run(&["run", model_name, prompt])
}

fn run(args: &[&str]) -> PrepResult<String> {
    let out = Command::new(OLLAMA_EXECUTABLE)
        .args(args)
        .output()
        .map_err(|e| PrepError::file_system("spawn ollama", OLLAMA_EXECUTABLE, e))?;

    let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&out.stderr);
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }

    if !out.status.success() {
        return Err(PrepError::ExternalTool {
            tool: OLLAMA_EXECUTABLE,
            status: out.status.to_string(),
            output: combined,
        });
    }
    Ok(combined)
}
