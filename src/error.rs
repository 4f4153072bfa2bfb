// top-level error for the public API

#[derive(serde::Serialize, Debug, thiserror::Error)]
pub enum PrepError {
    #[error("model source not recognized: '{input}'")]
    InputNotRecognized { input: String },

    #[error("shard merge requested but related shards were not found")]
    ShardSetIncomplete,

    #[error("merge failed ({status}):\n{output}")]
    MergeFailed { status: String, output: String },

    #[error("unsupported architecture '{requested}'. Supported: {supported}")]
    UnsupportedArchitecture { requested: String, supported: String },

    #[error("invalid {field}: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("'{tool}' not found. {remediation}")]
    ToolNotFound {
        tool: &'static str,
        remediation: &'static str,
    },

    #[error("{tool} failed ({status}):\n{output}")]
    ExternalTool {
        tool: &'static str,
        status: String,
        output: String,
    },

    #[error("{operation} failed for '{path}'")]
    FileSystem {
        operation: &'static str,
        path: std::path::PathBuf,
        #[source]
        #[serde(serialize_with = "std_io_error_to_string")]
        source: std::io::Error,
    },
}

pub type PrepResult<T> = std::result::Result<T, PrepError>;

impl PrepError {
    pub fn file_system(
        operation: &'static str,
        path: impl Into<std::path::PathBuf>,
        err: impl Into<std::io::Error>,
    ) -> Self {
        Self::FileSystem {
            operation,
            path: path.into(),
            source: err.into(),
        }
    }
}

pub(crate) fn std_io_error_to_string<S>(e: &impl std::fmt::Display, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&e.to_string())
}
