use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolishError {
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No insertion point for references found in {0:?}: expected 'REFERENCES HERE' or a filecontents block for references.bib")]
    NoInjectionPoint(PathBuf),

    #[error("Model {0} not supported.")]
    UnsupportedModel(String),

    #[error("Environment variable {0} must be set for the selected model")]
    MissingCredential(&'static str),

    #[error("Writeup format {0} not supported.")]
    UnsupportedWriteup(String),

    #[error("Template directory {0:?} does not exist")]
    TemplateNotFound(PathBuf),

    #[error("Folder {0:?} already exists.")]
    RunFolderExists(PathBuf),

    #[error("Writeup agent failed: {0}")]
    AgentFailed(String),

    #[error("Review failed: {0}")]
    ReviewFailed(String),

    #[error("PDF rendering failed: {0}")]
    RenderFailed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PolishError {
    /// Attach the offending path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PolishError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PolishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = PolishError::io(
            "latex/template.tex",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("latex/template.tex"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn unsupported_model_message() {
        let err = PolishError::UnsupportedModel("gpt-2".into());
        assert_eq!(err.to_string(), "Model gpt-2 not supported.");
    }
}
