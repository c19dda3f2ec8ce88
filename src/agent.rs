//! The document-authoring assistant that rewrites the LaTeX writeup.
//!
//! [`WriteupAgent`] is the seam the polish pipeline calls; [`AiderAgent`]
//! drives the `aider` command-line assistant in diff edit mode.

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{PolishError, Result};
use crate::process::{run_with_timeout, tail};

/// Everything the agent needs to edit the writeup of one run
#[derive(Debug, Clone)]
pub struct WriteupRequest {
    pub project_name: String,
    /// Files added to the chat: the writeup first, then the source LaTeX and bibliography
    pub files: Vec<PathBuf>,
    pub model: String,
    pub chat_history: PathBuf,
    pub working_dir: PathBuf,
}

#[async_trait]
pub trait WriteupAgent: Send + Sync {
    /// Rewrite the writeup from the source documents
    async fn write_paper(&self, request: &WriteupRequest) -> Result<()>;

    /// Revise the writeup according to a review record
    async fn improve(&self, request: &WriteupRequest, review: &Value) -> Result<()>;
}

pub fn writeup_prompt(project_name: &str) -> String {
    format!(
        r#"We've provided the `latex/template.tex` file for the paper "{project}".
Rewrite it into a polished research paper using the draft in `sources/source_latex.tex`
and the bibliography in `sources/source_reference.bib`.

Keep the LaTeX structure of the template, keep every section of the draft, and tighten the
prose: remove repetition, fix grammar, and make each paragraph state one clear point.
Only cite keys that exist in the `references.bib` filecontents block of the template, and
do not invent results, figures or references.
Make sure the document still compiles with pdflatex and bibtex."#,
        project = project_name
    )
}

pub fn improvement_prompt(review: &Value) -> Result<String> {
    let review = serde_json::to_string(review)?;
    Ok(format!(
        "The following review has been created for your research paper:\n{}\n\nImprove the text using the review.",
        review
    ))
}

#[derive(Debug, Clone)]
pub struct AiderAgent {
    binary: String,
    timeout: Duration,
}

impl AiderAgent {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: Duration::from_secs(60 * 60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `resume` reloads the run's chat history so a revision sees the earlier writeup session
    fn command(&self, request: &WriteupRequest, message: &str, resume: bool) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&request.working_dir)
            .arg("--yes-always")
            .arg("--no-git")
            .arg("--no-stream")
            .args(["--edit-format", "diff"])
            .arg("--model")
            .arg(&request.model)
            .arg("--chat-history-file")
            .arg(&request.chat_history);
        if resume {
            cmd.arg("--restore-chat-history");
        }
        cmd.arg("--message")
            .arg(message)
            .args(&request.files);
        cmd
    }

    async fn send(&self, request: &WriteupRequest, message: &str, resume: bool) -> Result<()> {
        info!("Running {} with model {}", self.binary, request.model);
        let output = run_with_timeout(self.command(request, message, resume), self.timeout)
            .await
            .map_err(|e| PolishError::AgentFailed(format!("{}: {}", self.binary, e)))?;

        debug!("{} output:\n{}", self.binary, tail(&output.stdout, 40));
        if !output.status.success() {
            return Err(PolishError::AgentFailed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                tail(&output.stderr, 20)
            )));
        }
        Ok(())
    }
}

impl Default for AiderAgent {
    fn default() -> Self {
        Self::new("aider")
    }
}

#[async_trait]
impl WriteupAgent for AiderAgent {
    async fn write_paper(&self, request: &WriteupRequest) -> Result<()> {
        self.send(request, &writeup_prompt(&request.project_name), false)
            .await
    }

    async fn improve(&self, request: &WriteupRequest, review: &Value) -> Result<()> {
        self.send(request, &improvement_prompt(review)?, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> WriteupRequest {
        WriteupRequest {
            project_name: "demo".into(),
            files: vec!["latex/template.tex".into(), "sources/source_latex.tex".into()],
            model: "gpt-4o-2024-08-06".into(),
            chat_history: "run_aider.txt".into(),
            working_dir: ".".into(),
        }
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn command_passes_model_history_and_files() {
        let cmd = AiderAgent::default().command(&request(), "hello", false);
        let args = args(&cmd);
        assert_eq!(cmd.as_std().get_program(), "aider");
        let model_at = args.iter().position(|a| a == "--model").unwrap();
        assert_eq!(args[model_at + 1], "gpt-4o-2024-08-06");
        assert!(args.windows(2).any(|w| w == ["--edit-format", "diff"]));
        assert!(args.windows(2).any(|w| w == ["--message", "hello"]));
        assert_eq!(&args[args.len() - 2..], ["latex/template.tex", "sources/source_latex.tex"]);
    }

    #[test]
    fn only_the_revision_restores_chat_history() {
        let agent = AiderAgent::default();
        let writeup = args(&agent.command(&request(), "write", false));
        let revision = args(&agent.command(&request(), "revise", true));

        assert!(!writeup.iter().any(|a| a == "--restore-chat-history"));
        assert!(revision.iter().any(|a| a == "--restore-chat-history"));
        assert!(revision.windows(2).any(|w| w == ["--chat-history-file", "run_aider.txt"]));
    }

    #[test]
    fn improvement_prompt_embeds_review() {
        let prompt = improvement_prompt(&json!({"Decision": "Reject", "Overall": 3})).unwrap();
        assert!(prompt.contains("\"Decision\":\"Reject\""));
        assert!(prompt.ends_with("Improve the text using the review."));
    }

    #[tokio::test]
    async fn missing_binary_is_an_agent_failure() {
        let agent = AiderAgent::new("paperpolish-no-such-aider");
        let err = agent.write_paper(&request()).await.unwrap_err();
        assert!(matches!(err, PolishError::AgentFailed(_)));
    }
}
