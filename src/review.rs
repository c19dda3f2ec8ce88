use async_trait::async_trait;
use log::info;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{PolishError, Result};
use crate::process::{run_with_timeout, tail};

/// Sampling parameters of the review routine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewParams {
    pub temperature: f32,
    pub num_reviews_ensemble: u32,
    pub num_reflections: u32,
    pub num_fs_examples: u32,
}

impl Default for ReviewParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            num_reviews_ensemble: 5,
            num_reflections: 5,
            num_fs_examples: 1,
        }
    }
}

/// Scores a rendered paper and returns the review record
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, pdf: &Path, model: &str, params: &ReviewParams) -> Result<Value>;
}

/// Runs an external review command that prints the review as JSON on stdout
#[derive(Debug, Clone)]
pub struct CommandReviewer {
    binary: PathBuf,
    timeout: Duration,
}

impl CommandReviewer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, pdf: &Path, model: &str, params: &ReviewParams) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--pdf")
            .arg(pdf)
            .args(["--model", model])
            .arg("--temperature")
            .arg(params.temperature.to_string())
            .arg("--num-reviews-ensemble")
            .arg(params.num_reviews_ensemble.to_string())
            .arg("--num-reflections")
            .arg(params.num_reflections.to_string())
            .arg("--num-fs-examples")
            .arg(params.num_fs_examples.to_string());
        cmd
    }
}

#[async_trait]
impl Reviewer for CommandReviewer {
    async fn review(&self, pdf: &Path, model: &str, params: &ReviewParams) -> Result<Value> {
        let output = run_with_timeout(self.command(pdf, model, params), self.timeout)
            .await
            .map_err(|e| PolishError::ReviewFailed(format!("{:?}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(PolishError::ReviewFailed(format!(
                "{:?} exited with {}: {}",
                self.binary,
                output.status,
                tail(&output.stderr, 20)
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            PolishError::ReviewFailed(format!("reviewer output is not JSON: {}", e))
        })
    }
}

/// Write a review record, indented by four spaces when `pretty`
pub fn save_review(path: &Path, review: &Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        serde::Serialize::serialize(review, &mut ser)?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        serde_json::to_string(review)?
    };
    fs::write(path, text).map_err(|e| PolishError::io(path, e))?;
    info!("Review saved to {:?}", path);
    Ok(())
}

/// One-line digest of a review for the log, when it carries the usual fields
pub fn review_summary(review: &Value) -> Option<String> {
    let overall = review.get("Overall")?;
    let decision = review
        .get("Decision")
        .and_then(Value::as_str)
        .unwrap_or("n/a");
    Some(format!("Overall: {}, Decision: {}", overall, decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_params_match_the_polish_run() {
        let params = ReviewParams::default();
        assert_eq!(params.num_reflections, 5);
        assert_eq!(params.num_reviews_ensemble, 5);
        assert_eq!(params.num_fs_examples, 1);
        assert!((params.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn save_review_pretty_uses_four_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.txt");
        save_review(&path, &json!({"Overall": 4}), true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n    \"Overall\": 4\n}");

        save_review(&path, &json!({"Overall": 4}), false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"Overall\":4}");
    }

    #[test]
    fn summary_needs_an_overall_score() {
        assert_eq!(
            review_summary(&json!({"Overall": 6, "Decision": "Accept"})).as_deref(),
            Some("Overall: 6, Decision: Accept")
        );
        assert_eq!(review_summary(&json!({"Decision": "Accept"})), None);
    }

    #[test]
    fn command_carries_sampling_parameters() {
        let reviewer = CommandReviewer::new("review-paper");
        let cmd = reviewer.command(Path::new("paper.pdf"), "gpt-4o", &ReviewParams::default());
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "--pdf", "paper.pdf", "--model", "gpt-4o", "--temperature", "0.1",
                "--num-reviews-ensemble", "5", "--num-reflections", "5", "--num-fs-examples", "1",
            ]
        );
    }
}
