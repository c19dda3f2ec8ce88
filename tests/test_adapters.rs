use paperpolish::agent::{AiderAgent, WriteupAgent, WriteupRequest};
use paperpolish::latex::{LatexCompiler, PdfRenderer};
use paperpolish::review::{CommandReviewer, ReviewParams, Reviewer};
use paperpolish::PolishError;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn request(dir: &Path) -> WriteupRequest {
    WriteupRequest {
        project_name: "demo".into(),
        files: vec![dir.join("template.tex")],
        model: "gpt-4o-2024-08-06".into(),
        chat_history: dir.join("demo_aider.txt"),
        working_dir: dir.to_path_buf(),
    }
}

#[cfg(unix)]
fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn test_reviewer_parses_json_stdout() {
    let dir = tempdir().unwrap();
    let bin = script(dir.path(), "review.sh", r#"echo '{"Overall": 4, "Decision": "Reject"}'"#);

    let review = CommandReviewer::new(bin)
        .review(Path::new("paper.pdf"), "gpt-4o", &ReviewParams::default())
        .await
        .unwrap();
    assert_eq!(review, json!({"Overall": 4, "Decision": "Reject"}));
}

#[cfg(unix)]
#[tokio::test]
async fn test_reviewer_nonzero_exit_is_a_review_failure() {
    let dir = tempdir().unwrap();
    let bin = script(dir.path(), "review.sh", "echo 'quota exceeded' >&2\nexit 3");

    let err = CommandReviewer::new(bin)
        .review(Path::new("paper.pdf"), "gpt-4o", &ReviewParams::default())
        .await
        .unwrap_err();
    match err {
        PolishError::ReviewFailed(msg) => assert!(msg.contains("quota exceeded"), "{}", msg),
        other => panic!("expected a review failure, got {:?}", other),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_reviewer_plain_text_output_is_a_review_failure() {
    // echo prints its arguments, which is not JSON
    let err = CommandReviewer::new("echo")
        .review(Path::new("paper.pdf"), "gpt-4o", &ReviewParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PolishError::ReviewFailed(ref m) if m.contains("not JSON")));
}

#[cfg(unix)]
#[tokio::test]
async fn test_compiler_moves_built_pdf_to_output() {
    let dir = tempdir().unwrap();
    let latex_dir = dir.path().join("latex");
    fs::create_dir_all(&latex_dir).unwrap();
    fs::write(latex_dir.join("template.pdf"), b"%PDF-1.5").unwrap();
    let output = dir.path().join("demo.pdf");

    LatexCompiler::new()
        .with_binaries("true", "true")
        .render(&latex_dir, &output)
        .await
        .unwrap();

    assert_eq!(fs::read(&output).unwrap(), b"%PDF-1.5");
    assert!(!latex_dir.join("template.pdf").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_compiler_without_pdf_is_a_render_failure() {
    let dir = tempdir().unwrap();
    // failing passes are tolerated, the missing PDF is not
    let err = LatexCompiler::new()
        .with_binaries("false", "false")
        .render(dir.path(), &dir.path().join("demo.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, PolishError::RenderFailed(ref m) if m.contains("was not produced")));
}

#[cfg(unix)]
#[tokio::test]
async fn test_agent_nonzero_exit_is_an_agent_failure() {
    let dir = tempdir().unwrap();
    let err = AiderAgent::new("false")
        .write_paper(&request(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, PolishError::AgentFailed(ref m) if m.contains("exited with")));

    let err = AiderAgent::new("false")
        .improve(&request(dir.path()), &json!({"Overall": 3}))
        .await
        .unwrap_err();
    assert!(matches!(err, PolishError::AgentFailed(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_agent_success_returns_ok() {
    let dir = tempdir().unwrap();
    AiderAgent::new("true")
        .write_paper(&request(dir.path()))
        .await
        .unwrap();
}
