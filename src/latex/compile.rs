use async_trait::async_trait;
use log::{info, warn};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{PolishError, Result};
use crate::process::{run_with_timeout, tail, RunError};

/// Renders the LaTeX writeup in a directory to a PDF
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, latex_dir: &Path, output_pdf: &Path) -> Result<()>;
}

/// Runs the pdflatex / bibtex / pdflatex / pdflatex sequence on `<main>.tex`
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    pdflatex: String,
    bibtex: String,
    main_file: String,
    timeout: Duration,
}

impl Default for LatexCompiler {
    fn default() -> Self {
        Self {
            pdflatex: "pdflatex".to_string(),
            bibtex: "bibtex".to_string(),
            main_file: "template".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl LatexCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_binaries(mut self, pdflatex: impl Into<String>, bibtex: impl Into<String>) -> Self {
        self.pdflatex = pdflatex.into();
        self.bibtex = bibtex.into();
        self
    }

    fn passes(&self) -> Vec<(String, Vec<String>)> {
        let tex = format!("{}.tex", self.main_file);
        let pdflatex = || {
            (
                self.pdflatex.clone(),
                vec!["-interaction=nonstopmode".to_string(), tex.clone()],
            )
        };
        vec![
            pdflatex(),
            (self.bibtex.clone(), vec![self.main_file.clone()]),
            pdflatex(),
            pdflatex(),
        ]
    }
}

#[async_trait]
impl PdfRenderer for LatexCompiler {
    async fn render(&self, latex_dir: &Path, output_pdf: &Path) -> Result<()> {
        for (program, args) in self.passes() {
            let mut cmd = Command::new(&program);
            cmd.args(&args).current_dir(latex_dir);

            match run_with_timeout(cmd, self.timeout).await {
                Ok(output) if output.status.success() => {}
                // LaTeX exits non-zero on recoverable errors; later passes may still produce a PDF
                Ok(output) => warn!(
                    "{} exited with {}:\n{}",
                    program,
                    output.status,
                    tail(&output.stdout, 20)
                ),
                Err(RunError::Timeout(t)) => {
                    warn!("LaTeX pass {} timed out after {} seconds", program, t.as_secs())
                }
                Err(e) => return Err(PolishError::RenderFailed(format!("{}: {}", program, e))),
            }
        }

        let built = latex_dir.join(format!("{}.pdf", self.main_file));
        if !built.is_file() {
            return Err(PolishError::RenderFailed(format!(
                "{:?} was not produced",
                built
            )));
        }
        move_file(&built, output_pdf)?;
        info!("PDF written to {:?}", output_pdf);
        Ok(())
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PolishError::io(parent, e))?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    fs::copy(from, to).map_err(|e| PolishError::io(to, e))?;
    fs::remove_file(from).map_err(|e| PolishError::io(from, e))?;
    Ok(())
}
