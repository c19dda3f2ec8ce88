use chrono::NaiveDateTime;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PolishError, Result};

pub const TEMPLATES_ROOT: &str = "templates";
pub const RESULTS_ROOT: &str = "results";

/// Where a project's template lives and where its runs are written
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_name: String,
    pub base_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl ProjectLayout {
    /// `templates/<project>` and `results/<project>` relative to the working directory
    pub fn new(project_name: impl Into<String>) -> Self {
        Self::with_roots(project_name, TEMPLATES_ROOT, RESULTS_ROOT)
    }

    pub fn with_roots(
        project_name: impl Into<String>,
        templates_root: impl AsRef<Path>,
        results_root: impl AsRef<Path>,
    ) -> Self {
        let project_name = project_name.into();
        Self {
            base_dir: templates_root.as_ref().join(&project_name),
            results_dir: results_root.as_ref().join(&project_name),
            project_name,
        }
    }

    /// Create `<results>/<timestamp>_<project>` and copy the template into it
    pub fn create_run_folder(&self, timestamp: NaiveDateTime) -> Result<RunFolder> {
        if !self.base_dir.is_dir() {
            return Err(PolishError::TemplateNotFound(self.base_dir.clone()));
        }

        let item_name = run_item_name(&self.project_name, timestamp);
        let root = self.results_dir.join(&item_name);
        info!("folder_name: {:?}", root);
        if root.exists() {
            return Err(PolishError::RunFolderExists(root));
        }

        let copied = copy_dir_recursive(&self.base_dir, &root)?;
        debug!("Copied {} files from {:?}", copied, self.base_dir);

        Ok(RunFolder {
            project_name: self.project_name.clone(),
            item_name,
            root,
        })
    }
}

/// A timestamped working copy of a project template
#[derive(Debug, Clone)]
pub struct RunFolder {
    pub project_name: String,
    pub item_name: String,
    pub root: PathBuf,
}

impl RunFolder {
    pub fn latex_dir(&self) -> PathBuf {
        self.root.join("latex")
    }

    /// The writeup the agent edits in place
    pub fn writeup_file(&self) -> PathBuf {
        self.latex_dir().join("template.tex")
    }

    pub fn source_latex(&self) -> PathBuf {
        self.root.join("sources").join("source_latex.tex")
    }

    pub fn source_reference(&self) -> PathBuf {
        self.root.join("sources").join("source_reference.bib")
    }

    pub fn paper_pdf(&self) -> PathBuf {
        self.root.join(format!("{}.pdf", self.project_name))
    }

    pub fn improved_pdf(&self) -> PathBuf {
        self.root.join(format!("{}_improved.pdf", self.project_name))
    }

    pub fn review_file(&self) -> PathBuf {
        self.root.join("review.txt")
    }

    pub fn improved_review_file(&self) -> PathBuf {
        self.root.join("review_improved.txt")
    }

    pub fn chat_history_file(&self) -> PathBuf {
        self.root.join(format!("{}_aider.txt", self.item_name))
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("log.txt")
    }
}

pub fn run_item_name(project_name: &str, timestamp: NaiveDateTime) -> String {
    format!("{}_{}", timestamp.format("%Y%m%d_%H%M%S"), project_name)
}

/// Copy a directory tree, merging into `dst` if it exists. Returns the number of files copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PolishError::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| PolishError::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| PolishError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| PolishError::io(entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
