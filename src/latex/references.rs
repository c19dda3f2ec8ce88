use log::{info, warn};
use regex::NoExpand;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{PolishError, Result};
use crate::latex::{FILECONTENTS_CLOSE, FILECONTENTS_OPEN, FILECONTENTS_REGEX, REFERENCES_MARKER};

/// Where the bibliography ended up in the merged document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Every `REFERENCES HERE` token was replaced by the raw references
    Marker,
    /// The `references.bib` filecontents block body was replaced
    FileContents,
    /// Neither structure was found; the template is returned unchanged
    None,
}

/// What to do when a template has neither the marker nor the filecontents block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingInsertionPoint {
    #[default]
    Error,
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub content: String,
    pub insertion: InsertionPoint,
}

/// Double every backslash so the text survives inside the filecontents block
pub fn escape_backslashes(text: &str) -> String {
    text.replace('\\', "\\\\")
}

/// Merge bibliography text into a LaTeX template.
///
/// A template containing `REFERENCES HERE` gets every occurrence replaced by the
/// raw references. Otherwise each `\begin{filecontents}{references.bib}` block is
/// rebuilt around the backslash-escaped references. A template with neither is
/// returned as-is with [`InsertionPoint::None`].
pub fn merge_references(template: &str, references: &str) -> Merged {
    if template.contains(REFERENCES_MARKER) {
        return Merged {
            content: template.replace(REFERENCES_MARKER, references),
            insertion: InsertionPoint::Marker,
        };
    }

    let block = format!(
        "{}\n{}\n{}",
        FILECONTENTS_OPEN,
        escape_backslashes(references),
        FILECONTENTS_CLOSE
    );
    let insertion = if FILECONTENTS_REGEX.is_match(template) {
        InsertionPoint::FileContents
    } else {
        InsertionPoint::None
    };
    // NoExpand keeps `$` in bibliography text from being read as a capture group
    let content = FILECONTENTS_REGEX
        .replace_all(template, NoExpand(&block))
        .into_owned();

    Merged { content, insertion }
}

/// Read a template and a bibliography file and merge them.
///
/// With `output_path` the merged document is written there (parent directories
/// are created, existing content is replaced) and `None` is returned. Without it
/// nothing is written and the merged text is returned. The output may be the
/// template itself since both inputs are read in full before writing.
pub fn insert_references(
    template_path: &Path,
    reference_path: &Path,
    output_path: Option<&Path>,
    on_missing: MissingInsertionPoint,
) -> Result<Option<String>> {
    let template = fs::read_to_string(template_path)
        .map_err(|e| PolishError::io(template_path, e))?;
    let references = fs::read_to_string(reference_path)
        .map_err(|e| PolishError::io(reference_path, e))?;

    let merged = merge_references(&template, &references);
    if merged.insertion == InsertionPoint::None {
        match on_missing {
            MissingInsertionPoint::Error => {
                return Err(PolishError::NoInjectionPoint(template_path.to_path_buf()))
            }
            MissingInsertionPoint::Keep => {
                warn!(
                    "No insertion point for references in {:?}; template left unchanged",
                    template_path
                );
            }
        }
    }

    let Some(output_path) = output_path else {
        return Ok(Some(merged.content));
    };

    write_atomically(output_path, &merged.content)?;
    info!("References have been inserted. Output saved to {:?}", output_path);
    Ok(None)
}

/// Replace the output's content through a sibling temp file so a failed write never
/// truncates it. An existing output keeps its permissions and is written through
/// symlinks; a new one is created like any other file.
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let Ok(metadata) = fs::metadata(path) else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PolishError::io(parent, e))?;
        }
        return fs::write(path, content).map_err(|e| PolishError::io(path, e));
    };

    let target = fs::canonicalize(path).map_err(|e| PolishError::io(path, e))?;
    let parent = target.parent().unwrap_or(Path::new("."));

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| PolishError::io(parent, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| PolishError::io(tmp.path(), e))?;
    tmp.as_file()
        .set_permissions(metadata.permissions())
        .map_err(|e| PolishError::io(tmp.path(), e))?;
    tmp.persist(&target)
        .map_err(|e| PolishError::io(&target, e.error))?;
    Ok(())
}
