pub mod compile;
pub mod project;
pub mod references;

use once_cell::sync::Lazy;
use regex::Regex;

pub use compile::{LatexCompiler, PdfRenderer};
pub use project::{copy_dir_recursive, run_item_name, ProjectLayout, RunFolder};
pub use references::{
    insert_references, merge_references, InsertionPoint, Merged, MissingInsertionPoint,
};

/// Literal token template authors place where the bibliography should go.
pub const REFERENCES_MARKER: &str = "REFERENCES HERE";
pub const FILECONTENTS_OPEN: &str = r"\begin{filecontents}{references.bib}";
pub const FILECONTENTS_CLOSE: &str = r"\end{filecontents}";

// Non-greedy body, `.` matches newlines so the block may span any number of lines.
pub(crate) static FILECONTENTS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\begin\{filecontents\}\{references\.bib\}(.*?)\\end\{filecontents\}")
        .expect("Invalid filecontents regex pattern")
});
