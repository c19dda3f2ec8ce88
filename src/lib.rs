pub mod agent;
pub mod error;
pub mod latex;
pub mod model;
pub mod polish;
mod process;
pub mod review;

pub use error::{PolishError, Result};
pub use latex::{insert_references, merge_references, InsertionPoint, MissingInsertionPoint};
pub use model::{select_model, ModelChoice, Provider};
pub use polish::{PolishConfig, PolishReport, Polisher, Step, StepOutcome, WriteupFormat};
