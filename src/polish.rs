//! The polish run: copy the template, rewrite the paper, review it, and
//! optionally improve it from the review.
//!
//! Failures of the external collaborators never escape [`Polisher::run`]; each
//! stage is recorded as a [`StepOutcome`] and the report carries the overall
//! success flag. Only setting up the run folder can fail the whole call.

use chrono::Local;
use log::{error, info};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::agent::{WriteupAgent, WriteupRequest};
use crate::error::{PolishError, Result};
use crate::latex::{insert_references, MissingInsertionPoint, PdfRenderer, ProjectLayout, RunFolder};
use crate::model::ModelChoice;
use crate::review::{review_summary, save_review, ReviewParams, Reviewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteupFormat {
    #[default]
    Latex,
}

impl FromStr for WriteupFormat {
    type Err = PolishError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "latex" => Ok(WriteupFormat::Latex),
            other => Err(PolishError::UnsupportedWriteup(other.to_string())),
        }
    }
}

impl fmt::Display for WriteupFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteupFormat::Latex => f.write_str("latex"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolishConfig {
    pub layout: ProjectLayout,
    pub model: ModelChoice,
    pub writeup: WriteupFormat,
    pub improvement: bool,
    pub review_params: ReviewParams,
    pub on_missing_references: MissingInsertionPoint,
}

impl PolishConfig {
    pub fn new(layout: ProjectLayout, model: ModelChoice) -> Self {
        Self {
            layout,
            model,
            writeup: WriteupFormat::Latex,
            improvement: true,
            review_params: ReviewParams::default(),
            on_missing_references: MissingInsertionPoint::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Writeup,
    Review,
    Improvement,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Writeup => "writeup",
            Step::Review => "review",
            Step::Improvement => "improvement",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: Step,
    pub success: bool,
    pub message: String,
}

impl StepOutcome {
    fn ok(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            success: true,
            message: message.into(),
        }
    }

    fn failed(step: Step, err: &PolishError) -> Self {
        let message = format!("Failed to perform {}: {}", step, err);
        error!("{}", message);
        Self {
            step,
            success: false,
            message,
        }
    }
}

#[derive(Debug)]
pub struct PolishReport {
    pub run_folder: RunFolder,
    pub outcomes: Vec<StepOutcome>,
    pub success: bool,
}

impl PolishReport {
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step == step)
    }
}

pub struct Polisher<A, R, P> {
    agent: A,
    reviewer: R,
    renderer: P,
}

impl<A, R, P> Polisher<A, R, P>
where
    A: WriteupAgent,
    R: Reviewer,
    P: PdfRenderer,
{
    pub fn new(agent: A, reviewer: R, renderer: P) -> Self {
        Self {
            agent,
            reviewer,
            renderer,
        }
    }

    /// Create a fresh run folder for `config` and polish it
    pub async fn polish(&self, config: &PolishConfig) -> Result<PolishReport> {
        let run = config.layout.create_run_folder(Local::now().naive_local())?;
        Ok(self.run(config, run).await)
    }

    /// Polish an already prepared run folder
    pub async fn run(&self, config: &PolishConfig, run: RunFolder) -> PolishReport {
        info!("source_latex: {:?}", run.source_latex());
        info!("source_reference: {:?}", run.source_reference());
        info!("*Starting project: {}*", run.item_name);

        let mut outcomes = Vec::new();
        let success = self.run_steps(config, &run, &mut outcomes).await;
        info!("FINISHED PROJECT");

        PolishReport {
            run_folder: run,
            outcomes,
            success,
        }
    }

    async fn run_steps(
        &self,
        config: &PolishConfig,
        run: &RunFolder,
        outcomes: &mut Vec<StepOutcome>,
    ) -> bool {
        info!("*Starting Writeup*");
        let request = match self.writeup(config, run).await {
            Ok(request) => {
                outcomes.push(StepOutcome::ok(Step::Writeup, "Done writeup"));
                request
            }
            Err(e) => {
                outcomes.push(StepOutcome::failed(Step::Writeup, &e));
                return false;
            }
        };

        info!("*Starting Review*");
        let review = match self.review(config, run).await {
            Ok(review) => {
                outcomes.push(StepOutcome::ok(Step::Review, "Done review"));
                review
            }
            Err(e) => {
                outcomes.push(StepOutcome::failed(Step::Review, &e));
                return false;
            }
        };

        if config.improvement {
            info!("*Starting Improvement*");
            // a failed improvement is reported but keeps the run successful
            match self.improve(config, run, &request, &review).await {
                Ok(()) => outcomes.push(StepOutcome::ok(Step::Improvement, "Done improvement")),
                Err(e) => outcomes.push(StepOutcome::failed(Step::Improvement, &e)),
            }
        }
        true
    }

    async fn writeup(&self, config: &PolishConfig, run: &RunFolder) -> Result<WriteupRequest> {
        let writeup_file = match config.writeup {
            WriteupFormat::Latex => run.writeup_file(),
        };
        let source_reference = run.source_reference();
        insert_references(
            &writeup_file,
            &source_reference,
            Some(&writeup_file),
            config.on_missing_references,
        )?;

        let request = WriteupRequest {
            project_name: run.project_name.clone(),
            files: vec![writeup_file, run.source_latex(), source_reference],
            model: config.model.agent_model(),
            chat_history: run.chat_history_file(),
            working_dir: run.root.clone(),
        };
        self.agent.write_paper(&request).await?;
        self.renderer.render(&run.latex_dir(), &run.paper_pdf()).await?;
        Ok(request)
    }

    async fn review(&self, config: &PolishConfig, run: &RunFolder) -> Result<Value> {
        let review = self
            .reviewer
            .review(&run.paper_pdf(), &config.model.client_model, &config.review_params)
            .await?;
        if let Some(summary) = review_summary(&review) {
            info!("Review: {}", summary);
        }
        save_review(&run.review_file(), &review, true)?;
        Ok(review)
    }

    async fn improve(
        &self,
        config: &PolishConfig,
        run: &RunFolder,
        request: &WriteupRequest,
        review: &Value,
    ) -> Result<()> {
        self.agent.improve(request, review).await?;
        self.renderer.render(&run.latex_dir(), &run.improved_pdf()).await?;

        let improved = self
            .reviewer
            .review(&run.improved_pdf(), &config.model.client_model, &config.review_params)
            .await?;
        if let Some(summary) = review_summary(&improved) {
            info!("Improved review: {}", summary);
        }
        save_review(&run.improved_review_file(), &improved, false)
    }
}
