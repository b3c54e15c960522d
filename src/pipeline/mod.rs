//! Pipeline orchestration
//!
//! - **trigger**: what started the run (CI variables)
//! - **output**: the frozen pre-setup payload shared by every stage
//! - **matrix**: stage membership
//! - **outcome**: vendor result normalization
//! - **runner**: executing matrix entries
//! - **coordinator**: the stage state machine

pub mod coordinator;
pub mod matrix;
pub mod outcome;
pub mod output;
pub mod runner;
pub mod trigger;

pub use coordinator::{Coordinator, PipelineRun, PipelineState, StageResults};
pub use matrix::{MatrixEntry, Stage};
pub use outcome::StageOutcome;
pub use output::{PreSetupOutput, ReleaseInfo};
pub use runner::{ShellRunner, StageRunner};
pub use trigger::{Trigger, TriggerKind};
