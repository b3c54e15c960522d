//! Release management on top of the tag ledger
//!
//! - **decision**: which apps release for a trigger
//! - **bump**: recording the next version (`-bump` tags)
//! - **queue**: re-requesting a pending release (`-queue` tags)
//! - **notes**: release notes from conventional commits
//! - **host**: draft release containers (`gh` or no-op)
//! - **archive**: versioned copies of build output with checksums

pub mod archive;
pub mod bump;
pub mod decision;
pub mod host;
pub mod notes;
pub mod queue;

pub use bump::{BumpKind, BumpRequest, apply_bump, plan_bump};
pub use decision::{AppState, ReleaseCandidate, ReleaseDecision, app_state, decide};
pub use host::{GhCliHost, NoopHost, ReleaseHost, host_for};
pub use notes::ReleaseNotes;
pub use queue::queue_release;
