//! tag-rail: release orchestration driven by a tag ledger
//!
//! The tag namespace of the repository is the only durable record of release
//! state. Each run lists the remote tags, folds them into a [`ledger`], decides
//! which apps release and records its outcome as new tags.

pub mod commands;
pub mod core;
pub mod ledger;
pub mod pipeline;
pub mod release;
pub mod tags;
