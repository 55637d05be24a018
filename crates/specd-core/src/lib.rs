//! Delta-spec parsing, merging, and validation.
//!
//! A change carries delta documents (`## ADDED/MODIFIED/REMOVED/RENAMED
//! Requirements`) against capability specs. [`merge::merge_spec`] rebuilds a
//! single spec; [`archive::prepare`] does so for every spec a change touches
//! and only yields a [`archive::CommitPlan`] once all of them succeed.

pub mod archive;
pub mod bulk;
pub mod config;
pub mod delta;
pub mod document;
pub mod error;
pub mod io;
pub mod merge;
pub mod paths;
pub mod requirement;
pub mod validate;
pub mod workspace;

pub use error::{Result, SpecdError};
