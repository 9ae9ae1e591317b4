//! Filesystem side effects: configuration, the shared output tree, claims
//! and result persistence.

pub mod claim;
pub mod config;
pub mod layout;
pub mod run_log;
pub mod survey;
