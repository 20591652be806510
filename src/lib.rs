//! Download or upload Gmail attachments of chosen document types within a
//! date range, keeping a JSON log of what was transferred.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod prompt;
pub mod run;
pub mod sink;

pub use error::{Error, Result};
