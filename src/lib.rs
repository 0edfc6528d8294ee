//! Archive and browse a chat workspace export.
//!
//! An export (a directory of JSON files, or a fetch from the workspace API) is
//! ingested into an [`export::ExportSnapshot`], persisted gzip-compressed by
//! [`store::Archive`], and rendered per channel as threaded conversations.

pub mod auth;
pub mod config;
pub mod export;
pub mod logging;
pub mod render;
pub mod schedule;
pub mod session;
pub mod slack;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use config::Config;
