//! CLI command modules.

pub mod bundles;
pub mod http;
pub mod status;
