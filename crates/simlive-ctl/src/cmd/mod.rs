//! CLI command modules.

pub mod http;
pub mod model;
pub mod sessions;
pub mod status;
