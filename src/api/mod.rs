pub mod assets;
pub mod error;
pub mod generate;
pub mod handler_utils;
pub mod preview;
pub mod rate_limit;
pub mod server;
pub mod validation;
