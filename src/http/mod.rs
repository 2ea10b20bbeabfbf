//! HTTP protocol layer module
//!
//! Response construction helpers, decoupled from the gateway's business
//! logic.

pub mod response;

// Re-export commonly used builders
pub use response::{
    build_413_response, build_health_response, build_options_response, err_response,
    json_response, passthrough_response,
};
