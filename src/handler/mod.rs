//! Request handler module
//!
//! Hosts the gateway function: inbound request extraction, the validation
//! ladder, and delegation to the face-detection capability.

pub mod gateway;

// Re-export main entry point
pub use gateway::handle_request;
