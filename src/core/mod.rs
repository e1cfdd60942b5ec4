//! Core device types
//!
//! - IdentitySet: bounded pool of endpoint identifiers
//! - Endpoint: identifier + ring buffer, teardown sequence
//! - EndpointTable: id -> endpoint map owned by the control service

pub mod endpoint;
pub mod identity;
pub mod table;

pub use endpoint::{Endpoint, Teardown};
pub use identity::{EndpointId, IdentitySet, CONTROL_ENDPOINT_ID};
pub use table::EndpointTable;
