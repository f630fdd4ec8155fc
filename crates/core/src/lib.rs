//! Shared vocabulary for the hubward crates: repository identifiers, the publish
//! configuration, transfer events and the error taxonomy.

pub mod error;
pub mod manifest;
pub mod protocol;

pub use error::HubwardError;
