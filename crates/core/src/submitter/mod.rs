//! Acquisition submitter: hands a chosen locator to the download client and
//! recovers a stable tracking hash for it.

mod submit;
mod types;

pub use submit::Submitter;
pub use types::*;
