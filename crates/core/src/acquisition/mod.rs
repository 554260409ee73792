//! End-to-end acquisition: interpret text, search, pick a release, submit it
//! and hand it to the download monitor.

mod service;
mod types;

pub use service::AcquisitionService;
pub use types::{AcquisitionError, AcquisitionOutcome, AcquisitionReply};
