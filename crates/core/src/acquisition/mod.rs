//! Media acquisition through third-party downloader pages.

pub mod probe;
mod site;
mod types;

pub use site::SiteBackend;
pub use types::{AcquisitionBackend, AcquisitionError, AcquisitionOutcome};
