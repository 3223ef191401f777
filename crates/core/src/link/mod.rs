//! Link classification.
//!
//! Turns a raw profile link into a [`DownloadItem`], the identity unit the
//! rest of the engine works with.

mod classifier;
mod types;

pub use classifier::{classify, classify_checked, ClassificationAnomaly};
pub use types::{DownloadItem, MediaKind, Outcome};
