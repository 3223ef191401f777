//! Pure link classifier.

use thiserror::Error;

use super::types::{DownloadItem, Outcome};

const PHOTO_MARKER: &str = "/photo/";
const VIDEO_MARKER: &str = "/video/";
const OWNER_MARKER: char = '@';
const UNKNOWN_OWNER: &str = "user";

/// Non-fatal oddities found while classifying a link.
///
/// The item is still produced with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationAnomaly {
    #[error("link has neither a /video/ nor a /photo/ segment, treating as video")]
    MissingMediaMarker,

    #[error("link has no @handle segment, using owner \"user\"")]
    MissingOwner,

    #[error("link has an empty last path segment")]
    EmptyVideoId,
}

/// Classify a raw link into a pending [`DownloadItem`].
///
/// Total over any input: malformed links still classify, with defaults.
pub fn classify(raw_link: &str) -> DownloadItem {
    classify_checked(raw_link).0
}

/// Classify a raw link and also report the defaults that had to be applied.
pub fn classify_checked(raw_link: &str) -> (DownloadItem, Vec<ClassificationAnomaly>) {
    let mut anomalies = Vec::new();

    let source_url = strip_query(raw_link.trim()).to_string();

    let video_id = source_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    if video_id.is_empty() {
        anomalies.push(ClassificationAnomaly::EmptyVideoId);
    }

    let is_photo = source_url.contains(PHOTO_MARKER);
    if !is_photo && !source_url.contains(VIDEO_MARKER) {
        anomalies.push(ClassificationAnomaly::MissingMediaMarker);
    }

    let owner_username = match owner_segment(&source_url) {
        Some(owner) => owner.to_string(),
        None => {
            anomalies.push(ClassificationAnomaly::MissingOwner);
            UNKNOWN_OWNER.to_string()
        }
    };

    let item = DownloadItem {
        video_id,
        owner_username,
        is_photo,
        source_url,
        outcome: Outcome::Pending,
        recorded_at: None,
        destination_path: None,
    };

    (item, anomalies)
}

fn strip_query(link: &str) -> &str {
    match link.find('?') {
        Some(idx) => &link[..idx],
        None => link,
    }
}

/// The `@handle` segment, if it is usable as a directory name.
fn owner_segment(url: &str) -> Option<&str> {
    let (_, after) = url.split_once(OWNER_MARKER)?;
    let owner = after.split('/').next().unwrap_or_default();
    if owner.is_empty() || owner == "." || owner == ".." || owner.contains('\\') {
        None
    } else {
        Some(owner)
    }
}
