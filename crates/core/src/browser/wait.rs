//! Wait-for-condition helpers.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::session::{BrowserSession, ElementRef, Locator, SessionError};

/// Poll `probe` every `interval` until it yields `Some` or `timeout` elapses.
///
/// The probe always runs at least once.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Wait for an element to appear.
///
/// Only "no such element" is retried; other session errors surface at once.
pub async fn wait_for_element(
    session: &mut dyn BrowserSession,
    locator: &Locator,
    timeout: Duration,
    interval: Duration,
) -> Result<ElementRef, SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        match session.find_element(locator).await {
            Ok(element) => return Ok(element),
            Err(SessionError::NoSuchElement(_)) => {}
            Err(e) => return Err(e),
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(SessionError::NoSuchElement(locator.to_string()));
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
