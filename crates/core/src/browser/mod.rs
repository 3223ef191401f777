//! Browser automation sessions and the per-run session pool.

mod pool;
mod session;
pub mod wait;
mod webdriver;

pub use pool::{SessionPool, SessionSlot};
pub use session::{BrowserSession, ElementRef, Locator, ScriptArg, SessionError, SessionFactory};
pub use webdriver::{capabilities, WebDriverSession, WebDriverSessionFactory};
