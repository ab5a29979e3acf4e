pub mod artifacts;
pub mod bridge;
pub mod session;

pub use artifacts::{FailureKey, capture_failure};
pub use bridge::TestBridge;
pub use session::{BrowserConfig, BrowserKind, new_session};
