//! Collaborators the pipeline calls out to.
//!
//! # Data Flow
//! ```text
//! request headers → auth.rs (session cookie) → disguise gate bypass
//! served request  → notify.rs (Telegram, fire-and-forget)
//!                 → access_log.rs (structured event, when enabled)
//! ```

pub mod access_log;
pub mod auth;
pub mod notify;

pub use access_log::{AccessLogger, AccessRecord, TracingAccessLogger};
pub use auth::{AuthService, SessionCookieAuth};
pub use notify::{AccessMessage, Notifier, TelegramNotifier};
