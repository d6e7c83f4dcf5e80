//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl+C/SIGTERM or trigger() → broadcast → server stops accepting → drain → exit
//!
//! Background work (tasks.rs):
//!     cache refreshes, download counters, notifications
//!     → spawned detached, never awaited by a request
//!     → panics logged and dropped
//! ```

pub mod shutdown;
pub mod tasks;

pub use shutdown::Shutdown;
pub use tasks::spawn_detached;
