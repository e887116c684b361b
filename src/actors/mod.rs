//! Actor-based persistence of the player cache
//!
//! The server keeps every player in a shared in-memory cache and mutates it
//! on login, logout and registration. A single save actor owns the write
//! path to the store and runs as an independent async task:
//!
//! ```text
//!   server tasks ──write──▶ SharedCache ◀──snapshot── SaveActor ──save_all──▶ PlayerStorage
//!                                                        ▲
//!                                          SaveHandle ───┘ (mpsc commands, oneshot replies)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the actor has an mpsc command channel (`Flush`, `GetStats`, `Shutdown`)
//! 2. **Request/Response**: oneshot channels for replies

pub mod messages;
pub mod saver;

pub use messages::{SaveCommand, SaveStats, SharedCache};
pub use saver::{SaveActor, SaveHandle};
