//! Find critical alert bugs that have no card on the ops
//! board and escalate them.
//!
//! ```text
//! BugSource (Launchpad) ──► open / closed BugMap ─┐
//!                                                  ├─► reconcile ─► UnmatchedSet ─► Dispatcher ─► mail + card
//! BoardSource (Trello) ───► cards ────────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
mod http;
pub mod launchpad;
pub mod mail;
pub mod reconcile;
pub mod run;
pub mod trello;
pub mod types;

pub use error::{CritwatchError, Result};
