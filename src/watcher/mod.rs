//! Directory watching: registration, polling, and event normalization.
//!
//! # Architecture
//!
//! ```text
//! NotificationSource (notify + channel, or a scripted test source)
//!         |
//!   PathWatchRegistry  — handle <-> directory bookkeeping, recursive walk
//!         |
//!   normalize::drain   — raw (handle, kind, name) -> Notification{kind, path}
//! ```

mod error;
pub mod normalize;
mod registry;
mod source;

pub use error::WatchError;
pub use normalize::{Notification, NotificationKind};
pub use registry::{PathWatchRegistry, WatchedDir};
pub use source::{NotificationSource, NotifySource, RawEvent, RawEventKind, WatchHandle};
