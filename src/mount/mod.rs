//! Mounting block stores as namespace directories.
//!
//! ```text
//!            mount(id, store)                 unmount / drop
//!  payload ──▶ BlockStore ──▶ <root>/<prefix><id> ──▶ snapshot ──▶ BlockStore
//!                                    │
//!                                    ▼
//!                             git operations
//! ```
//!
//! Each repository id has at most one live mount. Two ids never share a
//! namespace path, and the mount of an id that is already mounted blocks or
//! fails with a conflict, never layering one store over another.

mod error;
mod manager;
mod namespace;

pub use error::{MountError, MountResult};
pub use manager::{MountConfig, MountGuard, MountManager, MountWait};
pub use namespace::Namespace;
