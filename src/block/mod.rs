//! Block storage for repository filesystems.
//!
//! A repository's working tree and `.git` directory are kept as a flat
//! [`BlockStore`]. The layout module decides which block holds what;
//! `materialize` and `capture` move a store onto disk and back.
//!
//! ```text
//!   BlockStore ──materialize──▶ namespace directory ──capture──▶ BlockStore
//! ```

mod error;
mod layout;
mod materialize;
mod store;

pub use error::{LayoutError, LayoutResult};
pub use layout::{is_valid_entry_name, DirListing, Inode, NodeKind, ROOT_INODE};
pub use materialize::{capture, materialize, validate};
pub use store::{BlockKey, BlockStore};
