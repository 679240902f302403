//! # State, Watchers, and Conditional Rendering
//!
//! Sprig keeps one shared key/value state per app and a list of watchers
//! interested in some of its keys. Components are plain nodes in an arena
//! tree; they register watchers, and the runtime keeps the registry in step
//! with the tree.
//!
//! - `App`: the context holding state, options, the watcher registry and
//!   the node tree.
//! - `El`: chainable handle used to build nodes.
//! - `conditional` / `display_when`: mount or show a subtree from a
//!   predicate over the state.
//!
//! ## Bootstrapping and updating
//!
//! ```rust
//! use sprig_core::*;
//! use serde_json::json;
//!
//! let app = app(
//!     |app| {
//!         let label = app.el("p").on_update(["count"], |app, node, s, _| {
//!             app.set_text(node, format!("count = {}", s.get_i64("count").unwrap_or(0)))
//!         })?;
//!         app.el("div").child(label)
//!     },
//!     json!({"count": 0}),
//!     Options::new().strict(true),
//! )?;
//!
//! app.set_key("count", 1)?;
//! app.set_key_with("count", |s| json!(s.get_i64("count").unwrap_or(0) + 1))?;
//! assert_eq!(app.snapshot().get_i64("count"), Some(2));
//! assert!(app.set_key("typo", 1).is_err());
//! # Ok::<(), sprig_core::Error>(())
//! ```
//!
//! ## Watchers
//!
//! A watcher is called with the owning node, a snapshot and the changed
//! keys. An empty key list means "every update". Watchers attached to a node
//! while it is being built are held on the node and only reach the registry
//! when the node is attached under the mount point; a built-but-discarded
//! node leaves nothing behind. When a node is removed, each of its watchers
//! unregisters itself.
//!
//! Updates made from inside a watcher are applied at once, but their
//! notification waits until the running pass is over.
//!
//! ## Conditional rendering
//!
//! ```rust
//! use sprig_core::*;
//! use serde_json::json;
//!
//! let app = app(
//!     |app| {
//!         app.conditional_on(
//!             ["logged_in"],
//!             |s| s.truthy("logged_in"),
//!             |app| Ok(app.el("p").text("welcome back")),
//!         )
//!     },
//!     json!({"logged_in": false}),
//!     Options::default(),
//! )?;
//!
//! let container = app.root().unwrap();
//! assert!(app.children_of(container).is_empty());
//! app.set_key("logged_in", true)?;
//! assert_eq!(app.children_of(container).len(), 1);
//! # Ok::<(), sprig_core::Error>(())
//! ```

pub mod app;
pub mod conditional;
pub mod dispatch;
pub mod element;
pub mod error;
pub mod lifecycle;
pub mod prelude;
pub mod state;
pub mod storage;
pub mod tree;
pub mod watcher;

pub use app::{App, AppBuilder, app};
pub use conditional::ChangeFn;
pub use element::{BUILTIN_TAGS, ComponentFn, El};
pub use error::{Error, Result};
pub use state::{
    CREATED_KEY, INIT_KEY, KEY_DELIMITER, Options, RESERVED_PREFIX, ROUTE_KEY, Snapshot,
    StateMap, is_reserved, join_key,
};
pub use storage::{FileStorage, MemoryStorage, STORAGE_KEY, Storage};
pub use tree::{DestroyFn, EventFn, Node, NodeId};
pub use watcher::{WatchFn, WatchKeys, WatcherId};
