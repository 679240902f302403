pub use crate::app::{App, AppBuilder, app};
pub use crate::element::El;
pub use crate::error::{Error, Result};
pub use crate::state::{CREATED_KEY, INIT_KEY, Options, ROUTE_KEY, Snapshot};
pub use crate::storage::{FileStorage, MemoryStorage, Storage};
pub use crate::tree::NodeId;
pub use crate::watcher::WatchKeys;
pub use serde_json::{Value, json};
