//! Watcher registry: who wants to hear about which state keys.

use std::fmt;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::tree::{PendingWatcher, Teardown};
use crate::{App, CREATED_KEY, NodeId, Result, Snapshot};

new_key_type! {
    pub struct WatcherId;
}

/// Called with the owning node, a snapshot taken just before the call and
/// the keys that changed.
pub type WatchFn = Rc<dyn Fn(&App, NodeId, &Snapshot, &[String]) -> Result<()>>;

/// Key filter of a watcher. An empty filter matches every notification.
///
/// [`CREATED_KEY`] is an ordinary filter entry: listing it asks for the
/// registration call, and since no update ever changes it, a watcher keyed
/// on it alone hears nothing afterwards. [`WatchKeys::and_created`] asks
/// for the registration call without touching the filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchKeys {
    keys: SmallVec<[String; 4]>,
    created: bool,
}

impl WatchKeys {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            created: false,
        }
    }

    pub fn with(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    /// Also call the watcher once when it is registered.
    pub fn and_created(mut self) -> Self {
        self.created = true;
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn wants_created(&self) -> bool {
        self.created || self.contains(CREATED_KEY)
    }

    pub fn matches<S: AsRef<str>>(&self, changed: &[S]) -> bool {
        self.keys.is_empty()
            || self
                .keys
                .iter()
                .any(|k| changed.iter().any(|c| c.as_ref() == k))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for WatchKeys {
    fn from(keys: [S; N]) -> Self {
        Self::new(keys)
    }
}

impl From<Vec<String>> for WatchKeys {
    fn from(keys: Vec<String>) -> Self {
        Self::new(keys)
    }
}

impl From<&[&str]> for WatchKeys {
    fn from(keys: &[&str]) -> Self {
        Self::new(keys.iter().copied())
    }
}

#[derive(Clone)]
pub(crate) struct Watcher {
    pub owner: NodeId,
    pub keys: WatchKeys,
    pub callback: WatchFn,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("owner", &self.owner)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// Watchers in registration order. `order` is the notification order;
/// slot keys alone would reuse freed slots out of order.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: SlotMap<WatcherId, Watcher>,
    order: Vec<WatcherId>,
}

impl Registry {
    pub fn push(&mut self, watcher: Watcher) -> WatcherId {
        let id = self.entries.insert(watcher);
        self.order.push(id);
        id
    }

    /// Removes the first watcher owned by `owner` and hands it back, so its
    /// callback is dropped after the registry is released.
    pub fn remove_first_owned_by(&mut self, owner: NodeId) -> Option<Watcher> {
        let pos = self
            .order
            .iter()
            .position(|id| self.entries.get(*id).is_some_and(|w| w.owner == owner))?;
        let id = self.order.remove(pos);
        self.entries.remove(id)
    }

    /// Ids in registration order, copied so a pass is unaffected by
    /// registrations made while it runs.
    pub fn pass(&self) -> Vec<WatcherId> {
        self.order.clone()
    }

    pub fn get(&self, id: WatcherId) -> Option<Watcher> {
        self.entries.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn owned_by(&self, owner: NodeId) -> usize {
        self.entries.values().filter(|w| w.owner == owner).count()
    }
}

impl App {
    /// Registers `callback` on `owner` for the given keys.
    ///
    /// If `owner` is not attached to the live tree yet, the watcher is kept
    /// on the node and only enters the registry once the node is attached.
    /// A node that is dropped before that leaves nothing behind.
    pub fn watch<F>(&self, owner: NodeId, keys: impl Into<WatchKeys>, callback: F) -> Result<()>
    where
        F: Fn(&App, NodeId, &Snapshot, &[String]) -> Result<()> + 'static,
    {
        let keys = keys.into();
        let callback: WatchFn = Rc::new(callback);
        {
            let mut tree = self.inner.tree.borrow_mut();
            let node = tree.get_mut(owner)?;
            if !node.live {
                node.pending.push(PendingWatcher { keys, callback });
                return Ok(());
            }
        }
        self.register(owner, keys, callback)
    }

    /// Puts a watcher straight into the registry. A [`CREATED_KEY`] watcher
    /// is called once before it is appended.
    pub(crate) fn register(&self, owner: NodeId, keys: WatchKeys, callback: WatchFn) -> Result<()> {
        if keys.wants_created() {
            let snapshot = self.snapshot();
            callback(self, owner, &snapshot, &[CREATED_KEY.to_string()])?;
        }
        // the created call may have torn the owner down already
        let mut tree = self.inner.tree.borrow_mut();
        let Ok(node) = tree.get_mut(owner) else {
            return Ok(());
        };
        if !node.live {
            return Ok(());
        }
        node.teardown.push(Teardown::Unwatch);
        drop(tree);
        self.inner.registry.borrow_mut().push(Watcher {
            owner,
            keys,
            callback,
        });
        Ok(())
    }

    /// Removes the first watcher owned by `owner`. A miss is logged; it
    /// points at a teardown ordering bug, not at corrupt state.
    pub fn unregister(&self, owner: NodeId) -> bool {
        let removed = self
            .inner
            .registry
            .borrow_mut()
            .remove_first_owned_by(owner);
        if removed.is_none() {
            log::warn!("unregister: no watcher owned by {owner:?}");
        }
        removed.is_some()
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    pub fn watchers_owned_by(&self, owner: NodeId) -> usize {
        self.inner.registry.borrow().owned_by(owner)
    }
}
