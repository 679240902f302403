//! The app context and bootstrap.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::element::ComponentFn;
use crate::state::{StateMap, StateStore, join_key};
use crate::storage::{MemoryStorage, STORAGE_KEY, Storage};
use crate::tree::Tree;
use crate::watcher::Registry;
use crate::{Error, INIT_KEY, NodeId, Options, Result, Snapshot};

pub(crate) struct AppInner {
    pub store: RefCell<StateStore>,
    pub registry: RefCell<Registry>,
    pub tree: RefCell<Tree>,
    pub components: RefCell<HashMap<String, ComponentFn>>,
    pub storage: Rc<dyn Storage>,
    pub pending: RefCell<VecDeque<Vec<String>>>,
    pub dispatching: Cell<bool>,
    pub mount_point: NodeId,
    pub root: Cell<Option<NodeId>>,
    pub extensions: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

/// Handle to one running app: its state, watchers and node tree.
///
/// Cloning is cheap and every clone refers to the same app. Callbacks are
/// handed `&App`, so they rarely need to capture one.
#[derive(Clone)]
pub struct App {
    pub(crate) inner: Rc<AppInner>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("options", self.inner.store.borrow().options())
            .field("nodes", &self.node_count())
            .field("watchers", &self.watcher_count())
            .field("storage", &self.inner.storage)
            .finish_non_exhaustive()
    }
}

/// Bootstraps an app with in-memory storage.
///
/// `initial_state` must be a JSON object (or null for an empty state).
pub fn app<F, R>(root: F, initial_state: Value, options: Options) -> Result<App>
where
    F: FnOnce(&App) -> Result<R>,
    R: Into<NodeId>,
{
    App::builder().state(initial_state).options(options).mount(root)
}

#[derive(Debug, Default)]
pub struct AppBuilder {
    state: Option<Value>,
    options: Options,
    storage: Option<Rc<dyn Storage>>,
}

impl AppBuilder {
    pub fn state(mut self, initial: Value) -> Self {
        self.state = Some(initial);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn storage(mut self, storage: impl Storage) -> Self {
        self.storage = Some(Rc::new(storage));
        self
    }

    /// Builds a fresh app, restores persisted keys, mounts the subtree
    /// returned by `root` and sends the [`INIT_KEY`] notification.
    pub fn mount<F, R>(self, root: F) -> Result<App>
    where
        F: FnOnce(&App) -> Result<R>,
        R: Into<NodeId>,
    {
        self.options.validate()?;
        let state = match self.state {
            None | Some(Value::Null) => StateMap::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(Error::InvalidOptions(format!(
                    "initial state must be an object, got {other}"
                )));
            }
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Rc::new(MemoryStorage::new()));

        let mut store = StateStore::new(state, self.options);
        restore_persisted(&mut store, storage.as_ref())?;

        let mut tree = Tree::default();
        let mount_point = tree.create("main");
        if let Ok(node) = tree.get_mut(mount_point) {
            node.live = true;
        }

        let app = App {
            inner: Rc::new(AppInner {
                store: RefCell::new(store),
                registry: RefCell::new(Registry::default()),
                tree: RefCell::new(tree),
                components: RefCell::new(HashMap::new()),
                storage,
                pending: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                mount_point,
                root: Cell::new(None),
                extensions: RefCell::new(HashMap::new()),
            }),
        };

        let root = root(&app)?.into();
        app.append_child(mount_point, root)?;
        app.inner.root.set(Some(root));
        log::debug!("mounted root {root:?}, {} watcher(s)", app.watcher_count());

        app.notify([INIT_KEY])?;
        Ok(app)
    }
}

fn restore_persisted(store: &mut StateStore, storage: &dyn Storage) -> Result<()> {
    if store.options().persist_state.is_none() {
        return Ok(());
    }
    let Some(raw) = storage.load(STORAGE_KEY)? else {
        return Ok(());
    };
    match serde_json::from_str::<StateMap>(&raw) {
        Ok(saved) => {
            let n = store.restore(saved);
            log::debug!("restored {n} persisted key(s)");
        }
        Err(e) => log::warn!("ignoring malformed persisted state: {e}"),
    }
    Ok(())
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn options(&self) -> Options {
        self.inner.store.borrow().options().clone()
    }

    /// The live node everything is mounted under.
    pub fn mount_point(&self) -> NodeId {
        self.inner.mount_point
    }

    /// The subtree mounted at bootstrap, until [`App::unmount`].
    pub fn root(&self) -> Option<NodeId> {
        self.inner.root.get()
    }

    /// Destroys the mounted subtree. Every watcher goes with it.
    pub fn unmount(&self) -> Result<()> {
        self.inner.root.set(None);
        self.empty(self.inner.mount_point)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.store.borrow().snapshot()
    }

    /// Reads one key. In strict mode an uninitialised key is an error;
    /// otherwise it reads as null.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.inner.store.borrow().read(key)
    }

    /// Sets `key` to `value` and notifies watchers of `key`.
    pub fn set_key(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.apply_change(vec![key.into()], move |_| vec![value])
    }

    /// Sets `key` to a value computed from the current state.
    pub fn set_key_with<F>(&self, key: impl Into<String>, updater: F) -> Result<()>
    where
        F: FnOnce(&Snapshot) -> Value,
    {
        self.apply_change(vec![key.into()], move |s| vec![updater(s)])
    }

    /// Merges every entry of `slice` into the state and notifies once with
    /// all of its keys, in iteration order.
    pub fn merge_slice<I, K, V>(&self, slice: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (keys, values): (Vec<String>, Vec<Value>) = slice
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        self.apply_change(keys, move |_| values)
    }

    /// Checks, mutates, persists and notifies. `mutation` returns one value
    /// per key. Nothing is written if any key is rejected.
    fn apply_change<F>(&self, keys: Vec<String>, mutation: F) -> Result<()>
    where
        F: FnOnce(&Snapshot) -> Vec<Value>,
    {
        self.inner.store.borrow().check_known(&keys)?;
        let values = {
            let snapshot = self.snapshot();
            mutation(&snapshot)
        };
        self.inner
            .store
            .borrow_mut()
            .apply(keys.iter().cloned().zip(values));
        self.persist(&keys)?;
        self.notify(keys)
    }

    fn persist(&self, changed: &[String]) -> Result<()> {
        let subset = {
            let store = self.inner.store.borrow();
            if !changed.iter().any(|k| store.options().persists(k)) {
                return Ok(());
            }
            store.persisted_subset()
        };
        if let Some(subset) = subset {
            let json = serde_json::to_string(&subset)?;
            self.inner.storage.store(STORAGE_KEY, &json)?;
        }
        Ok(())
    }

    /// Reads back the persisted snapshot from storage.
    pub fn persisted(&self) -> Result<Option<StateMap>> {
        match self.inner.storage.load(STORAGE_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Builds `name:part:part` and makes sure the key exists, initialising
    /// it to null without notifying. Keys built this way are accepted in
    /// strict mode.
    pub fn build_key<I, P>(&self, name: &str, parts: I) -> String
    where
        I: IntoIterator<Item = P>,
        P: fmt::Display,
    {
        let key = join_key(name, parts);
        if self.inner.store.borrow_mut().ensure(&key) {
            log::trace!(target: "sprig::state", "initialised dynamic key {key}");
        }
        key
    }

    pub fn insert_extension<T: 'static>(&self, value: Rc<T>) -> Option<Rc<T>> {
        self.inner
            .extensions
            .borrow_mut()
            .insert(TypeId::of::<T>(), value)
            .and_then(|old| old.downcast::<T>().ok())
    }

    pub fn extension<T: 'static>(&self) -> Option<Rc<T>> {
        self.inner
            .extensions
            .borrow()
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    pub fn remove_extension<T: 'static>(&self) -> Option<Rc<T>> {
        self.inner
            .extensions
            .borrow_mut()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
    }
}
