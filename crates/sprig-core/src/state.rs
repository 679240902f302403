//! The shared key/value state of an app and the options that govern it.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Keys starting with this prefix belong to the runtime and bypass strict mode.
pub const RESERVED_PREFIX: &str = "$";
/// Delivered once, after the root subtree is mounted.
pub const INIT_KEY: &str = "$init";
/// Delivered directly to a watcher when it is registered.
pub const CREATED_KEY: &str = "$created";
/// Holds the current route when a router is installed.
pub const ROUTE_KEY: &str = "$route";
/// Separator used by [`join_key`].
pub const KEY_DELIMITER: char = ':';

pub type StateMap = serde_json::Map<String, Value>;

pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Joins a name and its qualifiers into a single state key: `Foo:1:bar`.
pub fn join_key<I, P>(name: &str, parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: std::fmt::Display,
{
    let mut key = name.to_string();
    for part in parts {
        key.push(KEY_DELIMITER);
        key.push_str(&part.to_string());
    }
    key
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Options {
    /// Log every notification with the changed keys and a state dump.
    pub log_state_updates: bool,
    /// Keys written to storage after each update that touches one of them.
    pub persist_state: Option<Vec<String>>,
    /// Reject updates and reads of keys that were never initialised.
    pub strict: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a JSON document such as
    /// `{"strict": true, "persistState": ["counter"]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Options =
            serde_json::from_str(json).map_err(|e| Error::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn log_state_updates(mut self, on: bool) -> Self {
        self.log_state_updates = on;
        self
    }

    pub fn persist_state<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.persist_state = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn persists(&self, key: &str) -> bool {
        self.persist_state
            .as_ref()
            .is_some_and(|keys| keys.iter().any(|k| k == key))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(keys) = &self.persist_state {
            for (i, key) in keys.iter().enumerate() {
                if key.is_empty() {
                    return Err(Error::InvalidOptions(
                        "persistState contains an empty key".into(),
                    ));
                }
                if keys[..i].contains(key) {
                    return Err(Error::InvalidOptions(format!(
                        "persistState lists `{key}` more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Immutable view of the state at one instant.
///
/// Later updates never show through a snapshot that was already handed out;
/// the store copies on write while any snapshot is alive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot(Rc<StateMap>);

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Loose truthiness: missing, null, false, 0 and "" are false.
    pub fn truthy(&self, key: &str) -> bool {
        match self.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_) | Value::Object(_)) => true,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &StateMap {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object((*self.0).clone())
    }
}

pub(crate) struct StateStore {
    state: Rc<StateMap>,
    options: Options,
}

impl StateStore {
    pub fn new(state: StateMap, options: Options) -> Self {
        Self {
            state: Rc::new(state),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.state.clone())
    }

    pub fn check_known<S: AsRef<str>>(&self, keys: &[S]) -> Result<()> {
        if !self.options.strict {
            return Ok(());
        }
        for key in keys {
            let key = key.as_ref();
            if !is_reserved(key) && !self.state.contains_key(key) {
                return Err(Error::UnknownKey(key.to_string()));
            }
        }
        Ok(())
    }

    pub fn read(&self, key: &str) -> Result<Value> {
        self.check_known(&[key])?;
        Ok(self.state.get(key).cloned().unwrap_or(Value::Null))
    }

    pub fn apply(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        let state = Rc::make_mut(&mut self.state);
        for (key, value) in entries {
            state.insert(key, value);
        }
    }

    /// Inserts a null placeholder; returns false if the key already existed.
    pub fn ensure(&mut self, key: &str) -> bool {
        if self.state.contains_key(key) {
            return false;
        }
        Rc::make_mut(&mut self.state).insert(key.to_string(), Value::Null);
        true
    }

    /// The subset of state selected by `persistState`, if configured.
    pub fn persisted_subset(&self) -> Option<StateMap> {
        let keys = self.options.persist_state.as_ref()?;
        Some(
            keys.iter()
                .filter_map(|k| self.state.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
        )
    }

    /// Copies the persisted keys found in `saved` over the current state.
    /// Keys not listed in `persistState` are ignored.
    pub fn restore(&mut self, saved: StateMap) -> usize {
        let mut restored = 0;
        let state = Rc::make_mut(&mut self.state);
        for (key, value) in saved {
            if self.options.persists(&key) {
                state.insert(key, value);
                restored += 1;
            }
        }
        restored
    }
}
