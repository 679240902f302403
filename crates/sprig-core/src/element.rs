//! Element factory: chainable node construction and custom components.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

use crate::watcher::WatchKeys;
use crate::{App, Error, NodeId, Result, Snapshot};

pub type ComponentFn = Rc<dyn Fn(&App) -> Result<NodeId>>;

/// Names that always create a plain node and cannot be declared.
pub const BUILTIN_TAGS: &[&str] = &[
    "a", "article", "aside", "button", "canvas", "div", "footer", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "img", "input", "label", "li", "main", "nav", "ol", "option", "p",
    "pre", "section", "select", "span", "table", "tbody", "td", "textarea", "th", "thead", "tr",
    "ul",
];

fn is_component_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// A node plus the app it belongs to, with builder-style setters.
///
/// Setters on a stale node log a warning and do nothing; operations that can
/// run user code (attaching children, registering watchers) return `Result`.
///
/// Clones share one claim on the node. When the last clone is dropped and
/// the node was never attached, it is freed together with its subtree and
/// buffered watchers. Converting an `El` into a [`NodeId`] by value gives the
/// claim up; the caller is then expected to attach the node.
#[derive(Clone, Debug)]
pub struct El(Rc<Claim>);

#[derive(Debug)]
struct Claim {
    app: App,
    id: NodeId,
    armed: Cell<bool>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.armed.get() {
            self.app.discard(self.id);
        }
    }
}

impl From<El> for NodeId {
    fn from(el: El) -> Self {
        el.0.armed.set(false);
        el.0.id
    }
}

impl From<&El> for NodeId {
    fn from(el: &El) -> Self {
        el.0.id
    }
}

impl El {
    /// Wraps `id`, taking the claim described on [`El`].
    pub fn new(app: &App, id: NodeId) -> Self {
        Self(Rc::new(Claim {
            app: app.clone(),
            id,
            armed: Cell::new(true),
        }))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn app(&self) -> &App {
        &self.0.app
    }

    fn warn_on_err(&self, what: &str, r: Result<()>) {
        if let Err(e) = r {
            log::warn!("{what} on {:?}: {e}", self.id());
        }
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.warn_on_err("text", self.app().set_text(self.id(), text));
        self
    }

    pub fn attr(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.warn_on_err("attr", self.app().set_attr(self.id(), name, value));
        self
    }

    pub fn style(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.warn_on_err("style", self.app().set_style(self.id(), name, value));
        self
    }

    pub fn styles<I, K, V>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in styles {
            self = self.style(k, v);
        }
        self
    }

    pub fn on<F>(self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&App, NodeId, &Value) -> Result<()> + 'static,
    {
        self.warn_on_err("on", self.app().on(self.id(), event, handler));
        self
    }

    pub fn on_destroy<F>(self, handler: F) -> Self
    where
        F: Fn(&App, NodeId, &Snapshot) -> Result<()> + 'static,
    {
        self.warn_on_err("on_destroy", self.app().on_destroy(self.id(), handler));
        self
    }

    pub fn child(self, child: impl Into<NodeId>) -> Result<Self> {
        self.app().append_child(self.id(), child)?;
        Ok(self)
    }

    pub fn children<I, C>(self, children: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<NodeId>,
    {
        for child in children {
            self.app().append_child(self.id(), child)?;
        }
        Ok(self)
    }

    /// Registers a watcher owned by this node; see [`App::watch`].
    pub fn on_update<F>(self, keys: impl Into<WatchKeys>, callback: F) -> Result<Self>
    where
        F: Fn(&App, NodeId, &Snapshot, &[String]) -> Result<()> + 'static,
    {
        self.app().watch(self.id(), keys, callback)?;
        Ok(self)
    }
}

impl App {
    /// Creates a detached plain node.
    pub fn el(&self, tag: impl Into<String>) -> El {
        El::new(self, self.create_node(tag))
    }

    /// Creates a declared component, or a plain node for any other valid
    /// tag name.
    pub fn create(&self, name: &str) -> Result<El> {
        let builder = self.inner.components.borrow().get(name).cloned();
        if let Some(builder) = builder {
            let id = builder(self)?;
            return Ok(El::new(self, id));
        }
        if is_tag_name(name) {
            Ok(self.el(name))
        } else {
            Err(Error::UnknownComponent(name.to_string()))
        }
    }

    /// Registers a custom component. `name` must be a single alphabetic word
    /// that is neither a built-in tag nor already declared.
    pub fn declare<F, R>(&self, name: &str, builder: F) -> Result<()>
    where
        F: Fn(&App) -> Result<R> + 'static,
        R: Into<NodeId>,
    {
        if !is_component_name(name) {
            return Err(Error::InvalidComponentName(name.to_string()));
        }
        let mut components = self.inner.components.borrow_mut();
        if BUILTIN_TAGS.contains(&name) || components.contains_key(name) {
            return Err(Error::AlreadyDeclared(name.to_string()));
        }
        components.insert(
            name.to_string(),
            Rc::new(move |app: &App| -> Result<NodeId> { builder(app).map(Into::into) }),
        );
        Ok(())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.inner.components.borrow().contains_key(name)
    }
}
