//! Arena-backed node tree.
//!
//! Nodes live in a slot map and link to each other by [`NodeId`]. A node is
//! *live* once it sits below the app's mount point; only live nodes have
//! watchers in the registry. Every detach goes through
//! [`App::teardown`](crate::App), which fires destroy handlers for the whole
//! subtree before the slots are freed.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use slotmap::{SlotMap, new_key_type};

use crate::watcher::{WatchFn, WatchKeys};
use crate::{App, Error, Result, Snapshot};

new_key_type! {
    pub struct NodeId;
}

pub type DestroyFn = Rc<dyn Fn(&App, NodeId, &Snapshot) -> Result<()>>;
pub type EventFn = Rc<dyn Fn(&App, NodeId, &Value) -> Result<()>>;

pub(crate) struct PendingWatcher {
    pub keys: WatchKeys,
    pub callback: WatchFn,
}

pub(crate) enum Teardown {
    /// Drop one registry entry owned by the node.
    Unwatch,
    Callback(DestroyFn),
}

pub struct Node {
    pub(crate) tag: String,
    pub(crate) text: Option<String>,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) styles: BTreeMap<String, String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) live: bool,
    pub(crate) pending: Vec<PendingWatcher>,
    pub(crate) teardown: Vec<Teardown>,
    pub(crate) handlers: Vec<(String, EventFn)>,
}

impl Node {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: None,
            attrs: BTreeMap::new(),
            styles: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            live: false,
            pending: Vec::new(),
            teardown: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn style(&self, name: &str) -> Option<&str> {
        self.styles.get(name).map(String::as_str)
    }

    pub fn styles(&self) -> &BTreeMap<String, String> {
        &self.styles
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_hidden(&self) -> bool {
        self.style("display") == Some("none")
    }

    /// Watchers buffered until the node is attached.
    pub fn buffered_watchers(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("tag", &self.tag)
            .field("text", &self.text)
            .field("attrs", &self.attrs)
            .field("styles", &self.styles)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub(crate) struct Tree {
    nodes: SlotMap<NodeId, Node>,
}

impl Tree {
    pub fn create(&mut self, tag: impl Into<String>) -> NodeId {
        self.nodes.insert(Node::new(tag))
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(Error::StaleNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(Error::StaleNode(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// `root` and all of its descendants, parents before children.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    pub fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node).and_then(|n| n.parent) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.get(parent)?;
        if self.get(child)?.parent.is_some() {
            return Err(Error::AlreadyAttached(child));
        }
        if self.is_ancestor(child, parent) {
            return Err(Error::WouldCycle(child));
        }
        self.get_mut(child)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn unlink(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get_mut(child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
    }

    /// Removes the slots and hands the nodes back. Their closures may own
    /// `El` handles, so callers drop them after releasing the tree.
    pub fn free(&mut self, ids: &[NodeId]) -> Vec<Node> {
        ids.iter().filter_map(|id| self.nodes.remove(*id)).collect()
    }
}

impl App {
    /// Creates a detached node. The id carries no claim, so the caller must
    /// attach or remove it; [`App::el`] is the chainable, self-freeing form.
    pub fn create_node(&self, tag: impl Into<String>) -> NodeId {
        self.inner.tree.borrow_mut().create(tag)
    }

    /// Appends `child` under `parent`. If `parent` is live, the child's
    /// subtree becomes live and its buffered watchers are registered.
    pub fn append_child(&self, parent: NodeId, child: impl Into<NodeId>) -> Result<()> {
        let child = child.into();
        let live = {
            let mut tree = self.inner.tree.borrow_mut();
            tree.link(parent, child)?;
            tree.get(parent)?.live
        };
        if live {
            self.attach(child)?;
        }
        Ok(())
    }

    pub(crate) fn attach(&self, root: NodeId) -> Result<()> {
        let ids = {
            let mut tree = self.inner.tree.borrow_mut();
            let ids = tree.subtree(root);
            for id in &ids {
                if let Ok(node) = tree.get_mut(*id) {
                    node.live = true;
                }
            }
            ids
        };
        // every node is flushed even after a failing created call, so no
        // live node is left holding buffered watchers; the first error wins
        let mut result = Ok(());
        for id in ids {
            // an earlier registration may have removed this node
            let pending = match self.inner.tree.borrow_mut().get_mut(id) {
                Ok(node) if node.live => std::mem::take(&mut node.pending),
                _ => continue,
            };
            for p in pending {
                let r = self.register(id, p.keys, p.callback);
                if result.is_ok() {
                    result = r;
                }
            }
        }
        result
    }

    /// Detaches `node` and destroys its subtree. Removing the mount point
    /// empties it instead.
    pub fn remove(&self, node: NodeId) -> Result<()> {
        if node == self.inner.mount_point {
            return self.empty(node);
        }
        self.teardown(node)
    }

    /// Destroys every child of `node`.
    pub fn empty(&self, node: NodeId) -> Result<()> {
        let children = self.inner.tree.borrow().get(node)?.children.clone();
        let mut result = Ok(());
        for child in children {
            let r = self.teardown(child);
            if result.is_ok() {
                result = r;
            }
        }
        result
    }

    /// Replaces the children of `node`, destroying the old ones.
    pub fn set_children<I, C>(&self, node: NodeId, children: I) -> Result<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<NodeId>,
    {
        self.empty(node)?;
        for child in children {
            self.append_child(node, child)?;
        }
        Ok(())
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) -> Result<()> {
        self.inner.tree.borrow_mut().get_mut(node)?.text = Some(text.into());
        Ok(())
    }

    pub fn set_attr(
        &self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.inner
            .tree
            .borrow_mut()
            .get_mut(node)?
            .attrs
            .insert(name.into(), value.into());
        Ok(())
    }

    pub fn set_style(
        &self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.inner
            .tree
            .borrow_mut()
            .get_mut(node)?
            .styles
            .insert(name.into(), value.into());
        Ok(())
    }

    pub fn remove_style(&self, node: NodeId, name: &str) -> Result<()> {
        self.inner.tree.borrow_mut().get_mut(node)?.styles.remove(name);
        Ok(())
    }

    /// Adds a destroy handler, fired when the node leaves the live tree.
    pub fn on_destroy<F>(&self, node: NodeId, handler: F) -> Result<()>
    where
        F: Fn(&App, NodeId, &Snapshot) -> Result<()> + 'static,
    {
        self.inner
            .tree
            .borrow_mut()
            .get_mut(node)?
            .teardown
            .push(Teardown::Callback(Rc::new(handler)));
        Ok(())
    }

    pub fn on<F>(&self, node: NodeId, event: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&App, NodeId, &Value) -> Result<()> + 'static,
    {
        self.inner
            .tree
            .borrow_mut()
            .get_mut(node)?
            .handlers
            .push((event.into(), Rc::new(handler)));
        Ok(())
    }

    /// Runs the handlers `node` has for `event`, in the order they were
    /// added. Returns how many ran.
    pub fn emit(&self, node: NodeId, event: &str, payload: &Value) -> Result<usize> {
        let handlers: Vec<EventFn> = self
            .inner
            .tree
            .borrow()
            .get(node)?
            .handlers
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in &handlers {
            handler(self, node, payload)?;
        }
        Ok(handlers.len())
    }

    /// Reads a node. Returns `None` if the id is stale.
    pub fn inspect<R>(&self, node: NodeId, f: impl FnOnce(&Node) -> R) -> Option<R> {
        self.inner.tree.borrow().get(node).ok().map(f)
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.inspect(node, Node::is_live).unwrap_or(false)
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.inspect(node, Node::is_hidden).unwrap_or(false)
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.inspect(node, |n| n.children.clone()).unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.inner.tree.borrow().len()
    }

    pub fn live_node_count(&self) -> usize {
        self.inner.tree.borrow().iter().filter(|(_, n)| n.live).count()
    }

    pub fn buffered_watcher_count(&self) -> usize {
        self.inner
            .tree
            .borrow()
            .iter()
            .map(|(_, n)| n.pending.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_is_preorder() {
        let mut tree = Tree::default();
        let a = tree.create("a");
        let b = tree.create("b");
        let c = tree.create("c");
        let d = tree.create("d");
        tree.link(a, b).unwrap();
        tree.link(b, c).unwrap();
        tree.link(a, d).unwrap();
        assert_eq!(tree.subtree(a), vec![a, b, c, d]);
    }

    #[test]
    fn link_rejects_second_parent_and_cycles() {
        let mut tree = Tree::default();
        let a = tree.create("a");
        let b = tree.create("b");
        let c = tree.create("c");
        tree.link(a, b).unwrap();
        assert!(matches!(tree.link(c, b), Err(Error::AlreadyAttached(_))));
        assert!(matches!(tree.link(b, a), Err(Error::WouldCycle(_))));
        assert!(matches!(tree.link(a, a), Err(Error::WouldCycle(_))));
    }

    #[test]
    fn unlink_and_free() {
        let mut tree = Tree::default();
        let a = tree.create("a");
        let b = tree.create("b");
        tree.link(a, b).unwrap();
        tree.unlink(b);
        assert!(tree.get(a).unwrap().children().is_empty());
        assert_eq!(tree.get(b).unwrap().parent(), None);
        assert_eq!(tree.free(&[b]).len(), 1);
        assert!(matches!(tree.get(b), Err(Error::StaleNode(_))));
    }
}
