use crate::tree::Teardown;
use crate::{App, NodeId, Result};

impl App {
    /// The single removal path for nodes.
    ///
    /// Unlinks `root` from its parent, marks the whole subtree dead so no
    /// notification reaches it any more, then visits it parents-first and
    /// runs each node's destroy handlers in the order they were added.
    /// Watchers registered on a node remove themselves here. The slots are
    /// freed last.
    ///
    /// A failing user handler does not stop the walk: every node is still
    /// purged and the first error is returned.
    pub(crate) fn teardown(&self, root: NodeId) -> Result<()> {
        let (ids, was_live) = {
            let mut tree = self.inner.tree.borrow_mut();
            let was_live = tree.get(root)?.live;
            tree.unlink(root);
            let ids = tree.subtree(root);
            for id in &ids {
                if let Ok(node) = tree.get_mut(*id) {
                    node.live = false;
                }
            }
            (ids, was_live)
        };

        let mut result = Ok(());
        // never-attached nodes have no registry entries and no host-visible
        // lifecycle; they are dropped with their buffered watchers
        if was_live {
            for id in &ids {
                let handlers = match self.inner.tree.borrow_mut().get_mut(*id) {
                    Ok(node) => std::mem::take(&mut node.teardown),
                    Err(_) => continue,
                };
                for handler in handlers {
                    match handler {
                        Teardown::Unwatch => {
                            self.unregister(*id);
                        }
                        Teardown::Callback(cb) => {
                            let snapshot = self.snapshot();
                            let r = cb(self, *id, &snapshot);
                            if result.is_ok() {
                                result = r;
                            }
                        }
                    }
                }
            }
        }

        log::trace!("teardown {root:?}: {} node(s)", ids.len());
        let freed = self.inner.tree.borrow_mut().free(&ids);
        drop(freed);
        result
    }

    /// Frees `node` if it was never attached and still has no parent.
    pub(crate) fn discard(&self, node: NodeId) {
        let orphan = match self.inner.tree.try_borrow() {
            Ok(tree) => tree.get(node).is_ok_and(|n| n.parent.is_none() && !n.live),
            Err(_) => {
                log::debug!("discard {node:?}: tree busy, node kept");
                return;
            }
        };
        if orphan && let Err(e) = self.teardown(node) {
            log::warn!("discard {node:?}: {e}");
        }
    }
}
