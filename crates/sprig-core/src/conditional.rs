//! Predicate-driven mounting and visibility.
//!
//! Both variants remember the last boolean the predicate produced and only
//! act when it flips, so repeated updates that keep the result unchanged
//! never rebuild or re-notify.

use std::cell::{Cell, OnceCell};
use std::rc::Rc;

use crate::element::El;
use crate::watcher::WatchKeys;
use crate::{App, NodeId, Result, Snapshot};

pub type ChangeFn = Rc<dyn Fn(&App, NodeId, &Snapshot, bool) -> Result<()>>;

impl App {
    /// A container whose only child is built by `builder` while `predicate`
    /// holds and destroyed when it stops holding. Re-evaluated on every
    /// notification.
    pub fn conditional<P, B, R>(&self, predicate: P, builder: B) -> Result<El>
    where
        P: Fn(&Snapshot) -> bool + 'static,
        B: Fn(&App) -> Result<R> + 'static,
        R: Into<NodeId>,
    {
        self.conditional_on(WatchKeys::any(), predicate, builder)
    }

    /// Like [`App::conditional`], re-evaluated only when one of `keys`
    /// changes.
    ///
    /// The first evaluation happens when the container is attached and
    /// counts as a flip, so a predicate that already holds mounts at once.
    pub fn conditional_on<P, B, R>(
        &self,
        keys: impl Into<WatchKeys>,
        predicate: P,
        builder: B,
    ) -> Result<El>
    where
        P: Fn(&Snapshot) -> bool + 'static,
        B: Fn(&App) -> Result<R> + 'static,
        R: Into<NodeId>,
    {
        let container = self.el("div").attr("data-sprig", "conditional");
        let last: Cell<Option<bool>> = Cell::new(None);
        let keys = keys.into().and_created();

        self.watch(container.id(), keys, move |app, node, snapshot, _| {
            let now = predicate(snapshot);
            if last.get() == Some(now) {
                return Ok(());
            }
            if now {
                let child: NodeId = builder(app)?.into();
                app.set_children(node, [child])?;
            } else {
                app.empty(node)?;
            }
            last.set(Some(now));
            Ok(())
        })?;
        Ok(container)
    }
}

impl El {
    /// Hides this element (`display: none`) while `predicate` is false and
    /// restores its original `display` when it is true. Children stay
    /// mounted.
    pub fn display_when<P>(self, predicate: P) -> Result<Self>
    where
        P: Fn(&Snapshot) -> bool + 'static,
    {
        self.visibility_toggle(Rc::new(predicate), None)
    }

    /// Like [`El::display_when`], also calling `on_change` on every flip
    /// after the first evaluation.
    pub fn display_when_changed<P, C>(self, predicate: P, on_change: C) -> Result<Self>
    where
        P: Fn(&Snapshot) -> bool + 'static,
        C: Fn(&App, NodeId, &Snapshot, bool) -> Result<()> + 'static,
    {
        self.visibility_toggle(Rc::new(predicate), Some(Rc::new(on_change)))
    }

    fn visibility_toggle(
        self,
        predicate: Rc<dyn Fn(&Snapshot) -> bool>,
        on_change: Option<ChangeFn>,
    ) -> Result<Self> {
        let last: Cell<Option<bool>> = Cell::new(None);
        let original: OnceCell<Option<String>> = OnceCell::new();

        self.on_update(
            WatchKeys::any().and_created(),
            move |app, node, snapshot, _| {
                let now = predicate(snapshot);
                let previous = last.get();
                if previous == Some(now) {
                    return Ok(());
                }
                if previous.is_some()
                    && let Some(cb) = &on_change
                {
                    cb(app, node, snapshot, now)?;
                }
                let original = original.get_or_init(|| {
                    app.inspect(node, |n| n.style("display").map(str::to_string))
                        .flatten()
                });
                if now {
                    match original {
                        Some(display) => app.set_style(node, "display", display.clone())?,
                        None => app.remove_style(node, "display")?,
                    }
                } else {
                    app.set_style(node, "display", "none")?;
                }
                last.set(Some(now));
                Ok(())
            },
        )
    }
}
