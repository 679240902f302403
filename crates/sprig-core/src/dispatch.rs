use crate::app::AppInner;
use crate::{App, Result};

/// Marks a notification pass as running. Dropping it, including on an
/// error or a panic out of a callback, ends the pass and discards anything
/// still queued, so the next `notify` starts clean.
struct PassGuard<'a>(&'a AppInner);

impl<'a> PassGuard<'a> {
    fn enter(inner: &'a AppInner) -> Self {
        inner.dispatching.set(true);
        Self(inner)
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.dispatching.set(false);
        self.0.pending.borrow_mut().clear();
    }
}

impl App {
    /// Notifies watchers that `changed` keys were updated.
    ///
    /// Calls made from inside a watcher are queued and run, in order, after
    /// the current pass has visited every watcher.
    pub fn notify<I, S>(&self, changed: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changed: Vec<String> = changed.into_iter().map(Into::into).collect();
        self.inner.pending.borrow_mut().push_back(changed);
        if self.inner.dispatching.get() {
            log::trace!(target: "sprig::state", "notification queued behind running pass");
            return Ok(());
        }

        let _pass = PassGuard::enter(&self.inner);
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(changed) = next else {
                break;
            };
            self.dispatch_pass(&changed)?;
        }
        Ok(())
    }

    fn dispatch_pass(&self, changed: &[String]) -> Result<()> {
        let entries = self.inner.registry.borrow().pass();

        if self.inner.store.borrow().options().log_state_updates {
            let snapshot = self.snapshot();
            log::info!(
                target: "sprig::state",
                "update {changed:?} watchers={} state={}",
                entries.len(),
                serde_json::to_string(snapshot.as_map()).unwrap_or_default()
            );
        } else {
            log::trace!(target: "sprig::state", "update {changed:?} watchers={}", entries.len());
        }

        for id in entries {
            // unregistered earlier in this pass
            let watcher = self.inner.registry.borrow().get(id);
            let Some(watcher) = watcher else {
                continue;
            };
            if !watcher.keys.matches(changed) || !self.is_live(watcher.owner) {
                continue;
            }
            let snapshot = self.snapshot();
            (watcher.callback)(self, watcher.owner, &snapshot, changed)?;
        }
        Ok(())
    }
}
