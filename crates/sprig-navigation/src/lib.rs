//! Route-driven mounting.
//!
//! [`Router::install`] builds an outlet holding one conditional mount per
//! route, all keyed off the reserved [`ROUTE_KEY`] state key. [`navigate`]
//! and [`go_back`] move between routes by updating that key; the matching
//! route's subtree is built and the previous one torn down.
//!
//! ```rust
//! use sprig_core::*;
//! use sprig_navigation::{RouteMap, Router, navigate};
//! use serde_json::json;
//!
//! let app = app(
//!     |app| {
//!         let routes = RouteMap::new()
//!             .route("/", |app| Ok(app.el("h1").text("home")))
//!             .route("/about", |app| Ok(app.el("h1").text("about")));
//!         Ok(Router::install(app, routes)?)
//!     },
//!     json!({}),
//!     Options::default(),
//! )?;
//!
//! navigate(&app, "/about")?;
//! assert_eq!(sprig_navigation::current_route(&app).as_deref(), Some("/about"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use sprig_core::{App, El, NodeId, ROUTE_KEY};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("no route named `{0}`")]
    UnknownRoute(String),
    #[error("no router is installed")]
    NotInstalled,
    #[error("a router is already installed")]
    AlreadyInstalled,
    #[error("route map is empty")]
    EmptyRouteMap,
    #[error(transparent)]
    Core(#[from] sprig_core::Error),
}

pub type Result<T, E = NavError> = std::result::Result<T, E>;

/// Lets builders that return core results install a router with `?`.
impl From<NavError> for sprig_core::Error {
    fn from(e: NavError) -> Self {
        match e {
            NavError::Core(e) => e,
            other => sprig_core::Error::Extension(Box::new(other)),
        }
    }
}

/// What [`go_back`] does to the history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryMode {
    /// Going back appends the earlier route, so the history is a full
    /// breadcrumb trail of every route shown.
    #[default]
    AppendOnly,
    /// Going back drops the current entry.
    Truncate,
}

type RouteBuilder = Rc<dyn Fn(&App) -> sprig_core::Result<NodeId>>;

/// Routes in declaration order. The first one is the initial route.
#[derive(Clone, Default)]
pub struct RouteMap {
    routes: Vec<(String, RouteBuilder)>,
}

impl fmt::Debug for RouteMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(p, _)| p))
            .finish()
    }
}

impl RouteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Declaring the same path twice replaces its builder.
    pub fn route<F, R>(mut self, path: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&App) -> sprig_core::Result<R> + 'static,
        R: Into<NodeId>,
    {
        let path = path.into();
        let builder: RouteBuilder = Rc::new(move |app: &App| -> sprig_core::Result<NodeId> {
            builder(app).map(Into::into)
        });
        match self.routes.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = builder,
            None => self.routes.push((path, builder)),
        }
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.iter().any(|(p, _)| p == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

struct RouterState {
    paths: Vec<String>,
    history: Vec<String>,
    mode: HistoryMode,
    outlet: NodeId,
}

/// Installed router, stored as an app extension.
pub struct Router {
    state: RefCell<RouterState>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("Router")
            .field("paths", &s.paths)
            .field("history", &s.history)
            .field("mode", &s.mode)
            .finish()
    }
}

impl Router {
    /// Installs a router with [`HistoryMode::AppendOnly`] and returns its
    /// outlet, to be attached wherever the routed content should appear.
    pub fn install(app: &App, routes: RouteMap) -> Result<El> {
        Self::install_with(app, routes, HistoryMode::default())
    }

    pub fn install_with(app: &App, routes: RouteMap, mode: HistoryMode) -> Result<El> {
        if routes.is_empty() {
            return Err(NavError::EmptyRouteMap);
        }
        if app.extension::<Router>().is_some() {
            return Err(NavError::AlreadyInstalled);
        }

        // a route restored from persisted state wins over the first route
        let snapshot = app.snapshot();
        let initial = snapshot
            .get_str(ROUTE_KEY)
            .filter(|r| routes.contains(r))
            .map(str::to_string)
            .or_else(|| routes.paths().next().map(str::to_string))
            .ok_or(NavError::EmptyRouteMap)?;

        let mut outlet = app
            .el("div")
            .attr("data-sprig", "router")
            .attr("data-routes", routes.paths().collect::<Vec<_>>().join(" "));
        for (path, builder) in &routes.routes {
            let matches = path.clone();
            let builder = builder.clone();
            let mount = app.conditional_on(
                [ROUTE_KEY],
                move |s| s.get_str(ROUTE_KEY) == Some(matches.as_str()),
                move |app| builder(app),
            )?;
            outlet = outlet.child(mount)?;
        }
        let outlet = outlet.on_destroy(|app, _, _| {
            if app.remove_extension::<Router>().is_some() {
                log::debug!("router outlet destroyed; router uninstalled");
            }
            Ok(())
        });

        app.insert_extension(Rc::new(Router {
            state: RefCell::new(RouterState {
                paths: routes.paths().map(str::to_string).collect(),
                history: vec![initial.clone()],
                mode,
                outlet: outlet.id(),
            }),
        }));
        app.set_key(ROUTE_KEY, initial)?;
        Ok(outlet)
    }

    /// Removes the router and destroys its outlet.
    pub fn uninstall(app: &App) -> Result<()> {
        let router = app.remove_extension::<Router>().ok_or(NavError::NotInstalled)?;
        let outlet = router.state.borrow().outlet;
        app.remove(outlet)?;
        Ok(())
    }

    pub fn outlet(&self) -> NodeId {
        self.state.borrow().outlet
    }

    pub fn history(&self) -> Vec<String> {
        self.state.borrow().history.clone()
    }

    pub fn mode(&self) -> HistoryMode {
        self.state.borrow().mode
    }
}

fn installed(app: &App) -> Result<Rc<Router>> {
    app.extension::<Router>().ok_or(NavError::NotInstalled)
}

/// Shows `path`, appending it to the history.
pub fn navigate(app: &App, path: &str) -> Result<()> {
    let router = installed(app)?;
    {
        let mut s = router.state.borrow_mut();
        if !s.paths.iter().any(|p| p == path) {
            return Err(NavError::UnknownRoute(path.to_string()));
        }
        s.history.push(path.to_string());
    }
    app.set_key(ROUTE_KEY, path)?;
    Ok(())
}

/// Returns to the previous route. With fewer than two history entries this
/// logs a warning and returns `false`.
pub fn go_back(app: &App) -> Result<bool> {
    let router = installed(app)?;
    let target = {
        let mut s = router.state.borrow_mut();
        let n = s.history.len();
        if n < 2 {
            log::warn!("go_back: history has {n} entry, nothing to go back to");
            return Ok(false);
        }
        match s.mode {
            HistoryMode::AppendOnly => {
                let target = s.history[n - 2].clone();
                s.history.push(target.clone());
                target
            }
            HistoryMode::Truncate => {
                s.history.pop();
                s.history[n - 2].clone()
            }
        }
    };
    app.set_key(ROUTE_KEY, target)?;
    Ok(true)
}

pub fn history(app: &App) -> Vec<String> {
    app.extension::<Router>()
        .map(|r| r.history())
        .unwrap_or_default()
}

pub fn current_route(app: &App) -> Option<String> {
    app.snapshot().get_str(ROUTE_KEY).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;
    use sprig_core::{Options, app};

    use super::*;

    fn routes(builds: &Rc<Cell<u32>>) -> RouteMap {
        let b = builds.clone();
        RouteMap::new()
            .route("/", |app| Ok(app.el("h1").text("home")))
            .route("/about", move |app| {
                b.set(b.get() + 1);
                Ok(app.el("h1").text("about"))
            })
            .route("/contact", |app| Ok(app.el("h1").text("contact")))
    }

    fn shown(app: &App) -> Vec<String> {
        let outlet = installed(app).unwrap().outlet();
        app.children_of(outlet)
            .into_iter()
            .flat_map(|slot| app.children_of(slot))
            .filter_map(|page| app.inspect(page, |n| n.text().map(str::to_string)).flatten())
            .collect()
    }

    fn boot(mode: HistoryMode, builds: &Rc<Cell<u32>>) -> App {
        let map = routes(builds);
        app(
            move |app| Ok(Router::install_with(app, map, mode)?),
            json!({}),
            Options::new().strict(true),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_route_is_first() {
        let builds = Rc::new(Cell::new(0));
        let app = boot(HistoryMode::AppendOnly, &builds);
        assert_eq!(current_route(&app).as_deref(), Some("/"));
        assert_eq!(shown(&app), vec!["home"]);
        assert_eq!(history(&app), vec!["/"]);
    }

    #[test]
    fn test_navigate_swaps_mounted_route() {
        let builds = Rc::new(Cell::new(0));
        let app = boot(HistoryMode::AppendOnly, &builds);
        let watchers = app.watcher_count();

        navigate(&app, "/about").unwrap();
        assert_eq!(shown(&app), vec!["about"]);
        navigate(&app, "/about").unwrap();
        assert_eq!(builds.get(), 1);
        assert_eq!(app.watcher_count(), watchers);

        assert!(matches!(navigate(&app, "/nope"), Err(NavError::UnknownRoute(p)) if p == "/nope"));
        assert_eq!(history(&app), vec!["/", "/about", "/about"]);
    }

    #[test]
    fn test_go_back_append_only_keeps_breadcrumbs() {
        let builds = Rc::new(Cell::new(0));
        let app = boot(HistoryMode::AppendOnly, &builds);
        assert!(!go_back(&app).unwrap());

        navigate(&app, "/about").unwrap();
        navigate(&app, "/contact").unwrap();
        assert!(go_back(&app).unwrap());
        assert_eq!(current_route(&app).as_deref(), Some("/about"));
        assert_eq!(history(&app), vec!["/", "/about", "/contact", "/about"]);

        // the previous entry is now /contact, not /
        assert!(go_back(&app).unwrap());
        assert_eq!(current_route(&app).as_deref(), Some("/contact"));
        assert_eq!(shown(&app), vec!["contact"]);
    }

    #[test]
    fn test_go_back_truncate_pops() {
        let builds = Rc::new(Cell::new(0));
        let app = boot(HistoryMode::Truncate, &builds);

        navigate(&app, "/about").unwrap();
        navigate(&app, "/contact").unwrap();
        assert!(go_back(&app).unwrap());
        assert_eq!(history(&app), vec!["/", "/about"]);
        assert!(go_back(&app).unwrap());
        assert_eq!(current_route(&app).as_deref(), Some("/"));
        assert_eq!(history(&app), vec!["/"]);
        assert!(!go_back(&app).unwrap());
    }

    #[test]
    fn test_uninstall() {
        let builds = Rc::new(Cell::new(0));
        let app = boot(HistoryMode::AppendOnly, &builds);
        Router::uninstall(&app).unwrap();
        assert_eq!(app.watcher_count(), 0);
        assert!(matches!(navigate(&app, "/"), Err(NavError::NotInstalled)));
        assert!(matches!(go_back(&app), Err(NavError::NotInstalled)));
        assert!(matches!(Router::uninstall(&app), Err(NavError::NotInstalled)));
    }

    #[test]
    fn test_unmount_uninstalls() {
        let builds = Rc::new(Cell::new(0));
        let app = boot(HistoryMode::AppendOnly, &builds);
        app.unmount().unwrap();
        assert!(matches!(navigate(&app, "/about"), Err(NavError::NotInstalled)));
    }

    #[test]
    fn test_install_errors() {
        let r = app(
            |app| Ok(Router::install(app, RouteMap::new())?),
            json!({}),
            Options::default(),
        );
        assert!(r.is_err());

        let builds = Rc::new(Cell::new(0));
        let app = boot(HistoryMode::AppendOnly, &builds);
        assert!(matches!(
            Router::install(&app, routes(&builds)),
            Err(NavError::AlreadyInstalled)
        ));
    }

    #[test]
    fn test_restored_route_wins() {
        let builds = Rc::new(Cell::new(0));
        let map = routes(&builds);
        let app = app(
            move |app| Ok(Router::install(app, map)?),
            json!({ ROUTE_KEY: "/contact" }),
            Options::default(),
        )
        .unwrap();
        assert_eq!(shown(&app), vec!["contact"]);
    }
}
