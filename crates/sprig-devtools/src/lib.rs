//! Inspection helpers for a running [`App`]: counters for the node arena and
//! watcher registry, and a plain-text dump of the mounted tree.

use std::fmt::Write as _;

use sprig_core::{App, Node, NodeId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub nodes: usize,
    pub live_nodes: usize,
    pub watchers: usize,
    pub buffered_watchers: usize,
    pub state_keys: usize,
}

impl Metrics {
    pub fn collect(app: &App) -> Self {
        Self {
            nodes: app.node_count(),
            live_nodes: app.live_node_count(),
            watchers: app.watcher_count(),
            buffered_watchers: app.buffered_watcher_count(),
            state_keys: app.snapshot().len(),
        }
    }

    /// Nodes that still occupy an arena slot without being mounted.
    pub fn detached_nodes(&self) -> usize {
        self.nodes - self.live_nodes
    }

    pub fn summary(&self) -> String {
        format!(
            "nodes: {} ({} live)  |  watchers: {} (+{} buffered)  |  keys: {}",
            self.nodes, self.live_nodes, self.watchers, self.buffered_watchers, self.state_keys
        )
    }
}

pub struct Inspector {
    pub enabled: bool,
    samples: u64,
    pub metrics: Option<Metrics>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self {
            enabled: false,
            samples: 0,
            metrics: None,
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Takes a sample when enabled. The last sample stays available through
    /// `metrics` after the inspector is switched off.
    pub fn measure(&mut self, app: &App) -> Option<&Metrics> {
        if !self.enabled {
            return None;
        }
        self.samples += 1;
        let m = Metrics::collect(app);
        log::debug!("sample {}: {}", self.samples, m.summary());
        self.metrics = Some(m);
        self.metrics.as_ref()
    }
}

/// Renders the subtree under the mount point, one node per line, indented
/// two spaces per level.
pub fn dump_tree(app: &App) -> String {
    let mut out = String::new();
    dump_node(app, app.mount_point(), 0, &mut out);
    out
}

fn dump_node(app: &App, id: NodeId, depth: usize, out: &mut String) {
    let Some(children) = app.inspect(id, |n| {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), describe(n));
        n.children().to_vec()
    }) else {
        return;
    };
    for child in children {
        dump_node(app, child, depth + 1, out);
    }
}

fn describe(node: &Node) -> String {
    let mut line = format!("<{}", node.tag());
    for (k, v) in node.attrs() {
        let _ = write!(line, " {k}=\"{v}\"");
    }
    line.push('>');
    if node.is_hidden() {
        line.push_str(" [hidden]");
    }
    if let Some(text) = node.text() {
        let _ = write!(line, " {text:?}");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::prelude::*;

    fn counter_app() -> App {
        app(
            |app| {
                app.el("section").children([
                    app.el("h1").text("Counter"),
                    app.el("p")
                        .attr("id", "count")
                        .text("0")
                        .on_update(["count"], |app, node, s, _| {
                            app.set_text(node, s.get_i64("count").unwrap_or(0).to_string())
                        })?,
                ])
            },
            json!({ "count": 0 }),
            Options::default(),
        )
        .unwrap()
    }

    #[test]
    fn metrics_count_nodes_and_watchers() {
        let app = counter_app();
        let m = Metrics::collect(&app);
        // mount point, section, h1, p
        assert_eq!(m.nodes, 4);
        assert_eq!(m.live_nodes, 4);
        assert_eq!(m.detached_nodes(), 0);
        assert_eq!(m.watchers, 1);
        assert_eq!(m.buffered_watchers, 0);
        assert_eq!(m.state_keys, 1);

        let loose = app
            .el("span")
            .on_update(["count"], |_, _, _, _| Ok(()))
            .unwrap();
        let m = Metrics::collect(&app);
        assert_eq!(m.detached_nodes(), 1);
        assert_eq!(m.buffered_watchers, 1);
        assert_eq!(m.watchers, 1);

        drop(loose);
        let m = Metrics::collect(&app);
        assert_eq!(m.detached_nodes(), 0);
        assert_eq!(m.buffered_watchers, 0);
    }

    #[test]
    fn inspector_only_samples_when_enabled() {
        let app = counter_app();
        let mut inspector = Inspector::new();
        assert!(inspector.measure(&app).is_none());
        assert_eq!(inspector.samples(), 0);

        inspector.toggle();
        assert_eq!(inspector.measure(&app).map(|m| m.nodes), Some(4));
        assert_eq!(inspector.samples(), 1);

        inspector.toggle();
        assert!(inspector.measure(&app).is_none());
        assert!(inspector.metrics.is_some());
    }

    #[test]
    fn dump_shows_structure_and_visibility() {
        let app = counter_app();
        app.set_key("count", 3).unwrap();
        let root = app.root().unwrap();
        app.set_style(root, "display", "none").unwrap();

        let dump = dump_tree(&app);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "<main>");
        assert_eq!(lines[1], "  <section> [hidden]");
        assert_eq!(lines[2], "    <h1> \"Counter\"");
        assert_eq!(lines[3], "    <p id=\"count\"> \"3\"");
    }
}
