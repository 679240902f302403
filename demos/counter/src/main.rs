use sprig_core::prelude::*;
use sprig_devtools::{Inspector, dump_tree};
use sprig_navigation::{RouteMap, Router, go_back, navigate};

fn counter_button(app: &App) -> Result<El> {
    Ok(app
        .el("button")
        .text("+1")
        .on("click", |app, _, _| {
            app.set_key_with("count", |s| json!(s.get_i64("count").unwrap_or(0) + 1))
        }))
}

fn home(app: &App) -> Result<El> {
    let label = app
        .el("p")
        .on_update(["count"], |app, node, s, _| {
            app.set_text(node, format!("Count: {}", s.get_i64("count").unwrap_or(0)))
        })?;
    let message = app.conditional_on(
        ["count"],
        |s| s.get_i64("count").unwrap_or(0) >= 3,
        |app| Ok(app.el("strong").text("That's a lot of clicks")),
    )?;
    app.el("section")
        .children([label, app.create("CounterButton")?, message])
}

fn about(app: &App) -> Result<El> {
    Ok(app.el("p").text("A tiny counter built on sprig."))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let dir = std::env::temp_dir().join("sprig-counter");
    let options = Options::new()
        .strict(true)
        .log_state_updates(true)
        .persist_state(["count"]);

    let app = App::builder()
        .state(json!({ "count": 0 }))
        .options(options)
        .storage(FileStorage::new(dir.clone()))
        .mount(|app| {
            app.declare("CounterButton", counter_button)?;
            let routes = RouteMap::new().route("/", home).route("/about", about);
            app.el("div")
                .child(app.el("h1").text("Sprig counter"))?
                .child(Router::install(app, routes)?)
        })?;

    log::info!("restored count: {}", app.get("count")?);

    let mut inspector = Inspector::new();
    inspector.toggle();

    for _ in 0..3 {
        if let Some(button) = find(&app, app.mount_point(), "button") {
            app.emit(button, "click", &json!({}))?;
        }
    }
    println!("{}", dump_tree(&app));

    navigate(&app, "/about")?;
    println!("{}", dump_tree(&app));
    go_back(&app)?;
    println!("history: {:?}", sprig_navigation::history(&app));

    if let Some(m) = inspector.measure(&app) {
        println!("{}", m.summary());
    }

    if let Err(e) = app.set_key("missing", 1) {
        log::warn!("strict mode rejected write: {e}");
    }

    app.unmount()?;
    println!("persisted in {}: {:?}", dir.display(), app.persisted()?);
    Ok(())
}

fn find(app: &App, node: NodeId, tag: &str) -> Option<NodeId> {
    if app.inspect(node, |n| n.tag() == tag)? {
        return Some(node);
    }
    app.children_of(node)
        .into_iter()
        .find_map(|child| find(app, child, tag))
}
