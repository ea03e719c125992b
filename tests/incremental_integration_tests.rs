use std::fs;
use std::path::Path;
use templar::config::Config;
use templar::engine::{Engine, EventKind, Preprocessor, TemplateEvent};
use templar::graph::NodeStatus;
use test_log::test;

const CONFIG: &str = r#"environments:
  dev:
    folders:
      layout:
        src: src
      dest: out
"#;

fn engine_for(root: &Path) -> Engine {
    fs::write(root.join("config.yml"), CONFIG).unwrap();
    let config = Config::load_config(root.join("config.yml")).unwrap();
    Engine::new(config.environment("dev").unwrap(), true).unwrap()
}

#[test]
fn build_update_delete_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let (src, out) = (root.join("src"), root.join("out"));
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.tpl"), "A").unwrap();
    fs::write(src.join("b.tpl"), r#"{% include "a.tpl" %}+B"#).unwrap();
    let mut engine = engine_for(&root);

    let full = engine.process_templates().unwrap();
    assert!(full.is_success());
    assert_eq!(full.paths(), vec![src.join("a.tpl"), src.join("b.tpl")]);
    assert_eq!(fs::read_to_string(out.join("a.html")).unwrap(), "A");
    assert_eq!(fs::read_to_string(out.join("b.html")).unwrap(), "A+B");

    assert_eq!(engine.graph().affected(&src.join("a.tpl")), vec![src.join("a.tpl"), src.join("b.tpl")]);
    fs::write(src.join("a.tpl"), "A2").unwrap();
    let update = engine.dispatch(TemplateEvent::new(EventKind::Update, src.join("a.tpl")));
    assert_eq!(update.paths(), vec![src.join("a.tpl"), src.join("b.tpl")]);
    assert_eq!(fs::read_to_string(out.join("b.html")).unwrap(), "A2+B");

    fs::remove_file(src.join("a.tpl")).unwrap();
    let delete = engine.dispatch(TemplateEvent::new(EventKind::Delete, src.join("a.tpl")));
    assert!(!out.join("a.html").exists());
    assert!(!engine.graph().contains(&src.join("a.tpl")));
    assert_eq!(engine.graph().get(&src.join("b.tpl")).unwrap().status, NodeStatus::Stale);
    assert_eq!(delete.failure_count(), 1);
}

#[test]
fn rename_moves_the_output() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let (src, out) = (root.join("src"), root.join("out"));
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("old.tpl"), "page").unwrap();
    let mut engine = engine_for(&root);
    engine.process_templates().unwrap();

    fs::rename(src.join("old.tpl"), src.join("new.tpl")).unwrap();
    let event = notify::Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Name(
        notify::event::RenameMode::Both,
    )))
    .add_path(src.join("old.tpl"))
    .add_path(src.join("new.tpl"));
    for template_event in templar::watch::normalize_event(&event) {
        assert!(engine.dispatch(template_event).is_success());
    }

    assert!(!out.join("old.html").exists());
    assert_eq!(fs::read_to_string(out.join("new.html")).unwrap(), "page");
}

#[test]
fn duplicate_events_do_not_rebuild() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let src = root.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.tpl"), "A").unwrap();
    let mut engine = engine_for(&root);
    engine.process_templates().unwrap();

    // an editor save often arrives as create followed by modify
    let first = engine.update_templates(&src.join("a.tpl"), EventKind::Create);
    let second = engine.update_templates(&src.join("a.tpl"), EventKind::Update);
    assert!(first.is_empty());
    assert!(second.is_empty());
}
