mod search_stub;

use std::fs;
use std::path::Path;

use predicates::prelude::*;
use serde_json::Value;

use search_stub::{Recorded, SearchStub};

const SPRITES: &str = r#"
- path: Alien.jpg
  thumb: Movies/1979/.thumbs-0.jpg
  thumb_width: 100
  thumb_height: 150
  thumb_total_width: 200
  thumb_total_height: 150
- path: Apocalypse Now.jpg
  thumb: Movies/1979/.thumbs-0.jpg
  thumb_x: 100
  thumb_width: 100
  thumb_height: 150
  thumb_total_width: 200
  thumb_total_height: 150
"#;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    fs::write(path, text).expect("write file");
}

fn index(root: &Path, stub: &SearchStub, extra: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("finder");
    cmd.env("SEARCH_HOST", &stub.base_url)
        .env("SEARCH_INDEX", "things")
        .env("SEARCH_API_KEY", "secret")
        .arg("index")
        .arg("--info")
        .arg(root.join("info"))
        .arg("--media")
        .arg(root.join("media"))
        .arg("--state")
        .arg(root.join("state/index.tsv"))
        .args(extra)
        .assert()
}

fn pushed_sources(requests: &[Recorded]) -> Vec<String> {
    requests
        .iter()
        .filter(|r| r.method == "POST" && r.path == "/indexes/things/documents")
        .flat_map(|r| r.body.as_array().cloned().unwrap_or_default())
        .filter_map(|doc| doc.get("source").and_then(Value::as_str).map(str::to_owned))
        .collect()
}

fn seed(root: &Path) {
    write(root, "info/Movies/1979/Alien.yml", "name: Alien\ndirectors: Ridley Scott\n");
    write(
        root,
        "info/Movies/1979/Apocalypse Now.yml",
        "name: Apocalypse Now\ndirectors: Francis Ford Coppola\n",
    );
    write(root, "info/People/Ridley Scott.yml", "name: Ridley Scott\ndob: 1937-11-30\n");
    write(root, "info/People/notes.md", "# not indexed\n");
    write(root, "media/Movies/1979/.thumbs.yml", SPRITES);
}

#[test]
fn first_run_pushes_everything_and_writes_state() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    seed(root);
    let stub = SearchStub::spawn(false);

    index(root, &stub, &[])
        .success()
        .stderr(predicate::str::contains("index: done"));

    let requests = stub.take_requests();
    assert_eq!(
        pushed_sources(&requests),
        vec![
            "Movies/1979/Alien.yml",
            "Movies/1979/Apocalypse Now.yml",
            "People/Ridley Scott.yml",
        ]
    );
    assert!(
        requests
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Bearer secret"))
    );

    let docs: Vec<Value> = requests
        .iter()
        .filter(|r| r.method == "POST")
        .flat_map(|r| r.body.as_array().cloned().unwrap_or_default())
        .collect();
    let alien = docs
        .iter()
        .find(|doc| doc["source"] == "Movies/1979/Alien.yml")
        .expect("Alien document");
    assert_eq!(alien["id"], "Movies_1979_Alien");
    assert_eq!(alien["image"]["thumb"], "Movies/1979/.thumbs-0.jpg");

    let state = fs::read_to_string(root.join("state/index.tsv")).expect("read state");
    let paths: Vec<&str> = state
        .lines()
        .map(|line| line.split('\t').next().unwrap_or_default())
        .collect();
    assert_eq!(
        paths,
        vec![
            "Movies/1979/Alien.yml",
            "Movies/1979/Apocalypse Now.yml",
            "People/Ridley Scott.yml",
        ]
    );
    assert!(state.lines().all(|line| line.split('\t').nth(1).map(str::len) == Some(64)));
}

#[test]
fn second_run_deletes_removed_and_fans_out_to_sprite_siblings() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    seed(root);
    let stub = SearchStub::spawn(false);
    index(root, &stub, &[]).success();
    stub.take_requests();

    // Unchanged tree: nothing to push or delete.
    index(root, &stub, &[]).success();
    assert!(stub.take_requests().is_empty());

    fs::remove_file(root.join("info/People/Ridley Scott.yml")).expect("remove file");
    write(root, "info/Movies/1979/Alien.yml", "name: Alien\ndirectors: [Ridley Scott]\n");
    index(root, &stub, &[]).success();

    let requests = stub.take_requests();
    let delete = requests
        .iter()
        .find(|r| r.path == "/indexes/things/documents/delete-batch")
        .expect("delete request");
    assert_eq!(delete.body, serde_json::json!(["People_Ridley_Scott"]));
    assert_eq!(
        pushed_sources(&requests),
        vec!["Movies/1979/Alien.yml", "Movies/1979/Apocalypse Now.yml"]
    );

    let state = fs::read_to_string(root.join("state/index.tsv")).expect("read state");
    assert!(!state.contains("Ridley Scott.yml"));
    assert_eq!(state.lines().count(), 2);
}

#[test]
fn force_list_pushes_named_files_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    seed(root);
    let stub = SearchStub::spawn(false);
    index(root, &stub, &[]).success();
    stub.take_requests();

    index(root, &stub, &["--force", r#"["People/Ridley Scott.yml"]"#]).success();
    assert_eq!(
        pushed_sources(&stub.take_requests()),
        vec!["People/Ridley Scott.yml"]
    );
}

#[test]
fn failed_task_leaves_state_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    seed(root);
    let stub = SearchStub::spawn(true);

    index(root, &stub, &[])
        .failure()
        .stderr(predicate::str::contains("document id is invalid"));
    assert!(!root.join("state/index.tsv").exists());
}
