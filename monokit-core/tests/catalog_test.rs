use std::fs;
use std::path::Path;

use monokit_core::Catalog;
use serde_json::Value;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn write_fixture(root: &Path) {
    write(
        &root.join("package.json"),
        "{\n  \"name\": \"fixture-root\",\n  \"workspaces\": [\n    \"packages/*\"\n  ]\n}\n",
    );
    write(
        &root.join("packages/a/package.json"),
        "{\n  \"name\": \"a\",\n  \"version\": \"1.0.0\"\n}\n",
    );
    write(&root.join("packages/broken/package.json"), "{ not json ");
    fs::create_dir_all(root.join("packages/empty")).unwrap();
    write(&root.join("packages/readme.md"), "not a directory\n");
}

#[tokio::test]
async fn scan_includes_root_and_skips_non_workspaces() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());

    let catalog = Catalog::scan(tmp.path()).await.unwrap();
    let paths: Vec<&str> = catalog.paths().map(String::as_str).collect();
    // The broken manifest and the manifest-less directory are silently
    // skipped; the root is always present.
    assert_eq!(paths, vec!["", "/packages/a"]);
    assert_eq!(catalog.get("/packages/a").unwrap().name(), "a");
    assert!(catalog.get("").unwrap().is_aggregator());
}

#[tokio::test]
async fn indent_is_detected_from_the_root_manifest() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp.path().join("package.json"),
        "{\n\t\"name\": \"tabbed\"\n}\n",
    );
    let catalog = Catalog::scan(tmp.path()).await.unwrap();
    assert_eq!(catalog.indent(), "\t");
}

#[tokio::test]
async fn saving_an_untouched_manifest_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let file = tmp.path().join("packages/a/package.json");
    let before = fs::read(&file).unwrap();

    let mut catalog = Catalog::scan(tmp.path()).await.unwrap();
    catalog.save("/packages/a").unwrap();

    let after = fs::read(&file).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn save_dirty_writes_only_marked_manifests() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    write(
        &tmp.path().join("packages/b/package.json"),
        "{\n  \"name\": \"b\",\n  \"version\": \"1.0.0\"\n}\n",
    );

    let mut catalog = Catalog::scan(tmp.path()).await.unwrap();
    let b_file = tmp.path().join("packages/b/package.json");
    let b_before = fs::read(&b_file).unwrap();

    catalog
        .get_mut("/packages/a")
        .unwrap()
        .insert("version", Value::String("2.0.0".to_string()));
    catalog.mark_dirty("/packages/a");

    let saved = catalog.save_dirty().unwrap();
    assert_eq!(saved, 1);
    assert_eq!(fs::read(&b_file).unwrap(), b_before);
    let a_text = fs::read_to_string(tmp.path().join("packages/a/package.json")).unwrap();
    assert!(a_text.contains("\"version\": \"2.0.0\""));
    assert_eq!(catalog.dirty_paths().count(), 0);
}
