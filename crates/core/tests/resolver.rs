//! Working-tree resolution tests: file discovery, inheritance, formats.

use tempfile::TempDir;

use graphver::resolver::{resolve_in_working_tree, ResolutionRequirements};
use graphver::GraphverError;

mod common;
use common::git;

fn write(root: &std::path::Path, rel: &str, content: &str) {
    git::write_file(root, rel, content).expect("write file");
}

#[test]
fn inheritance_with_prerelease_suppression() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(root, "version.json", r#"{"version": "1.0-alpha"}"#);
    write(root, "sub/version.json", r#"{"inherit": true, "prerelease": ""}"#);

    let (options, locations) =
        resolve_in_working_tree(root, &root.join("sub"), ResolutionRequirements::default()).unwrap();
    let options = options.unwrap();
    assert_eq!(options.version().unwrap().to_string(), "1.0");
    assert_eq!(locations.non_inheriting_dir.as_deref(), Some(""));
}

#[test]
fn subdirectory_prerelease_replacement() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(root, "version.json", r#"{"version": "2.1"}"#);
    write(root, "pkg/version.json", r#"{"inherit": true, "prerelease": "-preview"}"#);

    let (options, _) =
        resolve_in_working_tree(root, &root.join("pkg"), ResolutionRequirements::default()).unwrap();
    assert_eq!(options.unwrap().version().unwrap().to_string(), "2.1-preview");
}

#[test]
fn deep_start_climbs_to_root_file() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(root, "version.json", r#"{"version": "3.4"}"#);
    std::fs::create_dir_all(root.join("a/b/c")).unwrap();

    let (options, _) =
        resolve_in_working_tree(root, &root.join("a/b/c"), ResolutionRequirements::default()).unwrap();
    assert_eq!(options.unwrap().version().unwrap().to_string(), "3.4");
}

#[test]
fn version_txt_round_trip() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(root, "version.txt", "1.2.3\nbeta\n");

    let (options, locations) =
        resolve_in_working_tree(root, root, ResolutionRequirements::default()).unwrap();
    assert_eq!(options.unwrap().version().unwrap().to_string(), "1.2.3-beta");
    assert_eq!(locations.version_specifying_dir.as_deref(), Some(""));
}

#[test]
fn inherit_without_parent_is_an_error() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(root, "version.json", r#"{"inherit": true}"#);

    let err =
        resolve_in_working_tree(root, root, ResolutionRequirements::default()).unwrap_err();
    assert!(matches!(err, GraphverError::MissingParentConfiguration(_)));
}

#[test]
fn no_files_resolves_to_none() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("x")).unwrap();

    let (options, _) =
        resolve_in_working_tree(root, &root.join("x"), ResolutionRequirements::default()).unwrap();
    assert!(options.is_none());
}

#[test]
fn list_fields_replace_whole_on_overlay() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(
        root,
        "version.json",
        r#"{"version": "1.0", "pathFilters": ["./src", ":!docs"]}"#,
    );
    write(
        root,
        "sub/version.json",
        r#"{"inherit": true, "pathFilters": [":!generated"]}"#,
    );

    let (options, _) =
        resolve_in_working_tree(root, &root.join("sub"), ResolutionRequirements::default()).unwrap();
    assert_eq!(options.unwrap().path_filters().unwrap(), [":!generated"]);
}

#[test]
fn malformed_json_is_reported_with_path() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(root, "version.json", r#"{"version": }"#);

    let err = resolve_in_working_tree(root, root, ResolutionRequirements::default()).unwrap_err();
    match err {
        GraphverError::InvalidVersionFile { path, .. } => assert!(path.contains("version.json")),
        other => panic!("unexpected error: {other}"),
    }
}
