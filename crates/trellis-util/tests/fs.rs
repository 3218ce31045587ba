use trellis_util::fs::{ensure_dir, expand_home, write_atomic};
use tempfile::TempDir;

#[test]
fn test_ensure_dir_creates_nested() {
    let tmp = TempDir::new().unwrap();
    let deep = tmp.path().join("x").join("y").join("z");
    assert!(!deep.exists());
    ensure_dir(&deep).unwrap();
    assert!(deep.is_dir());
}

#[test]
fn test_ensure_dir_idempotent() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("already");
    std::fs::create_dir(&dir).unwrap();
    ensure_dir(&dir).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn test_expand_home_leaves_plain_paths() {
    assert_eq!(
        expand_home("/var/cache/trellis"),
        std::path::PathBuf::from("/var/cache/trellis")
    );
}

#[test]
fn test_expand_home_replaces_tilde() {
    let expanded = expand_home("~/.trellis/cache.json");
    assert!(expanded.ends_with(".trellis/cache.json"));
    assert!(!expanded.to_string_lossy().starts_with('~'));
}

#[test]
fn test_write_atomic_creates_parent_and_replaces() {
    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("nested").join("data.json");
    write_atomic(&target, b"first").unwrap();
    write_atomic(&target, b"second").unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
}
