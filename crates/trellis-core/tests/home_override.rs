//! Kept in its own test binary: it changes `TRELLIS_HOME` for the process.

use trellis_core::config::{ResolverConfig, RevisionCacheConfig};

#[test]
fn test_trellis_home_moves_config_and_cache() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::env::set_var("TRELLIS_HOME", tmp.path());

    assert_eq!(ResolverConfig::default_path(), tmp.path().join("config.toml"));
    assert_eq!(
        RevisionCacheConfig::default().file_path(),
        tmp.path().join("dynamic-revisions.json")
    );
    let parsed = ResolverConfig::parse_toml("[cache]\nenabled = true\n").unwrap();
    assert_eq!(
        parsed.cache.file_path(),
        tmp.path().join("dynamic-revisions.json")
    );

    std::env::remove_var("TRELLIS_HOME");
}
