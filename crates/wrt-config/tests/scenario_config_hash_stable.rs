//! Scenario: config hash is a stable fingerprint of the merged document.
//!
//! - same layers, same hash
//! - key order inside a layer does not matter
//! - an overlay that changes a value changes the hash

use wrt_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
exchange:
  author: "Kackiest Kacky"
  activity_count: 40
jobs:
  ledger:
    interval_secs: 60
    dedicated_every: 10
database:
  url_env: "WRT_DATABASE_URL"
"#;

const BASE_YAML_REORDERED: &str = r#"
database:
  url_env: "WRT_DATABASE_URL"
jobs:
  ledger:
    dedicated_every: 10
    interval_secs: 60
exchange:
  activity_count: 40
  author: "Kackiest Kacky"
"#;

const OVERLAY_YAML: &str = r#"
jobs:
  ledger:
    interval_secs: 30
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let cfg = merged.typed().unwrap();
    assert_eq!(cfg.jobs.ledger.interval_secs, 30);
    assert_eq!(cfg.jobs.ledger.dedicated_every, 10);
    assert_eq!(cfg.exchange.author, "Kackiest Kacky");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
