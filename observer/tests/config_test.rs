//! Configuration loading tests

use crosslink_observer::{
    config::{FailurePolicy, ObserverConfig, DEFAULT_MAX_WINDOW},
    ChainId,
};
use std::path::PathBuf;

fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
    std::fs::write(&path, contents).expect("write temp config");
    path
}

#[test]
fn test_load_explicit_file() {
    let path = write_config(
        "crosslink-observer-load",
        r#"
[coordinator]
endpoint = "http://gateway:1317"

[chains.goerli]
endpoint = "https://goerli.example.org"
contract_address = "0x132b042bD5198a48E4D273f46b979E5f13Bd9239"
poll_interval_seconds = 12

[chains.bsc-testnet]
endpoint = "https://bsc.example.org"
contract_address = "0x7Ab6eB4B7C42ed5C5b7e5C3D5b3A4c1F8A5d3F21"
max_window = 25
failure_policy = "hold"
"#,
    );

    let config = ObserverConfig::load(path.to_str()).expect("config loads");
    std::fs::remove_file(&path).ok();
    config.validate().expect("config is valid");

    assert_eq!(config.coordinator.endpoint, "http://gateway:1317");

    let goerli = config.chains.get(&ChainId::new("goerli")).unwrap();
    assert_eq!(goerli.poll_interval_seconds, 12);
    assert_eq!(goerli.max_window, DEFAULT_MAX_WINDOW);
    assert_eq!(goerli.failure_policy, FailurePolicy::Skip);

    let bsc = config.chains.get(&ChainId::new("bsc-testnet")).unwrap();
    assert_eq!(bsc.max_window, 25);
    assert_eq!(bsc.failure_policy, FailurePolicy::Hold);
    assert_eq!(bsc.schema.deposit, "LockSend(address,string,uint256,string,bytes)");
}

#[test]
fn test_load_rejects_missing_explicit_file() {
    assert!(ObserverConfig::load(Some("/nonexistent/crosslink-observer")).is_err());
}

#[test]
fn test_invalid_schema_fails_validation() {
    let path = write_config(
        "crosslink-observer-schema",
        r#"
[chains.goerli]
endpoint = "https://goerli.example.org"
contract_address = "0x132b042bD5198a48E4D273f46b979E5f13Bd9239"

[chains.goerli.schema]
mint_confirmation = "MMinted(address,uint256)"
"#,
    );

    let config = ObserverConfig::load(path.to_str()).expect("config loads");
    std::fs::remove_file(&path).ok();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("goerli"));
}

#[test]
fn test_indexed_schema_parameter_fails_validation() {
    let path = write_config(
        "crosslink-observer-indexed",
        r#"
[chains.goerli]
endpoint = "https://goerli.example.org"
contract_address = "0x132b042bD5198a48E4D273f46b979E5f13Bd9239"

[chains.goerli.schema]
release = "event Unlock(address indexed to, uint256 amount)"
"#,
    );

    let config = ObserverConfig::load(path.to_str()).expect("config loads");
    std::fs::remove_file(&path).ok();

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("goerli"));
    assert!(err.contains("indexed"));
}
