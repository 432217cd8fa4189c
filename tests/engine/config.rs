//! Configuration files

use partdb::{Client, EngineConfig, Error, CONFIG_FILE_NAME};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn client_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "throughput_interval_ms = 250\npartitions_per_container = 4\n\n[query]\nmax_concurrency = 2\n",
    )
    .unwrap();

    let client = Client::builder().config_file(&path).open().unwrap();
    let config = client.config();
    assert_eq!(config.throughput_interval(), Duration::from_millis(250));
    assert_eq!(config.partitions_per_container, 4);
    assert_eq!(config.query.max_concurrency, 2);
    assert_eq!(config.costs, EngineConfig::default().costs);
}

#[test]
fn missing_file_is_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    Client::builder().config_file(&path).open().unwrap();

    let written = EngineConfig::from_file(&path).unwrap();
    assert_eq!(written, EngineConfig::default());
}

#[test]
fn malformed_or_out_of_range_files_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    std::fs::write(&path, "throughput_interval_ms = \"soon\"\n").unwrap();
    assert!(matches!(
        Client::builder().config_file(&path).open(),
        Err(Error::Config(_))
    ));

    std::fs::write(&path, "throughput_interval_ms = 0\n").unwrap();
    assert!(Client::builder().config_file(&path).open().is_err());
}

#[test]
fn saved_config_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let mut config = EngineConfig::default();
    config.autoscale.sustained_intervals = 5;
    config.max_batch_operations = 10;
    config.write_to_file(&path).unwrap();

    assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
}
