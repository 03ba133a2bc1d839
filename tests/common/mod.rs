pub mod http_mock;

use opaitokens::config::{AccountConfig, OpaiConfig};
use opaitokens::oauth::Endpoints;

/// Endpoints that route every host of the flow to one mock server.
#[allow(dead_code)]
pub fn mock_endpoints(uri: &str) -> Endpoints {
    Endpoints {
        auth_base: uri.to_string(),
        discovery_base: Some(uri.to_string()),
    }
}

/// Config pointing every base URL at `uri`.
#[allow(dead_code)]
pub fn mock_config(uri: &str, account: Option<AccountConfig>) -> OpaiConfig {
    OpaiConfig {
        auth_base_url: uri.to_string(),
        discovery_base_url: Some(uri.to_string()),
        pool_base_url: uri.to_string(),
        timeout_secs: 5,
        account,
        ..OpaiConfig::default()
    }
}

/// Create a temp directory with a config.json file.
#[allow(dead_code)]
pub fn temp_config_dir(config: &OpaiConfig) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let json = serde_json::to_string_pretty(config).unwrap();
    std::fs::write(config_path, json).unwrap();
    dir
}
