// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};

use config::{Config, File};

use crate::RelayerConfig;

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> confession_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(confession_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`RelayerConfig`] from the given config file(s),
/// with `CONFESSION__*` environment variables layered on top.
pub fn parse_from_files(
    files: &[PathBuf],
) -> confession_relayer_utils::Result<RelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // `CONFESSION_EVM__PRIVATE_KEY` maps to `evm.private_key`.
    let builder = builder.add_source(
        config::Environment::with_prefix("CONFESSION")
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg = builder.build()?;
    let config: Result<
        RelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files and
///
/// Returns `Ok(RelayerConfig)` on success.
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> confession_relayer_utils::Result<RelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: RelayerConfig,
) -> confession_relayer_utils::Result<RelayerConfig> {
    tracing::trace!("Checking configration sanity ...");

    if let Some(var) = config
        .admin
        .password
        .as_deref()
        .and_then(|p| p.strip_prefix('$').map(str::to_owned))
    {
        tracing::trace!("Reading admin password from env {}", var);
        config.admin.password = std::env::var(&var).ok();
        if config.admin.password.is_none() {
            tracing::warn!(
                "!!WARNING!!: admin password env var ({}) is not set",
                var
            );
        }
    }
    if config
        .admin
        .password
        .as_deref()
        .map_or(false, |p| p.trim().is_empty())
    {
        config.admin.password = None;
    }

    if !config.relayer_enabled() {
        tracing::warn!(
            "!!WARNING!!: relayer is disabled, http-endpoint, private-key and contract-address \
            must all be configured under [evm] to relay confessions"
        );
    }
    if config.admin.owner_address.is_none() {
        tracing::warn!(
            "!!WARNING!!: admin.owner-address is not configured, wallet login will always be refused"
        );
    }
    if config.relayer.payment_tolerance_bps > 10_000 {
        tracing::warn!(
            "!!WARNING!!: payment-tolerance-bps ({}) is above 100%, clamping to 10000",
            config.relayer.payment_tolerance_bps
        );
        config.relayer.payment_tolerance_bps = 10_000;
    }
    if config.relayer.rate_limit.max_requests == 0 {
        return Err(confession_relayer_utils::Error::Generic(
            "relayer.rate-limit.max-requests must be at least 1",
        ));
    }

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    #[test]
    fn empty_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.port, 9955);
        assert_eq!(config.relayer.rate_limit.max_requests, 10);
        assert_eq!(config.relayer.rate_limit.window_secs, 3600);
        assert_eq!(config.relayer.payment_tolerance_bps, 9000);
        assert_eq!(config.relayer.confirmation_timeout_secs, 60);
        assert_eq!(config.relayer.max_confession_length, 1000);
        assert!(config.relayer.trusted_proxies.is_empty());
        assert_eq!(config.admin.nonce_ttl_secs, 300);
        assert_eq!(config.admin.session_ttl_secs, 3600);
        assert!(!config.relayer_enabled());
    }

    #[test]
    fn parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("relayer.toml"),
            r#"
port = 8080
app-url = "https://confessions.example.org"

[evm]
http-endpoint = "http://localhost:8545"
chain-id = 31337
contract-address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
private-key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[relayer]
gas-buffer = "0.002"
payment-tolerance-bps = 20000
trusted-proxies = ["127.0.0.1", "10.0.0.0/8"]

[relayer.rate-limit]
max-requests = 3

[admin]
owner-address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
password = "hunter2"
"#,
        )
        .unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.evm.chain_id, 31337);
        assert!(config.relayer_enabled());
        assert_eq!(config.relayer.gas_buffer.wei(), U256::exp10(15) * 2);
        assert_eq!(config.relayer.rate_limit.max_requests, 3);
        assert_eq!(config.relayer.payment_tolerance_bps, 10_000);
        assert_eq!(config.relayer.trusted_proxies, ["127.0.0.1", "10.0.0.0/8"]);
        assert_eq!(config.admin.password.as_deref(), Some("hunter2"));
        assert!(config.admin.owner_address.is_some());
    }

    #[test]
    fn password_reads_from_env() {
        std::env::set_var("CONFESSION_TEST_ADMIN_PASSWORD", "s3cret");
        let mut config = RelayerConfig::default();
        config.admin.password = Some("$CONFESSION_TEST_ADMIN_PASSWORD".into());
        let config = postloading_process(config).unwrap();
        assert_eq!(config.admin.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let mut config = RelayerConfig::default();
        config.relayer.rate_limit.max_requests = 0;
        assert!(postloading_process(config).is_err());
    }
}
