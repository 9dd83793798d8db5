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

//! The Confession Relayer Command-line tool
//!
//! Start the relayer from a config directory:
//!
//! $ confession-relayer -vvv -c <CONFIG_DIR_PATH>
use crate::RelayerConfig;
use anyhow::Context;
use directories_next::ProjectDirs;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

/// Package identifier, where the default configuration & database are defined.
/// If the user does not start the relayer with the `--config-dir`
/// it will default to read from the default location depending on the OS.
pub const PACKAGE_ID: [&str; 3] = ["org", "confessions", "confession-relayer"];

/// The Confession Relayer Command-line tool
///
/// Start the relayer from a config directory:
///
/// $ confession-relayer -vvv -c <CONFIG_DIR_PATH>
#[derive(StructOpt)]
#[structopt(name = "Confession Relayer")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// Create the Database Store in a temporary directory.
    /// and will be deleted when the process exits.
    #[structopt(long)]
    pub tmp: bool,
}

/// Loads the configuration from the given directory.
///
/// An explicit directory must exist. When none is given and the OS default
/// config directory is missing, only `CONFESSION_*` environment variables apply.
pub fn load_config<P>(
    config_dir: Option<P>,
) -> Result<RelayerConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    tracing::debug!("Getting default dirs for confession relayer");
    let explicit = config_dir.is_some();
    let path = match config_dir {
        Some(p) => p.as_ref().to_path_buf(),
        None => default_dirs()?.config_dir().to_path_buf(),
    };
    if !path.is_dir() {
        if explicit {
            return Err(anyhow::anyhow!(
                "{} is not a directory",
                path.display()
            ));
        }
        tracing::debug!(
            "{} does not exist, using environment only",
            path.display()
        );
        return Ok(crate::utils::parse_from_files(&[])?);
    }
    tracing::trace!("Loading Config from {} ..", path.display());
    let v = crate::utils::load(path)?;
    tracing::trace!("Config loaded..");
    Ok(v)
}

fn default_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("failed to get config")
}

/// Sets up the logger for the relayer, based on the verbosity level passed in.
///
/// Pretty output by default, flattened JSON under the `integration-tests` feature.
pub fn setup_logger(verbosity: i32) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in [
        "confession_relayer",
        "confession_relayer_tx_relay",
        "confession_relayer_auth",
        "confession_relayer_tx_queue",
        "confession_relayer_chain",
        "confession_fee_oracle_backends",
        "confession_relayer_handlers",
        confession_relayer_utils::probe::TARGET,
    ] {
        env_filter =
            env_filter.add_directive(format!("{target}={log_level}").parse()?);
    }
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    // if we are not compiling for integration tests, we should use pretty logs
    #[cfg(not(feature = "integration-tests"))]
    let logger = logger.pretty();
    // otherwise, we should use json, which is easy to parse.
    #[cfg(feature = "integration-tests")]
    let logger = logger.json().flatten_event(true).with_current_span(false);

    logger.init();
    Ok(())
}

/// Creates a database store for the relayer based on the configuration passed in.
///
/// `--tmp` gives a throwaway store, otherwise `store/` next to the config
/// directory (or the OS data dir).
pub fn create_store(
    opts: &Opts,
) -> anyhow::Result<confession_relayer_store::SledStore> {
    if opts.tmp {
        tracing::debug!("Using temp dir for store");
        let store = confession_relayer_store::SledStore::temporary()?;
        return Ok(store);
    }
    let p = match opts.config_dir.as_ref() {
        Some(p) => p.to_path_buf(),
        None => default_dirs()?.data_local_dir().to_path_buf(),
    };
    let db_path = match opts.config_dir.as_ref().zip(p.parent()) {
        Some((_, parent)) => parent.join("store"),
        None => p.join("store"),
    };

    let store = confession_relayer_store::SledStore::open(db_path)?;
    Ok(store)
}
