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

//! Confession Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;
use tokio::signal::unix;

use confession_relayer::service::{build_web_services, spawn_sweeper};
use confession_relayer_config::cli::{create_store, load_config, setup_logger, Opts};
use confession_relayer_context::RelayerContext;
use confession_relayer_store::ConfessionStore;

/// The main entry point for the relayer.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose)?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;

    // persistent storage for confessions and votes
    let store = create_store(&args)?;
    tracing::debug!(bytes = store.get_data_stored_size(), "Store opened");
    let store: Arc<dyn ConfessionStore> = Arc::new(store);

    // The RelayerContext connects to the chain (when configured), starts the
    // transaction queue and holds every piece of shared state.
    let ctx = RelayerContext::new(config, store)?;

    let sweeper_handle = spawn_sweeper(ctx.clone());
    let server_handle = tokio::spawn(build_web_services(ctx.clone()));
    tracing::event!(
        target: confession_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %confession_relayer_utils::probe::Kind::Lifecycle,
        started = true
    );
    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    let shutdown = || {
        tracing::event!(
            target: confession_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %confession_relayer_utils::probe::Kind::Lifecycle,
            shutdown = true
        );
        tracing::warn!("Shutting down...");
        // send shutdown signal to all of the application.
        ctx.shutdown();
        sweeper_handle.abort();
    };
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
            shutdown();
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
            shutdown();
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
            shutdown();
        },
    }
    match server_handle.await {
        Ok(Ok(())) => tracing::info!("Clean Exit .."),
        Ok(Err(e)) => tracing::error!(error = %e, "Server stopped with an error"),
        Err(e) => tracing::error!(error = %e, "Server task failed"),
    }
    Ok(())
}
