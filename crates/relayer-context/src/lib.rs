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

#![warn(missing_docs)]
//! # Relayer Context Module 🕸️
//!
//! A module for managing the context of the relayer.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use confession_fee_oracle_backends::{
    ContractFeeBackend, FeeBackend, FeeOracleMerger, FixedFeeBackend,
};
use confession_relayer_auth::AdminAuth;
use confession_relayer_chain::{ChainClient, EthersChainClient};
use confession_relayer_config::RelayerConfig;
use confession_relayer_store::{ConfessionStore, PaymentClaims};
use confession_relayer_tx_queue::TxQueue;
use confession_relayer_tx_relay::{RateLimiter, RelayerSubmitter, TrustedProxies};
use confession_relayer_utils::metric::Metrics;
use confession_relayer_utils::probe;

/// RelayerContext contains Relayer's configuration, shared state and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: RelayerConfig,
    /// Broadcasts a shutdown signal to all active connections.
    ///
    /// The initial `shutdown` trigger is provided by the `run` caller. The
    /// server is responsible for gracefully shutting down active connections.
    /// When a connection task is spawned, it is passed a broadcast receiver
    /// handle. When a graceful shutdown is initiated, a `()` value is sent via
    /// the broadcast::Sender. Each active connection receives it, reaches a
    /// safe terminal state, and completes the task.
    notify_shutdown: broadcast::Sender<()>,
    /// Represents the metrics for the relayer
    pub metrics: Arc<Metrics>,
    store: Arc<dyn ConfessionStore>,
    /// `None` while the relayer is not configured.
    chain: Option<Arc<dyn ChainClient>>,
    fee_oracle: Arc<FeeOracleMerger>,
    rate_limiter: Arc<RateLimiter>,
    trusted_proxies: Arc<TrustedProxies>,
    claims: Arc<PaymentClaims>,
    submitter: Arc<RelayerSubmitter>,
    admin: Arc<AdminAuth>,
}

impl std::fmt::Debug for RelayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerContext")
            .field("port", &self.config.port)
            .field("chain", &self.chain)
            .field("store", &self.store)
            .finish()
    }
}

impl RelayerContext {
    /// Creates a new RelayerContext, connecting to the configured chain when
    /// the relayer is fully configured.
    ///
    /// Must be called from within a tokio runtime, as it starts the
    /// transaction queue.
    pub fn new(
        config: RelayerConfig,
        store: Arc<dyn ConfessionStore>,
    ) -> confession_relayer_utils::Result<Self> {
        let chain: Option<Arc<dyn ChainClient>> = match (
            &config.evm.http_endpoint,
            &config.evm.private_key,
            config.evm.contract_address,
        ) {
            (Some(endpoint), Some(private_key), Some(contract)) => {
                let client = EthersChainClient::new(
                    endpoint.as_url(),
                    private_key,
                    contract,
                    config.evm.chain_id,
                )?;
                Some(Arc::new(client))
            }
            _ => None,
        };
        Self::with_chain(config, store, chain)
    }

    /// Creates a new RelayerContext around an existing chain client.
    pub fn with_chain(
        config: RelayerConfig,
        store: Arc<dyn ConfessionStore>,
        chain: Option<Arc<dyn ChainClient>>,
    ) -> confession_relayer_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let metrics = Arc::new(Metrics::new()?);

        let mut fee_oracle = FeeOracleMerger::builder();
        if let Some(chain) = &chain {
            fee_oracle =
                fee_oracle.merge(Box::new(ContractFeeBackend::new(chain.clone())));
        }
        let fee_oracle = Arc::new(
            fee_oracle
                .merge(Box::new(FixedFeeBackend::fallback(
                    config.relayer.default_fee.wei(),
                )))
                .metrics(metrics.clone())
                .build(),
        );

        let tx_queue = chain.as_ref().map(|chain| {
            TxQueue::spawn(
                chain.clone(),
                config.evm.explorer.clone(),
                metrics.clone(),
            )
        });

        let rate_limiter = Arc::new(RateLimiter::new(
            config.relayer.rate_limit.max_requests,
            Duration::from_secs(config.relayer.rate_limit.window_secs),
        ));
        let trusted_proxies =
            Arc::new(TrustedProxies::new(&config.relayer.trusted_proxies));
        let claims = Arc::new(PaymentClaims::new());
        let submitter = RelayerSubmitter::builder()
            .config(config.relayer.clone())
            .chain(chain.clone())
            .tx_queue(tx_queue)
            .fee_oracle(fee_oracle.clone() as Arc<dyn FeeBackend>)
            .store(store.clone())
            .claims(claims.clone())
            .rate_limiter(rate_limiter.clone())
            .metrics(metrics.clone())
            .explorer(config.evm.explorer.clone())
            .build();

        let admin = AdminAuth::builder()
            .owner(config.admin.owner_address)
            .password(config.admin.password.clone())
            .nonce_ttl(Duration::from_secs(config.admin.nonce_ttl_secs))
            .session_ttl(Duration::from_secs(config.admin.session_ttl_secs))
            .metrics(metrics.clone())
            .build();

        match &chain {
            Some(chain) => tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Lifecycle,
                relayer_enabled = true,
                chain_id = chain.chain_id(),
            ),
            None => tracing::warn!(
                "Anonymous relayer disabled: evm http-endpoint, private-key or contract-address missing"
            ),
        }

        Ok(Self {
            config,
            notify_shutdown,
            metrics,
            store,
            chain,
            fee_oracle,
            rate_limiter,
            trusted_proxies,
            claims,
            submitter: Arc::new(submitter),
            admin: Arc::new(admin),
        })
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed tasks/connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// Returns the confession store.
    pub fn store(&self) -> &Arc<dyn ConfessionStore> {
        &self.store
    }

    /// Returns the chain client, when the relayer is configured.
    pub fn chain(&self) -> Option<&Arc<dyn ChainClient>> {
        self.chain.as_ref()
    }

    /// Returns the fee oracle.
    pub fn fee_oracle(&self) -> Arc<FeeOracleMerger> {
        self.fee_oracle.clone()
    }

    /// Returns the relayed submission orchestrator.
    pub fn submitter(&self) -> &RelayerSubmitter {
        &self.submitter
    }

    /// Returns the admin authentication state.
    pub fn admin(&self) -> &AdminAuth {
        &self.admin
    }

    /// Returns the proxies allowed to forward the caller address.
    pub fn trusted_proxies(&self) -> &TrustedProxies {
        &self.trusted_proxies
    }

    /// Returns the payment claims.
    pub fn claims(&self) -> &PaymentClaims {
        &self.claims
    }

    /// Drops expired nonces, sessions and rate limit windows.
    pub fn sweep_expired(&self) -> usize {
        self.admin.sweep_expired() + self.rate_limiter.sweep_expired()
    }
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the server
/// should shutdown.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Callers may query for whether the shutdown signal has been
/// received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Whether the shutdown signal has been received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        self.shutdown = true;
    }
}
