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

use std::sync::Arc;

use confession_relayer_utils::metric::Metrics;
use confession_relayer_utils::{probe, Error, Result};

use crate::{FeeBackend, FeeQuote, FeeSource};

/// A fee oracle that asks its backends in order and returns the first quote.
///
/// - A failing backend is logged and the next one is asked.
/// - Any quote not sourced from the contract counts as a fee fallback.
/// - When every backend fails, the last error is returned.
#[allow(clippy::module_name_repetitions)]
pub struct FeeOracleMerger {
    backends: Vec<Box<dyn FeeBackend>>,
    metrics: Option<Arc<Metrics>>,
}

impl FeeOracleMerger {
    /// Creates a new `FeeOracleMergerBuilder`
    #[must_use]
    pub fn builder() -> FeeOracleMergerBuilder {
        FeeOracleMergerBuilder {
            backends: Vec::default(),
            metrics: None,
        }
    }
}

/// A builder for the `FeeOracleMerger`
pub struct FeeOracleMergerBuilder {
    backends: Vec<Box<dyn FeeBackend>>,
    metrics: Option<Arc<Metrics>>,
}

impl FeeOracleMergerBuilder {
    /// Appends a backend, asked after every backend merged before it.
    #[must_use]
    pub fn merge(mut self, backend: Box<dyn FeeBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Counts fallbacks in `metrics`.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the `FeeOracleMerger`
    #[must_use]
    pub fn build(self) -> FeeOracleMerger {
        FeeOracleMerger {
            backends: self.backends,
            metrics: self.metrics,
        }
    }
}

#[async_trait::async_trait]
impl FeeBackend for FeeOracleMerger {
    fn name(&self) -> &'static str {
        "merger"
    }

    async fn required_fee(&self) -> Result<FeeQuote> {
        let mut last_error = Error::Generic("no fee backend configured");
        for backend in &self.backends {
            match backend.required_fee().await {
                Ok(quote) => {
                    if quote.source == FeeSource::Fallback {
                        tracing::warn!(
                            backend = backend.name(),
                            fee = %quote.amount,
                            "Using fallback fee, the contract fee could not be read"
                        );
                        tracing::event!(
                            target: probe::TARGET,
                            tracing::Level::DEBUG,
                            kind = %probe::Kind::FeeOracle,
                            source = %quote.source,
                            fee = %quote.amount,
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.fee_fallbacks.inc();
                        }
                    }
                    return Ok(quote);
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %e,
                        "Fee backend failed"
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContractFeeBackend, FixedFeeBackend};
    use confession_relayer_chain::MockedChainClient;
    use ethers::types::{Address, U256};

    fn oracle(chain: Arc<MockedChainClient>, metrics: Arc<Metrics>) -> FeeOracleMerger {
        FeeOracleMerger::builder()
            .merge(Box::new(ContractFeeBackend::new(chain)))
            .merge(Box::new(FixedFeeBackend::fallback(U256::from(7u64))))
            .metrics(metrics)
            .build()
    }

    #[tokio::test]
    async fn contract_fee_wins_when_readable() {
        let chain = Arc::new(MockedChainClient::new(Address::random()));
        chain.set_fee(Some(U256::from(1000u64)));
        let metrics = Arc::new(Metrics::new().unwrap());
        let quote = oracle(chain, metrics.clone()).required_fee().await.unwrap();
        assert_eq!(quote.amount, U256::from(1000u64));
        assert_eq!(quote.source, FeeSource::Contract);
        assert_eq!(metrics.fee_fallbacks.get(), 0.0);
    }

    #[tokio::test]
    async fn falls_back_and_counts_it() {
        let chain = Arc::new(MockedChainClient::new(Address::random()));
        chain.set_fee(None);
        let metrics = Arc::new(Metrics::new().unwrap());
        let quote = oracle(chain, metrics.clone()).required_fee().await.unwrap();
        assert_eq!(quote.amount, U256::from(7u64));
        assert_eq!(quote.source, FeeSource::Fallback);
        assert_eq!(metrics.fee_fallbacks.get(), 1.0);
    }

    #[tokio::test]
    async fn all_failing_returns_error() {
        let chain = Arc::new(MockedChainClient::new(Address::random()));
        chain.set_fee(None);
        let oracle = FeeOracleMerger::builder()
            .merge(Box::new(ContractFeeBackend::new(chain)))
            .build();
        assert!(oracle.required_fee().await.is_err());
    }
}
