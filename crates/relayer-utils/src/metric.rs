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

use prometheus::core::{AtomicF64, GenericCounter, GenericGauge};
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};

/// A struct definition for collecting metrics in the relayer.
///
/// Every instance owns its own [`Registry`], so several relayer contexts
/// (as in tests) never clash on metric names.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Relayed submissions that ended with a stored confession.
    pub submissions_accepted: GenericCounter<AtomicF64>,
    /// Relayed submissions rejected at any step.
    pub submissions_rejected: GenericCounter<AtomicF64>,
    /// Payment transactions that passed verification.
    pub payments_verified: GenericCounter<AtomicF64>,
    /// Requests refused by the rate limiter.
    pub rate_limited: GenericCounter<AtomicF64>,
    /// Fee quotes that fell back to the configured default.
    pub fee_fallbacks: GenericCounter<AtomicF64>,
    /// Total transaction made Relayer metric
    pub total_transaction_made: GenericCounter<AtomicF64>,
    /// Gas spent metric (in gwei)
    pub gas_spent: GenericCounter<AtomicF64>,
    /// Last observed relayer wallet balance (in ether).
    pub relayer_balance: GenericGauge<AtomicF64>,
    /// Successful admin logins.
    pub admin_logins: GenericCounter<AtomicF64>,
}

impl Metrics {
    /// Instantiates the various metrics and their counters, also creates a registry for the counters and
    /// registers the counters
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("confession_relayer".into()), None)?;

        let submissions_accepted = counter(
            &registry,
            "submissions_accepted",
            "The total number of relayed confessions stored",
        )?;
        let submissions_rejected = counter(
            &registry,
            "submissions_rejected",
            "The total number of relayed submissions rejected",
        )?;
        let payments_verified = counter(
            &registry,
            "payments_verified",
            "The total number of payment transactions verified",
        )?;
        let rate_limited = counter(
            &registry,
            "rate_limited",
            "How many submissions were refused by the rate limiter",
        )?;
        let fee_fallbacks = counter(
            &registry,
            "fee_fallbacks",
            "How many times the default fee was used instead of the contract fee",
        )?;
        let total_transaction_made = counter(
            &registry,
            "total_transaction_made",
            "The total number of transaction made",
        )?;
        let gas_spent =
            counter(&registry, "gas_spent", "The total number of gas spent")?;
        let admin_logins = counter(
            &registry,
            "admin_logins",
            "The total number of admin sessions issued",
        )?;

        let relayer_balance = Gauge::with_opts(Opts::new(
            "relayer_balance",
            "Relayer wallet balance in ether",
        ))?;
        registry.register(Box::new(relayer_balance.clone()))?;

        Ok(Self {
            registry,
            submissions_accepted,
            submissions_rejected,
            payments_verified,
            rate_limited,
            fee_fallbacks,
            total_transaction_made,
            gas_spent,
            relayer_balance,
            admin_logins,
        })
    }

    /// Gathers the whole relayer metrics
    pub fn gather_metrics(&self) -> Result<String, GatherMetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
) -> Result<GenericCounter<AtomicF64>, prometheus::Error> {
    let counter = Counter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Errors while encoding the gathered metrics.
#[derive(Debug, thiserror::Error)]
pub enum GatherMetricsError {
    /// Prometheus encoder error.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Encoded metrics were not valid utf8.
    #[error(transparent)]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}

impl From<GatherMetricsError> for crate::Error {
    fn from(value: GatherMetricsError) -> Self {
        crate::Error::GatherMetrics(value.to_string())
    }
}
