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

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the confession relayer.
//!
//! ## Overview
//!
//! Possible configuration include:
//! * `port`: The port the relayer will listen on. Defaults to 9955
//! * `app-url`: Public url of the web application, used for the manifest.
//! * `evm`: The chain the confessions are anchored on, and the relayer wallet.
//! * `relayer`: Submission limits, fee tolerance and timeouts.
//! * `admin`: The authorized moderator wallet and the legacy shared password.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Default values for the configuration
pub mod defaults;
/// EVM configuration
pub mod evm;
/// Utils for processing configuration
pub mod utils;

use confession_relayer_types::EtherAmount;
use ethers::types::Address;
use evm::EvmConfig;
use serde::{Deserialize, Serialize};

/// RelayerConfig is the configuration for the confession relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RelayerConfig {
    /// HTTP Server Port number
    ///
    /// default to 9955
    #[serde(skip_serializing)]
    pub port: u16,
    /// Public url of the web application.
    #[serde(alias = "app_url")]
    pub app_url: Option<url::Url>,
    /// The chain confessions are anchored on.
    pub evm: EvmConfig,
    /// Relayed submission settings.
    pub relayer: SubmissionConfig,
    /// Moderator authentication.
    pub admin: AdminConfig,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            app_url: None,
            evm: EvmConfig::default(),
            relayer: SubmissionConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl RelayerConfig {
    /// The relayer can only submit when it has an rpc endpoint, a wallet key
    /// and the anchor contract address.
    pub fn relayer_enabled(&self) -> bool {
        self.evm.http_endpoint.is_some()
            && self.evm.private_key.is_some()
            && self.evm.contract_address.is_some()
    }
}

/// Rate limit applied to relayed submissions, per caller network address.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    /// Allowed submissions per window.
    #[serde(alias = "max_requests")]
    pub max_requests: u32,
    /// Window length in seconds.
    #[serde(alias = "window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: defaults::RATE_LIMIT_MAX_REQUESTS,
            window_secs: defaults::RATE_LIMIT_WINDOW_SECS,
        }
    }
}

/// Settings for the relayed submission flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SubmissionConfig {
    /// Rate limit per caller.
    #[serde(alias = "rate_limit")]
    pub rate_limit: RateLimitConfig,
    /// Share of the required fee a payment must cover, in basis points.
    #[serde(alias = "payment_tolerance_bps")]
    pub payment_tolerance_bps: u32,
    /// Extra balance the relayer must hold above the fee to pay for gas.
    #[serde(alias = "gas_buffer")]
    pub gas_buffer: EtherAmount,
    /// How long to wait for the anchor transaction to be mined.
    #[serde(alias = "confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Fee used when the contract fee cannot be read.
    #[serde(alias = "default_fee")]
    pub default_fee: EtherAmount,
    /// Maximum confession length in characters.
    #[serde(alias = "max_confession_length")]
    pub max_confession_length: usize,
    /// Reverse proxies whose `x-forwarded-for` header names the caller.
    ///
    /// Ip addresses or cidr ranges. Empty means the socket peer is always
    /// the caller.
    #[serde(alias = "trusted_proxies")]
    pub trusted_proxies: Vec<String>,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            payment_tolerance_bps: defaults::PAYMENT_TOLERANCE_BPS,
            gas_buffer: defaults::gas_buffer(),
            confirmation_timeout_secs: defaults::CONFIRMATION_TIMEOUT_SECS,
            default_fee: defaults::default_fee(),
            max_confession_length: defaults::MAX_CONFESSION_LENGTH,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Moderator authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdminConfig {
    /// The single wallet allowed to moderate.
    #[serde(alias = "owner_address")]
    pub owner_address: Option<Address>,
    /// Shared secret for the legacy password check.
    ///
    /// Accepts `$ENV_VAR` indirection.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Lifetime of a login challenge.
    #[serde(alias = "nonce_ttl_secs")]
    pub nonce_ttl_secs: u64,
    /// Lifetime of a moderator session.
    #[serde(alias = "session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            owner_address: None,
            password: None,
            nonce_ttl_secs: defaults::NONCE_TTL_SECS,
            session_ttl_secs: defaults::SESSION_TTL_SECS,
        }
    }
}
