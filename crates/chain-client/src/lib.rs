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
//! # Chain Client 🕸️
//!
//! Everything the relayer needs from the chain: reading the anchor contract,
//! inspecting user payments, and sending anchor transactions from the
//! relayer wallet.

use std::time::Duration;

use confession_relayer_utils::Result;
use ethers::types::{Address, H256, U256};

/// [`ChainClient`] over an ethers http provider.
pub mod evm;
/// In-process [`ChainClient`] for tests and local runs.
pub mod mocked;

pub use evm::EthersChainClient;
pub use mocked::MockedChainClient;

/// Mining state of a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Known to the node but not mined yet.
    Pending,
    /// Mined with a success status.
    Success,
    /// Mined and reverted.
    Reverted,
}

/// A user payment transaction as seen on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    /// Transaction hash.
    pub hash: H256,
    /// Sender.
    pub from: Address,
    /// Recipient, `None` for contract creations.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Mining state.
    pub status: PaymentStatus,
}

/// How waiting for a relayer transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptOutcome {
    /// Mined with a success status.
    Confirmed {
        /// The mined transaction.
        tx_hash: H256,
        /// Gas used, when reported.
        gas_used: Option<U256>,
        /// Block it was mined in.
        block_number: Option<u64>,
    },
    /// Mined and reverted.
    Reverted {
        /// The mined transaction.
        tx_hash: H256,
    },
    /// No receipt within the timeout.
    TimedOut,
}

/// Reads and writes the relayer needs from the chain.
#[async_trait::async_trait]
pub trait ChainClient: std::fmt::Debug + Send + Sync {
    /// The relayer wallet address; payments must be sent here.
    fn relayer_address(&self) -> Address;
    /// The anchor contract address.
    fn contract_address(&self) -> Address;
    /// Chain id of the connected network.
    fn chain_id(&self) -> u64;
    /// Current fee required by the anchor contract, in wei.
    async fn required_fee(&self) -> Result<U256>;
    /// Whether the contract already stores `content_hash`.
    async fn is_anchored(&self, content_hash: H256) -> Result<bool>;
    /// Native balance of `address`, in wei.
    async fn balance(&self, address: Address) -> Result<U256>;
    /// Looks up a payment transaction. `None` when the node does not know it.
    async fn payment_transaction(
        &self,
        hash: H256,
    ) -> Result<Option<PaymentTransaction>>;
    /// Sends `anchor(content_hash)` from the relayer wallet paying `value`,
    /// returning the pending transaction hash.
    ///
    /// Fails with [`Error::AlreadyAnchored`](confession_relayer_utils::Error::AlreadyAnchored)
    /// when the contract refuses a duplicate hash.
    async fn send_anchor(&self, content_hash: H256, value: U256) -> Result<H256>;
    /// Waits for the receipt of `tx_hash`, bounded by `timeout`.
    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        timeout: Duration,
    ) -> Result<ReceiptOutcome>;
}

/// Whether a node or contract error message reports a duplicate anchor.
pub fn is_already_anchored_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("already anchored")
}

/// Converts wei to gwei as a float, for metrics.
pub fn wei_to_gwei(wei: U256) -> f64 {
    ethers::utils::format_units(wei, "gwei")
        .ok()
        .and_then(|gas| gas.parse::<f64>().ok())
        .unwrap_or_default()
}

/// Converts wei to ether as a float, for metrics.
pub fn wei_to_ether(wei: U256) -> f64 {
    ethers::utils::format_ether(wei)
        .parse::<f64>()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_duplicate_anchor_reverts() {
        assert!(is_already_anchored_message(
            "execution reverted: Already anchored"
        ));
        assert!(!is_already_anchored_message("insufficient funds"));
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(wei_to_gwei(U256::exp10(9) * 21), 21.0);
        assert_eq!(wei_to_ether(U256::exp10(15)), 0.001);
    }
}
