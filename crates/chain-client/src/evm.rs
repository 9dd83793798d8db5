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
use std::time::Duration;

use confession_relayer_types::PrivateKey;
use confession_relayer_utils::{probe, Error, HttpProvider, Result, SignerClient};
use ethers::prelude::*;

use crate::{
    is_already_anchored_message, ChainClient, PaymentStatus,
    PaymentTransaction, ReceiptOutcome,
};

abigen!(
    ConfessionAnchorContract,
    r#"[
        function getFee() external view returns (uint256)
        function isAnchored(bytes32 contentHash) external view returns (bool)
        function anchor(bytes32 contentHash) external payable
    ]"#,
);

/// A [`ChainClient`] talking JSON-RPC over http, signing with the relayer wallet.
pub struct EthersChainClient {
    provider: Arc<HttpProvider>,
    contract: ConfessionAnchorContract<SignerClient>,
    relayer_address: Address,
    chain_id: u64,
    poll_interval: Duration,
}

impl std::fmt::Debug for EthersChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthersChainClient")
            .field("relayer_address", &self.relayer_address)
            .field("contract", &self.contract.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl EthersChainClient {
    /// Connects to `endpoint` with the relayer wallet derived from `private_key`.
    pub fn new(
        endpoint: &url::Url,
        private_key: &PrivateKey,
        contract_address: Address,
        chain_id: u64,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(endpoint.as_str())?
            .interval(Duration::from_millis(1000));
        let provider = Arc::new(provider);
        let wallet =
            LocalWallet::from_bytes(private_key.as_bytes())?.with_chain_id(chain_id);
        let relayer_address = wallet.address();
        let client = Arc::new(SignerMiddleware::new(
            provider.as_ref().clone(),
            wallet,
        ));
        let contract = ConfessionAnchorContract::new(contract_address, client);
        Ok(Self {
            provider,
            contract,
            relayer_address,
            chain_id,
            poll_interval: Duration::from_millis(1000),
        })
    }

    async fn poll_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt> {
        loop {
            if let Some(receipt) =
                self.provider.get_transaction_receipt(tx_hash).await?
            {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn duplicate_anchor(err: &ContractError<SignerClient>) -> bool {
    err.decode_revert::<String>()
        .map_or(false, |reason| is_already_anchored_message(&reason))
        || is_already_anchored_message(&err.to_string())
}

#[async_trait::async_trait]
impl ChainClient for EthersChainClient {
    fn relayer_address(&self) -> Address {
        self.relayer_address
    }

    fn contract_address(&self) -> Address {
        self.contract.address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn required_fee(&self) -> Result<U256> {
        Ok(self.contract.get_fee().call().await?)
    }

    async fn is_anchored(&self, content_hash: H256) -> Result<bool> {
        Ok(self
            .contract
            .is_anchored(content_hash.to_fixed_bytes())
            .call()
            .await?)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn payment_transaction(
        &self,
        hash: H256,
    ) -> Result<Option<PaymentTransaction>> {
        let Some(tx) = self.provider.get_transaction(hash).await? else {
            return Ok(None);
        };
        let status = if tx.block_number.is_none() {
            PaymentStatus::Pending
        } else {
            match self.provider.get_transaction_receipt(hash).await? {
                None => PaymentStatus::Pending,
                Some(receipt) if receipt.status == Some(1u64.into()) => {
                    PaymentStatus::Success
                }
                Some(_) => PaymentStatus::Reverted,
            }
        };
        Ok(Some(PaymentTransaction {
            hash,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            status,
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn send_anchor(&self, content_hash: H256, value: U256) -> Result<H256> {
        let call = self
            .contract
            .anchor(content_hash.to_fixed_bytes())
            .value(value);
        // Make a dry call first so a duplicate hash is refused without
        // spending gas on a transaction bound to revert.
        if let Err(e) = call.call().await {
            if duplicate_anchor(&e) {
                return Err(Error::AlreadyAnchored);
            }
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::TxQueue,
                chain_id = %self.chain_id,
                dry_run = true,
                errored = true,
                error = %e,
            );
            return Err(e.into());
        }
        let pending = call.send().await.map_err(|e| {
            if duplicate_anchor(&e) {
                Error::AlreadyAnchored
            } else {
                e.into()
            }
        })?;
        Ok(*pending)
    }

    #[tracing::instrument(skip(self))]
    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        timeout: Duration,
    ) -> Result<ReceiptOutcome> {
        let receipt =
            match tokio::time::timeout(timeout, self.poll_receipt(tx_hash)).await {
                Ok(receipt) => receipt?,
                Err(_) => return Ok(ReceiptOutcome::TimedOut),
            };
        if receipt.status == Some(1u64.into()) {
            Ok(ReceiptOutcome::Confirmed {
                tx_hash: receipt.transaction_hash,
                gas_used: receipt.gas_used,
                block_number: receipt.block_number.map(|b| b.as_u64()),
            })
        } else {
            Ok(ReceiptOutcome::Reverted {
                tx_hash: receipt.transaction_hash,
            })
        }
    }
}
