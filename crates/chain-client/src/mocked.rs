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

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use confession_relayer_utils::{Error, Result};
use ethers::types::{Address, H256, U256};
use parking_lot::Mutex;

use crate::{ChainClient, PaymentStatus, PaymentTransaction, ReceiptOutcome};

/// What the next relayer transaction does once sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockedReceipt {
    /// Mined successfully.
    #[default]
    Confirm,
    /// Mined and reverted.
    Revert,
    /// Never mined within the timeout.
    Timeout,
}

/// A relayer transaction recorded by [`MockedChainClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAnchor {
    /// Relayer transaction hash.
    pub tx_hash: H256,
    /// The anchored content hash.
    pub content_hash: H256,
    /// Value paid to the contract.
    pub value: U256,
}

#[derive(Debug)]
struct MockState {
    fee: Option<U256>,
    balance: Option<U256>,
    rpc_down: bool,
    fail_sends: bool,
    receipt: MockedReceipt,
    payments: HashMap<H256, PaymentTransaction>,
    anchored: HashSet<H256>,
    sent: Vec<SentAnchor>,
    outcomes: HashMap<H256, MockedReceipt>,
}

/// A programmable in-process chain.
///
/// Fee and balance reads fail while set to `None`; every other read fails
/// while [`set_rpc_down`](Self::set_rpc_down) is on.
#[derive(Debug)]
pub struct MockedChainClient {
    relayer_address: Address,
    contract_address: Address,
    chain_id: u64,
    send_delay: Duration,
    state: Mutex<MockState>,
}

impl MockedChainClient {
    /// A chain with the given relayer wallet, a 0.001 ether fee and a 1 ether balance.
    pub fn new(relayer_address: Address) -> Self {
        Self {
            relayer_address,
            contract_address: Address::random(),
            chain_id: 31337,
            send_delay: Duration::ZERO,
            state: Mutex::new(MockState {
                fee: Some(U256::exp10(15)),
                balance: Some(U256::exp10(18)),
                rpc_down: false,
                fail_sends: false,
                receipt: MockedReceipt::Confirm,
                payments: HashMap::new(),
                anchored: HashSet::new(),
                sent: Vec::new(),
                outcomes: HashMap::new(),
            }),
        }
    }

    /// Delays every `send_anchor`, to widen race windows in tests.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Sets the contract fee; `None` makes fee reads fail.
    pub fn set_fee(&self, fee: Option<U256>) {
        self.state.lock().fee = fee;
    }

    /// Sets the relayer balance; `None` makes balance reads fail.
    pub fn set_balance(&self, balance: Option<U256>) {
        self.state.lock().balance = balance;
    }

    /// Makes transaction lookups fail.
    pub fn set_rpc_down(&self, down: bool) {
        self.state.lock().rpc_down = down;
    }

    /// Makes `send_anchor` fail with a node error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Outcome of relayer transactions sent from now on.
    pub fn set_receipt(&self, receipt: MockedReceipt) {
        self.state.lock().receipt = receipt;
    }

    /// Registers a payment transaction.
    pub fn add_payment(&self, tx: PaymentTransaction) {
        self.state.lock().payments.insert(tx.hash, tx);
    }

    /// Registers a mined, successful payment of `value` to `to`, returning its hash.
    pub fn add_confirmed_payment(&self, to: Address, value: U256) -> H256 {
        let hash = H256::random();
        self.add_payment(PaymentTransaction {
            hash,
            from: Address::random(),
            to: Some(to),
            value,
            status: PaymentStatus::Success,
        });
        hash
    }

    /// Marks `content_hash` as stored by the contract.
    pub fn mark_anchored(&self, content_hash: H256) {
        self.state.lock().anchored.insert(content_hash);
    }

    /// Every relayer transaction sent so far.
    pub fn sent_anchors(&self) -> Vec<SentAnchor> {
        self.state.lock().sent.clone()
    }
}

#[async_trait::async_trait]
impl ChainClient for MockedChainClient {
    fn relayer_address(&self) -> Address {
        self.relayer_address
    }

    fn contract_address(&self) -> Address {
        self.contract_address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn required_fee(&self) -> Result<U256> {
        self.state
            .lock()
            .fee
            .ok_or(Error::Generic("mocked fee read failure"))
    }

    async fn is_anchored(&self, content_hash: H256) -> Result<bool> {
        let state = self.state.lock();
        if state.rpc_down {
            return Err(Error::Generic("mocked rpc is down"));
        }
        Ok(state.anchored.contains(&content_hash))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        let state = self.state.lock();
        if address != self.relayer_address {
            return Ok(U256::zero());
        }
        state
            .balance
            .ok_or(Error::Generic("mocked balance read failure"))
    }

    async fn payment_transaction(
        &self,
        hash: H256,
    ) -> Result<Option<PaymentTransaction>> {
        let state = self.state.lock();
        if state.rpc_down {
            return Err(Error::Generic("mocked rpc is down"));
        }
        Ok(state.payments.get(&hash).cloned())
    }

    async fn send_anchor(&self, content_hash: H256, value: U256) -> Result<H256> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        let mut state = self.state.lock();
        if state.fail_sends {
            return Err(Error::Generic("mocked send failure"));
        }
        if state.anchored.contains(&content_hash) {
            return Err(Error::AlreadyAnchored);
        }
        let tx_hash = H256::random();
        let receipt = state.receipt;
        if receipt == MockedReceipt::Confirm {
            state.anchored.insert(content_hash);
        }
        state.outcomes.insert(tx_hash, receipt);
        state.sent.push(SentAnchor {
            tx_hash,
            content_hash,
            value,
        });
        Ok(tx_hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        _timeout: Duration,
    ) -> Result<ReceiptOutcome> {
        let outcome = self.state.lock().outcomes.get(&tx_hash).copied();
        match outcome {
            Some(MockedReceipt::Confirm) => Ok(ReceiptOutcome::Confirmed {
                tx_hash,
                gas_used: Some(U256::from(45_000u64)),
                block_number: Some(1),
            }),
            Some(MockedReceipt::Revert) => {
                Ok(ReceiptOutcome::Reverted { tx_hash })
            }
            Some(MockedReceipt::Timeout) | None => Ok(ReceiptOutcome::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_anchor_is_refused() {
        let chain = MockedChainClient::new(Address::random());
        let content = H256::random();
        let tx = chain.send_anchor(content, U256::one()).await.unwrap();
        assert!(matches!(
            chain.wait_for_receipt(tx, Duration::from_secs(1)).await.unwrap(),
            ReceiptOutcome::Confirmed { .. }
        ));
        assert!(chain.is_anchored(content).await.unwrap());
        assert!(matches!(
            chain.send_anchor(content, U256::one()).await,
            Err(Error::AlreadyAnchored)
        ));
    }

    #[tokio::test]
    async fn reverted_anchor_is_not_stored() {
        let chain = MockedChainClient::new(Address::random());
        chain.set_receipt(MockedReceipt::Revert);
        let content = H256::random();
        let tx = chain.send_anchor(content, U256::one()).await.unwrap();
        assert_eq!(
            chain.wait_for_receipt(tx, Duration::from_secs(1)).await.unwrap(),
            ReceiptOutcome::Reverted { tx_hash: tx }
        );
        assert!(!chain.is_anchored(content).await.unwrap());
    }

    #[tokio::test]
    async fn reads_can_be_broken() {
        let chain = MockedChainClient::new(Address::random());
        chain.set_fee(None);
        chain.set_rpc_down(true);
        assert!(chain.required_fee().await.is_err());
        assert!(chain.payment_transaction(H256::random()).await.is_err());
    }
}
