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
//! # Relayer Transaction Queue 🕸️
//!
//! All transactions from the relayer wallet go through a single worker, so
//! concurrent submissions never race on the wallet's transaction nonce.

use std::sync::Arc;

use confession_relayer_chain::ChainClient;
use confession_relayer_utils::clickable_link::{explorer_tx_url, ClickableLink};
use confession_relayer_utils::metric::Metrics;
use confession_relayer_utils::{probe, Error, Result};
use ethers::types::{H256, U256};
use tokio::sync::{mpsc, oneshot};

/// Pending anchor submissions the queue holds before callers wait to enqueue.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug)]
struct AnchorJob {
    content_hash: H256,
    value: U256,
    reply: oneshot::Sender<Result<H256>>,
}

/// Cheap, cloneable handle used to enqueue anchor transactions.
#[derive(Debug, Clone)]
pub struct TxQueueHandle {
    sender: mpsc::Sender<AnchorJob>,
}

impl TxQueueHandle {
    /// Enqueues `anchor(content_hash)` paying `value` and waits until the
    /// worker has broadcast it, returning the relayer transaction hash.
    pub async fn submit_anchor(
        &self,
        content_hash: H256,
        value: U256,
    ) -> Result<H256> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(AnchorJob {
                content_hash,
                value,
                reply,
            })
            .await
            .map_err(|_| Error::TxQueueClosed)?;
        rx.await.map_err(|_| Error::TxQueueClosed)?
    }
}

/// The TxQueue owns the relayer wallet's send path.
///
/// Jobs are processed one at a time in arrival order; the queue stops once
/// every [`TxQueueHandle`] is dropped.
pub struct TxQueue {
    chain: Arc<dyn ChainClient>,
    receiver: mpsc::Receiver<AnchorJob>,
    explorer: Option<url::Url>,
    metrics: Arc<Metrics>,
}

impl TxQueue {
    /// Creates a new TxQueue and the handle feeding it.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        explorer: Option<url::Url>,
        metrics: Arc<Metrics>,
        capacity: usize,
    ) -> (Self, TxQueueHandle) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            chain,
            receiver,
            explorer,
            metrics,
        };
        (queue, TxQueueHandle { sender })
    }

    /// Starts the queue on the current runtime.
    pub fn spawn(
        chain: Arc<dyn ChainClient>,
        explorer: Option<url::Url>,
        metrics: Arc<Metrics>,
    ) -> TxQueueHandle {
        let (queue, handle) = Self::new(chain, explorer, metrics, DEFAULT_CAPACITY);
        tokio::spawn(async move {
            if let Err(e) = queue.run().await {
                tracing::error!(error = %e, "Transaction queue stopped");
            }
        });
        handle
    }

    /// Starts the TxQueue service.
    ///
    /// Returns once all handles are dropped.
    #[tracing::instrument(skip_all, fields(chain_id = %self.chain.chain_id()))]
    pub async fn run(mut self) -> Result<()> {
        let chain_id = self.chain.chain_id();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::TxQueue,
            ty = "EVM",
            chain_id = %chain_id,
            starting = true,
        );
        while let Some(job) = self.receiver.recv().await {
            let content_hash = job.content_hash;
            tracing::debug!(?content_hash, value = %job.value, "Found anchor in queue");
            let outcome = self.chain.send_anchor(content_hash, job.value).await;
            match &outcome {
                Ok(signed_tx_hash) => {
                    self.metrics.total_transaction_made.inc();
                    tracing::event!(
                        target: probe::TARGET,
                        tracing::Level::DEBUG,
                        kind = %probe::Kind::TxQueue,
                        ty = "EVM",
                        chain_id = %chain_id,
                        pending = true,
                        ?content_hash,
                        %signed_tx_hash,
                    );
                    let tx_hash_string = format!("{signed_tx_hash:?}");
                    match explorer_tx_url(self.explorer.as_ref(), &tx_hash_string) {
                        Some(url) => tracing::info!(
                            "Tx {} is submitted and pending!",
                            ClickableLink::new(&tx_hash_string, &url),
                        ),
                        None => tracing::info!(
                            "Tx {} is submitted and pending!",
                            tx_hash_string,
                        ),
                    }
                }
                Err(e) => {
                    tracing::event!(
                        target: probe::TARGET,
                        tracing::Level::DEBUG,
                        kind = %probe::Kind::TxQueue,
                        ty = "EVM",
                        chain_id = %chain_id,
                        errored = true,
                        error = %e,
                        ?content_hash,
                    );
                }
            }
            // the caller may have gone away, the tx is out either way.
            let _ = job.reply.send(outcome);
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::TxQueue,
            ty = "EVM",
            chain_id = %chain_id,
            stopped = true,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confession_relayer_chain::{
        MockedChainClient, PaymentTransaction, ReceiptOutcome,
    };
    use ethers::types::Address;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts how many sends overlap.
    #[derive(Debug)]
    struct Overlap {
        inner: MockedChainClient,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChainClient for Overlap {
        fn relayer_address(&self) -> Address {
            self.inner.relayer_address()
        }
        fn contract_address(&self) -> Address {
            self.inner.contract_address()
        }
        fn chain_id(&self) -> u64 {
            self.inner.chain_id()
        }
        async fn required_fee(&self) -> Result<U256> {
            self.inner.required_fee().await
        }
        async fn is_anchored(&self, content_hash: H256) -> Result<bool> {
            self.inner.is_anchored(content_hash).await
        }
        async fn balance(&self, address: Address) -> Result<U256> {
            self.inner.balance(address).await
        }
        async fn payment_transaction(
            &self,
            hash: H256,
        ) -> Result<Option<PaymentTransaction>> {
            self.inner.payment_transaction(hash).await
        }
        async fn send_anchor(
            &self,
            content_hash: H256,
            value: U256,
        ) -> Result<H256> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let res = self.inner.send_anchor(content_hash, value).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            res
        }
        async fn wait_for_receipt(
            &self,
            tx_hash: H256,
            timeout: Duration,
        ) -> Result<ReceiptOutcome> {
            self.inner.wait_for_receipt(tx_hash, timeout).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sends_are_serialized() {
        let chain = Arc::new(Overlap {
            inner: MockedChainClient::new(Address::random())
                .with_send_delay(Duration::from_millis(50)),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        let handle = TxQueue::spawn(chain.clone(), None, metrics.clone());
        let submissions = (0..8).map(|_| {
            let handle = handle.clone();
            async move { handle.submit_anchor(H256::random(), U256::one()).await }
        });
        let results = futures::future::join_all(submissions).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(chain.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(chain.inner.sent_anchors().len(), 8);
        assert_eq!(metrics.total_transaction_made.get(), 8.0);
    }

    #[tokio::test]
    async fn send_errors_reach_the_caller() {
        let chain = Arc::new(MockedChainClient::new(Address::random()));
        let content = H256::random();
        chain.mark_anchored(content);
        let handle = TxQueue::spawn(
            chain,
            None,
            Arc::new(Metrics::new().unwrap()),
        );
        let res = handle.submit_anchor(content, U256::one()).await;
        assert!(matches!(res, Err(Error::AlreadyAnchored)));
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let chain = Arc::new(MockedChainClient::new(Address::random()));
        let (queue, handle) = TxQueue::new(
            chain,
            None,
            Arc::new(Metrics::new().unwrap()),
            1,
        );
        drop(queue);
        let res = handle.submit_anchor(H256::random(), U256::one()).await;
        assert!(matches!(res, Err(Error::TxQueueClosed)));
    }
}
