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

use axum::http::StatusCode;
use confession_fee_oracle_backends::{
    ContractFeeBackend, FeeOracleMerger, FeeSource, FixedFeeBackend,
};
use confession_relayer_chain::mocked::MockedReceipt;
use confession_relayer_chain::{ChainClient, MockedChainClient};
use confession_relayer_config::SubmissionConfig;
use confession_relayer_handler_utils::SubmitRequest;
use confession_relayer_store::{
    ConfessionFilter, ConfessionStore, InMemoryStore, PaymentClaims,
};
use confession_relayer_tx_queue::TxQueue;
use confession_relayer_tx_relay::{RateLimiter, RelayerSubmitter, SubmissionError};
use confession_relayer_types::Category;
use confession_relayer_utils::metric::Metrics;
use confession_relayer_utils::HandlerError;
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;

struct Harness {
    chain: Arc<MockedChainClient>,
    store: Arc<InMemoryStore>,
    claims: Arc<PaymentClaims>,
    metrics: Arc<Metrics>,
    submitter: RelayerSubmitter,
}

impl Harness {
    fn new() -> Self {
        Self::with_chain(MockedChainClient::new(Address::random()))
    }

    fn with_chain(chain: MockedChainClient) -> Self {
        let chain = Arc::new(chain);
        let config = SubmissionConfig::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = Arc::new(InMemoryStore::default());
        let claims = Arc::new(PaymentClaims::new());
        let tx_queue = TxQueue::spawn(chain.clone(), None, metrics.clone());
        let fee_oracle = FeeOracleMerger::builder()
            .merge(Box::new(ContractFeeBackend::new(chain.clone())))
            .merge(Box::new(FixedFeeBackend::fallback(config.default_fee.wei())))
            .metrics(metrics.clone())
            .build();
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        ));
        let submitter = RelayerSubmitter::builder()
            .config(config)
            .chain(Some(chain.clone() as Arc<dyn ChainClient>))
            .tx_queue(Some(tx_queue))
            .fee_oracle(Arc::new(fee_oracle))
            .store(store.clone())
            .claims(claims.clone())
            .rate_limiter(rate_limiter)
            .metrics(metrics.clone())
            .build();
        Self {
            chain,
            store,
            claims,
            metrics,
            submitter,
        }
    }

    fn fee(&self) -> U256 {
        U256::exp10(15)
    }

    fn pay(&self, value: U256) -> H256 {
        self.chain
            .add_confirmed_payment(self.chain.relayer_address(), value)
    }
}

fn request(text: &str, category: &str, payment: H256) -> SubmitRequest {
    SubmitRequest {
        confession_text: Some(text.into()),
        category: Some(category.into()),
        payment_tx_hash: Some(format!("{payment:?}")),
    }
}

#[tokio::test]
async fn relayed_confession_carries_the_relayer_tx_hash() {
    let h = Harness::new();
    let payment = h.pay(h.fee() * 9 / 10);

    let receipt = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap();

    let sent = h.chain.sent_anchors();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].value, h.fee());
    assert_eq!(sent[0].content_hash, H256::from(keccak256(b"gm")));
    assert_eq!(receipt.tx_hash, sent[0].tx_hash);
    assert_ne!(receipt.tx_hash, payment);
    assert_eq!(receipt.fee_source, FeeSource::Contract);

    let stored = h
        .store
        .get_confession(receipt.confession.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_anchored);
    assert_eq!(stored.category, Category::Wisdom);
    assert_eq!(stored.tx_hash, Some(format!("{:?}", sent[0].tx_hash)));
    assert!(h.claims.is_claimed(&payment));
    assert_eq!(h.metrics.submissions_accepted.get(), 1.0);
    assert_eq!(h.metrics.payments_verified.get(), 1.0);
}

#[tokio::test]
async fn payment_hash_is_accepted_at_most_once() {
    let h = Harness::new();
    let payment = h.pay(h.fee());
    h.submitter
        .submit(request("first", "Love", payment), "10.0.0.1")
        .await
        .unwrap();
    let err = h
        .submitter
        .submit(request("second", "Love", payment), "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err, SubmissionError::PaymentAlreadyUsed);
    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert_eq!(h.chain.sent_anchors().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_with_one_payment() {
    let h = Arc::new(Harness::with_chain(
        MockedChainClient::new(Address::random())
            .with_send_delay(Duration::from_millis(20)),
    ));
    let payment = h.pay(h.fee());

    let tasks = (0..8).map(|i| {
        let h = h.clone();
        tokio::spawn(async move {
            h.submitter
                .submit(
                    request(&format!("confession {i}"), "Secret", payment),
                    &format!("10.0.0.{i}"),
                )
                .await
        })
    });
    let results = futures::future::join_all(tasks).await;
    let (ok, err): (Vec<_>, Vec<_>) = results
        .into_iter()
        .map(|r| r.unwrap())
        .partition(|r| r.is_ok());
    assert_eq!(ok.len(), 1);
    assert!(err
        .into_iter()
        .all(|r| r.unwrap_err() == SubmissionError::PaymentAlreadyUsed));
    assert_eq!(h.chain.sent_anchors().len(), 1);
}

#[tokio::test]
async fn payment_to_another_address_names_both() {
    let h = Harness::new();
    let elsewhere = Address::repeat_byte(0xaa);
    let payment = h.chain.add_confirmed_payment(elsewhere, h.fee());
    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    let HandlerError(status, body) = err.into();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["expected"],
        ethers::utils::to_checksum(&h.chain.relayer_address(), None)
    );
    assert_eq!(body["received"], ethers::utils::to_checksum(&elsewhere, None));
    assert!(!h.claims.is_claimed(&payment));
}

#[tokio::test]
async fn underpayment_is_refused_with_amounts() {
    let h = Harness::new();
    let payment = h.pay(h.fee() / 2);
    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    let HandlerError(status, body) = err.into();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["required"], "0.001000000000000000");
    assert_eq!(body["received"], "0.000500000000000000");
}

#[tokio::test]
async fn underfunded_relayer_releases_the_payment() {
    let h = Harness::new();
    let payment = h.pay(h.fee());
    h.chain.set_balance(Some(h.fee()));

    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::RelayerUnderfunded { .. }));
    assert!(!h.claims.is_claimed(&payment));
    assert!(h.chain.sent_anchors().is_empty());

    let HandlerError(status, body) = err.into();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["relayerAddress"].is_string());
    assert_eq!(body["available"], "0.001000000000000000");
    assert_eq!(body["required"], "0.002000000000000000");
    assert_eq!(body["fallback"], true);

    // once topped up the same payment goes through.
    h.chain.set_balance(Some(U256::exp10(18)));
    h.submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn eleventh_submission_in_the_window_is_rate_limited() {
    let h = Harness::new();
    for _ in 0..10 {
        let err = h
            .submitter
            .submit(SubmitRequest::default(), "10.0.0.9")
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidInput(_)));
    }
    let err = h
        .submitter
        .submit(SubmitRequest::default(), "10.0.0.9")
        .await
        .unwrap_err();
    assert_eq!(err, SubmissionError::RateLimited { retry_after: 3600 });
    let HandlerError(status, body) = err.into();
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["retryAfter"], 3600);
    assert_eq!(h.metrics.rate_limited.get(), 1.0);

    tokio::time::advance(Duration::from_secs(3600)).await;
    let err = h
        .submitter
        .submit(SubmitRequest::default(), "10.0.0.9")
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::InvalidInput(_)));
}

#[tokio::test]
async fn unconfigured_relayer_is_unavailable() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let submitter = RelayerSubmitter::builder()
        .config(SubmissionConfig::default())
        .fee_oracle(Arc::new(FixedFeeBackend::fallback(U256::exp10(15))))
        .store(Arc::new(InMemoryStore::default()))
        .claims(Arc::new(PaymentClaims::new()))
        .rate_limiter(Arc::new(RateLimiter::new(10, Duration::from_secs(3600))))
        .metrics(metrics)
        .build();
    assert!(!submitter.is_enabled());
    let err = submitter
        .submit(request("gm", "Wisdom", H256::random()), "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err, SubmissionError::RelayerDisabled);
    let HandlerError(status, body) = err.into();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["fallback"], true);
}

#[tokio::test]
async fn unreadable_fee_falls_back_and_says_so() {
    let h = Harness::new();
    h.chain.set_fee(None);
    let default_fee = SubmissionConfig::default().default_fee.wei();
    let payment = h.pay(default_fee);
    let receipt = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap();
    assert_eq!(receipt.fee_source, FeeSource::Fallback);
    assert_eq!(h.chain.sent_anchors()[0].value, default_fee);
    assert_eq!(h.metrics.fee_fallbacks.get(), 1.0);
}

#[tokio::test]
async fn unreadable_balance_does_not_block() {
    let h = Harness::new();
    h.chain.set_balance(None);
    let payment = h.pay(h.fee());
    assert!(h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .is_ok());
}

#[tokio::test]
async fn reverted_anchor_keeps_payment_consumed() {
    let h = Harness::new();
    h.chain.set_receipt(MockedReceipt::Revert);
    let payment = h.pay(h.fee());
    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Reverted { .. }));
    assert!(h.claims.is_claimed(&payment));
    let stored = h
        .store
        .list_confessions(&ConfessionFilter::default())
        .await
        .unwrap();
    assert!(stored.is_empty());

    let HandlerError(status, body) = err.into();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["fallback"], true);

    h.chain.set_receipt(MockedReceipt::Confirm);
    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err, SubmissionError::PaymentAlreadyUsed);
}

#[tokio::test]
async fn confirmation_timeout_is_distinct_from_revert() {
    let h = Harness::new();
    h.chain.set_receipt(MockedReceipt::Timeout);
    let payment = h.pay(h.fee());
    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::ConfirmationTimeout { .. }));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(h.claims.is_claimed(&payment));
}

#[tokio::test]
async fn already_anchored_text_is_a_conflict() {
    let h = Harness::new();
    h.chain.mark_anchored(H256::from(keccak256(b"gm")));
    let payment = h.pay(h.fee());
    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err, SubmissionError::AlreadyAnchored);
    assert_eq!(err.status(), StatusCode::CONFLICT);
    // nothing was sent, so the payment can pay for another text.
    assert!(!h.claims.is_claimed(&payment));
    h.submitter
        .submit(request("gn", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_send_keeps_payment_consumed() {
    let h = Harness::new();
    h.chain.set_fail_sends(true);
    let payment = h.pay(h.fee());
    let err = h
        .submitter
        .submit(request("gm", "Wisdom", payment), "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err, SubmissionError::SubmissionFailed);
    assert!(h.claims.is_claimed(&payment));
}
