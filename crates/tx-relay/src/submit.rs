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
use confession_fee_oracle_backends::{FeeBackend, FeeSource};
use confession_relayer_chain::{wei_to_ether, wei_to_gwei, ChainClient, ReceiptOutcome};
use confession_relayer_config::SubmissionConfig;
use confession_relayer_handler_utils::SubmitRequest;
use confession_relayer_store::{ConfessionStore, PaymentClaims};
use confession_relayer_tx_queue::TxQueueHandle;
use confession_relayer_types::Confession;
use confession_relayer_utils::clickable_link::explorer_tx_url;
use confession_relayer_utils::metric::Metrics;
use confession_relayer_utils::{probe, Error, HandlerError};
use ethers::types::{Address, H256, U256};
use ethers::utils::{format_ether, keccak256, to_checksum};
use serde_json::json;
use typed_builder::TypedBuilder;

use crate::payment::verify_payment;
use crate::rate_limit::{retry_after_secs, RateLimiter};
use crate::validation::{validate_submission, FieldError};

/// Every way a relayed submission can be refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// Too many submissions from this network address.
    #[error("Too many submissions, try again later")]
    RateLimited {
        /// Seconds until the window resets.
        retry_after: u64,
    },
    /// Malformed request body.
    #[error("Invalid submission")]
    InvalidInput(Vec<FieldError>),
    /// No relayer key or contract configured.
    #[error("Anonymous relayer is not configured")]
    RelayerDisabled,
    /// The payment already paid for another submission.
    #[error("Payment transaction has already been used")]
    PaymentAlreadyUsed,
    /// The node does not know the payment transaction yet.
    #[error("Payment transaction not found, wait for it to be mined and retry")]
    PaymentNotFound,
    /// The payment is not mined yet.
    #[error("Payment transaction is not confirmed yet, wait and retry")]
    PaymentPending,
    /// The payment reverted.
    #[error("Payment transaction failed on chain")]
    PaymentReverted,
    /// The payment went somewhere else.
    #[error("Payment was not sent to the relayer")]
    WrongRecipient {
        /// The relayer address.
        expected: Address,
        /// Where the payment went.
        received: Option<Address>,
    },
    /// The payment is below the tolerated fee.
    #[error("Payment amount is below the required fee")]
    InsufficientPayment {
        /// Current fee in wei.
        required: U256,
        /// Paid amount in wei.
        received: U256,
    },
    /// The payment transaction could not be read.
    #[error("Could not verify the payment, try again later")]
    PaymentLookup,
    /// The relayer wallet cannot pay fee plus gas.
    #[error("Relayer needs funding, try again later")]
    RelayerUnderfunded {
        /// The relayer address to top up.
        relayer_address: Address,
        /// Fee plus gas buffer, in wei.
        required: U256,
        /// Current balance, in wei.
        available: U256,
    },
    /// The contract already stores this content hash.
    #[error("This confession has already been anchored")]
    AlreadyAnchored,
    /// The relayer transaction could not be sent.
    #[error("Failed to submit the relayer transaction")]
    SubmissionFailed,
    /// The relayer transaction reverted.
    #[error("Relayer transaction reverted")]
    Reverted {
        /// The reverted transaction.
        tx_hash: H256,
    },
    /// No receipt within the confirmation timeout.
    #[error("Timed out waiting for the relayer transaction")]
    ConfirmationTimeout {
        /// The unconfirmed transaction.
        tx_hash: H256,
    },
    /// Anchored on chain but not stored.
    #[error("Confession was anchored but could not be saved")]
    Persistence {
        /// The confirmed transaction.
        tx_hash: H256,
    },
}

impl SubmissionError {
    /// Short machine-readable reason, for logs and probes.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidInput(_) => "invalid_input",
            Self::RelayerDisabled => "relayer_disabled",
            Self::PaymentAlreadyUsed => "payment_already_used",
            Self::PaymentNotFound => "payment_not_found",
            Self::PaymentPending => "payment_pending",
            Self::PaymentReverted => "payment_reverted",
            Self::WrongRecipient { .. } => "wrong_recipient",
            Self::InsufficientPayment { .. } => "insufficient_payment",
            Self::PaymentLookup => "payment_lookup",
            Self::RelayerUnderfunded { .. } => "relayer_underfunded",
            Self::AlreadyAnchored => "already_anchored",
            Self::SubmissionFailed => "submission_failed",
            Self::Reverted { .. } => "reverted",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::Persistence { .. } => "persistence",
        }
    }

    /// HTTP status of this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidInput(_)
            | Self::PaymentReverted
            | Self::WrongRecipient { .. }
            | Self::InsufficientPayment { .. } => StatusCode::BAD_REQUEST,
            Self::PaymentAlreadyUsed | Self::AlreadyAnchored => StatusCode::CONFLICT,
            Self::RelayerDisabled
            | Self::PaymentNotFound
            | Self::PaymentPending
            | Self::RelayerUnderfunded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::PaymentLookup
            | Self::SubmissionFailed
            | Self::Reverted { .. }
            | Self::ConfirmationTimeout { .. }
            | Self::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn tx_hash_string(hash: &H256) -> String {
    format!("{hash:?}")
}

impl From<SubmissionError> for HandlerError {
    fn from(e: SubmissionError) -> Self {
        let status = e.status();
        let message = e.to_string();
        let details = match &e {
            SubmissionError::RateLimited { retry_after } => {
                json!({ "retryAfter": retry_after })
            }
            SubmissionError::InvalidInput(fields) => json!({ "details": fields }),
            SubmissionError::RelayerDisabled => {
                json!({ "fallback": true, "retryable": false })
            }
            SubmissionError::PaymentNotFound | SubmissionError::PaymentPending => {
                json!({ "fallback": false, "retryable": true })
            }
            SubmissionError::WrongRecipient { expected, received } => json!({
                "expected": to_checksum(expected, None),
                "received": received.map(|r| to_checksum(&r, None)),
            }),
            SubmissionError::InsufficientPayment { required, received } => json!({
                "required": format_ether(*required),
                "received": format_ether(*received),
            }),
            SubmissionError::PaymentLookup => json!({ "retryable": true }),
            SubmissionError::RelayerUnderfunded {
                relayer_address,
                required,
                available,
            } => json!({
                "relayerAddress": to_checksum(relayer_address, None),
                "required": format_ether(*required),
                "available": format_ether(*available),
                "fallback": true,
                "retryable": true,
            }),
            SubmissionError::SubmissionFailed => {
                json!({ "fallback": true, "retryable": false })
            }
            SubmissionError::Reverted { tx_hash } => json!({
                "txHash": tx_hash_string(tx_hash),
                "fallback": true,
                "retryable": false,
            }),
            SubmissionError::ConfirmationTimeout { tx_hash } => json!({
                "txHash": tx_hash_string(tx_hash),
                "retryable": false,
            }),
            SubmissionError::Persistence { tx_hash } => json!({
                "txHash": tx_hash_string(tx_hash),
                "retryable": false,
            }),
            SubmissionError::PaymentAlreadyUsed
            | SubmissionError::PaymentReverted
            | SubmissionError::AlreadyAnchored => json!({}),
        };
        HandlerError::with_details(status, message, details)
    }
}

/// A stored, anchored confession.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    /// The new confession.
    pub confession: Confession,
    /// The relayer's anchoring transaction.
    pub tx_hash: H256,
    /// Where the fee came from.
    pub fee_source: FeeSource,
    /// Explorer page of `tx_hash`, when an explorer is configured.
    pub explorer_url: Option<String>,
}

/// Runs relayed submissions end to end.
///
/// The steps are gated in order: rate limit, input shape, relayer
/// availability, payment reuse, fee, payment verification, payment claim,
/// relayer balance, duplicate content, send, confirmation, persistence.
/// A payment claim is only released while the relayer has not sent anything.
#[derive(TypedBuilder)]
pub struct RelayerSubmitter {
    config: SubmissionConfig,
    /// `None` when the relayer is not configured.
    #[builder(default)]
    chain: Option<Arc<dyn ChainClient>>,
    #[builder(default)]
    tx_queue: Option<TxQueueHandle>,
    fee_oracle: Arc<dyn FeeBackend>,
    store: Arc<dyn ConfessionStore>,
    claims: Arc<PaymentClaims>,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<Metrics>,
    #[builder(default)]
    explorer: Option<url::Url>,
}

impl std::fmt::Debug for RelayerSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerSubmitter")
            .field("enabled", &self.is_enabled())
            .field("claims", &self.claims.len())
            .finish()
    }
}

impl RelayerSubmitter {
    /// Whether a chain client and a transaction queue are wired in.
    pub fn is_enabled(&self) -> bool {
        self.chain.is_some() && self.tx_queue.is_some()
    }

    /// Relays one submission from `caller`, a network address.
    #[tracing::instrument(skip(self, request))]
    pub async fn submit(
        &self,
        request: SubmitRequest,
        caller: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let result = self.run(request, caller).await;
        match &result {
            Ok(receipt) => {
                self.metrics.submissions_accepted.inc();
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::RelayerSubmit,
                    done = true,
                    tx_hash = %receipt.tx_hash,
                    confession_id = %receipt.confession.id,
                );
            }
            Err(e) => {
                self.metrics.submissions_rejected.inc();
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::RelayerSubmit,
                    rejected = true,
                    reason = e.reason(),
                );
            }
        }
        result
    }

    /// Counts one submission attempt from `caller` against its window.
    ///
    /// [`submit`](Self::submit) does this first; callers that reject a request
    /// before building a [`SubmitRequest`] still call it so the attempt counts.
    pub fn check_rate_limit(&self, caller: &str) -> Result<(), SubmissionError> {
        self.rate_limiter.sweep_expired();
        if let Err(left) = self.rate_limiter.check(caller) {
            self.metrics.rate_limited.inc();
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::RateLimit,
                limited = true,
                %caller,
            );
            return Err(SubmissionError::RateLimited {
                retry_after: retry_after_secs(left),
            });
        }
        Ok(())
    }

    async fn run(
        &self,
        request: SubmitRequest,
        caller: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.check_rate_limit(caller)?;

        let submission =
            validate_submission(&request, self.config.max_confession_length)
                .map_err(SubmissionError::InvalidInput)?;
        let payment = submission.payment_tx_hash;

        let (Some(chain), Some(tx_queue)) = (&self.chain, &self.tx_queue) else {
            return Err(SubmissionError::RelayerDisabled);
        };

        if self.claims.is_claimed(&payment) {
            return Err(SubmissionError::PaymentAlreadyUsed);
        }

        let fee = self.fee_oracle.required_fee().await.map_err(|e| {
            tracing::error!(error = %e, "No fee quote available");
            SubmissionError::PaymentLookup
        })?;

        let relayer_address = chain.relayer_address();
        verify_payment(
            chain.as_ref(),
            payment,
            relayer_address,
            fee.amount,
            self.config.payment_tolerance_bps,
        )
        .await?;
        self.metrics.payments_verified.inc();

        if !self.claims.claim(payment) {
            return Err(SubmissionError::PaymentAlreadyUsed);
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::PaymentVerify,
            claimed = true,
            %payment,
        );

        match chain.balance(relayer_address).await {
            Ok(available) => {
                self.metrics.relayer_balance.set(wei_to_ether(available));
                let required = fee.amount.saturating_add(self.config.gas_buffer.wei());
                if available < required {
                    self.claims.release(&payment);
                    tracing::warn!(
                        relayer = %to_checksum(&relayer_address, None),
                        required = %format_ether(required),
                        available = %format_ether(available),
                        "Relayer balance too low, payment claim released",
                    );
                    return Err(SubmissionError::RelayerUnderfunded {
                        relayer_address,
                        required,
                        available,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read relayer balance, continuing");
            }
        }

        let content_hash = H256::from(keccak256(submission.text.as_bytes()));
        match chain.is_anchored(content_hash).await {
            Ok(true) => {
                self.claims.release(&payment);
                return Err(SubmissionError::AlreadyAnchored);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Could not check for a duplicate anchor");
            }
        }

        // From here on the payment stays claimed whatever happens.
        let tx_hash = tx_queue
            .submit_anchor(content_hash, fee.amount)
            .await
            .map_err(|e| match e {
                Error::AlreadyAnchored => SubmissionError::AlreadyAnchored,
                e => {
                    tracing::error!(error = %e, %payment, "Relayer transaction was not sent");
                    SubmissionError::SubmissionFailed
                }
            })?;

        let timeout = Duration::from_secs(self.config.confirmation_timeout_secs);
        match chain.wait_for_receipt(tx_hash, timeout).await {
            Ok(ReceiptOutcome::Confirmed {
                gas_used,
                block_number,
                ..
            }) => {
                self.metrics
                    .gas_spent
                    .inc_by(wei_to_gwei(gas_used.unwrap_or_default()));
                tracing::debug!(%tx_hash, ?block_number, "Relayer transaction confirmed");
            }
            Ok(ReceiptOutcome::Reverted { .. }) => {
                tracing::error!(%tx_hash, %payment, "Relayer transaction reverted");
                return Err(SubmissionError::Reverted { tx_hash });
            }
            Ok(ReceiptOutcome::TimedOut) => {
                tracing::error!(
                    %tx_hash,
                    %payment,
                    timeout_secs = timeout.as_secs(),
                    "Relayer transaction not confirmed in time",
                );
                return Err(SubmissionError::ConfirmationTimeout { tx_hash });
            }
            Err(e) => {
                tracing::error!(error = %e, %tx_hash, %payment, "Failed to fetch receipt");
                return Err(SubmissionError::ConfirmationTimeout { tx_hash });
            }
        }

        let tx_hash_str = tx_hash_string(&tx_hash);
        let confession =
            Confession::anchored(submission.text, submission.category, tx_hash_str.clone());
        if let Err(e) = self.store.insert_confession(&confession).await {
            tracing::error!(
                error = %e,
                %tx_hash,
                %payment,
                "Anchored confession could not be stored",
            );
            return Err(SubmissionError::Persistence { tx_hash });
        }

        Ok(SubmissionReceipt {
            explorer_url: explorer_tx_url(self.explorer.as_ref(), &tx_hash_str),
            confession,
            tx_hash,
            fee_source: fee.source,
        })
    }
}
