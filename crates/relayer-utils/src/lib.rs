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
//! Shared error types, metrics and logging helpers for the confession relayer.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ethers::prelude::{
    k256::ecdsa::SigningKey, ContractError, Http, Provider, SignerMiddleware,
    Wallet,
};

pub mod clickable_link;

/// Metrics functionality
pub mod metric;
/// A module used for debugging relayer lifecycle and submission state.
pub mod probe;

/// Type alias for the plain http provider used for chain reads.
pub type HttpProvider = Provider<Http>;
/// Type alias for the signing client used to send relayer transactions.
pub type SignerClient = SignerMiddleware<HttpProvider, Wallet<SigningKey>>;

/// An enum of all possible errors that could be encountered during the execution of the
/// Confession Relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// HTTP Error
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// Smart contract error on a read-only call.
    #[error(transparent)]
    EthersContractCall(#[from] ContractError<HttpProvider>),
    /// Smart contract error on a signed call.
    #[error(transparent)]
    EthersContractCallWithSigner(#[from] ContractError<SignerClient>),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// Signature parsing or recovery error.
    #[error(transparent)]
    Signature(#[from] ethers::types::SignatureError),
    /// Ethers currency conversion error
    #[error(transparent)]
    Conversion(#[from] ethers::utils::ConversionError),
    /// Sled database error.
    #[error(transparent)]
    Sled(#[from] sled::Error),
    /// Sled transaction error.
    #[error(transparent)]
    SledTransaction(
        #[from] sled::transaction::TransactionError<std::io::Error>,
    ),
    /// Prometheus error.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// The content hash is already stored by the anchor contract.
    #[error("Content hash already anchored on chain")]
    AlreadyAnchored,
    /// The transaction queue worker is gone.
    #[error("Transaction queue is not running")]
    TxQueueClosed,
    /// Failed to encode the gathered metrics.
    #[error("Failed to gather metrics: {}", _0)]
    GatherMetrics(String),
}

/// A type alias for the result for the confession relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for HandlerError {
    fn from(value: Error) -> Self {
        tracing::error!(error = %value, "Unhandled relayer error");
        HandlerError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        )
    }
}

/// Error type for HTTP handlers
///
/// Always rendered as a JSON body of the shape
/// `{ "success": false, "error": "..", ..details }`.
#[derive(Debug)]
pub struct HandlerError(
    /// HTTP status code for response
    pub StatusCode,
    /// Response body
    pub serde_json::Value,
);

impl HandlerError {
    /// Creates an error response carrying only a message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self(
            status,
            serde_json::json!({ "success": false, "error": message.into() }),
        )
    }

    /// Creates an error response with extra structured fields merged into the body.
    ///
    /// `details` must be a JSON object, anything else is ignored.
    pub fn with_details(
        status: StatusCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        let mut this = Self::new(status, message);
        if let (Some(body), serde_json::Value::Object(extra)) =
            (this.1.as_object_mut(), details)
        {
            body.extend(extra);
        }
        this
    }

    /// Shortcut for `404 Not Found`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Shortcut for `400 Bad Request`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Shortcut for `401 Unauthorized`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Shortcut for `403 Forbidden`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// The status code of this error.
    pub fn status(&self) -> StatusCode {
        self.0
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let retry_after = self
            .1
            .get("retryAfter")
            .and_then(serde_json::Value::as_u64);
        let mut response = (self.0, Json(self.1)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_are_merged_into_the_body() {
        let err = HandlerError::with_details(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
            serde_json::json!({ "retryAfter": 3600 }),
        );
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.1["success"], false);
        assert_eq!(err.1["error"], "Too many requests");
        assert_eq!(err.1["retryAfter"], 3600);
    }

    #[test]
    fn retry_after_header_is_set() {
        let response = HandlerError::with_details(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
            serde_json::json!({ "retryAfter": 120 }),
        )
        .into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "120"
        );
    }

    #[test]
    fn internal_errors_do_not_leak() {
        let err: HandlerError = Error::Generic("rpc exploded").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.1["error"], "Internal server error");
    }
}
