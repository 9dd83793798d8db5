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
//! # Admin Authentication 🕸️
//!
//! Challenge–response login for the single moderator wallet:
//!
//! 1. [`AdminAuth::issue_nonce`] hands out a random nonce embedded in a
//!    message to sign, valid for a few minutes.
//! 2. [`AdminAuth::verify`] checks the nonce, the EIP-191 signature and
//!    finally the owner address, then trades the nonce for a session token.
//! 3. [`AdminAuth::session`] gates every moderation request.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use confession_relayer_store::{MemTtlStore, TtlStore};
use confession_relayer_utils::metric::Metrics;
use confession_relayer_utils::{probe, HandlerError};
use ethers::types::{Address, Signature};
use ethers::utils::to_checksum;
use rand::Rng;
use serde::Serialize;
use typed_builder::TypedBuilder;

/// Why an admin request was refused.
///
/// Verification failures before the owner check all collapse into
/// [`AuthError::AuthenticationFailed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The wallet address could not be parsed.
    #[error("Invalid wallet address")]
    InvalidAddress,
    /// Nonce missing or expired, nonce not in the message, or bad signature.
    #[error("Authentication failed")]
    AuthenticationFailed,
    /// Valid signature from a wallet that is not the owner.
    #[error("Wallet is not authorized")]
    NotOwner,
    /// Wrong shared password.
    #[error("Invalid password")]
    InvalidPassword,
    /// The requested login method has no secret configured.
    #[error("Admin authentication is not configured")]
    NotConfigured,
    /// Missing, unknown or expired session token.
    #[error("Invalid or expired session")]
    InvalidSession,
}

impl From<AuthError> for HandlerError {
    fn from(e: AuthError) -> Self {
        let status = match e {
            AuthError::InvalidAddress => StatusCode::BAD_REQUEST,
            AuthError::AuthenticationFailed
            | AuthError::InvalidPassword
            | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::NotOwner => StatusCode::FORBIDDEN,
            AuthError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        };
        HandlerError::new(status, e.to_string())
    }
}

/// A login challenge for a wallet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceChallenge {
    /// The random nonce.
    pub nonce: String,
    /// The exact message the wallet must sign.
    pub message: String,
    /// Seconds until the nonce expires.
    pub expires_in: u64,
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    /// Opaque bearer token for the `x-admin-session` header.
    pub session_token: String,
    /// Seconds until the session expires.
    pub expires_in: u64,
}

/// A valid session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Checksummed wallet that logged in.
    pub wallet_address: String,
    /// Seconds left.
    pub expires_in: u64,
}

/// Admin challenge–response authentication and session bookkeeping.
#[derive(TypedBuilder)]
pub struct AdminAuth {
    /// The only wallet allowed to moderate.
    #[builder(default)]
    owner: Option<Address>,
    /// Shared secret for the legacy password check.
    #[builder(default)]
    password: Option<String>,
    #[builder(default = Duration::from_secs(300))]
    nonce_ttl: Duration,
    #[builder(default = Duration::from_secs(3600))]
    session_ttl: Duration,
    /// lower-cased wallet address -> nonce
    #[builder(default = Arc::new(MemTtlStore::new()) as Arc<dyn TtlStore<String, String>>)]
    nonces: Arc<dyn TtlStore<String, String>>,
    /// session token -> wallet
    #[builder(default = Arc::new(MemTtlStore::new()) as Arc<dyn TtlStore<String, Address>>)]
    sessions: Arc<dyn TtlStore<String, Address>>,
    /// wallet -> its current session token
    #[builder(default = Arc::new(MemTtlStore::new()) as Arc<dyn TtlStore<Address, String>>)]
    wallet_sessions: Arc<dyn TtlStore<Address, String>>,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("owner", &self.owner)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

fn parse_address(wallet: &str) -> Result<Address, AuthError> {
    Address::from_str(wallet.trim()).map_err(|_| AuthError::InvalidAddress)
}

fn nonce_key(address: &Address) -> String {
    format!("{address:?}")
}

fn random_hex<const N: usize>() -> String {
    let bytes: [u8; N] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Compares without exiting on the first mismatching byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl AdminAuth {
    /// Issues a login challenge for `wallet`, replacing any earlier one.
    #[tracing::instrument(skip(self))]
    pub fn issue_nonce(&self, wallet: &str) -> Result<NonceChallenge, AuthError> {
        let address = parse_address(wallet)?;
        let nonce = random_hex::<16>();
        let message = format!(
            "Sign this message to log in as the Anonymous Confessions admin.\n\n\
             Wallet: {}\nNonce: {}\nIssued At: {}",
            to_checksum(&address, None),
            nonce,
            chrono::Utc::now().to_rfc3339(),
        );
        self.nonces
            .set_with_expiry(nonce_key(&address), nonce.clone(), self.nonce_ttl);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::AdminAuth,
            nonce_issued = true,
            wallet = %nonce_key(&address),
        );
        Ok(NonceChallenge {
            nonce,
            message,
            expires_in: self.nonce_ttl.as_secs(),
        })
    }

    /// Verifies a signed challenge and issues a session.
    ///
    /// The owner address is only checked once the signature is known to be
    /// valid. Failed attempts leave the nonce in place until it expires.
    #[tracing::instrument(skip(self, message, signature))]
    pub fn verify(
        &self,
        wallet: &str,
        message: &str,
        signature: &str,
    ) -> Result<IssuedSession, AuthError> {
        let address = parse_address(wallet)?;
        let key = nonce_key(&address);
        let Some(nonce) = self.nonces.get(&key) else {
            tracing::debug!("nonce missing or expired");
            return Err(AuthError::AuthenticationFailed);
        };
        if !message.contains(&nonce) {
            tracing::debug!("message does not carry the issued nonce");
            return Err(AuthError::AuthenticationFailed);
        }
        let valid = Signature::from_str(signature.trim())
            .map_err(|e| tracing::debug!(error = %e, "malformed signature"))
            .and_then(|sig| {
                sig.verify(message, address).map_err(
                    |e| tracing::debug!(error = %e, "signature does not match wallet"),
                )
            })
            .is_ok();
        if !valid {
            return Err(AuthError::AuthenticationFailed);
        }
        match self.owner {
            Some(owner) if owner == address => {}
            _ => {
                tracing::warn!(wallet = %key, "Valid signature from a non-owner wallet");
                return Err(AuthError::NotOwner);
            }
        }
        // one-shot: a concurrent verify of the same nonce loses here.
        if self.nonces.take(&key).is_none() {
            return Err(AuthError::AuthenticationFailed);
        }

        if let Some(previous) = self.wallet_sessions.take(&address) {
            self.sessions.delete(&previous);
        }
        let session_token = random_hex::<32>();
        self.sessions
            .set_with_expiry(session_token.clone(), address, self.session_ttl);
        self.wallet_sessions
            .set_with_expiry(address, session_token.clone(), self.session_ttl);
        self.metrics.admin_logins.inc();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::AdminAuth,
            session_issued = true,
            wallet = %key,
        );
        Ok(IssuedSession {
            session_token,
            expires_in: self.session_ttl.as_secs(),
        })
    }

    /// The legacy shared-secret check. Issues no session.
    pub fn check_password(&self, password: &str) -> Result<(), AuthError> {
        let expected = self.password.as_deref().ok_or(AuthError::NotConfigured)?;
        if constant_time_eq(expected.as_bytes(), password.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError::InvalidPassword)
        }
    }

    /// Looks up a session, evicting it if expired.
    pub fn session(&self, token: Option<&str>) -> Result<SessionInfo, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidSession)?
            .to_owned();
        let wallet = self.sessions.get(&token).ok_or(AuthError::InvalidSession)?;
        let expires_in = self
            .sessions
            .remaining(&token)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Ok(SessionInfo {
            wallet_address: to_checksum(&wallet, None),
            expires_in,
        })
    }

    /// Ends a session. Returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        match self.sessions.take(&token.to_owned()) {
            Some(wallet) => {
                self.wallet_sessions.delete(&wallet);
                true
            }
            None => false,
        }
    }

    /// Drops expired nonces and sessions.
    pub fn sweep_expired(&self) -> usize {
        self.nonces.sweep_expired()
            + self.sessions.sweep_expired()
            + self.wallet_sessions.sweep_expired()
    }
}
