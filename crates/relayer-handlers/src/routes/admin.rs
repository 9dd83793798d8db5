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

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use confession_relayer_auth::{IssuedSession, NonceChallenge};
use confession_relayer_context::RelayerContext;
use confession_relayer_handler_utils::{
    NonceRequest, PasswordRequest, SessionStatusResponse, Success,
    SuccessResponse, VerifyRequest,
};
use confession_relayer_utils::HandlerError;

use super::json_body;
use crate::session_token;

/// Handles `POST /api/admin/password`
///
/// Shared-secret check only; no session is issued.
pub async fn handle_admin_password(
    State(ctx): State<Arc<RelayerContext>>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, HandlerError> {
    let request = json_body(payload)?;
    ctx.admin().check_password(&request.password)?;
    Ok(Json(SuccessResponse::ok()))
}

/// Handles `POST /api/admin/nonce`
pub async fn handle_admin_nonce(
    State(ctx): State<Arc<RelayerContext>>,
    payload: Result<Json<NonceRequest>, JsonRejection>,
) -> Result<Json<Success<NonceChallenge>>, HandlerError> {
    let request = json_body(payload)?;
    ctx.sweep_expired();
    let challenge = ctx.admin().issue_nonce(&request.wallet_address)?;
    Ok(Json(Success::new(challenge)))
}

/// Handles `POST /api/admin/verify`
pub async fn handle_admin_verify(
    State(ctx): State<Arc<RelayerContext>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<Success<IssuedSession>>, HandlerError> {
    let request = json_body(payload)?;
    let session = ctx.admin().verify(
        &request.wallet_address,
        &request.message,
        &request.signature,
    )?;
    Ok(Json(Success::new(session)))
}

/// Handles `POST /api/admin/logout`
pub async fn handle_admin_logout(
    State(ctx): State<Arc<RelayerContext>>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, HandlerError> {
    let token = session_token(&headers)
        .ok_or_else(|| HandlerError::unauthorized("Missing admin session"))?;
    ctx.admin().logout(token);
    Ok(Json(SuccessResponse::ok()))
}

/// Handles `GET /api/admin/session`
pub async fn handle_admin_session(
    State(ctx): State<Arc<RelayerContext>>,
    headers: HeaderMap,
) -> Json<SessionStatusResponse> {
    let status = match ctx.admin().session(session_token(&headers)) {
        Ok(info) => SessionStatusResponse {
            valid: true,
            wallet_address: Some(info.wallet_address),
            expires_in: Some(info.expires_in),
        },
        Err(_) => SessionStatusResponse {
            valid: false,
            wallet_address: None,
            expires_in: None,
        },
    };
    Json(status)
}
