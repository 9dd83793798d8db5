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
use axum::Json;
use ethers::utils::{format_ether, to_checksum};

use confession_fee_oracle_backends::FeeBackend;
use confession_relayer_chain::{wei_to_ether, ChainClient};
use confession_relayer_context::RelayerContext;
use confession_relayer_handler_utils::{
    RelayerInfoResponse, SubmitRequest, SubmitResponse,
};
use confession_relayer_utils::HandlerError;

use super::body_rejection;
use crate::CallerAddress;

/// Handles `GET /api/relayer/info`
///
/// Fee and balance reads that fail are reported as `null`.
pub async fn handle_relayer_info(
    State(ctx): State<Arc<RelayerContext>>,
) -> Json<RelayerInfoResponse> {
    let Some(chain) = ctx.chain() else {
        return Json(RelayerInfoResponse::default());
    };
    let relayer_address = chain.relayer_address();
    let fee = ctx
        .fee_oracle()
        .required_fee()
        .await
        .map_err(|e| tracing::warn!(error = %e, "No fee quote for relayer info"))
        .ok();
    let balance = chain
        .balance(relayer_address)
        .await
        .map_err(|e| tracing::warn!(error = %e, "Could not read relayer balance"))
        .ok();
    if let Some(balance) = balance {
        ctx.metrics.relayer_balance.set(wei_to_ether(balance));
    }
    let has_sufficient_balance = match (fee, balance) {
        (Some(fee), Some(balance)) => {
            balance >= fee.amount.saturating_add(ctx.config.relayer.gas_buffer.wei())
        }
        _ => false,
    };
    Json(RelayerInfoResponse {
        enabled: true,
        relayer_address: Some(to_checksum(&relayer_address, None)),
        fee: fee.map(|f| format_ether(f.amount)),
        fee_wei: fee.map(|f| f.amount.to_string()),
        fee_source: fee.map(|f| f.source),
        balance: balance.map(format_ether),
        has_sufficient_balance,
        contract_address: Some(to_checksum(&chain.contract_address(), None)),
        chain_id: Some(chain.chain_id()),
    })
}

/// Handles `POST /api/relayer/submit`
///
/// Verifies the caller's payment, anchors the confession hash from the
/// relayer wallet and stores the confession.
pub async fn handle_relayer_submit(
    State(ctx): State<Arc<RelayerContext>>,
    CallerAddress(caller): CallerAddress,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, HandlerError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            ctx.submitter().check_rate_limit(&caller)?;
            return Err(body_rejection(rejection));
        }
    };
    let receipt = ctx.submitter().submit(request, &caller).await?;
    Ok(Json(SubmitResponse {
        success: true,
        tx_hash: format!("{:?}", receipt.tx_hash),
        confession: receipt.confession,
        fee_source: receipt.fee_source,
        explorer_url: receipt.explorer_url,
    }))
}
