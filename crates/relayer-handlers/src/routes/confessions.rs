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

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use confession_relayer_context::RelayerContext;
use confession_relayer_handler_utils::{
    ConfessionListResponse, ConfessionResponse, ConfessionWithVote, ListQuery,
    RemoveVoteRequest, VisibilityRequest, VoteRequest,
};
use confession_relayer_store::{ConfessionFilter, ConfessionStore};
use confession_relayer_types::{Category, Confession};
use confession_relayer_utils::HandlerError;

use super::json_body;
use crate::{is_admin, session_token, visitor_id};

fn not_found() -> HandlerError {
    HandlerError::not_found("Confession not found")
}

fn parse_id(raw: &str) -> Result<Uuid, HandlerError> {
    Uuid::parse_str(raw).map_err(|_| not_found())
}

/// Loads a confession the caller may see. Hidden ones only exist for admins.
async fn visible_confession(
    ctx: &RelayerContext,
    id: Uuid,
    admin: bool,
) -> Result<Confession, HandlerError> {
    match ctx.store().get_confession(id).await? {
        Some(c) if admin || !c.is_hidden => Ok(c),
        _ => Err(not_found()),
    }
}

/// Handles `GET /api/confessions`
///
/// Hidden confessions are only listed for a valid admin session. Every item
/// carries the `x-visitor-id` caller's vote.
pub async fn handle_list_confessions(
    State(ctx): State<Arc<RelayerContext>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ConfessionListResponse>, HandlerError> {
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.is_empty() && *c != "all")
        .map(Category::from_str)
        .transpose()
        .map_err(|e| {
            HandlerError::with_details(
                StatusCode::BAD_REQUEST,
                "Invalid query",
                json!({ "details": [{ "field": "category", "message": e.to_string() }] }),
            )
        })?;
    let defaults = ConfessionFilter::default();
    let filter = ConfessionFilter {
        category,
        include_hidden: is_admin(&ctx, &headers),
        sort: query.sort.unwrap_or(defaults.sort),
        limit: query.limit.unwrap_or(defaults.limit),
        offset: query.offset.unwrap_or(defaults.offset),
    };
    let confessions = ctx.store().list_confessions(&filter).await?;

    let votes = match visitor_id(&headers) {
        Some(visitor) => {
            let ids: Vec<_> = confessions.iter().map(|c| c.id).collect();
            ctx.store().votes_for(visitor, &ids).await?
        }
        None => Default::default(),
    };
    let confessions = confessions
        .into_iter()
        .map(|confession| ConfessionWithVote {
            user_vote: votes.get(&confession.id).copied(),
            confession,
        })
        .collect();
    Ok(Json(ConfessionListResponse {
        success: true,
        confessions,
    }))
}

/// Handles `GET /api/confessions/:id`
pub async fn handle_get_confession(
    State(ctx): State<Arc<RelayerContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConfessionResponse>, HandlerError> {
    let id = parse_id(&id)?;
    let confession = visible_confession(&ctx, id, is_admin(&ctx, &headers)).await?;
    let user_vote = match visitor_id(&headers) {
        Some(visitor) => ctx.store().get_vote(id, visitor).await?,
        None => None,
    };
    Ok(Json(ConfessionResponse {
        success: true,
        confession: ConfessionWithVote {
            confession,
            user_vote,
        },
    }))
}

/// Handles `POST /api/confessions` and `POST /api/confessions/:id/anchor`
///
/// Direct writes would tie a confession to its author, so they are refused.
pub async fn handle_direct_write_disabled() -> HandlerError {
    HandlerError::with_details(
        StatusCode::FORBIDDEN,
        "Direct submissions are disabled, submit through the anonymous relayer",
        json!({ "relayerEndpoint": "/api/relayer/submit" }),
    )
}

/// Handles `POST /api/confessions/:id/vote`
///
/// The visitor comes from the body, or from `x-visitor-id`.
pub async fn handle_cast_vote(
    State(ctx): State<Arc<RelayerContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<ConfessionResponse>, HandlerError> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let visitor = request
        .visitor_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| visitor_id(&headers))
        .ok_or_else(|| HandlerError::bad_request("visitorId is required"))?
        .to_owned();

    visible_confession(&ctx, id, is_admin(&ctx, &headers)).await?;
    let confession = ctx
        .store()
        .cast_vote(id, &visitor, request.vote_type)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ConfessionResponse {
        success: true,
        confession: ConfessionWithVote {
            confession,
            user_vote: Some(request.vote_type),
        },
    }))
}

/// Handles `DELETE /api/confessions/:id/vote`
pub async fn handle_remove_vote(
    State(ctx): State<Arc<RelayerContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<RemoveVoteRequest>>,
) -> Result<Json<ConfessionResponse>, HandlerError> {
    let id = parse_id(&id)?;
    let from_body = body.and_then(|Json(b)| b.visitor_id);
    let visitor = from_body
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| visitor_id(&headers))
        .ok_or_else(|| HandlerError::bad_request("visitorId is required"))?
        .to_owned();

    visible_confession(&ctx, id, is_admin(&ctx, &headers)).await?;
    let confession = ctx
        .store()
        .remove_vote(id, &visitor)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ConfessionResponse {
        success: true,
        confession: ConfessionWithVote {
            confession,
            user_vote: None,
        },
    }))
}

/// Handles `PATCH /api/confessions/:id/visibility`
///
/// Requires a valid `x-admin-session`.
pub async fn handle_set_visibility(
    State(ctx): State<Arc<RelayerContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<VisibilityRequest>, JsonRejection>,
) -> Result<Json<ConfessionResponse>, HandlerError> {
    let session = ctx.admin().session(session_token(&headers))?;
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let confession = ctx
        .store()
        .set_hidden(id, request.is_hidden)
        .await?
        .ok_or_else(not_found)?;
    tracing::info!(
        confession_id = %id,
        hidden = request.is_hidden,
        admin = %session.wallet_address,
        "Confession visibility changed",
    );
    Ok(Json(ConfessionResponse {
        success: true,
        confession: ConfessionWithVote {
            confession,
            user_vote: None,
        },
    }))
}
