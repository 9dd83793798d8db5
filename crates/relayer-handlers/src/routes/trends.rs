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

use axum::extract::State;
use axum::Json;

use confession_relayer_context::RelayerContext;
use confession_relayer_handler_utils::Success;
use confession_relayer_store::{ConfessionStats, ConfessionStore};
use confession_relayer_utils::HandlerError;

/// How many confessions `topConfessions` holds.
const TOP_CONFESSIONS: usize = 5;

/// Handles `GET /api/trends`
pub async fn handle_trends(
    State(ctx): State<Arc<RelayerContext>>,
) -> Result<Json<Success<ConfessionStats>>, HandlerError> {
    let stats = ctx.store().confession_stats(TOP_CONFESSIONS).await?;
    Ok(Json(Success::new(stats)))
}
