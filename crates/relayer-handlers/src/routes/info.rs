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
use serde_json::json;

use confession_relayer_context::RelayerContext;
use confession_relayer_handler_utils::IpInformationResponse;

use crate::CallerAddress;

/// Handles the `ip` address response
pub async fn handle_ip_info(
    CallerAddress(ip): CallerAddress,
) -> Json<IpInformationResponse> {
    Json(IpInformationResponse { ip })
}

/// Handles `GET /api/manifest.json`
///
/// The web app manifest, rooted at the configured `app-url`.
pub async fn handle_manifest(
    State(ctx): State<Arc<RelayerContext>>,
) -> Json<serde_json::Value> {
    let start_url = ctx
        .config
        .app_url
        .as_ref()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "/".to_owned());
    let icon = |size: u32| {
        json!({
            "src": format!("/icon-{size}.png"),
            "sizes": format!("{size}x{size}"),
            "type": "image/png",
        })
    };
    Json(json!({
        "name": "Anonymous Confessions",
        "short_name": "Confessions",
        "description": "Anonymous confessions, anchored on chain by a relayer",
        "start_url": start_url,
        "scope": start_url,
        "display": "standalone",
        "background_color": "#0b0b12",
        "theme_color": "#6d28d9",
        "icons": [icon(192), icon(512)],
    }))
}
