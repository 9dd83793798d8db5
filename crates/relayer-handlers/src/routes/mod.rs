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

use axum::extract::rejection::JsonRejection;
use axum::Json;
use confession_relayer_utils::HandlerError;
use serde_json::json;

/// Module for handling confession listing, voting and moderation API
mod confessions;
pub use confessions::*;

/// Module for handling the anonymous relayer API
mod relayer;
pub use relayer::*;

/// Module for handling admin login API
mod admin;
pub use admin::*;

/// Module for handling aggregate stats API
mod trends;
pub use trends::*;

/// Module for handling relayer metric API
mod metric;
pub use metric::*;

/// Module for handling relayer info API
mod info;
pub use info::*;

/// Unwraps a JSON body, turning axum's rejection into a 400 envelope.
pub(crate) fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, HandlerError> {
    payload.map(|Json(v)| v).map_err(body_rejection)
}

pub(crate) fn body_rejection(rejection: JsonRejection) -> HandlerError {
    HandlerError::with_details(
        rejection.status(),
        "Invalid request body",
        json!({ "details": rejection.body_text() }),
    )
}
