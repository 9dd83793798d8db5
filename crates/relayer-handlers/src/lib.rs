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

//! Relayer handlers for HTTP calls

#![warn(missing_docs)]
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use confession_relayer_context::RelayerContext;
use confession_relayer_handler_utils::{ADMIN_SESSION_HEADER, VISITOR_ID_HEADER};
use confession_relayer_tx_relay::TrustedProxies;

/// Module handles relayer API
pub mod routes;

/// The caller's network address, as the rate limiter sees it.
///
/// The socket peer address, unless the peer is a trusted proxy that names
/// the client in `x-forwarded-for`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerAddress(pub String);

#[async_trait]
impl FromRequestParts<Arc<RelayerContext>> for CallerAddress {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<RelayerContext>,
    ) -> Result<Self, Self::Rejection> {
        Ok(caller_address(parts, ctx.trusted_proxies()))
    }
}

/// Resolves the [`CallerAddress`] of a request.
///
/// Without a peer address (no `ConnectInfo`) the caller is `unknown`.
pub fn caller_address(parts: &Parts, proxies: &TrustedProxies) -> CallerAddress {
    let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>()
    else {
        return CallerAddress("unknown".to_owned());
    };
    let forwarded = header(&parts.headers, "x-forwarded-for");
    CallerAddress(proxies.client_ip(peer.ip(), forwarded).to_string())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The `x-visitor-id` header, if any.
pub fn visitor_id(headers: &HeaderMap) -> Option<&str> {
    header(headers, VISITOR_ID_HEADER)
}

/// The `x-admin-session` header, if any.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    header(headers, ADMIN_SESSION_HEADER)
}

/// Whether the request carries a valid admin session.
pub fn is_admin(ctx: &RelayerContext, headers: &HeaderMap) -> bool {
    ctx.admin().session(session_token(headers)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn caller(req: Request<()>) -> String {
        let proxies = TrustedProxies::new(&["127.0.0.1"]);
        let (parts, _) = req.into_parts();
        caller_address(&parts, &proxies).0
    }

    fn peer(ip: [u8; 4]) -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from((ip, 4000)))
    }

    #[test]
    fn trusted_proxy_forwards_the_first_entry() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .extension(peer([127, 0, 0, 1]))
            .body(())
            .unwrap();
        assert_eq!(caller(req), "203.0.113.7");
    }

    #[test]
    fn untrusted_peer_cannot_pick_its_key() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .extension(peer([192, 0, 2, 1]))
            .body(())
            .unwrap();
        assert_eq!(caller(req), "192.0.2.1");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let req = Request::builder()
            .extension(peer([127, 0, 0, 1]))
            .body(())
            .unwrap();
        assert_eq!(caller(req), "127.0.0.1");
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        assert_eq!(caller(req), "unknown");
    }

    #[test]
    fn blank_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(VISITOR_ID_HEADER, "  ".parse().unwrap());
        assert_eq!(visitor_id(&headers), None);
        headers.insert(VISITOR_ID_HEADER, "v-1".parse().unwrap());
        assert_eq!(visitor_id(&headers), Some("v-1"));
    }
}
