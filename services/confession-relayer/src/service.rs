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

//! # Relayer Service Module 🕸️
//!
//! The HTTP router and the long-running tasks the relayer keeps alive for
//! its whole lifetime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use confession_relayer_context::RelayerContext;
use confession_relayer_handlers::routes::*;

/// How often expired nonces, sessions and rate limit windows are dropped.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Builds the `/api` router over `ctx`.
pub fn build_router(ctx: RelayerContext) -> Router {
    let api = Router::new()
        .route(
            "/confessions",
            get(handle_list_confessions).post(handle_direct_write_disabled),
        )
        .route("/confessions/:id", get(handle_get_confession))
        .route(
            "/confessions/:id/vote",
            post(handle_cast_vote).delete(handle_remove_vote),
        )
        .route("/confessions/:id/anchor", post(handle_direct_write_disabled))
        .route("/confessions/:id/visibility", patch(handle_set_visibility))
        .route("/relayer/info", get(handle_relayer_info))
        .route("/relayer/submit", post(handle_relayer_submit))
        .route("/admin/password", post(handle_admin_password))
        .route("/admin/nonce", post(handle_admin_nonce))
        .route("/admin/verify", post(handle_admin_verify))
        .route("/admin/logout", post(handle_admin_logout))
        .route("/admin/session", get(handle_admin_session))
        .route("/trends", get(handle_trends))
        .route("/metrics", get(handle_metric_info))
        .route("/ip", get(handle_ip_info))
        .route("/manifest.json", get(handle_manifest));

    Router::new()
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(ctx))
}

/// Serves the HTTP API until the context is shut down.
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration and stores
pub async fn build_web_services(ctx: RelayerContext) -> crate::Result<()> {
    let socket_addr = SocketAddr::new([0, 0, 0, 0].into(), ctx.config.port);
    let mut shutdown = ctx.shutdown_signal();
    let app = build_router(ctx).into_make_service_with_connect_info::<SocketAddr>();

    tracing::info!("Starting the server on {}", socket_addr);
    axum::Server::bind(&socket_addr)
        .serve(app)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await?;
    Ok(())
}

/// Starts the periodic sweep of expired ephemeral state.
///
/// Request handlers also sweep opportunistically; this bounds memory when
/// traffic stops.
pub fn spawn_sweeper(ctx: RelayerContext) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut shutdown = ctx.shutdown_signal();
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = ctx.sweep_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "Swept expired entries");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}
