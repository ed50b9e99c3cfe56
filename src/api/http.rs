// SPDX-License-Identifier: GPL-3.0-only
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::api::handlers::{
    ApiHandlers, ApiResponse, ApiResult, CookRequest, FeedItem, LikeResponse, ReferralRequest,
    SessionInfo, SignInRequest, UsernameRequest,
};
use crate::entity::{UserPreferences, UserProfile};
use crate::managers::CookResult;

pub struct HttpServer {
    handlers: Arc<ApiHandlers>,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(handlers: Arc<ApiHandlers>, addr: SocketAddr) -> Self {
        Self { handlers, addr }
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.handlers);

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

pub fn router(handlers: Arc<ApiHandlers>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/session", post(sign_in_handler).delete(sign_out_handler))
        .route("/api/recipes/public", get(public_feed_handler))
        .route("/api/recipes/:id/like", post(toggle_like_handler))
        .route(
            "/api/preferences",
            get(get_preferences_handler).put(put_preferences_handler),
        )
        .route("/api/profile/username", post(set_username_handler))
        .route("/api/profile/referral", post(redeem_referral_handler))
        .route("/api/streak/cook", post(record_cook_handler))
        .with_state(handlers)
}

async fn health_handler() -> Json<ApiResponse<&'static str>> {
    ApiHandlers::health().await
}

async fn sign_in_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<SessionInfo> {
    handlers.sign_in(request).await
}

async fn sign_out_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<SessionInfo> {
    handlers.sign_out().await
}

async fn public_feed_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Vec<FeedItem>> {
    handlers.public_feed().await
}

async fn toggle_like_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<String>,
) -> ApiResult<LikeResponse> {
    handlers.toggle_like(id).await
}

async fn get_preferences_handler(
    State(handlers): State<Arc<ApiHandlers>>,
) -> ApiResult<UserPreferences> {
    handlers.get_preferences().await
}

async fn put_preferences_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(prefs): Json<UserPreferences>,
) -> ApiResult<UserPreferences> {
    handlers.put_preferences(prefs).await
}

async fn set_username_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<UsernameRequest>,
) -> ApiResult<UserProfile> {
    handlers.set_username(request).await
}

async fn redeem_referral_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<ReferralRequest>,
) -> ApiResult<UserProfile> {
    handlers.redeem_referral(request).await
}

async fn record_cook_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<CookRequest>,
) -> ApiResult<CookResult> {
    handlers.record_cook(request).await
}
