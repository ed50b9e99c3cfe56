// SPDX-License-Identifier: GPL-3.0-only
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::{AuthProvider, SessionAuth};
use crate::entity::{Recipe, UserPreferences, UserProfile};
use crate::error::SyncError;
use crate::managers::{
    AnalyticsTracker, CookResult, FollowManager, LikeManager, PreferencesManager, ProfileError,
    ProfileManager, RecipeManager, StreakManager,
};
use crate::sync::ToggleOutcome;

#[derive(Debug, Serialize, Deserialize)]
pub struct SignInRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralRequest {
    pub code: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CookRequest {
    /// Defaults to today (UTC)
    pub day: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedItem {
    pub recipe: Recipe,
    pub liked: bool,
    pub like_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub recipe_id: String,
    pub liked: bool,
    pub like_count: u64,
    /// Another toggle for this recipe was still in flight
    pub skipped: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(message: String, code: &str) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            code: Some(code.to_string()),
        }
    }
}

/// Failure of an API call, rendered as an error envelope.
#[derive(Debug)]
pub enum ApiError {
    Sync(SyncError),
    BadRequest(String),
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        ApiError::Sync(err)
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Sync(e) => ApiError::Sync(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

pub fn status_for(err: &SyncError) -> StatusCode {
    match err {
        SyncError::Unauthenticated => StatusCode::UNAUTHORIZED,
        SyncError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        SyncError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        SyncError::NotFound(_) => StatusCode::NOT_FOUND,
        SyncError::Conflict(_) => StatusCode::CONFLICT,
        SyncError::TransientUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SyncError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Sync(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!(code = e.code(), error = %e, "Request failed");
                }
                (status, ApiResponse::<()>::error(e.user_message(), e.code()))
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::<()>::error(message, "INVALID_REQUEST"),
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Shared state behind the local API routes.
pub struct ApiHandlers {
    session: Arc<SessionAuth>,
    likes: Arc<LikeManager>,
    follows: Arc<FollowManager>,
    recipes: Arc<RecipeManager>,
    preferences: Arc<PreferencesManager>,
    profiles: Arc<ProfileManager>,
    streaks: Arc<StreakManager>,
    analytics: Arc<AnalyticsTracker>,
}

impl ApiHandlers {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<SessionAuth>,
        likes: Arc<LikeManager>,
        follows: Arc<FollowManager>,
        recipes: Arc<RecipeManager>,
        preferences: Arc<PreferencesManager>,
        profiles: Arc<ProfileManager>,
        streaks: Arc<StreakManager>,
        analytics: Arc<AnalyticsTracker>,
    ) -> Self {
        Self {
            session,
            likes,
            follows,
            recipes,
            preferences,
            profiles,
            streaks,
            analytics,
        }
    }
}

impl ApiHandlers {
    pub async fn health() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::success("ok"))
    }

    pub async fn sign_in(&self, request: SignInRequest) -> ApiResult<SessionInfo> {
        let user_id = request.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
        }
        if self.session.current_user_key().as_deref() != Some(user_id.as_str()) {
            self.forget_user_state().await;
        }
        self.session.sign_in(user_id.as_str());
        self.analytics.track("session_start", &[]);
        Ok(Json(ApiResponse::success(SessionInfo {
            user_id: Some(user_id),
        })))
    }

    pub async fn sign_out(&self) -> ApiResult<SessionInfo> {
        self.session.sign_out();
        self.forget_user_state().await;
        Ok(Json(ApiResponse::success(SessionInfo { user_id: None })))
    }

    /// Liked and followed flags belong to whoever was signed in.
    async fn forget_user_state(&self) {
        self.likes.clear().await;
        self.follows.clear().await;
    }

    pub async fn public_feed(&self) -> ApiResult<Vec<FeedItem>> {
        let recipes = self.recipes.public_feed().await?;

        let ids: Vec<String> = recipes.iter().map(|r| r.id.clone()).collect();
        if let Err(e) = self.likes.load_states(&ids).await {
            warn!(error = %e, "Failed to load like states for feed, using stored counts");
            for recipe in &recipes {
                self.likes.seed_count_if_unknown(&recipe.id, recipe.like_count).await;
            }
        }

        let mut items = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            let state = self.likes.state(&recipe.id).await;
            items.push(FeedItem {
                recipe,
                liked: state.active,
                like_count: state.count,
            });
        }
        Ok(Json(ApiResponse::success(items)))
    }

    pub async fn toggle_like(&self, recipe_id: String) -> ApiResult<LikeResponse> {
        let outcome = self.likes.toggle_like(&recipe_id).await?;
        let (state, skipped) = match outcome {
            ToggleOutcome::Confirmed(state) => (state, false),
            ToggleOutcome::Skipped => (self.likes.state(&recipe_id).await, true),
        };
        info!(recipe_id = %recipe_id, liked = state.active, skipped, "Like toggled");
        Ok(Json(ApiResponse::success(LikeResponse {
            recipe_id,
            liked: state.active,
            like_count: state.count,
            skipped,
        })))
    }

    pub async fn get_preferences(&self) -> ApiResult<UserPreferences> {
        let prefs = match self.preferences.cached().await? {
            Some(prefs) => prefs,
            None => self.preferences.refresh().await?,
        };
        Ok(Json(ApiResponse::success(prefs)))
    }

    pub async fn put_preferences(&self, prefs: UserPreferences) -> ApiResult<UserPreferences> {
        let saved = self.preferences.save(prefs).await?;
        Ok(Json(ApiResponse::success(saved)))
    }

    pub async fn set_username(&self, request: UsernameRequest) -> ApiResult<UserProfile> {
        let profile = self.profiles.set_username(&request.username).await?;
        Ok(Json(ApiResponse::success(profile)))
    }

    pub async fn redeem_referral(&self, request: ReferralRequest) -> ApiResult<UserProfile> {
        let profile = self.profiles.redeem_referral(&request.code).await?;
        Ok(Json(ApiResponse::success(profile)))
    }

    pub async fn record_cook(&self, request: CookRequest) -> ApiResult<CookResult> {
        let day = request.day.unwrap_or_else(|| Utc::now().date_naive());
        let result = self.streaks.record_cook(day).await?;
        Ok(Json(ApiResponse::success(result)))
    }
}
