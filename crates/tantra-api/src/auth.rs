//! `/auth/*` and `/health`

use serde_json::Value;
use tantra_core::User;
use tracing::{info, warn};

use crate::client::{ApiClient, RequestSpec};
use crate::error::ApiResult;
use crate::types::{AuthResponse, LoginRequest, RegisterRequest};

impl ApiClient {
    /// `POST /auth/login`; stores the returned credential
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        let auth: AuthResponse = self
            .call(RequestSpec::post("/auth/login").json(request)?)
            .await?;
        self.store_token(&auth.access_token).await;
        info!("Logged in as {}", auth.user.username);
        Ok(auth)
    }

    /// `POST /auth/register`; stores the returned credential
    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        let auth: AuthResponse = self
            .call(RequestSpec::post("/auth/register").json(request)?)
            .await?;
        self.store_token(&auth.access_token).await;
        info!("Registered {}", auth.user.username);
        Ok(auth)
    }

    /// `POST /auth/logout`. A failed remote call is logged; the credential is cleared regardless.
    pub async fn logout(&self) {
        if let Err(e) = self.execute(RequestSpec::post("/auth/logout")).await {
            warn!("Logout request failed: {}", e);
        }
        self.clear_token().await;
    }

    /// `GET /auth/me`
    pub async fn current_user(&self) -> ApiResult<User> {
        self.call(RequestSpec::get("/auth/me")).await
    }

    /// `GET /health`
    pub async fn health_check(&self) -> ApiResult<Value> {
        self.call(RequestSpec::get("/health")).await
    }
}
