//! # Auth Context
//!
//! 会话引导与认证状态机：`Loading → Authenticated | Unauthenticated`。
//!
//! `Loading` 只在启动时存在，`bootstrap` 完成后永不回到该状态。

use std::sync::Arc;

use tantra_api::{ApiClient, LoginRequest, RegisterRequest, SessionEvent};
use tantra_core::{Notifier, User, UserRole};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};

/// 认证状态
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// 正在解析已存储的凭据
    Loading,
    Authenticated(User),
    Unauthenticated,
}

impl AuthState {
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.user().map(|u| u.has_role(role)).unwrap_or(false)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.user()
            .map(|u| u.has_permission(permission))
            .unwrap_or(false)
    }
}

struct Inner {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<AuthState>,
}

/// 进程内唯一的认证上下文，克隆共享同一状态
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl AuthContext {
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            inner: Arc::new(Inner {
                api,
                notifier,
                state,
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.inner.state.borrow().has_role(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.inner.state.borrow().has_permission(permission)
    }

    fn set_state(&self, state: AuthState) {
        self.inner.state.send_replace(state);
    }

    async fn drop_credential(&self) {
        if let Err(e) = self.inner.api.credentials().clear().await {
            warn!("Failed to remove persisted credential: {}", e);
        }
    }

    /// 启动时解析已存储的凭据
    ///
    /// 只有第一次调用会结束 `Loading`；之后的调用直接返回当前状态。
    pub async fn bootstrap(&self) -> AuthState {
        if !self.is_loading() {
            return self.state();
        }

        if let Err(e) = self.inner.api.credentials().load().await {
            warn!("Failed to read stored credential: {}", e);
        }

        let resolved = if self.inner.api.is_authenticated() {
            match self.inner.api.current_user().await {
                Ok(user) => {
                    info!("Restored session for {}", user.username);
                    AuthState::Authenticated(user)
                }
                Err(e) => {
                    warn!("Failed to get current user: {}", e);
                    self.drop_credential().await;
                    AuthState::Unauthenticated
                }
            }
        } else {
            debug!("No stored credential");
            AuthState::Unauthenticated
        };

        self.inner.state.send_if_modified(|state| {
            if state.is_loading() {
                *state = resolved;
                true
            } else {
                false
            }
        });
        self.state()
    }

    pub async fn login(&self, request: &LoginRequest) -> AuthResult<User> {
        match self.inner.api.login(request).await {
            Ok(auth) => {
                let user = auth.user;
                self.inner
                    .notifier
                    .success(&format!("Welcome back, {}!", user.username));
                self.set_state(AuthState::Authenticated(user.clone()));
                Ok(user)
            }
            Err(e) => {
                let err = AuthError::rejected(e, "Login failed");
                self.inner.notifier.error(&err.to_string());
                Err(err)
            }
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<User> {
        match self.inner.api.register(request).await {
            Ok(auth) => {
                let user = auth.user;
                self.inner
                    .notifier
                    .success(&format!("Welcome to Tantra, {}!", user.username));
                self.set_state(AuthState::Authenticated(user.clone()));
                Ok(user)
            }
            Err(e) => {
                let err = AuthError::rejected(e, "Registration failed");
                self.inner.notifier.error(&err.to_string());
                Err(err)
            }
        }
    }

    /// 无论远端是否成功，本地会话都会结束
    pub async fn logout(&self) {
        self.inner.api.logout().await;
        self.set_state(AuthState::Unauthenticated);
        self.inner.notifier.success("Logged out successfully");
    }

    /// 重新读取当前用户；失败时清除凭据并回到未认证
    pub async fn refresh_user(&self) -> AuthResult<User> {
        if !self.inner.api.is_authenticated() {
            self.set_state(AuthState::Unauthenticated);
            return Err(AuthError::NotAuthenticated);
        }
        match self.inner.api.current_user().await {
            Ok(user) => {
                self.set_state(AuthState::Authenticated(user.clone()));
                Ok(user)
            }
            Err(e) => {
                warn!("Failed to refresh user: {}", e);
                self.drop_credential().await;
                self.set_state(AuthState::Unauthenticated);
                Err(AuthError::rejected(e, "Failed to refresh user"))
            }
        }
    }

    /// 跟随客户端的会话事件：刷新失败时清空当前用户
    ///
    /// 任务只持有弱引用，上下文释放后在下一个事件处退出。
    pub fn watch_session(&self) -> JoinHandle<()> {
        let mut events = self.inner.api.subscribe();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Unauthenticated { redirect_to }) => {
                        let Some(inner) = weak.upgrade() else { break };
                        info!("Session expired, redirecting to {}", redirect_to);
                        inner.state.send_replace(AuthState::Unauthenticated);
                    }
                    Ok(SessionEvent::TokenRefreshed) => debug!("Credential refreshed"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Missed {} session events", n)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, permissions: &[&str]) -> User {
        User {
            id: "u-1".into(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            created_at: None,
            last_login: None,
            is_active: true,
        }
    }

    #[test]
    fn test_state_predicates() {
        let state = AuthState::Authenticated(user(UserRole::Developer, &["debug:read"]));
        assert!(state.is_authenticated());
        assert!(state.has_role(UserRole::Developer));
        assert!(!state.has_role(UserRole::Admin));
        assert!(state.has_permission("debug:read"));
        assert!(!state.has_permission("debug:write"));

        assert!(!AuthState::Loading.has_permission("debug:read"));
        assert!(!AuthState::Unauthenticated.has_role(UserRole::User));
    }

    #[tokio::test]
    async fn test_new_context_starts_loading() {
        let api = ApiClient::builder("http://127.0.0.1:1").build().unwrap();
        let auth = AuthContext::new(api, Arc::new(tantra_core::TracingNotifier));
        assert!(auth.is_loading());
        assert!(auth.user().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_without_credential_ends_loading_once() {
        let api = ApiClient::builder("http://127.0.0.1:1").build().unwrap();
        let auth = AuthContext::new(api, Arc::new(tantra_core::TracingNotifier));
        let mut changes = auth.subscribe();

        assert_eq!(auth.bootstrap().await, AuthState::Unauthenticated);
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        assert_eq!(auth.bootstrap().await, AuthState::Unauthenticated);
        assert!(!changes.has_changed().unwrap());
    }
}
