//! Scripted [`AuthBackend`] for session manager and guard tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header};

use crate::config::AuthTimeouts;
use crate::net::api::{ApiError, AuthBackend};
use crate::net::types::{Role, TokenResponse, User};
use crate::routes::RecordingNavigator;
use crate::state::auth::AuthManager;
use crate::state::claims::now_secs;
use crate::state::token_store::TokenStore;

struct Reply<T> {
    delay: Duration,
    result: Result<T, ApiError>,
}

#[derive(Default)]
pub struct MockBackend {
    tokens: Mutex<VecDeque<Reply<TokenResponse>>>,
    users: Mutex<VecDeque<Reply<User>>>,
    token_calls: AtomicUsize,
    user_calls: AtomicUsize,
    seen_tokens: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn grant(&self, access_token: &str) {
        self.grant_after(Duration::ZERO, Ok(token_response(access_token)));
    }

    pub fn grant_after(&self, delay: Duration, result: Result<TokenResponse, ApiError>) {
        self.tokens.lock().unwrap().push_back(Reply { delay, result });
    }

    pub fn serve_user(&self, user: User) {
        self.serve_user_after(Duration::ZERO, Ok(user));
    }

    pub fn fail_user(&self, error: ApiError) {
        self.serve_user_after(Duration::ZERO, Err(error));
    }

    pub fn serve_user_after(&self, delay: Duration, result: Result<User, ApiError>) {
        self.users.lock().unwrap().push_back(Reply { delay, result });
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AuthBackend for MockBackend {
    async fn request_token(&self, _username: &str, _password: &str) -> Result<TokenResponse, ApiError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.tokens.lock().unwrap().pop_front();
        let Some(reply) = reply else {
            return Err(ApiError::Request("no scripted token reply".into()));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }

    async fn fetch_current_user(&self, token: &str) -> Result<User, ApiError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(token.to_owned());
        let reply = self.users.lock().unwrap().pop_front();
        let Some(reply) = reply else {
            return Err(ApiError::Request("no scripted user reply".into()));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

pub struct Harness {
    pub auth: AuthManager,
    pub backend: Arc<MockBackend>,
    pub navigator: Arc<RecordingNavigator>,
    pub tokens: TokenStore,
}

pub fn harness() -> Harness {
    let backend = MockBackend::new();
    let navigator = Arc::new(RecordingNavigator::new());
    let tokens = TokenStore::in_memory();
    let auth = AuthManager::new(
        tokens.clone(),
        Arc::clone(&backend) as Arc<dyn AuthBackend>,
        Arc::clone(&navigator) as Arc<dyn crate::routes::Navigator>,
        AuthTimeouts::default(),
    );
    Harness { auth, backend, navigator, tokens }
}

pub fn token_response(access_token: &str) -> TokenResponse {
    TokenResponse { access_token: access_token.to_owned(), token_type: "bearer".to_owned() }
}

/// HS256 JWT for `sub` expiring `ttl_secs` from now (negative for the past),
/// signed with a key the client never sees.
pub fn jwt(sub: &str, ttl_secs: i64) -> String {
    let claims = serde_json::json!({ "sub": sub, "exp": now_secs() + ttl_secs });
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"backend-secret")).unwrap()
}

pub fn user(username: &str, category: &str) -> User {
    User {
        id: Some(7),
        username: username.to_owned(),
        nombre: username.to_owned(),
        apellido: "Prueba".to_owned(),
        email: Some(format!("{username}@planta.local")),
        telefono: None,
        rol: Role::Category(category.to_owned()),
        activo: true,
        fecha_contratacion: None,
        foto_perfil: None,
    }
}

pub fn status(code: u16) -> ApiError {
    ApiError::Status { status: code, detail: "scripted".to_owned() }
}
