//! Drives the full router in memory with a browser-like cookie jar.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::FromRef,
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    Router,
};
use cookie::Cookie;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use super::memory::MemoryStore;
use super::repo::SessionRepo;
use super::repo_types::Session;
use crate::auth::{cookies, JwtKeys};
use crate::mail::RecordingMailer;
use crate::state::AppState;

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookies: Vec<String>,
}

impl TestResponse {
    /// Decoded value this response set for `name`; `Some("")` when it was cleared.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookies
            .iter()
            .filter_map(|raw| Cookie::parse_encoded(raw.clone()).ok())
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    state: AppState,
    router: Router,
    /// name -> still-encoded value, as a browser would replay it.
    jar: Mutex<BTreeMap<String, String>>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake(store.clone(), mailer.clone());
        let router = crate::app::build_app(state.clone());
        Self {
            store,
            mailer,
            state,
            router,
            jar: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn cookie_header(&self) -> String {
        self.jar
            .lock()
            .await
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub async fn forget_cookie(&self, name: &str) {
        self.jar.lock().await.remove(name);
    }

    /// Sends with the jar's cookies and stores whatever the response sets.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let header = self.cookie_header().await;
        let res = self.send_with_cookies(method, uri, body, &header).await;

        let mut jar = self.jar.lock().await;
        for raw in &res.set_cookies {
            let Ok(c) = Cookie::parse(raw.clone()) else {
                continue;
            };
            if c.value().is_empty() {
                jar.remove(c.name());
            } else {
                jar.insert(c.name().to_string(), c.value().to_string());
            }
        }
        res
    }

    /// Sends with an explicit `Cookie` header; the jar is left alone.
    pub async fn send_with_cookies(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie_header: &str,
    ) -> TestResponse {
        let mut req = Request::builder().method(method).uri(uri);
        if !cookie_header.is_empty() {
            req = req.header(COOKIE, cookie_header);
        }
        let req = match body {
            Some(v) => req
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        self.dispatch(req).await
    }

    /// Sends a raw body with the jar's cookies, for malformed input.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> TestResponse {
        let mut req = Request::builder().method(method).uri(uri);
        let header = self.cookie_header().await;
        if !header.is_empty() {
            req = req.header(COOKIE, header);
        }
        if let Some(ct) = content_type {
            req = req.header(CONTENT_TYPE, ct);
        }
        self.dispatch(req.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn dispatch(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let set_cookies = res
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            body,
            set_cookies,
        }
    }

    /// `name=value` the way a browser replays an encoded cookie.
    pub fn encode_cookie(name: &str, value: &str) -> String {
        Cookie::new(name.to_string(), value.to_string())
            .encoded()
            .to_string()
    }

    pub fn keys(&self) -> JwtKeys {
        JwtKeys::from_ref(&self.state)
    }

    pub async fn register(&self, id: &str, email: &str, password: &str) {
        let res = self
            .send(
                Method::POST,
                "/sign-up",
                Some(json!({
                    "id": id,
                    "email": email,
                    "password": password,
                    "passwordCheck": password,
                    "nickname": "A",
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
    }

    pub async fn sign_in(&self, id: &str, password: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/sign-in",
            Some(json!({"id": id, "password": password})),
        )
        .await
    }

    pub async fn sessions_of(&self, user_id: &str) -> Vec<Session> {
        self.store.list_for_user(user_id).await.unwrap()
    }

    /// Session id carried by the refresh cookie currently in the jar.
    pub async fn refresh_sid(&self) -> Option<Uuid> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&self.cookie_header().await).ok()?);
        let token = cookies::read_bearer(&headers, cookies::REFRESH_COOKIE)?;
        self.keys()
            .verify_refresh(&token)
            .ok()?
            .sid
    }
}
