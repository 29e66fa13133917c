#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use parley_api::clock::ManualClock;
use parley_api::{AppState, AppStateInner, router};
use parley_db::Database;
use parley_types::api::Claims;
use parley_types::models::{Role, WorkspaceKind};

pub const SECRET: &str = "integration-secret";

pub struct User {
    pub id: Uuid,
    pub token: String,
}

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub org: Uuid,
    app: Router,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db, SECRET, clock.clone(), Duration::from_secs(2));
        Self {
            app: router(state.clone()),
            state,
            clock,
            org: Uuid::new_v4(),
        }
    }

    /// Register a workspace member and mint a token for them.
    pub fn user(&self, role: Role) -> User {
        let id = Uuid::new_v4();
        self.state.db.add_workspace_member(self.org, id, role).unwrap();
        let claims = Claims {
            sub: id,
            username: format!("{role}-{}", &id.to_string()[..8]),
            role,
            workspace_id: self.org,
            workspace_kind: WorkspaceKind::Organization,
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        User { id, token }
    }

    /// A member who has accepted the current charter over HTTP.
    pub async fn onboarded(&self, role: Role) -> User {
        let user = self.user(role);
        let status = self.call(Method::GET, "/messaging/charter", Some(&user), None).await;
        let version = status.body["charter_version"].clone();
        let accepted = self
            .call(
                Method::POST,
                "/messaging/charter/accept",
                Some(&user),
                Some(serde_json::json!({ "charter_version": version })),
            )
            .await;
        assert_eq!(accepted.status, StatusCode::OK, "{}", accepted.body);
        user
    }

    pub async fn call(&self, method: Method, uri: &str, user: Option<&User>, body: Option<Value>) -> Reply {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", user.token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply { status, headers, body }
    }

    pub async fn direct_thread(&self, coach: &User, other: &User) -> Uuid {
        let reply = self
            .call(
                Method::POST,
                "/threads",
                Some(coach),
                Some(serde_json::json!({ "kind": "direct", "participant_id": other.id })),
            )
            .await;
        assert!(reply.status.is_success(), "{}", reply.body);
        reply.body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn send(&self, user: &User, thread: Uuid, body: &str) -> Reply {
        self.call(
            Method::POST,
            &format!("/threads/{thread}/messages"),
            Some(user),
            Some(serde_json::json!({ "body": body })),
        )
        .await
    }
}
