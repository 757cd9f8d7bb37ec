#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use opendata_api::{build_router, AppState, InMemoryUserStore};
use chrono::{Duration, Utc};
use opendata_core::{MetricRegistry, Role, User, Value};
use opendata_export::{register_user_exports, AdapterRegistry, Streamer};
use secrecy::SecretString;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Vec<User>,
}

/// Ada is a sysadmin, Jane a regular user. Both start with an API key.
pub fn users() -> Vec<User> {
    let issued_at = Utc::now() - Duration::days(1);
    let mut admin = User::new("Ada", "Admin", "ada@example.org");
    admin.roles.push(Role::admin());
    admin.generate_api_key(SECRET.as_bytes(), issued_at).unwrap();

    let mut jane = User::new("Jane", "Doe", "jane@example.org");
    jane.generate_api_key(SECRET.as_bytes(), issued_at).unwrap();
    jane.about = Some("Loves **open** data, see [portal](https://example.org)".to_string());
    jane.set_metric("datasets", Value::Int(3));
    jane.set_metric("followers", Value::Int(12));

    let john = User::new("John", "Smith", "john@example.org");

    vec![admin, jane, john]
}

pub fn app() -> TestApp {
    app_with(users())
}

pub fn app_with(users: Vec<User>) -> TestApp {
    let mut adapters = AdapterRegistry::new();
    let mut metrics = MetricRegistry::new();
    register_user_exports(&mut adapters, &mut metrics);

    let streamer = Streamer::new(Arc::new(adapters), Arc::new(metrics));
    let store = Arc::new(InMemoryUserStore::new(users.clone()));
    let state = AppState::new(store, streamer, SecretString::new(SECRET.to_string()));

    TestApp {
        router: build_router(state.clone()),
        state,
        users,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        api_key: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Method::GET, uri, None).await
    }

    pub fn admin_key(&self) -> String {
        self.key_of(0)
    }

    pub fn key_of(&self, index: usize) -> String {
        self.users[index].apikey().unwrap().to_string()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn parse_csv(body: &[u8]) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(body)
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}
