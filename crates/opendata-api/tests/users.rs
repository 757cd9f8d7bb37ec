mod common;

use axum::http::{Method, StatusCode};
use common::{app, body_json};
use opendata_core::{User, UserId};

async fn issue_key(app: &common::TestApp, user: &User, api_key: &str) -> String {
    let uri = format!("/users/{}/apikey", user.id);
    let response = app.request(Method::POST, &uri, Some(api_key)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["apikey"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_and_version() {
    let app = app();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["users"], 3);

    let version = body_json(app.get("/version").await).await;
    assert_eq!(version["api_version"], "v1");
}

#[tokio::test]
async fn test_get_user_json_ld() {
    let app = app();
    let jane = &app.users[1];

    let response = app.get(&format!("/users/{}", jane.id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let profile = body_json(response).await;
    assert_eq!(profile["@type"], "Person");
    assert_eq!(profile["@context"], "http://schema.org");
    assert_eq!(profile["name"], "Jane Doe");
    assert_eq!(profile["description"], "Loves open data, see portal");
}

#[tokio::test]
async fn test_get_user_by_slug() {
    let app = app();

    let response = app.get("/users/jane-doe").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Jane Doe");
}

#[tokio::test]
async fn test_get_user_errors() {
    let app = app();

    let response = app.get("/users/not-a-ulid").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = body_json(response).await;
    assert_eq!(error["status"], 404);
    assert_eq!(error["code"], "NOT_FOUND");

    let response = app.get(&format!("/users/{}", UserId::new())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_anonymous_cannot_issue_keys() {
    let app = app();
    let admin = &app.users[0];

    let uri = format!("/users/{}/apikey", admin.id);
    let response = app.request(Method::POST, &uri, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_API_KEY");

    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The seeded key still works.
    let uri = format!("/users/{}", app.users[2].id);
    let response = app
        .request(Method::DELETE, &uri, Some(&app.admin_key()))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_user_cannot_issue_keys_for_others() {
    let app = app();
    let jane_key = app.key_of(1);

    for target in [&app.users[0], &app.users[2]] {
        let uri = format!("/users/{}/apikey", target.id);
        let response = app.request(Method::POST, &uri, Some(&jane_key)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["code"], "FORBIDDEN");
    }
}

#[tokio::test]
async fn test_user_rotates_own_key() {
    let app = app();
    let jane = &app.users[1];
    let old_key = app.key_of(1);

    let new_key = issue_key(&app, jane, &old_key).await;
    assert_ne!(new_key, old_key);
    let user_id = User::verify_api_key(common::SECRET.as_bytes(), &new_key).unwrap();
    assert_eq!(user_id, jane.id);

    let uri = format!("/users/{}/apikey", jane.id);
    let response = app.request(Method::POST, &uri, Some(&old_key)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sysadmin_issues_key_for_user() {
    let app = app();
    let john = &app.users[2];

    let key = issue_key(&app, john, &app.admin_key()).await;
    let user_id = User::verify_api_key(common::SECRET.as_bytes(), &key).unwrap();
    assert_eq!(user_id, john.id);

    // John can now manage his own key but not delete accounts.
    let uri = format!("/users/{}", app.users[1].id);
    let response = app.request(Method::DELETE, &uri, Some(&key)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_no_key_for_deleted_user() {
    let app = app();
    let admin_key = app.admin_key();
    let john = &app.users[2];

    let uri = format!("/users/{}", john.id);
    let response = app.request(Method::DELETE, &uri, Some(&admin_key)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let uri = format!("/users/{}/apikey", john.id);
    let response = app.request(Method::POST, &uri, Some(&admin_key)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_issue_key_by_slug() {
    let app = app();

    let admin = app.state.find_user("ada-admin").await.unwrap();
    let key = app.state.issue_api_key(&admin.id).await.unwrap();

    let uri = format!("/users/{}", app.users[2].id);
    let response = app.request(Method::DELETE, &uri, Some(&key)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_delete_requires_api_key() {
    let app = app();
    let target = app.users[2].id;

    let uri = format!("/users/{}", target);
    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let uri = format!("/users/{}", target);
    let response = app.request(Method::DELETE, &uri, Some("garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_API_KEY");
}

#[tokio::test]
async fn test_delete_requires_sysadmin() {
    let app = app();

    let uri = format!("/users/{}", app.users[2].id);
    let response = app
        .request(Method::DELETE, &uri, Some(&app.key_of(1)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cleared_key_is_rejected() {
    let app = app();
    let admin = &app.users[0];
    let key = app.admin_key();

    let uri = format!("/users/{}/apikey", admin.id);
    let response = app.request(Method::DELETE, &uri, Some(&key)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let uri = format!("/users/{}", app.users[2].id);
    let response = app.request(Method::DELETE, &uri, Some(&key)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sysadmin_anonymizes_user() {
    let app = app();
    let target = &app.users[1];

    let uri = format!("/users/{}", target.id);
    let response = app
        .request(Method::DELETE, &uri, Some(&app.admin_key()))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let profile = body_json(app.get(&format!("/users/{}", target.id)).await).await;
    assert_eq!(profile["name"], "DELETED DELETED");
    assert!(profile.get("description").is_none());

    // An anonymized account can no longer authenticate.
    let uri = format!("/users/{}/apikey", target.id);
    let response = app
        .request(Method::DELETE, &uri, Some(&app.key_of(1)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_unknown_user() {
    let app = app();

    let uri = format!("/users/{}", UserId::new());
    let response = app
        .request(Method::DELETE, &uri, Some(&app.admin_key()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
