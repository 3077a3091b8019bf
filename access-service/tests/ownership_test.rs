mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

async fn two_users(app: &TestApp) -> (String, String) {
    app.create_user("owner@example.com", &["User"]).await;
    app.create_user("intruder@example.com", &["User"]).await;
    (
        app.login("owner@example.com").await,
        app.login("intruder@example.com").await,
    )
}

#[tokio::test]
async fn records_are_created_for_the_caller() {
    let app = TestApp::seeded().await;
    let owner = app.create_user("owner@example.com", &[]).await;
    let token = app.login("owner@example.com").await;

    let res = app
        .post("/api/auths", &token, json!({ "text": "first note" }))
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["text"], "first note");
    assert_eq!(res.body["owner_id"], owner.id());
    assert!(res.refreshed_token().is_some());
}

#[tokio::test]
async fn foreign_records_are_indistinguishable_from_missing_ones() {
    let app = TestApp::seeded().await;
    let (owner, intruder) = two_users(&app).await;

    let created = app
        .post("/api/auths", &owner, json!({ "text": "private" }))
        .await;
    let id = created.body["id"].as_i64().unwrap();

    let foreign = app.get(&format!("/api/auths/{}", id), &intruder).await;
    let missing = app.get("/api/auths/987654", &intruder).await;

    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.body, missing.body);
    assert!(foreign.refreshed_token().is_none());
}

#[tokio::test]
async fn foreign_mutations_leave_the_record_untouched() {
    let app = TestApp::seeded().await;
    let (owner, intruder) = two_users(&app).await;

    let created = app
        .post("/api/auths", &owner, json!({ "text": "original" }))
        .await;
    let uri = format!("/api/auths/{}", created.body["id"].as_i64().unwrap());

    let patch = app
        .send(Method::PATCH, &uri, Some(&intruder), Some(json!({ "text": "pwned" })))
        .await;
    assert_eq!(patch.status, StatusCode::NOT_FOUND);

    let put = app
        .send(Method::PUT, &uri, Some(&intruder), Some(json!({ "text": "pwned" })))
        .await;
    assert_eq!(put.status, StatusCode::NOT_FOUND);

    let delete = app.delete(&uri, &intruder).await;
    assert_eq!(delete.status, StatusCode::NOT_FOUND);

    let still_there = app.get(&uri, &owner).await;
    assert_eq!(still_there.status, StatusCode::OK);
    assert_eq!(still_there.body["text"], "original");
}

#[tokio::test]
async fn owner_can_patch_replace_and_delete() {
    let app = TestApp::seeded().await;
    let (owner, _) = two_users(&app).await;

    let created = app.post("/api/auths", &owner, json!({ "text": "v1" })).await;
    let uri = format!("/api/auths/{}", created.body["id"].as_i64().unwrap());

    // An empty patch keeps the stored text.
    let untouched = app
        .send(Method::PATCH, &uri, Some(&owner), Some(json!({})))
        .await;
    assert_eq!(untouched.status, StatusCode::OK);
    assert_eq!(untouched.body["text"], "v1");

    let patched = app
        .send(Method::PATCH, &uri, Some(&owner), Some(json!({ "text": "v2" })))
        .await;
    assert_eq!(patched.body["text"], "v2");

    let replaced = app
        .send(Method::PUT, &uri, Some(&owner), Some(json!({ "text": "v3" })))
        .await;
    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(replaced.body["text"], "v3");

    let deleted = app.delete(&uri, &owner).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.get(&uri, &owner).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_is_owner_scoped_and_paginated() {
    let app = TestApp::seeded().await;
    let (owner, intruder) = two_users(&app).await;

    for i in 0..5 {
        app.post("/api/auths", &owner, json!({ "text": format!("note {}", i) }))
            .await;
    }
    app.post("/api/auths", &intruder, json!({ "text": "theirs" }))
        .await;

    let all = app.get("/api/auths", &owner).await;
    assert_eq!(all.status, StatusCode::OK);
    let texts: Vec<&str> = all
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["note 0", "note 1", "note 2", "note 3", "note 4"]);

    let page = app.get("/api/auths?skip=1&take=2", &owner).await;
    let texts: Vec<&str> = page
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["note 1", "note 2"]);

    let theirs = app.get("/api/auths", &intruder).await;
    assert_eq!(theirs.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_pagination_and_ids_are_rejected() {
    let app = TestApp::seeded().await;
    let (owner, _) = two_users(&app).await;

    let negative = app.get("/api/auths?skip=-1", &owner).await;
    assert_eq!(negative.status, StatusCode::UNPROCESSABLE_ENTITY);

    let not_a_number = app.get("/api/auths/abc", &owner).await;
    assert_eq!(not_a_number.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_user_removes_their_records() {
    let app = TestApp::seeded().await;
    app.create_admin("root@example.com").await;
    let owner = app.create_user("owner@example.com", &[]).await;
    let admin_token = app.login("root@example.com").await;
    let owner_token = app.login("owner@example.com").await;

    let created = app
        .post("/api/auths", &owner_token, json!({ "text": "doomed" }))
        .await;
    let record_id = created.body["id"].as_i64().unwrap();

    let deleted = app
        .delete(&format!("/api/user/{}", owner.id()), &admin_token)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    use access_service::services::AuthRecordStore;
    assert!(app
        .store
        .find_auth_record(record_id)
        .await
        .unwrap()
        .is_none());
}
