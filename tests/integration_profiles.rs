//! Profile lifecycle integration tests
//!
//! Tests profile management and publishing including:
//! - Publishing and the public lookup it enables
//! - Concurrent publishes of the same profile
//! - Visibility of unpublished profiles
//! - QR asset cleanup

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

/// Test 1: Publish makes the profile reachable by slug
#[tokio::test]
async fn test_publish_then_resolve() {
    let app = spawn_app().await;
    let token = app.admin_token("alice@example.com").await;

    let profile = app
        .create_profile(
            &token,
            json!({
                "name": "Alice",
                "description": "Hello there",
                "links": [{"title": "Blog", "url": "https://alice.example.com"}]
            }),
        )
        .await;
    let id = profile["id"].as_i64().unwrap();

    let response = app.publish(&token, id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let published: Value = response.json().await.unwrap();
    let slug = published["slug"].as_str().unwrap();

    assert_eq!(published["state"], "published");
    assert!(slug.starts_with("vd"));
    assert_eq!(slug.len(), 12);
    assert_eq!(published["public_url"], app.url(&format!("/{}", slug)));
    assert_eq!(app.qr_files(), vec![format!("{}-{}.svg", id, slug)]);

    let response = app
        .client
        .get(app.url(&format!("/api/public/{}", slug)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["cache-control"],
        "public, s-maxage=60, stale-while-revalidate=300"
    );

    let public: Value = response.json().await.unwrap();
    assert_eq!(public["name"], "Alice");
    assert_eq!(public["links"][0]["title"], "Blog");
    assert!(public.get("owner_id").is_none());
    assert!(public.get("id").is_none());

    let qr_url = published["qr_url"].as_str().unwrap();
    let response = app.client.get(qr_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("<svg"));
}

/// Test 2: Of two concurrent publishes exactly one wins
#[tokio::test]
async fn test_concurrent_publish() {
    let app = spawn_app().await;
    let token = app.admin_token("bob@example.com").await;
    let profile = app.create_profile(&token, json!({"name": "Bob"})).await;
    let id = profile["id"].as_i64().unwrap();

    let (first, second) = tokio::join!(app.publish(&token, id), app.publish(&token, id));
    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();

    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    // Only the winner's QR code survives
    let response = app
        .client
        .get(app.url(&format!("/api/profiles/{}", id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let stored: Value = response.json().await.unwrap();
    let slug = stored["slug"].as_str().unwrap();
    assert_eq!(app.qr_files(), vec![format!("{}-{}.svg", id, slug)]);
}

/// Test 3: Publishing twice is a conflict and keeps the first slug
#[tokio::test]
async fn test_publish_is_one_way() {
    let app = spawn_app().await;
    let token = app.admin_token("carol@example.com").await;
    let profile = app.create_profile(&token, json!({"name": "Carol"})).await;
    let id = profile["id"].as_i64().unwrap();

    let published: Value = app.publish(&token, id).await.json().await.unwrap();
    assert_eq!(app.publish(&token, id).await.status(), StatusCode::CONFLICT);

    // State can no longer change, content still can
    let response = app
        .client
        .put(app.url(&format!("/api/profiles/{}", id)))
        .bearer_auth(&token)
        .json(&json!({"state": "inactive"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .client
        .put(app.url(&format!("/api/profiles/{}", id)))
        .bearer_auth(&token)
        .json(&json!({"description": "Updated"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["state"], "published");
    assert_eq!(updated["slug"], published["slug"]);

    let public: Value = app
        .client
        .get(app.url(&format!("/api/public/{}", published["slug"].as_str().unwrap())))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public["description"], "Updated");
}

/// Test 4: Unpublished profiles are never publicly visible
#[tokio::test]
async fn test_unpublished_profiles_not_resolvable() {
    let app = spawn_app().await;
    let token = app.admin_token("dave@example.com").await;

    for state in ["draft", "active", "inactive"] {
        let profile = app
            .create_profile(&token, json!({"name": "Dave", "state": state}))
            .await;
        assert_eq!(profile["state"], state);
        assert!(profile["slug"].is_null());
    }

    for slug in ["vd0000000000", "xx0000000000", "vd", "VD0000000000"] {
        let response = app
            .client
            .get(app.url(&format!("/api/public/{}", slug)))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "slug {}", slug);
    }
}

/// Test 5: Creating a profile as published is rejected
#[tokio::test]
async fn test_create_published_rejected() {
    let app = spawn_app().await;
    let token = app.admin_token("erin@example.com").await;

    let response = app
        .client
        .post(app.url("/api/profiles"))
        .bearer_auth(&token)
        .json(&json!({"name": "Erin", "state": "published"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test 6: Deleting a published profile removes its page and QR code
#[tokio::test]
async fn test_delete_published_profile() {
    let app = spawn_app().await;
    let token = app.admin_token("frank@example.com").await;
    let profile = app.create_profile(&token, json!({"name": "Frank"})).await;
    let id = profile["id"].as_i64().unwrap();

    let published: Value = app.publish(&token, id).await.json().await.unwrap();
    let slug = published["slug"].as_str().unwrap().to_string();
    assert_eq!(app.qr_files().len(), 1);

    let response = app
        .client
        .delete(app.url(&format!("/api/profiles/{}", id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.qr_files().is_empty());

    let response = app
        .client
        .get(app.url(&format!("/api/public/{}", slug)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test 7: Profiles are scoped to their owner
#[tokio::test]
async fn test_profiles_scoped_to_owner() {
    let app = spawn_app().await;
    let owner = app.admin_token("grace@example.com").await;
    let other = app.admin_token("heidi@example.com").await;

    let profile = app.create_profile(&owner, json!({"name": "Grace"})).await;
    let id = profile["id"].as_i64().unwrap();

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/profiles"))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());

    let response = app
        .client
        .delete(app.url(&format!("/api/profiles/{}", id)))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(app.publish(&other, id).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.publish(&owner, 9999).await.status(), StatusCode::NOT_FOUND);
}

/// Test 8: A null field in an update clears the stored value
#[tokio::test]
async fn test_update_null_clears_field() {
    let app = spawn_app().await;
    let token = app.admin_token("ivan@example.com").await;
    let profile = app
        .create_profile(
            &token,
            json!({"name": "Ivan", "description": "Bakery", "email": "ivan@example.com"}),
        )
        .await;
    let id = profile["id"].as_i64().unwrap();

    let response = app
        .client
        .put(app.url(&format!("/api/profiles/{}", id)))
        .bearer_auth(&token)
        .json(&json!({"description": null}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated: Value = response.json().await.unwrap();
    assert!(updated["description"].is_null());
    assert_eq!(updated["email"], "ivan@example.com");
}
