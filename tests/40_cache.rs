mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{id_of, TestServer};
use linkmetur_api::types::{RoleLevel, TenantId};

#[tokio::test]
async fn reads_reflect_updates_and_deletes() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    let created: Value = server
        .post("/contacts", &token)
        .json(&json!({ "name": "Ana" }))
        .send()
        .await?
        .json()
        .await?;
    let path = format!("/contacts/{}", id_of(&created));

    // Populate both the list and the item cache
    let listed: Value = server.get("/contacts", &token).send().await?.json().await?;
    assert_eq!(listed["data"][0]["name"], "Ana");
    let item: Value = server.get(&path, &token).send().await?.json().await?;
    assert_eq!(item["data"]["name"], "Ana");

    let res = server
        .put(&path, &token)
        .json(&json!({ "name": "Ana Maria" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let item: Value = server.get(&path, &token).send().await?.json().await?;
    assert_eq!(item["data"]["name"], "Ana Maria");
    let listed: Value = server.get("/contacts", &token).send().await?.json().await?;
    assert_eq!(listed["data"][0]["name"], "Ana Maria");

    let res = server.delete(&path, &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get(&path, &token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let listed: Value = server.get("/contacts", &token).send().await?.json().await?;
    assert_eq!(listed["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn favorite_toggle_invalidates_filtered_lists() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    let created: Value = server
        .post("/contacts", &token)
        .json(&json!({ "name": "Pedro" }))
        .send()
        .await?
        .json()
        .await?;

    let favorites: Value = server.get("/contacts?favorite=true", &token).send().await?.json().await?;
    assert_eq!(favorites["data"], json!([]));

    server
        .post(&format!("/contacts/{}/favorite", id_of(&created)), &token)
        .send()
        .await?;

    let favorites: Value = server.get("/contacts?favorite=true", &token).send().await?.json().await?;
    assert_eq!(favorites["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn cached_reads_stay_tenant_scoped() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant_a = server.token(TenantId::new_v4(), RoleLevel::MEMBER);
    let tenant_b = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    server
        .post("/contacts", &tenant_a)
        .json(&json!({ "name": "Only in A" }))
        .send()
        .await?;

    // Same path and query, different tenant: must not hit A's cache entry
    let a: Value = server.get("/contacts?search=only", &tenant_a).send().await?.json().await?;
    let b: Value = server.get("/contacts?search=only", &tenant_b).send().await?.json().await?;
    assert_eq!(a["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(b["data"], json!([]));
    Ok(())
}
