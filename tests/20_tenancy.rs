mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{id_of, TestServer};
use linkmetur_api::types::{RoleLevel, TenantId};

#[tokio::test]
async fn tenants_only_see_their_own_contacts() -> Result<()> {
    let server = TestServer::spawn().await?;
    let tenant_a = server.token(TenantId::new_v4(), RoleLevel::MEMBER);
    let tenant_b = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    let res = server
        .post("/contacts", &tenant_a)
        .json(&json!({ "name": "Ana Souza", "email": "ana@lagoon.example" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await?;
    let id = id_of(&created);

    let listed_a: Value = server.get("/contacts", &tenant_a).send().await?.json().await?;
    assert_eq!(listed_a["data"].as_array().map(Vec::len), Some(1));

    let listed_b: Value = server.get("/contacts", &tenant_b).send().await?.json().await?;
    assert_eq!(listed_b["data"], json!([]));

    // Direct access by id is indistinguishable from a missing record
    let res = server.get(&format!("/contacts/{}", id), &tenant_b).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server
        .put(&format!("/contacts/{}", id), &tenant_b)
        .json(&json!({ "name": "Hijacked" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.delete(&format!("/contacts/{}", id), &tenant_b).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let still: Value = server
        .get(&format!("/contacts/{}", id), &tenant_a)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(still["data"]["name"], "Ana Souza");
    Ok(())
}

#[tokio::test]
async fn body_corp_id_cannot_redirect_a_write() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (mine, theirs) = (TenantId::new_v4(), TenantId::new_v4());
    let token = server.token(mine, RoleLevel::MEMBER);
    let their_token = server.token(theirs, RoleLevel::MEMBER);

    let res = server
        .post("/contacts", &token)
        .json(&json!({ "name": "Smuggled", "corp_id": theirs }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["corp_id"], json!(mine));

    let theirs_listed: Value = server.get("/contacts", &their_token).send().await?.json().await?;
    assert_eq!(theirs_listed["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn favorite_toggle_flips_once_per_call() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    let created: Value = server
        .post("/contacts", &token)
        .json(&json!({ "name": "Pedro" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(created["data"]["favorited_contact"], false);
    let path = format!("/contacts/{}/favorite", id_of(&created));

    let first: Value = server.post(&path, &token).send().await?.json().await?;
    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["favorited"], true);
    assert_eq!(first["data"]["favorited_contact"], true);

    let second: Value = server.post(&path, &token).send().await?.json().await?;
    assert_eq!(second["data"]["favorited"], false);
    assert_eq!(second["data"]["favorited_contact"], false);

    let after: Value = server
        .get(&format!("/contacts/{}", id_of(&created)), &token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(after["data"]["favorited_contact"], false);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_in_tenant_conflicts() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let res = server
            .post("/contacts", &token)
            .json(&json!({ "name": "Ana", "email": "ana@lagoon.example" }))
            .send()
            .await?;
        assert_eq!(res.status(), expected);
    }
    Ok(())
}
