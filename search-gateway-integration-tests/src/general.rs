//! Tests for behavior that isn't specific to one route.

use anyhow::Result;
use pretty_assertions::assert_eq;
use reqwest::{header::ACCESS_CONTROL_ALLOW_ORIGIN, StatusCode};
use serde_json::{json, Value};

use crate::{gateway_test, TestingTools};

#[actix_rt::test]
async fn root_reports_the_service_is_running() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/").send().await?;

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({ "message": "Search gateway is running" }));
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn unmatched_paths_are_json_404s() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/v1/search/news.json").send().await?;

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({ "detail": "Not Found" }));
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn configured_origins_are_allowed() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/health")
                .header("Origin", "https://chatgpt.com")
                .send()
                .await?;

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response
                    .headers()
                    .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                    .and_then(|value| value.to_str().ok()),
                Some("https://chatgpt.com")
            );
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn other_origins_are_not_allowed() -> Result<()> {
    gateway_test(
        |settings| settings.cors.allowed_origins = vec!["https://chat.openai.com".to_string()],
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/health")
                .header("Origin", "https://example.com")
                .send()
                .await?;

            assert!(response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none());
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn plugin_manifest_is_served_from_the_well_known_dir() -> Result<()> {
    let manifest = json!({
        "schema_version": "v1",
        "name_for_model": "naver_search",
        "api": { "type": "openapi", "url": "https://gateway.example.com/openapi.json" },
    });
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("ai-plugin.json"), manifest.to_string())?;
    let well_known_dir = dir.path().to_path_buf();

    gateway_test(
        |settings| settings.http.well_known_dir = Some(well_known_dir),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/.well-known/ai-plugin.json").send().await?;

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await?;
            assert_eq!(body, manifest);
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn well_known_is_not_found_without_the_dir() -> Result<()> {
    gateway_test(
        |settings| {
            settings.http.well_known_dir = Some("definitely/not/a/real/dir".into());
        },
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/.well-known/ai-plugin.json").send().await?;

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({ "detail": "Not Found" }));
            Ok(())
        },
    )
    .await
}
