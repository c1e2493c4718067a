//! Tests for the liveness endpoints, including the ones required by
//! [Dockerflow](https://github.com/mozilla-services/dockerflow).

use anyhow::Result;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{gateway_test, TestingTools};

#[actix_rt::test]
async fn health_works() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let catch_all = upstream_mock
                .mock_async(|when, then| {
                    when.any_request();
                    then.status(500);
                })
                .await;

            let response = test_client.get("/health").send().await?;

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({ "status": "healthy" }));
            assert_eq!(catch_all.hits_async().await, 0);
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn lbheartbeat_works() {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/__lbheartbeat__")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.content_length(), Some(0));
        },
    )
    .await
}

#[actix_rt::test]
async fn heartbeat_works() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/__heartbeat__").send().await?;

            assert!(response.status().is_success());
            assert_eq!(
                response
                    .headers()
                    .get_all("content-type")
                    .iter()
                    .collect::<Vec<_>>(),
                vec!["application/json"]
            );
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn version_works() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/__version__").send().await?;

            assert!(response.status().is_success());
            assert_eq!(
                response
                    .headers()
                    .get_all("content-type")
                    .iter()
                    .collect::<Vec<_>>(),
                vec!["application/json"]
            );

            #[derive(Deserialize, Debug)]
            #[allow(dead_code)]
            struct VersionInfo {
                source: String,
                version: String,
                commit: String,
                build: String,
            }
            let body: Result<VersionInfo, _> = response.json().await;
            assert!(body.is_ok());
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn error_works() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/__error__").send().await?;

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({ "detail": "Internal error" }));
            Ok(())
        },
    )
    .await
}
