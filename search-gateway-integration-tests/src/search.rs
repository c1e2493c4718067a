//! Tests for the search routes, from the caller's side through to the
//! mock upstream.

use anyhow::Result;
use httpmock::Method::GET;
use parameterized::parameterized;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::{gateway_test, TestingTools};

/// A response in the shape the upstream news search returns.
const NEWS_BODY: &str = r#"{"lastBuildDate":"Tue, 01 Oct 2024 09:00:00 +0900","total":1,"start":1,"display":10,"items":[{"title":"<b>AI</b> news","originallink":"https://news.example.com/1","link":"https://n.news.example.com/1","description":"Something about <b>AI</b>","pubDate":"Tue, 01 Oct 2024 08:00:00 +0900"}]}"#;

#[actix_rt::test]
async fn news_search_is_forwarded_with_defaults() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let mock = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/v1/search/news.json")
                        .query_param("query", "AI")
                        .query_param("display", "10")
                        .query_param("start", "1")
                        .query_param("sort", "sim")
                        .header("x-naver-client-id", "test-client-id")
                        .header("x-naver-client-secret", "test-client-secret");
                    then.status(200)
                        .header("content-type", "application/json")
                        .body(NEWS_BODY);
                })
                .await;

            let response = test_client.get("/search/news?query=AI").send().await?;

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response
                    .headers()
                    .get("content-type")
                    .and_then(|value| value.to_str().ok()),
                Some("application/json")
            );
            assert_eq!(response.text().await?, NEWS_BODY);
            mock.assert_async().await;
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn explicit_parameters_replace_defaults() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let mock = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/v1/search/blog.json")
                        .query_param("query", "rust")
                        .query_param("display", "100")
                        .query_param("start", "1000")
                        .query_param("sort", "date");
                    then.status(200).body(r#"{"items":[]}"#);
                })
                .await;

            let response = test_client
                .get("/search/blog?query=rust&display=100&start=1000&sort=date&unknown=ignored")
                .send()
                .await?;

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({ "items": [] }));
            mock.assert_async().await;
            Ok(())
        },
    )
    .await
}

#[parameterized(endpoint = { "news", "blog", "image", "shop", "kin", "local" })]
fn every_endpoint_requires_a_query(endpoint: &str) {
    use pretty_assertions::assert_eq;
    actix_rt::System::new().block_on(gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let catch_all = upstream_mock
                .mock_async(|when, then| {
                    when.any_request();
                    then.status(200).body("{}");
                })
                .await;

            let response = test_client
                .get(&format!("/search/{}?display=1", endpoint))
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = response.json().await.expect("error body is JSON");
            assert_eq!(
                body,
                json!({ "detail": "Missing required parameter `query`" })
            );
            assert_eq!(catch_all.hits_async().await, 0);
        },
    ))
}

#[parameterized(
    path = {
        "/search/local?query=cafe&display=10",
        "/search/news?query=AI&display=0",
        "/search/image?query=cat&start=1001",
        "/search/local?query=cafe&start=2",
    },
    expected = {
        "Parameter `display` must be between 1 and 5",
        "Parameter `display` must be between 1 and 100",
        "Parameter `start` must be between 1 and 1000",
        "Parameter `start` must be between 1 and 1",
    }
)]
fn out_of_range_integers_are_rejected(path: &str, expected: &str) {
    use pretty_assertions::assert_eq;
    actix_rt::System::new().block_on(gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let catch_all = upstream_mock
                .mock_async(|when, then| {
                    when.any_request();
                    then.status(200).body("{}");
                })
                .await;

            let response = test_client
                .get(path)
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = response.json().await.expect("error body is JSON");
            assert_eq!(body, json!({ "detail": expected }));
            assert_eq!(catch_all.hits_async().await, 0);
        },
    ))
}

#[actix_rt::test]
async fn non_integer_values_are_rejected() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/search/kin?query=rust&display=ten")
                .send()
                .await?;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = response.json().await?;
            assert_eq!(
                body,
                json!({ "detail": "Parameter `display` must be an integer" })
            );
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn enumerated_values_are_rejected_with_the_allowed_list() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/search/image?query=cat&filter=huge")
                .send()
                .await?;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = response.json().await?;
            assert_eq!(
                body,
                json!({ "detail": "Parameter `filter` must be one of: all, large, medium, small" })
            );
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn shop_filters_are_passed_through() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let mock = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/v1/search/shop.json")
                        .query_param("query", "shoes")
                        .query_param("filter", "naverpay")
                        .query_param("exclude", "used:rental");
                    then.status(200).body(r#"{"total":0,"items":[]}"#);
                })
                .await;

            let response = test_client
                .get("/search/shop?query=shoes&filter=naverpay&exclude=used:rental")
                .send()
                .await?;

            assert_eq!(response.status(), StatusCode::OK);
            mock.assert_async().await;
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn unknown_endpoints_are_not_found() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/search/webkr?query=rust").send().await?;

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body: Value = response.json().await?;
            assert_eq!(body, json!({ "detail": "Unknown search endpoint `webkr`" }));
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn upstream_errors_are_server_errors() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/v1/search/news.json");
                    then.status(403).body(
                        r#"{"errorMessage":"Scope Status Invalid : Authentication failed.","errorCode":"024"}"#,
                    );
                })
                .await;

            let response = test_client.get("/search/news?query=AI").send().await?;

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = response.json().await?;
            let detail = body["detail"].as_str().expect("detail is a string");
            assert!(detail.contains("403"), "detail was {:?}", detail);
            assert!(detail.contains("Scope Status Invalid"), "detail was {:?}", detail);
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn unreachable_upstream_is_a_generic_server_error() -> Result<()> {
    gateway_test(
        // Port 9 (discard) is not expected to be listening.
        |settings| settings.upstream.base_url = "http://127.0.0.1:9".to_string(),
        |TestingTools { test_client, .. }| async move {
            let response = test_client.get("/search/local?query=cafe").send().await?;

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = response.json().await?;
            assert_eq!(
                body,
                json!({ "detail": "Could not reach the upstream search API" })
            );
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn searches_are_counted_by_outcome() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             mut metrics_watcher,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/v1/search/news.json");
                    then.status(200).body(NEWS_BODY);
                })
                .await;

            test_client.get("/search/news?query=AI").send().await?;
            test_client.get("/search/local?query=cafe&display=9").send().await?;

            assert!(
                metrics_watcher.has_incr(
                    "search.request",
                    &[("endpoint", "news"), ("outcome", "success")]
                ),
                "metrics were {:?}",
                metrics_watcher.all_lines()
            );
            assert!(
                metrics_watcher.has_incr(
                    "search.request",
                    &[("endpoint", "local"), ("outcome", "invalid")]
                ),
                "metrics were {:?}",
                metrics_watcher.all_lines()
            );
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn search_requests_are_timed_by_route() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             mut metrics_watcher,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/v1/search/blog.json");
                    then.status(200).body(r#"{"items":[]}"#);
                })
                .await;

            let response = test_client.get("/search/blog?query=rust").send().await?;
            assert_eq!(response.status(), StatusCode::OK);

            assert!(
                metrics_watcher.has(|line| line.starts_with("request.duration:")
                    && line.contains("|ms")
                    && line.contains("path:/search/{endpoint}")
                    && line.contains("status:200")),
                "metrics were {:?}",
                metrics_watcher.all_lines()
            );
            Ok(())
        },
    )
    .await
}

#[actix_rt::test]
async fn undecodable_values_are_validated_like_any_other() -> Result<()> {
    gateway_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/search/news?query=ai&display=%FF")
                .send()
                .await?;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = response.json().await?;
            assert_eq!(
                body,
                json!({ "detail": "Parameter `display` must be an integer" })
            );
            Ok(())
        },
    )
    .await
}
