//! Steam catalog and store clients against a mock HTTP server

use playlog_sync::services::{
    CatalogSource, DetailSource, RateLimiter, SteamCatalogClient, StoreDetailClient,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn catalog_client(server: &MockServer) -> SteamCatalogClient {
    SteamCatalogClient::new(
        format!("{}/owned", server.uri()),
        format!("{}/players", server.uri()),
        TIMEOUT,
    )
    .unwrap()
}

fn detail_client(server: &MockServer) -> StoreDetailClient {
    StoreDetailClient::new(
        format!("{}/appdetails", server.uri()),
        Arc::new(RateLimiter::new(Duration::from_millis(1))),
        TIMEOUT,
    )
    .unwrap()
}

#[tokio::test]
async fn test_owned_items_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owned"))
        .and(query_param("key", "KEY"))
        .and(query_param("steamid", "7656"))
        .and(query_param("include_appinfo", "true"))
        .and(query_param("include_played_free_games", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "game_count": 2,
                "games": [
                    { "appid": 570, "name": "Dota 2", "playtime_forever": 90, "img_icon_url": "abc" },
                    { "appid": 620, "name": "Portal 2", "playtime_forever": 0 }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let records = catalog_client(&server).fetch_owned_items("7656", "KEY").await;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["appid"], 570);
    assert_eq!(records[0]["img_icon_url"], "abc");
    assert_eq!(records[1]["name"], "Portal 2");
}

#[tokio::test]
async fn test_private_profile_yields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owned"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": {} })))
        .mount(&server)
        .await;

    assert!(catalog_client(&server).fetch_owned_items("7656", "KEY").await.is_empty());
}

#[tokio::test]
async fn test_catalog_http_error_yields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owned"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert!(catalog_client(&server).fetch_owned_items("7656", "BAD").await.is_empty());
}

#[tokio::test]
async fn test_catalog_malformed_body_yields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owned"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    assert!(catalog_client(&server).fetch_owned_items("7656", "KEY").await.is_empty());
}

#[tokio::test]
async fn test_catalog_timeout_yields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owned"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": { "games": [] } }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = SteamCatalogClient::new(
        format!("{}/owned", server.uri()),
        format!("{}/players", server.uri()),
        Duration::from_millis(50),
    )
    .unwrap();

    assert!(client.fetch_owned_items("7656", "KEY").await.is_empty());
}

#[tokio::test]
async fn test_blank_credentials_make_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = catalog_client(&server);
    assert!(client.fetch_owned_items("", "KEY").await.is_empty());
    assert!(client.fetch_owned_items("7656", "  ").await.is_empty());
}

#[tokio::test]
async fn test_detail_data_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appdetails"))
        .and(query_param("appids", "570"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "570": {
                "success": true,
                "data": { "type": "game", "is_free": true, "header_image": "h.jpg" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let detail = detail_client(&server).fetch_detail("570").await;

    assert_eq!(detail.len(), 3);
    assert_eq!(detail["is_free"], true);
}

#[tokio::test]
async fn test_detail_without_data_yields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appdetails"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "999": { "success": false } })),
        )
        .mount(&server)
        .await;

    assert!(detail_client(&server).fetch_detail("999").await.is_empty());
}

#[tokio::test]
async fn test_detail_failures_yield_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appdetails"))
        .and(query_param("appids", "1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appdetails"))
        .and(query_param("appids", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appdetails"))
        .and(query_param("appids", "3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "3": { "data": [1, 2, 3] } })),
        )
        .mount(&server)
        .await;

    let client = detail_client(&server);
    assert!(client.fetch_detail("1").await.is_empty());
    assert!(client.fetch_detail("2").await.is_empty());
    assert!(client.fetch_detail("3").await.is_empty());
}

const SPACING: Duration = Duration::from_millis(200);

async fn mount_detail(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/appdetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "570": { "success": true, "data": { "type": "game" } }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_detail_requests_are_spaced_by_limiter() {
    let server = MockServer::start().await;
    mount_detail(&server).await;
    let client = StoreDetailClient::new(
        format!("{}/appdetails", server.uri()),
        Arc::new(RateLimiter::new(SPACING)),
        TIMEOUT,
    )
    .unwrap();

    let started = Instant::now();
    for _ in 0..3 {
        assert!(!client.fetch_detail("570").await.is_empty());
    }

    // The first call goes out at once, the next two each wait one interval
    assert!(started.elapsed() >= SPACING * 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_clients_sharing_a_limiter_share_its_budget() {
    let server = MockServer::start().await;
    mount_detail(&server).await;
    let limiter = Arc::new(RateLimiter::new(SPACING));
    let url = format!("{}/appdetails", server.uri());
    let first = StoreDetailClient::new(url.clone(), limiter.clone(), TIMEOUT).unwrap();
    let second = StoreDetailClient::new(url, limiter, TIMEOUT).unwrap();

    let started = Instant::now();
    tokio::join!(
        async {
            first.fetch_detail("570").await;
            first.fetch_detail("570").await;
        },
        async {
            second.fetch_detail("570").await;
            second.fetch_detail("570").await;
        },
    );

    assert!(started.elapsed() >= SPACING * 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_player_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/players"))
        .and(query_param("steamids", "7656"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "players": [{ "steamid": "7656", "personaname": "gordon" }] }
        })))
        .mount(&server)
        .await;

    let client = catalog_client(&server);
    assert_eq!(
        client.fetch_player_name("7656", "KEY").await.unwrap().as_deref(),
        Some("gordon")
    );
}

#[tokio::test]
async fn test_player_name_reports_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/players"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(catalog_client(&server).fetch_player_name("7656", "BAD").await.is_err());
}
