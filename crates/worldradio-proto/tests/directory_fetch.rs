//! Directory client against a mock radio-browser endpoint.

use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use worldradio_proto::config::Config;
use worldradio_proto::directory::{DirectoryClient, DirectoryError};

const STATIONS: &str = r#"[
    {"stationuuid":"a1","name":"Radio Paradise","country":"United States","tags":"eclectic,rock","language":"english","bitrate":320,"url_resolved":"http://stream.example/rp"},
    {"stationuuid":"b2","name":"FIP","country":"France","tags":"jazz,world","language":"french","bitrate":"128","url_resolved":"http://stream.example/fip"},
    {"stationuuid":"c3","name":"Broken","url_resolved":""}
]"#;

const STATIONS_PATH: &str = "/json/stations";

fn config_for(server: &MockServer, cache: &TempDir, interval_ms: u64) -> Config {
    let mut config = Config::default();
    config.directory.base_url = format!("{}{}", server.uri(), STATIONS_PATH);
    config.directory.request_interval_ms = interval_ms;
    config.directory.timeout_secs = 5;
    config.cache.dir = cache.path().to_path_buf();
    config.cache.ttl_secs = 3600;
    config
}

fn body(raw: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/json")
        .set_body_string(raw)
}

#[tokio::test]
async fn fetch_sends_query_and_user_agent_then_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATIONS_PATH))
        .and(query_param("limit", "200"))
        .and(query_param("order", "clickcount"))
        .and(query_param("reverse", "true"))
        .and(header_regex("user-agent", "^worldradio/"))
        .respond_with(body(STATIONS))
        // the second fetch must be served from disk
        .expect(1)
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let client = DirectoryClient::new(&config_for(&server, &cache, 0)).unwrap();
    let query = client.popular();

    let first = client.fetch(&query).await;
    assert_eq!(first.len(), 3);
    assert_eq!(first[1].bitrate, 128);

    let second = client.fetch(&query).await;
    assert_eq!(second, first);
    assert!(client.cache().entry_path(&query.cache_key()).exists());
    server.verify().await;
}

#[tokio::test]
async fn fetch_playable_drops_incomplete_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATIONS_PATH))
        .and(query_param("tag", "jazz"))
        .respond_with(body(STATIONS))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let client = DirectoryClient::new(&config_for(&server, &cache, 0)).unwrap();

    let stations = client.fetch_playable(&client.by_tag("jazz")).await;
    let ids: Vec<&str> = stations.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "b2"]);
}

#[tokio::test]
async fn record_with_null_fields_does_not_sink_the_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(body(
            r#"[
                {"stationuuid":"s1","name":"Good FM","url_resolved":"http://a/1","country":"France"},
                {"stationuuid":"s2","name":"Null FM","url_resolved":"http://a/2","country":null,"tags":null}
            ]"#,
        ))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let client = DirectoryClient::new(&config_for(&server, &cache, 0)).unwrap();

    let stations = client.fetch_playable(&client.popular()).await;
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].country, "France");
    assert_eq!(stations[1].country, "");
    assert_eq!(stations[1].tags, "");
}

#[tokio::test]
async fn http_error_status_is_reported_and_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("name", "fip"))
        .respond_with(ResponseTemplate::new(503).set_body_string(r#"{"error":"busy"}"#))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let client = DirectoryClient::new(&config_for(&server, &cache, 0)).unwrap();
    let query = client.by_name("fip");

    match client.try_fetch(&query).await {
        Err(DirectoryError::Status(code)) => assert_eq!(code.as_u16(), 503),
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(client.fetch(&query).await.is_empty());
    assert!(!client.cache().entry_path(&query.cache_key()).exists());
}

#[tokio::test]
async fn non_array_body_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("country", "Germany"))
        .respond_with(body(r#"{"stations":[]}"#))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let client = DirectoryClient::new(&config_for(&server, &cache, 0)).unwrap();
    let query = client.by_country("Germany");

    assert!(matches!(
        client.try_fetch(&query).await,
        Err(DirectoryError::NotAnArray)
    ));
    assert!(client.fetch(&query).await.is_empty());
}

#[tokio::test]
async fn requests_are_spaced_by_the_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(body("[]"))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let client = DirectoryClient::new(&config_for(&server, &cache, 200)).unwrap();

    let start = Instant::now();
    client.fetch(&client.by_name("one")).await;
    client.fetch(&client.by_name("two")).await;
    assert!(start.elapsed() >= Duration::from_millis(200));

    let requests = server.received_requests().await.unwrap();
    let names: Vec<String> = requests
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "name")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert_eq!(names, vec!["one", "two"]);
}
