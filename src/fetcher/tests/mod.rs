use super::*;
use crate::config::FetchConfig;
use crate::extraction::SchemaOrgExtractor;
use crate::types::RecordStatus;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECIPE_PAGE: &str = r#"<html><head>
<script type="application/ld+json">{
    "@context": "https://schema.org",
    "@type": "Recipe",
    "name": "Flatbread",
    "recipeIngredient": ["2 cups flour", "1 cup water"],
    "recipeInstructions": "Knead\n\nBake",
    "totalTime": "PT30M",
    "recipeYield": ["2"],
    "image": "https://bread.example/flat.jpg",
    "nutrition": {"calories": "300 kcal"}
}</script></head><body></body></html>"#;

async fn create_context(timeout: Duration) -> (FetchContext, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = Database::new(&temp_dir.path().join("records.db")).await.unwrap();
    let config = FetchConfig {
        timeout,
        ..FetchConfig::default()
    };
    let ctx = FetchContext {
        client: build_client(&config).unwrap(),
        db: Arc::new(db),
        service: Arc::new(SchemaOrgExtractor::with_version("so-test")),
        failures: Arc::new(FailureIndex::new()),
        counts: Arc::new(Counts::new()),
        collection: "recipes".to_string(),
        timeout,
    };
    (ctx, temp_dir)
}

async fn serve_recipe(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(RECIPE_PAGE))
        .mount(server)
        .await;
}

/// Serve raw HTTP on a local port, handing every connection to `handler`
async fn raw_server<F, Fut>(handler: F) -> String
where
    F: Fn(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handler(stream));
        }
    });
    format!("http://{}", addr)
}

/// Consume the request head
async fn read_request(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buf[..n]);
    }
}

fn response_head(content_length: usize) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        content_length
    )
}

#[tokio::test]
async fn test_process_url_stores_extracted_record() {
    let server = MockServer::start().await;
    serve_recipe(&server, "/flatbread").await;
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    let url = format!("{}/flatbread", server.uri());

    let record = process_url(&url, &ctx, None).await.unwrap();

    assert_eq!(record.status, RecordStatus::Complete, "{record:?}");
    assert_eq!(record.fields.title, "Flatbread");
    assert_eq!(record.fields.instructions, "Knead\nBake");
    assert_eq!(record.fields.yields, "2 servings");

    let stored = ctx.db.get_record(&url).await.unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(ctx.db.collection_urls("recipes").await.unwrap(), vec![url]);

    let counts = ctx.counts.snapshot();
    assert_eq!(counts.reached, 1);
    assert_eq!(counts.parsed_successfully, 1);
    assert!(ctx.failures.is_empty());
}

#[tokio::test]
async fn test_http_error_marks_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    let url = format!("{}/gone", server.uri());

    let record = process_url(&url, &ctx, None).await.unwrap();

    assert_eq!(record.status, RecordStatus::Unreachable);
    assert_eq!(record.fields, crate::types::RecordFields::default());
    assert_eq!(ctx.counts.snapshot().reached, 0);
    assert!(ctx.failures.is_empty());
}

#[tokio::test]
async fn test_slow_site_times_out_as_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(RECIPE_PAGE)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let (ctx, _temp_dir) = create_context(Duration::from_millis(200)).await;
    let url = format!("{}/slow", server.uri());

    let record = process_url(&url, &ctx, None).await.unwrap();

    assert_eq!(record.status, RecordStatus::Unreachable);
    assert!(ctx.failures.is_empty());
    assert_eq!(ctx.counts.snapshot().parsed_successfully, 0);
}

#[tokio::test]
async fn test_body_stalling_past_timeout_is_unreachable() {
    let base = raw_server(|mut stream| async move {
        read_request(&mut stream).await;
        let _ = stream.write_all(response_head(100_000).as_bytes()).await;
        let _ = stream.write_all(&RECIPE_PAGE.as_bytes()[..50]).await;
        let _ = stream.flush().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;
    let (ctx, _temp_dir) = create_context(Duration::from_millis(300)).await;
    let url = format!("{}/stalled", base);

    let record = process_url(&url, &ctx, None).await.unwrap();

    assert_eq!(record.status, RecordStatus::Unreachable);
    assert_eq!(ctx.counts.snapshot().reached, 0);
    assert!(ctx.failures.is_empty());
}

#[tokio::test]
async fn test_truncated_body_is_still_extracted() {
    let base = raw_server(|mut stream| async move {
        read_request(&mut stream).await;
        let _ = stream
            .write_all(response_head(RECIPE_PAGE.len() + 1000).as_bytes())
            .await;
        let _ = stream.write_all(RECIPE_PAGE.as_bytes()).await;
        let _ = stream.shutdown().await;
    })
    .await;
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    let url = format!("{}/truncated", base);

    let record = process_url(&url, &ctx, None).await.unwrap();

    assert_eq!(record.status, RecordStatus::Complete, "{record:?}");
    assert_eq!(record.fields.title, "Flatbread");
    assert_eq!(ctx.counts.snapshot().reached, 1);
}

#[tokio::test]
async fn test_unsupported_page_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>hi</body></html>"))
        .mount(&server)
        .await;
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    let url = format!("{}/blog", server.uri());

    let record = process_url(&url, &ctx, None).await.unwrap();

    assert_eq!(record.status, RecordStatus::Unknown);
    assert_eq!(ctx.counts.snapshot().reached, 1);
}

#[tokio::test]
async fn test_worker_pool_fetches_every_url_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RECIPE_PAGE))
        .expect(12)
        .mount(&server)
        .await;
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    let urls: Vec<String> = (0..12).map(|i| format!("{}/r/{}", server.uri(), i)).collect();

    let pool = WorkerPool::new(4);
    pool.fetch(urls.clone(), &ctx).await.unwrap();

    assert_eq!(ctx.db.count_records().await.unwrap(), 12);
    let mut stored = ctx.db.collection_urls("recipes").await.unwrap();
    stored.sort();
    let mut expected = urls;
    expected.sort();
    assert_eq!(stored, expected);
    assert_eq!(ctx.counts.snapshot().reached, 12);
    server.verify().await;
}

#[tokio::test]
async fn test_worker_pool_bounds_requests_in_flight() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let base = {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        raw_server(move |mut stream| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                read_request(&mut stream).await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = stream
                    .write_all(response_head(RECIPE_PAGE.len()).as_bytes())
                    .await;
                let _ = stream.write_all(RECIPE_PAGE.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        })
        .await
    };
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    let urls: Vec<String> = (0..8).map(|i| format!("{}/r/{}", base, i)).collect();

    WorkerPool::new(3).fetch(urls, &ctx).await.unwrap();

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "{} requests in flight", peak);
    assert!(peak > 1, "requests never overlapped");
    assert_eq!(ctx.db.count_records().await.unwrap(), 8);
    assert_eq!(ctx.counts.snapshot().parsed_successfully, 8);
}

#[tokio::test]
async fn test_store_failure_aborts_pool() {
    let server = MockServer::start().await;
    serve_recipe(&server, "/a").await;
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    ctx.db.pool().close().await;

    let urls = vec![format!("{}/a", server.uri()), format!("{}/a?again", server.uri())];
    let result = WorkerPool::new(2).fetch(urls, &ctx).await;

    assert!(matches!(result, Err(crate::Error::Database(_))));
}

#[tokio::test]
async fn test_serial_fetcher_stops_at_store_failure() {
    let server = MockServer::start().await;
    serve_recipe(&server, "/a").await;
    let (ctx, _temp_dir) = create_context(Duration::from_secs(5)).await;
    ctx.db.pool().close().await;

    let result = SerialFetcher::new()
        .fetch(vec![format!("{}/a", server.uri())], &ctx)
        .await;

    assert!(result.is_err());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

fn connections(connections: usize) -> FetchConfig {
    FetchConfig {
        connections,
        ..FetchConfig::default()
    }
}

#[tokio::test]
async fn test_select_fetcher_inside_runtime() {
    assert_eq!(select_fetcher(&connections(4)).workers(), 4);
    assert_eq!(select_fetcher(&connections(4)).name(), "worker pool");
    assert_eq!(select_fetcher(&connections(1)).name(), "serial");
}

#[test]
fn test_select_fetcher_without_runtime_is_serial() {
    let fetcher = select_fetcher(&connections(8));
    assert_eq!(fetcher.name(), "serial");
    assert_eq!(fetcher.workers(), 1);
}

#[test]
fn test_session_deadline() {
    assert!(session_deadline(Duration::from_secs(1), 3).is_some());
    assert!(session_deadline(Duration::MAX, 2).is_none());
    assert!(session_deadline(Duration::from_secs(u64::MAX / 8), 1).is_none());
}

#[test]
fn test_last_url_keeps_full_timeout_after_stalls() {
    let timeout = Duration::from_secs(1);
    let start = Instant::now();
    let deadline = session_deadline(timeout, 3).unwrap();

    // Two earlier URLs each used their whole timeout plus connection overhead
    let now = start + (timeout + Duration::from_millis(5)) * 2;

    assert_eq!(request_timeout(timeout, Some(deadline), now), timeout);
    assert_eq!(request_timeout(timeout, None, now), timeout);
    assert_eq!(
        request_timeout(timeout, Some(deadline), deadline + timeout),
        Duration::ZERO
    );
}
