#![cfg(feature = "reqwest")]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use geofetch::{
    AuthenticationMap, Credentials, FetchConfig, FetchOptions, Fetcher, MemCache, Part,
    ProgressCallback, ProxySettings, Request, ResultKind, ReqwestTransport, Transport,
    encode_multipart,
};

fn serve(router: Router) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });

    format!("http://{addr}")
}

fn coverage() -> Vec<u8> {
    encode_multipart(
        &[
            Part::new("<Coverages/>").header("Content-Type", "text/xml"),
            Part::new(&b"II*\0tiff"[..]).header("Content-Type", "image/tiff"),
        ],
        "wcs",
    )
}

fn app() -> Router {
    Router::new()
        .route(
            "/hello",
            get(|| async {
                (
                    [
                        (header::CONTENT_TYPE, "text/plain"),
                        (header::LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT"),
                    ],
                    "hello",
                )
            }),
        )
        .route(
            "/missing",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"error":"missing"}"#,
                )
            }),
        )
        .route("/busy", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route(
            "/multipart",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "multipart/mixed; boundary=wcs")],
                    coverage(),
                )
            }),
        )
        .route(
            "/truncated",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "multipart/mixed; boundary=wcs")],
                    "--wcs\r\nContent-Type: text/xml\r\n\r\n<a/>\r\n--wcs\r\nContent-Type: image/tiff\r\n\r\nII*",
                )
            }),
        )
        .route(
            "/echo-headers",
            get(|headers: HeaderMap| async move {
                let value = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                };
                format!("{}|{}", value("user-agent"), value("x-layer"))
            }),
        )
        .route(
            "/auth",
            get(|headers: HeaderMap| async move {
                // "user:secret"
                match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                    Some("Basic dXNlcjpzZWNyZXQ=") => (StatusCode::OK, "welcome"),
                    _ => (StatusCode::UNAUTHORIZED, "who are you"),
                }
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        )
        .route("/big", get(|| async { vec![b'x'; 256 * 1024] }))
        .route(
            "/conditional",
            get(|headers: HeaderMap| async move {
                if headers.contains_key(header::IF_MODIFIED_SINCE) {
                    StatusCode::NOT_MODIFIED.into_response()
                } else {
                    (
                        [(header::LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT")],
                        "v1",
                    )
                        .into_response()
                }
            }),
        )
}

fn transport(config: &FetchConfig) -> ReqwestTransport {
    ReqwestTransport::with_environment_proxy(config, None).unwrap()
}

fn fetcher(config: FetchConfig) -> Fetcher<ReqwestTransport> {
    Fetcher::new(transport(&config), config)
}

#[test]
fn plain_get() {
    let base = serve(app());
    let response = transport(&FetchConfig::default()).get(
        &Request::new(format!("{base}/hello")),
        &FetchOptions::default(),
        None,
    );

    assert_eq!(response.status(), 200);
    assert!(response.is_ok());
    assert_eq!(response.mime_type(), "text/plain");
    assert_eq!(response.parts().len(), 1);
    assert_eq!(response.part_as_string(0), "hello");
    assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));
    assert_eq!(
        response.last_modified(),
        geofetch::parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT")
    );
}

#[test]
fn server_errors_are_classified() {
    let base = serve(app());
    let mut fetcher = fetcher(FetchConfig::default().retry_delay(Duration::from_millis(20)));
    let progress = ProgressCallback::new();

    let missing = fetcher.fetch(&Request::new(format!("{base}/missing")), &FetchOptions::default(), None);
    assert_eq!(missing.kind, ResultKind::NotFound);
    assert_eq!(missing.error_detail.as_deref(), Some(r#"{"error":"missing"}"#));

    let busy = fetcher.fetch(&Request::new(format!("{base}/busy")), &FetchOptions::default(), Some(&progress));
    assert_eq!(busy.kind, ResultKind::ServerError);
    assert_eq!(busy.retry_after, Some(Duration::from_millis(20)));
    assert_eq!(progress.message(), "Server deferral");
}

#[test]
fn multipart_bodies_are_split() {
    let base = serve(app());
    let response = transport(&FetchConfig::default()).get(
        &Request::new(format!("{base}/multipart")),
        &FetchOptions::default(),
        None,
    );

    assert_eq!(response.parts().len(), 2);
    assert_eq!(response.part_as_string(0), "<Coverages/>");
    assert_eq!(response.parts()[1].headers.get("content-type"), Some("image/tiff"));
    assert_eq!(&response.parts()[1].data[..], b"II*\0tiff");
    assert_eq!(response.protocol_violation(), None);
}

#[test]
fn truncated_multipart_keeps_leading_parts() {
    let base = serve(app());
    let response = transport(&FetchConfig::default()).get(
        &Request::new(format!("{base}/truncated")),
        &FetchOptions::default(),
        None,
    );

    assert!(response.is_ok());
    assert!(response.protocol_violation().is_some());
    assert!(response.part_as_string(0).starts_with("<a/>"));
}

#[test]
fn download_keeps_payload_part() {
    let base = serve(app());
    let dir = tempfile::tempdir().unwrap();
    let mut fetcher = fetcher(FetchConfig::default());

    let path = fetcher
        .download(&format!("{base}/multipart"), dir.path().join("coverage.tif"))
        .unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"II*\0tiff");
}

#[test]
fn user_agent_and_headers_are_sent() {
    let base = serve(app());
    let mut fetcher = fetcher(FetchConfig::default().user_agent("mapviewer/2.1"));
    let request = Request::new(format!("{base}/echo-headers")).header("X-Layer", "roads");

    let first = fetcher.fetch(&request, &FetchOptions::default(), None);
    assert_eq!(first.value.as_deref(), Some(&b"mapviewer/2.1|roads"[..]));

    fetcher.set_user_agent("tileloader/0.3").unwrap();
    let second = fetcher.fetch(&request, &FetchOptions::default(), None);
    assert_eq!(second.value.as_deref(), Some(&b"tileloader/0.3|roads"[..]));
}

#[test]
fn credentials_follow_url_prefix() {
    let base = serve(app());
    let mut fetcher = fetcher(FetchConfig::default());
    let request = Request::new(format!("{base}/auth"));

    let anonymous = fetcher.fetch(&request, &FetchOptions::default(), None);
    assert_eq!(anonymous.kind, ResultKind::Unauthorized);

    let mut authentication = AuthenticationMap::new();
    authentication.add(base.clone(), Credentials::new("user", "secret"));
    authentication.add("http://elsewhere.test/", Credentials::new("other", "nope"));
    let options = FetchOptions::default().authentication(Arc::new(authentication));

    let signed = fetcher.fetch(&request, &options, None);
    assert_eq!(signed.kind, ResultKind::Ok);
    assert_eq!(signed.value.as_deref(), Some(&b"welcome"[..]));
}

#[test]
fn slow_server_times_out() {
    let base = serve(app());
    let mut fetcher = fetcher(FetchConfig::default().timeout(Duration::from_millis(200)));
    let progress = ProgressCallback::new();

    let result = fetcher.fetch(&Request::new(format!("{base}/slow")), &FetchOptions::default(), Some(&progress));

    assert_eq!(result.kind, ResultKind::Timeout);
    assert!(result.is_recoverable());
    assert!(progress.retry_delay().is_some());
}

#[test]
fn refused_connection_is_transport_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut fetcher = fetcher(FetchConfig::default().connect_timeout(Duration::from_secs(2)));

    let result = fetcher.fetch(
        &Request::new(format!("http://127.0.0.1:{port}/hello")),
        &FetchOptions::default(),
        None,
    );

    assert_eq!(result.kind, ResultKind::TransportFailure);
    assert_eq!(result.response.status(), 0);
    assert!(result.metadata.error.is_some_and(|e| !e.is_empty()));
}

#[test]
fn progress_is_reported_and_cancelable() {
    let base = serve(app());
    let transport = transport(&FetchConfig::default());
    let request = Request::new(format!("{base}/big"));

    let downloaded = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&downloaded);
    let watcher = ProgressCallback::with_reporter(move |p| {
        seen.store(p.bytes_downloaded, Ordering::SeqCst);
        false
    });
    let response = transport.get(&request, &FetchOptions::default(), Some(&watcher));
    assert!(response.is_ok());
    assert_eq!(response.part(0).map(|p| p.size()), Some(256 * 1024));
    assert_eq!(downloaded.load(Ordering::SeqCst), 256 * 1024);

    let impatient = ProgressCallback::with_reporter(|p| p.bytes_downloaded > 0);
    let response = transport.get(&request, &FetchOptions::default(), Some(&impatient));
    assert!(response.is_canceled());
    assert!(response.parts().is_empty());

    let response = transport.get(&request, &FetchOptions::default(), Some(&impatient));
    assert!(response.is_canceled());
}

#[test]
fn conditional_revalidation_through_cache() {
    let base = serve(app());
    let mut fetcher = fetcher(FetchConfig::default());
    let url = format!("{base}/conditional");
    let cache = Arc::new(MemCache::default());
    let options = FetchOptions::default().cache(cache.clone());

    let first = fetcher.fetch(&Request::new(&url), &options, None);
    assert_eq!(first.value.as_deref(), Some(&b"v1"[..]));
    assert_eq!(cache.len(), 1);

    // Force revalidation and send the stored time back.
    let stale = options.clone().policy(
        geofetch::CachePolicy::default()
            .min_time(std::time::SystemTime::now() + Duration::from_secs(60)),
    );
    let request = Request::new(&url).with_last_modified(first.last_modified.unwrap());
    let second = fetcher.fetch(&request, &stale, None);

    assert_eq!(second.kind, ResultKind::Ok);
    assert!(second.from_cache);
    assert_eq!(second.value.as_deref(), Some(&b"v1"[..]));
}

#[test]
fn proxy_precedence() {
    let proxy = serve(app());
    let port: u16 = proxy.rsplit(':').next().unwrap().parse().unwrap();
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let request = Request::new("http://tiles.invalid/hello");

    // Request-level proxy beats the configured one.
    let config = FetchConfig::default().proxy(ProxySettings::new("127.0.0.1", dead));
    let options = FetchOptions::default().proxy(ProxySettings::new("127.0.0.1", port));
    let via_options = transport(&config).get(&request, &options, None);
    assert_eq!(via_options.part_as_string(0), "hello");

    let via_config = transport(&config).get(&request, &FetchOptions::default(), None);
    assert_eq!(via_config.status(), 0);

    // Environment proxy applies when nothing else is set.
    let env = ReqwestTransport::with_environment_proxy(
        &FetchConfig::default(),
        Some(ProxySettings::new("127.0.0.1", port)),
    )
    .unwrap();
    let via_env = env.get(&request, &FetchOptions::default(), None);
    assert_eq!(via_env.part_as_string(0), "hello");
}

#[test]
fn simulated_response_code() {
    let base = serve(app());
    let mut fetcher = fetcher(FetchConfig::default().simulate_response_code(500));

    let result = fetcher.fetch(&Request::new(format!("{base}/hello")), &FetchOptions::default(), None);

    assert_eq!(result.kind, ResultKind::ServerError);
    assert_eq!(result.metadata.response_code, Some(500));
}
