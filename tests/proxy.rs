//! Proxy redirects against raw TCP mock upstreams.

mod common;

use axum::body::Body;
use axum::http::header::{ACCEPT, CONTENT_LENGTH};
use axum::http::{Method, Request, StatusCode};
use common::{body_string, closed_port, get, send, start_echo_backend, start_mock_backend, Site};
use serde_json::json;
use serve_engine::proxy::{Flow, MiddlewareRegistry, Payload};

fn proxy_rule(target: String) -> serde_json::Value {
    json!({
        "redirects": [{
            "engine": "glob",
            "source": "/api/**",
            "destination": target,
            "proxy": true,
            "preserveQuery": true
        }]
    })
}

#[tokio::test]
async fn test_forwards_method_query_and_host() {
    let upstream = start_echo_backend(200).await;
    let site = Site::new();
    let router = site.router(proxy_rule(format!("http://{upstream}/echo")));

    let response = send(&router, get("/api/items?q=1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let echoed = body_string(response).await.to_ascii_lowercase();
    assert!(echoed.starts_with("get /echo?q=1 http/1.1"), "{echoed}");
    assert!(echoed.contains(&format!("host: {upstream}")), "{echoed}");
}

#[tokio::test]
async fn test_post_body_and_upstream_status() {
    let upstream = start_echo_backend(201).await;
    let site = Site::new();
    let router = site.router(proxy_rule(format!("http://{upstream}/submit")));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/form")
        .body(Body::from("name=value"))
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let echoed = body_string(response).await;
    assert!(echoed.starts_with("POST /submit"));
    assert!(echoed.ends_with("name=value"));
}

#[tokio::test]
async fn test_middleware_rewrites_body_and_filters_headers() {
    let upstream = start_mock_backend(
        "text/html; charset=utf-8",
        "<p>hi</p><script src=\"https://ads.example/t.js\"></script>",
    )
    .await;
    let site = Site::new();

    let mut registry = MiddlewareRegistry::new();
    registry.register_fn("shout", |payload: Payload<'_>| {
        if let Payload::Html(doc) = payload {
            let text = doc.text("p")?.concat();
            doc.set_text("p", &text.to_uppercase())?;
            doc.remove("script")?;
        }
        Ok(Flow::Continue)
    });

    let mut config = proxy_rule(format!("http://{upstream}/page"));
    config["proxyMiddleware"] = json!([{
        "engine": "text",
        "source": upstream.to_string(),
        "middleware": "shout",
        "type": "html"
    }]);
    let router = site.router_with(config, registry);

    let response = send(&router, get("/api/page")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_LENGTH], "9");
    assert_eq!(response.headers()["x-upstream"], "mock");
    assert!(response.headers().get("set-cookie").is_none());
    assert_eq!(body_string(response).await, "<p>HI</p>");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let upstream = closed_port().await;
    let site = Site::new();
    let router = site.router(proxy_rule(format!("http://{upstream}/")));

    let request = Request::builder()
        .uri("/api/down")
        .header(ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["code"], "bad_gateway");
}

#[tokio::test]
async fn test_cookie_jar_replays_upstream_cookies() {
    let login = start_mock_backend("text/plain", "ok").await;
    let echo = start_echo_backend(200).await;
    let site = Site::new();
    let jar = site.outside().join("cookies.txt");

    let router = site.router(json!({
        "proxyCookieJar": jar,
        "redirects": [
            {"engine": "glob", "source": "/login", "destination": format!("http://{login}/login"), "proxy": true},
            {"engine": "glob", "source": "/echo", "destination": format!("http://{echo}/echo"), "proxy": true}
        ]
    }));

    let first = send(&router, get("/login")).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first.headers().get("set-cookie").is_none());

    let echoed = body_string(send(&router, get("/echo")).await).await.to_ascii_lowercase();
    assert!(echoed.contains("cookie: session=1"), "{echoed}");
    assert!(std::fs::read_to_string(&jar).unwrap().contains("session=1"));
}

#[tokio::test]
async fn test_without_jar_cookies_are_not_kept() {
    let login = start_mock_backend("text/plain", "ok").await;
    let echo = start_echo_backend(200).await;
    let site = Site::new();

    let router = site.router(json!({
        "redirects": [
            {"engine": "glob", "source": "/login", "destination": format!("http://{login}/login"), "proxy": true},
            {"engine": "glob", "source": "/echo", "destination": format!("http://{echo}/echo"), "proxy": true}
        ]
    }));

    send(&router, get("/login")).await;
    let echoed = body_string(send(&router, get("/echo")).await).await.to_ascii_lowercase();
    assert!(!echoed.contains("cookie:"), "{echoed}");
}
