//! Integration tests against local HTTP servers.
//!
//! `mockito` stands in for both the image host and the Gemini endpoint, so
//! the whole pipeline (fetch → decode → submit → fetch) runs over real HTTP
//! without network access or API keys.

use mockito::{Matcher, Server};
use reqwest::Url;
use roomify_render::pipeline::data_url;
use roomify_render::pipeline::provider::GeminiImageProvider;
use roomify_render::progress::IntervalTicker;
use roomify_render::{
    render_detailed, render_input, DataUrl, ErrorKind, Fetcher, HttpFetcher, ImageProvider,
    ProgressConfig, ProgressProxy, RenderConfig, RenderError, RenderRequest, RenderResult,
    Resolution, SourceImage,
};
use std::io::Write;
use tokio_test::{assert_err, assert_ok};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash-image-preview:generateContent";

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config_for(server: &Server) -> RenderConfig {
    RenderConfig::builder()
        .provider_name("gemini")
        .model("gemini-2.5-flash-image-preview")
        .api_key("test-key")
        .api_base(server.url())
        .download_timeout_secs(5)
        .api_timeout_secs(5)
        .build()
        .unwrap()
}

fn inline_reply(mime: &str, data: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": "Here is the render." },
                    { "inlineData": { "mimeType": mime, "data": data } }
                ]
            }
        }]
    })
    .to_string()
}

fn request(payload: &str) -> RenderRequest {
    RenderRequest {
        prompt: "render this".into(),
        model: "gemini-2.5-flash-image-preview".into(),
        mime_type: "image/png".into(),
        payload: payload.into(),
        resolution: Resolution::SQUARE_1024,
    }
}

// ── Fetcher ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetcher_returns_body_and_declared_type() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/plan.png")
        .with_status(200)
        .with_header("content-type", "image/png; charset=binary")
        .with_body("B")
        .create_async()
        .await;

    let url = Url::parse(&format!("{}/plan.png", server.url())).unwrap();
    let blob = assert_ok!(HttpFetcher::new(5).unwrap().fetch(&url).await);

    mock.assert_async().await;
    assert_eq!(blob.mime_type, "image/png");
    assert_eq!(blob.bytes, b"B");
    assert_eq!(
        data_url::encode_blob(&blob).as_str(),
        "data:image/png;base64,Qg=="
    );
}

#[tokio::test]
async fn fetcher_maps_error_status_to_transport() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/missing.png")
        .with_status(404)
        .create_async()
        .await;

    let url = Url::parse(&format!("{}/missing.png", server.url())).unwrap();
    let err = assert_err!(HttpFetcher::new(5).unwrap().fetch(&url).await);

    mock.assert_async().await;
    match err {
        RenderError::Transport {
            status,
            status_text,
            ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(status_text, "Not Found");
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn fetcher_maps_refused_connection_to_network() {
    // Port 1 is reserved and nothing listens on it.
    let url = Url::parse("http://127.0.0.1:1/plan.png").unwrap();
    let err = assert_err!(HttpFetcher::new(5).unwrap().fetch(&url).await);
    assert_eq!(err.kind(), ErrorKind::Network);
}

// ── Gemini provider ──────────────────────────────────────────────────────────

#[tokio::test]
async fn gemini_sends_image_and_parses_inline_reply() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(serde_json::json!({
                "generationConfig": {
                    "responseModalities": ["IMAGE"],
                    "imageConfig": { "aspectRatio": "1:1" }
                }
            })),
            Matcher::Regex(r#""inlineData":\{"mimeType":"image/png","data":"Qg=="\}"#.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(inline_reply("image/png", "T1VU"))
        .create_async()
        .await;

    let provider = GeminiImageProvider::new("test-key", Some(server.url().as_str()), 5).unwrap();
    let reference = assert_ok!(provider.submit(&request("Qg==")).await);

    mock.assert_async().await;
    assert_eq!(
        reference,
        Some(SourceImage::Inline(DataUrl::new("data:image/png;base64,T1VU")))
    );
}

#[tokio::test]
async fn gemini_text_only_reply_is_no_image() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", GENERATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"I can't draw that."}]}}]}"#)
        .create_async()
        .await;

    let provider = GeminiImageProvider::new("test-key", Some(server.url().as_str()), 5).unwrap();
    assert_eq!(assert_ok!(provider.submit(&request("Qg==")).await), None);
}

#[tokio::test]
async fn gemini_error_carries_provider_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", GENERATE_PATH)
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#)
        .create_async()
        .await;

    let provider = GeminiImageProvider::new("test-key", Some(server.url().as_str()), 5).unwrap();
    let err = assert_err!(provider.submit(&request("Qg==")).await);

    assert_eq!(err.kind(), ErrorKind::Provider);
    assert!(err.to_string().contains("API key not valid."));
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_plan_with_linked_render_is_fetched_twice() {
    let mut server = Server::new_async().await;
    let plan = server
        .mock("GET", "/plan.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body("B")
        .expect(1)
        .create_async()
        .await;
    let out_url = format!("{}/out.png", server.url());
    let generate = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::Regex(r#""data":"Qg==""#.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "candidates": [{ "content": { "parts": [
                    { "fileData": { "mimeType": "image/png", "fileUri": out_url } }
                ]}}]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let rendered = server
        .mock("GET", "/out.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body("OUT")
        .expect(1)
        .create_async()
        .await;

    let output = render_input(format!("{}/plan.png", server.url()), &config_for(&server))
        .await
        .unwrap();

    plan.assert_async().await;
    generate.assert_async().await;
    rendered.assert_async().await;
    assert_eq!(
        output.result,
        RenderResult::Rendered(DataUrl::new("data:image/png;base64,T1VU"))
    );
    assert_eq!(output.stats.fetches, 2);
    assert_eq!(output.stats.provider, "gemini");
    assert_eq!(output.stats.source_mime_type, "image/png");
}

#[tokio::test]
async fn failed_download_never_reaches_provider() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/plan.png")
        .with_status(404)
        .create_async()
        .await;
    let generate = server
        .mock("POST", GENERATE_PATH)
        .expect(0)
        .create_async()
        .await;

    let source = SourceImage::parse(&format!("{}/plan.png", server.url())).unwrap();
    let err = render_detailed(source, &config_for(&server)).await.unwrap_err();

    generate.assert_async().await;
    assert!(matches!(err, RenderError::Transport { status: 404, .. }));
}

#[tokio::test]
async fn provider_without_image_is_soft_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", GENERATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[]}"#)
        .create_async()
        .await;

    let output = render_input("data:image/png;base64,Qg==", &config_for(&server))
        .await
        .unwrap();

    assert_eq!(output.result, RenderResult::NoImageProduced);
    assert_eq!(output.stats.fetches, 0);
}

#[tokio::test]
async fn local_png_is_read_inline() {
    let mut server = Server::new_async().await;
    let generate = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::Regex(r#""mimeType":"image/png","data":"iVBORw==""#.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(inline_reply("image/jpeg", "/9j/"))
        .create_async()
        .await;

    let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

    let output = render_input(file.path().to_str().unwrap(), &config_for(&server))
        .await
        .unwrap();

    generate.assert_async().await;
    assert_eq!(
        output.result.image().map(DataUrl::as_str),
        Some("data:image/jpeg;base64,/9j/")
    );
    assert_eq!(output.stats.fetches, 0);
}

#[tokio::test]
async fn unsupported_upload_is_rejected_before_rendering() {
    let mut server = Server::new_async().await;
    let generate = server
        .mock("POST", GENERATE_PATH)
        .expect(0)
        .create_async()
        .await;

    let mut file = tempfile::Builder::new().suffix(".gif").tempfile().unwrap();
    file.write_all(b"GIF89a").unwrap();

    let err = render_input(file.path().to_str().unwrap(), &config_for(&server))
        .await
        .unwrap_err();

    generate.assert_async().await;
    assert!(matches!(err, RenderError::UnsupportedFileType { .. }));
}

// ── Upload progress ──────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_proxy_delivers_encoded_upload() {
    let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    file.write_all(b"B").unwrap();

    let config = ProgressConfig {
        interval_ms: 1,
        step: 50,
        completion_delay_ms: 1,
    };
    let proxy = ProgressProxy::new(IntervalTicker::new(config.interval()), config);
    let updates = proxy.subscribe();

    let mut delivered = None;
    proxy
        .run_then(SourceImage::from_file(file.path()), |source| {
            delivered = Some(source)
        })
        .await;

    let state = *updates.borrow();
    assert!(state.done);
    assert_eq!(state.percent, 100);
    assert_eq!(
        delivered.unwrap().unwrap(),
        SourceImage::Inline(DataUrl::new("data:image/jpeg;base64,Qg=="))
    );
}
