//! AI client against a one-shot local HTTP responder

use pdfworks_core::compress::DocumentStats;
use pdfworks_services::{AiClient, AiConfig, ServiceError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one request with `status` and `body`, returning the request body received
async fn respond_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/advise", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + length || n == 0 {
                    break;
                }
            } else if n == 0 {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        let text = String::from_utf8_lossy(&received).to_string();
        text.split_once("\r\n\r\n").map(|(_, b)| b.to_string()).unwrap_or_default()
    });
    (url, handle)
}

fn client(endpoint: String) -> AiClient {
    AiClient::new(
        reqwest::Client::new(),
        AiConfig {
            endpoint: Some(endpoint),
            api_key: Some("test-key".into()),
            ..AiConfig::default()
        },
    )
}

fn stats() -> DocumentStats {
    DocumentStats {
        size_bytes: 900_000,
        page_count: 3,
    }
}

#[tokio::test]
async fn summarize_sends_tagged_request() {
    let (url, server) = respond_once("200 OK", r#"{"summary":"A short lease."}"#).await;
    let summary = client(url).summarize("This lease agreement ...").await.unwrap();
    assert_eq!(summary, "A short lease.");

    let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["operation"], "summarize");
    assert_eq!(sent["text"], "This lease agreement ...");
}

#[tokio::test]
async fn server_error_surfaces_for_text_operations() {
    let (url, _server) = respond_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
    let err = client(url).translate("hola", "en").await.unwrap_err();
    assert!(matches!(err, ServiceError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn malformed_reply_is_invalid_response() {
    let (url, _server) = respond_once("200 OK", r#"{"unexpected":true}"#).await;
    let err = client(url).ocr(&[0x89, b'P', b'N', b'G'], "image/png").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidResponse(_)));
}

#[tokio::test]
async fn compression_advice_is_used_when_sane() {
    let (url, server) = respond_once("200 OK", r#"{"quality":55}"#).await;
    assert_eq!(client(url).recommend_compression(&stats()).await, 55.0);

    let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["operation"], "recommend_compression");
    assert_eq!(sent["bytes_per_page"], 300_000);
}

#[tokio::test]
async fn compression_advice_falls_back_on_failure() {
    let (url, _server) = respond_once("503 Service Unavailable", "{}").await;
    assert_eq!(client(url).recommend_compression(&stats()).await, 70.0);

    let (url, _server) = respond_once("200 OK", r#"{"quality":-5}"#).await;
    assert_eq!(client(url).recommend_compression(&stats()).await, 70.0);
}
