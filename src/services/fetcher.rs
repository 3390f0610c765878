// src/services/fetcher.rs

//! Single-round fetcher.
//!
//! Requests one round from the remote source and turns the payload into a
//! validated [`DrawRecord`]. Every outcome is a typed result; no retries are
//! attempted here.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{FetchError, Result};
use crate::models::{DrawRecord, SourceConfig};
use crate::utils::http::create_async_client;

/// Payload value signalling that the round exists.
const SUCCESS_MARKER: &str = "success";

/// Source of individual draw records.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetch and validate a single round.
    async fn fetch(&self, round: u32) -> std::result::Result<DrawRecord, FetchError>;
}

/// Fetcher backed by the public `getLottoNumber` endpoint.
pub struct HttpRecordFetcher {
    client: Client,
    base_url: String,
}

impl HttpRecordFetcher {
    /// Create a fetcher with a client built from the source settings.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self::with_client(
            create_async_client(config)?,
            config.base_url.clone(),
        ))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RecordFetcher for HttpRecordFetcher {
    async fn fetch(&self, round: u32) -> std::result::Result<DrawRecord, FetchError> {
        if round == 0 {
            return Err(FetchError::rejected("round must be >= 1"));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("method", "getLottoNumber")])
            .query(&[("drwNo", round)])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::invalid(format!("round {round}: body is not JSON: {e}")))?;

        parse_payload(round, payload)
    }
}

/// Draw fields as published by the source.
#[derive(Debug, Deserialize)]
struct DrawPayload {
    #[serde(rename = "drwNo")]
    round: u32,
    #[serde(rename = "drwNoDate")]
    date: NaiveDate,
    #[serde(rename = "drwtNo1")]
    n1: u8,
    #[serde(rename = "drwtNo2")]
    n2: u8,
    #[serde(rename = "drwtNo3")]
    n3: u8,
    #[serde(rename = "drwtNo4")]
    n4: u8,
    #[serde(rename = "drwtNo5")]
    n5: u8,
    #[serde(rename = "drwtNo6")]
    n6: u8,
    #[serde(rename = "bnusNo")]
    bonus: u8,
}

/// Interpret a decoded response body for `round`.
///
/// The success marker is checked before any draw field so that a rejected
/// round is never reported as malformed.
pub fn parse_payload(round: u32, payload: Value) -> std::result::Result<DrawRecord, FetchError> {
    match payload.get("returnValue").and_then(Value::as_str) {
        Some(SUCCESS_MARKER) => {}
        Some(other) => {
            return Err(FetchError::rejected(format!(
                "round {round}: returnValue={other}"
            )));
        }
        None => {
            return Err(FetchError::invalid(format!(
                "round {round}: missing returnValue"
            )));
        }
    }

    let draw: DrawPayload = serde_json::from_value(payload)
        .map_err(|e| FetchError::invalid(format!("round {round}: {e}")))?;

    if draw.round != round {
        return Err(FetchError::invalid(format!(
            "requested round {round}, source answered round {}",
            draw.round
        )));
    }

    DrawRecord::new(
        draw.round,
        draw.date,
        [draw.n1, draw.n2, draw.n3, draw.n4, draw.n5, draw.n6],
        draw.bonus,
    )
    .map_err(FetchError::invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a local port.
    async fn serve_once(status: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/common.do")
    }

    /// Accept a connection and never answer it.
    async fn serve_silence() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        format!("http://{addr}/common.do")
    }

    fn local_fetcher(base_url: String) -> HttpRecordFetcher {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        HttpRecordFetcher::with_client(client, base_url)
    }

    fn success_payload(round: u32) -> Value {
        json!({
            "returnValue": "success",
            "drwNo": round,
            "drwNoDate": "2024-01-06",
            "drwtNo1": 6,
            "drwtNo2": 12,
            "drwtNo3": 17,
            "drwtNo4": 21,
            "drwtNo5": 32,
            "drwtNo6": 39,
            "bnusNo": 30,
            "totSellamnt": 111_000_000_000u64,
            "firstWinamnt": 2_000_000_000u64
        })
    }

    #[test]
    fn test_parse_success() {
        let record = parse_payload(1101, success_payload(1101)).unwrap();
        assert_eq!(record.round(), 1101);
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert_eq!(record.numbers(), &[6, 12, 17, 21, 32, 39]);
        assert_eq!(record.bonus(), 30);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = parse_payload(7, success_payload(7)).unwrap();
        let b = parse_payload(7, success_payload(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejected() {
        let err = parse_payload(99999, json!({ "returnValue": "fail" })).unwrap_err();
        assert!(matches!(err, FetchError::PayloadRejected(_)));
    }

    #[test]
    fn test_parse_missing_field() {
        let mut payload = success_payload(5);
        payload.as_object_mut().unwrap().remove("bnusNo");
        let err = parse_payload(5, payload).unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_wrong_type() {
        let mut payload = success_payload(5);
        payload["drwtNo3"] = json!("seventeen");
        assert!(matches!(
            parse_payload(5, payload),
            Err(FetchError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_missing_marker() {
        let mut payload = success_payload(5);
        payload.as_object_mut().unwrap().remove("returnValue");
        assert!(matches!(
            parse_payload(5, payload),
            Err(FetchError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_round_mismatch() {
        assert!(matches!(
            parse_payload(6, success_payload(5)),
            Err(FetchError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_invalid_numbers() {
        let mut payload = success_payload(5);
        payload["drwtNo2"] = json!(6);
        assert!(matches!(
            parse_payload(5, payload),
            Err(FetchError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_round_zero_rejected_without_request() {
        // Unroutable base URL: any request would fail as a network error
        let fetcher = HttpRecordFetcher::with_client(Client::new(), "http://127.0.0.1:9/");
        assert!(matches!(
            fetcher.fetch(0).await,
            Err(FetchError::PayloadRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_success_over_http() {
        let body = success_payload(1101).to_string();
        let fetcher = local_fetcher(serve_once("200 OK", &body).await);
        let record = fetcher.fetch(1101).await.unwrap();
        assert_eq!(record.round(), 1101);
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let status = "500 Internal Server Error";
        let fetcher = local_fetcher(serve_once(status, "oops").await);
        assert!(matches!(
            fetcher.fetch(5).await,
            Err(FetchError::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn test_html_body_is_invalid_response() {
        let html = "<html><body>maintenance</body></html>";
        let fetcher = local_fetcher(serve_once("200 OK", html).await);
        assert!(matches!(
            fetcher.fetch(5).await,
            Err(FetchError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let fetcher = local_fetcher(serve_silence().await);
        assert_eq!(fetcher.fetch(5).await, Err(FetchError::Timeout));
    }

    #[tokio::test]
    async fn test_fail_marker_over_http_is_rejected() {
        let fetcher = local_fetcher(serve_once("200 OK", r#"{"returnValue":"fail"}"#).await);
        assert!(matches!(
            fetcher.fetch(99999).await,
            Err(FetchError::PayloadRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = local_fetcher(format!("http://{addr}/common.do"));
        assert!(matches!(
            fetcher.fetch(5).await,
            Err(FetchError::NetworkError(_))
        ));
    }
}
