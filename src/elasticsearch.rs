use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::BatchSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_ADDRESS: &str = "http://localhost:9200";
pub const DEFAULT_INDEX_PREFIX: &str = "logs";

/// Configuration for [`ElasticsearchSink`].
///
/// Documents go to a daily index named `{index_prefix}-YYYY.MM.DD`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Cluster nodes, e.g. "http://127.0.0.1:9200". Requests rotate over
    /// them. Entries without a scheme get `https` when `enable_ssl` is set.
    pub addresses: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Takes precedence over username/password.
    pub api_key: Option<String>,
    pub index_prefix: String,
    pub enable_ssl: bool,
    /// Accept any certificate. Development only.
    pub skip_ssl_verify: bool,
    pub timeout_secs: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            addresses: vec![DEFAULT_ADDRESS.to_string()],
            username: None,
            password: None,
            api_key: None,
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            enable_ssl: false,
            skip_ssl_verify: false,
            timeout_secs: 30,
        }
    }
}

/// Sink that writes each batch with one call to the `_bulk` API.
pub struct ElasticsearchSink {
    client: Client,
    nodes: Vec<Url>,
    next_node: AtomicUsize,
    config: ElasticsearchConfig,
}

impl ElasticsearchSink {
    /// Build the HTTP client and validate node addresses.
    ///
    /// **Returns**
    /// - `Err(SinkError::InvalidConfig)` if an address cannot be parsed.
    /// - `Err(SinkError::Http)` if the client cannot be built.
    pub fn new(mut config: ElasticsearchConfig) -> Result<Self, SinkError> {
        if config.addresses.is_empty() {
            config.addresses = vec![DEFAULT_ADDRESS.to_string()];
        }
        if config.index_prefix.is_empty() {
            config.index_prefix = DEFAULT_INDEX_PREFIX.to_string();
        }

        let nodes = config
            .addresses
            .iter()
            .map(|address| parse_node(address, config.enable_ssl))
            .collect::<Result<Vec<_>, _>>()?;

        let client = Client::builder()
            .danger_accept_invalid_certs(config.skip_ssl_verify)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(ElasticsearchSink {
            client,
            nodes,
            next_node: AtomicUsize::new(0),
            config,
        })
    }

    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    fn node(&self) -> &Url {
        let n = self.next_node.fetch_add(1, Ordering::Relaxed);
        &self.nodes[n % self.nodes.len()]
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(api_key) = &self.config.api_key {
            request.header("Authorization", format!("ApiKey {api_key}"))
        } else if let (Some(user), Some(password)) = (&self.config.username, &self.config.password) {
            request.basic_auth(user, Some(password))
        } else {
            request
        }
    }
}

fn parse_node(address: &str, enable_ssl: bool) -> Result<Url, SinkError> {
    let address = address.trim();
    let full = if address.contains("://") {
        address.to_string()
    } else if enable_ssl {
        format!("https://{address}")
    } else {
        format!("http://{address}")
    };
    let mut url = Url::parse(&full)
        .map_err(|e| SinkError::InvalidConfig(format!("address {address:?}: {e}")))?;
    // `join` replaces the last path segment unless the base ends in '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Daily index for records flushed at `at`: `{prefix}-YYYY.MM.DD` (UTC).
pub fn index_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-{}", at.format("%Y.%m.%d"))
}

/// Encode `batch` as a bulk request body.
///
/// Each record becomes an action line naming `index` followed by the
/// document line. A record that fails to serialize is skipped and the
/// rest are kept. Returns the body and the number of documents in it.
pub fn encode_bulk(batch: &[LogRecord], index: &str) -> (Vec<u8>, usize) {
    let action = serde_json::json!({ "index": { "_index": index } }).to_string();
    let mut body = Vec::new();
    let mut documents = 0;

    for record in batch {
        let doc = match serde_json::to_vec(record) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "skipping log record that failed to serialize");
                continue;
            }
        };
        body.extend_from_slice(action.as_bytes());
        body.push(b'\n');
        body.extend_from_slice(&doc);
        body.push(b'\n');
        documents += 1;
    }

    (body, documents)
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

impl BulkResponse {
    fn failed_items(&self) -> usize {
        self.items
            .iter()
            .filter(|item| {
                item.as_object()
                    .and_then(|ops| ops.values().next())
                    .and_then(|op| op.get("error"))
                    .is_some()
            })
            .count()
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SinkError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
    Err(SinkError::Status { status, body })
}

#[async_trait]
impl BatchSink for ElasticsearchSink {
    async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        // Index is chosen at flush time, not when the record was created.
        let index = index_name(&self.config.index_prefix, Utc::now());
        let (body, documents) = encode_bulk(batch, &index);
        if documents == 0 {
            return Ok(());
        }

        let mut url = self.node().join("_bulk").map_err(|e| SinkError::InvalidConfig(e.to_string()))?;
        url.query_pairs_mut().append_pair("refresh", "false");

        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        let resp = check_status(self.authorize(request).send().await?).await?;

        let report: BulkResponse = resp.json().await?;
        if report.errors {
            return Err(SinkError::Rejected {
                failed: report.failed_items(),
                total: documents,
            });
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), SinkError> {
        let request = self.client.get(self.node().clone());
        check_status(self.authorize(request).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;
    use crate::record::Level;
    use chrono::TimeZone;

    #[test]
    fn index_follows_utc_date_at_flush_time() {
        let before = Utc.with_ymd_and_hms(2025, 12, 16, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 12, 17, 0, 0, 1).unwrap();
        assert_eq!(index_name("logs", before), "logs-2025.12.16");
        assert_eq!(index_name("logs", after), "logs-2025.12.17");
    }

    #[test]
    fn bulk_body_pairs_action_and_document_lines() {
        let batch = vec![
            LogRecord::new(Level::Info, "first", vec![field("user", "a")]),
            LogRecord::new(Level::Error, "second", vec![field("trace", "t1")]),
        ];
        let (body, documents) = encode_bulk(&batch, "logs-2025.12.16");
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(documents, 2);
        assert_eq!(lines.len(), 4);
        assert!(text.ends_with('\n'));
        for action in [lines[0], lines[2]] {
            let action: serde_json::Value = serde_json::from_str(action).unwrap();
            assert_eq!(action["index"]["_index"], "logs-2025.12.16");
        }
        let first: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first["content"], "first");
        assert_eq!(first["fields"]["user"], "a");
        let second: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(second["level"], "error");
        assert_eq!(second["trace"], "t1");
    }

    #[test]
    fn empty_batch_encodes_nothing() {
        let (body, documents) = encode_bulk(&[], "logs-2025.12.16");
        assert!(body.is_empty());
        assert_eq!(documents, 0);
    }

    #[test]
    fn addresses_without_scheme_follow_ssl_flag() {
        assert_eq!(parse_node("es:9200", false).unwrap().as_str(), "http://es:9200/");
        assert_eq!(parse_node("es:9200", true).unwrap().as_str(), "https://es:9200/");
        assert_eq!(
            parse_node("https://proxy/es", false).unwrap().join("_bulk").unwrap().as_str(),
            "https://proxy/es/_bulk"
        );
        assert!(parse_node("http://", false).is_err());
    }

    #[test]
    fn empty_config_values_get_defaults() {
        let sink = ElasticsearchSink::new(ElasticsearchConfig {
            addresses: Vec::new(),
            index_prefix: String::new(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(sink.config().addresses, vec![DEFAULT_ADDRESS.to_string()]);
        assert_eq!(sink.config().index_prefix, DEFAULT_INDEX_PREFIX);
    }

    #[test]
    fn counts_failed_bulk_items() {
        let report: BulkResponse = serde_json::from_str(
            r#"{"errors":true,"items":[
                {"index":{"status":201}},
                {"index":{"status":400,"error":{"type":"mapper_parsing_exception"}}}
            ]}"#,
        )
        .unwrap();
        assert!(report.errors);
        assert_eq!(report.failed_items(), 1);
    }

    mod wire {
        use super::*;
        use crate::sink::BatchSink;
        use serde_json::Value;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::task::JoinHandle;

        /// Answer a single HTTP request with `status` and `body`. The
        /// handle yields the raw request as received.
        async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = format!("http://{}", listener.local_addr().unwrap());

            let handle = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut raw = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    raw.extend_from_slice(&chunk[..n]);
                    if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
                        let length = head
                            .lines()
                            .find_map(|line| line.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if raw.len() >= end + 4 + length {
                            break;
                        }
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
                String::from_utf8(raw).unwrap()
            });

            (address, handle)
        }

        fn sink(address: String, config: ElasticsearchConfig) -> ElasticsearchSink {
            ElasticsearchSink::new(ElasticsearchConfig {
                addresses: vec![address],
                ..config
            })
            .unwrap()
        }

        fn batch(n: usize) -> Vec<LogRecord> {
            (0..n)
                .map(|i| LogRecord::new(Level::Warn, format!("disk {i} almost full"), vec![field("disk", i)]))
                .collect()
        }

        #[tokio::test]
        async fn batch_is_posted_to_bulk_endpoint_as_ndjson() {
            let (address, request) =
                serve_once("200 OK", r#"{"took":3,"errors":false,"items":[{"index":{"status":201}}]}"#).await;
            let sink = sink(
                address,
                ElasticsearchConfig {
                    index_prefix: "app".to_string(),
                    api_key: Some("secret".to_string()),
                    username: Some("elastic".to_string()),
                    password: Some("changeme".to_string()),
                    ..Default::default()
                },
            );

            sink.send_batch(&batch(1)).await.unwrap();

            let request = request.await.unwrap();
            let (head, body) = request.split_once("\r\n\r\n").unwrap();
            assert!(head.starts_with("POST /_bulk?refresh=false HTTP/1.1\r\n"), "{head}");
            let head = head.to_ascii_lowercase();
            assert!(head.contains("content-type: application/x-ndjson"));
            // The API key wins over basic credentials.
            assert!(head.contains("authorization: apikey secret"));
            assert!(!head.contains("authorization: basic"));

            let lines: Vec<&str> = body.lines().collect();
            assert_eq!(lines.len(), 2);
            let action: Value = serde_json::from_str(lines[0]).unwrap();
            assert!(action["index"]["_index"].as_str().unwrap().starts_with("app-"));
            let doc: Value = serde_json::from_str(lines[1]).unwrap();
            assert_eq!(doc["content"], "disk 0 almost full");
            assert_eq!(doc["level"], "warn");
            assert_eq!(doc["fields"]["disk"], 0);
        }

        #[tokio::test]
        async fn ping_uses_basic_auth() {
            let (address, request) = serve_once("200 OK", r#"{"cluster_name":"logs"}"#).await;
            let sink = sink(
                address,
                ElasticsearchConfig {
                    username: Some("elastic".to_string()),
                    password: Some("changeme".to_string()),
                    ..Default::default()
                },
            );

            sink.ping().await.unwrap();

            let request = request.await.unwrap();
            assert!(request.starts_with("GET / HTTP/1.1\r\n"), "{request}");
            let expected = format!("authorization: basic {}", "ZWxhc3RpYzpjaGFuZ2VtZQ==".to_ascii_lowercase());
            assert!(request.to_ascii_lowercase().contains(&expected));
        }

        #[tokio::test]
        async fn error_status_becomes_status_error() {
            let (address, request) = serve_once("503 Service Unavailable", "overloaded").await;
            let sink = sink(address, ElasticsearchConfig::default());

            let err = sink.send_batch(&batch(2)).await.unwrap_err();
            request.await.unwrap();

            match err {
                SinkError::Status { status, body } => {
                    assert_eq!(status, 503);
                    assert_eq!(body, "overloaded");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn item_errors_become_rejection() {
            let (address, request) = serve_once(
                "200 OK",
                r#"{"errors":true,"items":[
                    {"index":{"status":201}},
                    {"index":{"status":400,"error":{"type":"mapper_parsing_exception"}}}
                ]}"#,
            )
            .await;
            let sink = sink(address, ElasticsearchConfig::default());

            let err = sink.send_batch(&batch(2)).await.unwrap_err();
            request.await.unwrap();

            assert!(matches!(err, SinkError::Rejected { failed: 1, total: 2 }), "{err}");
        }

        #[tokio::test]
        async fn empty_batch_makes_no_request() {
            // Nothing listens here; any request would fail.
            let sink = sink("http://127.0.0.1:1".to_string(), ElasticsearchConfig::default());
            sink.send_batch(&[]).await.unwrap();
        }
    }
}
