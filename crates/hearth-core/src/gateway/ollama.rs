//! [`RemoteGateway`] over the Ollama HTTP API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{GatewayError, ModelDetails, PullProgress, PullStream, RemoteGateway, RemoteModel};

/// Listing and inspection calls are quick; pulls are bounded by the caller.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OllamaGateway {
    base_url: String,
    library_url: String,
    client: Client,
}

impl OllamaGateway {
    pub fn new(base_url: &str, library_url: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(concat!("hearth/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            library_url: library_url.to_owned(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn checked(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    details: WireDetails,
}

#[derive(Debug, Default, Deserialize)]
struct WireDetails {
    #[serde(default)]
    format: String,
    #[serde(default)]
    family: String,
    #[serde(default)]
    parameter_size: String,
    #[serde(default)]
    quantization_level: String,
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    #[serde(default)]
    details: WireDetails,
    #[serde(default)]
    model_info: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    capabilities: Vec<String>,
}

impl From<TagEntry> for RemoteModel {
    fn from(entry: TagEntry) -> Self {
        RemoteModel {
            name: entry.name,
            size: entry.size,
            family: entry.details.family,
            format: entry.details.format,
            parameters: entry.details.parameter_size,
            quantization: entry.details.quantization_level,
        }
    }
}

impl From<ShowResponse> for ModelDetails {
    fn from(show: ShowResponse) -> Self {
        // `model_info` keys are prefixed by the architecture, e.g.
        // `bert.embedding_length`.
        let embedding_dimensions = show
            .model_info
            .iter()
            .find(|(k, _)| k.ends_with(".embedding_length"))
            .and_then(|(_, v)| v.as_i64());
        ModelDetails {
            family: show.details.family,
            format: show.details.format,
            parameter_size: show.details.parameter_size,
            quantization: show.details.quantization_level,
            supports_embeddings: show.capabilities.iter().any(|c| c == "embedding"),
            embedding_dimensions,
        }
    }
}

#[async_trait]
impl RemoteGateway for OllamaGateway {
    async fn list_installed(&self) -> Result<Vec<RemoteModel>, GatewayError> {
        let resp = self
            .client
            .get(self.url("/api/tags"))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        let tags: TagsResponse = Self::checked(resp).await?.json().await?;
        Ok(tags.models.into_iter().map(RemoteModel::from).collect())
    }

    async fn pull(&self, name: &str) -> Result<PullStream, GatewayError> {
        debug!(name, "starting pull");
        let resp = self
            .client
            .post(self.url("/api/pull"))
            .json(&json!({ "model": name, "stream": true }))
            .send()
            .await?;
        let resp = Self::checked(resp).await?;
        Ok(ndjson_events(resp.bytes_stream()))
    }

    async fn delete(&self, name: &str) -> Result<(), GatewayError> {
        let resp = self
            .client
            .delete(self.url("/api/delete"))
            .json(&json!({ "model": name }))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Self::checked(resp).await?;
        Ok(())
    }

    async fn inspect(&self, name: &str) -> Result<ModelDetails, GatewayError> {
        let resp = self
            .client
            .post(self.url("/api/show"))
            .json(&json!({ "model": name }))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        let show: ShowResponse = Self::checked(resp).await?.json().await?;
        Ok(show.into())
    }

    async fn list_catalog(&self) -> Result<Vec<String>, GatewayError> {
        let resp = self
            .client
            .get(&self.library_url)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        let html = Self::checked(resp).await?.text().await?;
        let names = scrape_library_names(&html);
        if names.is_empty() {
            return Err(GatewayError::Remote(
                "library page contained no model links".into(),
            ));
        }
        Ok(names)
    }
}

/// Extract model names from `href="/library/<name>"` links, in page order,
/// without duplicates.
pub fn scrape_library_names(html: &str) -> Vec<String> {
    const MARKER: &str = "href=\"/library/";
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(MARKER) {
        rest = &rest[start + MARKER.len()..];
        let Some(end) = rest.find('"') else { break };
        let name = &rest[..end];
        // Sub-pages such as `/library/llama3/tags` are not model roots.
        let valid = !name.is_empty()
            && !name.contains('/')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'));
        if valid && seen.insert(name.to_owned()) {
            names.push(name.to_owned());
        }
        rest = &rest[end..];
    }
    names
}

/// Decode a newline-delimited JSON byte stream into pull events. Lines may be
/// split across chunks; a transport error ends the stream after being yielded.
pub fn ndjson_events<S, E>(body: S) -> PullStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<GatewayError> + Send + 'static,
{
    struct State<S> {
        body: std::pin::Pin<Box<S>>,
        buf: Vec<u8>,
        done: bool,
    }

    fn parse_line(line: &[u8]) -> Option<Result<PullProgress, GatewayError>> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return None;
        }
        Some(serde_json::from_slice(line).map_err(GatewayError::from))
    }

    let state = State {
        body: Box::pin(body),
        buf: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(pos) = st.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buf.drain(..=pos).collect();
                match parse_line(&line) {
                    Some(item) => return Some((item, st)),
                    None => continue,
                }
            }
            if st.done {
                let tail = std::mem::take(&mut st.buf);
                return parse_line(&tail).map(|item| (item, st));
            }
            match st.body.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.buf.clear();
                    st.done = true;
                    return Some((Err(e.into()), st));
                }
                None => st.done = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod test {
    use super::*;

    fn chunks(
        parts: &'static [&'static str],
    ) -> impl Stream<Item = Result<Bytes, GatewayError>> + Send + 'static {
        let owned: Vec<Result<Bytes, GatewayError>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn ndjson_lines_split_across_chunks_are_reassembled() {
        let body = chunks(&[
            "{\"status\":\"pulling manifest\"}\n{\"status\":\"pull",
            "ing abc\",\"digest\":\"sha256:abc\",\"total\":100,\"completed\":40}\n\n",
            "{\"status\":\"success\"}",
        ]);
        let events: Vec<_> = ndjson_events(body).collect().await;
        assert_eq!(events.len(), 3);

        let second = events[1].as_ref().unwrap();
        assert_eq!(second.status, "pulling abc");
        assert_eq!(second.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(second.percentage(), Some(40.0));
        assert_eq!(events[2].as_ref().unwrap().status, "success");
    }

    #[tokio::test]
    async fn ndjson_error_line_is_surfaced_as_event() {
        let body = chunks(&["{\"error\":\"pull model manifest: file does not exist\"}\n"]);
        let events: Vec<_> = ndjson_events(body).collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].as_ref().unwrap().error.is_some());
    }

    #[tokio::test]
    async fn ndjson_transport_error_ends_stream() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"status\":\"pulling\"}\n{\"sta")),
            Err(GatewayError::Remote("connection reset".into())),
            Ok(Bytes::from_static(b"{\"status\":\"never seen\"}\n")),
        ]);
        let events: Vec<_> = ndjson_events(body).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(GatewayError::Remote(_))));
    }

    #[test]
    fn library_scrape_keeps_model_roots_once() {
        let html = r#"
            <a href="/library/llama3.2" class="group">llama3.2</a>
            <a href="/library/llama3.2/tags">tags</a>
            <a href="/library/mistral">mistral</a>
            <a href="/library/llama3.2">again</a>
            <a href="/blog/something">blog</a>
        "#;
        assert_eq!(scrape_library_names(html), vec!["llama3.2", "mistral"]);
    }

    #[test]
    fn show_response_extracts_embedding_capability() {
        let show: ShowResponse = serde_json::from_value(serde_json::json!({
            "details": { "family": "nomic-bert", "format": "gguf", "parameter_size": "137M", "quantization_level": "F16" },
            "model_info": { "general.architecture": "nomic-bert", "nomic-bert.embedding_length": 768 },
            "capabilities": ["embedding"]
        }))
        .unwrap();
        let details = ModelDetails::from(show);
        assert!(details.supports_embeddings);
        assert_eq!(details.embedding_dimensions, Some(768));
        assert_eq!(details.family, "nomic-bert");
    }
}
