use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("request to {url} failed: {source}")]
pub struct TransportError {
    pub url: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    pub fn new(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TransportError {
            url: url.into(),
            source: source.into(),
        }
    }
}

#[derive(Clone)]
pub enum FormValue {
    Text(String),
    File { file_name: String, bytes: Bytes },
}

impl fmt::Debug for FormValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormValue::Text(text) => write!(f, "{:?}", text),
            FormValue::File { file_name, bytes } => {
                write!(f, "<file {:?}, {} bytes>", file_name, bytes.len())
            }
        }
    }
}

/// Ordered multipart fields. The transport picks the boundary.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    parts: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push((
            name.into(),
            FormValue::File {
                file_name: file_name.into(),
                bytes: bytes.into(),
            },
        ));
        self
    }

    pub fn parts(&self) -> &[(String, FormValue)] {
        &self.parts
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.parts.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Bytes),
    Form(FormData),
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        TransportResponse {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }
}

/// Something that can carry one request to a backend and bring back the
/// raw status and body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// No timeout means a hung backend blocks the caller indefinitely.
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpTransport {
            client: builder.build()?,
        })
    }

    fn into_multipart(form: FormData) -> reqwest::multipart::Form {
        form.parts
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |acc, (name, value)| {
                match value {
                    FormValue::Text(text) => acc.text(name, text),
                    FormValue::File { file_name, bytes } => acc.part(
                        name,
                        reqwest::multipart::Part::stream(bytes).file_name(file_name),
                    ),
                }
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            url,
            method,
            headers,
            body,
        } = request;
        let builder = self.client.request(method, &url).headers(headers);
        let builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes),
            RequestBody::Form(form) => builder.multipart(Self::into_multipart(form)),
        };
        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::new(&url, e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| TransportError::new(&url, e))?;
        Ok(TransportResponse { status, body })
    }
}

/// Canned backend used for front-end work without the real services.
/// Dispatches on the last path segment of the URL.
#[derive(Debug, Clone)]
pub struct MockedTransport {
    delay: Duration,
}

const MOCK_NORMAL_URL: &str = "http://localhost:8000/normal-images/n_sentinel_20250413_133423_104666.jpg";
const MOCK_CORRECTED_URL: &str =
    "http://localhost:8000/corrected-images/c_sentinel_20250413_133423_104666.jpg";
const MOCK_PROCESSED_URL: &str =
    "http://localhost:8000/processed-images/p_sentinel_20250413_133423_104666.jpg";

impl MockedTransport {
    pub fn new(delay: Duration) -> Self {
        MockedTransport { delay }
    }

    fn respond(endpoint: &str) -> serde_json::Value {
        match endpoint {
            "server_images" => serde_json::json!({
                "serverImages": [
                    {
                        "normal": MOCK_NORMAL_URL,
                        "corrected": MOCK_CORRECTED_URL,
                        "processed": MOCK_PROCESSED_URL,
                    },
                    {
                        "normal": "http://localhost:8000/normal-images/n_sentinel_20250401_090000_000001.jpg",
                        "corrected": null,
                        "processed": null,
                    },
                ]
            }),
            "load_image" => serde_json::json!({ "imageUrl": MOCK_NORMAL_URL }),
            "correct" => serde_json::json!({ "path": MOCK_CORRECTED_URL }),
            "segment-clouds" => serde_json::json!({
                "path": MOCK_PROCESSED_URL,
                "cloud_precentage": 50,
            }),
            "last-image" => serde_json::json!({ "path": MOCK_NORMAL_URL }),
            _ => serde_json::json!({}),
        }
    }
}

#[async_trait]
impl Transport for MockedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let endpoint = request
            .url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        Ok(TransportResponse::json(
            StatusCode::OK,
            &Self::respond(endpoint),
        ))
    }
}
