//! Single outbound call to a backend service.
//!
//! The gateway normalizes headers by content type, parses the JSON body,
//! classifies non-success statuses into a [`ServerError`] and optionally checks
//! the payload against a [`ResponseSchema`]. Three failure shapes are
//! surfaced as [`GatewayError`] variants; everything else, including
//! non-success statuses, comes back as an [`HttpResult`].

use crate::logging::Logger;
use crate::server_error::{FunctionalError, ServerError, classify_status};
use crate::transport::{FormData, RequestBody, Transport, TransportError, TransportRequest};
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Statuses whose body may legitimately be absent or not JSON.
const BODYLESS_STATUSES: [u16; 3] = [200, 204, 401];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Json,
    FormData,
}

#[derive(Debug, thiserror::Error)]
#[error("field '{field}' {reason}")]
pub struct SchemaError {
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("response with status {status} is not valid JSON: {source}")]
    Parse {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid response schema: {0}")]
    Validation(#[from] SchemaError),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Shape check applied to the parsed body. `None` means the body was absent
/// or unparseable on a status that allows it.
pub trait ResponseSchema: Send + Sync {
    fn validate(&self, data: Option<&Value>) -> Result<(), SchemaError>;
}

impl<F> ResponseSchema for F
where
    F: Fn(Option<&Value>) -> Result<(), SchemaError> + Send + Sync,
{
    fn validate(&self, data: Option<&Value>) -> Result<(), SchemaError> {
        self(data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    NullableString,
    Number,
    Array,
    Object,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::NullableString => value.is_string() || value.is_null(),
            FieldKind::Number => value.is_number(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }
}

/// Object schema listing fields that must be present with a given kind.
/// Unlisted fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
    fields: Vec<(String, FieldKind)>,
}

impl RequiredFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }
}

impl ResponseSchema for RequiredFields {
    fn validate(&self, data: Option<&Value>) -> Result<(), SchemaError> {
        let object = data
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::new("$", "expected an object"))?;
        for (name, kind) in &self.fields {
            match object.get(name) {
                None => return Err(SchemaError::new(name, "is missing")),
                Some(value) if !kind.accepts(value) => {
                    return Err(SchemaError::new(name, format!("expected {:?}", kind)));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub content_type: ContentType,
    pub schema: Option<Arc<dyn ResponseSchema>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            content_type: ContentType::Json,
            schema: None,
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("content_type", &self.content_type)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post_json<B: Serialize>(body: &B) -> Result<Self, GatewayError> {
        let bytes = serde_json::to_vec(body).map_err(GatewayError::Encode)?;
        Ok(RequestOptions {
            method: Method::POST,
            body: RequestBody::Json(bytes.into()),
            ..Self::default()
        })
    }

    pub fn post_form(form: FormData) -> Self {
        RequestOptions {
            method: Method::POST,
            body: RequestBody::Form(form),
            content_type: ContentType::FormData,
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: impl ResponseSchema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }
}

/// Outcome of a completed exchange. `system_error` is set exactly when the
/// status was not a success.
#[derive(Debug, Clone)]
pub struct HttpResult<T> {
    pub status: StatusCode,
    pub data: Option<T>,
    pub system_error: Option<ServerError>,
    pub functional_error: Option<FunctionalError>,
}

impl<T> HttpResult<T> {
    pub fn is_ok(&self) -> bool {
        self.system_error.is_none() && self.functional_error.is_none()
    }

    /// The payload of a successful exchange.
    pub fn into_data(self) -> Option<T> {
        if self.is_ok() { self.data } else { None }
    }
}

#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, logger: Arc<dyn Logger>) -> Self {
        Gateway { transport, logger }
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub async fn make_request<T>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResult<T>, GatewayError>
    where
        T: DeserializeOwned + fmt::Debug,
    {
        let RequestOptions {
            method,
            mut headers,
            body,
            content_type,
            schema,
        } = options;

        // Form bodies get their Content-Type (with boundary) from the transport.
        if content_type == ContentType::Json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let request = TransportRequest {
            url: url.to_string(),
            method,
            headers,
            body,
        };
        self.logger.log("Url:", &url);
        self.logger.log("Request options:", &request);

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.error("Network error:", &url, &e);
                return Err(e.into());
            }
        };

        let status = response.status;
        let raw = match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) => Some(value),
            Err(_) if BODYLESS_STATUSES.contains(&status.as_u16()) => None,
            Err(e) => {
                self.logger.error(
                    "Response parsing error, backend sent malformed JSON:",
                    &status,
                    &e,
                );
                return Err(GatewayError::Parse {
                    status: status.as_u16(),
                    source: e,
                });
            }
        };
        self.logger.log("Status:", &status.as_u16());

        let system_error = if status.is_success() {
            None
        } else {
            Some(classify_status(status.as_u16()))
        };

        let data = match raw.clone() {
            Some(value) => match serde_json::from_value::<T>(value) {
                Ok(data) => Some(data),
                Err(e) => {
                    if system_error.is_none() {
                        self.logger.warn("Response does not fit the expected type:", &e);
                    }
                    None
                }
            },
            None => None,
        };

        let result = HttpResult {
            status,
            data,
            system_error,
            functional_error: None,
        };
        self.logger.log("Response:", &result);

        if let Some(schema) = schema {
            if let Err(e) = schema.validate(raw.as_ref()) {
                self.logger.error("Invalid json schema:", &raw, &e);
                return Err(e.into());
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_struct::{LoadImageResponse, PathResponse};
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::server_error::ServerErrorKey;
    use crate::test_utils::ScriptedTransport;
    use serde_json::json;

    fn gateway(transport: &Arc<ScriptedTransport>) -> (Gateway, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        (Gateway::new(transport.clone(), logger.clone()), logger)
    }

    #[tokio::test]
    async fn test_json_request_sets_content_type() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("correct", 200, json!({"path": "c_a.jpg"}));
        let (gateway, _) = gateway(&transport);

        let options = RequestOptions::post_json(&json!({"path": "a.jpg"})).unwrap();
        let result = gateway
            .make_request::<PathResponse>("http://svc/correct", options)
            .await
            .unwrap();

        assert!(result.is_ok());
        assert_eq!(result.data.unwrap().path.as_deref(), Some("c_a.jpg"));
        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].headers[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_form_request_leaves_content_type_to_transport() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("load_image", 200, json!({"imageUrl": "n_a.jpg"}));
        let (gateway, _) = gateway(&transport);

        let form = FormData::new().text("previewFileName", "a.jpg");
        gateway
            .make_request::<LoadImageResponse>("http://svc/load_image", RequestOptions::post_form(form))
            .await
            .unwrap();

        assert!(transport.requests()[0].headers.get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_success_has_no_system_error_regardless_of_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("a", 200, json!({"error": "looks bad"}));
        transport.reply_raw("b", 204, "");
        let (gateway, _) = gateway(&transport);

        let a = gateway
            .make_request::<Value>("http://svc/a", RequestOptions::get())
            .await
            .unwrap();
        let b = gateway
            .make_request::<Value>("http://svc/b", RequestOptions::get())
            .await
            .unwrap();
        assert!(a.system_error.is_none());
        assert!(b.system_error.is_none());
        assert!(b.data.is_none());
    }

    #[tokio::test]
    async fn test_non_success_is_classified() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("a", 403, json!({"error": "nope"}));
        transport.reply_json("b", 404, json!({}));
        let (gateway, _) = gateway(&transport);

        let a = gateway
            .make_request::<PathResponse>("http://svc/a", RequestOptions::get())
            .await
            .unwrap();
        let b = gateway
            .make_request::<PathResponse>("http://svc/b", RequestOptions::get())
            .await
            .unwrap();
        assert_eq!(a.system_error.unwrap().key, ServerErrorKey::Forbidden);
        assert_eq!(b.system_error.as_ref().unwrap().key, ServerErrorKey::Unpredictable);
        assert!(b.into_data().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_body_tolerated_on_401() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_raw("a", 401, "");
        let (gateway, _) = gateway(&transport);

        let result = gateway
            .make_request::<Value>("http://svc/a", RequestOptions::get())
            .await
            .unwrap();
        assert!(result.data.is_none());
        assert_eq!(result.system_error.unwrap().key, ServerErrorKey::Unauthorized);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_fatal_on_other_statuses() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_raw("a", 500, "<html>Internal Server Error</html>");
        let (gateway, logger) = gateway(&transport);

        let err = gateway
            .make_request::<Value>("http://svc/a", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Parse { status: 500, .. }));
        assert_eq!(logger.count(LogLevel::Error), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("a");
        let (gateway, _) = gateway(&transport);

        let err = gateway
            .make_request::<Value>("http://svc/a", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn test_success_body_of_wrong_shape_yields_no_data() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("load_image", 200, json!({"imageUrl": 5}));
        let (gateway, logger) = gateway(&transport);

        let result = gateway
            .make_request::<LoadImageResponse>("http://svc/load_image", RequestOptions::get())
            .await
            .unwrap();

        assert!(result.data.is_none());
        assert!(result.system_error.is_none());
        assert_eq!(logger.count(LogLevel::Warn), 1);
        assert_eq!(logger.count(LogLevel::Error), 0);
    }

    #[tokio::test]
    async fn test_schema_failure_is_distinct() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("a", 200, json!({"path": 7}));
        let (gateway, _) = gateway(&transport);

        let schema = RequiredFields::new().field("path", FieldKind::String);
        let err = gateway
            .make_request::<Value>("http://svc/a", RequestOptions::get().with_schema(schema))
            .await
            .unwrap_err();
        match err {
            GatewayError::Validation(e) => assert_eq!(e.field, "path"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schema_closure_passes() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("a", 200, json!({"serverImages": []}));
        let (gateway, _) = gateway(&transport);

        let schema = |data: Option<&Value>| match data.and_then(|d| d.get("serverImages")) {
            Some(Value::Array(_)) => Ok(()),
            _ => Err(SchemaError::new("serverImages", "is not an array")),
        };
        let result = gateway
            .make_request::<Value>("http://svc/a", RequestOptions::get().with_schema(schema))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_logging_covers_each_step() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply_json("a", 200, json!({}));
        let (gateway, logger) = gateway(&transport);

        gateway
            .make_request::<Value>("http://svc/a", RequestOptions::get())
            .await
            .unwrap();
        let messages: Vec<String> = logger.records().into_iter().map(|r| r.message).collect();
        assert_eq!(
            messages,
            vec!["Url:", "Request options:", "Status:", "Response:"]
        );
    }

    #[test]
    fn test_required_fields_rejects_missing_body() {
        let schema = RequiredFields::new().field("imageUrl", FieldKind::String);
        assert!(schema.validate(None).is_err());
        assert!(schema.validate(Some(&json!({}))).is_err());
        assert!(schema.validate(Some(&json!({"imageUrl": "x"}))).is_ok());
        let nullable = RequiredFields::new().field("processed", FieldKind::NullableString);
        assert!(nullable.validate(Some(&json!({"processed": null}))).is_ok());
    }
}
