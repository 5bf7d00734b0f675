//! Request description types.

use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// A file attached to a multipart request.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type of the content.
    pub content_type: String,
    /// File content.
    pub data: Vec<u8>,
}

impl FilePart {
    /// Creates an `application/octet-stream` file part.
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: "application/octet-stream".to_string(),
            data,
        }
    }
}

/// Multipart form payload.
///
/// Kept as plain data so the form can be rebuilt for every retry attempt.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    /// Text fields, in order.
    pub fields: Vec<(String, String)>,
    /// File fields, in order.
    pub files: Vec<FilePart>,
}

impl Multipart {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Adds a file field.
    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub(crate) fn to_form(&self) -> crate::Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let part = reqwest::multipart::Part::bytes(file.data.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| {
                    crate::Error::Configuration(format!("Invalid content type: {}", e))
                })?;
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

/// Request payload.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A JSON document.
    Json(serde_json::Value),
    /// A multipart form.
    Multipart(Multipart),
}

/// Metadata for an individual HTTP request.
///
/// This type contains everything needed to make a single request: method,
/// path, headers, query parameters and body.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path (relative to the base URL).
    pub path: String,

    /// Additional headers for this request. These override the defaults.
    pub headers: HeaderMap,

    /// Query parameters for this request, in order.
    pub query_params: Vec<(String, String)>,

    /// The request body.
    pub body: RequestBody,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query_params.push((key.into(), value.to_string()));
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Serializes `body` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if `body` cannot be serialized.
    pub fn with_json<T>(mut self, body: &T) -> Result<Self, crate::Error>
    where
        T: serde::Serialize + ?Sized,
    {
        let json =
            serde_json::to_value(body).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.body = RequestBody::Json(json);
        Ok(self)
    }

    /// Sets a multipart payload.
    pub fn with_multipart(mut self, form: Multipart) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Returns `true` if the body is a multipart form.
    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let metadata = RequestMetadata::new(Method::POST, "/filters")
            .with_query_param("page", 2)
            .with_query_params([("per_page", "50")])
            .with_header("X-Trace", "on")
            .unwrap()
            .with_json(&serde_json::json!({"name": "rpi"}))
            .unwrap();

        assert_eq!(
            metadata.query_params,
            vec![
                ("page".to_string(), "2".to_string()),
                ("per_page".to_string(), "50".to_string())
            ]
        );
        assert_eq!(metadata.headers.get("x-trace").unwrap(), "on");
        assert!(matches!(metadata.body, RequestBody::Json(_)));
        assert!(!metadata.is_multipart());
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let result = RequestMetadata::default().with_header("bad header", "x");
        assert!(matches!(result, Err(crate::Error::Configuration(_))));
    }

    #[test]
    fn test_multipart_form_builds() {
        let form = Multipart::new()
            .text("description", "nightly")
            .file(FilePart::new("artifact", "app.mender", vec![1, 2, 3]));
        assert!(form.to_form().is_ok());

        let metadata = RequestMetadata::new(Method::POST, "/artifacts").with_multipart(form);
        assert!(metadata.is_multipart());
    }
}
