use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, Method},
};
use std::convert::Infallible;

/// The raw inbound request, captured before any parsing so it can be audited
/// and dead-lettered verbatim.
///
/// Extraction never fails: a body that cannot be read (over the size limit,
/// broken stream) is logged and treated as empty, so the request is still
/// audited.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub url: String,
    pub query: Option<String>,
    pub body: Bytes,
}

impl CapturedRequest {
    /// Body as text for logging; `None` when empty
    pub fn body_text(&self) -> Option<String> {
        if self.body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.body).into_owned())
        }
    }

    /// First non-empty value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == name && !value.trim().is_empty())
            .map(|(_, value)| value.into_owned())
    }
}

#[async_trait]
impl<S> FromRequest<S> for CapturedRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let url = absolute_url(req.headers(), req.uri());
        let query = req.uri().query().map(str::to_string);

        let body = match Bytes::from_request(req, state).await {
            Ok(body) => body,
            Err(rejection) => {
                tracing::warn!("Failed to read request body: {}", rejection);
                Bytes::new()
            }
        };

        Ok(Self {
            method,
            url,
            query,
            body,
        })
    }
}

fn absolute_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    format!("{}://{}{}", scheme, host, path)
}
