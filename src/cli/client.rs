use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::entities::EntityKind;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response; `body` is the server's error envelope as sent
    #[error("server returned {status}: {body}")]
    Api { status: StatusCode, body: Value },
}

/// Thin HTTP client for the `/api/<entity>` routes
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token,
        })
    }

    fn url(&self, kind: EntityKind, id: Option<&str>) -> Result<Url, ClientError> {
        let path = match id {
            Some(id) => format!("api/{}/{}", kind.route(), id),
            None => format!("api/{}", kind.route()),
        };
        Ok(self.base.join(&path)?)
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status.is_success() {
            Ok(body)
        } else {
            Err(ClientError::Api { status, body })
        }
    }

    pub async fn get(&self, kind: EntityKind, id: &str, params: &[(String, String)]) -> Result<Value, ClientError> {
        let mut url = self.url(kind, Some(id))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        self.send(Method::GET, url, None).await
    }

    pub async fn list(&self, kind: EntityKind, params: &[(String, String)]) -> Result<Value, ClientError> {
        let mut url = self.url(kind, None)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        self.send(Method::GET, url, None).await
    }

    pub async fn create(&self, kind: EntityKind, body: &Value) -> Result<Value, ClientError> {
        let url = self.url(kind, None)?;
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn update(&self, kind: EntityKind, id: &str, body: &Value) -> Result<Value, ClientError> {
        let url = self.url(kind, Some(id))?;
        self.send(Method::PUT, url, Some(body)).await
    }

    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<Value, ClientError> {
        let url = self.url(kind, Some(id))?;
        self.send(Method::DELETE, url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_entity_routes_under_base_path() {
        let client = ApiClient::new("http://fleet.test/v1", None).unwrap();
        let url = client.url(EntityKind::PerformanceAssessment, Some("abc")).unwrap();
        assert_eq!(url.as_str(), "http://fleet.test/v1/api/performance-assessments/abc");

        let url = client.url(EntityKind::User, None).unwrap();
        assert_eq!(url.as_str(), "http://fleet.test/v1/api/users");
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(ApiClient::new("not a url", None), Err(ClientError::InvalidUrl(_))));
    }
}
