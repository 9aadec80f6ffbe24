use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use url::Url;

use crate::generate::error::{GenerateError, GenerateResult};

/// Read-only JSON API access used by discovery functions
pub trait ApiClient: Send + Sync {
    /// GET `path` (relative to the client's base URL, may carry a query string)
    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, GenerateResult<JsonValue>>;
}

/// How requests authenticate
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// `user:password` is basic auth, anything else a bearer token
    pub fn parse(auth: &str) -> Self {
        match auth.split_once(':') {
            Some((username, password)) => Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            None => Credentials::Bearer(auth.to_string()),
        }
    }

    /// Basic auth can switch organizations, a token is bound to one
    pub fn is_single_org(&self) -> bool {
        matches!(self, Credentials::Bearer(_))
    }
}

/// reqwest-backed client
pub struct HttpApiClient {
    base_url: Url,
    credentials: Credentials,
    client: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(base_url: &str, credentials: Credentials) -> GenerateResult<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            GenerateError::InvalidInput(format!("invalid URL '{}': {}", base_url, e))
        })?;
        // Keep a trailing slash so relative joins append instead of replacing the last segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("tfgen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerateError::Api(e.to_string()))?;

        Ok(Self {
            base_url,
            credentials,
            client,
        })
    }

    fn url(&self, path: &str) -> GenerateResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GenerateError::InvalidInput(format!("invalid API path '{}': {}", path, e)))
    }
}

impl ApiClient for HttpApiClient {
    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, GenerateResult<JsonValue>> {
        Box::pin(async move {
            let url = self.url(path)?;
            let request = match &self.credentials {
                Credentials::Bearer(token) => self.client.get(url.clone()).bearer_auth(token),
                Credentials::Basic { username, password } => self
                    .client
                    .get(url.clone())
                    .basic_auth(username, Some(password)),
            };

            let response = request
                .send()
                .await
                .map_err(|e| GenerateError::Api(format!("GET {}: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerateError::Api(format!(
                    "GET {} returned {}: {}",
                    url,
                    status,
                    body.trim()
                )));
            }

            response
                .json::<JsonValue>()
                .await
                .map_err(|e| GenerateError::Api(format!("GET {}: invalid JSON: {}", url, e)))
        })
    }
}

/// Canned responses keyed by path, for tests
#[cfg(test)]
pub struct MockApiClient {
    responses: std::collections::HashMap<String, JsonValue>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockApiClient {
    pub fn new() -> Self {
        Self {
            responses: std::collections::HashMap::new(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, path: &str, response: JsonValue) -> Self {
        self.responses.insert(path.to_string(), response);
        self
    }

    /// How many times `path` was requested
    pub fn call_count(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }
}

#[cfg(test)]
impl ApiClient for MockApiClient {
    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, GenerateResult<JsonValue>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(path.to_string());
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| GenerateError::Api(format!("GET {} returned 404 Not Found", path)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_parse() {
        assert_eq!(
            Credentials::parse("admin:secret"),
            Credentials::Basic {
                username: "admin".to_string(),
                password: "secret".to_string()
            }
        );
        assert!(Credentials::parse("glsa_token").is_single_org());
        assert!(!Credentials::parse("admin:secret").is_single_org());
    }

    #[test]
    fn test_url_join_keeps_base_path() {
        let client = HttpApiClient::new(
            "https://example.grafana.net/grafana",
            Credentials::parse("token"),
        )
        .unwrap();

        assert_eq!(
            client.url("/api/folders?limit=1000").unwrap().as_str(),
            "https://example.grafana.net/grafana/api/folders?limit=1000"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpApiClient::new("not a url", Credentials::parse("t")).is_err());
    }
}
