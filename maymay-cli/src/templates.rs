//! Client for the template catalogue service.
//!
//! The service is a small CRUD API:
//! `GET /templates?q=`, `GET /templates/:id`, `POST /templates`.

use std::sync::Arc;

use maymay_core::template::{filter_templates, placeholder_templates};
use maymay_core::Template;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Default catalogue location.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Errors that can occur when talking to the catalogue.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The catalogue base URL is invalid.
    #[error("invalid catalogue URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("catalogue request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The payload was not the expected JSON.
    #[error("failed to parse catalogue payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The service answered with a non-success status.
    #[error("catalogue returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Body or reason phrase.
        message: String,
    },
}

/// Catalogue client.
#[derive(Clone)]
pub struct TemplateClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base: Url,
}

#[derive(Serialize)]
struct NewTemplate<'a> {
    name: &'a str,
    url: &'a str,
}

impl TemplateClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidUrl`] if the URL is malformed.
    /// Returns [`TemplateError::Http`] if the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, TemplateError> {
        let mut base = Url::parse(base_url).map_err(|e| TemplateError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(TemplateError::InvalidUrl(base_url.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(concat!("maymay-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner { http, base }),
        })
    }

    /// Base URL requests are made against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, TemplateError> {
        self.inner
            .base
            .join(path)
            .map_err(|e| TemplateError::InvalidUrl(e.to_string()))
    }

    /// List templates, optionally filtered by a name query.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    pub async fn list(&self, query: Option<&str>) -> Result<Vec<Template>, TemplateError> {
        let mut url = self.endpoint("templates")?;
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            url.query_pairs_mut().append_pair("q", q);
        }
        let response = self.inner.http.get(url).send().await?;
        Self::parse(response).await
    }

    /// Fetch a single template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Status`] with 404 if no such template exists.
    pub async fn get(&self, id: i64) -> Result<Template, TemplateError> {
        let url = self.endpoint(&format!("templates/{id}"))?;
        let response = self.inner.http.get(url).send().await?;
        Self::parse(response).await
    }

    /// Register a new template.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the record.
    pub async fn create(&self, name: &str, url: &str) -> Result<Template, TemplateError> {
        let endpoint = self.endpoint("templates")?;
        let body = NewTemplate {
            name: name.trim(),
            url: url.trim(),
        };
        let response = self.inner.http.post(endpoint).json(&body).send().await?;
        Self::parse(response).await
    }

    /// List templates, falling back to the filtered placeholder set when the
    /// catalogue cannot be reached or answers badly.
    pub async fn list_or_placeholder(&self, query: &str) -> Vec<Template> {
        match self.list(Some(query)).await {
            Ok(templates) => templates,
            Err(e) => {
                tracing::warn!("Template catalogue unavailable, using placeholders: {e}");
                filter_templates(placeholder_templates(), query)
            }
        }
    }

    async fn parse<T>(response: reqwest::Response) -> Result<T, TemplateError>
    where
        for<'de> T: serde::Deserialize<'de>,
    {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TemplateError::Status {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.canonical_reason().unwrap_or("unknown").to_string()
                } else {
                    body
                },
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}
