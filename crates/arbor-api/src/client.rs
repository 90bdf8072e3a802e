// Platform HTTP client
//
// Wraps `reqwest::Client` with URL construction and response decoding for
// the two endpoints the hierarchy widget needs. Authentication is a bearer
// token installed by `TransportConfig`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{HierarchyPayload, HierarchyQuery, TemplateRecord};
use crate::transport::TransportConfig;

/// Raw HTTP client for the platform's template and hierarchy endpoints.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Url,
}

impl PlatformClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the platform root (e.g. `https://acme.example.com`);
    /// endpoint paths are appended under `/api/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The platform base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch the template record named `name`.
    ///
    /// A 404 becomes [`Error::TemplateNotFound`].
    pub async fn get_template(&self, name: &str) -> Result<TemplateRecord, Error> {
        let url = self.api_url(&["templates", name])?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::TemplateNotFound { name: name.into() });
        }
        self.decode(resp).await
    }

    /// Fetch one record hierarchy.
    pub async fn get_hierarchy(&self, query: &HierarchyQuery) -> Result<HierarchyPayload, Error> {
        let url = self.api_url(&["hierarchy"])?;
        self.post(url, query).await
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{segments...}` with each segment percent-encoded.
    pub(crate) fn api_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty().push("api");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self.http.post(url).json(body).send().await?;
        self.decode(resp).await
    }

    /// Map HTTP status to errors and decode a JSON body.
    async fn decode<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("platform rejected the access token (HTTP {})", status.as_u16()),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(Error::Status {
                status: status.as_u16(),
                message: preview,
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}
