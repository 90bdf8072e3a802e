// ── Remote data source seam ──
//
// The loader and fetcher talk to the platform only through
// `HierarchySource`. `PlatformSource` is the HTTP implementation; tests
// substitute in-memory fakes.

use std::future::Future;

use arbor_api::{HierarchyQuery, PlatformClient, TemplateRecord};

use crate::config::SourceConfig;
use crate::error::CoreError;
use crate::model::HierarchyResponse;

/// Template and hierarchy retrieval.
pub trait HierarchySource: Send + Sync {
    /// Retrieve the template record named `name`.
    fn fetch_template(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<TemplateRecord, CoreError>> + Send;

    /// Retrieve one hierarchy. The query has already been validated.
    fn fetch_hierarchy(
        &self,
        query: &HierarchyQuery,
    ) -> impl Future<Output = Result<HierarchyResponse, CoreError>> + Send;
}

/// [`HierarchySource`] backed by the platform's HTTP API.
#[derive(Debug, Clone)]
pub struct PlatformSource {
    client: PlatformClient,
}

impl PlatformSource {
    pub fn new(config: &SourceConfig) -> Result<Self, CoreError> {
        let client = PlatformClient::new(config.url.clone(), &config.transport())?;
        Ok(Self { client })
    }

    pub fn from_client(client: PlatformClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PlatformClient {
        &self.client
    }
}

impl HierarchySource for PlatformSource {
    async fn fetch_template(&self, name: &str) -> Result<TemplateRecord, CoreError> {
        Ok(self.client.get_template(name).await?)
    }

    async fn fetch_hierarchy(&self, query: &HierarchyQuery) -> Result<HierarchyResponse, CoreError> {
        let payload = self.client.get_hierarchy(query).await?;
        Ok(HierarchyResponse::from(payload))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::FaultKind;

    async fn source(server: &MockServer) -> PlatformSource {
        let url = server
            .uri()
            .parse()
            .expect("mock uri should parse");
        PlatformSource::new(&SourceConfig::new(url)).unwrap()
    }

    #[tokio::test]
    async fn converts_payload_to_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/hierarchy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalRecordCount": 2,
                "baseUrl": "https://acme.example.com",
                "superParentList": [{"Id": "A"}],
                "parentMap": {"A": [{"Id": "B"}]}
            })))
            .mount(&server)
            .await;

        let query = HierarchyQuery {
            s_object_api_name: "Account".into(),
            record_id: "A".into(),
            root_field_api_name: None,
            parent_field_api_name: None,
            fields_to_query: "Id".into(),
        };
        let response = source(&server)
            .await
            .fetch_hierarchy(&query)
            .await
            .unwrap();

        assert_eq!(response.total_count, 2);
        assert_eq!(response.children_of(&"A".into()).map(<[_]>::len), Some(1));
    }

    #[tokio::test]
    async fn missing_template_is_a_config_load_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/templates/Nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = source(&server)
            .await
            .fetch_template("Nope")
            .await
            .expect_err("template should be missing");
        assert_eq!(err.kind(), FaultKind::ConfigLoadFailed);
    }
}
