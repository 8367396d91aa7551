use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use shared::{
    domain::{Entity, EntityId, Resource},
    error::extract_message,
    search::SearchTerms,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    collection::{CollectionPayload, MutableCollection, RemoteCollection},
    config::Settings,
    error::CollectionError,
};

/// One backend resource reached over HTTP: `GET /{resource}` for the full
/// list and `GET /{resource}/search?field=value` for filtered reads.
#[derive(Debug, Clone)]
pub struct HttpCollection {
    http: Client,
    base_url: Url,
    resource: Resource,
    credentials: Option<(String, String)>,
}

impl HttpCollection {
    pub fn new(settings: &Settings, resource: Resource) -> Result<Self, CollectionError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|err| CollectionError::Config(format!("failed to build http client: {err}")))?;
        let mut collection = Self::with_client(http, &settings.base_url, resource)?;
        collection.credentials = settings
            .credentials()
            .map(|(username, password)| (username.to_string(), password.to_string()));
        Ok(collection)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        resource: Resource,
    ) -> Result<Self, CollectionError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| CollectionError::Config(format!("invalid base url '{base_url}': {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CollectionError::Config(format!(
                "base url '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            http,
            base_url,
            resource,
            credentials: None,
        })
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Sibling collection sharing client, base URL and credentials.
    pub fn for_resource(&self, resource: Resource) -> Self {
        Self {
            resource,
            ..self.clone()
        }
    }

    /// Reads a named sub-path such as `status/EM_OPERACAO` or `abaixo-minimo`.
    pub async fn fetch_named(&self, segments: &[&str]) -> Result<CollectionPayload, CollectionError> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.http.get(url)).await?;
        read_payload(response).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CollectionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CollectionError::Config(format!("base url '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push(self.resource.path())
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, CollectionError> {
        let request = match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        debug!(resource = %self.resource, url = %response.url(), %status, "backend response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);
        warn!(
            resource = %self.resource,
            status = status.as_u16(),
            message = message.as_deref().unwrap_or(""),
            "backend rejected request"
        );
        Err(CollectionError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

async fn read_payload(response: Response) -> Result<CollectionPayload, CollectionError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(CollectionPayload::empty());
    }
    let value: Value = serde_json::from_slice(&bytes)?;
    Ok(CollectionPayload::from_value(value))
}

async fn read_entity(response: Response) -> Result<Entity, CollectionError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl RemoteCollection for HttpCollection {
    fn name(&self) -> &str {
        self.resource.name()
    }

    async fn fetch_all(&self) -> Result<CollectionPayload, CollectionError> {
        let url = self.endpoint(&[])?;
        let response = self.send(self.http.get(url)).await?;
        read_payload(response).await
    }

    async fn fetch_filtered(
        &self,
        terms: &SearchTerms,
    ) -> Result<CollectionPayload, CollectionError> {
        let url = self.endpoint(&["search"])?;
        let response = self
            .send(self.http.get(url).query(&terms.to_query_pairs()))
            .await?;
        read_payload(response).await
    }
}

#[async_trait]
impl MutableCollection for HttpCollection {
    async fn get_by_id(&self, id: &EntityId) -> Result<Entity, CollectionError> {
        let id = id.to_string();
        let url = self.endpoint(&[id.as_str()])?;
        let response = self.send(self.http.get(url)).await?;
        read_entity(response).await
    }

    async fn create(&self, body: &Value) -> Result<Entity, CollectionError> {
        let url = self.endpoint(&[])?;
        let response = self.send(self.http.post(url).json(body)).await?;
        read_entity(response).await
    }

    async fn update(&self, id: &EntityId, body: &Value) -> Result<Entity, CollectionError> {
        let id = id.to_string();
        let url = self.endpoint(&[id.as_str()])?;
        let response = self.send(self.http.put(url).json(body)).await?;
        read_entity(response).await
    }

    async fn delete(&self, id: &EntityId) -> Result<(), CollectionError> {
        let id = id.to_string();
        let url = self.endpoint(&[id.as_str()])?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn act(
        &self,
        id: &EntityId,
        action: &[&str],
        params: &SearchTerms,
    ) -> Result<CollectionPayload, CollectionError> {
        let id = id.to_string();
        let mut segments: Vec<&str> = self.resource.action_scope().into_iter().collect();
        segments.push(id.as_str());
        segments.extend_from_slice(action);

        let url = self.endpoint(&segments)?;
        debug!(resource = %self.resource, %url, "running record action");
        let response = self
            .send(self.http.patch(url).query(&params.to_query_pairs()))
            .await?;
        read_payload(response).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
