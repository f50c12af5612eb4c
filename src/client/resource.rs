//! Resource operations
//!
//! [`ResourceApi`] is the per-endpoint surface of the client: cached reads,
//! lazy iteration, JSON:API writes, and bulk operations that collect
//! per-item failures instead of aborting.

use super::bulk::BulkOperationResult;
use super::Client;
use crate::cache::{CacheValue, Fingerprint};
use crate::error::{Error, Result};
use crate::pagination::Page;
use crate::types::{JsonObject, JsonValue, Method, QueryParams, Record};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use std::future::Future;
use tracing::{debug, info};

/// Resource collections exposed by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Organizations,
    Configurations,
    FlexibleAssets,
    Users,
    Passwords,
    Contacts,
    Locations,
    Documents,
}

impl ResourceType {
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Organizations,
        ResourceType::Configurations,
        ResourceType::FlexibleAssets,
        ResourceType::Users,
        ResourceType::Passwords,
        ResourceType::Contacts,
        ResourceType::Locations,
        ResourceType::Documents,
    ];

    /// Collection path relative to the base URL
    pub fn endpoint(self) -> &'static str {
        match self {
            ResourceType::Organizations => "organizations",
            ResourceType::Configurations => "configurations",
            ResourceType::FlexibleAssets => "flexible_assets",
            ResourceType::Users => "users",
            ResourceType::Passwords => "passwords",
            ResourceType::Contacts => "contacts",
            ResourceType::Locations => "locations",
            ResourceType::Documents => "documents",
        }
    }

    /// Value of the JSON:API `type` member
    pub fn json_api_type(self) -> &'static str {
        match self {
            ResourceType::FlexibleAssets => "flexible-assets",
            other => other.endpoint(),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Operations on one resource collection
#[derive(Debug, Clone)]
pub struct ResourceApi {
    client: Client,
    endpoint: String,
    json_api_type: String,
}

impl ResourceApi {
    pub(crate) fn new(
        client: Client,
        endpoint: impl Into<String>,
        json_api_type: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_matches('/').to_string(),
            json_api_type: json_api_type.into(),
        }
    }

    /// Collection path
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn resource_path(&self, id: &str) -> String {
        format!("{}/{}", self.endpoint, id)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch one resource, serving it from the cache while fresh
    pub async fn get_one(&self, id: &str, force_refresh: bool) -> Result<Record> {
        let cache = self.client.cache();
        let key = Fingerprint::for_resource(&self.endpoint, id);

        if force_refresh {
            debug!("Bypassing cache for {}", key);
        } else if let Some(record) = cache.get(&key).await.and_then(CacheValue::into_record) {
            return Ok(record);
        }

        let generation = cache.generation();
        let path = self.resource_path(id);
        let document = self
            .client
            .dispatcher()
            .send(Method::GET, &path, &QueryParams::new(), None)
            .await?;
        let record = Page::from_document(&document)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(path))?;

        cache.put_if_unchanged(key, record.clone(), generation).await;
        Ok(record)
    }

    /// Fetch every record in the collection.
    ///
    /// Pages are cached one by one; the combined list is not.
    pub async fn get_all(&self, params: QueryParams, force_refresh: bool) -> Result<Vec<Record>> {
        let records = self
            .client
            .coordinator(force_refresh)
            .collect_items(&self.endpoint, params, None)
            .await?;
        info!("Fetched {} {} records", records.len(), self.endpoint);
        Ok(records)
    }

    /// Lazily iterate over every record, fetching pages on demand
    pub fn iter(
        &self,
        params: QueryParams,
        force_refresh: bool,
    ) -> impl Stream<Item = Result<Record>> + Send + 'static {
        self.client
            .coordinator(force_refresh)
            .stream_items(&self.endpoint, params, None)
    }

    /// Lazily iterate over pages, at most `max_pages` of them
    pub fn pages(
        &self,
        params: QueryParams,
        max_pages: Option<u32>,
        force_refresh: bool,
    ) -> impl Stream<Item = Result<Page>> + Send + 'static {
        self.client
            .coordinator(force_refresh)
            .stream_pages(&self.endpoint, params, max_pages)
    }

    /// Fetch a single page
    pub async fn list_page(
        &self,
        params: &QueryParams,
        page_number: u32,
        force_refresh: bool,
    ) -> Result<Page> {
        self.client
            .coordinator(force_refresh)
            .fetch_page(&self.endpoint, params, page_number)
            .await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a resource from its attributes
    pub async fn create(&self, attributes: JsonObject) -> Result<Record> {
        let body = json!({
            "data": {
                "type": self.json_api_type,
                "attributes": attributes,
            }
        });
        let document = self
            .client
            .dispatcher()
            .send(Method::POST, &self.endpoint, &QueryParams::new(), Some(&body))
            .await?;

        self.client.cache().invalidate_prefix(&self.endpoint).await;
        first_record(&document, &self.endpoint)
    }

    /// Update attributes of an existing resource.
    ///
    /// When the server acknowledges without a body (204 or `data: null`) the
    /// updated record is read back with a fresh GET.
    pub async fn update(&self, id: &str, attributes: JsonObject) -> Result<Record> {
        let body = json!({
            "data": {
                "type": self.json_api_type,
                "id": id,
                "attributes": attributes,
            }
        });
        let path = self.resource_path(id);
        let document = self
            .client
            .dispatcher()
            .send(Method::PATCH, &path, &QueryParams::new(), Some(&body))
            .await?;

        self.invalidate(id).await;
        match returned_record(&document)? {
            Some(record) => Ok(record),
            None => {
                debug!("{} returned no record, reading it back", path);
                self.get_one(id, true).await
            }
        }
    }

    /// Delete a resource
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.resource_path(id);
        self.client
            .dispatcher()
            .send(Method::DELETE, &path, &QueryParams::new(), None)
            .await?;

        self.invalidate(id).await;
        Ok(())
    }

    /// Drop the cached resource and every cached page of its collection
    async fn invalidate(&self, id: &str) {
        let cache = self.client.cache();
        cache
            .invalidate(&Fingerprint::for_resource(&self.endpoint, id))
            .await;
        cache.invalidate_prefix(&self.endpoint).await;
    }

    // ========================================================================
    // Bulk
    // ========================================================================

    /// Apply the same attributes to many resources
    pub async fn bulk_update<S>(
        &self,
        ids: impl IntoIterator<Item = S>,
        attributes: &JsonObject,
    ) -> BulkOperationResult<String, Record>
    where
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let this = self;
        self.bulk_apply(ids, move |id| async move {
            this.update(&id, attributes.clone()).await
        })
        .await
    }

    /// Delete many resources
    pub async fn bulk_delete<S>(
        &self,
        ids: impl IntoIterator<Item = S>,
    ) -> BulkOperationResult<String, ()>
    where
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let this = self;
        self.bulk_apply(ids, move |id| async move { this.delete(&id).await })
            .await
    }

    /// Run `op` for every input with bounded concurrency.
    ///
    /// Every attempt still draws from the shared rate budget, so the
    /// concurrency bound only limits requests in flight. Results come back
    /// in input order and one failure never stops the others.
    pub async fn bulk_apply<I, T, F, Fut>(&self, inputs: Vec<I>, op: F) -> BulkOperationResult<I, T>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total = inputs.len();
        let op = &op;
        let result: BulkOperationResult<I, T> = stream::iter(inputs)
            .map(move |input| async move {
                let outcome = op(input.clone()).await;
                (input, outcome)
            })
            .buffered(self.client.config().bulk_concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        info!(
            "Bulk operation on {}: {} of {} succeeded",
            self.endpoint,
            result.succeeded.len(),
            total
        );
        result
    }
}

/// Record carried by a write response, `None` when there is no `data`
fn returned_record(document: &JsonValue) -> Result<Option<Record>> {
    match document.get("data") {
        None | Some(JsonValue::Null) => Ok(None),
        Some(_) => Ok(Page::from_document(document)?.into_iter().next()),
    }
}

/// First record of a write response
fn first_record(document: &JsonValue, path: &str) -> Result<Record> {
    Page::from_document(document)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::malformed(format!("{path}: response carried no record")))
}
