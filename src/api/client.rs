// src/api/client.rs
//! HTTP client wrapper for the Paperless REST API.
//!
//! A thin layer around reqwest that handles token authentication, URL
//! construction, and the mapping of non-success responses into typed
//! errors. Domain endpoints live here; pagination lives in
//! [`super::pagination`].

use crate::api::pagination::fetch_all_pages;
use crate::api::types::{CustomField, CustomFieldKind, Document, NamedResource};
use crate::config::PaperlessConfig;
use crate::constants::PAPERLESS_PAGE_SIZE;
use crate::error::{AppError, PaperlessErrorKind};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

/// A client for one Paperless instance, authenticated at construction.
#[derive(Clone)]
pub struct PaperlessClient {
    http: Client,
    base_url: Url,
}

impl PaperlessClient {
    /// Creates a client with token authentication baked into the
    /// default headers.
    pub fn new(config: &PaperlessConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();
        let auth = format!("Token {}", config.token);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&auth).map_err(|e| {
                AppError::MissingConfiguration(format!("Invalid API token format: {}", e))
            })?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Builds an absolute URL for an `/api/...` path.
    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Maps a non-success response into a typed error, classifying the
    /// body once so callers can pattern-match on duplicate-name
    /// conflicts.
    async fn check(response: Response) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let path = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::PaperlessService {
            status,
            kind: PaperlessErrorKind::classify(status, &body),
            path,
            body,
        })
    }

    /// GET an absolute URL and deserialize the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AppError> {
        log::debug!("GET {}", url);
        let response = Self::check(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let url = self.endpoint(path)?;
        log::debug!("POST {}", url);
        let response = Self::check(self.http.post(url).json(body).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn patch_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), AppError> {
        let url = self.endpoint(path)?;
        log::debug!("PATCH {}", url);
        Self::check(self.http.patch(url).json(body).send().await?).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let url = self.endpoint(path)?;
        log::debug!("DELETE {}", url);
        Self::check(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    /// First-page URL for a collection, at the maximum page size.
    fn collection_url(&self, collection: &str) -> Result<Url, AppError> {
        let mut url = self.endpoint(&format!("api/{}/", collection))?;
        url.query_pairs_mut()
            .append_pair("page_size", &PAPERLESS_PAGE_SIZE.to_string());
        Ok(url)
    }

    // --- Tags and correspondents ---

    pub async fn tags(&self) -> Result<Vec<NamedResource>, AppError> {
        let url = self.collection_url("tags")?;
        fetch_all_pages(self, url).await
    }

    pub async fn correspondents(&self) -> Result<Vec<NamedResource>, AppError> {
        let url = self.collection_url("correspondents")?;
        fetch_all_pages(self, url).await
    }

    pub async fn create_tag(&self, name: &str) -> Result<NamedResource, AppError> {
        self.post_json("api/tags/", &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn create_correspondent(&self, name: &str) -> Result<NamedResource, AppError> {
        self.post_json("api/correspondents/", &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn rename_correspondent(&self, id: u64, name: &str) -> Result<(), AppError> {
        self.patch_json(
            &format!("api/correspondents/{}/", id),
            &serde_json::json!({ "name": name }),
        )
        .await
    }

    pub async fn delete_correspondent(&self, id: u64) -> Result<(), AppError> {
        self.delete(&format!("api/correspondents/{}/", id)).await
    }

    // --- Custom fields ---

    pub async fn custom_fields(&self) -> Result<Vec<CustomField>, AppError> {
        let url = self.collection_url("custom_fields")?;
        fetch_all_pages(self, url).await
    }

    /// Exact-name (case-insensitive) custom-field lookup.
    pub async fn custom_fields_named(&self, name: &str) -> Result<Vec<CustomField>, AppError> {
        let mut url = self.endpoint("api/custom_fields/")?;
        url.query_pairs_mut().append_pair("name__iexact", name);
        fetch_all_pages(self, url).await
    }

    pub async fn create_custom_field(
        &self,
        name: &str,
        data_type: CustomFieldKind,
        extra_data: Option<serde_json::Value>,
    ) -> Result<CustomField, AppError> {
        self.post_json(
            "api/custom_fields/",
            &serde_json::json!({
                "name": name,
                "data_type": data_type,
                "extra_data": extra_data.unwrap_or_else(|| serde_json::json!({})),
            }),
        )
        .await
    }

    // --- Documents ---

    pub async fn document(&self, id: u64) -> Result<Document, AppError> {
        let url = self.endpoint(&format!("api/documents/{}/", id))?;
        self.get_json(url).await
    }

    pub async fn documents(&self) -> Result<Vec<Document>, AppError> {
        let url = self.collection_url("documents")?;
        fetch_all_pages(self, url).await
    }

    pub async fn documents_for_correspondent(&self, id: u64) -> Result<Vec<Document>, AppError> {
        let mut url = self.collection_url("documents")?;
        url.query_pairs_mut()
            .append_pair("correspondent__id", &id.to_string());
        fetch_all_pages(self, url).await
    }

    /// Partial update of a document's metadata.
    pub async fn update_document<B: Serialize>(&self, id: u64, patch: &B) -> Result<(), AppError> {
        self.patch_json(&format!("api/documents/{}/", id), patch)
            .await
    }

    /// Appends a free-text note to a document.
    pub async fn add_note(&self, id: u64, note: &str) -> Result<(), AppError> {
        let url = self.endpoint(&format!("api/documents/{}/notes/", id))?;
        log::debug!("POST {}", url);
        Self::check(
            self.http
                .post(url)
                .json(&serde_json::json!({ "note": note }))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}
