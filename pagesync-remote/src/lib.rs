//! HTTP/JSON client for the reader server's `/api` routes.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pagesync_core::{
    BookmarkRecord, BookmarkService, Config, DocumentLister, DocumentRef, NewBookmark,
    PageUpdater, SearchHit, SearchService,
};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("server url {0} cannot be used as a base url")]
    InvalidBaseUrl(String),
    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Serialize)]
struct UpdatePageRequest {
    current_page: u32,
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base: Url,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid server url {base_url}"))?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::InvalidBaseUrl(base_url.to_owned()).into());
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.server_url, config.request_timeout)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("api")
            .push("documents")
            .extend(segments);
        Ok(url)
    }

    fn search_endpoint(&self, document: &str, query: &str) -> Result<Url> {
        let mut url = self.endpoint(&[document, "search"])?;
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }
}

async fn expect_success(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        operation,
        status,
        body,
    }
    .into())
}

#[async_trait]
impl DocumentLister for HttpRemote {
    #[instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<DocumentRef>> {
        let url = self.endpoint(&[])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("failed to fetch documents")?;
        let documents: Vec<DocumentRef> = expect_success("listing documents", response)
            .await?
            .json()
            .await
            .context("failed to decode document list")?;
        debug!(count = documents.len(), "fetched documents");
        Ok(documents)
    }
}

#[async_trait]
impl PageUpdater for HttpRemote {
    #[instrument(skip(self))]
    async fn update_page(&self, document: &str, page: u32) -> Result<()> {
        let url = self.endpoint(&[document])?;
        let response = self
            .client
            .patch(url)
            .json(&UpdatePageRequest { current_page: page })
            .send()
            .await
            .with_context(|| format!("failed to update current page of {document}"))?;
        expect_success("updating current page", response).await?;
        Ok(())
    }
}

#[async_trait]
impl BookmarkService for HttpRemote {
    #[instrument(skip(self))]
    async fn list_bookmarks(&self, document: &str) -> Result<Vec<BookmarkRecord>> {
        let url = self.endpoint(&[document, "bookmarks"])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch bookmarks of {document}"))?;
        expect_success("listing bookmarks", response)
            .await?
            .json()
            .await
            .context("failed to decode bookmarks")
    }

    #[instrument(skip(self))]
    async fn add_bookmark(&self, document: &str, bookmark: &NewBookmark) -> Result<BookmarkRecord> {
        let url = self.endpoint(&[document, "bookmarks"])?;
        let response = self
            .client
            .post(url)
            .json(bookmark)
            .send()
            .await
            .with_context(|| format!("failed to add bookmark to {document}"))?;
        expect_success("adding bookmark", response)
            .await?
            .json()
            .await
            .context("failed to decode created bookmark")
    }

    #[instrument(skip(self))]
    async fn delete_bookmark(&self, document: &str, bookmark_id: &str) -> Result<()> {
        let url = self.endpoint(&[document, "bookmarks", bookmark_id])?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .with_context(|| format!("failed to delete bookmark {bookmark_id}"))?;
        expect_success("deleting bookmark", response).await?;
        Ok(())
    }
}

#[async_trait]
impl SearchService for HttpRemote {
    #[instrument(skip(self))]
    async fn search(&self, document: &str, query: &str) -> Result<Vec<SearchHit>> {
        let url = self.search_endpoint(document, query)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to search {document}"))?;
        expect_success("searching document", response)
            .await?
            .json()
            .await
            .context("failed to decode search results")
    }
}
