//! Content normalizer: turn an arbitrary URL into plain text.
//!
//! Classification precedence (case-insensitive substring on the URL):
//! 1. contains "arxiv": resolve the id through the arXiv catalog, fetch PDF
//! 2. contains "pdf": fetch the URL directly as PDF bytes
//! 3. otherwise: fetch as HTML with a browser-like User-Agent, convert to
//!    markdown-ish text
//!
//! Every call re-fetches; there is no cache.

use crate::arxiv;
use crate::extract::{bytes_look_like_pdf, html_to_markdown, pdf_to_text};
use paperdrop_core::{ContentDownloader, Error, Result};
use std::time::Duration;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const ARXIV_LOOKUP_TIMEOUT_MS: u64 = 10_000;

/// Sites reject obvious non-browser agents for HTML pages; PDF endpoints
/// don't care.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Arxiv,
    Pdf,
    Html,
}

/// Pure classification step; precedence is arxiv > pdf > html.
pub fn classify(url: &str) -> SourceKind {
    let lower = url.to_ascii_lowercase();
    if lower.contains("arxiv") {
        SourceKind::Arxiv
    } else if lower.contains("pdf") {
        SourceKind::Pdf
    } else {
        SourceKind::Html
    }
}

#[derive(Debug, Clone)]
pub struct LocalDownloader {
    client: reqwest::Client,
    arxiv_endpoint: reqwest::Url,
}

impl LocalDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("paperdrop-local/0.1")
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(FETCH_TIMEOUT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(e.to_string()))?;
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Result<Self> {
        Ok(Self {
            client,
            arxiv_endpoint: arxiv::arxiv_api_endpoint()?,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} fetching {url}",
                resp.status().as_u16()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_pdf_text(&self, url: &str) -> Result<String> {
        let bytes = self.fetch_bytes(url).await?;
        if !bytes_look_like_pdf(&bytes) {
            return Err(Error::Download(format!("response is not a pdf: {url}")));
        }
        debug!(url, bytes = bytes.len(), "extracting pdf text");
        pdf_to_text(&bytes).map_err(Error::Download)
    }

    async fn fetch_html_markdown(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} fetching {url}",
                resp.status().as_u16()
            )));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        Ok(html_to_markdown(&html))
    }
}

#[async_trait::async_trait]
impl ContentDownloader for LocalDownloader {
    async fn download_content(&self, url: &str) -> Result<String> {
        match classify(url) {
            SourceKind::Arxiv => {
                // All normalizer failures surface as Download, id parsing
                // included.
                let id = arxiv::arxiv_id_from_url(url)
                    .map_err(|e| Error::Download(e.to_string()))?;
                debug!(url, id, "resolving arxiv id to pdf url");
                let pdf_url = arxiv::lookup_pdf_url(
                    &self.client,
                    self.arxiv_endpoint.clone(),
                    &id,
                    ARXIV_LOOKUP_TIMEOUT_MS,
                )
                .await?;
                self.fetch_pdf_text(&pdf_url).await
            }
            SourceKind::Pdf => self.fetch_pdf_text(url).await,
            SourceKind::Html => self.fetch_html_markdown(url).await,
        }
    }
}
