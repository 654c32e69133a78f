use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::json;
use url::Url;

use crate::app::{LensError, Result};
use crate::client::{ContentService, ExtractedBlog, TextOperationRequest};
use crate::config::ApiConfig;
use crate::domain::{Feed, SearchResponse};

pub struct HttpContentService {
    client: Client,
    base_url: Url,
}

impl HttpContentService {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("lens/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        let response = self.client.post(url.clone()).json(body).send().await?;
        Self::check_status(&url, response)
    }

    fn check_status(url: &Url, response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(LensError::ServiceUnavailable(format!(
                "{} returned {}",
                url, status
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentService for HttpContentService {
    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let url = self.endpoint("feeds/")?;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let feeds = Self::check_status(&url, response)?.json().await?;
        Ok(feeds)
    }

    async fn extract_blog(&self, url: &str) -> Result<ExtractedBlog> {
        let response = self
            .post("feeds/extractblog", &json!({ "url": url }))
            .await?;
        Ok(response.json().await?)
    }

    async fn search(&self, query: &str, k: usize) -> Result<SearchResponse> {
        let response = self
            .post("feeds/search", &json!({ "query": query, "k": k }))
            .await?;
        Ok(response.json().await?)
    }

    async fn text_operation(&self, request: &TextOperationRequest) -> Result<String> {
        let response = self.post("feeds/groq", &request.body()).await?;
        let value: serde_json::Value = response.json().await?;
        request.extract_output(&value)
    }
}
