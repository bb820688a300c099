use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::types::{Collection, Color, Orientation, Photo};

/// The photo-fetching collaborator. The feed store only ever talks to this
/// trait so tests can swap in a canned implementation.
#[async_trait]
pub trait PhotoApi: Send + Sync {
    async fn photos(
        &self,
        page: u32,
        per_page: u32,
        color: Option<Color>,
        orientation: Option<Orientation>,
    ) -> Result<Vec<Photo>, String>;

    /// Failures are swallowed into an empty result set, matching the
    /// behavior UIs built on this contract expect.
    async fn search_photos(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
        color: Option<Color>,
        orientation: Option<Orientation>,
    ) -> Result<Vec<Photo>, String>;

    async fn topic_photos(
        &self,
        slug: &str,
        page: u32,
        per_page: u32,
        color: Option<Color>,
        orientation: Option<Orientation>,
    ) -> Result<Vec<Photo>, String>;

    async fn collection_photos(
        &self,
        collection_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Photo>, String>;

    async fn collections(&self, page: u32, per_page: u32) -> Result<Vec<Collection>, String>;

    async fn search_collections(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Collection>, String>;
}

#[derive(Clone)]
pub struct Model {
    base: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").field("base", &self.base).finish()
    }
}

impl Model {
    pub fn new(base_url: &str, access_key: &str) -> Result<Self, String> {
        let base = Url::parse(base_url).string_error("photo api url")?;
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Client-ID {access_key}"))
            .string_error("access key")?;
        headers.insert(AUTHORIZATION, auth);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .string_error("http client")?;
        Ok(Self { base, client })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, String> {
        let url = self.base.join(path).string_error(path)?;
        self.client
            .get(url)
            .query(params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .string_error(path)?
            .json()
            .await
            .string_error(path)
    }
}

/// Page parameters are always sent; unset filters are omitted entirely
/// instead of being sent as empty values.
fn page_params(
    page: u32,
    per_page: u32,
    color: Option<Color>,
    orientation: Option<Orientation>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![("page", page.to_string()), ("per_page", per_page.to_string())];
    if let Some(color) = color {
        params.push(("color", color.to_string()));
    }
    if let Some(orientation) = orientation {
        params.push(("orientation", orientation.to_string()));
    }
    params
}

#[derive(Deserialize)]
struct SearchResults<T> {
    results: Vec<T>,
}

#[async_trait]
impl PhotoApi for Model {
    async fn photos(
        &self,
        page: u32,
        per_page: u32,
        color: Option<Color>,
        orientation: Option<Orientation>,
    ) -> Result<Vec<Photo>, String> {
        self.get_json("/photos", &page_params(page, per_page, color, orientation))
            .await
    }

    async fn search_photos(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
        color: Option<Color>,
        orientation: Option<Orientation>,
    ) -> Result<Vec<Photo>, String> {
        let mut params = page_params(page, per_page, color, orientation);
        params.push(("query", query.to_string()));
        let result: Result<SearchResults<Photo>, String> =
            self.get_json("/search/photos", &params).await;
        match result {
            Ok(found) => Ok(found.results),
            Err(e) => {
                log::error!("Error searching photos: {e}");
                Ok(Vec::new())
            }
        }
    }

    async fn topic_photos(
        &self,
        slug: &str,
        page: u32,
        per_page: u32,
        color: Option<Color>,
        orientation: Option<Orientation>,
    ) -> Result<Vec<Photo>, String> {
        self.get_json(
            &format!("/topics/{slug}/photos"),
            &page_params(page, per_page, color, orientation),
        )
        .await
    }

    async fn collection_photos(
        &self,
        collection_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Photo>, String> {
        self.get_json(
            &format!("/collections/{collection_id}/photos"),
            &page_params(page, per_page, None, None),
        )
        .await
    }

    async fn collections(&self, page: u32, per_page: u32) -> Result<Vec<Collection>, String> {
        self.get_json("/collections", &page_params(page, per_page, None, None))
            .await
    }

    async fn search_collections(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Collection>, String> {
        let mut params = page_params(page, per_page, None, None);
        params.push(("query", query.to_string()));
        let found: SearchResults<Collection> = self.get_json("/search/collections", &params).await?;
        Ok(found.results)
    }
}

pub trait StringError<T> {
    fn string_error(self, scope: &str) -> Result<T, String>;
}

impl<T, E: std::fmt::Debug> StringError<T> for Result<T, E> {
    fn string_error(self, scope: &str) -> Result<T, String> {
        self.map_err(|e| format!("{scope}: {e:?}"))
    }
}
