use hyper::HeaderMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::feed::{FeedRecord, FeedResponse};

pub const AUTH_HEADER: &str = "X-Internal-Auth";

/// Client for the internal feed API.
#[derive(Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    /// Fixed API endpoint; derived from the incoming request when unset.
    base: Option<String>,
    /// Only ever sent to `base`, never to a host taken from request headers.
    auth_token: Option<String>,
    timeout: Duration,
}

/// `<proto>://<host>` as seen by the client that made the request.
pub fn request_origin(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_owned())
            .filter(|v| !v.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or_else(|| "http".to_owned());
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or_else(|| "localhost".to_owned());
    format!("{proto}://{host}")
}

pub fn api_base_from_headers(headers: &HeaderMap) -> String {
    format!("{}/api/feed", request_origin(headers))
}

impl FeedClient {
    pub fn new(
        client: reqwest::Client,
        base: Option<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Self {
        if auth_token.is_some() && base.is_none() {
            warn!("INTERNAL_AUTH_TOKEN is set without FEED_API_BASE; the token will not be sent");
        }
        Self {
            client,
            base,
            auth_token,
            timeout,
        }
    }

    /// Fetch feed `id`. `Ok(None)` when the API has no data for it.
    pub async fn fetch(&self, id: u64, headers: &HeaderMap) -> Result<Option<FeedRecord>> {
        let (base, token) = match &self.base {
            Some(base) => (base.clone(), self.auth_token.as_deref()),
            None => (api_base_from_headers(headers), None),
        };
        let url = Url::parse_with_params(&base, &[("id", id.to_string())])?;
        debug!("fetching feed {} from {}", id, url);

        let mut req = self.client.get(url).timeout(self.timeout);
        if let Some(token) = token {
            req = req.header(AUTH_HEADER, token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Upstream(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default().to_owned(),
            ));
        }

        let body: FeedResponse = resp.json().await?;
        Ok(body.data)
    }
}
