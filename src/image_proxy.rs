use url::Url;

/// Image hosts that are fetched through the proxy endpoint.
pub const ALLOWED_HOSTS: [&str; 3] = [
    "image.coolapk.com",
    "avatar.coolapk.com",
    "static.coolapk.com",
];

pub const PROXY_REFERER: &str = "https://www.coolapk.com/";

/// Parse `raw` and return it if it points at one of the allowed hosts.
pub fn allowed_target(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    let url = if raw.starts_with("//") {
        Url::parse(&format!("https:{raw}")).ok()?
    } else {
        Url::parse(raw).ok()?
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    ALLOWED_HOSTS.contains(&host).then_some(url)
}

/// Rewrites image URLs of the source platform to go through `/proxy`.
#[derive(Debug, Clone, Default)]
pub struct ImageProxy {
    origin: String,
}

impl ImageProxy {
    /// `origin` is prepended to `/proxy`; empty keeps the URLs relative.
    pub fn new(origin: impl Into<String>) -> Self {
        let origin: String = origin.into();
        Self {
            origin: origin.trim_end_matches('/').to_owned(),
        }
    }

    pub fn proxy(&self, url: &str) -> String {
        match allowed_target(url) {
            Some(_) => format!(
                "{}/proxy?url={}",
                self.origin,
                urlencoding::encode(url.trim())
            ),
            None => url.to_owned(),
        }
    }
}
