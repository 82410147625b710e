use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap};
use hyper::{Request, Response, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::html;
use crate::image_proxy::{allowed_target, ImageProxy, PROXY_REFERER};
use crate::markdown::MarkdownRenderer;
use crate::render::FeedRenderer;
use crate::routes::{self, FeedPage, Route};
use crate::summary::SummaryGenerator;
use crate::upstream::{request_origin, FeedClient};

pub const FEED_CACHE_CONTROL: &str =
    "public, max-age=3600, s-maxage=604800, stale-while-revalidate=86400";
pub const IV_CACHE_CONTROL: &str =
    "public, max-age=3600, s-maxage=86400, stale-while-revalidate=3600";
pub const MISS_CACHE_CONTROL: &str = "public, max-age=60, s-maxage=60, stale-while-revalidate=0";

const IMAGE_OK_CACHE_CONTROL: &str = "public, s-maxage=864000, max-age=864000";
const IMAGE_MISSING_CACHE_CONTROL: &str = "public, s-maxage=60, max-age=60";

/// Headers sent to the image hosts so requests look like a browser's.
const BROWSER_HEADERS: [(&str, &str); 14] = [
    ("accept", "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8"),
    ("accept-language", "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("cache-control", "no-cache"),
    ("dnt", "1"),
    ("pragma", "no-cache"),
    ("referer", PROXY_REFERER),
    ("sec-fetch-dest", "image"),
    ("sec-fetch-mode", "no-cors"),
    ("sec-fetch-site", "same-site"),
    (
        "user-agent",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36",
    ),
    (
        "sec-ch-ua",
        r#""Google Chrome";v="141", "Not?A_Brand";v="8", "Chromium";v="141""#,
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""macOS""#),
    ("connection", "keep-alive"),
];

/// Upstream headers that must not be forwarded with a buffered body.
const HOP_BY_HOP: [&str; 5] = [
    "cache-control",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
];

#[derive(Clone)]
pub struct App {
    feeds: FeedClient,
    http: reqwest::Client,
    interactive: Arc<FeedRenderer>,
    instant_view: Arc<FeedRenderer>,
    summaries: Arc<SummaryGenerator>,
    metrics: Option<PrometheusHandle>,
}

impl App {
    pub fn new(config: &Config, metrics: Option<PrometheusHandle>) -> Self {
        let http = reqwest::Client::new();
        let markdown = Arc::new(MarkdownRenderer::new());
        let proxy = ImageProxy::new(config.proxy_origin.clone());

        let feeds = FeedClient::new(
            http.clone(),
            config.feed_api_base.clone(),
            config.internal_auth_token.clone(),
            config.upstream_timeout,
        );
        let summaries = SummaryGenerator::from_config(config, &http);
        if !summaries.is_enabled() {
            info!("no summary provider configured, AI summaries are off");
        }

        App {
            feeds,
            interactive: Arc::new(FeedRenderer::interactive(markdown.clone(), proxy.clone())),
            instant_view: Arc::new(FeedRenderer::instant_view(markdown, proxy)),
            summaries: Arc::new(summaries),
            http,
            metrics,
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &str,
    cache_control: Option<&str>,
    body: impl Into<Bytes>,
) -> Result<Response<Full<Bytes>>, Error> {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(cache_control) = cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache_control);
    }
    Ok(builder.body(Full::new(body.into()))?)
}

fn text(status: StatusCode, body: &'static str) -> Result<Response<Full<Bytes>>, Error> {
    respond(status, "text/plain; charset=utf-8", None, body)
}

fn is_android(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|ua| ua.to_ascii_lowercase().contains("android"))
        .unwrap_or(false)
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn robots_txt() -> &'static str {
    "User-agent: *\nAllow: /\nDisallow: /proxy\nDisallow: /metrics\n"
}

async fn serve_feed(
    app: &App,
    page: FeedPage,
    id: u64,
    headers: &HeaderMap,
) -> Result<Response<Full<Bytes>>, Error> {
    let instant_view = page == FeedPage::InstantView;
    let renderer = if instant_view {
        &app.instant_view
    } else {
        &app.interactive
    };
    let highlight_css = renderer.markdown().highlight_css();

    let feed = match app.feeds.fetch(id, headers).await {
        Ok(Some(feed)) => feed,
        Ok(None) => {
            debug!("feed {} has no data", id);
            let body = html::message_page(html::NOT_FOUND_MESSAGE, instant_view, highlight_css)?;
            return respond(
                StatusCode::NOT_FOUND,
                "text/html; charset=utf-8",
                Some(MISS_CACHE_CONTROL),
                body,
            );
        }
        Err(err) => {
            error!("fetching feed {}: {}", id, err);
            metrics::counter!("upstream_errors_total", 1);
            let body = html::message_page(&html::error_message(&err), instant_view, highlight_css)?;
            return respond(
                StatusCode::BAD_GATEWAY,
                "text/html; charset=utf-8",
                Some(MISS_CACHE_CONTROL),
                body,
            );
        }
    };

    metrics::counter!("feeds_rendered_total", 1, "type" => feed.feed_type.to_string());

    if instant_view {
        let body = html::instant_view_page(renderer, id, &feed)?;
        return respond(
            StatusCode::OK,
            "text/html; charset=utf-8",
            Some(IV_CACHE_CONTROL),
            body,
        );
    }

    let summary = app.summaries.summarize(&feed).await;
    let body = html::feed_page(
        renderer,
        &html::FeedPage {
            id,
            feed: &feed,
            summary: summary.as_deref(),
            android: is_android(headers),
        },
    )?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CACHE_CONTROL, FEED_CACHE_CONTROL)
        .header(header::VARY, "User-Agent")
        .body(Full::new(Bytes::from(body)))?)
}

async fn serve_proxy(app: &App, query: Option<&str>) -> Result<Response<Full<Bytes>>, Error> {
    let Some(raw) = query_param(query, "url").filter(|u| !u.is_empty()) else {
        metrics::counter!("proxy_requests_total", 1, "status" => "400");
        return text(StatusCode::BAD_REQUEST, "Query parameter 'url' is required");
    };
    let Some(target) = allowed_target(&raw) else {
        metrics::counter!("proxy_requests_total", 1, "status" => "400");
        return text(StatusCode::BAD_REQUEST, "Invalid image URL");
    };

    let mut req = app.http.get(target);
    for (name, value) in BROWSER_HEADERS {
        req = req.header(name, value);
    }

    let upstream = match req.send().await {
        Ok(upstream) => upstream,
        Err(err) => {
            warn!("proxy fetch of {} failed: {}", raw, err);
            metrics::counter!("proxy_requests_total", 1, "status" => "500");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch image");
        }
    };

    let status = upstream.status();
    metrics::counter!("proxy_requests_total", 1, "status" => status.as_u16().to_string());

    let mut builder = Response::builder().status(status.as_u16());
    for (name, value) in upstream.headers() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    let cache_control = match status.as_u16() {
        200 => Some(IMAGE_OK_CACHE_CONTROL),
        404 => Some(IMAGE_MISSING_CACHE_CONTROL),
        _ => None,
    };
    if let Some(cache_control) = cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache_control);
    }

    let body = upstream.bytes().await?;
    Ok(builder.body(Full::new(body))?)
}

fn serve_metrics(app: &App) -> Result<Response<Full<Bytes>>, Error> {
    match &app.metrics {
        Some(handle) => respond(
            StatusCode::OK,
            "text/plain; version=0.0.4",
            None,
            handle.render(),
        ),
        None => text(StatusCode::NOT_FOUND, "metrics disabled\n"),
    }
}

pub async fn serve(
    app: &App,
    r: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Error> {
    let path = r.uri().path();
    let query = r.uri().query();

    if path == "/robots.txt" {
        return respond(
            StatusCode::OK,
            "text/plain; charset=utf-8",
            None,
            robots_txt(),
        );
    }

    match routes::route(path, query) {
        Route::Page(page, id) => serve_feed(app, page, id, r.headers()).await,
        Route::Index => {
            let origin = request_origin(r.headers());
            let link = query_param(query, "link");
            let body = html::index_page(&origin, link.as_deref())?;
            respond(StatusCode::OK, "text/html; charset=utf-8", None, body)
        }
        Route::Proxy => serve_proxy(app, query).await,
        Route::Metrics => serve_metrics(app),
        Route::Redirect(location) => {
            debug!("redirecting {} to {}", r.uri(), location);
            metrics::counter!("redirects_total", 1);
            Ok(Response::builder()
                .status(StatusCode::MOVED_PERMANENTLY)
                .header(header::LOCATION, location)
                .body(Full::new(Bytes::new()))?)
        }
        Route::NotFound => respond(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            Some(MISS_CACHE_CONTROL),
            "Not found\n",
        ),
    }
}

/// Answer any handler error with a plain 500 so the connection stays usable.
pub async fn serve_or_500(
    app: &App,
    r: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Error> {
    match serve(app, r).await {
        Ok(resp) => Ok(resp),
        Err(err) => {
            error!("error serving request: {}", err);
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderName, HeaderValue};

    #[test]
    fn android_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_android(&headers));
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
        );
        assert!(is_android(&headers));
    }

    #[test]
    fn query_params_are_decoded() {
        assert_eq!(
            query_param(Some("url=https%3A%2F%2Fimage.coolapk.com%2Fa.jpg"), "url").as_deref(),
            Some("https://image.coolapk.com/a.jpg")
        );
        assert_eq!(query_param(Some("link=+42+&x=1"), "link").as_deref(), Some(" 42 "));
        assert_eq!(query_param(None, "url"), None);
        assert_eq!(query_param(Some("other=1"), "url"), None);
    }

    #[test]
    fn browser_headers_are_valid() {
        for (name, value) in BROWSER_HEADERS {
            assert!(HeaderName::from_bytes(name.as_bytes()).is_ok(), "{name}");
            assert!(HeaderValue::from_str(value).is_ok(), "{name}");
        }
    }

    #[test]
    fn robots_hides_proxy_and_metrics() {
        assert!(robots_txt().contains("Disallow: /proxy"));
        assert!(robots_txt().contains("Disallow: /metrics"));
    }
}
