/// Page kinds addressed by a feed id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPage {
    Feed,
    Picture,
    InstantView,
}

impl FeedPage {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "feed" => Some(FeedPage::Feed),
            "picture" => Some(FeedPage::Picture),
            "iv" => Some(FeedPage::InstantView),
            _ => None,
        }
    }

    pub fn segment(self) -> &'static str {
        match self {
            FeedPage::Feed => "feed",
            FeedPage::Picture => "picture",
            FeedPage::InstantView => "iv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Page(FeedPage, u64),
    Index,
    Proxy,
    Metrics,
    /// 301 to the given location.
    Redirect(String),
    NotFound,
}

/// Parse a feed id segment: ASCII digits, nonzero, fitting in a u64.
fn parse_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

pub fn route(path: &str, query: Option<&str>) -> Route {
    match path {
        "/" | "" => return Route::Index,
        "/proxy" => return Route::Proxy,
        "/metrics" => return Route::Metrics,
        _ => {}
    }

    let mut parts = path.trim_start_matches('/').splitn(2, '/');
    let (Some(kind), Some(raw_id)) = (parts.next(), parts.next()) else {
        return Route::NotFound;
    };
    let Some(page) = FeedPage::from_segment(kind) else {
        return Route::NotFound;
    };
    if raw_id.contains('/') {
        return Route::NotFound;
    }

    let Some(id) = parse_id(raw_id) else {
        return Route::Redirect("/".to_owned());
    };

    if query.is_some() || raw_id != id.to_string() {
        return Route::Redirect(format!("/{}/{}", page.segment(), id));
    }

    Route::Page(page, id)
}
