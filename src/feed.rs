//! The feed record returned by the upstream feed API.

use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::links::SOURCE_ORIGIN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedType {
    Feed,
    FeedArticle,
    Comment,
    Picture,
    Question,
    Answer,
    Other(String),
}

impl Default for FeedType {
    fn default() -> Self {
        FeedType::Other(String::new())
    }
}

impl From<String> for FeedType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "feed" => FeedType::Feed,
            "feedArticle" => FeedType::FeedArticle,
            "comment" => FeedType::Comment,
            "picture" => FeedType::Picture,
            "question" => FeedType::Question,
            "answer" => FeedType::Answer,
            _ => FeedType::Other(s),
        }
    }
}

impl FeedType {
    pub fn as_str(&self) -> &str {
        match self {
            FeedType::Feed => "feed",
            FeedType::FeedArticle => "feedArticle",
            FeedType::Comment => "comment",
            FeedType::Picture => "picture",
            FeedType::Question => "question",
            FeedType::Answer => "answer",
            FeedType::Other(s) => s,
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FeedType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(FeedType::from)
            .unwrap_or_default())
    }
}

/// Treat an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedRecord {
    #[serde(rename = "feedType", default)]
    pub feed_type: FeedType,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default)]
    pub message_raw_output: Option<String>,
    #[serde(default)]
    pub message_title: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(rename = "userAvatar", default, deserialize_with = "nullable")]
    pub user_avatar: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub dateline: u64,
    #[serde(rename = "picArr", default, deserialize_with = "nullable")]
    pub pic_arr: Vec<String>,
    #[serde(default)]
    pub message_cover: Option<String>,
    #[serde(rename = "productAlbumDetailInfo", default, deserialize_with = "nullable")]
    pub product_album: Vec<GoodsItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        #[serde(default, deserialize_with = "nullable")]
        message: String,
    },
    Image {
        #[serde(default, deserialize_with = "nullable")]
        url: String,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoodsItem {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub level: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub item_name: String,
    #[serde(default)]
    pub item_description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub item_logo: String,
    #[serde(default, deserialize_with = "nullable")]
    pub item_images: String,
}

impl GoodsItem {
    pub fn images(&self) -> Vec<&str> {
        self.item_images
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .collect()
    }
}

/// Parse `message_raw_output` into blocks paired with their position in the
/// raw array. Blocks of unknown type are skipped but still take up an index;
/// a payload that is not a JSON array is an error.
pub fn parse_blocks(raw: &str) -> Result<Vec<(usize, ContentBlock)>, serde_json::Error> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    Ok(values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| serde_json::from_value(value).ok().map(|block| (i, block)))
        .collect())
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl FeedRecord {
    pub fn title(&self) -> &str {
        let (primary, secondary) = if self.feed_type == FeedType::FeedArticle {
            (&self.message_title, &self.title)
        } else {
            (&self.title, &self.message_title)
        };
        non_empty(primary).or(non_empty(secondary)).unwrap_or("")
    }

    pub fn blocks(&self) -> Option<Result<Vec<(usize, ContentBlock)>, serde_json::Error>> {
        self.message_raw_output.as_deref().map(parse_blocks)
    }

    /// The text a reader sees, used for Markdown detection and summaries.
    pub fn text_content(&self) -> String {
        if self.feed_type == FeedType::FeedArticle {
            if let Some(Ok(blocks)) = self.blocks() {
                return blocks
                    .iter()
                    .filter_map(|(_, block)| match block {
                        ContentBlock::Text { message } => Some(message.as_str()),
                        ContentBlock::Image { .. } => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
            }
        }
        self.message.clone()
    }

    pub fn cover_image(&self) -> Option<&str> {
        non_empty(&self.message_cover).or_else(|| {
            self.pic_arr
                .iter()
                .map(|s| s.as_str())
                .find(|s| !s.is_empty())
        })
    }

    /// Link to the feed on the source platform.
    pub fn source_url(&self, id: u64) -> String {
        let kind = if self.feed_type == FeedType::Picture {
            "picture"
        } else {
            "feed"
        };
        format!("{}/{}/{}", SOURCE_ORIGIN, kind, id)
    }
}

/// Envelope of the upstream response.
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub data: Option<FeedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feed_with_nulls() {
        let json = r#"{
            "feedType": "feedArticle",
            "message": "hi",
            "message_title": "Title",
            "title": null,
            "username": "u",
            "userAvatar": null,
            "dateline": 1700000000,
            "picArr": null,
            "productAlbumDetailInfo": [{"id": 7, "level": 2, "item_name": "Phone", "item_images": "a.jpg, ,b.jpg"}]
        }"#;
        let feed: FeedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(feed.feed_type, FeedType::FeedArticle);
        assert_eq!(feed.title(), "Title");
        assert!(feed.pic_arr.is_empty());
        assert_eq!(feed.user_avatar, "");
        assert_eq!(feed.product_album[0].id, "7");
        assert_eq!(feed.product_album[0].images(), vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn unknown_feed_type_is_kept() {
        let feed: FeedRecord = serde_json::from_str(r#"{"feedType":"poll"}"#).unwrap();
        assert_eq!(feed.feed_type, FeedType::Other("poll".into()));
        assert_eq!(feed.feed_type.to_string(), "poll");
    }

    #[test]
    fn title_follows_feed_type() {
        let feed = FeedRecord {
            feed_type: FeedType::Feed,
            message_title: Some("article".into()),
            title: Some("feed".into()),
            ..Default::default()
        };
        assert_eq!(feed.title(), "feed");
        let article = FeedRecord {
            feed_type: FeedType::FeedArticle,
            ..feed.clone()
        };
        assert_eq!(article.title(), "article");
    }

    #[test]
    fn blocks_skip_unknown_types() {
        let raw = r#"[{"type":"text","message":"a"},{"type":"video","url":"v"},{"type":"image","url":"i.png","description":"cap"}]"#;
        let blocks = parse_blocks(raw).unwrap();
        assert_eq!(
            blocks,
            vec![
                (0, ContentBlock::Text { message: "a".into() }),
                (
                    2,
                    ContentBlock::Image {
                        url: "i.png".into(),
                        description: Some("cap".into())
                    }
                ),
            ]
        );
        assert!(parse_blocks("not json").is_err());
    }

    #[test]
    fn text_content_joins_article_text() {
        let feed = FeedRecord {
            feed_type: FeedType::FeedArticle,
            message: "fallback".into(),
            message_raw_output: Some(
                r#"[{"type":"text","message":"one"},{"type":"image","url":"x"},{"type":"text","message":"two"}]"#
                    .into(),
            ),
            ..Default::default()
        };
        assert_eq!(feed.text_content(), "one\ntwo");

        let broken = FeedRecord {
            message_raw_output: Some("{".into()),
            ..feed
        };
        assert_eq!(broken.text_content(), "fallback");
    }

    #[test]
    fn source_url_uses_picture_path() {
        let feed = FeedRecord {
            feed_type: FeedType::Picture,
            ..Default::default()
        };
        assert_eq!(feed.source_url(5), "https://www.coolapk.com/picture/5");
    }
}
