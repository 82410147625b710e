//! Optional one-line AI summary of long feeds.
//!
//! A primary provider is tried first and a fallback second, both inside one
//! time budget. A primary that runs out the budget ends the attempt without
//! trying the fallback.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::FeedRecord;

pub const SYSTEM_PROMPT: &str = "请将以下文本浓缩为一条极简概括（50字以内）。要求：采用\"一句话新闻\"的形式，去掉所有废话；严禁换行，不使用markdown等特殊格式；避免生僻术语；使用中文回复。";

/// Shorter content is never sent to a provider.
pub const MIN_CONTENT_CHARS: usize = 800;

pub const DISCLAIMER: &str = "摘要由 AI 模型总结生成，内容仅供参考";

/// What one provider call produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProviderOutcome {
    pub result: Option<String>,
    pub is_timeout: bool,
}

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, content: &str) -> Result<String>;
}

fn chat_messages(content: &str) -> serde_json::Value {
    json!([
        { "role": "system", "content": SYSTEM_PROMPT },
        { "role": "user", "content": content },
    ])
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(Error::Upstream(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default().to_owned(),
        ))
    }
}

pub struct CloudflareProvider {
    client: reqwest::Client,
    account_id: String,
    api_token: String,
}

impl CloudflareProvider {
    const MODEL: &'static str = "@cf/meta/llama-4-scout-17b-16e-instruct";

    pub fn new(client: reqwest::Client, account_id: String, api_token: String) -> Self {
        Self {
            client,
            account_id,
            api_token,
        }
    }
}

#[derive(Deserialize)]
struct CloudflareResponse {
    result: Option<CloudflareResult>,
}

#[derive(Deserialize)]
struct CloudflareResult {
    response: Option<String>,
}

#[async_trait]
impl SummaryProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn summarize(&self, content: &str) -> Result<String> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id,
            Self::MODEL
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&json!({ "messages": chat_messages(content) }))
            .send()
            .await?;
        let body: CloudflareResponse = check_status(resp).await?.json().await?;
        body.result
            .and_then(|r| r.response)
            .ok_or_else(|| Error::Generic("cloudflare: no response in result".to_owned()))
    }
}

pub struct MistralProvider {
    client: reqwest::Client,
    api_key: String,
}

impl MistralProvider {
    const URL: &'static str = "https://api.mistral.ai/v1/chat/completions";
    const MODEL: &'static str = "mistral-small-latest";

    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[derive(Deserialize)]
struct MistralResponse {
    #[serde(default)]
    choices: Vec<MistralChoice>,
}

#[derive(Deserialize)]
struct MistralChoice {
    message: Option<MistralMessage>,
}

#[derive(Deserialize)]
struct MistralMessage {
    content: Option<String>,
}

#[async_trait]
impl SummaryProvider for MistralProvider {
    fn name(&self) -> &'static str {
        "mistral"
    }

    async fn summarize(&self, content: &str) -> Result<String> {
        let resp = self
            .client
            .post(Self::URL)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({ "model": Self::MODEL, "messages": chat_messages(content) }))
            .send()
            .await?;
        let body: MistralResponse = check_status(resp).await?.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| Error::Generic("mistral: no choices in response".to_owned()))
    }
}

pub struct SummaryGenerator {
    primary: Option<Box<dyn SummaryProvider>>,
    fallback: Option<Box<dyn SummaryProvider>>,
    timeout: Duration,
}

impl SummaryGenerator {
    pub fn new(
        primary: Option<Box<dyn SummaryProvider>>,
        fallback: Option<Box<dyn SummaryProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    /// Cloudflare as primary and Mistral as fallback, for whichever has
    /// credentials configured.
    pub fn from_config(config: &Config, client: &reqwest::Client) -> Self {
        let primary = match (&config.cloudflare_account_id, &config.cloudflare_api_token) {
            (Some(account), Some(token)) => Some(Box::new(CloudflareProvider::new(
                client.clone(),
                account.clone(),
                token.clone(),
            )) as Box<dyn SummaryProvider>),
            _ => None,
        };
        let fallback = config.mistral_api_key.as_ref().map(|key| {
            Box::new(MistralProvider::new(client.clone(), key.clone())) as Box<dyn SummaryProvider>
        });
        Self::new(primary, fallback, config.summary_timeout)
    }

    pub fn is_enabled(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    async fn call(
        &self,
        provider: &dyn SummaryProvider,
        content: &str,
        deadline: Instant,
    ) -> ProviderOutcome {
        match tokio::time::timeout_at(deadline, provider.summarize(content)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                ProviderOutcome {
                    result: (!text.is_empty()).then(|| text.to_owned()),
                    is_timeout: false,
                }
            }
            Ok(Err(err)) => {
                warn!("{} summary failed: {}", provider.name(), err);
                ProviderOutcome::default()
            }
            Err(_) => {
                warn!("{} summary ran past the {:?} budget", provider.name(), self.timeout);
                ProviderOutcome {
                    result: None,
                    is_timeout: true,
                }
            }
        }
    }

    pub async fn summarize(&self, feed: &FeedRecord) -> Option<String> {
        self.summarize_text(&feed.text_content()).await
    }

    pub async fn summarize_text(&self, content: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let len = content.chars().count();
        if len < MIN_CONTENT_CHARS {
            debug!("skipping summary for {} chars", len);
            return None;
        }

        // One budget covers the primary and the fallback together.
        let deadline = Instant::now() + self.timeout;
        if let Some(primary) = &self.primary {
            let outcome = self.call(primary.as_ref(), content, deadline).await;
            if outcome.result.is_some() {
                metrics::counter!("summary_requests_total", 1, "outcome" => "primary");
                return outcome.result;
            }
            if outcome.is_timeout {
                metrics::counter!("summary_requests_total", 1, "outcome" => "timeout");
                return None;
            }
        }

        if let Some(fallback) = &self.fallback {
            let outcome = self.call(fallback.as_ref(), content, deadline).await;
            let label = if outcome.result.is_some() { "fallback" } else { "failed" };
            metrics::counter!("summary_requests_total", 1, "outcome" => label);
            return outcome.result;
        }

        metrics::counter!("summary_requests_total", 1, "outcome" => "failed");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        reply: Option<&'static str>,
    }

    impl Scripted {
        fn boxed(reply: Option<&'static str>, delay: Duration) -> (Box<dyn SummaryProvider>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Scripted {
                calls: calls.clone(),
                delay,
                reply,
            };
            (Box::new(provider), calls)
        }
    }

    #[async_trait]
    impl SummaryProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn summarize(&self, _content: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.reply {
                Some(reply) => Ok(reply.to_owned()),
                None => Err(Error::Upstream(500, "Internal Server Error".to_owned())),
            }
        }
    }

    fn long_text() -> String {
        "字".repeat(MIN_CONTENT_CHARS)
    }

    #[tokio::test]
    async fn short_content_makes_no_calls() {
        let (primary, primary_calls) = Scripted::boxed(Some("s"), Duration::ZERO);
        let (fallback, fallback_calls) = Scripted::boxed(Some("f"), Duration::ZERO);
        let gen = SummaryGenerator::new(Some(primary), Some(fallback), Duration::from_millis(100));

        assert_eq!(gen.summarize_text(&"字".repeat(799)).await, None);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_result_wins() {
        let (primary, _) = Scripted::boxed(Some("  一句话  "), Duration::ZERO);
        let (fallback, fallback_calls) = Scripted::boxed(Some("f"), Duration::ZERO);
        let gen = SummaryGenerator::new(Some(primary), Some(fallback), Duration::from_millis(100));

        assert_eq!(gen.summarize_text(&long_text()).await.as_deref(), Some("一句话"));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_timeout_skips_fallback() {
        let (primary, primary_calls) = Scripted::boxed(Some("late"), Duration::from_secs(5));
        let (fallback, fallback_calls) = Scripted::boxed(Some("f"), Duration::ZERO);
        let gen = SummaryGenerator::new(Some(primary), Some(fallback), Duration::from_millis(50));

        assert_eq!(gen.summarize_text(&long_text()).await, None);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_error_uses_fallback() {
        let (primary, _) = Scripted::boxed(None, Duration::ZERO);
        let (fallback, fallback_calls) = Scripted::boxed(Some("备用"), Duration::ZERO);
        let gen = SummaryGenerator::new(Some(primary), Some(fallback), Duration::from_millis(100));

        assert_eq!(gen.summarize_text(&long_text()).await.as_deref(), Some("备用"));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_fallback_stays_within_budget() {
        let (primary, _) = Scripted::boxed(None, Duration::from_millis(60));
        let (fallback, fallback_calls) = Scripted::boxed(Some("late"), Duration::from_secs(5));
        let gen = SummaryGenerator::new(Some(primary), Some(fallback), Duration::from_millis(100));

        let started = std::time::Instant::now();
        assert_eq!(gen.summarize_text(&long_text()).await, None);
        assert!(started.elapsed() < Duration::from_millis(1000), "{:?}", started.elapsed());
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_alone_and_nothing_configured() {
        let (fallback, calls) = Scripted::boxed(Some("only"), Duration::ZERO);
        let gen = SummaryGenerator::new(None, Some(fallback), Duration::from_millis(100));
        assert_eq!(gen.summarize_text(&long_text()).await.as_deref(), Some("only"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let none = SummaryGenerator::new(None, None, Duration::from_millis(100));
        assert!(!none.is_enabled());
        assert_eq!(none.summarize_text(&long_text()).await, None);
    }

    #[tokio::test]
    async fn empty_reply_counts_as_failure() {
        let (primary, _) = Scripted::boxed(Some("   "), Duration::ZERO);
        let (fallback, fallback_calls) = Scripted::boxed(None, Duration::ZERO);
        let gen = SummaryGenerator::new(Some(primary), Some(fallback), Duration::from_millis(100));
        assert_eq!(gen.summarize_text(&long_text()).await, None);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }
}
