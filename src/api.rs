use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::types::{AwardingUniverse, BadgeId, BadgeSnapshot};

/// Anything that can produce a fresh snapshot for a badge.
///
/// Implementations must not propagate errors: a failed read is `None` and the
/// caller skips the badge until the next cycle.
#[async_trait]
pub trait BadgeSource: Send + Sync {
    async fn fetch(&self, id: BadgeId) -> Option<BadgeSnapshot>;
}

#[async_trait]
impl<T: BadgeSource + ?Sized> BadgeSource for Arc<T> {
    async fn fetch(&self, id: BadgeId) -> Option<BadgeSnapshot> {
        (**self).fetch(id).await
    }
}

// --- Badges API response types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBadge {
    id: BadgeId,
    name: String,
    statistics: RawStatistics,
    awarding_universe: AwardingUniverse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatistics {
    awarded_count: u64,
    #[serde(default)]
    past_day_awarded_count: u64,
    #[serde(default)]
    win_rate_percentage: f64,
}

/// Parse a badges API body into a normalized snapshot.
pub fn parse_badge(body: &str) -> Result<BadgeSnapshot> {
    let raw: RawBadge = serde_json::from_str(body).context("malformed badge body")?;
    Ok(BadgeSnapshot {
        id: raw.id,
        name: raw.name,
        current_count: raw.statistics.awarded_count,
        past_day_count: raw.statistics.past_day_awarded_count,
        win_rate_percentage: raw.statistics.win_rate_percentage,
        awarding_universe: raw.awarding_universe,
    })
}

/// Build `{base}/{id}` without clobbering any path already on the base.
pub fn badge_url(base: &Url, id: BadgeId) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("api base {base} cannot carry a path"))?
        .pop_if_empty()
        .push(&id.to_string());
    Ok(url)
}

/// HTTP client for the public badges API.
pub struct BadgeClient {
    http: reqwest::Client,
    base: Url,
}

impl BadgeClient {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(api_base).with_context(|| format!("invalid api base {api_base}"))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base })
    }

    /// Single GET for one badge. Errors are returned to [`BadgeSource::fetch`],
    /// which logs and flattens them.
    pub async fn fetch_badge(&self, id: BadgeId) -> Result<BadgeSnapshot> {
        let url = badge_url(&self.base, id)?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {status}");
        }
        let body = resp.text().await?;
        let snapshot = parse_badge(&body)?;
        debug!(
            "Fetched badge {} ({}): awardedCount={}",
            snapshot.id, snapshot.name, snapshot.current_count
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl BadgeSource for BadgeClient {
    async fn fetch(&self, id: BadgeId) -> Option<BadgeSnapshot> {
        match self.fetch_badge(id).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Fetch failed for badge {id}: {e:#}");
                None
            }
        }
    }
}
