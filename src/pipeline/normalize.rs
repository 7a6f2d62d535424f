use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RankerConfig;
use crate::registry::EntityList;
use crate::util::links::{self, TrackingParams};
use crate::util::text::{char_len, clean_display, comparison_key, hash_text, strip_html};

use super::types::{Freshness, NewsItem};

/// A feed record as handed over by the ingest collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawItem {
    pub title: Option<String>,
    #[serde(alias = "url")]
    pub link: Option<String>,
    pub summary: Option<String>,
    /// Extracted article text, when the collaborator fetched the page.
    pub text: Option<String>,
    /// Image URL (e.g. `og:image`).
    pub image: Option<String>,
    pub has_image: Option<bool>,
    /// RFC 3339, RFC 2822 or `YYYY-MM-DD HH:MM:SS` (UTC).
    pub published: Option<String>,
    pub source: Option<String>,
}

/// Why a raw item could not become a [`NewsItem`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedItem {
    #[error("item has no title")]
    MissingTitle,
    #[error("item has no link")]
    MissingLink,
    #[error("title has {len} characters, minimum is {min}")]
    TitleTooShort { len: usize, min: usize },
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    tracking: TrackingParams,
    min_title_len: usize,
}

impl Normalizer {
    #[must_use]
    pub fn new(config: &RankerConfig) -> Self {
        let settings = config.settings();
        Self {
            tracking: TrackingParams::new(&settings.tracking_params),
            min_title_len: settings.min_title_len,
        }
    }

    /// Canonicalize one raw item. Only missing required fields are rejected;
    /// everything else falls back to a best-effort value.
    ///
    /// # Errors
    /// Returns [`MalformedItem`] when the title or link is missing, or the title
    /// is shorter than the configured minimum.
    pub fn normalize(
        &self,
        raw: &RawItem,
        entities: &EntityList,
        now: DateTime<Utc>,
    ) -> Result<NewsItem, MalformedItem> {
        let title = raw
            .title
            .as_deref()
            .map(clean_display)
            .filter(|t| !t.is_empty())
            .ok_or(MalformedItem::MissingTitle)?;
        let link = raw
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(MalformedItem::MissingLink)?
            .to_string();

        let title_len = char_len(&title);
        if title_len < self.min_title_len {
            return Err(MalformedItem::TitleTooShort {
                len: title_len,
                min: self.min_title_len,
            });
        }

        let canonical_link = links::canonicalize(&link, &self.tracking);
        let url_key = links::url_key(&canonical_link);
        let summary = raw
            .summary
            .as_deref()
            .map(|s| clean_display(&strip_html(s)))
            .unwrap_or_default();
        let body_length = raw
            .text
            .as_deref()
            .map(|t| clean_display(&strip_html(t)))
            .filter(|t| !t.is_empty())
            .map_or_else(|| char_len(&summary), |t| char_len(&t));

        let source_id = raw
            .source
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .or_else(|| links::host(&link))
            .unwrap_or_else(|| "unknown".to_string());

        let (published_at, freshness) = match raw.published.as_deref().and_then(parse_published) {
            Some(at) => (at, Freshness::Known),
            None => (now, Freshness::Unknown),
        };

        let has_image = raw
            .has_image
            .unwrap_or_else(|| raw.image.as_deref().is_some_and(|i| !i.trim().is_empty()));

        let detected_entities = entities.detect(&format!("{title} {summary}"));

        Ok(NewsItem {
            id: format!("{:016x}", hash_text(&canonical_link)),
            comparison_key: comparison_key(&title),
            title,
            summary,
            link,
            canonical_link,
            url_key,
            source_id,
            published_at,
            freshness,
            has_image,
            body_length,
            detected_entities,
        })
    }
}

fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
