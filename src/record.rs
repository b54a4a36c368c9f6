//! record.rs — Core data model for the listing pipeline.
//!
//! Typed structs instead of loose string maps: optional listing fields are
//! `Option`s, validated at the fetch → pipeline boundary. Everything that
//! crosses a module boundary is serde-serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of fetch work. `domain` is derived from the URL host at
/// construction time; `retry_count` is the only field ever mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Lower number = served first. Ties break by insertion order (FIFO).
    pub priority: i32,
    pub domain: String,
    #[serde(default)]
    pub retry_count: u32,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, priority: i32) -> Self {
        let url = url.into();
        let domain = domain_of(&url);
        Self {
            url,
            priority,
            domain,
            retry_count: 0,
        }
    }
}

/// Extract the host part of a URL, lowercased. Unparseable URLs map to an
/// empty domain, which the rate limiter treats as the `default` bucket.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// The essential fields of a scraped listing. All optional except images;
/// the validator decides how missing values score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingFields {
    pub id: Option<String>,
    pub price: Option<f64>,
    pub size_sqm: Option<f64>,
    pub rooms: Option<u32>,
    pub location: Option<String>,
    /// Raw date string as scraped; parsing happens in the temporal scorer
    /// so that an unparseable date can be reported as a hard error.
    pub listed_date: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub year_built: Option<i32>,
}

/// One scraped listing, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_url: String,
    pub fields: ListingFields,
}

impl RawRecord {
    pub fn new(source_url: impl Into<String>, fields: ListingFields) -> Self {
        Self {
            source_url: source_url.into(),
            fields,
        }
    }

    /// Stable identifier for reporting: the listing id if present,
    /// otherwise the source URL.
    pub fn record_id(&self) -> String {
        self.fields
            .id
            .clone()
            .unwrap_or_else(|| self.source_url.clone())
    }
}

/// Six component scores (0–100 each) plus their weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationScore {
    pub url_score: f64,
    pub price_score: f64,
    pub attributes_score: f64,
    pub market_score: f64,
    pub temporal_score: f64,
    pub image_score: f64,
    /// `Σ(component × weight)`, weights sum to 1.0, so also in 0–100.
    pub total_score: f64,
}

/// Final verdict for one record. Immutable; the sink persists it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub record_id: String,
    pub is_valid: bool,
    pub score: ValidationScore,
    /// Hard failures, in scorer order (url, price, attributes, market,
    /// temporal, image).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Soft issues, same ordering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub validation_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_derived_and_lowercased() {
        let r = FetchRequest::new("https://WWW.Spitogatos.GR/property/1", 5);
        assert_eq!(r.domain, "www.spitogatos.gr");
        assert_eq!(r.retry_count, 0);
    }

    #[test]
    fn unparseable_url_gets_empty_domain() {
        assert_eq!(domain_of("not a url"), "");
    }

    #[test]
    fn record_id_falls_back_to_url() {
        let rec = RawRecord::new("https://xe.gr/p/9", ListingFields::default());
        assert_eq!(rec.record_id(), "https://xe.gr/p/9");

        let rec2 = RawRecord::new(
            "https://xe.gr/p/9",
            ListingFields {
                id: Some("abc-1".into()),
                ..Default::default()
            },
        );
        assert_eq!(rec2.record_id(), "abc-1");
    }

    #[test]
    fn result_serializes_without_empty_lists() {
        let res = ValidationResult {
            record_id: "r1".into(),
            is_valid: true,
            score: ValidationScore {
                url_score: 100.0,
                price_score: 100.0,
                attributes_score: 100.0,
                market_score: 100.0,
                temporal_score: 100.0,
                image_score: 100.0,
                total_score: 100.0,
            },
            errors: vec![],
            warnings: vec![],
            validation_time_ms: 0.1,
            timestamp: Utc::now(),
        };
        let v = serde_json::to_value(&res).unwrap();
        assert!(v.get("errors").is_none());
        assert!(v.get("warnings").is_none());
        assert_eq!(v["is_valid"], serde_json::json!(true));
    }
}
