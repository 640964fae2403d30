// src/feed.rs
//! Feed parsing: RSS and Atom documents into canonical [`RawItem`]s.
//!
//! Both dialects are read from the same document in one pass; a document
//! that satisfies neither is an error, which the pipeline downgrades to
//! "zero items from this feed".

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

/// One feed entry before normalization/classification. No identity
/// beyond structural equality; consumed immediately by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub summary: Option<String>,
    pub published_at_src: Option<String>,
    pub source_name: String,
    pub agent: String,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

// Atom root. Parsing an RSS document as Atom yields zero entries (the
// `channel` element is simply ignored), which keeps the single-pass
// RSS-then-Atom scan cheap.
#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    updated: Option<String>,
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

// Atom text constructs may carry a type attribute; only the text matters.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

impl AtomText {
    fn into_value(self) -> Option<String> {
        self.value
    }
}

/// Parse a raw feed payload into items, tagging each with the owning
/// feed's name, weight and agent. Field absence yields `None`, never an
/// error; only an unparseable document fails.
pub fn parse_feed(
    xml: &str,
    feed_name: &str,
    feed_weight: f64,
    agent_name: &str,
) -> Result<Vec<RawItem>> {
    let xml_clean = scrub_html_entities_for_xml(xml);

    let rss = from_str::<Rss>(&xml_clean);
    let atom = from_str::<AtomFeed>(&xml_clean);
    if rss.is_err() && atom.is_err() {
        return rss.map(|_| Vec::new()).context("parsing feed xml");
    }

    let mut out = Vec::new();

    if let Ok(rss) = rss {
        for it in rss.channel.item {
            out.push(RawItem {
                title: non_empty(it.title),
                source_url: non_empty(it.link),
                summary: non_empty(it.description),
                published_at_src: non_empty(it.pub_date),
                source_name: feed_name.to_string(),
                agent: agent_name.to_string(),
                weight: feed_weight,
            });
        }
    }

    if let Ok(feed) = atom {
        for entry in feed.entries {
            let link = entry.links.into_iter().find_map(|l| non_empty(l.href));
            let summary = entry
                .summary
                .and_then(AtomText::into_value)
                .or_else(|| entry.content.and_then(AtomText::into_value));
            let pub_src = non_empty(entry.updated).or_else(|| non_empty(entry.published));
            out.push(RawItem {
                title: non_empty(entry.title.and_then(AtomText::into_value)),
                source_url: link,
                summary: non_empty(summary),
                published_at_src: pub_src,
                source_name: feed_name.to_string(),
                agent: agent_name.to_string(),
                weight: feed_weight,
            });
        }
    }

    Ok(out)
}

/// Parse a feed date string to UTC.
///
/// RSS uses the email date format (RFC 2822); Atom timestamps are
/// RFC 3339 and handled as a fallback. A zone-less date is taken as UTC.
/// Anything else is "no date".
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Email date without a zone, e.g. "Mon, 11 Aug 2025 09:30:00"
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S") {
        return Some(ndt.and_utc());
    }
    None
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// Feeds routinely embed HTML entities that are not valid XML; map the
// common ones before handing the document to the XML parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc2822_dates_normalize_to_utc() {
        let dt = parse_pub_date("Mon, 11 Aug 2025 09:30:00 +0200").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 8, 11, 7, 30, 0).unwrap());
    }

    #[test]
    fn zoneless_dates_default_to_utc() {
        let dt = parse_pub_date("Mon, 11 Aug 2025 09:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 8, 11, 9, 30, 0).unwrap());
    }

    #[test]
    fn rfc3339_fallback_covers_atom_timestamps() {
        let dt = parse_pub_date("2025-08-11T09:30:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 8, 11, 7, 30, 0).unwrap());
    }

    #[test]
    fn garbage_dates_yield_none() {
        assert_eq!(parse_pub_date("vorige week dinsdag"), None);
        assert_eq!(parse_pub_date(""), None);
    }

    #[test]
    fn missing_fields_become_none() {
        let xml = r#"<rss><channel><item><title>Alleen titel</title></item></channel></rss>"#;
        let items = parse_feed(xml, "bron", 0.8, "kavel-agent").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Alleen titel"));
        assert_eq!(items[0].source_url, None);
        assert_eq!(items[0].summary, None);
        assert_eq!(items[0].published_at_src, None);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(parse_feed("dit is geen xml <<", "bron", 0.8, "x").is_err());
    }

    #[test]
    fn entity_scrub_keeps_parser_happy() {
        let xml = "<rss><channel><item><title>Kosten&nbsp;&ndash;&nbsp;2025</title></item></channel></rss>";
        let items = parse_feed(xml, "bron", 0.8, "brikx-agent").unwrap();
        assert_eq!(items[0].title.as_deref(), Some("Kosten - 2025"));
    }
}
