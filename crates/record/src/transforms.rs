//! Derived display fields.
//!
//! Every field here is a pure projection over a stored record, computed on
//! read and never written back into storage. They are collected into a
//! single lookup table keyed by field name instead of per-field accessor
//! pairs, so adding a derived field means adding one function and one table
//! row.
//!
//! `season`, `year` and `broadcast` are three independent functions with no
//! shared state, even though the first two happen to parse the same
//! `premiered` string.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

use crate::model::Record;

/// A stateless named transform over a stored record.
pub type Transform = fn(&Record) -> Value;

/// All derived display fields, keyed by the name they are served under.
pub const TRANSFORMS: &[(&str, Transform)] = &[
    ("trailer", trailer),
    ("season", season),
    ("year", year),
    ("broadcast", broadcast),
    ("themes", themes),
    ("images", images),
];

/// Look up a single transform by field name.
pub fn transform(name: &str) -> Option<Transform> {
    TRANSFORMS.iter().find(|(key, _)| *key == name).map(|(_, f)| *f)
}

/// Compute every derived field for a record.
pub fn derived(record: &Record) -> Value {
    let mut out = serde_json::Map::new();
    for (name, f) in TRANSFORMS {
        out.insert((*name).to_string(), f(record));
    }
    Value::Object(out)
}

static PREMIERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Winter|Spring|Summer|Fall)\s(\d{4})").unwrap());
static BROADCAST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.*) at (.*) \(").unwrap());

/// Trailer metadata derived from the stored trailer URL.
///
/// Returns the null triple when the URL is absent or the youtube id cannot
/// be extracted, matching how consumers expect an always-present object.
pub fn trailer(record: &Record) -> Value {
    let Some(embed_url) = record.str_field("trailer_url") else {
        return json!({"youtube_id": null, "url": null, "embed_url": null});
    };
    match youtube_id(embed_url) {
        Some(id) => json!({
            "youtube_id": id,
            "url": format!("https://www.youtube.com/watch?v={id}"),
            "embed_url": embed_url,
        }),
        None => json!({"youtube_id": null, "url": null, "embed_url": null}),
    }
}

fn youtube_id(url: &str) -> Option<&str> {
    // Both embed-style and watch-style URLs appear in scraped data.
    if let Some(rest) = url.split("/embed/").nth(1) {
        return rest.split(['?', '&']).next().filter(|id| !id.is_empty());
    }
    if let Some(rest) = url.split("v=").nth(1) {
        return rest.split('&').next().filter(|id| !id.is_empty());
    }
    None
}

/// Premiere season (`Winter`/`Spring`/`Summer`/`Fall`) parsed from `premiered`.
pub fn season(record: &Record) -> Value {
    match record.str_field("premiered").and_then(|p| PREMIERED.captures(p)) {
        Some(caps) => json!(caps.get(1).map(|m| m.as_str())),
        None => Value::Null,
    }
}

/// Premiere year parsed from `premiered`.
pub fn year(record: &Record) -> Value {
    match record.str_field("premiered").and_then(|p| PREMIERED.captures(p)) {
        Some(caps) => match caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) {
            Some(y) => json!(y),
            None => Value::Null,
        },
        None => Value::Null,
    }
}

/// Structured broadcast slot parsed from the free-form broadcast string.
///
/// Upstream strings look like `"Saturdays at 01:00 (JST)"`. The timezone is
/// always reported as `Asia/Tokyo`; the parenthesized label is advisory.
pub fn broadcast(record: &Record) -> Value {
    let Some(raw) = record.str_field("broadcast") else {
        return Value::Null;
    };
    match BROADCAST.captures(raw) {
        Some(caps) => json!({
            "day": caps.get(1).map(|m| m.as_str()),
            "time": caps.get(2).map(|m| m.as_str()),
            "timezone": "Asia/Tokyo",
            "string": raw,
        }),
        None => Value::Null,
    }
}

/// Opening/ending theme lists grouped under one object.
pub fn themes(record: &Record) -> Value {
    json!({
        "opening": record.field("opening_themes").cloned().unwrap_or(Value::Array(vec![])),
        "ending": record.field("ending_themes").cloned().unwrap_or(Value::Array(vec![])),
    })
}

/// Image URL variants derived from the stored base image URL.
///
/// The upstream CDN encodes size in a filename suffix (`t` small, `l` large)
/// and serves a webp mirror under the same path.
pub fn images(record: &Record) -> Value {
    let Some(url) = record.str_field("image_url") else {
        return Value::Null;
    };
    json!({
        "jpg": {
            "image_url": url,
            "small_image_url": url.replace(".jpg", "t.jpg"),
            "large_image_url": url.replace(".jpg", "l.jpg"),
        },
        "webp": {
            "image_url": url.replace(".jpg", ".webp"),
            "small_image_url": url.replace(".jpg", "t.webp"),
            "large_image_url": url.replace(".jpg", "l.webp"),
        },
    })
}
