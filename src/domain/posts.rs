//! Post rendering and the line formats stored in the timeline caches.
//!
//! Author timeline lines are `time\tbody`, hashtag index lines are
//! `author\ttime\tbody`. In both, `body` is already escaped and has its
//! hashtags rewritten to links, so readers can emit it verbatim.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};
use url::Url;

use super::entities::PostRecord;
use super::error::DomainError;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// A tag runs from `#` to the next whitespace or the end of the text.
static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(\S+)").expect("hashtag pattern is valid"));

static SEGMENT_BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("segment base url is valid"));

/// Format a creation time as `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Parse an `until` cursor in the same format `format_timestamp` produces.
pub fn parse_cursor(value: &str) -> Result<OffsetDateTime, DomainError> {
    PrimitiveDateTime::parse(value.trim(), TIMESTAMP_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|err| DomainError::invalid_cursor(value, err.to_string()))
}

/// Percent-encode `value` as a single URL path segment. Unlike form encoding,
/// a space becomes `%20` and `+` is kept, so routers decode it back unchanged.
pub fn path_segment(value: &str) -> String {
    let mut url = SEGMENT_BASE.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(value);
    }
    url.path().trim_start_matches('/').to_string()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Distinct hashtags in order of first appearance, without the leading `#`.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in HASHTAG.captures_iter(text) {
        if let Some(tag) = caps.get(1) {
            let tag = tag.as_str();
            if !tags.iter().any(|seen| seen == tag) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

/// Escape the raw text and rewrite each hashtag into a link to its tag feed.
pub fn render_body(text: &str) -> String {
    let mut rendered = String::with_capacity(text.len() + 32);
    let mut last = 0;

    for caps in HASHTAG.captures_iter(text) {
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        rendered.push_str(&escape_html(&text[last..whole.start()]));

        let _ = write!(
            rendered,
            r#"<a class="hashtag" href="/hashtag/{}">#{}</a>"#,
            escape_html(&path_segment(tag.as_str())),
            escape_html(tag.as_str())
        );
        last = whole.end();
    }

    rendered.push_str(&escape_html(&text[last..]));
    rendered
}

pub fn author_line(time: &str, html: &str) -> String {
    format!("{time}\t{html}")
}

pub fn hashtag_line(author: &str, time: &str, html: &str) -> String {
    format!("{author}\t{time}\t{html}")
}

/// One rendered post as it appears in any timeline view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub author: String,
    pub time: String,
    pub html: String,
}

impl TimelineEntry {
    pub fn from_record(author: &str, post: &PostRecord) -> Self {
        Self {
            author: author.to_string(),
            time: format_timestamp(post.created_at),
            html: render_body(&post.body),
        }
    }

    pub fn from_author_line(author: &str, line: &str) -> Result<Self, DomainError> {
        let (time, html) = line
            .split_once('\t')
            .ok_or_else(|| DomainError::malformed_line("author timeline", line))?;
        Ok(Self {
            author: author.to_string(),
            time: time.to_string(),
            html: html.to_string(),
        })
    }

    pub fn from_hashtag_line(line: &str) -> Result<Self, DomainError> {
        let mut parts = line.splitn(3, '\t');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(author), Some(time), Some(html)) => Ok(Self {
                author: author.to_string(),
                time: time.to_string(),
                html: html.to_string(),
            }),
            _ => Err(DomainError::malformed_line("hashtag index", line)),
        }
    }
}
