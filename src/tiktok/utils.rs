use super::{error::FetchError, model::VideoRecord};
use chrono::{Local, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use url::Url;

const TITLE_PLACEHOLDER: &str = "Untitled";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

lazy_static! {
    static ref HANDLE_REGEX: Regex = Regex::new(r"^[A-Za-z0-9._]+$").unwrap();
    static ref TIKTOK_BASE: Url = Url::parse("https://www.tiktok.com/").unwrap();
}

/// Rejects empty handles, strips one leading `@` and checks the charset.
pub fn normalize_handle(handle: &str) -> Result<String, FetchError> {
    if handle.trim().is_empty() {
        return Err(FetchError::HandleRequired);
    }

    let handle = handle.strip_prefix('@').unwrap_or(handle);
    if !HANDLE_REGEX.is_match(handle) {
        return Err(FetchError::MalformedHandle);
    }

    Ok(handle.to_string())
}

pub fn profile_url(handle: &str) -> Result<Url, FetchError> {
    TIKTOK_BASE
        .join(&format!("@{}", handle))
        .map_err(|_| FetchError::MalformedHandle)
}

pub fn video_url(handle: &str, id: &str) -> String {
    format!("https://www.tiktok.com/@{}/video/{}", handle, id)
}

pub fn thumbnail_url(id: &str) -> String {
    format!(
        "https://p16-sign.tiktokcdn.com/tos-maliva-p-0068/{}~tplv-obj2:1080:1080:0:0.webp",
        id
    )
}

/// `m:ss`, floored. Missing, negative or non-finite values give `0:00`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let seconds = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s.floor() as u64,
        _ => 0,
    };
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Local date/time of an epoch-seconds value, or of now when absent.
pub fn format_timestamp(epoch_seconds: Option<f64>) -> String {
    let at = epoch_seconds
        .filter(|s| s.is_finite())
        .and_then(|s| Local.timestamp_opt(s.floor() as i64, 0).single());

    match at {
        Some(at) => at.format(TIMESTAMP_FORMAT).to_string(),
        None => Local::now().format(TIMESTAMP_FORMAT).to_string(),
    }
}

fn non_empty_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Parses one line of `--dump-json` output.
///
/// `Err` when the line is not a JSON object, `Ok(None)` when it is one but
/// lacks an id or a webpage URL.
pub fn parse_line(
    handle: &str,
    line_number: usize,
    line: &str,
) -> Result<Option<VideoRecord>, FetchError> {
    let entry: Value =
        serde_json::from_str(line).map_err(|_| FetchError::ParseFailure { line: line_number })?;
    if !entry.is_object() {
        return Err(FetchError::ParseFailure { line: line_number });
    }

    let id = match non_empty_id(&entry["id"]) {
        Some(id) => id,
        None => return Ok(None),
    };
    match entry["webpage_url"].as_str() {
        Some(webpage_url) if !webpage_url.is_empty() => (),
        _ => return Ok(None),
    }

    let title = match entry["title"].as_str() {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => TITLE_PLACEHOLDER.to_string(),
    };

    Ok(Some(VideoRecord {
        url: video_url(handle, &id),
        thumbnail_url: thumbnail_url(&id),
        duration: format_duration(entry["duration"].as_f64()),
        timestamp: format_timestamp(entry["timestamp"].as_f64()),
        title,
        id,
    }))
}
