use poem_openapi::Object;
use serde::Serialize;

/// One video of a profile listing
#[derive(Debug, Object, Clone, PartialEq, Eq, Serialize)]
#[oai(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Platform assigned video id
    pub id: String,
    /// Title of the video ("Untitled" when the platform has none)
    pub title: String,
    /// Watch URL of the video
    pub url: String,
    /// Thumbnail URL derived from the id (not checked for reachability)
    pub thumbnail_url: String,
    /// Duration as minutes:seconds
    pub duration: String,
    /// Upload time in local time, or the fetch time when unknown
    pub timestamp: String,
}
