use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ExtractError, Result};
use crate::output::{Printer, Render};
use crate::path::Selector::{Key, Member};
use crate::path::{first_of, get, get_u64, Layout, Selector};
use crate::text::{text_at, text_value};

use super::{player_response, response, string_at, WATCH_CONTENTS};

const MICROFORMAT: &[Selector<'static>] = &[Key("microformat"), Key("playerMicroformatRenderer")];

const SENTIMENT: &[Selector<'static>] = &[
    Member(&["videoPrimaryInfoRenderer"]),
    Key("videoPrimaryInfoRenderer"),
    Key("sentimentBar"),
    Key("sentimentBarRenderer"),
    Key("tooltip"),
];

const TITLE: Layout<'static> = &[&[Key("microformat"), Key("title")], &[Key("details"), Key("title")]];
const OWNER: Layout<'static> = &[&[Key("microformat"), Key("ownerChannelName")], &[Key("details"), Key("author")]];
const VIEW_COUNT: Layout<'static> = &[&[Key("microformat"), Key("viewCount")], &[Key("details"), Key("viewCount")]];
const LENGTH: Layout<'static> = &[
    &[Key("microformat"), Key("lengthSeconds")],
    &[Key("details"), Key("lengthSeconds")],
];
const DESCRIPTION: Layout<'static> = &[
    &[Key("microformat"), Key("description")],
    &[Key("details"), Key("shortDescription")],
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub owner: String,
    pub view_count: Option<u64>,
    pub length_seconds: Option<u64>,
    pub sentiment: Option<String>,
    pub published: Option<String>,
    pub uploaded: Option<String>,
    pub description: String,
}

/// Normalizes a `YYYY-MM-DD[...]` date; anything else is kept as sent.
fn parse_date(raw: &str) -> String {
    let day = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => {
            log::warn!("invalid date format: {}", raw);
            raw.to_string()
        }
    }
}

/// `H:MM:SS`
pub fn format_length(seconds: u64) -> String {
    format!("{}:{:02}:{:02}", seconds / 3600, seconds / 60 % 60, seconds % 60)
}

impl VideoDetails {
    pub fn from_config(cfg: &Value) -> Result<Self> {
        let player = player_response(cfg);
        let microformat = get(player, MICROFORMAT).ok_or_else(|| ExtractError::missing("microformat"))?;
        let details = player.get("videoDetails").cloned().unwrap_or(Value::Null);
        // Both sources under one root so the layouts can fall back between them.
        let sources = serde_json::json!({ "microformat": microformat, "details": details });

        let text = |layout: Layout<'static>| first_of(&sources, layout).and_then(text_value);
        let date = |key: &str| string_at(microformat, &[Key(key)]).map(|raw| parse_date(&raw));

        Ok(Self {
            video_id: string_at(&details, &[Key("videoId")]).unwrap_or_default(),
            title: text(TITLE).unwrap_or_default(),
            owner: text(OWNER).unwrap_or_default(),
            view_count: VIEW_COUNT.iter().find_map(|path| get_u64(&sources, path)),
            length_seconds: LENGTH.iter().find_map(|path| get_u64(&sources, path)),
            sentiment: get(response(cfg), WATCH_CONTENTS).and_then(|c| text_at(c, SENTIMENT)),
            published: date("publishDate"),
            uploaded: date("uploadDate"),
            description: text(DESCRIPTION).unwrap_or_default(),
        })
    }
}

impl Render for VideoDetails {
    fn render(&self, _verbose: bool) -> String {
        let mut stats = Vec::new();
        if let Some(views) = self.view_count {
            stats.push(format!("viewcount: {}", views));
        }
        if let Some(length) = self.length_seconds {
            stats.push(format!("length: {}", format_length(length)));
        }
        if let Some(sentiment) = &self.sentiment {
            stats.push(format!("sentiment: {}", sentiment));
        }
        if let Some(published) = &self.published {
            stats.push(format!("published: {}", published));
        }
        if let Some(uploaded) = &self.uploaded {
            if self.published.as_ref() != Some(uploaded) {
                stats.push(format!("uploaded at: {}", uploaded));
            }
        }
        format!(
            "{} - {}\nBy: {}\n\n{}\n\n{}\n",
            self.video_id,
            self.title,
            self.owner,
            stats.join(", "),
            self.description
        )
    }
}

/// Prints the metadata of a video. Needs no requests beyond the page config.
pub struct DetailReader {
    details: VideoDetails,
}

impl DetailReader {
    pub fn new(cfg: &Value) -> Result<Self> {
        Ok(Self {
            details: VideoDetails::from_config(cfg)?,
        })
    }

    pub fn details(&self) -> &VideoDetails {
        &self.details
    }

    pub fn run<W: Write>(&self, printer: &mut Printer<W>) -> Result<usize> {
        printer.record(&self.details)?;
        Ok(1)
    }
}
