use std::fmt;
use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::client::Fetch;
use crate::continuation::{extract_continuation, ContinuationToken, Cursor, Endpoint, YOUTUBE_URL};
use crate::error::{ExtractError, Result};
use crate::output::{Printer, Render};
use crate::path::Selector::Key;
use crate::path::{first_of, get, Layout, Selector};
use crate::text::{text_at, text_value};

use super::{continuation_page, entry_list, response, session_token, string_at};

const SECTION_LIST: &[Selector<'static>] = &[
    Key("contents"),
    Key("twoColumnSearchResultsRenderer"),
    Key("primaryContents"),
    Key("sectionListRenderer"),
];

const SEARCH_PAGE: Layout<'static> = &[&[Key("continuationContents"), Key("sectionListContinuation")]];

const CHANNEL_NAME: Layout<'static> = &[
    &[Key("ownerText")],
    &[Key("longBylineText")],
    &[Key("shortBylineText")],
];

const VIDEO_COUNT: Layout<'static> = &[&[Key("videoCountText")], &[Key("videoCount")]];

pub fn search_url(query: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("search_query", query)
        .finish();
    format!("{}/results?{}", YOUTUBE_URL, query)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Video,
    Channel,
    Playlist,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Video => write!(f, "video"),
            ResultKind::Channel => write!(f, "channel"),
            ResultKind::Playlist => write!(f, "playlist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub kind: ResultKind,
    pub id: String,
    pub title: String,
    pub channel: Option<String>,
    pub length: Option<String>,
    pub published: Option<String>,
    /// View count of a video, subscriber count of a channel, video count of a playlist.
    pub views: Option<String>,
}

impl SearchResult {
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let (kind, renderer, id_key) = if let Some(r) = entry.get("videoRenderer") {
            (ResultKind::Video, r, "videoId")
        } else if let Some(r) = entry.get("channelRenderer") {
            (ResultKind::Channel, r, "channelId")
        } else if let Some(r) = entry.get("playlistRenderer") {
            (ResultKind::Playlist, r, "playlistId")
        } else {
            return None;
        };

        let views = match kind {
            ResultKind::Video => text_at(renderer, &[Key("viewCountText")]),
            ResultKind::Channel => text_at(renderer, &[Key("subscriberCountText")]),
            ResultKind::Playlist => first_of(renderer, VIDEO_COUNT).and_then(text_value),
        };
        Some(Self {
            kind,
            id: string_at(renderer, &[Key(id_key)])?,
            title: text_at(renderer, &[Key("title")]).unwrap_or_default(),
            channel: first_of(renderer, CHANNEL_NAME).and_then(text_value),
            length: text_at(renderer, &[Key("lengthText")]),
            published: text_at(renderer, &[Key("publishedTimeText")]),
            views,
        })
    }
}

impl Render for SearchResult {
    fn render(&self, verbose: bool) -> String {
        let mut line = match self.kind {
            ResultKind::Video => format!("{} - {}", self.id, self.title),
            kind => format!("{} {} - {}", kind, self.id, self.title),
        };
        if verbose {
            let details: Vec<&str> = [&self.channel, &self.length, &self.published, &self.views]
                .into_iter()
                .filter_map(|field| field.as_deref())
                .collect();
            if !details.is_empty() {
                line.push_str(&format!(" [{}]", details.join(", ")));
            }
        }
        line
    }
}

/// Search results sit one level down inside `itemSectionRenderer` blocks.
fn results<'v>(entries: impl IntoIterator<Item = &'v Value>) -> Vec<SearchResult> {
    entries
        .into_iter()
        .flat_map(|entry| match entry.get("itemSectionRenderer") {
            Some(section) => entry_list(section),
            None => vec![entry],
        })
        .filter_map(SearchResult::from_entry)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Stop after this many results.
    pub limit: Option<usize>,
}

pub struct SearchReader<'f> {
    fetcher: &'f dyn Fetch,
    query: String,
    session_token: String,
    first: Vec<SearchResult>,
    next: Option<ContinuationToken>,
    options: SearchOptions,
}

impl<'f> SearchReader<'f> {
    /// `cfg` is the page config of [`search_url`] for `query`.
    pub fn new(cfg: &Value, query: &str, fetcher: &'f dyn Fetch, options: SearchOptions) -> Result<Self> {
        let list = get(response(cfg), SECTION_LIST).ok_or_else(|| ExtractError::missing("search results"))?;
        Ok(Self {
            fetcher,
            query: query.to_string(),
            session_token: session_token(cfg),
            first: results(entry_list(list)),
            next: extract_continuation(list),
            options,
        })
    }

    fn full(&self, printed: usize) -> bool {
        self.options.limit.is_some_and(|limit| printed >= limit)
    }

    pub async fn run<W: Write>(&self, printer: &mut Printer<W>) -> Result<usize> {
        let mut printed = 0;
        for result in &self.first {
            if self.full(printed) {
                return Ok(printed);
            }
            printer.record(result)?;
            printed += 1;
        }

        let endpoint = Endpoint::Search {
            query: self.query.clone(),
            session_token: self.session_token.clone(),
        };
        let mut cursor = Cursor::new(endpoint, self.next.clone());
        while !self.full(printed) {
            let Some(page) = cursor.next_page(self.fetcher).await? else {
                break;
            };
            let page = continuation_page(response(&page), SEARCH_PAGE)
                .ok_or_else(|| ExtractError::missing("search continuation contents"))?;
            for result in results(page.entries) {
                if self.full(printed) {
                    break;
                }
                printer.record(&result)?;
                printed += 1;
            }
            cursor.advance(page.next);
        }
        Ok(printed)
    }
}
