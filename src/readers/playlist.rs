use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use crate::client::Fetch;
use crate::continuation::{extract_continuation, ContinuationToken, Cursor, Endpoint};
use crate::error::{ExtractError, Result};
use crate::output::{Printer, Render};
use crate::path::Selector::{Index, Key};
use crate::path::{first_of, Layout};
use crate::text::{text_at, text_value};

use super::{continuation_page, entry_list, response, string_at};

/// Playlist panel next to a video played from a playlist. Not paginated.
const WATCH_PLAYLIST: Layout<'static> = &[&[
    Key("contents"),
    Key("twoColumnWatchNextResults"),
    Key("playlist"),
    Key("playlist"),
]];

const BROWSE_PLAYLIST: Layout<'static> = &[
    &[
        Key("contents"),
        Key("twoColumnBrowseResultsRenderer"),
        Key("tabs"),
        Index(0),
        Key("tabRenderer"),
        Key("content"),
        Key("sectionListRenderer"),
        Key("contents"),
        Index(0),
        Key("itemSectionRenderer"),
        Key("contents"),
        Index(0),
        Key("playlistVideoListRenderer"),
    ],
    &[
        Key("contents"),
        Key("twoColumnBrowseResultsRenderer"),
        Key("tabs"),
        Index(0),
        Key("tabRenderer"),
        Key("content"),
        Key("sectionListRenderer"),
        Key("contents"),
        Index(0),
        Key("itemSectionRenderer"),
        Key("contents"),
        Index(0),
        Key("gridRenderer"),
    ],
];

const BROWSE_TITLE: Layout<'static> = &[
    &[Key("metadata"), Key("playlistMetadataRenderer"), Key("title")],
    &[Key("header"), Key("playlistHeaderRenderer"), Key("title")],
];

const PLAYLIST_PAGE: Layout<'static> = &[
    &[Key("continuationContents"), Key("playlistVideoListContinuation")],
    &[Key("continuationContents"), Key("gridContinuation")],
];

const VIDEO_RENDERER: Layout<'static> = &[
    &[Key("playlistPanelVideoRenderer")],
    &[Key("playlistVideoRenderer")],
    &[Key("gridVideoRenderer")],
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistEntry {
    pub video_id: String,
    pub title: String,
    pub length: Option<String>,
}

impl PlaylistEntry {
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let renderer = first_of(entry, VIDEO_RENDERER)?;
        Some(Self {
            video_id: string_at(renderer, &[Key("videoId")])?,
            title: text_at(renderer, &[Key("title")]).unwrap_or_default(),
            length: text_at(renderer, &[Key("lengthText")]),
        })
    }
}

impl Render for PlaylistEntry {
    fn render(&self, verbose: bool) -> String {
        match &self.length {
            Some(length) if verbose => format!("{} - {} ({})", self.video_id, self.title, length),
            _ => format!("{} - {}", self.video_id, self.title),
        }
    }
}

fn entries<'v>(items: impl IntoIterator<Item = &'v Value>) -> Vec<PlaylistEntry> {
    items.into_iter().filter_map(PlaylistEntry::from_entry).collect()
}

/// Lists the videos of a playlist, following browse continuations.
pub struct PlaylistReader<'f> {
    fetcher: &'f dyn Fetch,
    title: Option<String>,
    first: Vec<PlaylistEntry>,
    next: Option<ContinuationToken>,
}

impl<'f> PlaylistReader<'f> {
    pub fn new(cfg: &Value, fetcher: &'f dyn Fetch) -> Result<Self> {
        let response = response(cfg);
        if let Some(panel) = first_of(response, WATCH_PLAYLIST) {
            return Ok(Self {
                fetcher,
                title: panel.get("title").and_then(text_value),
                first: entries(entry_list(panel)),
                next: None,
            });
        }
        let list = first_of(response, BROWSE_PLAYLIST).ok_or_else(|| ExtractError::missing("playlist"))?;
        Ok(Self {
            fetcher,
            title: first_of(response, BROWSE_TITLE).and_then(text_value),
            first: entries(entry_list(list)),
            next: extract_continuation(list),
        })
    }

    pub async fn run<W: Write>(&self, printer: &mut Printer<W>) -> Result<usize> {
        if let Some(title) = &self.title {
            printer.heading(&format!("Title: {}", title))?;
        }
        for entry in &self.first {
            printer.record(entry)?;
        }
        let mut printed = self.first.len();

        let mut cursor = Cursor::new(Endpoint::Browse, self.next.clone());
        while let Some(page) = cursor.next_page(self.fetcher).await? {
            let page = continuation_page(response(&page), PLAYLIST_PAGE)
                .ok_or_else(|| ExtractError::missing("playlist continuation contents"))?;
            for entry in entries(page.entries) {
                printer.record(&entry)?;
                printed += 1;
            }
            cursor.advance(page.next);
        }
        Ok(printed)
    }
}
