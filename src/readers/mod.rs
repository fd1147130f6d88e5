//! Feature readers: one per extraction task.
//!
//! Every reader starts from a page config document, finds its records with
//! layout tables (ordered alternative paths, first match wins), and follows
//! continuation tokens until the upstream stops issuing them.

pub mod comments;
pub mod detail;
pub mod livechat;
pub mod playlist;
pub mod search;
pub mod subtitles;

pub use comments::{Comment, CommentOptions, CommentReader};
pub use detail::{DetailReader, VideoDetails};
pub use livechat::{ChatMessage, LivechatOptions, LivechatReader};
pub use playlist::{PlaylistEntry, PlaylistReader};
pub use search::{search_url, ResultKind, SearchOptions, SearchReader, SearchResult};
pub use subtitles::{CaptionTrack, SubtitleFormat, SubtitleOptions, SubtitleReader};

use serde_json::Value;

use crate::continuation::{continuation_from_item, extract_continuation, ContinuationToken};
use crate::path::Selector::{Key, Member};
use crate::path::{first_of, get_str, Layout, Selector};

/// The `response` part of a page config. Page configs come as a `pbj` array
/// of objects or as a single object; a bare response is taken as is.
const RESPONSE: Layout<'static> = &[&[Member(&["response"]), Key("response")], &[Key("response")], &[]];

const PLAYER_RESPONSE: Layout<'static> = &[
    &[Member(&["playerResponse"]), Key("playerResponse")],
    &[Key("playerResponse")],
    &[],
];

const XSRF_TOKEN: Layout<'static> = &[&[Member(&["xsrf_token"]), Key("xsrf_token")], &[Key("xsrf_token")]];

/// Main column of a watch page, relative to the response.
pub(crate) const WATCH_CONTENTS: &[Selector<'static>] = &[
    Key("contents"),
    Key("twoColumnWatchNextResults"),
    Key("results"),
    Key("results"),
    Key("contents"),
];

/// Lists under which continuation responses deliver appended items.
const RECEIVED: &[&str] = &[
    "onResponseReceivedEndpoints",
    "onResponseReceivedActions",
    "onResponseReceivedCommands",
];

const RECEIVED_ITEMS: Layout<'static> = &[
    &[Key("appendContinuationItemsAction"), Key("continuationItems")],
    &[Key("reloadContinuationItemsCommand"), Key("continuationItems")],
];

/// Entry lists inside a continuation container.
const ENTRY_LISTS: &[&str] = &["contents", "items"];

pub(crate) fn response(doc: &Value) -> &Value {
    first_of(doc, RESPONSE).unwrap_or(doc)
}

pub(crate) fn player_response(doc: &Value) -> &Value {
    first_of(doc, PLAYER_RESPONSE).unwrap_or(doc)
}

pub(crate) fn session_token(doc: &Value) -> String {
    match first_of(doc, XSRF_TOKEN).and_then(Value::as_str) {
        Some(token) => token.to_string(),
        None => {
            log::warn!("no xsrf_token in page config, continuing without session token");
            String::new()
        }
    }
}

/// Entries of one continuation page and the token for the page after it.
pub(crate) struct Page<'v> {
    pub entries: Vec<&'v Value>,
    pub next: Option<ContinuationToken>,
}

/// Locates the entries of a continuation response: either inside one of the
/// `containers` (`contents`/`items` plus `continuations`), or appended via
/// `onResponseReceived*` actions with a trailing continuation item.
pub(crate) fn continuation_page<'v>(response: &'v Value, containers: Layout<'_>) -> Option<Page<'v>> {
    if let Some(container) = first_of(response, containers) {
        return Some(Page {
            entries: entry_list(container),
            next: extract_continuation(container),
        });
    }

    let mut found = false;
    let mut entries = Vec::new();
    for key in RECEIVED {
        let Some(received) = response.get(*key).and_then(Value::as_array) else {
            continue;
        };
        found = true;
        for item in received {
            if let Some(items) = first_of(item, RECEIVED_ITEMS).and_then(Value::as_array) {
                entries.extend(items);
            }
        }
    }
    if !found {
        return None;
    }
    let next = entries.iter().rev().find_map(|entry| continuation_from_item(entry));
    Some(Page { entries, next })
}

pub(crate) fn entry_list(container: &Value) -> Vec<&Value> {
    ENTRY_LISTS
        .iter()
        .filter_map(|key| container.get(*key).and_then(Value::as_array))
        .flatten()
        .collect()
}

pub(crate) fn string_at(doc: &Value, path: &[Selector<'_>]) -> Option<String> {
    get_str(doc, path).map(str::to_string)
}
