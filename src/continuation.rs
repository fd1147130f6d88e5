//! Continuation-token pagination.
//!
//! A page names its successor with a continuation token. Three shapes are
//! understood, tried in this order:
//!
//! 1. `continuations[0].nextContinuationData.{continuation, clickTrackingParams}`
//! 2. a `continuationItemRenderer` entry at the end of the page's content list
//! 3. `continuations[0].<chat continuation data>.continuation` (live chat, no click tracking)
//!
//! A [`Cursor`] hands out each token exactly once.

use serde_json::Value;
use url::form_urlencoded;

use crate::client::Fetch;
use crate::error::{ExtractError, Result};
use crate::path::Selector::{Index, Key};
use crate::path::{first_of, get, get_str, Layout, Selector};

pub const YOUTUBE_URL: &str = "https://www.youtube.com";

const NEXT_CONTINUATION_DATA: &[Selector<'static>] =
    &[Key("continuations"), Index(0), Key("nextContinuationData")];

const CHAT_CONTINUATION_DATA: &[&str] = &[
    "liveChatReplayContinuationData",
    "reloadContinuationData",
    "timedContinuationData",
    "invalidationContinuationData",
];

/// Fields of a container that hold its entry list.
const CONTENT_LISTS: &[&str] = &["contents", "items", "continuationItems"];

const ITEM_TOKEN: Layout<'static> = &[
    &[Key("continuationItemRenderer"), Key("continuationEndpoint"), Key("continuationCommand"), Key("token")],
    &[
        Key("continuationItemRenderer"),
        Key("button"),
        Key("buttonRenderer"),
        Key("command"),
        Key("continuationCommand"),
        Key("token"),
    ],
];

const ITEM_CLICK_TRACKING: Layout<'static> = &[
    &[Key("continuationItemRenderer"), Key("continuationEndpoint"), Key("clickTrackingParams")],
    &[Key("continuationItemRenderer"), Key("button"), Key("buttonRenderer"), Key("command"), Key("clickTrackingParams")],
];

/// Where to resume pagination. Consumed by exactly one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub token: String,
    pub click_tracking: Option<String>,
}

impl ContinuationToken {
    pub fn new(token: impl Into<String>, click_tracking: Option<String>) -> Self {
        Self {
            token: token.into(),
            click_tracking,
        }
    }
}

/// Finds the token for the page following `container`.
pub fn extract_continuation(container: &Value) -> Option<ContinuationToken> {
    next_continuation_data(container)
        .or_else(|| {
            entry_lists(container)
                .into_iter()
                .find_map(continuation_in_items)
        })
        .or_else(|| chat_continuation(container))
}

fn next_continuation_data(container: &Value) -> Option<ContinuationToken> {
    let data = get(container, NEXT_CONTINUATION_DATA)?;
    let token = data.get("continuation")?.as_str()?;
    let click = data
        .get("clickTrackingParams")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(ContinuationToken::new(token, click))
}

fn chat_continuation(container: &Value) -> Option<ContinuationToken> {
    let first = get(container, &[Key("continuations"), Index(0)])?;
    CHAT_CONTINUATION_DATA.iter().find_map(|key| {
        get_str(first, &[Key(*key), Key("continuation")]).map(|token| ContinuationToken::new(token, None))
    })
}

fn entry_lists(container: &Value) -> Vec<&[Value]> {
    match container {
        Value::Array(items) => vec![items.as_slice()],
        Value::Object(map) => CONTENT_LISTS
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .collect(),
        _ => Vec::new(),
    }
}

/// Token carried by a single `continuationItemRenderer` entry.
pub fn continuation_from_item(entry: &Value) -> Option<ContinuationToken> {
    let token = first_of(entry, ITEM_TOKEN)?.as_str()?;
    let click = first_of(entry, ITEM_CLICK_TRACKING)
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(ContinuationToken::new(token, click))
}

/// Scans an entry list from the end for a continuation entry.
pub fn continuation_in_items(items: &[Value]) -> Option<ContinuationToken> {
    items.iter().rev().find_map(continuation_from_item)
}

/// Endpoint families that accept a continuation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Comments { session_token: String },
    CommentReplies { session_token: String },
    Browse,
    Search { query: String, session_token: String },
    LiveChat,
    LiveChatReplay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub body: Option<Vec<u8>>,
}

fn session_body(session_token: &str) -> Vec<u8> {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("session_token", session_token)
        .finish()
        .into_bytes()
}

fn ctoken_query(query: &mut form_urlencoded::Serializer<'_, String>, token: &ContinuationToken) {
    query
        .append_pair("ctoken", &token.token)
        .append_pair("continuation", &token.token);
    if let Some(click) = &token.click_tracking {
        query.append_pair("itct", click);
    }
}

impl Endpoint {
    /// Builds the follow-up request for `token`. `player_offset_ms` is only
    /// used by the live chat replay endpoint.
    pub fn request(&self, token: &ContinuationToken, player_offset_ms: u64) -> Request {
        let mut query = form_urlencoded::Serializer::new(String::new());
        let (path, body) = match self {
            Endpoint::Comments { session_token } | Endpoint::CommentReplies { session_token } => {
                let action = match self {
                    Endpoint::CommentReplies { .. } => "action_get_comment_replies",
                    _ => "action_get_comments",
                };
                query.append_pair(action, "1").append_pair("pbj", "1");
                ctoken_query(&mut query, token);
                ("comment_service_ajax", Some(session_body(session_token)))
            }
            Endpoint::Browse => {
                ctoken_query(&mut query, token);
                ("browse_ajax", None)
            }
            Endpoint::Search { query: search, session_token } => {
                query.append_pair("pbj", "1").append_pair("search_query", search);
                ctoken_query(&mut query, token);
                ("results", Some(session_body(session_token)))
            }
            Endpoint::LiveChat => {
                query
                    .append_pair("continuation", &token.token)
                    .append_pair("pbj", "1");
                ("live_chat/get_live_chat", None)
            }
            Endpoint::LiveChatReplay => {
                query
                    .append_pair("continuation", &token.token)
                    .append_pair("playerOffsetMs", &player_offset_ms.to_string())
                    .append_pair("hidden", "false")
                    .append_pair("pbj", "1");
                ("live_chat_replay/get_live_chat_replay", None)
            }
        };
        Request {
            url: format!("{}/{}?{}", YOUTUBE_URL, path, query.finish()),
            body,
        }
    }
}

/// Decodes a response body that must be JSON.
pub fn decode_json(url: &str, bytes: &[u8]) -> Result<Value> {
    log::debug!("response from {}:\n{}", url, String::from_utf8_lossy(bytes));
    serde_json::from_slice(bytes).map_err(|e| ExtractError::NotJson {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Issues the request for `token` and decodes the answer.
pub async fn fetch_next(
    fetcher: &dyn Fetch,
    endpoint: &Endpoint,
    token: &ContinuationToken,
    player_offset_ms: u64,
) -> Result<Value> {
    let request = endpoint.request(token, player_offset_ms);
    let bytes = fetcher.fetch(&request.url, request.body.as_deref()).await?;
    decode_json(&request.url, &bytes)
}

/// One pagination run: `Start -> (token -> fetch -> decode -> token)* -> End`.
#[derive(Debug)]
pub struct Cursor {
    endpoint: Endpoint,
    next: Option<ContinuationToken>,
    last_offset: Option<u64>,
    fetches: usize,
}

impl Cursor {
    pub fn new(endpoint: Endpoint, first: Option<ContinuationToken>) -> Self {
        Self {
            endpoint,
            next: first,
            last_offset: None,
            fetches: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    pub fn fetches(&self) -> usize {
        self.fetches
    }

    /// Fetches the page for the pending token, or `None` once pagination ended.
    /// The token is spent even when the fetch fails.
    pub async fn next_page(&mut self, fetcher: &dyn Fetch) -> Result<Option<Value>> {
        let Some(token) = self.next.take() else {
            return Ok(None);
        };
        self.fetches += 1;
        let offset = self.last_offset.unwrap_or(0);
        fetch_next(fetcher, &self.endpoint, &token, offset).await.map(Some)
    }

    /// Records the token found on the page just fetched.
    pub fn advance(&mut self, next: Option<ContinuationToken>) {
        self.next = next;
    }

    /// Like [`Cursor::advance`], but ends pagination when the page's position
    /// marker is missing or equal to the previous one. Some endpoints repeat
    /// their last page forever instead of dropping the token.
    ///
    /// Returns `false` when the page did not move forward; its contents were
    /// already seen and should be discarded.
    pub fn advance_at_offset(&mut self, next: Option<ContinuationToken>, offset_ms: Option<u64>) -> bool {
        match offset_ms {
            Some(offset) if self.last_offset != Some(offset) => {
                self.last_offset = Some(offset);
                self.next = next;
                true
            }
            _ => {
                log::info!("position did not advance past {:?}, stopping", self.last_offset);
                self.next = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetch;
    use serde_json::json;

    fn token(t: &str, click: &str) -> ContinuationToken {
        ContinuationToken::new(t, Some(click.to_string()))
    }

    #[test]
    fn test_no_continuations_yields_none() {
        assert_eq!(extract_continuation(&json!({ "contents": [] })), None);
        assert_eq!(extract_continuation(&json!({ "continuations": [] })), None);
        assert_eq!(extract_continuation(&json!("scalar")), None);
    }

    #[test]
    fn test_next_continuation_data() {
        let container = json!({
            "contents": [],
            "continuations": [{
                "nextContinuationData": { "continuation": "EiYS", "clickTrackingParams": "CMwB" }
            }]
        });
        assert_eq!(extract_continuation(&container), Some(token("EiYS", "CMwB")));
    }

    #[test]
    fn test_continuation_item_renderer_after_entries() {
        let container = json!({
            "contents": [
                { "playlistVideoRenderer": { "videoId": "a" } },
                { "continuationItemRenderer": {
                    "continuationEndpoint": {
                        "clickTrackingParams": "click",
                        "continuationCommand": { "token": "next-page" }
                    }
                } }
            ]
        });
        assert_eq!(extract_continuation(&container), Some(token("next-page", "click")));
    }

    #[test]
    fn test_reply_button_continuation() {
        let item = json!({ "continuationItemRenderer": { "button": { "buttonRenderer": { "command": {
            "clickTrackingParams": "c",
            "continuationCommand": { "token": "more-replies" }
        } } } } });
        assert_eq!(continuation_from_item(&item), Some(token("more-replies", "c")));
        assert_eq!(continuation_in_items(&[json!({ "x": 1 }), item]), Some(token("more-replies", "c")));
    }

    #[test]
    fn test_next_continuation_data_has_priority() {
        let container = json!({
            "items": [{ "continuationItemRenderer": { "continuationEndpoint": {
                "continuationCommand": { "token": "second" }
            } } }],
            "continuations": [{ "nextContinuationData": { "continuation": "first" } }]
        });
        assert_eq!(extract_continuation(&container), Some(ContinuationToken::new("first", None)));
    }

    #[test]
    fn test_chat_continuation_has_no_click_tracking() {
        let replay = json!({ "continuations": [{ "liveChatReplayContinuationData": { "continuation": "r1", "timeUntilLastMessageMsec": 5 } }] });
        let live = json!({ "continuations": [{ "reloadContinuationData": { "continuation": "l1", "clickTrackingParams": "ignored" } }] });
        assert_eq!(extract_continuation(&replay), Some(ContinuationToken::new("r1", None)));
        assert_eq!(extract_continuation(&live), Some(ContinuationToken::new("l1", None)));
    }

    #[test]
    fn test_comment_request_shape() {
        let endpoint = Endpoint::Comments { session_token: "QUFF=".to_string() };
        let request = endpoint.request(&token("ab%c", "CK"), 0);
        assert_eq!(
            request.url,
            "https://www.youtube.com/comment_service_ajax?action_get_comments=1&pbj=1&ctoken=ab%25c&continuation=ab%25c&itct=CK"
        );
        assert_eq!(request.body.as_deref(), Some(&b"session_token=QUFF%3D"[..]));

        let replies = Endpoint::CommentReplies { session_token: "x".to_string() };
        assert!(replies.request(&token("t", "c"), 0).url.contains("action_get_comment_replies=1"));
    }

    #[test]
    fn test_get_request_shapes() {
        let browse = Endpoint::Browse.request(&ContinuationToken::new("t", None), 0);
        assert_eq!(browse.url, "https://www.youtube.com/browse_ajax?ctoken=t&continuation=t");
        assert!(browse.body.is_none());

        let replay = Endpoint::LiveChatReplay.request(&ContinuationToken::new("r", None), 1500);
        assert_eq!(
            replay.url,
            "https://www.youtube.com/live_chat_replay/get_live_chat_replay?continuation=r&playerOffsetMs=1500&hidden=false&pbj=1"
        );

        let search = Endpoint::Search { query: "rust lang".to_string(), session_token: "s".to_string() };
        let request = search.request(&ContinuationToken::new("t", None), 0);
        assert_eq!(request.url, "https://www.youtube.com/results?pbj=1&search_query=rust+lang&ctoken=t&continuation=t");
        assert!(request.body.is_some());
    }

    #[test]
    fn test_decode_json_rejects_html() {
        let err = decode_json("u", b"<html>oops</html>").unwrap_err();
        assert!(err.is_malformed_response());
        assert!(decode_json("u", b"{\"a\":1}").is_ok());
    }

    #[tokio::test]
    async fn test_cursor_follows_chain_and_stops() {
        let fetch = MockFetch::new(vec![
            json!({ "continuations": [{ "nextContinuationData": { "continuation": "p2" } }] }),
            json!({ "continuations": [{ "nextContinuationData": { "continuation": "p3" } }] }),
            json!({ "last": true }),
        ]);
        let mut cursor = Cursor::new(Endpoint::Browse, Some(ContinuationToken::new("p1", None)));
        let mut pages = 0;
        while let Some(page) = cursor.next_page(&fetch).await.unwrap() {
            pages += 1;
            cursor.advance(extract_continuation(&page));
        }
        assert_eq!(pages, 3);
        assert_eq!(cursor.fetches(), 3);
        assert!(cursor.is_exhausted());
        let urls: Vec<String> = fetch.requests().into_iter().map(|r| r.url).collect();
        assert!(urls[0].contains("ctoken=p1"));
        assert!(urls[1].contains("ctoken=p2"));
        assert!(urls[2].contains("ctoken=p3"));
    }

    #[tokio::test]
    async fn test_cursor_token_is_spent_on_failure() {
        let fetch = MockFetch::from_bodies(vec![b"<html></html>".to_vec()]);
        let mut cursor = Cursor::new(Endpoint::Browse, Some(ContinuationToken::new("p1", None)));
        assert!(cursor.next_page(&fetch).await.is_err());
        assert!(cursor.is_exhausted());
        assert!(cursor.next_page(&fetch).await.unwrap().is_none());
        assert_eq!(fetch.fetch_count(), 1);
    }

    #[test]
    fn test_repeated_offset_ends_pagination() {
        let mut cursor = Cursor::new(Endpoint::LiveChatReplay, None);
        assert!(cursor.advance_at_offset(Some(ContinuationToken::new("a", None)), Some(1000)));
        assert!(!cursor.is_exhausted());
        assert!(cursor.advance_at_offset(Some(ContinuationToken::new("b", None)), Some(2000)));
        assert!(!cursor.is_exhausted());
        assert!(!cursor.advance_at_offset(Some(ContinuationToken::new("c", None)), Some(2000)));
        assert!(cursor.is_exhausted());

        let mut cursor = Cursor::new(Endpoint::LiveChatReplay, None);
        assert!(!cursor.advance_at_offset(Some(ContinuationToken::new("a", None)), None));
        assert!(cursor.is_exhausted());
    }
}
