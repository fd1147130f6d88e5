use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::client::Fetch;
use crate::continuation::{extract_continuation, ContinuationToken, Cursor, Endpoint};
use crate::error::{ExtractError, Result};
use crate::output::{Printer, Render};
use crate::path::Selector::Key;
use crate::path::{first_of, get, get_str, get_u64, Layout, Selector};
use crate::text::text_at;

use super::response;

const LIVE_CHAT_RENDERER: &[Selector<'static>] = &[
    Key("contents"),
    Key("twoColumnWatchNextResults"),
    Key("conversationBar"),
    Key("liveChatRenderer"),
];

const CHAT_PAGE: &[Selector<'static>] = &[Key("continuationContents"), Key("liveChatContinuation")];

const MESSAGE_RENDERER: Layout<'static> = &[
    &[Key("liveChatTextMessageRenderer")],
    &[Key("liveChatPaidMessageRenderer")],
];

const ADD_CHAT_ITEM: &[Selector<'static>] = &[Key("addChatItemAction"), Key("item")];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub author: String,
    pub timestamp: Option<String>,
    pub text: String,
    /// Purchase amount of a paid message.
    pub amount: Option<String>,
}

impl ChatMessage {
    pub fn from_item(item: &Value) -> Option<Self> {
        let renderer = first_of(item, MESSAGE_RENDERER)?;
        let timestamp = text_at(renderer, &[Key("timestampText")])
            .or_else(|| get_str(renderer, &[Key("timestampUsec")]).and_then(format_usec));
        Some(Self {
            author: text_at(renderer, &[Key("authorName")]).unwrap_or_default(),
            timestamp,
            text: text_at(renderer, &[Key("message")]).unwrap_or_default(),
            amount: text_at(renderer, &[Key("purchaseAmountText")]),
        })
    }
}

fn format_usec(usec: &str) -> Option<String> {
    let usec: i64 = usec.trim().parse().ok()?;
    DateTime::<Utc>::from_timestamp_micros(usec).map(|t| t.format("%H:%M:%S").to_string())
}

impl Render for ChatMessage {
    fn render(&self, _verbose: bool) -> String {
        let mut line = String::new();
        if let Some(timestamp) = &self.timestamp {
            line.push_str(&format!("[{}] ", timestamp));
        }
        line.push_str(&self.author);
        if let Some(amount) = &self.amount {
            line.push_str(&format!(" ({})", amount));
        }
        line.push_str(": ");
        line.push_str(&self.text);
        line
    }
}

#[derive(Debug, Clone, Default)]
pub struct LivechatOptions {
    /// Read the replay even when the page does not flag one.
    pub replay: bool,
}

/// Messages of one chat page, the next token and, for replays, the video
/// offset reached.
pub struct ChatPage {
    pub messages: Vec<ChatMessage>,
    pub next: Option<ContinuationToken>,
    pub offset_ms: Option<u64>,
}

pub fn extract_chat(page: &Value) -> Result<ChatPage> {
    let chat = get(response(page), CHAT_PAGE).ok_or_else(|| ExtractError::missing("liveChatContinuation"))?;
    let mut messages = Vec::new();
    let mut offset_ms = None;

    for action in chat.get("actions").and_then(Value::as_array).into_iter().flatten() {
        if let Some(replay) = action.get("replayChatItemAction") {
            if let Some(offset) = get_u64(replay, &[Key("videoOffsetTimeMsec")]) {
                offset_ms = offset_ms.max(Some(offset));
            }
            let inner = replay.get("actions").and_then(Value::as_array).into_iter().flatten();
            messages.extend(inner.filter_map(|a| get(a, ADD_CHAT_ITEM)).filter_map(ChatMessage::from_item));
        } else if let Some(item) = get(action, ADD_CHAT_ITEM) {
            messages.extend(ChatMessage::from_item(item));
        }
    }

    Ok(ChatPage {
        messages,
        next: extract_continuation(chat),
        offset_ms,
    })
}

/// Follows a live chat or its replay.
pub struct LivechatReader<'f> {
    fetcher: &'f dyn Fetch,
    first: ContinuationToken,
    replay: bool,
}

impl<'f> LivechatReader<'f> {
    pub fn new(cfg: &Value, fetcher: &'f dyn Fetch, options: LivechatOptions) -> Result<Self> {
        let renderer = get(response(cfg), LIVE_CHAT_RENDERER).ok_or_else(|| ExtractError::missing("liveChatRenderer"))?;
        let first = extract_continuation(renderer).ok_or_else(|| ExtractError::missing("live chat continuation"))?;
        let flagged = renderer.get("isReplay").and_then(Value::as_bool).unwrap_or(false);
        Ok(Self {
            fetcher,
            first,
            replay: options.replay || flagged,
        })
    }

    pub async fn run<W: Write>(&self, printer: &mut Printer<W>) -> Result<usize> {
        let endpoint = if self.replay {
            Endpoint::LiveChatReplay
        } else {
            Endpoint::LiveChat
        };
        let mut cursor = Cursor::new(endpoint, Some(self.first.clone()));
        let mut printed = 0;

        while let Some(page) = cursor.next_page(self.fetcher).await? {
            let ChatPage {
                messages,
                next,
                offset_ms,
            } = extract_chat(&page)?;
            if self.replay {
                if !cursor.advance_at_offset(next, offset_ms) {
                    break;
                }
            } else if messages.is_empty() {
                log::info!("no new chat messages, stopping");
                break;
            } else {
                cursor.advance(next);
            }

            for message in &messages {
                printer.record(message)?;
            }
            printed += messages.len();
        }

        log::debug!("live chat done after {} requests", cursor.fetches());
        Ok(printed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetch;
    use serde_json::json;

    fn text_message(author: &str, text: &str) -> Value {
        json!({ "liveChatTextMessageRenderer": {
            "authorName": { "simpleText": author },
            "message": { "runs": [{ "text": text }] },
            "timestampUsec": "1703145600000000"
        } })
    }

    fn watch_page(is_replay: bool) -> Value {
        json!([{ "response": { "contents": { "twoColumnWatchNextResults": { "conversationBar": {
            "liveChatRenderer": {
                "continuations": [{ "reloadContinuationData": { "continuation": "chat0" } }],
                "isReplay": is_replay
            }
        } } } } }])
    }

    fn replay_page(offset: u64, messages: Vec<Value>, next: Option<&str>) -> Value {
        let actions: Vec<Value> = messages
            .into_iter()
            .map(|item| json!({ "replayChatItemAction": {
                "actions": [{ "addChatItemAction": { "item": item } }],
                "videoOffsetTimeMsec": offset.to_string()
            } }))
            .collect();
        let mut chat = json!({ "actions": actions });
        if let Some(token) = next {
            chat["continuations"] = json!([{ "liveChatReplayContinuationData": { "continuation": token } }]);
        }
        json!({ "response": { "continuationContents": { "liveChatContinuation": chat } } })
    }

    fn live_page(messages: Vec<Value>, next: &str) -> Value {
        let actions: Vec<Value> = messages
            .into_iter()
            .map(|item| json!({ "addChatItemAction": { "item": item } }))
            .collect();
        json!({ "response": { "continuationContents": { "liveChatContinuation": {
            "actions": actions,
            "continuations": [{ "timedContinuationData": { "continuation": next, "timeoutMs": 5000 } }]
        } } } })
    }

    async fn run(cfg: &Value, fetch: &MockFetch, options: LivechatOptions) -> (String, usize) {
        let reader = LivechatReader::new(cfg, fetch, options).unwrap();
        let mut printer = Printer::new(Vec::new(), false, false);
        let count = reader.run(&mut printer).await.unwrap();
        (String::from_utf8(printer.into_inner()).unwrap(), count)
    }

    #[test]
    fn test_chat_message_fields() {
        let message = ChatMessage::from_item(&text_message("bob", "hello")).unwrap();
        assert_eq!(message.author, "bob");
        assert_eq!(message.text, "hello");
        assert_eq!(message.timestamp.as_deref(), Some("08:00:00"));
        assert_eq!(message.render(false), "[08:00:00] bob: hello");

        let paid = json!({ "liveChatPaidMessageRenderer": {
            "authorName": { "simpleText": "ann" },
            "purchaseAmountText": { "simpleText": "$5.00" },
            "timestampText": { "simpleText": "1:02" }
        } });
        let paid = ChatMessage::from_item(&paid).unwrap();
        assert_eq!(paid.render(false), "[1:02] ann ($5.00): ");
        assert!(ChatMessage::from_item(&json!({ "liveChatViewerEngagementMessageRenderer": {} })).is_none());
    }

    #[tokio::test]
    async fn test_replay_stops_on_repeated_offset() {
        let fetch = MockFetch::new(vec![
            replay_page(1000, vec![text_message("a", "1")], Some("r2")),
            replay_page(2000, vec![text_message("b", "2")], Some("r3")),
            replay_page(2000, vec![text_message("b", "2")], Some("r4")),
        ]);
        let (out, count) = run(&watch_page(true), &fetch, LivechatOptions::default()).await;
        assert_eq!(fetch.fetch_count(), 3);
        assert_eq!(count, 2);
        assert_eq!(out, "[08:00:00] a: 1\n[08:00:00] b: 2\n");

        let urls: Vec<String> = fetch.requests().into_iter().map(|r| r.url).collect();
        assert!(urls[0].contains("get_live_chat_replay?continuation=chat0&playerOffsetMs=0"));
        assert!(urls[1].contains("continuation=r2&playerOffsetMs=1000"));
        assert!(urls[2].contains("continuation=r3&playerOffsetMs=2000"));
    }

    #[tokio::test]
    async fn test_replay_page_without_offset_is_not_printed() {
        let mut page = replay_page(1000, vec![text_message("b", "2")], Some("r3"));
        page["response"]["continuationContents"]["liveChatContinuation"]["actions"][0]["replayChatItemAction"]
            .as_object_mut()
            .unwrap()
            .remove("videoOffsetTimeMsec");
        let fetch = MockFetch::new(vec![replay_page(1000, vec![text_message("a", "1")], Some("r2")), page]);
        let (out, count) = run(&watch_page(true), &fetch, LivechatOptions::default()).await;
        assert_eq!(count, 1);
        assert_eq!(out, "[08:00:00] a: 1\n");
        assert_eq!(fetch.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_replay_without_offset_stops() {
        let fetch = MockFetch::new(vec![json!({ "response": { "continuationContents": { "liveChatContinuation": {
            "continuations": [{ "liveChatReplayContinuationData": { "continuation": "again" } }]
        } } } })]);
        let (_, count) = run(&watch_page(false), &fetch, LivechatOptions { replay: true }).await;
        assert_eq!(count, 0);
        assert_eq!(fetch.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_live_chat_stops_on_empty_page() {
        let fetch = MockFetch::new(vec![
            live_page(vec![text_message("a", "1"), text_message("b", "2")], "t2"),
            live_page(vec![], "t3"),
        ]);
        let (out, count) = run(&watch_page(false), &fetch, LivechatOptions::default()).await;
        assert_eq!(count, 2);
        assert_eq!(fetch.fetch_count(), 2);
        assert_eq!(out, "[08:00:00] a: 1\n[08:00:00] b: 2\n");
        assert!(fetch.requests()[0].url.contains("live_chat/get_live_chat?continuation=chat0&pbj=1"));
    }

    #[test]
    fn test_missing_chat_renderer() {
        let fetch = MockFetch::new(vec![]);
        let result = LivechatReader::new(&json!([{ "response": {} }]), &fetch, LivechatOptions::default());
        assert!(matches!(result, Err(ExtractError::MissingField(_))));
    }
}
