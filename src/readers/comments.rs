use std::collections::VecDeque;
use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use crate::client::Fetch;
use crate::continuation::{extract_continuation, ContinuationToken, Cursor, Endpoint};
use crate::error::{ExtractError, Result};
use crate::output::{Printer, Render};
use crate::path::Selector::Key;
use crate::path::{first_of, get, get_u64, Layout};
use crate::text::{text_at, text_value};

use super::{continuation_page, response, session_token, WATCH_CONTENTS};

const COMMENT_RENDERER: Layout<'static> = &[
    &[Key("commentThreadRenderer"), Key("comment"), Key("commentRenderer")],
    &[Key("commentRenderer")],
    &[Key("comment"), Key("commentRenderer")],
];

const REPLIES_RENDERER: Layout<'static> = &[
    &[Key("commentThreadRenderer"), Key("replies"), Key("commentRepliesRenderer")],
    &[Key("replies"), Key("commentRepliesRenderer")],
];

const LIKES: Layout<'static> = &[&[Key("voteCount")], &[Key("likeCount")]];

const COMMENT_PAGE: Layout<'static> = &[
    &[Key("continuationContents"), Key("itemSectionContinuation")],
    &[Key("continuationContents"), Key("commentRepliesContinuation")],
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub author: String,
    pub published: Option<String>,
    pub text: String,
    pub likes: Option<String>,
    pub replies: Option<u64>,
    #[serde(skip)]
    pub child_continuation: Option<ContinuationToken>,
}

impl Comment {
    /// Projects a `commentThreadRenderer` (or bare `commentRenderer`) entry.
    /// Other entries of a comment page, like headers and continuation items,
    /// yield `None`.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let renderer = first_of(entry, COMMENT_RENDERER)?;
        Some(Self {
            author: text_at(renderer, &[Key("authorText")]).unwrap_or_default(),
            published: text_at(renderer, &[Key("publishedTimeText")]),
            text: text_at(renderer, &[Key("contentText")]).unwrap_or_default(),
            likes: first_of(renderer, LIKES).and_then(text_value),
            replies: get_u64(renderer, &[Key("replyCount")]),
            child_continuation: first_of(entry, REPLIES_RENDERER).and_then(extract_continuation),
        })
    }
}

/// A comment at its depth in the reply tree.
#[derive(Serialize)]
struct CommentLine<'c> {
    level: usize,
    #[serde(flatten)]
    comment: &'c Comment,
}

impl Render for CommentLine<'_> {
    fn render(&self, verbose: bool) -> String {
        let mut head = format!("{}> {}", "---".repeat(self.level + 1), self.comment.author);
        if verbose {
            if let Some(published) = &self.comment.published {
                head.push_str(&format!(" ({})", published));
            }
            if let Some(likes) = &self.comment.likes {
                head.push_str(&format!(" [{} likes]", likes));
            }
        }
        format!("{}\n{}", head, self.comment.text)
    }
}

#[derive(Debug, Clone)]
pub struct CommentOptions {
    /// Reply levels below the top level that are followed.
    pub max_depth: usize,
}

impl Default for CommentOptions {
    fn default() -> Self {
        Self { max_depth: 10 }
    }
}

/// Comments of one page and the token of the page after it.
pub fn extract_comments(page: &Value) -> Result<(Vec<Comment>, Option<ContinuationToken>)> {
    let page = continuation_page(response(page), COMMENT_PAGE)
        .ok_or_else(|| ExtractError::missing("continuationContents"))?;
    let comments = page.entries.into_iter().filter_map(Comment::from_entry).collect();
    Ok((comments, page.next))
}

/// One level of the reply tree being paginated.
struct Frame {
    level: usize,
    cursor: Cursor,
    pending: VecDeque<Comment>,
}

impl Frame {
    fn new(level: usize, cursor: Cursor) -> Self {
        Self {
            level,
            cursor,
            pending: VecDeque::new(),
        }
    }
}

/// Prints a video's comment tree, replies directly below their parent.
pub struct CommentReader<'f> {
    fetcher: &'f dyn Fetch,
    first: ContinuationToken,
    session_token: String,
    options: CommentOptions,
}

impl<'f> CommentReader<'f> {
    pub fn new(cfg: &Value, fetcher: &'f dyn Fetch, options: CommentOptions) -> Result<Self> {
        let first = get(response(cfg), WATCH_CONTENTS)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| item.get("itemSectionRenderer"))
            .find_map(extract_continuation)
            .ok_or_else(|| ExtractError::missing("comment section continuation"))?;
        Ok(Self {
            fetcher,
            first,
            session_token: session_token(cfg),
            options,
        })
    }

    /// Prints every reachable comment depth-first and returns how many were printed.
    ///
    /// A failing reply branch is logged and skipped; a failure on the top
    /// level ends the run.
    pub async fn run<W: Write>(&self, printer: &mut Printer<W>) -> Result<usize> {
        let top = Endpoint::Comments {
            session_token: self.session_token.clone(),
        };
        let mut stack = vec![Frame::new(0, Cursor::new(top, Some(self.first.clone())))];
        let mut printed = 0;

        while let Some(frame) = stack.last_mut() {
            if let Some(comment) = frame.pending.pop_front() {
                let level = frame.level;
                printer.record(&CommentLine { level, comment: &comment })?;
                printed += 1;
                if let Some(child) = comment.child_continuation {
                    if level < self.options.max_depth {
                        let replies = Endpoint::CommentReplies {
                            session_token: self.session_token.clone(),
                        };
                        stack.push(Frame::new(level + 1, Cursor::new(replies, Some(child))));
                    } else {
                        log::info!("not following replies below level {}", level);
                    }
                }
                continue;
            }

            let page = frame
                .cursor
                .next_page(self.fetcher)
                .await
                .and_then(|page| page.map(|page| extract_comments(&page)).transpose());
            match page {
                Ok(Some((comments, next))) => {
                    frame.cursor.advance(next);
                    frame.pending.extend(comments);
                }
                Ok(None) => {
                    stack.pop();
                }
                Err(e) if frame.level > 0 => {
                    log::error!("abandoning replies at level {}: {}", frame.level, e);
                    stack.pop();
                }
                Err(e) => return Err(e),
            }
        }

        Ok(printed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetch;
    use serde_json::json;

    fn thread(author: &str, text: &str, replies: Option<&str>) -> Value {
        let mut thread = json!({ "commentThreadRenderer": { "comment": { "commentRenderer": {
            "authorText": { "simpleText": author },
            "contentText": { "runs": [{ "text": text }] },
            "publishedTimeText": { "runs": [{ "text": "2 days ago" }] },
            "voteCount": { "simpleText": "7" }
        } } } });
        if let Some(token) = replies {
            thread["commentThreadRenderer"]["replies"] = json!({ "commentRepliesRenderer": {
                "continuations": [{ "nextContinuationData": { "continuation": token, "clickTrackingParams": "rc" } }]
            } });
        }
        thread
    }

    fn page(section: &str, contents: Vec<Value>, next: Option<&str>) -> Value {
        let mut container = json!({ "contents": contents });
        if let Some(token) = next {
            container["continuations"] =
                json!([{ "nextContinuationData": { "continuation": token, "clickTrackingParams": "ct" } }]);
        }
        let mut contents = serde_json::Map::new();
        contents.insert(section.to_string(), container);
        json!({ "response": { "continuationContents": contents } })
    }

    fn watch_page() -> Value {
        json!([
            { "page": "watch" },
            { "response": { "contents": { "twoColumnWatchNextResults": { "results": { "results": { "contents": [
                { "videoPrimaryInfoRenderer": {} },
                { "itemSectionRenderer": { "continuations": [
                    { "nextContinuationData": { "continuation": "c1", "clickTrackingParams": "k1" } }
                ] } }
            ] } } } } } },
            { "xsrf_token": "QUFF" }
        ])
    }

    async fn run(fetch: &MockFetch, options: CommentOptions) -> (String, usize) {
        let reader = CommentReader::new(&watch_page(), fetch, options).unwrap();
        let mut printer = Printer::new(Vec::new(), false, false);
        let count = reader.run(&mut printer).await.unwrap();
        (String::from_utf8(printer.into_inner()).unwrap(), count)
    }

    #[test]
    fn test_comment_from_entry() {
        let comment = Comment::from_entry(&thread("alice", "hi", Some("r1"))).unwrap();
        assert_eq!(comment.author, "alice");
        assert_eq!(comment.text, "hi");
        assert_eq!(comment.published.as_deref(), Some("2 days ago"));
        assert_eq!(comment.likes.as_deref(), Some("7"));
        assert_eq!(comment.child_continuation.unwrap().token, "r1");
        assert!(Comment::from_entry(&json!({ "commentsHeaderRenderer": {} })).is_none());
    }

    #[test]
    fn test_missing_comment_section() {
        let fetch = MockFetch::new(vec![]);
        let err = CommentReader::new(&json!([{ "response": {} }]), &fetch, CommentOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::MissingField(_)));
    }

    #[tokio::test]
    async fn test_follows_chain_of_pages_in_order() {
        let fetch = MockFetch::new(vec![
            page("itemSectionContinuation", vec![thread("a", "1", None)], Some("c2")),
            page("itemSectionContinuation", vec![thread("b", "2", None)], Some("c3")),
            page("itemSectionContinuation", vec![thread("c", "3", None)], None),
        ]);
        let (out, count) = run(&fetch, CommentOptions::default()).await;
        assert_eq!(count, 3);
        assert_eq!(fetch.fetch_count(), 3);
        assert_eq!(out, "---> a\n1\n---> b\n2\n---> c\n3\n");

        let requests = fetch.requests();
        assert!(requests[0].url.contains("action_get_comments=1"));
        assert!(requests[0].url.contains("ctoken=c1"));
        assert!(requests[0].url.contains("itct=k1"));
        assert_eq!(requests[0].body.as_deref(), Some("session_token=QUFF"));
        assert!(requests[2].url.contains("ctoken=c3"));
    }

    #[tokio::test]
    async fn test_replies_are_printed_before_next_sibling() {
        let fetch = MockFetch::new(vec![
            page(
                "itemSectionContinuation",
                vec![thread("parent", "first", Some("r1")), thread("sibling", "second", None)],
                None,
            ),
            page("commentRepliesContinuation", vec![thread("child", "reply", None)], None),
        ]);
        let (out, count) = run(&fetch, CommentOptions::default()).await;
        assert_eq!(count, 3);
        assert_eq!(out, "---> parent\nfirst\n------> child\nreply\n---> sibling\nsecond\n");
        assert!(fetch.requests()[1].url.contains("action_get_comment_replies=1"));
        assert!(fetch.requests()[1].url.contains("ctoken=r1"));
    }

    #[tokio::test]
    async fn test_max_depth_stops_following_replies() {
        let fetch = MockFetch::new(vec![page(
            "itemSectionContinuation",
            vec![thread("parent", "first", Some("r1"))],
            None,
        )]);
        let (out, count) = run(&fetch, CommentOptions { max_depth: 0 }).await;
        assert_eq!(count, 1);
        assert_eq!(fetch.fetch_count(), 1);
        assert_eq!(out, "---> parent\nfirst\n");
    }

    #[tokio::test]
    async fn test_broken_reply_branch_is_skipped() {
        let fetch = MockFetch::from_bodies(vec![
            page(
                "itemSectionContinuation",
                vec![thread("parent", "first", Some("r1")), thread("sibling", "second", None)],
                None,
            )
            .to_string()
            .into_bytes(),
            b"<html>error</html>".to_vec(),
        ]);
        let (out, count) = run(&fetch, CommentOptions::default()).await;
        assert_eq!(count, 2);
        assert_eq!(out, "---> parent\nfirst\n---> sibling\nsecond\n");
    }

    #[tokio::test]
    async fn test_top_level_failure_is_returned() {
        let fetch = MockFetch::from_bodies(vec![b"<html>error</html>".to_vec()]);
        let reader = CommentReader::new(&watch_page(), &fetch, CommentOptions::default()).unwrap();
        let mut printer = Printer::new(Vec::new(), false, false);
        let err = reader.run(&mut printer).await.unwrap_err();
        assert!(err.is_malformed_response());
    }

    #[tokio::test]
    async fn test_received_endpoints_shape() {
        let fetch = MockFetch::new(vec![json!({ "response": { "onResponseReceivedEndpoints": [
            { "appendContinuationItemsAction": { "continuationItems": [thread("new", "shape", None)] } }
        ] } })]);
        let (out, _) = run(&fetch, CommentOptions::default()).await;
        assert_eq!(out, "---> new\nshape\n");
    }

    #[test]
    fn test_verbose_render() {
        let comment = Comment::from_entry(&thread("alice", "hi", None)).unwrap();
        let line = CommentLine { level: 1, comment: &comment };
        assert_eq!(line.render(true), "------> alice (2 days ago) [7 likes]\nhi");
    }
}
