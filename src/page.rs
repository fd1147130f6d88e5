//! Page config retrieval.
//!
//! Readers start from the config document of a watch, playlist, channel or
//! search page. Requested with `pbj=1` the page answers with a JSON array
//! of objects (`response`, `playerResponse`, `xsrf_token`, ...). When the
//! upstream answers with the HTML page instead, the same array is rebuilt from
//! the data embedded in the page's scripts.

use std::path::Path;

use regex::Regex;
use serde_json::{json, Value};

use crate::client::Fetch;
use crate::error::{ExtractError, Result};

/// Fetches the config document for a page url.
pub async fn page_config(fetcher: &dyn Fetch, url: &str) -> Result<Value> {
    let separator = if url.contains('?') { '&' } else { '?' };
    let url = format!("{}{}pbj=1", url, separator);
    let bytes = fetcher.fetch(&url, None).await?;
    decode_page(&url, &bytes)
}

/// Decodes a page response, falling back to scraping the HTML page.
pub fn decode_page(url: &str, bytes: &[u8]) -> Result<Value> {
    let json_error = match serde_json::from_slice::<Value>(bytes) {
        Ok(doc) => {
            log::debug!("youtube config from {}:\n{}", url, String::from_utf8_lossy(bytes));
            return Ok(doc);
        }
        Err(e) => e,
    };

    let html = String::from_utf8_lossy(bytes);
    log::debug!("youtube page from {}:\n{}", url, html);
    config_from_html(&html)?.ok_or_else(|| ExtractError::NotJson {
        url: url.to_string(),
        reason: json_error.to_string(),
    })
}

fn capture_json(html: &str, pattern: &str) -> Result<Option<Value>> {
    let re = Regex::new(pattern)
        .map_err(|e| ExtractError::Unparsable(format!("bad page pattern: {}", e)))?;
    Ok(re
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| serde_json::from_str(m.as_str()).ok()))
}

/// Rebuilds the `pbj` array from an HTML watch page. `None` when the page
/// carries neither initial data nor a player response.
pub fn config_from_html(html: &str) -> Result<Option<Value>> {
    let response = capture_json(
        html,
        r#"(?s)(?:var ytInitialData|window\["ytInitialData"\])\s*=\s*(\{.+?\});\s*(?:</script>|var\s|window\[)"#,
    )?;

    let mut player = capture_json(
        html,
        r#"(?s)(?:var ytInitialPlayerResponse|window\["ytInitialPlayerResponse"\])\s*=\s*(\{.+?\});\s*(?:</script>|var\s|window\[)"#,
    )?;
    if player.is_none() {
        // Older pages embed the player response as a string in ytplayer.config.
        player = capture_json(html, r"(?s)ytplayer\.config = (.*?);ytplayer\.load")?
            .as_ref()
            .and_then(|cfg| cfg.pointer("/args/player_response"))
            .and_then(Value::as_str)
            .and_then(|text| serde_json::from_str(text).ok());
    }

    // The token may contain JSON escapes like \u003d.
    let xsrf = capture_json(html, r#""XSRF_TOKEN"\s*:\s*("(?:[^"\\]|\\.)*")"#)?;

    if response.is_none() && player.is_none() {
        return Ok(None);
    }

    let mut parts = Vec::new();
    if let Some(response) = response {
        parts.push(json!({ "response": response }));
    }
    if let Some(player) = player {
        parts.push(json!({ "playerResponse": player }));
    }
    if let Some(xsrf) = xsrf {
        parts.push(json!({ "xsrf_token": xsrf }));
    }
    Ok(Some(Value::Array(parts)))
}

/// Loads a document named on the command line: an existing file, or else
/// the argument itself as JSON text. Returns a label for the input too.
pub fn load_json_arg(arg: &str) -> Result<(String, Value)> {
    if Path::new(arg).exists() {
        let text = std::fs::read_to_string(arg)?;
        let doc = serde_json::from_str(&text).map_err(|e| ExtractError::NotJson {
            url: arg.to_string(),
            reason: e.to_string(),
        })?;
        return Ok((arg.to_string(), doc));
    }
    let doc = serde_json::from_str(arg).map_err(|e| ExtractError::NotJson {
        url: "command line".to_string(),
        reason: e.to_string(),
    })?;
    Ok(("json commandline argument".to_string(), doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetch;
    use std::io::Write;

    #[test]
    fn test_decode_page_passes_json_through() {
        let doc = decode_page("u", br#"[{"page":"watch"},{"response":{}}]"#).unwrap();
        assert_eq!(doc, json!([{ "page": "watch" }, { "response": {} }]));
    }

    #[test]
    fn test_decode_page_scrapes_html() {
        let html = r#"<html><script>var ytInitialData = {"contents":{"a":1}};</script>
            <script>var ytInitialPlayerResponse = {"videoDetails":{"videoId":"abc"}};var meta = 1;</script>
            <script>ytcfg.set({"XSRF_TOKEN":"QUFF="});</script></html>"#;
        let doc = decode_page("u", html.as_bytes()).unwrap();
        assert_eq!(
            doc,
            json!([
                { "response": { "contents": { "a": 1 } } },
                { "playerResponse": { "videoDetails": { "videoId": "abc" } } },
                { "xsrf_token": "QUFF=" }
            ])
        );
    }

    #[test]
    fn test_decode_page_legacy_player_config() {
        let html = r#"<script>ytplayer.config = {"args":{"player_response":"{\"videoDetails\":{\"videoId\":\"xyz\"}}"}};ytplayer.load = function(){};</script>"#;
        let doc = decode_page("u", html.as_bytes()).unwrap();
        assert_eq!(doc, json!([{ "playerResponse": { "videoDetails": { "videoId": "xyz" } } }]));
    }

    #[test]
    fn test_decode_page_rejects_unknown_html() {
        let err = decode_page("u", b"<html>consent</html>").unwrap_err();
        assert!(matches!(err, ExtractError::NotJson { .. }));
    }

    #[tokio::test]
    async fn test_page_config_adds_pbj() {
        let fetch = MockFetch::new(vec![json!([]), json!([])]);
        page_config(&fetch, "https://www.youtube.com/watch?v=abc").await.unwrap();
        page_config(&fetch, "https://www.youtube.com/channel/UC1").await.unwrap();
        let urls: Vec<String> = fetch.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls[0], "https://www.youtube.com/watch?v=abc&pbj=1");
        assert_eq!(urls[1], "https://www.youtube.com/channel/UC1?pbj=1");
    }

    #[test]
    fn test_load_json_arg_file_and_literal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"videoRenderer":{{"videoId":"a"}}}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let (label, doc) = load_json_arg(&path).unwrap();
        assert_eq!(label, path);
        assert_eq!(doc, json!({ "videoRenderer": { "videoId": "a" } }));

        let (label, doc) = load_json_arg("[1, 2]").unwrap();
        assert_eq!(label, "json commandline argument");
        assert_eq!(doc, json!([1, 2]));

        assert!(load_json_arg("not json").is_err());
    }
}
