use regex::Regex;
use url::form_urlencoded;

use crate::continuation::YOUTUBE_URL;
use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Video,
    Playlist,
    Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub kind: LinkKind,
    pub id: String,
}

impl Link {
    fn new(kind: LinkKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    /// Canonical page for the resource.
    pub fn page_url(&self) -> String {
        match self.kind {
            LinkKind::Video => format!("{}/watch?v={}", YOUTUBE_URL, self.id),
            LinkKind::Playlist => format!("{}/playlist?list={}", YOUTUBE_URL, self.id),
            LinkKind::Channel => format!("{}/channel/{}", YOUTUBE_URL, self.id),
        }
    }
}

fn kind_for(segment: &str) -> Option<LinkKind> {
    match segment {
        "v" | "embed" | "watch" | "shorts" => Some(LinkKind::Video),
        "channel" => Some(LinkKind::Channel),
        "playlist" => Some(LinkKind::Playlist),
        _ => None,
    }
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ExtractError::Unparsable(format!("bad link pattern: {}", e)))
}

/// Classifies a youtube url or bare id.
///
/// Video ids are 11 characters; any other bare id is taken to be a playlist
/// (`PL...`, `UU...`, `RDEM...`, ...).
pub fn parse_link(input: &str) -> Result<Link> {
    let unrecognized = || ExtractError::UnrecognizedLink(input.to_string());
    let input = input.trim();

    let prefix = regex(r"^(?:https?://)?(?:www\.|m\.)?(?:(?:youtu\.be|youtube\.com)/)?(.*)$")?;
    let path = prefix
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(unrecognized)?;

    // <type>/<id>[...]
    if let Some(caps) = regex(r"^(\w+)/([A-Za-z0-9_-]+)")?.captures(path) {
        let kind = kind_for(&caps[1]).ok_or_else(unrecognized)?;
        return Ok(Link::new(kind, &caps[2]));
    }

    // <type>?v=<id> or <type>?list=<id>
    if let Some(caps) = regex(r"^(v|embed|watch|channel|playlist)(?:\?(.*))?$")?.captures(path) {
        let query = caps.get(2).map_or("", |m| m.as_str());
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "v" => return Ok(Link::new(LinkKind::Video, value)),
                "list" => return Ok(Link::new(LinkKind::Playlist, value)),
                _ => {}
            }
        }
        return Err(unrecognized());
    }

    // bare id, possibly followed by a query as in youtu.be/<id>?t=1
    if let Some(caps) = regex(r"^([A-Za-z0-9_-]+)(?:\?.*)?$")?.captures(path) {
        let id = &caps[1];
        let kind = if id.len() == 11 {
            LinkKind::Video
        } else {
            LinkKind::Playlist
        };
        return Ok(Link::new(kind, id));
    }

    Err(unrecognized())
}
