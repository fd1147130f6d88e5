use std::borrow::Cow;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::Serialize;

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Cue being assembled between a `<text>` start tag and its end tag.
#[derive(Debug, Default)]
struct CueState {
    text: Option<String>,
    start: f64,
    end: f64,
}

impl CueState {
    fn begin(&mut self, (start, end): (f64, f64)) {
        self.text = Some(String::new());
        self.start = start;
        self.end = end;
    }

    fn push(&mut self, data: &str) {
        if let Some(text) = &mut self.text {
            text.push_str(data);
        }
    }

    fn finish(&mut self) -> Option<(f64, f64, String)> {
        self.text.take().map(|text| (self.start, self.end, text))
    }
}

/// Parses the `timedtext` XML format:
/// `<transcript><text start="1.2" dur="3.4">...</text>...</transcript>`.
pub struct TimedTextParser {
    preserve_formatting: bool,
    font_tags: Regex,
}

impl TimedTextParser {
    pub fn new(preserve_formatting: bool) -> Result<Self> {
        let font_tags = Regex::new(r"</?font[^>]*>")
            .map_err(|e| ExtractError::XmlParseError(format!("bad font pattern: {}", e)))?;
        Ok(Self {
            preserve_formatting,
            font_tags,
        })
    }

    pub fn parse(&self, xml: &str) -> Result<Vec<SubtitleCue>> {
        let mut reader = Reader::from_str(xml);
        let mut state = CueState::default();
        let mut cues = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| ExtractError::XmlParseError(e.to_string()))?;
            match event {
                Event::Start(e) if e.name().as_ref() == b"text" => state.begin(cue_timing(&e)?),
                Event::Empty(e) if e.name().as_ref() == b"text" => {
                    state.begin(cue_timing(&e)?);
                    cues.extend(state.finish().map(|cue| self.cue(cue)));
                }
                Event::Text(e) => state.push(&String::from_utf8_lossy(&e)),
                Event::CData(e) => state.push(&String::from_utf8_lossy(&e)),
                // Entity references are kept raw and resolved with the rest of the text.
                Event::GeneralRef(e) => state.push(&format!("&{};", String::from_utf8_lossy(&e))),
                Event::End(e) if e.name().as_ref() == b"text" => {
                    cues.extend(state.finish().map(|cue| self.cue(cue)));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(cues)
    }

    fn cue(&self, (start, end, raw): (f64, f64, String)) -> SubtitleCue {
        SubtitleCue {
            start,
            end,
            text: self.clean_text(&raw),
        }
    }

    /// Resolves XML entities, then strips `<font>` markup and resolves the
    /// HTML entities that were escaped a second time upstream.
    fn clean_text(&self, raw: &str) -> String {
        let xml = unescape_lenient(raw);
        if self.preserve_formatting {
            return xml.into_owned();
        }
        let stripped = self.font_tags.replace_all(&xml, "");
        unescape_lenient(&stripped).into_owned()
    }
}

fn unescape_lenient(text: &str) -> Cow<'_, str> {
    unescape(text).unwrap_or(Cow::Borrowed(text))
}

fn float_attr(e: &BytesStart<'_>, name: &str) -> Result<Option<f64>> {
    let Some(attr) = e
        .try_get_attribute(name)
        .map_err(|err| ExtractError::XmlParseError(err.to_string()))?
    else {
        return Ok(None);
    };
    let value = String::from_utf8_lossy(&attr.value);
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ExtractError::XmlParseError(format!("bad {} value {:?}", name, value)))
}

fn cue_timing(e: &BytesStart<'_>) -> Result<(f64, f64)> {
    let start = float_attr(e, "start")?
        .ok_or_else(|| ExtractError::XmlParseError("text element without start".to_string()))?;
    let duration = float_attr(e, "dur")?.unwrap_or(0.0);
    Ok((start, start + duration))
}
