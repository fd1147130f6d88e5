use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::client::Fetch;
use crate::error::{ExtractError, Result};
use crate::output::{Printer, Render};
use crate::parser::{SubtitleCue, TimedTextParser};
use crate::path::get;
use crate::path::Selector::{self, Key};
use crate::text::text_at;

use super::{player_response, string_at};

const CAPTION_TRACKS: &[Selector<'static>] = &[
    Key("captions"),
    Key("playerCaptionsTracklistRenderer"),
    Key("captionTracks"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub name: String,
    pub language_code: String,
    /// `"asr"` for automatically generated tracks.
    pub kind: Option<String>,
    pub base_url: String,
}

impl CaptionTrack {
    fn from_json(track: &Value) -> Option<Self> {
        let base_url = string_at(track, &[Key("baseUrl")])?;
        let language_code = string_at(track, &[Key("languageCode")]).unwrap_or_default();
        Some(Self {
            name: text_at(track, &[Key("name")]).unwrap_or_else(|| language_code.clone()),
            language_code,
            kind: string_at(track, &[Key("kind")]),
            base_url,
        })
    }

    pub fn is_auto(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    /// Timed text in the classic `<transcript>` format: the base url without its `fmt`.
    pub fn timedtext_url(&self) -> String {
        let Ok(mut url) = Url::parse(&self.base_url) else {
            log::warn!("caption url {:?} does not parse, using it as is", self.base_url);
            return self.base_url.clone();
        };
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "fmt")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url.into()
    }
}

pub fn caption_tracks(cfg: &Value) -> Vec<CaptionTrack> {
    get(player_response(cfg), CAPTION_TRACKS)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(CaptionTrack::from_json)
        .collect()
}

/// Keeps the tracks for `language` (all languages when `None`). With `auto`
/// only generated tracks are kept; otherwise a generated track is dropped
/// when a manual one exists for its language.
pub fn select_tracks(tracks: Vec<CaptionTrack>, language: Option<&str>, auto: bool) -> Vec<CaptionTrack> {
    let tracks: Vec<CaptionTrack> = tracks
        .into_iter()
        .filter(|t| language.map_or(true, |lang| t.language_code == lang))
        .collect();
    if auto {
        return tracks.into_iter().filter(CaptionTrack::is_auto).collect();
    }
    let manual: Vec<String> = tracks
        .iter()
        .filter(|t| !t.is_auto())
        .map(|t| t.language_code.clone())
        .collect();
    tracks
        .into_iter()
        .filter(|t| !t.is_auto() || !manual.contains(&t.language_code))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubtitleFormat {
    #[default]
    Plain,
    Srt,
}

#[derive(Debug, Clone, Default)]
pub struct SubtitleOptions {
    pub language: Option<String>,
    pub auto: bool,
    pub format: SubtitleFormat,
}

/// `H:MM:SS.mmm`, hours unpadded.
pub fn format_time(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    format!(
        "{}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        ms / 60_000 % 60,
        ms / 1000 % 60,
        ms % 1000
    )
}

pub fn srt_time(seconds: f64) -> String {
    format_time(seconds).replace('.', ",")
}

#[derive(Serialize)]
struct TrackCue<'c> {
    language: &'c str,
    #[serde(skip)]
    sequence: usize,
    #[serde(skip)]
    format: SubtitleFormat,
    #[serde(flatten)]
    cue: &'c SubtitleCue,
}

impl Render for TrackCue<'_> {
    fn render(&self, verbose: bool) -> String {
        match self.format {
            SubtitleFormat::Srt => format!(
                "{}\n{} --> {}\n{}\n",
                self.sequence,
                srt_time(self.cue.start),
                srt_time(self.cue.end),
                self.cue.text
            ),
            SubtitleFormat::Plain if verbose => format!("{}  {}", format_time(self.cue.start), self.cue.text),
            SubtitleFormat::Plain => self.cue.text.clone(),
        }
    }
}

/// Prints the selected caption tracks of a video.
pub struct SubtitleReader<'f> {
    fetcher: &'f dyn Fetch,
    tracks: Vec<CaptionTrack>,
    parser: TimedTextParser,
    format: SubtitleFormat,
}

impl<'f> SubtitleReader<'f> {
    pub fn new(cfg: &Value, fetcher: &'f dyn Fetch, options: SubtitleOptions) -> Result<Self> {
        let available = caption_tracks(cfg);
        if available.is_empty() {
            return Err(ExtractError::NoSubtitles);
        }
        let tracks = select_tracks(available, options.language.as_deref(), options.auto);
        if tracks.is_empty() {
            log::warn!("no caption track matches language {:?} auto {}", options.language, options.auto);
            return Err(ExtractError::NoSubtitles);
        }
        Ok(Self {
            fetcher,
            tracks,
            parser: TimedTextParser::new(false)?,
            format: options.format,
        })
    }

    pub fn tracks(&self) -> &[CaptionTrack] {
        &self.tracks
    }

    /// Prints every selected track; a track whose XML does not parse is
    /// skipped. Returns the number of cues printed.
    pub async fn run<W: Write>(&self, printer: &mut Printer<W>) -> Result<usize> {
        let mut printed = 0;
        for track in &self.tracks {
            let url = track.timedtext_url();
            let xml = self.fetcher.fetch(&url, None).await?;
            log::debug!("timed text from {}:\n{}", url, String::from_utf8_lossy(&xml));
            let cues = match self.parser.parse(&String::from_utf8_lossy(&xml)) {
                Ok(cues) => cues,
                Err(e) => {
                    log::error!("skipping track {}: {}", track.name, e);
                    continue;
                }
            };

            printer.heading(&format!("### {} ###", track.name))?;
            for (i, cue) in cues.iter().enumerate() {
                printer.record(&TrackCue {
                    language: &track.language_code,
                    sequence: i + 1,
                    format: self.format,
                    cue,
                })?;
            }
            printed += cues.len();
        }
        Ok(printed)
    }
}
