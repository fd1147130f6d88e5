pub mod backoff;
pub mod client;
pub mod continuation;
mod error;
pub mod link;
pub mod output;
pub mod page;
mod parser;
pub mod path;
pub mod readers;
pub mod text;
pub mod walker;

#[cfg(test)]
mod testutil;

pub use client::{ClientConfig, Fetch, HttpClient};
pub use continuation::{ContinuationToken, Cursor, Endpoint};
pub use error::{ExtractError, Result};
pub use link::{parse_link, Link, LinkKind};
pub use parser::{SubtitleCue, TimedTextParser};
