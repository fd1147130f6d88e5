use std::io::Write;

use serde::Serialize;

use crate::error::Result;

/// Line-oriented text form of a record. May span several lines.
pub trait Render {
    fn render(&self, verbose: bool) -> String;
}

/// Writes records as text, or as JSON lines with `--json`.
pub struct Printer<W: Write> {
    out: W,
    json: bool,
    verbose: bool,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, json: bool, verbose: bool) -> Self {
        Self { out, json, verbose }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Section headings only appear in text output.
    pub fn heading(&mut self, text: &str) -> Result<()> {
        if !self.json {
            writeln!(self.out, "{}", text)?;
        }
        Ok(())
    }

    pub fn record<R: Render + Serialize>(&mut self, record: &R) -> Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, record).map_err(std::io::Error::from)?;
            writeln!(self.out)?;
        } else {
            writeln!(self.out, "{}", record.render(self.verbose))?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
