use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::protocol::{Response, Tag};

/// Sends `C` segments to the console writer and appends `F` segments to a transcript file.
pub struct OutputRouter<W: Write> {
    console: W,
    transcript_path: Option<PathBuf>,
    transcript: Option<File>,
}

impl<W: Write> OutputRouter<W> {
    pub fn new(console: W, transcript_path: Option<PathBuf>) -> Self {
        Self {
            console,
            transcript_path,
            transcript: None,
        }
    }

    pub fn console(&mut self) -> &mut W {
        &mut self.console
    }

    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript_path.as_deref()
    }

    pub fn into_console(self) -> W {
        self.console
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.console, "{}", text)
    }

    pub fn route(&mut self, response: &Response) -> io::Result<()> {
        for segment in &response.segments {
            match segment.tag {
                Tag::Console => writeln!(self.console, "{}", segment.text)?,
                Tag::File => self.append_transcript(&segment.text)?,
            }
        }
        self.console.flush()
    }

    fn append_transcript(&mut self, text: &str) -> io::Result<()> {
        let Some(path) = self.transcript_path.as_ref() else {
            return Ok(());
        };
        if self.transcript.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            self.transcript = Some(file);
        }
        if let Some(file) = self.transcript.as_mut() {
            writeln!(file, "{}", text)?;
        }
        Ok(())
    }
}
