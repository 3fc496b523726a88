use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const TOKEN_SEPARATOR: char = ',';

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("recovery log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("token {0:?} cannot be recorded: it contains a comma or line break")]
    InvalidToken(String),
}

/// A command that was being entered when the client last stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSession {
    pub command: String,
    pub tokens: Vec<String>,
}

/// Single-line, append-only log of the command currently being entered.
///
/// Layout: `command,token,token,...,` on one line. Every write is flushed and synced
/// before returning, so whatever the user confirmed survives a crash.
pub struct RecoveryLog {
    path: PathBuf,
    file: Option<File>,
}

impl RecoveryLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a fresh entry for `command`, discarding any previous one.
    pub fn begin(&mut self, command: &str) -> Result<(), RecoveryError> {
        check_token(command)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = Some(file);
        self.write_token(command)
    }

    /// Records one accepted token.
    pub fn append(&mut self, token: &str) -> Result<(), RecoveryError> {
        check_token(token)?;
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.write_token(token)
    }

    fn write_token(&mut self, token: &str) -> Result<(), RecoveryError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        write!(file, "{}{}", token, TOKEN_SEPARATOR)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    /// Forgets the current entry. A missing file is not an error.
    pub fn clear(&mut self) -> Result<(), RecoveryError> {
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_pending_session(&self) -> bool {
        fs::metadata(&self.path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    /// Reads back the interrupted entry, if any.
    ///
    /// Only the trailing separator is stripped; empty tokens in between are kept because
    /// optional fields are recorded as empty strings.
    pub fn resume(&self) -> Result<Option<PendingSession>, RecoveryError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let line = text.lines().next().unwrap_or_default();
        let line = line.strip_suffix(TOKEN_SEPARATOR).unwrap_or(line);
        if line.trim().is_empty() {
            return Ok(None);
        }

        let mut parts = line.split(TOKEN_SEPARATOR).map(str::to_string);
        let command = parts.next().unwrap_or_default();
        let tokens = parts.collect();

        tracing::debug!("Recovered pending {} from {}", command, self.path.display());
        Ok(Some(PendingSession { command, tokens }))
    }
}

fn check_token(token: &str) -> Result<(), RecoveryError> {
    if token.contains([TOKEN_SEPARATOR, '\n', '\r']) {
        return Err(RecoveryError::InvalidToken(token.to_string()));
    }
    Ok(())
}
