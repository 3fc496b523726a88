//! Field-by-field input of records.
//!
//! A `RecordForm` asks a `FieldSource` for each field, validates the answer and writes
//! every accepted value to the recovery log before moving on.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::model::validation::{Field, ValidationError, draft_from_tokens, person_from_tokens};
use crate::model::{Person, StudyGroupDraft};
use crate::recovery::{RecoveryError, RecoveryLog};

/// The fields of an administrator, in prompt order.
pub const ADMIN_FIELDS: [Field; 4] = [
    Field::AdminName,
    Field::AdminBirthday,
    Field::AdminHeight,
    Field::AdminPassport,
];

/// Result of one attempt to read input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome<T> {
    Value(T),
    /// Nothing usable was read; ask again.
    Retry,
    /// Input ended or the user gave up.
    Terminate,
}

pub trait FieldSource {
    fn next(&mut self, prompt: &str) -> InputOutcome<String>;

    /// Reports a rejected value. Returns whether the field should be asked again.
    fn rejected(&mut self, field: Field, error: &ValidationError) -> bool;
}

/// Interactive prompts on a reader/writer pair.
pub struct LineSource<'a, R: BufRead, W: Write> {
    input: &'a mut R,
    output: &'a mut W,
}

impl<'a, R: BufRead, W: Write> LineSource<'a, R, W> {
    pub fn new(input: &'a mut R, output: &'a mut W) -> Self {
        Self { input, output }
    }
}

/// Prompts and reads one line without its line ending.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> InputOutcome<String> {
    if write!(output, "{}: ", prompt).and_then(|_| output.flush()).is_err() {
        return InputOutcome::Terminate;
    }
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => InputOutcome::Terminate,
        Ok(_) => InputOutcome::Value(line.trim_end_matches(['\n', '\r']).to_string()),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => InputOutcome::Retry,
        Err(e) => {
            tracing::warn!("Failed to read input: {}", e);
            InputOutcome::Terminate
        }
    }
}

impl<R: BufRead, W: Write> FieldSource for LineSource<'_, R, W> {
    fn next(&mut self, prompt: &str) -> InputOutcome<String> {
        prompt_line(&mut *self.input, &mut *self.output, prompt)
    }

    fn rejected(&mut self, _field: Field, error: &ValidationError) -> bool {
        let _ = writeln!(self.output, "invalid value: {}", error);
        true
    }
}

/// Pre-recorded tokens, consumed in order. Never re-asks.
#[derive(Debug, Default)]
pub struct ReplaySource {
    tokens: VecDeque<String>,
}

impl ReplaySource {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }
}

impl FieldSource for ReplaySource {
    fn next(&mut self, _prompt: &str) -> InputOutcome<String> {
        match self.tokens.pop_front() {
            Some(token) => InputOutcome::Value(token),
            None => InputOutcome::Terminate,
        }
    }

    fn rejected(&mut self, field: Field, error: &ValidationError) -> bool {
        tracing::warn!("Recorded {} rejected: {}", field.label(), error);
        false
    }
}

/// Replays recorded tokens, then continues with a live source.
pub struct MixedSource<S: FieldSource> {
    replay: ReplaySource,
    live: S,
    last_from_replay: bool,
}

impl<S: FieldSource> MixedSource<S> {
    pub fn new(replay: Vec<String>, live: S) -> Self {
        Self {
            replay: ReplaySource::new(replay),
            live,
            last_from_replay: false,
        }
    }
}

impl<S: FieldSource> FieldSource for MixedSource<S> {
    fn next(&mut self, prompt: &str) -> InputOutcome<String> {
        if self.replay.remaining() > 0 {
            self.last_from_replay = true;
            return self.replay.next(prompt);
        }
        self.last_from_replay = false;
        self.live.next(prompt)
    }

    fn rejected(&mut self, field: Field, error: &ValidationError) -> bool {
        if self.last_from_replay {
            // Recorded values after a bad one cannot be trusted either.
            self.replay.rejected(field, error);
            self.replay = ReplaySource::default();
            return true;
        }
        self.live.rejected(field, error)
    }
}

/// Collects validated tokens and mirrors them into the recovery log.
pub struct RecordForm<'a> {
    log: Option<&'a mut RecoveryLog>,
}

impl<'a> RecordForm<'a> {
    pub fn new(log: Option<&'a mut RecoveryLog>) -> Self {
        Self { log }
    }

    pub fn read_fields(
        &mut self,
        source: &mut dyn FieldSource,
        fields: &[Field],
    ) -> Result<InputOutcome<Vec<String>>, RecoveryError> {
        let mut tokens = Vec::with_capacity(fields.len());

        for &field in fields {
            let token = loop {
                match source.next(&field.prompt()) {
                    InputOutcome::Value(raw) => match field.validate(&raw) {
                        Ok(()) => break raw.trim().to_string(),
                        Err(e) => {
                            if !source.rejected(field, &e) {
                                return Ok(InputOutcome::Terminate);
                            }
                        }
                    },
                    InputOutcome::Retry => continue,
                    InputOutcome::Terminate => return Ok(InputOutcome::Terminate),
                }
            };

            if let Some(log) = self.log.as_deref_mut() {
                log.append(&token)?;
            }
            tokens.push(token);
        }

        Ok(InputOutcome::Value(tokens))
    }

    pub fn read_draft(
        &mut self,
        source: &mut dyn FieldSource,
    ) -> Result<InputOutcome<StudyGroupDraft>, RecoveryError> {
        let tokens = match self.read_fields(source, &Field::ALL)? {
            InputOutcome::Value(tokens) => tokens,
            InputOutcome::Retry => return Ok(InputOutcome::Retry),
            InputOutcome::Terminate => return Ok(InputOutcome::Terminate),
        };
        Ok(build(draft_from_tokens(&tokens)))
    }

    pub fn read_admin(
        &mut self,
        source: &mut dyn FieldSource,
    ) -> Result<InputOutcome<Person>, RecoveryError> {
        let tokens = match self.read_fields(source, &ADMIN_FIELDS)? {
            InputOutcome::Value(tokens) => tokens,
            InputOutcome::Retry => return Ok(InputOutcome::Retry),
            InputOutcome::Terminate => return Ok(InputOutcome::Terminate),
        };
        Ok(build(person_from_tokens(&tokens)))
    }
}

fn build<T>(result: Result<T, ValidationError>) -> InputOutcome<T> {
    match result {
        Ok(value) => InputOutcome::Value(value),
        Err(e) => {
            // Every token passed its field check, so this only happens on a rule mismatch.
            tracing::error!("Validated tokens did not build: {}", e);
            InputOutcome::Terminate
        }
    }
}
