//! Parsing of command lines typed at the prompt and read from scripts.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::validation::{Field, ValidationError, draft_from_tokens, parse_id, person_from_tokens};
use crate::protocol::{CommandId, Payload, PayloadKind};

pub const EXECUTE_SCRIPT: &str = "execute_script";
pub const EXIT: &str = "exit";

#[derive(Debug, Error, PartialEq)]
pub enum CommandLineError {
    #[error("unknown command '{0}', type 'help' for the list")]
    Unknown(String),

    #[error("{0} needs an id argument")]
    MissingId(CommandId),

    #[error("{0} takes no inline argument")]
    UnexpectedArgument(String),

    #[error("execute_script needs a file name")]
    MissingScriptPath,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A command typed at the prompt. Record fields are asked for afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Remote { command: CommandId, id: Option<i32> },
    ExecuteScript(PathBuf),
    Exit,
}

/// A fully specified step of a script: `command,token,token,...`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Remote {
        command: CommandId,
        payload: Option<Payload>,
    },
    ExecuteScript(PathBuf),
    Exit,
}

/// Parses `name [argument]`. Returns `None` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<UserCommand>, CommandLineError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();
    if let Some(extra) = words.next() {
        return Err(CommandLineError::UnexpectedArgument(extra.to_string()));
    }

    match name {
        EXIT => match argument {
            None => Ok(Some(UserCommand::Exit)),
            Some(arg) => Err(CommandLineError::UnexpectedArgument(arg.to_string())),
        },
        EXECUTE_SCRIPT => argument
            .map(|path| Some(UserCommand::ExecuteScript(PathBuf::from(path))))
            .ok_or(CommandLineError::MissingScriptPath),
        _ => {
            let command = user_command(name)?;
            let takes_id = matches!(
                command.payload_kind(),
                PayloadKind::Id | PayloadKind::IdAndRecord
            );
            let id = match (takes_id, argument) {
                (true, Some(raw)) => Some(parse_id(raw)?),
                (true, None) => return Err(CommandLineError::MissingId(command)),
                (false, Some(arg)) => {
                    return Err(CommandLineError::UnexpectedArgument(arg.to_string()));
                }
                (false, None) => None,
            };
            Ok(Some(UserCommand::Remote { command, id }))
        }
    }
}

/// Parses one script line. Blank lines and `#` comments yield `None`.
pub fn parse_script_line(line: &str) -> Result<Option<ScriptStep>, CommandLineError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let line = line.strip_suffix(',').unwrap_or(line);
    let mut parts = line.split(',');
    let name = parts.next().unwrap_or_default().trim();
    let tokens: Vec<&str> = parts.collect();

    match name {
        EXIT => Ok(Some(ScriptStep::Exit)),
        EXECUTE_SCRIPT => match tokens.as_slice() {
            [path] if !path.trim().is_empty() => {
                Ok(Some(ScriptStep::ExecuteScript(PathBuf::from(path.trim()))))
            }
            _ => Err(CommandLineError::MissingScriptPath),
        },
        _ => {
            let command = user_command(name)?;
            let payload = payload_from_tokens(command, &tokens)?;
            Ok(Some(ScriptStep::Remote { command, payload }))
        }
    }
}

/// Builds the payload of `command` from its recorded tokens.
pub fn payload_from_tokens<S: AsRef<str>>(
    command: CommandId,
    tokens: &[S],
) -> Result<Option<Payload>, CommandLineError> {
    let expect = |expected: usize| {
        if tokens.len() == expected {
            Ok(())
        } else {
            Err(ValidationError::InsufficientArguments {
                expected,
                found: tokens.len(),
            })
        }
    };

    let payload = match command.payload_kind() {
        PayloadKind::None => {
            expect(0)?;
            None
        }
        PayloadKind::Id => {
            expect(1)?;
            Some(Payload::Id(parse_id(tokens[0].as_ref())?))
        }
        PayloadKind::Record => Some(Payload::Record(draft_from_tokens(tokens)?)),
        PayloadKind::IdAndRecord => {
            expect(Field::ALL.len() + 1)?;
            Some(Payload::Update {
                id: parse_id(tokens[0].as_ref())?,
                draft: draft_from_tokens(&tokens[1..])?,
            })
        }
        PayloadKind::Admin => Some(Payload::Admin(person_from_tokens(tokens)?)),
    };
    Ok(payload)
}

fn user_command(name: &str) -> Result<CommandId, CommandLineError> {
    CommandId::from_name(name)
        .filter(|command| command.is_user_facing())
        .ok_or_else(|| CommandLineError::Unknown(name.to_string()))
}
