use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Person, StudyGroupDraft};

/// Separator between two tagged segments in the text form of a response.
pub const SEGMENT_DELIMITER: &str = "##";

/// The closed set of commands the server executes.
///
/// Client-local commands (`execute_script`, `exit`) never reach the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CommandId {
    Help,
    Info,
    Show,
    Add,
    Update,
    RemoveById,
    Clear,
    AddIfMax,
    RemoveGreater,
    RemoveLower,
    RemoveAnyByGroupAdmin,
    CountByGroupAdmin,
    GroupCountingByCoordinates,
    CheckExists,
    Login,
    Register,
}

/// What a command expects as its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    None,
    Id,
    Record,
    IdAndRecord,
    Admin,
}

impl CommandId {
    pub const ALL: [CommandId; 16] = [
        CommandId::Help,
        CommandId::Info,
        CommandId::Show,
        CommandId::Add,
        CommandId::Update,
        CommandId::RemoveById,
        CommandId::Clear,
        CommandId::AddIfMax,
        CommandId::RemoveGreater,
        CommandId::RemoveLower,
        CommandId::RemoveAnyByGroupAdmin,
        CommandId::CountByGroupAdmin,
        CommandId::GroupCountingByCoordinates,
        CommandId::CheckExists,
        CommandId::Login,
        CommandId::Register,
    ];

    /// The name a user types to invoke the command.
    pub fn name(&self) -> &'static str {
        match self {
            CommandId::Help => "help",
            CommandId::Info => "info",
            CommandId::Show => "show",
            CommandId::Add => "add",
            CommandId::Update => "update",
            CommandId::RemoveById => "remove_by_id",
            CommandId::Clear => "clear",
            CommandId::AddIfMax => "add_if_max",
            CommandId::RemoveGreater => "remove_greater",
            CommandId::RemoveLower => "remove_lower",
            CommandId::RemoveAnyByGroupAdmin => "remove_any_by_group_admin",
            CommandId::CountByGroupAdmin => "count_by_group_admin",
            CommandId::GroupCountingByCoordinates => "group_counting_by_coordinates",
            CommandId::CheckExists => "check_exists",
            CommandId::Login => "login",
            CommandId::Register => "register",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|cmd| cmd.name() == wanted)
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommandId::Help => "list available commands",
            CommandId::Info => "print collection type, initialization date and size",
            CommandId::Show => "print every group in the collection",
            CommandId::Add => "add a new group",
            CommandId::Update => "update {id}: replace a group you own",
            CommandId::RemoveById => "remove_by_id {id}: remove a group you own",
            CommandId::Clear => "remove every group you own",
            CommandId::AddIfMax => "add a new group if it is greater than the current maximum",
            CommandId::RemoveGreater => "remove_greater {id}: remove your groups greater than {id}",
            CommandId::RemoveLower => "remove_lower {id}: remove your groups lower than {id}",
            CommandId::RemoveAnyByGroupAdmin => {
                "remove one of your groups administered by the given person"
            }
            CommandId::CountByGroupAdmin => "count groups administered by the given person",
            CommandId::GroupCountingByCoordinates => "group the collection by coordinates",
            CommandId::CheckExists => "check_exists {id}: check that a group exists and is yours",
            CommandId::Login => "log in",
            CommandId::Register => "register a new user",
        }
    }

    pub fn payload_kind(&self) -> PayloadKind {
        match self {
            CommandId::Add | CommandId::AddIfMax => PayloadKind::Record,
            CommandId::Update => PayloadKind::IdAndRecord,
            CommandId::RemoveById
            | CommandId::RemoveGreater
            | CommandId::RemoveLower
            | CommandId::CheckExists => PayloadKind::Id,
            CommandId::RemoveAnyByGroupAdmin | CommandId::CountByGroupAdmin => PayloadKind::Admin,
            _ => PayloadKind::None,
        }
    }

    /// Whether the dispatcher must verify credentials before running the command.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, CommandId::Help | CommandId::Register)
    }

    /// Commands users may type at the prompt (login and register are driven by the client).
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            CommandId::Login | CommandId::Register | CommandId::CheckExists
        )
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Payload {
    Id(i32),
    Record(StudyGroupDraft),
    Update { id: i32, draft: StudyGroupDraft },
    Admin(Person),
}

/// A single command invocation. Every request carries its own credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// Stamped by the client per exchange and echoed as the fragment request id of the
    /// response, so a late answer to an abandoned request is never taken for this one.
    pub request_id: i32,
    pub command: CommandId,
    pub payload: Option<Payload>,
    pub username: String,
    /// Hex digest of the password; the clear-text password never leaves the client.
    pub password_digest: String,
    /// Suppress routine success text (scripted and replayed commands).
    pub mute: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Failed,
    Unauthorized,
}

/// Destination of a response segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Tag {
    /// Interactive display.
    Console,
    /// Persisted transcript file.
    File,
}

impl Tag {
    pub fn as_char(&self) -> char {
        match self {
            Tag::Console => 'C',
            Tag::File => 'F',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'C' => Some(Tag::Console),
            'F' => Some(Tag::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub tag: Tag,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub status: ResponseStatus,
    pub segments: Vec<Segment>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: ResponseStatus::Ok,
            segments: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let mut response = Self {
            status: ResponseStatus::Failed,
            segments: Vec::new(),
        };
        response.console(message);
        response
    }

    pub fn unauthorized() -> Self {
        let mut response = Self {
            status: ResponseStatus::Unauthorized,
            segments: Vec::new(),
        };
        response.console("unauthorized user: wrong username or password");
        response
    }

    pub fn console(&mut self, text: impl Into<String>) -> &mut Self {
        self.segments.push(Segment {
            tag: Tag::Console,
            text: text.into(),
        });
        self
    }

    pub fn file(&mut self, text: impl Into<String>) -> &mut Self {
        self.segments.push(Segment {
            tag: Tag::File,
            text: text.into(),
        });
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// Console-bound text, one segment per line.
    pub fn console_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.tag == Tag::Console)
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Renders the segments as `C#text##F#text...`.
    pub fn to_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}#{}", s.tag.as_char(), s.text))
            .collect::<Vec<_>>()
            .join(SEGMENT_DELIMITER)
    }

    /// Parses the text form back into segments; pieces with an unknown tag are dropped.
    pub fn parse_text(text: &str) -> Vec<Segment> {
        if text.is_empty() {
            return Vec::new();
        }
        text.split(SEGMENT_DELIMITER)
            .filter_map(|piece| {
                let mut chars = piece.chars();
                let tag = Tag::from_char(chars.next()?)?;
                let body = chars.as_str().strip_prefix('#')?;
                Some(Segment {
                    tag,
                    text: body.to_string(),
                })
            })
            .collect()
    }
}
