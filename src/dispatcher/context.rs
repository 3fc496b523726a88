use anyhow::{Result, anyhow};
use std::sync::Arc;

use crate::auth::AuthGate;
use crate::collection::CollectionStore;
use crate::model::validation::{ValidationError, validate_draft, validate_person};
use crate::model::{Person, StudyGroupDraft};
use crate::persistence::RecordRepository;
use crate::protocol::{CommandId, Payload};

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub username: String,
    pub password_digest: String,
}

/// Everything a command handler may touch.
pub struct HandlerContext {
    pub command: CommandId,
    pub store: Arc<CollectionStore>,
    pub repository: Arc<dyn RecordRepository>,
    pub gate: Arc<AuthGate>,
    pub payload: Option<Payload>,
    pub mute: bool,
    pub auth: AuthContext,
}

impl HandlerContext {
    pub fn owner(&self) -> &str {
        &self.auth.username
    }

    pub fn take_id(&mut self) -> Result<i32> {
        match self.payload.take() {
            Some(Payload::Id(id)) => Ok(id),
            other => Err(self.wrong_payload("an id", other)),
        }
    }

    pub fn take_record(&mut self) -> Result<StudyGroupDraft> {
        match self.payload.take() {
            Some(Payload::Record(draft)) => {
                self.checked(validate_draft(&draft))?;
                Ok(draft)
            }
            other => Err(self.wrong_payload("a group", other)),
        }
    }

    pub fn take_update(&mut self) -> Result<(i32, StudyGroupDraft)> {
        match self.payload.take() {
            Some(Payload::Update { id, draft }) => {
                self.checked(validate_draft(&draft))?;
                Ok((id, draft))
            }
            other => Err(self.wrong_payload("an id and a group", other)),
        }
    }

    pub fn take_admin(&mut self) -> Result<Person> {
        match self.payload.take() {
            Some(Payload::Admin(person)) => {
                self.checked(validate_person(&person))?;
                Ok(person)
            }
            other => Err(self.wrong_payload("a group admin", other)),
        }
    }

    fn checked(&self, outcome: Result<(), ValidationError>) -> Result<()> {
        outcome.map_err(|e| {
            tracing::warn!(
                "Command {} from {} carried an invalid group: {}",
                self.command,
                self.auth.username,
                e
            );
            anyhow!("invalid {} payload: {}", self.command, e)
        })
    }

    fn wrong_payload(&self, expected: &str, got: Option<Payload>) -> anyhow::Error {
        tracing::warn!(
            "Command {} from {} expected {} but got {:?}",
            self.command,
            self.auth.username,
            expected,
            got
        );
        anyhow!("{} expects {}", self.command, expected)
    }
}
