//! The interactive client session.
//!
//! `Console` owns the input, the output router, the recovery log and the connection to the
//! server. The client binary only wires it to stdin and stdout.

use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use super::command::{self, ScriptStep, UserCommand};
use super::form::{InputOutcome, LineSource, MixedSource, RecordForm, prompt_line};
use super::router::OutputRouter;
use crate::auth::{Hasher, Sha256Hasher};
use crate::model::validation::parse_id;
use crate::protocol::{CommandId, Payload, PayloadKind, Request, Response, ResponseStatus};
use crate::recovery::{PendingSession, RecoveryLog};
use crate::transport::{TransportError, UdpClient};

/// Sends one request and waits for its response.
pub trait Exchange {
    fn exchange(
        &mut self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, TransportError>>;
}

impl Exchange for UdpClient {
    fn exchange(
        &mut self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, TransportError>> {
        UdpClient::exchange(self, request)
    }
}

/// Credentials of the logged-in user. The password is hashed once, at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub password_digest: String,
}

impl Session {
    pub fn new(username: &str, password: &str, hasher: &dyn Hasher) -> Self {
        Self {
            username: username.trim().to_string(),
            password_digest: hasher.hash(password),
        }
    }

    pub fn request(&self, command: CommandId, payload: Option<Payload>, mute: bool) -> Request {
        Request {
            request_id: 0,
            command,
            payload,
            username: self.username.clone(),
            password_digest: self.password_digest.clone(),
            mute,
        }
    }
}

/// Whether the read loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Console<E: Exchange, R: BufRead, W: Write> {
    transport: E,
    input: R,
    output: OutputRouter<W>,
    log: RecoveryLog,
    hasher: Box<dyn Hasher>,
    session: Option<Session>,
}

impl<E: Exchange, R: BufRead, W: Write> Console<E, R, W> {
    pub fn new(transport: E, input: R, output: OutputRouter<W>, log: RecoveryLog) -> Self {
        Self {
            transport,
            input,
            output,
            log,
            hasher: Box::new(Sha256Hasher),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn into_output(self) -> OutputRouter<W> {
        self.output
    }

    fn ask(&mut self, prompt: &str) -> InputOutcome<String> {
        prompt_line(&mut self.input, self.output.console(), prompt)
    }

    /// Logs in or registers until the server accepts the credentials.
    ///
    /// Returns `false` when input ends first.
    pub async fn login(&mut self) -> Result<bool> {
        loop {
            let choice = match self.ask("[l]ogin or [r]egister") {
                InputOutcome::Value(choice) => choice.trim().to_lowercase(),
                InputOutcome::Retry => continue,
                InputOutcome::Terminate => return Ok(false),
            };
            let command = match choice.as_str() {
                "l" | "login" => CommandId::Login,
                "r" | "register" => CommandId::Register,
                _ => continue,
            };

            let username = match self.ask("username") {
                InputOutcome::Value(name) => name,
                InputOutcome::Retry => continue,
                InputOutcome::Terminate => return Ok(false),
            };
            let password = match self.ask("password") {
                InputOutcome::Value(password) => password,
                InputOutcome::Retry => continue,
                InputOutcome::Terminate => return Ok(false),
            };
            if username.trim().is_empty() || password.is_empty() {
                self.output.line("username and password must not be empty")?;
                continue;
            }

            let session = Session::new(&username, &password, self.hasher.as_ref());
            let request = session.request(command, None, false);
            let Some(response) = self.send(&request).await? else {
                continue;
            };
            self.output.route(&response)?;

            if response.is_ok() {
                self.session = Some(session);
                return Ok(true);
            }
        }
    }

    /// Offers to finish a command interrupted by a previous crash.
    pub async fn offer_resume(&mut self) -> Result<()> {
        if !self.log.has_pending_session() {
            return Ok(());
        }
        let Some(pending) = self.log.resume()? else {
            return Ok(());
        };

        let answer = match self.ask(&format!("resume unfinished '{}'? [y/n]", pending.command)) {
            InputOutcome::Value(answer) => answer.trim().to_lowercase(),
            _ => String::new(),
        };
        if answer == "y" || answer == "yes" {
            self.resume_pending(pending).await?;
        } else {
            self.log.clear()?;
        }
        Ok(())
    }

    async fn resume_pending(&mut self, pending: PendingSession) -> Result<()> {
        let Some(command) = CommandId::from_name(&pending.command) else {
            tracing::warn!("Discarding recovery log for unknown command {}", pending.command);
            self.log.clear()?;
            return Ok(());
        };

        let mut tokens = pending.tokens;
        let mut id = None;
        if command.payload_kind() == PayloadKind::IdAndRecord {
            match tokens.first().map(|raw| parse_id(raw)) {
                Some(Ok(parsed)) => {
                    id = Some(parsed);
                    tokens.remove(0);
                }
                _ => {
                    tracing::warn!("Recovery log for {} has no valid id", command);
                    self.log.clear()?;
                    return Ok(());
                }
            }
        }

        self.run_remote(command, id, tokens).await
    }

    /// Reads and runs commands until `exit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let line = match self.ask(">") {
                InputOutcome::Value(line) => line,
                InputOutcome::Retry => continue,
                InputOutcome::Terminate => return Ok(()),
            };
            if self.handle_line(&line).await? == Flow::Exit {
                return Ok(());
            }
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match command::parse_line(line) {
            Ok(None) => Ok(Flow::Continue),
            Ok(Some(UserCommand::Exit)) => Ok(Flow::Exit),
            Ok(Some(UserCommand::ExecuteScript(path))) => {
                let mut active = HashSet::new();
                self.execute_script(&path, &mut active).await
            }
            Ok(Some(UserCommand::Remote { command, id })) => {
                self.run_remote(command, id, Vec::new()).await?;
                Ok(Flow::Continue)
            }
            Err(e) => {
                self.output.line(&e.to_string())?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Collects the payload of `command` (replaying `replay` first) and sends it.
    async fn run_remote(
        &mut self,
        command: CommandId,
        id: Option<i32>,
        replay: Vec<String>,
    ) -> Result<()> {
        let kind = command.payload_kind();

        if kind == PayloadKind::IdAndRecord {
            let Some(id) = id else {
                return Ok(());
            };
            // Fail before asking for ten fields the server would reject anyway.
            let Some(session) = self.session.as_ref() else {
                return Ok(());
            };
            let check = session.request(CommandId::CheckExists, Some(Payload::Id(id)), false);
            match self.send(&check).await? {
                Some(response) if response.is_ok() => {}
                Some(response) => {
                    self.output.route(&response)?;
                    self.log.clear()?;
                    return Ok(());
                }
                None => return Ok(()),
            }
        }

        let recorded = matches!(
            kind,
            PayloadKind::Record | PayloadKind::IdAndRecord | PayloadKind::Admin
        );
        if recorded {
            self.log.begin(command.name())?;
            if let Some(id) = id {
                self.log.append(&id.to_string())?;
            }
        }

        let payload = {
            let live = LineSource::new(&mut self.input, self.output.console());
            let mut source = MixedSource::new(replay, live);
            let mut form = RecordForm::new(Some(&mut self.log));
            match kind {
                PayloadKind::None => InputOutcome::Value(None),
                PayloadKind::Id => InputOutcome::Value(id.map(Payload::Id)),
                PayloadKind::Record => match form.read_draft(&mut source)? {
                    InputOutcome::Value(draft) => InputOutcome::Value(Some(Payload::Record(draft))),
                    _ => InputOutcome::Terminate,
                },
                PayloadKind::IdAndRecord => match (form.read_draft(&mut source)?, id) {
                    (InputOutcome::Value(draft), Some(id)) => {
                        InputOutcome::Value(Some(Payload::Update { id, draft }))
                    }
                    _ => InputOutcome::Terminate,
                },
                PayloadKind::Admin => match form.read_admin(&mut source)? {
                    InputOutcome::Value(admin) => InputOutcome::Value(Some(Payload::Admin(admin))),
                    _ => InputOutcome::Terminate,
                },
            }
        };

        let payload = match payload {
            InputOutcome::Value(payload) => payload,
            _ => {
                self.output.line("input ended, command cancelled")?;
                return Ok(());
            }
        };

        let Some(session) = self.session.as_ref() else {
            self.output.line("not logged in")?;
            return Ok(());
        };
        let request = session.request(command, payload, false);
        if let Some(response) = self.send(&request).await? {
            self.output.route(&response)?;
            if recorded {
                self.log.clear()?;
            }
        }
        Ok(())
    }

    /// Runs every line of the script at `path`. Nested scripts already running are refused.
    pub async fn execute_script(
        &mut self,
        path: &Path,
        active: &mut HashSet<PathBuf>,
    ) -> Result<Flow> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if active.contains(&key) {
            self.output.line(&format!(
                "{} is already running, recursive call skipped",
                path.display()
            ))?;
            return Ok(Flow::Continue);
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                self.output
                    .line(&format!("cannot read {}: {}", path.display(), e))?;
                return Ok(Flow::Continue);
            }
        };

        active.insert(key.clone());
        let flow = self.run_script_lines(path, &text, active).await;
        active.remove(&key);
        flow
    }

    async fn run_script_lines(
        &mut self,
        path: &Path,
        text: &str,
        active: &mut HashSet<PathBuf>,
    ) -> Result<Flow> {
        for (number, line) in text.lines().enumerate() {
            let step = match command::parse_script_line(line) {
                Ok(Some(step)) => step,
                Ok(None) => continue,
                Err(e) => {
                    self.output.line(&format!(
                        "{}:{}: skipped: {}",
                        path.display(),
                        number + 1,
                        e
                    ))?;
                    continue;
                }
            };

            match step {
                ScriptStep::Exit => return Ok(Flow::Exit),
                ScriptStep::ExecuteScript(nested) => {
                    let nested = match path.parent() {
                        Some(dir) if nested.is_relative() => dir.join(nested),
                        _ => nested,
                    };
                    if Box::pin(self.execute_script(&nested, active)).await? == Flow::Exit {
                        return Ok(Flow::Exit);
                    }
                }
                ScriptStep::Remote { command, payload } => {
                    let Some(session) = self.session.as_ref() else {
                        self.output.line("not logged in")?;
                        return Ok(Flow::Continue);
                    };
                    let request = session.request(command, payload, true);
                    match self.send(&request).await? {
                        Some(response) => self.output.route(&response)?,
                        None => {
                            self.output.line("script aborted")?;
                            return Ok(Flow::Continue);
                        }
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Exchanges `request`; transport failures are reported and yield `None`.
    async fn send(&mut self, request: &Request) -> Result<Option<Response>> {
        match self.transport.exchange(request).await {
            Ok(response) => {
                if response.status == ResponseStatus::Unauthorized {
                    tracing::warn!("Server rejected credentials of {}", request.username);
                }
                Ok(Some(response))
            }
            Err(e) if e.is_retryable() => {
                self.output.line(&format!("{}, try again later", e))?;
                Ok(None)
            }
            Err(e) => {
                tracing::error!("Exchange failed: {}", e);
                self.output.line(&format!("request failed: {}", e))?;
                Ok(None)
            }
        }
    }
}
