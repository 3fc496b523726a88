use std::sync::Arc;
use thiserror::Error;

use super::context::{AuthContext, HandlerContext};
use super::registry::CommandRegistry;
use crate::auth::AuthGate;
use crate::collection::CollectionStore;
use crate::persistence::{RecordRepository, RepositoryError};
use crate::protocol::{CommandId, Request, Response};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unauthorized user {0:?}")]
    UnauthorizedUser(String),

    #[error("no handler registered for {0}")]
    MissingHandler(CommandId),

    #[error("credential check failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{command} failed: {reason}")]
    Handler {
        command: CommandId,
        reason: anyhow::Error,
    },
}

impl DispatchError {
    /// The response sent back for this failure.
    pub fn to_response(&self) -> Response {
        match self {
            DispatchError::UnauthorizedUser(_) => Response::unauthorized(),
            DispatchError::MissingHandler(command) => {
                Response::failed(format!("{} is not available on this server", command))
            }
            DispatchError::Repository(_) => {
                Response::failed("internal error: credentials could not be checked")
            }
            DispatchError::Handler { reason, .. } => Response::failed(reason.to_string()),
        }
    }
}

/// Routes requests to command handlers after checking credentials.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    store: Arc<CollectionStore>,
    repository: Arc<dyn RecordRepository>,
    gate: Arc<AuthGate>,
}

impl Dispatcher {
    pub fn new(store: Arc<CollectionStore>, repository: Arc<dyn RecordRepository>) -> Self {
        Self::with_registry(CommandRegistry::standard(), store, repository)
    }

    pub fn with_registry(
        registry: Arc<CommandRegistry>,
        store: Arc<CollectionStore>,
        repository: Arc<dyn RecordRepository>,
    ) -> Self {
        let missing = registry.missing();
        if !missing.is_empty() {
            tracing::warn!("Dispatcher has no handler for {:?}", missing);
        }

        Self {
            registry,
            gate: Arc::new(AuthGate::new(repository.clone())),
            store,
            repository,
        }
    }

    pub fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    /// Runs one request to completion. Every failure becomes a failed response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let command = request.command;
        let username = request.username.clone();

        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    DispatchError::UnauthorizedUser(_) => {
                        tracing::info!("Rejected {} from {:?}: bad credentials", command, username)
                    }
                    DispatchError::MissingHandler(_) => {
                        tracing::error!("Configuration error: {}", e)
                    }
                    _ => tracing::warn!("Request {} from {:?} failed: {}", command, username, e),
                }
                e.to_response()
            }
        }
    }

    pub async fn try_dispatch(&self, request: Request) -> Result<Response, DispatchError> {
        let command = request.command;

        if command.requires_auth()
            && !self
                .gate
                .verify(&request.username, &request.password_digest)?
        {
            return Err(DispatchError::UnauthorizedUser(request.username));
        }

        let handler = self
            .registry
            .get(command)
            .ok_or(DispatchError::MissingHandler(command))?;

        let ctx = HandlerContext {
            command,
            store: self.store.clone(),
            repository: self.repository.clone(),
            gate: self.gate.clone(),
            payload: request.payload,
            mute: request.mute,
            auth: AuthContext {
                username: request.username,
                password_digest: request.password_digest,
            },
        };

        tracing::debug!("Dispatching {} for {}", command, ctx.auth.username);

        handler(ctx)
            .await
            .map_err(|reason| DispatchError::Handler { command, reason })
    }
}
