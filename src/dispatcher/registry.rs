//! Command Handler Registry
//!
//! Maps each `CommandId` to the async function that executes it. The set of commands is
//! closed, so a missing entry is a wiring mistake rather than bad client input.

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::context::HandlerContext;
use super::handlers;
use crate::protocol::{CommandId, Response};

/// Type alias for a thread-safe, asynchronous command handler.
pub type CommandHandlerFn = Arc<
    dyn Fn(HandlerContext) -> Pin<Box<dyn Future<Output = Result<Response>> + Send>>
        + Send
        + Sync,
>;

pub struct CommandRegistry {
    handlers: DashMap<CommandId, CommandHandlerFn>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
        })
    }

    /// The full command table served by the listener.
    pub fn standard() -> Arc<Self> {
        let registry = Self::new();

        registry.register(CommandId::Help, handlers::handle_help);
        registry.register(CommandId::Info, handlers::handle_info);
        registry.register(CommandId::Show, handlers::handle_show);
        registry.register(CommandId::Add, handlers::handle_add);
        registry.register(CommandId::Update, handlers::handle_update);
        registry.register(CommandId::RemoveById, handlers::handle_remove_by_id);
        registry.register(CommandId::Clear, handlers::handle_clear);
        registry.register(CommandId::AddIfMax, handlers::handle_add_if_max);
        registry.register(CommandId::RemoveGreater, handlers::handle_remove_greater);
        registry.register(CommandId::RemoveLower, handlers::handle_remove_lower);
        registry.register(
            CommandId::RemoveAnyByGroupAdmin,
            handlers::handle_remove_any_by_group_admin,
        );
        registry.register(
            CommandId::CountByGroupAdmin,
            handlers::handle_count_by_group_admin,
        );
        registry.register(
            CommandId::GroupCountingByCoordinates,
            handlers::handle_group_counting_by_coordinates,
        );
        registry.register(CommandId::CheckExists, handlers::handle_check_exists);
        registry.register(CommandId::Login, handlers::handle_login);
        registry.register(CommandId::Register, handlers::handle_register);

        registry
    }

    /// Registers `handler` for `command`, replacing any previous entry.
    pub fn register<F, Fut>(&self, command: CommandId, handler: F)
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        let handler_fn: CommandHandlerFn = Arc::new(move |ctx: HandlerContext| {
            Box::pin(handler(ctx)) as Pin<Box<dyn Future<Output = Result<Response>> + Send>>
        });

        self.handlers.insert(command, handler_fn);

        tracing::debug!("Registered command handler: {}", command);
    }

    pub fn get(&self, command: CommandId) -> Option<CommandHandlerFn> {
        self.handlers.get(&command).map(|entry| entry.value().clone())
    }

    pub fn has_handler(&self, command: CommandId) -> bool {
        self.handlers.contains_key(&command)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Commands without a handler; empty for a correctly wired registry.
    pub fn missing(&self) -> Vec<CommandId> {
        CommandId::ALL
            .into_iter()
            .filter(|command| !self.has_handler(*command))
            .collect()
    }
}
