//! Runs at most one abortable command per connection, turning every outcome
//! into exactly one deferred reply.

use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler};
use crate::core_parser::Command;

pub struct BackgroundCommandCoordinator {
    /// Cancellation token of the outstanding command, if any.
    slot: Arc<Mutex<Option<CancellationToken>>>,
    connection_token: CancellationToken,
}

impl BackgroundCommandCoordinator {
    pub fn new(connection_token: CancellationToken) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            connection_token,
        }
    }

    /// Starts `handler` on its own task. Returns `false` without side
    /// effects when a command is already outstanding; the caller answers
    /// with 503.
    ///
    /// The handler's outcome is matched once: cancelled -> 426, faulted ->
    /// the error's reply, success -> the handler's own reply. Whichever arm
    /// runs clears the outstanding slot before the reply is written, so a
    /// follow-up command can start as soon as the client could know the
    /// previous one ended.
    pub fn execute(
        &self,
        handler: Arc<dyn CommandHandler>,
        ctx: Arc<CommandContext>,
        command: Command,
    ) -> bool {
        let token = {
            let mut slot = self.slot.lock().unwrap();
            if slot.is_some() {
                return false;
            }
            let token = self.connection_token.child_token();
            *slot = Some(token.clone());
            token
        };
        let slot = Arc::clone(&self.slot);
        let mut control = ctx.control.clone();
        let name = command.name.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = handler.process(ctx, command, token.clone()) => Some(result),
            };
            let reply = match outcome {
                None | Some(Err(CommandError::Aborted)) => {
                    debug!("command {} aborted", name);
                    Some(CommandError::Aborted.to_reply())
                }
                Some(Ok(reply)) => reply,
                Some(Err(err)) => {
                    warn!("background command {} failed: {}", name, err);
                    Some(err.to_reply())
                }
            };
            *slot.lock().unwrap() = None;
            if let Some(reply) = reply {
                if let Err(err) = control.send(&reply).await {
                    debug!("deferred reply for {} dropped: {}", name, err);
                }
            }
        });
        true
    }

    /// Cancels the outstanding command. `false` means there was nothing to
    /// abort.
    pub fn cancel(&self) -> bool {
        match self.slot.lock().unwrap().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}
