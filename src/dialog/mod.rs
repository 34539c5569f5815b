//! Pass-through from UI picker intents to the command gateway.
//!
//! Cancellation is an absent value, not an error; a failing picker is
//! logged and otherwise ignored so it can never wedge the session.

use crate::gateway::CommandGateway;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct DialogAdapter {
    commands: Arc<dyn CommandGateway>,
}

impl DialogAdapter {
    pub fn new(commands: Arc<dyn CommandGateway>) -> Self {
        Self { commands }
    }

    pub async fn select_input_file(&self) -> Option<PathBuf> {
        match self.commands.pick_input_file().await {
            Ok(selection) => selection,
            Err(err) => {
                tracing::warn!(error = %err, "input file picker failed");
                None
            }
        }
    }

    pub async fn select_output_directory(&self) -> Option<PathBuf> {
        match self.commands.pick_output_directory().await {
            Ok(selection) => selection,
            Err(err) => {
                tracing::warn!(error = %err, "output directory picker failed");
                None
            }
        }
    }
}
