//! System-control tools: application launch, shutdown, quit.
//!
//! These are the safety-critical handlers the dispatcher reaches through
//! its deterministic regex routes, so a mis-heard free-form command can
//! never trigger them via the language model alone.

use crate::config::AppsConfig;
use crate::error::{AssistantError, Result};
use crate::speech::{Confirmation, SpeechSynthesizer};
use crate::tools::{ControlSignal, Tool, ToolOutput, text_arg};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{error, info};

/// Launches an application by spoken name.
///
/// The spoken alias is resolved against the immutable (alias, platform)
/// table from the configuration; unknown aliases are tried verbatim.
pub struct OpenAppTool {
    aliases: AppsConfig,
}

impl OpenAppTool {
    #[must_use]
    pub fn new(aliases: AppsConfig) -> Self {
        Self { aliases }
    }

    fn launch_command(&self, spoken_name: &str) -> Command {
        let executable = self
            .aliases
            .resolve(spoken_name)
            .map(str::to_owned)
            .unwrap_or_else(|| spoken_name.to_lowercase());

        match std::env::consts::OS {
            "windows" => {
                let mut cmd = Command::new("cmd");
                cmd.args(["/C", "start", "", &executable]);
                cmd
            }
            "macos" => {
                let mut cmd = Command::new("open");
                cmd.args(["-a", &executable]);
                cmd
            }
            _ => Command::new(executable),
        }
    }
}

#[async_trait]
impl Tool for OpenAppTool {
    fn name(&self) -> &'static str {
        "open_app"
    }

    fn description(&self) -> &'static str {
        "abre ou inicia um programa no computador."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("nome do programa.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(spoken_name) = text_arg(args.as_ref()) else {
            return Ok(ToolOutput::text(
                "Claro, qual programa você gostaria de abrir?",
            ));
        };

        info!("launching application '{spoken_name}'");
        match self.launch_command(&spoken_name).spawn() {
            Ok(_child) => Ok(ToolOutput::text(format!("Abrindo {spoken_name}."))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ToolOutput::text(format!(
                "Desculpe, não consegui encontrar o programa {spoken_name}."
            ))),
            Err(e) => {
                error!("failed to launch '{spoken_name}': {e}");
                Ok(ToolOutput::text(format!(
                    "Ocorreu um erro ao tentar abrir o {spoken_name}."
                )))
            }
        }
    }
}

/// Schedules a system shutdown after a spoken confirmation.
pub struct ShutdownTool {
    confirm: Arc<dyn Confirmation>,
}

impl ShutdownTool {
    #[must_use]
    pub fn new(confirm: Arc<dyn Confirmation>) -> Self {
        Self { confirm }
    }
}

fn shutdown_command() -> (&'static str, &'static [&'static str]) {
    if std::env::consts::OS == "windows" {
        ("shutdown", &["/s", "/t", "60"])
    } else {
        ("shutdown", &["-h", "+1"])
    }
}

fn cancel_shutdown_command() -> (&'static str, &'static [&'static str]) {
    if std::env::consts::OS == "windows" {
        ("shutdown", &["/a"])
    } else {
        ("shutdown", &["-c"])
    }
}

#[async_trait]
impl Tool for ShutdownTool {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    fn description(&self) -> &'static str {
        "desliga o computador após confirmação."
    }

    async fn invoke(&self, _args: Option<serde_json::Value>) -> Result<ToolOutput> {
        if !self
            .confirm
            .confirm("Você tem certeza que deseja desligar o computador?")
            .await
        {
            return Ok(ToolOutput::text("Ação de desligamento cancelada."));
        }

        let (program, args) = shutdown_command();
        info!("scheduling system shutdown");
        match Command::new(program).args(args).status().await {
            Ok(status) if status.success() => Ok(ToolOutput::text(
                "Ok, desligando o computador em 1 minuto. Adeus!",
            )),
            Ok(status) => Err(AssistantError::Tool(format!(
                "shutdown command exited with {status}"
            ))),
            Err(e) => {
                error!("failed to run shutdown command: {e}");
                Ok(ToolOutput::text(
                    "Ocorreu um erro ao tentar executar o comando de desligamento.",
                ))
            }
        }
    }
}

/// Cancels a previously scheduled shutdown.
pub struct CancelShutdownTool;

#[async_trait]
impl Tool for CancelShutdownTool {
    fn name(&self) -> &'static str {
        "cancel_shutdown"
    }

    fn description(&self) -> &'static str {
        "cancela um desligamento agendado do computador."
    }

    async fn invoke(&self, _args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let (program, args) = cancel_shutdown_command();
        info!("cancelling scheduled shutdown");
        match Command::new(program).args(args).status().await {
            Ok(_status) => Ok(ToolOutput::text("Desligamento cancelado.")),
            Err(e) => {
                error!("failed to cancel shutdown: {e}");
                Ok(ToolOutput::text(
                    "Ocorreu um erro ao tentar cancelar o comando de desligamento.",
                ))
            }
        }
    }
}

/// Ends the assistant session.
///
/// Speaks its own farewell, then returns the quit signal; the dispatcher
/// propagates the signal without speaking it.
pub struct QuitTool {
    voice: Arc<dyn SpeechSynthesizer>,
}

impl QuitTool {
    #[must_use]
    pub fn new(voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { voice }
    }
}

#[async_trait]
impl Tool for QuitTool {
    fn name(&self) -> &'static str {
        "quit"
    }

    fn description(&self) -> &'static str {
        "encerra a assistente."
    }

    async fn invoke(&self, _args: Option<serde_json::Value>) -> Result<ToolOutput> {
        if let Err(e) = self.voice.speak("Encerrando a assistente. Até logo!").await {
            error!("farewell synthesis failed: {e}");
        }
        Ok(ToolOutput::Signal(ControlSignal::Quit))
    }
}
