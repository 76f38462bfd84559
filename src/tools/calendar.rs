//! Calendar management over a JSON event store.
//!
//! Events live in a single JSON file under the configured storage path.
//! Datetimes are parsed from the explicit formats the router is prompted to
//! produce (`dd/mm/yyyy hh:mm` and ISO variants); free-form natural-language
//! dates are not interpreted here.

use crate::error::{AssistantError, Result};
use crate::speech::SpeechSynthesizer;
use crate::tools::{Tool, ToolOutput, text_arg};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

/// A stored calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: NaiveDateTime,
}

/// File-backed event store. Cheap to clone; every operation re-reads the
/// file, which is fine for the one-command-at-a-time dispatch model.
#[derive(Debug, Clone)]
pub struct CalendarStore {
    path: PathBuf,
}

impl CalendarStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Vec<CalendarEvent> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        if content.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str(&content) {
            Ok(events) => events,
            Err(e) => {
                warn!("calendar file unreadable, starting fresh: {e}");
                Vec::new()
            }
        }
    }

    fn save(&self, events: &[CalendarEvent]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(events)
            .map_err(|e| AssistantError::Tool(format!("calendar serialization failed: {e}")))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Add an event and return the spoken confirmation.
    ///
    /// # Errors
    ///
    /// `Tool` when the datetime cannot be parsed or the file cannot be
    /// written.
    pub fn add_event(&self, title: &str, start_str: &str) -> Result<String> {
        let start = parse_datetime(start_str)?;
        let mut events = self.load();
        events.push(CalendarEvent {
            title: title.to_owned(),
            start,
        });
        events.sort_by_key(|e| e.start);
        self.save(&events)?;
        Ok(format!(
            "Evento '{}' agendado para {}.",
            title,
            start.format("%d/%m/%Y às %H:%M")
        ))
    }

    /// List events, optionally filtered to a single date.
    ///
    /// # Errors
    ///
    /// `Tool` when the filter date cannot be parsed.
    pub fn list_events(&self, date_str: Option<&str>) -> Result<String> {
        let mut events = self.load();
        if events.is_empty() {
            return Ok("Não há eventos agendados.".to_owned());
        }
        events.sort_by_key(|e| e.start);

        let period_msg = match date_str {
            Some(date_str) => {
                let target = parse_date(date_str)?;
                events.retain(|e| e.start.date() == target);
                format!("para {}", target.format("%d/%m/%Y"))
            }
            None => "na sua agenda".to_owned(),
        };

        if events.is_empty() {
            return Ok(format!("Nenhum evento encontrado {period_msg}."));
        }

        let mut lines = vec![format!("Agenda {period_msg}:")];
        for event in &events {
            lines.push(format!(
                "- {}: {}",
                event.start.format("%d/%m/%Y %H:%M"),
                event.title
            ));
        }
        Ok(lines.join("\n"))
    }

    /// Delete every event matching `title` (case-insensitive).
    ///
    /// # Errors
    ///
    /// `Tool` when the file cannot be written.
    pub fn delete_event(&self, title: &str) -> Result<String> {
        let mut events = self.load();
        let before = events.len();
        let needle = title.to_lowercase();
        events.retain(|e| e.title.to_lowercase() != needle);

        if events.len() == before {
            return Ok(format!(
                "Nenhum evento encontrado com o título '{title}'."
            ));
        }

        self.save(&events)?;
        Ok(format!("Evento(s) '{title}' removido(s) com sucesso."))
    }
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    const FORMATS: [&str; 4] = [
        "%d/%m/%Y %H:%M",
        "%d/%m/%Y às %H:%M",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    // Date-only input schedules for midnight.
    if let Ok(date) = parse_date(s)
        && let Some(dt) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(dt);
    }
    Err(AssistantError::Tool(format!("unparseable datetime: '{s}'")))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for format in ["%d/%m/%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }
    Err(AssistantError::Tool(format!("unparseable date: '{s}'")))
}

async fn announce(voice: &Arc<dyn SpeechSynthesizer>, text: &str) {
    if let Err(e) = voice.speak(text).await {
        error!("speech synthesis failed: {e}");
    }
}

/// Schedules an appointment.
pub struct CalendarAddTool {
    store: CalendarStore,
    voice: Arc<dyn SpeechSynthesizer>,
}

impl CalendarAddTool {
    #[must_use]
    pub fn new(store: CalendarStore, voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { store, voice }
    }
}

#[async_trait]
impl Tool for CalendarAddTool {
    fn name(&self) -> &'static str {
        "calendar_add"
    }

    fn description(&self) -> &'static str {
        "agendar um compromisso."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("objeto com \"title\" e \"datetime\" (dd/mm/aaaa hh:mm).")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(args) = args else {
            return Ok(ToolOutput::text("Preciso do nome do evento e da data/hora."));
        };
        if args.is_string() {
            // The router was asked for a structured argument; a bare string
            // means it could not separate the fields.
            return Ok(ToolOutput::text(
                "Preciso que você especifique o título e a hora separadamente.",
            ));
        }

        let title = args["title"].as_str().map(str::trim).unwrap_or_default();
        let datetime = args["datetime"].as_str().map(str::trim).unwrap_or_default();
        if title.is_empty() || datetime.is_empty() {
            return Ok(ToolOutput::text("Preciso do nome do evento e da data/hora."));
        }

        announce(&self.voice, &format!("Agendando {title} para {datetime}...")).await;

        let store = self.store.clone();
        let title = title.to_owned();
        let datetime = datetime.to_owned();
        let outcome =
            tokio::task::spawn_blocking(move || store.add_event(&title, &datetime))
                .await
                .unwrap_or_else(|e| Err(AssistantError::Task(format!("calendar worker: {e}"))));

        match outcome {
            Ok(message) => Ok(ToolOutput::text(message)),
            Err(e) => {
                error!("failed to add calendar event: {e}");
                Ok(ToolOutput::text("Tive um problema ao salvar o evento."))
            }
        }
    }
}

/// Reads the agenda back.
pub struct CalendarCheckTool {
    store: CalendarStore,
    voice: Arc<dyn SpeechSynthesizer>,
}

impl CalendarCheckTool {
    #[must_use]
    pub fn new(store: CalendarStore, voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { store, voice }
    }
}

#[async_trait]
impl Tool for CalendarCheckTool {
    fn name(&self) -> &'static str {
        "calendar_check"
    }

    fn description(&self) -> &'static str {
        "consultar a agenda."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("data (dd/mm/aaaa) ou null para tudo.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        announce(&self.voice, "Consultando sua agenda...").await;

        let date = text_arg(args.as_ref());
        let store = self.store.clone();
        let outcome =
            tokio::task::spawn_blocking(move || store.list_events(date.as_deref()))
                .await
                .unwrap_or_else(|e| Err(AssistantError::Task(format!("calendar worker: {e}"))));

        match outcome {
            Ok(listing) => Ok(ToolOutput::text(listing)),
            Err(e) => {
                error!("failed to list calendar events: {e}");
                Ok(ToolOutput::text("Erro ao ler a agenda."))
            }
        }
    }
}

/// Removes an appointment by title.
pub struct CalendarDeleteTool {
    store: CalendarStore,
    voice: Arc<dyn SpeechSynthesizer>,
}

impl CalendarDeleteTool {
    #[must_use]
    pub fn new(store: CalendarStore, voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { store, voice }
    }
}

#[async_trait]
impl Tool for CalendarDeleteTool {
    fn name(&self) -> &'static str {
        "calendar_delete"
    }

    fn description(&self) -> &'static str {
        "excluir um compromisso."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("título do evento.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(title) = text_arg(args.as_ref()) else {
            return Ok(ToolOutput::text("Qual evento você gostaria de excluir?"));
        };

        announce(&self.voice, &format!("Excluindo o evento {title}...")).await;

        let store = self.store.clone();
        let title_for_worker = title.clone();
        let outcome =
            tokio::task::spawn_blocking(move || store.delete_event(&title_for_worker))
                .await
                .unwrap_or_else(|e| Err(AssistantError::Task(format!("calendar worker: {e}"))));

        match outcome {
            Ok(message) => Ok(ToolOutput::text(message)),
            Err(e) => {
                error!("failed to delete calendar event '{title}': {e}");
                Ok(ToolOutput::text("Tive um problema ao remover o evento."))
            }
        }
    }
}
