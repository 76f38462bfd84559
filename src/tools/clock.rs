//! Time and date tools.

use crate::error::Result;
use crate::tools::{Tool, ToolOutput};
use async_trait::async_trait;
use chrono::Local;

/// Tells the current time.
pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &'static str {
        "time"
    }

    fn description(&self) -> &'static str {
        "perguntas sobre as horas."
    }

    async fn invoke(&self, _args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let now = Local::now().format("%H:%M");
        Ok(ToolOutput::text(format!("São {now}.")))
    }
}

/// Tells today's date.
pub struct DateTool;

#[async_trait]
impl Tool for DateTool {
    fn name(&self) -> &'static str {
        "date"
    }

    fn description(&self) -> &'static str {
        "perguntas sobre a data de hoje."
    }

    async fn invoke(&self, _args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let today = Local::now().format("%d/%m/%Y");
        Ok(ToolOutput::text(format!("Hoje é {today}.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn time_speaks_hours_and_minutes() {
        let output = TimeTool.invoke(None).await.unwrap();
        let ToolOutput::Text(text) = output else {
            panic!("expected text output");
        };
        assert!(text.starts_with("São "));
        assert!(text.contains(':'));
    }

    #[tokio::test]
    async fn date_speaks_day_month_year() {
        let output = DateTool.invoke(None).await.unwrap();
        let ToolOutput::Text(text) = output else {
            panic!("expected text output");
        };
        assert!(text.starts_with("Hoje é "));
        // dd/mm/yyyy has two separators.
        assert_eq!(text.matches('/').count(), 2);
    }

    #[tokio::test]
    async fn stray_arguments_are_ignored() {
        // The router sometimes attaches an argument anyway ("agora", "hoje");
        // zero-argument tools must not trip over it.
        let output = TimeTool
            .invoke(Some(serde_json::json!("agora")))
            .await
            .unwrap();
        assert!(matches!(output, ToolOutput::Text(t) if t.starts_with("São ")));

        let output = DateTool
            .invoke(Some(serde_json::json!("hoje")))
            .await
            .unwrap();
        assert!(matches!(output, ToolOutput::Text(t) if t.starts_with("Hoje é ")));
    }
}
