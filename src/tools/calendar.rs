use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::tools::ToolParam;
use crate::tools::{Tool, required_str_arg};

pub const DEFAULT_CALENDAR_FILE: &str = "./data/calendar.json";

/// Looks up events in a local JSON calendar file.
///
/// The file holds an array of objects with at least `title` and `date`
/// string fields; the query is matched case-insensitively as a substring
/// against either field.
pub struct CalendarTool {
    path: PathBuf,
}

impl CalendarTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lookup(&self, query: &str) -> String {
        if !self.path.exists() {
            return format!(
                "No local calendar found ({} is missing).",
                self.path.display()
            );
        }

        match read_events(&self.path) {
            Ok(events) => {
                let needle = query.trim().to_lowercase();
                let matches: Vec<&Value> = events
                    .iter()
                    .filter(|event| {
                        field_contains(event, "title", &needle)
                            || field_contains(event, "date", &needle)
                    })
                    .collect();

                if matches.is_empty() {
                    return "No matching events in the local calendar.".to_string();
                }

                serde_json::to_string_pretty(&matches)
                    .unwrap_or_else(|err| format!("Could not read the calendar: {err}."))
            }
            Err(reason) => reason,
        }
    }
}

fn read_events(path: &Path) -> Result<Vec<Value>, String> {
    let raw =
        fs::read_to_string(path).map_err(|err| format!("Could not read the calendar: {err}."))?;
    let events: Vec<Value> =
        serde_json::from_str(&raw).map_err(|err| format!("Could not read the calendar: {err}."))?;
    Ok(events)
}

fn field_contains(event: &Value, field: &str, needle: &str) -> bool {
    event[field]
        .as_str()
        .is_some_and(|value| value.to_lowercase().contains(needle))
}

#[async_trait]
impl Tool for CalendarTool {
    fn name(&self) -> &str {
        "calendar"
    }

    fn description(&self) -> &str {
        "Searches a local calendar for events, appointments, or tasks. \
         Provide a date (e.g. 'march 25') or a subject (e.g. 'budget meeting')."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required_string(
            "query",
            "Date or subject to look for.",
        )]
    }

    async fn invoke(&self, args: &Value) -> String {
        match required_str_arg(args, "query") {
            Ok(query) => self.lookup(&query),
            Err(reason) => format!("Calendar lookup failed: {reason}."),
        }
    }
}
