//! Pull structured data out of free-form model replies.
//!
//! Model output is untrusted text. Every function here is total: anything
//! that cannot be read cleanly comes back as an empty result.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::utils;

/// A task proposed by the model, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub description: String,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<String>,
}

/// Byte range of the balanced `open`..`close` span starting at `start`.
/// Brackets inside JSON strings are ignored.
fn balanced_end(text: &str, start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Top-level balanced spans in order of appearance. Scanning stops at the
/// first opener that never closes, since everything after it is inside it.
pub fn balanced_spans(text: &str, open: char, close: char) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find(open) {
        let start = cursor + found;
        match balanced_end(text, start, open, close) {
            Some(end) => {
                spans.push(&text[start..end]);
                cursor = end;
            }
            None => break,
        }
    }
    spans
}

/// First top-level span that deserializes as `T`
fn parse_first<T: DeserializeOwned>(text: &str, open: char, close: char) -> Option<T> {
    balanced_spans(text, open, close)
        .into_iter()
        .find_map(|span| serde_json::from_str(span).ok())
}

/// Extract the task list from a task-generation reply.
///
/// Entries without a usable `description` are dropped. Hours must be a
/// positive number (numeric strings accepted) and due dates must be
/// YYYY-MM-DD, otherwise the field is left empty.
pub fn extract_tasks(text: &str) -> Vec<TaskDraft> {
    let Some(entries) = parse_first::<Vec<Value>>(text, '[', ']') else {
        tracing::warn!("no task list found in model reply");
        return Vec::new();
    };

    let total = entries.len();
    let drafts: Vec<TaskDraft> = entries.iter().filter_map(task_from_value).collect();
    if drafts.len() < total {
        tracing::warn!(dropped = total - drafts.len(), "discarded malformed task entries");
    }
    drafts
}

fn task_from_value(value: &Value) -> Option<TaskDraft> {
    let entry = value.as_object()?;
    let description = entry.get("description")?.as_str()?.trim();
    if description.is_empty() {
        return None;
    }

    let estimated_hours = entry
        .get("estimated_hours")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|h| h.is_finite() && *h > 0.0);

    let due_date = entry
        .get("due_date")
        .and_then(Value::as_str)
        .and_then(|s| utils::parse_date(s).ok())
        .map(utils::format_date);

    Some(TaskDraft {
        description: description.to_string(),
        estimated_hours,
        due_date,
    })
}

/// Extract profile facts from a profile-extraction reply.
///
/// Unknown field names pass through; null values are dropped so they never
/// overwrite stored facts.
pub fn extract_profile_updates(text: &str) -> Map<String, Value> {
    let Some(mut facts) = parse_first::<Map<String, Value>>(text, '{', '}') else {
        return Map::new();
    };
    facts.retain(|_, v| !v.is_null());
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BARE: &str = r#"[
        {"description": "Update resume", "estimated_hours": 2.5, "due_date": "2026-02-15"},
        {"description": "Apply to 3 jobs", "estimated_hours": 3, "due_date": null}
    ]"#;

    #[test]
    fn test_prose_wrapped_array_matches_bare_array() {
        let wrapped = format!("Sure! Here is your plan:\n{BARE}\nGood luck [you got this].");
        let bare = extract_tasks(BARE);
        assert_eq!(bare.len(), 2);
        assert_eq!(extract_tasks(&wrapped), bare);
        assert_eq!(bare[0].estimated_hours, Some(2.5));
        assert_eq!(bare[1].due_date, None);
    }

    #[test]
    fn test_broken_json_yields_empty_list() {
        assert!(extract_tasks(r#"Here: [{"description": "a", "estimated_hours": }]"#).is_empty());
        assert!(extract_tasks(r#"[{"description": "never closed""#).is_empty());
        assert!(extract_tasks("I could not think of anything.").is_empty());
        assert!(extract_tasks("").is_empty());
    }

    #[test]
    fn test_bracket_in_prose_before_array_is_skipped() {
        let text = r#"Tasks [draft]: [{"description": "Ship it"}]"#;
        let tasks = extract_tasks(text);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "Ship it");
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let text = r#"[{"description": "Read chapter [3] and note ]"}]"#;
        let tasks = extract_tasks(text);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "Read chapter [3] and note ]");
    }

    #[test]
    fn test_entries_without_description_are_dropped() {
        let text = r#"[{"estimated_hours": 1}, {"description": "  "}, {"description": "Keep"}, "junk"]"#;
        let tasks = extract_tasks(text);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "Keep");
    }

    #[test]
    fn test_fields_are_normalized() {
        let text = r#"[
            {"description": "a", "estimated_hours": "1.5", "due_date": "2026-03-01"},
            {"description": "b", "estimated_hours": -2, "due_date": "next week"},
            {"description": "c", "estimated_hours": "lots"}
        ]"#;
        let tasks = extract_tasks(text);
        assert_eq!(tasks[0].estimated_hours, Some(1.5));
        assert_eq!(tasks[0].due_date.as_deref(), Some("2026-03-01"));
        assert_eq!(tasks[1].estimated_hours, None);
        assert_eq!(tasks[1].due_date, None);
        assert_eq!(tasks[2].estimated_hours, None);
    }

    #[test]
    fn test_profile_object_in_prose() {
        let text = r#"Based on the chat: {"current_role": "Data analyst", "strengths": ["SQL"], "salary": null, "hobby": "chess"} done."#;
        let facts = extract_profile_updates(text);
        assert_eq!(facts.get("current_role"), Some(&json!("Data analyst")));
        assert_eq!(facts.get("strengths"), Some(&json!(["SQL"])));
        assert_eq!(facts.get("hobby"), Some(&json!("chess")));
        assert!(!facts.contains_key("salary"));
    }

    #[test]
    fn test_profile_broken_or_missing_yields_empty() {
        assert!(extract_profile_updates(r#"{"current_role": "#).is_empty());
        assert!(extract_profile_updates("Nothing to extract.").is_empty());
        assert!(extract_profile_updates("{}").is_empty());
    }

    #[test]
    fn test_balanced_spans_stop_at_unclosed_opener() {
        let spans = balanced_spans("a [1] b [2, [3] c", '[', ']');
        assert_eq!(spans, vec!["[1]"]);
    }
}
