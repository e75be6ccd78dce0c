//! File-backed user profile.
//!
//! The profile is a single JSON document keyed by category (`general`,
//! `career`, ...), each category a flat map of field name to scalar or list.
//! A missing file simply means "no profile yet".

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fields known for one category
pub type CategoryFields = Map<String, Value>;

/// Whole profile document, category name to fields
pub type ProfileDocument = BTreeMap<String, CategoryFields>;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to access profile file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse profile: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the profile, or an empty document if none has been saved
    pub fn load(&self) -> Result<ProfileDocument, ProfileError> {
        if !self.exists() {
            return Ok(ProfileDocument::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(ProfileDocument::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Overwrite the whole profile
    pub fn save(&self, profile: &ProfileDocument) -> Result<(), ProfileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(profile)?)?;
        Ok(())
    }

    pub fn get_category(&self, category: &str) -> Result<CategoryFields, ProfileError> {
        Ok(self.load()?.remove(category).unwrap_or_default())
    }

    /// Shallow merge `fields` into `category`, leaving every other field and
    /// category untouched
    pub fn update_category(&self, category: &str, fields: CategoryFields) -> Result<(), ProfileError> {
        let mut profile = self.load()?;
        let entry = profile.entry(category.to_string()).or_default();
        let count = fields.len();
        for (key, value) in fields {
            entry.insert(key, value);
        }
        self.save(&profile)?;
        tracing::debug!(category, fields = count, "updated profile category");
        Ok(())
    }

    /// Human-readable dump of every category, for display only
    pub fn summary(&self) -> Result<String, ProfileError> {
        Ok(render_summary(&self.load()?))
    }

    /// Write the empty skeleton profile and return it
    pub fn initialize_default(&self) -> Result<ProfileDocument, ProfileError> {
        let profile = default_profile();
        self.save(&profile)?;
        Ok(profile)
    }
}

fn default_profile() -> ProfileDocument {
    let skeleton = json!({
        "general": {
            "name": "",
            "timezone": "",
            "availability_hours_per_day": 0,
            "availability_days_per_week": 0
        },
        "career": {
            "current_role": "",
            "experience_years": 0,
            "strengths": [],
            "weaknesses": [],
            "target_companies": [],
            "target_roles": []
        },
        "learning": {
            "learning_style": "",
            "preferred_resources": [],
            "current_focus": []
        },
        "health": {
            "fitness_level": "",
            "health_goals": []
        },
        "finance": {
            "financial_goals": [],
            "risk_tolerance": ""
        }
    });
    serde_json::from_value(skeleton).unwrap_or_default()
}

pub fn render_summary(profile: &ProfileDocument) -> String {
    if profile.is_empty() {
        return "No user profile found.".to_string();
    }

    let mut lines = Vec::new();
    for (category, fields) in profile {
        lines.push(format!("\n{}:", category.to_uppercase()));
        for (key, value) in fields {
            lines.push(format!("  - {}: {}", key, render_value(value)));
        }
    }
    lines.join("\n")
}

/// False for empty strings, zero, empty lists and null
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The filled-in fields of one category as display pairs
pub fn known_fields(profile: &ProfileDocument, category: &str) -> Vec<(String, String)> {
    profile
        .get(category)
        .map(|fields| {
            fields
                .iter()
                .filter(|(_, v)| is_filled(v))
                .map(|(k, v)| (k.clone(), render_value(v)))
                .collect()
        })
        .unwrap_or_default()
}
