use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    /// Centimetres.
    pub height: Option<f64>,
    pub gender: Option<String>,
    pub activity: Option<String>,
    pub diet_type: Option<String>,
    pub allergies: Option<String>,
    pub health_goal: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Intake form. Only `name` is required; a missing one is caught by the
/// blank-name check rather than by deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPatient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub diet_type: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub health_goal: Option<String>,
}

impl NewPatient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Clinician edit. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub height: Option<f64>,
    pub gender: Option<String>,
    pub activity: Option<String>,
    pub diet_type: Option<String>,
    pub allergies: Option<String>,
    pub health_goal: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.height.is_none()
            && self.gender.is_none()
            && self.activity.is_none()
            && self.diet_type.is_none()
            && self.allergies.is_none()
            && self.health_goal.is_none()
    }
}

/// Lowercase ASCII slug of a patient name, used in export filenames.
pub fn filename_slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "patient".to_string()
    } else {
        slug
    }
}
