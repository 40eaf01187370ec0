use serde::{Deserialize, Serialize};

use crate::models::{Avatar, Patient};
use crate::rules;

/// A patient row with its (first) avatar, as listed on the clinician dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientOverview {
    #[serde(flatten)]
    pub patient: Patient,
    pub avatar: Option<Avatar>,
}

impl PatientOverview {
    /// Display health of the avatar, if the patient has one.
    pub fn health(&self) -> Option<i32> {
        self.avatar.as_ref().map(Avatar::display_health)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub critical: usize,
    pub stable: usize,
}

/// Counts critical patients (avatar health below `threshold`). Patients
/// without an avatar count as stable.
pub fn summarize(patients: &[PatientOverview], threshold: i32) -> DashboardSummary {
    let total = patients.len();
    let critical = patients
        .iter()
        .filter_map(PatientOverview::health)
        .filter(|h| rules::is_critical(*h, threshold))
        .count();

    DashboardSummary {
        total,
        critical,
        stable: total - critical,
    }
}
