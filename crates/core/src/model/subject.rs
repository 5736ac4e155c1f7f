//! Subject labels and the mapping between display names and stored names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subjects offered on the dashboard, in display order.
pub const SUBJECTS: &[&str] = &[
    "Anatomy",
    "Physiology",
    "Biochemistry",
    "Pathology",
    "Pharmacology",
    "Microbiology",
    "Forensic Medicine",
    "Community Medicine",
    "ENT",
    "Ophthalmology",
    "Medicine",
    "Surgery",
    "Obstetrics & Gynaecology",
    "Pediatrics",
    "Orthopedics",
    "Dermatology",
    "Psychiatry",
    "Anaesthesia",
    "Radiology",
];

/// Display names whose rows are stored under a different subject label.
const LEGACY_STORAGE_NAMES: &[(&str, &str)] = &[("Orthopedics", "Orthopaedics"), ("Dermatology", "Skin")];

/// A subject label as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label under which this subject's rows are stored.
    #[must_use]
    pub fn storage_name(&self) -> &str {
        LEGACY_STORAGE_NAMES
            .iter()
            .find(|(display, _)| *display == self.0)
            .map_or(self.0.as_str(), |(_, stored)| stored)
    }

    /// Display subject for a stored label; unknown labels pass through.
    #[must_use]
    pub fn from_storage_name(stored: &str) -> Self {
        let display = LEGACY_STORAGE_NAMES
            .iter()
            .find(|(_, name)| *name == stored)
            .map_or(stored, |(display, _)| display);
        Self::new(display)
    }

    /// Case-insensitive substring match used by the dashboard search box.
    /// An empty query matches everything.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.0.to_lowercase().contains(&query)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// All dashboard subjects.
#[must_use]
pub fn all_subjects() -> Vec<Subject> {
    SUBJECTS.iter().copied().map(Subject::from).collect()
}

/// Subjects whose display name matches `query`.
#[must_use]
pub fn filter_subjects(query: &str) -> Vec<Subject> {
    all_subjects()
        .into_iter()
        .filter(|subject| subject.matches_query(query))
        .collect()
}
