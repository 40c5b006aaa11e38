use serde::{Deserialize, Serialize};
use std::fmt;

/// The two crawler datasets a question can be answered from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetId {
    /// 4chan crawler corpus
    #[default]
    Primary,
    /// Reddit crawler corpus
    Secondary,
}

impl DatasetId {
    pub const ALL: [DatasetId; 2] = [DatasetId::Primary, DatasetId::Secondary];

    /// Short name used in prompts and model answers
    pub fn name(&self) -> &'static str {
        match self {
            DatasetId::Primary => "chan",
            DatasetId::Secondary => "reddit",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetId::Primary => "primary",
            DatasetId::Secondary => "secondary",
        }
    }

    /// Interpret a free-text classifier answer.
    ///
    /// Anything that mentions the secondary dataset (by short name or by its
    /// generic label) selects it; every other answer falls back to primary.
    pub fn from_answer(answer: &str) -> Self {
        let answer = answer.trim().to_lowercase();
        let secondary = DatasetId::Secondary;
        if answer.contains(secondary.name()) || answer.contains(secondary.as_str()) {
            DatasetId::Secondary
        } else {
            DatasetId::Primary
        }
    }

    pub fn other(&self) -> Self {
        match self {
            DatasetId::Primary => DatasetId::Secondary,
            DatasetId::Secondary => DatasetId::Primary,
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
