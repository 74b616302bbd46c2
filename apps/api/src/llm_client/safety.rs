//! Content-safety knobs passed through to the generation capability.
//!
//! Enforcement belongs to the provider; these are forwarded as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::DangerousContent,
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
    ];
}

/// Ordered from strictest to most permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
    BlockNone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Per-category thresholds. Categories left unset use the provider default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetySettings {
    thresholds: BTreeMap<HarmCategory, HarmBlockThreshold>,
}

impl SafetySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same threshold for every category.
    pub fn uniform(threshold: HarmBlockThreshold) -> Self {
        HarmCategory::ALL
            .into_iter()
            .fold(Self::new(), |settings, category| settings.set(category, threshold))
    }

    pub fn set(mut self, category: HarmCategory, threshold: HarmBlockThreshold) -> Self {
        self.thresholds.insert(category, threshold);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn to_wire(&self) -> Vec<SafetySetting> {
        self.thresholds
            .iter()
            .map(|(category, threshold)| SafetySetting {
                category: *category,
                threshold: *threshold,
            })
            .collect()
    }
}
