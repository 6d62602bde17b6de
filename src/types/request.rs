use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A versioned guideline to check a sheet against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineRef {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Which guidelines each sheet should be checked against.
///
/// Guidelines keep their insertion order: single-guideline workers use the first
/// one, merged workers lay out guideline blocks in this order.
///
/// # Example
///
/// ```
/// use comply::SheetsToCheck;
///
/// let sheets = SheetsToCheck::new()
///     .sheet("Protocol", "Mozilla", "5.7")
///     .sheet("Protocol", "NIST", "2")
///     .sheet("CipherSuite", "Mozilla", "5.7");
/// assert_eq!(sheets.guidelines("Protocol").len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetsToCheck {
    sheets: BTreeMap<String, Vec<GuidelineRef>>,
}

impl SheetsToCheck {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `guideline` at `version` to `sheet`. Re-adding the same guideline
    /// replaces its version.
    #[must_use]
    pub fn sheet(mut self, sheet: &str, guideline: &str, version: &str) -> Self {
        let guidelines = self.sheets.entry(sheet.to_owned()).or_default();
        match guidelines.iter_mut().find(|g| g.name == guideline) {
            Some(existing) => existing.version = version.to_owned(),
            None => guidelines.push(GuidelineRef {
                name: guideline.to_owned(),
                version: version.to_owned(),
            }),
        }
        self
    }

    #[must_use]
    pub fn guidelines(&self, sheet: &str) -> &[GuidelineRef] {
        self.sheets.get(sheet).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[GuidelineRef])> {
        self.sheets.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
