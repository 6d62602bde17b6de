use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::level::LevelPolicy;
use super::verdict::Verdict;

/// Final verdict for one display name of one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub level: String,
    pub enabled: bool,
    pub valid_condition: bool,
    /// Originating guideline; empty for evaluation-only results.
    pub source: String,
    pub notes: String,
}

impl ResultRecord {
    pub fn verdict(&self, policy: &LevelPolicy) -> Verdict {
        Verdict::classify(policy.action(&self.level), self.enabled, self.valid_condition)
    }

    /// One human-readable line, e.g. `rc4 is enabled, but it must not be (G1)`.
    #[must_use]
    pub fn describe(&self, name: &str, policy: &LevelPolicy) -> String {
        let state = if self.enabled { "enabled" } else { "disabled" };
        let mut line = match self.verdict(policy) {
            Verdict::Satisfied => format!("{name} is {state}, as it {} be", self.level.trim()),
            Verdict::Missing => format!("{name} is disabled, but it {} be enabled", self.level.trim()),
            Verdict::Forbidden => format!("{name} is enabled, but it {} be", self.level.trim()),
            Verdict::NotApplicable => format!("{name} is {state}; its condition does not apply"),
            Verdict::Informational => format!("{name} is {state} ({})", self.level),
        };
        if !self.source.is_empty() {
            line.push_str(&format!(" ({})", self.source));
        }
        line.push_str(&self.notes);
        line
    }
}

/// Per-invocation results: sheet → display name → record.
///
/// The first write for a key establishes its record; later writes never replace
/// it. Notes may be appended to existing records only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
#[must_use]
pub struct ResultStore {
    sheets: BTreeMap<String, BTreeMap<String, ResultRecord>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `sheet` is present, even if no record is ever written to it.
    pub fn ensure_sheet(&mut self, sheet: &str) {
        self.sheets.entry(sheet.to_owned()).or_default();
    }

    /// Insert a record unless one already exists for `(sheet, name)`.
    ///
    /// Returns `true` if the record was inserted.
    pub fn update_result(
        &mut self,
        sheet: &str,
        name: &str,
        level: &str,
        enabled: bool,
        source: &str,
        valid_condition: bool,
    ) -> bool {
        let records = self.sheets.entry(sheet.to_owned()).or_default();
        if records.contains_key(name) {
            return false;
        }
        records.insert(
            name.to_owned(),
            ResultRecord {
                level: level.to_owned(),
                enabled,
                valid_condition,
                source: source.to_owned(),
                notes: String::new(),
            },
        );
        true
    }

    /// Append `note` to an existing record. Absent keys are left absent.
    ///
    /// Returns `true` if the note was attached.
    pub fn append_note(&mut self, sheet: &str, name: &str, note: &str) -> bool {
        match self.sheets.get_mut(sheet).and_then(|r| r.get_mut(name)) {
            Some(record) => {
                record.notes.push_str(note);
                true
            }
            None => false,
        }
    }

    /// Fold `other` into `self`: missing keys are inserted, notes of keys present
    /// in both are appended.
    pub fn merge(&mut self, other: ResultStore) {
        for (sheet, records) in other.sheets {
            let target = self.sheets.entry(sheet).or_default();
            for (name, record) in records {
                match target.get_mut(&name) {
                    Some(existing) => existing.notes.push_str(&record.notes),
                    None => {
                        target.insert(name, record);
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, sheet: &str, name: &str) -> Option<&ResultRecord> {
        self.sheets.get(sheet)?.get(name)
    }

    #[must_use]
    pub fn sheet(&self, sheet: &str) -> Option<&BTreeMap<String, ResultRecord>> {
        self.sheets.get(sheet)
    }

    pub fn sheets(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &ResultRecord)> {
        self.sheets.iter().flat_map(|(sheet, records)| {
            records
                .iter()
                .map(move |(name, record)| (sheet.as_str(), name.as_str(), record))
        })
    }

    /// Number of records across all sheets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records whose verdict is a violation under `policy`.
    pub fn violations<'a>(
        &'a self,
        policy: &'a LevelPolicy,
    ) -> impl Iterator<Item = (&'a str, &'a str, &'a ResultRecord)> + 'a {
        self.iter()
            .filter(move |(_, _, record)| record.verdict(policy).is_violation())
    }
}

impl fmt::Display for ResultStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultStore({} sheets, {} records)", self.sheets.len(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins() {
        let mut store = ResultStore::new();
        assert!(store.update_result("ciphers", "rc4", "must not", true, "G1", true));
        assert!(!store.update_result("ciphers", "rc4", "may", false, "G2", true));
        let record = store.get("ciphers", "rc4").unwrap();
        assert_eq!(record.level, "must not");
        assert!(record.enabled);
        assert_eq!(record.source, "G1");
    }

    #[test]
    fn notes_need_an_existing_record() {
        let mut store = ResultStore::new();
        assert!(!store.append_note("ciphers", "ghost", "\nNOTE: orphan"));
        assert!(store.get("ciphers", "ghost").is_none());

        store.update_result("ciphers", "aes", "must", true, "G1", true);
        assert!(store.append_note("ciphers", "aes", "\nNOTE: a"));
        assert!(store.append_note("ciphers", "aes", "\nNOTE: b"));
        assert_eq!(store.get("ciphers", "aes").unwrap().notes, "\nNOTE: a\nNOTE: b");
    }

    #[test]
    fn ensure_sheet_creates_empty_sheet() {
        let mut store = ResultStore::new();
        store.ensure_sheet("protocols");
        assert_eq!(store.sheets().collect::<Vec<_>>(), vec!["protocols"]);
        assert!(store.is_empty());
    }

    #[test]
    fn merge_keeps_first_and_appends_notes() {
        let mut a = ResultStore::new();
        a.update_result("s", "x", "must", true, "G1", true);
        let mut b = ResultStore::new();
        b.update_result("s", "x", "may", false, "G2", true);
        b.append_note("s", "x", "\nNOTE: from b");
        b.update_result("s", "y", "must", false, "G2", true);

        a.merge(b);
        assert_eq!(a.len(), 2);
        let x = a.get("s", "x").unwrap();
        assert_eq!(x.level, "must");
        assert_eq!(x.notes, "\nNOTE: from b");
    }

    #[test]
    fn describe_and_violations() {
        let policy = LevelPolicy::default();
        let mut store = ResultStore::new();
        store.update_result("ciphers", "rc4", "must not", true, "G1", true);
        store.update_result("ciphers", "aes", "must", true, "G1", true);
        let rc4 = store.get("ciphers", "rc4").unwrap();
        assert_eq!(
            rc4.describe("rc4", &policy),
            "rc4 is enabled, but it must not be (G1)"
        );
        let names: Vec<&str> = store.violations(&policy).map(|(_, n, _)| n).collect();
        assert_eq!(names, vec!["rc4"]);
    }

    #[test]
    fn serializes_as_nested_maps() {
        let mut store = ResultStore::new();
        store.update_result("s", "x", "must", true, "G1", true);
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["s"]["x"]["level"], "must");
        assert_eq!(json["s"]["x"]["enabled"], true);
    }

    #[test]
    fn display() {
        let mut store = ResultStore::new();
        store.update_result("a", "x", "must", true, "", true);
        store.update_result("b", "y", "must", true, "", true);
        assert_eq!(store.to_string(), "ResultStore(2 sheets, 2 records)");
    }
}
