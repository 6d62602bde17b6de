//! Directive synthesis: turning evaluated guideline entries into nginx directives.

mod document;
mod rules;

pub use document::{Directive, Document, COMMENT};
pub use rules::{FieldRules, Replacement, SynthesisConfig, NAME_PLACEHOLDER};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::evaluate::{ConditionEvaluator, DslConditionEvaluator};
use crate::types::{
    ColumnSchema, ConfigValue, EvaluatedEntries, EvaluationOutcome, GuidelineBlockLayout,
    LevelAction, LevelPolicy, RuleRow, SchemaError, SheetEntries, UserConfiguration, CONDITION,
    LEVEL, NAME,
};
use crate::ComplyError;

/// One candidate entry for a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEntry {
    /// A raw rule row laid out by the request's schema.
    Flat(RuleRow),
    /// A worker result, possibly carrying a merged multi-guideline row.
    Evaluated(EvaluationOutcome),
}

impl From<RuleRow> for SynthesisEntry {
    fn from(row: RuleRow) -> Self {
        SynthesisEntry::Flat(row)
    }
}

impl From<EvaluationOutcome> for SynthesisEntry {
    fn from(outcome: EvaluationOutcome) -> Self {
        SynthesisEntry::Evaluated(outcome)
    }
}

/// What synthesis decided for one name of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub enabled: bool,
    /// Guideline of the last entry that touched this name.
    pub guideline: String,
}

/// A condition whose outcome depends on the whole synthesized state, replayed
/// by [`DirectiveSynthesizer::resolve_deferred`].
///
/// The entry carries no copy of its rule row. The replay reads only the
/// synthesized state (field → enabled names, see
/// [`DirectiveSynthesizer::synthesized_configuration`]) with the entry's own
/// output record as `THIS`, and regeneration reuses the inputs stored for
/// `field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredConditionEntry {
    pub field: String,
    pub directive: String,
    pub name: String,
    pub expression: String,
    pub guideline: String,
    pub level: String,
}

/// Summary of a deferred resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferredResolution {
    /// Deferred entries consumed by the pass.
    pub consumed: usize,
    /// `(field, name)` pairs whose condition no longer held.
    pub dropped: Vec<(String, String)>,
    /// Fields whose directive was regenerated.
    pub regenerated: Vec<String>,
}

/// Inputs of one field's synthesis, kept so the field can be regenerated.
#[derive(Debug, Clone)]
struct FieldRequest {
    field_rules: FieldRules,
    entries: Vec<SynthesisEntry>,
    schema: ColumnSchema,
    guideline: String,
    target: Option<String>,
}

struct Decoded {
    name: String,
    level: String,
    guideline: String,
    condition: String,
}

struct Decoder {
    name: usize,
    level: usize,
    condition: usize,
    layout: GuidelineBlockLayout,
}

impl Decoder {
    fn new(field: &str, schema: &ColumnSchema, entries: &[SynthesisEntry]) -> Result<Self, SchemaError> {
        let rows = entries.iter().filter_map(|e| match e {
            SynthesisEntry::Evaluated(outcome) => Some(&outcome.row),
            SynthesisEntry::Flat(_) => None,
        });
        Ok(Self {
            name: schema.require(field, NAME)?,
            level: schema.require(field, LEVEL)?,
            condition: schema.require(field, CONDITION)?,
            layout: GuidelineBlockLayout::from_rows(rows, schema),
        })
    }

    fn decode(&self, entry: &SynthesisEntry, guideline: &str) -> Decoded {
        match entry {
            SynthesisEntry::Flat(row) => Decoded {
                name: row.get(self.name).to_owned(),
                level: row.get(self.level).to_owned(),
                guideline: guideline.to_owned(),
                condition: row.get(self.condition).to_owned(),
            },
            SynthesisEntry::Evaluated(outcome) => Decoded {
                name: outcome.rule_name.clone(),
                level: outcome.level.clone(),
                guideline: outcome.source.clone(),
                condition: self
                    .layout
                    .cell(&outcome.row, &outcome.source, self.condition)
                    .unwrap_or_default()
                    .to_owned(),
            },
        }
    }
}

/// Split `value` into directive argument and comment when it holds exactly one `#`.
fn split_comment(value: &str) -> (&str, Option<&str>) {
    if value.matches('#').count() == 1 {
        if let Some((args, comment)) = value.split_once('#') {
            let comment = comment.trim();
            return (args.trim(), (!comment.is_empty()).then_some(comment));
        }
    }
    (value, None)
}

/// Builds directives for a target document from evaluated entries.
///
/// Synthesis runs in two passes. The first pass writes each field's directive
/// and queues the conditions of every enabled entry. The second pass,
/// [`resolve_deferred`](Self::resolve_deferred), replays those conditions against
/// the synthesized state and regenerates the fields whose entries no longer
/// qualify. Regeneration never queues new entries.
///
/// Directives are inserted at the start of the anchor block, newest first.
#[derive(Debug, Clone)]
pub struct DirectiveSynthesizer<E = DslConditionEvaluator> {
    config: SynthesisConfig,
    policy: LevelPolicy,
    evaluator: E,
    template: Document,
    template_path: Option<PathBuf>,
    output: BTreeMap<String, BTreeMap<String, OutputRecord>>,
    deferred: Vec<DeferredConditionEntry>,
    requests: BTreeMap<String, FieldRequest>,
    /// Directive → text of the comment synthesized in front of it.
    comments: BTreeMap<String, String>,
}

impl DirectiveSynthesizer {
    #[must_use]
    pub fn new(template: Document, config: SynthesisConfig, policy: LevelPolicy) -> Self {
        Self {
            config,
            policy,
            evaluator: DslConditionEvaluator,
            template,
            template_path: None,
            output: BTreeMap::new(),
            deferred: Vec::new(),
            requests: BTreeMap::new(),
            comments: BTreeMap::new(),
        }
    }

    /// Synthesizer using the synthesis settings and level vocabulary of `engine`.
    #[must_use]
    pub fn for_engine(template: Document, engine: &EngineConfig) -> Self {
        Self::new(template, engine.synthesis.clone(), engine.levels.clone())
    }

    /// Load the template at `path`. A malformed template is never partially used.
    ///
    /// # Errors
    ///
    /// Returns [`ComplyError::Io`] if the file cannot be read and
    /// [`ComplyError::Schema`] if it does not parse.
    pub fn from_template(
        path: impl AsRef<Path>,
        config: SynthesisConfig,
        policy: LevelPolicy,
    ) -> Result<Self, ComplyError> {
        let path = path.as_ref();
        let mut synth = Self::new(Document::load(path)?, config, policy);
        synth.template_path = Some(path.to_path_buf());
        Ok(synth)
    }
}

impl<E: ConditionEvaluator> DirectiveSynthesizer<E> {
    #[must_use]
    pub fn with_evaluator<F: ConditionEvaluator>(self, evaluator: F) -> DirectiveSynthesizer<F> {
        DirectiveSynthesizer {
            config: self.config,
            policy: self.policy,
            evaluator,
            template: self.template,
            template_path: self.template_path,
            output: self.output,
            deferred: self.deferred,
            requests: self.requests,
            comments: self.comments,
        }
    }

    /// Build and insert the directive for `field` from `entries`.
    ///
    /// `field_rules` is used unless the configuration has specific rules for the
    /// field. `guideline` attributes flat rows; evaluated entries carry their own.
    /// When `target` is given, only names containing it (with `*` removed) are
    /// kept. Returns the emitted value, or `None` when the field is unmapped or
    /// its value ends up empty.
    ///
    /// # Errors
    ///
    /// Returns [`ComplyError::Schema`] if `schema` lacks the name, level or
    /// condition column, or the template has no anchor block.
    pub fn add_configuration_for_field(
        &mut self,
        field: &str,
        field_rules: &FieldRules,
        entries: &[SynthesisEntry],
        schema: &ColumnSchema,
        guideline: &str,
        target: Option<&str>,
    ) -> Result<Option<String>, ComplyError> {
        let request = FieldRequest {
            field_rules: field_rules.clone(),
            entries: entries.to_vec(),
            schema: schema.clone(),
            guideline: guideline.to_owned(),
            target: target.map(str::to_owned),
        };
        let value = self.generate(field, &request, true, &BTreeSet::new())?;
        self.requests.insert(field.to_owned(), request);
        Ok(value)
    }

    /// Synthesize `field` from one sheet of worker output, using the configured rules.
    ///
    /// # Errors
    ///
    /// See [`add_configuration_for_field`](Self::add_configuration_for_field).
    pub fn synthesize_sheet(
        &mut self,
        field: &str,
        sheet: &SheetEntries,
        target: Option<&str>,
    ) -> Result<Option<String>, ComplyError> {
        let entries: Vec<SynthesisEntry> = sheet
            .entries
            .iter()
            .cloned()
            .map(SynthesisEntry::Evaluated)
            .collect();
        let rules = self.config.rules_for(field).clone();
        self.add_configuration_for_field(field, &rules, &entries, &sheet.schema, "", target)
    }

    /// Synthesize every sheet of `evaluated`, then run the deferred pass.
    ///
    /// # Errors
    ///
    /// See [`add_configuration_for_field`](Self::add_configuration_for_field).
    pub fn synthesize(
        &mut self,
        evaluated: &EvaluatedEntries,
        target: Option<&str>,
    ) -> Result<DeferredResolution, ComplyError> {
        for (field, sheet) in evaluated.iter() {
            self.synthesize_sheet(field, sheet, target)?;
        }
        self.resolve_deferred()
    }

    fn generate(
        &mut self,
        field: &str,
        request: &FieldRequest,
        defer: bool,
        excluded: &BTreeSet<String>,
    ) -> Result<Option<String>, ComplyError> {
        self.output.insert(field.to_owned(), BTreeMap::new());
        let Some(directive) = self.config.directive_for(field).map(str::to_owned) else {
            debug!(field, "field has no target directive");
            return Ok(None);
        };
        let rules = self
            .config
            .specific_rules
            .get(field)
            .unwrap_or(&request.field_rules)
            .clone();
        let decoder = Decoder::new(field, &request.schema, &request.entries)?;
        let filter = request.target.as_deref().map(|t| t.replace('*', ""));

        let mut value = String::new();
        let mut records: BTreeMap<String, OutputRecord> = BTreeMap::new();
        for entry in &request.entries {
            let decoded = decoder.decode(entry, &request.guideline);
            if let Some(filter) = &filter {
                if !decoded.name.contains(filter.as_str()) {
                    debug!(field, name = %decoded.name, target = %filter, "filtered by target");
                    continue;
                }
            }
            let name = rules.apply_replacements(&decoded.name);
            if excluded.contains(&name) {
                debug!(field, name = %name, "dropped after deferred resolution");
                continue;
            }
            let action = self.policy.action(&decoded.level);
            if let Some(fragment) = rules.fragment(action, &name) {
                value.push_str(&fragment);
            }
            if action != LevelAction::Ignore {
                records.insert(
                    name.clone(),
                    OutputRecord {
                        enabled: action == LevelAction::Enable,
                        guideline: decoded.guideline.clone(),
                    },
                );
            }
            if let Some(record) = records.get_mut(&name) {
                if defer && record.enabled && !decoded.condition.trim().is_empty() {
                    self.deferred.push(DeferredConditionEntry {
                        field: field.to_owned(),
                        directive: directive.clone(),
                        name: name.clone(),
                        expression: decoded.condition,
                        guideline: decoded.guideline.clone(),
                        level: decoded.level,
                    });
                }
                record.guideline = decoded.guideline;
            }
        }
        self.output.insert(field.to_owned(), records);

        let value = rules.finish(&value);
        if value.is_empty() {
            warn!(field, directive = %directive, "empty directive value, not emitted");
            return Ok(None);
        }
        let (args, comment) = split_comment(&value);
        let block = self.template.anchor_block_mut(&self.config.anchor)?;
        block.insert(0, Directive::new(&directive, [args]));
        match comment {
            Some(comment) => {
                block.insert(0, Directive::comment(comment));
                self.comments.insert(directive.clone(), comment.to_owned());
            }
            None => {
                self.comments.remove(&directive);
            }
        }
        info!(field, directive = %directive, value = %value, "synthesized directive");
        Ok(Some(value))
    }

    /// Delete every `directive` node from the anchor block, together with the
    /// comment synthesized in front of it. Comments from the template are kept.
    /// Returns the number of directives removed.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingAnchor`] if the template has no anchor block.
    pub fn remove_field(&mut self, directive: &str) -> Result<usize, SchemaError> {
        let synthesized = self.comments.remove(directive);
        let block = self.template.anchor_block_mut(&self.config.anchor)?;
        let mut matches = 0;
        let mut doomed = BTreeSet::new();
        for (index, node) in block.iter().enumerate() {
            if node.directive == directive {
                matches += 1;
                doomed.insert(index);
                if let (Some(text), Some(previous)) = (&synthesized, index.checked_sub(1)) {
                    let previous = &block[previous];
                    if previous.is_comment() && previous.comment.as_ref() == Some(text) {
                        doomed.insert(index - 1);
                    }
                }
            }
        }
        for &index in doomed.iter().rev() {
            block.remove(index);
        }
        Ok(matches)
    }

    /// Replay every queued condition against the synthesized state.
    ///
    /// Each entry is consumed exactly once. Names whose condition fails are
    /// dropped and their field is regenerated once, without deferral.
    ///
    /// # Errors
    ///
    /// Returns [`ComplyError::Schema`] if a regenerated field cannot be written back.
    pub fn resolve_deferred(&mut self) -> Result<DeferredResolution, ComplyError> {
        let pending = std::mem::take(&mut self.deferred);
        let view = self.synthesized_configuration();
        let mut report = DeferredResolution {
            consumed: pending.len(),
            ..DeferredResolution::default()
        };

        let mut excluded: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in &pending {
            let enabled = self
                .output
                .get(&entry.field)
                .and_then(|records| records.get(&entry.name))
                .is_some_and(|r| r.enabled);
            let outcome = self
                .evaluator
                .run(&view, &entry.field, &entry.expression, enabled);
            if !outcome.valid {
                debug!(
                    field = %entry.field,
                    name = %entry.name,
                    condition = %entry.expression,
                    "deferred condition failed"
                );
                excluded
                    .entry(entry.field.clone())
                    .or_default()
                    .insert(entry.name.clone());
            }
        }

        for (field, names) in excluded {
            let Some(request) = self.requests.get(&field).cloned() else {
                continue;
            };
            if let Some(directive) = self.config.directive_for(&field).map(str::to_owned) {
                self.remove_field(&directive)?;
            }
            self.generate(&field, &request, false, &names)?;
            report
                .dropped
                .extend(names.into_iter().map(|name| (field.clone(), name)));
            report.regenerated.push(field);
        }
        info!(
            consumed = report.consumed,
            dropped = report.dropped.len(),
            "resolved deferred conditions"
        );
        Ok(report)
    }

    /// The synthesized state as a configuration: field → enabled names.
    #[must_use]
    pub fn synthesized_configuration(&self) -> UserConfiguration {
        let mut view = UserConfiguration::new();
        for (field, records) in &self.output {
            let names = records
                .iter()
                .filter(|(_, r)| r.enabled)
                .map(|(name, _)| name.clone())
                .collect();
            view.insert(field, ConfigValue::List(names));
        }
        view
    }

    #[must_use]
    pub fn output(&self) -> &BTreeMap<String, BTreeMap<String, OutputRecord>> {
        &self.output
    }

    #[must_use]
    pub fn output_for(&self, field: &str) -> Option<&BTreeMap<String, OutputRecord>> {
        self.output.get(field)
    }

    #[must_use]
    pub fn deferred(&self) -> &[DeferredConditionEntry] {
        &self.deferred
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.template
    }

    /// Render the modified template to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`ComplyError::TemplateNotFound`] if the template this synthesizer
    /// was loaded from no longer exists, or [`ComplyError::Io`] on write failure.
    pub fn write(&self, output: impl AsRef<Path>) -> Result<(), ComplyError> {
        if let Some(path) = &self.template_path {
            if !path.is_file() {
                return Err(ComplyError::TemplateNotFound { path: path.clone() });
            }
        }
        self.template.write(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Document {
        Document::parse("user nginx;\nhttp {\n    server {\n        listen 443 ssl;\n    }\n}\n").unwrap()
    }

    fn synth() -> DirectiveSynthesizer {
        DirectiveSynthesizer::new(
            template(),
            SynthesisConfig::default()
                .map("ciphers", "ssl_ciphers")
                .map("protocols", "ssl_protocols"),
            LevelPolicy::default(),
        )
    }

    fn flat(rows: &[[&str; 4]]) -> Vec<SynthesisEntry> {
        rows.iter().map(|r| SynthesisEntry::Flat(RuleRow::from(*r))).collect()
    }

    fn http(s: &DirectiveSynthesizer) -> &[Directive] {
        s.document().anchor_block("http").unwrap()
    }

    #[test]
    fn toggle_directive() {
        let mut s = synth();
        let value = s
            .add_configuration_for_field(
                "ciphers",
                &FieldRules::toggle("name", "-name", ","),
                &flat(&[["aes128", "must", "", "G1"], ["rc4", "must not", "", "G1"]]),
                &ColumnSchema::rules(),
                "G1",
                None,
            )
            .unwrap();
        assert_eq!(value.as_deref(), Some("aes128,-rc4"));
        assert_eq!(http(&s)[0], Directive::new("ssl_ciphers", ["aes128,-rc4"]));
        let out = s.output_for("ciphers").unwrap();
        assert!(out["aes128"].enabled);
        assert!(!out["rc4"].enabled);
        assert_eq!(out["rc4"].guideline, "G1");
    }

    #[test]
    fn unmapped_field_records_empty_output() {
        let mut s = synth();
        let value = s
            .add_configuration_for_field(
                "hashes",
                &FieldRules::default(),
                &flat(&[["sha1", "must", "", "G1"]]),
                &ColumnSchema::rules(),
                "G1",
                None,
            )
            .unwrap();
        assert!(value.is_none());
        assert!(s.output_for("hashes").unwrap().is_empty());
        assert_eq!(http(&s).len(), 1);
    }

    #[test]
    fn comment_is_split_and_placed_first() {
        let mut s = synth();
        s.add_configuration_for_field(
            "protocols",
            &FieldRules::listing(" "),
            &flat(&[["TLSv1.3 # preferred", "must", "", "G1"]]),
            &ColumnSchema::rules(),
            "G1",
            None,
        )
        .unwrap();
        assert_eq!(http(&s)[0], Directive::comment("preferred"));
        assert_eq!(http(&s)[1], Directive::new("ssl_protocols", ["TLSv1.3"]));
    }

    #[test]
    fn newest_directive_first() {
        let mut s = synth();
        let schema = ColumnSchema::rules();
        s.add_configuration_for_field("protocols", &FieldRules::listing(" "), &flat(&[["TLSv1.3", "must", "", "G1"]]), &schema, "G1", None)
            .unwrap();
        s.add_configuration_for_field("ciphers", &FieldRules::listing(":"), &flat(&[["aes128", "must", "", "G1"]]), &schema, "G1", None)
            .unwrap();
        assert_eq!(http(&s)[0].directive, "ssl_ciphers");
        assert_eq!(http(&s)[1].directive, "ssl_protocols");
    }

    #[test]
    fn remove_field_takes_preceding_comment() {
        let mut s = synth();
        s.add_configuration_for_field(
            "protocols",
            &FieldRules::listing(" "),
            &flat(&[["TLSv1.3 #tls", "must", "", "G1"]]),
            &ColumnSchema::rules(),
            "G1",
            None,
        )
        .unwrap();
        assert_eq!(s.remove_field("ssl_protocols").unwrap(), 1);
        assert_eq!(http(&s).len(), 1);
        assert_eq!(http(&s)[0].directive, "server");
    }

    #[test]
    fn remove_field_keeps_template_comments() {
        let template = Document::parse(
            "http {\n    # pinned by ops\n    ssl_protocols TLSv1.2;\n    server {\n    }\n}\n",
        )
        .unwrap();
        let mut s = DirectiveSynthesizer::new(
            template,
            SynthesisConfig::default().map("protocols", "ssl_protocols"),
            LevelPolicy::default(),
        );
        assert_eq!(s.remove_field("ssl_protocols").unwrap(), 1);
        assert_eq!(http(&s)[0], Directive::comment("pinned by ops"));
        assert_eq!(http(&s)[1].directive, "server");
    }

    #[test]
    fn regenerated_directive_leaves_template_comment_alone() {
        let template =
            Document::parse("http {\n    # pinned by ops\n    server {\n    }\n}\n").unwrap();
        let mut s = DirectiveSynthesizer::new(
            template,
            SynthesisConfig::default().map("protocols", "ssl_protocols"),
            LevelPolicy::default(),
        );
        s.add_configuration_for_field(
            "protocols",
            &FieldRules::listing(" "),
            &flat(&[["TLSv1.3", "must", "", "G1"]]),
            &ColumnSchema::rules(),
            "G1",
            None,
        )
        .unwrap();
        assert_eq!(http(&s)[1], Directive::comment("pinned by ops"));
        assert_eq!(s.remove_field("ssl_protocols").unwrap(), 1);
        assert_eq!(http(&s)[0], Directive::comment("pinned by ops"));
        assert_eq!(http(&s).len(), 2);
    }

    #[test]
    fn evaluated_entries_use_their_guideline_block() {
        let mut s = synth();
        let outcome = EvaluationOutcome {
            name: "aes128".into(),
            rule_name: "aes128".into(),
            level: "must".into(),
            enabled: true,
            valid_condition: true,
            source: "G2".into(),
            note: String::new(),
            row: RuleRow::from([
                "aes128", "recommended", "", "G1", //
                "aes128", "must", "THIS", "G2",
            ]),
        };
        s.add_configuration_for_field(
            "ciphers",
            &FieldRules::listing(":"),
            &[SynthesisEntry::Evaluated(outcome)],
            &ColumnSchema::rules(),
            "",
            None,
        )
        .unwrap();
        assert_eq!(s.deferred().len(), 1);
        assert_eq!(s.deferred()[0].expression, "THIS");
        assert_eq!(s.deferred()[0].guideline, "G2");
        assert_eq!(s.output_for("ciphers").unwrap()["aes128"].guideline, "G2");
    }

    #[test]
    fn deferred_entry_replays_against_synthesized_fields() {
        let schema = ColumnSchema::rules();
        let ciphers = flat(&[
            ["aes128", "must", "", "G1"],
            ["chacha20", "must", "THIS AND protocols:TLSv1.3", "G1"],
        ]);

        let mut kept = synth();
        kept.add_configuration_for_field("protocols", &FieldRules::listing(" "), &flat(&[["TLSv1.3", "must", "", "G1"]]), &schema, "G1", None)
            .unwrap();
        kept.add_configuration_for_field("ciphers", &FieldRules::listing(":"), &ciphers, &schema, "G1", None)
            .unwrap();
        assert_eq!(kept.deferred()[0].level, "must");
        let report = kept.resolve_deferred().unwrap();
        assert_eq!(report.consumed, 1);
        assert!(report.dropped.is_empty());

        let mut dropped = synth();
        dropped
            .add_configuration_for_field("ciphers", &FieldRules::listing(":"), &ciphers, &schema, "G1", None)
            .unwrap();
        let report = dropped.resolve_deferred().unwrap();
        assert_eq!(report.dropped, vec![("ciphers".to_owned(), "chacha20".to_owned())]);
        assert_eq!(http(&dropped)[0], Directive::new("ssl_ciphers", ["aes128"]));
    }

    #[test]
    fn split_comment_needs_exactly_one_marker() {
        assert_eq!(split_comment("a # b"), ("a", Some("b")));
        assert_eq!(split_comment("a # b # c"), ("a # b # c", None));
        assert_eq!(split_comment("a #"), ("a", None));
    }
}
