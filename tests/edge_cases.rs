use comply::source::{MemoryRuleSource, RuleTable};
use comply::synth::{Directive, DirectiveSynthesizer, Document, FieldRules, SynthesisConfig, SynthesisEntry};
use comply::{
    ColumnSchema, ComplianceEngine, ComplyError, EngineConfig, LevelPolicy, RuleRow, SheetColumns,
    SheetsToCheck, UserConfiguration, Verdict, WorkerKind,
};

const COLUMNS: [&str; 4] = ["name", "level", "condition", "guidelineName"];
const TEMPLATE: &str = "user nginx;\nhttp {\n    server {\n        listen 443 ssl;\n    }\n}\n";

fn template() -> Document {
    Document::parse(TEMPLATE).unwrap()
}

fn cipher_rows() -> Vec<SynthesisEntry> {
    vec![
        RuleRow::from(["aes128", "must", "", "G1"]).into(),
        RuleRow::from(["rc4", "must not", "", "G1"]).into(),
    ]
}

fn synthesizer() -> DirectiveSynthesizer {
    DirectiveSynthesizer::new(
        template(),
        SynthesisConfig::default().map("ciphers", "ssl_ciphers"),
        LevelPolicy::default(),
    )
}

#[test]
fn composite_display_name() {
    let source = MemoryRuleSource::new().with_table(
        "KeyLengths",
        "G1",
        "1",
        RuleTable::new(["name", "level", "length", "condition", "guidelineName"])
            .row(["tls1.2", "must", "aes", "", "G1"]),
    );
    let config = EngineConfig {
        sheet_columns: SheetColumns::new().with(
            "KeyLengths",
            ColumnSchema::new(["name", "level", "length", "condition", "guidelineName"])
                .with_name_columns(vec![0, 2]),
        ),
        ..EngineConfig::default()
    };
    let engine = ComplianceEngine::new(source).with_config(config);
    let sheets = SheetsToCheck::new().sheet("KeyLengths", "G1", "1");
    let user = UserConfiguration::new().set("KeyLengths", "tls1.2");
    let output = engine.run(WorkerKind::SingleGuideline, &sheets, &user).unwrap();
    let record = output.results.get("KeyLengths", "tls1.2_aes").unwrap();
    assert!(record.enabled);
}

#[test]
fn cipher_directive_scenario() {
    let mut synth = synthesizer();
    let value = synth
        .add_configuration_for_field(
            "ciphers",
            &FieldRules::toggle("name", "-name", ","),
            &cipher_rows(),
            &ColumnSchema::rules(),
            "G1",
            None,
        )
        .unwrap();
    assert_eq!(value.as_deref(), Some("aes128,-rc4"));
    let output = synth.output_for("ciphers").unwrap();
    assert_eq!(output.len(), 2);
    assert!(output["aes128"].enabled);
    assert!(!output["rc4"].enabled);
}

#[test]
fn everything_filtered_emits_nothing() {
    let mut synth = synthesizer();
    let value = synth
        .add_configuration_for_field(
            "ciphers",
            &FieldRules::toggle("name", "-name", ","),
            &cipher_rows(),
            &ColumnSchema::rules(),
            "G1",
            Some("*chacha*"),
        )
        .unwrap();
    assert!(value.is_none());
    assert_eq!(synth.document(), &template());
}

#[test]
fn target_filter_strips_wildcards() {
    let mut synth = synthesizer();
    let value = synth
        .add_configuration_for_field(
            "ciphers",
            &FieldRules::toggle("name", "-name", ","),
            &cipher_rows(),
            &ColumnSchema::rules(),
            "G1",
            Some("aes*"),
        )
        .unwrap();
    assert_eq!(value.as_deref(), Some("aes128"));
}

#[test]
fn unsatisfied_alternative_note() {
    let source = MemoryRuleSource::new().with_table(
        "Protocol",
        "G1",
        "1",
        RuleTable::new(COLUMNS).row(["TLSv1.3", "must", "THIS OR TLSv1.2 AND NOT TLSv1.0", "G1"]),
    );
    let sheets = SheetsToCheck::new().sheet("Protocol", "G1", "1");
    let user = UserConfiguration::new().set("Protocol", ["TLSv1.0"]);
    let output = ComplianceEngine::new(source)
        .run(WorkerKind::SingleGuideline, &sheets, &user)
        .unwrap();
    let record = output.results.get("Protocol", "TLSv1.3").unwrap();
    assert!(!record.enabled);
    assert!(record.valid_condition);
    assert!(record.notes.starts_with("\nNOTE: TLSv1.3 OR"));
    assert_eq!(record.notes, "\nNOTE: TLSv1.3 OR TLSv1.2 AND NOT TLSv1.0 is needed");
    assert_eq!(record.verdict(&LevelPolicy::default()), Verdict::Missing);
}

#[test]
fn regenerate_cycle_is_idempotent() {
    let mut synth = synthesizer();
    let rules = FieldRules::toggle("name", "-name", ",");
    synth
        .add_configuration_for_field("ciphers", &rules, &cipher_rows(), &ColumnSchema::rules(), "G1", None)
        .unwrap();
    let first = synth.document().clone();

    for _ in 0..3 {
        assert_eq!(synth.remove_field("ssl_ciphers").unwrap(), 1);
        synth
            .add_configuration_for_field("ciphers", &rules, &cipher_rows(), &ColumnSchema::rules(), "G1", None)
            .unwrap();
        assert_eq!(synth.document(), &first);
    }
    let http = synth.document().anchor_block("http").unwrap();
    assert_eq!(http[0], Directive::new("ssl_ciphers", ["aes128,-rc4"]));
    assert_eq!(http.len(), 2);
}

#[test]
fn missing_configuration_is_fatal() {
    let engine = ComplianceEngine::new(MemoryRuleSource::new());
    let sheets = SheetsToCheck::new().sheet("Protocol", "G1", "1");
    let absent = UserConfiguration::from_json("{}").unwrap();
    let err = engine.run(WorkerKind::MultiGuideline, &sheets, &absent).unwrap_err();
    assert!(matches!(err, ComplyError::MissingConfiguration));
}

#[test]
fn empty_valued_field_is_evaluated() {
    let source = MemoryRuleSource::new().with_table(
        "ciphers",
        "G1",
        "1",
        RuleTable::new(COLUMNS).row(["aes128", "must", "", "G1"]),
    );
    let sheets = SheetsToCheck::new().sheet("ciphers", "G1", "1");
    let dump = UserConfiguration::from_json(r#"{"ciphers": ""}"#).unwrap();
    let output = ComplianceEngine::new(source)
        .run(WorkerKind::SingleGuideline, &sheets, &dump)
        .unwrap();
    assert_eq!(output.results.len(), 1);
    let record = output.results.get("ciphers", "aes128").unwrap();
    assert!(!record.enabled);
    assert_eq!(record.verdict(&LevelPolicy::default()), Verdict::Missing);
}

#[test]
fn alternative_chain_of_three_names() {
    let source = MemoryRuleSource::new().with_table(
        "ciphers",
        "G1",
        "1",
        RuleTable::new(COLUMNS).row(["aes128", "must", "THIS OR aes256 OR chacha20", "G1"]),
    );
    let sheets = SheetsToCheck::new().sheet("ciphers", "G1", "1");
    let user = UserConfiguration::new().set("ciphers", ["rc4"]);
    let output = ComplianceEngine::new(source)
        .run(WorkerKind::SingleGuideline, &sheets, &user)
        .unwrap();
    let record = output.results.get("ciphers", "aes128").unwrap();
    assert!(!record.enabled);
    assert!(record.valid_condition);
    assert_eq!(record.notes, "\nNOTE: aes128 OR aes256 OR chacha20 is needed");
}

#[test]
fn unknown_guideline_is_a_source_error() {
    let engine = ComplianceEngine::new(MemoryRuleSource::new());
    let sheets = SheetsToCheck::new().sheet("Protocol", "G1", "1");
    let user = UserConfiguration::new().set("Protocol", "TLSv1.3");
    let err = engine.run(WorkerKind::SingleGuideline, &sheets, &user).unwrap_err();
    assert_eq!(err.to_string(), "no rule table 'Protocol_G1_1'");
}

#[test]
fn schema_override_only_applies_to_its_sheet() {
    let source = MemoryRuleSource::new()
        .with_table(
            "Protocol",
            "G1",
            "1",
            RuleTable::new(COLUMNS).row(["TLSv1.3", "must", "", "G1"]),
        )
        .with_table(
            "Groups",
            "G1",
            "1",
            RuleTable::new(["name", "level", "condition", "guidelineName", "curve"])
                .row(["x25519", "recommended", "", "G1", "25519"]),
        );
    let config = EngineConfig {
        sheet_columns: SheetColumns::new().with(
            "Groups",
            ColumnSchema::new(["curve", "name", "level", "condition", "guidelineName"]),
        ),
        ..EngineConfig::default()
    };
    let sheets = SheetsToCheck::new()
        .sheet("Protocol", "G1", "1")
        .sheet("Groups", "G1", "1");
    let user = UserConfiguration::new()
        .set("Protocol", "TLSv1.3")
        .set("Groups", "x25519");
    let output = ComplianceEngine::new(source)
        .with_config(config)
        .run(WorkerKind::SingleGuideline, &sheets, &user)
        .unwrap();
    assert!(output.results.get("Protocol", "TLSv1.3").unwrap().enabled);
    assert!(output.results.get("Groups", "x25519").unwrap().enabled);
    assert_eq!(output.evaluated.sheet("Groups").unwrap().entries[0].row.get(0), "25519");
}

#[test]
fn unknown_levels_do_not_abort_the_pass() {
    let source = MemoryRuleSource::new().with_table(
        "ciphers",
        "G1",
        "1",
        RuleTable::new(COLUMNS)
            .row(["aes128", "sometimes", "", "G1"])
            .row(["rc4", "must not", "broken AND", "G1"]),
    );
    let sheets = SheetsToCheck::new().sheet("ciphers", "G1", "1");
    let user = UserConfiguration::new().set("ciphers", ["aes128", "rc4"]);
    let output = ComplianceEngine::new(source)
        .run(WorkerKind::SingleGuideline, &sheets, &user)
        .unwrap();
    assert_eq!(output.results.len(), 2);
    let policy = LevelPolicy::default();
    let aes = output.results.get("ciphers", "aes128").unwrap();
    assert_eq!(aes.verdict(&policy), Verdict::Informational);
    let rc4 = output.results.get("ciphers", "rc4").unwrap();
    assert!(rc4.valid_condition);
    assert_eq!(rc4.verdict(&policy), Verdict::Forbidden);
    assert_eq!(output.results.violations(&policy).count(), 1);
}

#[test]
fn condition_level_overrides_nominal_level() {
    let source = MemoryRuleSource::new().with_table(
        "ciphers",
        "G1",
        "1",
        RuleTable::new(COLUMNS).row(["3des", "may", "Protocol:TLSv1.0 LEVEL(\"must not\")", "G1"]),
    );
    let sheets = SheetsToCheck::new().sheet("ciphers", "G1", "1");
    let user = UserConfiguration::new()
        .set("ciphers", "3des")
        .set("Protocol", "TLSv1.0");
    let output = ComplianceEngine::new(source)
        .run(WorkerKind::SingleGuideline, &sheets, &user)
        .unwrap();
    assert_eq!(output.results.get("ciphers", "3des").unwrap().level, "must not");
}
