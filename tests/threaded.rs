use std::sync::Arc;
use std::thread;

use comply::source::{MemoryRuleSource, RuleTable};
use comply::{ComplianceEngine, ResultStore, SheetsToCheck, UserConfiguration, WorkerKind};

const COLUMNS: [&str; 4] = ["name", "level", "condition", "guidelineName"];

fn engine() -> ComplianceEngine<MemoryRuleSource> {
    ComplianceEngine::new(
        MemoryRuleSource::new()
            .with_table(
                "Protocol",
                "G1",
                "1",
                RuleTable::new(COLUMNS)
                    .row(["TLSv1.3", "must", "", "G1"])
                    .row(["TLSv1.0", "must not", "", "G1"]),
            )
            .with_table(
                "CipherSuite",
                "G1",
                "1",
                RuleTable::new(COLUMNS)
                    .row(["aes128", "recommended", "THIS OR chacha20", "G1"])
                    .row(["rc4", "must not", "", "G1"]),
            )
            .with_table(
                "Hash",
                "G1",
                "1",
                RuleTable::new(COLUMNS).row(["sha256", "must", "", "G1"]),
            ),
    )
}

fn user() -> UserConfiguration {
    UserConfiguration::new()
        .set("Protocol", ["TLSv1.2", "TLSv1.3"])
        .set("CipherSuite", "chacha20:rc4")
        .set("Hash", "sha256")
}

#[test]
fn isolated_stores_merge_to_the_sequential_result() {
    let engine = Arc::new(engine());
    let user = Arc::new(user());

    let mut handles = vec![];
    for sheet in ["Protocol", "CipherSuite", "Hash"] {
        let engine = Arc::clone(&engine);
        let user = Arc::clone(&user);
        handles.push(thread::spawn(move || {
            let sheets = SheetsToCheck::new().sheet(sheet, "G1", "1");
            engine
                .run(WorkerKind::SingleGuideline, &sheets, &user)
                .unwrap()
                .results
        }));
    }

    let mut merged = ResultStore::new();
    for handle in handles {
        merged.merge(handle.join().unwrap());
    }

    let all = SheetsToCheck::new()
        .sheet("Protocol", "G1", "1")
        .sheet("CipherSuite", "G1", "1")
        .sheet("Hash", "G1", "1");
    let sequential = engine
        .run(WorkerKind::SingleGuideline, &all, &user)
        .unwrap()
        .results;
    assert_eq!(merged, sequential);
    assert_eq!(merged.len(), 5);
}

#[test]
fn concurrent_runs_do_not_share_state() {
    let engine = Arc::new(engine());
    let sheets = Arc::new(SheetsToCheck::new().sheet("CipherSuite", "G1", "1"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let sheets = Arc::clone(&sheets);
            thread::spawn(move || {
                let user = if i % 2 == 0 {
                    UserConfiguration::new().set("CipherSuite", "aes128")
                } else {
                    UserConfiguration::new().set("CipherSuite", "rc4")
                };
                (i, engine.run(WorkerKind::SingleGuideline, &sheets, &user).unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (i, output) = handle.join().unwrap();
        let aes = output.results.get("CipherSuite", "aes128").unwrap();
        assert_eq!(aes.enabled, i % 2 == 0);
        let expected_note = if i % 2 == 0 {
            ""
        } else {
            "\nNOTE: aes128 OR chacha20 is needed"
        };
        assert_eq!(aes.notes, expected_note);
    }
}
