// acctclean-core/tests/cleaning_properties_tests.rs
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use test_log::test; // For integrating with `env_logger` in tests

use acctclean_core::rules::predicates::{AccountClosed, Always, EventTypeIn, FnPredicate, OlderThan, SupersededDuplicate};
use acctclean_core::{
    CleanOptions, Cleaner, CleanerError, ContextSettings, Decision, EventType, FailPoint, LogFormat, MaskStyle,
    Rule, RuleSet, RunOutcome,
};

const MIXED_LOG: &str = "\
2023-05-01T10:00:00Z,acct1,login,ip=10.0.0.1
2020-01-01T00:00:00Z,acct1,login,ip=10.0.0.2
2023-05-02T09:00:00Z,acct2,update,ip=10.0.0.3
this line is not a record
2023-05-03T09:00:00Z,acct2,close
2023-05-04T12:00:00Z,acct3,login,ip=10.0.0.4
2023-05-05T12:00:00Z,acct3,login,ip=10.0.0.5
";

fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()
}

fn options() -> CleanOptions {
    CleanOptions {
        time_reference: Some(reference_time()),
        ..CleanOptions::default()
    }
}

fn retention_rules() -> RuleSet {
    RuleSet::new(vec![
        Rule::new("remove-closed-accounts", AccountClosed, Decision::Remove),
        Rule::new("expire-old-records", OlderThan::days(730).unwrap(), Decision::Remove),
        Rule::new("collapse-duplicates", SupersededDuplicate, Decision::Remove),
        Rule::new(
            "mask-logins",
            EventTypeIn::new([EventType::Login]),
            Decision::Anonymize {
                fields: vec!["ip".to_string()],
                style: MaskStyle::Redact("[REDACTED]".to_string()),
            },
        ),
    ])
}

fn cleaner_with(rules: RuleSet, options: CleanOptions) -> Cleaner {
    Cleaner::new(rules, ContextSettings::default(), LogFormat::default(), options)
}

fn write_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_counts_add_up_to_total_lines() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_log(&dir, "accounts.log", MIXED_LOG);

    let outcome = cleaner_with(retention_rules(), options()).run(&input);
    let RunOutcome::Success { report, backup } = outcome else {
        panic!("expected success, got {:?}", outcome);
    };

    assert_eq!(report.total_lines, 7);
    assert_eq!(report.malformed, 1);
    // acct2 closes, acct1's 2020 login expires, acct3's first login is superseded.
    assert_eq!(report.removed, 4);
    assert_eq!(report.anonymized, 2);
    assert_eq!(report.kept, 0);
    assert!(report.is_balanced());
    assert_eq!(report.rule_hits.get("remove-closed-accounts"), Some(&2));
    assert_eq!(report.rule_hits.get("expire-old-records"), Some(&1));
    assert_eq!(report.rule_hits.get("collapse-duplicates"), Some(&1));
    assert_eq!(report.rule_hits.get("mask-logins"), Some(&2));

    let backup = backup.expect("a changed log is backed up");
    assert_eq!(fs::read_to_string(&backup.path)?, MIXED_LOG);
    assert_eq!(
        fs::read_to_string(&input)?,
        "2023-05-01T10:00:00Z,acct1,login,ip=[REDACTED]\n2023-05-05T12:00:00Z,acct3,login,ip=[REDACTED]\n"
    );
    Ok(())
}

#[test]
fn test_surviving_lines_keep_their_relative_order() -> Result<()> {
    let dir = TempDir::new()?;
    let content = "\
2023-01-05,c,login
2023-01-01,a,logout
2023-01-04,b,login
2023-01-02,a,login
2023-01-03,d,logout
";
    let input = write_log(&dir, "order.log", content);
    let rules = RuleSet::new(vec![Rule::new(
        "drop-logouts",
        EventTypeIn::new([EventType::Logout]),
        Decision::Remove,
    )]);

    assert!(cleaner_with(rules, options()).run(&input).is_success());
    assert_eq!(
        fs::read_to_string(&input)?,
        "2023-01-05,c,login\n2023-01-04,b,login\n2023-01-02,a,login\n"
    );
    Ok(())
}

#[test]
fn test_second_run_is_a_fixed_point() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_log(&dir, "accounts.log", MIXED_LOG);
    let cleaner = cleaner_with(retention_rules(), options());

    assert!(cleaner.run(&input).is_success());
    let after_first = fs::read_to_string(&input)?;
    let entries_after_first = dir_entries(dir.path());

    let second = cleaner.run(&input);
    let RunOutcome::Success { report, backup } = second else {
        panic!("expected success, got {:?}", second);
    };
    assert_eq!(fs::read_to_string(&input)?, after_first);
    assert!(backup.is_none(), "an unchanged log is not rewritten");
    assert_eq!(dir_entries(dir.path()), entries_after_first);
    assert_eq!(report.removed, 0);
    assert_eq!(report.malformed, 0);
    Ok(())
}

#[test]
fn test_fail_points_never_touch_the_original() -> Result<()> {
    for point in [FailPoint::AfterBackup, FailPoint::AfterStage, FailPoint::BeforeRename] {
        let dir = TempDir::new()?;
        let input = write_log(&dir, "accounts.log", MIXED_LOG);
        let before = fs::read(&input)?;

        let outcome = cleaner_with(
            retention_rules(),
            CleanOptions {
                fail_point: Some(point),
                ..options()
            },
        )
        .run(&input);

        let RunOutcome::Aborted { error, report } = outcome else {
            panic!("expected abort at {:?}, got {:?}", point, outcome);
        };
        assert_eq!(fs::read(&input)?, before, "original changed at {:?}", point);
        assert!(report.is_balanced());
        let backup = error.backup_path().expect("backup is reported").clone();
        assert_eq!(fs::read(&backup)?, before);
        assert_eq!(dir_entries(dir.path()).len(), 2, "no staged file left at {:?}", point);
    }
    Ok(())
}

#[test]
fn test_rule_failure_aborts_without_backup() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_log(&dir, "accounts.log", MIXED_LOG);
    let rules = RuleSet::new(vec![Rule::new(
        "broken",
        FnPredicate::new(|r, _| {
            if r.account_id == "acct3" {
                Err("lookup service unavailable".to_string())
            } else {
                Ok(false)
            }
        }),
        Decision::Remove,
    )]);

    let outcome = cleaner_with(rules, options()).run(&input);
    let RunOutcome::Aborted { error, .. } = outcome else {
        panic!("expected abort, got {:?}", outcome);
    };
    assert!(matches!(error, CleanerError::RuleEvaluation { line: 6, .. }));
    assert_eq!(fs::read_to_string(&input)?, MIXED_LOG);
    assert_eq!(dir_entries(dir.path()), vec!["accounts.log".to_string()]);
    Ok(())
}

#[test]
fn test_dry_run_reports_the_same_and_writes_nothing() -> Result<()> {
    let dry_dir = TempDir::new()?;
    let real_dir = TempDir::new()?;
    let dry_input = write_log(&dry_dir, "accounts.log", MIXED_LOG);
    let real_input = write_log(&real_dir, "accounts.log", MIXED_LOG);

    let dry = cleaner_with(
        retention_rules(),
        CleanOptions {
            dry_run: true,
            ..options()
        },
    )
    .run(&dry_input);
    let real = cleaner_with(retention_rules(), options()).run(&real_input);

    let (RunOutcome::Success { report: dry_report, backup: None }, RunOutcome::Success { report: real_report, .. }) =
        (&dry, &real)
    else {
        panic!("unexpected outcomes: {:?} / {:?}", dry, real);
    };
    assert_eq!(fs::read_to_string(&dry_input)?, MIXED_LOG);
    assert_eq!(dir_entries(dry_dir.path()), vec!["accounts.log".to_string()]);

    let mut dry_report = dry_report.clone();
    dry_report.source = real_report.source.clone();
    assert_eq!(&dry_report, real_report);
    Ok(())
}

#[test]
fn test_unreadable_input_is_fatal_io() {
    let dir = TempDir::new().unwrap();
    let outcome = cleaner_with(retention_rules(), options()).run(&dir.path().join("missing.log"));
    assert!(matches!(outcome, RunOutcome::FatalIo { error: CleanerError::Read { .. } }));
    assert!(outcome.report().is_none());
}

#[test]
fn test_discarded_backup_leaves_only_the_log() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_log(&dir, "accounts.log", MIXED_LOG);
    let outcome = cleaner_with(
        retention_rules(),
        CleanOptions {
            retain_backup: false,
            ..options()
        },
    )
    .run(&input);

    let RunOutcome::Success { backup: Some(backup), .. } = outcome else {
        panic!("expected a committed run, got {:?}", outcome);
    };
    assert!(!backup.retained);
    assert_eq!(dir_entries(dir.path()), vec!["accounts.log".to_string()]);
    Ok(())
}

#[test]
fn test_tab_delimited_validation_log() -> Result<()> {
    let dir = TempDir::new()?;
    let content = "2023-05-01 10:00:00\tacct1\tValidationOk\tNationalCode: 0012345678\tShebaNumber: IR820540102680020817909002\r\n\
2023-05-02 11:00:00\tacct2\tValidationError\tNationalCode: 0098765432\treason=checksum\r\n";
    let input = write_log(&dir, "ValidationOk.txt", content);
    let rules = RuleSet::new(vec![Rule::new(
        "mask-identity-numbers",
        EventTypeIn::new([EventType::ValidationOk, EventType::ValidationError]),
        Decision::Anonymize {
            fields: vec!["NationalCode".to_string(), "ShebaNumber".to_string()],
            style: MaskStyle::Redact("[REDACTED]".to_string()),
        },
    )]);
    let format = LogFormat {
        delimiter: '\t',
        strip_field_labels: true,
    };

    let outcome = Cleaner::new(rules, ContextSettings::default(), format, options()).run(&input);
    let RunOutcome::Success { report, .. } = outcome else {
        panic!("expected success, got {:?}", outcome);
    };
    assert_eq!(report.anonymized, 2);
    assert_eq!(report.malformed, 0);
    assert_eq!(
        fs::read_to_string(&input)?,
        "2023-05-01 10:00:00\tacct1\tValidationOk\tNationalCode: [REDACTED]\tShebaNumber: [REDACTED]\r\n\
2023-05-02 11:00:00\tacct2\tValidationError\tNationalCode: [REDACTED]\treason=checksum\r\n"
    );
    Ok(())
}

#[test]
fn test_report_serializes_to_json() -> Result<()> {
    let cleaner = cleaner_with(retention_rules(), options());
    let (report, _) = cleaner
        .clean_content(Path::new("accounts.log"), MIXED_LOG.as_bytes())
        .map_err(|(e, _)| e)?;
    let json = serde_json::to_value(&report)?;
    assert_eq!(json["total_lines"], 7);
    assert_eq!(json["malformed_records"][0]["line_number"], 4);
    assert_eq!(json["rule_hits"]["mask-logins"], 2);
    Ok(())
}

#[test]
fn test_undecodable_line_is_malformed_not_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("accounts.log");
    fs::write(
        &input,
        &b"2023-05-01T10:00:00Z,acct1,login\n2023-05-02T10:00:00Z,acct\xff2,login\n2023-05-03T10:00:00Z,acct3,update\n"[..],
    )?;
    let no_rules = || RuleSet::new(vec![]);

    let outcome = cleaner_with(no_rules(), options()).run(&input);
    let RunOutcome::Success { report, .. } = outcome else {
        panic!("expected success, got {:?}", outcome);
    };
    assert_eq!(report.total_lines, 3);
    assert_eq!(report.kept, 2);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.malformed_records[0].line_number, 2);
    assert_eq!(report.malformed_records[0].reason, "invalid UTF-8");
    assert_eq!(
        fs::read_to_string(&input)?,
        "2023-05-01T10:00:00Z,acct1,login\n2023-05-03T10:00:00Z,acct3,update\n"
    );

    // Retained malformed lines are written back byte for byte.
    let original = b"2023-05-01T10:00:00Z,acct1,login\n\xfe\xff junk\r\n2023-05-03T10:00:00Z,acct3,logout\n";
    fs::write(&input, &original[..])?;
    let rules = RuleSet::new(vec![Rule::new(
        "drop-logouts",
        EventTypeIn::new([EventType::Logout]),
        Decision::Remove,
    )]);
    let outcome = cleaner_with(
        rules,
        CleanOptions {
            retain_malformed: true,
            ..options()
        },
    )
    .run(&input);
    assert!(outcome.is_success(), "got {:?}", outcome);
    assert_eq!(fs::read(&input)?, b"2023-05-01T10:00:00Z,acct1,login\n\xfe\xff junk\r\n".to_vec());
    Ok(())
}

#[test]
fn test_mixed_line_endings_are_preserved_per_line() -> Result<()> {
    let dir = TempDir::new()?;
    let content = "2023-05-01T10:00:00Z,acct1,login\r\n2020-01-01T00:00:00Z,acct1,login\n2023-05-02T10:00:00Z,acct2,update\n2023-05-03T10:00:00Z,acct3,update\r\n";
    let input = write_log(&dir, "accounts.log", content);
    let rules = RuleSet::new(vec![Rule::new(
        "expire-old-records",
        OlderThan::days(730).unwrap(),
        Decision::Remove,
    )]);

    assert!(cleaner_with(rules, options()).run(&input).is_success());
    assert_eq!(
        fs::read_to_string(&input)?,
        "2023-05-01T10:00:00Z,acct1,login\r\n2023-05-02T10:00:00Z,acct2,update\n2023-05-03T10:00:00Z,acct3,update\r\n"
    );
    Ok(())
}

#[test]
fn test_split_json_status_is_masked_whole() -> Result<()> {
    let dir = TempDir::new()?;
    let content = "2023-05-01 10:00:00\tacct1\tValidationError\tStatus: {\"nc\":\"0012345678\",\t\"sheba\":\"IR82054\"}\n";
    let input = write_log(&dir, "ValidationError.txt", content);
    let rules = || {
        RuleSet::new(vec![Rule::new(
            "mask-status",
            Always,
            Decision::Anonymize {
                fields: vec!["Status".to_string()],
                style: MaskStyle::Redact("[REDACTED]".to_string()),
            },
        )])
    };
    let format = LogFormat {
        delimiter: '\t',
        strip_field_labels: true,
    };

    let outcome = Cleaner::new(rules(), ContextSettings::default(), format.clone(), options()).run(&input);
    assert!(outcome.is_success(), "got {:?}", outcome);
    let cleaned = fs::read_to_string(&input)?;
    assert_eq!(cleaned, "2023-05-01 10:00:00\tacct1\tValidationError\tStatus: [REDACTED]\n");
    assert!(!cleaned.contains("IR82054"));

    let again = Cleaner::new(rules(), ContextSettings::default(), format, options()).run(&input);
    assert!(matches!(again, RunOutcome::Success { backup: None, .. }));
    Ok(())
}

#[test]
fn test_padded_redaction_reaches_a_fixed_point() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_log(&dir, "accounts.log", "2023-05-01T10:00:00Z,acct1,login,ip=10.0.0.1\n");
    let rules = || {
        RuleSet::new(vec![Rule::new(
            "mask-ip",
            EventTypeIn::new([EventType::Login]),
            Decision::Anonymize {
                fields: vec!["ip".to_string()],
                style: MaskStyle::Redact(" X ".to_string()),
            },
        )])
    };

    assert!(cleaner_with(rules(), options()).run(&input).is_success());
    let after_first = fs::read_to_string(&input)?;
    assert_eq!(after_first, "2023-05-01T10:00:00Z,acct1,login,ip=X\n");

    let second = cleaner_with(rules(), options()).run(&input);
    assert!(matches!(second, RunOutcome::Success { backup: None, .. }));
    assert_eq!(fs::read_to_string(&input)?, after_first);
    Ok(())
}
