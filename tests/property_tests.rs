use proptest::prelude::*;
use std::path::Path;
use vigil::EngineKind;
use vigil::engine::Change;
use vigil::engine::dispatch::{AuditLine, target_of};
use vigil::tracking::artifacts::{SUFFIX_LEN, artifact_name, random_suffix, suffix_of};

fn engine_kind() -> impl Strategy<Value = EngineKind> {
    prop_oneof![Just(EngineKind::Monitoring), Just(EngineKind::Backup)]
}

proptest! {
    #[test]
    fn test_suffix_survives_any_base_name(
        base in "[a-zA-Z0-9._ -]{1,24}",
        kind in engine_kind(),
    ) {
        // Invariant: the suffix is recoverable even when the base name
        // itself contains underscores or dots
        prop_assume!(base != "." && base != "..");
        let suffix = random_suffix();
        let name = artifact_name(kind, &Path::new("/data").join(&base), &suffix);
        prop_assert_eq!(suffix_of(&name), suffix.as_str());
    }

    #[test]
    fn test_audit_line_fields_survive_formatting(
        target in "[a-zA-Z0-9._-]{1,24}",
        modified in any::<bool>(),
        users in prop::collection::vec("[a-z][a-z0-9]{0,7}", 0..4),
    ) {
        let line = AuditLine {
            target: target.clone(),
            event: if modified { Change::Modified } else { Change::Accessed },
            time: "2024-01-01 10:00:00".to_string(),
            users,
        };
        let text = line.to_string();

        prop_assert_eq!(target_of(&text), Some(target.as_str()));
        prop_assert_eq!(AuditLine::parse(&text), Some(line));
    }

    #[test]
    fn test_parse_never_panics(line in ".*") {
        let _ = AuditLine::parse(&line);
        let _ = target_of(&line);
    }
}

#[test]
fn test_random_suffix_shape() {
    let suffix = random_suffix();
    assert_eq!(suffix.len(), SUFFIX_LEN);
    assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
}
