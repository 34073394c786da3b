use cih_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigCommand, UnusedKeyPolicy};

const YAML: &str = r#"
sources:
  crm_customers: crm.csv
  ecommerce_users: shop.csv
master:
  path: master.csv
  reuse_prior: false
reconcile:
  email_policy: exact
  emial_policy: normalized
unused_section:
  foo: 1
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report = report_unused_keys(ConfigCommand::Compare, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/master/path".to_string(),
            "/master/reuse_prior".to_string(),
            "/reconcile/emial_policy".to_string(),
            "/unused_section/foo".to_string(),
        ]
    );
    assert_eq!(report.command, "compare");
}

#[test]
fn reconcile_consumes_whole_reconcile_section_but_not_typos_elsewhere() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigCommand::Reconcile, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/unused_section/foo".to_string()]);
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigCommand::Validate, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "got: {msg}");
    assert!(msg.contains("command=validate"));
}

#[test]
fn clean_config_passes_fail_mode() {
    let loaded = load_layered_yaml_from_strings(&["contracts:\n  dir: c\n"]).unwrap();
    let report =
        report_unused_keys(ConfigCommand::Validate, &loaded.config_json, UnusedKeyPolicy::Fail)
            .unwrap();
    assert!(report.is_clean());
}
