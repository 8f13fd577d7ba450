use std::io::Write;

use serde_json::json;
use synth_domain::{Config, ConfigError, Consensus, Input, Output, StepKind};

const FULL: &str = r#"
input:
  type: csv
  properties:
    path: data/questions.csv
    target_column: content
pipeline:
  - type: split
    method: chunk
    name: chunks
    parameters:
      size: 120
  - type: generation
    method: llm
    parameters:
      template: "Write a question about: {chunk}"
  - type: ablation
    method: llm-judge-binary
    parameters:
      consensus: majority
      criteria:
        - Is the question in english?
        - Is the question self-contained?
output:
  type: csv
  properties:
    path: out.csv
    separator: ";"
"#;

#[test]
fn test_full_config_parses_with_defaults() {
    let config = Config::from_yaml_str(FULL).expect("valid config");
    assert!(matches!(config.input, Input::Csv(ref p) if p.separator == ","));
    assert!(matches!(config.output, Output::Csv(ref p) if p.separator == ";" && p.column == "value"));
    assert_eq!(config.pipeline.len(), 3);
    assert_eq!(config.pipeline[0].name.as_deref(), Some("chunks"));
    match &config.pipeline[2].kind {
        StepKind::LlmJudgeBinary(p) => {
            assert_eq!(p.consensus, Consensus::Majority);
            assert_eq!(p.criteria.len(), 2);
            assert_eq!(p.model, "gpt-4o-mini");
        }
        other => panic!("unexpected step {other:?}"),
    }
}

#[test]
fn test_spec_snapshot_is_stable_across_spelling() {
    // same configuration, defaults written out and keys reordered
    let explicit = FULL.replace("      template:", "      provider: openai\n      model: gpt-4o-mini\n      template:");
    let a = Config::from_yaml_str(FULL).unwrap().to_spec().unwrap();
    let b = Config::from_yaml_str(&explicit).unwrap().to_spec().unwrap();
    assert!(a.matches_snapshot(b.config()));
    assert_eq!(a.config_hash(), b.config_hash());

    let changed = Config::from_yaml_str(&FULL.replace("size: 120", "size: 121")).unwrap().to_spec().unwrap();
    assert!(!a.matches_snapshot(changed.config()));
}

#[test]
fn test_to_spec_descriptors() {
    let spec = Config::from_yaml_str(FULL).unwrap().to_spec().unwrap();
    let steps = spec.steps();
    assert_eq!(steps[0].step_type, "split");
    assert_eq!(steps[0].parameters, json!({"size": 120}));
    assert_eq!(steps[1].parameters["provider"], "openai");
    assert_eq!(steps[2].method, "llm-judge-binary");
    assert_eq!(spec.config()["pipeline"][0]["type"], "split");
}

#[test]
fn test_invalid_configs_are_errors_not_exits() {
    let bad_method = FULL.replace("method: chunk", "method: sentences");
    assert!(matches!(Config::from_yaml_str(&bad_method), Err(ConfigError::Yaml(_))));

    let bad_sep = FULL.replace("separator: \";\"", "separator: \";;\"");
    assert!(matches!(Config::from_yaml_str(&bad_sep), Err(ConfigError::Validation(_))));

    assert!(matches!(Config::load("/definitely/not/here.yaml"), Err(ConfigError::Io { .. })));
}

#[test]
fn test_load_from_file_and_inline_input() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file,
             "input:\n  type: inline\n  properties:\n    values: [a, b]\npipeline: []\noutput:\n  type: csv\n  properties:\n    path: o.csv").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert!(matches!(config.input, Input::Inline(ref p) if p.values == ["a", "b"]));
    assert!(config.to_spec().unwrap().is_empty());
}
