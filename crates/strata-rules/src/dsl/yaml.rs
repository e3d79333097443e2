//! YAML strategy files.
//!
//! Example:
//! ```yaml
//! config:
//!   sample_rows: 200000
//!   analysis_parallelism: 8
//! strategies:
//!   - name: reporting
//!     description: archive closed periods
//!     rules:
//!       - { object_type: table, priority: 10, encoding: ARCHIVE_HIGH,
//!           hotness: { max: 10 }, access: { max: 20 }, label: closed period }
//!       - { object_type: table, priority: 20, encoding: QUERY_LOW,
//!           write_ratio: { max: 0.2 } }
//!       - { object_type: index, priority: 10, encoding: INDEX_ADVANCED_LOW }
//! ```

use serde::{Deserialize, Serialize};

use strata_core::config::AdvisorConfig;

use crate::error::{Result, RuleError};
use crate::strategy::Strategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyFile {
    #[serde(default)]
    pub config: Option<StrategyFileConfig>,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

/// Advisor settings a strategy file may override. They sit between the
/// environment and CLI flags in precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyFileConfig {
    pub analysis_parallelism: Option<usize>,
    pub execution_parallelism: Option<usize>,
    pub object_timeout_ms: Option<u64>,
    pub statement_timeout_ms: Option<u64>,
    pub sample_rows: Option<u64>,
    pub min_object_size_bytes: Option<u64>,
    pub dml_window_days: Option<u64>,
    pub space_headroom_pct: Option<u64>,
}

impl StrategyFileConfig {
    pub fn apply_to(&self, cfg: &mut AdvisorConfig) {
        if let Some(v) = self.analysis_parallelism {
            cfg.analysis_parallelism = v;
        }
        if let Some(v) = self.execution_parallelism {
            cfg.execution_parallelism = v;
        }
        if let Some(v) = self.object_timeout_ms {
            cfg.object_timeout_ms = v;
        }
        if let Some(v) = self.statement_timeout_ms {
            cfg.statement_timeout_ms = v;
        }
        if let Some(v) = self.sample_rows {
            cfg.sample_rows = v;
        }
        if let Some(v) = self.min_object_size_bytes {
            cfg.min_object_size_bytes = v;
        }
        if let Some(v) = self.dml_window_days {
            cfg.dml_window_days = v;
        }
        if let Some(v) = self.space_headroom_pct {
            cfg.space_headroom_pct = v;
        }
    }
}

/// Parse and validate a strategy file. Every strategy in it must validate.
pub fn parse_strategy_file(yaml_src: &str) -> Result<StrategyFile> {
    let doc: StrategyFile = serde_yaml::from_str(yaml_src)?;
    let mut names = std::collections::HashSet::new();
    for s in &doc.strategies {
        s.validate()?;
        if !names.insert(s.name.as_str()) {
            return Err(RuleError::invalid(&s.name, "defined twice in one file"));
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::types::{Encoding, ObjectType};

    const DOC: &str = r#"
config:
  sample_rows: 200000
strategies:
  - name: reporting
    description: archive closed periods
    rules:
      - { object_type: table, priority: 10, encoding: ARCHIVE_HIGH,
          hotness: { max: 10 }, access: { max: 20 }, label: closed period }
      - { object_type: table, priority: 20, encoding: QUERY_LOW,
          write_ratio: { max: 0.2 } }
      - { object_type: index, priority: 10, encoding: INDEX_ADVANCED_LOW }
"#;

    #[test]
    fn parses_rules_and_config() {
        let f = parse_strategy_file(DOC).unwrap();
        assert_eq!(f.strategies.len(), 1);
        let s = &f.strategies[0];
        assert_eq!(s.rules[0].encoding, Encoding::ArchiveHigh);
        assert_eq!(s.rules[0].hotness.max, Some(10.0));
        assert_eq!(s.rules[2].object_type, ObjectType::Index);

        let mut cfg = AdvisorConfig::default();
        f.config.unwrap().apply_to(&mut cfg);
        assert_eq!(cfg.sample_rows, 200_000);
        assert_eq!(cfg.analysis_parallelism, 4);
    }

    #[test]
    fn invalid_rule_rejected_at_load() {
        let doc = r#"
strategies:
  - name: broken
    rules:
      - { object_type: table, priority: 1, encoding: OLTP, hotness: { min: 80, max: 20 } }
"#;
        assert!(matches!(
            parse_strategy_file(doc),
            Err(RuleError::Invalid { .. })
        ));
    }

    #[test]
    fn unknown_encoding_is_parse_error() {
        let doc = r#"
strategies:
  - name: s
    rules:
      - { object_type: table, priority: 1, encoding: ZIP }
"#;
        assert!(matches!(parse_strategy_file(doc), Err(RuleError::Parse(_))));
    }
}
