//! Strategies and their rules.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use strata_core::hash::{hash_serde, Hash256};
use strata_core::types::{Encoding, ObjectType};

use crate::error::{Result, RuleError};

/// Inclusive bound pair; a missing side is unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ScoreRange {
    pub const OPEN: ScoreRange = ScoreRange {
        min: None,
        max: None,
    };

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min.map_or(true, |m| v >= m) && self.max.map_or(true, |m| v <= m)
    }

    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    fn check(&self, what: &str, lo: f64, hi: f64) -> std::result::Result<(), String> {
        for (side, v) in [("min", self.min), ("max", self.max)] {
            if let Some(v) = v {
                if !v.is_finite() || v < lo || v > hi {
                    return Err(format!("{what}.{side} = {v} outside {lo}..={hi}"));
                }
            }
        }
        if let (Some(a), Some(b)) = (self.min, self.max) {
            if a > b {
                return Err(format!("{what}.min ({a}) > {what}.max ({b})"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub object_type: ObjectType,
    /// Lower evaluates first.
    pub priority: u32,
    #[serde(default, skip_serializing_if = "ScoreRange::is_open")]
    pub hotness: ScoreRange,
    #[serde(default, skip_serializing_if = "ScoreRange::is_open")]
    pub access: ScoreRange,
    #[serde(default, skip_serializing_if = "ScoreRange::is_open")]
    pub write_ratio: ScoreRange,
    pub encoding: Encoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Rule {
    pub fn new(object_type: ObjectType, priority: u32, encoding: Encoding) -> Self {
        Self {
            object_type,
            priority,
            hotness: ScoreRange::OPEN,
            access: ScoreRange::OPEN,
            write_ratio: ScoreRange::OPEN,
            encoding,
            label: None,
        }
    }

    pub fn hotness(mut self, r: ScoreRange) -> Self {
        self.hotness = r;
        self
    }

    pub fn access(mut self, r: ScoreRange) -> Self {
        self.access = r;
        self
    }

    pub fn write_ratio(mut self, r: ScoreRange) -> Self {
        self.write_ratio = r;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn matches(&self, hotness: f64, access: f64, write_ratio: f64) -> bool {
        self.hotness.contains(hotness)
            && self.access.contains(access)
            && self.write_ratio.contains(write_ratio)
    }
}

/// A named policy: an ordered set of rules per object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rules: Vec<Rule>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, description: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rules,
        }
    }

    /// Reject anything that could make evaluation ambiguous or meaningless.
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(RuleError::invalid(name, "strategy name is empty"));
        }
        let mut seen: HashSet<(&ObjectType, u32)> = HashSet::new();
        for rule in &self.rules {
            if let ObjectType::Other(t) = &rule.object_type {
                return Err(RuleError::invalid(
                    name,
                    format!("rules cannot target object type '{t}'"),
                ));
            }
            let at = format!("{} rule p{}", rule.object_type, rule.priority);
            rule.hotness
                .check("hotness", 0.0, 100.0)
                .and_then(|_| rule.access.check("access", 0.0, 100.0))
                .and_then(|_| rule.write_ratio.check("write_ratio", 0.0, 1.0))
                .map_err(|d| RuleError::invalid(name, format!("{at}: {d}")))?;
            if !rule.encoding.applies_to(&rule.object_type) {
                return Err(RuleError::invalid(
                    name,
                    format!("{at}: encoding {} does not apply to {}", rule.encoding, rule.object_type),
                ));
            }
            if !seen.insert((&rule.object_type, rule.priority)) {
                return Err(RuleError::invalid(
                    name,
                    format!("{at}: duplicate priority"),
                ));
            }
        }
        Ok(())
    }

    /// Rules grouped by object type, each group sorted by priority.
    pub fn ordered_rules(&self) -> BTreeMap<ObjectType, Vec<Rule>> {
        let mut out: BTreeMap<ObjectType, Vec<Rule>> = BTreeMap::new();
        for rule in &self.rules {
            out.entry(rule.object_type.clone()).or_default().push(rule.clone());
        }
        for rules in out.values_mut() {
            rules.sort_by_key(|r| r.priority);
        }
        out
    }

    /// Stable digest recorded on every run that uses this strategy.
    pub fn digest(&self) -> Result<Hash256> {
        Ok(hash_serde(self)?)
    }
}
