//! Strategy rule engine.
//!
//! Evaluation order for one object:
//! 1. object types without templates decide `NONE`
//! 2. a best ratio at or below 1.0 decides `NONE` (nothing to save)
//! 3. the first rule (lowest priority) whose bounds all hold and whose
//!    encoding was estimated above 1.0 wins; matching rules that point at an
//!    untested or unprofitable encoding are passed over and named in the
//!    rationale
//! 4. otherwise the fixed fallback table on the best ratio, narrowed to the
//!    best tested encoding when the table's pick was never estimated
//!
//! The same inputs always produce the same encoding and rationale text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_core::types::{Encoding, ObjectType};

use crate::cache::{LoadedStrategy, RuleCache};
use crate::error::Result;
use crate::rationale;

/// Ratio at or above which the fallback table picks a moderate encoding.
pub const MODERATE_RATIO: f64 = 2.0;
/// Ratio at or above which the fallback table picks a light encoding.
pub const LIGHT_RATIO: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct EvalInput {
    pub object_type: ObjectType,
    pub size_bytes: u64,
    pub hotness: f64,
    pub access: f64,
    pub write_ratio: f64,
    /// Best tested compression ratio for the object.
    pub ratio: f64,
    /// Ratio per candidate the estimator could test. Anything absent was
    /// untestable.
    pub estimates: Vec<(Encoding, f64)>,
}

impl EvalInput {
    pub fn estimated(&self, encoding: Encoding) -> Option<f64> {
        self.estimates
            .iter()
            .find(|(e, _)| *e == encoding)
            .map(|&(_, r)| r)
    }

    /// `NONE`, or an encoding estimated to actually shrink the object.
    pub fn is_viable(&self, encoding: Encoding) -> bool {
        encoding.is_none() || self.estimated(encoding).map_or(false, |r| r > 1.0)
    }

    /// Highest estimated encoding above 1.0; ties go to the lighter one.
    fn best_viable(&self) -> Option<Encoding> {
        self.estimates
            .iter()
            .filter(|(e, r)| !e.is_none() && *r > 1.0)
            .max_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| b.0.cpu_overhead_rank().cmp(&a.0.cpu_overhead_rank()))
            })
            .map(|&(e, _)| e)
    }
}

/// Why the engine chose what it chose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionBasis {
    Rule { priority: u32, label: Option<String> },
    DefaultTable,
    NotWorthwhile,
    Unsupported,
}

impl DecisionBasis {
    pub fn matched_rule(&self) -> Option<u32> {
        match self {
            DecisionBasis::Rule { priority, .. } => Some(*priority),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub encoding: Encoding,
    pub basis: DecisionBasis,
    /// Matching rules passed over because their encoding shows no savings.
    pub passed_over: Vec<(u32, Encoding)>,
    pub rationale: String,
}

pub struct RuleEngine {
    cache: Arc<RuleCache>,
}

impl RuleEngine {
    pub fn new(cache: Arc<RuleCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }

    /// `evaluate(strategy, objectType, hotness, access, writeRatio, ratio)`.
    pub fn evaluate(&self, strategy: &str, input: &EvalInput) -> Result<Decision> {
        let loaded = self.cache.get(strategy)?;
        Ok(evaluate_with(&loaded, input))
    }
}

/// Pure evaluation against an already-loaded strategy.
pub fn evaluate_with(strategy: &LoadedStrategy, input: &EvalInput) -> Decision {
    let mut passed_over = Vec::new();
    let (encoding, basis) = decide(strategy, input, &mut passed_over);
    let rationale = rationale::render(input, encoding, &basis, &passed_over);
    debug!(
        strategy = %strategy.name,
        object_type = %input.object_type,
        encoding = %encoding,
        rule = ?basis.matched_rule(),
        "rule evaluated"
    );
    Decision {
        encoding,
        basis,
        passed_over,
        rationale,
    }
}

fn decide(
    strategy: &LoadedStrategy,
    input: &EvalInput,
    passed_over: &mut Vec<(u32, Encoding)>,
) -> (Encoding, DecisionBasis) {
    if let ObjectType::Other(_) = input.object_type {
        return (Encoding::None, DecisionBasis::Unsupported);
    }
    if input.ratio.is_nan() || input.ratio <= 1.0 {
        return (Encoding::None, DecisionBasis::NotWorthwhile);
    }
    for rule in strategy.rules_for(&input.object_type) {
        if !rule.matches(input.hotness, input.access, input.write_ratio) {
            continue;
        }
        if !input.is_viable(rule.encoding) {
            passed_over.push((rule.priority, rule.encoding));
            continue;
        }
        return (
            rule.encoding,
            DecisionBasis::Rule {
                priority: rule.priority,
                label: rule.label.clone(),
            },
        );
    }
    let table = default_encoding(&input.object_type, input.ratio);
    let encoding = if input.is_viable(table) {
        table
    } else {
        input.best_viable().unwrap_or(Encoding::None)
    };
    (encoding, DecisionBasis::DefaultTable)
}

/// Fallback table used when no rule matches.
pub fn default_encoding(object_type: &ObjectType, ratio: f64) -> Encoding {
    let moderate = ratio >= MODERATE_RATIO;
    let light = ratio >= LIGHT_RATIO;
    match object_type {
        ObjectType::Table if moderate => Encoding::QueryLow,
        ObjectType::Table if light => Encoding::Oltp,
        ObjectType::Index if moderate => Encoding::IndexAdvancedHigh,
        ObjectType::Index if light => Encoding::IndexAdvancedLow,
        ObjectType::Lob if moderate => Encoding::LobMedium,
        ObjectType::Lob if light => Encoding::LobLow,
        _ => Encoding::None,
    }
}
