#![forbid(unsafe_code)]
//! strata-rules: from strategy definitions (YAML or built-in) to a decision.
//!
//! Design:
//! - `strategy`: the `Strategy`/`Rule` model, validated at creation so bad
//!   ranges never reach evaluation
//! - `book`: an administrator-editable registry that freezes strategies once a
//!   run references them
//! - `cache`: load-once, read-many rule cache, injected rather than global
//! - `engine`: first-match-wins walk with a fixed fallback table
//! - `rationale`: reproducible audit text
//! - `dsl::yaml`: strategy files

pub mod book;
pub mod builtin;
pub mod cache;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod rationale;
pub mod strategy;

pub use book::StrategyBook;
pub use cache::{LoadedStrategy, RuleCache, RuleSource};
pub use dsl::yaml::{parse_strategy_file, StrategyFile, StrategyFileConfig};
pub use engine::{Decision, DecisionBasis, EvalInput, RuleEngine};
pub use error::{Result, RuleError};
pub use strategy::{Rule, ScoreRange, Strategy};
