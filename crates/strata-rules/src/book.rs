//! Strategy registry.
//!
//! Administrators add or replace strategies here. Once an analysis run has
//! referenced a strategy it is frozen: history must keep meaning what it said.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use tracing::info;

use crate::builtin::builtin_strategies;
use crate::cache::RuleSource;
use crate::error::{Result, RuleError};
use crate::strategy::Strategy;

#[derive(Default)]
pub struct StrategyBook {
    strategies: RwLock<BTreeMap<String, Strategy>>,
    referenced: RwLock<HashSet<String>>,
}

impl StrategyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let book = Self::new();
        {
            let mut map = book.strategies.write().unwrap_or_else(|p| p.into_inner());
            for s in builtin_strategies() {
                map.insert(s.name.clone(), s);
            }
        }
        book
    }

    /// Add or replace a strategy after validating it. Re-registering a
    /// frozen strategy unchanged is a no-op.
    pub fn upsert(&self, strategy: Strategy) -> Result<()> {
        strategy.validate()?;
        if self.is_referenced(&strategy.name)? {
            if self.get(&strategy.name)? == strategy {
                return Ok(());
            }
            return Err(RuleError::Frozen(strategy.name));
        }
        let mut map = self.strategies.write().map_err(|_| RuleError::Poisoned)?;
        info!(strategy = %strategy.name, rules = strategy.rules.len(), "strategy registered");
        map.insert(strategy.name.clone(), strategy);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Strategy> {
        let map = self.strategies.read().map_err(|_| RuleError::Poisoned)?;
        map.get(name)
            .cloned()
            .ok_or_else(|| RuleError::UnknownStrategy(name.to_string()))
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let map = self.strategies.read().map_err(|_| RuleError::Poisoned)?;
        Ok(map.keys().cloned().collect())
    }

    pub fn list(&self) -> Result<Vec<Strategy>> {
        let map = self.strategies.read().map_err(|_| RuleError::Poisoned)?;
        Ok(map.values().cloned().collect())
    }

    /// Freeze a strategy; called when a run starts using it.
    pub fn mark_referenced(&self, name: &str) -> Result<()> {
        if !self
            .strategies
            .read()
            .map_err(|_| RuleError::Poisoned)?
            .contains_key(name)
        {
            return Err(RuleError::UnknownStrategy(name.to_string()));
        }
        self.referenced
            .write()
            .map_err(|_| RuleError::Poisoned)?
            .insert(name.to_string());
        Ok(())
    }

    pub fn is_referenced(&self, name: &str) -> Result<bool> {
        Ok(self
            .referenced
            .read()
            .map_err(|_| RuleError::Poisoned)?
            .contains(name))
    }
}

impl RuleSource for StrategyBook {
    fn load(&self, strategy: &str) -> Result<Strategy> {
        self.get(strategy)
    }
}
