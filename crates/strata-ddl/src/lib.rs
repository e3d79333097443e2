#![forbid(unsafe_code)]
//! strata-ddl: from a recommendation to the statement that applies it.
//!
//! Design:
//! - `target`: one variant per object kind the engine accepts changes for
//! - `template`: pure string templates, one per variant
//! - `generate`: dispatch + digest; never touches the database
//!
//! Generation is idempotent: the same recommendation and options always
//! produce byte-identical text (and so the same digest).

pub mod target;
pub mod template;

use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_core::hash::hash_str;
use strata_core::model::Recommendation;
use strata_core::port::Statement;

pub use target::DdlTarget;

/// Caller knobs that change the statement text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlOptions {
    /// Keep the object available for DML while it is rebuilt.
    pub online: bool,
    /// Degree of parallelism for the rebuild; `None` leaves it to the engine.
    pub parallel_degree: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlStatement {
    pub statement: Statement,
    /// blake3 hex digest of `statement.text`.
    pub digest: String,
    /// True when no template exists and `text` is only a comment.
    pub placeholder: bool,
}

impl DdlStatement {
    pub fn text(&self) -> &str {
        &self.statement.text
    }
}

/// Build the statement for a recommendation's chosen encoding.
pub fn generate(rec: &Recommendation, opts: &DdlOptions) -> DdlStatement {
    let target = DdlTarget::of(&rec.object);
    let (text, placeholder) = match target.render(rec.encoding, opts) {
        Some(text) => (text, false),
        None => (template::placeholder(&rec.object, rec.encoding), true),
    };
    let digest = hash_str(&text).to_hex();
    debug!(recommendation = %rec.id, object = %rec.object, placeholder, "ddl generated");
    DdlStatement {
        statement: Statement {
            text,
            target: rec.object.clone(),
            encoding: rec.encoding,
        },
        digest,
        placeholder,
    }
}
