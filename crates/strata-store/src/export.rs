//! CSV export of recommendation listings.

use std::io::Write;

use serde::Serialize;

use strata_core::model::Recommendation;

use crate::error::Result;

#[derive(Serialize)]
struct Row<'a> {
    id: u64,
    run_id: u64,
    strategy: &'a str,
    owner: &'a str,
    object: &'a str,
    object_type: &'a str,
    partition: &'a str,
    column: &'a str,
    size_bytes: u64,
    current_encoding: &'a str,
    encoding: &'a str,
    best_ratio: f64,
    hotness: f64,
    access: f64,
    write_ratio: f64,
    projected_size_bytes: u64,
    projected_savings_bytes: u64,
    savings_pct: f64,
    priority: String,
    rationale: &'a str,
}

/// Write one header line and one row per recommendation, in the given order.
pub fn write_recommendations_csv<W: Write>(out: W, recs: &[Recommendation]) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    for r in recs {
        w.serialize(Row {
            id: r.id.get(),
            run_id: r.run_id.get(),
            strategy: &r.strategy,
            owner: &r.object.owner,
            object: &r.object.name,
            object_type: r.object.object_type.as_str(),
            partition: r.object.partition.as_deref().unwrap_or(""),
            column: r.object.column.as_deref().unwrap_or(""),
            size_bytes: r.size_bytes,
            current_encoding: r.current_encoding.as_str(),
            encoding: r.encoding.as_str(),
            best_ratio: r.best_ratio,
            hotness: r.hotness,
            access: r.access,
            write_ratio: r.write_ratio,
            projected_size_bytes: r.projected_size_bytes,
            projected_savings_bytes: r.projected_savings_bytes,
            savings_pct: r.savings_pct,
            priority: format!("{:?}", r.priority()).to_ascii_uppercase(),
            rationale: &r.rationale,
        })?;
    }
    w.flush()?;
    Ok(())
}
