//! Audit text for a decision. Built only from the decision inputs so the same
//! inputs always render the same string.

use strata_core::types::Encoding;
use strata_score::{access_label, hotness_label};

use crate::engine::{DecisionBasis, EvalInput};

/// Binary-unit size, one decimal.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut v = bytes as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{v:.1} {}", UNITS[unit])
    }
}

pub fn render(
    input: &EvalInput,
    encoding: Encoding,
    basis: &DecisionBasis,
    passed_over: &[(u32, Encoding)],
) -> String {
    let why = match basis {
        DecisionBasis::Rule {
            priority,
            label: Some(label),
        } => format!("rule p{priority} ({label})"),
        DecisionBasis::Rule { priority, label: None } => format!("rule p{priority}"),
        DecisionBasis::DefaultTable => "no rule matched, default table".to_string(),
        DecisionBasis::NotWorthwhile => "no projected savings".to_string(),
        DecisionBasis::Unsupported => "object type not supported".to_string(),
    };
    let skipped = if passed_over.is_empty() {
        String::new()
    } else {
        let list: Vec<String> = passed_over.iter().map(|(p, e)| format!("p{p} {e}")).collect();
        format!("passed over {} (no estimated savings); ", list.join(", "))
    };
    format!(
        "{} {}; {} (hotness {:.1}); {} (access {:.1}); write ratio {:.2}; best ratio {:.2}x; {}{} -> {}",
        human_size(input.size_bytes),
        input.object_type,
        hotness_label(input.hotness),
        input.hotness,
        access_label(input.access),
        input.access,
        input.write_ratio,
        input.ratio,
        skipped,
        why,
        encoding,
    )
}
