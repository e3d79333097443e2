//! Strategies shipped with the advisor.

use strata_core::types::{Encoding, ObjectType};

use crate::strategy::{Rule, ScoreRange, Strategy};

pub const BALANCED: &str = "balanced";
pub const AGGRESSIVE: &str = "aggressive";
pub const CONSERVATIVE: &str = "conservative";

pub fn builtin_strategies() -> Vec<Strategy> {
    vec![balanced(), aggressive(), conservative()]
}

/// Archive what nobody touches, query-compress read-mostly data, row-compress
/// the rest.
pub fn balanced() -> Strategy {
    use ObjectType::*;
    Strategy::new(
        BALANCED,
        "Trade moderate CPU for storage: archive cold data, query-compress read-mostly data",
        vec![
            Rule::new(Table, 10, Encoding::ArchiveLow)
                .hotness(ScoreRange::at_most(40.0))
                .access(ScoreRange::at_most(40.0))
                .label("cold and rarely read"),
            Rule::new(Table, 20, Encoding::QueryHigh)
                .hotness(ScoreRange::at_most(40.0))
                .label("read-mostly"),
            Rule::new(Table, 30, Encoding::QueryLow)
                .hotness(ScoreRange::at_most(70.0))
                .write_ratio(ScoreRange::at_most(0.3))
                .label("moderate DML, read dominated"),
            Rule::new(Table, 40, Encoding::Oltp)
                .write_ratio(ScoreRange::at_least(0.3))
                .label("write heavy"),
            Rule::new(Index, 10, Encoding::IndexAdvancedHigh)
                .hotness(ScoreRange::at_most(40.0))
                .label("stable index"),
            Rule::new(Index, 20, Encoding::IndexAdvancedLow).label("active index"),
            Rule::new(Lob, 10, Encoding::LobHigh)
                .access(ScoreRange::at_most(40.0))
                .label("rarely read LOB"),
            Rule::new(Lob, 20, Encoding::LobMedium)
                .hotness(ScoreRange::at_most(70.0))
                .label("warm LOB"),
            Rule::new(Lob, 30, Encoding::LobLow).label("busy LOB"),
        ],
    )
}

/// Maximum savings; accepts heavier CPU on every access.
pub fn aggressive() -> Strategy {
    use ObjectType::*;
    Strategy::new(
        AGGRESSIVE,
        "Maximize storage savings; accept the CPU cost of archive-grade encodings",
        vec![
            Rule::new(Table, 10, Encoding::ArchiveHigh)
                .hotness(ScoreRange::at_most(40.0))
                .label("low DML"),
            Rule::new(Table, 20, Encoding::QueryHigh)
                .hotness(ScoreRange::at_most(70.0))
                .label("moderate DML"),
            Rule::new(Table, 30, Encoding::Oltp).label("high DML"),
            Rule::new(Index, 10, Encoding::IndexAdvancedHigh).label("all indexes"),
            Rule::new(Lob, 10, Encoding::LobHigh).label("all LOBs"),
        ],
    )
}

/// Only touch what is clearly cold; keep hot tables uncompressed.
pub fn conservative() -> Strategy {
    use ObjectType::*;
    Strategy::new(
        CONSERVATIVE,
        "Minimize CPU overhead: light encodings only, hot objects left alone",
        vec![
            Rule::new(Table, 10, Encoding::QueryLow)
                .hotness(ScoreRange::at_most(20.0))
                .access(ScoreRange::at_most(20.0))
                .label("cold"),
            Rule::new(Table, 20, Encoding::Oltp)
                .hotness(ScoreRange::at_most(50.0))
                .label("light DML"),
            Rule::new(Table, 30, Encoding::None)
                .hotness(ScoreRange::at_least(50.0))
                .label("hot table left uncompressed"),
            Rule::new(Index, 10, Encoding::IndexAdvancedLow)
                .hotness(ScoreRange::at_most(30.0))
                .label("quiet index"),
            Rule::new(Lob, 10, Encoding::LobLow)
                .access(ScoreRange::at_most(30.0))
                .label("cold LOB"),
        ],
    )
}
