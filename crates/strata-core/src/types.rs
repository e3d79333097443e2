//! Database objects and storage encodings.
//!
//! Encodings are named after the storage clauses the database engine accepts;
//! the physical formats themselves live entirely inside the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of database object the advisor can reason about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Table,
    Index,
    Lob,
    /// Anything the catalog reports that we have no template for
    /// (materialized views, clusters, ...). Carried through so DDL listings can
    /// flag it instead of dropping it.
    Other(String),
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Table => "table",
            ObjectType::Index => "index",
            ObjectType::Lob => "lob",
            ObjectType::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() {
            return Err(Error::Config("empty object type".into()));
        }
        Ok(match t.to_ascii_lowercase().as_str() {
            "table" | "partition" => ObjectType::Table,
            "index" => ObjectType::Index,
            "lob" | "securefile" => ObjectType::Lob,
            other => ObjectType::Other(other.to_string()),
        })
    }
}

/// Identity of one analyzable object.
///
/// - tables: `owner.name`, optionally narrowed to one `partition`
/// - indexes: `owner.name`
/// - LOB columns: `owner.name` is the owning table, `column` the LOB column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub owner: String,
    pub name: String,
    pub object_type: ObjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl ObjectRef {
    pub fn table(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            object_type: ObjectType::Table,
            partition: None,
            column: None,
        }
    }

    pub fn index(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_type: ObjectType::Index,
            ..Self::table(owner, name)
        }
    }

    pub fn lob(owner: impl Into<String>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            object_type: ObjectType::Lob,
            column: Some(column.into()),
            ..Self::table(owner, table)
        }
    }

    /// Same object narrowed to one partition.
    pub fn with_partition(&self, partition: impl Into<String>) -> Self {
        Self {
            partition: Some(partition.into()),
            ..self.clone()
        }
    }

    /// Key used for per-object mutual exclusion and "latest recommendation"
    /// lookups. Two refs with the same key address the same physical segment.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)?;
        if let Some(col) = &self.column {
            write!(f, ".{}", col)?;
        }
        if let Some(p) = &self.partition {
            write!(f, ":{}", p)?;
        }
        if !matches!(self.object_type, ObjectType::Table) {
            write!(f, " [{}]", self.object_type)?;
        }
        Ok(())
    }
}

/// Storage encoding (compression format) applicable to some object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Encoding {
    None,
    // tables and partitions
    Basic,
    Oltp,
    QueryLow,
    QueryHigh,
    ArchiveLow,
    ArchiveHigh,
    // indexes
    IndexAdvancedLow,
    IndexAdvancedHigh,
    // LOB columns
    LobLow,
    LobMedium,
    LobHigh,
}

const TABLE_CANDIDATES: &[Encoding] = &[
    Encoding::Basic,
    Encoding::Oltp,
    Encoding::QueryLow,
    Encoding::QueryHigh,
    Encoding::ArchiveLow,
    Encoding::ArchiveHigh,
];
const INDEX_CANDIDATES: &[Encoding] = &[Encoding::IndexAdvancedLow, Encoding::IndexAdvancedHigh];
const LOB_CANDIDATES: &[Encoding] = &[Encoding::LobLow, Encoding::LobMedium, Encoding::LobHigh];

impl Encoding {
    pub const ALL: [Encoding; 12] = [
        Encoding::None,
        Encoding::Basic,
        Encoding::Oltp,
        Encoding::QueryLow,
        Encoding::QueryHigh,
        Encoding::ArchiveLow,
        Encoding::ArchiveHigh,
        Encoding::IndexAdvancedLow,
        Encoding::IndexAdvancedHigh,
        Encoding::LobLow,
        Encoding::LobMedium,
        Encoding::LobHigh,
    ];

    /// Encodings worth asking the estimator about for this object type.
    pub fn candidates_for(object_type: &ObjectType) -> &'static [Encoding] {
        match object_type {
            ObjectType::Table => TABLE_CANDIDATES,
            ObjectType::Index => INDEX_CANDIDATES,
            ObjectType::Lob => LOB_CANDIDATES,
            ObjectType::Other(_) => &[],
        }
    }

    /// `None` applies everywhere (it means "uncompressed").
    pub fn applies_to(self, object_type: &ObjectType) -> bool {
        self == Encoding::None || Self::candidates_for(object_type).contains(&self)
    }

    /// Relative CPU cost of reading/writing through this encoding.
    /// Lower is lighter; used to break ties between equal ratios.
    pub fn cpu_overhead_rank(self) -> u8 {
        match self {
            Encoding::None => 0,
            Encoding::Basic | Encoding::IndexAdvancedLow | Encoding::LobLow => 1,
            Encoding::Oltp | Encoding::LobMedium => 2,
            Encoding::QueryLow | Encoding::IndexAdvancedHigh | Encoding::LobHigh => 3,
            Encoding::QueryHigh => 4,
            Encoding::ArchiveLow => 5,
            Encoding::ArchiveHigh => 6,
        }
    }

    /// Stable upper-case name, as used in strategy files and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::None => "NONE",
            Encoding::Basic => "BASIC",
            Encoding::Oltp => "OLTP",
            Encoding::QueryLow => "QUERY_LOW",
            Encoding::QueryHigh => "QUERY_HIGH",
            Encoding::ArchiveLow => "ARCHIVE_LOW",
            Encoding::ArchiveHigh => "ARCHIVE_HIGH",
            Encoding::IndexAdvancedLow => "INDEX_ADVANCED_LOW",
            Encoding::IndexAdvancedHigh => "INDEX_ADVANCED_HIGH",
            Encoding::LobLow => "LOB_LOW",
            Encoding::LobMedium => "LOB_MEDIUM",
            Encoding::LobHigh => "LOB_HIGH",
        }
    }

    pub fn is_none(self) -> bool {
        self == Encoding::None
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Encoding::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == norm)
            .ok_or_else(|| Error::Config(format!("unknown encoding '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_encoding_is_lenient_about_spacing() {
        assert_eq!("query high".parse::<Encoding>().unwrap(), Encoding::QueryHigh);
        assert_eq!("ARCHIVE-LOW".parse::<Encoding>().unwrap(), Encoding::ArchiveLow);
        assert!("zip".parse::<Encoding>().is_err());
    }

    #[test]
    fn applicability_by_object_type() {
        assert!(Encoding::ArchiveHigh.applies_to(&ObjectType::Table));
        assert!(!Encoding::ArchiveHigh.applies_to(&ObjectType::Index));
        assert!(Encoding::LobMedium.applies_to(&ObjectType::Lob));
        assert!(Encoding::None.applies_to(&ObjectType::Other("cluster".into())));
        assert!(Encoding::candidates_for(&ObjectType::Other("mview".into())).is_empty());
    }

    #[test]
    fn object_ref_display_and_key() {
        let t = ObjectRef::table("SALES", "ORDERS").with_partition("P2023");
        assert_eq!(t.to_string(), "SALES.ORDERS:P2023");
        let l = ObjectRef::lob("HR", "DOCS", "BODY");
        assert_eq!(l.key(), "HR.DOCS.BODY [lob]");
    }

    #[test]
    fn object_type_parse() {
        assert_eq!("INDEX".parse::<ObjectType>().unwrap(), ObjectType::Index);
        assert_eq!(
            "cluster".parse::<ObjectType>().unwrap(),
            ObjectType::Other("cluster".into())
        );
    }
}
