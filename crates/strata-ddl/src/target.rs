//! Which statement family applies to an object.

use strata_core::types::{Encoding, ObjectRef, ObjectType};

use crate::template;
use crate::DdlOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlTarget<'a> {
    Table { owner: &'a str, table: &'a str },
    Partition { owner: &'a str, table: &'a str, partition: &'a str },
    Index { owner: &'a str, index: &'a str },
    Lob { owner: &'a str, table: &'a str, column: &'a str },
    Unsupported,
}

impl<'a> DdlTarget<'a> {
    pub fn of(object: &'a ObjectRef) -> Self {
        let owner = object.owner.as_str();
        match (&object.object_type, &object.partition, &object.column) {
            (ObjectType::Table, Some(p), _) => DdlTarget::Partition {
                owner,
                table: &object.name,
                partition: p,
            },
            (ObjectType::Table, None, _) => DdlTarget::Table {
                owner,
                table: &object.name,
            },
            (ObjectType::Index, _, _) => DdlTarget::Index {
                owner,
                index: &object.name,
            },
            (ObjectType::Lob, _, Some(c)) => DdlTarget::Lob {
                owner,
                table: &object.name,
                column: c,
            },
            _ => DdlTarget::Unsupported,
        }
    }

    /// Statement text, or `None` when no template covers this combination.
    pub fn render(&self, encoding: Encoding, opts: &DdlOptions) -> Option<String> {
        match *self {
            DdlTarget::Table { owner, table } => template::table_move(owner, table, encoding, opts),
            DdlTarget::Partition {
                owner,
                table,
                partition,
            } => template::partition_modify(owner, table, partition, encoding),
            DdlTarget::Index { owner, index } => template::index_rebuild(owner, index, encoding, opts),
            DdlTarget::Lob {
                owner,
                table,
                column,
            } => template::lob_modify(owner, table, column, encoding),
            DdlTarget::Unsupported => None,
        }
    }
}
