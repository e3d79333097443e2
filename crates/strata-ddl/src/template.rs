//! Statement templates. Pure functions of their arguments.

use strata_core::types::{Encoding, ObjectRef};

use crate::DdlOptions;

/// Double-quoted identifier; embedded quotes are doubled.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn qualified(owner: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(owner), quote_ident(name))
}

/// Storage clause for table segments.
pub fn table_clause(encoding: Encoding) -> Option<&'static str> {
    Some(match encoding {
        Encoding::None => "NOCOMPRESS",
        Encoding::Basic => "ROW STORE COMPRESS BASIC",
        Encoding::Oltp => "ROW STORE COMPRESS ADVANCED",
        Encoding::QueryLow => "COLUMN STORE COMPRESS FOR QUERY LOW",
        Encoding::QueryHigh => "COLUMN STORE COMPRESS FOR QUERY HIGH",
        Encoding::ArchiveLow => "COLUMN STORE COMPRESS FOR ARCHIVE LOW",
        Encoding::ArchiveHigh => "COLUMN STORE COMPRESS FOR ARCHIVE HIGH",
        _ => return None,
    })
}

fn index_clause(encoding: Encoding) -> Option<&'static str> {
    Some(match encoding {
        Encoding::None => "NOCOMPRESS",
        Encoding::IndexAdvancedLow => "COMPRESS ADVANCED LOW",
        Encoding::IndexAdvancedHigh => "COMPRESS ADVANCED HIGH",
        _ => return None,
    })
}

fn lob_clause(encoding: Encoding) -> Option<&'static str> {
    Some(match encoding {
        Encoding::None => "NOCOMPRESS",
        Encoding::LobLow => "COMPRESS LOW",
        Encoding::LobMedium => "COMPRESS MEDIUM",
        Encoding::LobHigh => "COMPRESS HIGH",
        _ => return None,
    })
}

fn rebuild_options(out: &mut String, opts: &DdlOptions) {
    if opts.online {
        out.push_str(" ONLINE");
    }
    if let Some(n) = opts.parallel_degree.filter(|n| *n > 1) {
        out.push_str(&format!(" PARALLEL {n}"));
    }
}

pub fn table_move(owner: &str, table: &str, encoding: Encoding, opts: &DdlOptions) -> Option<String> {
    let mut s = format!(
        "ALTER TABLE {} MOVE {}",
        qualified(owner, table),
        table_clause(encoding)?
    );
    rebuild_options(&mut s, opts);
    Some(s)
}

/// Changes the attribute for future rows; existing rows move on the next
/// partition maintenance.
pub fn partition_modify(owner: &str, table: &str, partition: &str, encoding: Encoding) -> Option<String> {
    Some(format!(
        "ALTER TABLE {} MODIFY PARTITION {} {}",
        qualified(owner, table),
        quote_ident(partition),
        table_clause(encoding)?
    ))
}

pub fn index_rebuild(owner: &str, index: &str, encoding: Encoding, opts: &DdlOptions) -> Option<String> {
    let mut s = format!(
        "ALTER INDEX {} REBUILD {}",
        qualified(owner, index),
        index_clause(encoding)?
    );
    rebuild_options(&mut s, opts);
    Some(s)
}

pub fn lob_modify(owner: &str, table: &str, column: &str, encoding: Encoding) -> Option<String> {
    Some(format!(
        "ALTER TABLE {} MODIFY LOB ({}) ({})",
        qualified(owner, table),
        quote_ident(column),
        lob_clause(encoding)?
    ))
}

/// Comment emitted instead of DDL when nothing can be generated.
pub fn placeholder(object: &ObjectRef, encoding: Encoding) -> String {
    format!(
        "-- strata: no DDL template for {} ({}) with encoding {}; apply manually",
        object, object.object_type, encoding
    )
}
