//! The relation filter list: which `RelFileNode`s survive a WAL rewrite.

use std::io::Read;

use postgres_ffi::pg_constants::FIRST_NORMAL_OBJECT_ID;
use serde::Deserialize;

use crate::error::WalFilterError;

#[derive(Debug, Deserialize)]
struct TableSpec {
    #[serde(default = "default_tablespace")]
    tablespace: u32,
    relfilenode: u32,
}

fn default_tablespace() -> u32 {
    postgres_ffi::pg_constants::DEFAULTTABLESPACE_OID
}

#[derive(Debug, Deserialize)]
struct DatabaseSpec {
    #[serde(rename = "dbOid")]
    db_oid: u32,
    tables: Vec<TableSpec>,
}

/// `true` iff `oid` names a system catalog object rather than a
/// user-created one.
fn is_system_oid(oid: u32) -> bool {
    oid < FIRST_NORMAL_OBJECT_ID
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TableKey {
    spcnode: u32,
    relnode: u32,
}

struct DatabaseEntry {
    db_oid: u32,
    tables: Vec<TableKey>,
}

/// In-memory set of `(dbOid, spcOid, relOid)` triples loaded once from a
/// filter-spec JSON file; read-only for the rest of the process's life.
///
/// `None` (never configured) and `Some(empty vec)` (the spec file's outer
/// array is `[]`) are the same thing: every relation passes.
pub struct RelFileSet {
    databases: Option<Vec<DatabaseEntry>>,
}

impl RelFileSet {
    /// No filter configured: every relation is needed.
    pub fn unfiltered() -> Self {
        RelFileSet { databases: None }
    }

    /// Parse the filter-spec JSON array documented in spec §6. Fails with
    /// `WalFilterError::Format`-shaped message if `dbOid` is missing/zero or
    /// a table entry lacks `relfilenode`; `tablespace` defaults to
    /// `DEFAULTTABLESPACE_OID` when absent.
    pub fn load(reader: impl Read) -> Result<Self, WalFilterError> {
        let specs: Vec<DatabaseSpec> = serde_json::from_reader(reader)
            .map_err(|e| WalFilterError::Config(format!("invalid filter spec file: {e}")))?;

        let mut databases = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.db_oid == 0 {
                return Err(WalFilterError::Config("filter spec entry has dbOid 0".into()));
            }
            let mut tables: Vec<TableKey> = spec
                .tables
                .iter()
                .map(|t| TableKey { spcnode: t.tablespace, relnode: t.relfilenode })
                .collect();
            tables.sort();
            databases.push(DatabaseEntry { db_oid: spec.db_oid, tables });
        }
        databases.sort_by_key(|d| d.db_oid);

        tracing::debug!(databases = databases.len(), "loaded relation filter spec");
        Ok(RelFileSet { databases: Some(databases) })
    }

    /// Whether an outer array of length 0 was explicitly loaded (as opposed
    /// to no filter having been configured at all). Both disable filtering,
    /// but callers occasionally want to tell the two apart for logging.
    pub fn is_empty(&self) -> bool {
        matches!(&self.databases, Some(d) if d.is_empty())
    }

    /// Decision rule from spec §4.2:
    /// 1. no filter configured -> pass;
    /// 2. `db` and `rel` are both system OIDs -> pass;
    /// 3. `db` absent from the loaded set -> drop;
    /// 4. otherwise, `rel` is a system OID or `(spc, rel)` must be listed.
    ///
    /// A listed database with an empty `tables` list does not pass
    /// everything: it only still lets its own system-catalog relations
    /// through, same as an unlisted database would.
    pub fn is_needed(&self, db: u32, spc: u32, rel: u32) -> bool {
        let Some(databases) = &self.databases else {
            return true;
        };

        if is_system_oid(db) && is_system_oid(rel) {
            return true;
        }

        let Ok(idx) = databases.binary_search_by_key(&db, |d| d.db_oid) else {
            return false;
        };
        let entry = &databases[idx];
        is_system_oid(rel) || entry.tables.binary_search(&TableKey { spcnode: spc, relnode: rel }).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_accepts_everything() {
        let set = RelFileSet::unfiltered();
        assert!(set.is_needed(20000, 1600, 16384));
    }

    #[test]
    fn system_db_and_relation_always_pass() {
        let json = r#"[{"dbOid": 20000, "tables": [{"tablespace": 1600, "relfilenode": 16384}]}]"#;
        let set = RelFileSet::load(json.as_bytes()).unwrap();
        assert!(set.is_needed(1, 1663, 1259));
    }

    #[test]
    fn listed_database_with_empty_table_list_drops_user_relations() {
        let json = r#"[{"dbOid": 20000, "tables": []}]"#;
        let set = RelFileSet::load(json.as_bytes()).unwrap();
        assert!(!set.is_needed(20000, 1600, 19922));
        assert!(set.is_needed(20000, 1663, 1259));
    }

    #[test]
    fn unlisted_database_is_dropped() {
        let json = r#"[{"dbOid": 20000, "tables": [{"tablespace": 1600, "relfilenode": 16384}]}]"#;
        let set = RelFileSet::load(json.as_bytes()).unwrap();
        assert!(!set.is_needed(30000, 1600, 16384));
    }

    #[test]
    fn listed_relation_passes_others_in_same_db_do_not() {
        let json = r#"[{"dbOid": 20000, "tables": [{"tablespace": 1600, "relfilenode": 16384}]}]"#;
        let set = RelFileSet::load(json.as_bytes()).unwrap();
        assert!(set.is_needed(20000, 1600, 16384));
        assert!(!set.is_needed(20000, 1600, 16385));
    }

    #[test]
    fn tablespace_defaults_when_absent() {
        let json = r#"[{"dbOid": 20000, "tables": [{"relfilenode": 16384}]}]"#;
        let set = RelFileSet::load(json.as_bytes()).unwrap();
        assert!(set.is_needed(20000, 1663, 16384));
    }

    #[test]
    fn zero_db_oid_is_rejected() {
        let json = r#"[{"dbOid": 0, "tables": []}]"#;
        assert!(RelFileSet::load(json.as_bytes()).is_err());
    }

    #[test]
    fn empty_outer_array_disables_filtering() {
        let set = RelFileSet::load("[]".as_bytes()).unwrap();
        assert!(set.is_empty());
        assert!(set.is_needed(30000, 1600, 16384));
    }
}
