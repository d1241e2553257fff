//! The migration ledger.
//!
//! Each database keeps a `migrations (id, timestamp, name)` table whose
//! `name` column holds a plan checksum and whose `timestamp` holds the
//! applied-at time in epoch milliseconds. Strata stores the rest of a
//! [`MigrationRecord`] in a `migration_definitions` sidecar keyed by
//! `name`, so ledgers written before the sidecar existed stay valid.

use crate::{
    schema::{
        app::{Definitions, TableDefinition},
        db,
        operation::SchemaOperation,
    },
    Error, Result, Scope, Target,
};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fmt};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "migrations";

/// Name of the sidecar table holding record details.
pub const DEFINITIONS_TABLE: &str = "migration_definitions";

/// Content hash of an operation sequence, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// SHA-256 over the canonical JSON of `operations`, chained with the
    /// parent checksum.
    pub fn of(operations: &[SchemaOperation], parent: Option<&Checksum>) -> Result<Checksum> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(operations)?);
        if let Some(parent) = parent {
            hasher.update(b"\0");
            hasher.update(parent.0.as_bytes());
        }

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        Ok(Checksum(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Checksum {
    fn from(value: String) -> Self {
        Checksum(value)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row of the `migrations` table joined with its sidecar detail, as read
/// by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub id: u64,
    pub name: String,
    pub timestamp: i64,
    pub detail: Option<LedgerDetail>,
}

/// A row of the `migration_definitions` sidecar table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDetail {
    pub scope: String,
    pub database: String,
    pub table: String,
    pub parent: Option<String>,
    pub reversible: bool,

    /// The `TableDefinition` realized by the record, as JSON.
    pub definition: String,

    /// The forward `SchemaOperation` sequence, as JSON.
    pub operations: String,
}

/// Ledger entry proving that an operation sequence was applied to a
/// database.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub id: u64,
    pub scope: Scope,
    pub database: String,
    pub applied_at: DateTime<Utc>,
    pub checksum: Checksum,

    /// The forward operations contain nothing destructive, so reverting
    /// them loses no data that existed before.
    pub reversible: bool,

    /// Logical table name. `None` for rows written without a sidecar.
    pub table: Option<String>,

    pub parent: Option<Checksum>,

    pub definition: Option<TableDefinition>,

    pub operations: Vec<SchemaOperation>,
}

impl MigrationRecord {
    pub fn new(
        target: &Target,
        table: &TableDefinition,
        operations: Vec<SchemaOperation>,
        checksum: Checksum,
        parent: Option<Checksum>,
    ) -> MigrationRecord {
        MigrationRecord {
            id: 0,
            scope: target.scope,
            database: target.database.clone(),
            applied_at: Utc::now(),
            checksum,
            reversible: !operations.iter().any(SchemaOperation::is_destructive),
            table: Some(table.name.clone()),
            parent,
            definition: Some(table.clone()),
            operations,
        }
    }

    /// Decodes a driver row. Rows without detail belong to `target`.
    pub fn from_row(row: LedgerRow, target: &Target) -> Result<MigrationRecord> {
        let applied_at = Utc
            .timestamp_millis_opt(row.timestamp)
            .single()
            .ok_or_else(|| {
                Error::invalid_ledger(format!(
                    "migration `{}` has an invalid timestamp {}",
                    row.name, row.timestamp
                ))
            })?;

        let Some(detail) = row.detail else {
            return Ok(MigrationRecord {
                id: row.id,
                scope: target.scope,
                database: target.database.clone(),
                applied_at,
                checksum: row.name.into(),
                reversible: false,
                table: None,
                parent: None,
                definition: None,
                operations: vec![],
            });
        };

        let invalid = |what: &str, err: &dyn fmt::Display| {
            Error::invalid_ledger(format!("migration `{}` has an invalid {what}: {err}", row.name))
        };

        let scope = detail
            .scope
            .parse::<Scope>()
            .map_err(|err| invalid("scope", &err))?;
        let definition: TableDefinition =
            serde_json::from_str(&detail.definition).map_err(|err| invalid("definition", &err))?;
        let operations: Vec<SchemaOperation> =
            serde_json::from_str(&detail.operations).map_err(|err| invalid("operation list", &err))?;

        Ok(MigrationRecord {
            id: row.id,
            scope,
            database: detail.database,
            applied_at,
            checksum: row.name.into(),
            reversible: detail.reversible,
            table: Some(detail.table),
            parent: detail.parent.map(Checksum::from),
            definition: Some(definition),
            operations,
        })
    }

    /// Encodes the sidecar detail for this record.
    pub fn detail(&self) -> Result<LedgerDetail> {
        let Some(table) = &self.table else {
            return Err(Error::invalid_ledger(format!(
                "migration `{}` has no table",
                self.checksum
            )));
        };

        Ok(LedgerDetail {
            scope: self.scope.as_str().to_string(),
            database: self.database.clone(),
            table: table.clone(),
            parent: self.parent.as_ref().map(|p| p.as_str().to_string()),
            reversible: self.reversible,
            definition: serde_json::to_string(&self.definition)?,
            operations: serde_json::to_string(&self.operations)?,
        })
    }

    pub fn timestamp(&self) -> i64 {
        self.applied_at.timestamp_millis()
    }
}

/// The decoded ledger of one database.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<MigrationRecord>,
    latest: HashMap<String, TableDefinition>,
}

impl Ledger {
    pub fn new(mut records: Vec<MigrationRecord>) -> Ledger {
        records.sort_by_key(|record| record.id);

        let mut latest = HashMap::new();
        for record in &records {
            if let (Some(table), Some(def)) = (&record.table, &record.definition) {
                latest.insert(table.clone(), def.clone());
            }
        }

        Ledger { records, latest }
    }

    /// Decodes driver rows for `target`.
    pub fn from_rows(rows: Vec<LedgerRow>, target: &Target) -> Result<Ledger> {
        let records = rows
            .into_iter()
            .map(|row| MigrationRecord::from_row(row, target))
            .collect::<Result<Vec<_>>>()?;
        Ok(Ledger::new(records))
    }

    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    /// Logical names of the tables recorded with a definition.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.latest.keys().map(String::as_str)
    }

    pub fn contains(&self, checksum: &Checksum) -> bool {
        self.find(checksum).is_some()
    }

    pub fn find(&self, checksum: &Checksum) -> Option<&MigrationRecord> {
        self.records.iter().find(|record| &record.checksum == checksum)
    }

    /// The most recent record for the logical table `table`.
    pub fn latest(&self, table: &str) -> Option<&MigrationRecord> {
        self.records
            .iter()
            .rev()
            .find(|record| record.table.as_deref() == Some(table))
    }

    /// Records for `table`, oldest first.
    pub fn history<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a MigrationRecord> + 'a {
        self.records
            .iter()
            .filter(move |record| record.table.as_deref() == Some(table))
    }

    /// The physical state of `table` obtained by replaying its history.
    pub fn physical(&self, table: &str) -> Result<Option<db::Table>> {
        let Some(latest) = self.latest(table) else {
            return Ok(None);
        };
        let Some(name) = latest.definition.as_ref().map(TableDefinition::table_name) else {
            return Ok(None);
        };

        db::Table::replay(
            name,
            self.history(table).flat_map(|record| record.operations.iter()),
        )
    }
}

impl Definitions for Ledger {
    fn definition(&self, table: &str) -> Option<&TableDefinition> {
        self.latest.get(table)
    }
}

/// Name of the per-database migration lock.
pub fn lock_key(database: &str) -> String {
    format!("strata_migrate:{database}")
}

/// Stable 64-bit key for databases whose advisory locks take integers.
pub fn advisory_lock_id(key: &str) -> i64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}
