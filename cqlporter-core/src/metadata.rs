//! Cluster and table metadata consumed from the driver collaborator
//!
//! The core never talks to the network: the driver hands it an
//! immutable snapshot of keyspace/table/view metadata, the token ring,
//! and the protocol generation's capability flags.

use crate::cql::CqlIdentifier;
use crate::token::{Partitioner, TokenRange};
use crate::types::CqlType;
use serde::{Deserialize, Serialize};

/// Capability flags derived from the negotiated protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFeatures {
    /// Whether prepared statements may use `:name` placeholders;
    /// without it only positional `?` placeholders are available
    pub named_bound_variables: bool,
    /// Whether bound variables may be left unset instead of bound to null
    pub unset_bound_variables: bool,
}

impl Default for ProtocolFeatures {
    fn default() -> Self {
        Self {
            named_bound_variables: true,
            unset_bound_variables: true,
        }
    }
}

impl ProtocolFeatures {
    /// Capabilities of the oldest supported protocol generation
    pub fn legacy() -> Self {
        Self {
            named_bound_variables: false,
            unset_bound_variables: false,
        }
    }
}

/// A single column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name, in internal form
    pub name: CqlIdentifier,
    /// CQL data type
    pub cql_type: CqlType,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self {
            name: CqlIdentifier::from_internal(name),
            cql_type,
        }
    }
}

/// A table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Owning keyspace name
    pub keyspace: String,
    /// Table (or view) name
    pub name: String,
    /// All columns, in declaration order
    pub columns: Vec<ColumnMetadata>,
    /// Partition key column names, in key order
    pub partition_key: Vec<CqlIdentifier>,
    /// Clustering column names, in clustering order
    pub clustering_columns: Vec<CqlIdentifier>,
}

/// A table or materialized view, exposed through a uniform contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableLike {
    Table(TableMetadata),
    MaterializedView(TableMetadata),
}

impl TableLike {
    fn meta(&self) -> &TableMetadata {
        match self {
            TableLike::Table(t) | TableLike::MaterializedView(t) => t,
        }
    }

    pub fn keyspace(&self) -> &str {
        &self.meta().keyspace
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    /// All columns in declaration order
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.meta().columns
    }

    /// Partition key followed by clustering columns
    pub fn primary_key(&self) -> Vec<CqlIdentifier> {
        let meta = self.meta();
        meta.partition_key
            .iter()
            .chain(meta.clustering_columns.iter())
            .cloned()
            .collect()
    }

    pub fn partition_key(&self) -> &[CqlIdentifier] {
        &self.meta().partition_key
    }

    pub fn clustering_columns(&self) -> &[CqlIdentifier] {
        &self.meta().clustering_columns
    }

    /// Look up a column by its internal-form name
    pub fn column(&self, name: &CqlIdentifier) -> Option<&ColumnMetadata> {
        self.meta().columns.iter().find(|c| &c.name == name)
    }

    /// Counter tables take the UPDATE increment form on load
    pub fn is_counter_table(&self) -> bool {
        self.meta()
            .columns
            .iter()
            .any(|c| c.cql_type == CqlType::Counter)
    }
}

/// A keyspace definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceMetadata {
    pub name: String,
    pub tables: Vec<TableMetadata>,
    pub views: Vec<TableMetadata>,
}

impl KeyspaceMetadata {
    /// Look up a table by exact name
    pub fn table(&self, name: &str) -> Option<TableLike> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .map(TableLike::Table)
    }

    /// Look up a materialized view by exact name
    pub fn view(&self, name: &str) -> Option<TableLike> {
        self.views
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .map(TableLike::MaterializedView)
    }
}

/// Immutable snapshot of the cluster as seen at initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub keyspaces: Vec<KeyspaceMetadata>,
    pub partitioner: Partitioner,
    pub token_ranges: Vec<TokenRange>,
    pub protocol: ProtocolFeatures,
}

impl ClusterInfo {
    /// Look up a keyspace by exact name
    pub fn keyspace(&self, name: &str) -> Option<&KeyspaceMetadata> {
        self.keyspaces.iter().find(|k| k.name == name)
    }
}

/// Capability flags declared by the connector collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorCapabilities {
    /// Connector can address record fields by position
    pub supports_indexed_fields: bool,
    /// Connector can address record fields by name
    pub supports_mapped_fields: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableLike {
        TableLike::Table(TableMetadata {
            keyspace: "ks".into(),
            name: "t1".into(),
            columns: vec![
                ColumnMetadata::new("c1", CqlType::Text),
                ColumnMetadata::new("c2", CqlType::Int),
                ColumnMetadata::new("c3", CqlType::Text),
            ],
            partition_key: vec![CqlIdentifier::from_internal("c1")],
            clustering_columns: vec![CqlIdentifier::from_internal("c2")],
        })
    }

    #[test]
    fn test_primary_key_order() {
        let pk = table().primary_key();
        assert_eq!(pk.len(), 2);
        assert_eq!(pk[0].as_internal(), "c1");
        assert_eq!(pk[1].as_internal(), "c2");
    }

    #[test]
    fn test_column_lookup() {
        let t = table();
        assert!(t.column(&CqlIdentifier::from_internal("c2")).is_some());
        assert!(t.column(&CqlIdentifier::from_internal("nope")).is_none());
    }

    #[test]
    fn test_counter_table_detection() {
        assert!(!table().is_counter_table());
        let counter = TableLike::Table(TableMetadata {
            keyspace: "ks".into(),
            name: "t2".into(),
            columns: vec![
                ColumnMetadata::new("pk", CqlType::Text),
                ColumnMetadata::new("total", CqlType::Counter),
            ],
            partition_key: vec![CqlIdentifier::from_internal("pk")],
            clustering_columns: vec![],
        });
        assert!(counter.is_counter_table());
    }
}
