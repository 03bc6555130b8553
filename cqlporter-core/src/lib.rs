//! CQLPorter Core
//!
//! Statement planning and type conversion core for bulk loading and
//! unloading Cassandra tables: schema/mapping resolution, CQL statement
//! generation and inspection, token range splitting, and the codec
//! registry converting between external records and CQL values.

#![allow(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codecs;
pub mod config;
pub mod cql;
pub mod error;
pub mod mapping;
pub mod metadata;
pub mod query;
pub mod record;
pub mod token;
pub mod types;

// Re-export main types for convenience
pub use crate::{
    codecs::{CodecRegistry, ConvertingCodec, ExternalFormat, ExternalValue},
    config::{CodecConfig, SchemaConfig, StatsMode},
    cql::{CqlFragment, CqlIdentifier, Field, FunctionCall},
    error::{Error, Result},
    mapping::{Mapping, MappingSpec, ResolvedSchema, SchemaResolver, WorkflowMode},
    metadata::{ClusterInfo, ConnectorCapabilities, KeyspaceMetadata, ProtocolFeatures, TableLike},
    record::{
        Bound, BoundStatement, MappedRecord, MappedRow, ReadStatement, Record, RecordMapper,
        Row, RowMapper,
    },
    token::{Partitioner, Token, TokenRange, TokenRangeSplitter},
    types::{CqlType, CqlValue},
};
