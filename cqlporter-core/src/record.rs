//! Record model and per-record mapping
//!
//! The record/row mappers run once per record on the hot path. Codecs
//! are resolved once at construction; mapping a record never panics and
//! never partially binds: any conversion failure wraps the whole record
//! as an unmappable sentinel carrying the cause.

use crate::codecs::{CodecRegistry, ConvertingCodec, ExternalFormat, ExternalValue};
use crate::cql::{CqlFragment, CqlIdentifier, Field, TTL_VARNAME, WRITETIME_VARNAME};
use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::metadata::{ProtocolFeatures, TableLike};
use crate::token::{Token, TokenRange};
use crate::types::{CqlType, CqlValue};
use std::sync::Arc;
use tracing::warn;

/// A raw external record handed over by the connector
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<(Option<String>, ExternalValue)>,
}

impl Record {
    /// A record whose fields are addressed by position
    pub fn indexed(values: Vec<ExternalValue>) -> Self {
        Self {
            values: values.into_iter().map(|v| (None, v)).collect(),
        }
    }

    /// A record whose fields are addressed by name
    pub fn named(values: Vec<(String, ExternalValue)>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(name, v)| (Some(name), v))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a field's raw value
    pub fn get(&self, field: &Field) -> Option<&ExternalValue> {
        match field {
            Field::Indexed(i) => self.values.get(*i).map(|(_, v)| v),
            Field::Named(name) => self
                .values
                .iter()
                .find(|(n, _)| n.as_deref() == Some(name))
                .map(|(_, v)| v),
        }
    }

    /// Append a named field (used for synthetic write-time fields on
    /// reconstructed records)
    pub fn push(&mut self, name: impl Into<String>, value: ExternalValue) {
        self.values.push((Some(name.into()), value));
    }

    /// Field names and values in record order
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &ExternalValue)> {
        self.values.iter().map(|(n, v)| (n.as_deref(), v))
    }
}

/// A database row as handed over by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<(CqlIdentifier, CqlValue)>,
}

impl Row {
    pub fn new(values: Vec<(CqlIdentifier, CqlValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, variable: &CqlIdentifier) -> Option<&CqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, v)| v)
    }
}

/// A value bound to one variable of a prepared statement
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Value(CqlValue),
    /// The variable is left unset, avoiding a tombstone write
    Unset,
}

/// An executable statement plus its routing metadata
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub query: String,
    /// Bound values in binding order; positional statements bind by
    /// this order, named ones by the variable names
    pub values: Vec<(CqlIdentifier, Bound)>,
    pub routing_keyspace: String,
    pub routing_token: Option<Token>,
}

/// A read statement plus the token range it covers, when bounded
#[derive(Debug, Clone, PartialEq)]
pub struct ReadStatement {
    pub statement: BoundStatement,
    pub range: Option<TokenRange>,
}

/// The outcome of mapping one record for load
#[derive(Debug)]
pub enum MappedRecord {
    Statement(BoundStatement),
    /// The record could not be converted; carries the source record
    /// and the triggering error for downstream counting and logging
    Unmappable { record: Record, error: Error },
}

/// The outcome of mapping one row for unload
#[derive(Debug)]
pub enum MappedRow {
    Record(Record),
    Unmappable { row: Row, error: Error },
}

/// The internal type a mapping fragment converts to
fn variable_type(
    table: &TableLike,
    mapping: &Mapping,
    fragment: &CqlFragment,
) -> Result<CqlType> {
    match fragment {
        CqlFragment::Ttl => Ok(CqlType::Int),
        CqlFragment::Writetime => Ok(CqlType::Bigint),
        CqlFragment::Function(call) => match call.name.as_internal() {
            "writetime" => Ok(CqlType::Bigint),
            "ttl" => Ok(CqlType::Int),
            "now" => Ok(CqlType::TimeUuid),
            "token" => Ok(CqlType::Bigint),
            other => Err(Error::schema(format!(
                "Cannot determine the type of function selector {}()",
                other
            ))),
        },
        CqlFragment::Column(variable) => {
            if mapping
                .write_time_variables()
                .iter()
                .any(|v| v == variable)
            {
                return Ok(CqlType::Bigint);
            }
            match variable.as_internal() {
                TTL_VARNAME => Ok(CqlType::Int),
                WRITETIME_VARNAME => Ok(CqlType::Bigint),
                _ => table
                    .column(variable)
                    .map(|c| c.cql_type.clone())
                    .ok_or_else(|| {
                        Error::schema(format!(
                            "Bound variable {} doesn't match any column of table {}",
                            variable,
                            table.name()
                        ))
                    }),
            }
        }
    }
}

/// Converts external records into bound statements for load
pub struct RecordMapper {
    entries: Vec<(Field, CqlIdentifier, Arc<dyn ConvertingCodec>)>,
    query: String,
    keyspace: String,
    null_to_unset: bool,
}

impl RecordMapper {
    /// Resolve one codec per mapping entry up front; fails fast when a
    /// variable has no column or no codec.
    pub fn new(
        table: &TableLike,
        mapping: &Mapping,
        query: impl Into<String>,
        registry: &CodecRegistry,
        format: ExternalFormat,
        protocol: ProtocolFeatures,
        null_to_unset: bool,
    ) -> Result<Self> {
        let null_to_unset = if null_to_unset && !protocol.unset_bound_variables {
            warn!(
                "Protocol generation in use does not support unset bound variables; \
                 forcing schema.null_to_unset to false"
            );
            false
        } else {
            null_to_unset
        };
        let mut entries = Vec::with_capacity(mapping.len());
        for (field, fragment) in mapping.entries() {
            let target = variable_type(table, mapping, fragment)?;
            let codec = registry.codec_for(format, &target)?;
            entries.push((field.clone(), fragment.variable(), codec));
        }
        Ok(Self {
            entries,
            query: query.into(),
            keyspace: table.keyspace().to_string(),
            null_to_unset,
        })
    }

    /// Map one record; conversion failures yield the unmappable
    /// sentinel, never a partial bind
    pub fn map(&self, record: &Record) -> MappedRecord {
        match self.try_map(record) {
            Ok(statement) => MappedRecord::Statement(statement),
            Err(error) => MappedRecord::Unmappable {
                record: record.clone(),
                error,
            },
        }
    }

    fn try_map(&self, record: &Record) -> Result<BoundStatement> {
        let mut values = Vec::with_capacity(self.entries.len());
        for (field, variable, codec) in &self.entries {
            let external = record.get(field).cloned().unwrap_or(ExternalValue::Null);
            let internal = codec.external_to_internal(&external)?;
            let bound = if internal.is_null() && self.null_to_unset {
                Bound::Unset
            } else {
                Bound::Value(internal)
            };
            values.push((variable.clone(), bound));
        }
        Ok(BoundStatement {
            query: self.query.clone(),
            values,
            routing_keyspace: self.keyspace.clone(),
            routing_token: None,
        })
    }
}

/// Converts database rows back into external records for unload
pub struct RowMapper {
    entries: Vec<(Field, CqlIdentifier, Arc<dyn ConvertingCodec>)>,
    synthetic: Vec<(CqlIdentifier, Arc<dyn ConvertingCodec>)>,
}

impl RowMapper {
    pub fn new(
        table: &TableLike,
        mapping: &Mapping,
        registry: &CodecRegistry,
        format: ExternalFormat,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(mapping.len());
        for (field, fragment) in mapping.entries() {
            let target = variable_type(table, mapping, fragment)?;
            let codec = registry.codec_for(format, &target)?;
            entries.push((field.clone(), fragment.variable(), codec));
        }
        // write-time variables not already mapped to a field surface as
        // synthetic fields on the reconstructed record
        let mapped: Vec<CqlIdentifier> = entries.iter().map(|(_, v, _)| v.clone()).collect();
        let mut synthetic = Vec::new();
        for variable in mapping.write_time_variables() {
            if !mapped.contains(variable) {
                synthetic.push((
                    variable.clone(),
                    registry.codec_for(format, &CqlType::Bigint)?,
                ));
            }
        }
        Ok(Self { entries, synthetic })
    }

    pub fn map(&self, row: &Row) -> MappedRow {
        match self.try_map(row) {
            Ok(record) => MappedRow::Record(record),
            Err(error) => MappedRow::Unmappable {
                row: row.clone(),
                error,
            },
        }
    }

    fn try_map(&self, row: &Row) -> Result<Record> {
        let mut record = Record::default();
        for (field, variable, codec) in &self.entries {
            let internal = row.get(variable).cloned().unwrap_or(CqlValue::Null);
            let external = codec.internal_to_external(&internal)?;
            record.push(field.to_string(), external);
        }
        for (variable, codec) in &self.synthetic {
            let internal = row.get(variable).cloned().unwrap_or(CqlValue::Null);
            let external = codec.internal_to_external(&internal)?;
            record.push(variable.as_display(), external);
        }
        Ok(record)
    }
}
