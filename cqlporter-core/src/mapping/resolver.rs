//! Schema resolution
//!
//! Runs once at initialization: validates the schema configuration,
//! resolves keyspace and table metadata, parses or infers the mapping,
//! validates it against the workflow direction and the connector's
//! capabilities, and produces the final statement text. Every check
//! fails with a precise diagnostic; no partial mapping is ever
//! returned.

use crate::config::SchemaConfig;
use crate::cql::{CqlFragment, CqlIdentifier, Field, FunctionCall, WRITETIME_VARNAME};
use crate::error::{Error, Result};
use crate::mapping::{Mapping, MappingEntry, MappingField, MappingSpec, MappingTarget};
use crate::metadata::{
    ClusterInfo, ConnectorCapabilities, KeyspaceMetadata, ProtocolFeatures, TableLike,
};
use crate::query::generator::{
    count_select_statement, count_selection, counter_update_statement, insert_statement,
    select_statement, token_restriction, ReadStatementGenerator, UsingClause, WriteTimeValue,
};
use crate::query::inspector::{inspect, QueryInspection, StatementKind, TokenClause};
use crate::record::ReadStatement;
use crate::token::{Partitioner, TokenRange, TokenRangeSplitter};
use tracing::debug;

/// The direction of the data movement being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowMode {
    /// External records into the database
    Load,
    /// Database rows out to external records
    Unload,
    /// Row counting (a read workflow with a minimal selection)
    Count,
}

/// The outcome of schema resolution: everything the runtime needs,
/// immutable from here on
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub table: TableLike,
    /// Final statement text, generated or user-supplied
    pub query: String,
    pub mapping: Mapping,
    pub token_clause: TokenClause,
    pub protocol: ProtocolFeatures,
    pub partitioner: Partitioner,
    token_ranges: Vec<TokenRange>,
}

impl ResolvedSchema {
    pub fn keyspace(&self) -> &str {
        self.table.keyspace()
    }

    /// The ordered list of token-range-bounded read statements
    pub fn read_plan(&self, splits: usize) -> Result<Vec<ReadStatement>> {
        let splitter = TokenRangeSplitter::new(self.partitioner, self.token_ranges.clone())?;
        ReadStatementGenerator::new(
            self.query.clone(),
            self.token_clause.clone(),
            self.table.keyspace(),
            self.partitioner,
        )
        .generate(&splitter, splits)
    }
}

/// Resolves the schema configuration against cluster metadata
pub struct SchemaResolver<'a> {
    config: &'a SchemaConfig,
    cluster: &'a ClusterInfo,
    capabilities: ConnectorCapabilities,
    mode: WorkflowMode,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(
        config: &'a SchemaConfig,
        cluster: &'a ClusterInfo,
        capabilities: ConnectorCapabilities,
        mode: WorkflowMode,
    ) -> Self {
        Self {
            config,
            cluster,
            capabilities,
            mode,
        }
    }

    pub fn resolve(&self) -> Result<ResolvedSchema> {
        self.check_config()?;
        let spec = match &self.config.mapping {
            Some(text) => Some(MappingSpec::parse(text)?),
            None => None,
        };
        if self.mode == WorkflowMode::Count && spec.is_some() {
            return Err(Error::configuration(
                "schema.mapping must not be defined when counting rows in a table",
            ));
        }
        let resolved = match &self.config.query {
            Some(query) => self.resolve_custom(query, spec.as_ref())?,
            None => self.resolve_generated(spec.as_ref())?,
        };
        debug!(
            query = %resolved.query,
            mapping_entries = resolved.mapping.len(),
            "schema resolved"
        );
        Ok(resolved)
    }

    fn check_config(&self) -> Result<()> {
        if self.config.query.is_some() && self.config.table.is_some() {
            return Err(Error::configuration(
                "schema.query and schema.table are mutually exclusive",
            ));
        }
        if self.config.query.is_none() && self.config.table.is_none() {
            return Err(Error::configuration(
                "when schema.query is not defined, schema.keyspace and schema.table must be defined",
            ));
        }
        if self.config.table.is_some() && self.config.keyspace.is_none() {
            return Err(Error::configuration(
                "schema.table must be defined together with schema.keyspace",
            ));
        }
        Ok(())
    }

    fn lookup_keyspace(&self, name: &str) -> Result<&'a KeyspaceMetadata> {
        if let Some(keyspace) = self.cluster.keyspace(name) {
            return Ok(keyspace);
        }
        if let Some(close) = self
            .cluster
            .keyspaces
            .iter()
            .find(|k| k.name.eq_ignore_ascii_case(name))
        {
            return Err(Error::schema(format!(
                "Keyspace {} does not exist, however a keyspace {} was found; did you mean {}?",
                name, close.name, close.name
            )));
        }
        Err(Error::schema(format!("Keyspace {} does not exist", name)))
    }

    fn lookup_table(&self, keyspace: &KeyspaceMetadata, name: &str) -> Result<TableLike> {
        if let Some(table) = keyspace.table(name) {
            return Ok(table);
        }
        if let Some(view) = keyspace.view(name) {
            return Ok(view);
        }
        if let Some(close) = keyspace
            .tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            return Err(Error::schema(format!(
                "Table {} does not exist in keyspace {}, however a table {} was found; did you mean {}?",
                name, keyspace.name, close.name, close.name
            )));
        }
        if let Some(close) = keyspace
            .views
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
        {
            return Err(Error::schema(format!(
                "Materialized view {} does not exist in keyspace {}, however a materialized view {} was found; did you mean {}?",
                name, keyspace.name, close.name, close.name
            )));
        }
        Err(Error::schema(format!(
            "Table or materialized view {} does not exist in keyspace {}",
            name, keyspace.name
        )))
    }

    /// Expand the spec (or infer a mapping) over the available targets,
    /// preserving target declaration order; explicit entries replace
    /// the inferred entry of the column they point at, exclusions drop
    /// it, and remaining explicit entries append at the end.
    fn expand_entries(
        &self,
        spec: Option<&MappingSpec>,
        available: &[CqlIdentifier],
    ) -> Vec<(MappingField, MappingTarget)> {
        let inferred = |column: &CqlIdentifier| {
            (
                MappingField::Named(column.as_internal().to_string()),
                MappingTarget::Column(column.clone()),
            )
        };
        let spec = match spec {
            None => return available.iter().map(inferred).collect(),
            Some(spec) => spec,
        };
        if spec.is_positional_list() {
            return spec
                .entries
                .iter()
                .enumerate()
                .filter_map(|(i, entry)| match entry {
                    MappingEntry::Lone(column) => {
                        let field = if self.capabilities.supports_indexed_fields {
                            MappingField::Indexed(i)
                        } else {
                            MappingField::Named(column.as_internal().to_string())
                        };
                        Some((field, MappingTarget::Column(column.clone())))
                    }
                    _ => None,
                })
                .collect();
        }
        let pairs: Vec<(MappingField, MappingTarget)> = spec
            .entries
            .iter()
            .filter_map(|entry| match entry {
                MappingEntry::Pair { field, target } => Some((field.clone(), target.clone())),
                _ => None,
            })
            .collect();
        if !spec.has_wildcard() {
            return pairs;
        }
        let excluded = spec.exclusions();
        let mut consumed = vec![false; pairs.len()];
        let mut expanded = Vec::new();
        for column in available {
            if excluded.contains(column) {
                continue;
            }
            let overriding = pairs
                .iter()
                .position(|(_, t)| matches!(t, MappingTarget::Column(c) if c == column));
            match overriding {
                Some(i) => {
                    consumed[i] = true;
                    expanded.push(pairs[i].clone());
                }
                None => expanded.push(inferred(column)),
            }
        }
        for (i, pair) in pairs.into_iter().enumerate() {
            if !consumed[i] {
                expanded.push(pair);
            }
        }
        expanded
    }

    fn check_function_sides(&self, entries: &[(MappingField, MappingTarget)]) -> Result<()> {
        match self.mode {
            WorkflowMode::Load => {
                if entries
                    .iter()
                    .any(|(_, t)| matches!(t, MappingTarget::Function(_)))
                {
                    return Err(Error::configuration(
                        "Misplaced function call detected on the right side of a mapping entry; \
                         please review your schema.mapping setting",
                    ));
                }
            }
            WorkflowMode::Unload => {
                if entries
                    .iter()
                    .any(|(f, _)| matches!(f, MappingField::Function(_)))
                {
                    return Err(Error::configuration(
                        "Misplaced function call detected on the left side of a mapping entry; \
                         please review your schema.mapping setting",
                    ));
                }
            }
            WorkflowMode::Count => {}
        }
        Ok(())
    }

    fn check_capabilities(&self, entries: &[(MappingField, MappingTarget)]) -> Result<()> {
        let named = entries
            .iter()
            .any(|(f, _)| matches!(f, MappingField::Named(_)));
        let indexed = entries
            .iter()
            .any(|(f, _)| matches!(f, MappingField::Indexed(_)));
        if named && !self.capabilities.supports_mapped_fields {
            return Err(Error::configuration(
                "Schema mapping contains named fields, but connector only supports indexed \
                 fields; please enable support for named fields in the connector, or \
                 alternatively provide an indexed mapping of the form: '0=col1,1=col2,...'",
            ));
        }
        if indexed && !self.capabilities.supports_indexed_fields {
            return Err(Error::configuration(
                "Schema mapping contains indexed fields, but connector only supports named \
                 fields; please enable support for indexed fields in the connector, or \
                 alternatively provide a mapped mapping of the form: 'fieldA=col1,fieldB=col2,...'",
            ));
        }
        Ok(())
    }

    /// For load, each bound variable must receive exactly one field
    fn check_duplicates(&self, mapping: &Mapping) -> Result<()> {
        for variable in mapping.variables() {
            let fields = mapping.fields_for(&variable);
            if fields.len() > 1 {
                return Err(Error::configuration(format!(
                    "Invalid schema.mapping: the variable {} is mapped to more than one field: \
                     {}; please review your schema.mapping for duplicates",
                    variable,
                    fields
                        .iter()
                        .map(|f| f.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
        Ok(())
    }

    fn check_primary_key_coverage(
        &self,
        table: &TableLike,
        covered: &[CqlIdentifier],
    ) -> Result<()> {
        for key_column in table.primary_key() {
            if !covered.contains(&key_column) {
                return Err(Error::configuration(format!(
                    "Missing required primary key column {} from schema.mapping or schema.query",
                    key_column
                )));
            }
        }
        Ok(())
    }

    fn resolve_generated(&self, spec: Option<&MappingSpec>) -> Result<ResolvedSchema> {
        let keyspace_name = self
            .config
            .keyspace
            .as_deref()
            .ok_or_else(|| Error::internal("keyspace presence was checked"))?;
        let table_name = self
            .config
            .table
            .as_deref()
            .ok_or_else(|| Error::internal("table presence was checked"))?;
        let keyspace = self.lookup_keyspace(keyspace_name)?;
        let table = self.lookup_table(keyspace, table_name)?;
        let protocol = self.cluster.protocol;

        if self.mode == WorkflowMode::Count {
            let base = count_select_statement(&table, &self.config.stats)?;
            let (clause_text, token_clause) = token_restriction(&table, protocol);
            return Ok(self.finish(
                table,
                format!("{}{}", base, clause_text),
                Mapping::empty(),
                token_clause,
            ));
        }

        let columns: Vec<CqlIdentifier> =
            table.columns().iter().map(|c| c.name.clone()).collect();
        let entries = self.expand_entries(spec, &columns);
        self.check_function_sides(&entries)?;
        self.check_capabilities(&entries)?;
        for (_, target) in &entries {
            if let MappingTarget::Column(column) = target {
                if table.column(column).is_none() {
                    return Err(Error::configuration(format!(
                        "Schema mapping entry {} doesn't match any column found in table {}",
                        column,
                        table.name()
                    )));
                }
            }
        }

        match self.mode {
            WorkflowMode::Load => self.finish_generated_load(table, entries),
            WorkflowMode::Unload => self.finish_generated_unload(table, entries),
            WorkflowMode::Count => unreachable!("count was handled above"),
        }
    }

    fn finish_generated_load(
        &self,
        table: TableLike,
        entries: Vec<(MappingField, MappingTarget)>,
    ) -> Result<ResolvedSchema> {
        let protocol = self.cluster.protocol;
        let mut statement_columns: Vec<(CqlIdentifier, Option<FunctionCall>)> = Vec::new();
        let mut mapping_entries: Vec<(Field, CqlFragment)> = Vec::new();
        let mut has_ttl = false;
        let mut has_writetime = false;
        for (field, target) in &entries {
            match target {
                MappingTarget::Column(column) => {
                    match field {
                        MappingField::Function(call) => {
                            statement_columns.push((column.clone(), Some(call.clone())))
                        }
                        _ => statement_columns.push((column.clone(), None)),
                    }
                    if let Some(record_field) = field.to_field() {
                        mapping_entries.push((record_field, CqlFragment::Column(column.clone())));
                    }
                }
                MappingTarget::Ttl => {
                    has_ttl = true;
                    if let Some(record_field) = field.to_field() {
                        mapping_entries.push((record_field, CqlFragment::Ttl));
                    }
                }
                MappingTarget::Writetime => {
                    has_writetime = true;
                    if let Some(record_field) = field.to_field() {
                        mapping_entries.push((record_field, CqlFragment::Writetime));
                    }
                }
                MappingTarget::Function(_) => unreachable!("rejected by check_function_sides"),
            }
        }
        let write_time_variables = if has_writetime {
            vec![CqlIdentifier::from_internal(WRITETIME_VARNAME)]
        } else {
            Vec::new()
        };
        let mapping = Mapping::new(mapping_entries, write_time_variables);
        self.check_duplicates(&mapping)?;
        let covered: Vec<CqlIdentifier> =
            statement_columns.iter().map(|(c, _)| c.clone()).collect();
        self.check_primary_key_coverage(&table, &covered)?;

        let using = UsingClause {
            ttl: if has_ttl {
                Some(WriteTimeValue::Variable)
            } else {
                self.config.query_ttl.map(|n| WriteTimeValue::Literal(i64::from(n)))
            },
            timestamp: if has_writetime {
                Some(WriteTimeValue::Variable)
            } else {
                self.config
                    .query_timestamp
                    .map(|ts| WriteTimeValue::Literal(ts.timestamp_micros()))
            },
        };

        let query = if table.is_counter_table() {
            if !using.is_empty() {
                return Err(Error::configuration(
                    "Cannot set TTL or timestamp when updating a counter table",
                ));
            }
            counter_update_statement(&table, &covered, protocol)
        } else {
            insert_statement(&table, &statement_columns, protocol, &using)
        };

        Ok(self.finish(table, query, mapping, TokenClause::Absent))
    }

    fn finish_generated_unload(
        &self,
        table: TableLike,
        entries: Vec<(MappingField, MappingTarget)>,
    ) -> Result<ResolvedSchema> {
        let protocol = self.cluster.protocol;
        let mut selectors: Vec<CqlFragment> = Vec::new();
        let mut mapping_entries: Vec<(Field, CqlFragment)> = Vec::new();
        for (field, target) in &entries {
            if matches!(target, MappingTarget::Ttl | MappingTarget::Writetime) {
                return Err(Error::configuration(format!(
                    "The {} mapping target is only allowed when loading",
                    target.to_fragment()
                )));
            }
            let fragment = target.to_fragment();
            selectors.push(fragment.clone());
            if let Some(record_field) = field.to_field() {
                mapping_entries.push((record_field, fragment));
            }
        }
        let base = select_statement(&table, &selectors, protocol);
        let (clause_text, token_clause) = token_restriction(&table, protocol);
        let write_time_variables = write_time_selectors(&mapping_entries);
        Ok(self.finish(
            table,
            format!("{}{}", base, clause_text),
            Mapping::new(mapping_entries, write_time_variables),
            token_clause,
        ))
    }

    fn resolve_custom(&self, query: &str, spec: Option<&MappingSpec>) -> Result<ResolvedSchema> {
        let inspection = inspect(query)?;
        let keyspace_name = match (&inspection.keyspace, &self.config.keyspace) {
            (Some(_), Some(_)) => {
                return Err(Error::configuration(
                    "schema.keyspace must not be defined when schema.query contains a \
                     keyspace-qualified statement",
                ))
            }
            (Some(qualified), None) => qualified.as_internal().to_string(),
            (None, Some(configured)) => configured.clone(),
            (None, None) => {
                return Err(Error::configuration(
                    "schema.keyspace must be defined when schema.query does not contain a \
                     keyspace-qualified statement",
                ))
            }
        };
        let keyspace = self.lookup_keyspace(&keyspace_name)?;
        let table = self.lookup_table(keyspace, inspection.table.as_internal())?;

        match (self.mode, inspection.kind) {
            (WorkflowMode::Load, StatementKind::Insert | StatementKind::Update) => {
                self.finish_custom_load(table, &inspection, query, spec)
            }
            (WorkflowMode::Load, StatementKind::Select) => Err(Error::configuration(
                "Invalid schema.query: the statement must be an INSERT or UPDATE when loading",
            )),
            (WorkflowMode::Unload, StatementKind::Select) => {
                self.finish_custom_read(table, &inspection, query, spec)
            }
            (WorkflowMode::Count, StatementKind::Select) => {
                self.finish_custom_read(table, &inspection, query, None)
            }
            (WorkflowMode::Unload | WorkflowMode::Count, _) => Err(Error::configuration(
                "Invalid schema.query: the statement must be a SELECT when reading",
            )),
        }
    }

    fn finish_custom_load(
        &self,
        table: TableLike,
        inspection: &QueryInspection,
        query: &str,
        spec: Option<&MappingSpec>,
    ) -> Result<ResolvedSchema> {
        let variables = inspection.bound_variables();
        let entries = self.expand_entries(spec, &variables);
        self.check_function_sides(&entries)?;
        self.check_capabilities(&entries)?;

        let mut mapping_entries: Vec<(Field, CqlFragment)> = Vec::new();
        for (field, target) in &entries {
            let fragment = match target {
                MappingTarget::Column(variable) => {
                    if !variables.contains(variable) {
                        return Err(Error::configuration(format!(
                            "Schema mapping entry {} doesn't match any bound variable found in \
                             query: '{}'",
                            variable,
                            query.trim()
                        )));
                    }
                    CqlFragment::Column(variable.clone())
                }
                MappingTarget::Ttl => {
                    let variable = inspection.ttl_variable.clone().ok_or_else(|| {
                        Error::configuration(
                            "The __ttl mapping target is not allowed when the query does not \
                             contain a USING TTL clause",
                        )
                    })?;
                    CqlFragment::Column(variable)
                }
                MappingTarget::Writetime => {
                    let variable = inspection.timestamp_variable.clone().ok_or_else(|| {
                        Error::configuration(
                            "The __timestamp mapping target is not allowed when the query does \
                             not contain a USING TIMESTAMP clause",
                        )
                    })?;
                    CqlFragment::Column(variable)
                }
                MappingTarget::Function(_) => unreachable!("rejected by check_function_sides"),
            };
            if let Some(record_field) = field.to_field() {
                mapping_entries.push((record_field, fragment));
            }
        }
        let write_time_variables = inspection
            .timestamp_variable
            .clone()
            .into_iter()
            .collect();
        let mapping = Mapping::new(mapping_entries, write_time_variables);
        self.check_duplicates(&mapping)?;
        let assigned: Vec<CqlIdentifier> = inspection
            .assignments
            .iter()
            .map(|(column, _)| column.clone())
            .collect();
        self.check_primary_key_coverage(&table, &assigned)?;

        Ok(self.finish(
            table,
            query.trim().to_string(),
            mapping,
            TokenClause::Absent,
        ))
    }

    fn finish_custom_read(
        &self,
        table: TableLike,
        inspection: &QueryInspection,
        query: &str,
        spec: Option<&MappingSpec>,
    ) -> Result<ResolvedSchema> {
        let variables: Vec<CqlIdentifier> = if inspection.star {
            table.columns().iter().map(|c| c.name.clone()).collect()
        } else {
            inspection.result_variables()
        };
        if self.mode == WorkflowMode::Count {
            let query = self.minimal_count_query(&table, inspection, query)?;
            return Ok(self.finish(
                table,
                query,
                Mapping::empty(),
                inspection.token_clause.clone(),
            ));
        }
        let mapping = {
            let entries = self.expand_entries(spec, &variables);
            self.check_function_sides(&entries)?;
            self.check_capabilities(&entries)?;
            let mut mapping_entries: Vec<(Field, CqlFragment)> = Vec::new();
            for (field, target) in &entries {
                let fragment = target.to_fragment();
                if !variables.contains(&fragment.variable()) {
                    return Err(Error::configuration(format!(
                        "Schema mapping entry {} doesn't match any column found in query: '{}'",
                        fragment,
                        query.trim()
                    )));
                }
                if let Some(record_field) = field.to_field() {
                    mapping_entries.push((record_field, fragment));
                }
            }
            let write_time_variables = write_time_selectors(&mapping_entries);
            Mapping::new(mapping_entries, write_time_variables)
        };
        Ok(self.finish(
            table,
            query.trim().to_string(),
            mapping,
            inspection.token_clause.clone(),
        ))
    }

    /// Counting never needs the full selection: keep the smaller of
    /// the query's selected columns and the minimal set the requested
    /// stats require.
    fn minimal_count_query(
        &self,
        table: &TableLike,
        inspection: &QueryInspection,
        query: &str,
    ) -> Result<String> {
        let required = count_selection(table, &self.config.stats)?;
        let existing = if inspection.star {
            table.columns().len()
        } else {
            inspection.selectors.len()
        };
        let query = query.trim();
        if !inspection.star && existing <= required.len() {
            return Ok(query.to_string());
        }
        let from = query
            .to_ascii_lowercase()
            .find(" from ")
            .ok_or_else(|| Error::query_parse(format!("Invalid SELECT statement: '{}'", query)))?;
        Ok(format!("SELECT {}{}", required.join(", "), &query[from..]))
    }

    fn finish(
        &self,
        table: TableLike,
        query: String,
        mapping: Mapping,
        token_clause: TokenClause,
    ) -> ResolvedSchema {
        ResolvedSchema {
            table,
            query,
            mapping,
            token_clause,
            protocol: self.cluster.protocol,
            partitioner: self.cluster.partitioner,
            token_ranges: self.cluster.token_ranges.clone(),
        }
    }
}

/// Variables produced by `writetime(...)` selectors
fn write_time_selectors(entries: &[(Field, CqlFragment)]) -> Vec<CqlIdentifier> {
    entries
        .iter()
        .filter_map(|(_, fragment)| match fragment {
            CqlFragment::Function(call) if call.name.as_internal() == "writetime" => {
                Some(fragment.variable())
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatsMode;
    use crate::metadata::{ColumnMetadata, TableMetadata};
    use crate::token::Token;
    use crate::types::CqlType;

    fn cluster() -> ClusterInfo {
        ClusterInfo {
            keyspaces: vec![KeyspaceMetadata {
                name: "ks".into(),
                tables: vec![
                    TableMetadata {
                        keyspace: "ks".into(),
                        name: "t1".into(),
                        columns: vec![
                            ColumnMetadata::new("c1", CqlType::Text),
                            ColumnMetadata::new("COL 2", CqlType::Bigint),
                            ColumnMetadata::new("c3", CqlType::Text),
                        ],
                        partition_key: vec![CqlIdentifier::from_internal("c1")],
                        clustering_columns: vec![CqlIdentifier::from_internal("COL 2")],
                    },
                    TableMetadata {
                        keyspace: "ks".into(),
                        name: "counters".into(),
                        columns: vec![
                            ColumnMetadata::new("pk", CqlType::Text),
                            ColumnMetadata::new("total", CqlType::Counter),
                        ],
                        partition_key: vec![CqlIdentifier::from_internal("pk")],
                        clustering_columns: vec![],
                    },
                ],
                views: vec![],
            }],
            partitioner: Partitioner::Murmur3,
            token_ranges: vec![TokenRange::new(Token(i64::MIN as i128), Token(i64::MIN as i128))],
            protocol: ProtocolFeatures::default(),
        }
    }

    fn capabilities() -> ConnectorCapabilities {
        ConnectorCapabilities {
            supports_indexed_fields: true,
            supports_mapped_fields: true,
        }
    }

    fn config(keyspace: Option<&str>, table: Option<&str>, mapping: Option<&str>) -> SchemaConfig {
        SchemaConfig {
            keyspace: keyspace.map(String::from),
            table: table.map(String::from),
            mapping: mapping.map(String::from),
            ..SchemaConfig::default()
        }
    }

    fn resolve(config: &SchemaConfig, mode: WorkflowMode) -> Result<ResolvedSchema> {
        let cluster = cluster();
        SchemaResolver::new(config, &cluster, capabilities(), mode).resolve()
    }

    #[test]
    fn test_inferred_load_mapping_generates_insert() {
        let schema = resolve(&config(Some("ks"), Some("t1"), None), WorkflowMode::Load).unwrap();
        assert_eq!(
            schema.query,
            "INSERT INTO ks.t1 (c1, \"COL 2\", c3) VALUES (:c1, :\"COL 2\", :c3)"
        );
        assert_eq!(schema.mapping.len(), 3);
        let fields: Vec<String> = schema
            .mapping
            .entries()
            .iter()
            .map(|(f, _)| f.to_string())
            .collect();
        assert_eq!(fields, vec!["c1", "COL 2", "c3"]);
    }

    #[test]
    fn test_wildcard_with_exclusions() {
        let schema = resolve(
            &config(Some("ks"), Some("t1"), Some("* = -c3")),
            WorkflowMode::Load,
        )
        .unwrap();
        assert_eq!(schema.mapping.len(), 2);
        assert_eq!(
            schema.query,
            "INSERT INTO ks.t1 (c1, \"COL 2\") VALUES (:c1, :\"COL 2\")"
        );
    }

    #[test]
    fn test_wildcard_with_override() {
        let schema = resolve(
            &config(Some("ks"), Some("t1"), Some("*=*, field_a = c3")),
            WorkflowMode::Load,
        )
        .unwrap();
        let fields: Vec<String> = schema
            .mapping
            .entries()
            .iter()
            .map(|(f, _)| f.to_string())
            .collect();
        assert_eq!(fields, vec!["c1", "COL 2", "field_a"]);
    }

    #[test]
    fn test_positional_list_mapping() {
        let schema = resolve(
            &config(Some("ks"), Some("t1"), Some("c1, \"COL 2\"")),
            WorkflowMode::Load,
        )
        .unwrap();
        assert_eq!(
            schema.mapping.entries()[0].0,
            Field::Indexed(0)
        );
        assert_eq!(
            schema.query,
            "INSERT INTO ks.t1 (c1, \"COL 2\") VALUES (:c1, :\"COL 2\")"
        );
    }

    #[test]
    fn test_ttl_and_timestamp_pseudo_columns() {
        let schema = resolve(
            &config(Some("ks"), Some("t1"), Some("*=*, f1 = __ttl, f2 = __timestamp")),
            WorkflowMode::Load,
        )
        .unwrap();
        assert!(schema.query.ends_with(
            "USING TTL :\"[ttl]\" AND TIMESTAMP :\"[timestamp]\""
        ));
        assert_eq!(schema.mapping.write_time_variables().len(), 1);
    }

    #[test]
    fn test_counter_table_takes_update_form() {
        let schema = resolve(
            &config(Some("ks"), Some("counters"), None),
            WorkflowMode::Load,
        )
        .unwrap();
        assert_eq!(
            schema.query,
            "UPDATE ks.counters SET total = total + :total WHERE pk = :pk"
        );
    }

    #[test]
    fn test_unload_generates_token_restricted_select() {
        let schema = resolve(&config(Some("ks"), Some("t1"), None), WorkflowMode::Unload).unwrap();
        assert_eq!(
            schema.query,
            "SELECT c1, \"COL 2\", c3 FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end"
        );
        assert!(matches!(schema.token_clause, TokenClause::Named { .. }));
    }

    #[test]
    fn test_count_modes() {
        let schema = resolve(&config(Some("ks"), Some("t1"), None), WorkflowMode::Count).unwrap();
        assert_eq!(
            schema.query,
            "SELECT c1 FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end"
        );
        assert!(schema.mapping.is_empty());

        let mut counting = config(Some("ks"), Some("counters"), None);
        counting.stats = vec![StatsMode::Partitions];
        let err = resolve(&counting, WorkflowMode::Count).unwrap_err();
        assert!(err
            .to_string()
            .contains("Cannot count partitions for table counters: it has no clustering column."));
    }

    #[test]
    fn test_custom_count_query_trimmed_to_minimal_selection() {
        let mut counting = config(None, None, None);
        counting.query = Some("SELECT c1, \"COL 2\", c3 FROM ks.t1".into());
        let schema = resolve(&counting, WorkflowMode::Count).unwrap();
        assert_eq!(schema.query, "SELECT c1 FROM ks.t1");
        assert!(schema.mapping.is_empty());

        let mut star = config(None, None, None);
        star.query =
            Some("SELECT * FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end".into());
        let schema = resolve(&star, WorkflowMode::Count).unwrap();
        assert_eq!(
            schema.query,
            "SELECT c1 FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end"
        );
        assert!(matches!(schema.token_clause, TokenClause::Named { .. }));
    }

    #[test]
    fn test_custom_count_query_smaller_selection_kept() {
        let mut counting = config(None, None, None);
        counting.query = Some("SELECT c1 FROM ks.t1".into());
        counting.stats = vec![StatsMode::Ranges];
        let schema = resolve(&counting, WorkflowMode::Count).unwrap();
        assert_eq!(schema.query, "SELECT c1 FROM ks.t1");
    }

    #[test]
    fn test_custom_count_partitions_needs_clustering_column() {
        let mut counting = config(None, None, None);
        counting.query = Some("SELECT pk FROM ks.counters".into());
        counting.stats = vec![StatsMode::Partitions];
        let err = resolve(&counting, WorkflowMode::Count).unwrap_err();
        assert!(err
            .to_string()
            .contains("Cannot count partitions for table counters: it has no clustering column."));
    }

    #[test]
    fn test_count_rejects_mapping() {
        let err = resolve(
            &config(Some("ks"), Some("t1"), Some("*=*")),
            WorkflowMode::Count,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not be defined when counting"));
    }

    #[test]
    fn test_keyspace_did_you_mean() {
        let err = resolve(&config(Some("KS"), Some("t1"), None), WorkflowMode::Load).unwrap_err();
        assert!(err.to_string().contains("did you mean ks?"));
    }

    #[test]
    fn test_unknown_column_diagnostic() {
        let err = resolve(
            &config(Some("ks"), Some("t1"), Some("f1 = c9")),
            WorkflowMode::Load,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("doesn't match any column found in table t1"));
    }

    #[test]
    fn test_duplicate_variable_names_fields_and_variable() {
        let err = resolve(
            &config(Some("ks"), Some("t1"), Some("f1 = c1, f2 = c1, f3 = \"COL 2\", f4 = c3")),
            WorkflowMode::Load,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("c1"));
        assert!(message.contains("f1"));
        assert!(message.contains("f2"));
    }

    #[test]
    fn test_misplaced_function_calls() {
        let err = resolve(
            &config(Some("ks"), Some("t1"), Some("f1 = now(), f2 = c1")),
            WorkflowMode::Load,
        )
        .unwrap_err();
        assert!(err.to_string().contains("right side"));

        let err = resolve(
            &config(Some("ks"), Some("t1"), Some("now() = c1")),
            WorkflowMode::Unload,
        )
        .unwrap_err();
        assert!(err.to_string().contains("left side"));
    }

    #[test]
    fn test_generated_function_value_on_load() {
        let schema = resolve(
            &config(Some("ks"), Some("t1"), Some("f1 = c1, f2 = \"COL 2\", now() = c3")),
            WorkflowMode::Load,
        )
        .unwrap();
        assert!(schema.query.contains("now()"));
        // the function entry binds no record field
        assert_eq!(schema.mapping.len(), 2);
    }

    #[test]
    fn test_missing_primary_key_column() {
        let err = resolve(
            &config(Some("ks"), Some("t1"), Some("f1 = c3")),
            WorkflowMode::Load,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("Missing required primary key column c1"));
    }

    #[test]
    fn test_capability_mismatch() {
        let cluster = cluster();
        let indexed_only = ConnectorCapabilities {
            supports_indexed_fields: true,
            supports_mapped_fields: false,
        };
        let config = config(Some("ks"), Some("t1"), Some("f1 = c1"));
        let err = SchemaResolver::new(&config, &cluster, indexed_only, WorkflowMode::Load)
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("connector only supports indexed fields"));
    }

    #[test]
    fn test_custom_query_load() {
        let mut custom = config(None, None, None);
        custom.query = Some("INSERT INTO ks.t1 (c1, \"COL 2\") VALUES (:c1, :\"COL 2\")".into());
        let schema = resolve(&custom, WorkflowMode::Load).unwrap();
        assert_eq!(schema.mapping.len(), 2);
        assert_eq!(schema.token_clause, TokenClause::Absent);
    }

    #[test]
    fn test_custom_query_keyspace_conflicts() {
        let mut custom = config(Some("ks"), None, None);
        custom.query = Some("INSERT INTO ks.t1 (c1, \"COL 2\") VALUES (:c1, :\"COL 2\")".into());
        let err = resolve(&custom, WorkflowMode::Load).unwrap_err();
        assert!(err.to_string().contains("must not be defined"));

        let mut unqualified = config(None, None, None);
        unqualified.query = Some("INSERT INTO t1 (c1, \"COL 2\") VALUES (:c1, :\"COL 2\")".into());
        let err = resolve(&unqualified, WorkflowMode::Load).unwrap_err();
        assert!(err.to_string().contains("must be defined"));
    }

    #[test]
    fn test_custom_query_ttl_requires_using_clause() {
        let mut custom = config(None, None, Some("f1 = c1, f2 = \"COL 2\", f3 = __ttl"));
        custom.query = Some("INSERT INTO ks.t1 (c1, \"COL 2\") VALUES (:c1, :\"COL 2\")".into());
        let err = resolve(&custom, WorkflowMode::Load).unwrap_err();
        assert!(err
            .to_string()
            .contains("does not contain a USING TTL clause"));

        let mut with_using = config(None, None, Some("f1 = c1, f2 = \"COL 2\", f3 = __ttl"));
        with_using.query = Some(
            "INSERT INTO ks.t1 (c1, \"COL 2\") VALUES (:c1, :\"COL 2\") USING TTL :ttl_var".into(),
        );
        let schema = resolve(&with_using, WorkflowMode::Load).unwrap();
        let ttl_fragments = schema.mapping.fragments_for(&Field::Named("f3".into()));
        assert_eq!(
            ttl_fragments[0].variable().as_internal(),
            "ttl_var"
        );
    }

    #[test]
    fn test_custom_query_unload_with_token_clause() {
        let mut custom = config(None, None, None);
        custom.query = Some(
            "SELECT c1, \"COL 2\" FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end"
                .into(),
        );
        let schema = resolve(&custom, WorkflowMode::Unload).unwrap();
        assert_eq!(schema.mapping.len(), 2);
        assert!(matches!(schema.token_clause, TokenClause::Named { .. }));
        let statements = schema.read_plan(4).unwrap();
        assert_eq!(statements.len(), 4);
    }

    #[test]
    fn test_custom_query_wrong_kind() {
        let mut custom = config(None, None, None);
        custom.query = Some("SELECT c1 FROM ks.t1".into());
        assert!(resolve(&custom, WorkflowMode::Load).is_err());

        let mut write = config(None, None, None);
        write.query = Some("INSERT INTO ks.t1 (c1) VALUES (:c1)".into());
        assert!(resolve(&write, WorkflowMode::Unload).is_err());
    }

    #[test]
    fn test_config_mutual_exclusions() {
        let mut both = config(Some("ks"), Some("t1"), None);
        both.query = Some("SELECT c1 FROM ks.t1".into());
        assert!(resolve(&both, WorkflowMode::Unload).is_err());

        let neither = config(Some("ks"), None, None);
        assert!(resolve(&neither, WorkflowMode::Load).is_err());
    }
}
