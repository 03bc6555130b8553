//! CQL statement generation
//!
//! Produces the final statement text for generated (non-custom)
//! workflows: INSERT (or the counter UPDATE form) for load, SELECT for
//! unload and counting, plus the token-range-bounded read plan.

use crate::config::StatsMode;
use crate::cql::{CqlFragment, CqlIdentifier, FunctionCall, TTL_VARNAME, WRITETIME_VARNAME};
use crate::error::{Error, Result};
use crate::metadata::{ProtocolFeatures, TableLike};
use crate::query::inspector::TokenClause;
use crate::record::{Bound, BoundStatement, ReadStatement};
use crate::token::{Partitioner, Token, TokenRangeSplitter};
use crate::types::CqlValue;
use tracing::debug;

/// A TTL or timestamp setting of a generated write statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTimeValue {
    /// A fixed value baked into the statement text
    Literal(i64),
    /// A per-record bound variable (`:"[ttl]"` / `:"[timestamp]"`)
    Variable,
}

/// The USING clause of a generated write statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsingClause {
    pub ttl: Option<WriteTimeValue>,
    pub timestamp: Option<WriteTimeValue>,
}

impl UsingClause {
    pub fn is_empty(&self) -> bool {
        self.ttl.is_none() && self.timestamp.is_none()
    }

    fn render(&self, protocol: ProtocolFeatures) -> String {
        let mut parts = Vec::new();
        if let Some(ttl) = self.ttl {
            parts.push(format!("TTL {}", render_write_time(ttl, TTL_VARNAME, protocol)));
        }
        if let Some(timestamp) = self.timestamp {
            parts.push(format!(
                "TIMESTAMP {}",
                render_write_time(timestamp, WRITETIME_VARNAME, protocol)
            ));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" USING {}", parts.join(" AND "))
        }
    }
}

fn render_write_time(value: WriteTimeValue, varname: &str, protocol: ProtocolFeatures) -> String {
    match value {
        WriteTimeValue::Literal(n) => n.to_string(),
        WriteTimeValue::Variable if protocol.named_bound_variables => {
            format!(":{}", CqlIdentifier::from_internal(varname).as_cql())
        }
        WriteTimeValue::Variable => "?".to_string(),
    }
}

fn placeholder(column: &CqlIdentifier, protocol: ProtocolFeatures) -> String {
    if protocol.named_bound_variables {
        format!(":{}", column.as_display())
    } else {
        "?".to_string()
    }
}

fn qualified_table(table: &TableLike) -> String {
    format!(
        "{}.{}",
        CqlIdentifier::from_internal(table.keyspace()).as_display(),
        CqlIdentifier::from_internal(table.name()).as_display()
    )
}

/// Generate the INSERT statement for a load workflow.
///
/// Each entry is a column plus an optional generated-value function; a
/// column without one binds a placeholder.
pub fn insert_statement(
    table: &TableLike,
    columns: &[(CqlIdentifier, Option<FunctionCall>)],
    protocol: ProtocolFeatures,
    using: &UsingClause,
) -> String {
    let names = columns
        .iter()
        .map(|(c, _)| c.as_display())
        .collect::<Vec<_>>()
        .join(", ");
    let values = columns
        .iter()
        .map(|(c, generated)| match generated {
            Some(call) => call.to_string(),
            None => placeholder(c, protocol),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let statement = format!(
        "INSERT INTO {} ({}) VALUES ({}){}",
        qualified_table(table),
        names,
        values,
        using.render(protocol)
    );
    debug!(statement = %statement, "generated insert statement");
    statement
}

/// Generate the UPDATE increment statement for loading a counter table.
///
/// Counter columns take the `c = c + x` form in SET; the primary key
/// columns become WHERE conditions, in primary key order.
pub fn counter_update_statement(
    table: &TableLike,
    columns: &[CqlIdentifier],
    protocol: ProtocolFeatures,
) -> String {
    let primary_key = table.primary_key();
    let increments = columns
        .iter()
        .filter(|c| !primary_key.contains(c))
        .map(|c| {
            format!(
                "{} = {} + {}",
                c.as_display(),
                c.as_display(),
                placeholder(c, protocol)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    let conditions = primary_key
        .iter()
        .map(|c| format!("{} = {}", c.as_display(), placeholder(c, protocol)))
        .collect::<Vec<_>>()
        .join(" AND ");
    let statement = format!(
        "UPDATE {} SET {} WHERE {}",
        qualified_table(table),
        increments,
        conditions
    );
    debug!(statement = %statement, "generated counter update statement");
    statement
}

fn render_selector(fragment: &CqlFragment, protocol: ProtocolFeatures) -> String {
    match fragment {
        CqlFragment::Column(id) => id.as_display(),
        // function selectors are aliased by their display text so the
        // result set variable has a predictable name
        CqlFragment::Function(call) if protocol.named_bound_variables => {
            format!(
                "{} AS {}",
                call,
                CqlIdentifier::from_internal(call.to_string()).as_cql()
            )
        }
        CqlFragment::Function(call) => call.to_string(),
        CqlFragment::Ttl | CqlFragment::Writetime => fragment.variable().as_display(),
    }
}

/// Generate the base SELECT statement for an unload workflow, without
/// any token range restriction
pub fn select_statement(
    table: &TableLike,
    selectors: &[CqlFragment],
    protocol: ProtocolFeatures,
) -> String {
    let selection = selectors
        .iter()
        .map(|s| render_selector(s, protocol))
        .collect::<Vec<_>>()
        .join(", ");
    let statement = format!("SELECT {} FROM {}", selection, qualified_table(table));
    debug!(statement = %statement, "generated select statement");
    statement
}

/// The minimal selected columns a counting workflow needs.
///
/// Global and per-partition counts need the partition key columns;
/// per-host and per-range counts only need the partition token.
pub fn count_selection(table: &TableLike, stats: &[StatsMode]) -> Result<Vec<String>> {
    if stats.contains(&StatsMode::Partitions) && table.clustering_columns().is_empty() {
        return Err(Error::configuration(format!(
            "Cannot count partitions for table {}: it has no clustering column.",
            table.name()
        )));
    }
    if stats
        .iter()
        .any(|s| matches!(s, StatsMode::Hosts | StatsMode::Ranges))
    {
        let token_args = table
            .partition_key()
            .iter()
            .map(CqlIdentifier::as_display)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(vec![format!("token({})", token_args)])
    } else {
        Ok(table
            .partition_key()
            .iter()
            .map(CqlIdentifier::as_display)
            .collect())
    }
}

/// Generate the SELECT statement for a counting workflow
pub fn count_select_statement(table: &TableLike, stats: &[StatsMode]) -> Result<String> {
    Ok(format!(
        "SELECT {} FROM {}",
        count_selection(table, stats)?.join(", "),
        qualified_table(table)
    ))
}

/// The token range restriction appended to generated read statements
pub fn token_restriction(table: &TableLike, protocol: ProtocolFeatures) -> (String, TokenClause) {
    let token_args = table
        .partition_key()
        .iter()
        .map(CqlIdentifier::as_display)
        .collect::<Vec<_>>()
        .join(", ");
    if protocol.named_bound_variables {
        let clause = format!(
            " WHERE token({}) > :start AND token({}) <= :end",
            token_args, token_args
        );
        (
            clause,
            TokenClause::Named {
                start: CqlIdentifier::from_internal("start"),
                end: CqlIdentifier::from_internal("end"),
            },
        )
    } else {
        let clause = format!(
            " WHERE token({}) > ? AND token({}) <= ?",
            token_args, token_args
        );
        (clause, TokenClause::Positional)
    }
}

/// Produces the ordered list of token-range-bounded read statements
#[derive(Debug, Clone)]
pub struct ReadStatementGenerator {
    query: String,
    token_clause: TokenClause,
    keyspace: String,
    partitioner: Partitioner,
}

impl ReadStatementGenerator {
    pub fn new(
        query: impl Into<String>,
        token_clause: TokenClause,
        keyspace: impl Into<String>,
        partitioner: Partitioner,
    ) -> Self {
        Self {
            query: query.into(),
            token_clause,
            keyspace: keyspace.into(),
            partitioner,
        }
    }

    /// Bind one statement per sub-range, in round-robin order across
    /// the input ranges. For a single split and no token restriction
    /// the plan is one unconstrained statement.
    pub fn generate(
        &self,
        splitter: &TokenRangeSplitter,
        splits: usize,
    ) -> Result<Vec<ReadStatement>> {
        let (start_name, end_name) = match &self.token_clause {
            TokenClause::Named { start, end } => (start.clone(), end.clone()),
            TokenClause::Positional => (
                CqlIdentifier::from_internal("start"),
                CqlIdentifier::from_internal("end"),
            ),
            TokenClause::Unrecognized(clause) => {
                if splits > 1 {
                    return Err(Error::configuration(format!(
                        "The provided query contains unrecognized WHERE restrictions: '{}'; \
                         the WHERE clause is only allowed to contain one token range restriction \
                         of the form: WHERE token(...) > ? AND token(...) <= ?",
                        clause
                    )));
                }
                return Ok(vec![self.unconstrained()]);
            }
            TokenClause::Absent => {
                if splits > 1 {
                    return Err(Error::configuration(
                        "Cannot split the provided query: it does not contain a token range \
                         restriction of the form: WHERE token(...) > ? AND token(...) <= ?",
                    ));
                }
                return Ok(vec![self.unconstrained()]);
            }
        };
        let ranges = splitter.split(splits);
        debug!(
            splits = splits,
            statements = ranges.len(),
            "generated read statement plan"
        );
        Ok(ranges
            .into_iter()
            .map(|range| ReadStatement {
                statement: BoundStatement {
                    query: self.query.clone(),
                    values: vec![
                        (start_name.clone(), Bound::Value(self.token_value(range.start))),
                        (end_name.clone(), Bound::Value(self.token_value(range.end))),
                    ],
                    routing_keyspace: self.keyspace.clone(),
                    routing_token: Some(range.end),
                },
                range: Some(range),
            })
            .collect())
    }

    fn unconstrained(&self) -> ReadStatement {
        ReadStatement {
            statement: BoundStatement {
                query: self.query.clone(),
                values: Vec::new(),
                routing_keyspace: self.keyspace.clone(),
                routing_token: None,
            },
            range: None,
        }
    }

    /// Token values bind as bigint under Murmur3 and varint under the
    /// random partitioner
    fn token_value(&self, token: Token) -> CqlValue {
        match self.partitioner {
            Partitioner::Murmur3 => CqlValue::Bigint(token.0 as i64),
            Partitioner::Random => CqlValue::Varint(token.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnMetadata, TableMetadata};
    use crate::token::TokenRange;
    use crate::types::CqlType;

    fn table() -> TableLike {
        TableLike::Table(TableMetadata {
            keyspace: "ks".into(),
            name: "t1".into(),
            columns: vec![
                ColumnMetadata::new("c1", CqlType::Text),
                ColumnMetadata::new("COL 2", CqlType::Bigint),
                ColumnMetadata::new("c3", CqlType::Text),
            ],
            partition_key: vec![CqlIdentifier::from_internal("c1")],
            clustering_columns: vec![CqlIdentifier::from_internal("COL 2")],
        })
    }

    fn counter_table() -> TableLike {
        TableLike::Table(TableMetadata {
            keyspace: "ks".into(),
            name: "t1".into(),
            columns: vec![
                ColumnMetadata::new("c1", CqlType::Text),
                ColumnMetadata::new("COL 2", CqlType::Counter),
                ColumnMetadata::new("c3", CqlType::Counter),
            ],
            partition_key: vec![CqlIdentifier::from_internal("c1")],
            clustering_columns: vec![],
        })
    }

    fn columns(names: &[&str]) -> Vec<(CqlIdentifier, Option<FunctionCall>)> {
        names
            .iter()
            .map(|n| (CqlIdentifier::from_internal(*n), None))
            .collect()
    }

    fn key_columns(names: &[&str]) -> Vec<CqlIdentifier> {
        names.iter().map(|n| CqlIdentifier::from_internal(*n)).collect()
    }

    #[test]
    fn test_insert_named() {
        let statement = insert_statement(
            &table(),
            &columns(&["COL 2", "c1"]),
            ProtocolFeatures::default(),
            &UsingClause::default(),
        );
        assert_eq!(
            statement,
            "INSERT INTO ks.t1 (\"COL 2\", c1) VALUES (:\"COL 2\", :c1)"
        );
    }

    #[test]
    fn test_insert_positional() {
        let statement = insert_statement(
            &table(),
            &columns(&["COL 2", "c1"]),
            ProtocolFeatures::legacy(),
            &UsingClause::default(),
        );
        assert_eq!(statement, "INSERT INTO ks.t1 (\"COL 2\", c1) VALUES (?, ?)");
    }

    #[test]
    fn test_insert_using_clauses() {
        let literal = insert_statement(
            &table(),
            &columns(&["c1"]),
            ProtocolFeatures::default(),
            &UsingClause {
                ttl: Some(WriteTimeValue::Literal(30)),
                timestamp: None,
            },
        );
        assert_eq!(literal, "INSERT INTO ks.t1 (c1) VALUES (:c1) USING TTL 30");

        let variables = insert_statement(
            &table(),
            &columns(&["c1"]),
            ProtocolFeatures::default(),
            &UsingClause {
                ttl: Some(WriteTimeValue::Variable),
                timestamp: Some(WriteTimeValue::Variable),
            },
        );
        assert_eq!(
            variables,
            "INSERT INTO ks.t1 (c1) VALUES (:c1) USING TTL :\"[ttl]\" AND TIMESTAMP :\"[timestamp]\""
        );
    }

    #[test]
    fn test_insert_generated_function_value() {
        let mut entries = columns(&["c1"]);
        entries.push((
            CqlIdentifier::from_internal("c3"),
            Some(FunctionCall::new(CqlIdentifier::from_internal("now"), vec![])),
        ));
        let statement = insert_statement(
            &table(),
            &entries,
            ProtocolFeatures::default(),
            &UsingClause::default(),
        );
        assert_eq!(statement, "INSERT INTO ks.t1 (c1, c3) VALUES (:c1, now())");
    }

    #[test]
    fn test_counter_update() {
        let statement = counter_update_statement(
            &counter_table(),
            &key_columns(&["c1", "COL 2", "c3"]),
            ProtocolFeatures::default(),
        );
        assert_eq!(
            statement,
            "UPDATE ks.t1 SET \"COL 2\" = \"COL 2\" + :\"COL 2\", c3 = c3 + :c3 WHERE c1 = :c1"
        );
    }

    #[test]
    fn test_select_with_function_selector() {
        let selectors = vec![
            CqlFragment::Column(CqlIdentifier::from_internal("c1")),
            CqlFragment::Function(crate::cql::FunctionCall::new(
                CqlIdentifier::from_internal("now"),
                vec![],
            )),
        ];
        let statement = select_statement(&table(), &selectors, ProtocolFeatures::default());
        assert_eq!(
            statement,
            "SELECT c1, now() AS \"now()\" FROM ks.t1"
        );
    }

    #[test]
    fn test_token_restriction_forms() {
        let (named, clause) = token_restriction(&table(), ProtocolFeatures::default());
        assert_eq!(named, " WHERE token(c1) > :start AND token(c1) <= :end");
        assert!(matches!(clause, TokenClause::Named { .. }));

        let (positional, clause) = token_restriction(&table(), ProtocolFeatures::legacy());
        assert_eq!(positional, " WHERE token(c1) > ? AND token(c1) <= ?");
        assert_eq!(clause, TokenClause::Positional);
    }

    #[test]
    fn test_count_selects_minimal_columns() {
        let global = count_select_statement(&table(), &[StatsMode::Global]).unwrap();
        assert_eq!(global, "SELECT c1 FROM ks.t1");

        let ranges = count_select_statement(&table(), &[StatsMode::Ranges]).unwrap();
        assert_eq!(ranges, "SELECT token(c1) FROM ks.t1");
    }

    #[test]
    fn test_count_partitions_requires_clustering_column() {
        let err = count_select_statement(&counter_table(), &[StatsMode::Partitions]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Cannot count partitions for table t1: it has no clustering column."
        );
    }

    #[test]
    fn test_read_plan_binds_subranges() {
        let splitter = TokenRangeSplitter::new(
            Partitioner::Murmur3,
            vec![TokenRange::new(Token(0), Token(1000))],
        )
        .unwrap();
        let generator = ReadStatementGenerator::new(
            "SELECT c1 FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end",
            TokenClause::Named {
                start: CqlIdentifier::from_internal("start"),
                end: CqlIdentifier::from_internal("end"),
            },
            "ks",
            Partitioner::Murmur3,
        );
        let statements = generator.generate(&splitter, 4).unwrap();
        assert_eq!(statements.len(), 4);
        let first = &statements[0];
        assert_eq!(first.statement.values.len(), 2);
        assert_eq!(
            first.statement.routing_token,
            first.range.map(|r| r.end)
        );
    }

    #[test]
    fn test_read_plan_single_split_with_restriction_stays_bound() {
        let splitter = TokenRangeSplitter::new(
            Partitioner::Murmur3,
            vec![TokenRange::new(Token(0), Token(1000))],
        )
        .unwrap();
        let generator = ReadStatementGenerator::new(
            "SELECT c1 FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end",
            TokenClause::Named {
                start: CqlIdentifier::from_internal("start"),
                end: CqlIdentifier::from_internal("end"),
            },
            "ks",
            Partitioner::Murmur3,
        );
        let statements = generator.generate(&splitter, 1).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].range,
            Some(TokenRange::new(Token(0), Token(1000)))
        );
        assert_eq!(statements[0].statement.values.len(), 2);
    }

    #[test]
    fn test_read_plan_single_unconstrained() {
        let splitter = TokenRangeSplitter::new(
            Partitioner::Murmur3,
            vec![TokenRange::new(Token(0), Token(1000))],
        )
        .unwrap();
        let generator = ReadStatementGenerator::new(
            "SELECT c1 FROM ks.t1",
            TokenClause::Absent,
            "ks",
            Partitioner::Murmur3,
        );
        let statements = generator.generate(&splitter, 1).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].statement.values.is_empty());
        assert!(statements[0].range.is_none());
    }

    #[test]
    fn test_read_plan_rejects_unrecognized_restriction_when_splitting() {
        let splitter = TokenRangeSplitter::new(
            Partitioner::Murmur3,
            vec![TokenRange::new(Token(0), Token(1000))],
        )
        .unwrap();
        let generator = ReadStatementGenerator::new(
            "SELECT c1 FROM ks.t1 WHERE c1 = 1",
            TokenClause::Unrecognized("c1 = 1".into()),
            "ks",
            Partitioner::Murmur3,
        );
        let err = generator.generate(&splitter, 4).unwrap_err();
        assert!(err.to_string().contains("unrecognized WHERE restrictions"));
        assert!(err.to_string().contains("c1 = 1"));

        // harmless when no splitting is requested
        assert_eq!(generator.generate(&splitter, 1).unwrap().len(), 1);
    }
}
