//! Query inspection and statement generation
//!
//! The inspector parses user-supplied CQL and extracts the pieces the
//! mapping resolver needs; the generator produces the final statement
//! text for generated workflows and the token-range-bounded read plan.

pub mod generator;
pub mod inspector;

pub use generator::{
    count_select_statement, count_selection, counter_update_statement, insert_statement,
    select_statement,
    token_restriction, ReadStatementGenerator, UsingClause, WriteTimeValue,
};
pub use inspector::{
    inspect, QueryInspection, QueryTerm, SelectedColumn, StatementKind, TokenClause,
};
