//! CQL statement inspection
//!
//! Parses SELECT, INSERT and UPDATE statements far enough to extract
//! bound variable names (in column order), selected columns, USING
//! TTL/TIMESTAMP variables and an existing token range restriction.
//! Anything in a WHERE clause that is not the exact token restriction
//! shape is recorded verbatim as unrecognized; whether that is fatal is
//! decided by the read plan, not here.

use crate::cql::{
    CqlIdentifier, CqlFragment, FunctionCall, TTL_VARNAME, WRITETIME_VARNAME,
};
use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, opt, recognize, rest},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// The statement kinds the inspector understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
}

/// One selector of a SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedColumn {
    pub fragment: CqlFragment,
    pub alias: Option<CqlIdentifier>,
}

impl SelectedColumn {
    /// The result set variable this selector is addressed by: the
    /// alias when present, otherwise the fragment's own variable
    pub fn variable(&self) -> CqlIdentifier {
        self.alias
            .clone()
            .unwrap_or_else(|| self.fragment.variable())
    }
}

/// A term appearing where a bound value may go
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTerm {
    /// A positional `?` placeholder
    Positional,
    /// A named `:identifier` placeholder
    Variable(CqlIdentifier),
    /// A function call such as `now()`
    Function(FunctionCall),
    /// A literal value, kept verbatim
    Literal(String),
}

/// The token range restriction found in a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum TokenClause {
    /// No WHERE clause at all
    Absent,
    /// `token(...) > :start AND token(...) <= :end`
    Named {
        start: CqlIdentifier,
        end: CqlIdentifier,
    },
    /// `token(...) > ? AND token(...) <= ?`
    Positional,
    /// Any other WHERE clause content, kept verbatim
    Unrecognized(String),
}

/// Everything extracted from one statement
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInspection {
    pub kind: StatementKind,
    pub keyspace: Option<CqlIdentifier>,
    pub table: CqlIdentifier,
    /// SELECT `*` marker; expansion is deferred to the mapping resolver
    pub star: bool,
    /// SELECT selectors, in selection order
    pub selectors: Vec<SelectedColumn>,
    /// INSERT/UPDATE column-to-term pairs, in column order (SET
    /// assignments first, then WHERE conditions for UPDATE)
    pub assignments: Vec<(CqlIdentifier, QueryTerm)>,
    pub token_clause: TokenClause,
    pub has_using_ttl: bool,
    pub has_using_timestamp: bool,
    /// Bound variable of the USING TTL clause, when not a literal
    pub ttl_variable: Option<CqlIdentifier>,
    /// Bound variable of the USING TIMESTAMP clause, when not a literal
    pub timestamp_variable: Option<CqlIdentifier>,
}

impl QueryInspection {
    /// Bound variables of a write statement, in binding order; `?`
    /// placeholders bind under the name of their column
    pub fn bound_variables(&self) -> Vec<CqlIdentifier> {
        let mut variables = Vec::new();
        for (column, term) in &self.assignments {
            match term {
                QueryTerm::Positional => variables.push(column.clone()),
                QueryTerm::Variable(name) => variables.push(name.clone()),
                QueryTerm::Function(_) | QueryTerm::Literal(_) => {}
            }
        }
        variables.extend(self.ttl_variable.clone());
        variables.extend(self.timestamp_variable.clone());
        variables
    }

    /// Result set variables of a read statement, in selection order
    pub fn result_variables(&self) -> Vec<CqlIdentifier> {
        self.selectors.iter().map(SelectedColumn::variable).collect()
    }
}

/// Inspect a CQL statement
pub fn inspect(query: &str) -> Result<QueryInspection> {
    let text = query.trim().trim_end_matches(';').trim();
    let result = alt((select_statement, insert_statement, update_statement))(text);
    match result {
        Ok((_, inspection)) => Ok(inspection),
        Err(_) => Err(Error::query_parse(format!(
            "Invalid query: '{}'; expecting SELECT, INSERT or UPDATE",
            query.trim()
        ))),
    }
}

fn keyword(s: &str) -> impl Fn(&str) -> IResult<&str, &str> + '_ {
    move |input| tag_no_case(s)(input)
}

fn ws(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

fn ws1(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_whitespace())(input)
}

fn identifier(input: &str) -> IResult<&str, CqlIdentifier> {
    map(
        alt((
            recognize(delimited(
                char('"'),
                many0(alt((tag("\"\""), take_while1(|c: char| c != '"')))),
                char('"'),
            )),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        CqlIdentifier::from_user_input,
    )(input)
}

fn qualified_name(input: &str) -> IResult<&str, (Option<CqlIdentifier>, CqlIdentifier)> {
    let (input, first) = identifier(input)?;
    let (input, second) = opt(preceded(char('.'), identifier))(input)?;
    Ok(match second {
        Some(table) => (input, (Some(first), table)),
        None => (input, (None, first)),
    })
}

fn function_call(input: &str) -> IResult<&str, FunctionCall> {
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        pair(char('('), ws),
        separated_list0(
            tuple((ws, char(','), ws)),
            map(take_while1(|c: char| c != ',' && c != ')'), |s: &str| {
                s.trim().to_string()
            }),
        ),
        pair(ws, char(')')),
    )(input)?;
    Ok((input, FunctionCall::new(name, args)))
}

fn term(input: &str) -> IResult<&str, QueryTerm> {
    alt((
        map(char('?'), |_| QueryTerm::Positional),
        map(preceded(char(':'), identifier), QueryTerm::Variable),
        map(function_call, QueryTerm::Function),
        map(
            recognize(delimited(
                char('\''),
                take_while(|c: char| c != '\''),
                char('\''),
            )),
            |s: &str| QueryTerm::Literal(s.to_string()),
        ),
        map(
            take_while1(|c: char| !c.is_whitespace() && c != ',' && c != ')'),
            |s: &str| QueryTerm::Literal(s.to_string()),
        ),
    ))(input)
}

fn selector(input: &str) -> IResult<&str, SelectedColumn> {
    let (input, fragment) = alt((
        map(function_call, CqlFragment::Function),
        map(identifier, CqlFragment::Column),
    ))(input)?;
    let (input, alias) = opt(preceded(
        tuple((ws1, keyword("AS"), ws1)),
        identifier,
    ))(input)?;
    Ok((input, SelectedColumn { fragment, alias }))
}

fn token_variable(input: &str) -> IResult<&str, Option<CqlIdentifier>> {
    alt((
        map(char('?'), |_| None),
        map(preceded(char(':'), identifier), Some),
    ))(input)
}

fn token_function(input: &str) -> IResult<&str, ()> {
    map(
        tuple((
            keyword("token"),
            ws,
            char('('),
            separated_list1(tuple((ws, char(','), ws)), preceded(ws, identifier)),
            ws,
            char(')'),
        )),
        |_| (),
    )(input)
}

/// The exact restriction shape `token(...) > x AND token(...) <= x`
fn token_restriction_clause(input: &str) -> IResult<&str, TokenClause> {
    let (input, _) = token_function(input)?;
    let (input, _) = tuple((ws, char('>'), ws))(input)?;
    let (input, start) = token_variable(input)?;
    let (input, _) = tuple((ws1, keyword("AND"), ws1))(input)?;
    let (input, _) = token_function(input)?;
    let (input, _) = tuple((ws, tag("<="), ws))(input)?;
    let (input, end) = token_variable(input)?;
    let clause = match (start, end) {
        (Some(start), Some(end)) => TokenClause::Named { start, end },
        (None, None) => TokenClause::Positional,
        // mixed placeholder styles cannot be rebound uniformly
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )))
        }
    };
    Ok((input, clause))
}

fn where_clause(input: &str) -> IResult<&str, TokenClause> {
    let (input, _) = tuple((ws1, keyword("WHERE"), ws1))(input)?;
    let (input, body) = rest(input)?;
    let body = body.trim();
    match all_consuming(delimited(ws, token_restriction_clause, ws))(body) {
        Ok((_, clause)) => Ok((input, clause)),
        Err(_) => Ok((input, TokenClause::Unrecognized(body.to_string()))),
    }
}

fn using_item(input: &str) -> IResult<&str, (bool, Option<CqlIdentifier>, bool, Option<CqlIdentifier>)> {
    alt((
        map(
            preceded(pair(keyword("TTL"), ws1), term),
            |t| (true, using_variable(t, TTL_VARNAME), false, None),
        ),
        map(
            preceded(pair(keyword("TIMESTAMP"), ws1), term),
            |t| (false, None, true, using_variable(t, WRITETIME_VARNAME)),
        ),
    ))(input)
}

fn using_variable(term: QueryTerm, positional_name: &str) -> Option<CqlIdentifier> {
    match term {
        QueryTerm::Variable(name) => Some(name),
        QueryTerm::Positional => Some(CqlIdentifier::from_internal(positional_name)),
        QueryTerm::Function(_) | QueryTerm::Literal(_) => None,
    }
}

fn using_clause(
    input: &str,
) -> IResult<&str, (bool, Option<CqlIdentifier>, bool, Option<CqlIdentifier>)> {
    let (input, _) = tuple((ws1, keyword("USING"), ws1))(input)?;
    let (input, items) =
        separated_list1(tuple((ws1, keyword("AND"), ws1)), using_item)(input)?;
    let mut merged = (false, None, false, None);
    for (ttl, ttl_var, ts, ts_var) in items {
        if ttl {
            merged.0 = true;
            merged.1 = ttl_var;
        }
        if ts {
            merged.2 = true;
            merged.3 = ts_var;
        }
    }
    Ok((input, merged))
}

fn select_statement(input: &str) -> IResult<&str, QueryInspection> {
    let (input, _) = pair(keyword("SELECT"), ws1)(input)?;
    let (input, (star, selectors)) = alt((
        map(char('*'), |_| (true, Vec::new())),
        map(
            separated_list1(tuple((ws, char(','), ws)), selector),
            |selectors| (false, selectors),
        ),
    ))(input)?;
    let (input, _) = tuple((ws1, keyword("FROM"), ws1))(input)?;
    let (input, (keyspace, table)) = qualified_name(input)?;
    let (input, token_clause) = opt(where_clause)(input)?;
    Ok((
        input,
        QueryInspection {
            kind: StatementKind::Select,
            keyspace,
            table,
            star,
            selectors,
            assignments: Vec::new(),
            token_clause: token_clause.unwrap_or(TokenClause::Absent),
            has_using_ttl: false,
            has_using_timestamp: false,
            ttl_variable: None,
            timestamp_variable: None,
        },
    ))
}

fn insert_statement(input: &str) -> IResult<&str, QueryInspection> {
    let (input, _) = tuple((keyword("INSERT"), ws1, keyword("INTO"), ws1))(input)?;
    let (input, (keyspace, table)) = qualified_name(input)?;
    let (input, columns) = delimited(
        tuple((ws, char('('), ws)),
        separated_list1(tuple((ws, char(','), ws)), identifier),
        tuple((ws, char(')'))),
    )(input)?;
    let (input, _) = tuple((ws, keyword("VALUES"), ws))(input)?;
    let (input, values) = delimited(
        pair(char('('), ws),
        separated_list1(tuple((ws, char(','), ws)), term),
        pair(ws, char(')')),
    )(input)?;
    if columns.len() != values.len() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let (input, using) = opt(using_clause)(input)?;
    let (has_using_ttl, ttl_variable, has_using_timestamp, timestamp_variable) =
        using.unwrap_or((false, None, false, None));
    Ok((
        input,
        QueryInspection {
            kind: StatementKind::Insert,
            keyspace,
            table,
            star: false,
            selectors: Vec::new(),
            assignments: columns.into_iter().zip(values).collect(),
            token_clause: TokenClause::Absent,
            has_using_ttl,
            has_using_timestamp,
            ttl_variable,
            timestamp_variable,
        },
    ))
}

fn set_assignment(input: &str) -> IResult<&str, (CqlIdentifier, QueryTerm)> {
    let (input, column) = identifier(input)?;
    let (input, _) = tuple((ws, char('='), ws))(input)?;
    // counter increment: `c = c + :c`
    let (input, value) = alt((
        map(
            tuple((identifier, ws, char('+'), ws, term)),
            |(_, _, _, _, t)| t,
        ),
        term,
    ))(input)?;
    Ok((input, (column, value)))
}

fn condition(input: &str) -> IResult<&str, (CqlIdentifier, QueryTerm)> {
    let (input, column) = identifier(input)?;
    let (input, _) = tuple((ws, char('='), ws))(input)?;
    let (input, value) = term(input)?;
    Ok((input, (column, value)))
}

fn update_statement(input: &str) -> IResult<&str, QueryInspection> {
    let (input, _) = pair(keyword("UPDATE"), ws1)(input)?;
    let (input, (keyspace, table)) = qualified_name(input)?;
    let (input, using) = opt(using_clause)(input)?;
    let (input, _) = tuple((ws1, keyword("SET"), ws1))(input)?;
    let (input, mut assignments) =
        separated_list1(tuple((ws, char(','), ws)), set_assignment)(input)?;
    let (input, _) = tuple((ws1, keyword("WHERE"), ws1))(input)?;
    let (input, conditions) =
        separated_list1(tuple((ws1, keyword("AND"), ws1)), condition)(input)?;
    assignments.extend(conditions);
    let (has_using_ttl, ttl_variable, has_using_timestamp, timestamp_variable) =
        using.unwrap_or((false, None, false, None));
    Ok((
        input,
        QueryInspection {
            kind: StatementKind::Update,
            keyspace,
            table,
            star: false,
            selectors: Vec::new(),
            assignments,
            token_clause: TokenClause::Absent,
            has_using_ttl,
            has_using_timestamp,
            ttl_variable,
            timestamp_variable,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_select_star() {
        let inspection = inspect("SELECT * FROM ks.t1").unwrap();
        assert_eq!(inspection.kind, StatementKind::Select);
        assert!(inspection.star);
        assert_eq!(inspection.keyspace.unwrap().as_internal(), "ks");
        assert_eq!(inspection.table.as_internal(), "t1");
        assert_eq!(inspection.token_clause, TokenClause::Absent);
    }

    #[test]
    fn test_inspect_select_columns_and_functions() {
        let inspection =
            inspect("SELECT c1, \"COL 2\", now() AS \"now()\" FROM t1").unwrap();
        assert!(!inspection.star);
        let variables = inspection.result_variables();
        assert_eq!(variables[0].as_internal(), "c1");
        assert_eq!(variables[1].as_internal(), "COL 2");
        assert_eq!(variables[2].as_internal(), "now()");
    }

    #[test]
    fn test_inspect_named_token_restriction() {
        let inspection = inspect(
            "SELECT c1 FROM ks.t1 WHERE token(c1) > :start AND token(c1) <= :end",
        )
        .unwrap();
        match inspection.token_clause {
            TokenClause::Named { start, end } => {
                assert_eq!(start.as_internal(), "start");
                assert_eq!(end.as_internal(), "end");
            }
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_inspect_positional_token_restriction() {
        let inspection =
            inspect("SELECT c1 FROM ks.t1 WHERE token(c1) > ? AND token(c1) <= ?").unwrap();
        assert_eq!(inspection.token_clause, TokenClause::Positional);
    }

    #[test]
    fn test_inspect_unrecognized_restriction_kept_verbatim() {
        let inspection = inspect("SELECT c1 FROM ks.t1 WHERE c1 = 1").unwrap();
        assert_eq!(
            inspection.token_clause,
            TokenClause::Unrecognized("c1 = 1".to_string())
        );
    }

    #[test]
    fn test_inspect_insert_named() {
        let inspection =
            inspect("INSERT INTO ks.t1 (\"COL 2\", c1) VALUES (:\"COL 2\", :c1)").unwrap();
        assert_eq!(inspection.kind, StatementKind::Insert);
        let variables = inspection.bound_variables();
        assert_eq!(variables[0].as_internal(), "COL 2");
        assert_eq!(variables[1].as_internal(), "c1");
    }

    #[test]
    fn test_inspect_insert_positional_binds_column_names() {
        let inspection = inspect("INSERT INTO ks.t1 (c1, c2) VALUES (?, ?)").unwrap();
        let variables = inspection.bound_variables();
        assert_eq!(variables[0].as_internal(), "c1");
        assert_eq!(variables[1].as_internal(), "c2");
    }

    #[test]
    fn test_inspect_insert_function_value_is_not_bound() {
        let inspection =
            inspect("INSERT INTO ks.t1 (c1, c2) VALUES (:c1, now())").unwrap();
        let variables = inspection.bound_variables();
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].as_internal(), "c1");
    }

    #[test]
    fn test_inspect_using_clauses() {
        let inspection = inspect(
            "INSERT INTO ks.t1 (c1) VALUES (:c1) USING TTL :\"[ttl]\" AND TIMESTAMP :\"[timestamp]\"",
        )
        .unwrap();
        assert!(inspection.has_using_ttl);
        assert!(inspection.has_using_timestamp);
        assert_eq!(inspection.ttl_variable.unwrap().as_internal(), "[ttl]");
        assert_eq!(
            inspection.timestamp_variable.unwrap().as_internal(),
            "[timestamp]"
        );

        let literal = inspect("INSERT INTO ks.t1 (c1) VALUES (:c1) USING TTL 30").unwrap();
        assert!(literal.has_using_ttl);
        assert!(literal.ttl_variable.is_none());
    }

    #[test]
    fn test_inspect_counter_update() {
        let inspection = inspect(
            "UPDATE ks.t1 SET \"COL 2\" = \"COL 2\" + :\"COL 2\", c3 = c3 + :c3 WHERE c1 = :c1",
        )
        .unwrap();
        assert_eq!(inspection.kind, StatementKind::Update);
        let variables = inspection.bound_variables();
        assert_eq!(variables.len(), 3);
        assert_eq!(variables[0].as_internal(), "COL 2");
        assert_eq!(variables[1].as_internal(), "c3");
        assert_eq!(variables[2].as_internal(), "c1");
    }

    #[test]
    fn test_inspect_rejects_other_statements() {
        assert!(inspect("DELETE FROM ks.t1 WHERE c1 = 1").is_err());
        assert!(inspect("TRUNCATE ks.t1").is_err());
    }
}
