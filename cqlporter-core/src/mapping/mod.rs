//! Mapping specification parsing and resolution
//!
//! A mapping spec is a comma-separated list of entries relating
//! external record fields to database columns or bound variables:
//! `*=*` (wildcard inference), `* = -col` / `* = [-a, -b]` (wildcard
//! with exclusions), `field = col`, `0 = col` (indexed), `now() = col`
//! (generated value on load), `field = writetime(col)` (function
//! selector on unload), `field = __ttl` / `field = __timestamp`
//! (per-record write-time values), or a plain ordered column list
//! without any `=`.

pub mod resolver;

pub use resolver::{ResolvedSchema, SchemaResolver, WorkflowMode};

use crate::cql::{
    CqlFragment, CqlIdentifier, Field, FunctionCall, TTL_PSEUDO_COLUMN, WRITETIME_PSEUDO_COLUMN,
};
use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, opt, recognize},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// The record side of a mapping entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingField {
    Indexed(usize),
    Named(String),
    /// A generated value, e.g. `now() = col` on load
    Function(FunctionCall),
}

impl MappingField {
    fn to_field(&self) -> Option<Field> {
        match self {
            MappingField::Indexed(i) => Some(Field::Indexed(*i)),
            MappingField::Named(name) => Some(Field::Named(name.clone())),
            MappingField::Function(_) => None,
        }
    }
}

/// The database side of a mapping entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    Column(CqlIdentifier),
    Function(FunctionCall),
    Ttl,
    Writetime,
}

impl MappingTarget {
    fn to_fragment(&self) -> CqlFragment {
        match self {
            MappingTarget::Column(id) => CqlFragment::Column(id.clone()),
            MappingTarget::Function(call) => CqlFragment::Function(call.clone()),
            MappingTarget::Ttl => CqlFragment::Ttl,
            MappingTarget::Writetime => CqlFragment::Writetime,
        }
    }
}

/// One parsed mapping spec entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingEntry {
    /// `* = *`
    Wildcard,
    /// `* = -col` or `* = [-a, -b]`
    Exclusions(Vec<CqlIdentifier>),
    /// `field = target`
    Pair {
        field: MappingField,
        target: MappingTarget,
    },
    /// A bare column name in an ordered list without `=`
    Lone(CqlIdentifier),
}

/// A parsed mapping specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSpec {
    pub entries: Vec<MappingEntry>,
}

impl MappingSpec {
    /// Parse a mapping specification string
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        match all_consuming(delimited(ws, mapping_entries, ws))(trimmed) {
            Ok((_, entries)) if !entries.is_empty() => {
                let spec = Self { entries };
                spec.check_consistency(text)?;
                Ok(spec)
            }
            _ => Err(Error::configuration(format!(
                "Invalid mapping specification: '{}'",
                text
            ))),
        }
    }

    fn check_consistency(&self, text: &str) -> Result<()> {
        let lone = self.entries.iter().any(|e| matches!(e, MappingEntry::Lone(_)));
        let other = self.entries.iter().any(|e| !matches!(e, MappingEntry::Lone(_)));
        if lone && other {
            return Err(Error::configuration(format!(
                "Invalid mapping specification: '{}'; simple column names cannot be mixed \
                 with 'field = column' entries",
                text
            )));
        }
        Ok(())
    }

    /// Whether the spec asks for wildcard inference
    pub fn has_wildcard(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, MappingEntry::Wildcard | MappingEntry::Exclusions(_)))
    }

    /// Whether the spec is a plain ordered column list
    pub fn is_positional_list(&self) -> bool {
        self.entries.iter().all(|e| matches!(e, MappingEntry::Lone(_)))
    }

    /// All excluded columns across the spec
    pub fn exclusions(&self) -> Vec<CqlIdentifier> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                MappingEntry::Exclusions(columns) => Some(columns.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// A resolved, validated relation between record fields and statement
/// variables.
///
/// Order is significant: it is the binding order for positional
/// statements and the column order of generated statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    entries: Vec<(Field, CqlFragment)>,
    write_time_variables: Vec<CqlIdentifier>,
}

impl Mapping {
    pub fn new(
        entries: Vec<(Field, CqlFragment)>,
        write_time_variables: Vec<CqlIdentifier>,
    ) -> Self {
        Self {
            entries,
            write_time_variables,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn entries(&self) -> &[(Field, CqlFragment)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fragments a field maps to, in entry order
    pub fn fragments_for(&self, field: &Field) -> Vec<&CqlFragment> {
        self.entries
            .iter()
            .filter(|(f, _)| f == field)
            .map(|(_, fragment)| fragment)
            .collect()
    }

    /// The fields mapped to a bound variable, in entry order
    pub fn fields_for(&self, variable: &CqlIdentifier) -> Vec<&Field> {
        self.entries
            .iter()
            .filter(|(_, fragment)| &fragment.variable() == variable)
            .map(|(field, _)| field)
            .collect()
    }

    /// All distinct bound variables, in entry order
    pub fn variables(&self) -> Vec<CqlIdentifier> {
        let mut variables = Vec::new();
        for (_, fragment) in &self.entries {
            let variable = fragment.variable();
            if !variables.contains(&variable) {
                variables.push(variable);
            }
        }
        variables
    }

    /// Bound variables recognized as write-timestamp targets
    pub fn write_time_variables(&self) -> &[CqlIdentifier] {
        &self.write_time_variables
    }
}

fn ws(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace())(input)
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

// an index must not be followed by more identifier characters,
// otherwise `0abc` would parse as index 0
fn index(input: &str) -> IResult<&str, usize> {
    let (rest, digits) = take_while1(|c: char| c.is_ascii_digit())(input)?;
    let bounded = !rest
        .chars()
        .next()
        .map_or(false, |c| c.is_alphanumeric() || c == '_');
    match digits.parse() {
        Ok(i) if bounded => Ok((rest, i)),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            rest,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn mapping_field(input: &str) -> IResult<&str, MappingField> {
    alt((
        map(function_call, MappingField::Function),
        map(index, MappingField::Indexed),
        map(identifier, |id| {
            MappingField::Named(id.as_internal().to_string())
        }),
    ))(input)
}

fn mapping_target(input: &str) -> IResult<&str, MappingTarget> {
    alt((
        map(function_call, MappingTarget::Function),
        map(identifier, |id| match id.as_internal() {
            TTL_PSEUDO_COLUMN => MappingTarget::Ttl,
            WRITETIME_PSEUDO_COLUMN => MappingTarget::Writetime,
            _ => MappingTarget::Column(id),
        }),
    ))(input)
}

fn excluded_column(input: &str) -> IResult<&str, CqlIdentifier> {
    preceded(pair(char('-'), ws), identifier)(input)
}

fn exclusion_target(input: &str) -> IResult<&str, Vec<CqlIdentifier>> {
    alt((
        delimited(
            pair(char('['), ws),
            separated_list1(tuple((ws, char(','), ws)), excluded_column),
            pair(ws, char(']')),
        ),
        map(excluded_column, |c| vec![c]),
    ))(input)
}

fn wildcard_entry(input: &str) -> IResult<&str, MappingEntry> {
    let (input, _) = tuple((char('*'), ws, char('='), ws))(input)?;
    alt((
        map(char('*'), |_| MappingEntry::Wildcard),
        map(exclusion_target, MappingEntry::Exclusions),
    ))(input)
}

fn pair_entry(input: &str) -> IResult<&str, MappingEntry> {
    let (input, field) = mapping_field(input)?;
    let (input, _) = tuple((ws, char('='), ws))(input)?;
    let (input, target) = mapping_target(input)?;
    Ok((input, MappingEntry::Pair { field, target }))
}

fn lone_entry(input: &str) -> IResult<&str, MappingEntry> {
    map(identifier, MappingEntry::Lone)(input)
}

fn mapping_entries(input: &str) -> IResult<&str, Vec<MappingEntry>> {
    let entry = alt((wildcard_entry, pair_entry, lone_entry));
    let (input, open) = opt(pair(char('{'), ws))(input)?;
    let (input, entries) = separated_list1(tuple((ws, char(','), ws)), entry)(input)?;
    let (input, _) = if open.is_some() {
        let (input, _) = pair(ws, char('}'))(input)?;
        (input, ())
    } else {
        (input, ())
    };
    Ok((input, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard() {
        let spec = MappingSpec::parse("*=*").unwrap();
        assert_eq!(spec.entries, vec![MappingEntry::Wildcard]);
        assert!(spec.has_wildcard());
    }

    #[test]
    fn test_parse_exclusions() {
        let spec = MappingSpec::parse("* = -c2").unwrap();
        assert_eq!(
            spec.exclusions(),
            vec![CqlIdentifier::from_internal("c2")]
        );

        let spec = MappingSpec::parse("* = [-c2, -c3]").unwrap();
        assert_eq!(
            spec.exclusions(),
            vec![
                CqlIdentifier::from_internal("c2"),
                CqlIdentifier::from_internal("c3")
            ]
        );
        assert!(spec.has_wildcard());
    }

    #[test]
    fn test_parse_pairs() {
        let spec = MappingSpec::parse("fieldA = c1, 0 = \"COL 2\", fieldB = __ttl").unwrap();
        assert_eq!(spec.entries.len(), 3);
        assert_eq!(
            spec.entries[0],
            MappingEntry::Pair {
                field: MappingField::Named("fielda".into()),
                target: MappingTarget::Column(CqlIdentifier::from_internal("c1")),
            }
        );
        assert_eq!(
            spec.entries[1],
            MappingEntry::Pair {
                field: MappingField::Indexed(0),
                target: MappingTarget::Column(CqlIdentifier::from_internal("COL 2")),
            }
        );
        assert_eq!(
            spec.entries[2],
            MappingEntry::Pair {
                field: MappingField::Named("fieldb".into()),
                target: MappingTarget::Ttl,
            }
        );
    }

    #[test]
    fn test_parse_functions() {
        let spec = MappingSpec::parse("now() = c1, fieldA = writetime(c2)").unwrap();
        assert!(matches!(
            spec.entries[0],
            MappingEntry::Pair {
                field: MappingField::Function(_),
                ..
            }
        ));
        assert!(matches!(
            spec.entries[1],
            MappingEntry::Pair {
                target: MappingTarget::Function(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_positional_list() {
        let spec = MappingSpec::parse("c1, c2, \"COL 3\"").unwrap();
        assert!(spec.is_positional_list());
        assert_eq!(spec.entries.len(), 3);
    }

    #[test]
    fn test_parse_braced_spec() {
        let spec = MappingSpec::parse("{ fieldA = c1, fieldB = c2 }").unwrap();
        assert_eq!(spec.entries.len(), 2);
    }

    #[test]
    fn test_mixed_lone_and_pairs_rejected() {
        assert!(MappingSpec::parse("c1, fieldA = c2").is_err());
        assert!(MappingSpec::parse("").is_err());
    }

    #[test]
    fn test_mapping_lookups() {
        let mapping = Mapping::new(
            vec![
                (
                    Field::Named("f1".into()),
                    CqlFragment::Column(CqlIdentifier::from_internal("c1")),
                ),
                (
                    Field::Named("f2".into()),
                    CqlFragment::Column(CqlIdentifier::from_internal("c1")),
                ),
                (
                    Field::Named("f3".into()),
                    CqlFragment::Column(CqlIdentifier::from_internal("c2")),
                ),
            ],
            vec![],
        );
        let c1 = CqlIdentifier::from_internal("c1");
        assert_eq!(mapping.fields_for(&c1).len(), 2);
        assert_eq!(mapping.variables().len(), 2);
        assert_eq!(
            mapping.fragments_for(&Field::Named("f3".into())).len(),
            1
        );
    }
}
