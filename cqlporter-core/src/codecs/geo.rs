//! Geometry parsing and rendering
//!
//! Input accepts WKT literals or GeoJSON documents; output is always
//! the standardized GeoJSON form, never WKT.

use crate::error::{Error, Result};
use crate::types::{CqlType, CqlValue};
use nom::{
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, opt, recognize},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use serde_json::{json, Value as JsonValue};

/// Parse a geometry of the given target type from WKT or GeoJSON text
pub fn parse_geometry(text: &str, target: &CqlType) -> Result<CqlValue> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        let node: JsonValue = serde_json::from_str(trimmed)
            .map_err(|e| Error::conversion(format!("Cannot parse '{}' as GeoJSON: {}", trimmed, e)))?;
        return from_geojson(&node, target);
    }
    parse_wkt(trimmed, target)
}

/// Build a geometry from a parsed GeoJSON document
pub fn from_geojson(node: &JsonValue, target: &CqlType) -> Result<CqlValue> {
    let kind = node
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::conversion(format!("GeoJSON document has no type: {}", node)))?;
    let coordinates = node
        .get("coordinates")
        .ok_or_else(|| Error::conversion(format!("GeoJSON document has no coordinates: {}", node)))?;
    match (kind, target) {
        ("Point", CqlType::Point) => {
            let (x, y) = position(coordinates)?;
            Ok(CqlValue::Point { x, y })
        }
        ("LineString", CqlType::LineString) => {
            Ok(CqlValue::LineString(positions(coordinates)?))
        }
        ("Polygon", CqlType::Polygon) => {
            let rings = coordinates
                .as_array()
                .ok_or_else(|| ring_error(coordinates))?
                .iter()
                .map(positions)
                .collect::<Result<Vec<_>>>()?;
            Ok(CqlValue::Polygon(rings))
        }
        _ => Err(Error::conversion(format!(
            "GeoJSON type {} does not match target type {}",
            kind, target
        ))),
    }
}

/// Render a geometry value as GeoJSON
pub fn to_geojson(value: &CqlValue) -> Result<JsonValue> {
    match value {
        CqlValue::Point { x, y } => Ok(json!({ "type": "Point", "coordinates": [x, y] })),
        CqlValue::LineString(points) => Ok(json!({
            "type": "LineString",
            "coordinates": points.iter().map(|(x, y)| json!([x, y])).collect::<Vec<_>>(),
        })),
        CqlValue::Polygon(rings) => Ok(json!({
            "type": "Polygon",
            "coordinates": rings
                .iter()
                .map(|ring| ring.iter().map(|(x, y)| json!([x, y])).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
        })),
        other => Err(Error::conversion(format!(
            "Not a geometry value: {}",
            other
        ))),
    }
}

fn position(node: &JsonValue) -> Result<(f64, f64)> {
    let pair = node.as_array().ok_or_else(|| ring_error(node))?;
    match (pair.first().and_then(JsonValue::as_f64), pair.get(1).and_then(JsonValue::as_f64)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ring_error(node)),
    }
}

fn positions(node: &JsonValue) -> Result<Vec<(f64, f64)>> {
    node.as_array()
        .ok_or_else(|| ring_error(node))?
        .iter()
        .map(position)
        .collect()
}

fn ring_error(node: &JsonValue) -> Error {
    Error::conversion(format!("Invalid GeoJSON coordinates: {}", node))
}

fn parse_wkt(text: &str, target: &CqlType) -> Result<CqlValue> {
    let parser = match target {
        CqlType::Point => wkt_point,
        CqlType::LineString => wkt_line_string,
        CqlType::Polygon => wkt_polygon,
        other => {
            return Err(Error::conversion(format!(
                "Not a geometry type: {}",
                other
            )))
        }
    };
    match all_consuming(delimited(ws, parser, ws))(text) {
        Ok((_, value)) => Ok(value),
        Err(_) => Err(Error::conversion(format!(
            "Cannot parse '{}' as {} WKT",
            text, target
        ))),
    }
}

fn ws(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    let (input, text) = recognize(tuple((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while1(|c: char| c.is_ascii_digit()))),
    )))(input)?;
    match text.parse() {
        Ok(value) => Ok((input, value)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn coordinate(input: &str) -> IResult<&str, (f64, f64)> {
    let (input, _) = ws(input)?;
    let (input, x) = number(input)?;
    let (input, _) = take_while1(|c: char| c.is_whitespace())(input)?;
    let (input, y) = number(input)?;
    let (input, _) = ws(input)?;
    Ok((input, (x, y)))
}

fn coordinate_list(input: &str) -> IResult<&str, Vec<(f64, f64)>> {
    delimited(
        char('('),
        separated_list1(char(','), coordinate),
        char(')'),
    )(input)
}

fn wkt_point(input: &str) -> IResult<&str, CqlValue> {
    map(
        preceded(
            pair(tag_no_case("point"), ws),
            delimited(char('('), coordinate, char(')')),
        ),
        |(x, y)| CqlValue::Point { x, y },
    )(input)
}

fn wkt_line_string(input: &str) -> IResult<&str, CqlValue> {
    map(
        preceded(pair(tag_no_case("linestring"), ws), coordinate_list),
        CqlValue::LineString,
    )(input)
}

fn wkt_polygon(input: &str) -> IResult<&str, CqlValue> {
    map(
        preceded(
            pair(tag_no_case("polygon"), ws),
            delimited(
                char('('),
                separated_list1(delimited(ws, char(','), ws), preceded(ws, coordinate_list)),
                preceded(ws, char(')')),
            ),
        ),
        CqlValue::Polygon,
    )(input)
}
