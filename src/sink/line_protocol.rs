//! Line protocol encoding.
//!
//! ```text
//! measurement,tag=value field=1.5,other="text" 1700000000000000000
//! ```

use std::fmt::Write;

use super::{DataPoint, FieldValue};
use crate::error::SinkError;

/// Encode one point as a single line (without trailing newline).
///
/// Non-finite floats are left out. Line breaks in names, tags and string
/// values are written as spaces.
pub fn encode(point: &DataPoint) -> Result<String, SinkError> {
    let fields: Vec<_> = point
        .fields
        .iter()
        .filter(|(_, value)| !matches!(value, FieldValue::Float(v) if !v.is_finite()))
        .collect();
    if fields.is_empty() {
        return Err(SinkError::EmptyPoint(point.measurement.clone()));
    }

    let mut line = String::with_capacity(64);
    escape_into(&mut line, &point.measurement, &[',', ' ']);

    for (key, value) in &point.tags {
        // empty tag values are not representable
        if value.is_empty() {
            continue;
        }
        line.push(',');
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        escape_into(&mut line, value, &[',', '=', ' ']);
    }

    line.push(' ');
    for (i, (key, value)) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        write_field(&mut line, value);
    }

    let nanos = point.timestamp.timestamp_nanos_opt().unwrap_or_default();
    let _ = write!(line, " {}", nanos);
    Ok(line)
}

/// Encode a batch, one point per line.
pub fn encode_batch(points: &[DataPoint]) -> Result<String, SinkError> {
    let lines = points.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

fn write_field(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Float(v) => {
            let _ = write!(out, "{}", v);
        }
        FieldValue::Decimal(v) => {
            let _ = write!(out, "{}", v);
        }
        FieldValue::Integer(v) => {
            let _ = write!(out, "{}i", v);
        }
        FieldValue::Bool(v) => {
            let _ = write!(out, "{}", v);
        }
        FieldValue::Text(v) => {
            out.push('"');
            escape_into(out, v, &['"', '\\']);
            out.push('"');
        }
    }
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        let c = if c == '\n' || c == '\r' { ' ' } else { c };
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at_epoch_second(point: DataPoint) -> DataPoint {
        point.at(Utc.timestamp_opt(1, 0).unwrap())
    }

    #[test]
    fn test_account_point() {
        let point = at_epoch_second(
            DataPoint::new("Account")
                .tag("IBAN", "DE02120300000000202051")
                .field("Value", dec!(1234.56)),
        );
        assert_eq!(
            encode(&point).unwrap(),
            "Account,IBAN=DE02120300000000202051 Value=1234.56 1000000000"
        );
    }

    #[test]
    fn test_escaping() {
        let point = at_epoch_second(
            DataPoint::new("my measure,x")
                .tag("tag key", "a=b,c")
                .field("text", "say \"hi\" \\o/")
                .field("count", 3i64)
                .field("ok", true),
        );
        assert_eq!(
            encode(&point).unwrap(),
            r#"my\ measure\,x,tag\ key=a\=b\,c count=3i,ok=true,text="say \"hi\" \\o/" 1000000000"#
        );
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        let point = at_epoch_second(
            DataPoint::new("Depot")
                .tag("Name", "two\nlines")
                .field("note", "a\r\nb"),
        );
        let line = encode(&point).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(line, r#"Depot,Name=two\ lines note="a  b" 1000000000"#);
    }

    #[test]
    fn test_non_finite_floats_skipped() {
        let point = at_epoch_second(
            DataPoint::new("Quote")
                .field("nan", f64::NAN)
                .field("inf", f64::INFINITY)
                .field("Value", 1.25),
        );
        assert_eq!(encode(&point).unwrap(), "Quote Value=1.25 1000000000");

        let only_nan = at_epoch_second(DataPoint::new("Quote").field("Value", f64::NAN));
        assert!(matches!(encode(&only_nan), Err(SinkError::EmptyPoint(_))));
    }

    #[test]
    fn test_point_without_fields_rejected() {
        let point = DataPoint::new("Depot").tag("WKN", "A0RPWH");
        assert!(matches!(encode(&point), Err(SinkError::EmptyPoint(m)) if m == "Depot"));
    }

    #[test]
    fn test_batch() {
        let points = vec![
            at_epoch_second(DataPoint::new("a").field("v", 1.5)),
            at_epoch_second(DataPoint::new("b").tag("t", "").field("v", 2.0)),
        ];
        assert_eq!(
            encode_batch(&points).unwrap(),
            "a v=1.5 1000000000\nb v=2 1000000000"
        );
    }
}
