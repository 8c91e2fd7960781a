//! Guest-side canonicalization
//!
//! The guest's native `inspect` output is not host syntax (`nil`, `NaN`,
//! `{"a"=>1}`), so the prelude installs a routine in the guest that renders
//! every value as a host literal. [`canonicalize`] is that routine written
//! against [`GuestValue`]; the guest source lives in `adapter::sysml`.
//! The two must stay in step.

use super::GuestValue;
use crate::value::float_repr;

/// Printed for guest values that have no host counterpart
pub const UNTRANSFERRABLE: &str = "'Untransferrable variable'";

/// Render a guest value as host literal text.
pub fn canonicalize(value: &GuestValue) -> String {
    match value {
        GuestValue::Integer(i) => i.to_string(),
        GuestValue::Str(s) => inspect_str(s),
        GuestValue::Bool(true) => "True".to_string(),
        GuestValue::Bool(false) => "False".to_string(),
        GuestValue::Float(f) => canonical_float(*f),
        GuestValue::Nil => "None".to_string(),
        GuestValue::Set(items) if items.is_empty() => "set()".to_string(),
        GuestValue::Set(items) => format!("{{{}}}", join(items)),
        GuestValue::Range { first, last, exclusive } => {
            let stop = if *exclusive { *last as i128 } else { *last as i128 + 1 };
            format!("range({},{})", first, stop)
        }
        GuestValue::Array(items) => format!("[{}]", join(items)),
        GuestValue::Hash(pairs) => {
            let body: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}:{}", inspect_str(&k.to_s()), canonicalize(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        GuestValue::Matrix(rows) => {
            let rows: Vec<String> = rows.iter().map(|r| format!("[{}]", join(r))).collect();
            format!("numpy.matrix([{}])", rows.join(","))
        }
        GuestValue::DataFrame { vectors, index } => {
            let columns: Vec<String> = vectors
                .iter()
                .map(|(name, cells)| format!("{}:[{}]", inspect_str(name), join(cells)))
                .collect();
            format!(
                "pandas.DataFrame({{{}}},index=[{}])",
                columns.join(","),
                join(index)
            )
        }
        GuestValue::Complex(re, im) => {
            format!("complex({},{})", canonical_float(*re), canonical_float(*im))
        }
        GuestValue::Object(_) => UNTRANSFERRABLE.to_string(),
    }
}

fn join(items: &[GuestValue]) -> String {
    items.iter().map(canonicalize).collect::<Vec<_>>().join(",")
}

fn canonical_float(f: f64) -> String {
    if f.is_nan() {
        "float('nan')".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "float('inf')" } else { "float('-inf')" }.to_string()
    } else {
        float_inspect(f)
    }
}

/// The guest's `Float#inspect`: `1.0`, `1.0e+16`, `NaN`, `-Infinity`
pub fn float_inspect(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let repr = float_repr(f);
    match repr.split_once('e') {
        Some((mantissa, exp)) if !mantissa.contains('.') => format!("{}.0e{}", mantissa, exp),
        _ => repr,
    }
}

/// The guest's `String#inspect`
pub fn inspect_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{1b}' => out.push_str("\\e"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{0b}' => out.push_str("\\v"),
            '#' if matches!(chars.peek(), Some('{') | Some('$') | Some('@')) => out.push_str("\\#"),
            '\u{7f}' => out.push_str("\\x7F"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// The guest's generic `inspect`, for diagnostics
pub fn inspect(value: &GuestValue) -> String {
    let list = |items: &[GuestValue]| items.iter().map(inspect).collect::<Vec<_>>().join(", ");
    match value {
        GuestValue::Nil => "nil".to_string(),
        GuestValue::Bool(b) => b.to_string(),
        GuestValue::Integer(i) => i.to_string(),
        GuestValue::Float(f) => float_inspect(*f),
        GuestValue::Str(s) => inspect_str(s),
        GuestValue::Complex(re, im) => {
            let sign = if *im < 0.0 { "-" } else { "+" };
            format!("({}{}{}i)", float_inspect(*re), sign, float_inspect(im.abs()))
        }
        GuestValue::Range { first, last, exclusive } => {
            format!("{}{}{}", first, if *exclusive { "..." } else { ".." }, last)
        }
        GuestValue::Array(items) => format!("[{}]", list(items)),
        GuestValue::Hash(pairs) => {
            let body: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}=>{}", inspect(k), inspect(v)))
                .collect();
            format!("{{{}}}", body.join(", "))
        }
        GuestValue::Set(items) => format!("#<Set: {{{}}}>", list(items)),
        GuestValue::Matrix(rows) => {
            let rows: Vec<String> = rows.iter().map(|r| format!("[{}]", list(r))).collect();
            format!("N[{}]", rows.join(", "))
        }
        GuestValue::DataFrame { vectors, index } => {
            format!("#<Sysml::DataFrame {}x{}>", index.len(), vectors.len())
        }
        GuestValue::Object(class) => format!("#<{}>", class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> GuestValue {
        GuestValue::Str(text.to_string())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canonicalize(&GuestValue::Nil), "None");
        assert_eq!(canonicalize(&GuestValue::Bool(true)), "True");
        assert_eq!(canonicalize(&GuestValue::Integer(-3)), "-3");
        assert_eq!(canonicalize(&GuestValue::Float(1e20)), "1.0e+20");
        assert_eq!(canonicalize(&GuestValue::Float(f64::NAN)), "float('nan')");
        assert_eq!(canonicalize(&s("1\"23")), r#""1\"23""#);
        assert_eq!(canonicalize(&GuestValue::Complex(1.0, 2.0)), "complex(1.0,2.0)");
    }

    #[test]
    fn test_collections() {
        assert_eq!(canonicalize(&GuestValue::Set(vec![])), "set()");
        assert_eq!(
            canonicalize(&GuestValue::Range { first: 1, last: 5, exclusive: false }),
            "range(1,6)"
        );
        assert_eq!(
            canonicalize(&GuestValue::Range { first: 1, last: 5, exclusive: true }),
            "range(1,5)"
        );
        let hash = GuestValue::Hash(vec![
            (s("a"), GuestValue::Integer(1)),
            (s("b"), GuestValue::Hash(vec![(s("c"), GuestValue::Integer(3))])),
            (GuestValue::Integer(7), s("whatever")),
        ]);
        assert_eq!(canonicalize(&hash), r#"{"a":1,"b":{"c":3},"7":"whatever"}"#);
        assert_eq!(canonicalize(&GuestValue::Object("Proc".to_string())), UNTRANSFERRABLE);
    }

    #[test]
    fn test_matrix_and_dataframe() {
        let m = GuestValue::Matrix(vec![
            vec![GuestValue::Integer(1), GuestValue::Integer(2)],
            vec![GuestValue::Integer(3), GuestValue::Integer(4)],
        ]);
        assert_eq!(canonicalize(&m), "numpy.matrix([[1,2],[3,4]])");

        let df = GuestValue::DataFrame {
            vectors: vec![("x".to_string(), vec![GuestValue::Float(f64::NAN)])],
            index: vec![GuestValue::Integer(0)],
        };
        assert_eq!(canonicalize(&df), r#"pandas.DataFrame({"x":[float('nan')]},index=[0])"#);
    }

    #[test]
    fn test_inspect_str_escapes_interpolation_only() {
        assert_eq!(inspect_str("#{x} #y"), r#""\#{x} #y""#);
        assert_eq!(inspect_str("\u{1}"), r#""\u0001""#);
        assert_eq!(inspect_str("caf\u{e9}"), "\"caf\u{e9}\"");
    }

    #[test]
    fn test_float_inspect() {
        assert_eq!(float_inspect(1.0), "1.0");
        assert_eq!(float_inspect(1e16), "1.0e+16");
        assert_eq!(float_inspect(1.5e-5), "1.5e-05");
        assert_eq!(float_inspect(f64::NEG_INFINITY), "-Infinity");
    }
}
