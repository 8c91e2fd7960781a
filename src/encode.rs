//! Encoder: host value -> guest literal source (`%get`)
//!
//! Dispatch is a single ordered table of rules. The first rule whose
//! predicate accepts the value emits it, so precedence is the table order
//! (a `bool` must never reach the integer rule). Values no rule accepts
//! become a diagnostic string literal instead of an error.

use crate::value::{HostValue, float_repr};

struct Rule {
    name: &'static str,
    applies: fn(&HostValue) -> bool,
    emit: fn(&HostValue) -> Option<String>,
}

static RULES: &[Rule] = &[
    Rule { name: "boolean", applies: is_bool, emit: emit_bool },
    Rule { name: "nan", applies: is_nan, emit: emit_nan },
    Rule { name: "number", applies: is_number, emit: emit_number },
    Rule { name: "string", applies: is_str, emit: emit_str },
    Rule { name: "complex", applies: is_complex, emit: emit_complex },
    Rule { name: "range", applies: is_range, emit: emit_range },
    Rule { name: "sequence", applies: is_sequence, emit: emit_sequence },
    Rule { name: "null", applies: is_none, emit: emit_none },
    Rule { name: "mapping", applies: is_dict, emit: emit_dict },
    Rule { name: "set", applies: is_set, emit: emit_set },
    Rule { name: "fixed-width", applies: is_scalar, emit: emit_scalar },
    Rule { name: "matrix", applies: is_matrix, emit: emit_matrix },
    Rule { name: "ndarray", applies: is_array, emit: emit_array },
    Rule { name: "dataframe", applies: is_dataframe, emit: emit_dataframe },
    Rule { name: "series", applies: is_series, emit: emit_series },
];

/// Guest literal text for `value`. Never fails.
pub fn encode(value: &HostValue) -> String {
    RULES
        .iter()
        .find(|rule| (rule.applies)(value))
        .and_then(|rule| (rule.emit)(value))
        .unwrap_or_else(|| unsupported(value))
}

/// Name of the rule that handles `value`, `"unsupported"` if none does
pub fn rule_name(value: &HostValue) -> &'static str {
    RULES
        .iter()
        .find(|rule| (rule.applies)(value))
        .map(|rule| rule.name)
        .unwrap_or("unsupported")
}

/// Double-quoted guest string. `#` is escaped so nothing interpolates.
pub fn encode_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '#' => out.push_str("\\#"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{1b}' => out.push_str("\\e"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Guest float literal; non-finite values use the `Float` constants
pub fn encode_float(f: f64) -> String {
    if f.is_nan() {
        "Float::NAN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Float::INFINITY" } else { "-Float::INFINITY" }.to_string()
    } else {
        float_repr(f)
    }
}

fn unsupported(value: &HostValue) -> String {
    encode_str(&format!("Unsupported datatype {}", value.short_repr()))
}

fn join<'a>(items: impl IntoIterator<Item = &'a HostValue>) -> String {
    items.into_iter().map(encode).collect::<Vec<_>>().join(",")
}

fn is_bool(v: &HostValue) -> bool {
    matches!(v, HostValue::Bool(_))
}

fn is_nan(v: &HostValue) -> bool {
    matches!(v, HostValue::Float(f) if f.is_nan())
}

fn is_number(v: &HostValue) -> bool {
    matches!(v, HostValue::Int(_) | HostValue::Float(_))
}

fn is_str(v: &HostValue) -> bool {
    matches!(v, HostValue::Str(_))
}

fn is_complex(v: &HostValue) -> bool {
    matches!(v, HostValue::Complex { .. })
}

fn is_range(v: &HostValue) -> bool {
    matches!(v, HostValue::Range { .. })
}

fn is_sequence(v: &HostValue) -> bool {
    matches!(v, HostValue::List(_) | HostValue::Tuple(_))
}

fn is_none(v: &HostValue) -> bool {
    matches!(v, HostValue::None)
}

fn is_dict(v: &HostValue) -> bool {
    matches!(v, HostValue::Dict(_))
}

fn is_set(v: &HostValue) -> bool {
    matches!(v, HostValue::Set(_))
}

fn is_scalar(v: &HostValue) -> bool {
    matches!(v, HostValue::Scalar(_))
}

fn is_matrix(v: &HostValue) -> bool {
    matches!(v, HostValue::Matrix(_))
}

fn is_array(v: &HostValue) -> bool {
    matches!(v, HostValue::Array(_))
}

fn is_dataframe(v: &HostValue) -> bool {
    matches!(v, HostValue::DataFrame(_))
}

fn is_series(v: &HostValue) -> bool {
    matches!(v, HostValue::Series(_))
}

fn emit_bool(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
        _ => None,
    }
}

fn emit_nan(_: &HostValue) -> Option<String> {
    Some("Float::NAN".to_string())
}

fn emit_number(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Int(i) => Some(i.to_string()),
        HostValue::Float(f) => Some(encode_float(*f)),
        _ => None,
    }
}

fn emit_str(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Str(s) => Some(encode_str(s)),
        _ => None,
    }
}

fn emit_complex(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Complex { re, im } => {
            Some(format!("Complex({},{})", encode_float(*re), encode_float(*im)))
        }
        _ => None,
    }
}

fn emit_range(v: &HostValue) -> Option<String> {
    let HostValue::Range { start, stop, step } = v else {
        return None;
    };
    let len = HostValue::range_len(*start, *stop, *step);
    if len == 0 {
        return Some("[]".to_string());
    }
    // last element lies between start and stop, so it fits in i64
    let last = *start as i128 + (len as i128 - 1) * *step as i128;
    Some(if *step == 1 {
        format!("({}..{})", start, last)
    } else {
        format!("{}.step({},{}).to_a", start, last, step)
    })
}

fn emit_sequence(v: &HostValue) -> Option<String> {
    match v {
        HostValue::List(items) | HostValue::Tuple(items) => Some(format!("[{}]", join(items))),
        _ => None,
    }
}

fn emit_none(_: &HostValue) -> Option<String> {
    Some("nil".to_string())
}

fn emit_dict(v: &HostValue) -> Option<String> {
    let HostValue::Dict(pairs) = v else {
        return None;
    };
    let body: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{} => {}", encode_str(&k.key_text()), encode(v)))
        .collect();
    Some(format!("{{{}}}", body.join(",")))
}

fn emit_set(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Set(items) => Some(format!("Set[{}]", join(items))),
        _ => None,
    }
}

fn emit_scalar(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Scalar(s) if s.is_nan() => Some("Float::NAN".to_string()),
        HostValue::Scalar(s) if s.is_float() => {
            let literal = s.literal();
            Some(match literal.as_str() {
                "inf" => "Float::INFINITY".to_string(),
                "-inf" => "-Float::INFINITY".to_string(),
                _ => literal,
            })
        }
        HostValue::Scalar(s) => Some(s.literal()),
        _ => None,
    }
}

fn emit_matrix(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Matrix(m) => Some(format!("N{}", encode(&m.to_nested()))),
        _ => None,
    }
}

fn emit_array(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Array(a) => Some(encode(&a.to_nested())),
        _ => None,
    }
}

fn emit_dataframe(v: &HostValue) -> Option<String> {
    let HostValue::DataFrame(df) = v else {
        return None;
    };
    let columns: Vec<String> = df
        .columns()
        .iter()
        .map(|(name, cells)| format!("{}=>[{}]", encode_str(name), join(cells)))
        .collect();
    Some(format!(
        "Sysml::DataFrame.new({{{}}},index:[{}])",
        columns.join(","),
        join(df.index())
    ))
}

fn emit_series(v: &HostValue) -> Option<String> {
    let HostValue::Series(s) = v else {
        return None;
    };
    let pairs: Vec<String> = s
        .index()
        .iter()
        .zip(s.values())
        .map(|(k, v)| format!("{}=>{}", encode(k), encode(v)))
        .collect();
    Some(format!("{{{}}}", pairs.join(",")))
}
