//! Host value model
//!
//! The SoS namespace holds Python objects. Only a fixed set of them can
//! cross into the guest kernel:
//! - Scalars: `None`, `bool`, `int`, `float` (incl. NaN), `str`, `complex`
//! - Containers: `range`, `list`, `tuple`, `dict`, `set`
//! - numpy: fixed-width scalars, `matrix`, `ndarray`
//! - pandas: `DataFrame`, `Series`
//!
//! Anything else is carried as [`HostValue::Opaque`] so the encoder can
//! still describe what it refused to transfer.

use crate::{Error, Result};
use serde_json::{Map, Value as Json};
use std::fmt;

/// Fixed-width numeric scalar (numpy `int8` .. `float64`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    /// numpy dtype name
    pub fn dtype(&self) -> &'static str {
        match self {
            Scalar::I8(_) => "int8",
            Scalar::I16(_) => "int16",
            Scalar::I32(_) => "int32",
            Scalar::I64(_) => "int64",
            Scalar::U8(_) => "uint8",
            Scalar::U16(_) => "uint16",
            Scalar::U32(_) => "uint32",
            Scalar::U64(_) => "uint64",
            Scalar::F32(_) => "float32",
            Scalar::F64(_) => "float64",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Scalar::F32(_) | Scalar::F64(_))
    }

    pub fn is_nan(&self) -> bool {
        match self {
            Scalar::F32(f) => f.is_nan(),
            Scalar::F64(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric literal text, identical to what the plain `int`/`float` would print.
    pub fn literal(&self) -> String {
        match self {
            Scalar::I8(v) => v.to_string(),
            Scalar::I16(v) => v.to_string(),
            Scalar::I32(v) => v.to_string(),
            Scalar::I64(v) => v.to_string(),
            Scalar::U8(v) => v.to_string(),
            Scalar::U16(v) => v.to_string(),
            Scalar::U32(v) => v.to_string(),
            Scalar::U64(v) => v.to_string(),
            Scalar::F32(v) => float_text(format!("{:?}", v), f64::from(*v)),
            Scalar::F64(v) => float_repr(*v),
        }
    }

    fn to_json(self) -> Json {
        match self {
            Scalar::I8(v) => Json::from(v),
            Scalar::I16(v) => Json::from(v),
            Scalar::I32(v) => Json::from(v),
            Scalar::I64(v) => Json::from(v),
            Scalar::U8(v) => Json::from(v),
            Scalar::U16(v) => Json::from(v),
            Scalar::U32(v) => Json::from(v),
            Scalar::U64(v) => Json::from(v),
            Scalar::F32(v) => float_json(f64::from(v)),
            Scalar::F64(v) => float_json(v),
        }
    }
}

/// A value living in the host (SoS) namespace.
#[derive(Debug, Clone)]
pub enum HostValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Complex { re: f64, im: f64 },
    /// Python `range(start, stop, step)`; `step` is never zero
    Range { start: i64, stop: i64, step: i64 },
    List(Vec<HostValue>),
    Tuple(Vec<HostValue>),
    /// Insertion-ordered mapping
    Dict(Vec<(HostValue, HostValue)>),
    Set(Vec<HostValue>),
    Scalar(Scalar),
    /// `numpy.matrix`, always two-dimensional
    Matrix(NdArray),
    /// `numpy.ndarray` of any rank
    Array(NdArray),
    DataFrame(DataFrame),
    Series(Series),
    /// Any host object outside the transferable set
    Opaque { type_name: String, repr: String },
}

impl HostValue {
    pub fn str(s: impl Into<String>) -> Self {
        HostValue::Str(s.into())
    }

    /// Build a dict from string keys
    pub fn dict<K: Into<String>>(pairs: impl IntoIterator<Item = (K, HostValue)>) -> Self {
        HostValue::Dict(
            pairs
                .into_iter()
                .map(|(k, v)| (HostValue::Str(k.into()), v))
                .collect(),
        )
    }

    pub fn opaque(type_name: impl Into<String>, repr: impl Into<String>) -> Self {
        HostValue::Opaque {
            type_name: type_name.into(),
            repr: repr.into(),
        }
    }

    /// A two-dimensional `numpy.matrix` from its rows
    pub fn matrix(rows: Vec<Vec<HostValue>>) -> Result<Self> {
        Ok(HostValue::Matrix(NdArray::from_rows(rows)?))
    }

    /// Python type name, as `type(obj).__name__` would report it
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::None => "NoneType",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "str",
            HostValue::Complex { .. } => "complex",
            HostValue::Range { .. } => "range",
            HostValue::List(_) => "list",
            HostValue::Tuple(_) => "tuple",
            HostValue::Dict(_) => "dict",
            HostValue::Set(_) => "set",
            HostValue::Scalar(s) => s.dtype(),
            HostValue::Matrix(_) => "matrix",
            HostValue::Array(_) => "ndarray",
            HostValue::DataFrame(_) => "DataFrame",
            HostValue::Series(_) => "Series",
            HostValue::Opaque { type_name, .. } => type_name,
        }
    }

    pub fn is_hashable(&self) -> bool {
        match self {
            HostValue::List(_)
            | HostValue::Dict(_)
            | HostValue::Set(_)
            | HostValue::Matrix(_)
            | HostValue::Array(_)
            | HostValue::DataFrame(_)
            | HostValue::Series(_) => false,
            HostValue::Tuple(items) => items.iter().all(HostValue::is_hashable),
            _ => true,
        }
    }

    /// Python `str(obj)`: strings unquoted, everything else as its repr
    pub fn key_text(&self) -> String {
        match self {
            HostValue::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Look up a value in a `Dict` by string key
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            HostValue::Dict(pairs) => pairs
                .iter()
                .find(|(k, _)| matches!(k, HostValue::Str(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// `len(range(start, stop, step))`, without materializing the range
    pub fn range_len(start: i64, stop: i64, step: i64) -> u64 {
        let (start, stop, step) = (start as i128, stop as i128, step as i128);
        let span = match step {
            0 => 0,
            s if s > 0 => (stop - start + s - 1) / s,
            s => (start - stop - s - 1) / -s,
        };
        span.max(0) as u64
    }

    /// Elements of a `range`, in iteration order
    pub fn range_values(start: i64, stop: i64, step: i64) -> Vec<i64> {
        let mut out = Vec::new();
        if step == 0 {
            return out;
        }
        let mut cur = start;
        while (step > 0 && cur < stop) || (step < 0 && cur > stop) {
            out.push(cur);
            cur = match cur.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        out
    }

    /// Shape of a rectangular value: arrays, matrices, data frames and
    /// nested lists of equal length.
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            HostValue::Matrix(a) | HostValue::Array(a) => Some(a.shape().to_vec()),
            HostValue::DataFrame(df) => {
                let (rows, cols) = df.shape();
                Some(vec![rows, cols])
            }
            HostValue::Series(s) => Some(vec![s.len()]),
            HostValue::List(_) | HostValue::Tuple(_) => {
                NdArray::from_nested(self).ok().map(|a| a.shape().to_vec())
            }
            _ => None,
        }
    }

    /// `sos.utils.short_repr`: reprs longer than 40 characters are cut to 35.
    pub fn short_repr(&self) -> String {
        let repr = self.to_string();
        if repr.chars().count() > 40 {
            let mut cut: String = repr.chars().take(35).collect();
            cut.push_str("...");
            cut
        } else {
            repr
        }
    }

    /// Render as JSON for tooling output. Non-finite floats become `null`.
    pub fn to_json(&self) -> Json {
        match self {
            HostValue::None => Json::Null,
            HostValue::Bool(b) => Json::Bool(*b),
            HostValue::Int(i) => Json::from(*i),
            HostValue::Float(f) => float_json(*f),
            HostValue::Str(s) => Json::String(s.clone()),
            HostValue::Complex { re, im } => {
                serde_json::json!({ "real": float_json(*re), "imag": float_json(*im) })
            }
            HostValue::Range { start, stop, step } => {
                serde_json::json!({ "range": [start, stop, step] })
            }
            HostValue::List(items) | HostValue::Tuple(items) | HostValue::Set(items) => {
                Json::Array(items.iter().map(HostValue::to_json).collect())
            }
            HostValue::Dict(pairs) => Json::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.key_text(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            HostValue::Scalar(s) => s.to_json(),
            HostValue::Matrix(a) | HostValue::Array(a) => a.to_nested().to_json(),
            HostValue::DataFrame(df) => {
                let columns: Map<String, Json> = df
                    .columns()
                    .iter()
                    .map(|(name, cells)| {
                        (name.clone(), Json::Array(cells.iter().map(HostValue::to_json).collect()))
                    })
                    .collect();
                serde_json::json!({
                    "columns": columns,
                    "index": df.index().iter().map(HostValue::to_json).collect::<Vec<_>>(),
                })
            }
            HostValue::Series(s) => Json::Object(
                s.index()
                    .iter()
                    .zip(s.values())
                    .map(|(k, v)| (k.key_text(), v.to_json()))
                    .collect(),
            ),
            HostValue::Opaque { repr, .. } => serde_json::json!({ "unsupported": repr }),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::None, HostValue::None) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (
                HostValue::Complex { re: ar, im: ai },
                HostValue::Complex { re: br, im: bi },
            ) => ar == br && ai == bi,
            (
                HostValue::Range { start: a0, stop: a1, step: a2 },
                HostValue::Range { start: b0, stop: b1, step: b2 },
            ) => a0 == b0 && a1 == b1 && a2 == b2,
            (HostValue::List(a), HostValue::List(b)) | (HostValue::Tuple(a), HostValue::Tuple(b)) => {
                a == b
            }
            (HostValue::Set(a), HostValue::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
            }
            (HostValue::Dict(a), HostValue::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(bk, bv)| bk == k && bv == v))
            }
            (HostValue::Scalar(a), HostValue::Scalar(b)) => a == b,
            (HostValue::Matrix(a), HostValue::Matrix(b)) | (HostValue::Array(a), HostValue::Array(b)) => {
                a == b
            }
            (HostValue::DataFrame(a), HostValue::DataFrame(b)) => a == b,
            (HostValue::Series(a), HostValue::Series(b)) => a == b,
            (
                HostValue::Opaque { type_name: at, repr: ar },
                HostValue::Opaque { type_name: bt, repr: br },
            ) => at == bt && ar == br,
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        HostValue::Float(f)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::List(items)
    }
}

impl From<Scalar> for HostValue {
    fn from(s: Scalar) -> Self {
        HostValue::Scalar(s)
    }
}

/// Dense row-major n-dimensional array.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<HostValue>,
}

impl NdArray {
    /// Create an array; the product of `shape` must equal `data.len()`
    pub fn new(shape: Vec<usize>, data: Vec<HostValue>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::InvalidValue(format!(
                "shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Create a 2-D array from equally long rows
    pub fn from_rows(rows: Vec<Vec<HostValue>>) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(Error::InvalidValue(format!(
                "matrix row {} has {} columns, expected {}",
                bad,
                rows[bad].len(),
                cols
            )));
        }
        let shape = vec![rows.len(), cols];
        Self::new(shape, rows.into_iter().flatten().collect())
    }

    /// Infer shape from nested lists/tuples. Leaves are any non-sequence value.
    pub fn from_nested(value: &HostValue) -> Result<Self> {
        let mut data = Vec::new();
        let shape = collect_nested(value, &mut data)?;
        Self::new(shape, data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[HostValue] {
        &self.data
    }

    /// Nested-list form, like `ndarray.tolist()`
    pub fn to_nested(&self) -> HostValue {
        nest(&self.shape, &self.data)
    }
}

fn collect_nested(value: &HostValue, data: &mut Vec<HostValue>) -> Result<Vec<usize>> {
    match value {
        HostValue::List(items) | HostValue::Tuple(items) => {
            let mut inner: Option<Vec<usize>> = None;
            for item in items {
                let shape = collect_nested(item, data)?;
                match &inner {
                    Some(expected) if *expected != shape => {
                        return Err(Error::InvalidValue(format!(
                            "ragged nested sequence: {:?} vs {:?}",
                            expected, shape
                        )));
                    }
                    Some(_) => {}
                    None => inner = Some(shape),
                }
            }
            let mut shape = vec![items.len()];
            shape.extend(inner.unwrap_or_default());
            Ok(shape)
        }
        leaf => {
            data.push(leaf.clone());
            Ok(Vec::new())
        }
    }
}

fn nest(shape: &[usize], data: &[HostValue]) -> HostValue {
    match shape.split_first() {
        None => data.first().cloned().unwrap_or(HostValue::None),
        Some((&len, rest)) => {
            let stride: usize = rest.iter().product();
            HostValue::List(
                (0..len)
                    .map(|i| nest(rest, &data[i * stride..(i + 1) * stride]))
                    .collect(),
            )
        }
    }
}

/// Tabular dataset: ordered named columns plus a row index.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    columns: Vec<(String, Vec<HostValue>)>,
    index: Vec<HostValue>,
}

impl DataFrame {
    /// Create a data frame; every column must have one cell per index label
    pub fn new(columns: Vec<(String, Vec<HostValue>)>, index: Vec<HostValue>) -> Result<Self> {
        if let Some((name, cells)) = columns.iter().find(|(_, c)| c.len() != index.len()) {
            return Err(Error::InvalidValue(format!(
                "column {:?} has {} rows, index has {}",
                name,
                cells.len(),
                index.len()
            )));
        }
        Ok(Self { columns, index })
    }

    /// Create a data frame with the default `0..n` index
    pub fn from_columns(columns: Vec<(String, Vec<HostValue>)>) -> Result<Self> {
        let rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let index = (0..rows as i64).map(HostValue::Int).collect();
        Self::new(columns, index)
    }

    pub fn columns(&self) -> &[(String, Vec<HostValue>)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[HostValue]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cells)| cells.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn index(&self) -> &[HostValue] {
        &self.index
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    /// Number of cells
    pub fn size(&self) -> usize {
        self.index.len() * self.columns.len()
    }
}

/// Labeled one-dimensional series.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    index: Vec<HostValue>,
    values: Vec<HostValue>,
}

impl Series {
    pub fn new(index: Vec<HostValue>, values: Vec<HostValue>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(Error::InvalidValue(format!(
                "series has {} values but {} index labels",
                values.len(),
                index.len()
            )));
        }
        Ok(Self { index, values })
    }

    pub fn from_values(values: Vec<HostValue>) -> Self {
        let index = (0..values.len() as i64).map(HostValue::Int).collect();
        Self { index, values }
    }

    pub fn index(&self) -> &[HostValue] {
        &self.index
    }

    pub fn values(&self) -> &[HostValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Python `repr(float)`: shortest round-trip digits, `1e+16` exponent style.
pub fn float_repr(f: f64) -> String {
    float_text(format!("{:?}", f), f)
}

fn float_text(debug: String, f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    match debug.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}

fn float_json(f: f64) -> Json {
    serde_json::Number::from_f64(f)
        .map(Json::Number)
        .unwrap_or(Json::Null)
}

/// Python `repr(str)`
pub fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn complex_part(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        if x == 0.0 && x.is_sign_negative() {
            "-0".to_string()
        } else {
            format!("{}", x as i64)
        }
    } else {
        float_repr(x)
    }
}

/// Python `repr(complex)`: `2j`, `(1+2j)`, `(1-2j)`
pub fn complex_repr(re: f64, im: f64) -> String {
    let imag = complex_part(im);
    if re == 0.0 && re.is_sign_positive() {
        return format!("{}j", imag);
    }
    if imag.starts_with('-') {
        format!("({}{}j)", complex_part(re), imag)
    } else {
        format!("({}+{}j)", complex_part(re), imag)
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[HostValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Renders the host repr; supported values re-parse with [`crate::decode`].
impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => f.write_str("None"),
            HostValue::Bool(true) => f.write_str("True"),
            HostValue::Bool(false) => f.write_str("False"),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Float(x) => f.write_str(&float_repr(*x)),
            HostValue::Str(s) => f.write_str(&str_repr(s)),
            HostValue::Complex { re, im } => f.write_str(&complex_repr(*re, *im)),
            HostValue::Range { start, stop, step: 1 } => write!(f, "range({}, {})", start, stop),
            HostValue::Range { start, stop, step } => {
                write!(f, "range({}, {}, {})", start, stop, step)
            }
            HostValue::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
            HostValue::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            HostValue::Tuple(items) => {
                f.write_str("(")?;
                write_seq(f, items)?;
                f.write_str(")")
            }
            HostValue::Dict(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            HostValue::Set(items) if items.is_empty() => f.write_str("set()"),
            HostValue::Set(items) => {
                f.write_str("{")?;
                write_seq(f, items)?;
                f.write_str("}")
            }
            HostValue::Scalar(s) => f.write_str(&s.literal()),
            HostValue::Matrix(a) => write!(f, "matrix({})", a.to_nested()),
            HostValue::Array(a) => write!(f, "array({})", a.to_nested()),
            HostValue::DataFrame(df) => {
                f.write_str("DataFrame({")?;
                for (i, (name, cells)) in df.columns().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: [", str_repr(name))?;
                    write_seq(f, cells)?;
                    f.write_str("]")?;
                }
                f.write_str("}, index=[")?;
                write_seq(f, df.index())?;
                f.write_str("])")
            }
            HostValue::Series(s) => {
                f.write_str("Series([")?;
                write_seq(f, s.values())?;
                f.write_str("], index=[")?;
                write_seq(f, s.index())?;
                f.write_str("])")
            }
            HostValue::Opaque { repr, .. } => f.write_str(repr),
        }
    }
}
