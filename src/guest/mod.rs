//! Guest (SysML kernel) value model
//!
//! The guest runtime owns its values; this model exists so the crate can
//! reason about the other half of the transfer: what the encoder's output
//! evaluates to, and what the guest's canonicalization routine prints back.

pub mod canonical;
pub mod reader;

pub use canonical::canonicalize;
pub use reader::read;

/// A value as the guest runtime holds it.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestValue {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Complex(f64, f64),
    /// `(first..last)` or `(first...last)` when `exclusive`
    Range { first: i64, last: i64, exclusive: bool },
    Array(Vec<GuestValue>),
    /// Insertion-ordered, like the guest's hashes
    Hash(Vec<(GuestValue, GuestValue)>),
    Set(Vec<GuestValue>),
    /// `N[...]` matrix, stored by rows
    Matrix(Vec<Vec<GuestValue>>),
    DataFrame {
        vectors: Vec<(String, Vec<GuestValue>)>,
        index: Vec<GuestValue>,
    },
    /// Any other guest object, by class name
    Object(String),
}

impl GuestValue {
    /// Class name as the guest reports it
    pub fn class_name(&self) -> &str {
        match self {
            GuestValue::Nil => "NilClass",
            GuestValue::Bool(true) => "TrueClass",
            GuestValue::Bool(false) => "FalseClass",
            GuestValue::Integer(_) => "Integer",
            GuestValue::Float(_) => "Float",
            GuestValue::Str(_) => "String",
            GuestValue::Complex(..) => "Complex",
            GuestValue::Range { .. } => "Range",
            GuestValue::Array(_) => "Array",
            GuestValue::Hash(_) => "Hash",
            GuestValue::Set(_) => "Set",
            GuestValue::Matrix(_) => "NMatrix",
            GuestValue::DataFrame { .. } => "Sysml::DataFrame",
            GuestValue::Object(class) => class,
        }
    }

    /// The guest's `size`: element count for collections, cell count for
    /// matrices and data frames.
    pub fn size(&self) -> Option<usize> {
        match self {
            GuestValue::Str(s) => Some(s.chars().count()),
            GuestValue::Array(items) | GuestValue::Set(items) => Some(items.len()),
            GuestValue::Hash(pairs) => Some(pairs.len()),
            GuestValue::Range { first, last, exclusive } => {
                let end = if *exclusive { *last - 1 } else { *last };
                Some(if end >= *first { (end - first + 1) as usize } else { 0 })
            }
            GuestValue::Matrix(rows) => Some(rows.iter().map(Vec::len).sum()),
            GuestValue::DataFrame { vectors, index } => Some(vectors.len() * index.len()),
            _ => None,
        }
    }

    /// Same value for guest `==` purposes; sets and hashes ignore order
    pub fn same_as(&self, other: &GuestValue) -> bool {
        match (self, other) {
            (GuestValue::Set(a), GuestValue::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.same_as(y)))
            }
            (GuestValue::Hash(a), GuestValue::Hash(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(bk, bv)| k.same_as(bk) && v.same_as(bv))
                    })
            }
            (GuestValue::Array(a), GuestValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (a, b) => a == b,
        }
    }

    /// The guest's `to_s`, used for hash keys and column names
    pub fn to_s(&self) -> String {
        match self {
            GuestValue::Nil => String::new(),
            GuestValue::Str(s) => s.clone(),
            GuestValue::Bool(b) => b.to_string(),
            GuestValue::Integer(i) => i.to_string(),
            GuestValue::Float(f) => canonical::float_inspect(*f),
            other => canonical::inspect(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches_guest() {
        let matrix = GuestValue::Matrix(vec![
            vec![GuestValue::Integer(1), GuestValue::Integer(2)],
            vec![GuestValue::Integer(3), GuestValue::Integer(4)],
        ]);
        assert_eq!(matrix.size(), Some(4));

        let range = GuestValue::Range { first: 1, last: 5, exclusive: true };
        assert_eq!(range.size(), Some(4));
        assert_eq!(GuestValue::Nil.size(), None);
    }

    #[test]
    fn test_same_as_ignores_set_order() {
        let a = GuestValue::Set(vec![GuestValue::Integer(1), GuestValue::Str("3".to_string())]);
        let b = GuestValue::Set(vec![GuestValue::Str("3".to_string()), GuestValue::Integer(1)]);
        assert!(a.same_as(&b));
        assert_ne!(a, b);
    }
}
