use std::fmt;

use super::error::ConstructionError;

/// Literal carried by a `value` token.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
}

impl Value {
    /// Text shown to the user for this literal. Strings are shown unquoted.
    #[must_use]
    pub fn display_label(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// A float literal, rejecting NaN and the infinities, which have no
    /// JSON or notation form.
    pub fn float(v: f64) -> Result<Value, ConstructionError> {
        Value::Float(v).checked()
    }

    /// `self`, unless it is a non-finite float.
    pub fn checked(self) -> Result<Value, ConstructionError> {
        match self {
            Value::Float(v) if !v.is_finite() => Err(ConstructionError::InvalidLiteral {
                literal: format!("{v}"),
            }),
            other => Ok(other),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            // Debug keeps the fractional part (`1.0`), so the literal reads back as a float.
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => {
                f.write_str("\"")?;
                for c in v.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_i64() {
        assert_eq!(Value::from(42_i64), Value::Int(42));
    }

    #[test]
    fn from_f64() {
        assert_eq!(Value::from(2.5_f64), Value::Float(2.5));
    }

    #[test]
    fn float_rejects_non_finite() {
        assert_eq!(Value::float(0.5), Ok(Value::Float(0.5)));
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                Value::float(v),
                Err(ConstructionError::InvalidLiteral { .. })
            ));
        }
        assert_eq!(
            Value::float(f64::INFINITY).unwrap_err().to_string(),
            "invalid literal 'inf': numbers must be finite"
        );
        assert_eq!(Value::Int(3).checked(), Ok(Value::Int(3)));
    }

    #[test]
    fn from_bool() {
        assert_eq!(Value::from(true), Value::Bool(true));
    }

    #[test]
    fn from_str() {
        assert_eq!(Value::from("north"), Value::String("north".to_owned()));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(0.21).to_string(), "0.21");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::String("hello".into()).to_string(), "\"hello\"");
    }

    #[test]
    fn display_escapes_quotes() {
        assert_eq!(Value::String("a\"b\\c".into()).to_string(), r#""a\"b\\c""#);
    }

    #[test]
    fn display_label_unquotes_strings() {
        assert_eq!(Value::String("north".into()).display_label(), "north");
        assert_eq!(Value::Int(10).display_label(), "10");
    }
}
