//! Data validation rules attached to sheet cells

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::value::coerce_number;
use crate::domain::Value;

/// A constraint the sheet enforces on typed-in values.
///
/// Value writes that violate an active rule are rejected, which is why the
/// writer suspends rules around each import write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Value must be one of a fixed list (a dropdown)
    OneOf { values: Vec<String> },
    /// Numeric value within an inclusive range
    NumberBetween { min: f64, max: f64 },
    /// Value must be a date
    ValidDate,
    /// Text no longer than `max` characters
    TextMaxLength { max: usize },
}

impl ValidationRule {
    /// Whether the rule accepts `value`. Blank cells always pass.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_empty() {
            return true;
        }
        match self {
            ValidationRule::OneOf { values } => {
                let text = value.key_text();
                values.iter().any(|v| *v == text)
            }
            ValidationRule::NumberBetween { min, max } => {
                let n = match value {
                    Value::Number(n) => Some(*n),
                    Value::Text(s) => coerce_number(s),
                    _ => None,
                };
                n.is_some_and(|n| n >= *min && n <= *max)
            }
            ValidationRule::ValidDate => matches!(value, Value::Timestamp(_)),
            ValidationRule::TextMaxLength { max } => value.key_text().chars().count() <= *max,
        }
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::OneOf { values } => write!(f, "one-of:{}", values.join("|")),
            ValidationRule::NumberBetween { min, max } => write!(f, "between:{}:{}", min, max),
            ValidationRule::ValidDate => f.write_str("date"),
            ValidationRule::TextMaxLength { max } => write!(f, "max-length:{}", max),
        }
    }
}

/// Parses the `Display` form, e.g. `one-of:Food|Rent`, `between:0:100`,
/// `date`, `max-length:40`.
impl FromStr for ValidationRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s.split_once(':').unwrap_or((s, ""));
        let invalid = || Error::validation(format!("Invalid validation rule: {}", s));
        match kind {
            "one-of" if !rest.is_empty() => Ok(ValidationRule::OneOf {
                values: rest.split('|').map(str::to_string).collect(),
            }),
            "between" => {
                let (min, max) = rest.split_once(':').ok_or_else(invalid)?;
                let min: f64 = min.trim().parse().map_err(|_| invalid())?;
                let max: f64 = max.trim().parse().map_err(|_| invalid())?;
                if min > max {
                    return Err(invalid());
                }
                Ok(ValidationRule::NumberBetween { min, max })
            }
            "date" if rest.is_empty() => Ok(ValidationRule::ValidDate),
            "max-length" => Ok(ValidationRule::TextMaxLength {
                max: rest.trim().parse().map_err(|_| invalid())?,
            }),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_one_of() {
        let rule: ValidationRule = "one-of:Food|Rent".parse().unwrap();
        assert!(rule.accepts(&Value::text("Food")));
        assert!(!rule.accepts(&Value::text("Travel")));
        assert!(rule.accepts(&Value::Empty));
    }

    #[test]
    fn test_number_between() {
        let rule: ValidationRule = "between:0:100".parse().unwrap();
        assert!(rule.accepts(&Value::Number(42.0)));
        assert!(rule.accepts(&Value::text("99.5")));
        assert!(!rule.accepts(&Value::Number(-1.0)));
        assert!(!rule.accepts(&Value::text("lots")));
    }

    #[test]
    fn test_valid_date() {
        let rule = ValidationRule::ValidDate;
        assert!(rule.accepts(&Value::Timestamp(Utc::now())));
        assert!(!rule.accepts(&Value::text("2024-01-15")));
    }

    #[test]
    fn test_round_trip_display() {
        for text in ["one-of:A|B", "between:1:2", "date", "max-length:40"] {
            let rule: ValidationRule = text.parse().unwrap();
            assert_eq!(rule.to_string(), text);
        }
        assert!("between:5:1".parse::<ValidationRule>().is_err());
        assert!("nonsense".parse::<ValidationRule>().is_err());
    }
}
