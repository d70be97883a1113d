use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FimsError, FimsResult};

/// How a condition combines with the others. Only conjunction is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOp {
    And,
    Or,
    Not,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterOp::And => "AND",
            FilterOp::Or => "OR",
            FilterOp::Not => "NOT",
        };
        write!(f, "{label}")
    }
}

impl FromStr for FilterOp {
    type Err = FimsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(FilterOp::And),
            "OR" => Ok(FilterOp::Or),
            "NOT" => Ok(FilterOp::Not),
            other => Err(FimsError::InvalidFilter(format!("unknown operation {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Property the value must be bound to; `None` matches any property.
    pub property: Option<String>,
    pub value: String,
    pub operation: FilterOp,
}

impl FilterCondition {
    pub fn new(property: Option<&str>, value: impl Into<String>, operation: FilterOp) -> Self {
        Self {
            property: property.map(str::to_string),
            value: value.into(),
            operation,
        }
    }

    pub fn and(property: Option<&str>, value: impl Into<String>) -> Self {
        Self::new(property, value, FilterOp::And)
    }
}

/// Parses `value`, `<property>=value` or `OP:<property>=value`.
impl FromStr for FilterCondition {
    type Err = FimsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (operation, rest) = match raw.split_once(':') {
            Some((op, rest)) if !op.starts_with('<') && op.parse::<FilterOp>().is_ok() => {
                (op.parse()?, rest)
            }
            _ => (FilterOp::And, raw),
        };
        if let Some(body) = rest.strip_prefix('<') {
            let (property, value) = body
                .split_once(">=")
                .ok_or_else(|| FimsError::InvalidFilter(raw.to_string()))?;
            if property.trim().is_empty() {
                return Err(FimsError::InvalidFilter(raw.to_string()));
            }
            return Ok(Self::new(Some(property.trim()), value, operation));
        }
        if rest.is_empty() {
            return Err(FimsError::InvalidFilter(raw.to_string()));
        }
        Ok(Self::new(None, rest, operation))
    }
}

/// Rejects anything but AND conditions.
pub fn validate_filters(filters: &[FilterCondition]) -> FimsResult<()> {
    match filters
        .iter()
        .find(|filter| filter.operation != FilterOp::And)
    {
        Some(filter) => Err(FimsError::UnsupportedFilterOperation(
            filter.operation.to_string(),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_filter_forms() {
        let any: FilterCondition = "Echinodermata".parse().unwrap();
        assert_eq!(any, FilterCondition::and(None, "Echinodermata"));

        let bound: FilterCondition = "<urn:phylum>=Echinodermata".parse().unwrap();
        assert_eq!(bound.property.as_deref(), Some("urn:phylum"));
        assert_eq!(bound.value, "Echinodermata");

        let or: FilterCondition = "or:<urn:phylum>=Chordata".parse().unwrap();
        assert_eq!(or.operation, FilterOp::Or);
    }

    #[test]
    fn or_and_not_are_rejected() {
        let filters = vec![
            FilterCondition::and(None, "x"),
            FilterCondition::new(None, "y", FilterOp::Not),
        ];
        assert_matches!(
            validate_filters(&filters),
            Err(FimsError::UnsupportedFilterOperation(op)) if op == "NOT"
        );
    }
}
