//! Typed reducers folding the values kept for one admin unit.

use hdx_model::{CellValue, format_numeric};
use serde::{Deserialize, Serialize};

use crate::expr::{ExprError, Expression};

/// Variables available to [`Reducer::Expression`].
pub const REDUCER_VARIABLES: &[&str] = &["sum", "mean", "min", "max", "count", "first", "last"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reducer {
    Sum,
    Mean,
    Min,
    Max,
    /// `"min-max"` as text, or the single value when they coincide.
    Range,
    /// Arithmetic over the summary variables in [`REDUCER_VARIABLES`].
    Expression { expression: String },
}

/// Numeric summary of a value list. Non-numeric values are skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Summary {
    sum: f64,
    min: f64,
    max: f64,
    count: usize,
    first: f64,
    last: f64,
}

impl Summary {
    fn of(values: &[CellValue]) -> Option<Self> {
        let mut numbers = values.iter().filter_map(CellValue::as_f64);
        let first = numbers.next()?;
        let mut summary = Self {
            sum: first,
            min: first,
            max: first,
            count: 1,
            first,
            last: first,
        };
        for n in numbers {
            summary.sum += n;
            summary.min = summary.min.min(n);
            summary.max = summary.max.max(n);
            summary.count += 1;
            summary.last = n;
        }
        Some(summary)
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    fn variable(&self, name: &str) -> Option<f64> {
        match name {
            "sum" => Some(self.sum),
            "mean" => Some(self.mean()),
            "min" => Some(self.min),
            "max" => Some(self.max),
            "count" => Some(self.count as f64),
            "first" => Some(self.first),
            "last" => Some(self.last),
            _ => None,
        }
    }
}

impl Reducer {
    /// Parses an expression reducer once so it can fold many lists.
    pub fn compile(&self) -> Result<CompiledReducer, ExprError> {
        Ok(match self {
            Self::Sum => CompiledReducer::Sum,
            Self::Mean => CompiledReducer::Mean,
            Self::Min => CompiledReducer::Min,
            Self::Max => CompiledReducer::Max,
            Self::Range => CompiledReducer::Range,
            Self::Expression { expression } => {
                CompiledReducer::Expression(Expression::parse(expression)?)
            }
        })
    }

    /// Folds `values` into one cell. A list without any numeric value reduces
    /// to `Null`.
    pub fn reduce(&self, values: &[CellValue]) -> Result<CellValue, ExprError> {
        self.compile()?.reduce(values)
    }
}

/// A [`Reducer`] with its expression already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledReducer {
    Sum,
    Mean,
    Min,
    Max,
    Range,
    Expression(Expression),
}

impl CompiledReducer {
    pub fn reduce(&self, values: &[CellValue]) -> Result<CellValue, ExprError> {
        let Some(summary) = Summary::of(values) else {
            return Ok(CellValue::Null);
        };
        let value = match self {
            Self::Sum => CellValue::from_number(summary.sum),
            Self::Mean => CellValue::from_number(summary.mean()),
            Self::Min => CellValue::from_number(summary.min),
            Self::Max => CellValue::from_number(summary.max),
            Self::Range if summary.min == summary.max => CellValue::from_number(summary.min),
            Self::Range => CellValue::Text(format!(
                "{}-{}",
                format_numeric(summary.min),
                format_numeric(summary.max)
            )),
            Self::Expression(expression) => {
                CellValue::from_number(expression.evaluate(&|name| summary.variable(name))?)
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(numbers: &[f64]) -> Vec<CellValue> {
        numbers.iter().copied().map(CellValue::from).collect()
    }

    #[test]
    fn arithmetic_reducers() {
        let list = values(&[3.0, 1.0, 8.0]);
        assert_eq!(Reducer::Sum.reduce(&list), Ok(CellValue::Int(12)));
        assert_eq!(Reducer::Mean.reduce(&list), Ok(CellValue::Int(4)));
        assert_eq!(Reducer::Min.reduce(&list), Ok(CellValue::Int(1)));
        assert_eq!(Reducer::Max.reduce(&list), Ok(CellValue::Int(8)));
    }

    #[test]
    fn range_collapses_equal_bounds() {
        assert_eq!(
            Reducer::Range.reduce(&values(&[2.5, 7.0])),
            Ok(CellValue::Text("2.5-7".to_string()))
        );
        assert_eq!(Reducer::Range.reduce(&values(&[4.0, 4.0])), Ok(CellValue::Int(4)));
    }

    #[test]
    fn expression_reducer_uses_summary_variables() {
        let reducer = Reducer::Expression {
            expression: "sum / count * 100".to_string(),
        };
        assert_eq!(
            reducer.reduce(&values(&[0.25, 0.75])),
            Ok(CellValue::Int(50))
        );
    }

    #[test]
    fn compiled_reducer_folds_many_lists() {
        let reducer = Reducer::Expression {
            expression: "max - min".to_string(),
        }
        .compile()
        .expect("compile reducer");
        assert_eq!(reducer.reduce(&values(&[2.0, 9.0])), Ok(CellValue::Int(7)));
        assert_eq!(reducer.reduce(&values(&[5.0])), Ok(CellValue::Int(0)));
        assert_eq!(reducer.reduce(&[]), Ok(CellValue::Null));
    }

    #[test]
    fn unparseable_reducer_fails_to_compile() {
        let reducer = Reducer::Expression {
            expression: "sum +".to_string(),
        };
        assert!(reducer.compile().is_err());
    }

    #[test]
    fn non_numeric_lists_reduce_to_null() {
        let list = vec![CellValue::from("n/a"), CellValue::Null];
        assert_eq!(Reducer::Sum.reduce(&list), Ok(CellValue::Null));
    }
}
