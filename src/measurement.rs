//! Measurement variables and their valid ranges.

use crate::classifier::INPUTS;
use std::fmt;

/// One of the four flower measurements accepted by `input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    SepalLength,
    SepalWidth,
    PetalLength,
    PetalWidth,
}

impl Variable {
    /// All variables in classifier input order.
    pub const ALL: [Variable; INPUTS] = [
        Variable::SepalLength,
        Variable::SepalWidth,
        Variable::PetalLength,
        Variable::PetalWidth,
    ];

    /// Look up a variable by its wire name (already lowercased).
    pub fn from_name(name: &str) -> Option<Variable> {
        Variable::ALL.into_iter().find(|v| v.name() == name)
    }

    /// Wire name of the variable.
    pub fn name(self) -> &'static str {
        match self {
            Variable::SepalLength => "sepallength",
            Variable::SepalWidth => "sepalwidth",
            Variable::PetalLength => "petallength",
            Variable::PetalWidth => "petalwidth",
        }
    }

    /// Closed range of accepted values, in centimetres.
    pub fn range(self) -> (f64, f64) {
        match self {
            Variable::SepalLength => (4.3, 7.9),
            Variable::SepalWidth => (2.0, 4.4),
            Variable::PetalLength => (1.0, 6.9),
            Variable::PetalWidth => (0.1, 2.5),
        }
    }

    /// Position in the classifier input vector.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated measurement and its value rescaled into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub original: f64,
    pub normalized: f64,
}

impl Measurement {
    /// Validate `value` against the variable's range and normalize it.
    ///
    /// Returns `None` when the value lies outside the closed range
    /// (NaN included).
    pub fn new(variable: Variable, value: f64) -> Option<Measurement> {
        let (min, max) = variable.range();
        if !(min..=max).contains(&value) {
            return None;
        }

        Some(Measurement {
            original: value,
            normalized: (value - min) / (max - min),
        })
    }
}

/// Format a measurement the way it was entered: shortest round-trip
/// digits, always with a fractional part (`5` prints as `5.0`).
pub fn format_value(value: f64) -> String {
    format!("{:?}", value)
}
