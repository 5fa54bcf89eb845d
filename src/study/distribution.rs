//! Distribution - parameter sampling specification

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::journal::float_codec;

/// Errors raised while reading a distribution or resolving a param value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    /// Distribution JSON could not be parsed at all
    #[error("malformed distribution: {0}")]
    Malformed(String),

    /// Required attribute is absent or has the wrong type
    #[error("distribution attribute `{0}` is missing or invalid")]
    InvalidAttribute(&'static str),

    /// Unrecognized distribution class name
    #[error("unknown distribution `{0}`")]
    Unknown(String),

    /// `low` is greater than `high`
    #[error("distribution low {low} exceeds high {high}")]
    InvertedBounds {
        /// Lower bound as written
        low: String,
        /// Upper bound as written
        high: String,
    },

    /// Internal value cannot be mapped onto the distribution
    #[error("internal value {value} is not valid for {distribution}")]
    InvalidInternal {
        /// Offending internal value
        value: String,
        /// Distribution kind
        distribution: &'static str,
    },
}

/// Parameter distribution that produced a sampled value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Continuous range, optionally discretized or log-scaled.
    Float {
        /// Lower bound (inclusive)
        low: f64,
        /// Upper bound (inclusive)
        high: f64,
        /// Discretization step
        step: Option<f64>,
        /// Log-scale sampling
        log: bool,
    },
    /// Integer range.
    Int {
        /// Lower bound (inclusive)
        low: i64,
        /// Upper bound (inclusive)
        high: i64,
        /// Step between candidate values
        step: i64,
        /// Log-scale sampling
        log: bool,
    },
    /// Finite ordered set of choices.
    Categorical {
        /// Candidate values; the internal representation is an index into this list
        choices: Vec<Value>,
    },
}

impl Distribution {
    /// Read a distribution as written in the journal.
    ///
    /// The journal stores distributions as a JSON-encoded string of the form
    /// `{"name": "FloatDistribution", "attributes": {...}}`; the decoded object
    /// form is accepted as well.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError`] if the JSON is malformed, the class is
    /// unknown, or an attribute is missing.
    pub fn from_json(value: &Value) -> Result<Self, DistributionError> {
        match value {
            Value::String(text) => {
                let parsed: Value = serde_json::from_str(text)
                    .map_err(|e| DistributionError::Malformed(e.to_string()))?;
                Self::from_object(&parsed)
            }
            Value::Object(_) => Self::from_object(value),
            other => Err(DistributionError::Malformed(format!(
                "expected a string or an object, got {other}"
            ))),
        }
    }

    fn from_object(value: &Value) -> Result<Self, DistributionError> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or(DistributionError::InvalidAttribute("name"))?;
        let attrs = value
            .get("attributes")
            .and_then(Value::as_object)
            .ok_or(DistributionError::InvalidAttribute("attributes"))?;

        let distribution = match name {
            "FloatDistribution" => Self::Float {
                low: float_attr(attrs, "low")?,
                high: float_attr(attrs, "high")?,
                step: optional_float_attr(attrs, "step")?,
                log: bool_attr(attrs, "log")?,
            },
            "UniformDistribution" => Self::Float {
                low: float_attr(attrs, "low")?,
                high: float_attr(attrs, "high")?,
                step: None,
                log: false,
            },
            "LogUniformDistribution" => Self::Float {
                low: float_attr(attrs, "low")?,
                high: float_attr(attrs, "high")?,
                step: None,
                log: true,
            },
            "DiscreteUniformDistribution" => Self::Float {
                low: float_attr(attrs, "low")?,
                high: float_attr(attrs, "high")?,
                step: Some(float_attr(attrs, "q")?),
                log: false,
            },
            "IntDistribution" => Self::Int {
                low: int_attr(attrs, "low")?,
                high: int_attr(attrs, "high")?,
                step: optional_int_attr(attrs, "step")?.unwrap_or(1),
                log: bool_attr(attrs, "log")?,
            },
            "IntUniformDistribution" => Self::Int {
                low: int_attr(attrs, "low")?,
                high: int_attr(attrs, "high")?,
                step: optional_int_attr(attrs, "step")?.unwrap_or(1),
                log: false,
            },
            "IntLogUniformDistribution" => Self::Int {
                low: int_attr(attrs, "low")?,
                high: int_attr(attrs, "high")?,
                step: 1,
                log: true,
            },
            "CategoricalDistribution" => Self::Categorical {
                choices: attrs
                    .get("choices")
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or(DistributionError::InvalidAttribute("choices"))?,
            },
            other => return Err(DistributionError::Unknown(other.to_string())),
        };

        distribution.validate()?;
        Ok(distribution)
    }

    fn validate(&self) -> Result<(), DistributionError> {
        match self {
            Self::Float { low, high, .. } if low > high => Err(DistributionError::InvertedBounds {
                low: low.to_string(),
                high: high.to_string(),
            }),
            Self::Int { low, high, .. } if low > high => Err(DistributionError::InvertedBounds {
                low: low.to_string(),
                high: high.to_string(),
            }),
            Self::Categorical { choices } if choices.is_empty() => {
                Err(DistributionError::InvalidAttribute("choices"))
            }
            _ => Ok(()),
        }
    }

    /// Optuna class name of this distribution.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Float { .. } => "FloatDistribution",
            Self::Int { .. } => "IntDistribution",
            Self::Categorical { .. } => "CategoricalDistribution",
        }
    }

    /// Convert an internal (storage) representation into the external value.
    ///
    /// Categorical internals are indices into `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::InvalidInternal`] if the value is not
    /// finite, or is not a valid categorical index.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_external(&self, internal: f64) -> Result<ParamValue, DistributionError> {
        let invalid = || DistributionError::InvalidInternal {
            value: internal.to_string(),
            distribution: self.kind_name(),
        };
        if !internal.is_finite() {
            return Err(invalid());
        }

        match self {
            Self::Float { .. } => Ok(ParamValue::Float(internal)),
            Self::Int { .. } => Ok(ParamValue::Int(internal as i64)),
            Self::Categorical { choices } => {
                if internal < 0.0 || internal.fract() != 0.0 {
                    return Err(invalid());
                }
                choices
                    .get(internal as usize)
                    .cloned()
                    .map(ParamValue::Categorical)
                    .ok_or_else(invalid)
            }
        }
    }
}

fn float_attr(attrs: &Map<String, Value>, key: &'static str) -> Result<f64, DistributionError> {
    attrs
        .get(key)
        .and_then(float_codec::decode)
        .ok_or(DistributionError::InvalidAttribute(key))
}

fn optional_float_attr(
    attrs: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<f64>, DistributionError> {
    match attrs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => float_codec::decode(value)
            .map(Some)
            .ok_or(DistributionError::InvalidAttribute(key)),
    }
}

fn int_attr(attrs: &Map<String, Value>, key: &'static str) -> Result<i64, DistributionError> {
    optional_int_attr(attrs, key)?.ok_or(DistributionError::InvalidAttribute(key))
}

#[allow(clippy::cast_possible_truncation)]
fn optional_int_attr(
    attrs: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<i64>, DistributionError> {
    match attrs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|v| v.is_finite() && v.fract() == 0.0)
                    .map(|v| v as i64)
            })
            .map(Some)
            .ok_or(DistributionError::InvalidAttribute(key)),
    }
}

fn bool_attr(attrs: &Map<String, Value>, key: &'static str) -> Result<bool, DistributionError> {
    match attrs.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(DistributionError::InvalidAttribute(key)),
    }
}

/// External value of a sampled parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Value drawn from a float distribution
    Float(f64),
    /// Value drawn from an int distribution
    Int(i64),
    /// Choice drawn from a categorical distribution
    Categorical(Value),
}

impl ParamValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Categorical(choice) => choice.as_f64(),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Float(v) => float_codec::serialize_f64(v, serializer),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Categorical(choice) => choice.serialize(serializer),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Categorical(Value::String(s)) => f.write_str(s),
            Self::Categorical(choice) => write!(f, "{choice}"),
        }
    }
}
