//! Operation decoder - one journal record into a typed operation
//!
//! Records are JSON objects discriminated by an integer `op_code`. Decoding
//! is two-staged: a structural JSON parse, then a projection of the object
//! onto one [`Operation`] variant. Either stage failing rejects only the
//! record at hand.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

use super::float_codec;
use crate::study::{
    Distribution, DistributionError, ParamValue, StudyDirection, TrialParam, TrialState,
};

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Record-level decode failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Structural JSON failure; the message is the parser's own diagnostic
    #[error("{0}")]
    Syntax(String),

    /// Record bytes are not UTF-8
    #[error("record is not valid UTF-8: {0}")]
    NotUtf8(String),

    /// Record parsed but is not a JSON object
    #[error("record is not a JSON object")]
    NotAnObject,

    /// Record has no `op_code`
    #[error("record has no `op_code`")]
    MissingOpCode,

    /// `op_code` names no known operation
    #[error("unknown op_code {0}")]
    UnknownOpCode(String),

    /// Required field is absent
    #[error("{op}: missing field `{field}`")]
    MissingField {
        /// Operation being decoded
        op: &'static str,
        /// Field name
        field: &'static str,
    },

    /// Field is present but has the wrong shape
    #[error("{op}: invalid field `{field}`: {reason}")]
    InvalidField {
        /// Operation being decoded
        op: &'static str,
        /// Field name
        field: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Param distribution could not be read or applied
    #[error("{op}: param `{param}`: {source}")]
    Distribution {
        /// Operation being decoded
        op: &'static str,
        /// Param name
        param: String,
        /// Underlying distribution error
        #[source]
        source: DistributionError,
    },
}

/// Journal operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// 0
    CreateStudy,
    /// 1
    DeleteStudy,
    /// 2
    SetStudyUserAttr,
    /// 3
    SetStudySystemAttr,
    /// 4
    SetStudyDirections,
    /// 5
    CreateTrial,
    /// 6
    SetTrialParam,
    /// 7
    SetTrialStateValues,
    /// 8
    SetTrialIntermediateValue,
    /// 9
    SetTrialUserAttr,
    /// 10
    SetTrialSystemAttr,
}

impl OpCode {
    /// Map a journal `op_code` onto an operation kind.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0 => Self::CreateStudy,
            1 => Self::DeleteStudy,
            2 => Self::SetStudyUserAttr,
            3 => Self::SetStudySystemAttr,
            4 => Self::SetStudyDirections,
            5 => Self::CreateTrial,
            6 => Self::SetTrialParam,
            7 => Self::SetTrialStateValues,
            8 => Self::SetTrialIntermediateValue,
            9 => Self::SetTrialUserAttr,
            10 => Self::SetTrialSystemAttr,
            _ => return None,
        })
    }

    /// Journal `op_code` of this kind.
    #[must_use]
    pub const fn code(self) -> u64 {
        self as u64
    }

    /// Operation name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateStudy => "CreateStudy",
            Self::DeleteStudy => "DeleteStudy",
            Self::SetStudyUserAttr => "SetStudyUserAttr",
            Self::SetStudySystemAttr => "SetStudySystemAttr",
            Self::SetStudyDirections => "SetStudyDirections",
            Self::CreateTrial => "CreateTrial",
            Self::SetTrialParam => "SetTrialParam",
            Self::SetTrialStateValues => "SetTrialStateValues",
            Self::SetTrialIntermediateValue => "SetTrialIntermediateValue",
            Self::SetTrialUserAttr => "SetTrialUserAttr",
            Self::SetTrialSystemAttr => "SetTrialSystemAttr",
        }
    }
}

/// Full payload of a trial created with more than an initial state.
///
/// Workers enqueueing or copying trials write them in one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialPayload {
    /// Start timestamp
    pub datetime_start: Option<NaiveDateTime>,
    /// Completion timestamp
    pub datetime_complete: Option<NaiveDateTime>,
    /// Params with resolved external values
    pub params: Vec<TrialParam>,
    /// User attributes
    pub user_attrs: BTreeMap<String, Value>,
    /// System attributes
    pub system_attrs: BTreeMap<String, Value>,
    /// Objective values
    pub values: Option<Vec<f64>>,
    /// Intermediate values by step
    pub intermediate_values: BTreeMap<u64, f64>,
}

/// A decoded journal operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Create a study.
    CreateStudy {
        /// Study name
        name: String,
        /// One direction per objective
        directions: Vec<StudyDirection>,
    },
    /// Remove a study from the visible collection.
    DeleteStudy {
        /// Target study
        study_id: usize,
    },
    /// Set one study user attribute.
    SetStudyUserAttr {
        /// Target study
        study_id: usize,
        /// Attribute key
        key: String,
        /// Attribute value
        value: Value,
    },
    /// Set one study system attribute.
    SetStudySystemAttr {
        /// Target study
        study_id: usize,
        /// Attribute key
        key: String,
        /// Attribute value
        value: Value,
    },
    /// Declare the study directions after creation.
    SetStudyDirections {
        /// Target study
        study_id: usize,
        /// One direction per objective
        directions: Vec<StudyDirection>,
    },
    /// Create a trial in a study.
    CreateTrial {
        /// Owning study
        study_id: usize,
        /// State the trial starts in
        initial_state: TrialState,
        /// Fields set together with creation
        payload: Box<TrialPayload>,
    },
    /// Set one param of a trial.
    SetTrialParam {
        /// Target trial
        trial_id: usize,
        /// The param, with its external value resolved
        param: TrialParam,
    },
    /// Transition a trial, optionally setting its objective values.
    SetTrialStateValues {
        /// Target trial
        trial_id: usize,
        /// New state
        state: TrialState,
        /// New objective values; `None` keeps the current ones
        values: Option<Vec<f64>>,
        /// Start timestamp
        datetime_start: Option<NaiveDateTime>,
        /// Completion timestamp
        datetime_complete: Option<NaiveDateTime>,
    },
    /// Report an intermediate value.
    SetTrialIntermediateValue {
        /// Target trial
        trial_id: usize,
        /// Step
        step: u64,
        /// Value at the step
        value: f64,
    },
    /// Set one trial user attribute.
    SetTrialUserAttr {
        /// Target trial
        trial_id: usize,
        /// Attribute key
        key: String,
        /// Attribute value
        value: Value,
    },
    /// Set one trial system attribute.
    SetTrialSystemAttr {
        /// Target trial
        trial_id: usize,
        /// Attribute key
        key: String,
        /// Attribute value
        value: Value,
    },
}

impl Operation {
    /// Kind of this operation.
    #[must_use]
    pub const fn op_code(&self) -> OpCode {
        match self {
            Self::CreateStudy { .. } => OpCode::CreateStudy,
            Self::DeleteStudy { .. } => OpCode::DeleteStudy,
            Self::SetStudyUserAttr { .. } => OpCode::SetStudyUserAttr,
            Self::SetStudySystemAttr { .. } => OpCode::SetStudySystemAttr,
            Self::SetStudyDirections { .. } => OpCode::SetStudyDirections,
            Self::CreateTrial { .. } => OpCode::CreateTrial,
            Self::SetTrialParam { .. } => OpCode::SetTrialParam,
            Self::SetTrialStateValues { .. } => OpCode::SetTrialStateValues,
            Self::SetTrialIntermediateValue { .. } => OpCode::SetTrialIntermediateValue,
            Self::SetTrialUserAttr { .. } => OpCode::SetTrialUserAttr,
            Self::SetTrialSystemAttr { .. } => OpCode::SetTrialSystemAttr,
        }
    }
}

/// A decoded record: the operation plus the envelope it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Writer that appended the record
    pub worker_id: Option<String>,
    /// The operation
    pub operation: Operation,
}

/// Decoder switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Retry with bare `Infinity`/`-Infinity`/`NaN` tokens quoted when the
    /// strict parse fails.
    pub lenient_non_finite: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            lenient_non_finite: true,
        }
    }
}

/// Decode one record's text into an operation.
///
/// # Errors
///
/// Returns [`DecodeError::Syntax`] carrying the JSON parser's diagnostic
/// verbatim when the text is not JSON, and other [`DecodeError`] variants
/// when the object does not match any operation.
///
/// ```rust
/// use trueno_journal::journal::{decode_record, DecodeOptions, Operation};
///
/// let record = r#"{"op_code": 0, "worker_id": "w-1", "study_name": "demo", "directions": [1]}"#;
/// let decoded = decode_record(record, &DecodeOptions::default())?;
/// assert!(matches!(decoded.operation, Operation::CreateStudy { ref name, .. } if name == "demo"));
/// # Ok::<(), trueno_journal::journal::DecodeError>(())
/// ```
pub fn decode_record(text: &str, options: &DecodeOptions) -> Result<DecodedRecord, DecodeError> {
    let value = parse_json(text, options)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let raw_code = object.get("op_code").ok_or(DecodeError::MissingOpCode)?;
    let op = raw_code
        .as_u64()
        .and_then(OpCode::from_code)
        .ok_or_else(|| DecodeError::UnknownOpCode(raw_code.to_string()))?;

    let worker_id = object
        .get("worker_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let operation = Fields { op, object }.decode()?;

    Ok(DecodedRecord {
        worker_id,
        operation,
    })
}

fn parse_json(text: &str, options: &DecodeOptions) -> Result<Value, DecodeError> {
    let strict = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if options.lenient_non_finite {
        if let Cow::Owned(quoted) = float_codec::quote_bare_tokens(text) {
            if let Ok(value) = serde_json::from_str(&quoted) {
                return Ok(value);
            }
        }
    }

    Err(DecodeError::Syntax(strict.to_string()))
}

/// Field accessors bound to the operation being decoded, so every error
/// names its operation.
struct Fields<'a> {
    op: OpCode,
    object: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn decode(&self) -> Result<Operation, DecodeError> {
        Ok(match self.op {
            OpCode::CreateStudy => Operation::CreateStudy {
                name: self.string("study_name")?,
                directions: self.directions("directions")?,
            },
            OpCode::DeleteStudy => Operation::DeleteStudy {
                study_id: self.index("study_id")?,
            },
            OpCode::SetStudyUserAttr => {
                let (key, value) = self.single_attr("user_attr")?;
                Operation::SetStudyUserAttr {
                    study_id: self.index("study_id")?,
                    key,
                    value,
                }
            }
            OpCode::SetStudySystemAttr => {
                let (key, value) = self.single_attr("system_attr")?;
                Operation::SetStudySystemAttr {
                    study_id: self.index("study_id")?,
                    key,
                    value,
                }
            }
            OpCode::SetStudyDirections => Operation::SetStudyDirections {
                study_id: self.index("study_id")?,
                directions: self.directions("directions")?,
            },
            OpCode::CreateTrial => Operation::CreateTrial {
                study_id: self.index("study_id")?,
                initial_state: self.optional_state("state")?.unwrap_or(TrialState::Running),
                payload: Box::new(self.trial_payload()?),
            },
            OpCode::SetTrialParam => {
                let name = self.string("param_name")?;
                let internal = self.float("param_value_internal")?;
                let param = self.param(name, internal, self.required("distribution")?)?;
                Operation::SetTrialParam {
                    trial_id: self.index("trial_id")?,
                    param,
                }
            }
            OpCode::SetTrialStateValues => Operation::SetTrialStateValues {
                trial_id: self.index("trial_id")?,
                state: self
                    .optional_state("state")?
                    .ok_or_else(|| self.missing("state"))?,
                values: self.optional_floats("values")?,
                datetime_start: self.optional_datetime("datetime_start")?,
                datetime_complete: self.optional_datetime("datetime_complete")?,
            },
            OpCode::SetTrialIntermediateValue => Operation::SetTrialIntermediateValue {
                trial_id: self.index("trial_id")?,
                step: self.step("step")?,
                value: self.float("intermediate_value")?,
            },
            OpCode::SetTrialUserAttr => {
                let (key, value) = self.single_attr("user_attr")?;
                Operation::SetTrialUserAttr {
                    trial_id: self.index("trial_id")?,
                    key,
                    value,
                }
            }
            OpCode::SetTrialSystemAttr => {
                let (key, value) = self.single_attr("system_attr")?;
                Operation::SetTrialSystemAttr {
                    trial_id: self.index("trial_id")?,
                    key,
                    value,
                }
            }
        })
    }

    fn trial_payload(&self) -> Result<TrialPayload, DecodeError> {
        let values = match self.optional_floats("values")? {
            Some(values) => Some(values),
            None => self.optional_float("value")?.map(|v| vec![v]),
        };

        let distributions = self.optional_object("distributions")?;
        let mut params = Vec::new();
        if let Some(internals) = self.optional_object("params")? {
            for (name, internal) in internals {
                let internal = float_codec::decode(internal)
                    .ok_or_else(|| self.invalid("params", format!("`{name}` is not a number")))?;
                let raw = distributions.and_then(|d| d.get(name)).ok_or_else(|| {
                    self.invalid("distributions", format!("no entry for `{name}`"))
                })?;
                params.push(self.param(name.clone(), internal, raw)?);
            }
        }

        let mut intermediate_values = BTreeMap::new();
        if let Some(steps) = self.optional_object("intermediate_values")? {
            for (step, value) in steps {
                let step = step.parse::<u64>().map_err(|_| {
                    self.invalid("intermediate_values", format!("bad step `{step}`"))
                })?;
                let value = float_codec::decode(value).ok_or_else(|| {
                    self.invalid("intermediate_values", format!("step {step} is not a number"))
                })?;
                intermediate_values.insert(step, value);
            }
        }

        Ok(TrialPayload {
            datetime_start: self.optional_datetime("datetime_start")?,
            datetime_complete: self.optional_datetime("datetime_complete")?,
            params,
            user_attrs: self.attrs("user_attrs")?,
            system_attrs: self.attrs("system_attrs")?,
            values,
            intermediate_values,
        })
    }

    fn param(&self, name: String, internal: f64, raw: &Value) -> Result<TrialParam, DecodeError> {
        let distribution = Distribution::from_json(raw)
            .map_err(|source| self.distribution_error(&name, source))?;
        let value: ParamValue = distribution
            .to_external(internal)
            .map_err(|source| self.distribution_error(&name, source))?;
        Ok(TrialParam::new(name, value, internal, distribution))
    }

    fn distribution_error(&self, param: &str, source: DistributionError) -> DecodeError {
        DecodeError::Distribution {
            op: self.op.name(),
            param: param.to_string(),
            source,
        }
    }

    fn missing(&self, field: &'static str) -> DecodeError {
        DecodeError::MissingField {
            op: self.op.name(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> DecodeError {
        DecodeError::InvalidField {
            op: self.op.name(),
            field,
            reason: reason.into(),
        }
    }

    fn required(&self, field: &'static str) -> Result<&'a Value, DecodeError> {
        self.object.get(field).ok_or_else(|| self.missing(field))
    }

    fn optional(&self, field: &'static str) -> Option<&'a Value> {
        self.object.get(field).filter(|v| !v.is_null())
    }

    fn string(&self, field: &'static str) -> Result<String, DecodeError> {
        self.required(field)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(field, "expected a string"))
    }

    fn index(&self, field: &'static str) -> Result<usize, DecodeError> {
        self.required(field)?
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| self.invalid(field, "expected a non-negative integer"))
    }

    fn step(&self, field: &'static str) -> Result<u64, DecodeError> {
        self.required(field)?
            .as_u64()
            .ok_or_else(|| self.invalid(field, "expected a non-negative integer"))
    }

    fn float(&self, field: &'static str) -> Result<f64, DecodeError> {
        float_codec::decode(self.required(field)?)
            .ok_or_else(|| self.invalid(field, "expected a number"))
    }

    fn optional_float(&self, field: &'static str) -> Result<Option<f64>, DecodeError> {
        self.optional(field)
            .map(|v| float_codec::decode(v).ok_or_else(|| self.invalid(field, "expected a number")))
            .transpose()
    }

    fn optional_floats(&self, field: &'static str) -> Result<Option<Vec<f64>>, DecodeError> {
        let Some(value) = self.optional(field) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| self.invalid(field, "expected an array"))?;
        items
            .iter()
            .map(|v| {
                float_codec::decode(v)
                    .ok_or_else(|| self.invalid(field, format!("element {v} is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn directions(&self, field: &'static str) -> Result<Vec<StudyDirection>, DecodeError> {
        let items = self
            .required(field)?
            .as_array()
            .ok_or_else(|| self.invalid(field, "expected an array"))?;
        items
            .iter()
            .map(|v| {
                let direction = match v {
                    Value::Number(n) => n.as_u64().and_then(StudyDirection::from_code),
                    Value::String(s) => StudyDirection::from_name(s),
                    _ => None,
                };
                direction.ok_or_else(|| self.invalid(field, format!("unknown direction {v}")))
            })
            .collect()
    }

    fn optional_state(&self, field: &'static str) -> Result<Option<TrialState>, DecodeError> {
        let Some(value) = self.optional(field) else {
            return Ok(None);
        };
        let state = match value {
            Value::Number(n) => n.as_u64().and_then(TrialState::from_code),
            Value::String(s) => TrialState::from_name(s),
            _ => None,
        };
        state
            .map(Some)
            .ok_or_else(|| self.invalid(field, format!("unknown state {value}")))
    }

    fn optional_datetime(&self, field: &'static str) -> Result<Option<NaiveDateTime>, DecodeError> {
        let Some(value) = self.optional(field) else {
            return Ok(None);
        };
        let text = value
            .as_str()
            .ok_or_else(|| self.invalid(field, "expected a datetime string"))?;
        DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(Some)
            .ok_or_else(|| self.invalid(field, format!("unparseable datetime `{text}`")))
    }

    fn optional_object(
        &self,
        field: &'static str,
    ) -> Result<Option<&'a Map<String, Value>>, DecodeError> {
        self.optional(field)
            .map(|v| v.as_object().ok_or_else(|| self.invalid(field, "expected an object")))
            .transpose()
    }

    fn attrs(&self, field: &'static str) -> Result<BTreeMap<String, Value>, DecodeError> {
        Ok(self
            .optional_object(field)?
            .map(|attrs| attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn single_attr(&self, field: &'static str) -> Result<(String, Value), DecodeError> {
        let attrs = self
            .required(field)?
            .as_object()
            .ok_or_else(|| self.invalid(field, "expected an object"))?;
        let mut entries = attrs.iter();
        match (entries.next(), entries.next()) {
            (Some((key, value)), None) => Ok((key.clone(), value.clone())),
            _ => Err(self.invalid(
                field,
                format!("expected exactly one attribute, got {}", attrs.len()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> Result<Operation, DecodeError> {
        decode_record(text, &DecodeOptions::default()).map(|r| r.operation)
    }

    #[test]
    fn test_op_code_round_trip() {
        for code in 0..=10 {
            let op = OpCode::from_code(code).unwrap();
            assert_eq!(op.code(), code);
        }
        assert!(OpCode::from_code(11).is_none());
    }

    #[test]
    fn test_decode_create_study() {
        let op = decode(r#"{"op_code": 0, "worker_id": "w", "study_name": "s", "directions": [1, 2]}"#)
            .unwrap();
        assert_eq!(
            op,
            Operation::CreateStudy {
                name: "s".to_string(),
                directions: vec![StudyDirection::Minimize, StudyDirection::Maximize],
            }
        );
    }

    #[test]
    fn test_decode_keeps_worker_id() {
        let record = decode_record(
            r#"{"op_code": 1, "worker_id": "host-7", "study_id": 0}"#,
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(record.worker_id.as_deref(), Some("host-7"));
        assert_eq!(record.operation.op_code(), OpCode::DeleteStudy);
    }

    #[test]
    fn test_syntax_error_message_is_parser_diagnostic() {
        let text = r#"{"op_code": 0, "study_name": "#;
        let expected = serde_json::from_str::<Value>(text).unwrap_err().to_string();
        assert_eq!(decode(text), Err(DecodeError::Syntax(expected)));
    }

    #[test]
    fn test_lenient_retry_keeps_strict_diagnostic_on_failure() {
        let text = r#"{"op_code": 8, "intermediate_value": NaN,"#;
        let expected = serde_json::from_str::<Value>(text).unwrap_err().to_string();
        assert_eq!(decode(text), Err(DecodeError::Syntax(expected)));
    }

    #[test]
    fn test_bare_non_finite_tokens() {
        let text = r#"{"op_code": 7, "trial_id": 0, "state": 1, "values": [Infinity, -Infinity, NaN]}"#;
        let Operation::SetTrialStateValues { values, .. } = decode(text).unwrap() else {
            panic!("wrong operation");
        };
        let values = values.unwrap();
        assert_eq!(values[0], f64::INFINITY);
        assert_eq!(values[1], f64::NEG_INFINITY);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_strict_mode_rejects_bare_tokens() {
        let text = r#"{"op_code": 8, "trial_id": 0, "step": 1, "intermediate_value": NaN}"#;
        let strict = DecodeOptions {
            lenient_non_finite: false,
        };
        assert!(matches!(
            decode_record(text, &strict),
            Err(DecodeError::Syntax(_))
        ));
    }

    #[test]
    fn test_sentinel_strings() {
        let text = r#"{"op_code": 8, "trial_id": 3, "step": 5, "intermediate_value": "-Infinity"}"#;
        assert_eq!(
            decode(text).unwrap(),
            Operation::SetTrialIntermediateValue {
                trial_id: 3,
                step: 5,
                value: f64::NEG_INFINITY
            }
        );
    }

    #[test]
    fn test_unknown_op_code() {
        assert_eq!(
            decode(r#"{"op_code": 42}"#),
            Err(DecodeError::UnknownOpCode("42".to_string()))
        );
        assert_eq!(
            decode(r#"{"op_code": "create"}"#),
            Err(DecodeError::UnknownOpCode("\"create\"".to_string()))
        );
        assert_eq!(decode(r#"{"worker_id": "w"}"#), Err(DecodeError::MissingOpCode));
        assert_eq!(decode("[1, 2]"), Err(DecodeError::NotAnObject));
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        assert_eq!(
            decode(r#"{"op_code": 1}"#),
            Err(DecodeError::MissingField {
                op: "DeleteStudy",
                field: "study_id"
            })
        );
        assert!(matches!(
            decode(r#"{"op_code": 1, "study_id": -1}"#),
            Err(DecodeError::InvalidField { field: "study_id", .. })
        ));
        assert!(matches!(
            decode(r#"{"op_code": 7, "trial_id": 0, "state": 9, "values": null}"#),
            Err(DecodeError::InvalidField { field: "state", .. })
        ));
    }

    #[test]
    fn test_decode_set_trial_param_categorical() {
        let text = r#"{"op_code": 6, "trial_id": 2, "param_name": "opt", "param_value_internal": 1.0,
            "distribution": "{\"name\": \"CategoricalDistribution\", \"attributes\": {\"choices\": [\"adam\", \"sgd\"]}}"}"#
            .replace('\n', "");
        let Operation::SetTrialParam { trial_id, param } = decode(&text).unwrap() else {
            panic!("wrong operation");
        };
        assert_eq!(trial_id, 2);
        assert_eq!(param.name(), "opt");
        assert_eq!(param.value(), &ParamValue::Categorical(Value::from("sgd")));
    }

    #[test]
    fn test_decode_set_trial_param_bad_index() {
        let text = r#"{"op_code": 6, "trial_id": 0, "param_name": "c", "param_value_internal": 4,
            "distribution": {"name": "CategoricalDistribution", "attributes": {"choices": [1, 2]}}}"#
            .replace('\n', "");
        assert!(matches!(
            decode(&text),
            Err(DecodeError::Distribution { ref param, .. }) if param == "c"
        ));
    }

    #[test]
    fn test_decode_attr_requires_single_entry() {
        assert!(matches!(
            decode(r#"{"op_code": 2, "study_id": 0, "user_attr": {}}"#),
            Err(DecodeError::InvalidField { field: "user_attr", .. })
        ));
        assert_eq!(
            decode(r#"{"op_code": 9, "trial_id": 1, "user_attr": {"k": [1, "x"]}}"#).unwrap(),
            Operation::SetTrialUserAttr {
                trial_id: 1,
                key: "k".to_string(),
                value: serde_json::json!([1, "x"])
            }
        );
    }

    #[test]
    fn test_decode_create_trial_with_payload() {
        let text = r#"{"op_code": 5, "study_id": 0, "state": 1,
            "datetime_start": "2024-03-01T10:00:00.000001", "datetime_complete": "2024-03-01T10:00:05",
            "params": {"x": 0.5, "n": 3.0},
            "distributions": {
                "x": "{\"name\": \"FloatDistribution\", \"attributes\": {\"low\": 0.0, \"high\": 1.0, \"step\": null, \"log\": false}}",
                "n": "{\"name\": \"IntDistribution\", \"attributes\": {\"low\": 1, \"high\": 5, \"step\": 1, \"log\": false}}"
            },
            "user_attrs": {"tag": "seed"}, "system_attrs": {},
            "value": 0.75, "intermediate_values": {"3": 0.9, "1": "Infinity"}}"#
            .replace('\n', "");
        let Operation::CreateTrial {
            study_id,
            initial_state,
            payload,
        } = decode(&text).unwrap()
        else {
            panic!("wrong operation");
        };
        assert_eq!(study_id, 0);
        assert_eq!(initial_state, TrialState::Complete);
        assert_eq!(payload.values, Some(vec![0.75]));
        assert_eq!(payload.params.len(), 2);
        assert!(payload
            .params
            .iter()
            .any(|p| p.name() == "n" && *p.value() == ParamValue::Int(3)));
        assert_eq!(payload.intermediate_values.get(&1), Some(&f64::INFINITY));
        assert!(payload.datetime_start.is_some());
        assert!(payload.datetime_complete.is_some());
    }

    #[test]
    fn test_decode_create_trial_minimal() {
        let Operation::CreateTrial {
            initial_state,
            payload,
            ..
        } = decode(r#"{"op_code": 5, "study_id": 4, "datetime_start": null}"#).unwrap()
        else {
            panic!("wrong operation");
        };
        assert_eq!(initial_state, TrialState::Running);
        assert_eq!(*payload, TrialPayload::default());
    }

    #[test]
    fn test_decode_create_trial_param_without_distribution() {
        assert!(matches!(
            decode(r#"{"op_code": 5, "study_id": 0, "params": {"x": 0.1}}"#),
            Err(DecodeError::InvalidField { field: "distributions", .. })
        ));
    }
}
