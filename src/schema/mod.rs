//! Declarative field specifications and candidate validation.
//!
//! Extraction output stays an [`ExtractionCandidate`] until it passes
//! [`validate`]. Typed requests are built only from [`ValidatedFields`],
//! which nothing outside this module can construct, so a request value is
//! proof that every field constraint held.

mod requests;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

pub use self::requests::{
    CommandRequest, OPEN_LOOP_TRADING_FIELDS, OpenLoopTradingRequest, VOLATILITY_QUERY_FIELDS,
    VOLATILITY_SYMBOLS, VolatilityQueryRequest, VolatilitySymbol,
};

/// JSON type expected for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Boolean,
    String,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
        }
    }

    /// Placeholder used in the output-format block of a prompt.
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Number => "<number>",
            Self::Boolean => "<boolean>",
            Self::String => "\"<string>\"",
        }
    }
}

/// Range or enumeration constraint on a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Strictly greater than the bound.
    GreaterThan(Decimal),
    /// Inclusive on both ends.
    Between { min: Decimal, max: Decimal },
    /// Exact, case-sensitive membership.
    OneOf(Cow<'static, [&'static str]>),
}

/// Constraint set for one field of a command's request shape.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Human label used in violation messages ("Stop loss").
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub constraint: Option<Constraint>,
    /// Unit suffix appended to bounds in messages ("%").
    pub unit: Option<&'static str>,
    pub description: &'static str,
}

impl FieldSpec {
    /// Prose description of the field for prompt templates.
    pub fn describe(&self) -> String {
        let constraint = match &self.constraint {
            Some(Constraint::GreaterThan(bound)) => {
                format!("A number greater than {}.", bound.normalize())
            }
            Some(Constraint::Between { min, max }) => {
                let unit_note = match self.unit {
                    Some("%") => " (percentage)",
                    _ => "",
                };
                format!(
                    "A number between {} and {}{}.",
                    min.normalize(),
                    max.normalize(),
                    unit_note
                )
            }
            // Allowed values are listed separately by the prompt renderer.
            Some(Constraint::OneOf(_)) | None => String::new(),
        };

        [self.description, constraint.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn missing_message(&self) -> String {
        match self.kind {
            FieldKind::Boolean => format!("{} must be true or false", self.label),
            _ => format!("{} is required", self.label),
        }
    }

    fn wrong_type_message(&self) -> String {
        match self.kind {
            FieldKind::Number => format!("{} must be a number", self.label),
            FieldKind::Boolean => format!("{} must be true or false", self.label),
            FieldKind::String => format!("{} must be a string", self.label),
        }
    }

    fn unit(&self) -> &'static str {
        self.unit.unwrap_or("")
    }
}

/// Untyped structured object produced by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionCandidate(Value);

impl ExtractionCandidate {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for ExtractionCandidate {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Reason a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NotAnObject,
    Missing,
    WrongType,
    OutOfRange,
    NotAllowed,
}

/// One violated field with its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl FieldViolation {
    fn new(spec: &FieldSpec, kind: ViolationKind, message: String) -> Self {
        Self {
            field: spec.name.to_string(),
            kind,
            message,
        }
    }
}

/// Non-empty set of violations collected across every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Typed value of a field that satisfied its spec.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(Decimal),
    Boolean(bool),
    Text(String),
}

/// Fields that passed validation, keyed by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFields {
    values: BTreeMap<&'static str, FieldValue>,
}

impl ValidatedFields {
    pub fn number(&self, name: &str) -> Option<Decimal> {
        match self.values.get(name)? {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A request shape with a fixed field table.
pub trait CommandSchema: Sized {
    const FIELDS: &'static [FieldSpec];

    /// Build the typed request. Returns `None` only when `FIELDS` does not
    /// cover a field the request reads.
    fn from_validated(fields: &ValidatedFields) -> Option<Self>;
}

/// Check every spec against the candidate, collecting all violations.
///
/// Unknown fields in the candidate are ignored.
pub fn validate(
    candidate: &ExtractionCandidate,
    specs: &[FieldSpec],
) -> Result<ValidatedFields, ValidationErrors> {
    let Some(object) = candidate.as_value().as_object() else {
        return Err(ValidationErrors {
            violations: vec![FieldViolation {
                field: "$".to_string(),
                kind: ViolationKind::NotAnObject,
                message: "Candidate must be a JSON object".to_string(),
            }],
        });
    };

    let mut values = BTreeMap::new();
    let mut violations = Vec::new();

    for spec in specs {
        match object.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    violations.push(FieldViolation::new(
                        spec,
                        ViolationKind::Missing,
                        spec.missing_message(),
                    ));
                }
            }
            Some(raw) => match check_field(spec, raw) {
                Ok(value) => {
                    values.insert(spec.name, value);
                }
                Err(mut field_violations) => violations.append(&mut field_violations),
            },
        }
    }

    if violations.is_empty() {
        Ok(ValidatedFields { values })
    } else {
        Err(ValidationErrors { violations })
    }
}

/// Validate and promote a candidate into a typed request.
pub fn validate_as<R: CommandSchema>(
    candidate: &ExtractionCandidate,
) -> Result<R, ValidationErrors> {
    let fields = validate(candidate, R::FIELDS)?;
    R::from_validated(&fields).ok_or_else(|| ValidationErrors {
        violations: vec![FieldViolation {
            field: "$".to_string(),
            kind: ViolationKind::Missing,
            message: "Field table does not cover the request shape".to_string(),
        }],
    })
}

fn check_field(spec: &FieldSpec, raw: &Value) -> Result<FieldValue, Vec<FieldViolation>> {
    let wrong_type =
        || vec![FieldViolation::new(spec, ViolationKind::WrongType, spec.wrong_type_message())];

    match spec.kind {
        FieldKind::Number => {
            let json_number = raw.as_number().ok_or_else(wrong_type)?;
            let number = decimal_from_json(json_number)
                .ok_or_else(|| vec![unrepresentable(spec, json_number)])?;
            check_number(spec, number)?;
            Ok(FieldValue::Number(number))
        }
        FieldKind::Boolean => raw.as_bool().map(FieldValue::Boolean).ok_or_else(wrong_type),
        FieldKind::String => {
            let text = raw.as_str().ok_or_else(wrong_type)?;
            if let Some(Constraint::OneOf(allowed)) = &spec.constraint
                && !allowed.contains(&text)
            {
                return Err(vec![FieldViolation::new(
                    spec,
                    ViolationKind::NotAllowed,
                    format!("{} must be one of: {}", spec.label, allowed.join(", ")),
                )]);
            }
            Ok(FieldValue::Text(text.to_string()))
        }
    }
}

fn check_number(spec: &FieldSpec, number: Decimal) -> Result<(), Vec<FieldViolation>> {
    let mut violations = Vec::new();
    match &spec.constraint {
        Some(Constraint::GreaterThan(bound)) if number <= *bound => {
            violations.push(FieldViolation::new(
                spec,
                ViolationKind::OutOfRange,
                format!(
                    "{} must be greater than {}{}",
                    spec.label,
                    bound.normalize(),
                    spec.unit()
                ),
            ));
        }
        Some(Constraint::Between { min, max }) => {
            if number < *min {
                violations.push(FieldViolation::new(
                    spec,
                    ViolationKind::OutOfRange,
                    format!(
                        "{} must be at least {}{}",
                        spec.label,
                        min.normalize(),
                        spec.unit()
                    ),
                ));
            }
            if number > *max {
                violations.push(FieldViolation::new(
                    spec,
                    ViolationKind::OutOfRange,
                    format!(
                        "{} cannot exceed {}{}",
                        spec.label,
                        max.normalize(),
                        spec.unit()
                    ),
                ));
            }
        }
        _ => {}
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Violation for a JSON number outside what [`Decimal`] holds exactly.
fn unrepresentable(spec: &FieldSpec, number: &serde_json::Number) -> FieldViolation {
    let message = match number.as_f64() {
        Some(value) if value.abs() >= 1.0 => format!("{} is too large", spec.label),
        _ => format!(
            "{} has more than {} decimal places",
            spec.label,
            Decimal::MAX_SCALE
        ),
    };
    FieldViolation::new(spec, ViolationKind::OutOfRange, message)
}

fn decimal_from_json(number: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = number.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = number.as_u64() {
        return Some(Decimal::from(u));
    }
    let raw = number.to_string();
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// JSON Schema object for the extraction request.
pub fn json_schema(specs: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for spec in specs {
        let mut property = Map::new();
        property.insert("type".to_string(), Value::from(spec.kind.as_str()));
        let description = spec.describe();
        if !description.is_empty() {
            property.insert("description".to_string(), Value::from(description));
        }
        match &spec.constraint {
            Some(Constraint::GreaterThan(bound)) => {
                property.insert("exclusiveMinimum".to_string(), decimal_value(bound));
            }
            Some(Constraint::Between { min, max }) => {
                property.insert("minimum".to_string(), decimal_value(min));
                property.insert("maximum".to_string(), decimal_value(max));
            }
            Some(Constraint::OneOf(values)) => {
                property.insert(
                    "enum".to_string(),
                    Value::Array(values.iter().map(|v| Value::from(*v)).collect()),
                );
            }
            None => {}
        }
        properties.insert(spec.name.to_string(), Value::Object(property));
        if spec.required {
            required.push(Value::from(spec.name));
        }
    }

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn decimal_value(value: &Decimal) -> Value {
    serde_json::from_str(&value.normalize().to_string()).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trading(value: Value) -> Result<OpenLoopTradingRequest, ValidationErrors> {
        validate_as::<OpenLoopTradingRequest>(&ExtractionCandidate::new(value))
    }

    fn volatility(value: Value) -> Result<VolatilityQueryRequest, ValidationErrors> {
        validate_as::<VolatilityQueryRequest>(&ExtractionCandidate::new(value))
    }

    #[test]
    fn stop_loss_bounds_are_inclusive() {
        assert!(trading(json!({"amount": 10, "stopLoss": 0, "risk": false})).is_ok());
        assert!(trading(json!({"amount": 10, "stopLoss": 100, "risk": false})).is_ok());

        let below = trading(json!({"amount": 10, "stopLoss": -0.01, "risk": false})).unwrap_err();
        assert_eq!(below.violations()[0].message, "Stop loss must be at least 0%");

        let above = trading(json!({"amount": 10, "stopLoss": 100.01, "risk": false})).unwrap_err();
        assert_eq!(above.violations()[0].message, "Stop loss cannot exceed 100%");
    }

    #[test]
    fn amount_must_be_strictly_positive() {
        let zero = trading(json!({"amount": 0, "stopLoss": 10, "risk": true})).unwrap_err();
        assert_eq!(zero.fields(), vec!["amount"]);
        assert_eq!(zero.violations()[0].message, "Amount must be greater than 0");

        let tiny = trading(json!({"amount": 0.0001, "stopLoss": 10, "risk": true})).unwrap();
        assert_eq!(tiny.amount().to_string(), "0.0001");
    }

    #[test]
    fn collects_every_violation() {
        let errors = trading(json!({"amount": -5, "stopLoss": "14", "extra": 1})).unwrap_err();

        assert_eq!(errors.fields(), vec!["amount", "stopLoss", "risk"]);
        assert_eq!(
            errors.to_string(),
            "Amount must be greater than 0, Stop loss must be a number, Risk must be true or false"
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let request = trading(json!({
            "amount": 1000,
            "stopLoss": 14,
            "risk": true,
            "leverage": 3
        }))
        .unwrap();

        assert_eq!(request.amount().to_string(), "1000");
        assert!(request.risk());
    }

    #[test]
    fn symbol_enumeration_is_closed() {
        assert_eq!(
            volatility(json!({"symbol": "ETH"})).unwrap().symbol(),
            VolatilitySymbol::Eth
        );
        assert_eq!(
            volatility(json!({"symbol": "BTC"})).unwrap().symbol(),
            VolatilitySymbol::Btc
        );

        for rejected in ["SOL", "eth", "", " BTC"] {
            let errors = volatility(json!({ "symbol": rejected })).unwrap_err();
            assert_eq!(errors.violations()[0].kind, ViolationKind::NotAllowed);
        }
    }

    #[test]
    fn non_object_candidates_are_rejected() {
        for value in [json!(null), json!([1, 2]), json!("ETH"), json!(42)] {
            let errors = volatility(value).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors.violations()[0].kind, ViolationKind::NotAnObject);
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let errors = volatility(json!({"symbol": null})).unwrap_err();
        assert_eq!(errors.violations()[0].kind, ViolationKind::Missing);
        assert_eq!(errors.violations()[0].message, "Symbol is required");
    }

    #[test]
    fn unrepresentable_numbers_are_out_of_range() {
        let huge = trading(json!({"amount": 1e30, "stopLoss": 10, "risk": true})).unwrap_err();
        assert_eq!(huge.fields(), vec!["amount"]);
        assert_eq!(huge.violations()[0].kind, ViolationKind::OutOfRange);
        assert_eq!(huge.violations()[0].message, "Amount is too large");

        let tiny = trading(json!({"amount": 1e-30, "stopLoss": 10, "risk": true})).unwrap_err();
        assert_eq!(tiny.violations()[0].kind, ViolationKind::OutOfRange);
        assert_eq!(
            tiny.violations()[0].message,
            "Amount has more than 28 decimal places"
        );
    }

    #[test]
    fn scientific_notation_numbers_parse() {
        let request = trading(json!({"amount": 1.5e3, "stopLoss": 1e1, "risk": false})).unwrap();
        assert_eq!(request.amount().normalize().to_string(), "1500");
        assert_eq!(request.stop_loss().normalize().to_string(), "10");
    }

    #[test]
    fn describes_fields_from_constraints() {
        let prose: Vec<String> = OPEN_LOOP_TRADING_FIELDS
            .iter()
            .map(FieldSpec::describe)
            .collect();

        assert_eq!(
            prose,
            vec![
                "A number greater than 0.",
                "A number between 0 and 100 (percentage).",
                "Whether risk mode is enabled.",
            ]
        );
    }

    #[test]
    fn json_schema_mirrors_field_table() {
        let schema = json_schema(OPEN_LOOP_TRADING_FIELDS);

        assert_eq!(schema["properties"]["amount"]["exclusiveMinimum"], json!(0));
        assert_eq!(schema["properties"]["stopLoss"]["maximum"], json!(100));
        assert_eq!(schema["properties"]["risk"]["type"], "boolean");
        assert_eq!(schema["required"], json!(["amount", "stopLoss", "risk"]));

        let symbols = json_schema(VOLATILITY_QUERY_FIELDS);
        assert_eq!(symbols["properties"]["symbol"]["enum"], json!(["ETH", "BTC"]));
    }
}
