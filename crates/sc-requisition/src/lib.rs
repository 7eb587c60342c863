// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Requisition and ParameterSpec: the parameter contract for one supplier
//! call shape.
//!
//! A [`Requisition`] pairs a supplier endpoint with its declared
//! [`ParameterSpec`]s. [`Requisition::validate`] checks submitted input
//! against those specs; [`Requisition::build_params`] projects validated
//! input into the flat parameter map a handler expects.

use sc_core::{RequisitionId, SupplierId};
use sc_error::{SupplyError, SupplyErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A provider ecosystem (e.g. `"virustotal"`). Configured out-of-band and
/// only ever referenced, never created, by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    /// Unique identifier.
    pub id: SupplierId,
    /// Human-readable name, e.g. `"virustotal"`. Also the `supplier` half of
    /// a `HandlerIdentity`.
    pub name: String,
    /// Whether this supplier is currently available for use.
    pub enabled: bool,
}

impl Supplier {
    /// Construct a new, enabled supplier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SupplierId::new(),
            name: name.into(),
            enabled: true,
        }
    }
}

/// The declared type of a parameter's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// An arbitrary string.
    String,
    /// A lossless decimal integer.
    Int,
    /// An integer or decimal number.
    Float,
    /// A boolean literal (`true`/`false`, case-insensitive).
    Bool,
}

impl ParamType {
    /// Returns `true` if `value` conforms to this type.
    ///
    /// JSON values of the matching native type are accepted directly;
    /// strings are accepted if their contents parse as the declared type,
    /// mirroring form-submitted input where every value arrives as text.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Int => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.parse::<i64>().is_ok(),
                _ => false,
            },
            ParamType::Float => match value {
                Value::Number(_) => true,
                Value::String(s) => s.parse::<f64>().is_ok(),
                _ => false,
            },
            ParamType::Bool => match value {
                Value::Bool(_) => true,
                Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "false"),
                _ => false,
            },
        }
    }
}

/// The declaration of a single parameter a Requisition accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Name the parameter is keyed by in both input and built params.
    pub name: String,
    /// Declared type.
    pub param_type: ParamType,
    /// Default value used by [`Requisition::build_params`] when absent from input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed `(value, label)` choices, if the parameter is constrained to a set.
    #[serde(default)]
    pub choices: Vec<(String, String)>,
    /// Whether a non-empty value must be present in submitted input.
    pub required: bool,
}

impl ParameterSpec {
    /// Construct a required parameter with no default or choices.
    #[must_use]
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            choices: Vec::new(),
            required: true,
        }
    }

    /// Construct an optional parameter with the given default.
    #[must_use]
    pub fn optional(name: impl Into<String>, param_type: ParamType, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            param_type,
            default,
            choices: Vec::new(),
            required: false,
        }
    }

    /// Returns `true` if `value` is considered present (non-empty-string).
    fn is_present(value: Option<&Value>) -> bool {
        match value {
            None => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Null) => false,
            Some(_) => true,
        }
    }

    /// Validate a single submitted value against this spec.
    ///
    /// # Errors
    ///
    /// Returns [`SupplyErrorCode::ValidationMissingField`] if required and
    /// absent/empty, or [`SupplyErrorCode::ValidationTypeMismatch`] if
    /// present but not of the declared type. Optional parameters that are
    /// absent or empty pass validation unconditionally.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), SupplyError> {
        if !Self::is_present(value) {
            return if self.required {
                Err(SupplyError::new(
                    SupplyErrorCode::ValidationMissingField,
                    format!("missing required parameter '{}'", self.name),
                )
                .with_context("parameter", self.name.clone()))
            } else {
                Ok(())
            };
        }

        let value = value.expect("checked present above");
        if self.param_type.accepts(value) {
            Ok(())
        } else {
            Err(SupplyError::new(
                SupplyErrorCode::ValidationTypeMismatch,
                format!("parameter '{}' does not parse as {:?}", self.name, self.param_type),
            )
            .with_context("parameter", self.name.clone()))
        }
    }
}

/// A supplier endpoint: the parameter contract for one call shape.
///
/// `(supplier_ref, api_class)` is unique; immutable once referenced by a
/// SupplyLink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requisition {
    /// Unique identifier.
    pub id: RequisitionId,
    /// The supplier this requisition calls.
    pub supplier_ref: SupplierId,
    /// API class / endpoint family name, e.g. `"domain_report"`.
    pub api_class: String,
    /// The URL for the REST API request.
    pub url: String,
    /// Whether calls through this requisition require a rate-limited Visa.
    pub visa_required: bool,
    /// Declared parameters.
    pub parameters: Vec<ParameterSpec>,
}

impl Requisition {
    /// Construct a new requisition with the given parameters.
    #[must_use]
    pub fn new(
        supplier_ref: SupplierId,
        api_class: impl Into<String>,
        url: impl Into<String>,
        visa_required: bool,
        parameters: Vec<ParameterSpec>,
    ) -> Self {
        Self {
            id: RequisitionId::new(),
            supplier_ref,
            api_class: api_class.into(),
            url: url.into(),
            visa_required,
            parameters,
        }
    }

    /// Validate submitted input against every declared parameter.
    ///
    /// Accumulates every failing parameter rather than stopping at the
    /// first, so a caller can report every problem at once.
    ///
    /// # Errors
    ///
    /// Returns one [`SupplyError`] per parameter that fails validation.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<(), Vec<SupplyError>> {
        let errors: Vec<SupplyError> = self
            .parameters
            .iter()
            .filter_map(|p| p.validate(input.get(&p.name)).err())
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Project submitted input into a fresh parameter map, one entry per
    /// declared parameter: the input value if present, else the spec's
    /// default. Parameters with no input value and no default are omitted.
    #[must_use]
    pub fn build_params(&self, input: &Map<String, Value>) -> Map<String, Value> {
        let mut built = Map::new();
        for spec in &self.parameters {
            match input.get(&spec.name) {
                Some(v) if ParameterSpec::is_present(Some(v)) => {
                    built.insert(spec.name.clone(), v.clone());
                }
                _ => {
                    if let Some(default) = &spec.default {
                        built.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }
        built
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn domain_report() -> Requisition {
        Requisition::new(
            SupplierId::new(),
            "domain_report",
            "https://www.virustotal.com/vtapi/v2/domain/report",
            false,
            vec![ParameterSpec::required("domain", ParamType::String)],
        )
    }

    #[test]
    fn valid_input_passes() {
        let req = domain_report();
        let mut input = Map::new();
        input.insert("domain".into(), Value::String("example.com".into()));
        assert!(req.validate(&input).is_ok());
    }

    #[test]
    fn missing_required_field_fails() {
        let req = domain_report();
        let err = req.validate(&Map::new()).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].code, SupplyErrorCode::ValidationMissingField);
    }

    #[test]
    fn empty_string_is_treated_as_absent() {
        let req = domain_report();
        let mut input = Map::new();
        input.insert("domain".into(), Value::String(String::new()));
        let err = req.validate(&input).unwrap_err();
        assert_eq!(err[0].code, SupplyErrorCode::ValidationMissingField);
    }

    #[test]
    fn optional_param_may_be_absent() {
        let req = Requisition::new(
            SupplierId::new(),
            "file_report",
            "https://example/file/report",
            false,
            vec![ParameterSpec::optional("allinfo", ParamType::Bool, None)],
        );
        assert!(req.validate(&Map::new()).is_ok());
    }

    #[test]
    fn accumulates_multiple_errors() {
        let req = Requisition::new(
            SupplierId::new(),
            "multi",
            "https://example",
            false,
            vec![
                ParameterSpec::required("a", ParamType::String),
                ParameterSpec::required("b", ParamType::Int),
            ],
        );
        let mut input = Map::new();
        input.insert("b".into(), Value::String("not-a-number".into()));
        let errors = req.validate(&input).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn int_type_rejects_non_integer_string() {
        let spec = ParameterSpec::required("count", ParamType::Int);
        assert!(spec.validate(Some(&Value::String("3.5".into()))).is_err());
        assert!(spec.validate(Some(&Value::String("3".into()))).is_ok());
    }

    #[test]
    fn float_type_accepts_int_and_decimal() {
        let spec = ParameterSpec::required("ratio", ParamType::Float);
        assert!(spec.validate(Some(&Value::String("3".into()))).is_ok());
        assert!(spec.validate(Some(&Value::String("3.5".into()))).is_ok());
        assert!(spec.validate(Some(&Value::Number(serde_json::Number::from(3)))).is_ok());
    }

    #[test]
    fn bool_type_is_case_insensitive() {
        let spec = ParameterSpec::required("allinfo", ParamType::Bool);
        assert!(spec.validate(Some(&Value::String("TRUE".into()))).is_ok());
        assert!(spec.validate(Some(&Value::String("False".into()))).is_ok());
        assert!(spec.validate(Some(&Value::String("maybe".into()))).is_err());
    }

    #[test]
    fn build_params_uses_default_when_absent() {
        let req = Requisition::new(
            SupplierId::new(),
            "url_report",
            "https://example",
            false,
            vec![ParameterSpec::optional(
                "scan",
                ParamType::Int,
                Some(Value::from(1)),
            )],
        );
        let built = req.build_params(&Map::new());
        assert_eq!(built.get("scan"), Some(&Value::from(1)));
    }

    #[test]
    fn build_params_prefers_input_over_default() {
        let req = Requisition::new(
            SupplierId::new(),
            "url_report",
            "https://example",
            false,
            vec![ParameterSpec::optional(
                "scan",
                ParamType::Int,
                Some(Value::from(1)),
            )],
        );
        let mut input = Map::new();
        input.insert("scan".into(), Value::from(0));
        let built = req.build_params(&input);
        assert_eq!(built.get("scan"), Some(&Value::from(0)));
    }

    #[test]
    fn new_supplier_is_enabled_by_default() {
        let s = Supplier::new("virustotal");
        assert!(s.enabled);
        assert_eq!(s.name, "virustotal");
    }

    #[test]
    fn build_params_omits_absent_without_default() {
        let req = domain_report();
        let built = req.build_params(&Map::new());
        assert!(built.get("domain").is_none());
    }

    proptest! {
        #[test]
        fn any_non_empty_integer_string_validates_as_int(n in any::<i64>()) {
            let spec = ParameterSpec::required("n", ParamType::Int);
            prop_assert!(spec.validate(Some(&Value::String(n.to_string()))).is_ok());
        }

        #[test]
        fn non_numeric_strings_never_validate_as_int(s in "[a-zA-Z]{1,10}") {
            let spec = ParameterSpec::required("n", ParamType::Int);
            prop_assert!(spec.validate(Some(&Value::String(s))).is_err());
        }
    }
}
