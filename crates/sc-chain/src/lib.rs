// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! SupplyChain and SupplyLink: ordered sequencing of Requisition calls.
//!
//! This crate covers the pure, synchronous part of chain sequencing —
//! field-coupling resolution, input validation, and parameter renaming. The
//! actual suspension points (countdown sleep, handler invocation, Manifest
//! persistence) are owned by `sc-executor`, which calls into the functions
//! here between them.

use sc_core::{SupplyChainId, SupplyLinkId, SupplierId};
use sc_error::{SupplyError, SupplyErrorCode};
use sc_requisition::{ParamType, Requisition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Units for [`SupplyLink::wait_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds.
    S,
    /// Minutes.
    M,
    /// Hours.
    H,
    /// Days.
    D,
}

impl TimeUnit {
    /// Multiplier to convert a count of this unit into seconds.
    #[must_use]
    pub fn seconds_per_unit(&self) -> u64 {
        match self {
            TimeUnit::S => 1,
            TimeUnit::M => 60,
            TimeUnit::H => 3_600,
            TimeUnit::D => 86_400,
        }
    }
}

/// Maps one input field to the Requisition parameter it supplies a value for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCoupling {
    /// The name of the input field.
    pub field_name: String,
    /// The name of the target `ParameterSpec` on the link's Requisition.
    pub parameter_name: String,
}

impl FieldCoupling {
    /// Construct a new coupling.
    #[must_use]
    pub fn new(field_name: impl Into<String>, parameter_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            parameter_name: parameter_name.into(),
        }
    }
}

/// A single API call within a SupplyChain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyLink {
    /// Unique identifier.
    pub id: SupplyLinkId,
    /// The chain this link belongs to.
    pub chain_id: SupplyChainId,
    /// The Requisition this link calls.
    pub requisition: Requisition,
    /// Position within the chain; links run in ascending order.
    pub position: u32,
    /// Delay to wait before processing this link's request.
    pub wait_time: u64,
    /// Units for `wait_time`.
    pub time_unit: TimeUnit,
    /// Field-to-parameter mappings for this link's input.
    pub couplings: Vec<FieldCoupling>,
    #[serde(skip, default)]
    input_fields_cache: OnceLock<BTreeMap<String, ParamType>>,
    #[serde(skip, default)]
    coupling_cache: OnceLock<BTreeMap<String, String>>,
}

impl SupplyLink {
    /// Construct a new link.
    #[must_use]
    pub fn new(
        chain_id: SupplyChainId,
        requisition: Requisition,
        position: u32,
        wait_time: u64,
        time_unit: TimeUnit,
        couplings: Vec<FieldCoupling>,
    ) -> Self {
        Self {
            id: SupplyLinkId::new(),
            chain_id,
            requisition,
            position,
            wait_time,
            time_unit,
            couplings,
            input_fields_cache: OnceLock::new(),
            coupling_cache: OnceLock::new(),
        }
    }

    /// The supplier this link's Requisition targets.
    #[must_use]
    pub fn platform(&self) -> SupplierId {
        self.requisition.supplier_ref
    }

    /// Field names and their declared parameter type, derived from couplings.
    /// Computed once and cached for the lifetime of this link.
    #[must_use]
    pub fn input_fields(&self) -> BTreeMap<String, ParamType> {
        self.input_fields_cache
            .get_or_init(|| {
                let mut fields = BTreeMap::new();
                for c in &self.couplings {
                    if let Some(param) = self.requisition.parameters.iter().find(|p| p.name == c.parameter_name) {
                        fields.insert(c.field_name.clone(), param.param_type);
                    }
                }
                fields
            })
            .clone()
    }

    /// The field-name-to-parameter-name rename map. Computed once and cached
    /// for the lifetime of this link.
    #[must_use]
    pub fn coupling(&self) -> BTreeMap<String, String> {
        self.coupling_cache
            .get_or_init(|| {
                self.couplings
                    .iter()
                    .map(|c| (c.field_name.clone(), c.parameter_name.clone()))
                    .collect()
            })
            .clone()
    }

    /// Required parameters of this link's Requisition that lack a FieldCoupling.
    ///
    /// A non-empty result means this link is structurally invalid and its
    /// chain cannot run.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        let coupled: Vec<&str> = self.couplings.iter().map(|c| c.parameter_name.as_str()).collect();
        self.requisition
            .parameters
            .iter()
            .filter(|p| p.required && !coupled.contains(&p.name.as_str()))
            .map(|p| format!("A FieldCoupling is missing for parameter '{}', which is required.", p.name))
            .collect()
    }

    /// Seconds to wait before processing this link's request.
    #[must_use]
    pub fn countdown_seconds(&self) -> u64 {
        self.wait_time * self.time_unit.seconds_per_unit()
    }

    /// Validate `data` against every coupled parameter.
    ///
    /// # Errors
    ///
    /// Returns [`SupplyErrorCode::ValidationMissingCoupling`] listing every
    /// offending coupling if any coupled value fails the target parameter's
    /// validation.
    pub fn validate_input(&self, data: &Map<String, Value>) -> Result<(), SupplyError> {
        let mut offending = Vec::new();
        for c in &self.couplings {
            let Some(param) = self.requisition.parameters.iter().find(|p| p.name == c.parameter_name) else {
                continue;
            };
            if param.validate(data.get(&c.field_name)).is_err() {
                offending.push(format!("{}->{}", c.field_name, c.parameter_name));
            }
        }
        if offending.is_empty() {
            Ok(())
        } else {
            Err(SupplyError::new(
                SupplyErrorCode::ValidationMissingCoupling,
                format!("invalid couplings: {}", offending.join(", ")),
            )
            .with_context("couplings", offending))
        }
    }

    /// Rename `data` through this link's coupling map, producing the
    /// parameter map a handler expects.
    ///
    /// Only fields named by a coupling are copied; other keys in `data` are
    /// dropped.
    #[must_use]
    pub fn rename(&self, data: &Map<String, Value>) -> Map<String, Value> {
        let mut params = Map::new();
        for c in &self.couplings {
            if let Some(v) = data.get(&c.field_name) {
                params.insert(c.parameter_name.clone(), v.clone());
            }
        }
        params
    }
}

/// An ordered sequence of SupplyLinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyChain {
    /// Unique identifier.
    pub id: SupplyChainId,
    /// Unique, human-chosen name.
    pub name: String,
    /// Links, in the order they should run. Not necessarily sorted by
    /// position — use [`SupplyChain::ordered_links`] for execution order.
    pub links: Vec<SupplyLink>,
}

impl SupplyChain {
    /// Construct a new chain.
    #[must_use]
    pub fn new(name: impl Into<String>, links: Vec<SupplyLink>) -> Self {
        Self {
            id: SupplyChainId::new(),
            name: name.into(),
            links,
        }
    }

    /// Links sorted by ascending `position`.
    #[must_use]
    pub fn ordered_links(&self) -> Vec<&SupplyLink> {
        let mut ordered: Vec<&SupplyLink> = self.links.iter().collect();
        ordered.sort_by_key(|l| l.position);
        ordered
    }

    /// The first link's input fields, or an empty map if the chain has no links.
    #[must_use]
    pub fn input_fields(&self) -> BTreeMap<String, ParamType> {
        self.ordered_links().first().map(|l| l.input_fields()).unwrap_or_default()
    }

    /// The supplier of the last link in the chain, if any.
    #[must_use]
    pub fn platform(&self) -> Option<SupplierId> {
        self.ordered_links().last().map(|l| l.platform())
    }

    /// Every structural error in the chain: `["SupplyChain has no
    /// SupplyLinks."]` if empty, else the concatenation of each link's errors.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        if self.links.is_empty() {
            return vec!["SupplyChain has no SupplyLinks.".to_string()];
        }
        self.ordered_links().iter().flat_map(|l| l.errors()).collect()
    }

    /// Validate input against the first link, as chains only ever receive
    /// external input at their head.
    ///
    /// # Errors
    ///
    /// Returns [`SupplyError`] if the chain has no links or the first link's
    /// input fails validation.
    pub fn validate_input(&self, data: &Map<String, Value>) -> Result<(), SupplyError> {
        match self.ordered_links().first() {
            Some(first) => first.validate_input(data),
            None => Err(SupplyError::new(
                SupplyErrorCode::ConfigInvalid,
                "SupplyChain has no SupplyLinks.",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sc_requisition::ParameterSpec;

    fn req(name: &str, params: Vec<ParameterSpec>) -> Requisition {
        Requisition::new(SupplierId::new(), name, "https://example", false, params)
    }

    fn link(chain_id: SupplyChainId, position: u32) -> SupplyLink {
        SupplyLink::new(
            chain_id,
            req("domain_report", vec![ParameterSpec::required("domain", ParamType::String)]),
            position,
            5,
            TimeUnit::M,
            vec![FieldCoupling::new("domain", "domain")],
        )
    }

    #[test]
    fn countdown_seconds_converts_units() {
        let l = link(SupplyChainId::new(), 0);
        assert_eq!(l.countdown_seconds(), 300);
    }

    #[test]
    fn errors_lists_missing_required_coupling() {
        let l = SupplyLink::new(
            SupplyChainId::new(),
            req("domain_report", vec![ParameterSpec::required("domain", ParamType::String)]),
            0,
            0,
            TimeUnit::S,
            vec![],
        );
        assert_eq!(l.errors().len(), 1);
    }

    #[test]
    fn errors_empty_when_fully_coupled() {
        let l = link(SupplyChainId::new(), 0);
        assert!(l.errors().is_empty());
    }

    #[test]
    fn validate_input_rejects_bad_coupling() {
        let l = link(SupplyChainId::new(), 0);
        let mut data = Map::new();
        data.insert("domain".into(), Value::String(String::new()));
        assert!(l.validate_input(&data).is_err());
    }

    #[test]
    fn validate_input_accepts_good_coupling() {
        let l = link(SupplyChainId::new(), 0);
        let mut data = Map::new();
        data.insert("domain".into(), Value::String("example.com".into()));
        assert!(l.validate_input(&data).is_ok());
    }

    #[test]
    fn rename_maps_field_name_to_parameter_name() {
        let l = SupplyLink::new(
            SupplyChainId::new(),
            req("url_report", vec![ParameterSpec::required("resource", ParamType::String)]),
            0,
            0,
            TimeUnit::S,
            vec![FieldCoupling::new("url", "resource")],
        );
        let mut data = Map::new();
        data.insert("url".into(), Value::String("http://example.com".into()));
        let params = l.rename(&data);
        assert_eq!(params.get("resource"), Some(&Value::String("http://example.com".into())));
        assert!(params.get("url").is_none());
    }

    #[test]
    fn rename_round_trips_through_coupling_domain() {
        let l = link(SupplyChainId::new(), 0);
        let mut data = Map::new();
        data.insert("domain".into(), Value::String("example.com".into()));
        let params = l.rename(&data);
        let coupling = l.coupling();
        let field = coupling.iter().find(|(_, p)| params.contains_key(*p)).unwrap().0;
        assert_eq!(data.get(field), Some(&Value::String("example.com".into())));
    }

    proptest! {
        #[test]
        fn rename_round_trips_for_any_coupled_value(field in "[a-z]{1,8}", param in "[a-z]{1,8}", value in "[a-zA-Z0-9 ]{0,16}") {
            let l = SupplyLink::new(
                SupplyChainId::new(),
                req(param.as_str(), vec![ParameterSpec::optional(param.as_str(), ParamType::String, None)]),
                0,
                0,
                TimeUnit::S,
                vec![FieldCoupling::new(field.as_str(), param.as_str())],
            );
            let mut data = Map::new();
            data.insert(field.clone(), Value::String(value.clone()));

            let params = l.rename(&data);
            let coupling = l.coupling();

            prop_assert_eq!(coupling.get(&field), Some(&param));
            prop_assert_eq!(params.get(&param), Some(&Value::String(value)));
        }
    }

    #[test]
    fn chain_with_no_links_reports_error() {
        let chain = SupplyChain::new("empty", vec![]);
        assert_eq!(chain.errors(), vec!["SupplyChain has no SupplyLinks.".to_string()]);
    }

    #[test]
    fn chain_errors_concatenate_link_errors() {
        let chain_id = SupplyChainId::new();
        let broken_link = SupplyLink::new(
            chain_id,
            req("domain_report", vec![ParameterSpec::required("domain", ParamType::String)]),
            0,
            0,
            TimeUnit::S,
            vec![],
        );
        let chain = SupplyChain {
            id: chain_id,
            name: "broken".into(),
            links: vec![broken_link],
        };
        assert_eq!(chain.errors().len(), 1);
    }

    #[test]
    fn chain_input_fields_delegates_to_first_link() {
        let chain_id = SupplyChainId::new();
        let chain = SupplyChain::new("c", vec![link(chain_id, 1), link(chain_id, 0)]);
        assert_eq!(chain.input_fields(), chain.ordered_links()[0].input_fields());
    }

    #[test]
    fn chain_platform_uses_last_link_in_position_order() {
        let chain_id = SupplyChainId::new();
        let first = link(chain_id, 0);
        let second_req = req("file_report", vec![]);
        let expected_platform = second_req.supplier_ref;
        let second = SupplyLink::new(chain_id, second_req, 1, 0, TimeUnit::S, vec![]);
        let chain = SupplyChain::new("c", vec![second, first]);
        assert_eq!(chain.platform(), Some(expected_platform));
    }

    #[test]
    fn chain_validate_input_with_no_links_is_config_error() {
        let chain = SupplyChain::new("empty", vec![]);
        let err = chain.validate_input(&Map::new()).unwrap_err();
        assert_eq!(err.code, SupplyErrorCode::ConfigInvalid);
    }

    #[test]
    fn ordered_links_sorts_by_position() {
        let chain_id = SupplyChainId::new();
        let chain = SupplyChain::new("c", vec![link(chain_id, 2), link(chain_id, 0), link(chain_id, 1)]);
        let positions: Vec<u32> = chain.ordered_links().iter().map(|l| l.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
