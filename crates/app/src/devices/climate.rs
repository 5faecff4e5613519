//! Climate entities and measurement sensors, normalized to SI units.

use serde::{Deserialize, Serialize};

use hamirror_domain::entity::{EntityId, EntityRecord};
use hamirror_domain::service::ServiceCall;
use hamirror_domain::unit::{self, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Auto,
    Cool,
    Dry,
    FanOnly,
    HeatCool,
    Heat,
}

impl HvacMode {
    fn from_hub(state: &str) -> Option<Self> {
        match state {
            "off" => Some(Self::Off),
            "auto" => Some(Self::Auto),
            "cool" => Some(Self::Cool),
            "dry" => Some(Self::Dry),
            "fan_only" => Some(Self::FanOnly),
            "heat_cool" => Some(Self::HeatCool),
            "heat" => Some(Self::Heat),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Cool => "cool",
            Self::Dry => "dry",
            Self::FanOnly => "fan_only",
            Self::HeatCool => "heat_cool",
            Self::Heat => "heat",
        }
    }
}

/// Thermostat state. Temperatures are stored in °C.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimateState {
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub mode: Option<HvacMode>,
    /// Unit the hub reports temperatures in; `None` means °C.
    pub unit: Option<String>,
}

impl ClimateState {
    pub(super) fn project(&mut self, record: &EntityRecord) {
        if let Some(reported) = record
            .attributes
            .get_str("temperature_unit")
            .or_else(|| record.unit_of_measurement())
        {
            self.unit = Some(reported.to_string());
        }
        let unit = self.unit.as_deref();
        if let Some(current) = record.attributes.get_f64("current_temperature") {
            self.current_temperature = Some(unit::local_to_si(current, unit));
        }
        if let Some(target) = record.attributes.get_f64("temperature") {
            self.target_temperature = Some(unit::local_to_si(target, unit));
        }
        match record.state().and_then(HvacMode::from_hub) {
            Some(mode) => self.mode = Some(mode),
            None => tracing::debug!(entity_id = %record.id, state = ?record.state(), "ignoring hvac mode"),
        }
    }

    pub(super) fn set_temperature_call(
        &self,
        target: &EntityId,
        celsius: f64,
        mode: Option<HvacMode>,
    ) -> ServiceCall {
        let local = unit::si_to_local(celsius, self.unit.as_deref());
        let call = ServiceCall::new(target.domain(), "set_temperature", target)
            .with("temperature", local);
        match mode {
            Some(mode) => call.with("hvac_mode", mode.as_str()),
            None => call,
        }
    }
}

/// A temperature or humidity measurement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    raw: Option<f64>,
    hub_unit: Option<String>,
    operator_unit: Option<Unit>,
    si: Option<f64>,
}

impl SensorReading {
    pub(super) fn project(&mut self, record: &EntityRecord) {
        self.hub_unit = record.unit_of_measurement().map(ToOwned::to_owned);
        match record.numeric_state() {
            Some(value) => self.raw = Some(value),
            None => tracing::debug!(entity_id = %record.id, state = ?record.state(), "ignoring non-numeric reading"),
        }
        self.recompute();
    }

    pub(super) fn set_operator_unit(&mut self, unit: Option<Unit>) {
        self.operator_unit = unit;
        self.recompute();
    }

    /// The hub's unit when it reports one, else the operator's.
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.hub_unit
            .as_deref()
            .or_else(|| self.operator_unit.map(Unit::symbol))
    }

    /// Last numeric value as reported by the hub.
    #[must_use]
    pub fn raw_value(&self) -> Option<f64> {
        self.raw
    }

    #[must_use]
    pub fn si_value(&self) -> Option<f64> {
        self.si
    }

    fn recompute(&mut self) {
        self.si = self.raw.map(|raw| unit::local_to_si(raw, self.unit()));
    }
}
