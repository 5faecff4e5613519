//! Unit normalization for numeric sensor values.
//!
//! Every known unit belongs to a [`UnitGroup`] with one canonical SI unit.
//! Values coming from the hub are converted to SI before they reach a device
//! adapter's typed state, and back to the operator's unit for display.
//! Unknown units convert with a factor of 1 and belong to [`UnitGroup::None`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Physical quantity a unit measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitGroup {
    None,
    Temperature,
    Speed,
    Length,
    Pressure,
}

impl UnitGroup {
    /// Canonical unit of the group; `None` for [`UnitGroup::None`].
    #[must_use]
    pub fn si_unit(self) -> Option<Unit> {
        match self {
            Self::None => None,
            Self::Temperature => Some(Unit::Celsius),
            Self::Speed => Some(Unit::MetersPerSecond),
            Self::Length => Some(Unit::Meters),
            Self::Pressure => Some(Unit::Pascal),
        }
    }
}

/// A unit the converter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Unit {
    Celsius,
    Fahrenheit,
    MetersPerSecond,
    KilometersPerHour,
    MilesPerHour,
    Meters,
    Millimeters,
    Kilometers,
    Inches,
    Miles,
    Pascal,
    Hectopascal,
    Bar,
}

impl Unit {
    pub const ALL: [Self; 13] = [
        Self::Celsius,
        Self::Fahrenheit,
        Self::MetersPerSecond,
        Self::KilometersPerHour,
        Self::MilesPerHour,
        Self::Meters,
        Self::Millimeters,
        Self::Kilometers,
        Self::Inches,
        Self::Miles,
        Self::Pascal,
        Self::Hectopascal,
        Self::Bar,
    ];

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::MetersPerSecond => "m/s",
            Self::KilometersPerHour => "km/h",
            Self::MilesPerHour => "mph",
            Self::Meters => "m",
            Self::Millimeters => "mm",
            Self::Kilometers => "km",
            Self::Inches => "in",
            Self::Miles => "mi",
            Self::Pascal => "Pa",
            Self::Hectopascal => "hPa",
            Self::Bar => "bar",
        }
    }

    #[must_use]
    pub fn group(self) -> UnitGroup {
        match self {
            Self::Celsius | Self::Fahrenheit => UnitGroup::Temperature,
            Self::MetersPerSecond | Self::KilometersPerHour | Self::MilesPerHour => {
                UnitGroup::Speed
            }
            Self::Meters | Self::Millimeters | Self::Kilometers | Self::Inches | Self::Miles => {
                UnitGroup::Length
            }
            Self::Pascal | Self::Hectopascal | Self::Bar => UnitGroup::Pressure,
        }
    }

    /// Multiplier from this unit to SI. Fahrenheit is affine and handled apart.
    fn factor(self) -> f64 {
        match self {
            Self::Celsius
            | Self::Fahrenheit
            | Self::MetersPerSecond
            | Self::Meters
            | Self::Pascal => 1.0,
            Self::KilometersPerHour => 1.0 / 3.6,
            Self::MilesPerHour => 0.447_04,
            Self::Millimeters => 0.001,
            Self::Kilometers => 1000.0,
            Self::Inches => 0.0254,
            Self::Miles => 1_609.344,
            Self::Hectopascal => 100.0,
            Self::Bar => 100_000.0,
        }
    }

    fn to_si(self, value: f64) -> f64 {
        match self {
            Self::Fahrenheit => (value - 32.0) / 1.8,
            other => value * other.factor(),
        }
    }

    fn from_si(self, value: f64) -> f64 {
        match self {
            Self::Fahrenheit => value * 1.8 + 32.0,
            other => value / other.factor(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl From<Unit> for &'static str {
    fn from(value: Unit) -> Self {
        value.symbol()
    }
}

/// Error returned when a unit symbol is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown unit {0:?}")]
pub struct UnknownUnit(pub String);

impl FromStr for Unit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|u| u.symbol() == s)
            .ok_or_else(|| UnknownUnit(s.to_string()))
    }
}

impl TryFrom<String> for Unit {
    type Error = UnknownUnit;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Look up a unit symbol; empty, missing and unknown symbols yield `None`.
#[must_use]
pub fn parse(symbol: Option<&str>) -> Option<Unit> {
    symbol.and_then(|s| s.parse().ok())
}

/// Group of a unit symbol, [`UnitGroup::None`] when unknown.
#[must_use]
pub fn group_of(symbol: Option<&str>) -> UnitGroup {
    parse(symbol).map_or(UnitGroup::None, Unit::group)
}

/// Convert a value expressed in `symbol` into its group's SI unit.
#[must_use]
pub fn local_to_si(value: f64, symbol: Option<&str>) -> f64 {
    let converted = parse(symbol).map_or(value, |unit| unit.to_si(value));
    finite_or_zero(converted)
}

/// Convert an SI value into `symbol`. A NaN input yields 0.
#[must_use]
pub fn si_to_local(value: f64, symbol: Option<&str>) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let converted = parse(symbol).map_or(value, |unit| unit.from_si(value));
    finite_or_zero(converted)
}

/// Every unit sharing a group with `symbol`, in table order.
#[must_use]
pub fn units_in_group(symbol: Option<&str>) -> Vec<Unit> {
    match group_of(symbol) {
        UnitGroup::None => Vec::new(),
        group => Unit::ALL
            .into_iter()
            .filter(|u| u.group() == group)
            .collect(),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value }
}
