//! Domain dispatch: which device adapter, if any, surfaces an entity.
//!
//! Most domains map to one static [`DeviceDescriptor`]. Two are resolved by
//! inspecting attributes:
//!
//! | Domain | Rule (first match wins) | Descriptor |
//! |--------|-------------------------|------------|
//! | `binary_sensor` | `device_class` is a moisture class | flood sensor |
//! | `binary_sensor` | `device_class` is an opening class | entry sensor |
//! | `binary_sensor` | otherwise | binary sensor |
//! | `sensor` | `temperature` + `measurement` | thermometer |
//! | `sensor` | `humidity` + `measurement` | humidity sensor |
//! | `sensor` | otherwise | unsupported |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityRecord};
use crate::error::ValidationError;

/// Native id prefix of device-group adapters (`haDevice:<device-id>`).
pub const DEVICE_GROUP_PREFIX: &str = "haDevice";

const MOISTURE_CLASSES: &[&str] = &["moisture"];
const OPENING_CLASSES: &[&str] = &["door", "garage_door", "opening", "window"];

/// Entity domains this mirror knows how to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    BinarySensor,
    Lock,
    AlarmControlPanel,
    Switch,
    Light,
    InputBoolean,
    Button,
    InputButton,
    Script,
    Cover,
    Climate,
    InputNumber,
    InputSelect,
    Select,
    MediaPlayer,
    Sensor,
}

impl Domain {
    pub const ALL: [Self; 16] = [
        Self::BinarySensor,
        Self::Lock,
        Self::AlarmControlPanel,
        Self::Switch,
        Self::Light,
        Self::InputBoolean,
        Self::Button,
        Self::InputButton,
        Self::Script,
        Self::Cover,
        Self::Climate,
        Self::InputNumber,
        Self::InputSelect,
        Self::Select,
        Self::MediaPlayer,
        Self::Sensor,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BinarySensor => "binary_sensor",
            Self::Lock => "lock",
            Self::AlarmControlPanel => "alarm_control_panel",
            Self::Switch => "switch",
            Self::Light => "light",
            Self::InputBoolean => "input_boolean",
            Self::Button => "button",
            Self::InputButton => "input_button",
            Self::Script => "script",
            Self::Cover => "cover",
            Self::Climate => "climate",
            Self::InputNumber => "input_number",
            Self::InputSelect => "input_select",
            Self::Select => "select",
            Self::MediaPlayer => "media_player",
            Self::Sensor => "sensor",
        }
    }

    /// The domain of an entity id, if it is a supported one.
    #[must_use]
    pub fn of(id: &EntityId) -> Option<Self> {
        id.domain().parse().ok()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported domain name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported domain {0:?}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}

/// Host-facing device category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sensor,
    Lock,
    SecuritySystem,
    Switch,
    Light,
    Button,
    Entry,
    Thermostat,
    Select,
    MediaPlayer,
    DeviceGroup,
}

/// Capability tag advertised to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BinarySensor,
    FloodSensor,
    EntrySensor,
    Lock,
    SecuritySystem,
    OnOff,
    PressButtons,
    Entry,
    Thermometer,
    HumiditySensor,
    TemperatureSetting,
    MediaPlayer,
    Sensors,
    Settings,
}

/// Which adapter implementation projects the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    BinarySensor,
    FloodSensor,
    EntrySensor,
    Lock,
    SecuritySystem,
    Switch,
    Light,
    InputBoolean,
    Button,
    InputButton,
    Script,
    Cover,
    Climate,
    InputNumber,
    InputSelect,
    Select,
    MediaPlayer,
    Thermostat,
    DeviceGroup,
}

/// Static metadata describing how an entity is surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id_prefix: &'static str,
    pub category: Category,
    pub capabilities: Vec<Capability>,
    pub adapter: AdapterKind,
}

impl DeviceDescriptor {
    fn new(
        id_prefix: &'static str,
        category: Category,
        capabilities: &[Capability],
        adapter: AdapterKind,
    ) -> Self {
        Self {
            id_prefix,
            category,
            capabilities: capabilities.to_vec(),
            adapter,
        }
    }

    /// Descriptor of the adapter that aggregates every entity of a catalog device.
    #[must_use]
    pub fn device_group() -> Self {
        Self::new(
            DEVICE_GROUP_PREFIX,
            Category::DeviceGroup,
            &[Capability::Sensors],
            AdapterKind::DeviceGroup,
        )
    }

    /// `<id_prefix>:<id>`.
    #[must_use]
    pub fn native_id(&self, id: &str) -> String {
        format!("{}:{id}", self.id_prefix)
    }

    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Split a native id into its prefix and the wrapped id.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedNativeId`] when there is no `:` or
/// either side of it is empty.
pub fn split_native_id(native_id: &str) -> Result<(&str, &str), ValidationError> {
    match native_id.split_once(':') {
        Some((prefix, id)) if !prefix.is_empty() && !id.is_empty() => Ok((prefix, id)),
        _ => Err(ValidationError::MalformedNativeId(native_id.to_string())),
    }
}

/// Resolve the descriptor for a record, or `None` when it is not integrated.
#[must_use]
pub fn resolve(record: &EntityRecord) -> Option<DeviceDescriptor> {
    match Domain::of(&record.id)? {
        Domain::BinarySensor => Some(resolve_binary_sensor(record)),
        Domain::Sensor => resolve_sensor(record),
        other => Some(static_descriptor(other)),
    }
}

fn resolve_binary_sensor(record: &EntityRecord) -> DeviceDescriptor {
    let class = record.device_class().unwrap_or_default();
    if MOISTURE_CLASSES.contains(&class) {
        DeviceDescriptor::new(
            "haFloodSensor",
            Category::Sensor,
            &[Capability::FloodSensor],
            AdapterKind::FloodSensor,
        )
    } else if OPENING_CLASSES.contains(&class) {
        DeviceDescriptor::new(
            "haEntrySensor",
            Category::Entry,
            &[Capability::EntrySensor],
            AdapterKind::EntrySensor,
        )
    } else {
        static_descriptor(Domain::BinarySensor)
    }
}

fn resolve_sensor(record: &EntityRecord) -> Option<DeviceDescriptor> {
    let capability = match (record.device_class()?, record.state_class()?) {
        ("temperature", "measurement") => Capability::Thermometer,
        ("humidity", "measurement") => Capability::HumiditySensor,
        _ => return None,
    };

    let mut descriptor = DeviceDescriptor::new(
        "haSensor",
        Category::Thermostat,
        &[capability],
        AdapterKind::Thermostat,
    );
    if record.unit_of_measurement().is_none() {
        descriptor.capabilities.push(Capability::Settings);
    }
    Some(descriptor)
}

fn static_descriptor(domain: Domain) -> DeviceDescriptor {
    use AdapterKind as K;
    use Capability as C;

    match domain {
        Domain::BinarySensor => DeviceDescriptor::new(
            "haBinarySensor",
            Category::Sensor,
            &[C::BinarySensor],
            K::BinarySensor,
        ),
        Domain::Lock => DeviceDescriptor::new("haLock", Category::Lock, &[C::Lock], K::Lock),
        Domain::AlarmControlPanel => DeviceDescriptor::new(
            "haSecuritySystem",
            Category::SecuritySystem,
            &[C::SecuritySystem],
            K::SecuritySystem,
        ),
        Domain::Switch => {
            DeviceDescriptor::new("haSwitch", Category::Switch, &[C::OnOff], K::Switch)
        }
        Domain::Light => DeviceDescriptor::new("haLight", Category::Light, &[C::OnOff], K::Light),
        Domain::InputBoolean => DeviceDescriptor::new(
            "haInputBoolean",
            Category::Switch,
            &[C::OnOff],
            K::InputBoolean,
        ),
        Domain::Button => DeviceDescriptor::new(
            "haButton",
            Category::Button,
            &[C::PressButtons, C::OnOff],
            K::Button,
        ),
        Domain::InputButton => DeviceDescriptor::new(
            "haInputButton",
            Category::Button,
            &[C::PressButtons],
            K::InputButton,
        ),
        Domain::Script => {
            DeviceDescriptor::new("haScript", Category::Switch, &[C::OnOff], K::Script)
        }
        Domain::Cover => DeviceDescriptor::new("haCover", Category::Entry, &[C::Entry], K::Cover),
        Domain::Climate => DeviceDescriptor::new(
            "haClimate",
            Category::Thermostat,
            &[C::Thermometer, C::TemperatureSetting, C::OnOff],
            K::Climate,
        ),
        Domain::InputNumber => DeviceDescriptor::new(
            "haInputNumber",
            Category::Sensor,
            &[C::Sensors, C::Settings],
            K::InputNumber,
        ),
        Domain::InputSelect => DeviceDescriptor::new(
            "haInputSelect",
            Category::Select,
            &[C::Sensors, C::Settings],
            K::InputSelect,
        ),
        Domain::Select => DeviceDescriptor::new(
            "haSelect",
            Category::Select,
            &[C::Sensors, C::Settings],
            K::Select,
        ),
        Domain::MediaPlayer => DeviceDescriptor::new(
            "haMediaPlayer",
            Category::MediaPlayer,
            &[C::MediaPlayer, C::OnOff],
            K::MediaPlayer,
        ),
        // Only reachable through `resolve_sensor`; kept total for `Domain::ALL` walks.
        Domain::Sensor => DeviceDescriptor::new(
            "haSensor",
            Category::Sensor,
            &[C::Sensors],
            K::Thermostat,
        ),
    }
}
