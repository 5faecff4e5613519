//! Device adapters: per-domain projections of entity records and their
//! command surfaces.
//!
//! A [`DeviceAdapter`] owns one entity (or every entity of a catalog device
//! for device groups). [`DeviceAdapter::apply_update`] projects a full record
//! onto the adapter's typed [`Projection`]; [`DeviceAdapter::command`] turns a
//! host [`Command`] into the [`ServiceCall`] that performs it.
//!
//! Projections never fail on odd values: anything unexpected is logged at
//! debug level and the previous typed state is kept.

mod climate;
mod cover;
mod group;
mod input;
mod security;
mod switching;

pub use climate::{ClimateState, HvacMode, SensorReading};
pub use cover::CoverState;
pub use group::{GroupMember, GroupState};
pub use input::{NumberState, SelectState};
pub use security::{LockState, SecurityMode};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hamirror_domain::descriptor::{AdapterKind, Capability, DeviceDescriptor};
use hamirror_domain::device::CatalogDevice;
use hamirror_domain::entity::{EntityId, EntityRecord};
use hamirror_domain::error::{MirrorError, UnsupportedError, ValidationError};
use hamirror_domain::service::ServiceCall;
use hamirror_domain::unit::Unit;

/// Errors raised by a device adapter.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AdapterError {
    #[error("{native_id} does not support {command}")]
    UnsupportedCommand {
        native_id: String,
        command: &'static str,
    },
    #[error("{native_id} rejected {command}: {reason}")]
    InvalidArgument {
        native_id: String,
        command: &'static str,
        reason: String,
    },
    #[error("{native_id} cannot project {entity_id}: {reason}")]
    Projection {
        native_id: String,
        entity_id: EntityId,
        reason: &'static str,
    },
}

impl From<AdapterError> for MirrorError {
    fn from(err: AdapterError) -> Self {
        let (target, operation) = match err {
            AdapterError::UnsupportedCommand { native_id, command } => {
                (native_id, command.to_string())
            }
            AdapterError::InvalidArgument {
                native_id,
                command,
                reason,
            } => (native_id, format!("{command} ({reason})")),
            AdapterError::Projection {
                native_id,
                entity_id,
                ..
            } => (native_id, format!("updates for {entity_id}")),
        };
        UnsupportedError { target, operation }.into()
    }
}

/// Host-side request addressed to an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TurnOn,
    TurnOff,
    Press,
    Lock,
    Unlock,
    Arm(SecurityMode),
    Disarm,
    Open,
    Close,
    /// Target temperature in °C, converted to the entity's unit.
    SetTemperature {
        celsius: f64,
        mode: Option<HvacMode>,
    },
    SetValue(f64),
    SelectOption(String),
    /// Declare the unit of a sensor that does not report one. Local only.
    SetUnit(Option<Unit>),
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Press => "press",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Arm(_) => "arm",
            Self::Disarm => "disarm",
            Self::Open => "open",
            Self::Close => "close",
            Self::SetTemperature { .. } => "set_temperature",
            Self::SetValue(_) => "set_value",
            Self::SelectOption(_) => "select_option",
            Self::SetUnit(_) => "set_unit",
        }
    }
}

/// Adapter-local typed state.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Binary, flood and entry sensors.
    Detection(Option<bool>),
    /// Switches, lights, input booleans and media players.
    Power(Option<bool>),
    /// Buttons and scripts have no persistent state.
    Momentary,
    Lock(Option<LockState>),
    Security(Option<SecurityMode>),
    Cover(CoverState),
    Climate(ClimateState),
    Number(NumberState),
    Select(SelectState),
    Sensor(SensorReading),
    Group(GroupState),
}

impl Projection {
    fn for_kind(kind: AdapterKind) -> Self {
        match kind {
            AdapterKind::BinarySensor | AdapterKind::FloodSensor | AdapterKind::EntrySensor => {
                Self::Detection(None)
            }
            AdapterKind::Switch
            | AdapterKind::Light
            | AdapterKind::InputBoolean
            | AdapterKind::MediaPlayer => Self::Power(None),
            AdapterKind::Button | AdapterKind::InputButton | AdapterKind::Script => {
                Self::Momentary
            }
            AdapterKind::Lock => Self::Lock(None),
            AdapterKind::SecuritySystem => Self::Security(None),
            AdapterKind::Cover => Self::Cover(CoverState::default()),
            AdapterKind::Climate => Self::Climate(ClimateState::default()),
            AdapterKind::InputNumber => Self::Number(NumberState::default()),
            AdapterKind::InputSelect | AdapterKind::Select => Self::Select(SelectState::default()),
            AdapterKind::Thermostat => Self::Sensor(SensorReading::default()),
            AdapterKind::DeviceGroup => Self::Group(GroupState::default()),
        }
    }

    fn apply(&mut self, record: &EntityRecord) {
        match self {
            Self::Detection(on) | Self::Power(on) => switching::project(on, record),
            Self::Momentary => {}
            Self::Lock(state) => security::project_lock(state, record),
            Self::Security(mode) => security::project_alarm(mode, record),
            Self::Cover(state) => state.project(record),
            Self::Climate(state) => state.project(record),
            Self::Number(state) => state.project(record),
            Self::Select(state) => state.project(record),
            Self::Sensor(reading) => reading.project(record),
            Self::Group(group) => group.project(record),
        }
    }
}

/// One adapter instance, memoized by the adapter cache for the process lifetime.
#[derive(Debug)]
pub struct DeviceAdapter {
    native_id: String,
    name: String,
    /// Fixed capabilities; the operator-unit `Settings` of sensors lives in `unitless`.
    descriptor: DeviceDescriptor,
    /// Sensor currently reports no `unit_of_measurement`.
    unitless: AtomicBool,
    entities: Vec<EntityId>,
    state: Mutex<Projection>,
}

fn reports_no_unit(kind: AdapterKind, record: &EntityRecord) -> bool {
    kind == AdapterKind::Thermostat && record.unit_of_measurement().is_none()
}

impl DeviceAdapter {
    /// Build a single-entity adapter and project its current record.
    #[must_use]
    pub fn for_entity(mut descriptor: DeviceDescriptor, record: &EntityRecord) -> Self {
        if descriptor.adapter == AdapterKind::Thermostat {
            descriptor
                .capabilities
                .retain(|capability| *capability != Capability::Settings);
        }
        let mut projection = Projection::for_kind(descriptor.adapter);
        projection.apply(record);
        Self {
            native_id: descriptor.native_id(record.id.as_str()),
            name: record.display_name(),
            unitless: AtomicBool::new(reports_no_unit(descriptor.adapter, record)),
            descriptor,
            entities: vec![record.id.clone()],
            state: Mutex::new(projection),
        }
    }

    /// Build a device-group adapter over every entity of a catalog device.
    #[must_use]
    pub fn for_device(device: &CatalogDevice) -> Self {
        let descriptor = DeviceDescriptor::device_group();
        Self {
            native_id: descriptor.native_id(&device.id),
            name: device.name.clone(),
            descriptor,
            unitless: AtomicBool::new(false),
            entities: device.entities.clone(),
            state: Mutex::new(Projection::Group(GroupState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Projection> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn native_id(&self) -> &str {
        &self.native_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current capability set. A sensor gains `Settings` while the hub
    /// reports no unit for it and loses it once a unit shows up.
    #[must_use]
    pub fn descriptor(&self) -> DeviceDescriptor {
        let mut descriptor = self.descriptor.clone();
        if self.unitless.load(Ordering::Acquire) {
            descriptor.capabilities.push(Capability::Settings);
        }
        descriptor
    }

    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.descriptor.has(capability)
            || (capability == Capability::Settings && self.unitless.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn kind(&self) -> AdapterKind {
        self.descriptor.adapter
    }

    /// Entity ids this adapter receives updates for.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    #[must_use]
    pub fn owns(&self, id: &EntityId) -> bool {
        self.entities.contains(id)
    }

    /// Copy of the current typed state.
    #[must_use]
    pub fn projection(&self) -> Projection {
        self.lock().clone()
    }

    /// Project a full record onto this adapter's state.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Projection`] when the record belongs to an
    /// entity this adapter does not own.
    pub fn apply_update(&self, record: &EntityRecord) -> Result<(), AdapterError> {
        if !self.owns(&record.id) {
            return Err(AdapterError::Projection {
                native_id: self.native_id.clone(),
                entity_id: record.id.clone(),
                reason: "entity not owned by adapter",
            });
        }
        self.unitless
            .store(reports_no_unit(self.kind(), record), Ordering::Release);
        self.lock().apply(record);
        Ok(())
    }

    /// Translate a host command into a service call.
    ///
    /// Returns `Ok(None)` for commands handled locally (momentary resets,
    /// operator unit declarations).
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedCommand`] when the adapter kind
    /// has no such command, or [`AdapterError::InvalidArgument`] when the
    /// argument is out of the entity's range.
    pub fn command(&self, command: &Command) -> Result<Option<ServiceCall>, AdapterError> {
        let Some(target) = self.entities.first() else {
            return Err(self.unsupported(command));
        };
        let domain = target.domain();
        let call = |action: &str| -> Result<Option<ServiceCall>, AdapterError> {
            Ok(Some(ServiceCall::new(domain, action, target)))
        };

        match (self.kind(), command) {
            (AdapterKind::Lock, Command::Lock) => call("lock"),
            (AdapterKind::Lock, Command::Unlock) => call("unlock"),
            (AdapterKind::SecuritySystem, Command::Arm(mode)) => match mode.arm_service() {
                Some(action) => call(action),
                None => Err(self.invalid(command, "cannot arm into disarmed".to_string())),
            },
            (AdapterKind::SecuritySystem, Command::Disarm) => call("alarm_disarm"),
            (
                AdapterKind::Switch
                | AdapterKind::Light
                | AdapterKind::InputBoolean
                | AdapterKind::MediaPlayer
                | AdapterKind::Climate,
                Command::TurnOn,
            ) => call("turn_on"),
            (
                AdapterKind::Switch
                | AdapterKind::Light
                | AdapterKind::InputBoolean
                | AdapterKind::MediaPlayer
                | AdapterKind::Climate,
                Command::TurnOff,
            ) => call("turn_off"),
            (AdapterKind::Button, Command::Press | Command::TurnOn)
            | (AdapterKind::InputButton, Command::Press) => call("press"),
            (AdapterKind::Script, Command::TurnOn) => call("turn_on"),
            (AdapterKind::Button | AdapterKind::Script, Command::TurnOff) => Ok(None),
            (AdapterKind::Cover, Command::Open) => call("open_cover"),
            (AdapterKind::Cover, Command::Close) => call("close_cover"),
            (AdapterKind::Climate, Command::SetTemperature { celsius, mode }) => {
                let guard = self.lock();
                let Projection::Climate(state) = &*guard else {
                    return Err(self.unsupported(command));
                };
                Ok(Some(state.set_temperature_call(target, *celsius, *mode)))
            }
            (AdapterKind::InputNumber, Command::SetValue(value)) => {
                let guard = self.lock();
                let Projection::Number(state) = &*guard else {
                    return Err(self.unsupported(command));
                };
                state
                    .check(*value)
                    .map_err(|reason| self.invalid(command, reason))?;
                Ok(Some(
                    ServiceCall::new(domain, "set_value", target).with("value", *value),
                ))
            }
            (AdapterKind::InputSelect | AdapterKind::Select, Command::SelectOption(option)) => {
                let guard = self.lock();
                let Projection::Select(state) = &*guard else {
                    return Err(self.unsupported(command));
                };
                state
                    .check(option)
                    .map_err(|reason| self.invalid(command, reason))?;
                Ok(Some(
                    ServiceCall::new(domain, "select_option", target).with("option", option.clone()),
                ))
            }
            (AdapterKind::Thermostat, Command::SetUnit(unit))
                if self.has(Capability::Settings) =>
            {
                if let Projection::Sensor(reading) = &mut *self.lock() {
                    reading.set_operator_unit(*unit);
                }
                Ok(None)
            }
            _ => Err(self.unsupported(command)),
        }
    }

    fn unsupported(&self, command: &Command) -> AdapterError {
        AdapterError::UnsupportedCommand {
            native_id: self.native_id.clone(),
            command: command.name(),
        }
    }

    fn invalid(&self, command: &Command, reason: String) -> AdapterError {
        AdapterError::InvalidArgument {
            native_id: self.native_id.clone(),
            command: command.name(),
            reason,
        }
    }
}

/// Parse `<prefix>:<entity-id>` back into the entity id of a single-entity adapter.
///
/// # Errors
///
/// Returns [`ValidationError`] when the native id or the wrapped entity id
/// is malformed.
pub fn entity_of_native_id(native_id: &str) -> Result<EntityId, ValidationError> {
    let (_, id) = hamirror_domain::descriptor::split_native_id(native_id)?;
    EntityId::parse(id)
}
