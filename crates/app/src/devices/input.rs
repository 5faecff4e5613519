//! Input helpers: numbers and option lists.

use hamirror_domain::entity::EntityRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberState {
    pub value: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberState {
    pub(super) fn project(&mut self, record: &EntityRecord) {
        self.min = record.attributes.get_f64("min");
        self.max = record.attributes.get_f64("max");
        match record.numeric_state() {
            Some(value) => self.value = Some(value),
            None => tracing::debug!(entity_id = %record.id, state = ?record.state(), "ignoring non-numeric value"),
        }
    }

    pub(super) fn check(&self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("{value} is not a finite number"));
        }
        if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
            return Err(format!(
                "{value} outside of [{}, {}]",
                self.min.unwrap_or(f64::NEG_INFINITY),
                self.max.unwrap_or(f64::INFINITY)
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectState {
    pub current: Option<String>,
    pub options: Vec<String>,
}

impl SelectState {
    pub(super) fn project(&mut self, record: &EntityRecord) {
        if let Some(options) = record.attributes.get("options").and_then(|v| v.as_array()) {
            self.options = options
                .iter()
                .filter_map(|o| o.as_str().map(ToOwned::to_owned))
                .collect();
        }
        self.current = record.state.clone();
    }

    /// An empty option list accepts anything.
    pub(super) fn check(&self, option: &str) -> Result<(), String> {
        if self.options.is_empty() || self.options.iter().any(|o| o == option) {
            Ok(())
        } else {
            Err(format!("{option:?} is not one of {:?}", self.options))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hamirror_domain::entity::EntityId;
    use serde_json::json;

    #[test]
    fn should_bound_number_by_min_and_max() {
        let record = EntityRecord::new(
            EntityId::parse("input_number.volume").unwrap(),
            Some("30".to_string()),
        )
        .with_attributes(json!({"min": 0, "max": 100}).as_object().cloned().unwrap());
        let mut state = NumberState::default();
        state.project(&record);

        assert_eq!(state.value, Some(30.0));
        assert!(state.check(55.0).is_ok());
        assert!(state.check(101.0).is_err());
        assert!(state.check(f64::NAN).is_err());
    }

    #[test]
    fn should_collect_string_options() {
        let record = EntityRecord::new(
            EntityId::parse("select.mode").unwrap(),
            Some("eco".to_string()),
        )
        .with_attributes(json!({"options": ["eco", "boost", 3]}).as_object().cloned().unwrap());
        let mut state = SelectState::default();
        state.project(&record);

        assert_eq!(state.current.as_deref(), Some("eco"));
        assert_eq!(state.options, vec!["eco".to_string(), "boost".to_string()]);
    }
}
