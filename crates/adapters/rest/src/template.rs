//! Catalog query rendered by the hub's template endpoint.
//!
//! One query per domain. Each renders a JSON array with one row per entity
//! of that domain, joined with its device and area metadata.

use hamirror_domain::descriptor::Domain;
use hamirror_domain::device::CatalogEntity;

use crate::error::RestError;

const DOMAIN_QUERY: &str = r#"[
{%- for s in states.__DOMAIN__ -%}
{%- set device = device_id(s.entity_id) -%}
{{ {
  "entity_id": s.entity_id,
  "state": s.state,
  "attributes": dict(s.attributes),
  "device_id": device,
  "name": (device_attr(device, "name_by_user") or device_attr(device, "name")) if device else none,
  "manufacturer": device_attr(device, "manufacturer") if device else none,
  "model": device_attr(device, "model") if device else none,
  "area": area_name(s.entity_id)
} | tojson }}{{ "," if not loop.last }}
{%- endfor -%}
]"#;

/// The template listing every entity of `domain`.
#[must_use]
pub fn domain_query(domain: Domain) -> String {
    DOMAIN_QUERY.replace("__DOMAIN__", domain.as_str())
}

/// Decode the rendered output of [`domain_query`].
///
/// # Errors
///
/// Returns [`RestError::Decode`] when the output is not a JSON array of rows.
pub fn parse_rows(rendered: &str) -> Result<Vec<CatalogEntity>, RestError> {
    let rendered = rendered.trim();
    if rendered.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(rendered).map_err(RestError::Decode)
}
