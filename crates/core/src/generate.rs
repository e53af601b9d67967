//! Three-pass generator: settings -> template -> validated template -> JSON.
//!
//! This is a thin orchestrator that calls each pass module in order.

use crate::error::GenerateError;
use crate::fleet::{self, FleetSettings};
use crate::model::Template;
use crate::pass2_validate;
use crate::pass3_serialize;

/// Build, validate and serialize the fleet template described by `settings`.
pub fn generate(settings: &FleetSettings) -> Result<String, GenerateError> {
    // Pass 1: construction
    let template = fleet::build_fleet_template(settings)?;
    render(template)
}

/// Validate and serialize an already built template.
pub fn render(template: Template) -> Result<String, GenerateError> {
    // Pass 2: validation
    let validated = pass2_validate::validate(template)?;

    // Pass 3: serialization
    let text = pass3_serialize::serialize(&validated)?;
    tracing::debug!(bytes = text.len(), "template serialized");
    Ok(text)
}
