//! fleetform-core: template builder, validator and serializer for EC2
//! autoscaling fleets.
//!
//! Generation runs in three passes:
//!
//! 1. [`TemplateBuilder`] collects parameters, mappings, resources and
//!    outputs, rejecting malformed entities with a [`SchemaError`].
//! 2. [`validate()`] resolves every reference and rejects cycles, returning
//!    all [`ValidationError`]s at once.
//! 3. [`serialize()`] renders a [`ValidatedTemplate`] to JSON.
//!
//! [`generate()`] runs all three for the fleet described by
//! [`FleetSettings`].

pub mod error;
pub mod fleet;
pub mod generate;
pub mod model;
pub mod pass1_build;
pub mod pass2_validate;
pub mod pass3_serialize;

// ── Convenience re-exports: key types ────────────────────────────────

pub use error::{GenerateError, SchemaError, SerializationError, TargetKind, ValidationError};
pub use fleet::FleetSettings;
pub use model::{
    Intrinsic, Mapping, MappingRows, Output, Parameter, ParameterType, PseudoParameter, Resource,
    ResourceKind, Template, Value,
};
pub use pass1_build::{MappingHandle, ParameterHandle, ResourceHandle, TemplateBuilder};
pub use pass2_validate::ValidatedTemplate;

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use fleet::build_fleet_template;
pub use generate::{generate, render};
pub use pass2_validate::validate;
pub use pass3_serialize::{serialize, to_json_value};
