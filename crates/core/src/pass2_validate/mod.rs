//! Pass 2: Template validation -- reference resolution, parameter checks
//! and resource dependency cycles.
//!
//! Unlike Pass 1, which stops at the first malformed entity, this pass
//! collects every problem so the caller can fix them all in one go.

mod cycles;
mod references;

use crate::error::ValidationError;
use crate::model::*;
use crate::pass1_build::DEFAULT_FORMAT_VERSION;

/// A template that passed [`validate`]. Only this type can be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTemplate {
    template: Template,
}

impl ValidatedTemplate {
    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_inner(self) -> Template {
        self.template
    }
}

/// Longest `Description` the provisioning engine accepts, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;

pub fn validate(template: Template) -> Result<ValidatedTemplate, Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_document_limits(&template, &mut errors);
    references::check_template(&template, &mut errors);
    validate_parameter_defaults(&template, &mut errors);
    if let Err(e) = cycles::detect_resource_cycle(&template) {
        errors.push(e);
    }

    if errors.is_empty() {
        tracing::info!(
            parameters = template.parameters.len(),
            mappings = template.mappings.len(),
            resources = template.resources.len(),
            outputs = template.outputs.len(),
            "template validated"
        );
        Ok(ValidatedTemplate { template })
    } else {
        for e in &errors {
            tracing::debug!(subject = e.subject(), "{}", e);
        }
        Err(errors)
    }
}

/// Limits of the emitted document that no single entity can check.
fn validate_document_limits(template: &Template, errors: &mut Vec<ValidationError>) {
    if template.format_version != DEFAULT_FORMAT_VERSION {
        errors.push(ValidationError::UnsupportedFormatVersion {
            version: template.format_version.clone(),
        });
    }
    if let Some(description) = &template.description {
        let length = description.chars().count();
        if length > MAX_DESCRIPTION_LENGTH {
            errors.push(ValidationError::DescriptionTooLong {
                length,
                max: MAX_DESCRIPTION_LENGTH,
            });
        }
    }
    if template.resources.is_empty() {
        errors.push(ValidationError::NoResources);
    }
}

/// A parameter with allowed values must default to one of them.
fn validate_parameter_defaults(template: &Template, errors: &mut Vec<ValidationError>) {
    for p in template.parameters.values() {
        if let (Some(allowed), Some(default)) = (&p.allowed_values, &p.default) {
            if !allowed.iter().any(|v| v == default) {
                errors.push(ValidationError::DefaultNotAllowed {
                    parameter: p.logical_name.clone(),
                    default: default.clone(),
                });
            }
        }
    }
}
