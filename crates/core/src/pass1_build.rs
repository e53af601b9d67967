//! Pass 1: Template construction -- append parameters, mappings, resources
//! and outputs to an owned builder, checking each entity's local shape.
//!
//! Cross-entity checks (does a reference resolve, is there a cycle) are left
//! to Pass 2 so that forward references are possible.

use crate::error::SchemaError;
use crate::model::*;
use indexmap::IndexMap;
use std::collections::HashMap;

pub const DEFAULT_FORMAT_VERSION: &str = "2010-09-09";

/// Accumulates one template. Each builder is independent; nothing is shared
/// between instances.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    template: Template,
    /// Logical names shared by parameters, mappings and resources.
    names: HashMap<String, &'static str>,
}

/// Returned by [`TemplateBuilder::add_parameter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterHandle {
    name: String,
}

/// Returned by [`TemplateBuilder::add_mapping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingHandle {
    name: String,
}

/// Returned by [`TemplateBuilder::add_resource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    name: String,
    kind: ResourceKind,
}

impl ParameterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> Value {
        Value::parameter_ref(&self.name)
    }
}

impl MappingHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find(&self, top_key: impl Into<Value>, column: impl Into<String>) -> Value {
        Value::find_in_map(&self.name, top_key, column)
    }
}

impl ResourceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn reference(&self) -> Value {
        Value::resource_ref(&self.name)
    }

    pub fn get_att(&self, attribute: impl Into<String>) -> Value {
        Value::get_att(&self.name, attribute)
    }
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        TemplateBuilder {
            template: Template {
                format_version: DEFAULT_FORMAT_VERSION.to_owned(),
                description: None,
                parameters: IndexMap::new(),
                mappings: IndexMap::new(),
                resources: IndexMap::new(),
                outputs: IndexMap::new(),
            },
            names: HashMap::new(),
        }
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.template.description = Some(description.into());
        self
    }

    pub fn format_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.template.format_version = version.into();
        self
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<ParameterHandle, SchemaError> {
        self.check_name_free(&parameter.logical_name)?;
        check_parameter(&parameter)?;

        let name = parameter.logical_name.clone();
        self.names.insert(name.clone(), "parameter");
        tracing::debug!(parameter = %name, type_ = parameter.type_.as_str(), "added parameter");
        self.template.parameters.insert(name.clone(), parameter);
        Ok(ParameterHandle { name })
    }

    pub fn add_mapping(
        &mut self,
        name: impl Into<String>,
        rows: MappingRows,
    ) -> Result<MappingHandle, SchemaError> {
        let name = name.into();
        self.check_name_free(&name)?;
        check_mapping_rows(&name, &rows)?;
        self.names.insert(name.clone(), "mapping");

        tracing::debug!(mapping = %name, rows = rows.len(), "added mapping");
        self.template.mappings.insert(
            name.clone(),
            Mapping {
                name: name.clone(),
                rows,
            },
        );
        Ok(MappingHandle { name })
    }

    pub fn add_resource(&mut self, resource: Resource) -> Result<ResourceHandle, SchemaError> {
        self.check_name_free(&resource.logical_name)?;
        check_resource(&resource)?;

        let name = resource.logical_name.clone();
        self.names.insert(name.clone(), "resource");
        let kind = resource.kind;
        tracing::debug!(resource = %name, kind = kind.name(), "added resource");
        self.template.resources.insert(name.clone(), resource);
        Ok(ResourceHandle { name, kind })
    }

    /// Outputs live in their own namespace.
    pub fn add_output(&mut self, output: Output) -> Result<(), SchemaError> {
        check_logical_name(&output.logical_name)?;
        if self.template.outputs.contains_key(&output.logical_name) {
            return Err(SchemaError::DuplicateLogicalName {
                name: output.logical_name,
                existing: "output",
            });
        }
        tracing::debug!(output = %output.logical_name, "added output");
        self.template
            .outputs
            .insert(output.logical_name.clone(), output);
        Ok(())
    }

    pub fn build(self) -> Template {
        self.template
    }

    fn check_name_free(&self, name: &str) -> Result<(), SchemaError> {
        check_logical_name(name)?;
        if let Some(existing) = self.names.get(name) {
            return Err(SchemaError::DuplicateLogicalName {
                name: name.to_owned(),
                existing: *existing,
            });
        }
        Ok(())
    }
}

fn check_logical_name(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SchemaError::InvalidLogicalName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

fn check_parameter(p: &Parameter) -> Result<(), SchemaError> {
    let invalid = |field: &'static str, message: String| SchemaError::InvalidParameter {
        parameter: p.logical_name.clone(),
        field,
        message,
    };

    if p.type_ == ParameterType::Number {
        if let Some(default) = &p.default {
            if default.trim().parse::<f64>().is_err() {
                return Err(invalid(
                    "Default",
                    format!("'{}' is not a number", default),
                ));
            }
        }
    }
    if let Some(values) = &p.allowed_values {
        if values.is_empty() {
            return Err(invalid("AllowedValues", "must not be empty".to_owned()));
        }
    }
    Ok(())
}

fn check_mapping_rows(name: &str, rows: &MappingRows) -> Result<(), SchemaError> {
    let mut iter = rows.iter();
    let Some((_, first)) = iter.next() else {
        return Err(SchemaError::EmptyMapping {
            mapping: name.to_owned(),
        });
    };

    let mut expected: Vec<String> = first.keys().cloned().collect();
    expected.sort();
    for (row, columns) in iter {
        let mut found: Vec<String> = columns.keys().cloned().collect();
        found.sort();
        if found != expected {
            return Err(SchemaError::RaggedMapping {
                mapping: name.to_owned(),
                row: row.clone(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn check_resource(r: &Resource) -> Result<(), SchemaError> {
    let kind = r.kind;
    for property in kind.required_properties() {
        match r.properties.get(*property) {
            None | Some(Value::Null) => {
                return Err(SchemaError::MissingProperty {
                    kind: kind.name(),
                    resource: r.logical_name.clone(),
                    property: *property,
                });
            }
            Some(_) => {}
        }
    }

    for (property, allowed) in kind.enumerated_properties() {
        // Intrinsics are resolved at deploy time and cannot be checked here.
        if let Some(Value::String(value)) = r.properties.get(*property) {
            if !allowed.contains(&value.as_str()) {
                return Err(SchemaError::InvalidEnumValue {
                    kind: kind.name(),
                    resource: r.logical_name.clone(),
                    property: *property,
                    value: value.clone(),
                    allowed: allowed.to_vec(),
                });
            }
        }
    }
    Ok(())
}
