//! Existence checks for every intrinsic reachable from the template.

use crate::error::{TargetKind, ValidationError};
use crate::model::*;

pub(super) fn check_template(template: &Template, errors: &mut Vec<ValidationError>) {
    for r in template.resources.values() {
        let base = format!("Resources.{}", r.logical_name);
        for (i, dep) in r.depends_on.iter().enumerate() {
            if !template.resources.contains_key(dep) {
                errors.push(ValidationError::ReferenceNotFound {
                    at: format!("{}.DependsOn[{}]", base, i),
                    target: TargetKind::Resource,
                    name: dep.clone(),
                });
            }
        }
        if let Some(metadata) = &r.metadata {
            check_value(metadata, &format!("{}.Metadata", base), template, errors);
        }
        for (name, value) in &r.properties {
            check_value(
                value,
                &format!("{}.Properties.{}", base, name),
                template,
                errors,
            );
        }
    }

    for o in template.outputs.values() {
        let base = format!("Outputs.{}", o.logical_name);
        check_value(&o.value, &format!("{}.Value", base), template, errors);
        if let Some(export) = &o.export_name {
            check_value(export, &format!("{}.Export.Name", base), template, errors);
        }
    }
}

fn check_value(value: &Value, at: &str, template: &Template, errors: &mut Vec<ValidationError>) {
    match value {
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                check_value(item, &format!("{}[{}]", at, i), template, errors);
            }
        }
        Value::Map(entries) => {
            if let (1, Some(function)) = (entries.len(), entries.keys().next()) {
                if is_intrinsic_key(function) {
                    errors.push(ValidationError::UnsupportedIntrinsic {
                        at: at.to_owned(),
                        function: function.clone(),
                    });
                }
            }
            for (k, v) in entries {
                check_value(v, &format!("{}.{}", at, k), template, errors);
            }
        }
        Value::Intrinsic(intrinsic) => check_intrinsic(intrinsic, at, template, errors),
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::UInt(_)
        | Value::Float(_)
        | Value::String(_) => {}
    }
}

fn check_intrinsic(
    intrinsic: &Intrinsic,
    at: &str,
    template: &Template,
    errors: &mut Vec<ValidationError>,
) {
    match intrinsic {
        // Parameters and resources share one namespace and render to the
        // same `Ref`, so either variant may name either kind.
        Intrinsic::ParameterRef(name) => {
            if !is_ref_target(template, name) {
                errors.push(not_found(at, TargetKind::Parameter, name));
            }
        }
        Intrinsic::ResourceRef(name) => {
            if !is_ref_target(template, name) {
                errors.push(not_found(at, TargetKind::Resource, name));
            }
        }
        Intrinsic::Pseudo(_) | Intrinsic::GetAZs(_) => {}
        Intrinsic::FindInMap {
            mapping,
            top_key,
            column,
        } => {
            let Some(m) = template.mappings.get(mapping) else {
                errors.push(not_found(at, TargetKind::Mapping, mapping));
                check_value(top_key, at, template, errors);
                return;
            };
            match top_key {
                Value::String(key) => {
                    if !m.rows.contains_key(key) {
                        errors.push(ValidationError::UnknownMapKey {
                            at: at.to_owned(),
                            mapping: mapping.clone(),
                            key: key.clone(),
                        });
                    }
                }
                other => check_value(other, at, template, errors),
            }
            if !m.has_column(column) {
                errors.push(ValidationError::UnknownMapColumn {
                    at: at.to_owned(),
                    mapping: mapping.clone(),
                    column: column.clone(),
                });
            }
        }
        Intrinsic::GetAtt {
            resource,
            attribute,
        } => match template.resources.get(resource) {
            None => errors.push(not_found(at, TargetKind::Resource, resource)),
            Some(r) => {
                if !r.kind.attributes().contains(&attribute.as_str()) {
                    errors.push(ValidationError::UnknownAttribute {
                        at: at.to_owned(),
                        resource: resource.clone(),
                        kind: r.kind.name(),
                        attribute: attribute.clone(),
                    });
                }
            }
        },
        Intrinsic::Join { parts, .. } => {
            for (i, part) in parts.iter().enumerate() {
                check_value(part, &format!("{}[{}]", at, i), template, errors);
            }
        }
        Intrinsic::Base64(inner) => check_value(inner, at, template, errors),
    }
}

fn is_ref_target(template: &Template, name: &str) -> bool {
    template.parameters.contains_key(name) || template.resources.contains_key(name)
}

fn not_found(at: &str, target: TargetKind, name: &str) -> ValidationError {
    ValidationError::ReferenceNotFound {
        at: at.to_owned(),
        target,
        name: name.to_owned(),
    }
}
