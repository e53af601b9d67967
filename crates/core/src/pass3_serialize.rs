//! Pass 3: JSON serialization -- render a validated template in insertion
//! order, with intrinsics as single-key objects.

use crate::error::SerializationError;
use crate::model::*;
use crate::pass2_validate::ValidatedTemplate;
use serde_json::{json, Map, Number};

type Json = serde_json::Value;

/// Pretty-printed JSON text with a trailing newline.
pub fn serialize(validated: &ValidatedTemplate) -> Result<String, SerializationError> {
    let value = to_json_value(validated)?;
    let mut text = serde_json::to_string_pretty(&value)
        .unwrap_or_else(|e| unreachable!("in-memory JSON values always serialize: {}", e));
    text.push('\n');
    Ok(text)
}

pub fn to_json_value(validated: &ValidatedTemplate) -> Result<Json, SerializationError> {
    let t = validated.template();
    let mut doc = Map::new();
    doc.insert(
        "AWSTemplateFormatVersion".to_owned(),
        json!(t.format_version),
    );
    if let Some(d) = &t.description {
        doc.insert("Description".to_owned(), json!(d));
    }

    let mut parameters = Map::new();
    for p in t.parameters.values() {
        parameters.insert(p.logical_name.clone(), serialize_parameter(p));
    }
    doc.insert("Parameters".to_owned(), Json::Object(parameters));

    let mut mappings = Map::new();
    for m in t.mappings.values() {
        let base = format!("Mappings.{}", m.name);
        let mut rows = Map::new();
        for (key, columns) in &m.rows {
            let mut row = Map::new();
            for (column, value) in columns {
                let at = format!("{}.{}.{}", base, key, column);
                row.insert(column.clone(), serialize_value(value, &at)?);
            }
            rows.insert(key.clone(), Json::Object(row));
        }
        mappings.insert(m.name.clone(), Json::Object(rows));
    }
    doc.insert("Mappings".to_owned(), Json::Object(mappings));

    let mut resources = Map::new();
    for r in t.resources.values() {
        resources.insert(r.logical_name.clone(), serialize_resource(r)?);
    }
    doc.insert("Resources".to_owned(), Json::Object(resources));

    if !t.outputs.is_empty() {
        let mut outputs = Map::new();
        for o in t.outputs.values() {
            outputs.insert(o.logical_name.clone(), serialize_output(o)?);
        }
        doc.insert("Outputs".to_owned(), Json::Object(outputs));
    }

    Ok(Json::Object(doc))
}

fn serialize_parameter(p: &Parameter) -> Json {
    let mut m = Map::new();
    m.insert("Type".to_owned(), json!(p.type_.as_str()));
    if let Some(d) = &p.default {
        m.insert("Default".to_owned(), json!(d));
    }
    if let Some(d) = &p.description {
        m.insert("Description".to_owned(), json!(d));
    }
    if let Some(values) = &p.allowed_values {
        m.insert("AllowedValues".to_owned(), json!(values));
    }
    if let Some(c) = &p.constraint_description {
        m.insert("ConstraintDescription".to_owned(), json!(c));
    }
    Json::Object(m)
}

fn serialize_resource(r: &Resource) -> Result<Json, SerializationError> {
    let base = format!("Resources.{}", r.logical_name);
    let mut m = Map::new();
    m.insert("Type".to_owned(), json!(r.kind.type_name()));
    match r.depends_on.as_slice() {
        [] => {}
        [single] => {
            m.insert("DependsOn".to_owned(), json!(single));
        }
        many => {
            m.insert("DependsOn".to_owned(), json!(many));
        }
    }
    if let Some(metadata) = &r.metadata {
        m.insert(
            "Metadata".to_owned(),
            serialize_value(metadata, &format!("{}.Metadata", base))?,
        );
    }
    let mut props = Map::new();
    for (name, value) in &r.properties {
        let at = format!("{}.Properties.{}", base, name);
        props.insert(name.clone(), serialize_value(value, &at)?);
    }
    m.insert("Properties".to_owned(), Json::Object(props));
    Ok(Json::Object(m))
}

fn serialize_output(o: &Output) -> Result<Json, SerializationError> {
    let base = format!("Outputs.{}", o.logical_name);
    let mut m = Map::new();
    if let Some(d) = &o.description {
        m.insert("Description".to_owned(), json!(d));
    }
    m.insert(
        "Value".to_owned(),
        serialize_value(&o.value, &format!("{}.Value", base))?,
    );
    if let Some(name) = &o.export_name {
        let name = serialize_value(name, &format!("{}.Export.Name", base))?;
        m.insert("Export".to_owned(), json!({ "Name": name }));
    }
    Ok(Json::Object(m))
}

pub(crate) fn serialize_value(value: &Value, at: &str) -> Result<Json, SerializationError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::Number((*n).into()),
        Value::UInt(n) => Json::Number((*n).into()),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => Json::Number(n),
            None => {
                return Err(SerializationError::NonFiniteNumber {
                    at: at.to_owned(),
                    value: *f,
                })
            }
        },
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(serialize_value(item, &format!("{}[{}]", at, i))?);
            }
            Json::Array(out)
        }
        Value::Map(entries) => {
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), serialize_value(v, &format!("{}.{}", at, k))?);
            }
            Json::Object(out)
        }
        Value::Intrinsic(intrinsic) => serialize_intrinsic(intrinsic, at)?,
    })
}

fn serialize_intrinsic(intrinsic: &Intrinsic, at: &str) -> Result<Json, SerializationError> {
    Ok(match intrinsic {
        Intrinsic::ParameterRef(name) | Intrinsic::ResourceRef(name) => json!({ "Ref": name }),
        Intrinsic::Pseudo(p) => json!({ "Ref": p.name() }),
        Intrinsic::FindInMap {
            mapping,
            top_key,
            column,
        } => {
            let key = serialize_value(top_key, at)?;
            json!({ "Fn::FindInMap": [mapping, key, column] })
        }
        Intrinsic::GetAtt {
            resource,
            attribute,
        } => json!({ "Fn::GetAtt": [resource, attribute] }),
        Intrinsic::GetAZs(region) => json!({ "Fn::GetAZs": region }),
        Intrinsic::Join { delimiter, parts } => {
            let mut rendered = Vec::with_capacity(parts.len());
            for (i, part) in parts.iter().enumerate() {
                rendered.push(serialize_value(part, &format!("{}[{}]", at, i))?);
            }
            json!({ "Fn::Join": [delimiter, rendered] })
        }
        Intrinsic::Base64(inner) => {
            let encoded = serialize_value(inner, at)?;
            json!({ "Fn::Base64": encoded })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1_build::TemplateBuilder;
    use crate::pass2_validate::validate;
    use indexmap::IndexMap;

    fn scenario() -> ValidatedTemplate {
        let mut b = TemplateBuilder::new();
        b.description("scenario");
        b.add_parameter(Parameter::new("KeyName", ParameterType::String))
            .unwrap();
        let mut row = IndexMap::new();
        row.insert("AMIid".to_string(), Value::from("ami-1234"));
        let mut rows = MappingRows::new();
        rows.insert("us-east-1".to_string(), row);
        let region_map = b.add_mapping("RegionMap", rows).unwrap();
        b.add_resource(
            Resource::new("LaunchConfig", ResourceKind::LaunchConfiguration)
                .property(
                    "ImageId",
                    region_map.find(Value::pseudo(PseudoParameter::Region), "AMIid"),
                )
                .property("InstanceType", "t2.micro"),
        )
        .unwrap();
        validate(b.build()).unwrap()
    }

    #[test]
    fn find_in_map_renders_as_intrinsic_call() {
        let doc = to_json_value(&scenario()).unwrap();
        assert_eq!(
            doc["Resources"]["LaunchConfig"]["Properties"]["ImageId"],
            json!({"Fn::FindInMap": ["RegionMap", {"Ref": "AWS::Region"}, "AMIid"]})
        );
        assert_eq!(
            doc["Resources"]["LaunchConfig"]["Type"],
            json!("AWS::AutoScaling::LaunchConfiguration")
        );
    }

    #[test]
    fn top_level_keys_follow_the_fixed_order() {
        let doc = to_json_value(&scenario()).unwrap();
        let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "AWSTemplateFormatVersion",
                "Description",
                "Parameters",
                "Mappings",
                "Resources"
            ]
        );
    }

    #[test]
    fn serialization_is_deterministic() {
        let v = scenario();
        let a = serialize(&v).unwrap();
        let b = serialize(&v).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with("}\n"));
    }

    #[test]
    fn intrinsics_render_in_native_syntax() {
        let user_data = Value::base64(Value::join(
            "",
            [
                Value::from("--stack "),
                Value::pseudo(PseudoParameter::StackName),
            ],
        ));
        assert_eq!(
            serialize_value(&user_data, "x").unwrap(),
            json!({"Fn::Base64": {"Fn::Join": ["", ["--stack ", {"Ref": "AWS::StackName"}]]}})
        );
        assert_eq!(
            serialize_value(&Value::get_azs(""), "x").unwrap(),
            json!({"Fn::GetAZs": ""})
        );
        assert_eq!(
            serialize_value(&Value::get_att("IAMRole", "Arn"), "x").unwrap(),
            json!({"Fn::GetAtt": ["IAMRole", "Arn"]})
        );
    }

    #[test]
    fn large_unsigned_integers_render_exactly() {
        assert_eq!(
            serialize_value(&Value::UInt(u64::MAX), "x").unwrap(),
            json!(u64::MAX)
        );
    }

    #[test]
    fn strings_are_escaped() {
        let text = serde_json::to_string(
            &serialize_value(&Value::from("#!/bin/bash\n\"quoted\""), "x").unwrap(),
        )
        .unwrap();
        assert_eq!(text, r##""#!/bin/bash\n\"quoted\"""##);
    }

    #[test]
    fn non_finite_float_is_a_serialization_error() {
        let err = serialize_value(&Value::List(vec![Value::Float(f64::NAN)]), "Resources.X.Properties.Threshold")
            .unwrap_err();
        assert!(matches!(
            err,
            SerializationError::NonFiniteNumber { ref at, .. } if at == "Resources.X.Properties.Threshold[0]"
        ));
    }

    #[test]
    fn single_depends_on_renders_as_string() {
        let mut b = TemplateBuilder::new();
        let role = Resource::new("IAMRole", ResourceKind::Role)
            .property("Path", "/")
            .property("AssumeRolePolicyDocument", json!({"Version": "2012-10-17"}));
        b.add_resource(role).unwrap();
        b.add_resource(
            Resource::new("Profile", ResourceKind::InstanceProfile)
                .property("Path", "/")
                .property("Roles", vec![Value::from("static-role")])
                .depends_on("IAMRole"),
        )
        .unwrap();
        b.add_output(
            Output::new("RoleArn", Value::get_att("IAMRole", "Arn"))
                .description("role")
                .export_name(Value::join("-", [Value::pseudo(PseudoParameter::StackName), "Role".into()])),
        )
        .unwrap();
        let doc = to_json_value(&validate(b.build()).unwrap()).unwrap();
        assert_eq!(doc["Resources"]["Profile"]["DependsOn"], json!("IAMRole"));
        assert_eq!(
            doc["Outputs"]["RoleArn"],
            json!({
                "Description": "role",
                "Value": {"Fn::GetAtt": ["IAMRole", "Arn"]},
                "Export": {"Name": {"Fn::Join": ["-", [{"Ref": "AWS::StackName"}, "Role"]]}}
            })
        );
    }
}
