//! Resource dependency graph and cycle detection.
//!
//! Edges run from a resource to every resource it names through `Ref`,
//! `Fn::GetAtt` or `DependsOn`. Parameters and mappings are leaves. A `Ref`
//! counts whichever variant built it, since both resolve by name.

use crate::error::ValidationError;
use crate::model::*;
use std::collections::{HashMap, HashSet};

/// Resources `r` depends on, in first-mention order, without duplicates.
/// Names that are not declared resources are skipped; the existence pass
/// reports those.
pub(crate) fn resource_dependencies<'a>(r: &'a Resource, template: &Template) -> Vec<&'a str> {
    let mut out: Vec<&'a str> = Vec::new();
    for dep in &r.depends_on {
        out.push(dep.as_str());
    }
    if let Some(metadata) = &r.metadata {
        collect_resource_names(metadata, &mut out);
    }
    for value in r.properties.values() {
        collect_resource_names(value, &mut out);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    out.retain(|name| template.resources.contains_key(*name) && seen.insert(*name));
    out
}

fn collect_resource_names<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::List(items) => {
            for item in items {
                collect_resource_names(item, out);
            }
        }
        Value::Map(entries) => {
            for v in entries.values() {
                collect_resource_names(v, out);
            }
        }
        Value::Intrinsic(intrinsic) => match intrinsic.as_ref() {
            Intrinsic::ResourceRef(name) | Intrinsic::ParameterRef(name) => out.push(name.as_str()),
            Intrinsic::GetAtt { resource, .. } => out.push(resource.as_str()),
            Intrinsic::FindInMap { top_key, .. } => collect_resource_names(top_key, out),
            Intrinsic::Join { parts, .. } => {
                for part in parts {
                    collect_resource_names(part, out);
                }
            }
            Intrinsic::Base64(inner) => collect_resource_names(inner, out),
            Intrinsic::Pseudo(_) | Intrinsic::GetAZs(_) => {}
        },
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::UInt(_)
        | Value::Float(_)
        | Value::String(_) => {}
    }
}

/// Returns the first cycle found, walking resources in insertion order.
pub(super) fn detect_resource_cycle(template: &Template) -> Result<(), ValidationError> {
    let graph: HashMap<&str, Vec<&str>> = template
        .resources
        .values()
        .map(|r| (r.logical_name.as_str(), resource_dependencies(r, template)))
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut in_path: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();

    for name in template.resources.keys() {
        if !visited.contains(name.as_str()) {
            dfs(name.as_str(), &graph, &mut visited, &mut in_path, &mut path)?;
        }
    }
    Ok(())
}

fn dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    in_path: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Result<(), ValidationError> {
    path.push(node);
    in_path.insert(node);

    for &next in graph.get(node).map(Vec::as_slice).unwrap_or_default() {
        if in_path.contains(next) {
            let start = path.iter().position(|&n| n == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(next.to_string());
            return Err(ValidationError::CyclicReference { cycle });
        }
        if !visited.contains(next) {
            dfs(next, graph, visited, in_path, path)?;
        }
    }

    in_path.remove(node);
    visited.insert(node);
    path.pop();
    Ok(())
}
