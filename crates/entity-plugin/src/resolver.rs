//! Dependency resolver — orders plugins so every dependency activates first.
//!
//! Kahn's algorithm over the dependency graph. The ready set is ordered by
//! identity, so plugins without an ordering constraint between them come out
//! in ascending identity order and identical input always yields identical
//! output.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;

/// Produces an activation order for the given descriptors.
///
/// Fails with `MissingDependency` when a dependency is absent or its version
/// is outside the declared range, and with `CycleDetected` when the graph is
/// not acyclic. Missing dependencies are reported first.
pub fn resolve<'a, I>(descriptors: I) -> Result<Vec<String>, PluginError>
where
    I: IntoIterator<Item = &'a PluginDescriptor>,
{
    let mut nodes: BTreeMap<&str, &PluginDescriptor> = BTreeMap::new();
    for descriptor in descriptors {
        descriptor.validate()?;
        if nodes.insert(&descriptor.identity, descriptor).is_some() {
            return Err(PluginError::DuplicateIdentity {
                identity: descriptor.identity.clone(),
            });
        }
    }

    for (identity, descriptor) in &nodes {
        for (dependency, range) in &descriptor.dependencies {
            let satisfied = nodes
                .get(dependency.as_str())
                .is_some_and(|target| range.matches(&target.version));
            if !satisfied {
                return Err(PluginError::MissingDependency {
                    dependent: identity.to_string(),
                    identity: dependency.clone(),
                    range: range.clone(),
                });
            }
        }
    }

    let mut pending: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::with_capacity(nodes.len());
    for (identity, descriptor) in &nodes {
        pending.insert(identity, descriptor.dependencies.len());
        for dependency in descriptor.dependencies.keys() {
            dependents
                .entry(dependency.as_str())
                .or_default()
                .push(identity);
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(identity, _)| *identity)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(identity) = ready.pop_first() {
        order.push(identity.to_string());
        for dependent in dependents.get(identity).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let remaining: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(identity, _)| *identity)
            .collect();
        return Err(PluginError::CycleDetected {
            cycle: find_cycle(&nodes, &remaining),
        });
    }

    Ok(order)
}

/// Walks unresolved dependency edges from the smallest unresolved identity
/// until a node repeats. Every unresolved node has at least one unresolved
/// dependency, so the walk always closes a cycle.
fn find_cycle(
    nodes: &BTreeMap<&str, &PluginDescriptor>,
    remaining: &BTreeSet<&str>,
) -> Vec<String> {
    let mut path: Vec<&str> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut current = remaining.first().copied();

    while let Some(identity) = current {
        if let Some(&start) = position.get(identity) {
            return path[start..].iter().map(|s| s.to_string()).collect();
        }
        position.insert(identity, path.len());
        path.push(identity);
        current = nodes.get(identity).and_then(|descriptor| {
            descriptor
                .dependencies
                .keys()
                .map(String::as_str)
                .find(|dependency| remaining.contains(dependency))
        });
    }

    path.into_iter().map(str::to_string).collect()
}
