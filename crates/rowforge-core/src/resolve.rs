use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::plugin::PluginCatalog;
use crate::schema::RowSchema;

/// Errors detected while resolving a schema's generation order.
///
/// All variants are configuration errors: they are reported before any
/// worker is spawned and abort the run without partial effects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The dependency graph contains a cycle; the ids are one concrete
    /// cycle in walk order.
    #[error("cyclic dependency between plugins: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    /// A bound plugin declares a dependency that no column binds.
    #[error("plugin '{plugin_id}' depends on '{dependency}', which is not bound in the schema")]
    MissingDependency { plugin_id: String, dependency: String },
    /// A column is bound to a plugin id the catalog does not know.
    #[error("column bound to unknown plugin '{0}'")]
    UnknownPlugin(String),
}

/// Compute the column generation order for a schema.
///
/// Returns column indices such that every column appears after all columns
/// it depends on. Ties resolve to the leftmost schema column, so identical
/// schemas always produce identical orders.
pub fn resolve(schema: &RowSchema, catalog: &PluginCatalog) -> Result<Vec<usize>, ResolveError> {
    let mut columns_by_plugin: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (col, binding) in schema.columns.iter().enumerate() {
        columns_by_plugin
            .entry(binding.plugin_id.as_str())
            .or_default()
            .push(col);
    }

    for binding in &schema.columns {
        let descriptor = catalog
            .get(&binding.plugin_id)
            .ok_or_else(|| ResolveError::UnknownPlugin(binding.plugin_id.clone()))?;
        for dependency in &descriptor.dependencies {
            if !columns_by_plugin.contains_key(dependency.as_str()) {
                return Err(ResolveError::MissingDependency {
                    plugin_id: binding.plugin_id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    let count = schema.columns.len();
    let mut deps_of: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
    for (col, binding) in schema.columns.iter().enumerate() {
        if let Some(descriptor) = catalog.get(&binding.plugin_id) {
            for dependency in &descriptor.dependencies {
                if let Some(targets) = columns_by_plugin.get(dependency.as_str()) {
                    deps_of[col].extend(targets.iter().copied());
                }
            }
        }
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut indegree: Vec<usize> = vec![0; count];
    for (col, deps) in deps_of.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(col);
            indegree[col] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&col| indegree[col] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(col) = ready.iter().next().copied() {
        ready.remove(&col);
        order.push(col);
        for &dependent in &dependents[col] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == count {
        return Ok(order);
    }

    let unresolved: BTreeSet<usize> = (0..count).filter(|&col| indegree[col] > 0).collect();
    let cycle = find_cycle(&deps_of, &unresolved);
    let mut ids = Vec::new();
    for col in cycle {
        let id = schema.columns[col].plugin_id.clone();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Err(ResolveError::CyclicDependency(ids))
}

/// Extract one concrete cycle from the unresolved columns.
///
/// Iterative depth-first walk with three-color state: 0 unvisited, 1 on the
/// current path, 2 done. Hitting a color-1 column closes a cycle; the cycle
/// is the path suffix starting at that column.
fn find_cycle(deps_of: &[BTreeSet<usize>], unresolved: &BTreeSet<usize>) -> Vec<usize> {
    let mut color = vec![0u8; deps_of.len()];

    for &start in unresolved {
        if color[start] != 0 {
            continue;
        }
        color[start] = 1;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(&(node, next_dep)) = stack.last() {
            match deps_of[node].iter().nth(next_dep).copied() {
                None => {
                    color[node] = 2;
                    stack.pop();
                }
                Some(next) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    if !unresolved.contains(&next) {
                        continue;
                    }
                    match color[next] {
                        0 => {
                            color[next] = 1;
                            stack.push((next, 0));
                        }
                        1 => {
                            if let Some(pos) = stack.iter().position(|&(n, _)| n == next) {
                                return stack[pos..].iter().map(|&(n, _)| n).collect();
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Vec::new()
}
