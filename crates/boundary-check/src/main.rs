use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{Context, Result};
use cargo_metadata::{DependencyKind, Metadata, MetadataCommand, PackageId};

struct Boundary {
    package: &'static str,
    forbidden: &'static [&'static str],
}

/// Layering of the workspace: the record model stays free of I/O, and
/// neither the store nor the identity gate reaches into the other or into
/// the HTTP surface.
const BOUNDARIES: &[Boundary] = &[
    Boundary {
        package: "lai-contracts",
        forbidden: &[
            "axum",
            "jsonwebtoken",
            "lai-auth",
            "lai-store",
            "reqwest",
            "sqlx",
            "tokio",
        ],
    },
    Boundary {
        package: "lai-store",
        forbidden: &["axum", "lai-auth", "lai-gateway", "reqwest"],
    },
    Boundary {
        package: "lai-auth",
        forbidden: &["lai-contracts", "lai-gateway", "lai-store", "sqlx"],
    },
];

fn main() -> Result<()> {
    let metadata = MetadataCommand::new()
        .exec()
        .context("failed to run `cargo metadata`")?;

    let mut failed = false;
    for boundary in BOUNDARIES {
        let violations = violations(&metadata, boundary)?;
        if violations.is_empty() {
            println!(
                "OK: `{}` has no dependency edge to {}",
                boundary.package,
                boundary.forbidden.join(", ")
            );
        } else {
            eprintln!(
                "FAIL: `{}` depends on forbidden crate(s): {}",
                boundary.package,
                violations.join(", ")
            );
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Walks the normal and build dependency closure of `boundary.package`.
/// Dev-dependencies are test tooling and stay out of the walk.
fn violations(metadata: &Metadata, boundary: &Boundary) -> Result<Vec<String>> {
    let resolve = metadata
        .resolve
        .as_ref()
        .context("`cargo metadata` did not include a resolved dependency graph")?;

    let root = metadata
        .packages
        .iter()
        .find(|p| p.name == boundary.package)
        .with_context(|| format!("package `{}` not found in workspace", boundary.package))?;

    let id_to_name: HashMap<&PackageId, &str> = metadata
        .packages
        .iter()
        .map(|p| (&p.id, p.name.as_str()))
        .collect();

    let adjacency: HashMap<&PackageId, Vec<&PackageId>> = resolve
        .nodes
        .iter()
        .map(|node| {
            let deps = node
                .deps
                .iter()
                .filter(|dep| {
                    dep.dep_kinds
                        .iter()
                        .any(|info| info.kind != DependencyKind::Development)
                })
                .map(|dep| &dep.pkg)
                .collect();
            (&node.id, deps)
        })
        .collect();

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(&root.id);
    visited.insert(&root.id);

    let mut violations = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(deps) = adjacency.get(current) else {
            continue;
        };

        for dep in deps.iter().copied() {
            if !visited.insert(dep) {
                continue;
            }

            if let Some(name) = id_to_name.get(dep)
                && boundary.forbidden.contains(name)
            {
                violations.push((*name).to_string());
            }

            queue.push_back(dep);
        }
    }

    violations.sort();
    violations.dedup();
    Ok(violations)
}
