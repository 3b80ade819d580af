//! Dependency closure over the catalog.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::catalog::{Catalog, ComponentId};
use crate::resolver::errors;
use crate::util::diagnostic::Diagnostics;

/// The selection expanded with transitive dependencies and required components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSet {
    ids: BTreeSet<ComponentId>,
    selected: BTreeSet<ComponentId>,
    /// `(owner, dependency)` edges whose target is not in the catalog.
    dangling: BTreeSet<(ComponentId, ComponentId)>,
}

impl ResolvedSet {
    /// Every resolved id, sorted.
    pub fn ids(&self) -> &BTreeSet<ComponentId> {
        &self.ids
    }

    /// The ids the caller asked for.
    pub fn selected(&self) -> &BTreeSet<ComponentId> {
        &self.selected
    }

    /// Ids pulled in by dependencies or the `required` flag.
    pub fn implied(&self) -> impl Iterator<Item = &ComponentId> {
        self.ids.difference(&self.selected)
    }

    pub fn dangling(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dangling.iter().map(|(o, d)| (o.as_str(), d.as_str()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// One note per dangling dependency edge.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for (owner, dep) in self.dangling() {
            diags.push(errors::dangling_dependency(owner, dep));
        }
        diags
    }
}

/// Compute the dependency closure of `selected`.
///
/// Worklist over a visited set: an id is expanded at most once, so cyclic
/// manifests terminate. Ids with no catalog entry are kept as leaves. Every
/// `required` component is added whether or not anything reaches it.
pub fn resolve(catalog: &Catalog, selected: &BTreeSet<ComponentId>) -> ResolvedSet {
    let mut result = ResolvedSet {
        selected: selected.clone(),
        ..Default::default()
    };

    let mut work: Vec<ComponentId> = selected.iter().cloned().collect();
    work.extend(catalog.required().map(|c| c.id.clone()));

    while let Some(id) = work.pop() {
        if !result.ids.insert(id.clone()) {
            continue;
        }
        let Some(component) = catalog.get(&id) else {
            continue;
        };
        for dep in &component.dependencies {
            if !catalog.contains(dep) {
                result.dangling.insert((id.clone(), dep.clone()));
            }
            if !result.ids.contains(dep) {
                work.push(dep.clone());
            }
        }
    }

    tracing::debug!(
        "resolved {} selected subsystem(s) to {}",
        result.selected.len(),
        result.ids.len()
    );
    result
}

/// Keep only ids the catalog knows; the rest become `UnknownComponent` warnings.
pub fn validate(
    catalog: &Catalog,
    ids: &BTreeSet<ComponentId>,
) -> (BTreeSet<ComponentId>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut valid = BTreeSet::new();
    let mut available = None;

    for id in ids {
        if catalog.contains(id) {
            valid.insert(id.clone());
        } else {
            let available = available.get_or_insert_with(|| catalog.all_ids());
            diags.push(errors::unknown_component(id, available));
        }
    }

    (valid, diags)
}
