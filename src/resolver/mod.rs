//! Selection resolution.
//!
//! Pure and deterministic: migrate the user's ids, drop the ones the catalog
//! does not know, then take the dependency closure. All I/O happens before.

pub mod errors;
pub mod migration;
pub mod resolve;

pub use migration::{Migrated, MigrationPolicy, MigrationRule};
pub use resolve::{resolve, validate, ResolvedSet};

use std::collections::BTreeSet;

use crate::core::catalog::{Catalog, ComponentId};
use crate::util::diagnostic::Diagnostics;

/// Everything learned while turning a selection into a resolved set.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub migrated: Migrated,
    /// Selection after migration and validation; the input to [`resolve`].
    pub valid: BTreeSet<ComponentId>,
    pub resolved: ResolvedSet,
    pub diagnostics: Diagnostics,
}

/// Migrate, validate and resolve in one pass.
pub fn resolve_selection(
    catalog: &Catalog,
    selected: &BTreeSet<ComponentId>,
    policy: &MigrationPolicy,
) -> Resolution {
    let migrated = policy.apply(selected);
    let (valid, unknown) = validate(catalog, &migrated.ids);
    let resolved = resolve(catalog, &valid);

    let mut diagnostics = migrated.diagnostics.clone();
    diagnostics.extend(unknown);
    diagnostics.extend(resolved.diagnostics());

    Resolution {
        migrated,
        valid,
        resolved,
        diagnostics,
    }
}
