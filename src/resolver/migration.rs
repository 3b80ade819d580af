//! Renamed and removed subsystem ids.
//!
//! Saved selections outlive manifest revisions. Before a selection is checked
//! against the catalog, every id goes through the migration table once.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::catalog::ComponentId;
use crate::resolver::errors;
use crate::util::diagnostic::Diagnostics;

/// What happened to an old id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationRule {
    /// The component now lives under a different id.
    Renamed(ComponentId),
    /// The component no longer exists; the user has to pick a replacement.
    Removed { hint: Option<String> },
}

/// Output of [`MigrationPolicy::apply`].
#[derive(Debug, Clone, Default)]
pub struct Migrated {
    /// Ids after substitution, removed ids dropped.
    pub ids: BTreeSet<ComponentId>,
    /// `(old, new)` pairs that were substituted.
    pub renamed: Vec<(ComponentId, ComponentId)>,
    /// Ids that were dropped.
    pub removed: Vec<ComponentId>,
    pub diagnostics: Diagnostics,
}

/// A fixed `old id -> new id | removed` table.
#[derive(Debug, Clone, Default)]
pub struct MigrationPolicy {
    rules: BTreeMap<ComponentId, MigrationRule>,
}

impl MigrationPolicy {
    /// A policy with no rules; every id passes through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The migrations shipped with the current manifest layout.
    pub fn builtin() -> Self {
        Self::empty()
            .with_rule(
                "DRIVERS",
                MigrationRule::Removed {
                    hint: Some("select the specific driver subsystems instead".to_string()),
                },
            )
            .with_rule("KEYBOARD", MigrationRule::Renamed("PS2_KEYBOARD".to_string()))
            .with_rule("AUDIO", MigrationRule::Renamed("AUDIO_SB16".to_string()))
    }

    pub fn with_rule(mut self, old: impl Into<ComponentId>, rule: MigrationRule) -> Self {
        self.rules.insert(old.into(), rule);
        self
    }

    pub fn rule_for(&self, id: &str) -> Option<&MigrationRule> {
        self.rules.get(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the table to a set of selected ids.
    ///
    /// Each id is looked up once; rename targets are not migrated again.
    pub fn apply(&self, selected: &BTreeSet<ComponentId>) -> Migrated {
        let mut out = Migrated::default();

        for id in selected {
            match self.rules.get(id) {
                None => {
                    out.ids.insert(id.clone());
                }
                Some(MigrationRule::Renamed(new)) => {
                    tracing::debug!("migrating subsystem {} -> {}", id, new);
                    out.diagnostics.push(errors::migrated_component(id, new));
                    out.renamed.push((id.clone(), new.clone()));
                    out.ids.insert(new.clone());
                }
                Some(MigrationRule::Removed { hint }) => {
                    tracing::debug!("dropping removed subsystem {}", id);
                    out.diagnostics
                        .push(errors::removed_component(id, hint.as_deref()));
                    out.removed.push(id.clone());
                }
            }
        }

        out
    }
}
