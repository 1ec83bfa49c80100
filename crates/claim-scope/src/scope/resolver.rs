//! Dependency resolution over matched rules.
//!
//! Candidates are processed through a FIFO worklist. Accepting a rule pulls
//! in its auto-adds and applies its exclusions to both the accepted set and
//! everything still queued. Orphan repair then re-homes or removes
//! auto-added items whose trigger did not survive. The closing replacement
//! pass drops generic items that a more specific present item supersedes,
//! but only when the specific item is still in scope once the removal has
//! settled.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use super::catalog::{LineItemRule, RuleId, ScopeCatalog};

/// A rule that survived resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedItem {
    pub rule: RuleId,
    pub is_auto_added: bool,
    /// Present in the final set whenever `is_auto_added` is true.
    pub added_by: Option<RuleId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionKind {
    Excluded,
    Replaced,
    Orphaned,
}

impl ExclusionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excluded => "excluded",
            Self::Replaced => "replaced",
            Self::Orphaned => "orphaned",
        }
    }
}

/// A rule that matched or was auto-added but is not part of the final scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedItem {
    pub code: String,
    pub description: String,
    pub excluded_by: String,
    pub kind: ExclusionKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub items: Vec<ResolvedItem>,
    pub excluded: Vec<ExcludedItem>,
}

impl Resolution {
    pub fn contains(&self, rule: RuleId) -> bool {
        self.items.iter().any(|item| item.rule == rule)
    }

    pub fn codes<'c>(&self, catalog: &'c ScopeCatalog) -> Vec<&'c str> {
        self.items
            .iter()
            .map(|item| catalog.rule(item.rule).code.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("resolver exceeded {limit} iterations at rule '{code}'; the catalog likely contains an auto-add cycle")]
    CatalogCycle { limit: usize, code: String },
}

/// Resolves matched candidates into the final ordered scope.
///
/// `candidates` must already be in processing order (see
/// [`match_rules`](super::matcher::match_rules)). Fails only when the
/// worklist is popped more than `max_iterations` times.
pub fn resolve(
    candidates: &[&LineItemRule],
    catalog: &ScopeCatalog,
    max_iterations: usize,
) -> Result<Resolution, ScopeError> {
    let mut resolver = Resolver::new(catalog);
    resolver.run(candidates, max_iterations)?;
    resolver.repair_orphans();
    resolver.apply_replacements();
    Ok(Resolution {
        items: resolver.items,
        excluded: resolver.excluded,
    })
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    rule: RuleId,
    added_by: Option<RuleId>,
}

#[derive(Clone)]
struct Resolver<'c> {
    catalog: &'c ScopeCatalog,
    items: Vec<ResolvedItem>,
    present: HashSet<RuleId>,
    /// Excluded rule -> the accepted rule that excluded it.
    suppressed: HashMap<RuleId, RuleId>,
    excluded: Vec<ExcludedItem>,
    recorded: HashSet<RuleId>,
}

impl<'c> Resolver<'c> {
    fn new(catalog: &'c ScopeCatalog) -> Self {
        Self {
            catalog,
            items: Vec::new(),
            present: HashSet::new(),
            suppressed: HashMap::new(),
            excluded: Vec::new(),
            recorded: HashSet::new(),
        }
    }

    fn run(&mut self, candidates: &[&LineItemRule], max_iterations: usize) -> Result<(), ScopeError> {
        let catalog = self.catalog;
        let mut worklist: VecDeque<Pending> = candidates
            .iter()
            .map(|rule| Pending {
                rule: rule.id,
                added_by: None,
            })
            .collect();
        let mut iterations = 0usize;

        while let Some(pending) = worklist.pop_front() {
            iterations += 1;
            if iterations > max_iterations {
                let code = catalog.rule(pending.rule).code.clone();
                warn!(limit = max_iterations, code = %code, "resolver iteration cap reached");
                return Err(ScopeError::CatalogCycle {
                    limit: max_iterations,
                    code,
                });
            }

            if self.present.contains(&pending.rule) {
                continue;
            }

            if let Some(&excluder) = self.suppressed.get(&pending.rule) {
                let reason = excluded_reason(catalog.rule(excluder));
                self.record(pending.rule, excluder, ExclusionKind::Excluded, reason);
                continue;
            }

            if pending.added_by.is_none() {
                let edges = catalog.edges(pending.rule);
                let winner = self
                    .items
                    .iter()
                    .find(|item| !item.is_auto_added && edges.excludes.contains(&item.rule))
                    .map(|item| item.rule);
                if let Some(winner) = winner {
                    let rule = catalog.rule(winner);
                    let reason = format!(
                        "Conflicts with {} ({}), which was scoped first",
                        rule.code, rule.description
                    );
                    self.suppressed.insert(pending.rule, winner);
                    self.record(pending.rule, winner, ExclusionKind::Excluded, reason);
                    continue;
                }
            }

            self.accept(pending, &mut worklist);
        }

        Ok(())
    }

    fn accept(&mut self, pending: Pending, worklist: &mut VecDeque<Pending>) {
        let catalog = self.catalog;
        let rule = pending.rule;
        self.items.push(ResolvedItem {
            rule,
            is_auto_added: pending.added_by.is_some(),
            added_by: pending.added_by,
        });
        self.present.insert(rule);

        let edges = catalog.edges(rule);
        for &target in &edges.excludes {
            self.suppressed.entry(target).or_insert(rule);
            if self.remove(target) {
                let reason = excluded_reason(catalog.rule(rule));
                self.record(target, rule, ExclusionKind::Excluded, reason);
            }
        }

        for &target in &edges.auto_adds {
            if !self.present.contains(&target) {
                worklist.push_back(Pending {
                    rule: target,
                    added_by: Some(rule),
                });
            }
        }
    }

    /// Removes superseded generics one at a time. A removal that would
    /// orphan its own replacement, or one made earlier, is rolled back.
    fn apply_replacements(&mut self) {
        let catalog = self.catalog;
        let mut kept: HashSet<RuleId> = HashSet::new();
        let mut replacers: Vec<RuleId> = Vec::new();

        loop {
            let next = self
                .items
                .iter()
                .filter(|item| !kept.contains(&item.rule))
                .find_map(|item| {
                    catalog
                        .edges(item.rule)
                        .replaced_by
                        .iter()
                        .find(|specific| self.present.contains(specific))
                        .map(|specific| (item.rule, *specific))
                });
            let Some((generic, specific)) = next else {
                break;
            };

            let checkpoint = self.clone();
            self.remove(generic);
            let rule = catalog.rule(specific);
            let reason = format!(
                "Replaced by more specific item {} ({})",
                rule.code, rule.description
            );
            self.record(generic, specific, ExclusionKind::Replaced, reason);
            self.repair_orphans();
            replacers.push(specific);

            if replacers.iter().all(|replacer| self.present.contains(replacer)) {
                continue;
            }

            debug!(
                code = %catalog.rule(generic).code,
                by = %rule.code,
                "generic item kept; its replacement depends on it"
            );
            *self = checkpoint;
            replacers.pop();
            kept.insert(generic);
        }
    }

    fn repair_orphans(&mut self) {
        let catalog = self.catalog;
        loop {
            let mut orphans = Vec::new();

            for index in 0..self.items.len() {
                let item = self.items[index];
                let Some(trigger) = item.added_by else {
                    continue;
                };
                if self.present.contains(&trigger) {
                    continue;
                }

                let adopter = self
                    .items
                    .iter()
                    .map(|other| other.rule)
                    .find(|&other| {
                        other != item.rule && catalog.edges(other).auto_adds.contains(&item.rule)
                    });
                match adopter {
                    Some(adopter) => {
                        debug!(
                            code = %catalog.rule(item.rule).code,
                            trigger = %catalog.rule(adopter).code,
                            "auto-added item re-attributed"
                        );
                        self.items[index].added_by = Some(adopter);
                    }
                    None => orphans.push((item.rule, trigger)),
                }
            }

            if orphans.is_empty() {
                break;
            }

            for (rule, trigger) in orphans {
                if self.remove(rule) {
                    let reason = format!(
                        "Removed because triggering item {} is no longer in scope",
                        catalog.rule(trigger).code
                    );
                    self.record(rule, trigger, ExclusionKind::Orphaned, reason);
                }
            }
        }
    }

    fn remove(&mut self, rule: RuleId) -> bool {
        if self.present.remove(&rule) {
            self.items.retain(|item| item.rule != rule);
            true
        } else {
            false
        }
    }

    fn record(&mut self, rule: RuleId, by: RuleId, kind: ExclusionKind, reason: String) {
        if !self.recorded.insert(rule) {
            return;
        }
        let dropped = self.catalog.rule(rule);
        let excluder = self.catalog.rule(by);
        debug!(
            code = %dropped.code,
            by = %excluder.code,
            kind = kind.label(),
            "line item dropped from scope"
        );
        self.excluded.push(ExcludedItem {
            code: dropped.code.clone(),
            description: dropped.description.clone(),
            excluded_by: excluder.code.clone(),
            kind,
            reason,
        });
    }
}

fn excluded_reason(excluder: &LineItemRule) -> String {
    format!("Excluded by {} ({})", excluder.code, excluder.description)
}
