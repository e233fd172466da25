use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::component::{InstallComponent, OrderConstraint};
use crate::core::error::PlanError;

/// One component to lay down, in plan order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanStep {
    pub component: String,
    pub archive: PathBuf,
    /// Re-install of a component already present, forced by ordering.
    pub reinstall: bool,
    /// Earlier steps this one must follow; if any of them fails this step
    /// is skipped.
    pub after: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Remediation {
    /// `component` is already installed but has to be laid down again
    /// after `because`.
    Reinstall { component: String, because: String },
}

impl std::fmt::Display for Remediation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Remediation::Reinstall { component, because } => write!(
                f,
                "About to install {because} after {component}. \
                 {component} needs to be re-installed after {because}."
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallPlan {
    steps: Vec<PlanStep>,
    remediations: Vec<Remediation>,
}

impl InstallPlan {
    /// Order the selected components so every constraint holds.
    ///
    /// Constraints may name components that are not selected; they still
    /// take part in ordering, so `A before M before B` orders A before B
    /// even when M is left out. Any cycle is reported as a conflict rather
    /// than broken arbitrarily.
    pub fn build(
        components: &[InstallComponent],
        constraints: &[OrderConstraint],
    ) -> Result<Self, PlanError> {
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (i, c) in components.iter().enumerate() {
            match by_name.entry(c.name.trim().to_lowercase()) {
                Entry::Occupied(_) => return Err(PlanError::DuplicateComponent(c.name.clone())),
                Entry::Vacant(e) => {
                    e.insert(i);
                }
            }
        }

        let lookup = |name: &str| {
            by_name
                .get(&name.trim().to_lowercase())
                .copied()
                .ok_or_else(|| PlanError::UnknownComponent(name.to_string()))
        };

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
        for constraint in constraints {
            let before = lookup(&constraint.before)?;
            let after = lookup(&constraint.after)?;
            if before == after {
                return Err(PlanError::ConflictingOrder {
                    first: components[before].name.clone(),
                    second: components[after].name.clone(),
                });
            }
            if !successors[before].contains(&after) {
                successors[before].push(after);
            }
        }

        if let Some((first, second)) = find_conflict(&successors) {
            return Err(PlanError::ConflictingOrder {
                first: components[first].name.clone(),
                second: components[second].name.clone(),
            });
        }

        let reach: Vec<Vec<bool>> = (0..components.len())
            .map(|i| reachable_from(i, &successors))
            .collect();

        // None: not part of this run; Some(reinstall)
        let mut included: Vec<Option<bool>> = components
            .iter()
            .map(|c| c.selected.then_some(false))
            .collect();

        let mut remediations = Vec::new();
        loop {
            let mut changed = false;
            for x in 0..components.len() {
                if included[x].is_none() {
                    continue;
                }
                for y in 0..components.len() {
                    if reach[x][y] && included[y].is_none() && components[y].installed {
                        included[y] = Some(true);
                        changed = true;
                        info!(
                            "{} must be re-installed after {}",
                            components[y].name, components[x].name
                        );
                        remediations.push(Remediation::Reinstall {
                            component: components[y].name.clone(),
                            because: components[x].name.clone(),
                        });
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let order = ordered(&included, &reach);
        let steps = order
            .iter()
            .map(|&i| PlanStep {
                component: components[i].name.clone(),
                archive: components[i].archive.clone(),
                reinstall: included[i] == Some(true),
                after: order
                    .iter()
                    .filter(|&&j| reach[j][i])
                    .map(|&j| components[j].name.clone())
                    .collect(),
            })
            .collect::<Vec<_>>();

        debug!(
            "Install plan: {:?}",
            steps.iter().map(|s| s.component.as_str()).collect::<Vec<_>>()
        );
        Ok(Self {
            steps,
            remediations,
        })
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn remediations(&self) -> &[Remediation] {
        &self.remediations
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The plan with every forced re-install dropped, for when the user
    /// declines the remediation.
    pub fn without_remediation(mut self) -> Self {
        self.steps.retain(|s| !s.reinstall);
        let kept: Vec<String> = self.steps.iter().map(|s| s.component.clone()).collect();
        for step in &mut self.steps {
            step.after.retain(|name| kept.contains(name));
        }
        self.remediations.clear();
        self
    }
}

/// First back edge found by a depth-first walk, as (target, source).
fn find_conflict(successors: &[Vec<usize>]) -> Option<(usize, usize)> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Open,
        Done,
    }

    fn visit(
        node: usize,
        successors: &[Vec<usize>],
        marks: &mut [Mark],
    ) -> Option<(usize, usize)> {
        marks[node] = Mark::Open;
        for &next in &successors[node] {
            match marks[next] {
                Mark::Open => return Some((next, node)),
                Mark::New => {
                    if let Some(found) = visit(next, successors, marks) {
                        return Some(found);
                    }
                }
                Mark::Done => {}
            }
        }
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; successors.len()];
    (0..successors.len()).find_map(|start| {
        if marks[start] == Mark::New {
            visit(start, successors, &mut marks)
        } else {
            None
        }
    })
}

fn reachable_from(start: usize, successors: &[Vec<usize>]) -> Vec<bool> {
    let mut seen = vec![false; successors.len()];
    let mut stack = successors[start].clone();
    while let Some(node) = stack.pop() {
        if !seen[node] {
            seen[node] = true;
            stack.extend(successors[node].iter().copied());
        }
    }
    seen
}

/// Topological order of the included components, lowest declaration index
/// first among those that are ready.
fn ordered(included: &[Option<bool>], reach: &[Vec<bool>]) -> Vec<usize> {
    let members: Vec<usize> = (0..included.len())
        .filter(|&i| included[i].is_some())
        .collect();
    let mut placed: Vec<usize> = Vec::with_capacity(members.len());

    while placed.len() < members.len() {
        let next = members.iter().copied().find(|&i| {
            !placed.contains(&i)
                && members
                    .iter()
                    .all(|&j| j == i || placed.contains(&j) || !reach[j][i])
        });
        match next {
            Some(i) => placed.push(i),
            // unreachable once cycles are rejected
            None => break,
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> Vec<InstallComponent> {
        vec![
            InstallComponent::new("Morrowind", "/disc/morrowind.zip"),
            InstallComponent::new("Tribunal", "/disc/tribunal.zip"),
            InstallComponent::new("Bloodmoon", "/disc/bloodmoon.zip"),
        ]
    }

    fn expansion_order() -> Vec<OrderConstraint> {
        vec![
            OrderConstraint::new("Morrowind", "Tribunal"),
            OrderConstraint::new("Morrowind", "Bloodmoon"),
            OrderConstraint::new("Tribunal", "Bloodmoon"),
        ]
    }

    fn names(plan: &InstallPlan) -> Vec<&str> {
        plan.steps().iter().map(|s| s.component.as_str()).collect()
    }

    #[test]
    fn orders_selected_components_by_constraint() {
        let mut comps = components();
        comps.reverse();
        for c in &mut comps {
            c.selected = true;
        }
        let plan = InstallPlan::build(&comps, &expansion_order()).unwrap();
        assert_eq!(names(&plan), ["Morrowind", "Tribunal", "Bloodmoon"]);
        assert!(plan.remediations().is_empty());
        assert_eq!(plan.steps()[2].after, ["Morrowind", "Tribunal"]);
    }

    #[test]
    fn unconstrained_components_keep_declaration_order() {
        let comps: Vec<_> = components().into_iter().map(|c| c.selected(true)).collect();
        let plan = InstallPlan::build(&comps, &[]).unwrap();
        assert_eq!(names(&plan), ["Morrowind", "Tribunal", "Bloodmoon"]);
        assert!(plan.steps().iter().all(|s| s.after.is_empty()));
    }

    #[test]
    fn mutual_preference_is_a_conflict() {
        let comps: Vec<_> = components().into_iter().map(|c| c.selected(true)).collect();
        let err = InstallPlan::build(
            &comps,
            &[
                OrderConstraint::new("Tribunal", "Bloodmoon"),
                OrderConstraint::new("Bloodmoon", "Tribunal"),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::ConflictingOrder {
                first: "Tribunal".into(),
                second: "Bloodmoon".into(),
            }
        );
    }

    #[test]
    fn names_differing_only_in_case_are_duplicates() {
        let mut comps = components();
        comps.push(InstallComponent::new("tribunal", "/disc/tribunal-goty.zip").selected(true));
        let err = InstallPlan::build(&comps, &expansion_order()).unwrap_err();
        assert_eq!(err, PlanError::DuplicateComponent("tribunal".into()));
    }

    #[test]
    fn unknown_component_in_constraint() {
        let err =
            InstallPlan::build(&components(), &[OrderConstraint::new("Morrowind", "Oblivion")])
                .unwrap_err();
        assert_eq!(err, PlanError::UnknownComponent("Oblivion".into()));
    }

    #[test]
    fn installing_earlier_component_forces_reinstall_of_later_one() {
        let comps = vec![
            InstallComponent::new("Morrowind", "/disc/morrowind.zip").installed(true),
            InstallComponent::new("Tribunal", "/disc/tribunal.zip").selected(true),
            InstallComponent::new("Bloodmoon", "/disc/bloodmoon.zip").installed(true),
        ];
        let plan = InstallPlan::build(&comps, &expansion_order()).unwrap();

        assert_eq!(names(&plan), ["Tribunal", "Bloodmoon"]);
        assert!(plan.steps()[1].reinstall);
        assert_eq!(
            plan.remediations(),
            [Remediation::Reinstall {
                component: "Bloodmoon".into(),
                because: "Tribunal".into(),
            }]
        );
        assert!(plan.remediations()[0]
            .to_string()
            .starts_with("About to install Tribunal after Bloodmoon"));

        let declined = plan.without_remediation();
        assert_eq!(names(&declined), ["Tribunal"]);
        assert!(declined.remediations().is_empty());
    }

    #[test]
    fn ordering_passes_through_unselected_components() {
        let comps = vec![
            InstallComponent::new("Morrowind", "/m.zip").selected(true),
            InstallComponent::new("Tribunal", "/t.zip"),
            InstallComponent::new("Bloodmoon", "/b.zip").selected(true),
        ];
        let plan = InstallPlan::build(
            &comps,
            &[
                OrderConstraint::new("Bloodmoon", "Tribunal"),
                OrderConstraint::new("Tribunal", "Morrowind"),
            ],
        )
        .unwrap();
        assert_eq!(names(&plan), ["Bloodmoon", "Morrowind"]);
        assert_eq!(plan.steps()[1].after, ["Bloodmoon"]);
    }
}
