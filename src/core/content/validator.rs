// ─── Ordering Validator ───
// Per-file diagnostics over the current load order, plus repair tooling
// (move suggestions and a dependency-respecting reorder).

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use super::activation::ActivationModel;
use super::index::DependencyIndex;
use super::record::OrderedCollection;
use crate::core::error::RepairError;

/// Diagnostic status of one content file. Each variant renders through a
/// single message template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", content = "file", rename_all = "snake_case")]
pub enum Status {
    Ok,
    MissingOnDisk,
    MissingDependency(String),
    DependencyInactive(String),
    LoadOrderViolation(String),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::MissingOnDisk => write!(f, "Declared but missing from storage"),
            Status::MissingDependency(id) => write!(f, "Unable to find dependent file: {}", id),
            Status::DependencyInactive(id) => write!(f, "Dependent file needs to be active: {}", id),
            Status::LoadOrderViolation(id) => write!(f, "This file needs to load after {}", id),
        }
    }
}

/// A suggested reorder that clears one load-order violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Repair {
    MoveAfter { file: String, anchor: String },
}

impl std::fmt::Display for Repair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Repair::MoveAfter { file, anchor } => write!(f, "Move {} after {}", file, anchor),
        }
    }
}

pub struct OrderingValidator;

impl OrderingValidator {
    /// Status of the record at `position`. First match wins:
    ///
    /// 1. missing on disk
    /// 2. for each requirement in declared order: unresolved, inactive,
    ///    or not strictly earlier in the load order
    /// 3. ok
    pub fn status_for(
        collection: &OrderedCollection,
        index: &DependencyIndex,
        activation: &ActivationModel,
        position: usize,
    ) -> Status {
        let Some(record) = collection.get(position) else {
            return Status::Ok;
        };

        if !record.exists_on_disk() {
            return Status::MissingOnDisk;
        }

        for dep in record.requires() {
            let Some(dep_pos) = index.position(dep) else {
                return Status::MissingDependency(dep.clone());
            };
            let Some(dep_record) = collection.get(dep_pos) else {
                return Status::MissingDependency(dep.clone());
            };
            if !activation.is_active(dep_record) {
                return Status::DependencyInactive(dep_record.identifier().to_string());
            }
            if dep_pos >= position {
                return Status::LoadOrderViolation(dep_record.identifier().to_string());
            }
        }

        Status::Ok
    }

    /// Statuses for every record, in load order.
    pub fn compute_all(
        collection: &OrderedCollection,
        index: &DependencyIndex,
        activation: &ActivationModel,
    ) -> Vec<Status> {
        (0..collection.len())
            .map(|pos| Self::status_for(collection, index, activation, pos))
            .collect()
    }

    /// One `MoveAfter` per load-order violation. Fails as a whole when any
    /// violating pair sits on a requirement cycle, since no move can
    /// satisfy it.
    pub fn suggest_repairs(
        collection: &OrderedCollection,
        index: &DependencyIndex,
        statuses: &[Status],
    ) -> Result<Vec<Repair>, RepairError> {
        let graph = RequirementGraph::build(collection, index);
        let mut repairs = Vec::new();

        for (pos, status) in statuses.iter().enumerate() {
            let Status::LoadOrderViolation(anchor) = status else {
                continue;
            };
            let Some(anchor_pos) = index.position(anchor) else {
                continue;
            };

            // The anchor leading back to this file means the pair can never
            // be ordered.
            if let Some(path) = graph.path(anchor_pos, pos) {
                let mut cycle = vec![collection.records()[pos].identifier().to_string()];
                cycle.extend(
                    path.iter()
                        .map(|&p| collection.records()[p].identifier().to_string()),
                );
                return Err(RepairError::CycleDetected { cycle });
            }

            repairs.push(Repair::MoveAfter {
                file: collection.records()[pos].identifier().to_string(),
                anchor: anchor.clone(),
            });
        }

        Ok(repairs)
    }

    /// A permutation of positions where every file comes after everything it
    /// requires. Files keep their current relative order wherever no
    /// requirement forces a change: a requirement sitting too late is hoisted
    /// to just before its first dependent. Unresolved requirements are
    /// ignored.
    pub fn dependency_order(
        collection: &OrderedCollection,
        index: &DependencyIndex,
    ) -> Result<Vec<usize>, RepairError> {
        let graph = RequirementGraph::build(collection, index);
        let mut placement = Placement::new(collection.len());

        for pos in 0..collection.len() {
            placement.place(&graph, pos).map_err(|cycle| RepairError::CycleDetected {
                cycle: cycle
                    .into_iter()
                    .map(|p| collection.records()[p].identifier().to_string())
                    .collect(),
            })?;
        }

        Ok(placement.order)
    }
}

/// Resolved requirement edges by position. Requirements that don't resolve
/// are dropped.
struct RequirementGraph {
    requires: Vec<Vec<usize>>,
}

impl RequirementGraph {
    fn build(collection: &OrderedCollection, index: &DependencyIndex) -> Self {
        let requires = collection
            .records()
            .iter()
            .map(|record| {
                record
                    .requires()
                    .iter()
                    .filter_map(|dep| index.position(dep))
                    .collect()
            })
            .collect();
        Self { requires }
    }

    /// Shortest chain of requirements leading from `from` to `to`, both ends
    /// included.
    fn path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        parent.insert(from, from);

        while let Some(cur) = queue.pop_front() {
            if cur == to {
                let mut path = vec![cur];
                let mut node = cur;
                while node != from {
                    node = parent[&node];
                    path.push(node);
                }
                path.reverse();
                return Some(path);
            }
            for &next in &self.requires[cur] {
                if let Entry::Vacant(e) = parent.entry(next) {
                    e.insert(cur);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Placed,
}

/// Depth-first placement: a file is emitted once all of its requirements
/// have been, so requirements land right before their first dependent.
struct Placement {
    marks: Vec<Mark>,
    stack: Vec<usize>,
    order: Vec<usize>,
}

impl Placement {
    fn new(n: usize) -> Self {
        Self {
            marks: vec![Mark::Unvisited; n],
            stack: Vec::new(),
            order: Vec::with_capacity(n),
        }
    }

    /// Err carries the requirement loop, first node repeated at the end.
    fn place(&mut self, graph: &RequirementGraph, pos: usize) -> Result<(), Vec<usize>> {
        match self.marks[pos] {
            Mark::Placed => return Ok(()),
            Mark::Visiting => {
                let at = self.stack.iter().position(|&p| p == pos).unwrap_or(0);
                let mut cycle = self.stack[at..].to_vec();
                cycle.push(pos);
                return Err(cycle);
            }
            Mark::Unvisited => {}
        }

        self.marks[pos] = Mark::Visiting;
        self.stack.push(pos);
        for &dep in &graph.requires[pos] {
            self.place(graph, dep)?;
        }
        self.stack.pop();
        self.marks[pos] = Mark::Placed;
        self.order.push(pos);
        Ok(())
    }
}
