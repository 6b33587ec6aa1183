// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Control, DfsEvent, depth_first_search};

use crate::action::ActionTable;
use crate::dag::stage::Stage;
use crate::errors::{Result, StagerunError};
use crate::types::StepName;

/// Validated dependency graph of one stage.
///
/// Steps are addressed by their declaration index. Built fresh for every run
/// and read-only afterwards.
#[derive(Debug, Clone)]
pub struct StageGraph {
    stage: String,
    names: Vec<StepName>,
    index: HashMap<StepName, usize>,
    /// Direct requirements of each step.
    deps: Vec<Vec<usize>>,
    /// Direct dependents of each step.
    dependents: Vec<Vec<usize>>,
    /// Longest requirement chain below each step (roots are level 0).
    levels: Vec<usize>,
}

impl StageGraph {
    /// Build and validate the graph for `stage`.
    ///
    /// Fails if a step name repeats, a `requires` entry names no step of this
    /// stage, a step's action is not in `actions`, or the requirements form
    /// a cycle. Deterministic for a given input.
    pub fn build(stage: &Stage, actions: &ActionTable) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, step) in stage.steps.iter().enumerate() {
            if index.insert(step.name.clone(), i).is_some() {
                return Err(StagerunError::ConfigError(format!(
                    "stage '{}' declares step '{}' more than once",
                    stage.name, step.name
                )));
            }
        }

        let mut deps = vec![Vec::new(); stage.steps.len()];
        let mut dependents = vec![Vec::new(); stage.steps.len()];

        for (i, step) in stage.steps.iter().enumerate() {
            if !actions.contains(&step.action) {
                return Err(StagerunError::UnknownAction {
                    stage: stage.name.clone(),
                    step: step.name.clone(),
                    action: step.action.clone(),
                });
            }

            for dep in &step.requires {
                let Some(&d) = index.get(dep) else {
                    return Err(StagerunError::UnknownDependency {
                        stage: stage.name.clone(),
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                if !deps[i].contains(&d) {
                    deps[i].push(d);
                    dependents[d].push(i);
                }
            }
        }

        // Edge direction: step -> requirement.
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for i in 0..stage.steps.len() {
            graph.add_node(i);
        }
        for (i, reqs) in deps.iter().enumerate() {
            for &d in reqs {
                graph.add_edge(i, d, ());
            }
        }

        if let Some(cycle) = find_cycle(&graph, stage.steps.len()) {
            return Err(StagerunError::DagCycle {
                stage: stage.name.clone(),
                members: cycle
                    .into_iter()
                    .map(|i| stage.steps[i].name.clone())
                    .collect(),
            });
        }

        let levels = compute_levels(&graph, &deps)?;

        Ok(Self {
            stage: stage.name.clone(),
            names: stage.steps.iter().map(|s| s.name.clone()).collect(),
            index,
            deps,
            dependents,
            levels,
        })
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Step names in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Direct requirements of a step.
    pub fn dependencies_of(&self, index: usize) -> &[usize] {
        self.deps.get(index).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Direct dependents of a step.
    pub fn dependents_of(&self, index: usize) -> &[usize] {
        self.dependents
            .get(index)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    pub fn level_of(&self, index: usize) -> usize {
        self.levels.get(index).copied().unwrap_or(0)
    }
}

/// Depth-first search with white/gray/black colouring, starting from each
/// step in declaration order. A back edge into a gray node closes a cycle;
/// its members are returned in traversal order.
fn find_cycle(graph: &DiGraphMap<usize, ()>, len: usize) -> Option<Vec<usize>> {
    let mut path: Vec<usize> = Vec::new();

    let control = depth_first_search(graph, 0..len, |event| match event {
        DfsEvent::Discover(n, _) => {
            path.push(n);
            Control::Continue
        }
        DfsEvent::Finish(_, _) => {
            path.pop();
            Control::Continue
        }
        DfsEvent::BackEdge(_, gray) => {
            let start = path.iter().position(|&n| n == gray).unwrap_or(0);
            Control::Break(path[start..].to_vec())
        }
        _ => Control::Continue,
    });

    control.break_value()
}

fn compute_levels(graph: &DiGraphMap<usize, ()>, deps: &[Vec<usize>]) -> Result<Vec<usize>> {
    // Edges point at requirements, so a reversed topological order visits
    // every requirement before its dependents.
    let order = toposort(graph, None).map_err(|cycle| {
        StagerunError::ConfigError(format!(
            "cycle involving step index {}",
            cycle.node_id()
        ))
    })?;

    let mut levels = vec![0; deps.len()];
    for &i in order.iter().rev() {
        levels[i] = deps[i].iter().map(|&d| levels[d] + 1).max().unwrap_or(0);
    }
    Ok(levels)
}
