//! Dependency graph over one rule's action list.
//!
//! Actions are grouped into waves: wave 0 holds actions without
//! dependencies, wave `n` holds actions whose deepest dependency sits in wave
//! `n - 1`. Within a wave, actions are ordered by priority (high first) and
//! then by their position in the list, so the schedule is deterministic.

use std::cmp::Reverse;
use std::collections::HashMap;

use warden_types::{ActionId, ConfigurationError};

use crate::action::Action;

/// Validated, acyclic dependency graph with a deterministic schedule.
#[derive(Debug)]
pub struct ActionGraph<'a> {
    actions: &'a [Action],
    /// For each action index, the indexes of its direct dependencies.
    dependencies: Vec<Vec<usize>>,
    waves: Vec<Vec<usize>>,
}

impl<'a> ActionGraph<'a> {
    /// Builds the graph, rejecting duplicate ids, unknown dependencies, and
    /// cycles.
    pub fn build(actions: &'a [Action]) -> Result<Self, ConfigurationError> {
        let mut index: HashMap<&ActionId, usize> = HashMap::with_capacity(actions.len());
        for (i, action) in actions.iter().enumerate() {
            if index.insert(&action.id, i).is_some() {
                return Err(ConfigurationError::DuplicateActionId {
                    action: action.id.to_string(),
                });
            }
        }

        let mut dependencies = Vec::with_capacity(actions.len());
        for action in actions {
            let mut deps = Vec::with_capacity(action.dependencies.len());
            for dep in &action.dependencies {
                match index.get(dep) {
                    Some(&d) => deps.push(d),
                    None => {
                        return Err(ConfigurationError::UnknownDependency {
                            action: action.id.to_string(),
                            dependency: dep.to_string(),
                        });
                    }
                }
            }
            dependencies.push(deps);
        }

        let levels = compute_levels(actions, &dependencies)?;

        let depth = levels.iter().copied().max().map_or(0, |max| max + 1);
        let mut waves: Vec<Vec<usize>> = vec![Vec::new(); depth];
        for (i, level) in levels.iter().enumerate() {
            waves[*level].push(i);
        }
        for wave in &mut waves {
            wave.sort_by_key(|&i| (Reverse(actions[i].priority), i));
        }

        Ok(Self {
            actions,
            dependencies,
            waves,
        })
    }

    pub fn actions(&self) -> &'a [Action] {
        self.actions
    }

    pub fn waves(&self) -> &[Vec<usize>] {
        &self.waves
    }

    /// Direct dependencies of the action at `index`.
    pub fn dependencies_of(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    /// All action indexes in execution order.
    pub fn order(&self) -> Vec<usize> {
        self.waves.iter().flatten().copied().collect()
    }
}

/// Kahn's algorithm, assigning each node its longest distance from a root.
fn compute_levels(
    actions: &[Action],
    dependencies: &[Vec<usize>],
) -> Result<Vec<usize>, ConfigurationError> {
    let n = actions.len();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0_usize; n];
    for (i, deps) in dependencies.iter().enumerate() {
        in_degree[i] = deps.len();
        for &d in deps {
            dependents[d].push(i);
        }
    }

    let mut levels = vec![0_usize; n];
    let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut visited = 0;

    while let Some(node) = ready.pop() {
        visited += 1;
        for &next in &dependents[node] {
            levels[next] = levels[next].max(levels[node] + 1);
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(next);
            }
        }
    }

    if visited == n {
        Ok(levels)
    } else {
        let remaining: Vec<usize> = (0..n).filter(|&i| in_degree[i] > 0).collect();
        Err(ConfigurationError::CyclicDependency {
            actions: find_cycle(actions, dependencies, &remaining),
        })
    }
}

/// Walks dependency edges among the unresolved nodes until one repeats.
///
/// Every unresolved node has at least one unresolved dependency, so the walk
/// always closes a cycle.
fn find_cycle(actions: &[Action], dependencies: &[Vec<usize>], remaining: &[usize]) -> Vec<String> {
    let in_remaining = |i: usize| remaining.contains(&i);
    let Some(&start) = remaining.first() else {
        return Vec::new();
    };

    let mut path: Vec<usize> = vec![start];
    let mut current = start;
    loop {
        let next = dependencies[current]
            .iter()
            .copied()
            .find(|&d| in_remaining(d));
        let Some(next) = next else {
            break;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .map(|&i| actions[i].id.to_string())
                .collect();
            cycle.push(actions[next].id.to_string());
            return cycle;
        }
        path.push(next);
        current = next;
    }

    path.iter().map(|&i| actions[i].id.to_string()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionPriority, ActionType};

    fn action(id: &str) -> Action {
        Action::new(id, ActionType::GrantRole, "role")
    }

    fn ids(graph: &ActionGraph<'_>, indexes: &[usize]) -> Vec<String> {
        indexes
            .iter()
            .map(|&i| graph.actions()[i].id.to_string())
            .collect()
    }

    #[test]
    fn test_empty_list() {
        let graph = ActionGraph::build(&[]).expect("empty graph");
        assert!(graph.waves().is_empty());
        assert!(graph.order().is_empty());
    }

    #[test]
    fn test_dependencies_come_first() {
        let actions = vec![
            action("notify").depends_on("grant"),
            action("grant").depends_on("account"),
            action("account"),
        ];
        let graph = ActionGraph::build(&actions).expect("valid graph");

        assert_eq!(ids(&graph, &graph.order()), vec!["account", "grant", "notify"]);
        assert_eq!(graph.waves().len(), 3);
    }

    #[test]
    fn test_wave_sorted_by_priority_then_position() {
        let actions = vec![
            action("a").with_priority(ActionPriority::Low),
            action("b"),
            action("c").with_priority(ActionPriority::High),
            action("d"),
        ];
        let graph = ActionGraph::build(&actions).expect("valid graph");

        assert_eq!(ids(&graph, &graph.waves()[0]), vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_diamond_levels() {
        let actions = vec![
            action("root"),
            action("left").depends_on("root"),
            action("right").depends_on("root"),
            action("join").depends_on("left").depends_on("right"),
        ];
        let graph = ActionGraph::build(&actions).expect("valid graph");

        assert_eq!(graph.waves().len(), 3);
        assert_eq!(ids(&graph, &graph.waves()[1]), vec!["left", "right"]);
        assert_eq!(ids(&graph, &graph.waves()[2]), vec!["join"]);
        assert_eq!(graph.dependencies_of(3).len(), 2);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let actions = vec![
            action("a").depends_on("b"),
            action("b").depends_on("c"),
            action("c").depends_on("a"),
        ];
        let err = ActionGraph::build(&actions).expect_err("cycle must be rejected");

        match err {
            ConfigurationError::CyclicDependency { actions } => {
                assert_eq!(actions.first(), actions.last());
                assert_eq!(actions.len(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let actions = vec![action("a").depends_on("a")];
        let err = ActionGraph::build(&actions).expect_err("self loop");
        assert_eq!(
            err,
            ConfigurationError::CyclicDependency {
                actions: vec!["a".to_string(), "a".to_string()],
            }
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let actions = vec![action("a").depends_on("ghost")];
        let err = ActionGraph::build(&actions).expect_err("unknown dependency");
        assert_eq!(
            err,
            ConfigurationError::UnknownDependency {
                action: "a".to_string(),
                dependency: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_ids() {
        let actions = vec![action("a"), action("a")];
        let err = ActionGraph::build(&actions).expect_err("duplicate id");
        assert_eq!(
            err,
            ConfigurationError::DuplicateActionId {
                action: "a".to_string(),
            }
        );
    }
}
