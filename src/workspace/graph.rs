//! In-memory entity graph.

use crate::error::{Result, WorkspaceError};
use crate::types::{Milestone, Project, Seed, Task};
use std::collections::{HashMap, HashSet};

/// Id-keyed collection that remembers insertion order.
#[derive(Debug)]
pub(crate) struct Collection<T> {
    items: HashMap<String, (u64, T)>,
    next_ordinal: u64,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            next_ordinal: 0,
        }
    }
}

impl<T> Collection<T> {
    /// Insert or replace. A replaced item keeps its position.
    pub fn insert(&mut self, id: String, item: T) {
        let ordinal = match self.items.get(&id) {
            Some((ordinal, _)) => *ordinal,
            None => {
                self.next_ordinal += 1;
                self.next_ordinal
            }
        };
        self.items.insert(id, (ordinal, item));
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id).map(|(_, item)| item)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.get_mut(id).map(|(_, item)| item)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.items.remove(id).map(|(_, item)| item)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut().map(|(_, item)| item)
    }

    /// Items matching `filter`, in insertion order.
    pub fn ordered_where(&self, filter: impl Fn(&T) -> bool) -> Vec<&T> {
        let mut matching: Vec<&(u64, T)> = self.items.values().filter(|(_, item)| filter(item)).collect();
        matching.sort_by_key(|(ordinal, _)| *ordinal);
        matching.into_iter().map(|(_, item)| item).collect()
    }
}

/// Canonical projects, milestones and tasks.
#[derive(Debug, Default)]
pub(crate) struct EntityGraph {
    pub projects: Collection<Project>,
    pub milestones: Collection<Milestone>,
    pub tasks: Collection<Task>,
}

impl EntityGraph {
    /// Build from a seed, rejecting duplicate ids and dangling references.
    pub fn from_seed(seed: Seed) -> Result<Self> {
        let mut graph = EntityGraph::default();
        let mut seen = HashSet::new();

        let mut claim = |id: &str| -> Result<()> {
            if seen.insert(id.to_string()) {
                Ok(())
            } else {
                Err(WorkspaceError::Seed(format!("duplicate id {}", id)))
            }
        };

        for project in seed.projects {
            claim(&project.id)?;
            graph.projects.insert(project.id.clone(), project);
        }

        for milestone in seed.milestones {
            claim(&milestone.id)?;
            if !graph.projects.contains(&milestone.project_id) {
                return Err(WorkspaceError::Seed(format!(
                    "milestone {} references unknown project {}",
                    milestone.id, milestone.project_id
                )));
            }
            graph.milestones.insert(milestone.id.clone(), milestone);
        }

        for mut task in seed.tasks {
            claim(&task.id)?;
            if !graph.projects.contains(&task.project_id) {
                return Err(WorkspaceError::Seed(format!(
                    "task {} references unknown project {}",
                    task.id, task.project_id
                )));
            }
            if let Some(milestone_id) = &task.milestone_id {
                if !graph.milestones.contains(milestone_id) {
                    return Err(WorkspaceError::Seed(format!(
                        "task {} references unknown milestone {}",
                        task.id, milestone_id
                    )));
                }
            }
            task.comments_sequence = task.max_comment_sequence();
            graph.tasks.insert(task.id.clone(), task);
        }

        Ok(graph)
    }

    /// Every live entity id.
    pub fn entity_ids(&self) -> HashSet<String> {
        self.projects
            .ids()
            .chain(self.milestones.ids())
            .chain(self.tasks.ids())
            .cloned()
            .collect()
    }

    pub fn task_ids_for_project(&self, project_id: &str) -> Vec<String> {
        self.tasks
            .ordered_where(|t| t.project_id == project_id)
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn milestone_ids_for_project(&self, project_id: &str) -> Vec<String> {
        self.milestones
            .ordered_where(|m| m.project_id == project_id)
            .into_iter()
            .map(|m| m.id.clone())
            .collect()
    }
}
