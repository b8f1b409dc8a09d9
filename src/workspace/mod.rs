//! The workspace: canonical entity state plus its durable mirror.
//!
//! A [`Workspace`] owns every project, milestone and task in memory. Two task
//! fields are mirrored into a [`PersistentStore`]:
//!
//! - `notes`, written through on update (or after a debounce while editing)
//!   and removed from storage when blanked
//! - `comments`, rewritten in full on every append
//!
//! On open, the workspace builds the graph from a [`Seed`], reads every
//! task's persisted fields and lets the [`ConflictResolver`] decide which
//! side wins, then schedules a one-off orphan sweep. Deferred work (debounced
//! notes writes, the sweep) runs when the host calls [`Workspace::tick`].
//!
//! ## Example
//!
//! ```ignore
//! use taskboard::{MemoryBackend, PersistentStore, Seed, TaskPatch, Workspace, WorkspaceConfig};
//!
//! let store = PersistentStore::from_backend(MemoryBackend::new());
//! let workspace = Workspace::open(Seed::from_json(SEED)?, store, WorkspaceConfig::default())?;
//!
//! workspace.update_task("t1", TaskPatch::notes("call the vendor"))?;
//! workspace.add_comment("t1", "Vendor confirmed")?;
//! let pct = workspace.calculate_dynamic_progress("p1");
//! ```

mod config;
mod graph;

pub use config::WorkspaceConfig;

use crate::clock::{Clock, SystemClock};
use crate::comments::{sorted_by_sequence, CommentLogManager};
use crate::error::{Result, WorkspaceError};
use crate::kv::PersistentStore;
use crate::persist::{
    clear_field, read_field, write_field, CommentsDecision, ConflictResolver, FieldKind,
    NotesDecision, NotesSchemaV1,
};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::subscriptions::{ChangeEvent, ChangeFeed, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
use crate::sweeper::{OrphanSweeper, SweepReport};
use crate::types::{
    Comment, EntityKind, Milestone, MilestonePatch, NewMilestone, NewProject, NewTask, Project,
    ProjectPatch, Seed, Task, TaskPatch, Timestamp,
};
use graph::EntityGraph;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What hydration changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HydrationSummary {
    /// Tasks examined.
    pub tasks: usize,
    /// Tasks whose notes were replaced by the persisted value.
    pub notes_restored: usize,
    /// Tasks whose comments were replaced by the persisted list.
    pub comments_restored: usize,
}

/// Work deferred through the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Deferred {
    PersistNotes(String),
    SweepOrphans,
}

#[derive(Default)]
struct Timers {
    scheduler: Scheduler<Deferred>,
    /// Pending debounced notes write per task.
    notes: HashMap<String, TimerHandle>,
    sweep: Option<TimerHandle>,
}

/// Canonical entity store with write-through persistence of task notes and comments.
pub struct Workspace {
    config: WorkspaceConfig,
    clock: Arc<dyn Clock>,
    store: PersistentStore,
    resolver: ConflictResolver,
    comments: CommentLogManager,
    sweeper: OrphanSweeper,
    graph: RwLock<EntityGraph>,
    timers: Mutex<Timers>,
    feed: ChangeFeed,
    hydration: HydrationSummary,
}

impl Workspace {
    /// Build the graph from `seed`, hydrate persisted fields and schedule the sweep.
    pub fn open(seed: Seed, store: PersistentStore, config: WorkspaceConfig) -> Result<Self> {
        Self::open_with_clock(seed, store, Arc::new(SystemClock), config)
    }

    /// [`Workspace::open`] with an explicit time source.
    pub fn open_with_clock(
        seed: Seed,
        store: PersistentStore,
        clock: Arc<dyn Clock>,
        config: WorkspaceConfig,
    ) -> Result<Self> {
        let mut graph = EntityGraph::from_seed(seed)?;
        let resolver = ConflictResolver::new(config.freshness_window);
        let comments = CommentLogManager::new(store.clone());
        let now = clock.now();

        let hydration = Self::hydrate(&mut graph, &store, &resolver, &comments, now);
        tracing::debug!(
            tasks = hydration.tasks,
            notes_restored = hydration.notes_restored,
            comments_restored = hydration.comments_restored,
            "workspace hydrated"
        );

        let mut scheduler = Scheduler::new();
        let sweep = scheduler.schedule(now, config.sweep_delay, Deferred::SweepOrphans);
        let timers = Timers {
            scheduler,
            notes: HashMap::new(),
            sweep: Some(sweep),
        };

        Ok(Self {
            sweeper: OrphanSweeper::new(store.clone()),
            config,
            clock,
            store,
            resolver,
            comments,
            graph: RwLock::new(graph),
            timers: Mutex::new(timers),
            feed: ChangeFeed::new(),
            hydration,
        })
    }

    fn hydrate(
        graph: &mut EntityGraph,
        store: &PersistentStore,
        resolver: &ConflictResolver,
        comment_log: &CommentLogManager,
        now: Timestamp,
    ) -> HydrationSummary {
        let mut summary = HydrationSummary::default();

        for task in graph.tasks.values_mut() {
            summary.tasks += 1;

            let (persisted, persisted_at) = match read_field::<NotesSchemaV1>(store, &task.id) {
                Some(stored) => (stored.value.ok(), stored.written_at),
                None => (None, None),
            };

            if let NotesDecision::UsePersisted { value, reason } =
                resolver.resolve_notes(&task.notes, persisted.as_deref(), persisted_at, now)
            {
                tracing::debug!(task_id = %task.id, ?reason, "restoring persisted notes");
                task.notes = value;
                summary.notes_restored += 1;
            }

            if let CommentsDecision::UsePersisted { comments, sequence } =
                resolver.resolve_comments(comment_log.load(&task.id))
            {
                task.comments = comments;
                task.comments_sequence = sequence;
                summary.comments_restored += 1;
            }
        }

        summary
    }

    // --- Accessors ---

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// What the initial hydration restored from storage.
    pub fn hydration(&self) -> &HydrationSummary {
        &self.hydration
    }

    /// Every live entity id across all kinds.
    pub fn entity_ids(&self) -> HashSet<String> {
        self.graph.read().entity_ids()
    }

    // --- Projects ---

    /// All projects in creation order.
    pub fn projects(&self) -> Vec<Project> {
        self.graph
            .read()
            .projects
            .ordered_where(|_| true)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_project_by_id(&self, id: &str) -> Option<Project> {
        self.graph.read().projects.get(id).cloned()
    }

    pub fn create_project(&self, input: NewProject) -> Project {
        let project = Project {
            id: new_id(),
            name: input.name,
            description: input.description,
            status: input.status,
            owner: input.owner,
            created_at: self.clock.now(),
            due_date: input.due_date,
        };

        self.graph
            .write()
            .projects
            .insert(project.id.clone(), project.clone());
        self.publish_changed(EntityKind::Project, &project.id);
        project
    }

    pub fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<Project> {
        let updated = {
            let mut graph = self.graph.write();
            let project = graph
                .projects
                .get_mut(id)
                .ok_or_else(|| WorkspaceError::ProjectNotFound(id.to_string()))?;

            if let Some(name) = patch.name {
                project.name = name;
            }
            if let Some(description) = patch.description {
                project.description = description;
            }
            if let Some(status) = patch.status {
                project.status = status;
            }
            if let Some(owner) = patch.owner {
                project.owner = owner;
            }
            if let Some(due_date) = patch.due_date {
                project.due_date = due_date;
            }
            project.clone()
        };

        self.publish_changed(EntityKind::Project, id);
        Ok(updated)
    }

    /// Remove a project with its milestones and tasks. Persisted task fields
    /// are left for the orphan sweep.
    pub fn delete_project(&self, id: &str) -> Result<()> {
        let (milestone_ids, task_ids) = {
            let mut graph = self.graph.write();
            if graph.projects.remove(id).is_none() {
                return Err(WorkspaceError::ProjectNotFound(id.to_string()));
            }

            let milestone_ids = graph.milestone_ids_for_project(id);
            for milestone_id in &milestone_ids {
                graph.milestones.remove(milestone_id);
            }

            let task_ids = graph.task_ids_for_project(id);
            for task_id in &task_ids {
                graph.tasks.remove(task_id);
            }

            (milestone_ids, task_ids)
        };

        self.cancel_notes_writes(&task_ids);

        for task_id in &task_ids {
            self.publish_deleted(EntityKind::Task, task_id);
        }
        for milestone_id in &milestone_ids {
            self.publish_deleted(EntityKind::Milestone, milestone_id);
        }
        self.publish_deleted(EntityKind::Project, id);
        Ok(())
    }

    /// Rounded percentage of the project's tasks that are completed; 0 with no tasks.
    pub fn calculate_dynamic_progress(&self, project_id: &str) -> u32 {
        let graph = self.graph.read();
        let tasks = graph.tasks.ordered_where(|t| t.project_id == project_id);

        let total = tasks.len() as u64;
        if total == 0 {
            return 0;
        }
        let completed = tasks.iter().filter(|t| t.is_completed()).count() as u64;

        // round-half-up of 100 * completed / total
        ((200 * completed + total) / (2 * total)) as u32
    }

    // --- Milestones ---

    pub fn milestones_for_project(&self, project_id: &str) -> Vec<Milestone> {
        self.graph
            .read()
            .milestones
            .ordered_where(|m| m.project_id == project_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_milestone_by_id(&self, id: &str) -> Option<Milestone> {
        self.graph.read().milestones.get(id).cloned()
    }

    pub fn create_milestone(&self, input: NewMilestone) -> Result<Milestone> {
        let milestone = {
            let mut graph = self.graph.write();
            if !graph.projects.contains(&input.project_id) {
                return Err(WorkspaceError::ProjectNotFound(input.project_id));
            }

            let milestone = Milestone {
                id: new_id(),
                project_id: input.project_id,
                title: input.title,
                due_date: input.due_date,
                completed: false,
            };
            graph
                .milestones
                .insert(milestone.id.clone(), milestone.clone());
            milestone
        };

        self.publish_changed(EntityKind::Milestone, &milestone.id);
        Ok(milestone)
    }

    pub fn update_milestone(&self, id: &str, patch: MilestonePatch) -> Result<Milestone> {
        let updated = {
            let mut graph = self.graph.write();
            let milestone = graph
                .milestones
                .get_mut(id)
                .ok_or_else(|| WorkspaceError::MilestoneNotFound(id.to_string()))?;

            if let Some(title) = patch.title {
                milestone.title = title;
            }
            if let Some(due_date) = patch.due_date {
                milestone.due_date = due_date;
            }
            if let Some(completed) = patch.completed {
                milestone.completed = completed;
            }
            milestone.clone()
        };

        self.publish_changed(EntityKind::Milestone, id);
        Ok(updated)
    }

    /// Remove a milestone. Its tasks stay in the project, detached.
    pub fn delete_milestone(&self, id: &str) -> Result<()> {
        let detached: Vec<String> = {
            let mut graph = self.graph.write();
            if graph.milestones.remove(id).is_none() {
                return Err(WorkspaceError::MilestoneNotFound(id.to_string()));
            }

            graph
                .tasks
                .values_mut()
                .filter(|t| t.milestone_id.as_deref() == Some(id))
                .map(|t| {
                    t.milestone_id = None;
                    t.id.clone()
                })
                .collect()
        };

        for task_id in &detached {
            self.publish_changed(EntityKind::Task, task_id);
        }
        self.publish_deleted(EntityKind::Milestone, id);
        Ok(())
    }

    // --- Tasks ---

    pub fn tasks_for_project(&self, project_id: &str) -> Vec<Task> {
        self.graph
            .read()
            .tasks
            .ordered_where(|t| t.project_id == project_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_task_by_id(&self, id: &str) -> Option<Task> {
        self.graph.read().tasks.get(id).cloned()
    }

    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        let task = {
            let mut graph = self.graph.write();
            if !graph.projects.contains(&input.project_id) {
                return Err(WorkspaceError::ProjectNotFound(input.project_id));
            }
            if let Some(milestone_id) = &input.milestone_id {
                Self::check_milestone(&graph, milestone_id, &input.project_id)?;
            }

            let task = Task {
                id: new_id(),
                project_id: input.project_id,
                milestone_id: input.milestone_id,
                title: input.title,
                description: input.description,
                status: input.status,
                priority: input.priority,
                assignee: input.assignee,
                due_date: input.due_date,
                notes: String::new(),
                comments: Vec::new(),
                comments_sequence: 0,
            };
            graph.tasks.insert(task.id.clone(), task.clone());
            task
        };

        self.publish_changed(EntityKind::Task, &task.id);
        Ok(task)
    }

    /// Merge `patch` into the task. A `notes` value is written through
    /// immediately and supersedes any pending debounced write.
    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let updated = {
            let mut graph = self.graph.write();

            if let Some(Some(milestone_id)) = &patch.milestone_id {
                let project_id = graph
                    .tasks
                    .get(id)
                    .map(|t| t.project_id.clone())
                    .ok_or_else(|| WorkspaceError::TaskNotFound(id.to_string()))?;
                Self::check_milestone(&graph, milestone_id, &project_id)?;
            }

            let task = graph
                .tasks
                .get_mut(id)
                .ok_or_else(|| WorkspaceError::TaskNotFound(id.to_string()))?;

            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(assignee) = patch.assignee {
                task.assignee = assignee;
            }
            if let Some(milestone_id) = patch.milestone_id {
                task.milestone_id = milestone_id;
            }
            if let Some(due_date) = patch.due_date {
                task.due_date = due_date;
            }
            if let Some(notes) = patch.notes {
                task.notes = notes;
                self.cancel_notes_writes(std::slice::from_ref(&task.id));
                self.write_notes(&task.id, &task.notes, self.clock.now());
            }

            task.clone()
        };

        self.publish_changed(EntityKind::Task, id);
        Ok(updated)
    }

    /// Update notes in memory now and persist them once edits pause for
    /// `notes_debounce`. Each call restarts the wait.
    pub fn edit_notes(&self, id: &str, notes: impl Into<String>) -> Result<()> {
        {
            let mut graph = self.graph.write();
            let task = graph
                .tasks
                .get_mut(id)
                .ok_or_else(|| WorkspaceError::TaskNotFound(id.to_string()))?;
            task.notes = notes.into();

            let mut timers = self.timers.lock();
            if let Some(previous) = timers.notes.remove(id) {
                timers.scheduler.cancel(previous);
            }
            let handle = timers.scheduler.schedule(
                self.clock.now(),
                self.config.notes_debounce,
                Deferred::PersistNotes(id.to_string()),
            );
            timers.notes.insert(id.to_string(), handle);
        }

        self.publish_changed(EntityKind::Task, id);
        Ok(())
    }

    /// Whether a debounced notes write is waiting for this task.
    pub fn has_pending_notes(&self, id: &str) -> bool {
        let timers = self.timers.lock();
        timers
            .notes
            .get(id)
            .is_some_and(|handle| timers.scheduler.is_pending(*handle))
    }

    /// Remove a task. Its persisted fields are left for the orphan sweep.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        if self.graph.write().tasks.remove(id).is_none() {
            return Err(WorkspaceError::TaskNotFound(id.to_string()));
        }

        self.cancel_notes_writes(&[id.to_string()]);
        self.publish_deleted(EntityKind::Task, id);
        Ok(())
    }

    /// Append a comment. `Ok(None)` if the content is blank.
    pub fn add_comment(&self, task_id: &str, content: &str) -> Result<Option<Comment>> {
        let comment = {
            let mut graph = self.graph.write();
            let task = graph
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))?;

            self.comments
                .append(task, content, &self.config.author, self.clock.now())
        };

        if let Some(comment) = &comment {
            self.feed.publish(ChangeEvent::CommentAdded {
                task_id: task_id.to_string(),
                sequence: comment.sequence,
            });
        }
        Ok(comment)
    }

    /// The task's comments ordered by sequence.
    pub fn comments_sorted(&self, task_id: &str) -> Result<Vec<Comment>> {
        let graph = self.graph.read();
        let task = graph
            .tasks
            .get(task_id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))?;
        Ok(sorted_by_sequence(&task.comments))
    }

    /// Read persisted notes straight from storage, bypassing hydration.
    /// Works for tasks that no longer exist in memory.
    pub fn recover_notes(&self, task_id: &str) -> Option<String> {
        self.store.get(&FieldKind::Notes.value_key(task_id))
    }

    // --- Deferred work ---

    /// Run every deferred task that is due. Returns how many ran.
    pub fn tick(&self) -> usize {
        let due = {
            let mut timers = self.timers.lock();
            let due = timers.scheduler.drain_due(self.clock.now());
            for task in &due {
                match task {
                    Deferred::PersistNotes(id) => {
                        timers.notes.remove(id);
                    }
                    Deferred::SweepOrphans => timers.sweep = None,
                }
            }
            due
        };

        let count = due.len();
        for task in due {
            match task {
                Deferred::PersistNotes(id) => self.persist_current_notes(&id),
                Deferred::SweepOrphans => {
                    self.sweep_orphans();
                }
            }
        }
        count
    }

    /// Fire every pending notes write now. Returns how many were written.
    pub fn flush_pending(&self) -> usize {
        let pending: Vec<String> = {
            let mut timers = self.timers.lock();
            let handles: Vec<(String, TimerHandle)> = timers.notes.drain().collect();
            handles
                .into_iter()
                .filter_map(|(id, handle)| timers.scheduler.cancel(handle).map(|_| id))
                .collect()
        };

        for id in &pending {
            self.persist_current_notes(id);
        }
        pending.len()
    }

    /// Earliest deadline among pending deferred work.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.lock().scheduler.next_due()
    }

    /// Remove persisted records whose task is gone. Cancels the scheduled
    /// sweep if it has not run yet.
    pub fn sweep_orphans(&self) -> SweepReport {
        {
            let mut timers = self.timers.lock();
            if let Some(handle) = timers.sweep.take() {
                timers.scheduler.cancel(handle);
            }
        }

        let live = self.entity_ids();
        let report = self.sweeper.sweep(&live);

        self.feed.publish(ChangeEvent::SweepCompleted {
            removed: report.removed.len(),
        });
        report
    }

    // --- Change feed ---

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.feed.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.feed.unsubscribe(id)
    }

    // --- Private Helpers ---

    fn check_milestone(graph: &EntityGraph, milestone_id: &str, project_id: &str) -> Result<()> {
        match graph.milestones.get(milestone_id) {
            None => Err(WorkspaceError::MilestoneNotFound(milestone_id.to_string())),
            Some(m) if m.project_id != project_id => Err(WorkspaceError::InvalidEntity(format!(
                "milestone {} belongs to project {}, not {}",
                milestone_id, m.project_id, project_id
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Write-through for notes: non-blank values are stored with their write
    /// time, blank values remove both keys.
    fn write_notes(&self, task_id: &str, notes: &str, now: Timestamp) -> bool {
        if notes.trim().is_empty() {
            clear_field::<NotesSchemaV1>(&self.store, task_id)
        } else {
            write_field::<NotesSchemaV1>(&self.store, task_id, &notes.to_string(), now)
        }
    }

    fn persist_current_notes(&self, task_id: &str) {
        let graph = self.graph.read();
        match graph.tasks.get(task_id) {
            Some(task) => {
                tracing::debug!(task_id, "debounced notes write");
                self.write_notes(task_id, &task.notes, self.clock.now());
            }
            None => tracing::debug!(task_id, "dropping notes write for deleted task"),
        }
    }

    fn cancel_notes_writes(&self, task_ids: &[String]) {
        let mut timers = self.timers.lock();
        for id in task_ids {
            if let Some(handle) = timers.notes.remove(id) {
                timers.scheduler.cancel(handle);
            }
        }
    }

    fn publish_changed(&self, kind: EntityKind, id: &str) {
        self.feed.publish(ChangeEvent::EntityChanged {
            kind,
            id: id.to_string(),
        });
    }

    fn publish_deleted(&self, kind: EntityKind, id: &str) {
        self.feed.publish(ChangeEvent::EntityDeleted {
            kind,
            id: id.to_string(),
        });
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::kv::{KvBackend, MemoryBackend};
    use crate::types::TaskStatus;
    use std::time::Duration;

    const SEED: &str = r#"{
        "projects": [{"id": "p1", "name": "Website"}],
        "milestones": [{"id": "m1", "projectId": "p1", "title": "Beta"}],
        "tasks": [
            {"id": "t1", "projectId": "p1", "milestoneId": "m1", "title": "Design", "notes": "seed notes"},
            {"id": "t2", "projectId": "p1", "title": "Build", "status": "completed"}
        ]
    }"#;

    fn setup() -> (Workspace, MemoryBackend, ManualClock) {
        let backend = MemoryBackend::new();
        let clock = ManualClock::new(Timestamp(1_000_000));
        let workspace = Workspace::open_with_clock(
            Seed::from_json(SEED).unwrap(),
            PersistentStore::from_backend(backend.clone()),
            Arc::new(clock.clone()),
            WorkspaceConfig::default(),
        )
        .unwrap();
        (workspace, backend, clock)
    }

    #[test]
    fn test_update_notes_writes_through() {
        let (ws, backend, _clock) = setup();

        ws.update_task("t1", TaskPatch::notes("fresh")).unwrap();
        assert_eq!(backend.get("task-notes-t1").unwrap().as_deref(), Some("fresh"));
        assert_eq!(
            backend.get("task-notes-t1-timestamp").unwrap().as_deref(),
            Some("1000000")
        );

        ws.update_task("t1", TaskPatch::notes("   ")).unwrap();
        assert!(!backend.contains_key("task-notes-t1"));
        assert!(!backend.contains_key("task-notes-t1-timestamp"));
        assert_eq!(ws.get_task_by_id("t1").unwrap().notes, "   ");
    }

    #[test]
    fn test_edit_notes_debounces() {
        let (ws, backend, clock) = setup();

        ws.edit_notes("t1", "dr").unwrap();
        clock.advance(Duration::from_millis(300));
        ws.edit_notes("t1", "draft").unwrap();
        assert!(ws.has_pending_notes("t1"));

        clock.advance(Duration::from_millis(300));
        ws.tick();
        assert!(!backend.contains_key("task-notes-t1"));

        clock.advance(Duration::from_millis(200));
        ws.tick();
        assert_eq!(backend.get("task-notes-t1").unwrap().as_deref(), Some("draft"));
        assert!(!ws.has_pending_notes("t1"));
    }

    #[test]
    fn test_update_supersedes_pending_edit() {
        let (ws, backend, clock) = setup();

        ws.edit_notes("t1", "typing").unwrap();
        ws.update_task("t1", TaskPatch::notes("saved")).unwrap();
        assert!(!ws.has_pending_notes("t1"));

        clock.advance(Duration::from_secs(1));
        ws.tick();
        assert_eq!(backend.get("task-notes-t1").unwrap().as_deref(), Some("saved"));
    }

    #[test]
    fn test_flush_pending() {
        let (ws, backend, _clock) = setup();

        ws.edit_notes("t1", "a").unwrap();
        ws.edit_notes("t2", "b").unwrap();
        assert_eq!(ws.flush_pending(), 2);
        assert_eq!(backend.get("task-notes-t2").unwrap().as_deref(), Some("b"));
        assert_eq!(ws.flush_pending(), 0);
    }

    #[test]
    fn test_add_comment_sequences() {
        let (ws, backend, _clock) = setup();

        let first = ws.add_comment("t1", "one").unwrap().unwrap();
        let second = ws.add_comment("t1", "  two  ").unwrap().unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(second.content, "two");
        assert_eq!(second.author, "Current User");
        assert!(second.readonly);

        assert_eq!(ws.add_comment("t1", " \n ").unwrap(), None);
        assert!(matches!(
            ws.add_comment("missing", "x"),
            Err(WorkspaceError::TaskNotFound(_))
        ));

        let stored: Vec<Comment> =
            serde_json::from_str(&backend.get("task-comments-t1").unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(ws.get_task_by_id("t1").unwrap().comments_sequence, 2);
    }

    #[test]
    fn test_delete_project_cascades() {
        let (ws, _backend, _clock) = setup();
        ws.edit_notes("t1", "pending").unwrap();

        ws.delete_project("p1").unwrap();
        assert!(ws.get_task_by_id("t1").is_none());
        assert!(ws.get_milestone_by_id("m1").is_none());
        assert!(!ws.has_pending_notes("t1"));
        assert!(ws.entity_ids().is_empty());
        assert!(matches!(
            ws.delete_project("p1"),
            Err(WorkspaceError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_delete_milestone_detaches_tasks() {
        let (ws, _backend, _clock) = setup();

        ws.delete_milestone("m1").unwrap();
        let task = ws.get_task_by_id("t1").unwrap();
        assert_eq!(task.milestone_id, None);
        assert_eq!(ws.tasks_for_project("p1").len(), 2);
    }

    #[test]
    fn test_create_task_validates_references() {
        let (ws, _backend, _clock) = setup();

        assert!(matches!(
            ws.create_task(NewTask::new("nope", "x")),
            Err(WorkspaceError::ProjectNotFound(_))
        ));

        let other = ws.create_project(NewProject::named("Other"));
        let mut input = NewTask::new(other.id.clone(), "x");
        input.milestone_id = Some("m1".into());
        assert!(matches!(
            ws.create_task(input),
            Err(WorkspaceError::InvalidEntity(_))
        ));

        let task = ws.create_task(NewTask::new(other.id.clone(), "ok")).unwrap();
        assert_eq!(task.comments_sequence, 0);
        assert_eq!(ws.tasks_for_project(&other.id), vec![task]);
    }

    #[test]
    fn test_progress() {
        let (ws, _backend, _clock) = setup();
        assert_eq!(ws.calculate_dynamic_progress("p1"), 50);

        ws.create_task(NewTask::new("p1", "third")).unwrap();
        assert_eq!(ws.calculate_dynamic_progress("p1"), 33);

        ws.update_task("t1", TaskPatch::status(TaskStatus::Completed))
            .unwrap();
        assert_eq!(ws.calculate_dynamic_progress("p1"), 67);

        let empty = ws.create_project(NewProject::named("Empty"));
        assert_eq!(ws.calculate_dynamic_progress(&empty.id), 0);
        assert_eq!(ws.calculate_dynamic_progress("unknown"), 0);
    }

    #[test]
    fn test_scheduled_sweep_runs_once() {
        let (ws, backend, clock) = setup();
        backend.set("task-notes-gone", "stale").unwrap();

        assert_eq!(ws.next_deadline(), Some(Timestamp(1_002_000)));
        clock.advance(Duration::from_millis(1_999));
        assert_eq!(ws.tick(), 0);
        assert!(backend.contains_key("task-notes-gone"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(ws.tick(), 1);
        assert!(!backend.contains_key("task-notes-gone"));
        assert_eq!(ws.next_deadline(), None);
    }

    #[test]
    fn test_manual_sweep_cancels_scheduled() {
        let (ws, backend, _clock) = setup();
        backend.set("task-comments-gone", "[]").unwrap();

        let report = ws.sweep_orphans();
        assert_eq!(report.removed, vec!["task-comments-gone".to_string()]);
        assert_eq!(ws.next_deadline(), None);
    }

    #[test]
    fn test_events_published() {
        let (ws, _backend, _clock) = setup();
        let handle = ws.subscribe(SubscriptionConfig::default());

        ws.add_comment("t1", "hi").unwrap();
        ws.delete_task("t2").unwrap();

        assert_eq!(
            handle.drain(),
            vec![
                ChangeEvent::CommentAdded {
                    task_id: "t1".into(),
                    sequence: 1
                },
                ChangeEvent::EntityDeleted {
                    kind: EntityKind::Task,
                    id: "t2".into()
                },
            ]
        );
    }

    #[test]
    fn test_recover_notes_after_delete() {
        let (ws, _backend, _clock) = setup();
        ws.update_task("t2", TaskPatch::notes("keep me")).unwrap();
        ws.delete_task("t2").unwrap();

        assert_eq!(ws.recover_notes("t2").as_deref(), Some("keep me"));
        assert_eq!(ws.recover_notes("t1"), None);
    }
}
