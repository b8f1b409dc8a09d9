//! Core types for the task board.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as i64)
    }

    /// Milliseconds elapsed from `earlier` to `self` (negative if `earlier` is in the future).
    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// This timestamp shifted forward by `delay`.
    pub fn after(self, delay: Duration) -> Self {
        Timestamp(self.0.saturating_add(delay.as_millis() as i64))
    }

    /// Convert to a UTC date-time. Out-of-range values clamp to the epoch.
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of entity held by the workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Milestone,
    Task,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => write!(f, "project"),
            EntityKind::Milestone => write!(f, "milestone"),
            EntityKind::Task => write!(f, "task"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    OnHold,
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A project on the board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// A dated checkpoint inside a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
}

/// A unit of work. Owns the two persisted fields: `notes` and `comments`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Free-text notes, mirrored to the durable store.
    #[serde(default)]
    pub notes: String,

    /// Append-only comment log in append order.
    #[serde(default)]
    pub comments: Vec<Comment>,

    /// Highest comment sequence issued for this task (0 if none).
    #[serde(default)]
    pub comments_sequence: u64,
}

impl Task {
    /// Highest sequence present in the comment list, or 0.
    pub fn max_comment_sequence(&self) -> u64 {
        self.comments.iter().map(|c| c.sequence).max().unwrap_or(0)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// An immutable journal entry attached to a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub sequence: u64,
    pub readonly: bool,
}

impl Comment {
    /// Create a new read-only comment with a fresh identifier.
    pub fn new(content: impl Into<String>, author: impl Into<String>, sequence: u64, at: Timestamp) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            created_at: at.to_datetime(),
            author: author.into(),
            sequence,
            readonly: true,
        }
    }
}

/// Input for creating a project.
#[derive(Clone, Debug, Default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub owner: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl NewProject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Input for creating a milestone.
#[derive(Clone, Debug, Default)]
pub struct NewMilestone {
    pub project_id: String,
    pub title: String,
    pub due_date: Option<NaiveDate>,
}

/// Input for creating a task.
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    pub project_id: String,
    pub milestone_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Partial update for a project. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub owner: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
}

/// Partial update for a milestone.
#[derive(Clone, Debug, Default)]
pub struct MilestonePatch {
    pub title: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
}

/// Partial update for a task.
///
/// Setting `notes` triggers a write-through to the durable store.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assignee: Option<Option<String>>,
    pub milestone_id: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub notes: Option<String>,
}

impl TaskPatch {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Default::default()
        }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Initial entity graph the workspace hydrates from.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Seed {
    /// Parse a seed from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp(10_000);
        assert_eq!(t.after(Duration::from_secs(1)), Timestamp(11_000));
        assert_eq!(t.millis_since(Timestamp(4_000)), 6_000);
        assert_eq!(Timestamp(4_000).millis_since(t), -6_000);
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let dt = Timestamp(1_700_000_000_123).to_datetime();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_comment_json_shape() {
        let comment = Comment::new("hello", "Ada", 1, Timestamp(0));
        let value = serde_json::to_value(&comment).unwrap();
        assert_eq!(value["content"], "hello");
        assert_eq!(value["author"], "Ada");
        assert_eq!(value["sequence"], 1);
        assert_eq!(value["readonly"], true);
        assert!(value["createdAt"].as_str().unwrap().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_seed_from_json() {
        let seed = Seed::from_json(
            r#"{
                "projects": [{"id": "p1", "name": "Website"}],
                "tasks": [{"id": "t1", "projectId": "p1", "title": "Design", "status": "in-progress"}]
            }"#,
        )
        .unwrap();

        assert_eq!(seed.projects.len(), 1);
        assert_eq!(seed.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(seed.tasks[0].notes, "");
        assert!(seed.tasks[0].comments.is_empty());
        assert!(seed.milestones.is_empty());
    }

    #[test]
    fn test_max_comment_sequence() {
        let mut task: Task = serde_json::from_str(r#"{"id": "t", "projectId": "p", "title": "x"}"#).unwrap();
        assert_eq!(task.max_comment_sequence(), 0);
        task.comments.push(Comment::new("a", "me", 3, Timestamp(0)));
        task.comments.push(Comment::new("b", "me", 7, Timestamp(0)));
        assert_eq!(task.max_comment_sequence(), 7);
    }
}
