//! Core types for the planner.

use serde::{Deserialize, Serialize};

/// Job function of a user. Drives the two-letter prefix of task identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Designer,
    Copywriter,
    SocialMedia,
    Videographer,
    Marketing,
    /// Any role text the planner does not know about. Kept verbatim.
    Unknown(String),
}

/// Prefix used for roles without a dedicated code.
pub const FALLBACK_PREFIX: &str = "XX";

impl Role {
    /// Parse a stored role name. Unrecognized names become `Role::Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "designer" => Role::Designer,
            "copywriter" => Role::Copywriter,
            "social_media" => Role::SocialMedia,
            "videographer" => Role::Videographer,
            "marketing" => Role::Marketing,
            _ => Role::Unknown(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Designer => "designer",
            Role::Copywriter => "copywriter",
            Role::SocialMedia => "social_media",
            Role::Videographer => "videographer",
            Role::Marketing => "marketing",
            Role::Unknown(raw) => raw,
        }
    }

    /// Two-letter identifier prefix for this role.
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Admin => "AD",
            Role::Designer => "DG",
            Role::Copywriter => "CW",
            Role::SocialMedia => "SM",
            Role::Videographer => "VG",
            Role::Marketing => "MK",
            Role::Unknown(_) => FALLBACK_PREFIX,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::parse(&s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A planner user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub created_at: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Input for registering a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub role: Role,
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse a stored priority. Unrecognized values fall back to medium.
    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }
}

/// Marketing work category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Content,
    Design,
    SocialMedia,
    Campaign,
    Event,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Content => "content",
            Category::Design => "design",
            Category::SocialMedia => "social_media",
            Category::Campaign => "campaign",
            Category::Event => "event",
            Category::Other => "other",
        }
    }

    /// Parse a stored category. Unrecognized values fall back to other.
    pub fn parse(s: &str) -> Self {
        match s {
            "content" => Category::Content,
            "design" => Category::Design,
            "social_media" => Category::SocialMedia,
            "campaign" => Category::Campaign,
            "event" => Category::Event,
            _ => Category::Other,
        }
    }
}

/// A unit of work, or a super task grouping other tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    /// Human-readable identifier, e.g. `DGnov00125`.
    pub task_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    pub status: TaskStatus,
    pub start_at: Option<i64>,
    pub due_at: Option<i64>,
    pub created_by: i64,
    /// Primary assignee. Super tasks have none.
    pub assigned_to: Option<i64>,
    pub assignees: Vec<i64>,
    pub parent_task_id: Option<i64>,
    pub is_super_task: bool,
    pub admin_approved: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_assigned(&self, user_id: i64) -> bool {
        self.assignees.contains(&user_id)
    }
}

/// A task together with its children (empty unless it is a super task).
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<Task>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub start_at: Option<i64>,
    pub due_at: Option<i64>,
    /// First entry becomes the primary assignee.
    #[serde(default)]
    pub assignees: Vec<i64>,
}

/// Partial update of a task. An empty description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub start_at: Option<i64>,
    pub due_at: Option<i64>,
    pub assignees: Option<Vec<i64>>,
}

/// Filters for listing tasks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee: Option<i64>,
    pub parent: Option<i64>,
    #[serde(default)]
    pub super_only: bool,
}

/// A message to deliver to a set of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipients: Vec<i64>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

impl Notification {
    /// Build a notification for `candidates`, deduplicated and without the actor.
    pub fn for_users(
        candidates: impl IntoIterator<Item = i64>,
        actor_id: i64,
        kind: &str,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let mut recipients: Vec<i64> = Vec::new();
        for id in candidates {
            if id != actor_id && !recipients.contains(&id) {
                recipients.push(id);
            }
        }
        Self {
            recipients,
            kind: kind.to_string(),
            title: title.into(),
            body: body.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// A notification row as stored for one recipient.
#[derive(Debug, Clone, Serialize)]
pub struct StoredNotification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: i64,
}

/// Result of a mutation plus the notifications it should trigger.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            notifications: Vec::new(),
        }
    }

    pub fn notify(mut self, notification: Notification) -> Self {
        if !notification.recipients.is_empty() {
            self.notifications.push(notification);
        }
        self
    }

    pub fn notify_opt(self, notification: Option<Notification>) -> Self {
        match notification {
            Some(n) => self.notify(n),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_map_to_fixed_prefixes() {
        assert_eq!(Role::parse("designer").prefix(), "DG");
        assert_eq!(Role::parse("Admin").prefix(), "AD");
        assert_eq!(Role::parse("social_media").prefix(), "SM");
    }

    #[test]
    fn unknown_role_keeps_raw_text_and_falls_back() {
        let role = Role::parse("intern");
        assert_eq!(role, Role::Unknown("intern".to_string()));
        assert_eq!(role.prefix(), FALLBACK_PREFIX);
        assert_eq!(String::from(role), "intern");
    }

    #[test]
    fn notification_recipients_skip_actor_and_duplicates() {
        let n = Notification::for_users([3, 1, 3, 2, 1], 2, "kind", "t", "b");
        assert_eq!(n.recipients, vec![3, 1]);
    }

    #[test]
    fn outcome_drops_notifications_without_recipients() {
        let empty = Notification::for_users([7], 7, "kind", "t", "b");
        let outcome = Outcome::new(()).notify(empty);
        assert!(outcome.notifications.is_empty());
    }
}
