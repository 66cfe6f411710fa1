//! Task CRUD and status transitions.

use super::counters::allocate_identifier;
use super::grouping::propagate_child_status;
use super::users::get_user_internal;
use super::{Database, now_ms};
use crate::error::AppError;
use crate::types::{
    Category, NewTask, Notification, Outcome, Priority, Task, TaskDetail, TaskFilter, TaskStatus,
    TaskUpdate, User,
};
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::info;

/// Parse a task row. Assignees live in their own table and are filled in later.
pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let category: String = row.get("category")?;
    let status: String = row.get("status")?;

    Ok(Task {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: Priority::parse(&priority),
        category: Category::parse(&category),
        status: TaskStatus::parse(&status).unwrap_or_default(),
        start_at: row.get("start_at")?,
        due_at: row.get("due_at")?,
        created_by: row.get("created_by")?,
        assigned_to: row.get("assigned_to")?,
        assignees: Vec::new(),
        parent_task_id: row.get("parent_task_id")?,
        is_super_task: row.get("is_super_task")?,
        admin_approved: row.get("admin_approved")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn load_assignees(conn: &Connection, task_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM task_assignees WHERE task_id = ?1 ORDER BY rowid",
    )?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Add assignees that are not already on the task.
pub(crate) fn insert_assignees(conn: &Connection, task_id: i64, user_ids: &[i64]) -> Result<()> {
    for user_id in user_ids {
        conn.execute(
            "INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?1, ?2)",
            params![task_id, user_id],
        )?;
    }
    Ok(())
}

fn with_assignees(conn: &Connection, mut tasks: Vec<Task>) -> Result<Vec<Task>> {
    for task in &mut tasks {
        task.assignees = load_assignees(conn, task.id)?;
    }
    Ok(tasks)
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let task = conn
        .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], parse_task_row)
        .optional()?;
    match task {
        Some(mut task) => {
            task.assignees = load_assignees(conn, task.id)?;
            Ok(Some(task))
        }
        None => Ok(None),
    }
}

pub(crate) fn require_task(conn: &Connection, id: i64) -> Result<Task> {
    get_task_internal(conn, id)?.ok_or_else(|| AppError::task_not_found(id).into())
}

/// Direct children of a super task, oldest first.
pub(crate) fn get_children_internal(conn: &Connection, parent_id: i64) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM tasks WHERE parent_task_id = ?1 ORDER BY created_at, id",
    )?;
    let tasks = stmt
        .query_map(params![parent_id], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    with_assignees(conn, tasks)
}

/// Deduplicate assignee ids keeping first-seen order, and check they exist.
/// Returns the resolved users; the first one is the primary assignee.
fn resolve_assignees(conn: &Connection, ids: &[i64]) -> Result<Vec<User>> {
    let mut users: Vec<User> = Vec::new();
    for &id in ids {
        if users.iter().any(|u| u.id == id) {
            continue;
        }
        let user = get_user_internal(conn, id)?
            .ok_or_else(|| AppError::user_not_found(id).with_field("assignees"))?;
        users.push(user);
    }
    Ok(users)
}

fn validate_schedule(start_at: Option<i64>, due_at: Option<i64>) -> Result<()> {
    match (start_at, due_at) {
        (Some(start), Some(due)) if due < start => {
            Err(AppError::invalid_value("due_at", "due_at must not be before start_at").into())
        }
        _ => Ok(()),
    }
}

fn can_touch_status(actor: &User, task: &Task) -> bool {
    actor.is_admin() || task.created_by == actor.id || task.is_assigned(actor.id)
}

impl Database {
    /// Create a task and allocate its identifier.
    ///
    /// The identifier comes from the primary assignee's role and the current
    /// month. Counter increment, task row and assignee rows commit together.
    pub fn create_task(&self, actor: &User, input: NewTask) -> Result<Outcome<Task>> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::missing_field("title").into());
        }
        if input.assignees.is_empty() {
            return Err(AppError::invalid_value(
                "assignees",
                "A task needs at least one assignee",
            )
            .into());
        }
        validate_schedule(input.start_at, input.due_at)?;

        let now = now_ms();
        let offset = self.utc_offset();
        let priority = input.priority.unwrap_or_default();
        let category = input.category.unwrap_or_default();
        let description = input.description.filter(|d| !d.trim().is_empty());

        let task = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let assignees = resolve_assignees(&tx, &input.assignees)?;
            let primary = &assignees[0];
            let identifier = allocate_identifier(&tx, &primary.role, now, offset)?.to_string();

            tx.execute(
                "INSERT INTO tasks (
                    task_id, title, description, priority, category, status,
                    start_at, due_at, created_by, assigned_to, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    identifier,
                    title,
                    description,
                    priority.as_str(),
                    category.as_str(),
                    TaskStatus::Pending.as_str(),
                    input.start_at,
                    input.due_at,
                    actor.id,
                    primary.id,
                    now,
                    now,
                ],
            )?;
            let id = tx.last_insert_rowid();
            let assignee_ids: Vec<i64> = assignees.iter().map(|u| u.id).collect();
            insert_assignees(&tx, id, &assignee_ids)?;

            tx.commit()?;

            Ok(Task {
                id,
                task_id: identifier,
                title,
                description,
                priority,
                category,
                status: TaskStatus::Pending,
                start_at: input.start_at,
                due_at: input.due_at,
                created_by: actor.id,
                assigned_to: Some(primary.id),
                assignees: assignee_ids,
                parent_task_id: None,
                is_super_task: false,
                admin_approved: false,
                created_at: now,
                updated_at: now,
            })
        })?;

        info!(id = task.id, task_id = %task.task_id, actor = actor.id, "Created task");

        let notification = Notification::for_users(
            task.assignees.iter().copied(),
            actor.id,
            "task_assigned",
            "New task assigned",
            format!("{} assigned you {}: {}", actor.name, task.task_id, task.title),
        )
        .with_link(format!("/tasks/{}", task.id));

        Ok(Outcome::new(task).notify(notification))
    }

    /// Get a task by numeric id.
    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, id))
    }

    /// Get a task with its children.
    pub fn get_task_detail(&self, id: i64) -> Result<Option<TaskDetail>> {
        self.with_conn(|conn| {
            let Some(task) = get_task_internal(conn, id)? else {
                return Ok(None);
            };
            let children = if task.is_super_task {
                get_children_internal(conn, task.id)?
            } else {
                Vec::new()
            };
            Ok(Some(TaskDetail { task, children }))
        })
    }

    /// Get a task by its human-readable identifier.
    pub fn get_task_by_identifier(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM tasks WHERE task_id = ?1",
                    params![task_id],
                    |row| row.get(0),
                )
                .optional()?;
            match id {
                Some(id) => get_task_internal(conn, id),
                None => Ok(None),
            }
        })
    }

    /// Direct children of a super task.
    pub fn get_children(&self, parent_id: i64) -> Result<Vec<Task>> {
        self.with_conn(|conn| get_children_internal(conn, parent_id))
    }

    /// List tasks, newest first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut sql = String::from("SELECT t.* FROM tasks t WHERE 1=1");
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND t.status = ?");
            values.push(Value::from(status.as_str().to_string()));
        }
        if let Some(assignee) = filter.assignee {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM task_assignees a WHERE a.task_id = t.id AND a.user_id = ?)",
            );
            values.push(Value::from(assignee));
        }
        if let Some(parent) = filter.parent {
            sql.push_str(" AND t.parent_task_id = ?");
            values.push(Value::from(parent));
        }
        if filter.super_only {
            sql.push_str(" AND t.is_super_task = 1");
        }
        sql.push_str(" ORDER BY t.created_at DESC, t.id DESC");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_from_iter(values.iter()), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            with_assignees(conn, tasks)
        })
    }

    /// Edit task fields. Allowed for the creator and admins.
    ///
    /// The identifier is fixed at creation and does not follow reassignment.
    pub fn update_task(&self, actor: &User, id: i64, update: TaskUpdate) -> Result<Outcome<Task>> {
        let now = now_ms();

        let (task, added) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = require_task(&tx, id)?;

            if !actor.is_admin() && task.created_by != actor.id {
                return Err(AppError::forbidden("Only the creator or an admin can edit a task").into());
            }

            let title = match update.title {
                Some(t) if t.trim().is_empty() => {
                    return Err(AppError::invalid_value("title", "title must not be empty").into());
                }
                Some(t) => t.trim().to_string(),
                None => task.title.clone(),
            };
            let description = match update.description {
                Some(d) if d.trim().is_empty() => None,
                Some(d) => Some(d),
                None => task.description.clone(),
            };
            let start_at = update.start_at.or(task.start_at);
            let due_at = update.due_at.or(task.due_at);
            validate_schedule(start_at, due_at)?;

            let mut assigned_to = task.assigned_to;
            let mut assignees = task.assignees.clone();
            let mut added = Vec::new();
            if let Some(ids) = update.assignees {
                if ids.is_empty() && !task.is_super_task {
                    return Err(AppError::invalid_value(
                        "assignees",
                        "A task needs at least one assignee",
                    )
                    .into());
                }
                let users = resolve_assignees(&tx, &ids)?;
                let new_ids: Vec<i64> = users.iter().map(|u| u.id).collect();
                added = new_ids
                    .iter()
                    .copied()
                    .filter(|uid| !task.assignees.contains(uid))
                    .collect();
                tx.execute("DELETE FROM task_assignees WHERE task_id = ?1", params![id])?;
                insert_assignees(&tx, id, &new_ids)?;
                if !task.is_super_task {
                    assigned_to = new_ids.first().copied();
                }
                assignees = new_ids;
            }

            let updated = Task {
                title,
                description,
                priority: update.priority.unwrap_or(task.priority),
                category: update.category.unwrap_or(task.category),
                start_at,
                due_at,
                assigned_to,
                assignees,
                updated_at: now,
                ..task
            };

            tx.execute(
                "UPDATE tasks SET
                    title = ?1, description = ?2, priority = ?3, category = ?4,
                    start_at = ?5, due_at = ?6, assigned_to = ?7, updated_at = ?8
                WHERE id = ?9",
                params![
                    updated.title,
                    updated.description,
                    updated.priority.as_str(),
                    updated.category.as_str(),
                    updated.start_at,
                    updated.due_at,
                    updated.assigned_to,
                    now,
                    id,
                ],
            )?;

            tx.commit()?;
            Ok((updated, added))
        })?;

        info!(id = task.id, actor = actor.id, "Updated task");

        let notification = Notification::for_users(
            added,
            actor.id,
            "task_assigned",
            "New task assigned",
            format!("{} assigned you {}: {}", actor.name, task.task_id, task.title),
        )
        .with_link(format!("/tasks/{}", task.id));

        Ok(Outcome::new(task).notify(notification))
    }

    /// Change a task's status and propagate completion to its super task.
    ///
    /// Completion by an admin is approved right away; completion by anyone
    /// else waits for approval. Super tasks follow their children and only
    /// admins may set their status directly.
    pub fn update_status(&self, actor: &User, id: i64, status: TaskStatus) -> Result<Outcome<Task>> {
        let now = now_ms();

        let (task, previous, cascade) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = require_task(&tx, id)?;

            if !can_touch_status(actor, &task) {
                return Err(AppError::forbidden(
                    "Only assignees, the creator or an admin can change the status",
                )
                .into());
            }
            if task.is_super_task && !actor.is_admin() {
                return Err(AppError::invalid_state(format!(
                    "Status of super task {} follows its children",
                    task.task_id
                ))
                .into());
            }
            if task.status == status {
                return Ok((task, status, None));
            }

            let approved = status == TaskStatus::Completed && actor.is_admin();
            tx.execute(
                "UPDATE tasks SET status = ?1, admin_approved = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.as_str(), approved, now, id],
            )?;

            let previous = task.status;
            let task = Task {
                status,
                admin_approved: approved,
                updated_at: now,
                ..task
            };
            let cascade = propagate_child_status(&tx, actor, &task, previous, now)?;

            tx.commit()?;
            Ok((task, previous, cascade))
        })?;

        if previous == status {
            return Ok(Outcome::new(task));
        }

        info!(
            id = task.id,
            task_id = %task.task_id,
            from = previous.as_str(),
            to = status.as_str(),
            actor = actor.id,
            "Task status changed"
        );

        let notification = Notification::for_users(
            [task.created_by],
            actor.id,
            "task_status",
            "Task status updated",
            format!("{} moved {} to {}", actor.name, task.task_id, status.as_str()),
        )
        .with_link(format!("/tasks/{}", task.id));

        Ok(Outcome::new(task).notify(notification).notify_opt(cascade))
    }

    /// Ratify a completed task. Admin only.
    pub fn approve_task(&self, actor: &User, id: i64) -> Result<Outcome<Task>> {
        if !actor.is_admin() {
            return Err(AppError::forbidden("Only an admin can approve tasks").into());
        }
        let now = now_ms();

        let task = self.with_conn(|conn| {
            let task = require_task(conn, id)?;
            if !task.is_completed() {
                return Err(AppError::invalid_state(format!(
                    "Task {} is not completed",
                    task.task_id
                ))
                .into());
            }
            conn.execute(
                "UPDATE tasks SET admin_approved = 1, updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(Task {
                admin_approved: true,
                updated_at: now,
                ..task
            })
        })?;

        info!(id = task.id, actor = actor.id, "Approved task");

        let notification = Notification::for_users(
            task.assignees.iter().copied(),
            actor.id,
            "task_approved",
            "Task approved",
            format!("{} approved {}", actor.name, task.task_id),
        )
        .with_link(format!("/tasks/{}", task.id));

        Ok(Outcome::new(task).notify(notification))
    }

    /// Delete a task. Admin only. Children of a deleted super task are detached.
    pub fn delete_task(&self, actor: &User, id: i64) -> Result<()> {
        if !actor.is_admin() {
            return Err(AppError::forbidden("Only an admin can delete tasks").into());
        }
        let now = now_ms();

        let detached = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_task(&tx, id)?;
            let detached = tx.execute(
                "UPDATE tasks SET parent_task_id = NULL, updated_at = ?1 WHERE parent_task_id = ?2",
                params![now, id],
            )?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(detached)
        })?;

        info!(id, actor = actor.id, detached, "Deleted task");
        Ok(())
    }
}
