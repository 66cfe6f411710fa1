//! Super tasks: grouping independent tasks and propagating completion.
//!
//! A super task is a plain task row with `is_super_task = 1`. Children point at
//! it through `parent_task_id`; grouping is one level deep. The parent's status
//! is derived: it completes (pre-approved) once every child is completed and
//! drops back to `in_progress` as soon as a child leaves `completed`.

use super::counters::allocate_identifier;
use super::tasks::{get_children_internal, get_task_internal, insert_assignees, require_task};
use super::{Database, now_ms};
use crate::error::AppError;
use crate::types::{Category, Notification, Outcome, Priority, Task, TaskStatus, User};
use anyhow::Result;
use rusqlite::{Connection, params};
use tracing::{debug, info};

/// Check that `task` can join a super task.
fn ensure_groupable(task: &Task) -> Result<()> {
    if task.is_super_task {
        return Err(AppError::is_super_task(&task.task_id).into());
    }
    if let Some(parent_id) = task.parent_task_id {
        return Err(AppError::already_grouped(&task.task_id, parent_id).into());
    }
    Ok(())
}

fn set_parent(conn: &Connection, task_id: i64, parent: Option<i64>, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET parent_task_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![parent, now, task_id],
    )?;
    Ok(())
}

/// Re-derive the parent's status after `child` moved from `previous` to its
/// current status.
///
/// Runs inside the caller's transaction. Returns the notification to send when
/// the parent auto-completes. A completed parent is only reopened when the
/// child itself leaves `completed`.
pub(crate) fn propagate_child_status(
    conn: &Connection,
    actor: &User,
    child: &Task,
    previous: TaskStatus,
    now: i64,
) -> Result<Option<Notification>> {
    let Some(parent_id) = child.parent_task_id else {
        return Ok(None);
    };
    let Some(parent) = get_task_internal(conn, parent_id)? else {
        return Ok(None);
    };
    if !parent.is_super_task {
        return Ok(None);
    }

    if child.is_completed() {
        if parent.is_completed() && parent.admin_approved {
            return Ok(None);
        }
        let children = get_children_internal(conn, parent.id)?;
        let done = children.iter().filter(|c| c.is_completed()).count();
        debug!(
            super_task = parent.id,
            done,
            total = children.len(),
            "Checked super task completion"
        );
        if children.is_empty() || done < children.len() {
            return Ok(None);
        }

        conn.execute(
            "UPDATE tasks SET status = ?1, admin_approved = 1, updated_at = ?2 WHERE id = ?3",
            params![TaskStatus::Completed.as_str(), now, parent.id],
        )?;
        info!(super_task = parent.id, task_id = %parent.task_id, "Super task auto-completed");

        let notification = Notification::for_users(
            parent.assignees.iter().copied(),
            actor.id,
            "super_task_completed",
            "Super task completed",
            format!(
                "All tasks in {} ({}) are completed",
                parent.task_id, parent.title
            ),
        )
        .with_link(format!("/tasks/{}", parent.id));
        return Ok(Some(notification));
    }

    if previous == TaskStatus::Completed && parent.is_completed() {
        conn.execute(
            "UPDATE tasks SET status = ?1, admin_approved = 0, updated_at = ?2 WHERE id = ?3",
            params![TaskStatus::InProgress.as_str(), now, parent.id],
        )?;
        info!(
            super_task = parent.id,
            task_id = %parent.task_id,
            child = child.id,
            "Super task reopened"
        );
    }

    Ok(None)
}

impl Database {
    /// Group at least two ungrouped, ordinary tasks under a new super task.
    ///
    /// Every task is checked before anything is written; the first failing
    /// task aborts the whole operation.
    pub fn create_super_task(
        &self,
        actor: &User,
        title: &str,
        task_ids: &[i64],
    ) -> Result<Outcome<Task>> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::missing_field("title").into());
        }
        if task_ids.len() < 2 {
            return Err(AppError::invalid_value(
                "task_ids",
                "At least 2 tasks are required to create a super task",
            )
            .into());
        }
        if task_ids
            .iter()
            .enumerate()
            .any(|(i, id)| task_ids[..i].contains(id))
        {
            return Err(AppError::invalid_value("task_ids", "task_ids must not repeat a task").into());
        }

        let now = now_ms();
        let offset = self.utc_offset();

        let (super_task, members) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut members = Vec::with_capacity(task_ids.len());
            for &id in task_ids {
                let task = require_task(&tx, id)?;
                ensure_groupable(&task)?;
                members.push(task);
            }

            let mut assignees: Vec<i64> = Vec::new();
            for uid in members.iter().flat_map(|t| t.assignees.iter().copied()) {
                if !assignees.contains(&uid) {
                    assignees.push(uid);
                }
            }

            let identifier = allocate_identifier(&tx, &actor.role, now, offset)?.to_string();
            tx.execute(
                "INSERT INTO tasks (
                    task_id, title, priority, category, status,
                    created_by, is_super_task, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
                params![
                    identifier,
                    title,
                    Priority::default().as_str(),
                    Category::default().as_str(),
                    TaskStatus::Pending.as_str(),
                    actor.id,
                    now,
                    now,
                ],
            )?;
            let super_id = tx.last_insert_rowid();
            insert_assignees(&tx, super_id, &assignees)?;

            for member in &mut members {
                set_parent(&tx, member.id, Some(super_id), now)?;
                member.parent_task_id = Some(super_id);
                member.updated_at = now;
            }

            tx.commit()?;

            let super_task = Task {
                id: super_id,
                task_id: identifier,
                title,
                description: None,
                priority: Priority::default(),
                category: Category::default(),
                status: TaskStatus::Pending,
                start_at: None,
                due_at: None,
                created_by: actor.id,
                assigned_to: None,
                assignees,
                parent_task_id: None,
                is_super_task: true,
                admin_approved: false,
                created_at: now,
                updated_at: now,
            };
            Ok((super_task, members))
        })?;

        info!(
            super_task = super_task.id,
            task_id = %super_task.task_id,
            children = members.len(),
            actor = actor.id,
            "Created super task"
        );

        let notification = Notification::for_users(
            super_task.assignees.iter().copied(),
            actor.id,
            "super_task_created",
            "Tasks grouped",
            format!(
                "{} grouped {} tasks into {} ({})",
                actor.name,
                members.len(),
                super_task.task_id,
                super_task.title
            ),
        )
        .with_link(format!("/tasks/{}", super_task.id));

        Ok(Outcome::new(super_task).notify(notification))
    }

    /// Attach an ungrouped, ordinary task to an existing super task.
    ///
    /// The task's assignees join the super task's assignee set.
    pub fn add_task_to_super_task(
        &self,
        actor: &User,
        super_task_id: i64,
        task_id: i64,
    ) -> Result<Outcome<Task>> {
        let now = now_ms();

        let (task, parent) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let parent = get_task_internal(&tx, super_task_id)?
                .ok_or_else(|| AppError::super_task_not_found(super_task_id))?;
            if !parent.is_super_task {
                return Err(AppError::not_super_task(&parent.task_id).into());
            }
            let mut task = require_task(&tx, task_id)?;
            ensure_groupable(&task)?;

            set_parent(&tx, task.id, Some(parent.id), now)?;
            insert_assignees(&tx, parent.id, &task.assignees)?;

            tx.commit()?;

            task.parent_task_id = Some(parent.id);
            task.updated_at = now;
            Ok((task, parent))
        })?;

        info!(
            super_task = parent.id,
            task = task.id,
            actor = actor.id,
            "Added task to super task"
        );

        let notification = Notification::for_users(
            task.assignees.iter().copied(),
            actor.id,
            "super_task_added",
            "Task grouped",
            format!(
                "{} added {} to {} ({})",
                actor.name, task.task_id, parent.task_id, parent.title
            ),
        )
        .with_link(format!("/tasks/{}", parent.id));

        Ok(Outcome::new(task).notify(notification))
    }

    /// Detach a task from its super task.
    ///
    /// The former parent's status is left as it is, even when the remaining
    /// children are now all completed.
    pub fn remove_task_from_super_task(&self, actor: &User, task_id: i64) -> Result<Task> {
        let now = now_ms();

        let (task, former_parent) = self.with_conn(|conn| {
            let mut task = require_task(conn, task_id)?;
            let Some(parent_id) = task.parent_task_id else {
                return Err(AppError::not_grouped(&task.task_id).into());
            };

            set_parent(conn, task.id, None, now)?;

            task.parent_task_id = None;
            task.updated_at = now;
            Ok((task, parent_id))
        })?;

        info!(
            super_task = former_parent,
            task = task.id,
            actor = actor.id,
            "Removed task from super task"
        );
        Ok(task)
    }
}
