//! Stored notifications, one row per recipient.

use super::{Database, now_ms};
use crate::notify::NotificationSink;
use crate::types::{Notification, StoredNotification};
use anyhow::Result;
use rusqlite::params;

impl NotificationSink for Database {
    fn send(&self, notification: &Notification) -> Result<()> {
        let now = now_ms();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for user_id in &notification.recipients {
                tx.execute(
                    "INSERT INTO notifications (user_id, kind, title, body, link, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        user_id,
                        notification.kind,
                        notification.title,
                        notification.body,
                        notification.link,
                        now,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}

impl Database {
    /// Notifications delivered to a user, newest first.
    pub fn notifications_for(&self, user_id: i64) -> Result<Vec<StoredNotification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, title, body, link, is_read, created_at
                 FROM notifications WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok(StoredNotification {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        title: row.get(3)?,
                        body: row.get(4)?,
                        link: row.get(5)?,
                        is_read: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
