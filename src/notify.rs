//! Notification dispatch.
//!
//! Mutations return the notifications they trigger; callers hand them to a
//! sink after the mutation has committed. Delivery failures are logged and
//! never undo the mutation.

use crate::types::Notification;
use anyhow::Result;
use tracing::{debug, warn};

/// Destination for notifications.
pub trait NotificationSink: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Deliver each notification, logging (not returning) failures.
pub fn dispatch(sink: &dyn NotificationSink, notifications: &[Notification]) {
    for notification in notifications {
        if notification.recipients.is_empty() {
            continue;
        }
        match sink.send(notification) {
            Ok(()) => debug!(
                kind = %notification.kind,
                recipients = notification.recipients.len(),
                "Dispatched notification"
            ),
            Err(e) => warn!(
                kind = %notification.kind,
                error = %e,
                "Failed to dispatch notification"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        fail_kind: Option<&'static str>,
    }

    impl NotificationSink for Recorder {
        fn send(&self, notification: &Notification) -> Result<()> {
            if self.fail_kind == Some(notification.kind.as_str()) {
                return Err(anyhow!("sink unavailable"));
            }
            self.sent.lock().unwrap().push(notification.kind.clone());
            Ok(())
        }
    }

    #[test]
    fn failures_do_not_stop_remaining_notifications() {
        let sink = Recorder {
            fail_kind: Some("first"),
            ..Default::default()
        };
        let batch = vec![
            Notification::for_users([1], 0, "first", "t", "b"),
            Notification::for_users([2], 0, "second", "t", "b"),
        ];
        dispatch(&sink, &batch);
        assert_eq!(*sink.sent.lock().unwrap(), vec!["second".to_string()]);
    }

    #[test]
    fn notifications_without_recipients_are_skipped() {
        let sink = Recorder::default();
        dispatch(&sink, &[Notification::for_users([5], 5, "self", "t", "b")]);
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
