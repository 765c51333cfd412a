use crate::import::ports::{
    NavigationTarget, Notification, NotificationSink, Variant, WorkflowNavigator,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps notifications until the host drains them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *lock(&self.notifications))
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            Variant::Success => info!(title = %notification.title, "{}", notification.message),
            Variant::Error => warn!(title = %notification.title, "{}", notification.message),
        }

        lock(&self.notifications).push(notification);
    }
}

/// Remembers where the workflow was last sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    last: Arc<Mutex<Option<NavigationTarget>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<NavigationTarget> {
        lock(&self.last).clone()
    }

    fn record(&self, target: NavigationTarget) {
        info!(?target, "Workflow navigation");
        *lock(&self.last) = Some(target);
    }
}

impl WorkflowNavigator for RecordingNavigator {
    fn finish(&self) {
        self.record(NavigationTarget::Finish);
    }

    fn redirect(&self, url: &str) {
        self.record(NavigationTarget::Redirect {
            url: url.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_queue() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notification::success("ok"));
        notifier.notify(Notification::error("Error", "bad"));

        assert_eq!(notifier.snapshot().len(), 2);
        assert_eq!(notifier.drain().len(), 2);
        assert!(notifier.drain().is_empty());
    }

    #[test]
    fn navigator_keeps_latest_target() {
        let navigator = RecordingNavigator::new();
        assert_eq!(navigator.last(), None);
        navigator.finish();
        navigator.redirect("/review?batchId=b1");
        assert_eq!(
            navigator.last(),
            Some(NavigationTarget::Redirect {
                url: "/review?batchId=b1".to_string()
            })
        );
    }
}
