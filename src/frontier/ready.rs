use crate::util::lock;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// FIFO of site keys whose queues are eligible for dispatch
///
/// Keys are served in publish order. Waiting workers park on the
/// `queue ready` signal; each publish wakes one of them.
#[derive(Default)]
pub(crate) struct ReadyRegister {
    keys: Mutex<VecDeque<String>>,
    queue_ready: Notify,
}

impl ReadyRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key and wakes one waiting worker
    pub fn publish(&self, key: &str) {
        lock(&self.keys).push_back(key.to_string());
        self.queue_ready.notify_one();
    }

    /// Takes the oldest key without waiting
    pub fn poll(&self) -> Option<String> {
        lock(&self.keys).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.keys).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.keys).is_empty()
    }

    /// Future resolving on the next wakeup; enable it before checking state
    pub fn notified(&self) -> Notified<'_> {
        self.queue_ready.notified()
    }

    pub fn notify_one(&self) {
        self.queue_ready.notify_one();
    }

    /// Wakes every worker currently waiting
    pub fn notify_all(&self) {
        self.queue_ready.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_publish_order() {
        let ready = ReadyRegister::new();
        ready.publish("a.com");
        ready.publish("b.com");

        assert_eq!(ready.len(), 2);
        assert_eq!(ready.poll().as_deref(), Some("a.com"));
        assert_eq!(ready.poll().as_deref(), Some("b.com"));
        assert!(ready.poll().is_none());
        assert!(ready.is_empty());
    }

    #[tokio::test]
    async fn test_publish_wakes_waiter() {
        let ready = Arc::new(ReadyRegister::new());
        let waiter = {
            let ready = ready.clone();
            tokio::spawn(async move {
                ready.notified().await;
                ready.poll()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        ready.publish("a.com");

        let key = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(key.as_deref(), Some("a.com"));
    }

    #[tokio::test]
    async fn test_enabled_waiter_sees_notify_all() {
        let ready = ReadyRegister::new();
        let notified = ready.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        ready.notify_all();
        tokio::time::timeout(Duration::from_secs(1), notified)
            .await
            .expect("enabled waiter should be woken");
    }
}
