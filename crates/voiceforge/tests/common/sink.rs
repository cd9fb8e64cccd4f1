//! Notification sink that records every call.

#![allow(dead_code)]

use std::sync::Mutex;

use voiceforge::notify::{JobNotification, NotificationSink};

#[derive(Default)]
pub struct CountingSink {
    received: Mutex<Vec<JobNotification>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn count_for(&self, job_id: &str) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.job_id == job_id)
            .count()
    }

    pub fn last(&self) -> Option<JobNotification> {
        self.received.lock().unwrap().last().cloned()
    }
}

impl NotificationSink for CountingSink {
    fn notify(&self, notification: &JobNotification) {
        self.received.lock().unwrap().push(notification.clone());
    }
}
