//! Notification persistence and UI-facing reads.
//!
//! Derivation happens in the stream projector; this store owns
//! .polis/notifications/notifications.json and the read state. Merging a
//! projection replay updates message/payload in place and never touches
//! `read_at`.

use chrono::Utc;
use std::fs;
use std::sync::Mutex;

use polis_protocol::{Notification, PolisError, Result, SitePaths};
use polis_store::fsutil;

/// Page of notifications plus the total the pagination is over.
#[derive(Debug, Clone)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: usize,
}

#[derive(Debug)]
pub struct NotificationStore {
    paths: SitePaths,
    lock: Mutex<()>,
}

impl NotificationStore {
    pub fn new(paths: SitePaths) -> Self {
        Self {
            paths,
            lock: Mutex::new(()),
        }
    }

    /// All notifications, newest first.
    pub fn load(&self) -> Result<Vec<Notification>> {
        let path = self.paths.notifications_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)?;
        let mut notifications: Vec<Notification> = serde_json::from_str(&raw)?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    /// Merge projection output. Returns how many notifications were new.
    pub fn merge(&self, derived: &[Notification]) -> Result<usize> {
        let _guard = self.lock.lock().expect("notification lock poisoned");
        let mut notifications = self.load()?;
        let mut added = 0;
        for incoming in derived {
            match notifications.iter_mut().find(|n| n.id == incoming.id) {
                Some(existing) => {
                    existing.message = incoming.message.clone();
                    existing.payload = incoming.payload.clone();
                }
                None => {
                    notifications.push(incoming.clone());
                    added += 1;
                }
            }
        }
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.write(&notifications)?;
        Ok(added)
    }

    pub fn list_paginated(
        &self,
        offset: usize,
        limit: usize,
        include_read: bool,
    ) -> Result<NotificationPage> {
        let notifications = self.load()?;
        let filtered: Vec<Notification> = notifications
            .into_iter()
            .filter(|n| include_read || n.read_at.is_none())
            .collect();
        let total = filtered.len();
        let page = filtered.into_iter().skip(offset).take(limit).collect();
        Ok(NotificationPage {
            notifications: page,
            total,
        })
    }

    pub fn count_unread(&self) -> Result<usize> {
        Ok(self.load()?.iter().filter(|n| n.read_at.is_none()).count())
    }

    /// Mark specific ids, or everything, as read.
    pub fn mark_read(&self, ids: Option<&[String]>, all: bool) -> Result<usize> {
        if ids.is_none() && !all {
            return Err(PolisError::validation(
                "mark_read needs ids or the all flag",
            ));
        }
        let _guard = self.lock.lock().expect("notification lock poisoned");
        let mut notifications = self.load()?;
        let now = Utc::now();
        let mut changed = 0;
        for notification in &mut notifications {
            let selected = all
                || ids
                    .map(|ids| ids.contains(&notification.id))
                    .unwrap_or(false);
            if selected && notification.read_at.is_none() {
                notification.read_at = Some(now);
                changed += 1;
            }
        }
        if changed > 0 {
            self.write(&notifications)?;
        }
        Ok(changed)
    }

    fn write(&self, notifications: &[Notification]) -> Result<()> {
        let raw = serde_json::to_string_pretty(notifications)?;
        fsutil::write_atomic_str(&self.paths.notifications_file(), &raw)?;
        Ok(())
    }
}
