//! Recording alert center (for testing and host prototyping).

use std::sync::{Mutex, MutexGuard};

use super::{AlertCenter, NotifyResult, OneShotAlert, PermissionStatus};

/// In-process alert center that records scheduled alerts instead of touching
/// a device notification API.
pub struct MemoryAlertCenter {
    permission: Mutex<PermissionStatus>,
    grant_on_request: bool,
    requests: Mutex<u32>,
    scheduled: Mutex<Vec<OneShotAlert>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryAlertCenter {
    /// Center whose permission is already granted.
    pub fn granted() -> Self {
        Self {
            permission: Mutex::new(PermissionStatus::Granted),
            grant_on_request: true,
            requests: Mutex::new(0),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// Center that refuses the permission prompt.
    pub fn denied() -> Self {
        Self {
            permission: Mutex::new(PermissionStatus::Undetermined),
            grant_on_request: false,
            requests: Mutex::new(0),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// Currently scheduled alerts, in scheduling order.
    pub fn scheduled(&self) -> Vec<OneShotAlert> {
        lock(&self.scheduled).clone()
    }

    /// How many times the permission prompt was shown.
    pub fn permission_requests(&self) -> u32 {
        *lock(&self.requests)
    }
}

impl Default for MemoryAlertCenter {
    fn default() -> Self {
        Self::granted()
    }
}

impl AlertCenter for MemoryAlertCenter {
    fn permission_status(&self) -> PermissionStatus {
        *lock(&self.permission)
    }

    fn request_permission(&self) -> PermissionStatus {
        *lock(&self.requests) += 1;
        let mut permission = lock(&self.permission);
        *permission = if self.grant_on_request {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        *permission
    }

    fn schedule_one_shot(&self, alert: OneShotAlert) -> NotifyResult<()> {
        // Deliberately appends without deduplicating, so tests can catch a
        // scheduler that forgets to cancel first.
        lock(&self.scheduled).push(alert);
        Ok(())
    }

    fn cancel(&self, alert_id: &str) -> NotifyResult<()> {
        lock(&self.scheduled).retain(|alert| alert.id != alert_id);
        Ok(())
    }
}
