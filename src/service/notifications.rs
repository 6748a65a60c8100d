//! Dashboard notification flows.

use crate::model::{Notification, NotificationStore};

use super::{ServiceError, ServiceResult};

pub struct NotificationService {
    notifications: NotificationStore,
}

impl NotificationService {
    pub fn new(notifications: NotificationStore) -> Self {
        Self { notifications }
    }

    pub async fn list(&self, unread_only: bool) -> ServiceResult<Vec<Notification>> {
        Ok(self.notifications.list(unread_only).await?)
    }

    pub async fn mark_read(&self, id: &str) -> ServiceResult<Notification> {
        self.notifications
            .mark_read(id)
            .await?
            .ok_or(ServiceError::NotFound("Notification"))
    }

    pub async fn mark_all_read(&self) -> ServiceResult<usize> {
        Ok(self.notifications.mark_all_read().await?)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        if !self.notifications.delete(id).await? {
            return Err(ServiceError::NotFound("Notification"));
        }
        Ok(())
    }
}
