//! Notification list: server paginated, with mark-read actions.

use std::sync::Arc;

use serde_json::Value;

use crate::assemble::ViewModelRow;
use crate::client::{Method, Transport};
use crate::descriptor::ViewDescriptor;
use crate::editor::{mutate, Mutation};
use crate::error::ClientError;
use crate::models::RecordKey;
use crate::pagination::{PaginationState, DEFAULT_LIMIT};
use crate::resource::Resource;
use crate::view::{ListView, RefreshOutcome, ViewError};

/// Server-side read filter values.
pub const FILTER_UNREAD: &str = "unread";
pub const FILTER_READ: &str = "read";

pub fn descriptor() -> ViewDescriptor {
    ViewDescriptor::new("notifications", Resource::Notifications, "notification_id")
        .search(&["title", "message"])
}

fn is_read(row: &ViewModelRow) -> bool {
    ["is_read", "read"]
        .iter()
        .find_map(|field| row.record.get(*field))
        .is_some_and(|value| match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        })
}

pub struct NotificationCenter<T: Transport> {
    view: ListView<T>,
}

impl<T: Transport> NotificationCenter<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_limit(transport, DEFAULT_LIMIT)
    }

    pub fn with_limit(transport: Arc<T>, limit: u32) -> Self {
        Self {
            view: ListView::new(transport, descriptor()).paginated(limit),
        }
    }

    pub fn view(&self) -> &ListView<T> {
        &self.view
    }

    pub async fn load(&self) -> Result<RefreshOutcome, ViewError> {
        self.view.refresh().await
    }

    pub fn items(&self) -> Vec<ViewModelRow> {
        self.view.visible()
    }

    pub fn pagination(&self) -> Option<PaginationState> {
        self.view.pagination()
    }

    pub async fn set_page(&self, page: u32) -> Result<Option<RefreshOutcome>, ViewError> {
        self.view.set_page(page).await
    }

    pub async fn next_page(&self) -> Result<Option<RefreshOutcome>, ViewError> {
        self.view.next_page().await
    }

    pub async fn prev_page(&self) -> Result<Option<RefreshOutcome>, ViewError> {
        self.view.prev_page().await
    }

    /// `read`, `unread` or a wildcard for everything. Back to page 1.
    pub async fn set_filter(&self, filter: &str) -> Result<RefreshOutcome, ViewError> {
        self.view.set_server_param("filter", filter).await
    }

    pub async fn set_limit(&self, limit: u32) -> Result<RefreshOutcome, ViewError> {
        self.view.set_limit(limit).await
    }

    /// Unread items on the loaded page.
    pub fn unread_count(&self) -> usize {
        self.view.rows().iter().filter(|row| !is_read(row)).count()
    }

    pub async fn mark_read(&self, id: &RecordKey) -> Result<(), ClientError> {
        let mutation = Mutation {
            method: Method::Patch,
            path: format!("{}/{id}/read", Resource::Notifications.path()),
            body: None,
        };
        mutate(self.view.transport().as_ref(), &mutation, &[&self.view]).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        let mutation = Mutation {
            method: Method::Patch,
            path: format!("{}/mark-all-read", Resource::Notifications.path()),
            body: None,
        };
        mutate(self.view.transport().as_ref(), &mutation, &[&self.view]).await?;
        Ok(())
    }
}
