//! In-process change notifications.
//!
//! Every mutation publishes a [`ChangeEvent`] naming the table, the kind of
//! change and the affected ids. Subscribers receive ids only and re-query
//! whatever they display.

use std::fmt;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Profiles,
    Posts,
    Likes,
    Comments,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Posts => "posts",
            Table::Likes => "likes",
            Table::Comments => "comments",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Primary key of the changed row; for likes this is the liking user's id.
    pub id: String,
    /// The post the row belongs to. Set for posts themselves too.
    pub post_id: Option<String>,
}

impl ChangeEvent {
    pub fn post(kind: ChangeKind, post_id: &str) -> Self {
        Self {
            table: Table::Posts,
            kind,
            id: post_id.to_string(),
            post_id: Some(post_id.to_string()),
        }
    }

    pub fn comment(kind: ChangeKind, comment_id: &str, post_id: &str) -> Self {
        Self {
            table: Table::Comments,
            kind,
            id: comment_id.to_string(),
            post_id: Some(post_id.to_string()),
        }
    }

    pub fn like(kind: ChangeKind, user_id: &str, post_id: &str) -> Self {
        Self {
            table: Table::Likes,
            kind,
            id: user_id.to_string(),
            post_id: Some(post_id.to_string()),
        }
    }

    pub fn profile(kind: ChangeKind, profile_id: &str) -> Self {
        Self {
            table: Table::Profiles,
            kind,
            id: profile_id.to_string(),
            post_id: None,
        }
    }
}

/// Which events a subscriber wants. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeFilter {
    pub table: Option<Table>,
    pub post_id: Option<String>,
}

impl ChangeFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(table) = self.table {
            if event.table != table {
                return false;
            }
        }
        match &self.post_id {
            Some(post_id) => event.post_id.as_deref() == Some(post_id.as_str()),
            None => true,
        }
    }
}

/// Fan-out of change events to any number of subscribers.
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(table = %event.table, kind = ?event.kind, id = %event.id, "change");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// A stream of events matching `filter`. Events missed by a lagging
    /// subscriber are skipped; the subscriber is expected to re-query anyway.
    pub fn stream(&self, filter: ChangeFilter) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| match item {
            Ok(event) if filter.matches(&event) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("Change subscriber lagged, skipped {} events", skipped);
                None
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
