//! Per-user settings that drive the renaming: the name template, the caption,
//! the thumbnail and the container tags.

mod model;
mod repo;

#[cfg(test)]
mod mem;

pub(crate) use model::*;
pub(crate) use repo::*;

#[cfg(test)]
pub(crate) use mem::*;

use crate::Result;
use async_trait::async_trait;
use teloxide::types::UserId;

/// Narrow access to the preferences storage. Reading the preferences of a
/// user who was never seen before creates the default record for them.
#[async_trait]
pub(crate) trait PrefsStore: Send + Sync {
    async fn get(&self, user: UserId) -> Result<UserPrefs>;

    /// Idempotent upsert of a single setting
    async fn set(&self, user: UserId, update: PrefsUpdate) -> Result;
}
