use super::{PrefsStore, PrefsUpdate, UserPrefs};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use teloxide::types::UserId;

/// Storage that lives only as long as the test does
#[derive(Default)]
pub(crate) struct MemPrefsStore {
    records: parking_lot::Mutex<HashMap<UserId, UserPrefs>>,
}

impl MemPrefsStore {
    pub(crate) fn with(user: UserId, prefs: UserPrefs) -> Self {
        let store = Self::default();
        store.records.lock().insert(user, prefs);
        store
    }
}

#[async_trait]
impl PrefsStore for MemPrefsStore {
    async fn get(&self, user: UserId) -> Result<UserPrefs> {
        Ok(self.records.lock().entry(user).or_default().clone())
    }

    async fn set(&self, user: UserId, update: PrefsUpdate) -> Result {
        self.records.lock().entry(user).or_default().apply(update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MetadataField;
    use crate::rename::MediaKind;

    #[tokio::test]
    async fn unseen_user_gets_defaults() {
        let store = MemPrefsStore::default();
        assert_eq!(store.get(UserId(1)).await.unwrap(), UserPrefs::default());
    }

    #[tokio::test]
    async fn updates_are_idempotent_upserts() {
        let store = MemPrefsStore::default();
        let user = UserId(1);

        for _ in 0..2 {
            store
                .set(user, PrefsUpdate::FormatTemplate(Some("Show episode".to_owned())))
                .await
                .unwrap();
            store
                .set(user, PrefsUpdate::MediaType(Some(MediaKind::Video)))
                .await
                .unwrap();
            store
                .set(
                    user,
                    PrefsUpdate::Metadata(MetadataField::AudioGenre, Some("Rock".to_owned())),
                )
                .await
                .unwrap();
        }

        let prefs = store.get(user).await.unwrap();
        assert_eq!(prefs.format_template.as_deref(), Some("Show episode"));
        assert_eq!(prefs.media_type, Some(MediaKind::Video));
        assert_eq!(prefs.metadata.get(MetadataField::AudioGenre), Some("Rock"));

        store
            .set(user, PrefsUpdate::Metadata(MetadataField::AudioGenre, None))
            .await
            .unwrap();

        let prefs = store.get(user).await.unwrap();
        assert_eq!(prefs.metadata.get(MetadataField::AudioGenre), None);
    }
}
