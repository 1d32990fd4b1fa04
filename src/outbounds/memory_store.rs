//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// In-process persistence gateway. Implements both stores over one lock-protected state, with
// sequential ids and the same conditional status write a SQL `UPDATE ... WHERE status = $n`
// would give.
//--------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    models::{
        Agreement, AgreementId, AgreementStatus, NewAgreement, NewNotification, Notification,
        NotificationId, PostId, PostSummary, StatusUpdate, UserId,
    },
    ports::{AgreementStore, NotificationStore, StoreError},
};

#[derive(Default)]
struct State {
    posts: HashMap<PostId, PostSummary>,
    agreements: BTreeMap<AgreementId, Agreement>,
    notifications: BTreeMap<NotificationId, Notification>,
    last_agreement_id: AgreementId,
    last_notification_id: NotificationId,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given posts.
    pub fn with_posts(posts: impl IntoIterator<Item = PostSummary>) -> Self {
        let store = Self::new();
        for post in posts {
            store.add_post(post);
        }
        store
    }

    pub fn add_post(&self, post: PostSummary) {
        self.state.write().posts.insert(post.id, post);
    }

    /// Every notification in insertion order, regardless of owner.
    pub fn all_notifications(&self) -> Vec<Notification> {
        self.state.read().notifications.values().cloned().collect()
    }
}

#[async_trait]
impl AgreementStore for InMemoryStore {
    async fn get_post_summary(&self, post_id: PostId) -> Result<Option<PostSummary>, StoreError> {
        Ok(self.state.read().posts.get(&post_id).cloned())
    }

    async fn get_agreement(&self, id: AgreementId) -> Result<Option<Agreement>, StoreError> {
        Ok(self.state.read().agreements.get(&id).cloned())
    }

    async fn insert_agreement(
        &self,
        agreement: NewAgreement,
    ) -> Result<(AgreementId, DateTime<Utc>), StoreError> {
        let mut state = self.state.write();
        state.last_agreement_id += 1;
        let id = state.last_agreement_id;
        let created_at = Utc::now();

        state
            .agreements
            .insert(id, agreement.into_agreement(id, created_at));
        Ok((id, created_at))
    }

    async fn update_agreement_status(
        &self,
        id: AgreementId,
        expected: AgreementStatus,
        update: StatusUpdate,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        match state.agreements.get_mut(&id) {
            Some(agreement) if agreement.status == expected => {
                agreement.apply_update(&update);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_contract(
        &self,
        id: AgreementId,
        contract_url: String,
        contract_hash: Option<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let agreement = state
            .agreements
            .get_mut(&id)
            .ok_or_else(|| StoreError::Conflict(format!("agreement {id} does not exist")))?;

        agreement.contract_url = Some(contract_url);
        agreement.contract_hash = contract_hash;
        Ok(())
    }

    async fn list_agreements_for_user(&self, user_id: UserId) -> Result<Vec<Agreement>, StoreError> {
        Ok(self
            .state
            .read()
            .agreements
            .values()
            .rev()
            .filter(|a| a.is_party(user_id))
            .cloned()
            .collect())
    }

    async fn list_active_agreements(&self) -> Result<Vec<Agreement>, StoreError> {
        Ok(self
            .state
            .read()
            .agreements
            .values()
            .filter(|a| a.status == AgreementStatus::Active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationId, StoreError> {
        let mut state = self.state.write();
        state.last_notification_id += 1;
        let id = state.last_notification_id;

        state
            .notifications
            .insert(id, notification.into_notification(id, Utc::now()));
        Ok(id)
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
        read: Option<bool>,
    ) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .state
            .read()
            .notifications
            .values()
            .rev()
            .filter(|n| n.user_id == user_id && read.is_none_or(|r| n.read == r))
            .cloned()
            .collect())
    }

    async fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        Ok(self.state.read().notifications.get(&id).cloned())
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        read_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        match state.notifications.get_mut(&id) {
            Some(notification) if !notification.read => {
                notification.read = true;
                notification.read_at = Some(read_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: UserId,
        read_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write();
        let mut updated = 0;
        for notification in state
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            notification.read = true;
            notification.read_at = Some(read_at);
            updated += 1;
        }
        Ok(updated)
    }
}
