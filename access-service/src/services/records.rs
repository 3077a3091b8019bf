//! Owner-scoped "Auth" records.
//!
//! Every operation takes the caller's identity explicitly. Reads go through
//! the ownership filter; writes hand the owner id to the store so the row is
//! only touched if it still belongs to the caller.

use std::sync::Arc;

use super::ownership::owned_or_not_found;
use super::{ServiceError, Store};
use crate::models::{AuthRecord, UserWithPermissions};

#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn Store>,
}

impl RecordService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        identity: &UserWithPermissions,
        skip: i64,
        take: i64,
    ) -> Result<Vec<AuthRecord>, ServiceError> {
        self.store
            .list_auth_records_by_owner(identity.id(), skip, take)
            .await
    }

    pub async fn show(
        &self,
        identity: &UserWithPermissions,
        id: i64,
    ) -> Result<AuthRecord, ServiceError> {
        let record = self.store.find_auth_record(id).await?;
        owned_or_not_found(identity, record)
    }

    pub async fn create(
        &self,
        identity: &UserWithPermissions,
        text: &str,
    ) -> Result<AuthRecord, ServiceError> {
        let record = self.store.insert_auth_record(identity.id(), text).await?;
        tracing::info!(user_id = identity.id(), record_id = record.id, "Record created");
        Ok(record)
    }

    /// Merge update. A `None` text leaves the record as it is.
    pub async fn patch(
        &self,
        identity: &UserWithPermissions,
        id: i64,
        text: Option<&str>,
    ) -> Result<AuthRecord, ServiceError> {
        let current = self.show(identity, id).await?;
        match text {
            Some(text) => self.replace(identity, current.id, text).await,
            None => Ok(current),
        }
    }

    pub async fn replace(
        &self,
        identity: &UserWithPermissions,
        id: i64,
        text: &str,
    ) -> Result<AuthRecord, ServiceError> {
        let updated = self
            .store
            .update_auth_record(id, identity.id(), text)
            .await?;
        // The store only matches rows owned by the caller, so a foreign id
        // lands here the same way a missing one does.
        owned_or_not_found(identity, updated)
    }

    pub async fn delete(&self, identity: &UserWithPermissions, id: i64) -> Result<(), ServiceError> {
        if self.store.delete_auth_record(id, identity.id()).await? {
            tracing::info!(user_id = identity.id(), record_id = id, "Record deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound("Auth"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::services::{IdentityStore, MemoryStore};

    async fn two_users(store: &MemoryStore) -> (UserWithPermissions, UserWithPermissions) {
        let mut users = Vec::new();
        for email in ["a@example.com", "b@example.com"] {
            users.push(
                store
                    .insert_user(NewUser {
                        email: email.to_string(),
                        name: "U".to_string(),
                        password_hash: "hash".to_string(),
                        group_ids: vec![],
                        permission_ids: vec![],
                    })
                    .await
                    .unwrap(),
            );
        }
        let b = users.pop().unwrap();
        let a = users.pop().unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn owner_sees_created_record() {
        let store = Arc::new(MemoryStore::new());
        let (a, _) = two_users(&store).await;
        let service = RecordService::new(store);

        let created = service.create(&a, "hello").await.unwrap();
        assert_eq!(created.owner_id, a.id());
        assert_eq!(service.show(&a, created.id).await.unwrap().text, "hello");
    }

    #[tokio::test]
    async fn other_user_gets_not_found_everywhere() {
        let store = Arc::new(MemoryStore::new());
        let (a, b) = two_users(&store).await;
        let service = RecordService::new(store);
        let record = service.create(&a, "private").await.unwrap();

        assert!(matches!(service.show(&b, record.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(
            service.patch(&b, record.id, Some("x")).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.replace(&b, record.id, "x").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(service.delete(&b, record.id).await, Err(ServiceError::NotFound(_))));

        assert_eq!(service.show(&a, record.id).await.unwrap().text, "private");
    }

    #[tokio::test]
    async fn patch_without_text_keeps_record() {
        let store = Arc::new(MemoryStore::new());
        let (a, _) = two_users(&store).await;
        let service = RecordService::new(store);
        let record = service.create(&a, "keep").await.unwrap();

        assert_eq!(service.patch(&a, record.id, None).await.unwrap().text, "keep");
        assert_eq!(
            service.patch(&a, record.id, Some("new")).await.unwrap().text,
            "new"
        );
    }

    #[tokio::test]
    async fn list_is_owner_filtered_then_paged() {
        let store = Arc::new(MemoryStore::new());
        let (a, b) = two_users(&store).await;
        let service = RecordService::new(store);

        for i in 0..4 {
            service.create(&a, &format!("a{}", i)).await.unwrap();
            service.create(&b, &format!("b{}", i)).await.unwrap();
        }

        let page: Vec<String> = service
            .list(&a, 1, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(page, vec!["a1", "a2"]);
    }
}
