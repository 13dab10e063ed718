//! The Request Applier (SPEC_FULL.md §4.2): validates a request against
//! current state, mutates `users`/`messages`, and — for mutating request
//! types — appends the request to the commit log in the same storage
//! transaction (I3). Idempotency is enforced here by `request.id`, never by
//! `seq`, so a request replayed from a peer's commit log or retried by a
//! client after a dropped response is applied at most once (P1).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::ApplyError;
use crate::models::{Request, RequestBody, Response};
use crate::storage::Storage;

/// Shared, mutex-guarded node state. A single `Mutex` serializes every
/// apply — client-facing and peer-sync alike — so the dedup check and the
/// resulting mutation are always atomic with respect to each other, mirroring
/// how the donor's idempotency middleware guards its dedup cache with one
/// lock rather than per-key locking.
pub struct AppliedState {
    pub request_ids: HashSet<String>,
}

pub struct Applier {
    storage: Storage,
    state: Arc<Mutex<AppliedState>>,
}

impl Applier {
    pub fn new(storage: Storage, request_ids: HashSet<String>) -> Self {
        Applier { storage, state: Arc::new(Mutex::new(AppliedState { request_ids })) }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Apply `request`, returning the response the handler contract
    /// (§4.2) specifies. Returns `Ok(Response::duplicate())` without
    /// touching storage if `request.id` has already been committed.
    pub async fn apply(&self, request: &Request) -> Result<Response, ApplyError> {
        let mut guard = self.state.lock().await;

        if guard.request_ids.contains(&request.id) {
            return Ok(Response::duplicate());
        }

        if !request.body.mutates() {
            return self.apply_read_only(&request.body).await;
        }

        let mut tx = self.storage.begin().await?;
        let result = self.apply_mutation(&mut tx, &request.body).await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                // Validation failed: nothing was written, roll back and
                // surface the error without marking the request as seen so a
                // corrected retry can still succeed.
                tx.rollback().await?;
                return Err(err);
            }
        };

        let blob = serde_json::to_string(request).expect("Request serializes");
        Storage::append_commit(&mut tx, &request.id, &blob).await?;
        tx.commit().await?;

        guard.request_ids.insert(request.id.clone());
        Ok(response)
    }

    /// Re-apply a request pulled from a peer's commit log during sync
    /// (§4.4a). Identical dedup/mutation path to `apply`, but the caller
    /// supplies the already-assigned `request_id` and never needs the
    /// response body.
    pub async fn apply_from_commit(&self, request: &Request) -> Result<(), ApplyError> {
        let mut guard = self.state.lock().await;

        if guard.request_ids.contains(&request.id) {
            return Ok(());
        }

        let mut tx = self.storage.begin().await?;
        match self.apply_mutation(&mut tx, &request.body).await {
            Ok(_) => {}
            Err(ApplyError::Storage(e)) => return Err(ApplyError::Storage(e)),
            // A request already committed elsewhere can legitimately fail
            // re-validation against this node's current state (e.g. the user
            // was since deleted by a later commit) — synchronization still
            // records it as seen so it is never replayed again.
            Err(_) => {
                tx.rollback().await?;
                guard.request_ids.insert(request.id.clone());
                return Ok(());
            }
        }

        let blob = serde_json::to_string(request).expect("Request serializes");
        Storage::append_commit(&mut tx, &request.id, &blob).await?;
        tx.commit().await?;

        guard.request_ids.insert(request.id.clone());
        Ok(())
    }

    async fn apply_read_only(&self, body: &RequestBody) -> Result<Response, ApplyError> {
        match body {
            RequestBody::Login { username, password_hash } => {
                match self.storage.get_user(username).await? {
                    Some(user) if &user.password_hash == password_hash => Ok(Response::ok()),
                    _ => Err(ApplyError::InvalidCredentials),
                }
            }
            RequestBody::GetMessages { username } => {
                let messages = self.storage.get_messages_for(username).await?;
                Ok(Response::with_messages(messages))
            }
            RequestBody::ListUsers { pattern } => {
                let usernames = self.storage.list_usernames(pattern).await?;
                Ok(Response::with_usernames(usernames))
            }
            _ => unreachable!("apply_read_only called with a mutating request"),
        }
    }

    async fn apply_mutation(
        &self,
        tx: &mut crate::storage::Tx<'_>,
        body: &RequestBody,
    ) -> Result<Response, ApplyError> {
        match body {
            RequestBody::CreateUser { username, password_hash } => {
                if self.storage.get_user(username).await?.is_some() {
                    return Err(ApplyError::UsernameExists);
                }
                Storage::insert_user(tx, username, password_hash).await?;
                Ok(Response::ok())
            }
            RequestBody::SendMessage { message } => {
                if self.storage.get_user(&message.recipient).await?.is_none() {
                    return Err(ApplyError::RecipientNotFound);
                }
                Storage::insert_message(tx, message).await?;
                Ok(Response::ok())
            }
            RequestBody::ReadMessages { message_ids } => {
                Storage::set_read(tx, message_ids).await?;
                Ok(Response::ok())
            }
            RequestBody::DeleteMessages { message_ids } => {
                Storage::delete_messages(tx, message_ids).await?;
                Ok(Response::ok())
            }
            RequestBody::DeleteUser { username } => {
                Storage::delete_user(tx, username).await?;
                Ok(Response::ok())
            }
            _ => unreachable!("apply_mutation called with a read-only request"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageInput, Request, RequestBody};

    async fn test_applier() -> Applier {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        // keep tempdir alive for the duration of the test by leaking it
        std::mem::forget(dir);
        let storage = Storage::open(path.to_str().unwrap()).await.unwrap();
        Applier::new(storage, HashSet::new())
    }

    fn create_user(id: &str, username: &str) -> Request {
        Request {
            id: id.to_string(),
            body: RequestBody::CreateUser {
                username: username.to_string(),
                password_hash: "hash".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn duplicate_request_id_is_a_noop() {
        let applier = test_applier().await;
        let req = create_user("req-1", "alice");

        let first = applier.apply(&req).await.unwrap();
        assert!(!first.duplicate);

        let second = applier.apply(&req).await.unwrap();
        assert!(second.duplicate);

        let users = applier.storage().list_usernames("*").await.unwrap();
        assert_eq!(users, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn create_user_twice_with_different_ids_errors() {
        let applier = test_applier().await;
        applier.apply(&create_user("req-1", "alice")).await.unwrap();

        let err = applier.apply(&create_user("req-2", "alice")).await.unwrap_err();
        assert!(matches!(err, ApplyError::UsernameExists));
    }

    #[tokio::test]
    async fn send_message_to_unknown_recipient_errors() {
        let applier = test_applier().await;
        let req = Request {
            id: "req-1".to_string(),
            body: RequestBody::SendMessage {
                message: MessageInput {
                    id: "m1".to_string(),
                    sender: "alice".to_string(),
                    recipient: "ghost".to_string(),
                    body: "hi".to_string(),
                    timestamp: 1.0,
                    read: false,
                },
            },
        };
        let err = applier.apply(&req).await.unwrap_err();
        assert!(matches!(err, ApplyError::RecipientNotFound));
    }

    #[tokio::test]
    async fn failed_validation_does_not_consume_the_request_id() {
        let applier = test_applier().await;
        let req = Request {
            id: "req-1".to_string(),
            body: RequestBody::SendMessage {
                message: MessageInput {
                    id: "m1".to_string(),
                    sender: "alice".to_string(),
                    recipient: "ghost".to_string(),
                    body: "hi".to_string(),
                    timestamp: 1.0,
                    read: false,
                },
            },
        };
        assert!(applier.apply(&req).await.is_err());

        applier.apply(&create_user("req-2", "ghost")).await.unwrap();
        // Retrying the original request id now succeeds since the recipient exists.
        assert!(applier.apply(&req).await.is_ok());
    }
}
