use std::sync::Arc;

use async_trait::async_trait;

use crate::common::{Conversation, Group, Message, Person, ThreadId, ThreadRef};
use crate::error::ApiResult;

/// The backend operations the sync layer depends on.
///
/// `RestClient` is the production implementation; tests plug in fakes.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn list_groups(&self) -> ApiResult<Vec<Group>>;

    async fn list_people(&self) -> ApiResult<Vec<Person>>;

    async fn list_conversations(&self) -> ApiResult<Vec<Conversation>>;

    /// Returns the id the backend assigned to the new group.
    async fn create_group(&self, name: &str) -> ApiResult<ThreadId>;

    async fn delete_group(&self, group_id: &str) -> ApiResult<()>;

    /// Returns the id of the new conversation with `companion_id`.
    async fn create_conversation(&self, companion_id: &str) -> ApiResult<ThreadId>;

    async fn delete_conversation(&self, conversation_id: &str) -> ApiResult<()>;

    /// Messages of `thread`, only those after `since` when given.
    async fn read_messages(&self, thread: &ThreadRef, since: Option<i64>)
    -> ApiResult<Vec<Message>>;

    async fn append_message(&self, thread: &ThreadRef, text: &str) -> ApiResult<()>;
}

#[async_trait]
impl<T: ApiClient + ?Sized> ApiClient for Arc<T> {
    async fn list_groups(&self) -> ApiResult<Vec<Group>> {
        (**self).list_groups().await
    }

    async fn list_people(&self) -> ApiResult<Vec<Person>> {
        (**self).list_people().await
    }

    async fn list_conversations(&self) -> ApiResult<Vec<Conversation>> {
        (**self).list_conversations().await
    }

    async fn create_group(&self, name: &str) -> ApiResult<ThreadId> {
        (**self).create_group(name).await
    }

    async fn delete_group(&self, group_id: &str) -> ApiResult<()> {
        (**self).delete_group(group_id).await
    }

    async fn create_conversation(&self, companion_id: &str) -> ApiResult<ThreadId> {
        (**self).create_conversation(companion_id).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> ApiResult<()> {
        (**self).delete_conversation(conversation_id).await
    }

    async fn read_messages(
        &self,
        thread: &ThreadRef,
        since: Option<i64>,
    ) -> ApiResult<Vec<Message>> {
        (**self).read_messages(thread, since).await
    }

    async fn append_message(&self, thread: &ThreadRef, text: &str) -> ApiResult<()> {
        (**self).append_message(thread, text).await
    }
}
