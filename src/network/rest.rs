use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::common::{Conversation, Group, Message, Person, ThreadId, ThreadKind, ThreadRef};
use crate::config::Session;
use crate::error::{ApiError, ApiResult};

use super::api::ApiClient;
use super::wire::{
    AppendConversationBody, AppendGroupBody, CreateConversationBody, CreateGroupBody,
    CreatedConversation, CreatedGroup, ErrorBody, Items, WireConversation, WireGroup,
    WireMessage, WirePerson,
};

/// HTTP implementation of [`ApiClient`] against the groups/conversations backend.
pub struct RestClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl RestClient {
    pub fn new(base_url: &str, session: Session) -> ApiResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.session.token)
            .header("rs-uid", &self.session.uid)
            .header("rs-email", &self.session.email)
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .message
            .unwrap_or_else(|| "Unknown error occurred.".to_string());
        log::warn!(
            "Request failed with {status} ({}): {message}",
            parsed.kind.as_deref().unwrap_or("no type")
        );
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_items<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<Vec<T>> {
        let response = self.send(self.http.get(self.url(path)).query(query)).await?;
        let page: Items<T> = response
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        log::debug!("GET {path} returned {} item(s)", page.items.len());
        Ok(page.items)
    }

    fn thread_paths(kind: ThreadKind) -> (&'static str, &'static str) {
        match kind {
            ThreadKind::Group => ("groups", "groupID"),
            ThreadKind::Conversation => ("conversations", "conversationID"),
        }
    }
}

#[async_trait]
impl ApiClient for RestClient {
    async fn list_groups(&self) -> ApiResult<Vec<Group>> {
        self.get_items::<WireGroup>("groups/list", &[])
            .await?
            .into_iter()
            .map(Group::try_from)
            .collect()
    }

    async fn list_people(&self) -> ApiResult<Vec<Person>> {
        let people = self.get_items::<WirePerson>("users", &[]).await?;
        Ok(people
            .into_iter()
            .map(Person::from)
            .filter(|person| person.uid != self.session.uid)
            .collect())
    }

    async fn list_conversations(&self) -> ApiResult<Vec<Conversation>> {
        let conversations = self
            .get_items::<WireConversation>("conversations/list", &[])
            .await?;
        Ok(conversations.into_iter().map(Conversation::from).collect())
    }

    async fn create_group(&self, name: &str) -> ApiResult<ThreadId> {
        let request = self
            .http
            .post(self.url("groups/create"))
            .json(&CreateGroupBody { name });
        let created: CreatedGroup = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(created.group_id)
    }

    async fn delete_group(&self, group_id: &str) -> ApiResult<()> {
        let request = self
            .http
            .delete(self.url("groups/delete"))
            .query(&[("groupID", group_id)]);
        self.send(request).await?;
        Ok(())
    }

    async fn create_conversation(&self, companion_id: &str) -> ApiResult<ThreadId> {
        let request = self
            .http
            .post(self.url("conversations/create"))
            .json(&CreateConversationBody {
                companion: companion_id,
            });
        let created: CreatedConversation = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(created.conversation_id)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> ApiResult<()> {
        let request = self
            .http
            .delete(self.url("conversations/delete"))
            .query(&[("conversationID", conversation_id)]);
        self.send(request).await?;
        Ok(())
    }

    async fn read_messages(
        &self,
        thread: &ThreadRef,
        since: Option<i64>,
    ) -> ApiResult<Vec<Message>> {
        let (resource, id_param) = Self::thread_paths(thread.kind);
        let mut query = vec![(id_param, thread.id.clone())];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }
        self.get_items::<WireMessage>(&format!("{resource}/read"), &query)
            .await?
            .into_iter()
            .map(Message::try_from)
            .collect()
    }

    async fn append_message(&self, thread: &ThreadRef, text: &str) -> ApiResult<()> {
        let (resource, _) = Self::thread_paths(thread.kind);
        let request = self.http.post(self.url(&format!("{resource}/append")));
        let request = match thread.kind {
            ThreadKind::Group => request.json(&AppendGroupBody {
                group_id: &thread.id,
                message: text,
            }),
            ThreadKind::Conversation => request.json(&AppendConversationBody {
                conversation_id: &thread.id,
                message: text,
            }),
        };
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            token: "t".into(),
            uid: "u1".into(),
            email: "u1@example.com".into(),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = RestClient::new("https://api.example.com/angular/", session()).unwrap();
        assert_eq!(
            client.url("groups/list"),
            "https://api.example.com/angular/groups/list"
        );
    }

    #[test]
    fn test_thread_paths() {
        assert_eq!(
            RestClient::thread_paths(ThreadKind::Group),
            ("groups", "groupID")
        );
        assert_eq!(
            RestClient::thread_paths(ThreadKind::Conversation),
            ("conversations", "conversationID")
        );
    }
}
