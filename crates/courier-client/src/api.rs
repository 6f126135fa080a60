use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use courier_types::api::{
    DeleteAck, EditMessageRequest, ErrorBody, LoginRequest, LoginResponse, MessagePage,
    RegisterRequest, RegisterResponse, SendMessageRequest, UpdateProfileRequest,
};
use courier_types::models::{Account, Conversation, Message, UserProfile, UserSummary};

use crate::error::{ClientError, Result};

/// Typed wrapper over the `/api` routes. Cheap to clone; clones share the
/// connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    // -- Auth --

    /// Register and keep the issued token.
    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse> {
        let body = RegisterRequest {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        };
        let resp: RegisterResponse = self
            .send(self.http.post(self.url("/auth/register")).json(&body))
            .await?;
        self.token = Some(resp.token.clone());
        Ok(resp)
    }

    /// Log in with a username or an email and keep the issued token.
    pub async fn login(&mut self, identifier: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            username: Some(identifier.into()),
            email: Some(identifier.into()),
            password: Some(password.into()),
        };
        let resp: LoginResponse = self
            .send(self.http.post(self.url("/auth/login")).json(&body))
            .await?;
        self.token = Some(resp.token.clone());
        Ok(resp)
    }

    // -- Users --

    pub async fn me(&self) -> Result<Account> {
        self.send(self.authed(self.http.get(self.url("/users/me")))?)
            .await
    }

    pub async fn update_profile(
        &self,
        display_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<Account> {
        let body = UpdateProfileRequest {
            display_name: display_name.map(Into::into),
            bio: bio.map(Into::into),
        };
        self.send(self.authed(self.http.put(self.url("/users/me")))?.json(&body))
            .await
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let req = self
            .authed(self.http.get(self.url("/users/search")))?
            .query(&[("q", query)]);
        self.send(req).await
    }

    pub async fn user(&self, id: Uuid) -> Result<UserProfile> {
        self.send(self.authed(self.http.get(self.url(&format!("/users/{}", id))))?)
            .await
    }

    // -- Messages --

    pub async fn send_message(&self, receiver_id: Uuid, content: &str) -> Result<Message> {
        let body = SendMessageRequest {
            receiver_id: Some(receiver_id),
            content: Some(content.into()),
        };
        self.send(self.authed(self.http.post(self.url("/messages")))?.json(&body))
            .await
    }

    /// One page of the exchange with `peer_id`, newest first.
    pub async fn messages(&self, peer_id: Uuid, page: MessagePage) -> Result<Vec<Message>> {
        let req = self
            .authed(self.http.get(self.url(&format!("/messages/{}", peer_id))))?
            .query(&[("page", page.page), ("limit", page.limit)]);
        self.send(req).await
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.send(self.authed(self.http.get(self.url("/messages/conversations")))?)
            .await
    }

    pub async fn edit_message(&self, message_id: Uuid, content: &str) -> Result<Message> {
        let body = EditMessageRequest {
            content: Some(content.into()),
        };
        let url = self.url(&format!("/messages/{}", message_id));
        self.send(self.authed(self.http.put(url))?.json(&body)).await
    }

    pub async fn delete_message(&self, message_id: Uuid) -> Result<DeleteAck> {
        let url = self.url(&format!("/messages/{}", message_id));
        self.send(self.authed(self.http.delete(url))?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(req.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let (kind, message) = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) => (err.error, err.message),
                Err(_) => ("unknown".to_string(), body),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                kind,
                message,
            });
        }

        Ok(resp.json::<T>().await?)
    }
}
