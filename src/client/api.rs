//! REST client for the ticket admin API.
//!
//! Reconciliation fetches the full record of a ticket named by a realtime
//! event, and full loads fetch filtered pages, through [`TicketApi`]. The
//! notification inbox reads and acknowledges through [`NotificationApi`].

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::error::ClientError;
use super::filters::TicketFilters;
use super::notifications::{NotificationApi, NotificationPage, NotificationScope};
use super::ticket::Ticket;

/// One page of the ticket list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPage {
    /// Tickets of the page.
    #[serde(default)]
    pub items: Vec<Ticket>,
    /// Total matching tickets server-side; defaults to the page length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Read access to tickets for the client views.
#[async_trait]
pub trait TicketApi: Send + Sync + std::fmt::Debug {
    /// Fetches the full record of a ticket. `Ok(None)` means the API
    /// answered with an empty body.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-success status.
    async fn fetch_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, ClientError>;

    /// Fetches the tickets matching `filters`.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-success status.
    async fn list_tickets(&self, filters: &TicketFilters) -> Result<TicketPage, ClientError>;
}

/// [`TicketApi`] over HTTP using [`reqwest`].
#[derive(Debug, Clone)]
pub struct HttpTicketApi {
    client: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpTicketApi {
    /// Creates a client for the API rooted at `base_url`
    /// (e.g. `http://host:4000/api`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when `base_url` is not an
    /// absolute URL that can carry path segments.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when `base_url` is not an
    /// absolute URL that can carry path segments.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{base_url}: cannot be a base URL"
            )));
        }
        Ok(Self {
            client,
            base_url,
            access_token: None,
        })
    }

    /// Sends `token` as a bearer token on every request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ClientError> {
        self.send(self.client.get(url)).await
    }

    async fn post(&self, url: Url) -> Result<reqwest::Response, ClientError> {
        self.send(self.client.post(url)).await
    }

    async fn send(&self, mut request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Self::ensure_success(response).await
    }

    /// Returns the response unchanged on success, or a
    /// [`ClientError::Api`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TicketApi for HttpTicketApi {
    async fn fetch_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, ClientError> {
        let url = self.endpoint(&["admin", "tickets", ticket_id])?;
        let body = self.get(url).await?.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(serde_json::from_slice::<Option<Ticket>>(&body)?)
    }

    async fn list_tickets(&self, filters: &TicketFilters) -> Result<TicketPage, ClientError> {
        let mut url = self.endpoint(&["admin", "tickets"])?;
        let pairs = filters.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(self.get(url).await?.json::<TicketPage>().await?)
    }
}

#[async_trait]
impl NotificationApi for HttpTicketApi {
    async fn list_notifications(&self, scope: NotificationScope) -> Result<NotificationPage, ClientError> {
        let url = self.endpoint(&[scope.segment(), "notifications"])?;
        Ok(self.get(url).await?.json::<NotificationPage>().await?)
    }

    async fn mark_notification_read(
        &self,
        scope: NotificationScope,
        notification_id: &str,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&[scope.segment(), "notifications", notification_id, "read"])?;
        self.post(url).await?;
        Ok(())
    }
}
