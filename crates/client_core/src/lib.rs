use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Duty, DutyId},
    error::ApiError,
    protocol::{DutyPage, DutyPayload, ListDutiesQuery, DUTIES_ROUTE},
};
use tracing::debug;
use url::Url;

pub mod error;
pub mod fetch_state;
pub mod location;
pub mod mutations;
pub mod orchestrator;

pub use error::{MutationError, RequestError};
pub use fetch_state::{FetchEvent, FetchState};
pub use location::{
    HistoryMode, Location, LocationStore, LocationWatch, MemoryHistory, PaginationLocation,
};
pub use mutations::{
    DraftValidator, Editor, ListEffect, MutationCoordinator, MutationKind, MutationOutcome,
    MutationStatus, NameRules, OperationStatus,
};
pub use orchestrator::{ListOrchestrator, LoadOutcome};

/// The remote duties resource.
#[async_trait]
pub trait DutiesApi: Send + Sync {
    async fn list_duties(&self, page: u32, page_size: u32) -> Result<DutyPage, RequestError>;
    async fn create_duty(&self, name: &str) -> Result<Duty, RequestError>;
    async fn update_duty(&self, id: DutyId, name: &str) -> Result<Duty, RequestError>;
    async fn delete_duty(&self, id: DutyId) -> Result<(), RequestError>;
}

/// Transient, non-blocking user notifications.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

pub struct HttpDutiesApi {
    http: Client,
    base_url: Url,
}

impl HttpDutiesApi {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, RequestError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RequestError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RequestError::Url(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl DutiesApi for HttpDutiesApi {
    async fn list_duties(&self, page: u32, page_size: u32) -> Result<DutyPage, RequestError> {
        let url = self.endpoint(&[DUTIES_ROUTE])?;
        debug!(%url, page, page_size, "listing duties");
        let response = self
            .http
            .get(url)
            .query(&ListDutiesQuery { page, page_size })
            .send()
            .await?;
        decode(response).await
    }

    async fn create_duty(&self, name: &str) -> Result<Duty, RequestError> {
        let url = self.endpoint(&[DUTIES_ROUTE])?;
        debug!(%url, "creating duty");
        let response = self
            .http
            .post(url)
            .json(&DutyPayload {
                name: name.to_string(),
            })
            .send()
            .await?;
        decode(response).await
    }

    async fn update_duty(&self, id: DutyId, name: &str) -> Result<Duty, RequestError> {
        let id = id.to_string();
        let url = self.endpoint(&[DUTIES_ROUTE, &id])?;
        debug!(%url, "updating duty");
        let response = self
            .http
            .put(url)
            .json(&DutyPayload {
                name: name.to_string(),
            })
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_duty(&self, id: DutyId) -> Result<(), RequestError> {
        let id = id.to_string();
        let url = self.endpoint(&[DUTIES_ROUTE, &id])?;
        debug!(%url, "deleting duty");
        let response = self.http.delete(url).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
    let body = ensure_success(response).await?.bytes().await?;
    serde_json::from_slice(&body).map_err(|err| RequestError::Decode(err.to_string()))
}

async fn ensure_success(response: Response) -> Result<Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .ok()
        .map(|error| error.message)
        .filter(|message| !message.trim().is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|body| !body.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    Err(RequestError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
