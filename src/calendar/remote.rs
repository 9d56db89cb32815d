use super::{Event, EventSource};
use crate::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Error while making a http request.
    #[error("failure requesting remote resource: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a status the client cannot interpret.
    #[error("unexpected status {0} from events API")]
    UnexpectedStatus(StatusCode),
}

/// Client for the calendar events API of another `terminplan` instance.
///
/// Used when the UI runs separately from the process that owns the data
/// files, mirroring the split frontend/backend deployment.
#[derive(Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a new client for the API reachable under `base_url`.
    pub fn new<T: Into<String>>(base_url: T) -> Result<ApiClient, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(ApiClient {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetches the full event collection.
    pub async fn get_events(&self) -> Result<Vec<Event>, ClientError> {
        let url = endpoint_url(&self.base_url, "/api/calendar-events");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status()));
        }

        let events: Vec<Event> = response.json().await?;

        log::debug!("fetched {} events from the events API", events.len());

        Ok(events)
    }

    /// Fetches a single meeting by id. A 404 means the id is unknown to both
    /// of the API's lookup sources and maps to `None`.
    pub async fn get_event(&self, id: i64) -> Result<Option<Event>, ClientError> {
        let url = endpoint_url(&self.base_url, &format!("/api/calendar-meeting/{id}"));
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status()));
        }

        Ok(Some(response.json().await?))
    }
}

fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// An `EventSource` backed by the events API of another instance.
#[derive(Debug)]
pub struct RemoteEventSource {
    client: ApiClient,
}

impl RemoteEventSource {
    pub fn new<T: Into<String>>(base_url: T) -> Result<RemoteEventSource, ClientError> {
        Ok(RemoteEventSource {
            client: ApiClient::new(base_url)?,
        })
    }
}

#[async_trait]
impl EventSource for RemoteEventSource {
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        Ok(self.client.get_events().await?)
    }

    async fn fetch_event(&self, id: i64) -> Result<Option<Event>> {
        Ok(self.client.get_event(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_paths() {
        assert_eq!(
            endpoint_url("http://localhost:5000", "/api/calendar-events"),
            "http://localhost:5000/api/calendar-events"
        );
    }

    #[test]
    fn endpoint_url_trims_trailing_slash() {
        assert_eq!(
            endpoint_url("http://localhost:5000/", "/api/calendar-meeting/3"),
            "http://localhost:5000/api/calendar-meeting/3"
        );
    }
}
