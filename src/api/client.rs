use std::time::Duration;

use anyhow::Context;
use reqwest::{blocking::Client, Url};
use serde::de::DeserializeOwned;

use crate::feature::{error::LoadError, feature::RawCollection, geojson::parse_feature_collection};

use super::{
    error::{error_from_response, ApiError},
    payloads::{EventRecord, LoginRequest, LoginResponse, NewEvent},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

/// Blocking client of the event API (`/events`, `/login`).
pub struct EventApiClient {
    client: Client,
    events_url: Url,
    login_url: Url,
}

impl EventApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:3000/api`.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("Parsing API url {}", base_url))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("geoboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            events_url: base.join("events")?,
            login_url: base.join("login")?,
        })
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    pub fn fetch_events(&self) -> Result<RawCollection, LoadError> {
        log::info!("Fetching events from {}", self.events_url);
        let response = self
            .client
            .get(self.events_url.clone())
            .send()
            .map_err(|err| LoadError::Fetch(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Fetch(format!("HTTP status {}", status)));
        }
        let body = response
            .text()
            .map_err(|err| LoadError::Fetch(err.to_string()))?;
        parse_feature_collection(&body)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = LoginRequest { username, password };
        request.validate()?;
        log::info!("Logging in as {}", username);
        let response = self
            .client
            .post(self.login_url.clone())
            .json(&request)
            .send()?;
        read_json(response)
    }

    /// Create an event. Requires the token of an admin login.
    pub fn create_event(&self, token: &str, event: &NewEvent) -> Result<EventRecord, ApiError> {
        event.validate()?;
        if token.is_empty() {
            return Err(ApiError::Unauthorized("Not logged in".to_string()));
        }
        log::info!("Creating {} event '{}'", event.category, event.title);
        let response = self
            .client
            .post(self.events_url.clone())
            .bearer_auth(token)
            .json(event)
            .send()?;
        read_json(response)
    }
}

fn read_json<T: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T, ApiError> {
    let status = response.status().as_u16();
    let body = response.text()?;
    if !(200..300).contains(&status) {
        return Err(error_from_response(status, &body));
    }
    serde_json::from_str(&body).map_err(|err| ApiError::UnexpectedStatus {
        status,
        message: format!("unreadable response body: {}", err),
    })
}
