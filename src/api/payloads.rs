use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::feature::feature::{Category, RawFeature, RawGeometry};

use super::error::ApiError;

#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl LoginRequest<'_> {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut messages = Vec::new();
        if self.username.trim().is_empty() {
            messages.push("Username is required".to_string());
        }
        if self.password.is_empty() {
            messages.push("Password is required".to_string());
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(messages))
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

/// Body of an admin event creation request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub category: Category,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: Option<String>,
    pub date: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewEvent {
    /// Same rules the API applies, checked before sending.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut messages = Vec::new();
        if self.title.trim().is_empty() {
            messages.push("Title is required".to_string());
        }
        if !self.latitude.is_finite() {
            messages.push("Valid latitude is required".to_string());
        }
        if !self.longitude.is_finite() {
            messages.push("Valid longitude is required".to_string());
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(messages))
        }
    }
}

/// Event record as stored by the API, returned on creation and pushed to live-update subscribers.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: JsonValue,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EventRecord {
    pub fn id_string(&self) -> Option<String> {
        match &self.id {
            JsonValue::String(id) => Some(id.clone()),
            JsonValue::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl From<EventRecord> for RawFeature {
    fn from(record: EventRecord) -> Self {
        let geometry = match (record.latitude, record.longitude) {
            (Some(latitude), Some(longitude)) => RawGeometry::Point {
                latitude,
                longitude,
            },
            _ => RawGeometry::Missing,
        };
        RawFeature {
            id: record.id_string(),
            category: record.category,
            title: record.title,
            description: record.description,
            link: record.link,
            date: record.date,
            geometry,
        }
    }
}
