pub mod layout;
pub mod remote;
pub mod templating;

use super::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Serde adapter for the timestamp formats found in the event data files.
///
/// Plain `YYYY-MM-DDTHH:MM:SS` values and RFC 3339 values with an offset are
/// both accepted. Offset timestamps keep the wall-clock time as written; the
/// layout engine never converts between timezones. Serialization always emits
/// the plain form.
mod flexible_datetime {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub(crate) fn parse(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.naive_local())
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
    }
}

/// A document attached to an interview event.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Document {
    /// The document name.
    pub name: String,
    /// The URL the document can be fetched from, if any.
    pub url: Option<String>,
}

/// The job opening an interview belongs to.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct JobRef {
    /// The job title.
    #[serde(rename = "jobRequest_Title")]
    pub title: Option<String>,
    /// Remaining job fields, carried through uninterpreted.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The candidate being interviewed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    #[serde(rename = "candidate_firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "candidate_lastName")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The staff member an interview is handled by.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Contact {
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Candidate and staff details attached to an interview event.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct UserDetails {
    pub candidate: Option<Candidate>,
    pub handled_by: Option<Contact>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Represents a single calendar event.
///
/// Only the fields the views interpret are modeled; everything else in the
/// data files is kept in `extra` and round-trips through the JSON API.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Event {
    /// Unique identifier, used as the lookup key.
    pub id: i64,
    /// Short display label.
    #[serde(default)]
    pub summary: String,
    /// Free-form description.
    #[serde(default, alias = "desc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The start of the event.
    #[serde(with = "flexible_datetime")]
    pub start: NaiveDateTime,
    /// The end of the event. Expected to be at or after `start`, but never
    /// validated; malformed intervals flow through to rendering.
    #[serde(with = "flexible_datetime")]
    pub end: NaiveDateTime,
    /// Meeting link to join the interview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interviewer: Option<String>,
    #[serde(default, rename = "createdBy", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, rename = "meetingPlatform", skip_serializing_if = "Option::is_none")]
    pub meeting_platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_det: Option<UserDetails>,
    /// Remaining fields, carried through uninterpreted.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.summary.fmt(f)
    }
}

impl Event {
    /// The job title, preferring the nested job reference over the flat field.
    pub fn job_title(&self) -> Option<&str> {
        self.job_id
            .as_ref()
            .and_then(|job| job.title.as_deref())
            .or(self.position.as_deref())
    }

    /// First name of the interviewer handling the event.
    pub fn interviewer_name(&self) -> Option<&str> {
        self.user_det
            .as_ref()
            .and_then(|det| det.handled_by.as_ref())
            .and_then(|contact| contact.first_name.as_deref())
            .or(self.interviewer.as_deref())
    }

    /// Full name of the candidate, if the event carries one.
    pub fn candidate_name(&self) -> Option<String> {
        let candidate = self.user_det.as_ref()?.candidate.as_ref()?;
        let first = candidate.first_name.as_deref()?;

        Some(match candidate.last_name.as_deref() {
            Some(last) => format!("{first} {last}").trim().to_string(),
            None => first.to_string(),
        })
    }

    /// Full name of whoever scheduled the event.
    pub fn created_by_name(&self) -> Option<String> {
        let contact = self
            .user_det
            .as_ref()
            .and_then(|det| det.handled_by.as_ref());

        match contact.and_then(|contact| contact.first_name.as_deref()) {
            Some(first) => Some(match contact.and_then(|c| c.last_name.as_deref()) {
                Some(last) => format!("{first} {last}").trim().to_string(),
                None => first.to_string(),
            }),
            None => self.created_by.clone(),
        }
    }

    /// The attached documents, empty when the event carries none.
    pub fn document_list(&self) -> &[Document] {
        self.documents.as_deref().unwrap_or_default()
    }
}

/// Represents sources of calendar events for the UI.
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum EventSourceKind {
    /// Read events from the in-process event store.
    Store,
    /// Fetch events from the JSON API over HTTP.
    Remote,
}

/// Outcome of an id lookup against the event store.
///
/// The store consults its sources in a fixed order: the event collection
/// first, then the fallback meeting record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// The id matched an event in the collection.
    Primary(&'a Event),
    /// The id missed the collection but matched the fallback record.
    Fallback(&'a Event),
    /// The id matched neither source.
    Miss,
}

impl<'a> Lookup<'a> {
    /// Returns the matched event, if any.
    pub fn event(self) -> Option<&'a Event> {
        match self {
            Lookup::Primary(event) | Lookup::Fallback(event) => Some(event),
            Lookup::Miss => None,
        }
    }
}

/// Read-only store holding the event collection and the fallback meeting
/// record. Both are loaded once at startup and never change afterwards.
#[derive(Debug, Clone)]
pub struct EventStore {
    events: Vec<Event>,
    fallback: Event,
}

impl EventStore {
    /// Creates a store from an already loaded collection and fallback record.
    pub fn new(events: Vec<Event>, fallback: Event) -> EventStore {
        EventStore { events, fallback }
    }

    /// Loads the store from the two JSON data files. Any read or parse
    /// failure is fatal to startup, the process cannot serve without its data.
    pub fn from_paths(events_file: &Path, meeting_file: &Path) -> Result<EventStore> {
        let events = read_json(events_file)?;
        let fallback = read_json(meeting_file)?;

        Ok(EventStore::new(events, fallback))
    }

    /// All events, in the order they were loaded from the data file.
    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Looks up an event by id, reporting which source matched.
    pub fn lookup(&self, id: i64) -> Lookup<'_> {
        if let Some(event) = self.events.iter().find(|event| event.id == id) {
            return Lookup::Primary(event);
        }

        if self.fallback.id == id {
            return Lookup::Fallback(&self.fallback);
        }

        Lookup::Miss
    }

    /// Looks up an event by id across both sources.
    pub fn get(&self, id: i64) -> Option<&Event> {
        self.lookup(id).event()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Trait that needs to be implemented by a source of calendar events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetches all events from the source.
    async fn fetch_events(&self) -> Result<Vec<Event>>;

    /// Fetches a single event by id. `None` means the id is unknown to the
    /// source, which is a regular outcome rather than an error.
    async fn fetch_event(&self, id: i64) -> Result<Option<Event>>;
}

/// An `EventSource` reading from the in-process event store.
pub struct StoreEventSource {
    store: Arc<EventStore>,
}

impl StoreEventSource {
    pub fn new(store: Arc<EventStore>) -> StoreEventSource {
        StoreEventSource { store }
    }
}

#[async_trait]
impl EventSource for StoreEventSource {
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        Ok(self.store.all().to_vec())
    }

    async fn fetch_event(&self, id: i64) -> Result<Option<Event>> {
        Ok(self.store.get(id).cloned())
    }
}

#[async_trait]
impl<T> EventSource for Box<T>
where
    T: EventSource + ?Sized,
{
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        (**self).fetch_events().await
    }

    async fn fetch_event(&self, id: i64) -> Result<Option<Event>> {
        (**self).fetch_event(id).await
    }
}

#[async_trait]
impl<T> EventSource for Arc<T>
where
    T: EventSource + ?Sized,
{
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        (**self).fetch_events().await
    }

    async fn fetch_event(&self, id: i64) -> Result<Option<Event>> {
        (**self).fetch_event(id).await
    }
}

/// Outcome of loading the event collection for a page render.
///
/// Rendering happens after the fetch resolved, so only the terminal states
/// exist here; a failure turns into the error banner instead of a 500.
#[derive(Debug, Clone)]
pub enum EventLoad {
    Loaded(Vec<Event>),
    Failed(String),
}

impl EventLoad {
    /// Fetches events from a source, folding errors into a renderable state.
    pub async fn fetch(source: &dyn EventSource) -> EventLoad {
        match source.fetch_events().await {
            Ok(events) => EventLoad::Loaded(events),
            Err(err) => {
                log::error!("failed to fetch calendar events: {err}");
                EventLoad::Failed(err.to_string())
            }
        }
    }
}
