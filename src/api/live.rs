use anyhow::Context;

use super::payloads::EventRecord;

/// Name of the notification the API publishes after an event is created.
pub const NEW_EVENT: &str = "newEvent";

#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate {
    NewEvent(EventRecord),
}

/// Parse one notification from the live-update channel. Unknown notification names are ignored.
pub fn parse_live_message(name: &str, payload: &str) -> anyhow::Result<Option<LiveUpdate>> {
    match name {
        NEW_EVENT => {
            let record: EventRecord =
                serde_json::from_str(payload).context("Parsing newEvent payload")?;
            Ok(Some(LiveUpdate::NewEvent(record)))
        }
        _ => {
            log::debug!("Ignoring live notification '{}'", name);
            Ok(None)
        }
    }
}

/// Tracks requested reloads of the feature collection.
///
/// Any number of requests made before a reload starts are served by that one reload, and requests
/// made while a reload is in flight are served by a single follow-up reload.
#[derive(Debug, Default)]
pub struct ReloadQueue {
    pending: bool,
    in_flight: bool,
    coalesced: u64,
}

impl ReloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self) {
        if self.pending {
            self.coalesced += 1;
        }
        self.pending = true;
    }

    /// Start the next reload if one is pending and none is in flight.
    pub fn start_next(&mut self) -> bool {
        if self.pending && !self.in_flight {
            self.pending = false;
            self.in_flight = true;
            return true;
        }
        false
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Number of requests absorbed by an already pending reload.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}
