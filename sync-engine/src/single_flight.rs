//! Per-key in-flight markers with cancellation.
//!
//! At most one flight per key. The marker is removed when the [`FlightGuard`] drops, which also
//! covers a caller dropping the future mid-flight.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    flights: DashMap<String, CancellationToken>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a flight for `key`, or returns `None` if one is already running.
    pub fn try_begin(&self, key: &str) -> Option<FlightGuard<'_>> {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let token = CancellationToken::new();
                slot.insert(token.clone());
                Some(FlightGuard {
                    owner: self,
                    key: key.to_string(),
                    token,
                })
            }
        }
    }

    /// Signals cancellation to the running flight for `key`. Returns false if none is running.
    pub fn cancel(&self, key: &str) -> bool {
        match self.flights.get(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.flights.contains_key(key)
    }
}

pub(crate) struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    key: String,
    token: CancellationToken,
}

impl FlightGuard<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.flights.remove(&self.key);
    }
}
