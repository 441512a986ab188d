//! Per-client queueing state.
//!
//! A client is the `{id, serial_number, take_serial_number_time}` tuple
//! carried in the sealed cookie. The store never tracks waiting clients
//! individually; the cookie is the client's whole queue position, which is
//! what keeps the hot path to a handful of store reads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current Unix timestamp in seconds.
///
/// # Panics
/// Panics if system time is before the Unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs();
    i64::try_from(secs).expect("timestamp overflows i64")
}

/// Queue state for one client, round-tripped through the sealed cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Ticket number; `0` until one is taken.
    pub serial_number: i64,

    /// Opaque client identifier; empty until assigned.
    pub id: String,

    /// Unix time from which this client may take a ticket.
    pub take_serial_number_time: i64,
}

impl Client {
    /// Assigns a fresh random identity and starts the entry-delay window.
    ///
    /// The delay gives duplicate concurrent requests from the same browser
    /// time to converge on a single cookie before any ticket is consumed.
    pub fn assign_id(&mut self, delay_sec: i64) {
        self.id = Uuid::new_v4().to_string();
        self.take_serial_number_time = unix_now() + delay_sec;
        self.serial_number = 0;
    }

    /// Records the ticket handed out by the store.
    pub fn assign_serial_number(&mut self, serial_number: i64) {
        self.serial_number = serial_number;
    }

    /// Whether an identity has been assigned.
    #[must_use]
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Whether this client already holds a ticket.
    #[must_use]
    pub fn has_serial_number(&self) -> bool {
        self.serial_number != 0 && !self.id.is_empty()
    }

    /// Whether this client qualifies to take a ticket now: identified, not
    /// yet ticketed, and past the entry-delay window.
    #[must_use]
    pub fn can_take_serial_number(&self) -> bool {
        !self.id.is_empty()
            && self.serial_number == 0
            && self.take_serial_number_time > 0
            && self.take_serial_number_time <= unix_now()
    }

    /// Whether the admission watermark covers this client's ticket.
    #[must_use]
    pub const fn is_permit_client(&self, permitted_number: i64) -> bool {
        self.serial_number != 0 && permitted_number >= self.serial_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_client_is_empty() {
        let client = Client::default();
        assert!(!client.has_id());
        assert!(!client.has_serial_number());
        assert!(!client.can_take_serial_number());
    }

    #[test]
    fn assign_id_sets_identity_and_delay() {
        let mut client = Client::default();
        let before = unix_now();
        client.assign_id(10);

        assert!(client.has_id());
        assert_eq!(client.serial_number, 0);
        assert!(client.take_serial_number_time >= before + 10);
    }

    #[test]
    fn assign_id_generates_distinct_ids() {
        let mut a = Client::default();
        let mut b = Client::default();
        a.assign_id(0);
        b.assign_id(0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn cannot_take_serial_number_during_delay() {
        let mut client = Client::default();
        client.assign_id(3600);
        assert!(!client.can_take_serial_number());
    }

    #[test]
    fn can_take_serial_number_after_delay() {
        let client = Client {
            id: "abc".to_string(),
            serial_number: 0,
            take_serial_number_time: unix_now() - 1,
        };
        assert!(client.can_take_serial_number());
    }

    #[test]
    fn ticketed_client_cannot_take_again() {
        let client = Client {
            id: "abc".to_string(),
            serial_number: 5,
            take_serial_number_time: unix_now() - 100,
        };
        assert!(!client.can_take_serial_number());
        assert!(client.has_serial_number());
    }

    #[test]
    fn unidentified_client_cannot_take() {
        let client = Client {
            id: String::new(),
            serial_number: 0,
            take_serial_number_time: unix_now() - 1,
        };
        assert!(!client.can_take_serial_number());
    }

    #[test]
    fn permit_requires_nonzero_ticket_within_watermark() {
        let mut client = Client {
            id: "abc".to_string(),
            serial_number: 0,
            take_serial_number_time: 0,
        };
        // No ticket yet: never covered, whatever the watermark.
        assert!(!client.is_permit_client(100));

        client.assign_serial_number(7);
        assert!(!client.is_permit_client(6));
        assert!(client.is_permit_client(7));
        assert!(client.is_permit_client(100));
    }
}
