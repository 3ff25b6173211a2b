use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Human-readable ticket number: the first four hex digits of the event
/// and booking ids plus the 1-based position of the seat within the
/// booking.
pub fn ticket_number(event_id: Uuid, booking_id: Uuid, index: usize) -> String {
    let event = event_id.simple().to_string();
    let booking = booking_id.simple().to_string();
    format!("{}-{}-{}", &event[..4], &booking[..4], index)
}

pub fn transaction_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "txn-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..6]
    )
}

/// QR payload embedded in each ticket: the identifiers a scanner needs to
/// validate entry, plus a digest binding them together.
pub fn qr_payload(
    ticket_id: Uuid,
    event_id: Uuid,
    booking_id: Uuid,
    user_id: Uuid,
    seat: &str,
    ticket_number: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ticket_id.as_bytes());
    hasher.update(event_id.as_bytes());
    hasher.update(booking_id.as_bytes());
    hasher.update(seat.as_bytes());
    let sig = format!("{:x}", hasher.finalize());

    json!({
        "ticketId": ticket_id,
        "eventId": event_id,
        "bookingId": booking_id,
        "userId": user_id,
        "seat": seat,
        "ticketNumber": ticket_number,
        "sig": sig,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_number_format() {
        let event = Uuid::parse_str("deadbeef-0000-0000-0000-000000000000").unwrap();
        let booking = Uuid::parse_str("cafebabe-0000-0000-0000-000000000000").unwrap();
        assert_eq!(ticket_number(event, booking, 1), "dead-cafe-1");
        assert_eq!(ticket_number(event, booking, 3), "dead-cafe-3");
    }

    #[test]
    fn transaction_id_prefix() {
        let id = transaction_id();
        assert!(id.starts_with("txn-"));
        assert_eq!(id.split('-').count(), 3);
    }

    #[test]
    fn qr_payload_embeds_identifiers() {
        let ticket = Uuid::new_v4();
        let event = Uuid::new_v4();
        let booking = Uuid::new_v4();
        let user = Uuid::new_v4();

        let payload = qr_payload(ticket, event, booking, user, "A-5", "dead-cafe-1");
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["ticketId"], ticket.to_string());
        assert_eq!(parsed["seat"], "A-5");
        assert_eq!(parsed["ticketNumber"], "dead-cafe-1");
        assert_eq!(parsed["sig"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn qr_signature_is_deterministic() {
        let ticket = Uuid::new_v4();
        let event = Uuid::new_v4();
        let booking = Uuid::new_v4();
        let user = Uuid::new_v4();

        let a = qr_payload(ticket, event, booking, user, "A-5", "n1");
        let b = qr_payload(ticket, event, booking, user, "A-5", "n1");
        assert_eq!(a, b);

        let c = qr_payload(ticket, event, booking, user, "A-6", "n1");
        assert_ne!(a, c);
    }
}
