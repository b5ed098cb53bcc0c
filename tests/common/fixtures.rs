// Test fixtures for integration testing

use mailgate::core::backend::MemoryMessage;

/// Query matching exactly the three travel messages
#[allow(dead_code)] // Used in integration tests
pub const TRAVEL_QUERY: &str = "tag:travel";

/// A small mailbox: three travel messages and two others
#[allow(dead_code)] // Used in integration tests
pub fn travel_messages() -> Vec<MemoryMessage> {
    vec![
        MemoryMessage::new("<flight@airline.example>", "0000000000000001")
            .date(1_700_000_000)
            .from("Airline <noreply@airline.example>")
            .subject("Flight Confirmation")
            .tags(["inbox", "travel"])
            .filename("/mail/cur/flight.eml"),
        MemoryMessage::new("<hotel@hotel.example>", "0000000000000002")
            .date(1_700_500_000)
            .from("Hotel <desk@hotel.example>")
            .subject("Your booking")
            .tags(["travel"])
            .filename("/mail/cur/hotel.eml"),
        MemoryMessage::new("<train@rail.example>", "0000000000000003")
            .date(1_699_000_000)
            .subject("E-ticket")
            .tags(["travel", "unread"])
            .filename("/mail/cur/train.eml"),
        MemoryMessage::new("<12345@example.com>", "0000000000000004")
            .date(1_600_000_000)
            .from("sender@example.com")
            .subject("Quarterly newsletter")
            .tags(["inbox"])
            .filename("/mail/cur/newsletter.eml"),
        MemoryMessage::new("<nodate@example.com>", "0000000000000005")
            .subject("Broken Date header")
            .filename("/mail/cur/nodate.eml"),
    ]
}

/// `count` bulk messages tagged `bulk`, one second apart
#[allow(dead_code)] // Used in integration tests
pub fn numbered_messages(count: usize) -> Vec<MemoryMessage> {
    (0..count)
        .map(|i| {
            MemoryMessage::new(format!("<bulk-{i:04}@example.com>"), format!("bulk-{i}"))
                .date(1_600_000_000 + i as i64)
                .subject(format!("Bulk message {i}"))
                .tags(["bulk"])
        })
        .collect()
}
