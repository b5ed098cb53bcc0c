// Common test utilities and fixtures

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items
// Note: These may appear unused in some test crates
#[allow(unused_imports)]
pub use fixtures::{numbered_messages, travel_messages, TRAVEL_QUERY};
#[allow(unused_imports)]
pub use helpers::{body_json, create_test_app, create_test_gateway, create_test_services};
#[cfg(unix)]
#[allow(unused_imports)]
pub use helpers::write_stub_notmuch;
