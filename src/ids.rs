//! Record-id generation.

use chrono::Utc;
use uuid::Uuid;

/// Next record id as a 50-char string: zero-padded epoch milliseconds
/// (15 digits), a UUIDv4 in hex (32 chars), and a `000` suffix.
///
/// Ids generated on one machine sort by creation time.
pub fn next_id() -> String {
    let millis = Utc::now().timestamp_millis();
    format!("{:015}{}000", millis, Uuid::new_v4().simple())
}
