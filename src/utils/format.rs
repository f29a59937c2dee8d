//! Display formatting helpers

/// Render seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
