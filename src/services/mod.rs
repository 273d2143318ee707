//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the connection slot, the SQL agent and the chat
//! transcripts so route handlers can stay focused on request translation
//! and session cookies.

pub mod agent;
pub mod chat;
pub mod connection;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
