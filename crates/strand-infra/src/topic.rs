//! Broker topic naming
//!
//! The topic name doubles as the lookup key for an existing stream's topic,
//! so it must stay stable for a given (tenant, stream) pair.

/// Literal prefix of every stream topic
pub const TOPIC_PREFIX: &str = "stream";

/// Characters of the tenant ID kept in the topic name
const TENANT_PREFIX_LEN: usize = 8;

/// Derive the broker topic for a stream.
///
/// The tenant ID loses its dashes and is lowercased, then truncated to eight
/// characters. The stream name is lowercased, spaces become dashes, and
/// anything outside `[a-z0-9-]` is dropped.
pub fn generate_topic_name(tenant_id: &str, stream_name: &str) -> String {
    let safe_tenant: String = tenant_id
        .chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .take(TENANT_PREFIX_LEN)
        .collect();

    let safe_name: String = stream_name
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();

    format!("{TOPIC_PREFIX}-{safe_tenant}-{safe_name}")
}
