//! Per-service provisioning: the create config each service needs and the
//! caller-relevant value derived from its instance.

pub mod callback_listener;
pub mod couchdb;
pub mod encore;
pub mod minio;
pub mod packager;
pub mod valkey;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};

/// Queue shared by the callback listener (producer) and the packager (consumer).
pub const PACKAGE_QUEUE: &str = "package";

/// Random lowercase password with the given prefix.
pub(crate) fn generate_password(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}", prefix, suffix)
}

/// Build a create config from string pairs.
pub(crate) fn config<const N: usize>(pairs: [(&str, String); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password() {
        let password = generate_password("ai");
        assert!(password.starts_with("ai"));
        assert_eq!(password.len(), 12);
        assert!(password
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_config_pairs() {
        let config = config([("RedisQueue", PACKAGE_QUEUE.to_string())]);
        assert_eq!(config["RedisQueue"], "package");
    }
}
