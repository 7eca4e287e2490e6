//! Configuration

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of the adaptation layer
///
/// Missing fields take their default value when deserializing:
///
/// ```
/// let config: lowpan::Config = serde_json::from_str(r#"{ "use_iphc": false }"#).unwrap();
///
/// assert!(!config.use_iphc);
/// assert_eq!(config.expiration_timeout.as_secs(), 60);
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Compress with IPHC (RFC 6282) if `true`, with HC1 (RFC 4944) otherwise
    pub use_iphc: bool,

    /// Elide the UDP checksum when it is valid (IPHC only)
    pub omit_udp_checksum: bool,

    /// Maximum number of concurrent reassemblies; zero means unbounded
    pub reassembly_list_size: usize,

    /// Time given to a datagram to have all its fragments received
    #[serde(with = "millis")]
    pub expiration_timeout: Duration,

    /// Packets whose compressed form is shorter than this are sent uncompressed
    pub compression_threshold: usize,

    /// Seed of the datagram tag generator; `None` seeds from the OS
    pub tag_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_iphc: true,
            omit_udp_checksum: true,
            reassembly_list_size: 0,
            expiration_timeout: Duration::from_secs(60),
            compression_threshold: 0,
            tag_seed: None,
        }
    }
}

/// (De)serializes a `Duration` as a number of milliseconds
mod millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = d
            .as_secs()
            .saturating_mul(1_000)
            .saturating_add(u64::from(d.subsec_millis()));

        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert!(config.use_iphc);
        assert!(config.omit_udp_checksum);
        assert_eq!(config.reassembly_list_size, 0);
        assert_eq!(config.expiration_timeout, Duration::from_secs(60));
        assert_eq!(config.compression_threshold, 0);
        assert_eq!(config.tag_seed, None);
    }

    #[test]
    fn json() {
        let config = Config {
            reassembly_list_size: 4,
            expiration_timeout: Duration::from_millis(1_500),
            tag_seed: Some(7),
            ..Config::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"expiration_timeout\":1500"));
        assert_eq!(serde_json::from_str::<Config>(&json).unwrap(), config);

        let partial: Config = serde_json::from_str(r#"{"compression_threshold": 20}"#).unwrap();
        assert_eq!(partial.compression_threshold, 20);
        assert_eq!(partial.expiration_timeout, Duration::from_secs(60));
    }
}
