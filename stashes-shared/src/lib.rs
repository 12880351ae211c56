use std::net::TcpListener;

use rand::Rng;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod content;
pub mod error;
pub mod file;
pub mod stash;

/// Header carrying the authenticated caller's user id, set by the fronting auth proxy.
pub const USER_HEADER: &str = "x-stash-user";

/// A list of strings stored as a JSON column, used for file tags.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct StringVec(pub Vec<String>);

impl StringVec {
    pub fn empty() -> Self {
        Self(Vec::new())
    }
}

impl From<Vec<&str>> for StringVec {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(String::from).collect())
    }
}

/// Plain HTTP listen address, TLS is terminated in front of the service.
pub struct AddrInfo {
    pub addr: String,
    pub port: u16,
}

impl AddrInfo {
    pub fn as_url(&self) -> String {
        format!("http://{}:{}", self.addr, self.port)
    }

    pub fn as_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn from_env() -> Self {
        let port: u16 = match std::env::var("STASHES_PORT") {
            Ok(val) => val.parse().unwrap_or(8190),
            Err(_) => 8190,
        };

        Self {
            addr: std::env::var("STASHES_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
        }
    }

    pub fn test() -> Self {
        // select a random port
        let mut rng = rand::rng();

        let mut port: u16 = rng.random_range(32768..65535);
        while TcpListener::bind(format!("127.0.0.1:{}", port)).is_err() {
            port = rng.random_range(32768..65535);
        }

        Self {
            addr: "127.0.0.1".to_string(),
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addrinfo() {
        let testval = AddrInfo {
            addr: "1.2.3.4".to_string(),
            port: 12345,
        };

        assert_eq!(testval.as_url(), "http://1.2.3.4:12345".to_string());
        assert_eq!(testval.as_addr(), "1.2.3.4:12345".to_string());

        let _ = AddrInfo::from_env();
        let random = AddrInfo::test();
        assert!(random.port >= 32768);
    }

    #[test]
    fn test_stringvec_json() {
        let tags = StringVec::from(vec!["notes", "draft"]);
        let encoded = serde_json::to_string(&tags).expect("Failed to serialize tags");
        assert_eq!(encoded, r#"["notes","draft"]"#);
        assert!(StringVec::empty().0.is_empty());
    }
}
