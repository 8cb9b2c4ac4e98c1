//! Request DTOs for the HTTP gateway
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

/// Query string for `GET /collections/:collection`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionQuery {
    /// Skip the cache and read remotely
    #[serde(default)]
    pub fresh: bool,
}

/// Request body for `PUT /connectivity`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_query_defaults_to_cached() {
        let query: CollectionQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.fresh);
    }

    #[test]
    fn test_connectivity_request_deserialize() {
        let req: ConnectivityRequest = serde_json::from_str(r#"{"online": false}"#).unwrap();
        assert!(!req.online);
    }

    #[test]
    fn test_connectivity_request_requires_flag() {
        assert!(serde_json::from_str::<ConnectivityRequest>("{}").is_err());
    }
}
