//! Pi-hole v6 API payloads

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub session: AuthSession,
}

#[derive(Debug, Deserialize)]
pub struct AuthSession {
    pub valid: bool,
    #[serde(default)]
    pub sid: Option<String>,
    /// Seconds until the session expires
    #[serde(default)]
    pub validity: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueriesResponse {
    #[serde(default)]
    pub queries: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRow {
    /// Unix time with sub-second precision
    pub time: f64,
    pub client: QueryClient,
}

#[derive(Debug, Deserialize)]
pub struct QueryClient {
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupsResponse {
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub comment: &'a str,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct DomainsResponse {
    #[serde(default)]
    pub domains: Vec<DomainEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainEntry {
    pub domain: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub groups: Vec<i64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ClientsResponse {
    #[serde(default)]
    pub clients: Vec<ClientEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientEntry {
    /// Address (or MAC, hostname, subnet) identifying the client
    pub client: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub groups: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_rows_ignore_extra_fields() {
        let json = r#"{
            "queries": [{
                "id": 1, "time": 1700000000.52, "type": "A", "status": "FORWARDED",
                "domain": "www.youtube.com", "client": {"ip": "192.168.1.20", "name": null}
            }],
            "cursor": 1, "recordsTotal": 1, "recordsFiltered": 1, "took": 0.002
        }"#;
        let response: QueriesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.queries.len(), 1);
        assert_eq!(response.queries[0].client.ip, "192.168.1.20");
        assert!((response.queries[0].time - 1_700_000_000.52).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_session() {
        let json = r#"{"session": {"valid": false, "totp": false, "sid": null, "validity": -1, "message": "password incorrect"}}"#;
        let response: AuthResponse = serde_json::from_str(json).unwrap();
        assert!(!response.session.valid);
        assert_eq!(response.session.sid, None);
        assert_eq!(response.session.message.as_deref(), Some("password incorrect"));
    }
}
