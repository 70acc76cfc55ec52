use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::models::{
    AuthRequest, AuthResponse, ClientEntry, ClientsResponse, DomainEntry, DomainsResponse, Group,
    GroupsResponse, NewGroup, QueriesResponse,
};
use super::{glob_to_regex, group_name};
use crate::config::PiholeConfig;
use crate::providers::http::{ResponseExt, build_client};
use crate::providers::{BlockingProvider, EventSource, QueryEvent};

const SID_HEADER: &str = "X-FTL-SID";
const MANAGED_COMMENT: &str = "Managed by family-dns-limiter";
/// Pi-hole's built-in group that carries the regular adlists
const DEFAULT_GROUP_ID: i64 = 0;

struct Session {
    sid: String,
    expires_at: Instant,
}

/// Pi-hole v6 REST client
pub struct PiholeClient {
    http: reqwest::Client,
    base: Url,
    password: Option<String>,
    query_limit: u32,
    session: Mutex<Option<Session>>,
}

impl PiholeClient {
    pub fn new(config: &PiholeConfig) -> Result<Self> {
        let base = Url::parse(&config.address)
            .with_context(|| format!("Invalid Pi-hole address: {}", config.address))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Invalid Pi-hole address: {}", config.address);
        }

        let http = build_client(Duration::from_secs(config.request_timeout))
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base,
            password: config.password.clone().filter(|p| !p.is_empty()),
            query_limit: config.query_limit,
            session: Mutex::new(None),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Pi-hole address cannot be a base URL"))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    /// Session id for the next request, authenticating when the cached one expired.
    ///
    /// Returns `None` when no password is configured.
    async fn session_id(&self) -> Result<Option<String>> {
        let Some(password) = &self.password else {
            return Ok(None);
        };

        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            if Instant::now() < current.expires_at {
                return Ok(Some(current.sid.clone()));
            }
        }

        let response: AuthResponse = self
            .http
            .post(self.endpoint(&["auth"])?)
            .json(&AuthRequest { password })
            .send()
            .await
            .context("Failed to reach Pi-hole")?
            .ensure_success("Pi-hole auth")
            .await?
            .json()
            .await
            .context("Failed to parse Pi-hole auth response")?;

        let auth = response.session;
        if !auth.valid {
            anyhow::bail!(
                "Pi-hole session is not valid: {}",
                auth.message.unwrap_or_default()
            );
        }

        let sid = auth.sid.context("Pi-hole returned no session id")?;
        let validity = Duration::from_secs(auth.validity.max(0) as u64);
        info!("Authenticated with Pi-hole (session valid for {}s)", validity.as_secs());

        *session = Some(Session {
            sid: sid.clone(),
            expires_at: Instant::now() + validity,
        });
        Ok(Some(sid))
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let mut builder = self.http.request(method, url);
        if let Some(sid) = self.session_id().await? {
            builder = builder.header(SID_HEADER, sid);
        }
        Ok(builder)
    }

    async fn execute(&self, request: RequestBuilder, api_name: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", api_name))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Server dropped the session; authenticate again on the next call
            self.session.lock().await.take();
        }

        response.ensure_success(api_name).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let request = self.request(Method::GET, self.endpoint(&["groups"])?).await?;
        let response: GroupsResponse = self
            .execute(request, "Pi-hole groups")
            .await?
            .json()
            .await
            .context("Failed to parse Pi-hole groups")?;
        Ok(response.groups)
    }

    async fn find_group(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .list_groups()
            .await?
            .into_iter()
            .find(|g| g.name == name)
            .map(|g| g.id))
    }

    async fn get_or_create_group(&self, name: &str) -> Result<i64> {
        if let Some(id) = self.find_group(name).await? {
            return Ok(id);
        }

        info!("Creating Pi-hole group {}", name);
        let request = self
            .request(Method::POST, self.endpoint(&["groups"])?)
            .await?
            .json(&NewGroup {
                name,
                comment: MANAGED_COMMENT,
                enabled: true,
            });
        let created = match self
            .execute(request, "Pi-hole groups")
            .await?
            .json::<GroupsResponse>()
            .await
        {
            Ok(created) => Some(created),
            Err(e) => {
                debug!("Unexpected group creation response, looking the group up instead: {}", e);
                None
            }
        };

        if let Some(group) = created
            .into_iter()
            .flat_map(|r| r.groups)
            .find(|g| g.name == name)
        {
            return Ok(group.id);
        }

        self.find_group(name)
            .await?
            .with_context(|| format!("Group {} not found after creation", name))
    }

    async fn list_regex_denies(&self) -> Result<Vec<DomainEntry>> {
        let url = self.endpoint(&["domains", "deny", "regex"])?;
        let request = self.request(Method::GET, url).await?;
        let response: DomainsResponse = self
            .execute(request, "Pi-hole domains")
            .await?
            .json()
            .await
            .context("Failed to parse Pi-hole domains")?;
        Ok(response.domains)
    }

    /// Bind a deny regex to the group, creating it if missing.
    ///
    /// Existing entries keep the groups they already belong to.
    async fn bind_regex(&self, regex: &str, group_id: i64, existing: &[DomainEntry]) -> Result<()> {
        match existing.iter().find(|d| d.domain == regex) {
            Some(entry) if entry.groups.contains(&group_id) => {
                debug!("Regex {} already bound to group {}", regex, group_id);
                Ok(())
            }
            Some(entry) => {
                let mut updated = entry.clone();
                updated.groups.push(group_id);
                updated.enabled = true;

                let url = self.endpoint(&["domains", "deny", "regex", regex])?;
                let request = self.request(Method::PUT, url).await?.json(&updated);
                self.execute(request, "Pi-hole domains").await?;
                Ok(())
            }
            None => {
                let entry = DomainEntry {
                    domain: regex.to_string(),
                    comment: Some(MANAGED_COMMENT.to_string()),
                    groups: vec![group_id],
                    enabled: true,
                };

                let url = self.endpoint(&["domains", "deny", "regex"])?;
                let request = self.request(Method::POST, url).await?.json(&entry);
                self.execute(request, "Pi-hole domains").await?;
                Ok(())
            }
        }
    }

    async fn find_client(&self, ip: &str) -> Result<Option<ClientEntry>> {
        let request = self.request(Method::GET, self.endpoint(&["clients"])?).await?;
        let response: ClientsResponse = self
            .execute(request, "Pi-hole clients")
            .await?
            .json()
            .await
            .context("Failed to parse Pi-hole clients")?;
        Ok(response.clients.into_iter().find(|c| c.client == ip))
    }

    async fn update_client(&self, entry: &ClientEntry) -> Result<()> {
        let url = self.endpoint(&["clients", &entry.client])?;
        let request = self.request(Method::PUT, url).await?.json(entry);
        self.execute(request, "Pi-hole clients").await?;
        Ok(())
    }

    async fn add_client_to_group(&self, ip: &str, group_id: i64) -> Result<()> {
        match self.find_client(ip).await? {
            Some(entry) if entry.groups.contains(&group_id) => {
                debug!("Client {} already in group {}", ip, group_id);
                Ok(())
            }
            Some(mut entry) => {
                entry.groups.push(group_id);
                self.update_client(&entry).await
            }
            None => {
                let entry = ClientEntry {
                    client: ip.to_string(),
                    comment: Some(MANAGED_COMMENT.to_string()),
                    groups: vec![DEFAULT_GROUP_ID, group_id],
                };
                let request = self
                    .request(Method::POST, self.endpoint(&["clients"])?)
                    .await?
                    .json(&entry);
                self.execute(request, "Pi-hole clients").await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventSource for PiholeClient {
    async fn fetch_queries(
        &self,
        pattern: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<QueryEvent>> {
        let mut url = self.endpoint(&["queries"])?;
        url.query_pairs_mut()
            .append_pair("domain", pattern)
            .append_pair("from", &from.timestamp().to_string())
            .append_pair("until", &until.timestamp().to_string())
            .append_pair("length", &self.query_limit.to_string());

        let request = self.request(Method::GET, url).await?;
        let response: QueriesResponse = self
            .execute(request, "Pi-hole queries")
            .await?
            .json()
            .await
            .context("Failed to parse Pi-hole query log")?;

        if response.queries.len() >= self.query_limit as usize {
            warn!(
                "Query log for {} hit the row limit ({}); some queries may be missed",
                pattern, self.query_limit
            );
        }

        let mut events = Vec::with_capacity(response.queries.len());
        for row in response.queries {
            match QueryEvent::from_unix_secs(&row.client.ip, row.time) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Dropping query log row for {}: {}", pattern, e),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl BlockingProvider for PiholeClient {
    async fn block(&self, client: &str, patterns: &[String]) -> Result<()> {
        let name = group_name(client);
        let group_id = self
            .get_or_create_group(&name)
            .await
            .context("Failed to get or create group")?;

        let existing = self.list_regex_denies().await?;
        for pattern in patterns {
            let regex = glob_to_regex(pattern);
            debug!("Binding {} to group {}", regex, name);
            self.bind_regex(&regex, group_id, &existing)
                .await
                .with_context(|| format!("Failed to add domain {}", pattern))?;
        }

        self.add_client_to_group(client, group_id)
            .await
            .context("Failed to add client to group")?;

        info!("Client {} added to group {}", client, name);
        Ok(())
    }

    async fn unblock(&self, client: &str) -> Result<()> {
        let name = group_name(client);
        let Some(group_id) = self.find_group(&name).await? else {
            debug!("Group {} does not exist, nothing to unblock", name);
            return Ok(());
        };

        let Some(mut entry) = self.find_client(client).await? else {
            debug!("Client {} unknown to Pi-hole, nothing to unblock", client);
            return Ok(());
        };

        if !entry.groups.contains(&group_id) {
            debug!("Client {} is not in group {}", client, name);
            return Ok(());
        }

        entry.groups.retain(|g| *g != group_id);
        self.update_client(&entry)
            .await
            .context("Failed to remove client from group")?;

        info!("Client {} removed from group {}", client, name);
        Ok(())
    }
}
