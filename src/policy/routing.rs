use crate::config::Config;
use crate::policy::RoutingPolicy;
use crate::uri::{extract_site_key, CrawlUri};
use crate::util::{read, write};
use std::collections::HashMap;
use std::sync::RwLock;

/// Routes URIs by host and ranks sites from a precedence table
///
/// Both tables can change while the crawl runs. `reassign` models a host
/// whose grouping changed after new information (e.g. a resolved address)
/// became known; queued URIs for that host are moved on their next dispatch.
pub struct HostRoutingPolicy {
    /// host-derived key -> replacement site key
    reassigned: RwLock<HashMap<String, String>>,

    /// site key -> precedence tier
    precedences: RwLock<HashMap<String, u32>>,

    default_precedence: u32,
}

impl HostRoutingPolicy {
    pub fn new(default_precedence: u32) -> Self {
        Self {
            reassigned: RwLock::new(HashMap::new()),
            precedences: RwLock::new(HashMap::new()),
            default_precedence,
        }
    }

    /// Builds a policy carrying the per-site precedences from the configuration
    pub fn from_config(config: &Config) -> Self {
        let policy = Self::new(config.frontier.default_precedence);
        for site in &config.sites {
            if let Some(precedence) = site.precedence {
                policy.set_precedence(&site.domain.to_lowercase(), precedence);
            }
        }
        policy
    }

    /// Routes every URI whose host key is `host` to the queue `site_key`
    pub fn reassign(&self, host: &str, site_key: &str) {
        write(&self.reassigned).insert(host.to_lowercase(), site_key.to_string());
    }

    /// Removes a reassignment, routing the host back to its own queue
    pub fn clear_reassignment(&self, host: &str) {
        write(&self.reassigned).remove(&host.to_lowercase());
    }

    pub fn set_precedence(&self, site_key: &str, precedence: u32) {
        write(&self.precedences).insert(site_key.to_string(), precedence);
    }
}

impl RoutingPolicy for HostRoutingPolicy {
    fn site_key(&self, uri: &CrawlUri) -> String {
        // CrawlUri::parse guarantees a host; the fallback only covers hand-built URLs.
        let host_key = extract_site_key(&uri.url).unwrap_or_else(|| uri.url.scheme().to_string());
        read(&self.reassigned)
            .get(&host_key)
            .cloned()
            .unwrap_or(host_key)
    }

    fn precedence(&self, site_key: &str) -> u32 {
        read(&self.precedences)
            .get(site_key)
            .copied()
            .unwrap_or(self.default_precedence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteEntry;

    #[test]
    fn test_site_key_is_host() {
        let policy = HostRoutingPolicy::new(1);
        let uri = CrawlUri::parse("https://Example.com/a").unwrap();
        assert_eq!(policy.site_key(&uri), "example.com");
    }

    #[test]
    fn test_reassign_changes_key() {
        let policy = HostRoutingPolicy::new(1);
        let uri = CrawlUri::parse("https://example.com/a").unwrap();

        policy.reassign("example.com", "10.0.0.1");
        assert_eq!(policy.site_key(&uri), "10.0.0.1");

        policy.clear_reassignment("example.com");
        assert_eq!(policy.site_key(&uri), "example.com");
    }

    #[test]
    fn test_precedence_defaults_and_overrides() {
        let policy = HostRoutingPolicy::new(5);
        assert_eq!(policy.precedence("example.com"), 5);

        policy.set_precedence("example.com", 1);
        assert_eq!(policy.precedence("example.com"), 1);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.sites.push(SiteEntry {
            domain: "Example.com".to_string(),
            precedence: Some(2),
            seeds: vec![],
        });
        config.sites.push(SiteEntry {
            domain: "other.org".to_string(),
            precedence: None,
            seeds: vec![],
        });

        let policy = HostRoutingPolicy::from_config(&config);
        assert_eq!(policy.precedence("example.com"), 2);
        assert_eq!(policy.precedence("other.org"), config.frontier.default_precedence);
    }
}
