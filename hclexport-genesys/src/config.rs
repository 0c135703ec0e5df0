//! Client configuration and region resolution

use std::time::Duration;

use crate::client::ClientError;

/// Region name -> Genesys Cloud domain
const REGION_DOMAINS: &[(&str, &str)] = &[
    ("dca", "inindca.com"),
    ("tca", "inintca.com"),
    ("us-east-1", "mypurecloud.com"),
    ("us-east-2", "use2.us-gov-pure.cloud"),
    ("us-west-2", "usw2.pure.cloud"),
    ("eu-west-1", "mypurecloud.ie"),
    ("eu-west-2", "euw2.pure.cloud"),
    ("ap-southeast-2", "mypurecloud.com.au"),
    ("ap-northeast-1", "mypurecloud.jp"),
    ("eu-central-1", "mypurecloud.de"),
    ("ca-central-1", "cac1.pure.cloud"),
    ("ap-northeast-2", "apne2.pure.cloud"),
    ("ap-south-1", "aps1.pure.cloud"),
    ("sa-east-1", "sae1.pure.cloud"),
    ("ap-northeast-3", "apne3.pure.cloud"),
    ("eu-central-2", "euc2.pure.cloud"),
    ("me-central-1", "mec1.pure.cloud"),
    ("mx-central-1", "mxc1.pure.cloud"),
    ("ap-southeast-1", "apse1.pure.cloud"),
];

/// Domain serving a region
pub fn region_domain(region: &str) -> Option<&'static str> {
    let region = region.trim().to_ascii_lowercase();
    REGION_DOMAINS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, domain)| *domain)
}

/// Genesys Cloud client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Pre-issued token; skips the client-credentials grant
    pub access_token: Option<String>,
    pub region: String,
    /// Overrides the API URL derived from the region
    pub api_url: Option<String>,
    /// Overrides the login URL derived from the region
    pub login_url: Option<String>,
    /// Maximum number of concurrent API requests
    pub max_clients: usize,
    pub request_timeout: Duration,
    /// Upper bound on time spent retrying one request
    pub max_retry_time: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            access_token: None,
            region: "us-east-1".to_string(),
            api_url: None,
            login_url: None,
            max_clients: 10,
            request_timeout: Duration::from_secs(60),
            max_retry_time: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Read settings from `GENESYSCLOUD_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.client_id = lookup("GENESYSCLOUD_OAUTHCLIENT_ID");
        config.client_secret = lookup("GENESYSCLOUD_OAUTHCLIENT_SECRET");
        config.access_token = lookup("GENESYSCLOUD_ACCESS_TOKEN");
        if let Some(region) = lookup("GENESYSCLOUD_REGION") {
            config.region = region;
        }
        if let Some(size) = lookup("GENESYSCLOUD_TOKEN_POOL_SIZE").and_then(|s| s.parse().ok()) {
            config.max_clients = size;
        }
        config
    }

    fn domain(&self) -> Result<&'static str, ClientError> {
        region_domain(&self.region).ok_or_else(|| ClientError::UnknownRegion(self.region.clone()))
    }

    pub fn api_url(&self) -> Result<String, ClientError> {
        match &self.api_url {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => Ok(format!("https://api.{}", self.domain()?)),
        }
    }

    pub fn login_url(&self) -> Result<String, ClientError> {
        match &self.login_url {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => Ok(format!("https://login.{}", self.domain()?)),
        }
    }

    /// Check that the settings can produce an authenticated client
    pub fn validate(&self) -> Result<(), ClientError> {
        self.api_url()?;
        if self.access_token.is_none() {
            self.login_url()?;
            if self.client_id.is_none() || self.client_secret.is_none() {
                return Err(ClientError::MissingCredentials);
            }
        }
        if self.max_clients == 0 {
            return Err(ClientError::Configuration(
                "max_clients must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn region_domains() {
        assert_eq!(region_domain("us-east-1"), Some("mypurecloud.com"));
        assert_eq!(region_domain("EU-WEST-1"), Some("mypurecloud.ie"));
        assert_eq!(region_domain("ap-south-1"), Some("aps1.pure.cloud"));
        assert_eq!(region_domain("mars-1"), None);
    }

    #[test]
    fn urls_from_region() {
        let config = ClientConfig {
            region: "eu-central-1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.api_url().unwrap(), "https://api.mypurecloud.de");
        assert_eq!(config.login_url().unwrap(), "https://login.mypurecloud.de");
    }

    #[test]
    fn url_overrides() {
        let config = ClientConfig {
            region: "nowhere".to_string(),
            api_url: Some("http://127.0.0.1:8080/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_url().unwrap(), "http://127.0.0.1:8080");
        assert!(matches!(config.login_url(), Err(ClientError::UnknownRegion(_))));
    }

    #[test]
    fn from_lookup_reads_variables() {
        let vars: HashMap<&str, &str> = [
            ("GENESYSCLOUD_OAUTHCLIENT_ID", "id"),
            ("GENESYSCLOUD_OAUTHCLIENT_SECRET", "secret"),
            ("GENESYSCLOUD_REGION", "ca-central-1"),
            ("GENESYSCLOUD_TOKEN_POOL_SIZE", "4"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.client_id.as_deref(), Some("id"));
        assert_eq!(config.region, "ca-central-1");
        assert_eq!(config.max_clients, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_requires_credentials() {
        let config = ClientConfig::default();
        assert!(matches!(config.validate(), Err(ClientError::MissingCredentials)));

        let config = ClientConfig {
            access_token: Some("token".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
