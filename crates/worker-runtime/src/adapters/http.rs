//! HTTP oracles backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use fleet_discovery::{
    BondObservation, ExternalAddressOracle, IpAddr, OracleError, PeerIdentity, StakingOracle,
};
use serde::Deserialize;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn client() -> Result<reqwest::Client, OracleError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| OracleError::Unavailable(e.to_string()))
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, OracleError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| OracleError::Unavailable(e.to_string()))?
        .error_for_status()
        .map_err(|e| OracleError::Unavailable(e.to_string()))?;
    response
        .text()
        .await
        .map_err(|e| OracleError::Unavailable(e.to_string()))
}

// =============================================================================
// Staking provider
// =============================================================================

/// Reply of `GET {provider}/workers/{identity}/bond`.
#[derive(Debug, Deserialize)]
struct BondReply {
    status: String,
    #[serde(default)]
    staker: Option<String>,
}

/// Interpret a staking provider reply body.
pub fn parse_bond_reply(body: &str) -> Result<BondObservation, OracleError> {
    let reply: BondReply =
        serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;
    match reply.status.as_str() {
        "unbonded" => Ok(BondObservation::Unbonded),
        "detached" => Ok(BondObservation::Detached),
        "bonded" => {
            let staker = reply
                .staker
                .ok_or_else(|| OracleError::Malformed("bonded reply without staker".into()))?;
            PeerIdentity::parse(&staker)
                .map(BondObservation::Bonded)
                .map_err(|e| OracleError::Malformed(format!("staker: {e}")))
        }
        other => Err(OracleError::Malformed(format!("unknown bond status '{other}'"))),
    }
}

/// Staking oracle querying a provider's HTTP API.
pub struct HttpStakingOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStakingOracle {
    /// Oracle for the provider at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, OracleError> {
        Ok(Self {
            client: client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StakingOracle for HttpStakingOracle {
    async fn is_worker_bonded(&self, worker: &PeerIdentity) -> Result<BondObservation, OracleError> {
        let url = format!("{}/workers/{}/bond", self.base_url, worker.to_checksum_string());
        let body = fetch_text(&self.client, &url).await?;
        let observation = parse_bond_reply(&body)?;
        debug!(worker = %worker, ?observation, "Staking provider answered");
        Ok(observation)
    }
}

// =============================================================================
// External IP
// =============================================================================

/// External IP oracle reading a plain-text "what is my IP" endpoint.
pub struct HttpAddressOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpAddressOracle {
    /// Oracle for `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, OracleError> {
        Ok(Self {
            client: client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ExternalAddressOracle for HttpAddressOracle {
    async fn external_ip(&self) -> Result<IpAddr, OracleError> {
        let body = fetch_text(&self.client, &self.url).await?;
        body.trim()
            .parse()
            .map_err(|e| OracleError::Malformed(format!("'{}': {e}", body.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bonded_reply() {
        let body = r#"{"status":"bonded","staker":"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"}"#;
        let observation = parse_bond_reply(body).unwrap();
        let expected = PeerIdentity::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        assert_eq!(observation, BondObservation::Bonded(expected));
    }

    #[test]
    fn test_parse_unbonded_and_detached() {
        assert_eq!(
            parse_bond_reply(r#"{"status":"unbonded"}"#).unwrap(),
            BondObservation::Unbonded
        );
        assert_eq!(
            parse_bond_reply(r#"{"status":"detached","staker":null}"#).unwrap(),
            BondObservation::Detached
        );
    }

    #[test]
    fn test_parse_rejects_malformed_replies() {
        assert!(matches!(
            parse_bond_reply(r#"{"status":"bonded"}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            parse_bond_reply(r#"{"status":"maybe"}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(parse_bond_reply("<html>"), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let oracle = HttpStakingOracle::new("https://staking.example.org/").unwrap();
        assert_eq!(oracle.base_url, "https://staking.example.org");
    }
}
