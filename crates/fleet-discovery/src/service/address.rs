//! Self-addressing: which host should this worker advertise?
//!
//! Priority: explicit host > configured override > external IP oracle.
//! In dev mode the oracle is never consulted and loopback is the fallback.

use tracing::{info, warn};

use crate::domain::{AddressResolutionError, IpAddr};
use crate::ports::ExternalAddressOracle;

/// What kind of address the node may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRequirement {
    /// Consult the oracle when nothing is configured; oracle failure is fatal.
    Public,
    /// Dev mode: fall back to loopback without consulting the oracle.
    LoopbackAllowed,
}

/// Where the advertised host came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Supplied explicitly by the operator.
    Explicit,
    /// Taken from the configured external-host override.
    Override,
    /// Reported by the external IP oracle.
    Oracle,
    /// Dev-mode loopback fallback.
    Loopback,
}

/// Resolved advertised host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisedHost {
    /// The IP to advertise.
    pub ip: IpAddr,
    /// How it was determined.
    pub source: AddressSource,
}

/// Determine the host to advertise.
///
/// Configured hosts are used as given, in either mode. With
/// [`AddressRequirement::Public`] an oracle failure yields
/// [`AddressResolutionError::UnknownIpAddress`]; an oracle answer is taken as
/// given unless it is loopback or unspecified.
pub async fn resolve_advertised_host(
    explicit: Option<IpAddr>,
    override_: Option<IpAddr>,
    oracle: &dyn ExternalAddressOracle,
    requirement: AddressRequirement,
) -> Result<AdvertisedHost, AddressResolutionError> {
    let configured = explicit
        .map(|ip| (ip, AddressSource::Explicit))
        .or_else(|| override_.map(|ip| (ip, AddressSource::Override)));

    if let Some((ip, source)) = configured {
        if requirement == AddressRequirement::Public && !ip.is_routable() {
            warn!(host = %ip, "Configured host is not publicly routable");
        }
        info!(host = %ip, ?source, "Using configured host");
        return Ok(AdvertisedHost { ip, source });
    }

    match requirement {
        AddressRequirement::LoopbackAllowed => {
            info!("Dev mode: advertising loopback address");
            Ok(AdvertisedHost {
                ip: IpAddr::loopback(),
                source: AddressSource::Loopback,
            })
        }
        AddressRequirement::Public => match oracle.external_ip().await {
            Ok(ip) if ip.is_loopback() || ip.is_unspecified() => {
                Err(AddressResolutionError::Unroutable(ip.to_string()))
            }
            Ok(ip) => {
                info!(host = %ip, "Determined external IP address");
                Ok(AdvertisedHost {
                    ip,
                    source: AddressSource::Oracle,
                })
            }
            Err(error) => {
                warn!(%error, "Could not determine external IP address");
                Err(AddressResolutionError::UnknownIpAddress {
                    reason: error.to_string(),
                })
            }
        },
    }
}
