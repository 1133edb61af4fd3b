//! Provider Profiles - Static Endpoint and Channel Tables
//!
//! One entry per supported exchange. A profile lists the REST path
//! serving each data kind and the stream channel carrying each stream
//! kind; absent entries mean the exchange does not support that kind
//! and the caller treats it as an empty result.

use crate::domain::{DataKind, StreamKind};
use crate::ports::provider::ProviderCapabilities;

/// Static description of one exchange integration.
#[derive(Debug)]
pub struct ProviderProfile {
    /// Stable identifier, also the topic segment.
    pub provider_id: &'static str,
    /// REST API base URL.
    pub rest_url: &'static str,
    /// Private WebSocket URL.
    pub ws_url: &'static str,
    /// REST path per supported fetch kind.
    pub fetch_endpoints: &'static [(DataKind, &'static str)],
    /// Stream channel name per supported watch kind.
    pub watch_channels: &'static [(StreamKind, &'static str)],
}

impl ProviderProfile {
    /// Find the profile for a provider id.
    pub fn lookup(provider_id: &str) -> Option<&'static Self> {
        PROFILES.iter().find(|p| p.provider_id == provider_id)
    }

    /// REST path for a fetch kind, if supported.
    pub fn fetch_path(&self, kind: DataKind) -> Option<&'static str> {
        self.fetch_endpoints
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, path)| *path)
    }

    /// Stream channel for a watch kind, if supported.
    pub fn watch_channel(&self, kind: StreamKind) -> Option<&'static str> {
        self.watch_channels
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, channel)| *channel)
    }

    /// Map a channel name back to its stream kind.
    pub fn channel_kind(&self, channel: &str) -> Option<StreamKind> {
        self.watch_channels
            .iter()
            .find(|(_, c)| *c == channel)
            .map(|(kind, _)| *kind)
    }

    /// Declared capability set derived from the tables.
    pub fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            fetch: self.fetch_endpoints.iter().map(|(k, _)| *k).collect(),
            watch: self.watch_channels.iter().map(|(k, _)| *k).collect(),
        }
    }
}

/// All built-in exchange profiles.
pub static PROFILES: &[ProviderProfile] = &[
    ProviderProfile {
        provider_id: "binance",
        rest_url: "https://api.binance.com",
        ws_url: "wss://stream.binance.com:9443/ws",
        fetch_endpoints: &[
            (DataKind::Balance, "/api/v3/account"),
            (DataKind::EarnBalance, "/sapi/v1/simple-earn/flexible/position"),
            (DataKind::Positions, "/fapi/v2/positionRisk"),
            (DataKind::OptionPositions, "/eapi/v1/position"),
            (DataKind::FundingFees, "/fapi/v1/income"),
        ],
        watch_channels: &[
            (StreamKind::Balance, "outboundAccountPosition"),
            (StreamKind::Positions, "ACCOUNT_UPDATE"),
        ],
    },
    ProviderProfile {
        provider_id: "bybit",
        rest_url: "https://api.bybit.com",
        ws_url: "wss://stream.bybit.com/v5/private",
        fetch_endpoints: &[
            (DataKind::Balance, "/v5/account/wallet-balance"),
            (DataKind::Positions, "/v5/position/list"),
            (DataKind::OptionPositions, "/v5/position/list"),
            (DataKind::FundingFees, "/v5/account/transaction-log"),
        ],
        watch_channels: &[
            (StreamKind::Balance, "wallet"),
            (StreamKind::Positions, "position"),
        ],
    },
    ProviderProfile {
        provider_id: "deribit",
        rest_url: "https://www.deribit.com/api/v2",
        ws_url: "wss://www.deribit.com/ws/api/v2",
        fetch_endpoints: &[
            (DataKind::Balance, "/private/get_account_summaries"),
            (DataKind::Positions, "/private/get_positions"),
            (DataKind::OptionPositions, "/private/get_positions"),
            (DataKind::FundingFees, "/private/get_funding_rate_history"),
        ],
        watch_channels: &[
            (StreamKind::Balance, "user.portfolio"),
            (StreamKind::Positions, "user.changes"),
        ],
    },
    ProviderProfile {
        provider_id: "gateio",
        rest_url: "https://api.gateio.ws/api/v4",
        ws_url: "wss://api.gateio.ws/ws/v4/",
        fetch_endpoints: &[
            (DataKind::Balance, "/spot/accounts"),
            (DataKind::EarnBalance, "/earn/uni/lends"),
            (DataKind::Positions, "/futures/usdt/positions"),
            (DataKind::FundingFees, "/futures/usdt/account_book"),
        ],
        watch_channels: &[
            (StreamKind::Balance, "spot.balances"),
            (StreamKind::Positions, "futures.positions"),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_providers() {
        assert!(ProviderProfile::lookup("binance").is_some());
        assert!(ProviderProfile::lookup("deribit").is_some());
        assert!(ProviderProfile::lookup("ftx").is_none());
    }

    #[test]
    fn capabilities_mirror_the_tables() {
        let gateio = ProviderProfile::lookup("gateio").unwrap();
        let caps = gateio.capabilities();
        assert!(caps.can_fetch(DataKind::EarnBalance));
        assert!(!caps.can_fetch(DataKind::OptionPositions));
        assert!(caps.can_watch(StreamKind::Positions));
    }

    #[test]
    fn channel_names_round_trip_to_kinds() {
        let deribit = ProviderProfile::lookup("deribit").unwrap();
        assert_eq!(
            deribit.channel_kind("user.portfolio"),
            Some(StreamKind::Balance)
        );
        assert_eq!(deribit.channel_kind("unknown"), None);
    }
}
