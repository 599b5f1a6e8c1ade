//! Channel enum

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StreamError;

/// Streaming data channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Private order updates
    #[serde(rename = "order")]
    Order,
    /// Market trades
    #[serde(rename = "trades")]
    Trades,
    /// Reference price
    #[serde(rename = "ref-px")]
    ReferencePrice,
    /// Candlestick bars
    #[serde(rename = "bar")]
    Bar,
    /// Market summary
    #[serde(rename = "summary")]
    Summary,
    /// Level 2 depth
    #[serde(rename = "depth")]
    Depth,
    /// Best bid and offer
    #[serde(rename = "bbo")]
    BestBidOffer,
}

impl Channel {
    /// Every channel, in declaration order
    pub const ALL: [Channel; 7] = [
        Self::Order,
        Self::Trades,
        Self::ReferencePrice,
        Self::Bar,
        Self::Summary,
        Self::Depth,
        Self::BestBidOffer,
    ];

    /// Returns the channel name as used in API messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Trades => "trades",
            Self::ReferencePrice => "ref-px",
            Self::Bar => "bar",
            Self::Summary => "summary",
            Self::Depth => "depth",
            Self::BestBidOffer => "bbo",
        }
    }

    /// Returns true if the channel carries account data and needs an authenticated session
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Order)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "order" => Ok(Self::Order),
            "trades" | "trade" => Ok(Self::Trades),
            "ref-px" | "reference-price" => Ok(Self::ReferencePrice),
            "bar" => Ok(Self::Bar),
            "summary" => Ok(Self::Summary),
            "depth" => Ok(Self::Depth),
            "bbo" | "best-bid-offer" => Ok(Self::BestBidOffer),
            other => Err(StreamError::Configuration(format!("unknown channel: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_wire_names() {
        assert_eq!(serde_json::to_string(&Channel::ReferencePrice).unwrap(), r#""ref-px""#);
        assert_eq!(serde_json::to_string(&Channel::BestBidOffer).unwrap(), r#""bbo""#);

        let parsed: Channel = serde_json::from_str(r#""depth""#).unwrap();
        assert_eq!(parsed, Channel::Depth);
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("best-bid-offer".parse::<Channel>().unwrap(), Channel::BestBidOffer);
        assert_eq!("BBO".parse::<Channel>().unwrap(), Channel::BestBidOffer);
        assert_eq!("reference-price".parse::<Channel>().unwrap(), Channel::ReferencePrice);
        assert!("ticker".parse::<Channel>().is_err());
    }

    #[test]
    fn test_display_matches_as_str() {
        for channel in Channel::ALL {
            assert_eq!(channel.to_string(), channel.as_str());
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_private_channels() {
        assert!(Channel::Order.is_private());
        assert!(!Channel::Depth.is_private());
    }
}
