//! Retained subscription set

use ascend_types::{Channel, SubscribeRequest};
use std::collections::HashSet;
use std::fmt;

/// One (channel, symbol) stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// Channel type
    pub channel: Channel,
    /// Trading pair symbol
    pub symbol: String,
}

impl Subscription {
    /// Create a new subscription
    pub fn new(channel: Channel, symbol: impl Into<String>) -> Self {
        Self {
            channel,
            symbol: symbol.into(),
        }
    }

    /// Best bid/offer subscription
    pub fn best_bid_offer(symbol: impl Into<String>) -> Self {
        Self::new(Channel::BestBidOffer, symbol)
    }

    /// Depth subscription
    pub fn depth(symbol: impl Into<String>) -> Self {
        Self::new(Channel::Depth, symbol)
    }

    /// Convert to a subscribe request
    pub fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::subscribe(self.channel, self.symbol.clone())
    }

    /// Convert to an unsubscribe request
    pub fn unsubscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::unsubscribe(self.channel, self.symbol.clone())
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.symbol)
    }
}

/// Subscriptions to restore after every reconnect
///
/// Set semantics keyed by (channel, symbol); iteration follows insertion order
/// so restoration is deterministic.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    ordered: Vec<Subscription>,
    index: HashSet<Subscription>,
}

impl SubscriptionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription. Returns false if it was already present.
    pub fn insert(&mut self, sub: Subscription) -> bool {
        if !self.index.insert(sub.clone()) {
            return false;
        }
        self.ordered.push(sub);
        true
    }

    /// Remove a subscription. Returns false if it was not present.
    pub fn remove(&mut self, sub: &Subscription) -> bool {
        if !self.index.remove(sub) {
            return false;
        }
        self.ordered.retain(|s| s != sub);
        true
    }

    /// Check membership
    pub fn contains(&self, sub: &Subscription) -> bool {
        self.index.contains(sub)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.ordered.iter()
    }

    /// Get number of retained subscriptions
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns true if nothing is retained
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Clear all subscriptions
    pub fn clear(&mut self) {
        self.ordered.clear();
        self.index.clear();
    }

    /// Subscribe requests for every retained subscription, in insertion order
    pub fn restoration_requests(&self) -> Vec<SubscribeRequest> {
        self.ordered.iter().map(Subscription::subscribe_request).collect()
    }

    /// Copy out the retained subscriptions
    pub fn to_vec(&self) -> Vec<Subscription> {
        self.ordered.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascend_types::SubscribeAction;

    #[test]
    fn test_set_semantics() {
        let mut set = SubscriptionSet::new();

        assert!(set.insert(Subscription::new(Channel::Order, "BTC-USD")));
        assert!(!set.insert(Subscription::new(Channel::Order, "BTC-USD")));
        assert!(set.insert(Subscription::depth("ETH-USD")));
        // Same symbol, different channel is a distinct entry
        assert!(set.insert(Subscription::best_bid_offer("BTC-USD")));

        assert_eq!(set.len(), 3);
        assert!(set.contains(&Subscription::depth("ETH-USD")));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut set = SubscriptionSet::new();
        set.insert(Subscription::depth("A"));
        set.insert(Subscription::depth("B"));
        set.insert(Subscription::depth("C"));

        assert!(set.remove(&Subscription::depth("B")));
        assert!(!set.remove(&Subscription::depth("B")));

        let symbols: Vec<_> = set.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "C"]);

        // Re-adding appends at the end
        set.insert(Subscription::depth("B"));
        let symbols: Vec<_> = set.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_restoration_requests() {
        let mut set = SubscriptionSet::new();
        set.insert(Subscription::new(Channel::Order, "BTC-USD"));
        set.insert(Subscription::depth("ETH-USD"));

        let requests = set.restoration_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.action == SubscribeAction::Subscribe));
        assert_eq!(requests[0].args.channel, Channel::Order);
        assert_eq!(requests[1].args.symbol, "ETH-USD");

        set.clear();
        assert!(set.is_empty());
        assert!(set.restoration_requests().is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(Subscription::best_bid_offer("BTC/USDT").to_string(), "bbo:BTC/USDT");
    }
}
