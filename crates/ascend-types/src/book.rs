//! Top-of-book types

use serde::{Deserialize, Deserializer, Serialize};

/// One side of the top of book
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    /// Quantity available at `price`
    #[serde(deserialize_with = "number_or_string")]
    pub amount: f64,
    /// Price level
    #[serde(deserialize_with = "number_or_string")]
    pub price: f64,
}

impl Order {
    /// Create a new order
    pub fn new(amount: f64, price: f64) -> Self {
        Self { amount, price }
    }

    /// Returns true if this side carries a quote
    pub fn is_populated(&self) -> bool {
        self.price > 0.0
    }
}

/// Best bid and best ask for a symbol, as computed by the server
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BestOrderBook {
    /// Best ask (lowest offer)
    pub ask: Order,
    /// Best bid (highest bid)
    pub bid: Order,
}

impl BestOrderBook {
    /// Create a new best book
    pub fn new(ask: Order, bid: Order) -> Self {
        Self { ask, bid }
    }

    /// Returns true if both sides are populated and the ask is below the bid.
    ///
    /// The server asserts `ask.price >= bid.price`; a crossed book means the
    /// quote is stale or corrupt.
    pub fn is_crossed(&self) -> bool {
        self.ask.is_populated() && self.bid.is_populated() && self.ask.price < self.bid.price
    }

    /// Ask minus bid, when both sides are populated
    pub fn spread(&self) -> Option<f64> {
        self.both_sides().map(|(ask, bid)| ask - bid)
    }

    /// Midpoint price, when both sides are populated
    pub fn mid(&self) -> Option<f64> {
        self.both_sides().map(|(ask, bid)| (ask + bid) / 2.0)
    }

    fn both_sides(&self) -> Option<(f64, f64)> {
        if self.ask.is_populated() && self.bid.is_populated() {
            Some((self.ask.price, self.bid.price))
        } else {
            None
        }
    }
}

/// The exchange sends decimals as strings; tests and other feeds use plain numbers.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    let value = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n,
        NumberOrString::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom)?,
    };

    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!(
            "expected a non-negative finite number, got {}",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_numbers_and_strings() {
        let book: BestOrderBook = serde_json::from_str(
            r#"{"ask":{"amount":"0.5","price":"101.25"},"bid":{"amount":2,"price":100}}"#,
        )
        .unwrap();

        assert_eq!(book.ask, Order::new(0.5, 101.25));
        assert_eq!(book.bid, Order::new(2.0, 100.0));
    }

    #[test]
    fn test_decode_rejects_negative() {
        let result: Result<Order, _> = serde_json::from_str(r#"{"amount":-1,"price":10}"#);
        assert!(result.is_err());

        let result: Result<Order, _> = serde_json::from_str(r#"{"amount":"abc","price":10}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_crossed_book() {
        let normal = BestOrderBook::new(Order::new(1.0, 100.0), Order::new(1.0, 99.0));
        assert!(!normal.is_crossed());

        let crossed = BestOrderBook::new(Order::new(1.0, 98.0), Order::new(1.0, 99.0));
        assert!(crossed.is_crossed());

        // One empty side is never crossed
        let one_sided = BestOrderBook::new(Order::default(), Order::new(1.0, 99.0));
        assert!(!one_sided.is_crossed());
    }

    #[test]
    fn test_spread_and_mid() {
        let book = BestOrderBook::new(Order::new(1.0, 101.0), Order::new(1.0, 99.0));
        assert_eq!(book.spread(), Some(2.0));
        assert_eq!(book.mid(), Some(100.0));

        let empty = BestOrderBook::default();
        assert_eq!(empty.spread(), None);
        assert_eq!(empty.mid(), None);
    }
}
