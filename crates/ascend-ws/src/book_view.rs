//! Per-symbol best bid/offer view
//!
//! The session is the only writer. Readers get copies: `get` clones one entry
//! and `snapshot` clones the whole map under a single short read lock, so a
//! multi-symbol read is consistent and never holds up the session.

use ascend_types::BestOrderBook;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    books: HashMap<String, BestOrderBook>,
    version: u64,
}

/// Consistent copy of every tracked symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookSnapshot {
    /// Number of writes applied when the snapshot was taken
    pub version: u64,
    /// Latest best book per symbol
    pub books: HashMap<String, BestOrderBook>,
}

impl BookSnapshot {
    /// Look up one symbol
    pub fn get(&self, symbol: &str) -> Option<&BestOrderBook> {
        self.books.get(symbol)
    }
}

/// Shared, read-only (from outside the crate) map of symbol to best book
#[derive(Debug, Clone, Default)]
pub struct BookView {
    inner: Arc<RwLock<Inner>>,
}

impl BookView {
    /// Create an empty view
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `symbol`
    pub(crate) fn update(&self, symbol: &str, book: BestOrderBook) {
        let mut inner = self.inner.write();
        match inner.books.get_mut(symbol) {
            Some(entry) => *entry = book,
            None => {
                inner.books.insert(symbol.to_string(), book);
            }
        }
        inner.version += 1;
    }

    /// Forget one symbol
    pub(crate) fn remove(&self, symbol: &str) {
        let mut inner = self.inner.write();
        if inner.books.remove(symbol).is_some() {
            inner.version += 1;
        }
    }

    /// Drop every entry
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.write();
        if !inner.books.is_empty() {
            inner.books.clear();
            inner.version += 1;
        }
    }

    /// Latest best book for `symbol`, or `None` if never seen
    pub fn get(&self, symbol: &str) -> Option<BestOrderBook> {
        self.inner.read().books.get(symbol).copied()
    }

    /// Copy of every symbol
    pub fn snapshot(&self) -> BookSnapshot {
        let inner = self.inner.read();
        BookSnapshot {
            version: inner.version,
            books: inner.books.clone(),
        }
    }

    /// Number of writes so far
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Symbols tracked
    pub fn symbols(&self) -> Vec<String> {
        self.inner.read().books.keys().cloned().collect()
    }

    /// Get number of tracked symbols
    pub fn len(&self) -> usize {
        self.inner.read().books.len()
    }

    /// Returns true if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.inner.read().books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascend_types::Order;

    fn book(amount: f64, ask: f64, bid: f64) -> BestOrderBook {
        BestOrderBook::new(Order::new(amount, ask), Order::new(amount, bid))
    }

    #[test]
    fn test_last_write_wins() {
        let view = BookView::new();
        view.update("X", book(1.0, 100.0, 99.0));
        view.update("X", book(2.0, 101.0, 98.0));

        assert_eq!(view.get("X"), Some(book(2.0, 101.0, 98.0)));
        assert_eq!(view.get("Y"), None);
        assert_eq!(view.len(), 1);
        assert_eq!(view.version(), 2);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let view = BookView::new();
        view.update("A", book(1.0, 10.0, 9.0));
        view.update("B", book(1.0, 20.0, 19.0));

        let snap = view.snapshot();
        view.update("A", book(5.0, 11.0, 10.0));

        assert_eq!(snap.version, 2);
        assert_eq!(snap.books.len(), 2);
        assert_eq!(snap.get("A"), Some(&book(1.0, 10.0, 9.0)));
        assert_eq!(view.get("A"), Some(book(5.0, 11.0, 10.0)));
    }

    #[test]
    fn test_clones_share_state() {
        let view = BookView::new();
        let reader = view.clone();
        view.update("A", book(1.0, 10.0, 9.0));
        assert!(reader.get("A").is_some());

        view.clear();
        assert!(reader.is_empty());
        assert_eq!(reader.version(), 2);

        // Clearing an empty view is not a write
        view.clear();
        assert_eq!(reader.version(), 2);
    }

    #[test]
    fn test_remove_one_symbol() {
        let view = BookView::new();
        view.update("A", book(1.0, 10.0, 9.0));
        view.update("B", book(1.0, 20.0, 19.0));

        view.remove("A");
        assert_eq!(view.get("A"), None);
        assert!(view.get("B").is_some());
        assert_eq!(view.version(), 3);

        view.remove("A");
        assert_eq!(view.version(), 3);
    }
}
