//! Stock universes.
//!
//! A universe is a named list of symbols. The clustering run falls back to
//! [`StaticUniverse::large_caps`] when no symbols are given.

/// Trait for stock universes.
pub trait Universe {
    /// Get all symbols in the universe.
    fn symbols(&self) -> Vec<String>;

    /// Check if a symbol is in the universe.
    fn contains(&self, symbol: &str) -> bool {
        self.symbols().iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Get the number of constituents.
    fn size(&self) -> usize {
        self.symbols().len()
    }
}

/// Ten liquid US large caps spread across sectors.
const LARGE_CAPS: [&str; 10] = [
    "AAPL", "MSFT", "AMZN", "GOOGL", "JPM", "JNJ", "XOM", "PG", "NVDA", "KO",
];

/// A fixed, ordered list of symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticUniverse {
    name: String,
    symbols: Vec<String>,
}

impl StaticUniverse {
    /// Build a universe from symbols, upper-casing them and dropping repeats.
    pub fn new(
        name: impl Into<String>,
        symbols: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if !symbol.is_empty() && !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }
        Self {
            name: name.into(),
            symbols: unique,
        }
    }

    /// The default clustering universe.
    pub fn large_caps() -> Self {
        Self::new("US large caps", LARGE_CAPS)
    }

    /// Universe name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Universe for StaticUniverse {
    fn symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }
}
