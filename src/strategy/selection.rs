//! Top-K momentum selection

use rust_decimal::Decimal;

/// Outcome of offering a candidate to [`TopK`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Candidate taken into a free slot
    Accepted,
    /// Candidate took the slot of the named symbol
    Replaced(String),
    /// Candidate did not beat the weakest holder
    Rejected,
}

/// Keeps the K strongest candidates seen so far
///
/// The first K candidates are accepted unconditionally. Beyond K, a
/// candidate replaces the holder with the lowest momentum only if its own
/// momentum is strictly greater.
#[derive(Debug, Clone)]
pub struct TopK {
    k: usize,
    held: Vec<(String, Decimal)>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            held: Vec::with_capacity(k),
        }
    }

    pub fn offer(&mut self, symbol: &str, momentum: Decimal) -> Selection {
        if self.held.len() < self.k {
            self.held.push((symbol.to_string(), momentum));
            return Selection::Accepted;
        }

        // First holder wins ties for the weakest slot
        let weakest = self
            .held
            .iter()
            .enumerate()
            .fold(None::<(usize, Decimal)>, |min, (i, (_, m))| match min {
                Some((_, current)) if current <= *m => min,
                _ => Some((i, *m)),
            });

        match weakest {
            Some((index, lowest)) if momentum > lowest => {
                let (evicted, _) =
                    std::mem::replace(&mut self.held[index], (symbol.to_string(), momentum));
                Selection::Replaced(evicted)
            }
            _ => Selection::Rejected,
        }
    }

    /// Symbols currently held
    pub fn held(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(|(symbol, _)| symbol.as_str())
    }
}
