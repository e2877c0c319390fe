//! Dense integer indexing of an alphabet's symbols.

use std::collections::HashMap;

use crate::constants::LINEAR_INDEX_LIMIT;
use crate::symbol::{Alphabet, Symbol, SymbolKey};
use crate::types::GlyphosError;

#[derive(Debug)]
enum Lookup {
    /// Small alphabets: scan the symbol list.
    Linear,
    /// Larger alphabets: hash the symbol key to its position.
    Hashed(HashMap<SymbolKey, usize>),
}

/// A bijection between an alphabet's atomic symbols and `[0, len)`,
/// used to drive array-backed distributions, packings and the suffix tree.
#[derive(Debug)]
pub struct AlphabetIndex {
    alphabet: Alphabet,
    symbols: Vec<Symbol>,
    lookup: Lookup,
}

impl AlphabetIndex {
    /// Index the given alphabet. The indexing strategy is chosen by size:
    /// linear scan up to [`LINEAR_INDEX_LIMIT`] symbols, hashed above.
    ///
    /// Indexing a sparse cross product materializes its enumeration.
    pub fn new(alphabet: &Alphabet) -> Self {
        let symbols = alphabet.symbols();
        let lookup = if symbols.len() <= LINEAR_INDEX_LIMIT {
            Lookup::Linear
        } else {
            Lookup::Hashed(
                symbols
                    .iter()
                    .enumerate()
                    .map(|(position, symbol)| (symbol.key().clone(), position))
                    .collect(),
            )
        };
        AlphabetIndex {
            alphabet: alphabet.clone(),
            symbols,
            lookup,
        }
    }

    /// The indexed alphabet.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Number of indexed symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The indexed symbols in position order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Position of an atomic symbol.
    pub fn index_for(&self, symbol: &Symbol) -> Result<usize, GlyphosError> {
        let position = match &self.lookup {
            Lookup::Linear => self.symbols.iter().position(|s| s == symbol),
            Lookup::Hashed(by_key) => by_key.get(symbol.key()).copied(),
        };
        position.ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "symbol {} is not indexed in alphabet {}",
                symbol.name(),
                self.alphabet.name()
            ))
        })
    }

    /// Symbol at a position.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of range; positions come from
    /// [`AlphabetIndex::index_for`] and must be in range by construction.
    pub fn symbol_at(&self, position: usize) -> &Symbol {
        &self.symbols[position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet_of(n: usize) -> Alphabet {
        Alphabet::simple(
            format!("test-{n}"),
            (0..n).map(|i| Symbol::atomic(format!("s{i}"))),
        )
        .unwrap()
    }

    #[test]
    fn test_linear_index_round_trips() {
        let alphabet = alphabet_of(4);
        let index = AlphabetIndex::new(&alphabet);
        assert!(matches!(index.lookup, Lookup::Linear));
        for (position, symbol) in alphabet.symbols().iter().enumerate() {
            assert_eq!(index.index_for(symbol).unwrap(), position);
            assert_eq!(index.symbol_at(position), symbol);
        }
    }

    #[test]
    fn test_hashed_index_round_trips() {
        let alphabet = alphabet_of(LINEAR_INDEX_LIMIT + 1);
        let index = AlphabetIndex::new(&alphabet);
        assert!(matches!(index.lookup, Lookup::Hashed(_)));
        for (position, symbol) in alphabet.symbols().iter().enumerate() {
            assert_eq!(index.index_for(symbol).unwrap(), position);
            assert_eq!(index.symbol_at(position), symbol);
        }
    }

    #[test]
    fn test_foreign_symbol_is_rejected() {
        let alphabet = alphabet_of(4);
        let index = AlphabetIndex::new(&alphabet);
        let stranger = Symbol::atomic("s0");
        assert!(matches!(
            index.index_for(&stranger),
            Err(GlyphosError::IllegalSymbol(_))
        ));
    }
}
