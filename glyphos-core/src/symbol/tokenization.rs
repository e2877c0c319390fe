//! Character tokenizations: single-character spellings of symbols.
//!
//! A tokenization binds characters to the symbols of one alphabet,
//! including ambiguity symbols (`n` for any DNA base) and the gap (`-`).
//! Tokenizations are declared in the alphabet bootstrap and looked up by
//! name through the registry.

use std::collections::HashMap;

use crate::symbol::{Alphabet, Symbol, SymbolKey};
use crate::types::GlyphosError;

/// A named mapping between characters and the symbols of one alphabet.
#[derive(Debug)]
pub struct Tokenization {
    alphabet: Alphabet,
    case_sensitive: bool,
    by_token: HashMap<char, Symbol>,
    by_key: HashMap<SymbolKey, char>,
}

impl Tokenization {
    /// Create an empty tokenization over an alphabet.
    pub fn new(alphabet: Alphabet, case_sensitive: bool) -> Self {
        Tokenization {
            alphabet,
            case_sensitive,
            by_token: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    /// The alphabet this tokenization spells.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn fold(&self, token: char) -> char {
        if self.case_sensitive {
            token
        } else {
            token.to_ascii_lowercase()
        }
    }

    /// Bind a character to a symbol of the alphabet. The first binding for
    /// a symbol also becomes its spelling for [`Tokenization::token_for`].
    pub fn bind(&mut self, token: char, symbol: Symbol) -> Result<(), GlyphosError> {
        self.alphabet.validate(&symbol)?;
        let folded = self.fold(token);
        self.by_key.entry(symbol.key().clone()).or_insert(folded);
        self.by_token.insert(folded, symbol);
        Ok(())
    }

    /// The symbol a character spells.
    pub fn parse_token(&self, token: char) -> Result<Symbol, GlyphosError> {
        self.by_token.get(&self.fold(token)).cloned().ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "no symbol of alphabet {} is spelled {token:?}",
                self.alphabet.name()
            ))
        })
    }

    /// Parse a whole string, one symbol per character.
    pub fn parse(&self, text: &str) -> Result<Vec<Symbol>, GlyphosError> {
        text.chars().map(|token| self.parse_token(token)).collect()
    }

    /// The character spelling a symbol.
    pub fn token_for(&self, symbol: &Symbol) -> Result<char, GlyphosError> {
        self.by_key.get(symbol.key()).copied().ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "symbol {} has no spelling in this tokenization",
                symbol.name()
            ))
        })
    }
}
