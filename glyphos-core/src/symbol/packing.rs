//! Fixed-width binary encodings of symbols.
//!
//! A packing maps each atomic symbol of its alphabet to a code in a fixed
//! number of bits, for compact storage of long symbol runs. Packing is
//! deliberately lossy for symbols the packing does not handle: a
//! no-ambiguity packing maps any ambiguity symbol to a configured
//! placeholder rather than failing. Unpacking a code with no symbol behind
//! it is always an error.

use std::fmt;

use crate::symbol::{Alphabet, AlphabetIndex, Symbol};
use crate::types::GlyphosError;

/// A fixed-width binary symbol encoding over one alphabet.
pub trait Packing: fmt::Debug {
    /// The alphabet whose symbols are packed.
    fn alphabet(&self) -> &Alphabet;

    /// Width of one packed code, in bits.
    fn word_size(&self) -> u8;

    /// Whether ambiguity symbols get codes of their own. When `false`,
    /// packing an ambiguity symbol yields the placeholder's code.
    fn handles_ambiguity(&self) -> bool;

    /// Pack a symbol. Total: symbols the packing does not recognize map to
    /// the configured placeholder.
    fn pack(&self, symbol: &Symbol) -> u8;

    /// Unpack a code back into a symbol.
    fn unpack(&self, code: u8) -> Result<Symbol, GlyphosError>;
}

/// An index-driven packing with no ambiguity codes. Each atomic member is
/// coded by its index position; everything else packs to the placeholder.
///
/// Over DNA this is the classic 2-bit encoding.
#[derive(Debug)]
pub struct NoAmbiguityPacking {
    index: AlphabetIndex,
    placeholder: u8,
    word_size: u8,
}

impl NoAmbiguityPacking {
    /// Build a packing over `alphabet` that maps unrecognized symbols to
    /// `placeholder`, which must be an atomic member of the alphabet.
    pub fn new(alphabet: &Alphabet, placeholder: &Symbol) -> Result<Self, GlyphosError> {
        if alphabet.len() > 256 {
            return Err(GlyphosError::IllegalAlphabet(format!(
                "alphabet {} has {} symbols, too many for single-byte codes",
                alphabet.name(),
                alphabet.len()
            )));
        }
        let index = AlphabetIndex::new(alphabet);
        let placeholder = index.index_for(placeholder)? as u8;
        let word_size = match index.len() {
            0 | 1 => 1,
            n => (usize::BITS - (n - 1).leading_zeros()) as u8,
        };
        Ok(NoAmbiguityPacking {
            index,
            placeholder,
            word_size,
        })
    }
}

impl Packing for NoAmbiguityPacking {
    fn alphabet(&self) -> &Alphabet {
        self.index.alphabet()
    }

    fn word_size(&self) -> u8 {
        self.word_size
    }

    fn handles_ambiguity(&self) -> bool {
        false
    }

    fn pack(&self, symbol: &Symbol) -> u8 {
        if symbol.is_atomic() {
            if let Ok(position) = self.index.index_for(symbol) {
                return position as u8;
            }
        }
        self.placeholder
    }

    fn unpack(&self, code: u8) -> Result<Symbol, GlyphosError> {
        if (code as usize) < self.index.len() {
            Ok(self.index.symbol_at(code as usize).clone())
        } else {
            Err(GlyphosError::UnknownCode {
                code,
                word_size: self.word_size,
            })
        }
    }
}
