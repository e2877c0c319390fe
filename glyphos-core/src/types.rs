use thiserror::Error;

/// Error types raised by the alphabet algebra and the model engine.
///
/// Algebraic construction failures (factorization, name parsing) are always
/// surfaced to the caller, never silently approximated. Violations of the
/// engine's internal invariants are not represented here: they indicate a bug
/// elsewhere and abort via panic instead of pretending to be recoverable.
#[derive(Error, Debug)]
pub enum GlyphosError {
    /// A symbol is not a member of the expected alphabet, or cannot be
    /// combined with the other symbols in an operation.
    #[error("illegal symbol: {0}")]
    IllegalSymbol(String),
    /// An alphabet does not match the one a distribution or model expects.
    #[error("illegal alphabet: {0}")]
    IllegalAlphabet(String),
    /// A state removal was blocked by transitions still attached to it.
    #[error("illegal transition {from} -> {to}: {reason}")]
    IllegalTransition {
        /// Name of the transition's source state.
        from: String,
        /// Name of the transition's destination state.
        to: String,
        /// Why the operation was blocked.
        reason: String,
    },
    /// A structural mutation was rejected (frozen object, duplicate
    /// transition, non-zero weight on a transition being destroyed, or a
    /// write to an untrainable distribution).
    #[error("change rejected: {0}")]
    ChangeRejected(String),
    /// A composite alphabet name or a declarative alphabet definition could
    /// not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
    /// A packed code does not correspond to any symbol of the packing's
    /// alphabet.
    #[error("unknown packed code {code} for word size {word_size}")]
    UnknownCode {
        /// The offending code.
        code: u8,
        /// The packing's word size in bits.
        word_size: u8,
    },
    /// A registry lookup found nothing under the given name.
    #[error("nothing is registered under the name {0:?}")]
    UnknownName(String),
}
