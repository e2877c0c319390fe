//! Shared numeric thresholds and reserved names.
//!
//! Centralizing these keeps the algebra and the model code agreeing on the
//! exact same cut-off points.

/// Cross products whose total combination count is below this limit are
/// enumerated eagerly; at or above it a sparse, on-demand implementation is
/// used instead.
pub const EAGER_CROSS_PRODUCT_LIMIT: usize = 1000;

/// Alphabets up to this size are indexed by linear scan; larger alphabets
/// get a hashed index.
pub const LINEAR_INDEX_LIMIT: usize = 160;

/// Tolerance used when checking that atomic weights sum to 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Name of the reserved sentinel state that starts and ends every model.
pub const MAGICAL_STATE_NAME: &str = "!";

/// Name of the single-symbol alphabet the sentinel state emits over.
pub const MAGICAL_ALPHABET_NAME: &str = "Magical Alphabet";

/// Name of the gap symbol.
pub const GAP_SYMBOL_NAME: &str = "gap";

/// Separator used inside composite alphabet names, as in `(DNA x DNA)`.
pub const CROSS_PRODUCT_SEPARATOR: &str = " x ";
