//! # Glyphos - symbolic alphabet algebra and Markov-model engine
//!
//! This library provides the machinery for working with biological (and
//! other) symbol alphabets and for building probabilistic models over them:
//!
//! - **Symbol algebra**: atomic symbols, ambiguity symbols, tuple (basis)
//!   symbols, the gap symbol, finite alphabets and algebraic cross products
//!   of alphabets, with process-wide flyweight caching through an explicit
//!   registry.
//! - **Packing**: fixed-width binary encodings of symbols (for example the
//!   classic 2-bit DNA encoding).
//! - **Distribution engine**: trainable probability distributions over
//!   alphabets - simple, uniform, untrainable, and Nth-order (conditioned)
//!   variants, each with a null-model fallback.
//! - **Markov-model graph**: states (including the shared start/end
//!   sentinel), validated transitions, and per-state transition
//!   distributions, ready for an external Viterbi/forward driver.
//! - **Training context**: batch accumulation of weighted symbol counts and
//!   EM-style renormalization across a set of distributions.
//! - **Suffix tree**: an auxiliary motif-frequency index over symbol
//!   windows.
//!
//! ## Quick start
//!
//! ```rust
//! use glyphos_core::AlphabetRegistry;
//! use glyphos_core::dist::{Distribution, SimpleDistribution, TrainingContext};
//!
//! let mut registry = AlphabetRegistry::core();
//! let dna = registry.alphabet_for_name("DNA")?;
//!
//! // Build a distribution over DNA and train it on equal counts.
//! let mut distribution = SimpleDistribution::new(&dna);
//! let mut context = TrainingContext::new();
//! distribution.register_with_trainer(&mut context);
//! for symbol in dna.symbols() {
//!     context.add_count(distribution.id(), &symbol, 10.0)?;
//! }
//! for update in context.train() {
//!     distribution.apply_update(&update)?;
//! }
//!
//! let adenine = registry.symbol_for_name("adenine")?;
//! assert!((distribution.weight(&adenine)? - 0.25).abs() < 1e-9);
//! # Ok::<(), glyphos_core::GlyphosError>(())
//! ```
//!
//! ## Module organization
//!
//! - [`symbol`]: symbols, alphabets, indexing, tokenizations, packing, and
//!   the suffix tree
//! - [`registry`]: the alphabet registry and declarative bootstrap
//! - [`dist`]: distributions and the training protocol
//! - [`model`]: Markov-model states and graphs
//! - [`types`]: the crate error type
//! - [`constants`]: shared thresholds and reserved names
//!
//! ## Error handling
//!
//! All fallible operations return [`Result<T, GlyphosError>`](GlyphosError).
//! Algebraic failures (factorization, composite-name parsing) surface to the
//! caller; rejected structural mutations leave the mutated object exactly as
//! it was; violations of internal invariants abort with a panic rather than
//! pretending to be recoverable.

pub mod constants;
pub mod dist;
pub mod model;
pub mod registry;
pub mod symbol;
pub mod types;

pub use registry::AlphabetRegistry;
pub use types::GlyphosError;
