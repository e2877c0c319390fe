//! Probability distributions over alphabets, and their training protocol.
//!
//! A [`Distribution`] maps the symbols of one fixed alphabet to
//! non-negative weights. For anything used in scoring, the weights over the
//! alphabet's *atomic* symbols sum to 1.0 (within tolerance); the weight of
//! an ambiguity symbol is never stored but derived as the **sum** of the
//! weights of the atomic symbols it matches. (The sum keeps the
//! all-matching ambiguity symbol at weight 1.0 for a normalized
//! distribution and the gap at 0.0.)
//!
//! The exception is [`OrderNDistribution`]: its weights sum to 1.0 only
//! within each conditioned sub-distribution, not across the whole
//! cross-product alphabet.
//!
//! Normalization is the caller's responsibility in the base engine; the
//! [`TrainingContext`] restores it after a batch of observed counts by
//! handing back [`WeightUpdate`] messages that owners apply with
//! [`Distribution::apply_update`].

mod order_n;
mod simple;
mod training;
mod untrainable;

pub use order_n::OrderNDistribution;
pub use simple::{SimpleDistribution, UniformDistribution};
pub use training::{ConditionedSink, Trainer, TrainingContext, WeightUpdate, apply_updates};
pub use untrainable::UntrainableDistribution;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::symbol::{Alphabet, Symbol};
use crate::types::GlyphosError;

/// Stable identity of a distribution, used by the training protocol to
/// address count accumulators and weight updates.
pub type DistributionId = u64;

static NEXT_DISTRIBUTION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_distribution_id() -> DistributionId {
    NEXT_DISTRIBUTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A mapping from the symbols of one fixed alphabet to weights.
pub trait Distribution: fmt::Debug + Send + Sync {
    /// This distribution's stable identity.
    fn id(&self) -> DistributionId;

    /// The alphabet the distribution is over.
    fn alphabet(&self) -> &Alphabet;

    /// The weight of a symbol: a direct lookup for atomic members, the sum
    /// of matched atomic weights for ambiguity symbols (so the gap weighs
    /// 0.0). Symbols outside the alphabet are an error.
    fn weight(&self, symbol: &Symbol) -> Result<f64, GlyphosError>;

    /// Set the weight of one atomic symbol. Fails on negative weights, on
    /// non-atomic symbols, and on immutable distributions.
    fn set_weight(&mut self, symbol: &Symbol, weight: f64) -> Result<(), GlyphosError>;

    /// The fallback distribution consulted when no observation is
    /// informative.
    fn null_model(&self) -> &dyn Distribution;

    /// Replace the fallback. Fails when the candidate's alphabet is not
    /// this distribution's alphabet.
    fn set_null_model(&mut self, null_model: Box<dyn Distribution>)
    -> Result<(), GlyphosError>;

    /// Tell a training context how this distribution trains: plain
    /// distributions register an accumulator, untrainable ones install the
    /// ignore-counts sink, composites register their parts and a routing
    /// sink.
    fn register_with_trainer(&self, context: &mut TrainingContext);

    /// Apply a batch weight update produced by [`TrainingContext::train`].
    /// Returns `true` when the update addressed this distribution (or one
    /// nested inside it) and was applied.
    fn apply_update(&mut self, update: &WeightUpdate) -> Result<bool, GlyphosError>;
}
