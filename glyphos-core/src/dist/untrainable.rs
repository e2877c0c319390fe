//! A distribution that does not interact with the training framework.

use crate::dist::{
    Distribution, DistributionId, SimpleDistribution, Trainer, TrainingContext, WeightUpdate,
};
use crate::symbol::{Alphabet, Symbol};
use crate::types::GlyphosError;

/// A fixed-weight distribution. Useful for building Markov models where
/// only a subset of the distributions should train: registering one with a
/// training context installs nothing but the ignore-counts sink, and every
/// mutation is rejected, so the weights supplied at construction are final.
#[derive(Debug)]
pub struct UntrainableDistribution {
    inner: SimpleDistribution,
}

impl UntrainableDistribution {
    /// Build from explicit `(symbol, weight)` pairs; unnamed symbols keep
    /// weight zero. The usual invariant applies: for scoring, the supplied
    /// weights should sum to 1.0.
    pub fn from_weights(
        alphabet: &Alphabet,
        weights: &[(Symbol, f64)],
    ) -> Result<Self, GlyphosError> {
        let mut inner = SimpleDistribution::new(alphabet);
        for (symbol, weight) in weights {
            inner.set_weight(symbol, *weight)?;
        }
        Ok(UntrainableDistribution { inner })
    }
}

impl Distribution for UntrainableDistribution {
    fn id(&self) -> DistributionId {
        self.inner.id()
    }

    fn alphabet(&self) -> &Alphabet {
        self.inner.alphabet()
    }

    fn weight(&self, symbol: &Symbol) -> Result<f64, GlyphosError> {
        self.inner.weight(symbol)
    }

    fn set_weight(&mut self, symbol: &Symbol, _weight: f64) -> Result<(), GlyphosError> {
        Err(GlyphosError::ChangeRejected(format!(
            "distribution is untrainable; cannot set the weight of {}",
            symbol.name()
        )))
    }

    fn null_model(&self) -> &dyn Distribution {
        self.inner.null_model()
    }

    fn set_null_model(&mut self, _null_model: Box<dyn Distribution>) -> Result<(), GlyphosError> {
        Err(GlyphosError::ChangeRejected(
            "distribution is untrainable; cannot replace its null model".to_string(),
        ))
    }

    fn register_with_trainer(&self, context: &mut TrainingContext) {
        context.register_trainer(self.id(), Trainer::Ignore);
    }

    fn apply_update(&mut self, _update: &WeightUpdate) -> Result<bool, GlyphosError> {
        Ok(false)
    }
}
