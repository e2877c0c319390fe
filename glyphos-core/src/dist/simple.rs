//! Array-backed and uniform distributions.

use std::sync::Arc;

use crate::constants::WEIGHT_TOLERANCE;
use crate::dist::{
    Distribution, DistributionId, Trainer, TrainingContext, WeightUpdate, next_distribution_id,
};
use crate::symbol::{Alphabet, AlphabetIndex, Symbol};
use crate::types::GlyphosError;

/// A distribution storing one weight per atomic symbol, indexed densely
/// through an [`AlphabetIndex`]. Weights start at zero; training or the
/// caller brings them to a normalized state.
#[derive(Debug)]
pub struct SimpleDistribution {
    id: DistributionId,
    index: Arc<AlphabetIndex>,
    weights: Vec<f64>,
    null_model: Box<dyn Distribution>,
}

impl SimpleDistribution {
    /// A zero-weight distribution over an alphabet, with a uniform null
    /// model.
    pub fn new(alphabet: &Alphabet) -> Self {
        Self::with_index(Arc::new(AlphabetIndex::new(alphabet)))
    }

    /// As [`SimpleDistribution::new`], sharing an existing index (the
    /// registry caches one per alphabet).
    pub fn with_index(index: Arc<AlphabetIndex>) -> Self {
        let weights = vec![0.0; index.len()];
        let null_model = Box::new(UniformDistribution::with_index(index.clone()));
        SimpleDistribution {
            id: next_distribution_id(),
            index,
            weights,
            null_model,
        }
    }

    /// Rebuild this distribution over a changed alphabet, keeping its
    /// identity and the weights of surviving symbols. New symbols start at
    /// zero; the null model resets to uniform over the new alphabet.
    pub(crate) fn rebuilt_over(&self, alphabet: &Alphabet) -> SimpleDistribution {
        let index = Arc::new(AlphabetIndex::new(alphabet));
        let mut weights = vec![0.0; index.len()];
        for (position, symbol) in index.symbols().iter().enumerate() {
            if let Ok(old_position) = self.index.index_for(symbol) {
                weights[position] = self.weights[old_position];
            }
        }
        SimpleDistribution {
            id: self.id,
            index: index.clone(),
            weights,
            null_model: Box::new(UniformDistribution::with_index(index)),
        }
    }

    /// Sum of all atomic weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Whether the atomic weights sum to 1.0 within tolerance.
    pub fn is_normalized(&self) -> bool {
        (self.total_weight() - 1.0).abs() <= WEIGHT_TOLERANCE
    }
}

impl Distribution for SimpleDistribution {
    fn id(&self) -> DistributionId {
        self.id
    }

    fn alphabet(&self) -> &Alphabet {
        self.index.alphabet()
    }

    fn weight(&self, symbol: &Symbol) -> Result<f64, GlyphosError> {
        self.alphabet().validate(symbol)?;
        if symbol.is_atomic() {
            Ok(self.weights[self.index.index_for(symbol)?])
        } else {
            let mut sum = 0.0;
            for atom in symbol.match_set() {
                sum += self.weights[self.index.index_for(&atom)?];
            }
            Ok(sum)
        }
    }

    fn set_weight(&mut self, symbol: &Symbol, weight: f64) -> Result<(), GlyphosError> {
        if weight < 0.0 {
            return Err(GlyphosError::ChangeRejected(format!(
                "negative weight {weight} for symbol {}",
                symbol.name()
            )));
        }
        if !symbol.is_atomic() {
            return Err(GlyphosError::IllegalSymbol(format!(
                "cannot set the weight of non-atomic symbol {}; \
                 ambiguity weights are derived",
                symbol.name()
            )));
        }
        let position = self.index.index_for(symbol)?;
        self.weights[position] = weight;
        Ok(())
    }

    fn null_model(&self) -> &dyn Distribution {
        &*self.null_model
    }

    fn set_null_model(&mut self, null_model: Box<dyn Distribution>) -> Result<(), GlyphosError> {
        if null_model.alphabet() != self.alphabet() {
            return Err(GlyphosError::IllegalAlphabet(format!(
                "null model is over {} but this distribution is over {}",
                null_model.alphabet().name(),
                self.alphabet().name()
            )));
        }
        self.null_model = null_model;
        Ok(())
    }

    fn register_with_trainer(&self, context: &mut TrainingContext) {
        context.register_distribution(self);
    }

    fn apply_update(&mut self, update: &WeightUpdate) -> Result<bool, GlyphosError> {
        if update.distribution != self.id {
            return Ok(false);
        }
        for (symbol, weight) in &update.weights {
            let position = self.index.index_for(symbol)?;
            self.weights[position] = *weight;
        }
        Ok(true)
    }
}

/// The uniform distribution: every atomic symbol weighs `1/n`. Immutable;
/// it is the default null model and the usual "null model baseline".
#[derive(Debug)]
pub struct UniformDistribution {
    id: DistributionId,
    index: Arc<AlphabetIndex>,
}

impl UniformDistribution {
    /// The uniform distribution over an alphabet.
    pub fn new(alphabet: &Alphabet) -> Self {
        Self::with_index(Arc::new(AlphabetIndex::new(alphabet)))
    }

    /// As [`UniformDistribution::new`], sharing an existing index.
    pub fn with_index(index: Arc<AlphabetIndex>) -> Self {
        UniformDistribution {
            id: next_distribution_id(),
            index,
        }
    }
}

impl Distribution for UniformDistribution {
    fn id(&self) -> DistributionId {
        self.id
    }

    fn alphabet(&self) -> &Alphabet {
        self.index.alphabet()
    }

    fn weight(&self, symbol: &Symbol) -> Result<f64, GlyphosError> {
        self.alphabet().validate(symbol)?;
        let n = self.index.len() as f64;
        if symbol.is_atomic() {
            Ok(1.0 / n)
        } else {
            Ok(symbol.match_set().len() as f64 / n)
        }
    }

    fn set_weight(&mut self, symbol: &Symbol, _weight: f64) -> Result<(), GlyphosError> {
        Err(GlyphosError::ChangeRejected(format!(
            "the weights of a uniform distribution are immutable ({})",
            symbol.name()
        )))
    }

    fn null_model(&self) -> &dyn Distribution {
        self
    }

    fn set_null_model(&mut self, _null_model: Box<dyn Distribution>) -> Result<(), GlyphosError> {
        Err(GlyphosError::ChangeRejected(
            "the null model of a uniform distribution is itself".to_string(),
        ))
    }

    fn register_with_trainer(&self, context: &mut TrainingContext) {
        context.register_trainer(self.id, Trainer::Ignore);
    }

    fn apply_update(&mut self, _update: &WeightUpdate) -> Result<bool, GlyphosError> {
        Ok(false)
    }
}
