//! The training context: count accumulation and batch normalization.
//!
//! External model-fitting drivers walk observed symbol sequences, feed
//! weighted counts in through [`TrainingContext::add_count`], and call
//! [`TrainingContext::train`] once per batch. Training does not reach into
//! distributions through a listener graph: it returns a batch of
//! [`WeightUpdate`] messages, and owners apply them explicitly with
//! [`Distribution::apply_update`].
//!
//! How counts land is decided per distribution by its [`Trainer`] sink:
//! plain accumulation, the ignore-counts sink that freezes a distribution,
//! or a conditioned sink that splits a composite symbol and redirects the
//! count to the sub-distribution selected by its conditioning prefix.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;

use crate::dist::{Distribution, DistributionId};
use crate::symbol::{Alphabet, Symbol, SymbolKey};
use crate::types::GlyphosError;

/// Normalized weights for one distribution, produced by
/// [`TrainingContext::train`].
#[derive(Debug, Clone)]
pub struct WeightUpdate {
    /// The distribution the update addresses.
    pub distribution: DistributionId,
    /// New weight per atomic symbol; weights sum to 1.0.
    pub weights: Vec<(Symbol, f64)>,
}

/// How counts offered to a distribution are handled.
#[derive(Debug)]
pub enum Trainer {
    /// Accumulate into the distribution's own counts.
    Accumulate,
    /// Drop the counts; the distribution's weights are to stay as supplied.
    Ignore,
    /// Split the composite symbol and redirect the count to the
    /// sub-distribution selected by its conditioning prefix.
    Conditioned(ConditionedSink),
}

/// The redirecting sink installed by an order-N distribution.
#[derive(Debug)]
pub struct ConditionedSink {
    arity: usize,
    conditioning: Alphabet,
    targets: HashMap<SymbolKey, DistributionId>,
}

impl ConditionedSink {
    pub(crate) fn new(
        arity: usize,
        conditioning: Alphabet,
        targets: HashMap<SymbolKey, DistributionId>,
    ) -> Self {
        ConditionedSink {
            arity,
            conditioning,
            targets,
        }
    }

    /// Split a composite symbol of the expected arity into its conditioning
    /// prefix and final element, resolving the prefix to the registered
    /// sub-distribution.
    fn route(&self, symbol: &Symbol) -> Result<(DistributionId, Symbol), GlyphosError> {
        let components = symbol.components().ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "conditioned training needs a composite symbol, not {}",
                symbol.name()
            ))
        })?;
        if components.len() != self.arity {
            return Err(GlyphosError::IllegalSymbol(format!(
                "symbol {} has {} slots but this distribution is conditioned over {}",
                symbol.name(),
                components.len(),
                self.arity
            )));
        }
        let prefix = if self.arity == 2 {
            components[0].clone()
        } else {
            self.conditioning
                .symbol_for(&components[..self.arity - 1])?
        };
        let target = self.targets.get(prefix.key()).copied().ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "no sub-distribution is registered for conditioning prefix {}",
                prefix.name()
            ))
        })?;
        Ok((target, components[self.arity - 1].clone()))
    }
}

#[derive(Debug)]
struct Accumulator {
    symbols: Vec<Symbol>,
    by_key: HashMap<SymbolKey, usize>,
    counts: Vec<f64>,
}

impl Accumulator {
    fn over(alphabet: &Alphabet) -> Self {
        let symbols = alphabet.symbols();
        let by_key = symbols
            .iter()
            .enumerate()
            .map(|(position, symbol)| (symbol.key().clone(), position))
            .collect();
        let counts = vec![0.0; symbols.len()];
        Accumulator {
            symbols,
            by_key,
            counts,
        }
    }

    fn add(&mut self, symbol: &Symbol, amount: f64) -> Result<(), GlyphosError> {
        let position = self.by_key.get(symbol.key()).copied().ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "{} is not an atomic member of the trained alphabet",
                symbol.name()
            ))
        })?;
        self.counts[position] += amount;
        Ok(())
    }

    /// New weight per symbol: accumulated count over the total. `None`
    /// when nothing was counted.
    fn normalized(&self) -> Option<Vec<(Symbol, f64)>> {
        let total: f64 = self.counts.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(
            self.symbols
                .iter()
                .zip(&self.counts)
                .map(|(symbol, count)| (symbol.clone(), count / total))
                .collect(),
        )
    }

    fn clear(&mut self) {
        self.counts.fill(0.0);
    }
}

/// Coordinates count accumulation and batch normalization across a set of
/// registered distributions.
#[derive(Debug, Default)]
pub struct TrainingContext {
    accumulators: BTreeMap<DistributionId, Accumulator>,
    trainers: BTreeMap<DistributionId, Trainer>,
}

impl TrainingContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a distribution as trainable, giving it a count accumulator
    /// over its alphabet. Idempotent; a distribution that already has a
    /// trainer keeps it.
    pub fn register_distribution(&mut self, distribution: &dyn Distribution) {
        let id = distribution.id();
        self.trainers.entry(id).or_insert(Trainer::Accumulate);
        self.accumulators
            .entry(id)
            .or_insert_with(|| Accumulator::over(distribution.alphabet()));
    }

    /// Install a trainer sink for a distribution. Idempotent; the first
    /// registration wins, so a composite can claim its routing sink before
    /// or after its parts register.
    pub fn register_trainer(&mut self, owner: DistributionId, trainer: Trainer) {
        self.trainers.entry(owner).or_insert(trainer);
    }

    /// Whether a distribution has registered with this context.
    pub fn is_registered(&self, distribution: DistributionId) -> bool {
        self.trainers.contains_key(&distribution)
    }

    /// Accumulate a weighted observation of `symbol` for a distribution,
    /// following its trainer sink.
    pub fn add_count(
        &mut self,
        distribution: DistributionId,
        symbol: &Symbol,
        amount: f64,
    ) -> Result<(), GlyphosError> {
        let route = match self.trainers.get(&distribution) {
            None => {
                return Err(GlyphosError::UnknownName(format!(
                    "distribution {distribution} is not registered with this training context"
                )));
            }
            Some(Trainer::Ignore) => return Ok(()),
            Some(Trainer::Accumulate) => None,
            Some(Trainer::Conditioned(sink)) => Some(sink.route(symbol)?),
        };
        match route {
            Some((target, inner)) => self.add_count(target, &inner, amount),
            None => self
                .accumulators
                .get_mut(&distribution)
                .expect("accumulating trainers always own an accumulator")
                .add(symbol, amount),
        }
    }

    /// One batch training pass: every accumulator that received counts is
    /// normalized (new weight = accumulated count / total) and emitted as a
    /// [`WeightUpdate`]; all accumulators are then cleared. Distributions
    /// whose accumulator stayed empty produce no update.
    pub fn train(&mut self) -> Vec<WeightUpdate> {
        let updates: Vec<WeightUpdate> = self
            .accumulators
            .par_iter()
            .filter_map(|(&id, accumulator)| {
                accumulator.normalized().map(|weights| WeightUpdate {
                    distribution: id,
                    weights,
                })
            })
            .collect();
        for accumulator in self.accumulators.values_mut() {
            accumulator.clear();
        }
        updates
    }
}

/// Apply a batch of updates to a set of distributions, routing each update
/// to the first distribution that consumes it. Updates addressing none of
/// the given distributions are left for other owners.
pub fn apply_updates(
    distributions: &mut [&mut dyn Distribution],
    updates: &[WeightUpdate],
) -> Result<(), GlyphosError> {
    for update in updates {
        for distribution in distributions.iter_mut() {
            if distribution.apply_update(update)? {
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WEIGHT_TOLERANCE;
    use crate::dist::SimpleDistribution;
    use crate::symbol::Alphabet;

    fn dna() -> (Alphabet, Vec<Symbol>) {
        let symbols: Vec<Symbol> = ["a", "c", "g", "t"].into_iter().map(Symbol::atomic).collect();
        let alphabet = Alphabet::simple("DNA", symbols.clone()).unwrap();
        (alphabet, symbols)
    }

    #[test]
    fn test_equal_counts_train_to_uniform_weights() {
        let (alphabet, symbols) = dna();
        let mut distribution = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        distribution.register_with_trainer(&mut context);

        for symbol in &symbols {
            context.add_count(distribution.id(), symbol, 10.0).unwrap();
        }
        let updates = context.train();
        assert_eq!(updates.len(), 1);
        for update in &updates {
            assert!(distribution.apply_update(update).unwrap());
        }
        for symbol in &symbols {
            assert!((distribution.weight(symbol).unwrap() - 0.25).abs() < WEIGHT_TOLERANCE);
        }
        assert!(distribution.is_normalized());
    }

    #[test]
    fn test_unequal_counts_normalize_by_total() {
        let (alphabet, symbols) = dna();
        let mut distribution = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        distribution.register_with_trainer(&mut context);

        context.add_count(distribution.id(), &symbols[0], 3.0).unwrap();
        context.add_count(distribution.id(), &symbols[1], 1.0).unwrap();
        for update in context.train() {
            distribution.apply_update(&update).unwrap();
        }
        assert!((distribution.weight(&symbols[0]).unwrap() - 0.75).abs() < WEIGHT_TOLERANCE);
        assert!((distribution.weight(&symbols[1]).unwrap() - 0.25).abs() < WEIGHT_TOLERANCE);
        assert_eq!(distribution.weight(&symbols[2]).unwrap(), 0.0);
    }

    #[test]
    fn test_training_clears_the_accumulators() {
        let (alphabet, symbols) = dna();
        let mut distribution = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        distribution.register_with_trainer(&mut context);

        context.add_count(distribution.id(), &symbols[0], 1.0).unwrap();
        assert_eq!(context.train().len(), 1);
        assert!(context.train().is_empty());
    }

    #[test]
    fn test_unregistered_distribution_is_rejected() {
        let (alphabet, symbols) = dna();
        let distribution = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        assert!(matches!(
            context.add_count(distribution.id(), &symbols[0], 1.0),
            Err(GlyphosError::UnknownName(_))
        ));
    }

    #[test]
    fn test_ambiguity_counts_are_rejected() {
        let (alphabet, symbols) = dna();
        let distribution = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        distribution.register_with_trainer(&mut context);
        let purine = alphabet
            .ambiguity(&[symbols[0].clone(), symbols[2].clone()])
            .unwrap();
        assert!(matches!(
            context.add_count(distribution.id(), &purine, 1.0),
            Err(GlyphosError::IllegalSymbol(_))
        ));
    }

    #[test]
    fn test_ignore_sink_drops_counts() {
        let (alphabet, symbols) = dna();
        let distribution = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        context.register_trainer(distribution.id(), Trainer::Ignore);
        context.add_count(distribution.id(), &symbols[0], 5.0).unwrap();
        assert!(context.train().is_empty());
    }

    #[test]
    fn test_first_trainer_registration_wins() {
        let (alphabet, symbols) = dna();
        let distribution = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        context.register_trainer(distribution.id(), Trainer::Ignore);
        // A later plain registration must not displace the ignore sink.
        distribution.register_with_trainer(&mut context);
        context.add_count(distribution.id(), &symbols[0], 5.0).unwrap();
        assert!(context.train().is_empty());
    }

    #[test]
    fn test_apply_updates_routes_to_the_owner() {
        let (alphabet, symbols) = dna();
        let mut first = SimpleDistribution::new(&alphabet);
        let mut second = SimpleDistribution::new(&alphabet);
        let mut context = TrainingContext::new();
        first.register_with_trainer(&mut context);
        second.register_with_trainer(&mut context);

        context.add_count(first.id(), &symbols[0], 1.0).unwrap();
        context.add_count(second.id(), &symbols[1], 1.0).unwrap();
        let updates = context.train();
        apply_updates(&mut [&mut first, &mut second], &updates).unwrap();
        assert_eq!(first.weight(&symbols[0]).unwrap(), 1.0);
        assert_eq!(second.weight(&symbols[1]).unwrap(), 1.0);
    }
}
