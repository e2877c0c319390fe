//! Distributions conditioned on a fixed-length symbol history.

use std::collections::{BTreeMap, HashMap};

use crate::dist::{
    ConditionedSink, Distribution, DistributionId, SimpleDistribution, Trainer, TrainingContext,
    UniformDistribution, WeightUpdate, next_distribution_id,
};
use crate::registry::AlphabetRegistry;
use crate::symbol::{Alphabet, Symbol, SymbolKey};
use crate::types::GlyphosError;

/// An order-N distribution: a distribution over one alphabet conditioned on
/// having previously observed one or more other symbols.
///
/// Always over a cross-product alphabet `(C1 x .. x Cn-1 x L)`: each weight
/// lives in the sub-distribution over `L` selected by the conditioning
/// prefix `(C1, .., Cn-1)`. Unlike plain distributions, the weights do
/// *not* sum to 1.0 across the whole cross-product alphabet; each
/// sub-distribution sums to 1.0 by itself.
#[derive(Debug)]
pub struct OrderNDistribution {
    id: DistributionId,
    alphabet: Alphabet,
    conditioning: Alphabet,
    conditioned: Alphabet,
    arity: usize,
    subs: BTreeMap<SymbolKey, (Symbol, Box<dyn Distribution>)>,
    null_model: Box<dyn Distribution>,
}

impl OrderNDistribution {
    /// Build over a cross-product alphabet, with one zero-weight
    /// [`SimpleDistribution`] per conditioning symbol. The conditioning
    /// alphabet is the first factor for two-factor products and the cached
    /// cross product of all but the last factor otherwise.
    pub fn new(
        registry: &mut AlphabetRegistry,
        alphabet: &Alphabet,
    ) -> Result<Self, GlyphosError> {
        let factors = alphabet.factors().ok_or_else(|| {
            GlyphosError::IllegalAlphabet(format!(
                "an order-N distribution needs a cross-product alphabet, not {}",
                alphabet.name()
            ))
        })?;
        if factors.len() < 2 {
            return Err(GlyphosError::IllegalAlphabet(format!(
                "an order-N distribution needs at least two factors, {} has {}",
                alphabet.name(),
                factors.len()
            )));
        }
        let arity = factors.len();
        let conditioned = factors[arity - 1].clone();
        let conditioning = if arity == 2 {
            factors[0].clone()
        } else {
            registry.cross_product(factors[..arity - 1].to_vec())?
        };

        let mut subs: BTreeMap<SymbolKey, (Symbol, Box<dyn Distribution>)> = BTreeMap::new();
        for prefix in conditioning.symbols() {
            let sub: Box<dyn Distribution> = Box::new(SimpleDistribution::new(&conditioned));
            subs.insert(prefix.key().clone(), (prefix, sub));
        }

        let null_model = Box::new(OrderNNullModel::new(alphabet.clone(), &conditioned));
        Ok(OrderNDistribution {
            id: next_distribution_id(),
            alphabet: alphabet.clone(),
            conditioning,
            conditioned,
            arity,
            subs,
            null_model,
        })
    }

    /// The conditioning alphabet: the prefix the selection runs on.
    pub fn conditioning_alphabet(&self) -> &Alphabet {
        &self.conditioning
    }

    /// The conditioned alphabet: the alphabet of every sub-distribution.
    pub fn conditioned_alphabet(&self) -> &Alphabet {
        &self.conditioned
    }

    /// Split a composite symbol into its conditioning prefix (collapsed to
    /// the cross product's canonical symbol when it spans more than one
    /// slot) and its final element.
    fn split(&self, symbol: &Symbol) -> Result<(Symbol, Symbol), GlyphosError> {
        let components = symbol.components().ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "{} is not a composite symbol of {}",
                symbol.name(),
                self.alphabet.name()
            ))
        })?;
        if components.len() != self.arity {
            return Err(GlyphosError::IllegalSymbol(format!(
                "symbol {} has {} slots but {} has {}",
                symbol.name(),
                components.len(),
                self.alphabet.name(),
                self.arity
            )));
        }
        let prefix = if self.arity == 2 {
            components[0].clone()
        } else {
            self.conditioning.symbol_for(&components[..self.arity - 1])?
        };
        Ok((prefix, components[self.arity - 1].clone()))
    }

    /// The sub-distribution selected by a conditioning symbol. An
    /// otherwise-valid prefix with no registered sub-distribution is an
    /// error.
    pub fn distribution(&self, prefix: &Symbol) -> Result<&dyn Distribution, GlyphosError> {
        match self.subs.get(prefix.key()) {
            Some((_, sub)) => Ok(&**sub),
            None => {
                self.conditioning.validate(prefix)?;
                Err(GlyphosError::IllegalSymbol(format!(
                    "no sub-distribution is registered for conditioning prefix {}",
                    prefix.name()
                )))
            }
        }
    }

    /// Replace the sub-distribution for a conditioning symbol.
    pub fn set_distribution(
        &mut self,
        prefix: &Symbol,
        distribution: Box<dyn Distribution>,
    ) -> Result<(), GlyphosError> {
        self.conditioning.validate(prefix)?;
        if distribution.alphabet() != &self.conditioned {
            return Err(GlyphosError::IllegalAlphabet(format!(
                "the sub-distribution must be over {}, not {}",
                self.conditioned.name(),
                distribution.alphabet().name()
            )));
        }
        self.subs
            .insert(prefix.key().clone(), (prefix.clone(), distribution));
        Ok(())
    }
}

impl Distribution for OrderNDistribution {
    fn id(&self) -> DistributionId {
        self.id
    }

    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn weight(&self, symbol: &Symbol) -> Result<f64, GlyphosError> {
        if symbol.is_atomic() {
            let (prefix, last) = self.split(symbol)?;
            self.distribution(&prefix)?.weight(&last)
        } else {
            self.alphabet.validate(symbol)?;
            let mut sum = 0.0;
            for atom in symbol.match_set() {
                sum += self.weight(&atom)?;
            }
            Ok(sum)
        }
    }

    fn set_weight(&mut self, symbol: &Symbol, weight: f64) -> Result<(), GlyphosError> {
        if !symbol.is_atomic() {
            return Err(GlyphosError::IllegalSymbol(format!(
                "cannot set a weight for ambiguity symbol {}",
                symbol.name()
            )));
        }
        let (prefix, last) = self.split(symbol)?;
        let (_, sub) = self
            .subs
            .get_mut(prefix.key())
            .ok_or_else(|| {
                GlyphosError::IllegalSymbol(format!(
                    "no sub-distribution is registered for conditioning prefix {}",
                    prefix.name()
                ))
            })?;
        sub.set_weight(&last, weight)
    }

    fn null_model(&self) -> &dyn Distribution {
        &*self.null_model
    }

    fn set_null_model(&mut self, null_model: Box<dyn Distribution>) -> Result<(), GlyphosError> {
        if null_model.alphabet() != &self.alphabet {
            return Err(GlyphosError::IllegalAlphabet(format!(
                "null model is over {} but this distribution is over {}",
                null_model.alphabet().name(),
                self.alphabet.name()
            )));
        }
        self.null_model = null_model;
        Ok(())
    }

    /// Register every sub-distribution, then claim a conditioned sink for
    /// this distribution so counts offered to it are redirected to the
    /// right sub-distribution instead of being counted directly.
    fn register_with_trainer(&self, context: &mut TrainingContext) {
        let mut targets = HashMap::with_capacity(self.subs.len());
        for (key, (_, sub)) in &self.subs {
            sub.register_with_trainer(context);
            targets.insert(key.clone(), sub.id());
        }
        context.register_trainer(
            self.id,
            Trainer::Conditioned(ConditionedSink::new(
                self.arity,
                self.conditioning.clone(),
                targets,
            )),
        );
    }

    fn apply_update(&mut self, update: &WeightUpdate) -> Result<bool, GlyphosError> {
        for (_, sub) in self.subs.values_mut() {
            if sub.apply_update(update)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Default null model of an order-N distribution: scores the final
/// component uniformly over the conditioned alphabet, whatever the prefix.
#[derive(Debug)]
struct OrderNNullModel {
    id: DistributionId,
    alphabet: Alphabet,
    uniform: UniformDistribution,
}

impl OrderNNullModel {
    fn new(alphabet: Alphabet, conditioned: &Alphabet) -> Self {
        OrderNNullModel {
            id: next_distribution_id(),
            alphabet,
            uniform: UniformDistribution::new(conditioned),
        }
    }
}

impl Distribution for OrderNNullModel {
    fn id(&self) -> DistributionId {
        self.id
    }

    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn weight(&self, symbol: &Symbol) -> Result<f64, GlyphosError> {
        if symbol.is_atomic() {
            let components = symbol.components().ok_or_else(|| {
                GlyphosError::IllegalSymbol(format!(
                    "{} is not a composite symbol of {}",
                    symbol.name(),
                    self.alphabet.name()
                ))
            })?;
            let last = components.last().ok_or_else(|| {
                GlyphosError::IllegalSymbol(format!("{} has no components", symbol.name()))
            })?;
            self.uniform.weight(last)
        } else {
            self.alphabet.validate(symbol)?;
            let mut sum = 0.0;
            for atom in symbol.match_set() {
                sum += self.weight(&atom)?;
            }
            Ok(sum)
        }
    }

    fn set_weight(&mut self, symbol: &Symbol, _weight: f64) -> Result<(), GlyphosError> {
        Err(GlyphosError::ChangeRejected(format!(
            "the order-N null model is immutable ({})",
            symbol.name()
        )))
    }

    fn null_model(&self) -> &dyn Distribution {
        self
    }

    fn set_null_model(&mut self, _null_model: Box<dyn Distribution>) -> Result<(), GlyphosError> {
        Err(GlyphosError::ChangeRejected(
            "cannot replace the null model of the built-in order-N null model".to_string(),
        ))
    }

    fn register_with_trainer(&self, context: &mut TrainingContext) {
        context.register_trainer(self.id, Trainer::Ignore);
    }

    fn apply_update(&mut self, _update: &WeightUpdate) -> Result<bool, GlyphosError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WEIGHT_TOLERANCE;

    fn pair_over_dna() -> (AlphabetRegistry, Alphabet, Alphabet, Vec<Symbol>) {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let pair = registry
            .cross_product(vec![dna.clone(), dna.clone()])
            .unwrap();
        let symbols = dna.symbols();
        (registry, dna, pair, symbols)
    }

    #[test]
    fn test_conditioning_split_for_two_factors() {
        let (mut registry, dna, pair, _) = pair_over_dna();
        let distribution = OrderNDistribution::new(&mut registry, &pair).unwrap();
        assert_eq!(distribution.conditioning_alphabet(), &dna);
        assert_eq!(distribution.conditioned_alphabet(), &dna);
    }

    #[test]
    fn test_conditioning_collapses_longer_prefixes() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let triple = registry
            .cross_product(vec![dna.clone(), dna.clone(), dna.clone()])
            .unwrap();
        let distribution = OrderNDistribution::new(&mut registry, &triple).unwrap();
        assert_eq!(
            distribution.conditioning_alphabet().name(),
            "(DNA x DNA)"
        );
        assert_eq!(distribution.conditioned_alphabet(), &dna);

        let symbols = dna.symbols();
        let observed = triple
            .symbol_for(&[symbols[0].clone(), symbols[1].clone(), symbols[2].clone()])
            .unwrap();
        let mut mutable = OrderNDistribution::new(&mut registry, &triple).unwrap();
        mutable.set_weight(&observed, 1.0).unwrap();
        assert_eq!(mutable.weight(&observed).unwrap(), 1.0);
    }

    #[test]
    fn test_weight_routes_through_the_prefix() {
        let (mut registry, _, pair, symbols) = pair_over_dna();
        let mut distribution = OrderNDistribution::new(&mut registry, &pair).unwrap();
        let after_a = pair
            .symbol_for(&[symbols[0].clone(), symbols[2].clone()])
            .unwrap();
        distribution.set_weight(&after_a, 0.9).unwrap();
        assert_eq!(distribution.weight(&after_a).unwrap(), 0.9);

        // The same final symbol under a different prefix is untouched.
        let after_c = pair
            .symbol_for(&[symbols[1].clone(), symbols[2].clone()])
            .unwrap();
        assert_eq!(distribution.weight(&after_c).unwrap(), 0.0);
    }

    #[test]
    fn test_plain_symbol_is_rejected() {
        let (mut registry, _, pair, symbols) = pair_over_dna();
        let distribution = OrderNDistribution::new(&mut registry, &pair).unwrap();
        assert!(matches!(
            distribution.weight(&symbols[0]),
            Err(GlyphosError::IllegalSymbol(_))
        ));
    }

    #[test]
    fn test_needs_a_cross_product() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        assert!(matches!(
            OrderNDistribution::new(&mut registry, &dna),
            Err(GlyphosError::IllegalAlphabet(_))
        ));
    }

    #[test]
    fn test_sub_distributions_normalize_independently() {
        let (mut registry, dna, pair, symbols) = pair_over_dna();
        let mut distribution = OrderNDistribution::new(&mut registry, &pair).unwrap();
        let mut context = TrainingContext::new();
        distribution.register_with_trainer(&mut context);

        // After a: g twice, t twice. After c: g once.
        let ag = pair
            .symbol_for(&[symbols[0].clone(), symbols[2].clone()])
            .unwrap();
        let at = pair
            .symbol_for(&[symbols[0].clone(), symbols[3].clone()])
            .unwrap();
        let cg = pair
            .symbol_for(&[symbols[1].clone(), symbols[2].clone()])
            .unwrap();
        context.add_count(distribution.id(), &ag, 2.0).unwrap();
        context.add_count(distribution.id(), &at, 2.0).unwrap();
        context.add_count(distribution.id(), &cg, 1.0).unwrap();

        for update in context.train() {
            distribution.apply_update(&update).unwrap();
        }

        assert!((distribution.weight(&ag).unwrap() - 0.5).abs() < WEIGHT_TOLERANCE);
        assert!((distribution.weight(&at).unwrap() - 0.5).abs() < WEIGHT_TOLERANCE);
        assert!((distribution.weight(&cg).unwrap() - 1.0).abs() < WEIGHT_TOLERANCE);

        // Each conditioned sub-distribution sums to 1.0 ...
        for prefix in [symbols[0].clone(), symbols[1].clone()] {
            let mut sum = 0.0;
            for last in dna.symbols() {
                let composite = pair.symbol_for(&[prefix.clone(), last]).unwrap();
                sum += distribution.weight(&composite).unwrap();
            }
            assert!((sum - 1.0).abs() < WEIGHT_TOLERANCE);
        }
        // ... while the whole cross-product alphabet does not.
        let mut total = 0.0;
        for composite in pair.symbols() {
            total += distribution.weight(&composite).unwrap();
        }
        assert!(total > 1.0 + WEIGHT_TOLERANCE);
    }

    #[test]
    fn test_null_model_scores_the_final_component() {
        let (mut registry, _, pair, symbols) = pair_over_dna();
        let distribution = OrderNDistribution::new(&mut registry, &pair).unwrap();
        let ag = pair
            .symbol_for(&[symbols[0].clone(), symbols[2].clone()])
            .unwrap();
        assert!(
            (distribution.null_model().weight(&ag).unwrap() - 0.25).abs() < WEIGHT_TOLERANCE
        );
    }

    #[test]
    fn test_replacing_a_sub_distribution_checks_the_alphabet() {
        let (mut registry, dna, pair, symbols) = pair_over_dna();
        let mut distribution = OrderNDistribution::new(&mut registry, &pair).unwrap();
        let wrong = Box::new(SimpleDistribution::new(&pair));
        assert!(matches!(
            distribution.set_distribution(&symbols[0], wrong),
            Err(GlyphosError::IllegalAlphabet(_))
        ));
        let right = Box::new(SimpleDistribution::new(&dna));
        assert!(distribution.set_distribution(&symbols[0], right).is_ok());
    }
}
