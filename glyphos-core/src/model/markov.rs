//! The Markov-model graph: states, transitions, and validated topology
//! mutation.
//!
//! A [`MarkovModel`] owns a closed set of states (including the shared
//! sentinel), and for every state its successor and predecessor sets plus a
//! transition distribution over its legal successors. Structural mutations
//! validate every precondition before touching anything, then return a
//! [`TopologyChange`] describing what happened; dependent objects are
//! brought up to date by an explicit rebuild (a state's transition
//! distribution is rebuilt, surviving weights preserved, whenever its
//! successor set changes). A frozen model rejects all structural mutation.
//!
//! Scoring is an external collaborator's job: the model's contract ends at
//! exposing, per state, an emission distribution and a transition
//! distribution that are internally consistent.

use std::collections::BTreeMap;

use crate::dist::{Distribution, SimpleDistribution, TrainingContext, WeightUpdate};
use crate::model::{MagicalState, State, Transition};
use crate::registry::AlphabetRegistry;
use crate::symbol::{Alphabet, Symbol, SymbolKey};
use crate::types::GlyphosError;

/// Description of one applied structural mutation, returned so dependents
/// can be updated explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyChange {
    /// A state joined the model.
    StateAdded(Symbol),
    /// A state left the model.
    StateRemoved(Symbol),
    /// A transition joined the topology.
    TransitionCreated(Transition),
    /// A transition left the topology.
    TransitionDestroyed(Transition),
}

#[derive(Debug)]
struct StateEntry {
    state: State,
    successors: Vec<Symbol>,
    predecessors: Vec<Symbol>,
    weights: SimpleDistribution,
}

/// A directed graph of states with per-state transition distributions.
#[derive(Debug)]
pub struct MarkovModel {
    name: String,
    heads: usize,
    emission_alphabet: Alphabet,
    magical: MagicalState,
    order: Vec<Symbol>,
    entries: BTreeMap<SymbolKey, StateEntry>,
    state_alphabet: Alphabet,
    frozen: bool,
}

impl MarkovModel {
    /// Create a model over an emission alphabet. The registry supplies the
    /// shared sentinel for `heads`, which becomes the model's first state.
    pub fn new(
        registry: &mut AlphabetRegistry,
        name: impl Into<String>,
        heads: usize,
        emission_alphabet: Alphabet,
    ) -> Self {
        let name = name.into();
        let magical = registry.magical_state(heads);
        let state_alphabet = Alphabet::simple(format!("{name} states"), [])
            .expect("an empty alphabet is always valid");
        let mut model = MarkovModel {
            name,
            heads,
            emission_alphabet,
            magical: magical.clone(),
            order: Vec::new(),
            entries: BTreeMap::new(),
            state_alphabet,
            frozen: false,
        };
        model
            .add_state(State::Magical(magical))
            .expect("a fresh model accepts its own sentinel");
        model
    }

    /// The model's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parallel input heads.
    pub fn heads(&self) -> usize {
        self.heads
    }

    /// The alphabet emitting states emit over.
    pub fn emission_alphabet(&self) -> &Alphabet {
        &self.emission_alphabet
    }

    /// The closed set of state symbols, as an alphabet.
    pub fn state_alphabet(&self) -> &Alphabet {
        &self.state_alphabet
    }

    /// The model's shared sentinel state.
    pub fn magical_state(&self) -> &MagicalState {
        &self.magical
    }

    /// Whether structural mutation has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freeze the topology. Further structural mutations are rejected with
    /// a `ChangeRejected` error; weights may still be replaced or trained.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// The states, in insertion order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.order.iter().map(|symbol| &self.entry(symbol).state)
    }

    /// The state owning a symbol.
    pub fn state(&self, symbol: &Symbol) -> Result<&State, GlyphosError> {
        Ok(&self.checked_entry(symbol)?.state)
    }

    /// The state with a given name, if any.
    pub fn state_named(&self, name: &str) -> Option<&State> {
        self.states().find(|state| state.name() == name)
    }

    fn checked_entry(&self, symbol: &Symbol) -> Result<&StateEntry, GlyphosError> {
        self.entries.get(symbol.key()).ok_or_else(|| {
            GlyphosError::IllegalSymbol(format!(
                "{} is not a state of model {}",
                symbol.name(),
                self.name
            ))
        })
    }

    /// Entry of a symbol already validated as a state. A missing entry at
    /// this point means the state alphabet and the adjacency tables went
    /// out of step, which the mutation paths make impossible.
    fn entry(&self, symbol: &Symbol) -> &StateEntry {
        self.entries
            .get(symbol.key())
            .expect("state alphabet and adjacency tables agree")
    }

    fn rejected_when_frozen(&self) -> Result<(), GlyphosError> {
        if self.frozen {
            Err(GlyphosError::ChangeRejected(format!(
                "model {} is frozen",
                self.name
            )))
        } else {
            Ok(())
        }
    }

    fn rebuild_state_alphabet(&mut self) {
        let members: Vec<Symbol> = self.order.iter().cloned().collect();
        self.state_alphabet = Alphabet::simple(format!("{} states", self.name), members)
            .expect("state symbols are atomic");
    }

    fn rebuild_weights(&mut self, symbol: &Symbol) {
        let entry = self
            .entries
            .get_mut(symbol.key())
            .expect("state alphabet and adjacency tables agree");
        let alphabet = Alphabet::simple(
            format!("transitions from {}", symbol.name()),
            entry.successors.iter().cloned(),
        )
        .expect("state symbols are atomic");
        entry.weights = entry.weights.rebuilt_over(&alphabet);
    }

    /// Add a state.
    ///
    /// Fails on: a frozen model; a sentinel other than the model's own; a
    /// symbol identity already present; a head-count disagreeing with the
    /// model's.
    pub fn add_state(&mut self, state: State) -> Result<TopologyChange, GlyphosError> {
        self.rejected_when_frozen()?;
        if let State::Magical(magical) = &state {
            if magical != &self.magical {
                return Err(GlyphosError::IllegalSymbol(format!(
                    "cannot add a sentinel state other than model {}'s own",
                    self.name
                )));
            }
        }
        let symbol = state.symbol().clone();
        if self.entries.contains_key(symbol.key()) {
            return Err(GlyphosError::IllegalSymbol(format!(
                "model {} already contains {}",
                self.name,
                symbol.name()
            )));
        }
        if let Some(state_heads) = state.heads() {
            if state_heads != self.heads {
                return Err(GlyphosError::IllegalSymbol(format!(
                    "model {} has {} heads but state {} has {}",
                    self.name,
                    self.heads,
                    symbol.name(),
                    state_heads
                )));
            }
        }
        if let State::Emission(emission) = &state {
            if emission.distribution().alphabet() != &self.emission_alphabet {
                return Err(GlyphosError::IllegalAlphabet(format!(
                    "state {} emits over {} but model {} emits over {}",
                    symbol.name(),
                    emission.distribution().alphabet().name(),
                    self.name,
                    self.emission_alphabet.name()
                )));
            }
        }

        let empty = Alphabet::simple(format!("transitions from {}", symbol.name()), [])
            .expect("an empty alphabet is always valid");
        self.entries.insert(
            symbol.key().clone(),
            StateEntry {
                state,
                successors: Vec::new(),
                predecessors: Vec::new(),
                weights: SimpleDistribution::new(&empty),
            },
        );
        self.order.push(symbol.clone());
        self.rebuild_state_alphabet();
        Ok(TopologyChange::StateAdded(symbol))
    }

    /// Remove a state. Fails while the state has any incoming or outgoing
    /// transition; the sentinel can never be removed.
    pub fn remove_state(&mut self, symbol: &Symbol) -> Result<TopologyChange, GlyphosError> {
        self.rejected_when_frozen()?;
        let entry = self.checked_entry(symbol)?;
        if matches!(entry.state, State::Magical(_)) {
            return Err(GlyphosError::IllegalSymbol(format!(
                "the sentinel state cannot be removed from model {}",
                self.name
            )));
        }
        if let Some(successor) = entry.successors.first() {
            return Err(GlyphosError::IllegalTransition {
                from: symbol.name().to_string(),
                to: successor.name().to_string(),
                reason: "destroy all transitions from a state before removing it".to_string(),
            });
        }
        if let Some(predecessor) = entry.predecessors.first() {
            return Err(GlyphosError::IllegalTransition {
                from: predecessor.name().to_string(),
                to: symbol.name().to_string(),
                reason: "destroy all transitions to a state before removing it".to_string(),
            });
        }

        self.entries.remove(symbol.key());
        self.order.retain(|member| member != symbol);
        self.rebuild_state_alphabet();
        Ok(TopologyChange::StateRemoved(symbol.clone()))
    }

    /// Create a transition between two states of the model. Duplicates are
    /// rejected. On success the source state's transition distribution is
    /// rebuilt over its extended successor alphabet (the new successor
    /// starts at weight zero).
    pub fn create_transition(
        &mut self,
        from: &Symbol,
        to: &Symbol,
    ) -> Result<TopologyChange, GlyphosError> {
        self.rejected_when_frozen()?;
        self.checked_entry(to)?;
        let from_entry = self.checked_entry(from)?;
        if from_entry.successors.iter().any(|successor| successor == to) {
            return Err(GlyphosError::ChangeRejected(format!(
                "transition already exists: {} -> {}",
                from.name(),
                to.name()
            )));
        }

        self.entries
            .get_mut(from.key())
            .expect("validated above")
            .successors
            .push(to.clone());
        self.entries
            .get_mut(to.key())
            .expect("validated above")
            .predecessors
            .push(from.clone());
        self.rebuild_weights(from);
        Ok(TopologyChange::TransitionCreated(Transition {
            from: from.clone(),
            to: to.clone(),
        }))
    }

    /// Destroy a transition. Fails unless the transition exists and its
    /// current weight is exactly zero, so probability mass is never lost
    /// silently.
    pub fn destroy_transition(
        &mut self,
        from: &Symbol,
        to: &Symbol,
    ) -> Result<TopologyChange, GlyphosError> {
        self.rejected_when_frozen()?;
        self.checked_entry(to)?;
        let from_entry = self.checked_entry(from)?;
        if !from_entry.successors.iter().any(|successor| successor == to) {
            return Err(GlyphosError::ChangeRejected(format!(
                "transition does not exist: {} -> {}",
                from.name(),
                to.name()
            )));
        }
        let weight = from_entry.weights.weight(to)?;
        if weight != 0.0 {
            return Err(GlyphosError::ChangeRejected(format!(
                "cannot destroy transition {} -> {} while its weight is {weight}",
                from.name(),
                to.name()
            )));
        }

        self.entries
            .get_mut(from.key())
            .expect("validated above")
            .successors
            .retain(|successor| successor != to);
        self.entries
            .get_mut(to.key())
            .expect("validated above")
            .predecessors
            .retain(|predecessor| predecessor != from);
        self.rebuild_weights(from);
        Ok(TopologyChange::TransitionDestroyed(Transition {
            from: from.clone(),
            to: to.clone(),
        }))
    }

    /// Whether a transition is part of the topology.
    pub fn contains_transition(&self, from: &Symbol, to: &Symbol) -> Result<bool, GlyphosError> {
        self.checked_entry(to)?;
        Ok(self
            .checked_entry(from)?
            .successors
            .iter()
            .any(|successor| successor == to))
    }

    /// The legal successors of a state.
    pub fn transitions_from(&self, from: &Symbol) -> Result<&[Symbol], GlyphosError> {
        Ok(&self.checked_entry(from)?.successors)
    }

    /// The known predecessors of a state.
    pub fn transitions_to(&self, to: &Symbol) -> Result<&[Symbol], GlyphosError> {
        Ok(&self.checked_entry(to)?.predecessors)
    }

    /// The transition distribution of a state: a distribution over the
    /// finite alphabet of its legal successors.
    pub fn weights(&self, from: &Symbol) -> Result<&SimpleDistribution, GlyphosError> {
        Ok(&self.checked_entry(from)?.weights)
    }

    /// The transition distribution, mutably (to set weights).
    pub fn weights_mut(
        &mut self,
        from: &Symbol,
    ) -> Result<&mut SimpleDistribution, GlyphosError> {
        self.checked_entry(from)?;
        Ok(&mut self
            .entries
            .get_mut(from.key())
            .expect("validated above")
            .weights)
    }

    /// Replace a state's transition distribution. The replacement must be
    /// over the state's current successor alphabet (obtain it from
    /// `weights(state).alphabet()`).
    pub fn set_weights(
        &mut self,
        from: &Symbol,
        distribution: SimpleDistribution,
    ) -> Result<(), GlyphosError> {
        let entry = self.checked_entry(from)?;
        if distribution.alphabet() != entry.weights.alphabet() {
            return Err(GlyphosError::IllegalAlphabet(format!(
                "distribution is over {} but the transitions from {} form {}",
                distribution.alphabet().name(),
                from.name(),
                entry.weights.alphabet().name()
            )));
        }
        self.entries
            .get_mut(from.key())
            .expect("validated above")
            .weights = distribution;
        Ok(())
    }

    /// The emission distribution of a state, `None` for silent states and
    /// the sentinel.
    pub fn emission_distribution(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<&dyn Distribution>, GlyphosError> {
        Ok(self.checked_entry(symbol)?.state.emission_distribution())
    }

    /// Register every transition distribution and every emission
    /// distribution with a training context.
    pub fn register_with_trainer(&self, context: &mut TrainingContext) {
        for symbol in &self.order {
            let entry = self.entry(symbol);
            entry.weights.register_with_trainer(context);
            if let State::Emission(emission) = &entry.state {
                emission.distribution().register_with_trainer(context);
            }
        }
    }

    /// Route one weight update into the model: transition distributions
    /// first, then emission distributions. Returns whether it was consumed.
    pub fn apply_update(&mut self, update: &WeightUpdate) -> Result<bool, GlyphosError> {
        for entry in self.entries.values_mut() {
            if entry.weights.apply_update(update)? {
                return Ok(true);
            }
            if let State::Emission(emission) = &mut entry.state {
                if emission.distribution_mut().apply_update(update)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Apply a whole training batch; updates belonging to other owners are
    /// left alone.
    pub fn apply_updates(&mut self, updates: &[WeightUpdate]) -> Result<(), GlyphosError> {
        for update in updates {
            self.apply_update(update)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WEIGHT_TOLERANCE;
    use crate::dist::SimpleDistribution;
    use crate::model::{DotState, EmissionState, ModelState};
    use std::sync::Arc;

    fn model_over_dna() -> (AlphabetRegistry, MarkovModel, Alphabet) {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let model = MarkovModel::new(&mut registry, "test", 1, dna.clone());
        (registry, model, dna)
    }

    fn emission_state(name: &str, alphabet: &Alphabet) -> State {
        State::Emission(EmissionState::new(
            name,
            vec![1],
            Box::new(SimpleDistribution::new(alphabet)),
        ))
    }

    #[test]
    fn test_new_model_contains_only_the_sentinel() {
        let (_, model, _) = model_over_dna();
        assert_eq!(model.states().count(), 1);
        assert_eq!(model.state_alphabet().len(), 1);
        let magic = model.magical_state().symbol().clone();
        assert!(model.transitions_from(&magic).unwrap().is_empty());
    }

    #[test]
    fn test_models_share_the_sentinel_per_head_count() {
        let (mut registry, model, dna) = model_over_dna();
        let second = MarkovModel::new(&mut registry, "other", 1, dna);
        assert_eq!(model.magical_state(), second.magical_state());
    }

    #[test]
    fn test_add_state_and_transition() {
        let (_, mut model, dna) = model_over_dna();
        let change = model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = match change {
            TopologyChange::StateAdded(symbol) => symbol,
            other => panic!("unexpected change {other:?}"),
        };
        let magic = model.magical_state().symbol().clone();

        model.create_transition(&magic, &s1).unwrap();
        model.create_transition(&s1, &magic).unwrap();
        assert!(model.contains_transition(&magic, &s1).unwrap());
        assert_eq!(model.transitions_from(&magic).unwrap(), &[s1.clone()]);
        assert_eq!(model.transitions_to(&magic).unwrap(), &[s1.clone()]);
        assert_eq!(model.weights(&magic).unwrap().alphabet().len(), 1);
    }

    #[test]
    fn test_duplicate_transition_is_rejected() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();

        model.create_transition(&magic, &s1).unwrap();
        assert!(matches!(
            model.create_transition(&magic, &s1),
            Err(GlyphosError::ChangeRejected(_))
        ));
    }

    #[test]
    fn test_transition_needs_member_states() {
        let (_, mut model, _) = model_over_dna();
        let magic = model.magical_state().symbol().clone();
        let stranger = Symbol::atomic("elsewhere");
        assert!(matches!(
            model.create_transition(&magic, &stranger),
            Err(GlyphosError::IllegalSymbol(_))
        ));
    }

    #[test]
    fn test_destroy_requires_zero_weight() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();
        model.create_transition(&magic, &s1).unwrap();

        model
            .weights_mut(&magic)
            .unwrap()
            .set_weight(&s1, 1.0)
            .unwrap();
        assert!(matches!(
            model.destroy_transition(&magic, &s1),
            Err(GlyphosError::ChangeRejected(_))
        ));

        model
            .weights_mut(&magic)
            .unwrap()
            .set_weight(&s1, 0.0)
            .unwrap();
        model.destroy_transition(&magic, &s1).unwrap();
        assert!(!model.contains_transition(&magic, &s1).unwrap());
    }

    #[test]
    fn test_destroying_a_missing_transition_is_rejected() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();
        assert!(matches!(
            model.destroy_transition(&magic, &s1),
            Err(GlyphosError::ChangeRejected(_))
        ));
    }

    #[test]
    fn test_remove_state_requires_no_transitions() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();
        model.create_transition(&magic, &s1).unwrap();

        assert!(matches!(
            model.remove_state(&s1),
            Err(GlyphosError::IllegalTransition { .. })
        ));

        model.destroy_transition(&magic, &s1).unwrap();
        model.remove_state(&s1).unwrap();
        assert_eq!(model.states().count(), 1);
    }

    #[test]
    fn test_the_sentinel_cannot_be_removed() {
        let (_, mut model, _) = model_over_dna();
        let magic = model.magical_state().symbol().clone();
        assert!(matches!(
            model.remove_state(&magic),
            Err(GlyphosError::IllegalSymbol(_))
        ));
    }

    #[test]
    fn test_foreign_sentinel_is_rejected() {
        let (mut registry, mut model, _) = model_over_dna();
        let foreign = registry.magical_state(2);
        assert!(matches!(
            model.add_state(State::Magical(foreign)),
            Err(GlyphosError::IllegalSymbol(_))
        ));
    }

    #[test]
    fn test_head_count_mismatch_is_rejected() {
        let (_, mut model, dna) = model_over_dna();
        let two_headed = State::Emission(EmissionState::new(
            "pair",
            vec![1, 1],
            Box::new(SimpleDistribution::new(&dna)),
        ));
        assert!(matches!(
            model.add_state(two_headed),
            Err(GlyphosError::IllegalSymbol(_))
        ));
    }

    #[test]
    fn test_embedded_model_head_count_is_checked() {
        let (mut registry, mut model, dna) = model_over_dna();
        let inner = MarkovModel::new(&mut registry, "inner", 2, dna.clone());
        let embedded = State::Model(ModelState::new("sub", Arc::new(inner)));
        assert!(matches!(
            model.add_state(embedded),
            Err(GlyphosError::IllegalSymbol(_))
        ));

        let matching = MarkovModel::new(&mut registry, "inner1", 1, dna);
        let embedded = State::Model(ModelState::new("sub1", Arc::new(matching)));
        assert!(model.add_state(embedded).is_ok());
    }

    #[test]
    fn test_emission_alphabet_mismatch_is_rejected() {
        let (mut registry, mut model, _) = model_over_dna();
        let rna = registry.alphabet_for_name("RNA").unwrap();
        assert!(matches!(
            model.add_state(emission_state("r1", &rna)),
            Err(GlyphosError::IllegalAlphabet(_))
        ));
    }

    #[test]
    fn test_dot_states_skip_the_head_check() {
        let (_, mut model, _) = model_over_dna();
        assert!(model.add_state(State::Dot(DotState::new("quiet"))).is_ok());
    }

    #[test]
    fn test_frozen_model_rejects_structural_mutation() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();
        model.freeze();

        assert!(matches!(
            model.create_transition(&magic, &s1),
            Err(GlyphosError::ChangeRejected(_))
        ));
        assert!(matches!(
            model.add_state(emission_state("s2", &dna)),
            Err(GlyphosError::ChangeRejected(_))
        ));
        assert!(matches!(
            model.remove_state(&s1),
            Err(GlyphosError::ChangeRejected(_))
        ));
    }

    #[test]
    fn test_rebuild_preserves_surviving_transition_weights() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        model.add_state(emission_state("s2", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let s2 = model.state_named("s2").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();

        model.create_transition(&magic, &s1).unwrap();
        model
            .weights_mut(&magic)
            .unwrap()
            .set_weight(&s1, 1.0)
            .unwrap();
        model.create_transition(&magic, &s2).unwrap();

        let weights = model.weights(&magic).unwrap();
        assert!((weights.weight(&s1).unwrap() - 1.0).abs() < WEIGHT_TOLERANCE);
        assert_eq!(weights.weight(&s2).unwrap(), 0.0);
    }

    #[test]
    fn test_set_weights_checks_the_alphabet() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();
        model.create_transition(&magic, &s1).unwrap();

        let wrong = SimpleDistribution::new(&dna);
        assert!(matches!(
            model.set_weights(&magic, wrong),
            Err(GlyphosError::IllegalAlphabet(_))
        ));

        let successors = model.weights(&magic).unwrap().alphabet().clone();
        let mut replacement = SimpleDistribution::new(&successors);
        replacement.set_weight(&s1, 1.0).unwrap();
        assert!(model.set_weights(&magic, replacement).is_ok());
    }

    #[test]
    fn test_emission_distribution_exposure() {
        let (_, mut model, dna) = model_over_dna();
        model.add_state(emission_state("s1", &dna)).unwrap();
        let s1 = model.state_named("s1").unwrap().symbol().clone();
        let magic = model.magical_state().symbol().clone();

        assert!(model.emission_distribution(&s1).unwrap().is_some());
        assert!(model.emission_distribution(&magic).unwrap().is_none());
    }
}
