//! States and transitions of Markov-model graphs.
//!
//! A [`State`] is a node of a [`MarkovModel`](crate::model::MarkovModel).
//! The closed union covers the four node kinds:
//!
//! - [`MagicalState`] — the shared sentinel that starts and ends every
//!   model. One instance exists per head count, cached by the registry, so
//!   a model's start and end are the identical object; callers distinguish
//!   position by context.
//! - [`EmissionState`] — owns a distribution over an emission alphabet and
//!   an advance vector saying how many observed positions each of the
//!   model's parallel input heads consumes when the state is taken.
//! - [`DotState`] — a silent state emitting nothing.
//! - [`ModelState`] — a frozen sub-model embedded as a single state.
//!
//! Every state carries a unique atomic [`Symbol`] used as its member symbol
//! in the model's state alphabet.

mod markov;

pub use markov::{MarkovModel, TopologyChange};

use std::fmt;
use std::sync::Arc;

use crate::constants::MAGICAL_STATE_NAME;
use crate::dist::Distribution;
use crate::symbol::{Alphabet, Symbol};

/// The shared start/end sentinel. Emits the reserved sentinel symbol over
/// the single-symbol sentinel alphabet; each head advances by one position.
#[derive(Debug, Clone)]
pub struct MagicalState {
    data: Arc<MagicalData>,
}

#[derive(Debug)]
struct MagicalData {
    symbol: Symbol,
    advance: Vec<usize>,
    emitted: Symbol,
    emission_alphabet: Alphabet,
}

impl MagicalState {
    /// Built only by the registry's per-head-count cache.
    pub(crate) fn new(heads: usize, emitted: Symbol, emission_alphabet: Alphabet) -> Self {
        MagicalState {
            data: Arc::new(MagicalData {
                symbol: Symbol::atomic(MAGICAL_STATE_NAME),
                advance: vec![1; heads],
                emitted,
                emission_alphabet,
            }),
        }
    }

    /// The state's member symbol.
    pub fn symbol(&self) -> &Symbol {
        &self.data.symbol
    }

    /// The advance vector: one position per head.
    pub fn advance(&self) -> &[usize] {
        &self.data.advance
    }

    /// Number of input heads.
    pub fn heads(&self) -> usize {
        self.data.advance.len()
    }

    /// The reserved symbol this state emits.
    pub fn emitted_symbol(&self) -> &Symbol {
        &self.data.emitted
    }

    /// The single-symbol alphabet the sentinel emits over.
    pub fn emission_alphabet(&self) -> &Alphabet {
        &self.data.emission_alphabet
    }
}

impl PartialEq for MagicalState {
    fn eq(&self, other: &Self) -> bool {
        self.data.symbol.id() == other.data.symbol.id()
    }
}

impl Eq for MagicalState {}

/// A state that emits symbols from a distribution over an emission
/// alphabet.
#[derive(Debug)]
pub struct EmissionState {
    symbol: Symbol,
    advance: Vec<usize>,
    distribution: Box<dyn Distribution>,
}

impl EmissionState {
    /// Create an emission state. `advance` says how many observed positions
    /// each input head consumes when this state is taken; its length is the
    /// state's head count.
    pub fn new(
        name: impl Into<String>,
        advance: Vec<usize>,
        distribution: Box<dyn Distribution>,
    ) -> Self {
        EmissionState {
            symbol: Symbol::atomic(name.into()),
            advance,
            distribution,
        }
    }

    /// The state's member symbol.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The state's name.
    pub fn name(&self) -> &str {
        self.symbol.name()
    }

    /// The advance vector.
    pub fn advance(&self) -> &[usize] {
        &self.advance
    }

    /// Number of input heads.
    pub fn heads(&self) -> usize {
        self.advance.len()
    }

    /// The emission distribution.
    pub fn distribution(&self) -> &dyn Distribution {
        &*self.distribution
    }

    /// The emission distribution, mutably (for weight updates).
    pub fn distribution_mut(&mut self) -> &mut dyn Distribution {
        &mut *self.distribution
    }
}

/// A silent state: no emission, no advance.
#[derive(Debug)]
pub struct DotState {
    symbol: Symbol,
}

impl DotState {
    /// Create a silent state.
    pub fn new(name: impl Into<String>) -> Self {
        DotState {
            symbol: Symbol::atomic(name.into()),
        }
    }

    /// The state's member symbol.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The state's name.
    pub fn name(&self) -> &str {
        self.symbol.name()
    }
}

/// A frozen sub-model embedded as a single state of an outer model.
#[derive(Debug)]
pub struct ModelState {
    symbol: Symbol,
    model: Arc<MarkovModel>,
}

impl ModelState {
    /// Embed a model. Sharing the model through `Arc` keeps it immutable
    /// for as long as it is embedded.
    pub fn new(name: impl Into<String>, model: Arc<MarkovModel>) -> Self {
        ModelState {
            symbol: Symbol::atomic(name.into()),
            model,
        }
    }

    /// The state's member symbol.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The embedded model.
    pub fn model(&self) -> &MarkovModel {
        &self.model
    }

    /// Head count, taken from the embedded model.
    pub fn heads(&self) -> usize {
        self.model.heads()
    }
}

/// The closed set of state kinds.
#[derive(Debug)]
pub enum State {
    /// The shared start/end sentinel.
    Magical(MagicalState),
    /// An emitting state.
    Emission(EmissionState),
    /// A silent state.
    Dot(DotState),
    /// An embedded sub-model.
    Model(ModelState),
}

impl State {
    /// The state's member symbol in the model's state alphabet.
    pub fn symbol(&self) -> &Symbol {
        match self {
            State::Magical(state) => state.symbol(),
            State::Emission(state) => state.symbol(),
            State::Dot(state) => state.symbol(),
            State::Model(state) => state.symbol(),
        }
    }

    /// The state's name.
    pub fn name(&self) -> &str {
        self.symbol().name()
    }

    /// Head count for kinds that consume input; `None` for silent states.
    pub fn heads(&self) -> Option<usize> {
        match self {
            State::Magical(state) => Some(state.heads()),
            State::Emission(state) => Some(state.heads()),
            State::Dot(_) => None,
            State::Model(state) => Some(state.heads()),
        }
    }

    /// The emission distribution, for states that emit.
    pub fn emission_distribution(&self) -> Option<&dyn Distribution> {
        match self {
            State::Emission(state) => Some(state.distribution()),
            _ => None,
        }
    }
}

/// An ordered pair of state symbols that is a member of a model's topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Symbol of the source state.
    pub from: Symbol,
    /// Symbol of the destination state.
    pub to: Symbol,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from.name(), self.to.name())
    }
}
