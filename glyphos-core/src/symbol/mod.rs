//! Symbols and the operations that combine them.
//!
//! A [`Symbol`] is an immutable, cheaply clonable value: a name, an
//! annotation map, and a closed [`SymbolKind`]. The four kinds cover the
//! whole algebra:
//!
//! - **Atomic** — an indivisible member of a leaf alphabet, compared by
//!   interned identity.
//! - **Tuple** — an ordered tuple of component symbols, the building block
//!   of cross-product alphabets. A tuple whose every slot is atomic is
//!   itself atomic; a tuple with ambiguous slots stands for the Cartesian
//!   expansion of its slots.
//! - **Ambiguity** — an un-factored bag of atomic symbols it matches.
//! - **Gap** — the unique symbol matching the empty set. Because nothing
//!   matches it, every alphabet's match space contains it.
//!
//! Tuple and ambiguity symbols compare structurally; two independently
//! constructed symbols with the same match set are equal. A symbol's match
//! set never changes after construction.

mod alphabet;
mod index;
mod packing;
mod suffix_tree;
mod tokenization;

pub use alphabet::Alphabet;
pub use index::AlphabetIndex;
pub use packing::{NoAmbiguityPacking, Packing};
pub use suffix_tree::{SuffixNode, SuffixTree};
pub use tokenization::Tokenization;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::GAP_SYMBOL_NAME;

/// Free-form key/value annotations carried by symbols and alphabets.
pub type Annotation = BTreeMap<String, String>;

/// An ordered set of symbols, the representation used for match sets.
pub type SymbolSet = BTreeSet<Symbol>;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

fn next_symbol_id() -> u64 {
    NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Canonical comparison key of a symbol.
///
/// Atomic symbols are keyed by their interned id; composite symbols are
/// keyed by the keys of what they are built from, which is what makes
/// structural equality work for independently constructed composites.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymbolKey {
    /// Key of the gap symbol; all gaps share it.
    Gap,
    /// Key of an interned atomic symbol.
    Atomic(u64),
    /// Keys of a tuple's components, in slot order.
    Tuple(Vec<SymbolKey>),
    /// Sorted keys of an ambiguity symbol's match set.
    Ambiguity(Vec<SymbolKey>),
}

/// The closed set of symbol kinds.
#[derive(Debug)]
pub enum SymbolKind {
    /// Indivisible leaf-alphabet member.
    Atomic,
    /// Ordered tuple over cross-product factors. `expansion` holds the
    /// atomic tuples matched when any slot is ambiguous, and is `None` when
    /// the tuple is itself atomic.
    Tuple {
        /// The per-slot component symbols.
        components: Vec<Symbol>,
        /// Cartesian expansion of the slots, absent for atomic tuples.
        expansion: Option<SymbolSet>,
    },
    /// Un-factored set of atomic symbols.
    Ambiguity {
        /// The atomic symbols this symbol stands for.
        matches: SymbolSet,
    },
    /// Matches nothing; member of every match space.
    Gap,
}

#[derive(Debug)]
struct SymbolData {
    id: u64,
    name: String,
    annotation: Annotation,
    kind: SymbolKind,
    key: SymbolKey,
}

/// An immutable symbol value. Cloning is cheap (shared data).
#[derive(Debug, Clone)]
pub struct Symbol {
    data: Arc<SymbolData>,
}

impl Symbol {
    /// Create a fresh atomic symbol. Each call mints a distinct identity.
    pub fn atomic(name: impl Into<String>) -> Self {
        Self::atomic_annotated(name, Annotation::new())
    }

    /// Create a fresh atomic symbol carrying an annotation map.
    pub fn atomic_annotated(name: impl Into<String>, annotation: Annotation) -> Self {
        let id = next_symbol_id();
        Symbol {
            data: Arc::new(SymbolData {
                id,
                name: name.into(),
                annotation,
                kind: SymbolKind::Atomic,
                key: SymbolKey::Atomic(id),
            }),
        }
    }

    /// The gap symbol. All gap symbols compare equal, so callers may treat
    /// the return value as the unique gap.
    pub fn gap() -> Self {
        Symbol {
            data: Arc::new(SymbolData {
                id: next_symbol_id(),
                name: GAP_SYMBOL_NAME.to_string(),
                annotation: Annotation::new(),
                kind: SymbolKind::Gap,
                key: SymbolKey::Gap,
            }),
        }
    }

    /// Build a tuple symbol over the given components.
    ///
    /// `expansion` must be `None` exactly when every component is atomic.
    pub(crate) fn tuple(components: Vec<Symbol>, expansion: Option<SymbolSet>) -> Self {
        debug_assert_eq!(
            expansion.is_none(),
            components.iter().all(Symbol::is_atomic),
            "tuple expansion must be present iff a slot is ambiguous"
        );
        let name = format!(
            "({})",
            components
                .iter()
                .map(Symbol::name)
                .collect::<Vec<_>>()
                .join(" ")
        );
        let key = SymbolKey::Tuple(components.iter().map(|c| c.key().clone()).collect());
        Symbol {
            data: Arc::new(SymbolData {
                id: next_symbol_id(),
                name,
                annotation: Annotation::new(),
                kind: SymbolKind::Tuple {
                    components,
                    expansion,
                },
                key,
            }),
        }
    }

    /// Build an un-factored ambiguity symbol over a non-empty match set.
    pub(crate) fn ambiguity(matches: SymbolSet) -> Self {
        debug_assert!(!matches.is_empty(), "empty ambiguity is the gap symbol");
        let name = format!(
            "[{}]",
            matches
                .iter()
                .map(Symbol::name)
                .collect::<Vec<_>>()
                .join(" ")
        );
        let key = SymbolKey::Ambiguity(matches.iter().map(|m| m.key().clone()).collect());
        Symbol {
            data: Arc::new(SymbolData {
                id: next_symbol_id(),
                name,
                annotation: Annotation::new(),
                kind: SymbolKind::Ambiguity { matches },
                key,
            }),
        }
    }

    /// Process-unique id of this particular symbol instance.
    pub fn id(&self) -> u64 {
        self.data.id
    }

    /// The symbol's display name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The symbol's annotation map.
    pub fn annotation(&self) -> &Annotation {
        &self.data.annotation
    }

    /// The symbol's kind.
    pub fn kind(&self) -> &SymbolKind {
        &self.data.kind
    }

    /// Canonical comparison key.
    pub fn key(&self) -> &SymbolKey {
        &self.data.key
    }

    /// Whether this symbol is atomic: an indivisible leaf symbol, or a
    /// tuple whose every slot is atomic.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self.data.kind,
            SymbolKind::Atomic
                | SymbolKind::Tuple {
                    expansion: None,
                    ..
                }
        )
    }

    /// Whether this is a gap symbol.
    pub fn is_gap(&self) -> bool {
        matches!(self.data.kind, SymbolKind::Gap)
    }

    /// Tuple components, if this symbol is a tuple.
    pub fn components(&self) -> Option<&[Symbol]> {
        match &self.data.kind {
            SymbolKind::Tuple { components, .. } => Some(components),
            _ => None,
        }
    }

    /// Number of slots the symbol spans: 1 for leaf symbols, the component
    /// count for tuples, the members' common slot count for ambiguities and
    /// 0 for the gap.
    pub fn arity(&self) -> usize {
        match &self.data.kind {
            SymbolKind::Atomic => 1,
            SymbolKind::Tuple { components, .. } => components.len(),
            SymbolKind::Ambiguity { matches } => matches
                .iter()
                .next()
                .map(Symbol::arity)
                .unwrap_or(0),
            SymbolKind::Gap => 0,
        }
    }

    /// The set of atomic symbols this symbol matches. Atomic symbols match
    /// themselves; the gap matches nothing.
    pub fn match_set(&self) -> SymbolSet {
        match &self.data.kind {
            SymbolKind::Atomic => std::iter::once(self.clone()).collect(),
            SymbolKind::Tuple {
                expansion: None, ..
            } => std::iter::once(self.clone()).collect(),
            SymbolKind::Tuple {
                expansion: Some(expansion),
                ..
            } => expansion.clone(),
            SymbolKind::Ambiguity { matches } => matches.clone(),
            SymbolKind::Gap => SymbolSet::new(),
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Symbol {}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(other.key())
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
