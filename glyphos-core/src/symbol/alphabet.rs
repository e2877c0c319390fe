//! Alphabets: finite symbol sets and cross products of them.
//!
//! An [`Alphabet`] is an immutable, shared collection of atomic symbols.
//! Simple alphabets hold an explicit member list. Cross products come in two
//! flavours chosen by the registry: an eager one that enumerates every tuple
//! up front (small products) and a sparse one that creates tuple symbols on
//! demand behind a lock (large products). Either way, membership of a tuple
//! is decided structurally, slot by slot.
//!
//! The ambiguity constructor and the factorization algorithm live here
//! because both need the alphabet's factor columns.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::symbol::{Annotation, Symbol, SymbolKey, SymbolKind, SymbolSet};
use crate::types::GlyphosError;

static NEXT_ALPHABET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
enum AlphabetKind {
    /// Explicit finite set of atomic symbols.
    Simple {
        symbols: Vec<Symbol>,
        members: HashSet<SymbolKey>,
    },
    /// Cross product with every tuple enumerated up front.
    CrossEager {
        factors: Vec<Alphabet>,
        symbols: Vec<Symbol>,
        by_components: HashMap<Vec<SymbolKey>, usize>,
    },
    /// Cross product whose tuples are interned on demand.
    CrossSparse {
        factors: Vec<Alphabet>,
        interned: Mutex<HashMap<Vec<SymbolKey>, Symbol>>,
    },
}

#[derive(Debug)]
struct AlphabetData {
    id: u64,
    name: String,
    annotation: Annotation,
    kind: AlphabetKind,
}

/// A named, immutable alphabet. Cloning is cheap (shared data); equality is
/// instance identity, which for registry-built cross products coincides with
/// structural equality thanks to the flyweight cache.
#[derive(Debug, Clone)]
pub struct Alphabet {
    data: Arc<AlphabetData>,
}

impl Alphabet {
    /// Build a simple alphabet from atomic member symbols. Duplicate members
    /// are collapsed; a non-atomic member is an error, since ambiguity
    /// symbols are derived from an alphabet rather than stored in one.
    pub fn simple(
        name: impl Into<String>,
        symbols: impl IntoIterator<Item = Symbol>,
    ) -> Result<Self, GlyphosError> {
        Self::simple_annotated(name, symbols, Annotation::new())
    }

    /// As [`Alphabet::simple`], carrying an annotation map.
    pub fn simple_annotated(
        name: impl Into<String>,
        symbols: impl IntoIterator<Item = Symbol>,
        annotation: Annotation,
    ) -> Result<Self, GlyphosError> {
        let name = name.into();
        let mut members = HashSet::new();
        let mut ordered = Vec::new();
        for symbol in symbols {
            if !symbol.is_atomic() {
                return Err(GlyphosError::IllegalSymbol(format!(
                    "only atomic symbols can be members of alphabet {name:?}, not {}",
                    symbol.name()
                )));
            }
            if members.insert(symbol.key().clone()) {
                ordered.push(symbol);
            }
        }
        Ok(Alphabet {
            data: Arc::new(AlphabetData {
                id: NEXT_ALPHABET_ID.fetch_add(1, Ordering::Relaxed),
                name,
                annotation,
                kind: AlphabetKind::Simple {
                    symbols: ordered,
                    members,
                },
            }),
        })
    }

    /// Build an eagerly enumerated cross product. The caller (the registry)
    /// is responsible for checking the combination count beforehand.
    pub(crate) fn cross_eager(name: String, factors: Vec<Alphabet>) -> Self {
        let factor_symbols: Vec<Vec<Symbol>> = factors.iter().map(Alphabet::symbols).collect();
        let total: usize = factor_symbols.iter().map(Vec::len).product();
        let mut symbols = Vec::with_capacity(total);
        let mut by_components = HashMap::with_capacity(total);
        let mut odometer = vec![0usize; factors.len()];
        if factor_symbols.iter().all(|f| !f.is_empty()) {
            loop {
                let components: Vec<Symbol> = odometer
                    .iter()
                    .zip(&factor_symbols)
                    .map(|(&i, f)| f[i].clone())
                    .collect();
                let keys: Vec<SymbolKey> =
                    components.iter().map(|c| c.key().clone()).collect();
                by_components.insert(keys, symbols.len());
                symbols.push(Symbol::tuple(components, None));

                // Advance the rightmost column first so enumeration order is
                // deterministic in factor order.
                let mut column = factors.len();
                loop {
                    if column == 0 {
                        break;
                    }
                    column -= 1;
                    odometer[column] += 1;
                    if odometer[column] < factor_symbols[column].len() {
                        break;
                    }
                    odometer[column] = 0;
                }
                if odometer.iter().all(|&i| i == 0) {
                    break;
                }
            }
        }
        Alphabet {
            data: Arc::new(AlphabetData {
                id: NEXT_ALPHABET_ID.fetch_add(1, Ordering::Relaxed),
                name,
                annotation: Annotation::new(),
                kind: AlphabetKind::CrossEager {
                    factors,
                    symbols,
                    by_components,
                },
            }),
        }
    }

    /// Build a sparse cross product; tuples are interned as they are asked
    /// for.
    pub(crate) fn cross_sparse(name: String, factors: Vec<Alphabet>) -> Self {
        Alphabet {
            data: Arc::new(AlphabetData {
                id: NEXT_ALPHABET_ID.fetch_add(1, Ordering::Relaxed),
                name,
                annotation: Annotation::new(),
                kind: AlphabetKind::CrossSparse {
                    factors,
                    interned: Mutex::new(HashMap::new()),
                },
            }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.data.id
    }

    /// The alphabet's name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The alphabet's annotation map.
    pub fn annotation(&self) -> &Annotation {
        &self.data.annotation
    }

    /// Number of atomic members. For a sparse cross product this is the
    /// product of the factor sizes, computed without enumerating.
    pub fn len(&self) -> usize {
        match &self.data.kind {
            AlphabetKind::Simple { symbols, .. } => symbols.len(),
            AlphabetKind::CrossEager { symbols, .. } => symbols.len(),
            AlphabetKind::CrossSparse { factors, .. } => factors
                .iter()
                .map(Alphabet::len)
                .fold(1usize, usize::saturating_mul),
        }
    }

    /// Whether the alphabet has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The ordered factor list of a cross product, `None` for leaf
    /// alphabets.
    pub fn factors(&self) -> Option<&[Alphabet]> {
        match &self.data.kind {
            AlphabetKind::Simple { .. } => None,
            AlphabetKind::CrossEager { factors, .. }
            | AlphabetKind::CrossSparse { factors, .. } => Some(factors),
        }
    }

    /// All atomic members, in deterministic order.
    ///
    /// For a sparse cross product this materializes the full enumeration;
    /// callers that only need membership tests should use
    /// [`Alphabet::contains`] instead.
    pub fn symbols(&self) -> Vec<Symbol> {
        match &self.data.kind {
            AlphabetKind::Simple { symbols, .. } => symbols.clone(),
            AlphabetKind::CrossEager { symbols, .. } => symbols.clone(),
            AlphabetKind::CrossSparse { factors, .. } => {
                let factor_symbols: Vec<Vec<Symbol>> =
                    factors.iter().map(Alphabet::symbols).collect();
                if factor_symbols.iter().any(Vec::is_empty) {
                    return Vec::new();
                }
                let total: usize = factor_symbols.iter().map(Vec::len).product();
                let mut out = Vec::with_capacity(total);
                let mut odometer = vec![0usize; factors.len()];
                loop {
                    let components: Vec<Symbol> = odometer
                        .iter()
                        .zip(&factor_symbols)
                        .map(|(&i, f)| f[i].clone())
                        .collect();
                    let symbol = self
                        .symbol_for(&components)
                        .expect("enumerated components are members of their factors");
                    out.push(symbol);

                    let mut column = factors.len();
                    loop {
                        if column == 0 {
                            break;
                        }
                        column -= 1;
                        odometer[column] += 1;
                        if odometer[column] < factor_symbols[column].len() {
                            break;
                        }
                        odometer[column] = 0;
                    }
                    if odometer.iter().all(|&i| i == 0) {
                        break;
                    }
                }
                out
            }
        }
    }

    /// Membership test over the alphabet's match space: atomic symbols by
    /// identity, tuples slot by slot, ambiguity symbols iff every matched
    /// atomic is a member. The gap symbol is a member of every alphabet's
    /// match space.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        match symbol.kind() {
            SymbolKind::Gap => true,
            SymbolKind::Atomic => match &self.data.kind {
                AlphabetKind::Simple { members, .. } => members.contains(symbol.key()),
                _ => false,
            },
            SymbolKind::Tuple {
                components,
                expansion: None,
            } => match &self.data.kind {
                AlphabetKind::Simple { members, .. } => members.contains(symbol.key()),
                AlphabetKind::CrossEager { factors, .. }
                | AlphabetKind::CrossSparse { factors, .. } => {
                    components.len() == factors.len()
                        && components
                            .iter()
                            .zip(factors)
                            .all(|(component, factor)| factor.contains(component))
                }
            },
            SymbolKind::Tuple {
                expansion: Some(expansion),
                ..
            } => expansion.iter().all(|atom| self.contains(atom)),
            SymbolKind::Ambiguity { matches } => {
                matches.iter().all(|atom| self.contains(atom))
            }
        }
    }

    /// As [`Alphabet::contains`], but returning an error naming the symbol
    /// and the alphabet.
    pub fn validate(&self, symbol: &Symbol) -> Result<(), GlyphosError> {
        if self.contains(symbol) {
            Ok(())
        } else {
            Err(GlyphosError::IllegalSymbol(format!(
                "symbol {} is not a member of alphabet {}",
                symbol.name(),
                self.name()
            )))
        }
    }

    /// The canonical symbol for a list of per-slot components.
    ///
    /// For a cross product with one component per factor this returns the
    /// interned atomic tuple when every slot is atomic, and a structural
    /// basis tuple (with its Cartesian expansion precomputed) when any slot
    /// is ambiguous. A simple alphabet accepts a single-element list and
    /// returns the member itself.
    pub fn symbol_for(&self, components: &[Symbol]) -> Result<Symbol, GlyphosError> {
        let factors = match &self.data.kind {
            AlphabetKind::Simple { .. } => {
                return match components {
                    [single] => {
                        self.validate(single)?;
                        Ok(single.clone())
                    }
                    _ => Err(GlyphosError::IllegalSymbol(format!(
                        "alphabet {} has one slot but {} components were supplied",
                        self.name(),
                        components.len()
                    ))),
                };
            }
            AlphabetKind::CrossEager { factors, .. }
            | AlphabetKind::CrossSparse { factors, .. } => factors,
        };

        if components.len() != factors.len() {
            return Err(GlyphosError::IllegalSymbol(format!(
                "alphabet {} has {} slots but {} components were supplied",
                self.name(),
                factors.len(),
                components.len()
            )));
        }
        for (component, factor) in components.iter().zip(factors) {
            factor.validate(component)?;
        }

        if components.iter().all(Symbol::is_atomic) {
            let keys: Vec<SymbolKey> = components.iter().map(|c| c.key().clone()).collect();
            match &self.data.kind {
                AlphabetKind::CrossEager {
                    symbols,
                    by_components,
                    ..
                } => {
                    let index = by_components
                        .get(&keys)
                        .copied()
                        .expect("validated components missing from the eager enumeration");
                    Ok(symbols[index].clone())
                }
                AlphabetKind::CrossSparse { interned, .. } => {
                    let mut interned = interned
                        .lock()
                        .expect("sparse cross-product intern lock poisoned");
                    Ok(interned
                        .entry(keys)
                        .or_insert_with(|| Symbol::tuple(components.to_vec(), None))
                        .clone())
                }
                AlphabetKind::Simple { .. } => unreachable!("handled above"),
            }
        } else {
            // At least one ambiguous slot: expand the Cartesian product of
            // the slot match sets into canonical atomic tuples.
            let slot_matches: Vec<Vec<Symbol>> = components
                .iter()
                .map(|c| c.match_set().into_iter().collect())
                .collect();
            let mut expansion = SymbolSet::new();
            if slot_matches.iter().all(|m| !m.is_empty()) {
                let mut odometer = vec![0usize; slot_matches.len()];
                loop {
                    let combo: Vec<Symbol> = odometer
                        .iter()
                        .zip(&slot_matches)
                        .map(|(&i, m)| m[i].clone())
                        .collect();
                    expansion.insert(self.symbol_for(&combo)?);

                    let mut column = slot_matches.len();
                    loop {
                        if column == 0 {
                            break;
                        }
                        column -= 1;
                        odometer[column] += 1;
                        if odometer[column] < slot_matches[column].len() {
                            break;
                        }
                        odometer[column] = 0;
                    }
                    if odometer.iter().all(|&i| i == 0) {
                        break;
                    }
                }
            }
            Ok(Symbol::tuple(components.to_vec(), Some(expansion)))
        }
    }

    /// The canonical ambiguity symbol for a set of member symbols.
    ///
    /// The empty set yields the gap symbol and a singleton yields its sole
    /// member. Larger sets over a cross product are factorized into a tuple
    /// of per-column ambiguity symbols when the set is exactly the Cartesian
    /// product of its columns, and fall back to an un-factored bag
    /// otherwise. Member symbols with inconsistent slot counts are an error.
    pub fn ambiguity(&self, symbols: &[Symbol]) -> Result<Symbol, GlyphosError> {
        let mut atoms = SymbolSet::new();
        let mut arity: Option<usize> = None;
        for symbol in symbols {
            for atom in symbol.match_set() {
                let slots = atom.arity();
                match arity {
                    None => arity = Some(slots),
                    Some(expected) if expected != slots => {
                        return Err(GlyphosError::IllegalSymbol(format!(
                            "cannot build an ambiguity symbol from members with \
                             inconsistent slot counts ({expected} and {slots})"
                        )));
                    }
                    Some(_) => {}
                }
                self.validate(&atom)?;
                atoms.insert(atom);
            }
        }

        if atoms.is_empty() {
            return Ok(Symbol::gap());
        }
        if atoms.len() == 1 {
            return Ok(atoms.into_iter().next().expect("set has one element"));
        }
        if arity == Some(1) {
            return Ok(Symbol::ambiguity(atoms));
        }
        match self.factorize(&atoms)? {
            Some(columns) => Ok(Symbol::tuple(columns, Some(atoms))),
            None => Ok(Symbol::ambiguity(atoms)),
        }
    }

    /// Try to represent a set of atomic tuples as one per-column ambiguity
    /// symbol per factor. Succeeds only when the set is exactly the
    /// Cartesian product of its columns, verified by dividing the set size
    /// by each column's distinct-symbol count and requiring an exact, total
    /// reduction to 1.
    fn factorize(&self, atoms: &SymbolSet) -> Result<Option<Vec<Symbol>>, GlyphosError> {
        let Some(factors) = self.factors() else {
            return Ok(None);
        };
        let mut remaining = atoms.len();
        let mut columns = Vec::with_capacity(factors.len());
        for (column, factor) in factors.iter().enumerate() {
            let column_symbols: SymbolSet = atoms
                .iter()
                .map(|atom| {
                    atom.components()
                        .expect("atomic members of a cross product are tuples")[column]
                        .clone()
                })
                .collect();
            let distinct = column_symbols.len();
            if remaining % distinct != 0 {
                return Ok(None);
            }
            remaining /= distinct;
            let column_symbols: Vec<Symbol> = column_symbols.into_iter().collect();
            columns.push(factor.ambiguity(&column_symbols)?);
        }
        if remaining != 1 {
            return Ok(None);
        }
        Ok(Some(columns))
    }
}

impl PartialEq for Alphabet {
    fn eq(&self, other: &Self) -> bool {
        self.data.id == other.data.id
    }
}

impl Eq for Alphabet {}

impl std::hash::Hash for Alphabet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.data.id.hash(state);
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
