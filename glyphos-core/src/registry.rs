//! The alphabet registry: well-known names, flyweight caches, and the
//! declarative bootstrap.
//!
//! A [`AlphabetRegistry`] owns every process-wide cache the algebra needs:
//! the name -> alphabet and name -> symbol tables, the cross-product
//! flyweight cache, per-alphabet indices, and the per-head-count sentinel
//! states of the model layer. It is an explicit object injected by the
//! application, not global state; mutating operations take `&mut self`, so
//! two threads can never race to build two distinct objects for the same
//! logical key.
//!
//! ## Declarative bootstrap
//!
//! Well-known alphabets are described declaratively — symbols with
//! descriptions, alphabets with optional parent inheritance, and named
//! character tokenizations — and loaded once at startup with
//! [`AlphabetRegistry::load_alphabets`]. [`AlphabetRegistry::core`] loads
//! the embedded definitions of DNA, RNA and PROTEIN.
//!
//! ## Composite names
//!
//! Every cross product built here is nameable as `(A x B)` and that name
//! parses back to the identical cached object:
//!
//! ```
//! use glyphos_core::registry::AlphabetRegistry;
//!
//! let mut registry = AlphabetRegistry::core();
//! let dna = registry.alphabet_for_name("DNA").unwrap();
//! let pair = registry.cross_product(vec![dna.clone(), dna]).unwrap();
//! let reparsed = registry.alphabet_for_name("(DNA x DNA)").unwrap();
//! assert_eq!(pair, reparsed);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::constants::{
    CROSS_PRODUCT_SEPARATOR, EAGER_CROSS_PRODUCT_LIMIT, MAGICAL_ALPHABET_NAME, MAGICAL_STATE_NAME,
};
use crate::model::MagicalState;
use crate::symbol::{Alphabet, AlphabetIndex, Annotation, Symbol, Tokenization};
use crate::types::GlyphosError;

const CORE_ALPHABET_DEFINITIONS: &str = include_str!("alphabets.json");

/// Declarative description of symbols and alphabets, the deserialized form
/// consumed by [`AlphabetRegistry::load_alphabets`].
#[derive(Debug, Deserialize)]
pub struct AlphabetDefinitions {
    /// Shared symbols that alphabet definitions may reference by name.
    #[serde(default)]
    pub symbols: Vec<SymbolDefinition>,
    /// The alphabets to install.
    #[serde(default)]
    pub alphabets: Vec<AlphabetDefinition>,
}

/// One symbol in a declarative definition.
#[derive(Debug, Deserialize)]
pub struct SymbolDefinition {
    /// The symbol's name.
    pub name: String,
    /// Optional description, stored in the symbol's annotation.
    #[serde(default)]
    pub description: Option<String>,
}

/// One alphabet in a declarative definition.
#[derive(Debug, Deserialize)]
pub struct AlphabetDefinition {
    /// The name the alphabet is registered under.
    pub name: String,
    /// Optional description, stored in the alphabet's annotation.
    #[serde(default)]
    pub description: Option<String>,
    /// Alphabet whose symbols this one inherits.
    #[serde(default)]
    pub parent: Option<String>,
    /// References to shared top-level symbols.
    #[serde(default)]
    pub symbol_refs: Vec<String>,
    /// Symbols defined inline, private to this alphabet.
    #[serde(default)]
    pub symbols: Vec<SymbolDefinition>,
    /// Character tokenizations of this alphabet.
    #[serde(default)]
    pub tokenizations: Vec<TokenizationDefinition>,
}

/// One tokenization in a declarative definition.
#[derive(Debug, Deserialize)]
pub struct TokenizationDefinition {
    /// The name the tokenization is looked up by.
    pub name: String,
    /// Whether character lookups are case sensitive.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Characters spelling single atomic symbols.
    #[serde(default)]
    pub atomic: Vec<AtomicMapping>,
    /// Characters spelling ambiguity sets; an empty set spells the gap.
    #[serde(default)]
    pub ambiguity: Vec<AmbiguityMapping>,
}

/// A character bound to one atomic symbol.
#[derive(Debug, Deserialize)]
pub struct AtomicMapping {
    /// The character.
    pub token: char,
    /// Name of the symbol it spells.
    pub symbol: String,
}

/// A character bound to the ambiguity symbol over a set of members.
#[derive(Debug, Deserialize)]
pub struct AmbiguityMapping {
    /// The character.
    pub token: char,
    /// Names of the matched symbols; empty for the gap.
    pub matches: Vec<String>,
}

/// Registry of well-known alphabets and symbols, plus the flyweight caches
/// of the algebra. See the module docs.
#[derive(Debug)]
pub struct AlphabetRegistry {
    alphabets: HashMap<String, Alphabet>,
    symbols: HashMap<String, Symbol>,
    cross_products: HashMap<Vec<u64>, Alphabet>,
    indices: HashMap<u64, Arc<AlphabetIndex>>,
    tokenizations: HashMap<(u64, String), Arc<Tokenization>>,
    gap: Symbol,
    magical_symbol: Symbol,
    magical_alphabet: Alphabet,
    magical_states: HashMap<usize, MagicalState>,
}

impl AlphabetRegistry {
    /// An empty registry: no named alphabets, caches primed with the gap
    /// symbol and the sentinel alphabet only.
    pub fn new() -> Self {
        let magical_symbol = Symbol::atomic(MAGICAL_STATE_NAME);
        let magical_alphabet =
            Alphabet::simple(MAGICAL_ALPHABET_NAME, vec![magical_symbol.clone()])
                .expect("the sentinel symbol is atomic");
        AlphabetRegistry {
            alphabets: HashMap::new(),
            symbols: HashMap::new(),
            cross_products: HashMap::new(),
            indices: HashMap::new(),
            tokenizations: HashMap::new(),
            gap: Symbol::gap(),
            magical_symbol,
            magical_alphabet,
            magical_states: HashMap::new(),
        }
    }

    /// A registry with the embedded core definitions (DNA, RNA, PROTEIN)
    /// installed.
    pub fn core() -> Self {
        let mut registry = Self::new();
        registry
            .load_alphabets(CORE_ALPHABET_DEFINITIONS)
            .expect("embedded alphabet definitions are well-formed");
        registry
    }

    /// The gap symbol.
    pub fn gap_symbol(&self) -> &Symbol {
        &self.gap
    }

    /// The reserved symbol every sentinel state emits.
    pub fn magical_symbol(&self) -> &Symbol {
        &self.magical_symbol
    }

    /// The single-symbol alphabet sentinel states emit over.
    pub fn magical_alphabet(&self) -> &Alphabet {
        &self.magical_alphabet
    }

    /// The shared sentinel state for a head count. All models of the same
    /// head arity share the identical instance.
    pub fn magical_state(&mut self, heads: usize) -> MagicalState {
        if let Some(state) = self.magical_states.get(&heads) {
            return state.clone();
        }
        let state = MagicalState::new(
            heads,
            self.magical_symbol.clone(),
            self.magical_alphabet.clone(),
        );
        self.magical_states.insert(heads, state.clone());
        state
    }

    /// Register an alphabet under a name. A later registration under the
    /// same name replaces the earlier one.
    pub fn register_alphabet(&mut self, name: impl Into<String>, alphabet: Alphabet) {
        self.alphabets.insert(name.into(), alphabet);
    }

    /// The alphabet registered under `name`. Bracketed composite names such
    /// as `(DNA x DNA)` are parsed and resolved through the cross-product
    /// cache, so the result is the identical flyweight instance every time.
    pub fn alphabet_for_name(&mut self, name: &str) -> Result<Alphabet, GlyphosError> {
        if let Some(alphabet) = self.alphabets.get(name) {
            return Ok(alphabet.clone());
        }
        let trimmed = name.trim();
        if trimmed.starts_with('(') && trimmed.ends_with(')') {
            self.parse_composite_name(trimmed)
        } else {
            Err(GlyphosError::UnknownName(name.to_string()))
        }
    }

    /// The shared symbol registered under `name` by the bootstrap.
    pub fn symbol_for_name(&self, name: &str) -> Result<Symbol, GlyphosError> {
        self.symbols
            .get(name)
            .cloned()
            .ok_or_else(|| GlyphosError::UnknownName(name.to_string()))
    }

    /// Iterate over every registered alphabet.
    pub fn alphabets(&self) -> impl Iterator<Item = &Alphabet> {
        self.alphabets.values()
    }

    /// The cross product of an ordered factor list.
    ///
    /// A singleton list yields its sole element unchanged. Otherwise the
    /// cached composite is returned when one exists; a new one is built
    /// eagerly under [`EAGER_CROSS_PRODUCT_LIMIT`] combinations and sparsely
    /// at or above it, then cached and registered under its composite name.
    /// Factor order matters: permuted lists yield distinct alphabets.
    pub fn cross_product(&mut self, factors: Vec<Alphabet>) -> Result<Alphabet, GlyphosError> {
        if factors.is_empty() {
            return Err(GlyphosError::IllegalAlphabet(
                "a cross product needs at least one factor".to_string(),
            ));
        }
        if factors.len() == 1 {
            return Ok(factors.into_iter().next().expect("one factor"));
        }
        let key: Vec<u64> = factors.iter().map(Alphabet::id).collect();
        if let Some(alphabet) = self.cross_products.get(&key) {
            return Ok(alphabet.clone());
        }

        let name = format!(
            "({})",
            factors
                .iter()
                .map(Alphabet::name)
                .collect::<Vec<_>>()
                .join(CROSS_PRODUCT_SEPARATOR)
        );
        let combinations = factors
            .iter()
            .map(Alphabet::len)
            .fold(1usize, usize::saturating_mul);
        let alphabet = if combinations < EAGER_CROSS_PRODUCT_LIMIT {
            Alphabet::cross_eager(name.clone(), factors)
        } else {
            Alphabet::cross_sparse(name.clone(), factors)
        };
        self.cross_products.insert(key, alphabet.clone());
        self.register_alphabet(name, alphabet.clone());
        Ok(alphabet)
    }

    /// Parse a bracketed, ` x `-separated composite name into the
    /// corresponding cross product. Brackets are matched by depth counting.
    fn parse_composite_name(&mut self, name: &str) -> Result<Alphabet, GlyphosError> {
        if !(name.starts_with('(') && name.ends_with(')')) {
            return Err(GlyphosError::Parse(format!(
                "{name:?} is not a bracketed cross-product name"
            )));
        }
        let inner = name[1..name.len() - 1].trim();
        let bytes = inner.as_bytes();
        let mut factors = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'(' {
                let mut depth = 1usize;
                let mut j = i + 1;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] {
                        b'(' => depth += 1,
                        b')' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return Err(GlyphosError::Parse(format!(
                        "could not find the matching bracket in {:?}",
                        &inner[i..]
                    )));
                }
                factors.push(self.alphabet_for_name(&inner[i..j])?);
                i = j;
            } else {
                match inner[i..].find(CROSS_PRODUCT_SEPARATOR) {
                    Some(offset) => {
                        let j = i + offset;
                        if i != j {
                            factors.push(self.alphabet_for_name(inner[i..j].trim())?);
                        }
                        i = j + CROSS_PRODUCT_SEPARATOR.len();
                    }
                    None => {
                        factors.push(self.alphabet_for_name(inner[i..].trim())?);
                        i = bytes.len();
                    }
                }
            }
        }
        if factors.is_empty() {
            return Err(GlyphosError::Parse(format!(
                "{name:?} names no factor alphabets"
            )));
        }
        self.cross_product(factors)
    }

    /// The cached index of an alphabet, built on first use.
    pub fn index(&mut self, alphabet: &Alphabet) -> Arc<AlphabetIndex> {
        self.indices
            .entry(alphabet.id())
            .or_insert_with(|| Arc::new(AlphabetIndex::new(alphabet)))
            .clone()
    }

    /// The named tokenization of an alphabet, installed by the bootstrap.
    pub fn tokenization(
        &self,
        alphabet: &Alphabet,
        name: &str,
    ) -> Result<Arc<Tokenization>, GlyphosError> {
        self.tokenizations
            .get(&(alphabet.id(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                GlyphosError::UnknownName(format!("{} tokenization of {}", name, alphabet.name()))
            })
    }

    /// Load declarative alphabet definitions from their JSON form.
    pub fn load_alphabets(&mut self, source: &str) -> Result<(), GlyphosError> {
        let definitions: AlphabetDefinitions = serde_json::from_str(source)
            .map_err(|error| GlyphosError::Parse(format!("invalid alphabet definitions: {error}")))?;
        self.install(definitions)
    }

    /// Install already-deserialized declarative definitions.
    pub fn install(&mut self, definitions: AlphabetDefinitions) -> Result<(), GlyphosError> {
        for definition in &definitions.symbols {
            if self.symbols.contains_key(&definition.name) {
                return Err(GlyphosError::Parse(format!(
                    "there is already a top-level symbol named {:?}",
                    definition.name
                )));
            }
            let symbol = new_symbol(definition);
            self.symbols.insert(definition.name.clone(), symbol);
        }

        for definition in &definitions.alphabets {
            self.install_alphabet(definition)?;
        }
        Ok(())
    }

    fn install_alphabet(&mut self, definition: &AlphabetDefinition) -> Result<(), GlyphosError> {
        // Local name scope: shared symbols overlaid with this alphabet's own.
        let mut local: HashMap<String, Symbol> = self.symbols.clone();
        let mut members: Vec<Symbol> = Vec::new();

        if let Some(parent_name) = &definition.parent {
            let parent = self
                .alphabets
                .get(parent_name)
                .ok_or_else(|| GlyphosError::UnknownName(parent_name.clone()))?;
            for symbol in parent.symbols() {
                local.insert(symbol.name().to_string(), symbol.clone());
                members.push(symbol);
            }
        }
        for reference in &definition.symbol_refs {
            let symbol = local.get(reference).cloned().ok_or_else(|| {
                GlyphosError::Parse(format!("reference to non-existent symbol {reference:?}"))
            })?;
            members.push(symbol);
        }
        for symbol_definition in &definition.symbols {
            let symbol = new_symbol(symbol_definition);
            local.insert(symbol_definition.name.clone(), symbol.clone());
            members.push(symbol);
        }

        let mut annotation = Annotation::new();
        if let Some(description) = &definition.description {
            annotation.insert("description".to_string(), description.clone());
        }
        let alphabet = Alphabet::simple_annotated(definition.name.clone(), members, annotation)?;

        for tokenization_definition in &definition.tokenizations {
            let mut tokenization = Tokenization::new(
                alphabet.clone(),
                tokenization_definition.case_sensitive,
            );
            for mapping in &tokenization_definition.atomic {
                let symbol = local.get(&mapping.symbol).cloned().ok_or_else(|| {
                    GlyphosError::Parse(format!(
                        "reference to non-existent symbol {:?}",
                        mapping.symbol
                    ))
                })?;
                tokenization.bind(mapping.token, symbol)?;
            }
            for mapping in &tokenization_definition.ambiguity {
                let matched: Vec<Symbol> = mapping
                    .matches
                    .iter()
                    .map(|name| {
                        local.get(name).cloned().ok_or_else(|| {
                            GlyphosError::Parse(format!(
                                "reference to non-existent symbol {name:?}"
                            ))
                        })
                    })
                    .collect::<Result<_, _>>()?;
                let symbol = alphabet.ambiguity(&matched)?;
                tokenization.bind(mapping.token, symbol)?;
            }
            self.tokenizations.insert(
                (alphabet.id(), tokenization_definition.name.clone()),
                Arc::new(tokenization),
            );
        }

        self.register_alphabet(definition.name.clone(), alphabet);
        Ok(())
    }
}

impl Default for AlphabetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn new_symbol(definition: &SymbolDefinition) -> Symbol {
    let mut annotation = Annotation::new();
    if let Some(description) = &definition.description {
        annotation.insert("description".to_string(), description.clone());
    }
    Symbol::atomic_annotated(definition.name.clone(), annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_alphabets_are_registered() {
        let mut registry = AlphabetRegistry::core();
        assert_eq!(registry.alphabet_for_name("DNA").unwrap().len(), 4);
        assert_eq!(registry.alphabet_for_name("RNA").unwrap().len(), 4);
        assert_eq!(registry.alphabet_for_name("PROTEIN").unwrap().len(), 20);
        assert!(registry.alphabet_for_name("KLINGON").is_err());
    }

    #[test]
    fn test_dna_and_rna_share_symbols() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let rna = registry.alphabet_for_name("RNA").unwrap();
        let adenine = registry.symbol_for_name("adenine").unwrap();
        assert!(dna.contains(&adenine));
        assert!(rna.contains(&adenine));
    }

    #[test]
    fn test_cross_product_is_a_flyweight() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let first = registry
            .cross_product(vec![dna.clone(), dna.clone()])
            .unwrap();
        let second = registry
            .cross_product(vec![dna.clone(), dna.clone()])
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_permuted_factors_are_distinct() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let rna = registry.alphabet_for_name("RNA").unwrap();
        let forward = registry
            .cross_product(vec![dna.clone(), rna.clone()])
            .unwrap();
        let backward = registry.cross_product(vec![rna, dna]).unwrap();
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_singleton_cross_product_is_the_factor() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let product = registry.cross_product(vec![dna.clone()]).unwrap();
        assert_eq!(product, dna);
    }

    #[test]
    fn test_composite_name_round_trip() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let pair = registry
            .cross_product(vec![dna.clone(), dna.clone()])
            .unwrap();
        assert_eq!(pair.name(), "(DNA x DNA)");
        let reparsed = registry.alphabet_for_name("(DNA x DNA)").unwrap();
        assert_eq!(pair, reparsed);
    }

    #[test]
    fn test_nested_composite_name() {
        let mut registry = AlphabetRegistry::core();
        let parsed = registry.alphabet_for_name("((DNA x DNA) x RNA)").unwrap();
        let factors = parsed.factors().unwrap();
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[0].name(), "(DNA x DNA)");
        assert_eq!(factors[1].name(), "RNA");
    }

    #[test]
    fn test_unbalanced_name_is_a_parse_error() {
        let mut registry = AlphabetRegistry::core();
        assert!(matches!(
            registry.alphabet_for_name("((DNA x DNA) x RNA"),
            Err(GlyphosError::UnknownName(_))
        ));
        assert!(matches!(
            registry.alphabet_for_name("((DNA x DNA x RNA)"),
            Err(GlyphosError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_leaf_name_is_an_error() {
        let mut registry = AlphabetRegistry::core();
        assert!(registry.alphabet_for_name("(DNA x KLINGON)").is_err());
    }

    #[test]
    fn test_large_product_goes_sparse_but_stays_cached() {
        let mut registry = AlphabetRegistry::core();
        let protein = registry.alphabet_for_name("PROTEIN").unwrap();
        // 20^3 = 8000 combinations, beyond the eager limit.
        let triple = registry
            .cross_product(vec![protein.clone(), protein.clone(), protein.clone()])
            .unwrap();
        assert_eq!(triple.len(), 8000);
        let again = registry
            .cross_product(vec![protein.clone(), protein.clone(), protein])
            .unwrap();
        assert_eq!(triple, again);
    }

    #[test]
    fn test_tokenization_parses_sequences() {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        let tokenization = registry.tokenization(&dna, "token").unwrap();
        let symbols = tokenization.parse("acgt").unwrap();
        assert_eq!(symbols.len(), 4);
        assert!(symbols.iter().all(|s| dna.contains(s)));

        let any = tokenization.parse_token('n').unwrap();
        assert_eq!(any.match_set().len(), 4);
        assert!(tokenization.parse_token('-').unwrap().is_gap());
    }

    #[test]
    fn test_magical_state_is_shared_per_head_count() {
        let mut registry = AlphabetRegistry::core();
        let one = registry.magical_state(1);
        let again = registry.magical_state(1);
        let two = registry.magical_state(2);
        assert_eq!(one.symbol().id(), again.symbol().id());
        assert_ne!(one.symbol().id(), two.symbol().id());
        assert_eq!(two.advance(), &[1, 1]);
    }

    #[test]
    fn test_duplicate_top_level_symbol_is_a_parse_error() {
        let mut registry = AlphabetRegistry::core();
        let result = registry.load_alphabets(r#"{ "symbols": [ { "name": "adenine" } ] }"#);
        assert!(matches!(result, Err(GlyphosError::Parse(_))));
    }

    #[test]
    fn test_parent_inheritance() {
        let mut registry = AlphabetRegistry::core();
        registry
            .load_alphabets(
                r#"{
                    "alphabets": [
                        {
                            "name": "DNA+",
                            "parent": "DNA",
                            "symbols": [ { "name": "inosine" } ]
                        }
                    ]
                }"#,
            )
            .unwrap();
        let extended = registry.alphabet_for_name("DNA+").unwrap();
        assert_eq!(extended.len(), 5);
        let adenine = registry.symbol_for_name("adenine").unwrap();
        assert!(extended.contains(&adenine));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let mut registry = AlphabetRegistry::new();
        assert!(matches!(
            registry.load_alphabets("{ not json"),
            Err(GlyphosError::Parse(_))
        ));
    }
}
