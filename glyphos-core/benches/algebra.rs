use criterion::{Criterion, black_box, criterion_group, criterion_main};

use glyphos_core::AlphabetRegistry;
use glyphos_core::symbol::{Alphabet, SuffixTree, Symbol};

fn bench_cross_product_construction(c: &mut Criterion) {
    c.bench_function("cross_product_eager_dna_pair", |b| {
        b.iter(|| {
            let mut registry = AlphabetRegistry::core();
            let dna = registry.alphabet_for_name("DNA").unwrap();
            black_box(registry.cross_product(vec![dna.clone(), dna]).unwrap())
        })
    });

    c.bench_function("cross_product_cached_lookup", |b| {
        let mut registry = AlphabetRegistry::core();
        let dna = registry.alphabet_for_name("DNA").unwrap();
        registry
            .cross_product(vec![dna.clone(), dna.clone()])
            .unwrap();
        b.iter(|| {
            black_box(
                registry
                    .cross_product(vec![dna.clone(), dna.clone()])
                    .unwrap(),
            )
        })
    });
}

fn bench_ambiguity_factorization(c: &mut Criterion) {
    let mut registry = AlphabetRegistry::core();
    let dna = registry.alphabet_for_name("DNA").unwrap();
    let pair = registry
        .cross_product(vec![dna.clone(), dna.clone()])
        .unwrap();
    let bases = dna.symbols();

    // {a,g} x {c,t}: factorizes into one ambiguity symbol per column.
    let members: Vec<Symbol> = [(0, 1), (0, 3), (2, 1), (2, 3)]
        .iter()
        .map(|&(first, second)| {
            pair.symbol_for(&[bases[first].clone(), bases[second].clone()])
                .unwrap()
        })
        .collect();

    c.bench_function("ambiguity_factorize_2x2", |b| {
        b.iter(|| black_box(pair.ambiguity(&members).unwrap()))
    });
}

fn bench_suffix_tree(c: &mut Criterion) {
    let mut registry = AlphabetRegistry::core();
    let dna = registry.alphabet_for_name("DNA").unwrap();
    let tokenization = registry.tokenization(&dna, "token").unwrap();
    let sequence = tokenization
        .parse(&"acgtgctagctagcatcgatgca".repeat(50))
        .unwrap();

    c.bench_function("suffix_tree_window_8", |b| {
        b.iter(|| {
            let mut tree = SuffixTree::new(&dna);
            tree.add_symbols(black_box(&sequence), 8);
            black_box(tree.frequency(8))
        })
    });
}

fn bench_simple_alphabet_membership(c: &mut Criterion) {
    let symbols: Vec<Symbol> = (0..64).map(|i| Symbol::atomic(format!("s{i}"))).collect();
    let alphabet = Alphabet::simple("bench", symbols.clone()).unwrap();
    c.bench_function("simple_alphabet_contains", |b| {
        b.iter(|| {
            for symbol in &symbols {
                black_box(alphabet.contains(symbol));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_cross_product_construction,
    bench_ambiguity_factorization,
    bench_suffix_tree,
    bench_simple_alphabet_membership
);
criterion_main!(benches);
