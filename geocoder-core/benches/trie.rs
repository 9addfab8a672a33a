use criterion::{criterion_group, criterion_main, Criterion};
use geocoder_core::{CharChain, FindParams, TrieAddressFinder, TrieValue};

#[derive(Clone)]
struct Town {
    #[allow(dead_code)]
    name: &'static str,
}

impl TrieValue for Town {}

fn sample_trie() -> TrieAddressFinder<Town> {
    let mut trie = TrieAddressFinder::new();
    for name in [
        "千代田区", "中央区", "港区", "新宿区", "文京区", "台東区", "墨田区", "江東区", "品川区",
        "目黒区", "大田区", "世田谷区", "渋谷区", "中野区", "杉並区", "豊島区", "北区", "荒川区",
        "板橋区", "練馬区", "足立区", "葛飾区", "江戸川区",
    ] {
        trie.append(name, Town { name });
    }
    trie
}

fn bench_find_exact(c: &mut Criterion) {
    let trie = sample_trie();
    let target = CharChain::from_str("千代田区丸の内一丁目");

    c.bench_function("bench-trie-find-exact", |b| {
        b.iter(|| {
            trie.find(FindParams {
                target: &target,
                extra_challenges: &['区', '町', '市', '村'],
                partial_matches: false,
                fuzzy: None,
            })
        })
    });
}

fn bench_find_fuzzy(c: &mut Criterion) {
    let trie = sample_trie();
    let target = CharChain::from_str("千代田?丸の内一丁目");

    c.bench_function("bench-trie-find-fuzzy", |b| {
        b.iter(|| {
            trie.find(FindParams {
                target: &target,
                extra_challenges: &['区', '町', '市', '村'],
                partial_matches: true,
                fuzzy: Some('?'),
            })
        })
    });
}

criterion_group!(benches, bench_find_exact, bench_find_fuzzy);
criterion_main!(benches);
