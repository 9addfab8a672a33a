//! The fuzzy Unicode trie matcher, `TrieAddressFinder<V>`.
//!
//! An arena trie: nodes live in a flat `Vec<Node>`, children are addressed
//! by index rather than by pointer, so there are no `Rc`/`RefCell` cycles
//! and cloning a walk position is just copying a `usize`. Grounded on the
//! `common_prefix_search` shape of a prefix-trie dictionary lookup (returns
//! `(depth, value)` pairs) generalized with virtual-suffix and fuzzy-step
//! support neither a compiled double-array trie nor a plain prefix map can
//! express once built.

use std::collections::HashMap;

use crate::char_node::CharChain;
use crate::error::GeocoderErrorKind;
use crate::GeocoderResult;

/// Dictionary row types opt into trie result ordering by exposing whether
/// they carry a residence-address flag; everything else orders equally.
pub trait TrieValue {
    fn rsdt_addr_flg(&self) -> Option<bool> {
        None
    }
}

#[derive(Default)]
struct Node {
    children: HashMap<char, usize>,
    /// Entry indices terminating exactly at this node. Multiple values per
    /// key are allowed, represented as a list at the terminal.
    terminals: Vec<usize>,
}

struct Entry<V> {
    key: String,
    value: V,
    seq: usize,
}

pub struct FindParams<'a> {
    pub target: &'a CharChain,
    pub extra_challenges: &'a [char],
    pub partial_matches: bool,
    pub fuzzy: Option<char>,
}

pub struct TrieMatch<'a, V> {
    pub info: &'a V,
    pub depth: usize,
    pub unmatched: CharChain,
}

pub struct TrieAddressFinder<V> {
    nodes: Vec<Node>,
    entries: Vec<Entry<V>>,
}

impl<V> Default for TrieAddressFinder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TrieAddressFinder<V> {
    pub fn new() -> Self {
        TrieAddressFinder {
            nodes: vec![Node::default()],
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insertion is commutative for distinct keys: the resulting trie is the
    /// same regardless of append order, since each key walks to the same
    /// node chain independent of what else has been inserted.
    pub fn append(&mut self, key: &str, value: V) {
        let mut cur = 0usize;
        for ch in key.chars() {
            cur = match self.nodes[cur].children.get(&ch) {
                Some(&idx) => idx,
                None => {
                    self.nodes.push(Node::default());
                    let idx = self.nodes.len() - 1;
                    self.nodes[cur].children.insert(ch, idx);
                    idx
                }
            };
        }
        let seq = self.entries.len();
        self.entries.push(Entry {
            key: key.to_string(),
            value,
            seq,
        });
        self.nodes[cur].terminals.push(seq);
    }

    fn walk(
        &self,
        target: &CharChain,
        node: usize,
        pos: usize,
        fuzzy: Option<char>,
        fuzzy_used: bool,
        extra_challenges: &[char],
        hits: &mut Vec<(usize, usize, usize)>, // (node, depth, virtual_len)
    ) {
        let node_ref = &self.nodes[node];
        if !node_ref.terminals.is_empty() {
            let next_char = if pos < target.char_len() {
                Some(target.node_at(pos).ch)
            } else {
                None
            };
            let can_continue = next_char
                .map(|c| node_ref.children.contains_key(&c))
                .unwrap_or(false);
            if can_continue {
                // Still a valid partial-match terminal; the walk continues
                // deeper below.
                hits.push((node, pos, 0));
            } else if let Some(c) = next_char {
                if extra_challenges.contains(&c) {
                    hits.push((node, pos, 1));
                } else {
                    hits.push((node, pos, 0));
                }
            } else {
                hits.push((node, pos, 0));
            }
        }

        let Some(t) = (if pos < target.char_len() {
            Some(target.node_at(pos).ch)
        } else {
            None
        }) else {
            return;
        };

        let mut taken = Vec::new();
        if let Some(&child) = node_ref.children.get(&t) {
            self.walk(target, child, pos + 1, fuzzy, fuzzy_used, extra_challenges, hits);
            taken.push(child);
        }
        if !fuzzy_used {
            if let Some(fc) = fuzzy {
                if t == fc {
                    for (&_c, &child) in node_ref.children.iter() {
                        if taken.contains(&child) {
                            continue;
                        }
                        self.walk(target, child, pos + 1, fuzzy, true, extra_challenges, hits);
                    }
                }
            }
        }
    }
}

impl<V: TrieValue> TrieAddressFinder<V> {
    /// Returns the set of maximal matches of `params.target`'s prefix
    /// against the trie (component design §4.1). Errs with
    /// [`GeocoderErrorKind::Corrupt`] if a node's terminal list references an
    /// entry index outside `self.entries` — `append` never produces this,
    /// so it signals the index itself broke rather than a lookup miss.
    pub fn find(&self, params: FindParams<'_>) -> GeocoderResult<Vec<TrieMatch<'_, V>>> {
        let mut hits = Vec::new();
        self.walk(
            params.target,
            0,
            0,
            params.fuzzy,
            false,
            params.extra_challenges,
            &mut hits,
        );

        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let kept: Vec<(usize, usize, usize)> = if params.partial_matches {
            hits
        } else {
            let max_depth = hits.iter().map(|&(_, d, _)| d).max().unwrap();
            hits.into_iter().filter(|&(_, d, _)| d == max_depth).collect()
        };

        let mut matches = Vec::new();
        for (node, depth, virtual_len) in kept {
            for &entry_idx in &self.nodes[node].terminals {
                let entry = self.entries.get(entry_idx).ok_or_else(|| {
                    GeocoderErrorKind::Corrupt.with_error(anyhow::anyhow!(
                        "trie node {node} terminal referenced entry {entry_idx}, but the trie only holds {} entries",
                        self.entries.len()
                    ))
                })?;
                matches.push((
                    depth,
                    virtual_len,
                    entry.value.rsdt_addr_flg().is_none(),
                    entry.key.clone(),
                    entry.seq,
                    TrieMatch {
                        info: &entry.value,
                        depth,
                        unmatched: params.target.tail(depth + virtual_len),
                    },
                ));
            }
        }

        // depth desc, then shorter virtual extension wins, then
        // rsdt_addr_flg non-null preferred, then lexicographic key, then
        // insertion order stable.
        matches.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
                .then(a.3.cmp(&b.3))
                .then(a.4.cmp(&b.4))
        });

        Ok(matches.into_iter().map(|t| t.5).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl TrieValue for &'static str {}
    impl TrieValue for i32 {}

    #[test]
    fn finds_exact_key() {
        let mut trie = TrieAddressFinder::new();
        trie.append("千代田区", "chiyoda");
        let target = CharChain::from_str("千代田区丸の内");
        let matches = trie
            .find(FindParams {
                target: &target,
                extra_challenges: &[],
                partial_matches: false,
                fuzzy: None,
            })
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].depth, 4);
        assert_eq!(*matches[0].info, "chiyoda");
        assert_eq!(matches[0].unmatched.as_string(), "丸の内");
    }

    #[test]
    fn virtual_suffix_does_not_count_against_depth() {
        let mut trie = TrieAddressFinder::new();
        trie.append("千代田", "chiyoda");
        let target = CharChain::from_str("千代田区丸の内");
        let matches = trie
            .find(FindParams {
                target: &target,
                extra_challenges: &['区', '町', '市', '村'],
                partial_matches: false,
                fuzzy: None,
            })
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].depth, 3);
        assert_eq!(matches[0].unmatched.as_string(), "丸の内");
    }

    #[test]
    fn partial_matches_returns_all_terminals_on_the_walk() {
        let mut trie = TrieAddressFinder::new();
        trie.append("千代", "chiyo");
        trie.append("千代田", "chiyoda");
        let target = CharChain::from_str("千代田区");
        let matches = trie
            .find(FindParams {
                target: &target,
                extra_challenges: &[],
                partial_matches: true,
                fuzzy: None,
            })
            .unwrap();
        assert_eq!(matches.len(), 2);
        let deepest_only = trie
            .find(FindParams {
                target: &target,
                extra_challenges: &[],
                partial_matches: false,
                fuzzy: None,
            })
            .unwrap();
        assert_eq!(deepest_only.len(), 1);
        assert_eq!(*deepest_only[0].info, "chiyoda");
    }

    #[test]
    fn fuzzy_wildcard_matches_any_single_character() {
        let mut trie = TrieAddressFinder::new();
        trie.append("千代田区", "chiyoda");
        let target = CharChain::from_str("千代?区");
        let matches = trie
            .find(FindParams {
                target: &target,
                extra_challenges: &[],
                partial_matches: false,
                fuzzy: Some('?'),
            })
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].depth, 4);
    }

    #[test]
    fn insertion_order_does_not_affect_result_set() {
        let mut a = TrieAddressFinder::new();
        a.append("千代田区", 1);
        a.append("千代田市", 2);

        let mut b = TrieAddressFinder::new();
        b.append("千代田市", 2);
        b.append("千代田区", 1);

        let target = CharChain::from_str("千代田区");
        let a_matches = a
            .find(FindParams {
                target: &target,
                extra_challenges: &[],
                partial_matches: false,
                fuzzy: None,
            })
            .unwrap();
        let b_matches = b
            .find(FindParams {
                target: &target,
                extra_challenges: &[],
                partial_matches: false,
                fuzzy: None,
            })
            .unwrap();
        assert_eq!(a_matches.len(), b_matches.len());
        assert_eq!(*a_matches[0].info, *b_matches[0].info);
    }
}
