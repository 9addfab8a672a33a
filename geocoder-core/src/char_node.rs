//! A linked chain of characters with per-node provenance.
//!
//! Modeled as an arena (flat `Vec<CharNode>`) plus an index list, rather than
//! a doubly-linked `Rc<RefCell<_>>` chain: no cycles, and branching a chain
//! to speculate across several candidate trie matches is just cloning the
//! (small) index list while sharing the arena.

use std::rc::Rc;

use regex::Regex;

/// A single character together with where it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharNode {
    pub ch: char,
    /// Character index into the original input this node ultimately derives
    /// from, or `None` if the character was inserted by normalization
    /// (e.g. the hyphen `suffix_strip` introduces).
    pub origin: Option<usize>,
    /// True if this node did not exist in the original input.
    pub inserted: bool,
    /// True once a trie match has consumed this position.
    pub consumed: bool,
}

#[derive(Debug)]
struct Arena {
    nodes: Vec<CharNode>,
}

/// A non-destructive, provenance-preserving view over a run of [`CharNode`]s.
#[derive(Clone, Debug)]
pub struct CharChain {
    arena: Rc<Arena>,
    indices: Vec<usize>,
}

impl CharChain {
    pub fn from_str(s: &str) -> Self {
        let nodes: Vec<CharNode> = s
            .chars()
            .enumerate()
            .map(|(i, ch)| CharNode {
                ch,
                origin: Some(i),
                inserted: false,
                consumed: false,
            })
            .collect();
        let indices = (0..nodes.len()).collect();
        CharChain {
            arena: Rc::new(Arena { nodes }),
            indices,
        }
    }

    pub fn char_len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn node_at(&self, i: usize) -> CharNode {
        self.arena.nodes[self.indices[i]]
    }

    pub fn as_string(&self) -> String {
        self.indices.iter().map(|&i| self.arena.nodes[i].ch).collect()
    }

    /// The suffix starting at character position `depth`, sharing the
    /// underlying arena — cheap, and every surviving node still carries its
    /// original provenance.
    pub fn tail(&self, depth: usize) -> CharChain {
        let depth = depth.min(self.indices.len());
        CharChain {
            arena: Rc::clone(&self.arena),
            indices: self.indices[depth..].to_vec(),
        }
    }

    /// The prefix of length `depth`, sharing the underlying arena.
    pub fn prefix(&self, depth: usize) -> CharChain {
        let depth = depth.min(self.indices.len());
        CharChain {
            arena: Rc::clone(&self.arena),
            indices: self.indices[..depth].to_vec(),
        }
    }

    /// Non-destructive `replaceAll`: runs matching `re` are replaced by
    /// `replacement`, with `$1`-style capture references. Characters outside
    /// any match keep their original arena index (and therefore their
    /// provenance); replacement characters are appended to a fresh arena as
    /// inserted nodes with no origin.
    pub fn replace_all(&self, re: &Regex, replacement: &str) -> CharChain {
        let text = self.as_string();
        if !re.is_match(&text) {
            return self.clone();
        }

        // Map byte offsets in `text` to this chain's character positions.
        let mut byte_to_idx = Vec::with_capacity(text.len() + 1);
        let mut acc = 0usize;
        for (pos, ch) in text.char_indices() {
            while byte_to_idx.len() <= pos {
                byte_to_idx.push(acc);
            }
            let _ = ch;
            acc += 1;
        }
        byte_to_idx.push(acc);

        let mut new_nodes: Vec<CharNode> = self.arena.nodes.clone();
        let mut new_indices = Vec::with_capacity(self.indices.len());
        let mut last_byte = 0usize;

        for caps in re.captures_iter(&text) {
            let m = caps.get(0).expect("capture 0 always present");
            // Untouched run before this match keeps its original indices.
            let start_idx = byte_to_idx[last_byte];
            let end_idx = byte_to_idx[m.start()];
            for i in start_idx..end_idx {
                new_indices.push(self.indices[i]);
            }

            let mut expanded = String::new();
            caps.expand(replacement, &mut expanded);
            for ch in expanded.chars() {
                new_nodes.push(CharNode {
                    ch,
                    origin: None,
                    inserted: true,
                    consumed: false,
                });
                new_indices.push(new_nodes.len() - 1);
            }

            last_byte = m.end();
        }

        let tail_start = byte_to_idx[last_byte];
        for i in tail_start..self.indices.len() {
            new_indices.push(self.indices[i]);
        }

        CharChain {
            arena: Rc::new(Arena { nodes: new_nodes }),
            indices: new_indices,
        }
    }

    /// Marks the first `count` characters as consumed, returning the
    /// remaining (unmatched) tail. This is the shape the trie matcher's
    /// `unmatched` result takes: the matched prefix is dropped, and the
    /// survivors keep pointing back to their original input positions.
    pub fn consume(&self, count: usize) -> CharChain {
        self.tail(count)
    }

    /// Like [`CharChain::replace_all`], but the replacement for each match is
    /// computed from the matched text itself rather than a fixed `$1`-style
    /// template. Used for rewrites whose output length depends on the input
    /// (e.g. kanji-numeral folding).
    pub fn replace_with(&self, re: &Regex, f: impl Fn(&str) -> String) -> CharChain {
        let text = self.as_string();
        if !re.is_match(&text) {
            return self.clone();
        }

        let mut byte_to_idx = Vec::with_capacity(text.len() + 1);
        let mut acc = 0usize;
        for (pos, _) in text.char_indices() {
            while byte_to_idx.len() <= pos {
                byte_to_idx.push(acc);
            }
            acc += 1;
        }
        byte_to_idx.push(acc);

        let mut new_nodes: Vec<CharNode> = self.arena.nodes.clone();
        let mut new_indices = Vec::with_capacity(self.indices.len());
        let mut last_byte = 0usize;

        for m in re.find_iter(&text) {
            let start_idx = byte_to_idx[last_byte];
            let end_idx = byte_to_idx[m.start()];
            for i in start_idx..end_idx {
                new_indices.push(self.indices[i]);
            }

            for ch in f(m.as_str()).chars() {
                new_nodes.push(CharNode {
                    ch,
                    origin: None,
                    inserted: true,
                    consumed: false,
                });
                new_indices.push(new_nodes.len() - 1);
            }

            last_byte = m.end();
        }

        let tail_start = byte_to_idx[last_byte];
        for i in tail_start..self.indices.len() {
            new_indices.push(self.indices[i]);
        }

        CharChain {
            arena: Rc::new(Arena { nodes: new_nodes }),
            indices: new_indices,
        }
    }

    /// Applies a per-character mapping (e.g. a kanji-fold table), preserving
    /// each node's provenance — only the character itself changes.
    pub fn map_chars(&self, f: impl Fn(char) -> char) -> CharChain {
        let changed = self.indices.iter().any(|&idx| {
            let base = self.arena.nodes[idx];
            f(base.ch) != base.ch
        });
        if !changed {
            return self.clone();
        }
        // Nodes may be shared with other branches; never mutate in place,
        // materialize a fresh node per position in this chain instead.
        let mut fresh_nodes = Vec::with_capacity(self.indices.len());
        let mut fresh_indices = Vec::with_capacity(self.indices.len());
        for &idx in &self.indices {
            let base = self.arena.nodes[idx];
            fresh_nodes.push(CharNode {
                ch: f(base.ch),
                ..base
            });
            fresh_indices.push(fresh_nodes.len() - 1);
        }
        CharChain {
            arena: Rc::new(Arena { nodes: fresh_nodes }),
            indices: fresh_indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_text() {
        let chain = CharChain::from_str("千代田区");
        assert_eq!(chain.as_string(), "千代田区");
        assert_eq!(chain.char_len(), 4);
        assert_eq!(chain.node_at(0).origin, Some(0));
        assert!(!chain.node_at(0).inserted);
    }

    #[test]
    fn tail_preserves_provenance() {
        let chain = CharChain::from_str("東京都千代田区");
        let tail = chain.tail(3);
        assert_eq!(tail.as_string(), "千代田区");
        assert_eq!(tail.node_at(0).origin, Some(3));
    }

    #[test]
    fn replace_all_marks_inserted_characters() {
        let re = Regex::new(r"(\d+)番").unwrap();
        let chain = CharChain::from_str("1番地");
        let replaced = chain.replace_all(&re, "$1-");
        assert_eq!(replaced.as_string(), "1-地");
        // "1" keeps its provenance from the original input...
        assert_eq!(replaced.node_at(0).origin, Some(0));
        assert!(!replaced.node_at(0).inserted);
        // ...the hyphen is a fresh, originless insertion...
        assert!(replaced.node_at(1).inserted);
        assert_eq!(replaced.node_at(1).origin, None);
        // ...and the untouched tail keeps pointing at its original index.
        assert_eq!(replaced.node_at(2).origin, Some(3));
    }

    #[test]
    fn replace_all_is_noop_without_match() {
        let re = Regex::new(r"XYZ").unwrap();
        let chain = CharChain::from_str("丸の内");
        let replaced = chain.replace_all(&re, "Q");
        assert_eq!(replaced.as_string(), "丸の内");
    }
}
