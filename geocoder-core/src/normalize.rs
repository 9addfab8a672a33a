//! The four normalization operators from the component design: to-hiragana,
//! kan-to-num, jis-kanji, and the suffix-strip regex. Each has a plain
//! `&str -> String` form and a [`CharChain`]-preserving form; `normalize_str`
//! and `normalize_chain` apply them in the two orders the design calls for.

use std::collections::HashMap;

use kanaria::string::UCSStr;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::char_node::CharChain;

// --- to-hiragana / to-katakana -------------------------------------------

pub fn to_hiragana(s: &str) -> String {
    UCSStr::from_str(s).hiragana().to_string()
}

pub fn to_katakana(s: &str) -> String {
    UCSStr::from_str(s).katakana().to_string()
}

pub fn to_hiragana_chain(chain: &CharChain) -> CharChain {
    let folded = to_hiragana(&chain.as_string());
    rebuild_preserving_positions(chain, &folded)
}

pub fn to_katakana_chain(chain: &CharChain) -> CharChain {
    let folded = to_katakana(&chain.as_string());
    rebuild_preserving_positions(chain, &folded)
}

/// `kanaria` folds case 1:1 over `char`s, so a folded string and its input
/// always have the same character count; reuse each position's provenance
/// rather than rebuilding the chain from scratch.
fn rebuild_preserving_positions(chain: &CharChain, folded: &str) -> CharChain {
    let mut chars = folded.chars();
    chain.map_chars(|_| chars.next().expect("folded string same length as input"))
}

// --- kan-to-num -----------------------------------------------------------

static KANJI_NUMERAL_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new("[〇零一二三四五六七八九十百千万億兆]+").unwrap());

fn unit_value(ch: char) -> i64 {
    match ch {
        '万' => 10_000,
        '億' => 100_000_000,
        '兆' => 1_000_000_000_000,
        _ => unreachable!("unit_value called on non-unit char"),
    }
}

/// Converts one contiguous run of kanji-numeral characters to its decimal
/// value, via positional decomposition (二十三 → 20 + 3). Returns `None` if
/// the run isn't a well-formed numeral (left untouched by the caller).
fn kanji_run_to_number(run: &str) -> Option<i64> {
    let mut total: i64 = 0;
    let mut section: i64 = 0;
    let mut pending: Option<i64> = None;

    for ch in run.chars() {
        match ch {
            '〇' | '零' => pending = Some(0),
            '一' => pending = Some(1),
            '二' => pending = Some(2),
            '三' => pending = Some(3),
            '四' => pending = Some(4),
            '五' => pending = Some(5),
            '六' => pending = Some(6),
            '七' => pending = Some(7),
            '八' => pending = Some(8),
            '九' => pending = Some(9),
            '十' => section += pending.take().unwrap_or(1) * 10,
            '百' => section += pending.take().unwrap_or(1) * 100,
            '千' => section += pending.take().unwrap_or(1) * 1000,
            '万' | '億' | '兆' => {
                let add = pending.take().unwrap_or(0);
                let group = if section == 0 && add == 0 { 1 } else { section + add };
                total += group * unit_value(ch);
                section = 0;
            }
            _ => return None,
        }
    }
    section += pending.take().unwrap_or(0);
    total += section;
    Some(total)
}

pub fn kan_to_num(s: &str) -> String {
    KANJI_NUMERAL_RUN
        .replace_all(s, |caps: &regex::Captures| {
            let run = &caps[0];
            match kanji_run_to_number(run) {
                Some(n) => n.to_string(),
                None => run.to_string(),
            }
        })
        .into_owned()
}

pub fn kan_to_num_chain(chain: &CharChain) -> CharChain {
    chain.replace_with(&KANJI_NUMERAL_RUN, |run| match kanji_run_to_number(run) {
        Some(n) => n.to_string(),
        None => run.to_string(),
    })
}

// --- jis-kanji --------------------------------------------------------

/// Old-form → new-form kanji, and JIS-2 → JIS-1 folds relevant to address
/// names. Not an exhaustive JIS table — covers the characters that actually
/// recur in administrative place names.
static JIS_KANJI_FOLD: Lazy<HashMap<char, char>> = Lazy::new(|| {
    HashMap::from([
        // Old-form -> new-form kanji.
        ('國', '国'),
        ('縣', '県'),
        ('區', '区'),
        ('澤', '沢'),
        ('檜', '桧'),
        ('邊', '辺'),
        ('嶋', '島'),
        ('舘', '館'),
        ('櫻', '桜'),
        ('龍', '竜'),
        ('增', '増'),
        // JIS-2 -> JIS-1 width/variant folds.
        ('髙', '高'),
        ('﨑', '崎'),
        ('濵', '浜'),
        ('德', '徳'),
    ])
});

pub fn jis_kanji(s: &str) -> String {
    s.chars()
        .map(|c| *JIS_KANJI_FOLD.get(&c).unwrap_or(&c))
        .collect()
}

pub fn jis_kanji_chain(chain: &CharChain) -> CharChain {
    chain.map_chars(|c| *JIS_KANJI_FOLD.get(&c).unwrap_or(&c))
}

// --- suffix-strip ----------------------------------------------------

static SUFFIX_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)-?[番号町地丁目]+の?").unwrap());

pub fn suffix_strip(s: &str) -> String {
    SUFFIX_STRIP.replace_all(s, "$1-").into_owned()
}

pub fn suffix_strip_chain(chain: &CharChain) -> CharChain {
    chain.replace_all(&SUFFIX_STRIP, "$1-")
}

// --- composed entry points ---------------------------------------------

/// Order for plain strings: hiragana, kan2num, jisKanji, suffix-strip.
pub fn normalize_str(s: &str) -> String {
    let s = to_hiragana(s);
    let s = kan_to_num(&s);
    let s = jis_kanji(&s);
    suffix_strip(&s)
}

/// Different order from [`normalize_str`]: suffix-strip, hiragana,
/// kan2num, jisKanji. Suffix-strip has to run first here, while every
/// character still maps 1:1 to an original position — kan2num collapses a
/// multi-character kanji-numeral run into fewer digit characters, and
/// running suffix-strip afterward would have it matching against
/// positions whose provenance no longer lines up with the input it came
/// from.
pub fn normalize_chain(chain: &CharChain) -> CharChain {
    let chain = suffix_strip_chain(chain);
    let chain = to_hiragana_chain(&chain);
    let chain = kan_to_num_chain(&chain);
    jis_kanji_chain(&chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hiragana_folds_katakana() {
        assert_eq!(to_hiragana("チヨダク"), "ちよだく");
    }

    #[test]
    fn hiragana_is_idempotent() {
        let once = to_hiragana("チヨダク");
        assert_eq!(to_hiragana(&once), once);
    }

    #[test]
    fn kan_to_num_handles_compound_forms() {
        assert_eq!(kan_to_num("二十三"), "23");
        assert_eq!(kan_to_num("三千二百"), "3200");
        assert_eq!(kan_to_num("一丁目"), "1丁目");
    }

    #[test]
    fn kan_to_num_is_idempotent_on_digits() {
        let once = kan_to_num("二十三番地");
        assert_eq!(kan_to_num(&once), once);
    }

    #[test]
    fn jis_kanji_folds_old_forms() {
        assert_eq!(jis_kanji("國"), "国");
        assert_eq!(jis_kanji(&jis_kanji("國")), jis_kanji("國"));
    }

    #[test]
    fn suffix_strip_collapses_trailing_noise() {
        assert_eq!(suffix_strip("1番地"), "1-");
        assert_eq!(suffix_strip("2丁目"), "2-");
    }

    #[test]
    fn chain_variant_diverges_from_string_variant_on_kanji_numerals() {
        let input = "二十三番地";
        // String variant runs kan2num before suffix-strip, so the digits
        // suffix-strip needs already exist by the time it runs.
        assert_eq!(normalize_str(input), "23-");

        // Chain variant runs suffix-strip first, before any ascii digit
        // exists, so the marker is left untouched here instead.
        let chain = CharChain::from_str(input);
        assert_eq!(normalize_chain(&chain).as_string(), "23番地");
    }

    #[test]
    fn chain_variant_still_folds_hiragana_and_numerals() {
        let chain = CharChain::from_str("一丁目チヨダク");
        let normalized_chain = normalize_chain(&chain);
        assert_eq!(normalized_chain.as_string(), "1丁目ちよだく");
    }

    #[test]
    fn chain_variant_preserves_tail_provenance() {
        let chain = CharChain::from_str("東京都1番地");
        let normalized = suffix_strip_chain(&chain);
        assert_eq!(normalized.as_string(), "東京都1-");
        // "東京都" keeps its original indices untouched by the rewrite.
        assert_eq!(normalized.node_at(0).origin, Some(0));
        assert_eq!(normalized.node_at(2).origin, Some(2));
    }
}
