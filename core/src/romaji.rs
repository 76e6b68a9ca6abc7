// core/src/romaji.rs
//
// Rule data for `Table::romaji_hiragana()`.
//
// Rows are keyed by their consonant prefix and list the kana for the vowels
// a, i, u, e, o in that order. An empty string leaves the syllable out.

pub(crate) const VOWELS: &str = "aiueo";

pub(crate) const VOWEL_ROWS: &[(&str, [&str; 5])] = &[
    ("", ["あ", "い", "う", "え", "お"]),
    ("k", ["か", "き", "く", "け", "こ"]),
    ("g", ["が", "ぎ", "ぐ", "げ", "ご"]),
    ("s", ["さ", "し", "す", "せ", "そ"]),
    ("z", ["ざ", "じ", "ず", "ぜ", "ぞ"]),
    ("t", ["た", "ち", "つ", "て", "と"]),
    ("d", ["だ", "ぢ", "づ", "で", "ど"]),
    ("n", ["な", "に", "ぬ", "ね", "の"]),
    ("h", ["は", "ひ", "ふ", "へ", "ほ"]),
    ("b", ["ば", "び", "ぶ", "べ", "ぼ"]),
    ("p", ["ぱ", "ぴ", "ぷ", "ぺ", "ぽ"]),
    ("m", ["ま", "み", "む", "め", "も"]),
    ("y", ["や", "い", "ゆ", "いぇ", "よ"]),
    ("r", ["ら", "り", "る", "れ", "ろ"]),
    ("w", ["わ", "うぃ", "う", "うぇ", "を"]),
    ("f", ["ふぁ", "ふぃ", "ふ", "ふぇ", "ふぉ"]),
    ("j", ["じゃ", "じ", "じゅ", "じぇ", "じょ"]),
    ("v", ["ゔぁ", "ゔぃ", "ゔ", "ゔぇ", "ゔぉ"]),
    ("c", ["か", "し", "く", "せ", "こ"]),
    ("q", ["くぁ", "くぃ", "く", "くぇ", "くぉ"]),
    ("x", ["ぁ", "ぃ", "ぅ", "ぇ", "ぉ"]),
    ("l", ["ぁ", "ぃ", "ぅ", "ぇ", "ぉ"]),
    // youon
    ("ky", ["きゃ", "きぃ", "きゅ", "きぇ", "きょ"]),
    ("gy", ["ぎゃ", "ぎぃ", "ぎゅ", "ぎぇ", "ぎょ"]),
    ("sy", ["しゃ", "しぃ", "しゅ", "しぇ", "しょ"]),
    ("sh", ["しゃ", "し", "しゅ", "しぇ", "しょ"]),
    ("zy", ["じゃ", "じぃ", "じゅ", "じぇ", "じょ"]),
    ("jy", ["じゃ", "じぃ", "じゅ", "じぇ", "じょ"]),
    ("ty", ["ちゃ", "ちぃ", "ちゅ", "ちぇ", "ちょ"]),
    ("cy", ["ちゃ", "ちぃ", "ちゅ", "ちぇ", "ちょ"]),
    ("ch", ["ちゃ", "ち", "ちゅ", "ちぇ", "ちょ"]),
    ("dy", ["ぢゃ", "ぢぃ", "ぢゅ", "ぢぇ", "ぢょ"]),
    ("ny", ["にゃ", "にぃ", "にゅ", "にぇ", "にょ"]),
    ("hy", ["ひゃ", "ひぃ", "ひゅ", "ひぇ", "ひょ"]),
    ("by", ["びゃ", "びぃ", "びゅ", "びぇ", "びょ"]),
    ("py", ["ぴゃ", "ぴぃ", "ぴゅ", "ぴぇ", "ぴょ"]),
    ("my", ["みゃ", "みぃ", "みゅ", "みぇ", "みょ"]),
    ("ry", ["りゃ", "りぃ", "りゅ", "りぇ", "りょ"]),
    ("th", ["てゃ", "てぃ", "てゅ", "てぇ", "てょ"]),
    ("dh", ["でゃ", "でぃ", "でゅ", "でぇ", "でょ"]),
    ("ts", ["つぁ", "つぃ", "つ", "つぇ", "つぉ"]),
    ("xy", ["ゃ", "", "ゅ", "", "ょ"]),
    ("ly", ["ゃ", "", "ゅ", "", "ょ"]),
];

/// Consonants whose doubling yields a small tsu and keeps one consonant
/// pending ("kk" → "っ" + "k").
pub(crate) const DOUBLED_CONSONANTS: &str = "kgsztdhbpmyrwfjvcq";

/// (input, result, pending)
pub(crate) const EXTRA_RULES: &[(&str, &str, &str)] = &[
    ("n", "ん", ""),
    ("nn", "ん", ""),
    ("n'", "ん", ""),
    ("xn", "ん", ""),
    ("xtu", "っ", ""),
    ("ltu", "っ", ""),
    ("xtsu", "っ", ""),
    ("ltsu", "っ", ""),
    ("xwa", "ゎ", ""),
    ("lwa", "ゎ", ""),
    ("xka", "ゕ", ""),
    ("xke", "ゖ", ""),
    ("-", "ー", ""),
    (",", "、", ""),
    (".", "。", ""),
    ("[", "「", ""),
    ("]", "」", ""),
    ("/", "・", ""),
    ("~", "〜", ""),
    ("z-", "〜", ""),
    ("z.", "…", ""),
    ("z,", "‥", ""),
    ("z/", "・", ""),
    ("z[", "『", ""),
    ("z]", "』", ""),
    ("zh", "←", ""),
    ("zj", "↓", ""),
    ("zk", "↑", ""),
    ("zl", "→", ""),
];
