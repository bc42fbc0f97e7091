//! Short description derived from a bank's full description
//!
//! Account-like numbers are redacted and words are title cased, keeping
//! short connecting words lowercase and region codes uppercase.

/// Replacement for a redacted digit
const MASK: char = 'X';

/// Lowercased unless at the very start of the text
const CONJUNCTIONS: &[&str] = &[
    "A", "AN", "AND", "AT", "BUT", "BY", "FOR", "IN", "NOR", "OF", "OFF", "ON", "OR", "OUT", "SO",
    "THE", "TO", "UP", "VIA", "YET",
];

/// US states, Canadian provinces and territories. OH is left out so that
/// "Oh" reads as a word.
const REGIONS: &[&str] = &[
    "AB", "AK", "AL", "AR", "AZ", "BC", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "IA", "ID",
    "IL", "IN", "KS", "KY", "LA", "MA", "MB", "MD", "ME", "MI", "MN", "MO", "MS", "MT", "NB", "NC",
    "ND", "NE", "NH", "NJ", "NL", "NM", "NS", "NT", "NU", "NV", "NY", "OK", "ON", "OR", "PA",
    "PEI", "QC", "RI", "SC", "SD", "SK", "TN", "TX", "UT", "VA", "VT", "WA", "WI", "WV", "WY",
    "YT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordClass {
    Conjunction,
    Region,
    Word,
}

fn classify(token: &str) -> WordClass {
    let upper = token.to_uppercase();
    if CONJUNCTIONS.contains(&upper.as_str()) {
        WordClass::Conjunction
    } else if REGIONS.contains(&upper.as_str()) {
        WordClass::Region
    } else {
        WordClass::Word
    }
}

/// Derive the short description from raw description text
pub fn describe(raw: &str) -> String {
    let collapsed = collapse_spaces(raw);
    let masked = mask_digits(&collapsed);
    let cased = case_words(&masked);
    collapse_masks(&cased)
}

/// Replace every run of two or more spaces with one space
pub fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars() {
        if c == ' ' && previous_space {
            continue;
        }
        previous_space = c == ' ';
        out.push(c);
    }
    out
}

fn is_filler(c: char) -> bool {
    c == '-' || c == ' ' || c.is_ascii_digit()
}

/// Mask each digit that is followed by a stretch of digits, hyphens and
/// spaces ending in three consecutive digits.
///
/// One backwards pass records, for every position, whether a digit triple
/// starts at or after it before the stretch breaks. A digit at `i` is
/// masked when `i + 1` is inside the stretch and a triple starts at
/// `i + 2` or later. Decisions read the unmasked text.
pub fn mask_digits(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();

    let mut triple_ahead = vec![false; n + 1];
    for p in (0..n).rev() {
        if !is_filler(chars[p]) {
            triple_ahead[p] = false;
            continue;
        }
        let triple = p + 3 <= n && chars[p..p + 3].iter().all(|c| c.is_ascii_digit());
        triple_ahead[p] = triple || triple_ahead[p + 1];
    }

    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let masked = c.is_ascii_digit()
                && i + 1 < n
                && is_filler(chars[i + 1])
                && triple_ahead[i + 2];
            if masked {
                MASK
            } else {
                c
            }
        })
        .collect()
}

/// Byte spans of the casing tokens.
///
/// A token starts at two consecutive characters that are neither a hyphen
/// nor a space and runs to the next space. A single character standing
/// alone between spaces is a token too.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let is_word = |c: char| c != '-' && c != ' ';
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |(b, _)| *b);

    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i].1;
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let opens_pair = is_word(c) && next.map_or(false, is_word);
        let stands_alone = is_word(c)
            && (i == 0 || chars[i - 1].1 == ' ')
            && next.map_or(true, |n| n == ' ');

        if opens_pair {
            let mut end = i + 2;
            while end < chars.len() && chars[end].1 != ' ' {
                end += 1;
            }
            spans.push((byte_at(i), byte_at(end)));
            i = end;
        } else {
            if stands_alone {
                spans.push((byte_at(i), byte_at(i + 1)));
            }
            i += 1;
        }
    }
    spans
}

fn case_token(token: &str, at_start: bool) -> String {
    match classify(token) {
        WordClass::Conjunction if !at_start => token.to_lowercase(),
        WordClass::Region => token.to_uppercase(),
        _ => {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        }
    }
}

/// Apply word casing to every token, leaving the text between tokens alone
pub fn case_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in token_spans(text) {
        out.push_str(&text[cursor..start]);
        out.push_str(&case_token(&text[start..end], start == 0));
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Collapse every run of three or more `X`/`x` into a single `x`
pub fn collapse_masks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].eq_ignore_ascii_case(&'x') {
            let mut end = i;
            while end < chars.len() && chars[end].eq_ignore_ascii_case(&'x') {
                end += 1;
            }
            if end - i >= 3 {
                out.push('x');
            } else {
                out.extend(&chars[i..end]);
            }
            i = end;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}
