//! Word tokenization for displayed stanzas
//!
//! Splits stanza lines into addressable [`Token`]s while keeping every
//! separator as a verbatim [`Piece`], so the poem can be re-rendered exactly
//! as it was written.
//!
//! Token ids are derived from `(stanza_index, clean_word, occurrence_rank)`:
//! the second "rose" of stanza 2 is always `2:rose:1`, whatever else changes
//! in the render.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runs of whitespace, or runs of punctuation that never belong to a word.
///
/// Apostrophes and hyphens are absent on purpose: `l'amour` and `peut-être`
/// stay single fragments.
static SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s+|[.,;:!?«»"“”()\[\]{}…—–/*]+"#)
        .expect("separator pattern is valid")
});

/// Leading punctuation, core word, trailing punctuation.
static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\p{L}\p{N}]*)([\p{L}\p{N}](?:.*[\p{L}\p{N}])?)([^\p{L}\p{N}]*)$")
        .expect("word pattern is valid")
});

/// Stable identifier of one word occurrence
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Build the id of the `rank`-th occurrence of `word` in `stanza`
    #[inline]
    #[must_use]
    pub fn new(stanza: usize, word: &str, rank: usize) -> Self {
        Self(format!("{stanza}:{word}:{rank}"))
    }

    /// Raw string form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TokenId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for TokenId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One addressable word occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Identifier, unique within one render
    pub id: TokenId,
    /// Word without surrounding punctuation
    pub clean_word: String,
    /// Punctuation glued before the word (`«`, `'`)
    pub prefix: String,
    /// Punctuation glued after the word (`'` in `l'`)
    pub suffix: String,
    /// Stanza the token is attributed to
    pub stanza_index: usize,
}

impl Token {
    /// Text as it appears in the poem
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{}{}", self.prefix, self.clean_word, self.suffix)
    }
}

/// Render unit, in reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Piece {
    /// Token at this index of [`Tokenization::tokens`]
    Word(usize),
    /// Whitespace or punctuation, rendered as-is
    Verbatim(String),
    /// End of a line inside a stanza
    LineBreak,
    /// Boundary between two displayed stanzas
    StanzaBreak,
}

/// How stanza indices are attributed to tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexMode {
    /// Every displayed stanza keeps its index in the full poem
    #[default]
    Global,
    /// Single-stanza mode: every token carries this index
    Fixed(usize),
}

/// A stanza chosen for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedStanza {
    /// Index in the full poem
    pub index: usize,
    /// Lines of verse
    pub lines: Vec<String>,
}

impl DisplayedStanza {
    /// Create a displayed stanza
    pub fn new<S: Into<String>>(index: usize, lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            index,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Output of [`tokenize`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenization {
    tokens: Vec<Token>,
    pieces: Vec<Piece>,
    #[serde(skip)]
    by_id: HashMap<TokenId, usize>,
}

impl Tokenization {
    /// Tokens in reading order
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Render pieces in reading order
    #[inline]
    #[must_use]
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Number of addressable tokens
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if no word was found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Look a token up by id
    #[must_use]
    pub fn get(&self, id: &TokenId) -> Option<&Token> {
        if self.by_id.len() == self.tokens.len() {
            return self.by_id.get(id).map(|&i| &self.tokens[i]);
        }
        // Deserialized renders have no index
        self.tokens.iter().find(|t| &t.id == id)
    }

    /// Clean word for `id`, or the raw id when the token is not part of this render
    #[must_use]
    pub fn display_word(&self, id: &TokenId) -> String {
        self.get(id)
            .map_or_else(|| id.as_str().to_string(), |t| t.clean_word.clone())
    }

    /// Stanza index of `id`, if present in this render
    #[must_use]
    pub fn stanza_of(&self, id: &TokenId) -> Option<usize> {
        self.get(id).map(|t| t.stanza_index)
    }

    /// Reproduce the displayed text
    ///
    /// Word pieces pointing past the token list are skipped.
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Word(i) => {
                    if let Some(token) = self.tokens.get(*i) {
                        out.push_str(&token.display());
                    }
                }
                Piece::Verbatim(text) => out.push_str(text),
                Piece::LineBreak => out.push('\n'),
                Piece::StanzaBreak => out.push_str("\n\n"),
            }
        }
        out
    }
}

/// Split displayed stanzas into tokens and render pieces
///
/// Never fails: empty lines and empty stanzas simply produce fewer tokens.
#[must_use]
pub fn tokenize(stanzas: &[DisplayedStanza], mode: IndexMode) -> Tokenization {
    let mut out = Tokenization::default();
    let mut seen: HashMap<(usize, String), usize> = HashMap::new();

    for (s, stanza) in stanzas.iter().enumerate() {
        if s > 0 {
            out.pieces.push(Piece::StanzaBreak);
        }
        let stanza_index = match mode {
            IndexMode::Global => stanza.index,
            IndexMode::Fixed(index) => index,
        };

        for (l, line) in stanza.lines.iter().enumerate() {
            if l > 0 {
                out.pieces.push(Piece::LineBreak);
            }
            let mut cursor = 0;
            for sep in SEPARATOR.find_iter(line) {
                push_fragment(&mut out, &mut seen, stanza_index, &line[cursor..sep.start()]);
                out.pieces.push(Piece::Verbatim(sep.as_str().to_string()));
                cursor = sep.end();
            }
            push_fragment(&mut out, &mut seen, stanza_index, &line[cursor..]);
        }
    }

    out.by_id = out
        .tokens
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.clone(), i))
        .collect();
    out
}

fn push_fragment(
    out: &mut Tokenization,
    seen: &mut HashMap<(usize, String), usize>,
    stanza_index: usize,
    fragment: &str,
) {
    if fragment.is_empty() {
        return;
    }
    let Some(caps) = WORD.captures(fragment) else {
        out.pieces.push(Piece::Verbatim(fragment.to_string()));
        return;
    };

    let clean_word = caps[2].to_string();
    let rank = seen.entry((stanza_index, clean_word.clone())).or_insert(0);
    let token = Token {
        id: TokenId::new(stanza_index, &clean_word, *rank),
        prefix: caps[1].to_string(),
        suffix: caps[3].to_string(),
        clean_word,
        stanza_index,
    };
    *rank += 1;

    out.pieces.push(Piece::Word(out.tokens.len()));
    out.tokens.push(token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(t: &Tokenization) -> Vec<&str> {
        t.tokens().iter().map(|t| t.clean_word.as_str()).collect()
    }

    #[test]
    fn dangling_word_piece_is_not_rendered() {
        let t = tokenize(&[DisplayedStanza::new(0, ["Las voyez"])], IndexMode::Global);
        let mut value = serde_json::to_value(&t).unwrap();
        value["pieces"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"Word": 99}));
        let restored: Tokenization = serde_json::from_value(value).unwrap();
        assert_eq!(restored.render_plain(), "Las voyez");
    }

    #[test]
    fn splits_on_whitespace_and_punctuation() {
        let stanza = DisplayedStanza::new(0, ["Mignonne, allons voir si la rose"]);
        let t = tokenize(&[stanza], IndexMode::Global);
        assert_eq!(words(&t), vec!["Mignonne", "allons", "voir", "si", "la", "rose"]);
    }

    #[test]
    fn apostrophes_and_hyphens_stay_inside_words() {
        let stanza = DisplayedStanza::new(0, ["Peut-être l'amour, «déjà» !"]);
        let t = tokenize(&[stanza], IndexMode::Global);
        assert_eq!(words(&t), vec!["Peut-être", "l'amour", "déjà"]);
    }

    #[test]
    fn separates_prefix_and_suffix() {
        let stanza = DisplayedStanza::new(0, ["'tis l' «"]);
        let t = tokenize(&[stanza], IndexMode::Global);
        let tis = &t.tokens()[0];
        assert_eq!(tis.prefix, "'");
        assert_eq!(tis.clean_word, "tis");
        let l = &t.tokens()[1];
        assert_eq!(l.clean_word, "l");
        assert_eq!(l.suffix, "'");
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn repeated_words_get_distinct_ids() {
        let stanza = DisplayedStanza::new(3, ["la rose, la rose", "la"]);
        let t = tokenize(&[stanza], IndexMode::Global);
        let ids: Vec<&str> = t.tokens().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["3:la:0", "3:rose:0", "3:la:1", "3:rose:1", "3:la:2"]);
    }

    #[test]
    fn fixed_mode_overrides_stanza_index() {
        let stanza = DisplayedStanza::new(5, ["Sous le pont Mirabeau"]);
        let t = tokenize(&[stanza], IndexMode::Fixed(0));
        assert!(t.tokens().iter().all(|t| t.stanza_index == 0));
        assert_eq!(t.tokens()[0].id.as_str(), "0:Sous:0");
    }

    #[test]
    fn render_is_verbatim() {
        let stanzas = vec![
            DisplayedStanza::new(0, ["Heureux qui, comme Ulysse, a fait un beau voyage,", ""]),
            DisplayedStanza::new(1, ["  Ou comme cestuy-là…"]),
        ];
        let t = tokenize(&stanzas, IndexMode::Global);
        assert_eq!(
            t.render_plain(),
            "Heureux qui, comme Ulysse, a fait un beau voyage,\n\n\n  Ou comme cestuy-là…"
        );
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let t = tokenize(&[DisplayedStanza::new(0, Vec::<String>::new())], IndexMode::Global);
        assert!(t.is_empty());
        let t = tokenize(&[DisplayedStanza::new(0, ["   ", "— !"])], IndexMode::Global);
        assert!(t.is_empty());
    }

    #[test]
    fn unknown_id_displays_raw() {
        let t = tokenize(&[DisplayedStanza::new(0, ["rose"])], IndexMode::Global);
        assert_eq!(t.display_word(&TokenId::from("0:rose:0")), "rose");
        assert_eq!(t.display_word(&TokenId::from("4:lys:2")), "4:lys:2");
        assert_eq!(t.stanza_of(&TokenId::from("0:rose:0")), Some(0));
        assert_eq!(t.stanza_of(&TokenId::from("4:lys:2")), None);
    }
}
