//! Helpers behind the `lineaire` binary
//!
//! Poem files are plain text: one line per verse, stanzas separated by blank
//! lines. Editor scripts are JSON arrays of [`EditorCommand`].

#![allow(missing_docs)]

use anyhow::{Context, Result};
use lineaire_core::LineaireConfig;
use lineaire_text::{
    tokenize, EditorCommand, EditorWorkspace, OverlaySettings, Piece, StanzaSelection,
    Tokenization,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Split a poem into stanzas of non-empty lines
#[must_use]
pub fn parse_poem(text: &str) -> Vec<Vec<String>> {
    let mut poem = Vec::new();
    let mut stanza = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !stanza.is_empty() {
                poem.push(std::mem::take(&mut stanza));
            }
        } else {
            stanza.push(line.to_string());
        }
    }
    if !stanza.is_empty() {
        poem.push(stanza);
    }
    poem
}

pub fn load_poem(path: &Path) -> Result<Vec<Vec<String>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read poem {}", path.display()))?;
    Ok(parse_poem(&text))
}

/// Defaults when `path` is `None`
pub fn load_config(path: Option<&Path>) -> Result<LineaireConfig> {
    match path {
        Some(path) => LineaireConfig::load(path)
            .with_context(|| format!("invalid config {}", path.display())),
        None => Ok(LineaireConfig::default()),
    }
}

pub fn load_script(path: &Path) -> Result<Vec<EditorCommand>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid script {}", path.display()))
}

/// Whole poem, or `quick` random stanzas
///
/// A seed makes the quick-mode pick reproducible.
pub fn select_stanzas(total: usize, quick: Option<usize>, seed: Option<u64>) -> StanzaSelection {
    match (quick, seed) {
        (None, _) => StanzaSelection::All,
        (Some(size), Some(seed)) => {
            StanzaSelection::sample(total, size, &mut StdRng::seed_from_u64(seed))
        }
        (Some(size), None) => StanzaSelection::sample(total, size, &mut rand::rng()),
    }
}

/// Tokenize the chosen stanzas of `poem`
#[must_use]
pub fn tokenize_poem(poem: &[Vec<String>], selection: &StanzaSelection) -> Tokenization {
    tokenize(&selection.apply(poem), selection.index_mode())
}

/// One token per line: id, then the word with its punctuation
#[must_use]
pub fn token_table(tokens: &Tokenization) -> String {
    let mut out = String::new();
    for token in tokens.tokens() {
        let _ = writeln!(out, "{}\t{}", token.id, token.display());
    }
    out
}

/// Displayed text with every addressable word bracketed
#[must_use]
pub fn bracketed(tokens: &Tokenization) -> String {
    let mut out = String::new();
    for piece in tokens.pieces() {
        match piece {
            Piece::Word(i) => {
                if let Some(token) = tokens.tokens().get(*i) {
                    let _ = write!(out, "{}[{}]{}", token.prefix, token.clean_word, token.suffix);
                }
            }
            Piece::Verbatim(text) => out.push_str(text),
            Piece::LineBreak => out.push('\n'),
            Piece::StanzaBreak => out.push_str("\n\n"),
        }
    }
    out
}

/// Result of replaying an editor script
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    /// Commands that changed the workspace
    pub applied: usize,
    /// Commands that had no effect
    pub ignored: usize,
    pub workspace: EditorWorkspace,
}

/// Dispatch `commands` in order on a fresh workspace
#[must_use]
pub fn replay(
    tokens: Tokenization,
    settings: OverlaySettings,
    commands: Vec<EditorCommand>,
) -> ReplaySummary {
    let mut workspace = EditorWorkspace::new(tokens, settings);
    let mut applied = 0;
    let mut ignored = 0;
    for command in commands {
        tracing::debug!(?command, "dispatch");
        if workspace.dispatch(command) {
            applied += 1;
        } else {
            ignored += 1;
        }
    }
    ReplaySummary {
        applied,
        ignored,
        workspace,
    }
}
