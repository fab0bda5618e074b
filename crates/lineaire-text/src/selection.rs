//! Which stanzas of a poem are put on screen

use crate::token::{DisplayedStanza, IndexMode};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Stanzas chosen for one render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StanzaSelection {
    /// The whole poem
    All,
    /// A subset of indices, sorted in reading order
    Subset(Vec<usize>),
}

impl StanzaSelection {
    /// Pick `size` distinct stanzas at random, re-sorted into poem order
    ///
    /// Asking for at least as many stanzas as the poem has selects them all.
    pub fn sample<R: Rng + ?Sized>(total: usize, size: usize, rng: &mut R) -> Self {
        if size >= total {
            return Self::All;
        }
        let mut picked = rand::seq::index::sample(rng, total, size).into_vec();
        picked.sort_unstable();
        Self::Subset(picked)
    }

    /// Materialize the chosen stanzas from the full poem
    ///
    /// Out-of-range indices are skipped.
    #[must_use]
    pub fn apply(&self, poem: &[Vec<String>]) -> Vec<DisplayedStanza> {
        match self {
            Self::All => poem
                .iter()
                .enumerate()
                .map(|(index, lines)| DisplayedStanza {
                    index,
                    lines: lines.clone(),
                })
                .collect(),
            Self::Subset(indices) => indices
                .iter()
                .filter_map(|&index| {
                    poem.get(index).map(|lines| DisplayedStanza {
                        index,
                        lines: lines.clone(),
                    })
                })
                .collect(),
        }
    }

    /// Index mode matching this selection
    ///
    /// Every token of a single displayed stanza is pinned to that stanza.
    #[must_use]
    pub fn index_mode(&self) -> IndexMode {
        match self {
            Self::Subset(indices) if indices.len() == 1 => IndexMode::Fixed(indices[0]),
            _ => IndexMode::Global,
        }
    }
}
