//! Lineaire Text - the words of a poem and what students draw on them
//!
//! - [`token`]: stanza lines → addressable word tokens with deterministic ids
//! - [`selection`]: full poem or random stanza subset
//! - [`annotation`]: highlight / underline marks with linear undo-redo
//! - [`overlay`]: sticky notes and freehand ink
//! - [`editor`]: workspace tying them together, plus keyboard shortcuts
//!
//! Everything in this crate is synchronous and infallible.
//!
//! # Example
//!
//! ```rust
//! use lineaire_text::prelude::*;
//!
//! let stanza = DisplayedStanza::new(0, ["Mignonne, allons voir si la rose"]);
//! let tokens = tokenize(&[stanza], IndexMode::Global);
//! let mut ws = EditorWorkspace::new(tokens, OverlaySettings::default());
//!
//! ws.dispatch(EditorCommand::set_mode(ToolMode::Highlight));
//! ws.dispatch(EditorCommand::ClickToken { token_id: "0:rose:0".into() });
//! assert_eq!(ws.annotations().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod annotation;
pub mod editor;
pub mod overlay;
pub mod selection;
pub mod token;

pub use annotation::{
    Annotation, AnnotationChange, AnnotationColor, AnnotationKind, AnnotationStore,
    HistoryAction, HistoryEntry,
};
pub use editor::{EditorCommand, EditorWorkspace, KeyInput, Shortcut, ToolMode};
pub use overlay::{
    DrawingStroke, OverlaySettings, OverlayStore, Point, Size, StickyNote, StickyNotePatch, Tool,
};
pub use selection::StanzaSelection;
pub use token::{tokenize, DisplayedStanza, IndexMode, Piece, Token, TokenId, Tokenization};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with poem text
    pub use crate::{
        tokenize, AnnotationColor, AnnotationKind, AnnotationStore, DisplayedStanza,
        EditorCommand, EditorWorkspace, IndexMode, OverlaySettings, OverlayStore, Point,
        StanzaSelection, TokenId, Tokenization, ToolMode,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
