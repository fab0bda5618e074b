//! Editor workspace: one rendered poem with its selection, marks and ink
//!
//! The UI layer turns clicks and key presses into [`EditorCommand`]s and
//! hands them to [`EditorWorkspace::dispatch`]. Commands serialize, so a
//! session can be recorded and replayed.

use crate::annotation::{AnnotationColor, AnnotationKind, AnnotationStore};
use crate::overlay::{OverlaySettings, OverlayStore, Point, StickyNotePatch, Tool};
use crate::token::{TokenId, Tokenization};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Active tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// Clicking a word toggles it in the selection
    #[default]
    Select,
    /// Clicking a word highlights it
    Highlight,
    /// Clicking a word underlines it
    Underline,
    /// Pointer draws ink
    Draw,
    /// Pointer erases ink
    Erase,
    /// Sticky note placement
    Note,
}

impl ToolMode {
    /// Mode bound to a digit key
    #[must_use]
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(Self::Select),
            '2' => Some(Self::Highlight),
            '3' => Some(Self::Underline),
            '4' => Some(Self::Draw),
            '5' => Some(Self::Erase),
            '6' => Some(Self::Note),
            _ => None,
        }
    }
}

/// A key press as reported by the UI
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyInput {
    /// Key name (`"z"`, `"Escape"`, `"2"`)
    pub key: String,
    /// Control held
    #[serde(default)]
    pub ctrl: bool,
    /// Command / meta held
    #[serde(default)]
    pub meta: bool,
    /// Shift held
    #[serde(default)]
    pub shift: bool,
}

impl KeyInput {
    /// Plain key press
    #[must_use]
    pub fn key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    /// Ctrl + key
    #[must_use]
    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Self::default()
        }
    }

    /// With shift held
    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Keyboard shortcut table
pub struct Shortcut;

impl Shortcut {
    /// Command bound to `input`, if any
    #[must_use]
    pub fn from_key(input: &KeyInput) -> Option<EditorCommand> {
        let command_key = input.ctrl || input.meta;
        if command_key {
            return match input.key.to_lowercase().as_str() {
                "z" if input.shift => Some(EditorCommand::Redo),
                "z" => Some(EditorCommand::Undo),
                "y" => Some(EditorCommand::Redo),
                _ => None,
            };
        }
        if input.key == "Escape" {
            return Some(EditorCommand::CancelMode);
        }
        let mut chars = input.key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => ToolMode::from_digit(c).map(EditorCommand::set_mode),
            _ => None,
        }
    }
}

/// Everything the UI can ask of the workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorCommand {
    /// Switch tool
    SetMode {
        /// New mode
        mode: ToolMode,
    },
    /// Back to selection mode with an empty selection
    CancelMode,
    /// Marker color for highlight / underline
    SetColor {
        /// New color
        color: AnnotationColor,
    },
    /// Ink and note color
    SetInkColor {
        /// CSS color
        color: String,
    },
    /// Word clicked
    ClickToken {
        /// Clicked token
        token_id: TokenId,
    },
    /// Note on an annotated word
    SetNote {
        /// Annotated token
        token_id: TokenId,
        /// Note text
        text: String,
    },
    /// Undo the last mark
    Undo,
    /// Redo the last undone mark
    Redo,
    /// Empty the word selection
    ClearSelection,
    /// Remove marks, notes, ink and selection
    ClearAll,
    /// New sticky note
    AddStickyNote,
    /// Move / resize / edit a sticky note
    UpdateStickyNote {
        /// Note id
        id: Ulid,
        /// Fields to change
        patch: StickyNotePatch,
    },
    /// Remove a sticky note
    DeleteStickyNote {
        /// Note id
        id: Ulid,
    },
    /// Pointer pressed
    PointerDown {
        /// Position
        at: Point,
    },
    /// Pointer dragged
    PointerMove {
        /// Position
        at: Point,
    },
    /// Pointer released
    PointerUp,
    /// Remove all ink
    ClearStrokes,
}

impl EditorCommand {
    /// Shorthand for [`EditorCommand::SetMode`]
    #[must_use]
    pub fn set_mode(mode: ToolMode) -> Self {
        Self::SetMode { mode }
    }
}

/// One rendered poem being worked on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorWorkspace {
    tokens: Tokenization,
    selection: Vec<TokenId>,
    annotations: AnnotationStore,
    overlay: OverlayStore,
    mode: ToolMode,
    color: AnnotationColor,
}

impl EditorWorkspace {
    /// Workspace over a fresh render
    #[must_use]
    pub fn new(tokens: Tokenization, overlay: OverlaySettings) -> Self {
        Self {
            tokens,
            selection: Vec::new(),
            annotations: AnnotationStore::new(),
            overlay: OverlayStore::new(overlay),
            mode: ToolMode::Select,
            color: AnnotationColor::default(),
        }
    }

    /// Swap in a new render (poem or display mode changed)
    ///
    /// Token ids are deterministic, so marks on words still displayed keep
    /// working; the selection is dropped.
    pub fn replace_tokens(&mut self, tokens: Tokenization) {
        self.tokens = tokens;
        self.selection.clear();
    }

    /// Apply one command; returns `false` when it had no effect
    pub fn dispatch(&mut self, command: EditorCommand) -> bool {
        match command {
            EditorCommand::SetMode { mode } => {
                self.mode = mode;
                match mode {
                    ToolMode::Draw => self.overlay.tool = Tool::Pen,
                    ToolMode::Erase => self.overlay.tool = Tool::Eraser,
                    _ => {}
                }
                true
            }
            EditorCommand::CancelMode => {
                self.mode = ToolMode::Select;
                self.selection.clear();
                true
            }
            EditorCommand::SetColor { color } => {
                self.color = color;
                true
            }
            EditorCommand::SetInkColor { color } => {
                self.overlay.color = color;
                true
            }
            EditorCommand::ClickToken { token_id } => self.click_token(&token_id),
            EditorCommand::SetNote { token_id, text } => {
                self.annotations.set_note(&token_id, &text)
            }
            EditorCommand::Undo => self.annotations.undo(),
            EditorCommand::Redo => self.annotations.redo(),
            EditorCommand::ClearSelection => {
                let had = !self.selection.is_empty();
                self.selection.clear();
                had
            }
            EditorCommand::ClearAll => {
                self.annotations.clear_all();
                self.overlay.clear_all();
                self.selection.clear();
                true
            }
            EditorCommand::AddStickyNote => {
                self.overlay.add_sticky_note();
                true
            }
            EditorCommand::UpdateStickyNote { id, patch } => {
                self.overlay.update_sticky_note(id, patch)
            }
            EditorCommand::DeleteStickyNote { id } => self.overlay.delete_sticky_note(id),
            EditorCommand::PointerDown { at } if self.inking() => {
                self.overlay.begin_stroke(at);
                true
            }
            EditorCommand::PointerMove { at } if self.inking() => {
                self.overlay.extend_stroke(at);
                true
            }
            EditorCommand::PointerUp if self.inking() => {
                self.overlay.end_stroke();
                true
            }
            EditorCommand::PointerDown { .. }
            | EditorCommand::PointerMove { .. }
            | EditorCommand::PointerUp => false,
            EditorCommand::ClearStrokes => {
                self.overlay.clear_strokes();
                true
            }
        }
    }

    fn inking(&self) -> bool {
        matches!(self.mode, ToolMode::Draw | ToolMode::Erase)
    }

    fn click_token(&mut self, token_id: &TokenId) -> bool {
        if self.tokens.get(token_id).is_none() {
            return false;
        }
        match self.mode {
            ToolMode::Select => {
                if let Some(pos) = self.selection.iter().position(|t| t == token_id) {
                    self.selection.remove(pos);
                } else {
                    self.selection.push(token_id.clone());
                }
                true
            }
            ToolMode::Highlight => {
                self.annotations
                    .apply_annotation(token_id, AnnotationKind::Highlight, self.color);
                true
            }
            ToolMode::Underline => {
                self.annotations
                    .apply_annotation(token_id, AnnotationKind::Underline, self.color);
                true
            }
            ToolMode::Draw | ToolMode::Erase | ToolMode::Note => false,
        }
    }

    /// Selected token ids, in click order
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &[TokenId] {
        &self.selection
    }

    /// Selected words as displayed to the student
    #[must_use]
    pub fn selected_words(&self) -> Vec<String> {
        self.selection
            .iter()
            .map(|id| self.tokens.display_word(id))
            .collect()
    }

    /// Current render
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> &Tokenization {
        &self.tokens
    }

    /// Marks and their history
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    /// Notes and ink
    #[inline]
    #[must_use]
    pub fn overlay(&self) -> &OverlayStore {
        &self.overlay
    }

    /// Active tool
    #[inline]
    #[must_use]
    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    /// Marker color
    #[inline]
    #[must_use]
    pub fn color(&self) -> AnnotationColor {
        self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{tokenize, DisplayedStanza, IndexMode};

    fn workspace() -> EditorWorkspace {
        let stanza = DisplayedStanza::new(0, ["Les mots clés du poème"]);
        EditorWorkspace::new(tokenize(&[stanza], IndexMode::Global), OverlaySettings::default())
    }

    #[test]
    fn digit_keys_switch_modes() {
        assert_eq!(
            Shortcut::from_key(&KeyInput::key("2")),
            Some(EditorCommand::set_mode(ToolMode::Highlight))
        );
        assert_eq!(Shortcut::from_key(&KeyInput::key("9")), None);
        assert_eq!(Shortcut::from_key(&KeyInput::ctrl("2")), None);
    }

    #[test]
    fn undo_redo_chords() {
        assert_eq!(Shortcut::from_key(&KeyInput::ctrl("z")), Some(EditorCommand::Undo));
        assert_eq!(
            Shortcut::from_key(&KeyInput::ctrl("Z").with_shift()),
            Some(EditorCommand::Redo)
        );
        let meta = KeyInput {
            key: "z".into(),
            meta: true,
            ..KeyInput::default()
        };
        assert_eq!(Shortcut::from_key(&meta), Some(EditorCommand::Undo));
        assert_eq!(Shortcut::from_key(&KeyInput::ctrl("y")), Some(EditorCommand::Redo));
        assert_eq!(Shortcut::from_key(&KeyInput::key("z")), None);
    }

    #[test]
    fn escape_cancels_mode_and_selection() {
        let mut ws = workspace();
        ws.dispatch(EditorCommand::ClickToken {
            token_id: "0:mots:0".into(),
        });
        ws.dispatch(EditorCommand::set_mode(ToolMode::Underline));
        let cmd = Shortcut::from_key(&KeyInput::key("Escape")).unwrap();
        ws.dispatch(cmd);
        assert_eq!(ws.mode(), ToolMode::Select);
        assert!(ws.selection().is_empty());
    }

    #[test]
    fn select_mode_toggles_words_in_click_order() {
        let mut ws = workspace();
        for id in ["0:clés:0", "0:mots:0", "0:du:0", "0:du:0"] {
            ws.dispatch(EditorCommand::ClickToken { token_id: id.into() });
        }
        assert_eq!(ws.selected_words(), vec!["clés", "mots"]);
        assert!(!ws.dispatch(EditorCommand::ClickToken {
            token_id: "9:absent:0".into()
        }));
    }

    #[test]
    fn highlight_mode_routes_into_annotation_store() {
        let mut ws = workspace();
        ws.dispatch(EditorCommand::set_mode(ToolMode::Highlight));
        ws.dispatch(EditorCommand::SetColor {
            color: AnnotationColor::Pink,
        });
        ws.dispatch(EditorCommand::ClickToken {
            token_id: "0:poème:0".into(),
        });
        let mark = ws.annotations().get(&"0:poème:0".into()).unwrap();
        assert_eq!(mark.color, AnnotationColor::Pink);

        ws.dispatch(Shortcut::from_key(&KeyInput::ctrl("z")).unwrap());
        assert!(ws.annotations().is_empty());
        ws.dispatch(Shortcut::from_key(&KeyInput::ctrl("z").with_shift()).unwrap());
        assert_eq!(ws.annotations().len(), 1);
    }

    #[test]
    fn pointer_events_only_ink_in_draw_modes() {
        let mut ws = workspace();
        assert!(!ws.dispatch(EditorCommand::PointerDown {
            at: Point::new(0.0, 0.0)
        }));
        ws.dispatch(EditorCommand::set_mode(ToolMode::Draw));
        ws.dispatch(EditorCommand::PointerDown {
            at: Point::new(0.0, 0.0),
        });
        ws.dispatch(EditorCommand::PointerMove {
            at: Point::new(4.0, 4.0),
        });
        ws.dispatch(EditorCommand::PointerUp);
        assert_eq!(ws.overlay().strokes().len(), 1);

        ws.dispatch(EditorCommand::set_mode(ToolMode::Erase));
        ws.dispatch(EditorCommand::PointerDown {
            at: Point::new(2.0, 2.0),
        });
        assert!(ws.overlay().strokes().is_empty());
    }

    #[test]
    fn commands_serialize_with_type_tag() {
        let cmd = EditorCommand::set_mode(ToolMode::Draw);
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"type":"set_mode","mode":"draw"}"#);
        let back: EditorCommand = serde_json::from_str(r#"{"type":"undo"}"#).unwrap();
        assert_eq!(back, EditorCommand::Undo);
    }
}
