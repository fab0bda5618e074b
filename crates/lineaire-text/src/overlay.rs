//! Sticky notes and freehand ink
//!
//! Pure spatial data in page coordinates. Nothing here knows about tokens or
//! analyses, and nothing here knows how it gets drawn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Page-space point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position
    pub x: f32,
    /// Vertical position
    pub y: f32,
}

impl Point {
    /// Create a point
    #[inline]
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Width and height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

/// Free-floating text box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    /// Identifier
    pub id: Ulid,
    /// Top-left corner
    pub position: Point,
    /// Expanded size
    pub size: Size,
    /// CSS color
    pub color: String,
    /// Text
    pub content: String,
    /// Collapsed notes render at reduced height
    pub collapsed: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl StickyNote {
    /// Height as rendered, honoring the collapsed state
    #[must_use]
    pub fn rendered_height(&self, settings: &OverlaySettings) -> f32 {
        if self.collapsed {
            settings.collapsed_height
        } else {
            self.size.height
        }
    }
}

/// Partial update for a sticky note; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StickyNotePatch {
    /// New position
    pub position: Option<Point>,
    /// New size
    pub size: Option<Size>,
    /// New text
    pub content: Option<String>,
    /// New collapsed state
    pub collapsed: Option<bool>,
    /// New color
    pub color: Option<String>,
}

/// Freehand ink path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingStroke {
    /// Identifier
    pub id: Ulid,
    /// Points in drawing order
    pub points: Vec<Point>,
    /// CSS color
    pub color: String,
    /// Line width
    pub width: f32,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl DrawingStroke {
    /// True if any point of the stroke lies within `radius` of `at`
    #[must_use]
    pub fn touches(&self, at: &Point, radius: f32) -> bool {
        self.points.iter().any(|p| p.distance_to(at) <= radius)
    }
}

/// Pen or eraser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Draws strokes
    #[default]
    Pen,
    /// Removes strokes near the pointer
    Eraser,
}

/// Overlay constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Width of finalized strokes
    pub stroke_width: f32,
    /// Eraser hit radius
    pub erase_radius: f32,
    /// Size of new sticky notes
    pub note_size: Size,
    /// Height of a collapsed note
    pub collapsed_height: f32,
    /// Where the first note lands
    pub note_origin: Point,
    /// Diagonal shift per existing note
    pub note_offset: f32,
    /// Notes per diagonal before wrapping back to the origin
    pub note_wrap: usize,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            stroke_width: 3.0,
            erase_radius: 10.0,
            note_size: Size {
                width: 200.0,
                height: 150.0,
            },
            collapsed_height: 40.0,
            note_origin: Point::new(50.0, 50.0),
            note_offset: 30.0,
            note_wrap: 10,
        }
    }
}

/// Sticky notes, finalized strokes and the stroke in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayStore {
    settings: OverlaySettings,
    notes: Vec<StickyNote>,
    strokes: Vec<DrawingStroke>,
    #[serde(skip)]
    current: Option<Vec<Point>>,
    /// Current ink / note color
    pub color: String,
    /// Current ink tool
    pub tool: Tool,
}

impl Default for OverlayStore {
    fn default() -> Self {
        Self::new(OverlaySettings::default())
    }
}

impl OverlayStore {
    /// Create an empty store
    #[must_use]
    pub fn new(settings: OverlaySettings) -> Self {
        Self {
            settings,
            notes: Vec::new(),
            strokes: Vec::new(),
            current: None,
            color: "#1e293b".to_string(),
            tool: Tool::Pen,
        }
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    /// Add a note, tiled diagonally after the existing ones
    pub fn add_sticky_note(&mut self) -> Ulid {
        let slot = self.notes.len() % self.settings.note_wrap.max(1);
        #[allow(clippy::cast_precision_loss)]
        let shift = slot as f32 * self.settings.note_offset;
        let note = StickyNote {
            id: Ulid::new(),
            position: Point::new(
                self.settings.note_origin.x + shift,
                self.settings.note_origin.y + shift,
            ),
            size: self.settings.note_size,
            color: self.color.clone(),
            content: String::new(),
            collapsed: false,
            created_at: Utc::now(),
        };
        let id = note.id;
        self.notes.push(note);
        id
    }

    /// Merge `patch` into note `id`; returns `false` if there is no such note
    pub fn update_sticky_note(&mut self, id: Ulid, patch: StickyNotePatch) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if let Some(position) = patch.position {
            note.position = position;
        }
        if let Some(size) = patch.size {
            note.size = size;
        }
        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(collapsed) = patch.collapsed {
            note.collapsed = collapsed;
        }
        if let Some(color) = patch.color {
            note.color = color;
        }
        true
    }

    /// Remove note `id`; returns `false` if there is no such note
    pub fn delete_sticky_note(&mut self, id: Ulid) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    /// Pointer down: start a stroke, or erase under the pointer
    pub fn begin_stroke(&mut self, at: Point) {
        match self.tool {
            Tool::Pen => self.current = Some(vec![at]),
            Tool::Eraser => {
                self.erase_at(at);
            }
        }
    }

    /// Pointer move: extend the stroke in progress, or keep erasing
    pub fn extend_stroke(&mut self, at: Point) {
        match self.tool {
            Tool::Pen => {
                if let Some(points) = self.current.as_mut() {
                    points.push(at);
                }
            }
            Tool::Eraser => {
                self.erase_at(at);
            }
        }
    }

    /// Pointer up: finalize the stroke in progress
    pub fn end_stroke(&mut self) -> Option<Ulid> {
        let points = self.current.take()?;
        if points.is_empty() {
            return None;
        }
        let stroke = DrawingStroke {
            id: Ulid::new(),
            points,
            color: self.color.clone(),
            width: self.settings.stroke_width,
            created_at: Utc::now(),
        };
        let id = stroke.id;
        self.strokes.push(stroke);
        Some(id)
    }

    /// Remove every stroke with a point within the erase radius of `at`
    pub fn erase_at(&mut self, at: Point) -> usize {
        let radius = self.settings.erase_radius;
        let before = self.strokes.len();
        self.strokes.retain(|s| !s.touches(&at, radius));
        before - self.strokes.len()
    }

    /// Remove every stroke
    pub fn clear_strokes(&mut self) {
        self.strokes.clear();
        self.current = None;
    }

    /// Remove every stroke and note
    pub fn clear_all(&mut self) {
        self.clear_strokes();
        self.notes.clear();
    }

    /// Sticky notes, oldest first
    #[inline]
    #[must_use]
    pub fn notes(&self) -> &[StickyNote] {
        &self.notes
    }

    /// Finalized strokes, oldest first
    #[inline]
    #[must_use]
    pub fn strokes(&self) -> &[DrawingStroke] {
        &self.strokes
    }

    /// Points of the stroke being drawn
    #[inline]
    #[must_use]
    pub fn current_stroke(&self) -> Option<&[Point]> {
        self.current.as_deref()
    }
}
