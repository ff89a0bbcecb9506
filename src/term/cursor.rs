//! Cursor state
//!
//! The cursor addresses the buffer in absolute coordinates: `x` is a column
//! in `[0, width)`, `y` a row index into the full backing store (scrollback
//! included). Writes that fill the last column wrap immediately, so `x`
//! stays below the buffer width at all times; `just_wrapped` lets the next
//! explicit newline merge into the wrap it follows.

use super::cell::CellAttrs;

/// Cursor shape, as selected by DECSCUSR
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CursorShape {
    /// Default (host dependent)
    #[default]
    Default,
    BlinkingBlock,
    SteadyBlock,
    BlinkingUnderline,
    SteadyUnderline,
    BlinkingBar,
    SteadyBar,
}

impl CursorShape {
    /// Convert to DECSCUSR parameter (for `CSI Ps SP q`)
    pub fn to_decscusr(&self) -> u8 {
        match self {
            CursorShape::Default => 0,
            CursorShape::BlinkingBlock => 1,
            CursorShape::SteadyBlock => 2,
            CursorShape::BlinkingUnderline => 3,
            CursorShape::SteadyUnderline => 4,
            CursorShape::BlinkingBar => 5,
            CursorShape::SteadyBar => 6,
        }
    }

    /// Create from DECSCUSR parameter
    pub fn from_decscusr(n: u8) -> Self {
        match n {
            0 => CursorShape::Default,
            1 => CursorShape::BlinkingBlock,
            2 => CursorShape::SteadyBlock,
            3 => CursorShape::BlinkingUnderline,
            4 => CursorShape::SteadyUnderline,
            5 => CursorShape::BlinkingBar,
            6 => CursorShape::SteadyBar,
            _ => CursorShape::Default,
        }
    }

    /// Convert to a crossterm cursor style for renderer consumers
    pub fn to_crossterm(&self) -> crossterm::cursor::SetCursorStyle {
        use crossterm::cursor::SetCursorStyle;
        match self {
            CursorShape::Default | CursorShape::BlinkingBlock => SetCursorStyle::BlinkingBlock,
            CursorShape::SteadyBlock => SetCursorStyle::SteadyBlock,
            CursorShape::BlinkingUnderline => SetCursorStyle::BlinkingUnderScore,
            CursorShape::SteadyUnderline => SetCursorStyle::SteadyUnderScore,
            CursorShape::BlinkingBar => SetCursorStyle::BlinkingBar,
            CursorShape::SteadyBar => SetCursorStyle::SteadyBar,
        }
    }
}

/// Cursor state, owned by a buffer
#[derive(Clone, Debug)]
pub struct Cursor {
    /// Column, always `< width` of the owning buffer
    pub x: u16,
    /// Absolute buffer row, always `< total_rows()` of the owning buffer
    pub y: usize,
    pub visible: bool,
    pub blink_allowed: bool,
    pub shape: CursorShape,
    /// An auto-wrap just moved the cursor to a fresh row; an explicit
    /// newline arriving before anything else is merged into that wrap
    pub just_wrapped: bool,
    saved: Vec<SavedCursor>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            visible: true,
            blink_allowed: true,
            shape: CursorShape::Default,
            just_wrapped: false,
            saved: Vec::new(),
        }
    }
}

impl Cursor {
    /// Push a snapshot onto the save stack (DECSC)
    ///
    /// `screen_row` is the cursor row relative to the top of the screen
    /// region, so the snapshot stays meaningful while the buffer scrolls.
    pub fn save(&mut self, screen_row: u16, attrs: CellAttrs) {
        self.saved.push(SavedCursor {
            x: self.x,
            screen_row,
            attrs,
        });
    }

    /// Pop the most recent snapshot (DECRC)
    ///
    /// An empty stack yields the origin snapshot with default attributes,
    /// matching what hardware terminals do for an unpaired restore.
    pub fn restore(&mut self) -> SavedCursor {
        self.saved.pop().unwrap_or_default()
    }

    /// Copy style state (shape, visibility, blink) from another cursor
    ///
    /// Used when switching screen buffers: position is translated separately
    /// but style always travels with the switch.
    pub fn copy_style_from(&mut self, other: &Cursor) {
        self.visible = other.visible;
        self.blink_allowed = other.blink_allowed;
        self.shape = other.shape;
    }
}

/// Saved cursor snapshot
#[derive(Clone, Debug, Default)]
pub struct SavedCursor {
    pub x: u16,
    /// Row relative to the top of the screen region at save time
    pub screen_row: u16,
    pub attrs: CellAttrs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::cell::Color;

    #[test]
    fn test_save_restore_is_a_stack() {
        let mut cursor = Cursor::default();
        cursor.x = 3;
        cursor.save(1, CellAttrs::default());
        cursor.x = 7;
        let mut attrs = CellAttrs::default();
        attrs.fg = Color::Indexed(2);
        cursor.save(5, attrs);

        let top = cursor.restore();
        assert_eq!(top.x, 7);
        assert_eq!(top.screen_row, 5);
        assert_eq!(top.attrs.fg, Color::Indexed(2));

        let bottom = cursor.restore();
        assert_eq!(bottom.x, 3);
        assert_eq!(bottom.screen_row, 1);
    }

    #[test]
    fn test_restore_on_empty_stack_resets_to_origin() {
        let mut cursor = Cursor::default();
        let snap = cursor.restore();
        assert_eq!(snap.x, 0);
        assert_eq!(snap.screen_row, 0);
        assert_eq!(snap.attrs, CellAttrs::default());
    }

    #[test]
    fn test_decscusr_round_trip() {
        for n in 0..=6 {
            assert_eq!(CursorShape::from_decscusr(n).to_decscusr(), n);
        }
        assert_eq!(CursorShape::from_decscusr(9), CursorShape::Default);
    }
}
