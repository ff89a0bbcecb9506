//! Cells and character attributes
//!
//! A cell holds one grapheme cluster plus the attributes that were active
//! when it was written. Wide glyphs occupy two cells: the head cell carries
//! the text with `width == 2`, the tail cell is a zero-width continuation.

use bitflags::bitflags;

/// A single cell of the character grid
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Grapheme cluster (base character plus any combining marks)
    pub text: String,
    /// Display width: 0 = continuation of a wide glyph, 1 or 2 otherwise
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            text: String::new(),
            width: 1,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    /// Blank cell carrying the given attributes (used by erase operations)
    pub fn blank(attrs: &CellAttrs) -> Self {
        Self {
            text: String::new(),
            width: 1,
            attrs: attrs.clone(),
        }
    }

    /// Trailing half of a wide glyph
    pub fn continuation(attrs: &CellAttrs) -> Self {
        Self {
            text: String::new(),
            width: 0,
            attrs: attrs.clone(),
        }
    }

    pub fn clear(&mut self, attrs: &CellAttrs) {
        self.text.clear();
        self.width = 1;
        self.attrs = attrs.clone();
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Whether this cell is the head of a wide glyph
    pub fn is_wide(&self) -> bool {
        self.width == 2
    }

    /// True for cells that have never been written or were erased
    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && self.width != 0
    }

    /// Append a zero-width codepoint (combining mark) to this cell
    pub fn push_combining(&mut self, ch: char) {
        if self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push(ch);
    }

    /// The display text (space if the cell is blank)
    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            " "
        } else {
            &self.text
        }
    }
}

/// Cell attributes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Color definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    /// Convert to crossterm color for renderer consumers
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        match self {
            Color::Default => crossterm::style::Color::Reset,
            Color::Indexed(n) => crossterm::style::Color::AnsiValue(*n),
            Color::Rgb(r, g, b) => crossterm::style::Color::Rgb {
                r: *r,
                g: *g,
                b: *b,
            },
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0000_0001;
        const DIM           = 0b0000_0000_0010;
        const ITALIC        = 0b0000_0000_0100;
        const UNDERLINE     = 0b0000_0000_1000;
        const BLINK         = 0b0000_0001_0000;
        const INVERSE       = 0b0000_0010_0000;
        const HIDDEN        = 0b0000_0100_0000;
        const STRIKETHROUGH = 0b0000_1000_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_cell_carries_attrs() {
        let mut attrs = CellAttrs::default();
        attrs.bg = Color::Indexed(4);
        let cell = Cell::blank(&attrs);
        assert!(cell.is_blank());
        assert_eq!(cell.attrs.bg, Color::Indexed(4));
    }

    #[test]
    fn test_continuation_flags() {
        let cell = Cell::continuation(&CellAttrs::default());
        assert!(cell.is_continuation());
        assert!(!cell.is_wide());
        assert!(!cell.is_blank());
    }

    #[test]
    fn test_combining_mark_on_blank_cell() {
        let mut cell = Cell::default();
        cell.push_combining('\u{0301}');
        assert_eq!(cell.text, " \u{0301}");
    }

    #[test]
    fn test_color_to_crossterm() {
        assert_eq!(
            Color::Rgb(1, 2, 3).to_crossterm(),
            crossterm::style::Color::Rgb { r: 1, g: 2, b: 3 }
        );
        assert_eq!(
            Color::Indexed(9).to_crossterm(),
            crossterm::style::Color::AnsiValue(9)
        );
    }
}
