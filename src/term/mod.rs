//! Core terminal emulation components.
//!
//! This module contains the low-level terminal emulation logic:
//!
//! - **parser**: VT100/VT220 escape-sequence state machine
//! - **buffer**: cell grid, scrollback and reflow
//! - **cursor**: cursor position, style and save stack
//! - **viewport**: visible window and scroll marks
//! - **modes**: the flattened terminal mode record
//! - **terminal**: the facade tying it all together
//!
//! # Architecture
//!
//! ```text
//! Terminal
//! ├── VtParser (escape-sequence state machine)
//! ├── TextBuffer "main" (grid + scrollback + Cursor)
//! ├── TextBuffer "alt"  (only while a full-screen app holds it)
//! ├── Viewport (visible window, scroll marks)
//! └── ModeFlags
//! ```

pub mod buffer;
pub mod cell;
pub mod cursor;
pub mod modes;
pub mod parser;
pub mod terminal;
pub mod viewport;

pub use buffer::{LineRendition, Row, ScrollOutcome, TextBuffer};
pub use cell::{AttrFlags, Cell, CellAttrs, Color};
pub use cursor::{Cursor, CursorShape, SavedCursor};
pub use modes::{ModeFlags, MouseTracking};
pub use parser::{Dispatch, VtParser, MAX_PARAMS};
pub use terminal::{PatternSpan, Selection, Terminal, TerminalError};
pub use viewport::{ScrollMark, Viewport};
