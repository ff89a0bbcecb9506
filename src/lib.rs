//! vtcore - a VT/ANSI terminal emulation core
//!
//! vtcore turns a stream of host program output - printable text mixed with
//! escape sequences - into an addressable character grid with cursor,
//! attribute and scrollback state, ready for a renderer to draw and for
//! shell-integration consumers to query.
//!
//! # Features
//!
//! - **VT/ANSI parsing**: CSI, OSC, DCS and C1 control forms, resilient to
//!   malformed input and arbitrary chunk boundaries
//! - **Screen buffers**: main buffer with FIFO scrollback plus an
//!   alternate screen for full-screen applications
//! - **Reflowing resize**: soft-wrapped lines re-wrap to the new width
//!   without losing or duplicating characters
//! - **Host notifications**: title, bell, clipboard, taskbar progress,
//!   working directory, window visibility, scroll position and reply bytes
//!   through one capability trait
//! - **Shell integration**: OSC 133 command marks and OSC 9;4 progress
//!
//! # Quick Start
//!
//! ```
//! use vtcore::Terminal;
//!
//! let mut term = Terminal::new(80, 24).unwrap();
//! term.write("\x1b[1mhello\x1b[0m world");
//! assert_eq!(term.buffer().screen_text(0), "hello world");
//! assert_eq!(term.buffer().cursor().x, 11);
//! ```
//!
//! # Data flow
//!
//! ```text
//! host bytes -> VtParser -> dispatch actions -> Terminal
//!            -> TextBuffer / Cursor / Viewport mutation
//!            -> TerminalEvents notifications (side effects)
//! ```
//!
//! The engine is single-writer: all mutation happens synchronously inside
//! [`Terminal::write`] on the caller's thread. Renderers reading buffer
//! state concurrently must be guarded by the host.

pub mod config;
pub mod events;
pub mod term;

pub use config::Config;
pub use events::{Response, TaskbarState, TerminalEvents};
pub use term::terminal::{Terminal, TerminalError};
