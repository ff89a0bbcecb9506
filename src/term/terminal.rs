//! Terminal facade
//!
//! Owns the parser, the main screen buffer (always) and the alternate
//! screen buffer (only while a full-screen application holds it), the
//! viewport and the mode flags. Escape-sequence dispatch lands here and is
//! applied to whichever buffer is active; side effects (title, bell,
//! clipboard, taskbar, scroll movement, reply bytes) go out through the
//! host's [`TerminalEvents`] handler.
//!
//! All mutation is synchronous and single-threaded: a `write` call runs to
//! completion over its chunk, and parser state carries over so chunk
//! boundaries never change the result.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Weak;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;
use tracing::{debug, info, trace};
use unicode_width::UnicodeWidthChar;

use crate::config::{Config, TASKBAR_MIN_PROGRESS};
use crate::events::{Response, TaskbarState, TerminalEvents};
use crate::term::buffer::{LineRendition, ScrollOutcome, TextBuffer};
use crate::term::cell::{AttrFlags, Color};
use crate::term::cursor::CursorShape;
use crate::term::modes::{ModeFlags, MouseTracking};
use crate::term::parser::{Dispatch, VtParser};
use crate::term::viewport::{ScrollMark, Viewport};

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("invalid terminal dimensions {width}x{height}")]
    InvalidDimensions { width: u16, height: u16 },
}

pub type Result<T> = std::result::Result<T, TerminalError>;

/// Text selection in buffer coordinates (col, absolute row)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub start: (u16, usize),
    pub end: (u16, usize),
}

/// A detected hyperlink-like span in the visible viewport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternSpan {
    pub row: usize,
    pub start_col: usize,
    /// Exclusive
    pub end_col: usize,
}

/// The terminal engine
pub struct Terminal {
    parser: VtParser,
    main: TextBuffer,
    /// Present only while the alternate screen is active
    alt: Option<TextBuffer>,
    viewport: Viewport,
    /// The viewport is pinned to the live screen and follows new output
    viewport_follows: bool,
    modes: ModeFlags,
    config: Config,
    title: String,
    working_directory: Option<String>,
    taskbar_state: TaskbarState,
    taskbar_progress: usize,
    /// A resize requested while the alt screen was active; applied once on
    /// return to the main screen, later requests overwrite earlier ones
    deferred_resize: Option<(u16, u16)>,
    marks: Vec<ScrollMark>,
    /// Start row of a shell command whose end mark has not arrived yet
    open_mark: Option<usize>,
    selection: Option<Selection>,
    patterns: Vec<PatternSpan>,
    events: Option<Weak<dyn TerminalEvents>>,
    /// Incomplete UTF-8 sequence carried between `write_bytes` calls
    utf8_pending: Vec<u8>,
}

impl Terminal {
    pub fn new(width: u16, height: u16) -> Result<Self> {
        Self::with_config(width, height, Config::default())
    }

    pub fn with_config(width: u16, height: u16, config: Config) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TerminalError::InvalidDimensions { width, height });
        }
        let modes = ModeFlags {
            auto_wrap: config.auto_wrap,
            ..ModeFlags::default()
        };
        Ok(Self {
            parser: VtParser::new(),
            main: TextBuffer::new(width, height, config.scrollback_lines),
            alt: None,
            viewport: Viewport::new(width, height),
            viewport_follows: true,
            modes,
            config,
            title: String::new(),
            working_directory: None,
            taskbar_state: TaskbarState::Clear,
            taskbar_progress: 0,
            deferred_resize: None,
            marks: Vec::new(),
            open_mark: None,
            selection: None,
            patterns: Vec::new(),
            events: None,
            utf8_pending: Vec::new(),
        })
    }

    /// Register the host's event handler. Only a weak reference is kept;
    /// the host owns the handler's lifetime.
    pub fn set_event_handler(&mut self, events: Weak<dyn TerminalEvents>) {
        self.events = Some(events);
    }

    // --- input -----------------------------------------------------------

    /// Feed a chunk of the host program's output stream.
    ///
    /// Chunk boundaries are arbitrary: a sequence split across calls parses
    /// identically to unsplit input.
    pub fn write(&mut self, input: &str) {
        // The parser is detached while it drives dispatch back into self
        let mut parser = std::mem::take(&mut self.parser);
        parser.advance(input, self);
        self.parser = parser;
    }

    /// Feed raw bytes, decoding UTF-8 with a carry for sequences split
    /// across chunks. Invalid bytes print as U+FFFD.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let mut buf = std::mem::take(&mut self.utf8_pending);
        buf.extend_from_slice(bytes);
        let mut start = 0usize;
        while start < buf.len() {
            match std::str::from_utf8(&buf[start..]) {
                Ok(valid) => {
                    self.write(valid);
                    start = buf.len();
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if valid_up_to > 0 {
                        if let Ok(valid) = std::str::from_utf8(&buf[start..start + valid_up_to]) {
                            self.write(valid);
                        }
                    }
                    match e.error_len() {
                        Some(len) => {
                            self.write("\u{FFFD}");
                            start += valid_up_to + len;
                        }
                        None => {
                            self.utf8_pending = buf[start + valid_up_to..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    // --- queries ---------------------------------------------------------

    /// Read-only handle to the active buffer's rows, cells and cursor
    pub fn buffer(&self) -> &TextBuffer {
        self.alt.as_ref().unwrap_or(&self.main)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn modes(&self) -> &ModeFlags {
        &self.modes
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    pub fn taskbar(&self) -> (TaskbarState, usize) {
        (self.taskbar_state, self.taskbar_progress)
    }

    pub fn marks(&self) -> &[ScrollMark] {
        &self.marks
    }

    pub fn patterns(&self) -> &[PatternSpan] {
        &self.patterns
    }

    pub fn is_alt_screen_active(&self) -> bool {
        self.alt.is_some()
    }

    /// Sequences the parser absorbed as malformed
    pub fn discarded_sequences(&self) -> u64 {
        self.parser.discarded_sequences()
    }

    fn active(&mut self) -> &mut TextBuffer {
        self.alt.as_mut().unwrap_or(&mut self.main)
    }

    // --- resize ----------------------------------------------------------

    /// Resize to new dimensions.
    ///
    /// Fails on zero dimensions. While the alt screen is active the request
    /// is recorded (one slot, later requests overwrite) and applied when
    /// the main screen returns; otherwise the main buffer reflows now.
    pub fn user_resize(&mut self, width: u16, height: u16) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(TerminalError::InvalidDimensions { width, height });
        }
        if self.alt.is_some() {
            self.deferred_resize = Some((width, height));
            return Ok(());
        }
        self.resize_main(width, height);
        Ok(())
    }

    fn resize_main(&mut self, width: u16, height: u16) {
        info!("Resize: {}x{}", width, height);
        self.main.resize(width, height);
        let total = self.main.total_rows();
        let last = total - 1;
        for mark in &mut self.marks {
            mark.start_row = mark.start_row.min(last);
            mark.end_row = mark.end_row.min(last);
        }
        if let Some(open) = self.open_mark.as_mut() {
            *open = (*open).min(last);
        }
        self.selection = None;
        self.viewport.resize(width, height, total);
        self.viewport_follows = true;
        let _ = self.viewport.pin_to_bottom(total);
        self.refresh_pattern_detection();
        self.main.mark_all_dirty();
        self.notify_scroll();
    }

    // --- viewport --------------------------------------------------------

    /// Move the viewport to `top`. A no-op while the alt screen is active
    /// (its viewport is fixed at the origin).
    pub fn set_viewport_position(&mut self, top: usize) {
        if self.alt.is_some() {
            return;
        }
        let total = self.main.total_rows();
        let moved = self.viewport.set_top(top, total);
        self.viewport_follows = self.viewport.is_at_bottom(total);
        if moved {
            self.main.mark_all_dirty();
            self.notify_scroll();
        }
    }

    /// Return the viewport to the live screen region
    pub fn scroll_to_bottom(&mut self) {
        let total = self.buffer().total_rows();
        self.set_viewport_position(self.viewport.max_top(total));
    }

    /// Reconcile the viewport and marks after the backing store moved
    fn apply_scroll(&mut self, outcome: ScrollOutcome) {
        if outcome.appended == 0 && outcome.evicted == 0 {
            return;
        }
        if outcome.evicted > 0 {
            self.marks = self
                .marks
                .iter()
                .filter_map(|m| m.shifted(outcome.evicted))
                .collect();
            if let Some(open) = self.open_mark.as_mut() {
                *open = open.saturating_sub(outcome.evicted);
            }
            self.selection = None;
        }
        let total = self.buffer().total_rows();
        if self.viewport_follows {
            let _ = self.viewport.pin_to_bottom(total);
        } else {
            let top = self.viewport.top.saturating_sub(outcome.evicted);
            let _ = self.viewport.set_top(top, total);
        }
        self.notify_scroll();
    }

    // --- screen buffer switching -----------------------------------------

    /// Switch to the alternate screen buffer.
    ///
    /// The new buffer is exactly viewport-sized and keeps no scrollback.
    /// Cursor style and position travel with the switch, the position
    /// translated to be viewport-relative. Entering while already on the
    /// alt screen replaces it with a fresh one.
    pub fn use_alternate_screen_buffer(&mut self) {
        debug!("Switching to alternate screen buffer");
        let width = self.viewport.width;
        let height = self.viewport.height;

        let mut alt = TextBuffer::new(width, height, 0);
        {
            let main_cursor = self.main.cursor();
            let rel_y = main_cursor
                .y
                .saturating_sub(self.main.first_screen_row())
                .min(height as usize - 1);
            let alt_cursor = alt.cursor_mut();
            alt_cursor.copy_style_from(main_cursor);
            alt_cursor.x = main_cursor.x.min(width - 1);
            alt_cursor.y = rel_y;
        }
        // Replaces any previous alt buffer cleanly
        self.alt = Some(alt);

        self.modes.alt_screen = true;
        self.selection = None;
        self.refresh_pattern_detection();
        self.viewport_follows = true;
        let _ = self.viewport.pin_to_bottom(height as usize);
        self.active().mark_all_dirty();
        self.notify_scroll();
    }

    /// Switch back to the main screen buffer. A no-op when already there.
    ///
    /// Cursor state is copied back (position translated by the inverse
    /// viewport offset), the alt buffer is discarded and any resize that
    /// arrived while it was active is applied exactly once.
    pub fn use_main_screen_buffer(&mut self) {
        let Some(alt) = self.alt.take() else {
            return;
        };
        debug!("Switching to main screen buffer");
        {
            let alt_cursor = alt.cursor();
            let first = self.main.first_screen_row();
            let last = self.main.total_rows() - 1;
            let abs_y = (first + alt_cursor.y).min(last);
            let width = self.main.width();
            let main_cursor = self.main.cursor_mut();
            main_cursor.copy_style_from(alt_cursor);
            main_cursor.x = alt_cursor.x.min(width - 1);
            main_cursor.y = abs_y;
        }
        self.modes.alt_screen = false;
        self.selection = None;

        if let Some((width, height)) = self.deferred_resize.take() {
            self.resize_main(width, height);
        }

        self.viewport_follows = true;
        let total = self.main.total_rows();
        let _ = self.viewport.pin_to_bottom(total);
        self.refresh_pattern_detection();
        self.main.mark_all_dirty();
        self.notify_scroll();
    }

    // --- selection -------------------------------------------------------

    pub fn start_selection(&mut self, col: u16, screen_row: u16) {
        let row = self.viewport.buffer_row(screen_row);
        self.selection = Some(Selection {
            start: (col, row),
            end: (col, row),
        });
        self.active().mark_all_dirty();
    }

    pub fn update_selection(&mut self, col: u16, screen_row: u16) {
        let row = self.viewport.buffer_row(screen_row);
        if let Some(sel) = self.selection.as_mut() {
            sel.end = (col, row);
        }
        self.active().mark_all_dirty();
    }

    pub fn clear_selection(&mut self) {
        if self.selection.is_some() {
            self.selection = None;
            self.active().mark_all_dirty();
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Extract the selected text. Soft-wrapped rows join without a newline;
    /// trailing spaces are trimmed per line.
    pub fn selected_text(&self) -> Option<String> {
        let sel = self.selection.as_ref()?;
        let ((start_col, start_row), (end_col, end_row)) = normalize_selection(sel);
        let buffer = self.buffer();
        let mut result = String::new();
        for row_idx in start_row..=end_row {
            let Some(row) = buffer.row(row_idx) else {
                continue;
            };
            let col_start = if row_idx == start_row {
                start_col as usize
            } else {
                0
            };
            let col_end = if row_idx == end_row {
                (end_col as usize + 1).min(row.cells.len())
            } else {
                row.cells.len()
            };
            for cell in &row.cells[col_start.min(row.cells.len())..col_end] {
                if !cell.is_continuation() {
                    result.push_str(cell.display_text());
                }
            }
            if row_idx < end_row && !row.wrap_forced {
                while result.ends_with(' ') {
                    result.pop();
                }
                result.push('\n');
            }
        }
        while result.ends_with(' ') {
            result.pop();
        }
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    // --- pattern (hyperlink) detection -----------------------------------

    /// Rescan the visible viewport for URL-shaped spans. Called after
    /// buffer switches and resizes; hosts may call it after processing a
    /// batch of output.
    pub fn refresh_pattern_detection(&mut self) {
        let mut found = Vec::new();
        let buffer = self.alt.as_ref().unwrap_or(&self.main);
        for screen_row in 0..self.viewport.height {
            let row_idx = self.viewport.buffer_row(screen_row);
            let Some(row) = buffer.row(row_idx) else {
                continue;
            };
            let mut col = 0;
            while col < row.cells.len() {
                if row_starts_with(row, col, "http://") || row_starts_with(row, col, "https://") {
                    let start = col;
                    while col < row.cells.len() {
                        let cell = &row.cells[col];
                        if cell.is_continuation() {
                            col += 1;
                            continue;
                        }
                        if cell.is_blank()
                            || cell.text.chars().next().is_some_and(char::is_whitespace)
                        {
                            break;
                        }
                        col += 1;
                    }
                    found.push(PatternSpan {
                        row: row_idx,
                        start_col: start,
                        end_col: col,
                    });
                } else {
                    col += 1;
                }
            }
        }
        self.patterns = found;
    }

    // --- marks -----------------------------------------------------------

    /// Record a command-boundary mark directly (shell integration hosts)
    pub fn add_mark(&mut self, mark: ScrollMark) {
        let last = self.main.total_rows() - 1;
        self.marks.push(ScrollMark {
            start_row: mark.start_row.min(last),
            end_row: mark.end_row.min(last).max(mark.start_row.min(last)),
        });
    }

    // --- taskbar ---------------------------------------------------------

    /// Update the stored taskbar progress.
    ///
    /// Clear zeroes the stored value; Set overwrites it; Indeterminate
    /// leaves it alone; Error/Paused with progress 0 floor an empty value
    /// at `TASKBAR_MIN_PROGRESS` and otherwise keep it, while a nonzero
    /// progress always overwrites. Shells depend on these exact rules.
    pub fn set_taskbar_progress(&mut self, state: TaskbarState, progress: usize) {
        self.taskbar_state = state;
        match state {
            TaskbarState::Clear => {
                self.taskbar_progress = 0;
            }
            TaskbarState::Set => {
                self.taskbar_progress = progress;
            }
            TaskbarState::Indeterminate => {}
            TaskbarState::Error | TaskbarState::Paused => {
                if progress == 0 {
                    if self.taskbar_progress == 0 {
                        self.taskbar_progress = TASKBAR_MIN_PROGRESS;
                    }
                } else {
                    self.taskbar_progress = progress;
                }
            }
        }
        let stored = self.taskbar_progress;
        self.notify(|e| e.taskbar_progress(state, stored));
    }

    // --- notification plumbing -------------------------------------------

    /// Fire an event if a live handler is registered. A panicking handler
    /// is contained here and cannot corrupt parsing or buffer state.
    fn notify<F: FnOnce(&dyn TerminalEvents)>(&self, f: F) {
        let Some(events) = self.events.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| f(events.as_ref()))).is_err() {
            tracing::warn!("Terminal event handler panicked");
        }
    }

    fn notify_scroll(&self) {
        let top = self.viewport.top;
        let total = self.buffer().total_rows();
        self.notify(|e| e.scroll_position_changed(top, total));
    }

    fn respond(&self, response: Response) {
        let bytes = response.to_bytes();
        self.notify(|e| e.write_response(&bytes));
    }

    // --- control handling ------------------------------------------------

    fn do_linefeed(&mut self) {
        if self.modes.linefeed_newline {
            self.active().carriage_return();
        }
        let outcome = self.active().linefeed(true);
        self.apply_scroll(outcome);
    }

    /// Full reset (RIS): fresh main buffer, modes and ancillary state
    fn reset_all(&mut self) {
        info!("Full terminal reset");
        let width = self.viewport.width;
        let height = self.viewport.height;
        self.main = TextBuffer::new(width, height, self.config.scrollback_lines);
        self.alt = None;
        self.modes = ModeFlags {
            auto_wrap: self.config.auto_wrap,
            ..ModeFlags::default()
        };
        self.title.clear();
        self.working_directory = None;
        self.taskbar_state = TaskbarState::Clear;
        self.taskbar_progress = 0;
        self.deferred_resize = None;
        self.marks.clear();
        self.open_mark = None;
        self.selection = None;
        self.patterns.clear();
        self.viewport = Viewport::new(width, height);
        self.viewport_follows = true;
        self.notify_scroll();
    }

    fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => self.modes.application_cursor = enable,
            6 => {
                self.modes.origin_mode = enable;
                let origin = self.modes.origin_mode;
                self.active().cursor_position(1, 1, origin);
            }
            7 => self.modes.auto_wrap = enable,
            12 => self.active().cursor_mut().blink_allowed = enable,
            25 => self.active().cursor_mut().visible = enable,
            47 | 1047 => {
                if enable {
                    self.use_alternate_screen_buffer();
                } else {
                    self.use_main_screen_buffer();
                }
            }
            1048 => {
                if enable {
                    self.active().save_cursor();
                } else {
                    self.active().restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.main.save_cursor();
                    self.use_alternate_screen_buffer();
                } else {
                    self.use_main_screen_buffer();
                    self.main.restore_cursor();
                }
            }
            1000 => self.set_mouse_tracking(MouseTracking::Normal, enable),
            1002 => self.set_mouse_tracking(MouseTracking::ButtonDrag, enable),
            1003 => self.set_mouse_tracking(MouseTracking::AnyMotion, enable),
            1006 => self.modes.sgr_mouse = enable,
            2004 => self.modes.bracketed_paste = enable,
            _ => debug!("Unhandled private mode {} (enable={})", mode, enable),
        }
    }

    fn set_mouse_tracking(&mut self, protocol: MouseTracking, enable: bool) {
        if enable {
            self.modes.mouse_tracking = protocol;
        } else if self.modes.mouse_tracking == protocol {
            self.modes.mouse_tracking = MouseTracking::Off;
        }
    }

    fn set_ansi_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            4 => self.modes.insert_mode = enable,
            20 => self.modes.linefeed_newline = enable,
            _ => debug!("Unhandled ANSI mode {} (enable={})", mode, enable),
        }
    }

    fn select_graphic_rendition(&mut self, params: &[u16]) {
        let attrs = self.active().attrs_mut();
        if params.is_empty() {
            attrs.reset();
            return;
        }

        let mut iter = params.iter();
        while let Some(&param) = iter.next() {
            match param {
                0 => attrs.reset(),
                1 => attrs.flags |= AttrFlags::BOLD,
                2 => attrs.flags |= AttrFlags::DIM,
                3 => attrs.flags |= AttrFlags::ITALIC,
                4 => attrs.flags |= AttrFlags::UNDERLINE,
                5 => attrs.flags |= AttrFlags::BLINK,
                7 => attrs.flags |= AttrFlags::INVERSE,
                8 => attrs.flags |= AttrFlags::HIDDEN,
                9 => attrs.flags |= AttrFlags::STRIKETHROUGH,

                22 => attrs.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                23 => attrs.flags &= !AttrFlags::ITALIC,
                24 => attrs.flags &= !AttrFlags::UNDERLINE,
                25 => attrs.flags &= !AttrFlags::BLINK,
                27 => attrs.flags &= !AttrFlags::INVERSE,
                28 => attrs.flags &= !AttrFlags::HIDDEN,
                29 => attrs.flags &= !AttrFlags::STRIKETHROUGH,

                30..=37 => attrs.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.fg = color;
                    }
                }
                39 => attrs.fg = Color::Default,

                40..=47 => attrs.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.bg = color;
                    }
                }
                49 => attrs.bg = Color::Default,

                90..=97 => attrs.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => attrs.bg = Color::Indexed((param - 100 + 8) as u8),

                _ => {}
            }
        }
    }

    fn device_status_report(&mut self, kind: u16) {
        match kind {
            5 => self.respond(Response::StatusOk),
            6 => {
                let (row, col) = self.buffer().cursor_screen_pos();
                self.respond(Response::CursorPosition(row + 1, col + 1));
            }
            _ => {}
        }
    }

    fn set_cursor_style(&mut self, param: u16) {
        let shape = CursorShape::from_decscusr(param as u8);
        let blinking = matches!(
            shape,
            CursorShape::Default
                | CursorShape::BlinkingBlock
                | CursorShape::BlinkingUnderline
                | CursorShape::BlinkingBar
        );
        let cursor = self.active().cursor_mut();
        cursor.shape = shape;
        cursor.blink_allowed = blinking;
    }

    // --- OSC handling ----------------------------------------------------

    fn osc_title(&mut self, payload: &str) {
        self.title = payload.to_string();
        let title = self.title.clone();
        self.notify(|e| e.title_changed(&title));
    }

    /// OSC 9 carries the ConEmu extensions; `4;state;progress` drives the
    /// taskbar indicator.
    fn osc_progress(&mut self, payload: &str) {
        let mut parts = payload.split(';');
        if parts.next() != Some("4") {
            debug!("Unhandled OSC 9 payload: {:?}", payload);
            return;
        }
        let state = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .and_then(TaskbarState::from_osc);
        let progress = parts
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        match state {
            Some(state) => self.set_taskbar_progress(state, progress),
            None => debug!("Unhandled OSC 9;4 payload: {:?}", payload),
        }
    }

    /// OSC 52: clipboard write. Payload is `selection;base64-data`.
    fn osc_clipboard(&mut self, payload: &str) {
        let Some((_, data)) = payload.split_once(';') else {
            return;
        };
        if data == "?" {
            // Clipboard queries are not answered
            return;
        }
        match BASE64.decode(data.as_bytes()) {
            Ok(decoded) => {
                let text = String::from_utf8_lossy(&decoded).into_owned();
                self.notify(|e| e.copy_to_clipboard(&text));
            }
            Err(_) => debug!("Ignoring OSC 52 with invalid base64"),
        }
    }

    /// OSC 7: working directory as a file:// URI
    fn osc_working_directory(&mut self, payload: &str) {
        self.working_directory = Some(payload.to_string());
        let uri = payload.to_string();
        self.notify(|e| e.working_directory_changed(&uri));
    }

    /// OSC 133 shell integration: `A` opens a command span at the cursor
    /// row, `D` closes it into a scroll mark. Only the main screen keeps
    /// marks.
    fn osc_shell_integration(&mut self, payload: &str) {
        if self.alt.is_some() {
            return;
        }
        let kind = payload.split(';').next().unwrap_or("");
        match kind {
            "A" => {
                self.open_mark = Some(self.main.cursor().y);
            }
            "D" => {
                if let Some(start) = self.open_mark.take() {
                    let end = self.main.cursor().y.max(start);
                    self.marks.push(ScrollMark {
                        start_row: start,
                        end_row: end,
                    });
                }
            }
            // B (command start) and C (output start) don't bound the span
            _ => {}
        }
    }
}

impl Dispatch for Terminal {
    fn print(&mut self, ch: char) {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0) as u16;
        let auto_wrap = self.modes.auto_wrap;
        let insert = self.modes.insert_mode;
        let mut tmp = [0u8; 4];
        let cluster: &str = ch.encode_utf8(&mut tmp);
        let buffer = self.active();
        if insert && width > 0 {
            buffer.insert_chars(width);
        }
        let outcome = buffer.write_cluster(cluster, width, auto_wrap);
        self.apply_scroll(outcome);
    }

    fn execute(&mut self, control: u8) {
        match control {
            0x07 => self.notify(|e| e.bell()),
            0x08 => self.active().backspace(),
            0x09 => {
                let tab_width = self.config.tab_width;
                self.active().horizontal_tab(tab_width);
            }
            0x0a | 0x0b | 0x0c => self.do_linefeed(),
            0x0d => self.active().carriage_return(),
            // Charset shifts (SO/SI) are accepted and ignored
            0x0e | 0x0f => {}
            // C1 forms: IND, NEL, RI
            0x84 => {
                let outcome = self.active().linefeed(false);
                self.apply_scroll(outcome);
            }
            0x85 => {
                self.active().carriage_return();
                let outcome = self.active().linefeed(true);
                self.apply_scroll(outcome);
            }
            0x8d => self.active().reverse_index(),
            _ => trace!("Ignoring control 0x{:02x}", control),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], final_byte: u8) {
        match (intermediates.first(), final_byte) {
            (None, b'7') => self.active().save_cursor(),
            (None, b'8') => self.active().restore_cursor(),
            (None, b'D') => {
                let outcome = self.active().linefeed(false);
                self.apply_scroll(outcome);
            }
            (None, b'E') => {
                self.active().carriage_return();
                let outcome = self.active().linefeed(true);
                self.apply_scroll(outcome);
            }
            (None, b'M') => self.active().reverse_index(),
            (None, b'c') => self.reset_all(),
            (None, b'=') => self.modes.application_keypad = true,
            (None, b'>') => self.modes.application_keypad = false,
            (Some(b'#'), b'3') => self.active().set_line_rendition(LineRendition::DoubleHeightTop),
            (Some(b'#'), b'4') => {
                self.active().set_line_rendition(LineRendition::DoubleHeightBottom)
            }
            (Some(b'#'), b'5') => self.active().set_line_rendition(LineRendition::SingleWidth),
            (Some(b'#'), b'6') => self.active().set_line_rendition(LineRendition::DoubleWidth),
            (Some(b'#'), b'8') => self.active().fill_screen('E'),
            // Charset designations (ESC ( .., ESC ) ..) are ignored
            (Some(b'('), _) | (Some(b')'), _) => {}
            _ => debug!(
                "Unknown escape: intermediates={:?}, final={:?}",
                intermediates, final_byte as char
            ),
        }
    }

    fn csi_dispatch(
        &mut self,
        params: &[u16],
        private_marker: Option<u8>,
        intermediates: &[u8],
        final_byte: u8,
    ) {
        let p1 = params.first().copied().unwrap_or(0);
        match (private_marker, final_byte) {
            // Cursor movement
            (None, b'A') => self.active().cursor_up(p1.max(1)),
            (None, b'B') => self.active().cursor_down(p1.max(1)),
            (None, b'C') => self.active().cursor_forward(p1.max(1)),
            (None, b'D') => self.active().cursor_backward(p1.max(1)),
            (None, b'E') => {
                self.active().cursor_down(p1.max(1));
                self.active().carriage_return();
            }
            (None, b'F') => {
                self.active().cursor_up(p1.max(1));
                self.active().carriage_return();
            }
            (None, b'G') | (None, b'`') => self.active().cursor_column(p1.max(1)),
            (None, b'H') | (None, b'f') => {
                let row = p1.max(1);
                let col = params.get(1).copied().unwrap_or(1).max(1);
                let origin = self.modes.origin_mode;
                self.active().cursor_position(row, col, origin);
            }
            (None, b'd') => self.active().cursor_row(p1.max(1)),

            // Erase
            (None, b'J') => {
                let dropped = self.active().erase_in_display(p1);
                self.apply_scroll(ScrollOutcome {
                    appended: 0,
                    evicted: dropped,
                });
            }
            (None, b'K') => self.active().erase_in_line(p1),
            (None, b'X') => self.active().erase_chars(p1.max(1)),

            // Line and character shifting
            (None, b'L') => self.active().insert_lines(p1.max(1)),
            (None, b'M') => self.active().delete_lines(p1.max(1)),
            (None, b'@') => self.active().insert_chars(p1.max(1)),
            (None, b'P') => self.active().delete_chars(p1.max(1)),

            // Scrolling
            (None, b'S') => {
                let outcome = self.active().scroll_up(p1.max(1));
                self.apply_scroll(outcome);
            }
            (None, b'T') => self.active().scroll_down(p1.max(1)),
            (None, b'r') => {
                let bottom = params.get(1).copied().unwrap_or(0);
                let origin = self.modes.origin_mode;
                let buffer = self.active();
                buffer.set_scroll_region(p1.max(1), bottom);
                buffer.cursor_position(1, 1, origin);
            }

            // Attributes
            (None, b'm') => self.select_graphic_rendition(params),

            // Save/restore cursor
            (None, b's') => self.active().save_cursor(),
            (None, b'u') => self.active().restore_cursor(),

            // Reports
            (None, b'n') => self.device_status_report(p1),
            (None, b'c') => self.respond(Response::DeviceAttributes),
            (Some(b'>'), b'c') => self.respond(Response::SecondaryDeviceAttributes),

            // Cursor style (DECSCUSR)
            (None, b'q') if intermediates == [b' '] => self.set_cursor_style(p1),

            // Window manipulation: only show/hide are honored
            (None, b't') => match p1 {
                1 => self.notify(|e| e.show_window(true)),
                2 => self.notify(|e| e.show_window(false)),
                _ => debug!("Ignoring window manipulation {}", p1),
            },

            // Modes
            (Some(b'?'), b'h') => {
                for &p in params {
                    self.set_private_mode(p, true);
                }
            }
            (Some(b'?'), b'l') => {
                for &p in params {
                    self.set_private_mode(p, false);
                }
            }
            (None, b'h') => {
                for &p in params {
                    self.set_ansi_mode(p, true);
                }
            }
            (None, b'l') => {
                for &p in params {
                    self.set_ansi_mode(p, false);
                }
            }

            _ => {
                debug!(
                    "Unknown CSI: private={:?}, intermediates={:?}, params={:?}, final={:?}",
                    private_marker, intermediates, params, final_byte as char
                );
            }
        }
    }

    fn osc_dispatch(&mut self, code: u16, payload: &str) {
        match code {
            0 | 1 | 2 => self.osc_title(payload),
            7 => self.osc_working_directory(payload),
            9 => self.osc_progress(payload),
            52 => self.osc_clipboard(payload),
            133 => self.osc_shell_integration(payload),
            _ => debug!("Unhandled OSC {}: {:?}", code, payload),
        }
    }

    fn dcs_hook(&mut self, params: &[u16], intermediates: &[u8], final_byte: u8) {
        trace!(
            "DCS hook: params={:?}, intermediates={:?}, final={:?}",
            params,
            intermediates,
            final_byte as char
        );
    }

    fn dcs_put(&mut self, chunk: &str) {
        trace!("DCS passthrough: {} chars", chunk.len());
    }

    fn dcs_unhook(&mut self) {
        trace!("DCS end");
    }
}

fn normalize_selection(sel: &Selection) -> ((u16, usize), (u16, usize)) {
    let (start, end) = (sel.start, sel.end);
    if start.1 < end.1 || (start.1 == end.1 && start.0 <= end.0) {
        (start, end)
    } else {
        (end, start)
    }
}

fn row_starts_with(row: &crate::term::buffer::Row, col: usize, needle: &str) -> bool {
    let mut i = col;
    for nc in needle.chars() {
        match row.cells.get(i) {
            Some(cell) if cell.text.chars().next() == Some(nc) => i += 1,
            _ => return false,
        }
    }
    true
}

fn extended_color<'a, I: Iterator<Item = &'a u16>>(iter: &mut I) -> Option<Color> {
    match iter.next().copied() {
        Some(5) => iter.next().map(|&n| Color::Indexed(n as u8)),
        Some(2) => {
            let r = iter.next().copied().unwrap_or(0) as u8;
            let g = iter.next().copied().unwrap_or(0) as u8;
            let b = iter.next().copied().unwrap_or(0) as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}
