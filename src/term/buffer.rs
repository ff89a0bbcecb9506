//! Screen buffer
//!
//! The backing store is one `VecDeque<Row>` holding scrollback plus the
//! screen region (always the last `height` rows). The main buffer grows at
//! the bottom as output scrolls and evicts its oldest rows FIFO once the
//! scrollback capacity is exceeded; the alt buffer is built with capacity 0
//! and therefore only ever rotates rows in place.
//!
//! Every coordinate arriving from escape-sequence dispatch is clamped into
//! range before use; none of these operations can move the cursor out of
//! bounds.

use std::collections::{HashSet, VecDeque};

use super::cell::{Cell, CellAttrs};
use super::cursor::Cursor;

/// Line rendition selected by `ESC # 3..6`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineRendition {
    #[default]
    SingleWidth,
    DoubleWidth,
    DoubleHeightTop,
    DoubleHeightBottom,
}

/// A single row of the grid
#[derive(Clone, Debug)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// True iff the row was filled by column overflow rather than an
    /// explicit newline. The resize reflow joins such rows with their
    /// successor.
    pub wrap_forced: bool,
    pub rendition: LineRendition,
}

impl Row {
    pub fn new(width: u16) -> Self {
        Self {
            cells: vec![Cell::default(); width as usize],
            wrap_forced: false,
            rendition: LineRendition::default(),
        }
    }

    pub fn clear(&mut self, attrs: &CellAttrs) {
        for cell in &mut self.cells {
            cell.clear(attrs);
        }
        self.wrap_forced = false;
        self.rendition = LineRendition::default();
    }

    /// Number of cells up to and including the last non-blank one
    pub fn content_len(&self) -> usize {
        let mut len = self.cells.len();
        while len > 0 && self.cells[len - 1].is_blank() {
            len -= 1;
        }
        len
    }

    /// Row text with trailing blanks trimmed; continuation cells are skipped
    pub fn text(&self) -> String {
        let mut out = String::new();
        for cell in &self.cells[..self.content_len()] {
            if !cell.is_continuation() {
                out.push_str(cell.display_text());
            }
        }
        out
    }
}

/// Effect of a scroll on the backing store
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// Rows appended at the bottom (screen region moved down)
    pub appended: usize,
    /// Oldest rows evicted from the front of the store
    pub evicted: usize,
}

impl ScrollOutcome {
    pub fn merge(&mut self, other: ScrollOutcome) {
        self.appended += other.appended;
        self.evicted += other.evicted;
    }
}

/// Character grid with scrollback, current attributes and one cursor
pub struct TextBuffer {
    width: u16,
    height: u16,
    rows: VecDeque<Row>,
    scrollback_limit: usize,
    attrs: CellAttrs,
    cursor: Cursor,
    /// Scroll region (top, bottom), screen-relative, 0-indexed, inclusive
    scroll_region: (u16, u16),
    dirty_rows: HashSet<usize>,
    full_redraw: bool,
}

impl TextBuffer {
    pub fn new(width: u16, height: u16, scrollback_limit: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            rows: (0..height).map(|_| Row::new(width)).collect(),
            scrollback_limit,
            attrs: CellAttrs::default(),
            cursor: Cursor::default(),
            scroll_region: (0, height - 1),
            dirty_rows: HashSet::new(),
            full_redraw: true,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn scrollback_limit(&self) -> usize {
        self.scrollback_limit
    }

    /// Absolute index of the first screen-region row
    pub fn first_screen_row(&self) -> usize {
        self.rows.len() - self.height as usize
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Row `r` of the screen region
    pub fn screen_row(&self, r: u16) -> &Row {
        let r = r.min(self.height - 1);
        &self.rows[self.first_screen_row() + r as usize]
    }

    /// Text of screen row `r`, trailing blanks trimmed
    pub fn screen_text(&self, r: u16) -> String {
        self.screen_row(r).text()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// Cursor position relative to the screen region (row, col)
    pub fn cursor_screen_pos(&self) -> (u16, u16) {
        let row = self.cursor.y.saturating_sub(self.first_screen_row());
        (row.min(self.height as usize - 1) as u16, self.cursor.x)
    }

    pub fn attrs(&self) -> &CellAttrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut CellAttrs {
        &mut self.attrs
    }

    pub fn scroll_region(&self) -> (u16, u16) {
        self.scroll_region
    }

    fn row_mut(&mut self, index: usize) -> &mut Row {
        &mut self.rows[index]
    }

    // --- damage tracking -------------------------------------------------

    pub fn mark_dirty(&mut self, row: usize) {
        self.dirty_rows.insert(row);
    }

    pub fn mark_all_dirty(&mut self) {
        self.full_redraw = true;
    }

    pub fn dirty_rows(&self) -> &HashSet<usize> {
        &self.dirty_rows
    }

    pub fn needs_full_redraw(&self) -> bool {
        self.full_redraw
    }

    pub fn clear_dirty(&mut self) {
        self.dirty_rows.clear();
        self.full_redraw = false;
    }

    // --- writing ---------------------------------------------------------

    /// Write one grapheme cluster at the cursor using the current attributes
    /// and advance the cursor by `display_width`.
    ///
    /// Filling the last column wraps immediately when `auto_wrap` is set:
    /// the row is flagged `wrap_forced` and the cursor moves to column 0 of
    /// the next row, scrolling if needed. An explicit newline arriving right
    /// after such a wrap is merged into it (see [`Self::linefeed`]).
    pub fn write_cluster(
        &mut self,
        cluster: &str,
        display_width: u16,
        auto_wrap: bool,
    ) -> ScrollOutcome {
        if display_width == 0 {
            self.put_combining(cluster);
            return ScrollOutcome::default();
        }
        self.cursor.just_wrapped = false;

        let width = self.width;
        // A wide glyph with only one column left wraps (or clamps) before
        // writing, so its two halves never straddle a row boundary.
        let mut outcome = ScrollOutcome::default();
        if display_width == 2 && self.cursor.x == width - 1 {
            if auto_wrap {
                outcome.merge(self.force_wrap());
            } else {
                self.cursor.x = width.saturating_sub(2);
            }
        }

        let row = self.cursor.y;
        let col = self.cursor.x as usize;
        self.unsplit_wide(row, col);
        if display_width == 2 && col + 1 < width as usize {
            self.unsplit_wide(row, col + 1);
        }

        let attrs = self.attrs.clone();
        let wide = display_width == 2;
        {
            let row_ref = self.row_mut(row);
            row_ref.cells[col] = Cell {
                text: cluster.to_string(),
                width: display_width.min(2) as u8,
                attrs: attrs.clone(),
            };
            if wide && col + 1 < width as usize {
                row_ref.cells[col + 1] = Cell::continuation(&attrs);
            }
        }
        self.mark_dirty(row);

        let new_x = self.cursor.x as usize + display_width as usize;
        if new_x >= width as usize {
            if auto_wrap {
                outcome.merge(self.force_wrap());
                self.cursor.just_wrapped = true;
            } else {
                self.cursor.x = width - 1;
            }
        } else {
            self.cursor.x = new_x as u16;
        }
        outcome
    }

    /// Wrap at the right margin: flag the row and move to column 0 of the
    /// next row, scrolling if needed.
    fn force_wrap(&mut self) -> ScrollOutcome {
        let row = self.cursor.y;
        self.row_mut(row).wrap_forced = true;
        self.mark_dirty(row);
        self.cursor.x = 0;
        self.advance_row()
    }

    /// Append a combining mark to the cell just behind the cursor
    fn put_combining(&mut self, cluster: &str) {
        let row = self.cursor.y;
        let mut col = self.cursor.x as usize;
        if col == 0 {
            return;
        }
        col -= 1;
        if self.rows[row].cells[col].is_continuation() && col > 0 {
            col -= 1;
        }
        for ch in cluster.chars() {
            self.row_mut(row).cells[col].push_combining(ch);
        }
        self.mark_dirty(row);
    }

    /// Blank out both halves of a wide glyph that is being partially
    /// overwritten at (row, col).
    fn unsplit_wide(&mut self, row: usize, col: usize) {
        let attrs = self.attrs.clone();
        let width = self.width as usize;
        let row_ref = self.row_mut(row);
        if row_ref.cells[col].is_continuation() && col > 0 {
            row_ref.cells[col - 1] = Cell::blank(&attrs);
        }
        if row_ref.cells[col].is_wide() && col + 1 < width {
            row_ref.cells[col + 1] = Cell::blank(&attrs);
        }
    }

    // --- cursor movement -------------------------------------------------

    pub fn carriage_return(&mut self) {
        self.cursor.x = 0;
        let row = self.cursor.y;
        self.mark_dirty(row);
    }

    /// Line feed. `explicit` distinguishes a real newline control from the
    /// internal feed performed by auto-wrap: an explicit newline clears
    /// `wrap_forced` on the row it leaves, and when it arrives immediately
    /// after a forced wrap it is merged into that wrap (the filled row
    /// becomes a hard-ended line and no extra row is consumed).
    pub fn linefeed(&mut self, explicit: bool) -> ScrollOutcome {
        if explicit && self.cursor.just_wrapped && self.cursor.y > 0 {
            let prev = self.cursor.y - 1;
            self.row_mut(prev).wrap_forced = false;
            self.mark_dirty(prev);
            self.cursor.just_wrapped = false;
            return ScrollOutcome::default();
        }
        if explicit {
            let row = self.cursor.y;
            self.row_mut(row).wrap_forced = false;
            self.mark_dirty(row);
        }
        self.cursor.just_wrapped = false;
        self.advance_row()
    }

    /// Cursor down one row, scrolling when at the scroll-region bottom
    fn advance_row(&mut self) -> ScrollOutcome {
        let (_, bottom) = self.scroll_region;
        let (screen_row, _) = self.cursor_screen_pos();
        if screen_row == bottom {
            self.scroll_up(1)
        } else {
            if (screen_row as usize) < self.height as usize - 1 {
                self.cursor.y += 1;
            }
            ScrollOutcome::default()
        }
    }

    pub fn backspace(&mut self) {
        self.cursor.just_wrapped = false;
        self.cursor.x = self.cursor.x.saturating_sub(1);
    }

    /// Move to the next tab stop (`tab_width` columns apart)
    pub fn horizontal_tab(&mut self, tab_width: u16) {
        let tab_width = tab_width.max(1);
        self.cursor.just_wrapped = false;
        let next = ((self.cursor.x / tab_width) + 1) * tab_width;
        self.cursor.x = next.min(self.width - 1);
    }

    pub fn cursor_up(&mut self, n: u16) {
        self.cursor.just_wrapped = false;
        let first = self.first_screen_row();
        let n = n.max(1) as usize;
        self.cursor.y = self.cursor.y.saturating_sub(n).max(first);
    }

    pub fn cursor_down(&mut self, n: u16) {
        self.cursor.just_wrapped = false;
        let last = self.rows.len() - 1;
        self.cursor.y = (self.cursor.y + n.max(1) as usize).min(last);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.just_wrapped = false;
        self.cursor.x = (self.cursor.x + n.max(1)).min(self.width - 1);
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.just_wrapped = false;
        self.cursor.x = self.cursor.x.saturating_sub(n.max(1));
    }

    /// Set the cursor from 1-indexed CUP parameters. With `origin_mode` the
    /// row is relative to (and confined to) the scroll region.
    pub fn cursor_position(&mut self, row: u16, col: u16, origin_mode: bool) {
        self.cursor.just_wrapped = false;
        let row = row.max(1) - 1;
        let col = col.max(1) - 1;
        let screen_row = if origin_mode {
            let (top, bottom) = self.scroll_region;
            (top + row).min(bottom)
        } else {
            row.min(self.height - 1)
        };
        self.cursor.y = self.first_screen_row() + screen_row as usize;
        self.cursor.x = col.min(self.width - 1);
    }

    /// Move to an absolute screen row, keeping the column (VPA)
    pub fn cursor_row(&mut self, row: u16) {
        self.cursor.just_wrapped = false;
        let screen_row = row.max(1) - 1;
        self.cursor.y = self.first_screen_row() + screen_row.min(self.height - 1) as usize;
    }

    /// Move to an absolute column, keeping the row (CHA)
    pub fn cursor_column(&mut self, col: u16) {
        self.cursor.just_wrapped = false;
        self.cursor.x = (col.max(1) - 1).min(self.width - 1);
    }

    // --- save / restore --------------------------------------------------

    pub fn save_cursor(&mut self) {
        let (screen_row, _) = self.cursor_screen_pos();
        let attrs = self.attrs.clone();
        self.cursor.save(screen_row, attrs);
    }

    pub fn restore_cursor(&mut self) {
        let snap = self.cursor.restore();
        self.cursor.x = snap.x.min(self.width - 1);
        let screen_row = snap.screen_row.min(self.height - 1);
        self.cursor.y = self.first_screen_row() + screen_row as usize;
        self.cursor.just_wrapped = false;
        self.attrs = snap.attrs;
    }

    // --- scrolling -------------------------------------------------------

    /// Scroll the region up by `n` rows. When the region spans the whole
    /// screen and this buffer keeps scrollback, rows are appended at the
    /// bottom of the store so the departing content survives as history
    /// (evicting the oldest rows FIFO past capacity); otherwise the region
    /// rotates in place. The cursor keeps its screen position either way.
    pub fn scroll_up(&mut self, n: u16) -> ScrollOutcome {
        let n = n.max(1) as usize;
        let (top, bottom) = self.scroll_region;
        let full_screen = top == 0 && bottom == self.height - 1;
        let (screen_row, _) = self.cursor_screen_pos();
        let mut outcome = ScrollOutcome::default();

        if full_screen && self.scrollback_limit > 0 {
            let cap = self.height as usize + self.scrollback_limit;
            for _ in 0..n {
                self.rows.push_back(Row::new(self.width));
                outcome.appended += 1;
                if self.rows.len() > cap {
                    self.rows.pop_front();
                    outcome.evicted += 1;
                }
            }
        } else {
            let first = self.first_screen_row();
            let abs_top = first + top as usize;
            let abs_bottom = first + bottom as usize;
            for _ in 0..n {
                let _ = self.rows.remove(abs_top);
                self.rows.insert(abs_bottom, Row::new(self.width));
            }
        }

        // Same screen position, whichever way the store moved
        self.cursor.y = self.first_screen_row() + screen_row as usize;
        self.mark_all_dirty();
        outcome
    }

    /// Scroll the region down by `n` rows. Never touches scrollback.
    pub fn scroll_down(&mut self, n: u16) {
        let n = n.max(1) as usize;
        let (top, bottom) = self.scroll_region;
        let first = self.first_screen_row();
        let abs_top = first + top as usize;
        let abs_bottom = first + bottom as usize;
        for _ in 0..n {
            let _ = self.rows.remove(abs_bottom);
            self.rows.insert(abs_top, Row::new(self.width));
        }
        self.mark_all_dirty();
    }

    /// Reverse index: cursor up, scrolling down when at the region top
    pub fn reverse_index(&mut self) {
        let (top, _) = self.scroll_region;
        let (screen_row, _) = self.cursor_screen_pos();
        if screen_row == top {
            self.scroll_down(1);
        } else {
            self.cursor_up(1);
        }
    }

    /// Set the scroll region from 1-indexed DECSTBM parameters; bounds are
    /// clamped into range and ignored when degenerate.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = top.max(1) - 1;
        let bottom = if bottom == 0 { self.height - 1 } else { bottom - 1 };
        let top = top.min(self.height - 1);
        let bottom = bottom.min(self.height - 1);
        if top < bottom {
            self.scroll_region = (top, bottom);
        }
    }

    // --- erasing ---------------------------------------------------------

    /// Erase in line: 0 = cursor to end, 1 = start to cursor, 2 = all
    pub fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor.y;
        let col = self.cursor.x as usize;
        let attrs = self.attrs.clone();
        let width = self.width as usize;
        let row_ref = self.row_mut(row);
        match mode {
            0 => {
                for c in col..width {
                    row_ref.cells[c].clear(&attrs);
                }
                row_ref.wrap_forced = false;
            }
            1 => {
                for c in 0..=col.min(width - 1) {
                    row_ref.cells[c].clear(&attrs);
                }
            }
            2 => row_ref.clear(&attrs),
            _ => {}
        }
        self.mark_dirty(row);
    }

    /// Erase in display over the screen region: 0 = cursor to end,
    /// 1 = start to cursor, 2 = whole screen, 3 = screen plus scrollback.
    /// Returns the number of scrollback rows dropped (mode 3 only).
    pub fn erase_in_display(&mut self, mode: u16) -> usize {
        let first = self.first_screen_row();
        let last = self.rows.len() - 1;
        let cursor_row = self.cursor.y.clamp(first, last);
        let attrs = self.attrs.clone();
        match mode {
            0 => {
                self.erase_in_line(0);
                for r in (cursor_row + 1)..=last {
                    self.row_mut(r).clear(&attrs);
                    self.mark_dirty(r);
                }
            }
            1 => {
                for r in first..cursor_row {
                    self.row_mut(r).clear(&attrs);
                    self.mark_dirty(r);
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                for r in first..=last {
                    self.row_mut(r).clear(&attrs);
                }
                self.mark_all_dirty();
                if mode == 3 && first > 0 {
                    self.rows.drain(..first);
                    self.cursor.y = self.cursor.y.saturating_sub(first);
                    return first;
                }
            }
            _ => {}
        }
        0
    }

    /// Erase `n` cells at the cursor without shifting (ECH)
    pub fn erase_chars(&mut self, n: u16) {
        let row = self.cursor.y;
        let col = self.cursor.x as usize;
        let attrs = self.attrs.clone();
        let width = self.width as usize;
        let end = (col + n.max(1) as usize).min(width);
        let row_ref = self.row_mut(row);
        for c in col..end {
            row_ref.cells[c].clear(&attrs);
        }
        self.mark_dirty(row);
    }

    // --- line / character shifting ---------------------------------------

    /// Insert `n` blank rows at the cursor, shifting rows down within the
    /// scroll region. A no-op when the cursor is outside the region.
    pub fn insert_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let (screen_row, _) = self.cursor_screen_pos();
        if screen_row < top || screen_row > bottom {
            return;
        }
        let first = self.first_screen_row();
        let abs_cursor = first + screen_row as usize;
        let abs_bottom = first + bottom as usize;
        let n = (n.max(1) as usize).min(bottom as usize - screen_row as usize + 1);
        for _ in 0..n {
            let _ = self.rows.remove(abs_bottom);
            self.rows.insert(abs_cursor, Row::new(self.width));
        }
        self.cursor.x = 0;
        self.cursor.just_wrapped = false;
        self.mark_all_dirty();
    }

    /// Delete `n` rows at the cursor, shifting rows up within the scroll
    /// region. A no-op when the cursor is outside the region.
    pub fn delete_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let (screen_row, _) = self.cursor_screen_pos();
        if screen_row < top || screen_row > bottom {
            return;
        }
        let first = self.first_screen_row();
        let abs_cursor = first + screen_row as usize;
        let abs_bottom = first + bottom as usize;
        let n = (n.max(1) as usize).min(bottom as usize - screen_row as usize + 1);
        for _ in 0..n {
            let _ = self.rows.remove(abs_cursor);
            self.rows.insert(abs_bottom, Row::new(self.width));
        }
        self.cursor.x = 0;
        self.cursor.just_wrapped = false;
        self.mark_all_dirty();
    }

    /// Insert `n` blank cells at the cursor, shifting the rest of the row
    /// right; cells pushed past the margin are dropped (ICH).
    pub fn insert_chars(&mut self, n: u16) {
        let row = self.cursor.y;
        let col = self.cursor.x as usize;
        let attrs = self.attrs.clone();
        let n = n.max(1) as usize;
        let row_ref = self.row_mut(row);
        let width = row_ref.cells.len();
        for _ in 0..n.min(width - col) {
            let _ = row_ref.cells.pop();
            row_ref.cells.insert(col, Cell::blank(&attrs));
        }
        self.mark_dirty(row);
    }

    /// Delete `n` cells at the cursor, shifting the rest of the row left
    /// and filling the margin with blanks (DCH).
    pub fn delete_chars(&mut self, n: u16) {
        let row = self.cursor.y;
        let col = self.cursor.x as usize;
        let attrs = self.attrs.clone();
        let n = n.max(1) as usize;
        let row_ref = self.row_mut(row);
        let width = row_ref.cells.len();
        for _ in 0..n.min(width - col) {
            row_ref.cells.remove(col);
            row_ref.cells.push(Cell::blank(&attrs));
        }
        self.mark_dirty(row);
    }

    /// Set the line rendition of the cursor row (`ESC # 3..6`)
    pub fn set_line_rendition(&mut self, rendition: LineRendition) {
        let row = self.cursor.y;
        self.row_mut(row).rendition = rendition;
        self.mark_dirty(row);
    }

    /// Fill the entire screen region with a character (DECALN)
    pub fn fill_screen(&mut self, ch: char) {
        let first = self.first_screen_row();
        let last = self.rows.len() - 1;
        for r in first..=last {
            let row_ref = &mut self.rows[r];
            for cell in &mut row_ref.cells {
                *cell = Cell {
                    text: ch.to_string(),
                    width: 1,
                    attrs: CellAttrs::default(),
                };
            }
            row_ref.wrap_forced = false;
        }
        self.mark_all_dirty();
    }

    // --- resize / reflow -------------------------------------------------

    /// Resize the grid, reflowing soft-wrapped content.
    ///
    /// Rows flagged `wrap_forced` are concatenated with their successor into
    /// logical lines (trailing blanks of hard-ended rows are trimmed first),
    /// then each logical line is re-partitioned greedily across the new
    /// width. Wide glyphs never straddle a row boundary: when only one
    /// column remains the row is closed early. The cursor is remapped to the
    /// cell it was on. The replacement store is built in full before being
    /// swapped in.
    pub fn resize(&mut self, new_width: u16, new_height: u16) {
        let new_width = new_width.max(1);
        let new_height = new_height.max(1);
        if new_width == self.width && new_height == self.height {
            return;
        }

        // Trailing blank rows below both the cursor and the last content
        // row are regenerated by padding, not reflowed; keeping them would
        // push real content into scrollback on every narrowing resize.
        let last_content = self
            .rows
            .iter()
            .rposition(|r| r.content_len() > 0 || r.wrap_forced)
            .unwrap_or(0);
        let last_keep = last_content.max(self.cursor.y);

        // Collect logical lines, remembering which line/offset the cursor
        // is on.
        let mut lines: Vec<Vec<Cell>> = Vec::new();
        let mut current: Vec<Cell> = Vec::new();
        let mut cursor_line = 0usize;
        let mut cursor_offset = 0usize;
        for (idx, row) in self.rows.iter().enumerate().take(last_keep + 1) {
            let content_len = if row.wrap_forced {
                row.cells.len()
            } else {
                row.content_len()
            };
            if idx == self.cursor.y {
                cursor_line = lines.len();
                cursor_offset = current.len() + self.cursor.x as usize;
            }
            current.extend_from_slice(&row.cells[..content_len]);
            if !row.wrap_forced {
                lines.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }

        // Re-partition each logical line at the new width.
        let mut new_rows: VecDeque<Row> = VecDeque::new();
        let mut new_cursor: Option<(usize, u16)> = None;
        for (li, line) in lines.iter().enumerate() {
            let mut row = Row::new(new_width);
            let mut col = 0usize;
            for (ci, cell) in line.iter().enumerate() {
                if cell.is_wide() && col == new_width as usize - 1 {
                    row.wrap_forced = true;
                    new_rows.push_back(std::mem::replace(&mut row, Row::new(new_width)));
                    col = 0;
                }
                if li == cursor_line && ci == cursor_offset {
                    new_cursor = Some((new_rows.len(), col as u16));
                }
                row.cells[col] = cell.clone();
                col += 1;
                if col == new_width as usize && ci + 1 < line.len() {
                    row.wrap_forced = true;
                    new_rows.push_back(std::mem::replace(&mut row, Row::new(new_width)));
                    col = 0;
                }
            }
            if li == cursor_line && new_cursor.is_none() {
                // Cursor sat past the line content; keep it on the last row
                new_cursor = Some((new_rows.len(), (col as u16).min(new_width - 1)));
            }
            new_rows.push_back(row);
        }

        // Pad to at least one full screen of rows.
        while new_rows.len() < new_height as usize {
            new_rows.push_back(Row::new(new_width));
        }

        // Enforce the scrollback cap, adjusting the remembered cursor row.
        let mut cursor_pos = new_cursor.unwrap_or((0, 0));
        let cap = new_height as usize + self.scrollback_limit;
        if new_rows.len() > cap {
            let excess = new_rows.len() - cap;
            new_rows.drain(..excess);
            cursor_pos.0 = cursor_pos.0.saturating_sub(excess);
        }

        self.rows = new_rows;
        self.width = new_width;
        self.height = new_height;
        self.scroll_region = (0, new_height - 1);

        // Keep the cursor inside the screen region.
        let first = self.first_screen_row();
        let last = self.rows.len() - 1;
        self.cursor.y = cursor_pos.0.clamp(first, last);
        self.cursor.x = cursor_pos.1.min(new_width - 1);
        self.cursor.just_wrapped = false;
        self.mark_all_dirty();
    }

    /// Screen contents as one string per row, trailing blanks trimmed
    pub fn screen_contents(&self) -> Vec<String> {
        (0..self.height).map(|r| self.screen_text(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::cell::{AttrFlags, Color};

    fn write_str(buf: &mut TextBuffer, s: &str) {
        for ch in s.chars() {
            let mut tmp = [0u8; 4];
            buf.write_cluster(ch.encode_utf8(&mut tmp), 1, true);
        }
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut buf = TextBuffer::new(80, 24, 100);
        buf.attrs_mut().fg = Color::Indexed(3);
        buf.attrs_mut().flags |= AttrFlags::BOLD;
        buf.write_cluster("x", 1, true);

        let cell = &buf.screen_row(0).cells[0];
        assert_eq!(cell.text, "x");
        assert_eq!(cell.attrs.fg, Color::Indexed(3));
        assert!(cell.attrs.flags.contains(AttrFlags::BOLD));
        assert_eq!(buf.cursor().x, 1);
    }

    #[test]
    fn test_wrap_sets_forced_flag_and_moves_cursor() {
        let mut buf = TextBuffer::new(10, 4, 100);
        write_str(&mut buf, "0123456789");
        assert!(buf.screen_row(0).wrap_forced);
        assert_eq!(buf.cursor_screen_pos(), (1, 0));
    }

    #[test]
    fn test_explicit_newline_after_full_row_clears_forced_flag() {
        let mut buf = TextBuffer::new(10, 4, 100);
        write_str(&mut buf, "0123456789");
        buf.carriage_return();
        buf.linefeed(true);
        assert!(!buf.screen_row(0).wrap_forced);
        // The newline merged into the wrap: no extra row was consumed
        assert_eq!(buf.cursor_screen_pos(), (1, 0));
        write_str(&mut buf, "ab");
        assert_eq!(buf.screen_text(1), "ab");
    }

    #[test]
    fn test_explicit_newline_mid_row() {
        let mut buf = TextBuffer::new(10, 4, 100);
        write_str(&mut buf, "abc");
        buf.carriage_return();
        buf.linefeed(true);
        assert!(!buf.screen_row(0).wrap_forced);
        assert_eq!(buf.cursor_screen_pos(), (1, 0));
    }

    #[test]
    fn test_scrollback_grows_and_evicts_fifo() {
        let mut buf = TextBuffer::new(10, 2, 3);
        for i in 0..8 {
            write_str(&mut buf, &format!("L{}", i));
            buf.carriage_return();
            buf.linefeed(true);
        }
        // 2 screen rows + 3 scrollback rows at most
        assert_eq!(buf.total_rows(), 5);
        // Oldest rows were evicted first
        assert_eq!(buf.row(0).unwrap().text(), "L4");
    }

    #[test]
    fn test_alt_style_buffer_never_grows() {
        let mut buf = TextBuffer::new(10, 3, 0);
        for i in 0..9 {
            write_str(&mut buf, &format!("{}", i));
            buf.carriage_return();
            buf.linefeed(true);
        }
        assert_eq!(buf.total_rows(), 3);
        assert_eq!(buf.screen_text(0), "7");
        assert_eq!(buf.screen_text(1), "8");
    }

    #[test]
    fn test_wide_char_continuation() {
        let mut buf = TextBuffer::new(10, 2, 0);
        buf.write_cluster("あ", 2, true);
        assert!(buf.screen_row(0).cells[0].is_wide());
        assert!(buf.screen_row(0).cells[1].is_continuation());
        assert_eq!(buf.cursor().x, 2);
    }

    #[test]
    fn test_wide_char_never_straddles_margin() {
        let mut buf = TextBuffer::new(4, 2, 0);
        write_str(&mut buf, "abc");
        buf.write_cluster("あ", 2, true);
        // Wrapped before writing: row 0 is forced, glyph starts row 1
        assert!(buf.screen_row(0).wrap_forced);
        assert!(buf.screen_row(1).cells[0].is_wide());
    }

    #[test]
    fn test_overwriting_wide_half_blanks_the_other() {
        let mut buf = TextBuffer::new(10, 2, 0);
        buf.write_cluster("あ", 2, true);
        buf.cursor_position(1, 2, false);
        buf.write_cluster("x", 1, true);
        assert!(buf.screen_row(0).cells[0].is_blank());
        assert_eq!(buf.screen_row(0).cells[1].text, "x");
    }

    #[test]
    fn test_combining_mark_joins_previous_cell() {
        let mut buf = TextBuffer::new(10, 2, 0);
        buf.write_cluster("e", 1, true);
        buf.write_cluster("\u{0301}", 0, true);
        assert_eq!(buf.screen_row(0).cells[0].text, "e\u{0301}");
        assert_eq!(buf.cursor().x, 1);
    }

    #[test]
    fn test_erase_in_line_modes() {
        let mut buf = TextBuffer::new(10, 2, 0);
        write_str(&mut buf, "abcdef");
        buf.cursor_position(1, 3, false);
        buf.erase_in_line(0);
        assert_eq!(buf.screen_text(0), "ab");

        write_str(&mut buf, "cdef");
        buf.cursor_position(1, 3, false);
        buf.erase_in_line(1);
        assert_eq!(buf.screen_text(0), "   def");
        assert!(buf.screen_row(0).cells[0].is_blank());
        assert!(buf.screen_row(0).cells[2].is_blank());
        assert_eq!(buf.screen_row(0).cells[3].text, "d");
    }

    #[test]
    fn test_erase_display_mode_3_drops_scrollback() {
        let mut buf = TextBuffer::new(10, 2, 50);
        for i in 0..6 {
            write_str(&mut buf, &format!("{}", i));
            buf.carriage_return();
            buf.linefeed(true);
        }
        assert!(buf.total_rows() > 2);
        let dropped = buf.erase_in_display(3);
        assert_eq!(dropped, 5);
        assert_eq!(buf.total_rows(), 2);
        assert_eq!(buf.screen_text(0), "");
    }

    #[test]
    fn test_insert_delete_lines_respect_region() {
        let mut buf = TextBuffer::new(10, 5, 0);
        for i in 0..5 {
            write_str(&mut buf, &format!("r{}", i));
            if i < 4 {
                buf.carriage_return();
                buf.linefeed(true);
            }
        }
        buf.set_scroll_region(2, 4);
        buf.cursor_position(2, 1, false);
        buf.insert_lines(1);
        // Row 0 untouched, rows 1..3 shifted within region, row 4 untouched
        assert_eq!(buf.screen_text(0), "r0");
        assert_eq!(buf.screen_text(1), "");
        assert_eq!(buf.screen_text(2), "r1");
        assert_eq!(buf.screen_text(3), "r2");
        assert_eq!(buf.screen_text(4), "r4");

        buf.delete_lines(1);
        assert_eq!(buf.screen_text(1), "r1");
        assert_eq!(buf.screen_text(3), "");
        assert_eq!(buf.screen_text(4), "r4");
    }

    #[test]
    fn test_insert_lines_outside_region_is_noop() {
        let mut buf = TextBuffer::new(10, 4, 0);
        write_str(&mut buf, "top");
        buf.set_scroll_region(2, 4);
        buf.cursor_position(1, 1, false);
        buf.insert_lines(2);
        assert_eq!(buf.screen_text(0), "top");
    }

    #[test]
    fn test_insert_delete_chars() {
        let mut buf = TextBuffer::new(8, 2, 0);
        write_str(&mut buf, "abcdef");
        buf.cursor_position(1, 3, false);
        buf.insert_chars(2);
        assert_eq!(buf.screen_text(0), "ab  cdef");
        assert_eq!(buf.screen_row(0).cells[4].text, "c");

        buf.delete_chars(2);
        assert_eq!(buf.screen_text(0), "abcdef");
    }

    #[test]
    fn test_scroll_region_clamped_not_rejected() {
        let mut buf = TextBuffer::new(10, 5, 0);
        buf.set_scroll_region(3, 99);
        assert_eq!(buf.scroll_region(), (2, 4));
        // Degenerate region is ignored
        buf.set_scroll_region(4, 4);
        assert_eq!(buf.scroll_region(), (2, 4));
    }

    #[test]
    fn test_linefeed_inside_region_scrolls_region_only() {
        let mut buf = TextBuffer::new(10, 5, 100);
        for i in 0..5 {
            write_str(&mut buf, &format!("r{}", i));
            if i < 4 {
                buf.carriage_return();
                buf.linefeed(true);
            }
        }
        buf.set_scroll_region(2, 4);
        buf.cursor_position(4, 1, false);
        buf.linefeed(true);
        // Region rows rotated; nothing went to scrollback
        assert_eq!(buf.total_rows(), 5);
        assert_eq!(buf.screen_text(0), "r0");
        assert_eq!(buf.screen_text(1), "r2");
        assert_eq!(buf.screen_text(2), "r3");
        assert_eq!(buf.screen_text(3), "");
        assert_eq!(buf.screen_text(4), "r4");
    }

    #[test]
    fn test_reverse_index_at_region_top_scrolls_down() {
        let mut buf = TextBuffer::new(10, 3, 0);
        write_str(&mut buf, "one");
        buf.carriage_return();
        buf.linefeed(true);
        write_str(&mut buf, "two");
        buf.cursor_position(1, 1, false);
        buf.reverse_index();
        assert_eq!(buf.screen_text(0), "");
        assert_eq!(buf.screen_text(1), "one");
        assert_eq!(buf.screen_text(2), "two");
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut buf = TextBuffer::new(20, 5, 0);
        buf.cursor_position(3, 7, false);
        buf.attrs_mut().fg = Color::Indexed(5);
        buf.save_cursor();
        buf.cursor_position(1, 1, false);
        buf.attrs_mut().reset();
        buf.restore_cursor();
        assert_eq!(buf.cursor_screen_pos(), (2, 6));
        assert_eq!(buf.attrs().fg, Color::Indexed(5));
    }

    #[test]
    fn test_resize_reflow_joins_wrapped_rows() {
        let mut buf = TextBuffer::new(10, 4, 100);
        // 14 chars: fills row 0 (forced) and 4 cells of row 1
        write_str(&mut buf, "abcdefghijklmn");
        assert!(buf.screen_row(0).wrap_forced);

        buf.resize(20, 4);
        assert_eq!(buf.screen_text(0), "abcdefghijklmn");
        assert!(!buf.screen_row(0).wrap_forced);
        // Cursor follows its character
        assert_eq!(buf.cursor_screen_pos(), (0, 14));
    }

    #[test]
    fn test_resize_reflow_narrower_preserves_content() {
        let mut buf = TextBuffer::new(10, 4, 100);
        write_str(&mut buf, "abcdefghijklmn");
        buf.resize(5, 4);
        assert_eq!(buf.screen_text(0), "abcde");
        assert_eq!(buf.screen_text(1), "fghij");
        assert_eq!(buf.screen_text(2), "klmn");
        assert!(buf.screen_row(0).wrap_forced);
        assert!(buf.screen_row(1).wrap_forced);
        assert!(!buf.screen_row(2).wrap_forced);
        assert_eq!(buf.cursor_screen_pos(), (2, 4));
    }

    #[test]
    fn test_resize_round_trip_preserves_character_count() {
        let mut buf = TextBuffer::new(10, 4, 100);
        write_str(&mut buf, "abcdefghijklmn");
        buf.resize(7, 4);
        buf.resize(10, 4);
        let total: String = buf.screen_contents().join("");
        assert_eq!(total, "abcdefghijklmn");
    }

    #[test]
    fn test_resize_hard_lines_do_not_join() {
        let mut buf = TextBuffer::new(10, 4, 100);
        write_str(&mut buf, "first");
        buf.carriage_return();
        buf.linefeed(true);
        write_str(&mut buf, "second");
        buf.resize(20, 4);
        assert_eq!(buf.screen_text(0), "first");
        assert_eq!(buf.screen_text(1), "second");
    }

    #[test]
    fn test_cursor_clamped_after_all_operations() {
        let mut buf = TextBuffer::new(5, 3, 10);
        buf.cursor_position(99, 99, false);
        assert_eq!(buf.cursor_screen_pos(), (2, 4));
        buf.cursor_forward(200);
        assert_eq!(buf.cursor().x, 4);
        buf.cursor_down(50);
        assert!(buf.cursor().y < buf.total_rows());
        buf.resize(3, 2);
        assert!(buf.cursor().x < 3);
        assert!(buf.cursor().y < buf.total_rows());
    }

    #[test]
    fn test_fill_screen() {
        let mut buf = TextBuffer::new(4, 2, 0);
        buf.fill_screen('E');
        assert_eq!(buf.screen_text(0), "EEEE");
        assert_eq!(buf.screen_text(1), "EEEE");
    }
}
