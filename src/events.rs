//! Host notification surface
//!
//! The terminal reports side effects (title changes, bell, clipboard
//! payloads, scroll movement, bytes to echo back to the PTY) through one
//! capability trait with a method per event kind. Every method has a no-op
//! default, so hosts implement only what they care about. The terminal holds
//! the handler weakly; notification is fire-and-forget and a handler that
//! has been dropped is simply skipped.

/// Taskbar progress state reported by the shell (OSC 9;4)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TaskbarState {
    #[default]
    Clear,
    Set,
    Indeterminate,
    Error,
    Paused,
}

impl TaskbarState {
    /// Map the first OSC 9;4 parameter to a state
    pub fn from_osc(value: u16) -> Option<Self> {
        match value {
            0 => Some(TaskbarState::Clear),
            1 => Some(TaskbarState::Set),
            2 => Some(TaskbarState::Error),
            3 => Some(TaskbarState::Indeterminate),
            4 => Some(TaskbarState::Paused),
            _ => None,
        }
    }
}

/// Response that needs to be sent back to the PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Cursor position report: `ESC [ row ; col R` (viewport-relative,
    /// 1-indexed)
    CursorPosition(u16, u16),
    /// Operating status report: `ESC [ 0 n`
    StatusOk,
    /// Primary device attributes
    DeviceAttributes,
    /// Secondary device attributes
    SecondaryDeviceAttributes,
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::CursorPosition(row, col) => {
                format!("\x1b[{};{}R", row, col).into_bytes()
            }
            Response::StatusOk => b"\x1b[0n".to_vec(),
            Response::DeviceAttributes => {
                // VT220 with ANSI color
                b"\x1b[?62;22c".to_vec()
            }
            Response::SecondaryDeviceAttributes => {
                // VT220 response
                b"\x1b[>1;10;0c".to_vec()
            }
        }
    }
}

/// Events emitted toward the host shell and renderer
///
/// Implementations must not assume any ordering guarantees beyond "events
/// fire during the `write` call that caused them", and must not call back
/// into the terminal from a handler.
pub trait TerminalEvents {
    /// The application set the window title (OSC 0/1/2)
    fn title_changed(&self, _title: &str) {}

    /// BEL was received
    fn bell(&self) {}

    /// The application placed text on the clipboard (OSC 52)
    fn copy_to_clipboard(&self, _text: &str) {}

    /// Taskbar progress changed (OSC 9;4)
    fn taskbar_progress(&self, _state: TaskbarState, _progress: usize) {}

    /// The shell reported its working directory (OSC 7)
    fn working_directory_changed(&self, _uri: &str) {}

    /// The application asked to show (true) or hide (false) the window
    fn show_window(&self, _show: bool) {}

    /// The viewport moved or the row count changed: (top row, total rows)
    fn scroll_position_changed(&self, _top: usize, _total_rows: usize) {}

    /// Bytes to write back toward the PTY (status reports, attribute
    /// replies)
    fn write_response(&self, _bytes: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_formats() {
        assert_eq!(
            Response::CursorPosition(3, 14).to_bytes(),
            b"\x1b[3;14R".to_vec()
        );
        assert_eq!(Response::StatusOk.to_bytes(), b"\x1b[0n".to_vec());
        assert_eq!(
            Response::DeviceAttributes.to_bytes(),
            b"\x1b[?62;22c".to_vec()
        );
        assert_eq!(
            Response::SecondaryDeviceAttributes.to_bytes(),
            b"\x1b[>1;10;0c".to_vec()
        );
    }

    #[test]
    fn test_taskbar_state_from_osc() {
        assert_eq!(TaskbarState::from_osc(0), Some(TaskbarState::Clear));
        assert_eq!(TaskbarState::from_osc(1), Some(TaskbarState::Set));
        assert_eq!(TaskbarState::from_osc(2), Some(TaskbarState::Error));
        assert_eq!(TaskbarState::from_osc(3), Some(TaskbarState::Indeterminate));
        assert_eq!(TaskbarState::from_osc(4), Some(TaskbarState::Paused));
        assert_eq!(TaskbarState::from_osc(9), None);
    }
}
