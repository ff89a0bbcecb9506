//! Terminal mode flags
//!
//! Every boolean/enum mode toggle lives in this one record so interactions
//! between modes (auto-wrap vs. forced wrap, alt screen vs. mouse encoding)
//! can be audited in a single place. The input-translation layer reads this
//! record to decide how to encode keys and mouse events for the PTY.

/// Mouse tracking protocol requested by the application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MouseTracking {
    #[default]
    Off,
    /// Button presses only (DECSET 1000)
    Normal,
    /// Presses plus drag motion (DECSET 1002)
    ButtonDrag,
    /// All motion (DECSET 1003)
    AnyMotion,
}

/// Terminal modes
#[derive(Clone, Debug)]
pub struct ModeFlags {
    /// DECAWM: writes past the last column wrap to the next row
    pub auto_wrap: bool,
    /// DECOM: cursor addressing is relative to the scroll region
    pub origin_mode: bool,
    /// IRM: printed characters shift existing cells right instead of
    /// overwriting them
    pub insert_mode: bool,
    /// LNM: line feed implies carriage return
    pub linefeed_newline: bool,
    /// DECCKM: cursor keys send application sequences
    pub application_cursor: bool,
    pub application_keypad: bool,
    pub bracketed_paste: bool,
    pub mouse_tracking: MouseTracking,
    /// Mouse coordinates use SGR encoding (DECSET 1006)
    pub sgr_mouse: bool,
    /// The alternate screen buffer is active; input translation for some
    /// events (e.g. scroll wheel) differs between buffers
    pub alt_screen: bool,
}

impl Default for ModeFlags {
    fn default() -> Self {
        Self {
            auto_wrap: true,
            origin_mode: false,
            insert_mode: false,
            linefeed_newline: false,
            application_cursor: false,
            application_keypad: false,
            bracketed_paste: false,
            mouse_tracking: MouseTracking::Off,
            sgr_mouse: false,
            alt_screen: false,
        }
    }
}

impl ModeFlags {
    /// Whether any mouse tracking protocol is active
    pub fn wants_mouse(&self) -> bool {
        self.mouse_tracking != MouseTracking::Off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let modes = ModeFlags::default();
        assert!(modes.auto_wrap);
        assert!(!modes.alt_screen);
        assert!(!modes.wants_mouse());
    }

    #[test]
    fn test_wants_mouse() {
        let mut modes = ModeFlags::default();
        modes.mouse_tracking = MouseTracking::ButtonDrag;
        assert!(modes.wants_mouse());
    }
}
