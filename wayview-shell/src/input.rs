//! Input router: binds a keyboard when the seat announces the capability
//! and forwards the close key to the session's close flag.
//!
//! Everything else a keyboard emits (keymap, enter/leave, modifiers,
//! repeat info) is accepted without effect: no text input or modifier
//! tracking exists at this layer, and no debounce or auto-repeat handling
//! is performed.

use tracing::info;
use wayland_client::protocol::{
    wl_keyboard::{self, WlKeyboard},
    wl_seat::{self, WlSeat},
};
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum};

use crate::session::Session;

/// Linux evdev scan code for Escape.
pub(crate) const KEY_ESC: u32 = 1;

pub(crate) fn is_close_key(key: u32) -> bool {
    key == KEY_ESC
}

impl Dispatch<WlSeat, ()> for Session {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities { capabilities } => {
                let WEnum::Value(capabilities) = capabilities else {
                    return;
                };
                if capabilities.contains(wl_seat::Capability::Keyboard)
                    && state.keyboard.is_none()
                {
                    let keyboard = seat.get_keyboard(qh, ());
                    info!("keyboard bound");
                    state.keyboard = Some(keyboard);
                }
            }
            wl_seat::Event::Name { .. } => {}
            _ => {}
        }
    }
}

impl Dispatch<WlKeyboard, ()> for Session {
    fn event(
        state: &mut Self,
        _keyboard: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Key { key, .. } => {
                state.handle_key(key);
            }
            // The keymap fd closes when the event drops; enter/leave,
            // modifiers and repeat-info carry no state at this layer.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_escape_is_the_close_key() {
        assert!(is_close_key(KEY_ESC));
        assert!(!is_close_key(0));
        assert!(!is_close_key(28)); // KEY_ENTER
        assert!(!is_close_key(57)); // KEY_SPACE
    }
}
