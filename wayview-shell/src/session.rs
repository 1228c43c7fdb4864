//! The Wayland session: owned state for every protocol callback, the
//! xdg-shell configure/ack state machine, frame pacing, and the dispatch
//! loop with ordered teardown.

use std::os::fd::AsFd;

use memmap2::MmapMut;
use tracing::{debug, error, info};
use wayland_client::protocol::{
    wl_buffer::{self, WlBuffer},
    wl_callback::{self, WlCallback},
    wl_compositor::{self, WlCompositor},
    wl_keyboard::WlKeyboard,
    wl_seat::WlSeat,
    wl_shm::{self, WlShm},
    wl_shm_pool::{self, WlShmPool},
    wl_surface::{self, WlSurface},
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

use wayview_core::WindowConfig;

use crate::error::SessionError;
use crate::shm;

/// Byte value every pixel channel is filled with on present. Real
/// rendering is out of scope; the surface shows opaque white.
const FILL_BYTE: u8 = 0xFF;

const BYTES_PER_PIXEL: u32 = 4;

/// Per-process session state, handed `&mut` to every protocol callback.
///
/// All handles start unset and are populated as the compositor advertises
/// globals and the window comes up; a missing required global surfaces as
/// [`SessionError::MissingGlobal`] at first use. The pixel mapping and
/// the compositor-visible buffer object are always replaced together.
pub struct Session {
    config: WindowConfig,

    pub(crate) compositor: Option<WlCompositor>,
    pub(crate) shm: Option<WlShm>,
    pub(crate) wm_base: Option<XdgWmBase>,
    pub(crate) seat: Option<WlSeat>,
    pub(crate) keyboard: Option<WlKeyboard>,

    surface: Option<WlSurface>,
    xdg_surface: Option<XdgSurface>,
    toplevel: Option<XdgToplevel>,

    buffer: Option<WlBuffer>,
    pixels: Option<MmapMut>,
    width: u32,
    height: u32,

    close_requested: bool,
    fatal: Option<SessionError>,
}

impl Session {
    /// Creates an empty session at the configured default geometry. No
    /// protocol objects exist yet; [`Session::connect`] and
    /// [`Session::create_window`] populate them.
    pub fn new(config: WindowConfig) -> Self {
        let width = config.width;
        let height = config.height;
        Self {
            config,
            compositor: None,
            shm: None,
            wm_base: None,
            seat: None,
            keyboard: None,
            surface: None,
            xdg_surface: None,
            toplevel: None,
            buffer: None,
            pixels: None,
            width,
            height,
            close_requested: false,
            fatal: None,
        }
    }

    /// Connects to the compositor named by the environment, registers the
    /// registry listener, and performs the initial round-trip so every
    /// advertised global has been offered for binding before this
    /// returns.
    pub fn connect(
        config: WindowConfig,
    ) -> Result<(Connection, EventQueue<Session>, Session), SessionError> {
        let conn = Connection::connect_to_env()?;
        let mut event_queue = conn.new_event_queue();
        let qh = event_queue.handle();

        let display = conn.display();
        let _registry = display.get_registry(&qh, ());

        let mut session = Session::new(config);
        event_queue.roundtrip(&mut session)?;

        Ok((conn, event_queue, session))
    }

    /// Creates the surface and the xdg toplevel above it, sets the title,
    /// and commits the initial (bufferless) state so the compositor sends
    /// the first configure.
    ///
    /// The first frame callback is requested here: from this point on
    /// exactly one callback is outstanding at any time, each firing
    /// re-arming exactly one replacement.
    pub fn create_window(&mut self, qh: &QueueHandle<Self>) -> Result<(), SessionError> {
        let compositor = self
            .compositor
            .as_ref()
            .ok_or(SessionError::MissingGlobal("wl_compositor"))?;
        let wm_base = self
            .wm_base
            .as_ref()
            .ok_or(SessionError::MissingGlobal("xdg_wm_base"))?;

        let surface = compositor.create_surface(qh, ());
        surface.frame(qh, ());

        let xdg_surface = wm_base.get_xdg_surface(&surface, qh, ());
        let toplevel = xdg_surface.get_toplevel(qh, ());
        toplevel.set_title(self.config.title.clone());
        surface.commit();
        info!(title = %self.config.title, "toplevel created");

        self.surface = Some(surface);
        self.xdg_surface = Some(xdg_surface);
        self.toplevel = Some(toplevel);
        Ok(())
    }

    /// Pumps compositor events until the close flag is observed. The flag
    /// is checked between dispatch calls only, so at most one more round
    /// of events runs after a close request.
    pub fn run(&mut self, event_queue: &mut EventQueue<Self>) -> Result<(), SessionError> {
        info!("entering dispatch loop");
        while !self.close_requested {
            event_queue.blocking_dispatch(self)?;
            if let Some(err) = self.fatal.take() {
                return Err(err);
            }
        }
        info!("dispatch loop finished");
        Ok(())
    }

    /// Destroys protocol objects in reverse-dependency order and drops
    /// the pixel mapping last. Conditional objects (keyboard, buffer) are
    /// only touched if they were ever created.
    pub fn teardown(&mut self) {
        if let Some(keyboard) = self.keyboard.take() {
            // wl_keyboard.release exists since version 3.
            if keyboard.version() >= 3 {
                keyboard.release();
            }
        }
        if let Some(seat) = self.seat.take() {
            // wl_seat.release exists since version 5.
            if seat.version() >= 5 {
                seat.release();
            }
        }
        if let Some(buffer) = self.buffer.take() {
            buffer.destroy();
        }
        if let Some(toplevel) = self.toplevel.take() {
            toplevel.destroy();
        }
        if let Some(xdg_surface) = self.xdg_surface.take() {
            xdg_surface.destroy();
        }
        if let Some(surface) = self.surface.take() {
            surface.destroy();
        }
        self.pixels = None;
        debug!("session torn down");
    }

    /// Sets the close flag. Monotonic: once requested, the session never
    /// un-requests it.
    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Whether a close has been requested by the compositor or input.
    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// True until the first pixel buffer exists. A repeated surface
    /// configure at unchanged dimensions therefore never reallocates.
    fn needs_initial_buffer(&self) -> bool {
        self.pixels.is_none()
    }

    /// Records a fatal callback-side error and forces the loop to exit.
    fn fail(&mut self, err: SessionError) {
        error!("fatal session error: {err}");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        self.close_requested = true;
    }

    pub(crate) fn handle_key(&mut self, key: u32) {
        if crate::input::is_close_key(key) {
            debug!(key, "close key");
            self.request_close();
        }
    }

    /// Recreates the shared pixel memory and the compositor-visible
    /// buffer object at the current dimensions. The previous mapping must
    /// already have been dropped; the previous buffer object is destroyed
    /// here so both are always replaced together.
    fn resize_pixels(&mut self, qh: &QueueHandle<Self>) -> Result<(), SessionError> {
        debug_assert!(
            self.pixels.is_none(),
            "previous mapping must be unmapped before resize"
        );
        let len = self.width as usize * self.height as usize * BYTES_PER_PIXEL as usize;
        let (mapping, fd) = shm::allocate_pixels(len)?;

        let shm = self
            .shm
            .as_ref()
            .ok_or(SessionError::MissingGlobal("wl_shm"))?;
        if let Some(old) = self.buffer.take() {
            old.destroy();
        }

        let pool = shm.create_pool(fd.as_fd(), len as i32, qh, ());
        let buffer = pool.create_buffer(
            0,
            self.width as i32,
            self.height as i32,
            (self.width * BYTES_PER_PIXEL) as i32,
            wl_shm::Format::Argb8888,
            qh,
            (),
        );
        // The buffer keeps its own reference to the backing memory; the
        // pool and the local fd are no longer needed.
        pool.destroy();
        drop(fd);

        debug!(width = self.width, height = self.height, "pixel buffer resized");
        self.pixels = Some(mapping);
        self.buffer = Some(buffer);
        Ok(())
    }

    /// Fills the pixel buffer, attaches it at the origin, damages the
    /// full rectangle, and commits.
    fn present(&mut self) {
        let (Some(surface), Some(buffer)) = (&self.surface, &self.buffer) else {
            return;
        };
        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };

        pixels.fill(FILL_BYTE);
        surface.attach(Some(buffer), 0, 0);
        surface.damage(0, 0, self.width as i32, self.height as i32);
        surface.commit();
    }
}

/// Outcome of a toplevel configure proposal against the current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigureAction {
    /// Zero-sized proposal (no preference) or dimensions already current.
    KeepCurrent,
    /// Adopt the proposed dimensions and reallocate the buffer.
    Resize { width: u32, height: u32 },
}

pub(crate) fn configure_action(current: (u32, u32), proposed: (i32, i32)) -> ConfigureAction {
    let (width, height) = proposed;
    if width <= 0 || height <= 0 {
        return ConfigureAction::KeepCurrent;
    }
    let (width, height) = (width as u32, height as u32);
    if (width, height) == current {
        ConfigureAction::KeepCurrent
    } else {
        ConfigureAction::Resize { width, height }
    }
}

impl Dispatch<XdgWmBase, ()> for Session {
    fn event(
        _state: &mut Self,
        wm_base: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<XdgSurface, ()> for Session {
    fn event(
        state: &mut Self,
        xdg_surface: &XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            // Acked unconditionally; a late or missing ack stalls the
            // compositor's negotiation.
            xdg_surface.ack_configure(serial);

            if state.needs_initial_buffer() {
                if let Err(err) = state.resize_pixels(qh) {
                    state.fail(err);
                    return;
                }
            }
            state.present();
        }
    }
}

impl Dispatch<XdgToplevel, ()> for Session {
    fn event(
        state: &mut Self,
        _toplevel: &XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                match configure_action((state.width, state.height), (width, height)) {
                    ConfigureAction::KeepCurrent => {}
                    ConfigureAction::Resize { width, height } => {
                        // Unmap the old region before adopting the new
                        // dimensions, then rebuild mapping and buffer.
                        state.pixels = None;
                        state.width = width;
                        state.height = height;
                        if let Err(err) = state.resize_pixels(qh) {
                            state.fail(err);
                        }
                    }
                }
            }
            xdg_toplevel::Event::Close => {
                info!("close requested by the compositor");
                state.request_close();
            }
            _ => {}
        }
    }
}

impl Dispatch<WlCallback, ()> for Session {
    fn event(
        state: &mut Self,
        _callback: &WlCallback,
        event: wl_callback::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            // The fired callback is spent; arm the replacement before
            // presenting so exactly one stays outstanding.
            if let Some(surface) = &state.surface {
                surface.frame(qh, ());
            }
            state.present();
        }
    }
}

impl Dispatch<WlSurface, ()> for Session {
    fn event(
        _state: &mut Self,
        _surface: &WlSurface,
        _event: wl_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlBuffer, ()> for Session {
    fn event(
        _state: &mut Self,
        _buffer: &WlBuffer,
        _event: wl_buffer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // Release notifications carry no state here: the single buffer is
        // reused in place and replaced only on resize.
    }
}

impl Dispatch<WlShm, ()> for Session {
    fn event(
        _state: &mut Self,
        _shm: &WlShm,
        _event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // Format advertisements are ignored; ARGB8888 support is
        // mandatory for every compositor.
    }
}

impl Dispatch<WlShmPool, ()> for Session {
    fn event(
        _state: &mut Self,
        _pool: &WlShmPool,
        _event: wl_shm_pool::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlCompositor, ()> for Session {
    fn event(
        _state: &mut Self,
        _compositor: &WlCompositor,
        _event: wl_compositor::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn session() -> Session {
        Session::new(WindowConfig::default())
    }

    #[rstest]
    // Zero on either axis means "no preference": keep the current size.
    #[case((200, 200), (0, 300), ConfigureAction::KeepCurrent)]
    #[case((200, 200), (300, 0), ConfigureAction::KeepCurrent)]
    #[case((200, 200), (0, 0), ConfigureAction::KeepCurrent)]
    // An unchanged proposal must not trigger a reallocation.
    #[case((200, 200), (200, 200), ConfigureAction::KeepCurrent)]
    // A differing proposal adopts the new dimensions.
    #[case((200, 200), (400, 300), ConfigureAction::Resize { width: 400, height: 300 })]
    #[case((400, 300), (200, 200), ConfigureAction::Resize { width: 200, height: 200 })]
    fn configure_action_cases(
        #[case] current: (u32, u32),
        #[case] proposed: (i32, i32),
        #[case] expected: ConfigureAction,
    ) {
        assert_eq!(configure_action(current, proposed), expected);
    }

    #[test]
    fn negative_proposals_keep_current_size() {
        assert_eq!(
            configure_action((200, 200), (-1, 300)),
            ConfigureAction::KeepCurrent
        );
    }

    #[test]
    fn close_flag_is_monotonic() {
        let mut session = session();
        assert!(!session.close_requested());

        session.request_close();
        assert!(session.close_requested());

        // Further requests and unrelated key traffic never clear it.
        session.request_close();
        session.handle_key(30);
        assert!(session.close_requested());
    }

    #[test]
    fn escape_key_requests_close_and_other_keys_do_not() {
        let mut session = session();
        session.handle_key(30); // KEY_A
        session.handle_key(57); // KEY_SPACE
        assert!(!session.close_requested());

        session.handle_key(1); // KEY_ESC
        assert!(session.close_requested());
    }

    #[test]
    fn initial_buffer_is_needed_exactly_until_a_mapping_exists() {
        let mut session = session();
        assert!(session.needs_initial_buffer());

        let len = session.width as usize * session.height as usize * 4;
        let (mapping, _fd) = crate::shm::allocate_pixels(len).expect("allocation succeeds");
        session.pixels = Some(mapping);

        // A second configure at unchanged dimensions sees an existing
        // buffer and must not reallocate.
        assert!(!session.needs_initial_buffer());
    }

    #[test]
    fn teardown_only_touches_objects_that_were_created() {
        // Nothing was ever bound here; every conditional destroy must be
        // skipped without panicking.
        let mut session = session();
        session.teardown();
        assert!(session.needs_initial_buffer());
    }

    #[test]
    fn teardown_unmaps_the_pixel_buffer() {
        let mut session = session();
        let (mapping, _fd) = crate::shm::allocate_pixels(4096).expect("allocation succeeds");
        session.pixels = Some(mapping);

        session.teardown();
        assert!(session.pixels.is_none());
    }

    #[test]
    fn fatal_errors_also_request_close() {
        let mut session = session();
        session.fail(SessionError::MissingGlobal("wl_shm"));
        assert!(session.close_requested());
        assert!(session.fatal.is_some());
    }

    #[test]
    fn first_fatal_error_is_preserved() {
        let mut session = session();
        session.fail(SessionError::MissingGlobal("wl_shm"));
        session.fail(SessionError::MissingGlobal("wl_compositor"));

        match session.fatal.take() {
            Some(SessionError::MissingGlobal(global)) => assert_eq!(global, "wl_shm"),
            other => panic!("unexpected fatal slot: {other:?}"),
        }
    }
}
