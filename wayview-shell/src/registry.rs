//! Registry binder: picks the needed globals out of the compositor's
//! advertisement stream.
//!
//! Binding happens at the highest mutually supported version. The shell
//! and the seat route their events into the same [`Session`], so their
//! listeners are in place the moment the bind returns and no event can be
//! missed. Removal notifications are accepted but not acted upon (no
//! hot-unplug handling; see DESIGN.md).

use tracing::debug;
use wayland_client::protocol::{
    wl_compositor::WlCompositor,
    wl_registry::{self, WlRegistry},
    wl_seat::WlSeat,
    wl_shm::WlShm,
};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;

use crate::session::Session;

/// Highest protocol versions this client understands.
const WL_COMPOSITOR_VERSION: u32 = 4;
const WL_SHM_VERSION: u32 = 1;
const XDG_WM_BASE_VERSION: u32 = 1;
// Version 5 so the seat can be released at teardown.
const WL_SEAT_VERSION: u32 = 5;

impl Dispatch<WlRegistry, ()> for Session {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                if interface == WlCompositor::interface().name {
                    let compositor = registry.bind::<WlCompositor, _, _>(
                        name,
                        version.min(WL_COMPOSITOR_VERSION),
                        qh,
                        (),
                    );
                    debug!(name, version, "bound wl_compositor");
                    state.compositor = Some(compositor);
                } else if interface == WlShm::interface().name {
                    let shm =
                        registry.bind::<WlShm, _, _>(name, version.min(WL_SHM_VERSION), qh, ());
                    debug!(name, version, "bound wl_shm");
                    state.shm = Some(shm);
                } else if interface == XdgWmBase::interface().name {
                    let wm_base = registry.bind::<XdgWmBase, _, _>(
                        name,
                        version.min(XDG_WM_BASE_VERSION),
                        qh,
                        (),
                    );
                    debug!(name, version, "bound xdg_wm_base");
                    state.wm_base = Some(wm_base);
                } else if interface == WlSeat::interface().name {
                    let seat =
                        registry.bind::<WlSeat, _, _>(name, version.min(WL_SEAT_VERSION), qh, ());
                    debug!(name, version, "bound wl_seat");
                    state.seat = Some(seat);
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                debug!(name, "global removed (ignored)");
            }
            _ => {}
        }
    }
}
