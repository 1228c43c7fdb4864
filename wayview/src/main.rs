//! Entry point: wires logging, the Wayland session, and the Vulkan
//! context together, runs the dispatch loop, and tears everything down in
//! order.

use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info, warn};

use wayview_core::{RendererConfig, WindowConfig};
use wayview_shell::Session;
use wayview_vulkan_renderer::GpuContext;

fn main() -> ExitCode {
    wayview_core::logging::init_logging();

    if let Err(err) = run() {
        error!("fatal: {err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run() -> anyhow::Result<()> {
    let window_config = WindowConfig::default();
    window_config.validate()?;
    let renderer_config = RendererConfig::default();
    renderer_config.validate()?;

    let (conn, mut event_queue, mut session) =
        Session::connect(window_config).context("wayland session setup failed")?;
    let qh = event_queue.handle();
    session
        .create_window(&qh)
        .context("toplevel creation failed")?;

    // The GPU context shares the process lifetime but is not wired to the
    // surface yet; no swapchain exists at this stage.
    let gpu = GpuContext::new(&renderer_config).context("vulkan context setup failed")?;
    info!(
        adapter = gpu.adapter_name(),
        queue_family = ?gpu.queue_family_index(),
        "vulkan context ready"
    );

    let outcome = session.run(&mut event_queue);

    // Teardown runs whether the loop ended on a close request or a
    // dispatch error; protocol objects go down in reverse-dependency
    // order either way.
    session.teardown();
    if let Err(err) = conn.flush() {
        warn!("final flush failed: {err}");
    }
    drop(gpu);
    outcome.map_err(Into::into)
}
