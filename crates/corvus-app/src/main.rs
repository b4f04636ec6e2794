mod app;
mod camera;
mod config;
mod gui;
mod init_log;

use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> anyhow::Result<()> {
    init_log::init_log();

    let config = config::AppConfig::load("corvus.toml");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = app::CorvusApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
