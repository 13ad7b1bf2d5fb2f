use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::core::{App, FixedStepLoop, LoopExit, Platform, PlatformEvent};
use crate::gfx::{Device, GfxConfig, GpuInit, WgpuBackend};
use crate::input::translate;
use crate::time::{LoopConfig, SystemClock};

/// Window, device and loop configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub gfx: GfxConfig,
    pub gpu: GpuInit,
    pub timing: LoopConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "tessera".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            gfx: GfxConfig::default(),
            gpu: GpuInit::default(),
            timing: LoopConfig::default(),
        }
    }
}

/// Entry point for windowed applications.
pub struct Runtime;

impl Runtime {
    /// Opens the window, sets up a wgpu-backed [`Device`] and drives `app`
    /// with the fixed-timestep loop until it quits.
    pub fn run<A: App>(config: RuntimeConfig, mut app: A) -> Result<()> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut handler = Handler::new(&config);

        // The window only exists once the loop delivered `resumed`.
        let window = loop {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut handler)
            {
                return match handler.error.take() {
                    Some(e) => Err(e),
                    None => {
                        log::info!("event loop exited before a window opened (code {code})");
                        Ok(())
                    }
                };
            }
            if let Some(e) = handler.error.take() {
                return Err(e);
            }
            if let Some(window) = handler.window.clone() {
                break window;
            }
        };

        let backend = WgpuBackend::new(Arc::clone(&window), &config.gpu)
            .context("GPU initialization failed")?;
        let mut device = Device::setup(config.gfx, backend).context("graphics setup failed")?;

        let mut platform = WinitPlatform {
            event_loop: &mut event_loop,
            handler: &mut handler,
        };
        let exit = FixedStepLoop::new(config.timing).run(
            &mut platform,
            &mut SystemClock::new(),
            &mut device,
            &mut app,
        )?;

        device.shutdown();
        match exit {
            LoopExit::DeviceLost => Err(anyhow!("graphics device lost")),
            LoopExit::Quit | LoopExit::App => Ok(()),
        }
    }
}

/// winit callbacks, buffered into platform events.
struct Handler {
    title: String,
    initial_size: LogicalSize<f64>,
    window: Option<Arc<Window>>,
    pending: Vec<PlatformEvent>,
    error: Option<anyhow::Error>,
}

impl Handler {
    fn new(config: &RuntimeConfig) -> Self {
        Self {
            title: config.title.clone(),
            initial_size: config.initial_size,
            window: None,
            pending: Vec::new(),
            error: None,
        }
    }
}

impl ApplicationHandler for Handler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(self.initial_size);
        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.error = Some(anyhow::Error::new(e).context("failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else { return };
        match &event {
            WindowEvent::CloseRequested => self.pending.push(PlatformEvent::QuitRequested),
            WindowEvent::Resized(size) => self.pending.push(PlatformEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                self.pending.push(PlatformEvent::Resized {
                    width: size.width,
                    height: size.height,
                });
            }
            _ => {
                if let Some(ev) = translate::translate(window.scale_factor(), &event) {
                    self.pending.push(PlatformEvent::Input(ev));
                }
            }
        }
    }
}

/// [`Platform`] pumping the winit loop without blocking.
struct WinitPlatform<'a> {
    event_loop: &'a mut EventLoop<()>,
    handler: &'a mut Handler,
}

impl Platform for WinitPlatform<'_> {
    fn pump_events(&mut self, out: &mut Vec<PlatformEvent>) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut *self.handler);
        out.append(&mut self.handler.pending);
        if let PumpStatus::Exit(_) = status {
            out.push(PlatformEvent::QuitRequested);
        }
    }
}
