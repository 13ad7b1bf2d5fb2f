use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;

use super::app::{App, AppControl};
use super::ctx::FrameCtx;
use crate::gfx::Device;
use crate::input::{InputEvent, InputFrame, InputState};
use crate::time::{fixed_step, Clock, LoopConfig, LoopTime};

/// Event delivered by the windowing collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    Input(InputEvent),
    /// New default framebuffer size in pixels.
    Resized { width: u32, height: u32 },
    QuitRequested,
}

/// Windowing collaborator pumped once per loop iteration.
pub trait Platform {
    /// Appends every pending event to `out`.
    fn pump_events(&mut self, out: &mut Vec<PlatformEvent>);
}

/// Platform replaying one batch of events per pump, then requesting quit.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlatform {
    batches: VecDeque<Vec<PlatformEvent>>,
}

impl ScriptedPlatform {
    pub fn new(batches: impl IntoIterator<Item = Vec<PlatformEvent>>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    /// `n` pumps without events before the quit.
    pub fn idle(n: usize) -> Self {
        Self::new(std::iter::repeat_n(Vec::new(), n))
    }
}

impl Platform for ScriptedPlatform {
    fn pump_events(&mut self, out: &mut Vec<PlatformEvent>) {
        match self.batches.pop_front() {
            Some(batch) => out.extend(batch),
            None => out.push(PlatformEvent::QuitRequested),
        }
    }
}

/// Why [`FixedStepLoop::run`] returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopExit {
    /// The platform asked to quit.
    Quit,
    /// A callback returned [`AppControl::Exit`].
    App,
    /// The device became unusable, e.g. its surface was lost.
    DeviceLost,
}

/// Counters over one run.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LoopStats {
    pub iterations: u64,
    pub input_dispatches: u64,
    pub updates: u64,
    pub draws: u64,
}

/// Fixed-timestep driver: variable wall-clock time in, fixed updates and one
/// interpolated draw per iteration out.
pub struct FixedStepLoop {
    config: LoopConfig,
    accumulated: Duration,
    total: Duration,
    since_draw: Duration,
    since_input: Duration,
    input: InputState,
    frame: InputFrame,
    events: Vec<PlatformEvent>,
    stats: LoopStats,
}

impl FixedStepLoop {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            accumulated: Duration::ZERO,
            total: Duration::ZERO,
            since_draw: Duration::ZERO,
            since_input: Duration::ZERO,
            input: InputState::default(),
            frame: InputFrame::default(),
            events: Vec::new(),
            stats: LoopStats::default(),
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Simulated time so far.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Initializes `app`, iterates until something stops the loop, then
    /// shuts `app` down and commits nothing further.
    pub fn run<P, C, A>(
        &mut self,
        platform: &mut P,
        clock: &mut C,
        gfx: &mut Device,
        app: &mut A,
    ) -> Result<LoopExit>
    where
        P: Platform + ?Sized,
        C: Clock + ?Sized,
        A: App + ?Sized,
    {
        app.init(gfx)?;
        clock.reset();
        log::debug!(
            "fixed-step loop: step {:?}, max elapsed {:?}, max accumulated {:?}",
            self.config.fixed_step,
            self.config.max_elapsed,
            self.config.max_accumulated
        );

        let result = loop {
            match self.iterate(platform, clock, gfx, app) {
                Ok(None) => continue,
                Ok(Some(exit)) => break Ok(exit),
                Err(e) => break Err(e),
            }
        };

        app.shutdown(gfx);
        if let Ok(exit) = &result {
            log::info!(
                "loop stopped ({exit:?}) after {} iterations, {} updates, {} draws",
                self.stats.iterations,
                self.stats.updates,
                self.stats.draws
            );
        }
        result
    }

    /// One loop iteration; `Some` once the loop must stop.
    fn iterate<P, C, A>(
        &mut self,
        platform: &mut P,
        clock: &mut C,
        gfx: &mut Device,
        app: &mut A,
    ) -> Result<Option<LoopExit>>
    where
        P: Platform + ?Sized,
        C: Clock + ?Sized,
        A: App + ?Sized,
    {
        self.stats.iterations += 1;

        // 1-2: events, then the running check.
        if let Some(exit) = self.pump(platform, gfx, app) {
            return Ok(Some(exit));
        }
        if !gfx.is_valid() {
            log::error!("graphics device lost; stopping");
            return Ok(Some(LoopExit::DeviceLost));
        }

        // 3: measure and accumulate.
        let elapsed = self.config.clamp_elapsed(clock.tick());
        self.accumulated = self
            .config
            .clamp_accumulated(self.accumulated.saturating_add(elapsed));
        self.since_draw += elapsed;
        self.since_input += elapsed;

        // 4: not a full step yet.
        let fixed = self.config.fixed_step;
        let plan = fixed_step::drain(self.accumulated, fixed);
        if plan.steps == 0 {
            if self.config.poll_input_every_iteration
                && self.dispatch_input(app, elapsed) == AppControl::Exit
            {
                return Ok(Some(LoopExit::App));
            }
            return Ok(None);
        }

        // 5: input once.
        if self.dispatch_input(app, elapsed) == AppControl::Exit {
            return Ok(Some(LoopExit::App));
        }

        // 6: catch-up; an exit stops before the remaining steps.
        for _ in 0..plan.steps {
            self.accumulated -= fixed;
            self.total += fixed;
            self.stats.updates += 1;
            let time = LoopTime {
                total: self.total,
                elapsed: fixed,
                alpha: 0.0,
            };
            if app.update(&time) == AppControl::Exit {
                return Ok(Some(LoopExit::App));
            }
        }

        // 7: one draw, then the frame is committed.
        let time = LoopTime {
            total: self.total,
            elapsed: self.since_draw,
            alpha: fixed_step::alpha(self.accumulated, fixed),
        };
        self.since_draw = Duration::ZERO;
        self.stats.draws += 1;
        let control = {
            let mut ctx = FrameCtx {
                gfx: &mut *gfx,
                input: &self.input,
                time,
            };
            app.draw(&mut ctx)?
        };
        gfx.commit()?;

        Ok((control == AppControl::Exit).then_some(LoopExit::App))
    }

    fn pump<P, A>(&mut self, platform: &mut P, gfx: &mut Device, app: &mut A) -> Option<LoopExit>
    where
        P: Platform + ?Sized,
        A: App + ?Sized,
    {
        self.events.clear();
        platform.pump_events(&mut self.events);

        let mut exit = None;
        for ev in self.events.drain(..) {
            match ev {
                PlatformEvent::Input(ev) => self.input.apply(&mut self.frame, ev),
                PlatformEvent::Resized { width, height } => {
                    log::debug!("framebuffer resized to {width}x{height}");
                    gfx.resize(width, height);
                    app.resized(width, height);
                }
                PlatformEvent::QuitRequested => exit = Some(LoopExit::Quit),
            }
        }
        exit
    }

    fn dispatch_input<A: App + ?Sized>(&mut self, app: &mut A, elapsed: Duration) -> AppControl {
        self.stats.input_dispatches += 1;
        let control = app.handle_input(&self.input, &self.frame, elapsed);
        self.input.advance(self.since_input);
        self.since_input = Duration::ZERO;
        self.frame.clear();
        control
    }
}

impl Default for FixedStepLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{GfxConfig, HeadlessBackend, PassAction};
    use crate::input::Key;
    use crate::time::ManualClock;

    const STEP: Duration = Duration::from_millis(10);

    fn config() -> LoopConfig {
        LoopConfig {
            fixed_step: STEP,
            max_elapsed: Duration::from_millis(200),
            max_accumulated: Duration::from_millis(500),
            poll_input_every_iteration: false,
        }
    }

    fn device() -> Device {
        Device::setup(GfxConfig::default(), HeadlessBackend::default()).unwrap()
    }

    #[derive(Default)]
    struct ScriptedApp {
        updates: Vec<LoopTime>,
        draws: Vec<LoopTime>,
        inputs: Vec<(usize, Duration)>,
        exit_on_update: Option<usize>,
        pressed_seen: bool,
        resized: Option<(u32, u32)>,
        shut_down: bool,
    }

    impl App for ScriptedApp {
        fn handle_input(
            &mut self,
            input: &InputState,
            frame: &InputFrame,
            elapsed: Duration,
        ) -> AppControl {
            self.inputs.push((frame.events.len(), elapsed));
            self.pressed_seen |= frame.key_pressed(Key::Space) && input.key_down(Key::Space);
            AppControl::Continue
        }

        fn update(&mut self, time: &LoopTime) -> AppControl {
            self.updates.push(*time);
            if self.exit_on_update == Some(self.updates.len()) {
                AppControl::Exit
            } else {
                AppControl::Continue
            }
        }

        fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
            self.draws.push(ctx.time);
            ctx.begin_default_pass(&PassAction::default())?.end();
            Ok(AppControl::Continue)
        }

        fn resized(&mut self, width: u32, height: u32) {
            self.resized = Some((width, height));
        }

        fn shutdown(&mut self, _gfx: &mut Device) {
            self.shut_down = true;
        }
    }

    fn space(pressed: bool) -> PlatformEvent {
        PlatformEvent::Input(InputEvent::Key {
            key: Key::Space,
            pressed,
            repeat: false,
        })
    }

    // ── catch-up ───────────────────────────────────────────────────────

    #[test]
    fn three_and_a_half_steps_update_three_times_and_draw_once() {
        let mut gfx = device();
        let mut app = ScriptedApp::default();
        let mut clock = ManualClock::new([STEP * 7 / 2]);
        let mut lp = FixedStepLoop::new(config());

        let exit = lp
            .run(&mut ScriptedPlatform::idle(1), &mut clock, &mut gfx, &mut app)
            .unwrap();

        assert_eq!(exit, LoopExit::Quit);
        assert_eq!(app.updates.len(), 3);
        assert!(app.updates.iter().all(|t| t.elapsed == STEP && t.alpha == 0.0));
        assert_eq!(app.updates[2].total, STEP * 3);
        assert_eq!(app.draws.len(), 1);
        assert!((app.draws[0].alpha - 0.5).abs() < 1e-3);
        assert_eq!(app.draws[0].total, STEP * 3);
        assert_eq!(app.draws[0].elapsed, STEP * 7 / 2);
        assert_eq!(gfx.frame_index(), 2);
        assert!(app.shut_down);
    }

    #[test]
    fn exit_mid_catch_up_skips_remaining_steps_and_draw() {
        let mut gfx = device();
        let mut app = ScriptedApp {
            exit_on_update: Some(2),
            ..Default::default()
        };
        let mut clock = ManualClock::new([STEP * 5]);
        let mut lp = FixedStepLoop::new(config());

        let exit = lp
            .run(&mut ScriptedPlatform::idle(3), &mut clock, &mut gfx, &mut app)
            .unwrap();

        assert_eq!(exit, LoopExit::App);
        assert_eq!(app.updates.len(), 2);
        assert!(app.draws.is_empty());
        assert_eq!(lp.stats().updates, 2);
    }

    #[test]
    fn quit_event_stops_before_any_update() {
        let mut gfx = device();
        let mut app = ScriptedApp::default();
        let mut clock = ManualClock::new([STEP * 3]);
        let mut platform = ScriptedPlatform::new([vec![PlatformEvent::QuitRequested]]);

        let exit = FixedStepLoop::new(config())
            .run(&mut platform, &mut clock, &mut gfx, &mut app)
            .unwrap();

        assert_eq!(exit, LoopExit::Quit);
        assert!(app.updates.is_empty());
        assert!(app.draws.is_empty());
    }

    #[test]
    fn stalls_are_clamped() {
        let mut gfx = device();
        let mut app = ScriptedApp::default();
        let mut clock = ManualClock::new([Duration::from_secs(5)]);

        FixedStepLoop::new(config())
            .run(&mut ScriptedPlatform::idle(1), &mut clock, &mut gfx, &mut app)
            .unwrap();

        // max_elapsed of 200ms bounds the backlog to 20 steps.
        assert_eq!(app.updates.len(), 20);
    }

    #[test]
    fn residue_carries_into_later_iterations() {
        let mut gfx = device();
        let mut app = ScriptedApp::default();
        let mut clock = ManualClock::new([STEP * 3 / 2, STEP * 3 / 2]);

        FixedStepLoop::new(config())
            .run(&mut ScriptedPlatform::idle(2), &mut clock, &mut gfx, &mut app)
            .unwrap();

        assert_eq!(app.updates.len(), 3);
        assert_eq!(app.draws.len(), 2);
        assert!(app.draws[1].alpha.abs() < 1e-3);
    }

    // ── input ──────────────────────────────────────────────────────────

    #[test]
    fn under_step_iterations_keep_input_queued() {
        let mut gfx = device();
        let mut app = ScriptedApp::default();
        let mut clock = ManualClock::new([STEP / 2, STEP / 2]);
        let mut platform = ScriptedPlatform::new([vec![space(true)], vec![]]);

        FixedStepLoop::new(config())
            .run(&mut platform, &mut clock, &mut gfx, &mut app)
            .unwrap();

        // First iteration is under a step: no dispatch. The second sees the
        // queued press.
        assert_eq!(app.inputs, vec![(1, STEP / 2)]);
        assert!(app.pressed_seen);
        assert_eq!(app.updates.len(), 1);
    }

    #[test]
    fn polling_every_iteration_dispatches_early() {
        let mut gfx = device();
        let mut app = ScriptedApp::default();
        let mut clock = ManualClock::new([STEP / 2, STEP / 2]);
        let mut platform = ScriptedPlatform::new([vec![space(true)], vec![]]);
        let mut lp = FixedStepLoop::new(LoopConfig {
            poll_input_every_iteration: true,
            ..config()
        });

        lp.run(&mut platform, &mut clock, &mut gfx, &mut app).unwrap();

        assert_eq!(app.inputs, vec![(1, STEP / 2), (0, STEP / 2)]);
        assert_eq!(lp.stats().input_dispatches, 2);
    }

    #[test]
    fn resize_reaches_device_and_app() {
        let mut gfx = device();
        let mut app = ScriptedApp::default();
        let mut clock = ManualClock::default();
        let mut platform = ScriptedPlatform::new([vec![PlatformEvent::Resized {
            width: 320,
            height: 200,
        }]]);

        FixedStepLoop::new(config())
            .run(&mut platform, &mut clock, &mut gfx, &mut app)
            .unwrap();

        assert_eq!(app.resized, Some((320, 200)));
        assert_eq!(gfx.framebuffer_size(), (320, 200));
    }
}
