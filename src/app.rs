//! Interactive terminal host: input, pacing, HUD, and the engine frame loop.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Color;

use crate::color::Rgba;
use crate::config::{load_settings, save_settings_atomic, Settings};
use crate::engine::{Engine, Viewport};
use crate::term::{draw_text, Terminal};
use crate::theme::{next_theme, theme_by_name};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    TogglePause,
    Reset,
    CycleTheme,
    ToggleHud,
}

pub fn map_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(' ') => Some(Action::TogglePause),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::Reset),
        KeyCode::Char('t') | KeyCode::Char('T') => Some(Action::CycleTheme),
        KeyCode::Char('h') | KeyCode::Char('H') => Some(Action::ToggleHud),
        _ => None,
    }
}

enum Input {
    Action(Action),
    Resize(u16, u16),
}

fn collect_input_nonblocking() -> anyhow::Result<Vec<Input>> {
    let mut out = Vec::new();
    while event::poll(Duration::from_millis(0))? {
        match event::read()? {
            Event::Key(k) if k.kind == KeyEventKind::Press => {
                if let Some(a) = map_key(k.code) {
                    out.push(Input::Action(a));
                }
            }
            Event::Resize(w, h) => out.push(Input::Resize(w, h)),
            _ => {}
        }
        if out.len() >= 32 {
            break;
        }
    }
    Ok(out)
}

/// One lattice cell per terminal cell.
pub fn viewport_for(cols: u16, rows: u16, cell_size: f32) -> Viewport {
    Viewport::new(cols as f32 * cell_size, rows as f32 * cell_size, 1.0)
}

pub struct RunOptions {
    pub settings: Settings,
    pub seed: Option<u64>,
    /// Theme changes are written back here on exit.
    pub settings_path: Option<PathBuf>,
}

struct App {
    settings: Settings,
    engine: Engine,
    term: Terminal,
    clock: Instant,
    show_hud: bool,
    theme_changed: bool,
    should_quit: bool,
}

impl App {
    fn now_ms(&self) -> f64 {
        self.clock.elapsed().as_secs_f64() * 1000.0
    }

    fn background(&self) -> Rgba {
        Rgba::parse(&self.settings.colors.background).unwrap_or(Rgba::rgb(0, 0, 0))
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let frame_dt = Duration::from_secs_f32(1.0 / self.settings.performance.target_fps);

        while !self.should_quit {
            let frame_start = Instant::now();
            let mut dirty = false;

            for input in collect_input_nonblocking()? {
                let now = self.now_ms();
                match input {
                    Input::Action(a) => {
                        self.apply(a, now);
                        dirty = true;
                    }
                    Input::Resize(w, h) => {
                        self.term.resize(w, h);
                        let vp = viewport_for(w, h, self.settings.performance.cell_size);
                        self.engine.request_resize(vp, now);
                        dirty = true;
                    }
                }
            }
            if self.should_quit {
                break;
            }

            let now = self.now_ms();
            let mut drew = self.engine.tick(now, &mut self.term.surface);
            if !drew && dirty {
                self.engine.render_now(&mut self.term.surface, now);
                drew = true;
            }
            if drew {
                if self.show_hud {
                    self.draw_hud();
                }
                self.term.present()?;
            }

            spin_sleep(frame_dt, frame_start);
        }
        Ok(())
    }

    fn apply(&mut self, action: Action, now: f64) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::TogglePause => {
                if self.engine.is_paused() {
                    self.engine.resume(now);
                } else {
                    self.engine.pause();
                }
            }
            Action::Reset => self.engine.reset(now),
            Action::CycleTheme => {
                let current = self.settings.theme.clone().unwrap_or_default();
                let theme = next_theme(&current);
                theme.apply(&mut self.settings);
                self.engine.reconfigure(&self.settings, now);
                self.term.surface.set_background(self.background());
                self.term.invalidate();
                self.theme_changed = true;
                tracing::info!(theme = theme.name, "theme changed");
            }
            Action::ToggleHud => self.show_hud = !self.show_hud,
        }
    }

    fn draw_hud(&mut self) {
        let stats = self.engine.stats();
        let bg = self.background().to_crossterm();
        let fg = Color::White;
        let theme = self.settings.theme.as_deref().unwrap_or("default");

        let mut line = format!(
            " asciifog  theme {}  blobs {}  fps {}  spawned {} ",
            theme, stats.blob_count, stats.fps, stats.spawned
        );
        if stats.paused {
            line.push_str(" [paused] ");
        }
        let buf = &mut self.term.surface.buf;
        draw_text(buf, 0, 0, &line, fg, bg);
        let help = " space pause  r reset  t theme  h hud  q quit ";
        draw_text(buf, 0, buf.h.saturating_sub(1), help, fg, bg);
    }
}

pub fn run(opts: RunOptions) -> anyhow::Result<()> {
    let settings = opts.settings.sanitized();
    let background = Rgba::parse(&settings.colors.background).unwrap_or(Rgba::rgb(0, 0, 0));

    let term = Terminal::begin(background).context("failed to open terminal")?;
    let clock = Instant::now();
    let vp = viewport_for(term.cols, term.rows, settings.performance.cell_size);
    let engine = Engine::new(&settings, vp, 0.0, opts.seed);

    let mut app = App {
        settings,
        engine,
        term,
        clock,
        show_hud: false,
        theme_changed: false,
        should_quit: false,
    };

    let result = app.run();
    if let Err(err) = app.term.end() {
        tracing::error!(?err, "failed to restore terminal");
    }
    let App {
        settings,
        engine,
        theme_changed,
        ..
    } = app;
    engine.destroy();
    result?;

    // only the theme is persisted; CLI overrides stay out of the file
    if let (true, Some(path), Some(name)) = (theme_changed, opts.settings_path, settings.theme) {
        let mut stored = load_settings(&path);
        theme_by_name(&name).apply(&mut stored);
        save_settings_atomic(&path, &stored)
            .with_context(|| format!("failed to save {}", path.display()))?;
    }
    Ok(())
}

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
