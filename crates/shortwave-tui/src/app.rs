//! App: terminal front panel and event loop.
//!
//! Architecture:
//! - `App` owns the `TuningController`; every input becomes an `Action`.
//! - A blocking task reads crossterm events and forwards them over `mpsc`.
//! - A 30 Hz interval polls the mixer's VU levels and redraws.
//! - Mouse hit-testing uses the rectangles recorded by the last draw.
//! - While the help overlay is open it swallows all input except close keys.

use std::io;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, MouseButton, MouseEvent,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use shortwave_core::{DragScale, DragState, DragTarget, Step, TuningController};

use crate::action::{action_for_key, Action, VOLUME_STEP};
use crate::theme::{style_border, style_default, style_muted, style_secondary};
use crate::widgets::controls::{draw_power_button, draw_volume_knob};
use crate::widgets::dial::{draw_dial, mhz_per_column};
use crate::widgets::help_overlay::draw_help_overlay;
use crate::widgets::readout::{draw_readout, status};
use crate::widgets::vu_meter::{draw_vu_meter, level_to_frac, PeakHold};

/// Redraw / VU-poll rate.
const UI_FPS: u64 = 30;

const HELP: &str = "↑↓ fine  ←→ coarse  +/- volume  p power  ? help  q quit  · drag dial/knob";

/// Clickable regions recorded at the last draw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HitAreas {
    pub dial: Rect,
    pub knob: Rect,
    pub power: Rect,
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    r.width > 0
        && r.height > 0
        && col >= r.x
        && col < r.x + r.width
        && row >= r.y
        && row < r.y + r.height
}

/// Map a mouse event to an action given the current layout.
pub fn action_for_mouse(event: MouseEvent, areas: &HitAreas) -> Option<Action> {
    let (col, row) = (event.column, event.row);
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if hit(areas.power, col, row) {
                Some(Action::TogglePower)
            } else if hit(areas.dial, col, row) {
                Some(Action::PointerDown(DragTarget::Dial, col as f32))
            } else if hit(areas.knob, col, row) {
                Some(Action::PointerDown(DragTarget::Volume, row as f32))
            } else {
                None
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => Some(Action::PointerMove { column: col, row }),
        MouseEventKind::Up(MouseButton::Left) => Some(Action::PointerUp),
        MouseEventKind::ScrollUp if hit(areas.dial, col, row) => Some(Action::Step(Step::FineUp)),
        MouseEventKind::ScrollDown if hit(areas.dial, col, row) => {
            Some(Action::Step(Step::FineDown))
        }
        MouseEventKind::ScrollUp if hit(areas.knob, col, row) => Some(Action::Volume(VOLUME_STEP)),
        MouseEventKind::ScrollDown if hit(areas.knob, col, row) => {
            Some(Action::Volume(-VOLUME_STEP))
        }
        _ => None,
    }
}

pub struct App {
    controller: TuningController,
    areas: HitAreas,
    vu: (f32, f32),
    peaks: (PeakHold, PeakHold),
    show_help: bool,
    should_quit: bool,
}

impl App {
    pub fn new(controller: TuningController) -> Self {
        Self {
            controller,
            areas: HitAreas::default(),
            vu: (0.0, 0.0),
            peaks: (PeakHold::default(), PeakHold::default()),
            show_help: false,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        self.controller.power_off();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<Event>(256);

        // ── Background task: keyboard/mouse events ────────────────────────────
        // Polls with a timeout so the task notices when the loop has gone.
        tokio::task::spawn_blocking(move || {
            while !tx.is_closed() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if tx.blocking_send(ev).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });

        let mut ui_tick = tokio::time::interval(Duration::from_millis(1000 / UI_FPS));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("front panel up");
        loop {
            terminal.draw(|f| self.draw(f))?;
            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(ev) = rx.recv() => {
                    self.handle_event(ev);
                    // Drain whatever else arrived (mouse drags come in bursts).
                    while let Ok(ev) = rx.try_recv() {
                        self.handle_event(ev);
                    }
                }
                _ = ui_tick.tick() => {
                    self.tick();
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self) {
        self.vu = self.controller.tick();
        self.peaks.0.update(level_to_frac(self.vu.0));
        self.peaks.1.update(level_to_frac(self.vu.1));
    }

    fn handle_event(&mut self, ev: Event) {
        let action = match ev {
            Event::Key(key) => action_for_key(key),
            Event::Mouse(mouse) => action_for_mouse(mouse, &self.areas),
            _ => None,
        };
        let Some(action) = action else {
            return;
        };
        if self.show_help {
            if matches!(action, Action::ToggleHelp | Action::Quit) {
                self.show_help = false;
            }
            return;
        }
        self.dispatch(action);
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::Step(step) => self.controller.step(step),
            Action::Volume(delta) => self.controller.adjust_volume(delta),
            Action::TogglePower => self.controller.toggle_power(),
            Action::PointerDown(target, pos) => self.controller.pointer_down(target, pos),
            Action::PointerMove { column, row } => match self.controller.drag_state() {
                DragState::Dragging {
                    target: DragTarget::Dial,
                    ..
                } => self.controller.pointer_move(column as f32),
                DragState::Dragging {
                    target: DragTarget::Volume,
                    ..
                } => self.controller.pointer_move(row as f32),
                DragState::Idle => {}
            },
            Action::PointerUp => self.controller.pointer_up(),
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::Quit => {
                info!("quit requested");
                self.should_quit = true;
            }
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, f: &mut Frame) {
        let c = &self.controller;
        let state = c.state();
        let reading = c.reading();
        let powered = state.power();

        f.render_widget(Block::default().style(style_default()), f.area());
        let outer = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border())
            .title(Span::styled(" SHORTWAVE ", style_secondary()));
        let inner = outer.inner(f.area());
        f.render_widget(outer, f.area());

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Min(4),
                Constraint::Length(1),
            ])
            .split(inner);

        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(14)])
            .split(rows[0]);
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(2), Constraint::Length(6)])
            .split(rows[4]);

        let levels = c.engine().levels();
        let stream_lost = levels.stream_failed()
            && c.engine().active_station().is_some()
            && c.engine().active_station() == reading.nearest;
        let status = status(powered, c.label(), &reading, stream_lost);

        draw_readout(f, top[0], state.frequency_mhz(), &reading, status);
        draw_power_button(f, top[1], powered);
        draw_dial(f, rows[2], state.frequency_mhz(), c.table(), powered);
        let vu_area = Rect {
            height: bottom[0].height.min(2),
            ..bottom[0]
        };
        draw_vu_meter(f, vu_area, self.vu, (&self.peaks.0, &self.peaks.1));
        draw_volume_knob(f, bottom[2], state.volume(), powered);
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(HELP, style_muted()))),
            rows[5],
        );

        self.areas = HitAreas {
            dial: rows[2],
            knob: bottom[2],
            power: Rect {
                height: 1,
                ..top[1]
            },
        };

        let scale = self.controller.drag_scale();
        let mhz_per_unit = mhz_per_column(rows[2].width);
        if scale.mhz_per_unit != mhz_per_unit {
            debug!(width = rows[2].width, mhz_per_unit, "dial resized");
            self.controller.set_drag_scale(DragScale {
                mhz_per_unit,
                ..scale
            });
        }

        if self.show_help {
            draw_help_overlay(f, f.area());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use shortwave_core::engine::STATIC_BASE_VOLUME;
    use shortwave_core::stream::OpenedStream;
    use shortwave_core::{
        mixer_channel, AudioEngine, Station, StationTable, StreamError, StreamResult,
        StreamSource, TunerState,
    };

    use crate::widgets::dial::column_for;

    struct NoDecoder;

    impl StreamSource for NoDecoder {
        fn open(&mut self, _station: &Station, _sample_rate: u32) -> StreamResult<OpenedStream> {
            Err(StreamError::NoDecoder)
        }
    }

    fn app() -> App {
        let (handle, _mixer) = mixer_channel(48_000);
        let engine = AudioEngine::new(handle, Box::new(NoDecoder), 48_000, STATIC_BASE_VOLUME);
        let table = StationTable::new(vec![Station::new(12.0, "A", "first", None)]);
        App::new(TuningController::new(
            table,
            TunerState::new(14.0, 0.5),
            engine,
        ))
    }

    fn render(app: &mut App, width: u16, height: u16) -> Terminal<TestBackend> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        terminal
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    fn areas() -> HitAreas {
        HitAreas {
            dial: Rect::new(2, 6, 60, 3),
            knob: Rect::new(70, 10, 6, 6),
            power: Rect::new(64, 1, 14, 1),
        }
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn press_on_dial_starts_frequency_drag() {
        let a = mouse(MouseEventKind::Down(MouseButton::Left), 10, 7);
        assert_eq!(
            action_for_mouse(a, &areas()),
            Some(Action::PointerDown(DragTarget::Dial, 10.0))
        );
    }

    #[test]
    fn press_on_knob_starts_volume_drag_along_rows() {
        let a = mouse(MouseEventKind::Down(MouseButton::Left), 72, 12);
        assert_eq!(
            action_for_mouse(a, &areas()),
            Some(Action::PointerDown(DragTarget::Volume, 12.0))
        );
    }

    #[test]
    fn press_on_power_toggles() {
        let a = mouse(MouseEventKind::Down(MouseButton::Left), 70, 1);
        assert_eq!(action_for_mouse(a, &areas()), Some(Action::TogglePower));
    }

    #[test]
    fn press_outside_does_nothing() {
        let a = mouse(MouseEventKind::Down(MouseButton::Left), 0, 0);
        assert_eq!(action_for_mouse(a, &areas()), None);
    }

    #[test]
    fn drag_and_release_pass_through() {
        let a = mouse(MouseEventKind::Drag(MouseButton::Left), 30, 40);
        assert_eq!(
            action_for_mouse(a, &areas()),
            Some(Action::PointerMove { column: 30, row: 40 })
        );
        let a = mouse(MouseEventKind::Up(MouseButton::Left), 30, 40);
        assert_eq!(action_for_mouse(a, &areas()), Some(Action::PointerUp));
    }

    #[test]
    fn scroll_wheel_fine_tunes_and_sets_volume() {
        let up = mouse(MouseEventKind::ScrollUp, 20, 7);
        assert_eq!(action_for_mouse(up, &areas()), Some(Action::Step(Step::FineUp)));
        let down = mouse(MouseEventKind::ScrollDown, 72, 12);
        assert_eq!(
            action_for_mouse(down, &areas()),
            Some(Action::Volume(-VOLUME_STEP))
        );
    }

    #[test]
    fn edges_of_a_rect() {
        let r = Rect::new(5, 5, 3, 2);
        assert!(hit(r, 5, 5));
        assert!(hit(r, 7, 6));
        assert!(!hit(r, 8, 5));
        assert!(!hit(r, 5, 7));
        assert!(!hit(Rect::default(), 0, 0));
    }

    #[test]
    fn dial_drag_keeps_needle_under_pointer() {
        let mut app = app();
        for (width, quarters) in [(80u16, 1u16), (120, 3)] {
            render(&mut app, width, 24);
            let dial = app.areas.dial;
            let start = dial.x + column_for(app.controller.state().frequency_mhz(), dial.width);
            let target = dial.x + dial.width * quarters / 4;
            assert_ne!(start, target);
            let row = dial.y + 1;

            app.handle_event(Event::Mouse(mouse(
                MouseEventKind::Down(MouseButton::Left),
                start,
                row,
            )));
            app.handle_event(Event::Mouse(mouse(
                MouseEventKind::Drag(MouseButton::Left),
                target,
                row,
            )));
            app.handle_event(Event::Mouse(mouse(
                MouseEventKind::Up(MouseButton::Left),
                target,
                row,
            )));

            let needle = column_for(app.controller.state().frequency_mhz(), dial.width);
            assert_eq!(dial.x + needle, target, "width {width}");
        }
    }

    #[test]
    fn help_overlay_opens_and_swallows_input() {
        let mut app = app();
        app.handle_event(key(KeyCode::Char('?')));
        assert!(app.show_help);
        let terminal = render(&mut app, 100, 40);
        assert!(screen(&terminal).contains(env!("CARGO_PKG_VERSION")));

        let before = app.controller.state().frequency_mhz();
        app.handle_event(key(KeyCode::Up));
        app.handle_event(key(KeyCode::Char('p')));
        assert_eq!(app.controller.state().frequency_mhz(), before);
        assert!(!app.controller.state().power());

        app.handle_event(key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(!app.should_quit);

        app.handle_event(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn question_mark_closes_help_too() {
        let mut app = app();
        app.handle_event(key(KeyCode::Char('?')));
        app.handle_event(key(KeyCode::Char('?')));
        assert!(!app.show_help);
        app.handle_event(key(KeyCode::Up));
        assert!((app.controller.state().frequency_mhz() - 14.1).abs() < 1e-4);
    }
}
