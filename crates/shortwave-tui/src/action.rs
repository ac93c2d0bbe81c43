//! Action enum: user intents decoded from terminal events.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use shortwave_core::{DragTarget, Step};

/// Volume change per key press.
pub const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Step(Step),
    /// Relative volume change.
    Volume(f32),
    TogglePower,
    /// Press inside the dial or knob; `pos` is along the drag axis.
    PointerDown(DragTarget, f32),
    PointerMove { column: u16, row: u16 },
    PointerUp,
    ToggleHelp,
    Quit,
}

/// Map a key press to an action.  Key releases are ignored; repeats act like
/// presses.
pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('k') => Action::Step(Step::FineUp),
        KeyCode::Down | KeyCode::Char('j') => Action::Step(Step::FineDown),
        KeyCode::Right | KeyCode::Char('l') => Action::Step(Step::CoarseUp),
        KeyCode::Left | KeyCode::Char('h') => Action::Step(Step::CoarseDown),
        KeyCode::Char('+') | KeyCode::Char('=') => Action::Volume(VOLUME_STEP),
        KeyCode::Char('-') => Action::Volume(-VOLUME_STEP),
        KeyCode::Char('p') | KeyCode::Char(' ') => Action::TogglePower,
        KeyCode::Char('?') => Action::ToggleHelp,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}
