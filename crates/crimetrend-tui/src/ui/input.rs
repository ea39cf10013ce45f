//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, View};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char(c @ '1'..='5') => {
            if let Some(view) = View::from_digit(c) {
                app.view = view;
            }
        }
        KeyCode::Tab | KeyCode::Right => app.view = app.view.next(),
        KeyCode::BackTab | KeyCode::Left => app.view = app.view.prev(),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => app.adjust_window(1),
        KeyCode::Char('-') | KeyCode::Down => app.adjust_window(-1),
        KeyCode::Char('u') => app.refresh_background(),
        _ => {}
    }

    // Any key press clears a stale status message, except the ones that set it
    if !matches!(
        key.code,
        KeyCode::Char('+' | '=' | '-' | 'u') | KeyCode::Up | KeyCode::Down
    ) && !app.syncing
    {
        app.status_message = None;
    }

    false
}
