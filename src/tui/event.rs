//! Event Handling
//!
//! Handles keyboard and timer events for the TUI.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;

/// Actions that can be performed in the application
#[derive(Debug, Clone)]
pub enum AppAction {
    /// Quit the application
    Quit,
    /// Force quit without confirmation
    ForceQuit,
    /// Submit current input (Enter key)
    Submit,
    /// Escape - close dialogs, go back
    Escape,
    /// Toggle help view
    ToggleHelp,
    /// Move selection up
    Up,
    /// Move selection down
    Down,
    /// Cycle choice left (mapping column pickers)
    Left,
    /// Cycle choice right
    Right,
    /// Move to next field/panel (Tab)
    NextField,
    /// Move to previous field/panel (Shift+Tab)
    PrevField,
    /// Retry the most recent failed chat exchange (Ctrl+R)
    Retry,
    /// Delete character
    DeleteKey,
    /// Regular input character; interpreted contextually by the app
    Input(KeyEvent),
    /// Timer tick
    Tick,
}

/// Event handler for the TUI
pub struct EventHandler {
    rx: mpsc::Receiver<AppAction>,
    _tx: mpsc::Sender<AppAction>,
}

impl EventHandler {
    /// Create a new event handler with the specified tick rate
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel(100);
        let tx_clone = tx.clone();

        // Spawn event polling task
        tokio::spawn(async move {
            let mut reader = crossterm::event::EventStream::new();
            let mut tick_interval = tokio::time::interval(tick_rate);

            loop {
                let tick = tick_interval.tick();
                let crossterm_event = reader.next().fuse();

                tokio::select! {
                    _ = tick => {
                        if tx_clone.send(AppAction::Tick).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(evt)) = crossterm_event => {
                        if let Some(action) = Self::map_event(evt) {
                            if tx_clone.send(action).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { rx, _tx: tx }
    }

    /// Try to get the next action without blocking
    pub fn try_next(&mut self) -> Option<AppAction> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next action
    pub async fn next(&mut self) -> Option<AppAction> {
        self.rx.recv().await
    }

    fn map_event(event: Event) -> Option<AppAction> {
        match event {
            Event::Key(key) => Self::map_key_event(key),
            _ => None,
        }
    }

    fn map_key_event(key: KeyEvent) -> Option<AppAction> {
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(AppAction::ForceQuit),
            (KeyModifiers::CONTROL, KeyCode::Char('q')) => Some(AppAction::Quit),
            (KeyModifiers::CONTROL, KeyCode::Char('r')) => Some(AppAction::Retry),
            (KeyModifiers::CONTROL, KeyCode::Char('h')) => Some(AppAction::ToggleHelp),
            (KeyModifiers::SHIFT, KeyCode::BackTab) => Some(AppAction::PrevField),

            (KeyModifiers::NONE, code) | (KeyModifiers::SHIFT, code) => match code {
                KeyCode::Esc => Some(AppAction::Escape),
                KeyCode::Enter => Some(AppAction::Submit),
                KeyCode::F(1) => Some(AppAction::ToggleHelp),
                KeyCode::Up => Some(AppAction::Up),
                KeyCode::Down => Some(AppAction::Down),
                KeyCode::Left => Some(AppAction::Left),
                KeyCode::Right => Some(AppAction::Right),
                KeyCode::Tab => Some(AppAction::NextField),
                KeyCode::BackTab => Some(AppAction::PrevField),
                KeyCode::Backspace => Some(AppAction::DeleteKey),
                _ => Some(AppAction::Input(key)),
            },

            _ => Some(AppAction::Input(key)),
        }
    }
}
