//! Terminal User Interface Module
//!
//! Provides the terminal interface for the TAP console.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  TAP Console — Territory Analysis & Partitioning            ●  │
//! ├───────────────────────────────────────┬─────────────────────────┤
//! │  ┌─ Processed Datasets ───────────┐   │  ┌─ Experiments ────┐  │
//! │  │ ▶ stores.csv                   │   │  │ ▶ exp-41  [done] │  │
//! │  └────────────────────────────────┘   │  └──────────────────┘  │
//! │  ┌─ OSM Cache ────────────────────┐   │                        │
//! │  │ files: 3   size: 12.50 MB      │   │                        │
//! │  └────────────────────────────────┘   │                        │
//! ├───────────────────────────────────────┴─────────────────────────┤
//! │  [u] upload  [a/Enter] analyze  [c] clear cache  [q] quit       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod event;
pub mod theme;
pub mod ui;

pub use app::{App, Panel, Screen};
pub use event::{AppAction, EventHandler};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use tracing::{error, info};

/// Type alias for our terminal backend
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode
pub fn init_terminal() -> anyhow::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state
pub fn restore_terminal(terminal: &mut Tui) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI application
pub async fn run(config: crate::config::Config) -> anyhow::Result<()> {
    info!("Starting TUI mode");

    let tick_rate = config.ui.tick_rate();
    let mut app = App::new(config)?;
    app.bootstrap().await;

    let mut terminal = init_terminal()?;
    let mut events = EventHandler::new(tick_rate);

    let result = run_app(&mut terminal, &mut app, &mut events).await;

    if let Err(e) = restore_terminal(&mut terminal) {
        error!("Failed to restore terminal: {}", e);
    }

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        if let Some(action) = events.next().await {
            match action {
                AppAction::ForceQuit => break,
                AppAction::Quit => break,
                other => app.handle_action(other).await,
            }
        }

        if app.should_quit {
            break;
        }
    }

    info!("TUI exited normally");
    Ok(())
}
