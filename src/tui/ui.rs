//! UI Rendering
//!
//! Main UI layout and rendering logic for the TUI.

use crate::controllers::{MessageRole, Severity, SessionPhase};
use crate::tui::app::{App, Panel, Screen, MAPPING_FIELDS};
use crate::tui::theme::{Icons, Theme};
use crate::types::format_metric;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

/// Render the main UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Body
            Constraint::Length(1), // Notification
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);
    match app.screen {
        Screen::DataManagement | Screen::Help => render_management(frame, chunks[1], app),
        Screen::Results => render_results(frame, chunks[1], app),
    }
    render_notification(frame, chunks[2], app);
    render_status_bar(frame, chunks[3], app);

    // Modal overlays
    if app.ingestion.mapping.is_open() {
        render_mapping_dialog(frame, app);
    }
    if app.ingestion.analysis.is_some() {
        render_analysis_dialog(frame, app);
    }
    if app.file_prompt.is_some() {
        render_file_prompt(frame, app);
    }
    if app.screen == Screen::Help {
        render_help(frame);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let busy_dot = if app.busy() {
        Span::styled(Icons::ACTIVE, Theme::warning())
    } else {
        Span::styled(Icons::ACTIVE, Theme::success())
    };

    let title_text = vec![Line::from(vec![
        Span::styled("TAP Console", Theme::title()),
        Span::styled(" — Territory Analysis & Partitioning", Theme::text_secondary()),
        Span::raw("  "),
        busy_dot,
    ])];

    let title = Paragraph::new(title_text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Theme::border()));
    frame.render_widget(title, area);
}

fn render_management(frame: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(5)])
        .split(columns[0]);

    render_datasets(frame, left[0], app);
    render_cache(frame, left[1], app);
    render_experiments(frame, columns[1], app);
}

fn render_datasets(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.panel == Panel::Datasets;
    let block = Block::default()
        .title(" Processed Datasets ")
        .borders(Borders::ALL)
        .border_style(if focused { Theme::border_focused() } else { Theme::border() });

    if let Some(error) = &app.ingestion.page_error {
        let paragraph = Paragraph::new(Line::from(vec![
            Span::styled(Icons::ERROR, Theme::error()),
            Span::raw(" "),
            Span::styled(error.as_str(), Theme::error()),
        ]))
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = if app.ingestion.datasets.is_empty() {
        vec![ListItem::new(Span::styled(
            "No processed datasets yet. Press 'u' to upload one.",
            Theme::text_dim(),
        ))]
    } else {
        app.ingestion
            .datasets
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let selected = focused && i == app.dataset_index;
                let marker = if selected { Icons::SELECTED } else { " " };
                let style = if selected { Theme::selected() } else { Theme::text() };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", marker), style),
                    Span::styled(name.as_str(), style),
                ]))
            })
            .collect()
    };

    frame.render_widget(List::new(items).block(block), area);
}

fn render_cache(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" OSM Cache ")
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let lines = match &app.ingestion.cache {
        Some(cache) => vec![
            Line::from(vec![
                Span::styled("files: ", Theme::text_secondary()),
                Span::styled(cache.file_count.to_string(), Theme::text()),
                Span::styled("   size: ", Theme::text_secondary()),
                Span::styled(format!("{:.2} MB", cache.total_size_mb), Theme::text()),
            ]),
            Line::from(Span::styled(cache.directory.as_str(), Theme::text_dim())),
        ],
        // Degraded view rather than a page failure.
        None => vec![Line::from(Span::styled(
            "Cache status unavailable.",
            Theme::text_dim(),
        ))],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_experiments(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.panel == Panel::Experiments;
    let block = Block::default()
        .title(" Experiments ")
        .borders(Borders::ALL)
        .border_style(if focused { Theme::border_focused() } else { Theme::border() });

    let items: Vec<ListItem> = if app.experiments.is_empty() {
        vec![ListItem::new(Span::styled(
            "No experiments yet.",
            Theme::text_dim(),
        ))]
    } else {
        app.experiments
            .iter()
            .enumerate()
            .map(|(i, experiment)| {
                let selected = focused && i == app.experiment_index;
                let marker = if selected { Icons::SELECTED } else { " " };
                let style = if selected { Theme::selected() } else { Theme::text() };
                let status = experiment.status.as_deref().unwrap_or("unknown");
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", marker), style),
                    Span::styled(experiment.experiment_id.as_str(), style),
                    Span::styled(format!("  [{}]", status), Theme::text_secondary()),
                ]))
            })
            .collect()
    };

    frame.render_widget(List::new(items).block(block), area);
}

fn render_results(frame: &mut Frame, area: Rect, app: &App) {
    match &app.results.phase {
        SessionPhase::Inactive => {
            let paragraph = Paragraph::new(Span::styled("No experiment selected.", Theme::text_dim()))
                .block(Block::default().borders(Borders::ALL).border_style(Theme::border()));
            frame.render_widget(paragraph, area);
        }
        SessionPhase::Loading => {
            let paragraph = Paragraph::new(Span::styled("Fetching experiment results...", Theme::text_secondary()))
                .block(Block::default().borders(Borders::ALL).border_style(Theme::border()));
            frame.render_widget(paragraph, area);
        }
        SessionPhase::Failed(message) => {
            // All-or-nothing activation: no partial content.
            let paragraph = Paragraph::new(Line::from(vec![
                Span::styled(Icons::ERROR, Theme::error()),
                Span::raw(" "),
                Span::styled(message.as_str(), Theme::error()),
            ]))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).border_style(Theme::border()));
            frame.render_widget(paragraph, area);
        }
        SessionPhase::Ready { .. } => render_results_content(frame, area, app),
    }
}

fn render_results_content(frame: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40), // reports + visualizations
            Constraint::Min(6),         // chat history
            Constraint::Length(4),      // chat input
        ])
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[0]);

    render_reports(frame, top[0], app);
    render_visualizations(frame, top[1], app);
    render_chat(frame, rows[1], app);

    frame.render_widget(&app.chat_input, inset(rows[2]));
    let input_block = Block::default()
        .title(" Your question (Enter to send, Ctrl+R to retry) ")
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());
    frame.render_widget(input_block, rows[2]);
}

fn render_reports(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Evaluation Reports ")
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let SessionPhase::Ready { result, .. } = &app.results.phase else {
        frame.render_widget(block, area);
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    let mut algorithms: Vec<&String> = result.evaluation_reports.keys().collect();
    algorithms.sort();
    for algorithm in algorithms {
        lines.push(Line::from(Span::styled(
            algorithm.to_uppercase(),
            Theme::heading(),
        )));
        if let Some(metrics) = result.evaluation_reports.get(algorithm) {
            let mut names: Vec<&String> = metrics.keys().collect();
            names.sort();
            for name in names {
                if let Some(value) = metrics.get(name) {
                    lines.push(Line::from(vec![
                        Span::styled(format!("  {} {}: ", Icons::DOT, name), Theme::text_secondary()),
                        Span::styled(format_metric(value), Theme::text()),
                    ]));
                }
            }
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("No evaluation reports.", Theme::text_dim())));
    }

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

fn render_visualizations(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Visualizations ")
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let groups = app.results.grouped_visualizations();
    let mut lines: Vec<Line> = Vec::new();
    for (algorithm, items) in &groups {
        lines.push(Line::from(Span::styled(algorithm.to_uppercase(), Theme::heading())));
        for viz in items {
            lines.push(Line::from(vec![
                Span::styled(format!("  {} ", Icons::DOT), Theme::text_secondary()),
                Span::styled(viz.file_path.as_str(), Theme::text()),
                Span::styled(format!(" ({})", viz.kind), Theme::text_dim()),
            ]));
        }
        if let Some(url) = app.results.export_url(algorithm) {
            lines.push(Line::from(vec![
                Span::styled("  export: ", Theme::text_secondary()),
                Span::styled(url, Theme::info()),
            ]));
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("No visualizations.", Theme::text_dim())));
    }

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

fn render_chat(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Analysis Chat ")
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.results.messages {
        let (prefix, style) = match msg.role {
            MessageRole::User => ("You", Theme::user_message()),
            MessageRole::Bot => ("Assistant", Theme::bot_message()),
            MessageRole::System => ("System", Theme::system_message()),
        };
        let mut header = vec![Span::styled(format!("{}: ", prefix), style)];
        if msg.retry.is_some() {
            header.push(Span::styled(
                format!("{} Ctrl+R to retry", Icons::RETRY),
                Theme::warning(),
            ));
        }
        lines.push(Line::from(header));
        for text_line in msg.text.lines() {
            lines.push(Line::from(Span::styled(format!("  {}", text_line), Theme::text())));
        }
    }
    if app.results.chat_busy {
        lines.push(Line::from(Span::styled("...", Theme::text_dim())));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_mapping_dialog(frame: &mut Frame, app: &App) {
    let Some(mapping) = app.ingestion.mapping.mapping() else {
        return;
    };
    let area = centered_rect(60, 50, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" Define data columns — {} ", mapping.filename))
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());

    let mut lines = vec![
        Line::from(Span::styled(
            "Pick the file column for each field (←/→ to change, Enter to process):",
            Theme::text_secondary(),
        )),
        Line::from(""),
    ];
    let values = [
        mapping.latitude_col.as_str(),
        mapping.longitude_col.as_str(),
        mapping.id_col.as_str(),
        mapping.weight_col.as_str(),
    ];
    for (i, ((_, label), value)) in MAPPING_FIELDS.iter().zip(values).enumerate() {
        let focused = i == app.mapping_field_index;
        let marker = if focused { Icons::SELECTED } else { " " };
        let value_text = if value.is_empty() { "<none>" } else { value };
        lines.push(Line::from(vec![
            Span::styled(format!("{} {:<22}", marker, label), if focused {
                Theme::selected()
            } else {
                Theme::text()
            }),
            Span::styled(value_text, if value.is_empty() {
                Theme::text_dim()
            } else {
                Theme::text()
            }),
        ]));
    }
    if matches!(app.ingestion.mapping, crate::controllers::MappingPhase::ProcessingPending(_)) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Processing...", Theme::warning())));
    }

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

fn render_analysis_dialog(frame: &mut Frame, app: &App) {
    let Some(session) = &app.ingestion.analysis else {
        return;
    };
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" K-function analysis: {} ", session.dataset))
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());

    let lines: Vec<Line> = if session.loading {
        vec![Line::from(Span::styled("Running analysis...", Theme::text_secondary()))]
    } else if let Some(error) = &session.error {
        vec![Line::from(Span::styled(error.as_str(), Theme::error()))]
    } else if let Some(points) = &session.points {
        let mut lines = vec![Line::from(vec![
            Span::styled(format!("{:>10}", "r"), Theme::heading()),
            Span::styled(format!("{:>14}", "K(r) observed"), Theme::heading()),
            Span::styled(format!("{:>14}", "K(r) expected"), Theme::heading()),
        ])];
        for point in points {
            let clustered = point.observed > point.expected;
            lines.push(Line::from(vec![
                Span::styled(format!("{:>10.2}", point.r), Theme::text()),
                Span::styled(
                    format!("{:>14.2}", point.observed),
                    if clustered { Theme::warning() } else { Theme::text() },
                ),
                Span::styled(format!("{:>14.2}", point.expected), Theme::text_secondary()),
            ]));
        }
        lines
    } else {
        vec![Line::from(Span::styled("No data.", Theme::text_dim()))]
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_file_prompt(frame: &mut Frame, app: &App) {
    let Some(prompt) = &app.file_prompt else {
        return;
    };
    let area = centered_rect(60, 20, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Upload dataset — path to CSV file ")
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());
    let lines = vec![
        Line::from(vec![
            Span::styled("> ", Theme::shortcut_key()),
            Span::styled(prompt.value.as_str(), Theme::text()),
            Span::styled("▌", Theme::text_dim()),
        ]),
        Line::from(Span::styled("Enter to upload, Esc to cancel", Theme::text_dim())),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_notification(frame: &mut Frame, area: Rect, app: &App) {
    let Some(notification) = app.notifier.current() else {
        return;
    };
    let style = match notification.severity {
        Severity::Success => Theme::success(),
        Severity::Error => Theme::error(),
        Severity::Warning => Theme::warning(),
        Severity::Info => Theme::info(),
    };
    let paragraph = Paragraph::new(Line::from(Span::styled(notification.message, style)))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let shortcuts: &[(&str, &str)] = match app.screen {
        Screen::DataManagement => &[
            ("u", "upload"),
            ("a/Enter", "analyze"),
            ("Tab", "panel"),
            ("c", "clear cache"),
            ("r", "refresh"),
            ("F1", "help"),
            ("q", "quit"),
        ],
        Screen::Results => &[
            ("Enter", "send"),
            ("Ctrl+R", "retry"),
            ("↑/↓", "scroll"),
            ("Esc", "back"),
            ("F1", "help"),
        ],
        Screen::Help => &[("Esc", "close")],
    };

    let mut spans: Vec<Span> = Vec::new();
    for (key, desc) in shortcuts {
        spans.push(Span::styled(format!("[{}] ", key), Theme::shortcut_key()));
        spans.push(Span::styled(format!("{}  ", desc), Theme::shortcut_desc()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());
    let lines = vec![
        Line::from(Span::styled("Data Management", Theme::heading())),
        Line::from("  u          upload a CSV and map its columns"),
        Line::from("  a / Enter  K-function analysis for the selected dataset"),
        Line::from("  Tab        switch between datasets and experiments"),
        Line::from("  Enter      open the selected experiment's results"),
        Line::from("  c          clear the backend OSM cache"),
        Line::from("  r          re-fetch datasets, cache status and experiments"),
        Line::from(""),
        Line::from(Span::styled("Results", Theme::heading())),
        Line::from("  Enter      send the typed question to the assistant"),
        Line::from("  Ctrl+R     retry the last failed exchange"),
        Line::from("  Esc        back to data management"),
        Line::from(""),
        Line::from(Span::styled("Anywhere", Theme::heading())),
        Line::from("  Ctrl+Q     quit    Ctrl+C  force quit    F1  this help"),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Centered overlay rectangle, sized as a percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, parent: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(parent);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}

fn inset(area: Rect) -> Rect {
    Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    }
}
