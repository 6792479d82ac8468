//! Application State
//!
//! Contains the main application state and logic for the TUI.

use crate::api::ApiGateway;
use crate::config::Config;
use crate::controllers::{
    DataIngestionController, MappingField, MappingPhase, NotificationChannel,
    ResultsSessionController, SendOutcome,
};
use crate::tui::event::AppAction;
use crate::types::ExperimentSummary;
use crossterm::event::KeyCode;
use std::sync::Arc;
use tokio::fs;
use tracing::warn;
use tui_textarea::TextArea;

/// Current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    DataManagement,
    Results,
    Help,
}

/// Focused panel on the data management screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Datasets,
    Experiments,
}

/// Modal text prompt for the upload file path
#[derive(Debug, Clone, Default)]
pub struct FilePrompt {
    pub value: String,
}

/// Mapping dialog fields in display order
pub const MAPPING_FIELDS: [(MappingField, &str); 4] = [
    (MappingField::Latitude, "Latitude (required)"),
    (MappingField::Longitude, "Longitude (required)"),
    (MappingField::Id, "Unique ID (optional)"),
    (MappingField::Weight, "Weight (optional)"),
];

/// Main application state
pub struct App {
    pub config: Config,
    gateway: Arc<ApiGateway>,

    // Orchestration core
    pub notifier: NotificationChannel,
    pub ingestion: DataIngestionController,
    pub results: ResultsSessionController,
    pub experiments: Vec<ExperimentSummary>,

    // UI state
    pub screen: Screen,
    pub previous_screen: Screen,
    pub panel: Panel,
    pub dataset_index: usize,
    pub experiment_index: usize,
    pub mapping_field_index: usize,
    pub file_prompt: Option<FilePrompt>,
    pub chat_input: TextArea<'static>,
    pub chat_scroll: u16,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let gateway = Arc::new(ApiGateway::new(
            config.api.base_url.clone(),
            config.api.timeout(),
        )?);
        let notifier = NotificationChannel::new(config.ui.notification_ttl());
        let ingestion = DataIngestionController::new(gateway.clone(), notifier.clone());
        let results = ResultsSessionController::new(gateway.clone());

        Ok(Self {
            config,
            gateway,
            notifier,
            ingestion,
            results,
            experiments: Vec::new(),
            screen: Screen::default(),
            previous_screen: Screen::default(),
            panel: Panel::default(),
            dataset_index: 0,
            experiment_index: 0,
            mapping_field_index: 0,
            file_prompt: None,
            chat_input: Self::fresh_chat_input(),
            chat_scroll: 0,
            should_quit: false,
        })
    }

    fn fresh_chat_input() -> TextArea<'static> {
        let mut input = TextArea::default();
        input.set_cursor_line_style(ratatui::style::Style::default());
        input.set_placeholder_text("Ask about this experiment...");
        input
    }

    /// Initial load: page state plus the experiment listing.
    pub async fn bootstrap(&mut self) {
        self.ingestion.refresh().await;
        self.refresh_experiments().await;
    }

    async fn refresh_experiments(&mut self) {
        match self.gateway.list_experiments().await {
            Ok(list) => {
                self.experiments = list;
                if self.experiment_index >= self.experiments.len() {
                    self.experiment_index = 0;
                }
            }
            Err(e) => {
                warn!("experiment listing failed: {}", e);
                self.notifier
                    .error(e.user_message("Failed to fetch the experiment list."));
            }
        }
    }

    pub fn selected_dataset(&self) -> Option<&str> {
        self.ingestion
            .datasets
            .get(self.dataset_index)
            .map(|s| s.as_str())
    }

    pub fn selected_experiment(&self) -> Option<&str> {
        self.experiments
            .get(self.experiment_index)
            .map(|e| e.experiment_id.as_str())
    }

    pub async fn handle_action(&mut self, action: AppAction) {
        if matches!(action, AppAction::Tick) {
            return;
        }

        // Modal precedence: help, file prompt, analysis dialog, mapping dialog.
        if self.screen == Screen::Help {
            if matches!(action, AppAction::Escape | AppAction::ToggleHelp) {
                self.screen = self.previous_screen;
            }
            return;
        }
        if matches!(action, AppAction::ToggleHelp) {
            self.previous_screen = self.screen;
            self.screen = Screen::Help;
            return;
        }
        if self.file_prompt.is_some() {
            self.handle_prompt_action(action).await;
            return;
        }
        if self.ingestion.analysis.is_some() {
            if matches!(action, AppAction::Escape) {
                self.ingestion.close_analysis();
            }
            return;
        }
        if self.ingestion.mapping.is_open() {
            self.handle_mapping_action(action).await;
            return;
        }

        match self.screen {
            Screen::DataManagement => self.handle_management_action(action).await,
            Screen::Results => self.handle_results_action(action).await,
            Screen::Help => {}
        }
    }

    async fn handle_prompt_action(&mut self, action: AppAction) {
        match action {
            AppAction::Escape => {
                self.file_prompt = None;
            }
            AppAction::DeleteKey => {
                if let Some(prompt) = &mut self.file_prompt {
                    prompt.value.pop();
                }
            }
            AppAction::Input(key) => {
                if let (Some(prompt), KeyCode::Char(c)) = (&mut self.file_prompt, key.code) {
                    prompt.value.push(c);
                }
            }
            AppAction::Submit => {
                let Some(prompt) = self.file_prompt.take() else {
                    return;
                };
                let path = prompt.value.trim().to_string();
                if path.is_empty() {
                    return;
                }
                match fs::read(&path).await {
                    Ok(bytes) => {
                        let name = std::path::Path::new(&path)
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or(path.clone());
                        self.ingestion.select_file(name, bytes);
                        self.ingestion.start_upload().await;
                        self.mapping_field_index = 0;
                    }
                    Err(e) => {
                        self.notifier.error(format!("Could not read {}: {}", path, e));
                    }
                }
            }
            _ => {}
        }
    }

    async fn handle_mapping_action(&mut self, action: AppAction) {
        match action {
            AppAction::Escape => {
                self.ingestion.close_mapping();
            }
            AppAction::Up | AppAction::PrevField => {
                self.mapping_field_index =
                    (self.mapping_field_index + MAPPING_FIELDS.len() - 1) % MAPPING_FIELDS.len();
            }
            AppAction::Down | AppAction::NextField => {
                self.mapping_field_index = (self.mapping_field_index + 1) % MAPPING_FIELDS.len();
            }
            AppAction::Left => self.cycle_mapping_choice(-1),
            AppAction::Right => self.cycle_mapping_choice(1),
            AppAction::Submit => {
                self.ingestion.commit().await;
            }
            _ => {}
        }
    }

    /// Cycle the focused mapping field through the file's columns (with an
    /// empty choice for "unset").
    fn cycle_mapping_choice(&mut self, direction: isize) {
        let (field, _) = MAPPING_FIELDS[self.mapping_field_index];
        let Some(mapping) = self.ingestion.mapping.mapping() else {
            return;
        };
        let mut choices: Vec<String> = vec![String::new()];
        choices.extend(mapping.headers.iter().cloned());

        let current = match field {
            MappingField::Latitude => &mapping.latitude_col,
            MappingField::Longitude => &mapping.longitude_col,
            MappingField::Id => &mapping.id_col,
            MappingField::Weight => &mapping.weight_col,
        };
        let position = choices.iter().position(|c| c == current).unwrap_or(0);
        let next = (position as isize + direction).rem_euclid(choices.len() as isize) as usize;
        let value = choices[next].clone();
        self.ingestion.update_field(field, value);
    }

    async fn handle_management_action(&mut self, action: AppAction) {
        match action {
            AppAction::Quit => self.should_quit = true,
            AppAction::Up => self.move_selection(-1),
            AppAction::Down => self.move_selection(1),
            AppAction::NextField | AppAction::PrevField => {
                self.panel = match self.panel {
                    Panel::Datasets => Panel::Experiments,
                    Panel::Experiments => Panel::Datasets,
                };
            }
            AppAction::Submit => match self.panel {
                Panel::Datasets => self.analyze_selected().await,
                Panel::Experiments => self.open_selected_experiment().await,
            },
            AppAction::Input(key) => match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('u') => self.file_prompt = Some(FilePrompt::default()),
                KeyCode::Char('c') => self.ingestion.clear_cache().await,
                KeyCode::Char('r') => {
                    self.ingestion.refresh().await;
                    self.refresh_experiments().await;
                }
                KeyCode::Char('a') => self.analyze_selected().await,
                _ => {}
            },
            _ => {}
        }
    }

    async fn handle_results_action(&mut self, action: AppAction) {
        match action {
            AppAction::Escape => {
                // the transcript is discarded with the view
                self.results.deactivate();
                self.screen = Screen::DataManagement;
            }
            AppAction::Up => self.chat_scroll = self.chat_scroll.saturating_sub(1),
            AppAction::Down => self.chat_scroll = self.chat_scroll.saturating_add(1),
            AppAction::Submit => self.send_chat().await,
            AppAction::Retry => self.retry_last_failed().await,
            AppAction::DeleteKey => {
                self.chat_input
                    .input(tui_textarea::Input {
                        key: tui_textarea::Key::Backspace,
                        ..Default::default()
                    });
            }
            AppAction::Input(key) => {
                self.chat_input.input(key);
            }
            _ => {}
        }
    }

    fn move_selection(&mut self, direction: isize) {
        let (index, len) = match self.panel {
            Panel::Datasets => (&mut self.dataset_index, self.ingestion.datasets.len()),
            Panel::Experiments => (&mut self.experiment_index, self.experiments.len()),
        };
        if len == 0 {
            return;
        }
        *index = (*index as isize + direction).rem_euclid(len as isize) as usize;
    }

    async fn analyze_selected(&mut self) {
        if let Some(dataset) = self.selected_dataset().map(str::to_string) {
            self.ingestion.analyze(dataset).await;
        }
    }

    async fn open_selected_experiment(&mut self) {
        if let Some(experiment_id) = self.selected_experiment().map(str::to_string) {
            self.chat_input = Self::fresh_chat_input();
            self.chat_scroll = 0;
            self.screen = Screen::Results;
            self.results.activate(experiment_id).await;
        }
    }

    async fn send_chat(&mut self) {
        let text = self.chat_input.lines().join("\n");
        match self.results.send_message(&text).await {
            SendOutcome::Completed => {
                self.chat_input = Self::fresh_chat_input();
            }
            SendOutcome::Busy => {
                self.notifier.info("A reply is still on its way.");
            }
            SendOutcome::Ignored => {}
        }
    }

    /// Re-run the most recent failed exchange, if any.
    async fn retry_last_failed(&mut self) {
        let Some(id) = self
            .results
            .messages
            .iter()
            .rev()
            .find(|m| m.retry.is_some())
            .map(|m| m.id)
        else {
            return;
        };
        self.results.retry(id).await;
    }

    /// True while any backend exchange initiated from this screen is pending.
    pub fn busy(&self) -> bool {
        self.ingestion.loading
            || matches!(self.ingestion.mapping, MappingPhase::PrecheckPending)
            || matches!(self.ingestion.mapping, MappingPhase::ProcessingPending(_))
            || self.results.chat_busy
    }
}
