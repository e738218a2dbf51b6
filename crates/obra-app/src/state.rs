// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{EstimateId, TabKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    CompanyPicker,
    Workspace,
}

/// The three mutually exclusive estimate view states. Listing is both the
/// initial and the terminal state; forms only close back into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimatesMode {
    Listing,
    Creating,
    Editing(EstimateId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub screen: Screen,
    pub active_tab: TabKind,
    pub estimates_mode: EstimatesMode,
    pub pending_delete: Option<EstimateId>,
    pub login_email: String,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Login,
            active_tab: TabKind::Overview,
            estimates_mode: EstimatesMode::Listing,
            pending_delete: None,
            login_email: String::new(),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SignedIn,
    SignedOut,
    CompanyChosen,
    CompanyUnavailable,
    NextTab,
    PrevTab,
    SelectTab(TabKind),
    OpenCreate,
    OpenEdit(EstimateId),
    CloseEstimateForm,
    RequestDelete(EstimateId),
    CancelDelete,
    ConfirmDelete,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ScreenChanged(Screen),
    TabChanged(TabKind),
    EstimatesModeChanged(EstimatesMode),
    DeletePromptOpened(EstimateId),
    DeletePromptClosed,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::SignedIn => {
                self.screen = Screen::CompanyPicker;
                vec![AppEvent::ScreenChanged(self.screen)]
            }
            AppCommand::SignedOut => {
                self.screen = Screen::Login;
                self.estimates_mode = EstimatesMode::Listing;
                self.pending_delete = None;
                vec![
                    AppEvent::ScreenChanged(self.screen),
                    self.set_status("signed out"),
                ]
            }
            AppCommand::CompanyChosen => {
                self.screen = Screen::Workspace;
                self.estimates_mode = EstimatesMode::Listing;
                vec![AppEvent::ScreenChanged(self.screen)]
            }
            AppCommand::CompanyUnavailable => {
                self.screen = Screen::CompanyPicker;
                self.estimates_mode = EstimatesMode::Listing;
                self.pending_delete = None;
                vec![
                    AppEvent::ScreenChanged(self.screen),
                    self.set_status("company unavailable -- choose another company"),
                ]
            }
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(tab) => {
                self.active_tab = tab;
                vec![AppEvent::TabChanged(self.active_tab)]
            }
            AppCommand::OpenCreate => {
                self.estimates_mode = EstimatesMode::Creating;
                vec![AppEvent::EstimatesModeChanged(self.estimates_mode.clone())]
            }
            AppCommand::OpenEdit(estimate_id) => {
                self.estimates_mode = EstimatesMode::Editing(estimate_id);
                vec![AppEvent::EstimatesModeChanged(self.estimates_mode.clone())]
            }
            AppCommand::CloseEstimateForm => {
                self.estimates_mode = EstimatesMode::Listing;
                vec![AppEvent::EstimatesModeChanged(self.estimates_mode.clone())]
            }
            AppCommand::RequestDelete(estimate_id) => {
                self.pending_delete = Some(estimate_id.clone());
                vec![AppEvent::DeletePromptOpened(estimate_id)]
            }
            AppCommand::CancelDelete | AppCommand::ConfirmDelete => {
                self.pending_delete = None;
                vec![AppEvent::DeletePromptClosed]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
