// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use obra_app::{
    AppCommand, AppState, BadgeVariant, Company, CompanyId, Estimate, EstimateForm, EstimateId,
    EstimatePayload, EstimatesMode, LineItemEdit, Screen, TabGroup, TabKind, User, format_dollars,
    relative_age,
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::time::Duration;
use time::OffsetDateTime;

const SIDEBAR_WIDTH: u16 = 24;
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The seam between rendering and persistence. The estimates methods carry
/// the owning company so the implementation can keep its listing cache
/// keyed by company and invalidate exactly the mutated key.
pub trait AppRuntime {
    fn current_user(&mut self) -> Result<Option<User>>;
    fn sign_in(&mut self, email: &str, password: &str) -> Result<User>;
    fn sign_out(&mut self) -> Result<()>;
    fn update_email(&mut self, email: &str) -> Result<()>;
    fn update_password(&mut self, new_password: &str) -> Result<()>;

    fn list_companies(&mut self) -> Result<Vec<Company>>;
    fn load_company(&mut self, company_id: &CompanyId) -> Result<Option<Company>>;

    fn estimates_for(&mut self, company_id: &CompanyId) -> Result<Vec<Estimate>>;
    fn invalidate_estimates(&mut self, company_id: &CompanyId);
    fn fetch_estimate(&mut self, estimate_id: &EstimateId) -> Result<Option<Estimate>>;
    fn create_estimate(
        &mut self,
        company_id: &CompanyId,
        payload: &EstimatePayload,
    ) -> Result<EstimateId>;
    fn update_estimate(
        &mut self,
        company_id: &CompanyId,
        estimate_id: &EstimateId,
        payload: &EstimatePayload,
    ) -> Result<()>;
    fn delete_estimate(&mut self, company_id: &CompanyId, estimate_id: &EstimateId) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginField {
    Email,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoginForm {
    email: String,
    password: String,
    focus: LoginField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountField {
    Email,
    NewPassword,
    SignOut,
}

impl AccountField {
    const fn next(self) -> Self {
        match self {
            Self::Email => Self::NewPassword,
            Self::NewPassword => Self::SignOut,
            Self::SignOut => Self::Email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AccountForm {
    email: String,
    new_password: String,
    focus: AccountField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemColumn {
    Description,
    Quantity,
    UnitPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorField {
    Name,
    Description,
    Item(usize, ItemColumn),
}

/// Modal editor over an [`EstimateForm`]: arrow keys move the focus, Enter
/// opens a text input for the focused cell, Enter again commits it through
/// the form's tagged edit operations.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EstimateEditor {
    form: EstimateForm,
    focus: EditorField,
    input: Option<String>,
}

impl EstimateEditor {
    fn create() -> Self {
        Self {
            form: EstimateForm::blank(),
            focus: EditorField::Name,
            input: None,
        }
    }

    fn edit(estimate: &Estimate) -> Self {
        Self {
            form: EstimateForm::from_estimate(estimate),
            focus: EditorField::Name,
            input: None,
        }
    }

    fn focus_down(&mut self) {
        self.focus = match self.focus {
            EditorField::Name => EditorField::Description,
            EditorField::Description if self.form.line_items().is_empty() => {
                EditorField::Description
            }
            EditorField::Description => EditorField::Item(0, ItemColumn::Description),
            EditorField::Item(row, column) => {
                let last = self.form.line_items().len().saturating_sub(1);
                EditorField::Item(row.min(last).saturating_add(1).min(last), column)
            }
        };
    }

    fn focus_up(&mut self) {
        self.focus = match self.focus {
            EditorField::Name => EditorField::Name,
            EditorField::Description => EditorField::Name,
            EditorField::Item(0, _) => EditorField::Description,
            EditorField::Item(row, column) => EditorField::Item(row - 1, column),
        };
    }

    fn focus_side(&mut self, delta: isize) {
        if let EditorField::Item(row, column) = self.focus {
            let columns = [
                ItemColumn::Description,
                ItemColumn::Quantity,
                ItemColumn::UnitPrice,
            ];
            let current = columns
                .iter()
                .position(|candidate| *candidate == column)
                .unwrap_or(0) as isize;
            let next = (current + delta).rem_euclid(columns.len() as isize) as usize;
            self.focus = EditorField::Item(row, columns[next]);
        }
    }

    /// The current text of the focused cell, used to seed the input buffer.
    fn focused_text(&self) -> String {
        match self.focus {
            EditorField::Name => self.form.name.clone(),
            EditorField::Description => self.form.description.clone(),
            EditorField::Item(row, column) => {
                let Some(item) = self.form.line_items().get(row) else {
                    return String::new();
                };
                match column {
                    ItemColumn::Description => item.description.clone(),
                    ItemColumn::Quantity => item.quantity.to_string(),
                    ItemColumn::UnitPrice => format_price_input(item.unit_price_cents),
                }
            }
        }
    }

    /// Commits the input buffer into the form. Numeric cells parse first so
    /// a bad value never lands in the draft.
    fn commit_input(&mut self, raw: &str) -> Result<()> {
        match self.focus {
            EditorField::Name => self.form.name = raw.to_owned(),
            EditorField::Description => self.form.description = raw.to_owned(),
            EditorField::Item(row, column) => {
                let Some(item) = self.form.line_items().get(row) else {
                    return Ok(());
                };
                let id = item.id.clone();
                let edit = match column {
                    ItemColumn::Description => LineItemEdit::Description(raw.to_owned()),
                    ItemColumn::Quantity => LineItemEdit::Quantity(parse_quantity(raw)?),
                    ItemColumn::UnitPrice => {
                        LineItemEdit::UnitPriceCents(parse_dollars_to_cents(raw)?)
                    }
                };
                self.form.update_line_item(&id, edit);
            }
        }
        Ok(())
    }

    fn add_item(&mut self) {
        self.form.add_line_item();
        let row = self.form.line_items().len() - 1;
        self.focus = EditorField::Item(row, ItemColumn::Description);
    }

    fn remove_focused_item(&mut self) {
        let EditorField::Item(row, _) = self.focus else {
            return;
        };
        let Some(item) = self.form.line_items().get(row) else {
            return;
        };
        let id = item.id.clone();
        self.form.remove_line_item(&id);
        self.focus = match self.form.line_items().len() {
            0 => EditorField::Description,
            len => EditorField::Item(row.min(len - 1), ItemColumn::Description),
        };
    }
}

struct Ui {
    login: LoginForm,
    account: AccountForm,
    companies: Vec<Company>,
    company_cursor: usize,
    company: Option<Company>,
    estimates: Vec<Estimate>,
    estimate_cursor: usize,
    editor: Option<EstimateEditor>,
    quit: bool,
}

impl Ui {
    fn new(login_email: String) -> Self {
        Self {
            login: LoginForm {
                email: login_email,
                password: String::new(),
                focus: LoginField::Email,
            },
            account: AccountForm {
                email: String::new(),
                new_password: String::new(),
                focus: AccountField::Email,
            },
            companies: Vec::new(),
            company_cursor: 0,
            company: None,
            estimates: Vec::new(),
            estimate_cursor: 0,
            editor: None,
            quit: false,
        }
    }

    fn company_id(&self) -> Option<CompanyId> {
        self.company.as_ref().map(|company| company.id.clone())
    }

    fn selected_estimate(&self) -> Option<&Estimate> {
        self.estimates.get(self.estimate_cursor)
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("initialize terminal")?;

    let result = event_loop(&mut terminal, state, runtime);

    disable_raw_mode().context("disable raw mode")?;
    execute!(terminal.backend_mut(), terminal::LeaveAlternateScreen)
        .context("leave alternate screen")?;
    terminal.show_cursor().context("show cursor")?;
    result
}

fn event_loop<B: Backend, R: AppRuntime>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
) -> Result<()> {
    let mut ui = Ui::new(state.login_email.clone());

    // Resume a session the runtime may already hold.
    if state.screen == Screen::Login
        && let Ok(Some(user)) = runtime.current_user()
    {
        ui.account.email = user.email;
        state.dispatch(AppCommand::SignedIn);
        load_companies(state, runtime, &mut ui);
    }

    while !ui.quit {
        redraw(terminal, state, &ui)?;
        if !event::poll(POLL_INTERVAL).context("poll input")? {
            continue;
        }
        let Event::Key(key) = event::read().context("read input")? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        handle_key(key, terminal, state, runtime, &mut ui)?;
    }
    Ok(())
}

fn redraw<B: Backend>(terminal: &mut Terminal<B>, state: &AppState, ui: &Ui) -> Result<()> {
    terminal
        .draw(|frame| draw(frame, state, ui))
        .context("draw frame")?;
    Ok(())
}

/// Sets a transient loading note and paints one frame before a blocking
/// backend call, so the user sees what is in flight.
fn note_loading<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    ui: &Ui,
    message: &str,
) -> Result<()> {
    state.status_line = Some(message.to_owned());
    redraw(terminal, state, ui)
}

fn report_error(state: &mut AppState, error: &anyhow::Error) {
    state.status_line = Some(format!("{error:#}"));
}

fn handle_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<()> {
    if state.status_line.is_some() {
        state.dispatch(AppCommand::ClearStatus);
    }

    match state.screen {
        Screen::Login => handle_login_key(key, terminal, state, runtime, ui),
        Screen::CompanyPicker => handle_picker_key(key, terminal, state, runtime, ui),
        Screen::Workspace => handle_workspace_key(key, terminal, state, runtime, ui),
    }
}

fn handle_login_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<()> {
    match key.code {
        KeyCode::Esc => ui.quit = true,
        KeyCode::Tab | KeyCode::Down | KeyCode::Up => {
            ui.login.focus = match ui.login.focus {
                LoginField::Email => LoginField::Password,
                LoginField::Password => LoginField::Email,
            };
        }
        KeyCode::Backspace => {
            let buffer = match ui.login.focus {
                LoginField::Email => &mut ui.login.email,
                LoginField::Password => &mut ui.login.password,
            };
            buffer.pop();
        }
        KeyCode::Char(ch) => {
            let buffer = match ui.login.focus {
                LoginField::Email => &mut ui.login.email,
                LoginField::Password => &mut ui.login.password,
            };
            buffer.push(ch);
        }
        KeyCode::Enter => match ui.login.focus {
            LoginField::Email => ui.login.focus = LoginField::Password,
            LoginField::Password => {
                note_loading(terminal, state, ui, "signing in...")?;
                let email = ui.login.email.clone();
                let password = ui.login.password.clone();
                match runtime.sign_in(&email, &password) {
                    Ok(user) => {
                        ui.account.email = user.email;
                        ui.login.password.clear();
                        state.dispatch(AppCommand::SignedIn);
                        load_companies(state, runtime, ui);
                    }
                    Err(error) => report_error(state, &error),
                }
            }
        },
        _ => {}
    }
    Ok(())
}

fn handle_picker_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<()> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => ui.quit = true,
        KeyCode::Char('s') => {
            match runtime.sign_out() {
                Ok(()) => {
                    ui.company = None;
                    state.dispatch(AppCommand::SignedOut);
                }
                Err(error) => report_error(state, &error),
            };
        }
        KeyCode::Char('r') => load_companies(state, runtime, ui),
        KeyCode::Down | KeyCode::Char('j') => {
            if !ui.companies.is_empty() {
                ui.company_cursor = (ui.company_cursor + 1).min(ui.companies.len() - 1);
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            ui.company_cursor = ui.company_cursor.saturating_sub(1);
        }
        KeyCode::Enter => {
            let Some(company) = ui.companies.get(ui.company_cursor) else {
                return Ok(());
            };
            let company_id = company.id.clone();
            note_loading(terminal, state, ui, "opening company...")?;
            match runtime.load_company(&company_id) {
                Ok(Some(company)) => {
                    ui.company = Some(company);
                    state.dispatch(AppCommand::CompanyChosen);
                    reload_estimates(state, runtime, ui);
                }
                Ok(None) => {
                    state.dispatch(AppCommand::CompanyUnavailable);
                    load_companies(state, runtime, ui);
                }
                Err(error) => report_error(state, &error),
            }
        }
        _ => {}
    }
    Ok(())
}

fn handle_workspace_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<()> {
    if state.pending_delete.is_some() {
        return handle_delete_prompt_key(key, terminal, state, runtime, ui);
    }
    if ui.editor.is_some() {
        return handle_editor_key(key, terminal, state, runtime, ui);
    }

    // Tab-specific handlers get first refusal; the account form in
    // particular swallows plain characters for its text fields.
    let consumed = match state.active_tab {
        TabKind::Estimates => handle_listing_key(key, terminal, state, runtime, ui)?,
        TabKind::Account => handle_account_key(key, terminal, state, runtime, ui)?,
        _ => false,
    };
    if consumed {
        return Ok(());
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => ui.quit = true,
        KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => {
            state.dispatch(AppCommand::NextTab);
        }
        KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => {
            state.dispatch(AppCommand::PrevTab);
        }
        _ => {}
    }
    Ok(())
}

fn handle_listing_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<bool> {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            if !ui.estimates.is_empty() {
                ui.estimate_cursor = (ui.estimate_cursor + 1).min(ui.estimates.len() - 1);
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            ui.estimate_cursor = ui.estimate_cursor.saturating_sub(1);
        }
        KeyCode::Char('r') => {
            if let Some(company_id) = ui.company_id() {
                runtime.invalidate_estimates(&company_id);
                note_loading(terminal, state, ui, "loading estimates...")?;
                reload_estimates(state, runtime, ui);
            }
        }
        KeyCode::Char('n') => {
            ui.editor = Some(EstimateEditor::create());
            state.dispatch(AppCommand::OpenCreate);
        }
        KeyCode::Enter | KeyCode::Char('e') => {
            let Some(estimate_id) = ui.selected_estimate().map(|estimate| estimate.id.clone())
            else {
                return Ok(true);
            };
            note_loading(terminal, state, ui, "loading estimate...")?;
            // Always edit from a fresh read, never from the cached list row.
            match runtime.fetch_estimate(&estimate_id) {
                Ok(Some(estimate)) => {
                    ui.editor = Some(EstimateEditor::edit(&estimate));
                    state.dispatch(AppCommand::OpenEdit(estimate_id));
                    state.status_line = None;
                }
                Ok(None) => {
                    if let Some(company_id) = ui.company_id() {
                        runtime.invalidate_estimates(&company_id);
                    }
                    reload_estimates(state, runtime, ui);
                    state.status_line =
                        Some("estimate no longer exists -- refreshed the list".to_owned());
                }
                Err(error) => report_error(state, &error),
            }
        }
        KeyCode::Char('d') => {
            if let Some(estimate_id) = ui.selected_estimate().map(|estimate| estimate.id.clone()) {
                state.dispatch(AppCommand::RequestDelete(estimate_id));
            }
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn handle_delete_prompt_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<()> {
    match key.code {
        KeyCode::Char('y') => {
            let Some(estimate_id) = state.pending_delete.clone() else {
                return Ok(());
            };
            let Some(company_id) = ui.company_id() else {
                return Ok(());
            };
            note_loading(terminal, state, ui, "deleting estimate...")?;
            match runtime.delete_estimate(&company_id, &estimate_id) {
                Ok(()) => {
                    state.dispatch(AppCommand::ConfirmDelete);
                    reload_estimates(state, runtime, ui);
                    state.status_line = Some("estimate deleted".to_owned());
                }
                // The prompt stays open so the user can retry or cancel.
                Err(error) => report_error(state, &error),
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            state.dispatch(AppCommand::CancelDelete);
        }
        _ => {}
    }
    Ok(())
}

fn handle_editor_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<()> {
    let input_active = ui
        .editor
        .as_ref()
        .is_some_and(|editor| editor.input.is_some());

    if input_active {
        let Some(editor) = ui.editor.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Esc => editor.input = None,
            KeyCode::Backspace => {
                if let Some(input) = editor.input.as_mut() {
                    input.pop();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(input) = editor.input.as_mut() {
                    input.push(ch);
                }
            }
            KeyCode::Enter => {
                let raw = editor.input.clone().unwrap_or_default();
                match editor.commit_input(&raw) {
                    Ok(()) => editor.input = None,
                    Err(error) => report_error(state, &error),
                }
            }
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Esc => {
            ui.editor = None;
            state.dispatch(AppCommand::CloseEstimateForm);
        }
        KeyCode::Char('s') => submit_editor(terminal, state, runtime, ui)?,
        other => {
            let Some(editor) = ui.editor.as_mut() else {
                return Ok(());
            };
            match other {
                KeyCode::Down | KeyCode::Char('j') => editor.focus_down(),
                KeyCode::Up | KeyCode::Char('k') => editor.focus_up(),
                KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => editor.focus_side(1),
                KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => editor.focus_side(-1),
                KeyCode::Enter | KeyCode::Char('i') => {
                    editor.input = Some(editor.focused_text());
                }
                KeyCode::Char('a') => editor.add_item(),
                KeyCode::Char('d') => editor.remove_focused_item(),
                _ => {}
            }
        }
    }
    Ok(())
}

fn submit_editor<B: Backend, R: AppRuntime>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<()> {
    let Some(editor) = ui.editor.as_ref() else {
        return Ok(());
    };
    let Some(company_id) = ui.company_id() else {
        return Ok(());
    };

    // Validation failures never reach the network; the draft stays open.
    let payload = match editor.form.submit() {
        Ok(payload) => payload,
        Err(error) => {
            report_error(state, &error);
            return Ok(());
        }
    };

    let outcome = match state.estimates_mode.clone() {
        EstimatesMode::Creating => {
            note_loading(terminal, state, ui, "saving estimate...")?;
            runtime
                .create_estimate(&company_id, &payload)
                .map(|_| "estimate created")
        }
        EstimatesMode::Editing(estimate_id) => {
            note_loading(terminal, state, ui, "saving estimate...")?;
            runtime
                .update_estimate(&company_id, &estimate_id, &payload)
                .map(|()| "estimate updated")
        }
        EstimatesMode::Listing => return Ok(()),
    };

    match outcome {
        Ok(message) => {
            ui.editor = None;
            state.dispatch(AppCommand::CloseEstimateForm);
            reload_estimates(state, runtime, ui);
            state.status_line = Some(message.to_owned());
        }
        // The draft stays open with its unsaved changes for retry.
        Err(error) => report_error(state, &error),
    }
    Ok(())
}

fn handle_account_key<B: Backend, R: AppRuntime>(
    key: KeyEvent,
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runtime: &mut R,
    ui: &mut Ui,
) -> Result<bool> {
    match key.code {
        KeyCode::Tab | KeyCode::Down => ui.account.focus = ui.account.focus.next(),
        KeyCode::Backspace => match ui.account.focus {
            AccountField::Email => {
                ui.account.email.pop();
            }
            AccountField::NewPassword => {
                ui.account.new_password.pop();
            }
            AccountField::SignOut => return Ok(false),
        },
        KeyCode::Char(ch) => match ui.account.focus {
            AccountField::Email => ui.account.email.push(ch),
            AccountField::NewPassword => ui.account.new_password.push(ch),
            AccountField::SignOut => return Ok(false),
        },
        KeyCode::Enter => match ui.account.focus {
            AccountField::Email => {
                note_loading(terminal, state, ui, "updating profile...")?;
                let email = ui.account.email.clone();
                match runtime.update_email(&email) {
                    Ok(()) => state.status_line = Some("profile updated".to_owned()),
                    Err(error) => report_error(state, &error),
                }
            }
            AccountField::NewPassword => {
                note_loading(terminal, state, ui, "updating password...")?;
                let new_password = ui.account.new_password.clone();
                match runtime.update_password(&new_password) {
                    Ok(()) => {
                        ui.account.new_password.clear();
                        state.status_line = Some("password updated".to_owned());
                    }
                    Err(error) => report_error(state, &error),
                }
            }
            AccountField::SignOut => match runtime.sign_out() {
                Ok(()) => {
                    ui.company = None;
                    ui.estimates.clear();
                    state.dispatch(AppCommand::SignedOut);
                }
                Err(error) => report_error(state, &error),
            },
        },
        _ => return Ok(false),
    }
    Ok(true)
}

fn load_companies<R: AppRuntime>(state: &mut AppState, runtime: &mut R, ui: &mut Ui) {
    match runtime.list_companies() {
        Ok(companies) => {
            ui.company_cursor = ui.company_cursor.min(companies.len().saturating_sub(1));
            ui.companies = companies;
            state.status_line = None;
        }
        Err(error) => report_error(state, &error),
    }
}

fn reload_estimates<R: AppRuntime>(state: &mut AppState, runtime: &mut R, ui: &mut Ui) {
    let Some(company_id) = ui.company_id() else {
        return;
    };
    match runtime.estimates_for(&company_id) {
        Ok(estimates) => {
            ui.estimate_cursor = ui.estimate_cursor.min(estimates.len().saturating_sub(1));
            ui.estimates = estimates;
            state.status_line = None;
        }
        Err(error) => report_error(state, &error),
    }
}

fn draw(frame: &mut ratatui::Frame, state: &AppState, ui: &Ui) {
    let area = frame.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    match state.screen {
        Screen::Login => draw_login(frame, rows[0], ui),
        Screen::CompanyPicker => draw_company_picker(frame, rows[0], ui),
        Screen::Workspace => draw_workspace(frame, rows[0], state, ui),
    }

    draw_status_line(frame, rows[1], state);
}

fn draw_status_line(frame: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let text = state.status_line.clone().unwrap_or_default();
    let style = if state.status_line.is_some() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn draw_login(frame: &mut ratatui::Frame, area: Rect, ui: &Ui) {
    let panel = centered_rect(area, 48, 8);
    let focused = Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan);
    let idle = Style::default();

    let lines = vec![
        Line::from(Span::styled(
            format!("email     {}", ui.login.email),
            if ui.login.focus == LoginField::Email {
                focused
            } else {
                idle
            },
        )),
        Line::from(Span::styled(
            format!("password  {}", "\u{2022}".repeat(ui.login.password.len())),
            if ui.login.focus == LoginField::Password {
                focused
            } else {
                idle
            },
        )),
        Line::from(""),
        Line::from(Span::styled(
            "tab switch field · enter sign in · esc quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    frame.render_widget(Clear, panel);
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("obra sign in")),
        panel,
    );
}

fn draw_company_picker(frame: &mut ratatui::Frame, area: Rect, ui: &Ui) {
    let panel = centered_rect(area, 56, (ui.companies.len() as u16).saturating_add(5).max(7));
    let mut lines: Vec<Line> = Vec::new();
    if ui.companies.is_empty() {
        lines.push(Line::from("no companies yet -- press r to refresh"));
    }
    for (index, company) in ui.companies.iter().enumerate() {
        let style = if index == ui.company_cursor {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(company.name.clone(), style)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "enter open · r refresh · s sign out · q quit",
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Clear, panel);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("choose a company"),
        ),
        panel,
    );
}

fn draw_workspace(frame: &mut ratatui::Frame, area: Rect, state: &AppState, ui: &Ui) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(area);

    draw_sidebar(frame, columns[0], state, ui);

    match state.active_tab {
        TabKind::Estimates => draw_estimates(frame, columns[1], state, ui),
        TabKind::Account => draw_account(frame, columns[1], ui),
        tab => draw_placeholder(frame, columns[1], tab),
    }

    if state.pending_delete.is_some() {
        draw_delete_prompt(frame, area);
    }
}

fn draw_sidebar(frame: &mut ratatui::Frame, area: Rect, state: &AppState, ui: &Ui) {
    let company_name = ui
        .company
        .as_ref()
        .map_or("obra", |company| company.name.as_str());

    let mut lines: Vec<Line> = Vec::new();
    let mut group: Option<TabGroup> = None;
    for tab in TabKind::ALL {
        if group != Some(tab.group()) {
            group = Some(tab.group());
            if !lines.is_empty() {
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(
                tab.group().label().to_owned(),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        let style = if tab == state.active_tab {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("  {}", tab.label()), style)));
    }

    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(company_name.to_owned()),
        ),
        area,
    );
}

fn draw_placeholder(frame: &mut ratatui::Frame, area: Rect, tab: TabKind) {
    frame.render_widget(
        Paragraph::new(format!("content for {} lands here", tab.label())).block(
            Block::default()
                .borders(Borders::ALL)
                .title(tab.label().to_owned()),
        ),
        area,
    );
}

fn draw_estimates(frame: &mut ratatui::Frame, area: Rect, state: &AppState, ui: &Ui) {
    if let Some(editor) = &ui.editor {
        draw_editor(frame, area, state, editor);
        return;
    }

    let now = OffsetDateTime::now_utc();
    let header = Row::new(["name", "status", "total", "created"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = ui
        .estimates
        .iter()
        .enumerate()
        .map(|(index, estimate)| {
            let badge = Cell::from(estimate.status.as_str())
                .style(Style::default().fg(badge_color(estimate.status.badge())));
            let row = Row::new([
                Cell::from(estimate.name.clone()),
                badge,
                Cell::from(format_dollars(estimate.total_amount_cents)),
                Cell::from(relative_age(estimate.created_at, now)),
            ]);
            if index == ui.estimate_cursor {
                row.style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("estimates · n new · e edit · d delete · r refresh"),
    );
    frame.render_widget(table, area);
}

fn draw_editor(frame: &mut ratatui::Frame, area: Rect, state: &AppState, editor: &EstimateEditor) {
    let title = match state.estimates_mode {
        EstimatesMode::Editing(_) => "edit estimate",
        _ => "new estimate",
    };
    let focused = Style::default().add_modifier(Modifier::REVERSED);
    let editing = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let cell_text = |field: EditorField, text: String| {
        if editor.focus == field {
            match &editor.input {
                Some(input) => Span::styled(format!("{input}\u{2590}"), editing),
                None => Span::styled(text, focused),
            }
        } else {
            Span::raw(text)
        }
    };

    let mut lines = vec![
        Line::from(vec![
            Span::raw("name         "),
            cell_text(EditorField::Name, editor.form.name.clone()),
        ]),
        Line::from(vec![
            Span::raw("description  "),
            cell_text(EditorField::Description, editor.form.description.clone()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{:<30} {:>6} {:>12} {:>12}",
                "line item", "qty", "unit price", "total"
            ),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];

    for (row, item) in editor.form.line_items().iter().enumerate() {
        lines.push(Line::from(vec![
            cell_text(
                EditorField::Item(row, ItemColumn::Description),
                format!("{:<30}", item.description),
            ),
            Span::raw(" "),
            cell_text(
                EditorField::Item(row, ItemColumn::Quantity),
                format!("{:>6}", item.quantity),
            ),
            Span::raw(" "),
            cell_text(
                EditorField::Item(row, ItemColumn::UnitPrice),
                format!("{:>12}", format_dollars(item.unit_price_cents)),
            ),
            Span::raw(format!(" {:>12}", format_dollars(item.total_cents))),
        ]));
    }

    let preview: i64 = editor
        .form
        .line_items()
        .iter()
        .map(|item| item.total_cents)
        .sum();
    lines.push(Line::from(""));
    lines.push(Line::from(format!("total  {}", format_dollars(preview))));
    lines.push(Line::from(Span::styled(
        "enter edit cell · a add item · d remove item · s save · esc cancel",
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}

fn draw_account(frame: &mut ratatui::Frame, area: Rect, ui: &Ui) {
    let focused = Style::default().add_modifier(Modifier::REVERSED);
    let idle = Style::default();
    let style_for = |field: AccountField| {
        if ui.account.focus == field {
            focused
        } else {
            idle
        }
    };

    let lines = vec![
        Line::from(Span::styled(
            format!("email         {}", ui.account.email),
            style_for(AccountField::Email),
        )),
        Line::from(Span::styled(
            format!(
                "new password  {}",
                "\u{2022}".repeat(ui.account.new_password.len())
            ),
            style_for(AccountField::NewPassword),
        )),
        Line::from(Span::styled(
            "sign out".to_owned(),
            style_for(AccountField::SignOut),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "tab next field · enter apply",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("account")),
        area,
    );
}

fn draw_delete_prompt(frame: &mut ratatui::Frame, area: Rect) {
    let panel = centered_rect(area, 52, 5);
    frame.render_widget(Clear, panel);
    frame.render_widget(
        Paragraph::new(vec![
            Line::from("This permanently deletes the estimate."),
            Line::from("This action cannot be undone."),
            Line::from(Span::styled(
                "y delete · n cancel",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("are you sure?")
                .border_style(Style::default().fg(Color::Red)),
        ),
        panel,
    );
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

const fn badge_color(variant: BadgeVariant) -> Color {
    match variant {
        BadgeVariant::Secondary => Color::DarkGray,
        BadgeVariant::Default => Color::Blue,
        BadgeVariant::Success => Color::Green,
        BadgeVariant::Destructive => Color::Red,
    }
}

fn parse_quantity(raw: &str) -> Result<i64> {
    let quantity: i64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("quantity must be a whole number, got {raw:?}"))?;
    if quantity < 1 {
        bail!("quantity must be at least 1");
    }
    Ok(quantity)
}

fn parse_dollars_to_cents(raw: &str) -> Result<i64> {
    let trimmed = raw.trim().trim_start_matches('$').trim();
    if trimmed.is_empty() {
        bail!("enter a price like 10.50");
    }
    if trimmed.starts_with('-') {
        bail!("price cannot be negative");
    }

    let (dollars_raw, cents_raw) = match trimmed.split_once('.') {
        Some((dollars, cents)) => (dollars, cents),
        None => (trimmed, ""),
    };
    if cents_raw.len() > 2 {
        bail!("prices use at most two decimal places");
    }

    let dollars: i64 = if dollars_raw.is_empty() {
        0
    } else {
        dollars_raw
            .parse()
            .map_err(|_| anyhow!("invalid price {raw:?}"))?
    };
    let cents: i64 = if cents_raw.is_empty() {
        0
    } else {
        format!("{cents_raw:0<2}")
            .parse()
            .map_err(|_| anyhow!("invalid price {raw:?}"))?
    };
    Ok(dollars * 100 + cents)
}

fn format_price_input(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::{
        EditorField, EstimateEditor, ItemColumn, badge_color, format_price_input,
        parse_dollars_to_cents, parse_quantity,
    };
    use obra_app::{BadgeVariant, LineItemEdit};
    use ratatui::style::Color;

    #[test]
    fn dollars_parse_with_and_without_decimals() {
        assert_eq!(parse_dollars_to_cents("10.50").expect("valid"), 1050);
        assert_eq!(parse_dollars_to_cents("$10.5").expect("valid"), 1050);
        assert_eq!(parse_dollars_to_cents("10").expect("valid"), 1000);
        assert_eq!(parse_dollars_to_cents(".25").expect("valid"), 25);
        assert_eq!(parse_dollars_to_cents("0.05").expect("valid"), 5);
        assert!(parse_dollars_to_cents("-5").is_err());
        assert!(parse_dollars_to_cents("-0.50").is_err());
        assert!(parse_dollars_to_cents("10.505").is_err());
        assert!(parse_dollars_to_cents("ten").is_err());
        assert!(parse_dollars_to_cents("").is_err());
    }

    #[test]
    fn quantity_rejects_zero_and_fractions() {
        assert_eq!(parse_quantity(" 3 ").expect("valid"), 3);
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("-2").is_err());
        assert!(parse_quantity("2.5").is_err());
    }

    #[test]
    fn price_input_round_trips_through_the_parser() {
        for cents in [0, 5, 1050, 123456] {
            let rendered = format_price_input(cents);
            assert_eq!(parse_dollars_to_cents(&rendered).expect("valid"), cents);
        }
    }

    #[test]
    fn badge_colors_cover_all_variants() {
        assert_eq!(badge_color(BadgeVariant::Secondary), Color::DarkGray);
        assert_eq!(badge_color(BadgeVariant::Default), Color::Blue);
        assert_eq!(badge_color(BadgeVariant::Success), Color::Green);
        assert_eq!(badge_color(BadgeVariant::Destructive), Color::Red);
    }

    #[test]
    fn editor_focus_walks_rows_and_columns() {
        let mut editor = EstimateEditor::create();
        assert_eq!(editor.focus, EditorField::Name);

        editor.focus_down();
        assert_eq!(editor.focus, EditorField::Description);

        // No items yet, so down stays put.
        editor.focus_down();
        assert_eq!(editor.focus, EditorField::Description);

        editor.add_item();
        assert_eq!(editor.focus, EditorField::Item(0, ItemColumn::Description));

        editor.focus_side(1);
        assert_eq!(editor.focus, EditorField::Item(0, ItemColumn::Quantity));
        editor.focus_side(1);
        assert_eq!(editor.focus, EditorField::Item(0, ItemColumn::UnitPrice));
        editor.focus_side(1);
        assert_eq!(editor.focus, EditorField::Item(0, ItemColumn::Description));

        editor.focus_up();
        assert_eq!(editor.focus, EditorField::Description);
    }

    #[test]
    fn removing_the_last_item_moves_focus_back_to_description() {
        let mut editor = EstimateEditor::create();
        editor.add_item();
        editor.remove_focused_item();
        assert_eq!(editor.focus, EditorField::Description);
        assert!(editor.form.line_items().is_empty());
    }

    #[test]
    fn committing_numeric_cells_recomputes_the_row_total() {
        let mut editor = EstimateEditor::create();
        editor.add_item();
        let id = editor.form.line_items()[0].id.clone();
        editor
            .form
            .update_line_item(&id, LineItemEdit::Description("Posts".to_owned()));

        editor.focus = EditorField::Item(0, ItemColumn::UnitPrice);
        editor.commit_input("10.50").expect("valid price");
        editor.focus = EditorField::Item(0, ItemColumn::Quantity);
        editor.commit_input("3").expect("valid quantity");

        let item = &editor.form.line_items()[0];
        assert_eq!(item.unit_price_cents, 1050);
        assert_eq!(item.total_cents, 3150);

        let error = editor.commit_input("zero").expect_err("bad quantity");
        assert!(error.to_string().contains("whole number"));
        assert_eq!(editor.form.line_items()[0].total_cents, 3150);
    }
}
