use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use plugwatch_core::controller::Controller;
use plugwatch_core::io::notice::{Notice, NoticeReceiver};
use plugwatch_core::runtime::RuntimeStatus;
use plugwatch_core::types::{Contact, MessageTemplates, NotificationKind};

use crate::event::AppEvent;
use crate::widgets;

/// Notices kept for the log pane.
const NOTICE_HISTORY: usize = 200;

/// Single-line text input with a byte-offset cursor on char boundaries.
#[derive(Debug, Default, Clone)]
pub struct LineInput {
    pub text: String,
    pub cursor: usize,
}

impl LineInput {
    pub fn with_text(text: &str) -> Self {
        Self { text: text.to_owned(), cursor: text.len() }
    }

    fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    fn delete_char_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = self.prev_boundary();
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    fn move_right(&mut self) {
        if self.cursor >= self.text.len() {
            return;
        }
        self.cursor = self.text[self.cursor..]
            .char_indices()
            .nth(1)
            .map(|(i, _)| self.cursor + i)
            .unwrap_or(self.text.len());
    }

    fn prev_boundary(&self) -> usize {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Apply an editing key; anything else is ignored.
    fn edit(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(c) => self.insert_char(c),
            KeyCode::Backspace => self.delete_char_before_cursor(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.text.len(),
            _ => {}
        }
    }
}

/// Which field of the contact form has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Name,
    Phone,
}

/// Modal editor shown over the main screen.
#[derive(Debug, Clone)]
pub enum Form {
    Contact { name: LineInput, phone: LineInput, focus: ContactField },
    Template { kind: NotificationKind, input: LineInput },
}

/// Something the key handler wants the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddContact { name: String, phone: String },
    DeleteContact(usize),
    SetTemplate(NotificationKind, String),
    TestSend,
    ShowQueue,
}

/// TUI application state.
pub struct App {
    pub contacts: Vec<Contact>,
    pub templates: MessageTemplates,
    pub selected: usize,
    pub form: Option<Form>,
    pub notices: Vec<Notice>,
    pub status: RuntimeStatus,
    pub delay_secs: u64,
    pub gateway: String,
    pub should_exit: bool,
}

impl App {
    pub fn new(templates: MessageTemplates, delay_secs: u64, gateway: &str) -> Self {
        Self {
            contacts: Vec::new(),
            templates,
            selected: 0,
            form: None,
            notices: Vec::new(),
            status: RuntimeStatus::default(),
            delay_secs,
            gateway: gateway.to_owned(),
            should_exit: false,
        }
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        if self.notices.len() > NOTICE_HISTORY {
            let excess = self.notices.len() - NOTICE_HISTORY;
            self.notices.drain(..excess);
        }
    }

    fn set_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
        self.selected = self.selected.min(self.contacts.len().saturating_sub(1));
    }

    /// Map a key press to a state change and, possibly, a controller action.
    pub fn on_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return None;
        }
        match self.form.take() {
            Some(form) => self.on_form_key(form, key.code),
            None => self.on_browse_key(key.code),
        }
    }

    fn on_browse_key(&mut self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::Char('a') => {
                self.form = Some(Form::Contact {
                    name: LineInput::default(),
                    phone: LineInput::default(),
                    focus: ContactField::Name,
                });
                None
            }
            KeyCode::Char('d') if !self.contacts.is_empty() => Some(Action::DeleteContact(self.selected)),
            KeyCode::Char('e') => {
                self.open_template(NotificationKind::Disconnect);
                None
            }
            KeyCode::Char('r') => {
                self.open_template(NotificationKind::Connect);
                None
            }
            KeyCode::Char('t') => Some(Action::TestSend),
            KeyCode::Char('q') => Some(Action::ShowQueue),
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.selected + 1 < self.contacts.len() {
                    self.selected += 1;
                }
                None
            }
            _ => None,
        }
    }

    fn open_template(&mut self, kind: NotificationKind) {
        self.form = Some(Form::Template {
            kind,
            input: LineInput::with_text(self.templates.get(kind)),
        });
    }

    fn on_form_key(&mut self, form: Form, code: KeyCode) -> Option<Action> {
        if code == KeyCode::Esc {
            return None;
        }
        match form {
            Form::Contact { mut name, mut phone, focus } => {
                match (code, focus) {
                    (KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down, _) => {
                        let focus = match focus {
                            ContactField::Name => ContactField::Phone,
                            ContactField::Phone => ContactField::Name,
                        };
                        self.form = Some(Form::Contact { name, phone, focus });
                    }
                    (KeyCode::Enter, ContactField::Name) => {
                        self.form = Some(Form::Contact { name, phone, focus: ContactField::Phone });
                    }
                    (KeyCode::Enter, ContactField::Phone) => {
                        return Some(Action::AddContact { name: name.text, phone: phone.text });
                    }
                    (code, ContactField::Name) => {
                        name.edit(code);
                        self.form = Some(Form::Contact { name, phone, focus });
                    }
                    (code, ContactField::Phone) => {
                        phone.edit(code);
                        self.form = Some(Form::Contact { name, phone, focus });
                    }
                }
                None
            }
            Form::Template { kind, mut input } => {
                if code == KeyCode::Enter {
                    return Some(Action::SetTemplate(kind, input.text));
                }
                input.edit(code);
                self.form = Some(Form::Template { kind, input });
                None
            }
        }
    }

    /// Put a rejected contact back in the form, focused on the first blank field.
    fn reopen_contact_form(&mut self, name: String, phone: String) {
        let focus = if name.trim().is_empty() { ContactField::Name } else { ContactField::Phone };
        self.form = Some(Form::Contact {
            name: LineInput::with_text(&name),
            phone: LineInput::with_text(&phone),
            focus,
        });
    }

    fn refresh(&mut self, controller: &Controller) {
        self.set_contacts(controller.contacts());
        self.templates = controller.templates();
    }
}

/// Run the TUI event loop. Blocks until the user exits (Ctrl+C).
pub async fn run_app(
    controller: Arc<Controller>,
    mut notice_rx: NoticeReceiver,
    mut status_rx: watch::Receiver<RuntimeStatus>,
    token: CancellationToken,
    startup_notices: Vec<String>,
) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut event_rx = crate::event::spawn(stop.clone());

    let mut app = App::new(
        controller.templates(),
        controller.cfg().send_delay().as_secs(),
        controller.gateway_name(),
    );
    for content in startup_notices {
        app.push_notice(Notice::warn(content));
    }
    app.refresh(&controller);

    terminal.draw(|f| widgets::draw(f, &app))?;

    loop {
        if app.should_exit {
            break;
        }
        tokio::select! {
            _ = token.cancelled() => break,
            evt = event_rx.recv() => {
                let Some(evt) = evt else { break };
                match evt {
                    AppEvent::Key(key) => {
                        if let Some(action) = app.on_key(key) {
                            apply(&controller, &mut app, action).await;
                        }
                    }
                }
            }
            notice = notice_rx.recv() => {
                if let Some(notice) = notice {
                    app.push_notice(notice);
                }
            }
            Ok(()) = status_rx.changed() => {
                app.status = *status_rx.borrow_and_update();
                // The runtime loads stored contacts after the UI is up.
                app.refresh(&controller);
            }
        }
        terminal.draw(|f| widgets::draw(f, &app))?;
    }

    stop.store(true, Ordering::Relaxed);
    terminal::disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

async fn apply(controller: &Controller, app: &mut App, action: Action) {
    match action {
        Action::AddContact { name, phone } => {
            if !controller.add_contact(&name, &phone).await {
                app.reopen_contact_form(name, phone);
            }
        }
        Action::DeleteContact(index) => {
            controller.delete_contact(index).await;
        }
        Action::SetTemplate(kind, text) => {
            controller.set_template(kind, &text).await;
        }
        Action::TestSend => {
            let _ = controller.test_send();
        }
        Action::ShowQueue => {
            app.push_notice(Notice::info(controller.pending_report().trim_end()));
        }
    }
    app.refresh(controller);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(
            MessageTemplates { disconnect: "Corte ".into(), connect: "Vuelta ".into() },
            60,
            "mock",
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            assert_eq!(app.on_key(key(KeyCode::Char(c))), None);
        }
    }

    #[test]
    fn contact_form_collects_both_fields() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('a')));
        type_text(&mut app, "Ana");
        app.on_key(key(KeyCode::Enter));
        type_text(&mut app, "+5491100");
        let action = app.on_key(key(KeyCode::Enter));
        assert_eq!(
            action,
            Some(Action::AddContact { name: "Ana".into(), phone: "+5491100".into() })
        );
        assert!(app.form.is_none());
    }

    #[test]
    fn rejected_contact_keeps_typed_fields() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('a')));
        type_text(&mut app, "Ana");
        app.on_key(key(KeyCode::Enter));
        let Some(Action::AddContact { name, phone }) = app.on_key(key(KeyCode::Enter)) else {
            panic!("expected an add action");
        };
        app.reopen_contact_form(name, phone);

        match &app.form {
            Some(Form::Contact { name, phone, focus }) => {
                assert_eq!(name.text, "Ana");
                assert_eq!(phone.text, "");
                assert_eq!(*focus, ContactField::Phone);
            }
            other => panic!("unexpected form {other:?}"),
        }
        type_text(&mut app, "+54");
        assert_eq!(
            app.on_key(key(KeyCode::Enter)),
            Some(Action::AddContact { name: "Ana".into(), phone: "+54".into() })
        );
    }

    #[test]
    fn letters_in_a_form_are_text_not_commands() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('a')));
        // 't' and 'q' would be commands outside the form.
        type_text(&mut app, "tq");
        match &app.form {
            Some(Form::Contact { name, .. }) => assert_eq!(name.text, "tq"),
            other => panic!("unexpected form {other:?}"),
        }
    }

    #[test]
    fn esc_cancels_form() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('r')));
        assert!(app.form.is_some());
        assert_eq!(app.on_key(key(KeyCode::Esc)), None);
        assert!(app.form.is_none());
    }

    #[test]
    fn template_form_starts_with_current_text() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('e')));
        app.on_key(key(KeyCode::Backspace));
        type_text(&mut app, "!");
        let action = app.on_key(key(KeyCode::Enter));
        assert_eq!(action, Some(Action::SetTemplate(NotificationKind::Disconnect, "Corte!".into())));
    }

    #[test]
    fn delete_needs_a_contact_and_uses_selection() {
        let mut app = app();
        assert_eq!(app.on_key(key(KeyCode::Char('d'))), None);

        app.set_contacts(vec![
            Contact { name: "A".into(), address: "1".into() },
            Contact { name: "B".into(), address: "2".into() },
        ]);
        app.on_key(key(KeyCode::Down));
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.on_key(key(KeyCode::Char('d'))), Some(Action::DeleteContact(1)));

        app.set_contacts(vec![Contact { name: "A".into(), address: "1".into() }]);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn ctrl_c_exits_from_anywhere() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('a')));
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_exit);
    }

    #[test]
    fn line_input_handles_multibyte() {
        let mut input = LineInput::with_text("Energía");
        input.edit(KeyCode::Left);
        input.edit(KeyCode::Backspace);
        assert_eq!(input.text, "Energa");
        assert_eq!(input.cursor, 5);
        input.edit(KeyCode::Home);
        input.edit(KeyCode::Right);
        assert_eq!(input.cursor, 1);
    }

    #[test]
    fn notice_history_is_bounded() {
        let mut app = app();
        for i in 0..(NOTICE_HISTORY + 5) {
            app.push_notice(Notice::info(i.to_string()));
        }
        assert_eq!(app.notices.len(), NOTICE_HISTORY);
        assert_eq!(app.notices[0].content, "5");
    }
}
