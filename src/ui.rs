// 🖥️ Register TUI - a terminal view driving SplitRegister
//
// Keys: Tab/Shift-Tab move between cells, Up/Down between rows, Enter
// records, Esc cancels the current transaction's edits. Ctrl-E expands
// the transaction (ledger style), Ctrl-D deletes the split, Ctrl-X the
// transaction, Ctrl-Q quits. Space toggles the reconcile cell and '+' in
// the number cell fills in the next number.
//
// Questions from the register are answered in a modal popup drawn by
// TuiConfirmation, which shares the terminal with the main loop.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::cell::{Cell as FlagCell, RefCell};
use std::io::{self, Stdout};
use std::rc::Rc;

use ledger_register::entities::Book;
use ledger_register::ports::{BalanceChoice, BalancePrompt, CommitChoice, ConfirmationPort, PresentationEvent};
use ledger_register::register::{RefusalReason, SplitRegister, TraverseOutcome};
use ledger_register::table::{CellName, TraversalDir};

type SharedTerminal = Rc<RefCell<Terminal<CrosstermBackend<Stdout>>>>;

const COLUMN_WIDTHS: [u16; 8] = [10, 6, 28, 26, 1, 10, 10, 10];

// ============================================================================
// CONFIRMATION POPUP
// ============================================================================

pub struct TuiConfirmation {
    terminal: SharedTerminal,
}

impl TuiConfirmation {
    fn new(terminal: SharedTerminal) -> Self {
        TuiConfirmation { terminal }
    }

    /// Draw a question and wait for one of `keys`; Esc gives None
    fn ask(&mut self, title: &str, text: Vec<String>, keys: &[(char, &str)]) -> Option<char> {
        match self.ask_inner(title, text, keys) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Confirmation popup failed: {}", e);
                None
            }
        }
    }

    fn ask_inner(&mut self, title: &str, text: Vec<String>, keys: &[(char, &str)]) -> io::Result<Option<char>> {
        let mut lines: Vec<Line> = text.into_iter().map(Line::from).collect();
        lines.push(Line::from(""));
        for (key, label) in keys {
            lines.push(Line::from(vec![
                Span::styled(format!(" {} ", key), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                Span::raw(label.to_string()),
            ]));
        }
        lines.push(Line::from(vec![
            Span::styled(" Esc ", Style::default().fg(Color::Red)),
            Span::raw("cancel"),
        ]));

        self.terminal.borrow_mut().draw(|f| {
            let area = centered_rect(60, 40, f.size());
            let popup = Paragraph::new(lines.clone()).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(format!(" {} ", title)),
            );
            f.render_widget(Clear, area);
            f.render_widget(popup, area);
        })?;

        loop {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Esc => return Ok(None),
                    KeyCode::Char(c) => {
                        let c = c.to_ascii_lowercase();
                        if keys.iter().any(|(k, _)| *k == c) {
                            return Ok(Some(c));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

impl ConfirmationPort for TuiConfirmation {
    fn ask_balance_choice(&mut self, prompt: &BalancePrompt) -> BalanceChoice {
        let options: Vec<(char, &str)> = prompt
            .choices
            .iter()
            .map(|choice| match choice {
                BalanceChoice::Manual => ('m', "Balance it manually"),
                BalanceChoice::AutoAdjust => ('a', "Let the system add an adjustment split"),
                BalanceChoice::AdjustCurrent => ('c', "Adjust current account split total"),
                BalanceChoice::AdjustOther => ('o', "Adjust other account split total"),
            })
            .collect();

        let text = vec![
            format!("'{}' is unbalanced by {} {}.", prompt.description, prompt.imbalance, prompt.currency),
            "How would you like to balance it?".to_string(),
        ];

        match self.ask("Rebalance Transaction", text, &options) {
            Some('a') => BalanceChoice::AutoAdjust,
            Some('c') => BalanceChoice::AdjustCurrent,
            Some('o') => BalanceChoice::AdjustOther,
            _ => BalanceChoice::Manual,
        }
    }

    fn ask_commit_or_discard(&mut self) -> CommitChoice {
        let text = vec!["The current transaction has been changed.".to_string(), "Would you like to record it?".to_string()];
        match self.ask("Save Transaction", text, &[('r', "Record"), ('d', "Discard")]) {
            Some('r') => CommitChoice::Commit,
            Some('d') => CommitChoice::Discard,
            _ => CommitChoice::Cancel,
        }
    }

    fn confirm_reconciled_change(&mut self) -> bool {
        let text = vec!["You are about to change a reconciled split.".to_string(), "Do you want to continue?".to_string()];
        self.ask("Change Reconciled Split", text, &[('y', "Yes"), ('n', "No")]) == Some('y')
    }

    fn confirm_create_account(&mut self, full_name: &str) -> bool {
        let text = vec![format!("The account '{}' does not exist.", full_name), "Would you like to create it?".to_string()];
        self.ask("Missing Account", text, &[('y', "Create"), ('n', "No")]) == Some('y')
    }
}

// ============================================================================
// APP STATE
// ============================================================================

pub struct App<'a> {
    pub book: &'a mut Book,
    pub register: &'a mut SplitRegister,
    pub title: String,
    pub status: String,
    /// Text typed into the current cell since the cursor got there
    typed: String,
    cursor_moved: Rc<FlagCell<bool>>,
    table_state: TableState,
}

impl<'a> App<'a> {
    pub fn new(book: &'a mut Book, register: &'a mut SplitRegister, title: &str) -> Self {
        let cursor_moved = Rc::new(FlagCell::new(true));
        let flag = Rc::clone(&cursor_moved);
        register.add_listener(Box::new(move |event: &PresentationEvent| {
            if matches!(event, PresentationEvent::CursorMoved(_)) {
                flag.set(true);
            }
        }));
        register.refresh(book);

        App {
            book,
            register,
            title: title.to_string(),
            status: String::new(),
            typed: String::new(),
            cursor_moved,
            table_state: TableState::default(),
        }
    }

    fn traverse(&mut self, dir: TraversalDir) {
        let outcome = self.register.traverse(self.book, dir);
        self.report(outcome);
    }

    fn report(&mut self, outcome: TraverseOutcome) {
        self.status = match outcome {
            TraverseOutcome::Moved(_) => String::new(),
            TraverseOutcome::Cancelled => "Cancelled".to_string(),
            TraverseOutcome::Refused {
                reason: RefusalReason::Unbalanced { imbalance, .. },
                ..
            } => format!("Transaction is unbalanced by {}", imbalance),
            TraverseOutcome::Refused {
                reason: RefusalReason::Invalid(e),
                ..
            } => e.to_string(),
        };
    }

    fn record(&mut self) {
        self.status = match self.register.record(self.book) {
            Ok(()) => "Recorded".to_string(),
            Err(e) => e.to_string(),
        };
    }

    fn set_current(&mut self, name: CellName, value: &str) -> bool {
        match self.register.set_cell(self.book, name, value) {
            Ok(()) => true,
            Err(e) => {
                self.status = e.to_string();
                false
            }
        }
    }

    fn type_char(&mut self, c: char) {
        let Some(name) = self.register.table().current_cell_name() else {
            return;
        };

        if name == CellName::Reconcile {
            if c == ' ' {
                if let Err(e) = self.register.toggle_reconcile(self.book) {
                    self.status = e.to_string();
                }
            }
            return;
        }
        if name == CellName::Num && c == '+' {
            let next = self.register.next_num();
            self.set_current(name, &next);
            return;
        }

        self.typed.push(c);
        let separator = self.register.config().account_separator;

        let value = if name == CellName::Transfer && c == separator {
            match self.register.account_unique_completion(&self.typed) {
                Some(done) => {
                    self.typed = done.clone();
                    done
                }
                None => self.typed.clone(),
            }
        } else {
            self.register
                .quickfill_completion(name, &self.typed)
                .unwrap_or_else(|| self.typed.clone())
        };

        let typed = self.typed.clone();
        if !self.set_current(name, &value) {
            self.typed.pop();
        } else if value != typed {
            self.status = format!("Completed '{}'", value);
        }
    }

    fn backspace(&mut self) {
        let Some(name) = self.register.table().current_cell_name() else {
            return;
        };
        self.typed.pop();
        let typed = self.typed.clone();
        self.set_current(name, &typed);
    }

    fn delete(&mut self, whole_transaction: bool) {
        let result = if whole_transaction {
            self.register.delete_current_trans(self.book)
        } else {
            self.register.delete_current_split(self.book)
        };
        self.status = match result {
            Ok(()) => "Deleted".to_string(),
            Err(e) => e.to_string(),
        };
    }

    fn toggle_expanded(&mut self) {
        let expand = !self.register.is_expanded();
        if let Err(e) = self.register.expand_current_transaction(self.book, expand) {
            self.status = e.to_string();
        }
    }

    /// Leave only once nothing is pending
    fn try_quit(&mut self) -> bool {
        if self.register.table().current_cursor_changed() || self.register.pending_trans(self.book).is_some() {
            self.record();
            return self.register.pending_trans(self.book).is_none();
        }
        true
    }

    /// Returns false when the app should exit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return !self.try_quit(),
            KeyCode::Char('e') if ctrl => self.toggle_expanded(),
            KeyCode::Char('d') if ctrl => self.delete(false),
            KeyCode::Char('x') if ctrl => self.delete(true),
            KeyCode::Tab => self.traverse(TraversalDir::Right),
            KeyCode::BackTab => self.traverse(TraversalDir::Left),
            KeyCode::Up => self.traverse(TraversalDir::Up),
            KeyCode::Down => self.traverse(TraversalDir::Down),
            KeyCode::Enter => self.record(),
            KeyCode::Esc => {
                self.register.cancel_cursor_trans_changes(self.book);
                self.status = "Changes cancelled".to_string();
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) if !ctrl => self.type_char(c),
            _ => {}
        }

        if self.cursor_moved.replace(false) {
            self.typed.clear();
        }
        true
    }
}

// ============================================================================
// MAIN LOOP
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal: SharedTerminal = Rc::new(RefCell::new(Terminal::new(backend)?));

    app.register.set_port(Box::new(TuiConfirmation::new(Rc::clone(&terminal))));
    app.cursor_moved.set(false);

    // Run the app
    let res = run_app(&terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    {
        let mut terminal = terminal.borrow_mut();
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
    }

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app(terminal: &SharedTerminal, app: &mut App) -> io::Result<()> {
    loop {
        terminal.borrow_mut().draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Register
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_register(f, chunks[0], app);
    render_status_bar(f, chunks[1], app);
}

fn render_register(f: &mut Frame, area: Rect, app: &mut App) {
    let reg = &app.register;
    let book: &Book = app.book;
    let current = reg.current_location();

    let header_cells = reg
        .display_row(book, Default::default(), 0)
        .into_iter()
        .map(|h| Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let mut rows = Vec::new();
    let mut selected = None;

    for (vcell, phys_row) in reg.table().visible_rows() {
        if vcell.row == 0 {
            continue;
        }
        let is_current = vcell == current.vcell;
        let is_divider = reg.table().dividing_row == Some(vcell.row);

        let texts = reg.display_row(book, vcell, phys_row);
        let cells: Vec<Cell> = texts
            .into_iter()
            .enumerate()
            .map(|(col, text)| {
                let width = COLUMN_WIDTHS.get(col).copied().unwrap_or(10) as usize;
                let cell = Cell::from(truncate(&text, width));
                if is_current && phys_row as i32 == current.phys_row_offset && col as i32 == current.phys_col_offset {
                    cell.style(Style::default().fg(Color::Black).bg(Color::Cyan))
                } else {
                    cell
                }
            })
            .collect();

        let mut style = Style::default();
        if is_divider && phys_row == 0 {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if is_current {
            style = style.add_modifier(Modifier::BOLD);
            if selected.is_none() {
                selected = Some(rows.len());
            }
        }
        rows.push(Row::new(cells).style(style).height(1));
    }

    let widths: Vec<Constraint> = COLUMN_WIDTHS.iter().map(|w| Constraint::Length(*w)).collect();
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", app.title)),
        )
        .highlight_symbol("→ ");

    app.table_state.select(selected);
    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.register.help_text()),
        Style::default().fg(Color::Cyan),
    )];

    if !app.status.is_empty() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(app.status.clone(), Style::default().fg(Color::Green)));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Next | "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Record | "));
    status_spans.push(Span::styled("Esc", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Cancel | "));
    status_spans.push(Span::styled("^Q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
