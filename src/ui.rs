use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use customer_profiler::{
    bank::{Indicator, Window},
    charts::{ChartError, ChartSet},
    documents::DocumentKind,
    llm::ModelBackend,
    session::{Session, Step},
    wizard::{Preview, StepError, SummaryReport, VerificationReport, Wizard},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span, Text},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph,
        Row, Table, TableState, Wrap,
    },
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a file path for an upload slot
    Path(DocumentKind),
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    fn color(&self) -> Color {
        match self {
            Level::Info => Color::Green,
            Level::Warning => Color::Yellow,
            Level::Error => Color::Red,
        }
    }
}

/// Blocking work queued by a key press, run after a "working" frame is drawn
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Verify,
    Summarize(Window),
    Profile,
    Answer(String),
}

impl Job {
    fn busy_label(&self) -> &'static str {
        match self {
            Job::Verify => "Extracting details and matching names across documents...",
            Job::Summarize(_) => "Summarizing documents...",
            Job::Profile => "Generating customer profile...",
            Job::Answer(_) => "Processing your query...",
        }
    }
}

pub struct App<M: ModelBackend> {
    pub wizard: Wizard<M>,
    pub session: Session,
    pub splash: Duration,
    pub opened_at: Instant,
    pub mode: InputMode,
    pub input: String,
    pub slots: TableState,
    pub window: Window,
    pub pending: Option<Job>,
    pub verification: Option<VerificationReport>,
    pub summary: Option<SummaryReport>,
    pub charts: Option<Result<ChartSet, ChartError>>,
    /// Preview of the selected upload slot, if it holds a file
    pub preview: Option<(DocumentKind, Result<Preview, String>)>,
    pub status: Option<(Level, String)>,
    pub scroll: u16,
}

impl<M: ModelBackend> App<M> {
    pub fn new(wizard: Wizard<M>, splash: Duration) -> Self {
        let mut slots = TableState::default();
        slots.select(Some(0));

        Self {
            wizard,
            session: Session::new(),
            splash,
            opened_at: Instant::now(),
            mode: InputMode::Normal,
            input: String::new(),
            slots,
            window: Window::Total,
            pending: None,
            verification: None,
            summary: None,
            charts: None,
            preview: None,
            status: None,
            scroll: 0,
        }
    }

    fn set_status(&mut self, level: Level, message: impl Into<String>) {
        self.status = Some((level, message.into()));
    }

    pub fn selected_slot(&self) -> DocumentKind {
        let i = self.slots.selected().unwrap_or(0);
        DocumentKind::ALL[i % DocumentKind::ALL.len()]
    }

    pub fn next_slot(&mut self) {
        let i = self.slots.selected().map(|i| (i + 1) % DocumentKind::ALL.len()).unwrap_or(0);
        self.slots.select(Some(i));
        self.refresh_preview();
    }

    pub fn previous_slot(&mut self) {
        let len = DocumentKind::ALL.len();
        let i = self.slots.selected().map(|i| (i + len - 1) % len).unwrap_or(0);
        self.slots.select(Some(i));
        self.refresh_preview();
    }

    pub fn refresh_preview(&mut self) {
        let kind = self.selected_slot();
        self.preview = self.session.upload(kind).map(|_| {
            let preview = self
                .wizard
                .preview(&self.session, kind)
                .map_err(|e| e.to_string());
            (kind, preview)
        });
    }

    /// Splash elapsed?
    pub fn tick(&mut self) {
        if self.session.step() == Step::Flash && self.opened_at.elapsed() >= self.splash {
            self.session.finish_splash();
        }
    }

    fn enter_step(&mut self) {
        self.scroll = 0;
        if self.session.step() == Step::Upload {
            self.refresh_preview();
        }
        self.pending = match self.session.step() {
            Step::Verify => Some(Job::Verify),
            Step::Summarize => Some(Job::Summarize(self.window)),
            Step::Profile => Some(Job::Profile),
            _ => None,
        };
    }

    pub fn advance(&mut self) {
        let before = self.session.step();
        if self.session.advance() != before {
            self.status = None;
            self.enter_step();
        }
    }

    pub fn back(&mut self) {
        let before = self.session.step();
        if self.session.back() != before {
            self.status = None;
            self.enter_step();
        }
    }

    pub fn restart(&mut self) {
        self.session.restart();
        self.mode = InputMode::Normal;
        self.input.clear();
        self.pending = None;
        self.verification = None;
        self.summary = None;
        self.charts = None;
        self.preview = None;
        self.scroll = 0;
        self.set_status(Level::Info, "Session restarted");
    }

    pub fn select_window(&mut self, window: Window) {
        self.window = window;
        self.pending = Some(Job::Summarize(window));
    }

    fn submit_path(&mut self, kind: DocumentKind) {
        let raw = self.input.trim().to_string();
        self.input.clear();
        if raw.is_empty() {
            return;
        }

        match self.wizard.upload(&mut self.session, kind, &expand_home(&raw)) {
            Ok(doc) => self.set_status(Level::Info, format!("{} uploaded: {}", kind, doc.file_name)),
            Err(e) => self.set_status(Level::Error, e.to_string()),
        }
        self.refresh_preview();
    }

    fn load_backend_documents(&mut self) {
        match self.wizard.use_backend_documents(&mut self.session) {
            Ok(inventory) if inventory.all_docs_uploaded => {
                self.set_status(Level::Info, "All backend documents loaded")
            }
            Ok(inventory) => {
                let missing: Vec<&str> = inventory.missing_files.iter().map(|k| k.label()).collect();
                self.set_status(Level::Warning, format!("Missing in backend folder: {}", missing.join(", ")))
            }
            Err(e) => self.set_status(Level::Error, e.to_string()),
        }
        self.refresh_preview();
    }

    /// Run the queued job to completion (blocks)
    pub fn run_pending(&mut self) {
        let Some(job) = self.pending.take() else {
            return;
        };

        match job {
            Job::Verify => match self.wizard.verify(&mut self.session) {
                Ok(report) => {
                    self.verification = Some(report);
                }
                Err(e) => {
                    self.verification = None;
                    self.set_status(Level::Error, e.to_string());
                }
            },
            Job::Summarize(window) => {
                let report = self.wizard.summarize(&mut self.session, window);
                self.charts = report.bank.as_ref().map(|bank| ChartSet::from_rows(&bank.rows));
                if !report.warnings.is_empty() {
                    self.set_status(Level::Warning, report.warnings.join(" | "));
                }
                self.summary = Some(report);
            }
            Job::Profile => {
                let today = Local::now().date_naive();
                if let Err(e) = self.wizard.build_profile(&mut self.session, today) {
                    self.set_status(Level::Error, e.to_string());
                }
            }
            Job::Answer(question) => match self.wizard.answer(&mut self.session, &question) {
                Ok(_) => self.status = None,
                Err(e @ StepError::EmptyQuestion) => self.set_status(Level::Warning, e.to_string()),
                Err(e) => self.set_status(Level::Error, e.to_string()),
            },
        }
    }

    /// Returns true when the operator asked to quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode.clone() {
            InputMode::Path(kind) => {
                match key.code {
                    KeyCode::Enter => {
                        self.submit_path(kind);
                        self.mode = InputMode::Normal;
                    }
                    KeyCode::Esc => {
                        self.input.clear();
                        self.mode = InputMode::Normal;
                    }
                    KeyCode::Backspace => {
                        self.input.pop();
                    }
                    KeyCode::Char(c) => self.input.push(c),
                    _ => {}
                }
                return false;
            }
            InputMode::Question => {
                match key.code {
                    KeyCode::Enter => {
                        let question = std::mem::take(&mut self.input);
                        self.pending = Some(Job::Answer(question));
                        self.mode = InputMode::Normal;
                    }
                    KeyCode::Esc => {
                        self.input.clear();
                        self.mode = InputMode::Normal;
                    }
                    KeyCode::Backspace => {
                        self.input.pop();
                    }
                    KeyCode::Char(c) => self.input.push(c),
                    _ => {}
                }
                return false;
            }
            InputMode::Normal => {}
        }

        if self.session.step() == Step::Flash {
            self.session.finish_splash();
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('n') | KeyCode::Right => self.advance(),
            KeyCode::Char('b') | KeyCode::Left => self.back(),
            KeyCode::Char('r') => self.restart(),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            code => match (self.session.step(), code) {
                (Step::Start, KeyCode::Enter) => self.advance(),
                (Step::Upload, KeyCode::Down | KeyCode::Char('j')) => self.next_slot(),
                (Step::Upload, KeyCode::Up | KeyCode::Char('k')) => self.previous_slot(),
                (Step::Upload, KeyCode::Enter) => self.mode = InputMode::Path(self.selected_slot()),
                (Step::Upload, KeyCode::Char('d')) => self.load_backend_documents(),
                (Step::Summarize, KeyCode::Char('t')) => self.select_window(Window::Total),
                (Step::Summarize, KeyCode::Char('w')) => self.select_window(Window::Weekly),
                (Step::Summarize, KeyCode::Char('m')) => self.select_window(Window::Monthly),
                (Step::Summarize | Step::Verify | Step::Profile, KeyCode::Down | KeyCode::Char('j')) => {
                    self.scroll = self.scroll.saturating_add(1)
                }
                (Step::Summarize | Step::Verify | Step::Profile, KeyCode::Up | KeyCode::Char('k')) => {
                    self.scroll = self.scroll.saturating_sub(1)
                }
                (Step::Profile, KeyCode::Enter | KeyCode::Char('/')) => {
                    if self.session.profile().is_some() {
                        self.mode = InputMode::Question;
                    }
                }
                _ => {}
            },
        }
        false
    }
}

/// `~/x` → `$HOME/x`
fn expand_home(raw: &str) -> PathBuf {
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

pub fn run_ui<M: ModelBackend>(app: &mut App<M>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend, M: ModelBackend>(
    terminal: &mut Terminal<B>,
    app: &mut App<M>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if app.pending.is_some() {
            app.run_pending();
            continue;
        }

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) {
                    info!(session = %app.session.id(), "Operator quit");
                    return Ok(());
                }
            }
        }
        app.tick();
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui<M: ModelBackend>(f: &mut Frame, app: &mut App<M>) {
    if app.session.step() == Step::Flash {
        render_flash(f, f.size());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with step tabs
            Constraint::Min(0),    // Step content
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.session.step() {
        Step::Flash => {}
        Step::Start => render_start(f, chunks[1]),
        Step::Upload => render_upload(f, chunks[1], app),
        Step::Verify => render_verify(f, chunks[1], app),
        Step::Summarize => render_summarize(f, chunks[1], app),
        Step::Profile => render_profile(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn title_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn render_flash(f: &mut Frame, area: Rect) {
    let content = vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled("🏦 Customer Profiler", title_style())),
        Line::from(""),
        Line::from("Identity checks, document summaries and an RM-ready customer profile"),
        Line::from(""),
        Line::from(Span::styled("Press any key to continue", Style::default().fg(Color::DarkGray))),
    ];

    let splash = Paragraph::new(content)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(splash, area);
}

fn render_header<M: ModelBackend>(f: &mut Frame, area: Rect, app: &App<M>) {
    let mut tab_spans = vec![];
    for (i, step) in Step::TABS.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *step == app.session.step() {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(format!("{}. {}", i + 1, step.label()), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Uploaded: {}/{}", app.session.uploads().len(), DocumentKind::ALL.len()),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_start(f: &mut Frame, area: Rect) {
    let content = vec![
        Line::from(""),
        Line::from(Span::styled("  Welcome to the Customer Profiler", title_style())),
        Line::from(""),
        Line::from("  1. Upload the customer's Identification Document, Sale Deed,"),
        Line::from("     Credit Score Report and Bank Statement."),
        Line::from("  2. Verify the customer name across documents."),
        Line::from("  3. Review per-document summaries and bank statement charts."),
        Line::from("  4. Generate the RM-ready profile and ask questions about it."),
        Line::from(""),
        Line::from(vec![
            Span::raw("  Press "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" to start."),
        ]),
    ];

    let start = Paragraph::new(content)
        .block(Block::default().borders(Borders::ALL).title(" Start "));
    f.render_widget(start, area);
}

fn render_upload<M: ModelBackend>(f: &mut Frame, area: Rect, app: &mut App<M>) {
    let table_height = DocumentKind::ALL.len() as u16 + 3;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(table_height),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let header_cells = ["Document", "Accepted", "Staged File", "Size"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = DocumentKind::ALL.iter().map(|kind| {
        let (file, size, color) = match app.session.upload(*kind) {
            Some(doc) => (
                doc.file_name.clone(),
                format!("{} B", doc.size_bytes),
                Color::Green,
            ),
            None => ("-".to_string(), String::new(), Color::DarkGray),
        };

        Row::new(vec![
            Cell::from(kind.label()),
            Cell::from(kind.accepted_extensions().join(", ")),
            Cell::from(file).style(Style::default().fg(color)),
            Cell::from(size),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(22),
            Constraint::Min(20),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Upload Customer Documents "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[0], &mut app.slots);
    render_preview(f, chunks[1], app);

    let prompt = match &app.mode {
        InputMode::Path(kind) => Line::from(vec![
            Span::styled(format!("{} path: ", kind), Style::default().fg(Color::Yellow)),
            Span::raw(app.input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ]),
        _ => Line::from(Span::styled(
            "Enter: type a file path for the selected slot   d: use backend documents",
            Style::default().fg(Color::DarkGray),
        )),
    };
    f.render_widget(
        Paragraph::new(prompt).block(Block::default().borders(Borders::ALL)),
        chunks[2],
    );
}

fn render_preview<M: ModelBackend>(f: &mut Frame, area: Rect, app: &App<M>) {
    let kind = app.selected_slot();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" 📄 {} Preview ", kind));

    match &app.preview {
        Some((shown, Ok(Preview::Rows { rows }))) if *shown == kind => {
            let header = Row::new(["Date", "C/D", "Amount", "Description"].map(|h| {
                Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            }));
            let rows = rows.iter().map(|tx| {
                Row::new(vec![
                    Cell::from(tx.timestamp.format("%Y-%m-%d %H:%M").to_string()),
                    Cell::from(match &tx.indicator {
                        Indicator::Credit => "C".to_string(),
                        Indicator::Debit => "D".to_string(),
                        Indicator::Other(raw) => raw.clone(),
                    }),
                    Cell::from(format!("{:.2}", tx.amount)),
                    Cell::from(tx.description.clone()),
                ])
            });
            let table = Table::new(
                rows,
                [
                    Constraint::Length(17),
                    Constraint::Length(4),
                    Constraint::Length(14),
                    Constraint::Min(10),
                ],
            )
            .header(header)
            .block(block);
            f.render_widget(table, area);
        }
        Some((shown, Ok(Preview::Text { text }))) if *shown == kind => {
            let preview = Paragraph::new(text.as_str())
                .wrap(Wrap { trim: false })
                .block(block);
            f.render_widget(preview, area);
        }
        Some((shown, Ok(Preview::Image { width, height }))) if *shown == kind => {
            let file = app
                .session
                .upload(kind)
                .map(|doc| doc.file_name.clone())
                .unwrap_or_default();
            let line = format!("🖼️ {} ({}×{} px)", file, width, height);
            f.render_widget(preview_message(line, Color::Green, block), area);
        }
        Some((shown, Err(e))) if *shown == kind => {
            let line = format!("⚠️ Preview unavailable: {}", e);
            f.render_widget(preview_message(line, Color::Yellow, block), area);
        }
        _ => {
            let line = "Nothing staged for this slot.".to_string();
            f.render_widget(preview_message(line, Color::DarkGray, block), area);
        }
    }
}

fn preview_message(text: String, color: Color, block: Block<'_>) -> Paragraph<'_> {
    Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color))))
        .wrap(Wrap { trim: false })
        .block(block)
}

fn render_verify<M: ModelBackend>(f: &mut Frame, area: Rect, app: &App<M>) {
    let Some(report) = &app.verification else {
        let message = match &app.status {
            Some((_, message)) => message.clone(),
            None => "Verification has not run yet.".to_string(),
        };
        let empty = Paragraph::new(Line::from(Span::styled(format!("❌ {}", message), Style::default().fg(Color::Red))))
            .block(Block::default().borders(Borders::ALL).title(" Verifying Customer Details "));
        f.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let identity = Paragraph::new(Text::from(report.identity_summary.as_str()))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(" 👤 Extracted Customer Identity "));
    f.render_widget(identity, chunks[0]);

    let mut lines = vec![];
    match &report.customer_photo {
        Some(path) => lines.push(Line::from(format!("📷 Customer Photo: {}", path.display()))),
        None => lines.push(Line::from(Span::styled(
            "⚠️ Customer image not found.",
            Style::default().fg(Color::Yellow),
        ))),
    }
    lines.push(Line::from(""));

    if report.results.is_empty() {
        lines.push(Line::from(Span::styled(
            "No Sale Deed or Credit Score Report to match against.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for result in &report.results {
        let color = if result.matched { Color::Green } else { Color::Red };
        let mark = if result.matched { "✅" } else { "❌" };
        lines.push(Line::from(vec![
            Span::raw(format!("{}: ", result.kind)),
            Span::styled(format!("{} {}", mark, result.status_label()), Style::default().fg(color)),
        ]));
        lines.push(Line::from(Span::styled(
            format!("   {}", result.response),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::from(""));
    if report.all_matched() {
        lines.push(Line::from(Span::styled(
            "✅ Customer name matches across all documents!",
            Style::default().fg(Color::Green),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "⚠️ Name mismatch found. Please verify manually.",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    let results = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" 🔎 Verification Results "));
    f.render_widget(results, chunks[1]);
}

fn render_summarize<M: ModelBackend>(f: &mut Frame, area: Rect, app: &App<M>) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut window_spans = vec![Span::raw(" Window: ")];
    for window in Window::ALL {
        let key = window.label().chars().next().unwrap_or(' ').to_ascii_lowercase();
        let style = if window == app.window {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        window_spans.push(Span::styled(format!("[{}] {}  ", key, window.label()), style));
    }

    let mut lines = vec![Line::from(window_spans), Line::from("")];
    match &app.summary {
        Some(report) if !report.summaries.is_empty() => {
            for (kind, summary) in &report.summaries {
                lines.push(Line::from(Span::styled(format!("📄 {} Summary", kind), title_style())));
                lines.extend(Text::from(summary.as_str()).lines);
                lines.push(Line::from(""));
            }
        }
        _ => lines.push(Line::from(Span::styled(
            "No summaries yet. Upload documents first.",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let summaries = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(" 📜 Document Summaries "));
    f.render_widget(summaries, chunks[0]);

    match &app.charts {
        Some(Ok(charts)) => render_charts(f, chunks[1], charts),
        Some(Err(e)) => {
            let warning = Paragraph::new(Line::from(Span::styled(
                format!("⚠️ Charts unavailable: {}", e),
                Style::default().fg(Color::Yellow),
            )))
            .block(Block::default().borders(Borders::ALL).title(" 📊 Bank Statement Charts "));
            f.render_widget(warning, chunks[1]);
        }
        None => {
            let empty = Paragraph::new("No bank statement analyzed.")
                .block(Block::default().borders(Borders::ALL).title(" 📊 Bank Statement Charts "));
            f.render_widget(empty, chunks[1]);
        }
    }
}

fn render_charts(f: &mut Frame, area: Rect, charts: &ChartSet) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(35),
            Constraint::Percentage(25),
        ])
        .split(area);

    // Daily net flow: bar height is the magnitude, color the sign
    let bars: Vec<Bar> = charts
        .daily_net
        .iter()
        .map(|(date, net)| {
            let color = if *net >= 0.0 { Color::Green } else { Color::Red };
            Bar::default()
                .value(net.abs().round() as u64)
                .text_value(format!("{:.0}", net))
                .label(Line::from(date.format("%d/%m").to_string()))
                .style(Style::default().fg(color))
        })
        .collect();
    let daily = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" Daily Net Flow "))
        .bar_width(7)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(daily, chunks[0]);

    // Running balance
    let points: Vec<(f64, f64)> = charts
        .running_balance
        .iter()
        .enumerate()
        .map(|(i, balance)| (i as f64, *balance))
        .collect();
    let (low, high) = points.iter().fold((0.0_f64, 0.0_f64), |(lo, hi), (_, y)| (lo.min(*y), hi.max(*y)));
    let x_max = points.len().saturating_sub(1).max(1) as f64;
    let datasets = vec![Dataset::default()
        .name("Balance")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points)];
    let balance = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(" Cumulative Balance "))
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(vec![Span::raw("first"), Span::raw("last")]),
        )
        .y_axis(
            Axis::default()
                .bounds([low, high.max(low + 1.0)])
                .labels(vec![Span::raw(format!("{:.0}", low)), Span::raw(format!("{:.0}", high))]),
        );
    f.render_widget(balance, chunks[1]);

    // Large transactions
    let rows = charts.large_transactions.iter().map(|tx| {
        Row::new(vec![
            Cell::from(tx.timestamp.format("%Y-%m-%d").to_string()),
            Cell::from(format!("{:.2}", tx.signed_amount())),
            Cell::from(tx.description.clone()),
        ])
    });
    let large = Table::new(
        rows,
        [Constraint::Length(12), Constraint::Length(14), Constraint::Min(10)],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Large Transactions (> 2× mean) "),
    );
    f.render_widget(large, chunks[2]);
}

fn render_profile<M: ModelBackend>(f: &mut Frame, area: Rect, app: &App<M>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Min(5), Constraint::Length(3)])
        .split(area);

    let narrative = match app.session.profile() {
        Some(profile) => Text::from(profile.narrative.as_str()),
        None => Text::from(Span::styled(
            "❌ No document summaries found. Please restart the process.",
            Style::default().fg(Color::Red),
        )),
    };
    let profile = Paragraph::new(narrative)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(" 📄 Final RM-Ready Customer Profile "));
    f.render_widget(profile, chunks[0]);

    let mut answer_lines = vec![];
    if let Some(qa) = app.session.last_answer() {
        answer_lines.push(Line::from(Span::styled(format!("Q: {}", qa.question), title_style())));
        answer_lines.extend(Text::from(qa.answer.as_str()).lines);
    }
    let answer = Paragraph::new(answer_lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" 📝 Answer "));
    f.render_widget(answer, chunks[1]);

    let prompt = match app.mode {
        InputMode::Question => Line::from(vec![
            Span::styled("🔍 ", Style::default().fg(Color::Yellow)),
            Span::raw(app.input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ]),
        _ => Line::from(Span::styled(
            "Enter: ask a question about this customer (e.g. 'What is their loan eligibility?')",
            Style::default().fg(Color::DarkGray),
        )),
    };
    f.render_widget(
        Paragraph::new(prompt).block(Block::default().borders(Borders::ALL).title(" 🗂️ Query the Customer Profile ")),
        chunks[2],
    );
}

fn render_status_bar<M: ModelBackend>(f: &mut Frame, area: Rect, app: &App<M>) {
    let mut status_spans = vec![];

    if let Some(job) = &app.pending {
        status_spans.push(Span::styled(
            format!(" ⏳ {} ", job.busy_label()),
            Style::default().fg(Color::Cyan),
        ));
    } else if let Some((level, message)) = &app.status {
        status_spans.push(Span::styled(format!(" {} ", message), Style::default().fg(level.color())));
    }

    let hints: &[(&str, &str)] = match (&app.mode, app.session.step()) {
        (InputMode::Path(_) | InputMode::Question, _) => &[("Enter", "Submit"), ("Esc", "Cancel")],
        (_, Step::Upload) => &[("↑/↓", "Slot"), ("Enter", "Path"), ("d", "Backend docs"), ("n", "Next"), ("b", "Back")],
        (_, Step::Summarize) => &[("t/w/m", "Window"), ("↑/↓", "Scroll"), ("n", "Next"), ("b", "Back")],
        (_, Step::Profile) => &[("Enter", "Ask"), ("↑/↓", "Scroll"), ("b", "Back"), ("r", "Restart")],
        _ => &[("n", "Next"), ("b", "Back"), ("r", "Restart")],
    };

    for (key, action) in hints {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(format!(" {}", action)));
    }
    if app.mode == InputMode::Normal {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
        status_spans.push(Span::raw(" Quit"));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
