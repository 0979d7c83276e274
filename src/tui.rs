use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::time::{Duration, Instant};

use crate::filter::{Listing, LoadTicket};
use crate::models::Job;
use crate::similar::DEFAULT_SIMILAR_LIMIT;
use crate::store::JobStore;
use crate::truncate;

struct AppState {
    listing: Listing,
    /// Index within the current page.
    selected: usize,
    scroll_offset: u16,
    loading_delay: Duration,
    /// Reload in flight and when it is due.
    pending: Option<(LoadTicket, Instant)>,
}

impl AppState {
    fn new(listing: Listing, loading_delay: Duration) -> Self {
        Self {
            listing,
            selected: 0,
            scroll_offset: 0,
            loading_delay,
            pending: None,
        }
    }

    fn page_jobs<'a>(&self, store: &'a JobStore) -> Vec<&'a Job> {
        self.listing.page_jobs(store.list_jobs())
    }

    fn current_job<'a>(&self, store: &'a JobStore) -> Option<&'a Job> {
        self.page_jobs(store).get(self.selected).copied()
    }

    fn next(&mut self, store: &JobStore) {
        let len = self.page_jobs(store).len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn next_page(&mut self) {
        if self.listing.next_page() {
            self.selected = 0;
            self.scroll_offset = 0;
        }
    }

    fn prev_page(&mut self) {
        if self.listing.prev_page() {
            self.selected = 0;
            self.scroll_offset = 0;
        }
    }

    /// Clears all filters and schedules a reload. A reload already in flight
    /// is superseded.
    fn reset_filters(&mut self, now: Instant) {
        self.listing.reset();
        let ticket = self.listing.begin_load();
        self.pending = Some((ticket, now + self.loading_delay));
        self.selected = 0;
        self.scroll_offset = 0;
    }

    /// Publishes the pending reload once it is due.
    fn poll_load(&mut self, store: &JobStore, now: Instant) {
        let Some((ticket, due)) = self.pending else {
            return;
        };
        if now < due {
            return;
        }
        self.pending = None;
        if self.listing.finish_load(ticket, store.list_jobs()) {
            self.selected = 0;
        }
    }

    /// How long the event loop may block before the pending reload is due.
    fn wait_budget(&self, now: Instant) -> Duration {
        match self.pending {
            Some((_, due)) => due.saturating_duration_since(now),
            None => Duration::from_millis(250),
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Applies one key press. Returns false when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode, store: &mut JobStore) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Down | KeyCode::Char('j') => self.next(store),
            KeyCode::Up | KeyCode::Char('k') => self.prev(),
            KeyCode::Char('J') | KeyCode::PageDown => self.scroll_down(),
            KeyCode::Char('K') | KeyCode::PageUp => self.scroll_up(),
            KeyCode::Char('n') | KeyCode::Right => self.next_page(),
            KeyCode::Char('p') | KeyCode::Left => self.prev_page(),
            KeyCode::Char('r') => self.reset_filters(Instant::now()),
            KeyCode::Char('s') => {
                if let Some(id) = self.current_job(store).map(|job| job.id.clone()) {
                    store.toggle_save_job(&id);
                }
            }
            _ => {}
        }
        true
    }
}

pub fn run_browse(store: &mut JobStore, listing: Listing, loading_delay: Duration) -> Result<()> {
    if listing.result_count() == 0 && !listing.is_filtered() {
        println!("No jobs found.");
        return Ok(());
    }

    let mut state = AppState::new(listing, loading_delay);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, store);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    store: &mut JobStore,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        list_state.select(Some(state.selected));
        terminal.draw(|frame| draw(frame, state, store, &mut list_state))?;

        if event::poll(state.wait_budget(Instant::now()))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !state.handle_key(key.code, store) {
                    break;
                }
            }
        }
        state.poll_load(store, Instant::now());
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, store: &JobStore, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(frame.area());

    // Left panel: current page of results
    let items: Vec<ListItem> = state
        .page_jobs(store)
        .into_iter()
        .map(|job| {
            let saved_icon = if store.is_job_saved(&job.id) { "*" } else { " " };
            let applied_icon = if store.is_job_applied(&job.id) { "+" } else { " " };
            ListItem::new(format!(
                "{}{} {} | {}",
                saved_icon,
                applied_icon,
                truncate(&job.title, 30),
                job.company
            ))
        })
        .collect();

    let title = if state.listing.is_loading() {
        " Loading... ".to_string()
    } else {
        format!(
            " Jobs ({}) page {}/{}{} ",
            state.listing.result_count(),
            state.listing.current_page(),
            state.listing.total_pages().max(1),
            if state.listing.is_filtered() { " [filtered]" } else { "" }
        )
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail
    let detail = build_detail(state, store);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = Paragraph::new(" j/k:navigate  J/K:scroll  n/p:page  s:save  r:reset filters  q:quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn build_detail<'a>(state: &AppState, store: &'a JobStore) -> Text<'a> {
    let Some(job) = state.current_job(store) else {
        return Text::raw("No job selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        job.title.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {} - {}", job.company, job.location)));
    lines.push(Line::from(format!(
        "{} | {} | {} | {}",
        job.job_type, job.work_type, job.experience_level, job.category
    )));
    lines.push(Line::from(format!(
        "Salary: {} {} - {}",
        job.salary.currency, job.salary.min, job.salary.max
    )));
    lines.push(Line::from(format!(
        "Posted {}  Apply by {}",
        job.posted_date.format("%Y-%m-%d"),
        job.application_deadline.format("%Y-%m-%d")
    )));

    if store.is_job_applied(&job.id) {
        lines.push(Line::from(Span::styled("Applied", Style::default().fg(Color::Cyan))));
    } else if store.is_job_saved(&job.id) {
        lines.push(Line::from(Span::styled("Saved", Style::default().fg(Color::Yellow))));
    }

    lines.push(Line::from(""));
    for line in textwrap::fill(&job.description, 70).lines() {
        lines.push(Line::from(line.to_string()));
    }

    let sections = [
        ("Responsibilities", &job.responsibilities),
        ("Requirements", &job.requirements),
        ("Skills", &job.skills),
        ("Benefits", &job.benefits),
    ];
    for (label, entries) in sections {
        if entries.is_empty() {
            continue;
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            label,
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for entry in entries {
            lines.push(Line::from(format!("  - {}", entry)));
        }
    }

    let similar = store.similar_jobs(&job.id, DEFAULT_SIMILAR_LIMIT);
    if !similar.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Similar jobs",
            Style::default().fg(Color::Cyan),
        )));
        for other in similar {
            lines.push(Line::from(format!("  #{} {} | {}", other.id, other.title, other.company)));
        }
    }

    Text::from(lines)
}
