use crate::{App, AppMode, EditField, FilterKind, LoginField};
use brain_core::sync::summarize_history;
use brain_core::{PollPhase, Priority, RowState, Status, SyncState, TaskOrigin, TaskRecord};
use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

pub(crate) fn ui(f: &mut Frame, app: &App) {
    if app.mode == AppMode::Login {
        render_login(f, app);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    render_task_list(f, app, body[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Min(8)])
        .split(body[1]);

    render_details(f, app, right[0]);
    render_sync(f, app, right[1]);
    render_status_bar(f, app, chunks[2]);

    match app.mode {
        AppMode::Edit => render_edit(f, app),
        AppMode::Filter(kind) => render_filter_menu(f, kind),
        AppMode::Help => render_help(f),
        _ => {}
    }

    if app.sync.notification.is_some() {
        render_notification(f, app);
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Pending => Color::Gray,
        Status::InProgress => Color::Yellow,
        Status::Completed => Color::Green,
        Status::Blocked => Color::Red,
        Status::Cancelled => Color::DarkGray,
    }
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Blue,
    }
}

fn sync_color(state: SyncState) -> Color {
    match state {
        SyncState::Success => Color::Green,
        SyncState::Error => Color::Red,
        SyncState::Pending => Color::Yellow,
    }
}

fn format_time(app: &App, time: DateTime<Utc>) -> String {
    app.config.display.format_time(time)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let stats = app.store.stats();
    let project = app
        .store
        .project()
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| app.config.project_name.clone());

    let mut spans = vec![
        Span::styled(project, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::raw(format!("{} tasks", stats.total)),
        Span::raw(" | "),
        Span::styled(
            format!("✓{}", stats.completed),
            Style::default().fg(Color::Green),
        ),
        Span::raw(" "),
        Span::styled(
            format!("⟳{}", stats.in_progress),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" "),
        Span::raw(format!("○{}", stats.pending)),
        Span::raw(" "),
        Span::styled(format!("✗{}", stats.blocked), Style::default().fg(Color::Red)),
        Span::raw(format!(" | {}% done", stats.completion_percent)),
    ];
    if app.store.origin() == TaskOrigin::Sample {
        spans.push(Span::styled(
            "  [sample data]",
            Style::default().fg(Color::Magenta),
        ));
    }
    if app.reloading {
        spans.push(Span::styled("  loading…", Style::default().fg(Color::DarkGray)));
    }

    let user = app
        .session
        .as_ref()
        .map(|s| format!(" {} ({}) ", s.user.display_name, s.user.role))
        .unwrap_or_default();

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" brainview ")
            .title_bottom(Line::from(user).alignment(Alignment::Right)),
    );
    f.render_widget(header, area);
}

fn render_task_list(f: &mut Frame, app: &App, area: Rect) {
    let visible = app.visible();
    let height = area.height.saturating_sub(2) as usize;

    let mut offset = app.selection.offset;
    if height > 0 && app.selection.index >= offset + height {
        offset = app.selection.index + 1 - height;
    }

    let title_width = app.config.display.max_title_length;
    let items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .skip(offset)
        .take(height.max(1))
        .map(|(i, task)| {
            let marker = match app.row_state(&task.id) {
                RowState::Viewing => " ",
                RowState::Editing(_) => "✎",
                RowState::Committing(_) => "⟳",
            };
            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Magenta)),
                Span::raw(" "),
                Span::styled(format!("{:<6}", task.id), Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!("{:<12}", task.status.label()),
                    Style::default().fg(status_color(task.status)),
                ),
                Span::styled(
                    format!("{:<7}", task.priority.label()),
                    Style::default().fg(priority_color(task.priority)),
                ),
                Span::raw(format!("{:>4}% ", task.display_progress())),
                Span::raw(truncate(&task.title, title_width)),
            ]);
            let style = if i == app.selection.index {
                Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let title = if app.filter.is_identity() {
        format!(" Tasks ({}) ", visible.len())
    } else {
        format!(" Tasks ({}/{}) [{}] ", visible.len(), app.store.len(), app.filter)
    };

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Details ");
    let Some(task) = app.current_task() else {
        let empty = Paragraph::new("No tasks match the current filters.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    };

    let lines = detail_lines(app, task);
    let details = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(details, area);
}

fn detail_lines<'a>(app: &App, task: &'a TaskRecord) -> Vec<Line<'a>> {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled(
            task.title.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("ID:       ", label),
            Span::raw(task.id.as_str()),
        ]),
        Line::from(vec![
            Span::styled("Status:   ", label),
            Span::styled(
                task.status.label(),
                Style::default().fg(status_color(task.status)),
            ),
            Span::raw(format!("  ({}%)", task.display_progress())),
        ]),
        Line::from(vec![
            Span::styled("Priority: ", label),
            Span::styled(
                task.priority.label(),
                Style::default().fg(priority_color(task.priority)),
            ),
        ]),
    ];

    if let Some(phase) = &task.phase_name {
        lines.push(Line::from(vec![
            Span::styled("Phase:    ", label),
            Span::raw(phase.as_str()),
        ]));
    }
    if let Some(assignee) = &task.assignee {
        lines.push(Line::from(vec![
            Span::styled("Assignee: ", label),
            Span::raw(assignee.as_str()),
        ]));
    }
    if let Some(due) = &task.due_date {
        lines.push(Line::from(vec![
            Span::styled("Due:      ", label),
            Span::raw(due.as_str()),
        ]));
    }
    if let Some(updated) = task.updated_at {
        lines.push(Line::from(vec![
            Span::styled("Updated:  ", label),
            Span::raw(format_time(app, updated)),
        ]));
    }

    match app.row_state(&task.id) {
        RowState::Editing(draft) => {
            let note = match &draft.error {
                Some(err) => format!("Unsaved edit ({}), last attempt failed: {}", draft.status.label(), err),
                None => format!("Unsaved edit ({})", draft.status.label()),
            };
            lines.push(Line::from(Span::styled(note, Style::default().fg(Color::Magenta))));
        }
        RowState::Committing(draft) => {
            lines.push(Line::from(Span::styled(
                format!("Saving {}…", draft.status.label()),
                Style::default().fg(Color::Magenta),
            )));
        }
        RowState::Viewing => {}
    }

    if !task.description.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(task.description.as_str()));
    }

    if !task.comments.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Comments ({})", task.comments.len()),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for comment in task.comments.iter().rev() {
            lines.push(Line::from(vec![
                Span::styled(format_time(app, comment.timestamp), label),
                Span::raw(" "),
                Span::styled(
                    comment.status_change.as_str(),
                    Style::default().fg(Color::Cyan),
                ),
            ]));
            lines.push(Line::from(format!("  {}", comment.comment)));
        }
    }

    lines
}

fn render_sync(f: &mut Frame, app: &App, area: Rect) {
    let sync = &app.sync;
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();

    let activity = if sync.triggering {
        Some("manual sync requested…")
    } else if sync.phase == PollPhase::Checking {
        Some("checking…")
    } else {
        None
    };

    match &sync.latest {
        Some(record) => {
            lines.push(Line::from(vec![
                Span::styled(
                    record.status.label(),
                    Style::default()
                        .fg(sync_color(record.status))
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled(format_time(app, record.timestamp), label),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Commit: ", label),
                Span::styled(record.short_sha(), Style::default().fg(Color::Cyan)),
                Span::raw(" "),
                Span::raw(truncate(
                    &record.commit_message,
                    app.config.display.message_preview_chars,
                )),
            ]));
            if !record.author.is_empty() {
                lines.push(Line::from(vec![
                    Span::styled("Author: ", label),
                    Span::raw(record.author.as_str()),
                ]));
            }
            if let Some(err) = &record.error {
                lines.push(Line::from(Span::styled(
                    err.as_str(),
                    Style::default().fg(Color::Red),
                )));
            }
        }
        None if sync.last_checked.is_some() => {
            lines.push(Line::from(Span::styled("No sync history", label)));
        }
        None => {
            lines.push(Line::from(Span::styled("Waiting for sync service…", label)));
        }
    }

    let history = summarize_history(
        &sync.history,
        app.config.sync.history_limit,
        app.config.display.message_preview_chars,
    );
    if !history.is_empty() {
        lines.push(Line::from(""));
        for entry in history {
            lines.push(Line::from(vec![
                Span::styled("● ", Style::default().fg(sync_color(entry.status))),
                Span::styled(format_time(app, entry.timestamp), label),
                Span::raw(" "),
                Span::styled(entry.short_sha, Style::default().fg(Color::Cyan)),
                Span::raw(" "),
                Span::raw(entry.message),
                Span::styled(format!(" ({} files)", entry.files_count), label),
            ]));
        }
    }

    let mut block = Block::default().borders(Borders::ALL).title(" Sync ");
    if let Some(activity) = activity {
        block = block.title_bottom(
            Line::from(Span::styled(
                format!(" {} ", activity),
                Style::default().fg(Color::Yellow),
            ))
            .alignment(Alignment::Right),
        );
    }

    let widget = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(widget, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.mode {
        AppMode::Search => Line::from(vec![
            Span::styled("/", Style::default().fg(Color::Yellow)),
            Span::raw(app.filter.text.as_str()),
            Span::styled("█", Style::default().fg(Color::Gray)),
        ]),
        _ => match &app.status_message {
            Some(msg) => Line::from(Span::styled(
                msg.as_str(),
                Style::default().fg(Color::Yellow),
            )),
            None => Line::from(Span::styled(
                "j/k move  e edit  / search  s status  p priority  S sync  ? help  q quit",
                Style::default().fg(Color::DarkGray),
            )),
        },
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_login(f: &mut Frame, app: &App) {
    let area = centered_rect(50, 40, f.area());
    f.render_widget(Clear, area);

    let focused = Style::default().fg(Color::Yellow);
    let normal = Style::default();
    let (user_style, pass_style) = match app.login.field {
        LoginField::Username => (focused, normal),
        LoginField::Password => (normal, focused),
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("Username: ", user_style),
            Span::raw(app.login.username.as_str()),
        ]),
        Line::from(vec![
            Span::styled("Password: ", pass_style),
            Span::raw("•".repeat(app.login.password.chars().count())),
        ]),
        Line::from(""),
    ];

    if let Some(err) = &app.login.error {
        lines.push(Line::from(Span::styled(
            err.as_str(),
            Style::default().fg(Color::Red),
        )));
    } else if app.config.auth.users.is_empty() {
        lines.push(Line::from(Span::styled(
            "No users configured in [[auth.users]]",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab switch field  Enter sign in  Ctrl-C quit",
        Style::default().fg(Color::DarkGray),
    )));

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} sign in ", app.config.project_name)),
    );
    f.render_widget(form, area);
}

fn render_edit(f: &mut Frame, app: &App) {
    let Some(edit) = &app.edit else {
        return;
    };
    let Some(draft) = app.editor.draft(&edit.task_id) else {
        return;
    };
    let title = app
        .store
        .get(&edit.task_id)
        .map(|t| t.title.as_str())
        .unwrap_or_default();

    let area = centered_rect(60, 50, f.area());
    f.render_widget(Clear, area);

    let focused = Style::default().fg(Color::Yellow);
    let label = |field: EditField| {
        if edit.field == field {
            focused
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let mut lines = vec![
        Line::from(Span::styled(
            truncate(title, 50),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("Status", label(EditField::Status))),
    ];
    for (i, status) in Status::ALL.iter().enumerate() {
        let selected = *status == draft.status;
        let marker = if selected { "▶" } else { " " };
        let mut style = Style::default().fg(status_color(*status));
        if selected {
            style = style.add_modifier(Modifier::BOLD);
        }
        lines.push(Line::from(vec![
            Span::raw(format!(" {} {} ", marker, i + 1)),
            Span::styled(status.label(), style),
            Span::styled(
                format!("  {}%", status.progress()),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Comment", label(EditField::Comment))));
    let cursor = if edit.field == EditField::Comment { "█" } else { "" };
    lines.push(Line::from(format!(" {}{}", draft.comment, cursor)));

    if let Some(err) = &draft.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Last attempt failed: {}", err),
            Style::default().fg(Color::Red),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "↑/↓ or 1-5 status  Tab comment  Enter save  Esc cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let form = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Edit {} ", edit.task_id)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(form, area);
}

fn render_filter_menu(f: &mut Frame, kind: FilterKind) {
    let (title, options): (&str, Vec<&str>) = match kind {
        FilterKind::Status => (
            " Filter by status ",
            Status::ALL.iter().map(|s| s.label()).collect(),
        ),
        FilterKind::Priority => (
            " Filter by priority ",
            Priority::ALL.iter().map(|p| p.label()).collect(),
        ),
    };

    let mut spans = vec![
        Span::styled("0", Style::default().fg(Color::Yellow)),
        Span::raw(" all  "),
    ];
    for (i, option) in options.iter().enumerate() {
        spans.push(Span::styled(
            format!("{}", i + 1),
            Style::default().fg(Color::Yellow),
        ));
        spans.push(Span::raw(format!(" {}  ", option)));
    }

    let area = f.area();
    let popup = Rect {
        x: area.x,
        y: area.height.saturating_sub(4),
        width: area.width,
        height: 3.min(area.height),
    };
    f.render_widget(Clear, popup);
    let menu = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(menu, popup);
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);

    let entries = [
        ("j/k ↑/↓", "Move selection"),
        ("gg / G", "First / last task"),
        ("Ctrl-d/u", "Page down / up"),
        ("e, Enter", "Edit status of selected task"),
        ("/", "Search title, description, ID"),
        ("s / p", "Filter by status / priority"),
        ("c", "Clear filters"),
        ("R", "Reload tasks"),
        ("r", "Check sync status now"),
        ("S", "Trigger manual sync"),
        ("x", "Close sync notification"),
        ("L", "Log out"),
        ("q", "Quit"),
    ];
    let lines: Vec<Line> = entries
        .iter()
        .map(|(key, desc)| {
            Line::from(vec![
                Span::styled(format!("{:<12}", key), Style::default().fg(Color::Yellow)),
                Span::raw(*desc),
            ])
        })
        .collect();

    let help = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Help "));
    f.render_widget(help, area);
}

fn render_notification(f: &mut Frame, app: &App) {
    let Some(notification) = &app.sync.notification else {
        return;
    };
    let area = f.area();
    let width = 50.min(area.width);
    let popup = Rect {
        x: area.width.saturating_sub(width + 1),
        y: 1,
        width,
        height: 3.min(area.height),
    };
    f.render_widget(Clear, popup);

    let record = &notification.record;
    let text = Line::from(vec![
        Span::styled("✓ Content synced ", Style::default().fg(Color::Green)),
        Span::styled(record.short_sha(), Style::default().fg(Color::Cyan)),
        Span::raw(" "),
        Span::raw(truncate(&record.commit_message, 30)),
    ]);
    let banner = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title_bottom(Line::from(" x close ").alignment(Alignment::Right)),
    );
    f.render_widget(banner, popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
