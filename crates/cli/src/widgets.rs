use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use plugwatch_core::io::notice::NoticeLevel;
use plugwatch_core::types::NotificationKind;

use crate::tui::{App, ContactField, Form, LineInput};

const HELP: &str = " a agregar  d eliminar  e plantilla corte  r plantilla conexión  t prueba  q cola  Ctrl+C salir";

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(4),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_delay(f, app, chunks[1]);
    draw_templates(f, app, chunks[2]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[3]);
    draw_contacts(f, app, body[0]);
    draw_notices(f, app, body[1]);

    draw_status(f, app, chunks[4]);

    if let Some(form) = &app.form {
        draw_form(f, form, f.area());
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let (state, color) = match app.status.plugged {
        Some(true) => ("Conectado", Color::Green),
        Some(false) => ("Desconectado", Color::Red),
        None => ("Leyendo...", Color::DarkGray),
    };
    let line = Line::from(vec![
        Span::styled(" Detector de Carga ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(state, Style::default().fg(color)),
        Span::raw(format!(" | SMS programados: {}", app.status.pending)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn draw_delay(f: &mut Frame, app: &App, area: Rect) {
    let text = format!(" Los SMS se envían {} s después de cada cambio de carga", app.delay_secs);
    f.render_widget(Paragraph::new(text).dim(), area);
}

fn draw_templates(f: &mut Frame, app: &App, area: Rect) {
    let lines = vec![
        Line::from(vec![
            Span::styled("Desconexión: ", Style::default().fg(Color::Yellow)),
            Span::raw(app.templates.get(NotificationKind::Disconnect)),
            Span::raw("<hora>").dim(),
        ]),
        Line::from(vec![
            Span::styled("Conexión:    ", Style::default().fg(Color::Yellow)),
            Span::raw(app.templates.get(NotificationKind::Connect)),
            Span::raw("<hora>").dim(),
        ]),
    ];
    let block = Block::default().borders(Borders::ALL).title(" Mensajes ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_contacts(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = if app.contacts.is_empty() {
        vec![Line::from(Span::raw("Sin contactos (a para agregar)").dim())]
    } else {
        app.contacts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let text = format!("{}. {} - {}", i + 1, c.name, c.address);
                if i == app.selected {
                    Line::from(Span::styled(text, Style::default().add_modifier(Modifier::REVERSED)))
                } else {
                    Line::from(text)
                }
            })
            .collect()
    };

    // Keep the selection visible.
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = app.selected.saturating_sub(visible.saturating_sub(1));

    let title = format!(" Contactos ({}) ", app.contacts.len());
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(
        Paragraph::new(lines).block(block).scroll((scroll as u16, 0)),
        area,
    );
}

fn draw_notices(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .notices
        .iter()
        .flat_map(|n| {
            let color = match n.level {
                NoticeLevel::Info => Color::Reset,
                NoticeLevel::Warn => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            let stamp = n.at.with_timezone(&Local).format("%H:%M:%S").to_string();
            // Multi-line notices (the queue report) keep their own rows.
            n.content.lines().enumerate().map(move |(i, text)| {
                let prefix = if i == 0 { format!("{stamp} ") } else { " ".repeat(stamp.len() + 1) };
                Line::from(vec![
                    Span::raw(prefix).dim(),
                    Span::styled(text.to_owned(), Style::default().fg(color)),
                ])
            })
        })
        .collect();

    let inner_w = area.width.saturating_sub(2) as usize;
    let wrapped_total: u16 = lines.iter().map(|l| wrapped_line_count(l, inner_w)).sum();
    let visible = area.height.saturating_sub(2);
    let scroll = wrapped_total.saturating_sub(visible);

    let block = Block::default().borders(Borders::ALL).title(" Avisos ");
    let para = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(para, area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let text = format!(
        " contactos {}  |  muestras {}  |  sms {}  |{HELP}",
        app.status.contacts, app.status.samples, app.gateway
    );
    let para = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(para, area);
}

fn draw_form(f: &mut Frame, form: &Form, screen: Rect) {
    let (title, fields, focus_row): (&str, Vec<(&str, &LineInput)>, usize) = match form {
        Form::Contact { name, phone, focus } => (
            " Nuevo contacto (Tab cambia campo, Enter guarda, Esc cancela) ",
            vec![("Nombre:   ", name), ("Teléfono: ", phone)],
            match focus {
                ContactField::Name => 0,
                ContactField::Phone => 1,
            },
        ),
        Form::Template { kind, input } => (
            match kind {
                NotificationKind::Disconnect => " Mensaje de desconexión (Enter guarda, Esc cancela) ",
                NotificationKind::Connect => " Mensaje de conexión (Enter guarda, Esc cancela) ",
            },
            vec![("Texto: ", input)],
            0,
        ),
    };

    let height = fields.len() as u16 + 2;
    let width = screen.width.saturating_sub(8).max(20).min(screen.width);
    let area = Rect {
        x: screen.x + (screen.width - width) / 2,
        y: screen.y + screen.height.saturating_sub(height) / 2,
        width,
        height: height.min(screen.height),
    };

    let lines: Vec<Line> = fields
        .iter()
        .map(|(label, input)| {
            Line::from(vec![
                Span::styled(*label, Style::default().fg(Color::Yellow)),
                Span::raw(input.text.as_str()),
            ])
        })
        .collect();

    f.render_widget(Clear, area);
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(Paragraph::new(lines).block(block), area);

    let (label, input) = fields[focus_row];
    let col = label.width() + input.text[..input.cursor].width();
    let max_col = area.width.saturating_sub(3) as usize;
    f.set_cursor_position(Position::new(
        area.x + 1 + col.min(max_col) as u16,
        area.y + 1 + focus_row as u16,
    ));
}

/// How many visual rows a Line occupies when wrapped to `width` columns.
fn wrapped_line_count(line: &Line, width: usize) -> u16 {
    if width == 0 {
        return 1;
    }
    let full: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
    greedy_wrap_rows(&full, width)
}

/// Count visual rows for a single unwrapped string using greedy wrap.
fn greedy_wrap_rows(s: &str, width: usize) -> u16 {
    if width == 0 {
        return 1;
    }
    let mut rows: u16 = 1;
    let mut col: usize = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if cw == 0 {
            continue;
        }
        if col + cw > width {
            rows += 1;
            col = cw;
        } else {
            col += cw;
        }
    }
    rows
}
