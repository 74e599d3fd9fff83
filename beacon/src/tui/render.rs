//! Drawing of the active page.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem as ListRow, ListState, Paragraph, Wrap};

use crate::core::action::Action;
use crate::core::page::{DetailPage, ErrorPage, FieldInput, FormPage, ListPage, Page};
use crate::navigator::{Frame as NavFrame, Source, View};

pub fn draw(frame: &mut Frame<'_>, view: View<'_>, busy: bool) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    frame.render_widget(Paragraph::new(breadcrumb(view, busy)), header);

    let Some(active) = view.frames.last() else {
        return;
    };
    let actions: &[Action] = match &active.page {
        Page::List(list) => {
            draw_list(frame, body, list);
            list.selected_item()
                .map_or(list.actions.as_slice(), |item| item.actions.as_slice())
        }
        Page::Detail(detail) => {
            draw_detail(frame, body, detail);
            detail.actions.as_slice()
        }
        Page::Form(form) => {
            draw_form(frame, body, form);
            &[]
        }
        Page::Error(error) => {
            draw_error(frame, body, error);
            &[]
        }
    };

    let footer_line = match view.notice {
        Some(notice) => Line::from(Span::styled(notice, Style::default().fg(Color::Yellow))),
        None => Line::from(Span::styled(
            action_hints(active, actions),
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(footer_line), footer);
}

fn breadcrumb(view: View<'_>, busy: bool) -> Line<'static> {
    let titles: Vec<&str> = view.frames.iter().map(|frame| frame.page.title()).collect();
    let mut spans = vec![Span::styled(
        titles.join(" > "),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if busy {
        spans.push(Span::styled(" (running)", Style::default().fg(Color::Cyan)));
    }
    Line::from(spans)
}

fn draw_list(frame: &mut Frame<'_>, area: Rect, list: &ListPage) {
    let [filter, rows] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);
    let prompt = if list.query.is_empty() {
        Span::styled("type to filter", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(format!("/{}", list.query))
    };
    frame.render_widget(Paragraph::new(Line::from(prompt)), filter);

    let visible = list.visible_items();
    if visible.is_empty() {
        let text = list.empty_text.as_deref().unwrap_or("No items");
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            rows,
        );
        return;
    }

    let items: Vec<ListRow<'_>> = visible
        .iter()
        .map(|item| {
            let mut spans = vec![Span::raw(item.title.clone())];
            if let Some(subtitle) = &item.subtitle {
                spans.push(Span::styled(
                    format!("  {subtitle}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            for accessory in &item.accessories {
                spans.push(Span::styled(
                    format!("  [{accessory}]"),
                    Style::default().fg(Color::Blue),
                ));
            }
            ListRow::new(Line::from(spans))
        })
        .collect();
    let mut state = ListState::default().with_selected(Some(list.selected));
    let widget = List::new(items)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    frame.render_stateful_widget(widget, rows, &mut state);
}

fn draw_detail(frame: &mut Frame<'_>, area: Rect, detail: &DetailPage) {
    let paragraph = Paragraph::new(detail.markdown.as_str())
        .wrap(Wrap { trim: false })
        .scroll((detail.scroll, 0));
    frame.render_widget(paragraph, area);
}

fn draw_form(frame: &mut Frame<'_>, area: Rect, form: &FormPage) {
    let mut lines = Vec::new();
    for (index, field) in form.fields.iter().enumerate() {
        let marker = if field.required { "*" } else { "" };
        let value = match &field.input {
            FieldInput::Text { value } | FieldInput::Number { value } => value.clone(),
            FieldInput::Checkbox { checked: true } => "[x]".to_string(),
            FieldInput::Checkbox { checked: false } => "[ ]".to_string(),
            FieldInput::Select { choices, selected } => choices
                .get(*selected)
                .map(|choice| format!("< {} >", choice.title))
                .unwrap_or_default(),
        };
        let style = if index == form.focus {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{}{marker}: ", field.title), style),
            Span::raw(value),
        ]));
        if let Some(description) = &field.description {
            lines.push(Line::from(Span::styled(
                format!("  {description}"),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    if let Some(error) = &form.error {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    let block = Block::default().borders(Borders::ALL).title(form.title.as_str());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_error(frame: &mut Frame<'_>, area: Rect, error: &ErrorPage) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Error")
        .border_style(Style::default().fg(Color::Red));
    frame.render_widget(
        Paragraph::new(error.message.as_str())
            .wrap(Wrap { trim: false })
            .block(block),
        area,
    );
}

fn action_hints(active: &NavFrame, actions: &[Action]) -> String {
    match &active.page {
        Page::Form(_) => "tab: next field  enter: submit  esc: cancel".to_string(),
        Page::Error(_) => "esc: back".to_string(),
        Page::List(_) | Page::Detail(_) => {
            let mut hints: Vec<String> = actions
                .iter()
                .enumerate()
                .map(|(index, action)| match index {
                    0 => format!("enter: {}", action.label()),
                    n => format!("alt+{}: {}", n + 1, action.label()),
                })
                .collect();
            hints.push("ctrl+r: reload".to_string());
            if active.source == Source::Home {
                hints.push("ctrl+e: edit extension".to_string());
            }
            hints.push("esc: back".to_string());
            hints.join("  ")
        }
    }
}
