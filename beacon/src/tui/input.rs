//! Terminal event decoding into navigator messages.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::page::Key;
use crate::navigator::{Msg, Size};

/// Map a terminal event to a message; unhandled events yield `None`.
pub fn map_event(event: Event) -> Option<Msg> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => map_key(key),
        Event::Resize(width, height) => Some(Msg::Resize(Size { width, height })),
        _ => None,
    }
}

fn map_key(key: KeyEvent) -> Option<Msg> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let mapped = match key.code {
        KeyCode::Char('c') if ctrl => return Some(Msg::Exit),
        KeyCode::Char('r') if ctrl => Key::Reload,
        KeyCode::Char('e') if ctrl => Key::EditExtension,
        // alt+1..9 picks the n-th action of the selection.
        KeyCode::Char(c @ '1'..='9') if alt => {
            Key::ActionIndex(c.to_digit(10)? as usize - 1)
        }
        KeyCode::Char(_) if ctrl || alt => return None,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Escape,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        _ => return None,
    };
    Some(Msg::Key(mapped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    fn key(event: Event) -> Option<Key> {
        match map_event(event) {
            Some(Msg::Key(key)) => Some(key),
            _ => None,
        }
    }

    #[test]
    fn plain_characters_are_forwarded() {
        assert_eq!(
            key(press(KeyCode::Char('x'), KeyModifiers::NONE)),
            Some(Key::Char('x'))
        );
        assert_eq!(
            key(press(KeyCode::Char('X'), KeyModifiers::SHIFT)),
            Some(Key::Char('X'))
        );
    }

    #[test]
    fn ctrl_c_exits_and_ctrl_r_reloads() {
        assert!(matches!(
            map_event(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Msg::Exit)
        ));
        assert_eq!(
            key(press(KeyCode::Char('r'), KeyModifiers::CONTROL)),
            Some(Key::Reload)
        );
    }

    #[test]
    fn ctrl_e_edits_extension() {
        assert_eq!(
            key(press(KeyCode::Char('e'), KeyModifiers::CONTROL)),
            Some(Key::EditExtension)
        );
        assert_eq!(
            key(press(KeyCode::Char('e'), KeyModifiers::NONE)),
            Some(Key::Char('e'))
        );
    }

    #[test]
    fn alt_digit_selects_action_index() {
        assert_eq!(
            key(press(KeyCode::Char('2'), KeyModifiers::ALT)),
            Some(Key::ActionIndex(1))
        );
        assert_eq!(key(press(KeyCode::Char('z'), KeyModifiers::ALT)), None);
    }

    #[test]
    fn resize_is_propagated() {
        assert!(matches!(
            map_event(Event::Resize(100, 30)),
            Some(Msg::Resize(Size {
                width: 100,
                height: 30
            }))
        ));
    }

    #[test]
    fn key_release_is_ignored() {
        let mut release = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(map_event(Event::Key(release)).is_none());
    }
}
