use ratatui::buffer::Buffer;
use ratatui::style::{Color, Modifier};
use unicode_width::UnicodeWidthStr;

use crate::utils::color::sgr_color_params;

/// Serialize a rendered buffer as SGR-styled text, one line per row.
///
/// Escape codes are only written when the style changes, and every line
/// ends with a reset so rows can be read independently.
pub fn buffer_to_ansi(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut out = String::new();

    for y in area.top()..area.bottom() {
        let mut current: Option<(Color, Color, Modifier)> = None;
        let mut covered = 0usize;
        for x in area.left()..area.right() {
            // Columns hidden behind the previous wide symbol.
            if covered > 0 {
                covered -= 1;
                continue;
            }
            let cell = &buffer[(x, y)];
            if cell.skip {
                continue;
            }
            covered = cell.symbol().width().saturating_sub(1);
            let style = (cell.fg, cell.bg, cell.modifier);
            if current != Some(style) {
                out.push_str(&sgr(cell.fg, cell.bg, cell.modifier));
                current = Some(style);
            }
            out.push_str(cell.symbol());
        }
        out.push_str("\x1b[0m");
        if y + 1 < area.bottom() {
            out.push('\n');
        }
    }
    out
}

fn sgr(fg: Color, bg: Color, modifier: Modifier) -> String {
    let mut params = vec!["0".to_string()];
    for (flag, code) in [
        (Modifier::BOLD, "1"),
        (Modifier::DIM, "2"),
        (Modifier::ITALIC, "3"),
        (Modifier::UNDERLINED, "4"),
        (Modifier::REVERSED, "7"),
        (Modifier::CROSSED_OUT, "9"),
    ] {
        if modifier.contains(flag) {
            params.push(code.to_string());
        }
    }
    if fg != Color::Reset {
        params.push(sgr_color_params(fg, true));
    }
    if bg != Color::Reset {
        params.push(sgr_color_params(bg, false));
    }
    format!("\x1b[{}m", params.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::layout::Rect;
    use ratatui::style::Style;

    #[test]
    fn styles_are_emitted_on_change() {
        let mut buffer = Buffer::empty(Rect::new(0, 0, 4, 2));
        buffer.set_string(0, 0, "ab", Style::default().fg(Color::Red));
        buffer.set_string(2, 0, "c", Style::default().add_modifier(Modifier::BOLD));
        buffer.set_string(0, 1, "xy", Style::default().bg(Color::Indexed(17)));

        assert_eq!(
            buffer_to_ansi(&buffer),
            "\x1b[0;31mab\x1b[0;1mc\x1b[0m \x1b[0m\n\x1b[0;48;5;17mxy\x1b[0m  \x1b[0m"
        );
    }

    #[test]
    fn wide_characters_are_written_once() {
        let mut buffer = Buffer::empty(Rect::new(0, 0, 3, 1));
        buffer.set_string(0, 0, "日", Style::default());
        assert_eq!(buffer_to_ansi(&buffer), "\x1b[0m日 \x1b[0m");
    }

    #[test]
    fn output_round_trips_through_the_converter() {
        let mut buffer = Buffer::empty(Rect::new(0, 0, 5, 1));
        buffer.set_string(0, 0, "chart", Style::default().fg(Color::Rgb(1, 2, 3)));
        let text = buffer_to_ansi(&buffer);
        assert!(crate::convert::convert_terminal_text_to_image(&text, None).is_ok());
    }
}
