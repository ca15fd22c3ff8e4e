use ratatui::style::Color;

/// Palette index of a named ratatui color. `Reset`, `Rgb` and `Indexed`
/// have none.
fn named_index(color: Color) -> Option<u8> {
    let index = match color {
        Color::Black => 0,
        Color::Red => 1,
        Color::Green => 2,
        Color::Yellow => 3,
        Color::Blue => 4,
        Color::Magenta => 5,
        Color::Cyan => 6,
        Color::Gray => 7,
        Color::DarkGray => 8,
        Color::LightRed => 9,
        Color::LightGreen => 10,
        Color::LightYellow => 11,
        Color::LightBlue => 12,
        Color::LightMagenta => 13,
        Color::LightCyan => 14,
        Color::White => 15,
        _ => return None,
    };
    Some(index)
}

/// RGB for a ratatui color, or `None` for the terminal default.
pub fn color_to_rgb(color: Color) -> Option<(u8, u8, u8)> {
    match color {
        Color::Reset => None,
        Color::Rgb(r, g, b) => Some((r, g, b)),
        Color::Indexed(i) => Some(xterm256_to_rgb(i)),
        named => named_index(named).map(xterm256_to_rgb),
    }
}

/// SGR parameters selecting `color` as foreground or background, e.g. `31`,
/// `38;5;208` or `48;2;10;20;30`. `Reset` maps to the default color code.
pub fn sgr_color_params(color: Color, foreground: bool) -> String {
    let (base, bright_base, extended, default) = if foreground {
        (30, 90, 38, 39)
    } else {
        (40, 100, 48, 49)
    };

    match color {
        Color::Reset => default.to_string(),
        Color::Rgb(r, g, b) => format!("{extended};2;{r};{g};{b}"),
        Color::Indexed(i) => format!("{extended};5;{i}"),
        named => match named_index(named) {
            Some(i @ 0..=7) => (base + i as u16).to_string(),
            Some(i) => (bright_base + (i - 8) as u16).to_string(),
            None => default.to_string(),
        },
    }
}

fn xterm_cube_comp(i: u8) -> u8 {
    if i == 0 {
        0
    } else {
        55 + 40 * i
    }
}

pub fn xterm256_to_rgb(i: u8) -> (u8, u8, u8) {
    match i {
        0 => (0, 0, 0),
        1 => (205, 0, 0),
        2 => (0, 205, 0),
        3 => (205, 205, 0),
        4 => (0, 0, 205),
        5 => (205, 0, 205),
        6 => (0, 205, 205),
        7 => (229, 229, 229),
        8 => (127, 127, 127),
        9 => (255, 0, 0),
        10 => (0, 255, 0),
        11 => (255, 255, 0),
        12 => (92, 92, 255),
        13 => (255, 0, 255),
        14 => (0, 255, 255),
        15 => (255, 255, 255),
        16..=231 => {
            let mut n = i - 16;
            let r = n / 36;
            n %= 36;
            let g = n / 6;
            n %= 6;
            let b = n;
            (xterm_cube_comp(r), xterm_cube_comp(g), xterm_cube_comp(b))
        }
        232..=255 => {
            let v = 8 + 10 * (i - 232);
            (v, v, v)
        }
    }
}
