//! Terminal text to a grid of styled cells.
//!
//! Only SGR (`ESC [ ... m`) changes how text looks. Other CSI sequences and
//! OSC strings are consumed and dropped.

use thiserror::Error;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("escape sequence at byte {offset} is truncated")]
    Truncated { offset: usize },
    #[error("invalid SGR parameter {param:?} at byte {offset}")]
    InvalidSgr { offset: usize, param: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellColor {
    #[default]
    Default,
    /// xterm 256-color palette entry; 0..16 are the ANSI colors.
    Indexed(u8),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub fg: CellColor,
    pub bg: CellColor,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub inverse: bool,
    pub strikethrough: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: CellStyle,
    /// Columns the character covers: 1, 2 for wide characters, 0 for the
    /// column a wide character spills into.
    pub width: u8,
}

impl Cell {
    fn blank(style: CellStyle) -> Self {
        Self {
            ch: ' ',
            style,
            width: 1,
        }
    }

    fn continuation(style: CellStyle) -> Self {
        Self {
            ch: ' ',
            style,
            width: 0,
        }
    }
}

/// Rows of cells. Rows may differ in length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }
}

struct Cursor {
    rows: Vec<Vec<Cell>>,
    column: usize,
    style: CellStyle,
}

impl Cursor {
    fn new() -> Self {
        Self {
            rows: vec![Vec::new()],
            column: 0,
            style: CellStyle::default(),
        }
    }

    fn row(&mut self) -> &mut Vec<Cell> {
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    fn put(&mut self, cell: Cell) {
        let column = self.column;
        let row = self.row();
        if row.len() <= column {
            row.resize(column, Cell::blank(CellStyle::default()));
            row.push(cell);
        } else {
            row[column] = cell;
        }
        self.column += 1;
    }

    fn write(&mut self, ch: char) {
        match ch.width() {
            Some(0) | None => {}
            Some(2) => {
                self.put(Cell {
                    ch,
                    style: self.style,
                    width: 2,
                });
                self.put(Cell::continuation(self.style));
            }
            Some(_) => self.put(Cell {
                ch,
                style: self.style,
                width: 1,
            }),
        }
    }

    fn tab(&mut self, tab_width: usize) {
        let next = (self.column / tab_width + 1) * tab_width;
        while self.column < next {
            self.put(Cell::blank(self.style));
        }
    }

    fn newline(&mut self) {
        self.rows.push(Vec::new());
        self.column = 0;
    }
}

/// Parse `text` into cells, expanding tabs to multiples of `tab_width`.
pub fn parse(text: &str, tab_width: usize) -> Result<Grid, ParseError> {
    let tab_width = tab_width.max(1);
    let mut cursor = Cursor::new();
    let mut chars = text.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\x1b' => {
                let Some((_, kind)) = chars.next() else {
                    return Err(ParseError::Truncated { offset });
                };
                match kind {
                    '[' => {
                        let mut params = String::new();
                        let final_byte = loop {
                            match chars.next() {
                                Some((_, c)) if ('\x40'..='\x7e').contains(&c) => break c,
                                Some((_, c)) => params.push(c),
                                None => return Err(ParseError::Truncated { offset }),
                            }
                        };
                        if final_byte == 'm' {
                            apply_sgr(&mut cursor.style, &params, offset)?;
                        }
                    }
                    ']' => loop {
                        match chars.next() {
                            Some((_, '\x07')) => break,
                            Some((_, '\x1b')) if matches!(chars.peek(), Some((_, '\\'))) => {
                                chars.next();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(ParseError::Truncated { offset }),
                        }
                    },
                    // Two-character escapes such as charset selection.
                    _ => {}
                }
            }
            '\n' => cursor.newline(),
            '\r' => cursor.column = 0,
            '\t' => cursor.tab(tab_width),
            c if c.is_control() => {}
            c => cursor.write(c),
        }
    }

    // A trailing newline does not open another row.
    if cursor.rows.len() > 1 && text.ends_with('\n') {
        cursor.rows.pop();
    }

    Ok(Grid { rows: cursor.rows })
}

fn apply_sgr(style: &mut CellStyle, params: &str, offset: usize) -> Result<(), ParseError> {
    let codes = params
        .split(';')
        .map(|param| {
            if param.is_empty() {
                Ok(0)
            } else {
                param.parse::<u16>().map_err(|_| ParseError::InvalidSgr {
                    offset,
                    param: param.to_string(),
                })
            }
        })
        .collect::<Result<Vec<u16>, ParseError>>()?;

    let mut idx = 0;
    while idx < codes.len() {
        let code = codes[idx];
        match code {
            0 => *style = CellStyle::default(),
            1 => style.bold = true,
            2 => style.dim = true,
            3 => style.italic = true,
            4 => style.underline = true,
            7 => style.inverse = true,
            9 => style.strikethrough = true,
            22 => {
                style.bold = false;
                style.dim = false;
            }
            23 => style.italic = false,
            24 => style.underline = false,
            27 => style.inverse = false,
            29 => style.strikethrough = false,
            30..=37 => style.fg = CellColor::Indexed((code - 30) as u8),
            39 => style.fg = CellColor::Default,
            40..=47 => style.bg = CellColor::Indexed((code - 40) as u8),
            49 => style.bg = CellColor::Default,
            90..=97 => style.fg = CellColor::Indexed((code - 90 + 8) as u8),
            100..=107 => style.bg = CellColor::Indexed((code - 100 + 8) as u8),
            38 | 48 => {
                let (color, used) = extended_color(&codes[idx + 1..], offset)?;
                if code == 38 {
                    style.fg = color;
                } else {
                    style.bg = color;
                }
                idx += used;
            }
            // Blink, hidden, fonts and the like have no pixels to change.
            _ => {}
        }
        idx += 1;
    }
    Ok(())
}

/// `5;n` or `2;r;g;b` following a 38/48. Returns the color and how many
/// parameters it consumed.
fn extended_color(rest: &[u16], offset: usize) -> Result<(CellColor, usize), ParseError> {
    let invalid = |param: String| ParseError::InvalidSgr { offset, param };
    let channel = |value: u16| u8::try_from(value).map_err(|_| invalid(value.to_string()));

    match rest {
        [5, n, ..] => Ok((CellColor::Indexed(channel(*n)?), 2)),
        [2, r, g, b, ..] => Ok((
            CellColor::Rgb(channel(*r)?, channel(*g)?, channel(*b)?),
            4,
        )),
        [mode, ..] if *mode != 5 && *mode != 2 => Err(invalid(mode.to_string())),
        _ => Err(invalid(
            rest.iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(";"),
        )),
    }
}
