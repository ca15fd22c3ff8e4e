//! Cell grid to pixels.

use std::io::Cursor;

use font8x8::{
    UnicodeFonts, BASIC_FONTS, BLOCK_FONTS, BOX_FONTS, GREEK_FONTS, HIRAGANA_FONTS, LATIN_FONTS,
    MISC_FONTS,
};
use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use crate::convert::parse::{Cell, CellColor, CellStyle, Grid};
use crate::convert::RenderConfig;
use crate::utils::color::xterm256_to_rgb;

/// Largest width or height, in pixels, we will allocate.
pub const MAX_DIMENSION: u32 = 16384;

const GLYPH_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("image of {width}x{height} pixels exceeds the {MAX_DIMENSION} pixel limit")]
    TooLarge { width: u64, height: u64 },
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

type Pixel = (u8, u8, u8);

/// Draw `grid` and encode it as PNG.
pub fn rasterize(grid: &Grid, config: &RenderConfig) -> Result<Vec<u8>, RasterError> {
    let image = draw(grid, config)?;
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn draw(grid: &Grid, config: &RenderConfig) -> Result<RgbImage, RasterError> {
    // Geometry is sized in u64 so oversized configs fail the limit check
    // instead of wrapping.
    let scale = u64::from(config.scale);
    let cell_width = u64::from(GLYPH_SIZE) * scale;
    let cell_height = u64::from(config.line_height) * scale;
    let padding = u64::from(config.padding) * scale;

    let columns = grid.columns().max(config.min_columns).max(1) as u64;
    let rows = grid.rows.len().max(1) as u64;
    let width = columns
        .saturating_mul(cell_width)
        .saturating_add(padding.saturating_mul(2));
    let height = rows
        .saturating_mul(cell_height)
        .saturating_add(padding.saturating_mul(2));
    if width > u64::from(MAX_DIMENSION) || height > u64::from(MAX_DIMENSION) {
        return Err(RasterError::TooLarge { width, height });
    }
    let (scale, cell_width, cell_height, padding) = (
        config.scale,
        cell_width as u32,
        cell_height as u32,
        padding as u32,
    );

    let mut canvas = Canvas {
        image: RgbImage::from_pixel(
            width as u32,
            height as u32,
            to_rgb(to_pixel(config.background)),
        ),
        config,
        scale,
    };

    for (row_index, row) in grid.rows.iter().enumerate() {
        let y = padding + row_index as u32 * cell_height;
        for (column, cell) in row.iter().enumerate() {
            let x = padding + column as u32 * cell_width;
            canvas.draw_cell(cell, x, y);
        }
    }

    Ok(canvas.image)
}

struct Canvas<'a> {
    image: RgbImage,
    config: &'a RenderConfig,
    scale: u32,
}

impl Canvas<'_> {
    fn draw_cell(&mut self, cell: &Cell, x: u32, y: u32) {
        if cell.width == 0 {
            return;
        }
        let (fg, bg) = self.resolve_colors(&cell.style);
        let columns = u32::from(cell.width);
        let cell_width = GLYPH_SIZE * self.scale * columns;
        let cell_height = self.config.line_height * self.scale;

        if bg != to_pixel(self.config.background) {
            self.fill(x, y, cell_width, cell_height, bg);
        }

        // Center the 8-pixel glyph vertically in the line.
        let glyph_y = y + self.config.line_height.saturating_sub(GLYPH_SIZE) / 2 * self.scale;
        if let Some(rows) = glyph(cell.ch) {
            self.draw_glyph(&rows, x, glyph_y, columns, &cell.style, fg);
        }

        if cell.style.underline {
            let line_y = glyph_y + (GLYPH_SIZE - 1) * self.scale;
            self.fill(x, line_y, cell_width, self.scale, fg);
        }
        if cell.style.strikethrough {
            let line_y = glyph_y + GLYPH_SIZE / 2 * self.scale;
            self.fill(x, line_y, cell_width, self.scale, fg);
        }
    }

    /// `columns` stretches the glyph horizontally for wide characters.
    fn draw_glyph(
        &mut self,
        rows: &[u8; 8],
        x: u32,
        y: u32,
        columns: u32,
        style: &CellStyle,
        fg: Pixel,
    ) {
        let dot = self.scale * columns;
        for (row, bits) in rows.iter().enumerate() {
            // Italic leans the top half one dot to the right.
            let lean = if style.italic && row < 4 { dot } else { 0 };
            for bit in 0..GLYPH_SIZE {
                if bits & (1 << bit) == 0 {
                    continue;
                }
                let px = x + bit * dot + lean;
                let py = y + row as u32 * self.scale;
                self.fill(px, py, dot, self.scale, fg);
                if style.bold {
                    self.fill(px + self.scale, py, dot, self.scale, fg);
                }
            }
        }
    }

    fn resolve_colors(&self, style: &CellStyle) -> (Pixel, Pixel) {
        let mut fg = resolve(style.fg, to_pixel(self.config.foreground));
        let mut bg = resolve(style.bg, to_pixel(self.config.background));
        if style.inverse {
            std::mem::swap(&mut fg, &mut bg);
        }
        if style.dim {
            fg = blend(fg, bg);
        }
        (fg, bg)
    }

    /// Fill a rectangle, clipped to the image.
    fn fill(&mut self, x: u32, y: u32, width: u32, height: u32, color: Pixel) {
        let right = (x + width).min(self.image.width());
        let bottom = (y + height).min(self.image.height());
        for py in y..bottom {
            for px in x..right {
                self.image.put_pixel(px, py, to_rgb(color));
            }
        }
    }
}

fn resolve(color: CellColor, default: Pixel) -> Pixel {
    match color {
        CellColor::Default => default,
        CellColor::Indexed(i) => xterm256_to_rgb(i),
        CellColor::Rgb(r, g, b) => (r, g, b),
    }
}

fn blend(a: Pixel, b: Pixel) -> Pixel {
    let mix = |x: u8, y: u8| ((u16::from(x) + u16::from(y)) / 2) as u8;
    (mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

fn to_pixel(rgb: [u8; 3]) -> Pixel {
    (rgb[0], rgb[1], rgb[2])
}

fn to_rgb((r, g, b): Pixel) -> Rgb<u8> {
    Rgb([r, g, b])
}

/// Bitmap for `ch`: one byte per row, least significant bit leftmost.
/// Unknown printable characters draw as `?`; spaces draw nothing.
fn glyph(ch: char) -> Option<[u8; 8]> {
    if ch == ' ' {
        return None;
    }
    if let Some(rows) = braille(ch) {
        return Some(rows);
    }
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BOX_FONTS.get(ch))
        .or_else(|| BLOCK_FONTS.get(ch))
        .or_else(|| GREEK_FONTS.get(ch))
        .or_else(|| HIRAGANA_FONTS.get(ch))
        .or_else(|| MISC_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
}

/// Braille patterns are built from their dot bits: a 2x4 dot matrix where
/// each dot is a 2x2 block.
fn braille(ch: char) -> Option<[u8; 8]> {
    let code = u32::from(ch);
    if !(0x2800..=0x28ff).contains(&code) {
        return None;
    }
    let dots = (code - 0x2800) as u8;

    // (bit, column, row) in the dot matrix.
    const LAYOUT: [(u8, u8, usize); 8] = [
        (0, 0, 0),
        (1, 0, 1),
        (2, 0, 2),
        (3, 1, 0),
        (4, 1, 1),
        (5, 1, 2),
        (6, 0, 3),
        (7, 1, 3),
    ];

    let mut rows = [0u8; 8];
    for (bit, column, row) in LAYOUT {
        if dots & (1 << bit) != 0 {
            let mask = 0b11u8 << (column * 4 + 1);
            rows[row * 2] |= mask;
            rows[row * 2 + 1] |= mask;
        }
    }
    Some(rows)
}
