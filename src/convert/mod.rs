//! Styled terminal text to PNG.
//!
//! [`convert_terminal_text_to_image`] parses ANSI SGR styling into a cell
//! grid and draws each cell with an 8x8 bitmap font. The same text and
//! configuration always produce the same bytes.

pub mod parse;
pub mod raster;

use thiserror::Error;
use tracing::debug;

pub use parse::ParseError;
pub use raster::RasterError;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid render config: {0}")]
    InvalidConfig(String),
    #[error("failed to parse terminal text: {0}")]
    Parse(#[from] ParseError),
    #[error("failed to rasterize terminal text: {0}")]
    Rasterize(#[from] RasterError),
}

/// How terminal text is laid out in pixels. Lengths are in font pixels and
/// multiplied by `scale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Integer zoom, 1 through 8.
    pub scale: u32,
    /// Height of one text row; at least the 8-pixel glyph height.
    pub line_height: u32,
    /// Border around the text.
    pub padding: u32,
    pub tab_width: usize,
    /// Pad narrower output to this many columns.
    pub min_columns: usize,
    pub foreground: [u8; 3],
    pub background: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: 2,
            line_height: 10,
            padding: 4,
            tab_width: 8,
            min_columns: 0,
            foreground: [229, 229, 229],
            background: [0, 0, 0],
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(1..=8).contains(&self.scale) {
            return Err(ConvertError::InvalidConfig(format!(
                "scale must be between 1 and 8, got {}",
                self.scale
            )));
        }
        if self.line_height < 8 {
            return Err(ConvertError::InvalidConfig(format!(
                "line height must be at least 8, got {}",
                self.line_height
            )));
        }
        if self.line_height > raster::MAX_DIMENSION {
            return Err(ConvertError::InvalidConfig(format!(
                "line height must be at most {}, got {}",
                raster::MAX_DIMENSION,
                self.line_height
            )));
        }
        if self.padding > raster::MAX_DIMENSION {
            return Err(ConvertError::InvalidConfig(format!(
                "padding must be at most {}, got {}",
                raster::MAX_DIMENSION,
                self.padding
            )));
        }
        if self.tab_width == 0 {
            return Err(ConvertError::InvalidConfig(
                "tab width must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Render `text` as a PNG, using [`RenderConfig::default`] when no config is
/// given.
pub fn convert_terminal_text_to_image(
    text: &str,
    config: Option<&RenderConfig>,
) -> Result<Vec<u8>, ConvertError> {
    let default_config;
    let config = match config {
        Some(config) => config,
        None => {
            default_config = RenderConfig::default();
            &default_config
        }
    };
    config.validate()?;

    let grid = parse::parse(text, config.tab_width)?;
    let png = raster::rasterize(&grid, config)?;
    debug!(
        rows = grid.rows.len(),
        columns = grid.columns(),
        bytes = png.len(),
        "rendered terminal text"
    );
    Ok(png)
}
