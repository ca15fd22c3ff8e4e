use unicode_width::UnicodeWidthStr;

/// Scroll arithmetic for word-wrapped plain text.
pub struct ScrollCalculator;

impl ScrollCalculator {
    /// Visual rows `text` occupies when word-wrapped to `width` columns.
    /// Every source line takes at least one row.
    pub fn wrapped_line_count(text: &str, width: u16) -> u16 {
        text.split('\n')
            .map(|line| Self::word_wrapped_rows(line, width))
            .fold(0u16, u16::saturating_add)
    }

    /// Offset that shows the last `visible_rows` rows.
    pub fn scroll_to_bottom(text: &str, width: u16, visible_rows: u16) -> u16 {
        Self::wrapped_line_count(text, width).saturating_sub(visible_rows)
    }

    fn word_wrapped_rows(line: &str, width: u16) -> u16 {
        let width = width as usize;
        if width == 0 {
            return 1;
        }

        let mut rows: u16 = 1;
        let trimmed = line.trim_start_matches(' ');
        let leading = line.len() - trimmed.len();
        let mut current = if leading >= width {
            rows = rows.saturating_add((leading / width) as u16);
            leading % width
        } else {
            leading
        };

        for word in trimmed.split_whitespace() {
            let mut word_len = UnicodeWidthStr::width(word);

            if current > 0 {
                if current + 1 > width {
                    rows = rows.saturating_add(1);
                    current = 0;
                } else {
                    current += 1;
                }
            }

            // Overlong words are broken across rows.
            loop {
                let space_left = width.saturating_sub(current);
                if word_len <= space_left {
                    current += word_len;
                    break;
                }
                word_len -= space_left;
                rows = rows.saturating_add(1);
                current = 0;
            }
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_fits_one_row() {
        assert_eq!(ScrollCalculator::wrapped_line_count("Hello world", 20), 1);
        assert_eq!(ScrollCalculator::wrapped_line_count("Hello world test", 16), 1);
    }

    #[test]
    fn long_text_wraps_at_words() {
        let text = "This is a very long sentence that will definitely need to wrap";
        assert_eq!(ScrollCalculator::wrapped_line_count(text, 20), 4);
    }

    #[test]
    fn overlong_word_is_broken() {
        assert_eq!(
            ScrollCalculator::wrapped_line_count("supercalifragilisticexpialidocious", 10),
            4
        );
    }

    #[test]
    fn blank_lines_count_as_rows() {
        assert_eq!(ScrollCalculator::wrapped_line_count("a\n\nb", 10), 3);
        assert_eq!(ScrollCalculator::wrapped_line_count("", 10), 1);
        assert_eq!(ScrollCalculator::wrapped_line_count("anything", 0), 1);
    }

    #[test]
    fn scroll_to_bottom_only_when_overflowing() {
        assert_eq!(ScrollCalculator::scroll_to_bottom("a\nb", 10, 5), 0);
        assert_eq!(ScrollCalculator::scroll_to_bottom("a\nb\nc\nd", 10, 2), 2);
    }
}
