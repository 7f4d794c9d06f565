//! Start and end banners around a capture relayed to the console.

use owo_colors::OwoColorize;
use tracing::warn;

use mockconf::BannerConfig;

use crate::context::{write_all, OutputStream};

/// Lay out `message` centred between two copies of `decoration`, padded to
/// `width` columns.
///
/// Lengths are counted in characters. When the message does not fit, no
/// padding is added and the line overflows.
pub fn render(message: &str, width: usize, decoration: &str, color: bool) -> String {
    let inner = width.saturating_sub(2 * decoration.chars().count());
    let gap = inner.saturating_sub(message.chars().count());
    let left = gap / 2;
    let right = gap - left;

    let line = format!(
        "{decoration}{}{message}{}{decoration}",
        " ".repeat(left),
        " ".repeat(right),
    );

    if color {
        format!("{}\n", line.reversed())
    } else {
        format!("{line}\n")
    }
}

pub(crate) fn write_start(stream: &dyn OutputStream, config: &BannerConfig) {
    write(stream, config, &config.start_message, &config.start_decoration);
}

pub(crate) fn write_end(stream: &dyn OutputStream, config: &BannerConfig) {
    write(stream, config, &config.end_message, &config.end_decoration);
}

fn write(stream: &dyn OutputStream, config: &BannerConfig, message: &str, decoration: &str) {
    let width = stream.columns().unwrap_or(config.width);
    let line = render(message, width, decoration, config.color);
    if let Err(e) = write_all(stream, line.as_bytes()).and_then(|()| stream.flush()) {
        warn!(error = %e, "failed to write capture banner");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SharedBuffer;
    use std::io;

    #[test]
    fn test_render_centres_message() {
        // 20 columns, 6 taken by decorations, 14 left for "abcd": 5 + 5.
        let line = render("abcd", 20, " ▼ ", false);
        assert_eq!(line, " ▼      abcd      ▼ \n");
        assert_eq!(line.trim_end_matches('\n').chars().count(), 20);
    }

    #[test]
    fn test_render_odd_gap_puts_extra_space_right() {
        let line = render("abc", 10, "|", false);
        assert_eq!(line, "|  abc   |\n");
    }

    #[test]
    fn test_render_overflow_clamps_padding() {
        let line = render("End of CLI capture", 8, " ▲ ", false);
        assert_eq!(line, " ▲ End of CLI capture ▲ \n");
    }

    #[test]
    fn test_render_color_wraps_in_inverse_video() {
        let line = render("Start of CLI capture", 80, " ▼ ", true);
        assert!(line.starts_with("\u{1b}["));
        assert!(line.contains("Start of CLI capture"));
        assert!(line.ends_with('\n'));
    }

    struct Narrow {
        buffer: SharedBuffer,
    }

    impl OutputStream for Narrow {
        fn write(&self, buf: &[u8]) -> io::Result<usize> {
            OutputStream::write(&self.buffer, buf)
        }

        fn flush(&self) -> io::Result<()> {
            Ok(())
        }

        fn columns(&self) -> Option<usize> {
            Some(30)
        }
    }

    #[test]
    fn test_stream_columns_override_configured_width() {
        let buffer = SharedBuffer::new();
        let stream = Narrow {
            buffer: buffer.clone(),
        };
        let config = BannerConfig {
            color: false,
            ..BannerConfig::default()
        };

        write_start(&stream, &config);

        let text = buffer.contents();
        assert_eq!(text.trim_end_matches('\n').chars().count(), 30);
        assert!(text.starts_with(" ▼ "));
    }

    #[test]
    fn test_configured_width_without_columns() {
        let buffer = SharedBuffer::new();
        let config = BannerConfig {
            color: false,
            width: 40,
            ..BannerConfig::default()
        };

        write_end(&buffer, &config);

        let text = buffer.contents();
        assert_eq!(text.trim_end_matches('\n').chars().count(), 40);
        assert!(text.contains("End of CLI capture"));
    }
}
