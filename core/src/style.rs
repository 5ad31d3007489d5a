use colored::{Color, ColoredString, Colorize};

use crate::testing::Verdict;

pub fn is_truecolor_supported() -> bool {
    std::env::var("COLORTERM").is_ok_and(|v| v == "truecolor" || v == "24bit")
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::TrueColor { r, g, b }
}

pub trait ColorTheme {
    /// Foreground for 16-color terminals.
    fn basic_color(&self) -> Color;

    /// Foreground when 24-bit color is available; falls back to [`Self::basic_color`].
    fn true_color(&self) -> Option<Color> {
        None
    }

    fn color(&self) -> Color {
        match self.true_color() {
            Some(c) if is_truecolor_supported() => c,
            _ => self.basic_color(),
        }
    }
}

impl ColorTheme for log::Level {
    fn basic_color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for Verdict {
    fn basic_color(&self) -> Color {
        match self {
            Verdict::Accepted => Color::Green,
            Verdict::WrongAnswer => Color::Yellow,
            Verdict::CompileError => Color::Red,
            Verdict::RuntimeError => Color::Magenta,
        }
    }

    fn true_color(&self) -> Option<Color> {
        Some(match self {
            Verdict::Accepted => rgb(46, 160, 67),
            Verdict::WrongAnswer => rgb(219, 154, 4),
            Verdict::CompileError => rgb(207, 34, 46),
            Verdict::RuntimeError => rgb(137, 87, 229),
        })
    }
}

/// Verdict code rendered as a colored badge, e.g. ` AC `.
pub fn verdict_icon(verdict: Verdict) -> ColoredString {
    let badge = format!(" {} ", verdict).bold().on_color(verdict.color());
    if is_truecolor_supported() {
        badge.color(rgb(255, 255, 255))
    } else {
        badge.bright_white()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verdict_badges_differ() {
        let colors: Vec<_> = [
            Verdict::Accepted,
            Verdict::WrongAnswer,
            Verdict::CompileError,
            Verdict::RuntimeError,
        ]
        .iter()
        .map(|v| v.basic_color())
        .collect();
        for (i, a) in colors.iter().enumerate() {
            assert!(colors[i + 1..].iter().all(|b| a != b));
        }
        assert!(verdict_icon(Verdict::Accepted).contains("AC"));
    }
}
