use crate::agent::TurnPhase;
use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};

/// One-line status shown above the composer while a reply is in flight
pub struct StreamingIndicator<'a> {
    pub phase: TurnPhase,
    pub model: &'a str,
    /// Advances once per tick
    pub frame: usize,
    pub palette: &'a Palette,
}

impl StreamingIndicator<'_> {
    pub fn label(&self) -> Option<String> {
        let dots = match self.frame % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "",
        };
        match self.phase {
            TurnPhase::Idle => None,
            TurnPhase::Submitted => Some(format!("{} is thinking{}", self.model, dots)),
            TurnPhase::Streaming => Some(format!("{} is typing{}", self.model, dots)),
        }
    }
}

impl Widget for StreamingIndicator<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(label) = self.label() else {
            return;
        };
        let indicator = Line::from(vec![
            Span::styled("🤖 ", self.palette.assistant),
            Span::styled(label, self.palette.accent),
        ]);
        buf.set_line(area.x, area.y, &indicator, area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Theme;

    #[test]
    fn test_label_follows_phase() {
        let palette = Palette::for_theme(Theme::Dark);
        let mut indicator = StreamingIndicator {
            phase: TurnPhase::Idle,
            model: "m",
            frame: 2,
            palette: &palette,
        };
        assert_eq!(indicator.label(), None);

        indicator.phase = TurnPhase::Submitted;
        assert_eq!(indicator.label().as_deref(), Some("m is thinking..."));

        indicator.phase = TurnPhase::Streaming;
        indicator.frame = 3;
        assert_eq!(indicator.label().as_deref(), Some("m is typing"));
    }
}
