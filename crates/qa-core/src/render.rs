//! Incremental rendering of streamed replies.

use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use qa_protocol::AgentEvent;

use crate::style::{first_line, Style};

/// Renders an accumulated reply buffer incrementally.
///
/// The sink contract hands over the full buffer on every update; the
/// printer writes only the unprinted suffix, so re-rendering the same
/// buffer writes nothing.
pub struct StreamPrinter {
    style: Style,
    printed: usize,
    indicator: bool,
}

impl StreamPrinter {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            printed: 0,
            indicator: false,
        }
    }

    /// Show a typing indicator until the first increment arrives.
    pub fn show_indicator(&mut self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{}…{}", self.style.dim_start(), self.style.reset())?;
        out.flush()?;
        self.indicator = true;
        Ok(())
    }

    fn clear_indicator(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.indicator {
            out.queue(Clear(ClearType::CurrentLine))?
                .queue(MoveToColumn(0))?;
            self.indicator = false;
        }
        Ok(())
    }

    /// Write whatever part of `full` has not been written yet.
    pub fn update(&mut self, out: &mut impl Write, full: &str) -> io::Result<()> {
        self.clear_indicator(out)?;
        if full.len() < self.printed {
            // A new, shorter buffer was bound to this printer: start over.
            out.queue(Clear(ClearType::CurrentLine))?
                .queue(MoveToColumn(0))?;
            self.printed = 0;
        }
        out.write_all(full[self.printed..].as_bytes())?;
        self.printed = full.len();
        out.flush()
    }

    /// Terminate the rendered reply with a newline.
    pub fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.clear_indicator(out)?;
        if self.printed > 0 {
            writeln!(out)?;
        }
        out.flush()
    }
}

/// Renders an agent trace: structural events as prefixed lines, the
/// running answer through a [`StreamPrinter`].
pub struct TraceRenderer {
    style: Style,
    printer: StreamPrinter,
    seen: usize,
    show_thinking: bool,
}

impl TraceRenderer {
    pub fn new(style: Style, printer: StreamPrinter, show_thinking: bool) -> Self {
        Self {
            style,
            printer,
            seen: 0,
            show_thinking,
        }
    }

    pub fn show_indicator(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.printer.show_indicator(out)
    }

    /// Render events not yet seen, then the unprinted answer suffix.
    pub fn update(
        &mut self,
        out: &mut impl Write,
        events: &[AgentEvent],
        answer: &str,
    ) -> io::Result<()> {
        for event in &events[self.seen.min(events.len())..] {
            match event {
                AgentEvent::Thinking { content } => {
                    if self.show_thinking {
                        self.structural_line(out, &format!("· {}", first_line(content, 70)))?;
                    }
                }
                AgentEvent::ToolStart { tool, .. } => {
                    self.structural_line(out, &format!("▸ {tool}"))?;
                }
                AgentEvent::ToolResult { tool, output } => {
                    self.structural_line(
                        out,
                        &format!("✓ {tool}: {}", first_line(output, 60)),
                    )?;
                }
                AgentEvent::Answer { .. } | AgentEvent::Done => {}
            }
        }
        self.seen = events.len();
        self.printer.update(out, answer)
    }

    pub fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.printer.finish(out)
    }

    fn structural_line(&mut self, out: &mut impl Write, text: &str) -> io::Result<()> {
        self.printer.clear_indicator(out)?;
        if self.printer.printed > 0 {
            writeln!(out)?;
        }
        writeln!(
            out,
            "{}{}{}",
            self.style.dim_start(),
            text,
            self.style.reset()
        )
    }
}
