use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::board::Board;
use crate::config::{ColorMode, Config};
use crate::task::{Task, View};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = match cfg.color_mode()? {
            ColorMode::Auto => io::stdout().is_terminal(),
            ColorMode::Never => false,
        };
        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Prints `view`, or all three columns in board order.
    #[tracing::instrument(skip(self, board))]
    pub fn print_board(&self, board: &Board, view: Option<View>) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_board(out, board, view)
    }

    pub fn write_board<W: Write>(
        &self,
        mut out: W,
        board: &Board,
        view: Option<View>,
    ) -> anyhow::Result<()> {
        let views = match view {
            Some(view) => vec![view],
            None => View::EVERY.to_vec(),
        };

        for (idx, view) in views.into_iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            let tasks = board.view(view);
            writeln!(
                out,
                "{} ({} {})",
                self.paint(view.title(), header_color(view)),
                tasks.len(),
                if tasks.len() == 1 { "task" } else { "tasks" }
            )?;

            if tasks.is_empty() {
                writeln!(out, "  No tasks found")?;
                continue;
            }

            write_table(&mut out, self.task_rows(tasks))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, board))]
    pub fn print_status(&self, board: &Board, online: bool) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_status(out, board, online)
    }

    pub fn write_status<W: Write>(
        &self,
        mut out: W,
        board: &Board,
        online: bool,
    ) -> anyhow::Result<()> {
        let network = if online {
            self.paint("online", "32")
        } else {
            self.paint("offline", "31")
        };
        let last_sync = board
            .last_sync()
            .map(|at| at.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "never".to_string());

        writeln!(out, "network      {network}")?;
        writeln!(out, "initialized  {}", board.is_initialized())?;
        writeln!(out, "last sync    {last_sync}")?;
        writeln!(
            out,
            "tasks        {} ({} active, {} completed)",
            board.all().len(),
            board.active().len(),
            board.completed().len()
        )?;
        Ok(())
    }

    fn task_rows(&self, tasks: &[Task]) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(tasks.len() + 1);
        rows.push(
            ["#", "ID", "Title", "Date", "Time", "Status"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
        );

        for (idx, task) in tasks.iter().enumerate() {
            let (title, status) = if task.completed {
                (self.paint(&task.title, "9"), self.paint("Completed", "32"))
            } else {
                (task.title.clone(), self.paint("Active", "33"))
            };
            rows.push(vec![
                (idx + 1).to_string(),
                task.id.clone(),
                title,
                task.date.clone(),
                task.time.clone(),
                status,
            ]);
        }
        rows
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn header_color(view: View) -> &'static str {
    match view {
        View::All => "34",
        View::Active => "33",
        View::Completed => "32",
    }
}

/// First row is the header.
fn write_table<W: Write>(mut writer: W, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = rows.first().map_or(0, Vec::len);
    let mut widths = vec![0usize; column_count];

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (row_idx, row) in rows.into_iter().enumerate() {
        write!(writer, " ")?;
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, " {}{}", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;

        if row_idx == 0 {
            write!(writer, " ")?;
            for width in &widths {
                write!(writer, " {:-<width$}", "", width = width)?;
            }
            writeln!(writer)?;
        }
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
