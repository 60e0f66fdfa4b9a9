use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use taskdesk_shared::{ApiAck, Comment, CurrentUser, Identity, TaskEnvelope, TaskStatus, User};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::display_timestamp;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, comment_counts))]
    pub fn print_task_table(
        &mut self,
        tasks: &[TaskEnvelope],
        comment_counts: impl Fn(i64) -> usize,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = tasks
            .iter()
            .map(|envelope| {
                let task = &envelope.task;
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    self.paint_status(task.status),
                    task.deadline
                        .as_deref()
                        .map(display_timestamp)
                        .unwrap_or_default(),
                    task.created_on
                        .as_deref()
                        .map(display_timestamp)
                        .unwrap_or_default(),
                    envelope.auth_user.display(),
                    task.assigned_to.map(|id| id.to_string()).unwrap_or_default(),
                    comment_counts(task.id).to_string(),
                    task.title.clone(),
                ]
            })
            .collect();

        write_table(
            &mut out,
            &[
                "ID", "Status", "Deadline", "Created", "Author", "Assignee", "Notes", "Title",
            ],
            rows,
        )?;
        Ok(())
    }

    pub fn print_comments(&mut self, task_id: i64, comments: &[Comment]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if comments.is_empty() {
            writeln!(out, "no comments on task {task_id}")?;
            return Ok(());
        }
        for comment in comments {
            let when = comment
                .created_on
                .as_deref()
                .map(display_timestamp)
                .unwrap_or_default();
            let who = comment
                .created_by
                .map(|id| format!("user {id}"))
                .unwrap_or_else(|| "-".to_string());
            writeln!(out, "{} {}", self.paint(&when, "2"), self.paint(&who, "36"))?;
            writeln!(out, "  {}", comment.body)?;
        }
        Ok(())
    }

    pub fn print_users(&mut self, users: &[User]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = users
            .iter()
            .map(|user| vec![self.paint(&user.id.to_string(), "33"), user.display_name()])
            .collect();
        write_table(&mut out, &["ID", "Name"], rows)
    }

    pub fn print_current_user(&mut self, current: &CurrentUser) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "user      {}", identity_label(&current.user))?;
        match &current.manager {
            Some(manager) => writeln!(out, "manager   {}", identity_label(manager))?,
            None => writeln!(out, "manager   -")?,
        }
        Ok(())
    }

    pub fn print_ack(&mut self, ack: &ApiAck) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let message = ack.message.as_deref().unwrap_or("ok");
        match ack.task_id {
            Some(id) => writeln!(out, "{message} (task {id})")?,
            None => writeln!(out, "{message}")?,
        }
        Ok(())
    }

    fn paint_status(&self, status: TaskStatus) -> String {
        let code = match status {
            TaskStatus::Pending => "33",
            TaskStatus::Acknowledged => "36",
            TaskStatus::Completed => "32",
            TaskStatus::Rejected | TaskStatus::Failed => "31",
        };
        self.paint(status.as_str(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn identity_label(identity: &Identity) -> String {
    match identity.id() {
        Some(id) => format!("{} ({id})", identity.display_name()),
        None => identity.display_name(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
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
