use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_display_date, format_display_datetime};
use crate::model::{Priority, Task, TaskStatus};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            color: cfg.color()? && io::stdout().is_terminal(),
            tz: cfg.timezone()?,
        })
    }

    pub fn plain(tz: Tz) -> Self {
        Self { color: false, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn write_task_table<W: Write>(
        &self,
        out: W,
        tasks: &[Task],
        statuses: &[TaskStatus],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Number", "Title", "Status", "Pri", "Owner", "Assigned", "Project", "Due"]
            .map(String::from)
            .to_vec();

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let due = task
                .due_date
                .map(|date| format_display_date(date, self.tz))
                .unwrap_or_default();
            let due = if task.is_overdue(now) {
                self.paint(&due, "31")
            } else {
                due
            };

            rows.push(vec![
                self.paint(&task.id.to_string(), "33"),
                task.task_number.clone(),
                task.title.clone(),
                status_label(statuses, task.status_id),
                self.paint_priority(task.priority),
                task.owner.clone(),
                task.assigned.clone(),
                task.project_name.clone(),
                due,
            ]);
        }

        write_table(out, headers, rows)
    }

    pub fn print_task_table(
        &self,
        tasks: &[Task],
        statuses: &[TaskStatus],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            println!("No tasks found.");
            return Ok(());
        }
        self.write_task_table(io::stdout().lock(), tasks, statuses, now)
    }

    pub fn write_task_info<W: Write>(
        &self,
        mut out: W,
        task: &Task,
        statuses: &[TaskStatus],
    ) -> anyhow::Result<()> {
        let when = |value: Option<DateTime<Utc>>| {
            value
                .map(|dt| format_display_datetime(dt, self.tz))
                .unwrap_or_else(|| "-".to_string())
        };

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "number    {}", task.task_number)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "status    {}", status_label(statuses, task.status_id))?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "owner     {}", task.owner)?;
        writeln!(out, "assigned  {}", task.assigned)?;
        writeln!(out, "project   {}", task.project_name)?;
        writeln!(out, "due       {}", when(task.due_date))?;
        writeln!(out, "created   {}", when(task.created_at))?;
        writeln!(out, "updated   {}", when(task.updated_at))?;
        if !task.description.is_empty() {
            writeln!(out)?;
            for line in task.description.lines() {
                writeln!(out, "  {line}")?;
            }
        }
        Ok(())
    }

    pub fn print_task_info(&self, task: &Task, statuses: &[TaskStatus]) -> anyhow::Result<()> {
        self.write_task_info(io::stdout().lock(), task, statuses)
    }

    pub fn write_status_table<W: Write>(
        &self,
        out: W,
        statuses: &[TaskStatus],
    ) -> anyhow::Result<()> {
        let headers = vec!["ID".to_string(), "Name".to_string(), "Updated".to_string()];
        let rows = statuses
            .iter()
            .map(|status| {
                vec![
                    self.paint(&status.id.to_string(), "33"),
                    status.name.clone(),
                    status
                        .updated_at
                        .or(status.created_at)
                        .map(|dt| format_display_date(dt, self.tz))
                        .unwrap_or_default(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn print_status_table(&self, statuses: &[TaskStatus]) -> anyhow::Result<()> {
        if statuses.is_empty() {
            println!("No task statuses defined.");
            return Ok(());
        }
        self.write_status_table(io::stdout().lock(), statuses)
    }

    /// Prints the page's error banner on stderr.
    pub fn print_banner(&self, message: &str) {
        let color = self.color && io::stderr().is_terminal();
        if color {
            eprintln!("\x1b[1;31m{message}\x1b[0m");
        } else {
            eprintln!("{message}");
        }
    }

    fn paint_priority(&self, priority: Priority) -> String {
        match priority {
            Priority::High => self.paint(priority.as_str(), "31"),
            Priority::Medium => self.paint(priority.as_str(), "33"),
            Priority::Low => priority.as_str().to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn status_label(statuses: &[TaskStatus], status_id: i64) -> String {
    statuses
        .iter()
        .find(|status| status.id == status_id)
        .map(|status| status.name.clone())
        .unwrap_or_default()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let write_row = |writer: &mut W, cells: &[String]| -> io::Result<()> {
        let mut line = String::new();
        for (idx, cell) in cells.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding + 1));
        }
        writeln!(writer, "{}", line.trim_end())
    };

    write_row(&mut writer, &headers)?;
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    write_row(&mut writer, &rule)?;
    for row in &rows {
        write_row(&mut writer, row)?;
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
