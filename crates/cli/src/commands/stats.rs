//! Statistics-related CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, CountsStats, DailyStats, UsageStats};
use crate::output::{format_bytes, format_load, print_warning, OutputFormat};

/// Row for the daily activity table
#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Day")]
    day: String,
    #[tabled(rename = "Students")]
    students: String,
    #[tabled(rename = "Notebooks")]
    notebooks: String,
    #[tabled(rename = "New Students")]
    new_students: String,
    #[tabled(rename = "New Notebooks")]
    new_notebooks: String,
}

/// Row for the students-per-notebook table
#[derive(Tabled)]
struct NotebookRow {
    #[tabled(rename = "Notebook")]
    notebook: String,
    #[tabled(rename = "Students")]
    students: String,
}

/// Row for the notebooks-visited distribution table
#[derive(Tabled)]
struct SpreadRow {
    #[tabled(rename = "Notebooks Visited")]
    notebooks: String,
    #[tabled(rename = "Students")]
    students: String,
}

/// Show daily activity for a course
pub async fn daily(client: &ApiClient, course: &str, format: OutputFormat) -> Result<()> {
    let path = format!("courses/{}/stats/daily", course);
    let result: DailyStats = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if result.daily.timestamps.is_empty() {
                print_warning("No recorded events for this course");
                return Ok(());
            }

            let rows: Vec<DayRow> = result
                .daily
                .timestamps
                .iter()
                .enumerate()
                .map(|(i, day)| DayRow {
                    day: day.split_whitespace().next().unwrap_or(day).to_string(),
                    students: result.daily.unique_students[i].to_string(),
                    notebooks: result.daily.unique_notebooks[i].to_string(),
                    new_students: result.daily.new_students[i].to_string(),
                    new_notebooks: result.daily.new_notebooks[i].to_string(),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            if let (Some(students), Some(notebooks)) = (
                result.events.total_students.last(),
                result.events.total_notebooks.last(),
            ) {
                println!("\nTotal: {} students, {} notebooks", students, notebooks);
            }
        }
    }

    Ok(())
}

/// Show replayed monitor counters for a course
pub async fn counts(client: &ApiClient, course: &str, format: OutputFormat) -> Result<()> {
    let path = format!("courses/{}/stats/counts", course);
    let result: CountsStats = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if result.timestamps.is_empty() {
                print_warning("No recorded counts for this course");
                return Ok(());
            }

            let latest = |key: &str| -> Option<u64> {
                result
                    .series
                    .get(key)
                    .and_then(|column| column.last().copied())
                    .flatten()
            };
            let show = |value: Option<u64>| {
                value.map_or_else(|| "-".to_string(), |v| v.to_string())
            };
            let show_load = |value: Option<u64>| value.map_or_else(|| "-".to_string(), format_load);
            let show_bytes =
                |value: Option<u64>| value.map_or_else(|| "-".to_string(), format_bytes);
            let show_disk = |percent: Option<u64>, free: Option<u64>| match (percent, free) {
                (Some(p), Some(f)) => format!("{}% free ({} MiB)", p, f),
                _ => "-".to_string(),
            };

            println!("{}", "Monitor Counts".bold());
            println!("{}", "=".repeat(50));
            println!("Course:                 {}", course.cyan());
            println!("Samples:                {}", result.timestamps.len());
            if let (Some(first), Some(last)) =
                (result.timestamps.first(), result.timestamps.last())
            {
                println!("First:                  {}", first);
                println!("Last:                   {}", last);
            }
            println!();

            println!("{}", "Latest Containers".bold());
            println!("{}", "-".repeat(50));
            println!("Running:                {}", show(latest("running_containers")));
            println!("Frozen:                 {}", show(latest("frozen_containers")));
            println!("System-wide:            {}", show(latest("system_containers")));
            println!();

            println!("{}", "Latest Kernels".bold());
            println!("{}", "-".repeat(50));
            println!("Running:                {}", show(latest("running_kernels")));
            println!("System-wide:            {}", show(latest("system_kernels")));
            println!();

            println!("{}", "Latest System".bold());
            println!("{}", "-".repeat(50));
            println!("Student homes:          {}", show(latest("student_homes")));
            println!(
                "Load (1/5/15):          {} / {} / {}",
                show_load(latest("load1s")),
                show_load(latest("load5s")),
                show_load(latest("load15s"))
            );
            println!(
                "Container store:        {}",
                show_disk(
                    latest("container_ds_percents"),
                    latest("container_ds_frees")
                )
            );
            println!(
                "Data store:             {}",
                show_disk(latest("data_ds_percents"), latest("data_ds_frees"))
            );
            println!(
                "System store:           {}",
                show_disk(latest("system_ds_percents"), latest("system_ds_frees"))
            );
            println!("Memory total:           {}", show_bytes(latest("memory_totals")));
            println!("Memory free:            {}", show_bytes(latest("memory_frees")));
            println!(
                "Memory available:       {}",
                show_bytes(latest("memory_availables"))
            );
        }
    }

    Ok(())
}

/// Show notebook/student cross-usage for a course
pub async fn usage(client: &ApiClient, course: &str, format: OutputFormat) -> Result<()> {
    let path = format!("courses/{}/stats/usage", course);
    let result: UsageStats = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Material Usage".bold());
            println!("{}", "=".repeat(50));
            println!("Course:                 {}", course.cyan());
            println!("Notebooks:              {}", result.nbnotebooks);
            println!("Students:               {}", result.nbstudents);

            if result.nbstudents_per_notebook.is_empty() {
                println!();
                print_warning("No recorded notebook visits for this course");
                return Ok(());
            }

            println!();
            println!("{}", "Students per Notebook".bold());
            println!("{}", "-".repeat(50));
            let rows: Vec<NotebookRow> = result
                .nbstudents_per_notebook
                .iter()
                .map(|(notebook, students)| NotebookRow {
                    notebook: notebook.clone(),
                    students: students.to_string(),
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            println!();
            println!("{}", "Notebooks Visited per Student".bold());
            println!("{}", "-".repeat(50));
            let rows: Vec<SpreadRow> = result
                .nbstudents_per_nbnotebooks
                .iter()
                .map(|(notebooks, students)| SpreadRow {
                    notebooks: notebooks.to_string(),
                    students: students.to_string(),
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            println!();
            println!(
                "Heatmap: {} students x {} notebooks, visits between {} and {}",
                result.heatmap.y.len(),
                result.heatmap.x.len(),
                result.heatmap.zmin,
                result.heatmap.zmax
            );
        }
    }

    Ok(())
}
