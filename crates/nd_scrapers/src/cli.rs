use clap::{Args, Subcommand};
use nd_core::{Result, RunStatus, ScrapeRun};

use crate::manager::{CycleReport, ScraperManager};

#[derive(Args, Debug, Clone)]
pub struct ScraperArgs {
    #[command(subcommand)]
    pub command: ScraperCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ScraperCommands {
    /// Scrape one source, or all of them when none is given
    Source {
        /// Source name, e.g. bbc, cnn or reuters
        source: Option<String>,
    },
    /// List available scrapers
    List,
    /// Scrape a single article url
    Url { url: String },
}

pub async fn handle_command(args: ScraperArgs, manager: &ScraperManager) -> Result<()> {
    match args.command {
        ScraperCommands::Source { source } => {
            let report = manager.run_cycle(source.as_deref()).await?;
            print_report(manager, &report);
        }
        ScraperCommands::List => {
            println!("Available scrapers:");
            for meta in manager.list_scrapers() {
                println!("  {} {} ({})", meta.emoji, meta.name, meta.base_url);
            }
        }
        ScraperCommands::Url { url } => {
            let (article, status) = manager.scrape_url(&url).await?;
            println!("{} {} - {}", status.emoji(), article.title, url);
        }
    }
    Ok(())
}

fn print_report(manager: &ScraperManager, report: &CycleReport) {
    let sources = manager.list_scrapers();
    for run in &report.runs {
        let emoji = sources
            .iter()
            .find(|m| m.name == run.source)
            .map(|m| m.emoji)
            .unwrap_or("•");
        println!("{} {}", emoji, format_run(run));
    }
    println!(
        "Total: {} found, {} scraped, {} new, {} updated, {} unchanged ({:.1}s)",
        report.articles_found,
        report.articles_scraped,
        report.new,
        report.updated,
        report.unchanged,
        report.duration_secs
    );
}

pub fn format_run(run: &ScrapeRun) -> String {
    match run.status {
        RunStatus::Completed => format!(
            "{}: {} found, {} scraped, {} new, {} updated",
            run.source, run.articles_found, run.articles_scraped, run.articles_saved, run.articles_updated
        ),
        status => format!(
            "{}: {} ({})",
            run.source,
            status,
            run.error_message.as_deref().unwrap_or("no details")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn run(status: RunStatus, error_message: Option<&str>) -> ScrapeRun {
        ScrapeRun {
            source: "Reuters".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            articles_found: 10,
            articles_scraped: 8,
            articles_saved: 5,
            articles_updated: 1,
            status,
            error_message: error_message.map(str::to_string),
        }
    }

    #[test]
    fn test_format_run() {
        assert_eq!(
            format_run(&run(RunStatus::Completed, None)),
            "Reuters: 10 found, 8 scraped, 5 new, 1 updated"
        );
        assert_eq!(
            format_run(&run(RunStatus::TimedOut, Some("Timed out after 600s"))),
            "Reuters: timed_out (Timed out after 600s)"
        );
        assert_eq!(
            format_run(&run(RunStatus::Failed, None)),
            "Reuters: failed (no details)"
        );
    }
}
