// aurs/src/cli/status.rs
//! Line-oriented rendering of pipeline events.
use std::time::Duration;

use aurs_common::pipeline::PipelineEvent;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

fn arrow() -> ColoredString {
    "==>".bold().blue()
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// The line printed for `event`, if any.
fn render(event: &PipelineEvent) -> Option<String> {
    let line = match event {
        PipelineEvent::PipelineStarted { total_units } => {
            format!("{} {} {}", arrow(), "Building".bold(), format!("{total_units} package base(s)").cyan())
        }
        PipelineEvent::PlanningStarted => format!("{} {}", arrow(), "Planning...".bold()),
        PipelineEvent::DependencyResolutionStarted => return None,
        PipelineEvent::DependencyResolutionFinished {
            registry_count,
            repo_count,
        } => format!(
            "{} Resolved {} AUR and {} repository package(s)",
            arrow(),
            registry_count.to_string().cyan(),
            repo_count.to_string().cyan()
        ),
        PipelineEvent::FetchStarted { package_base } => {
            format!("  {} {}", "fetching".dimmed(), package_base.cyan())
        }
        PipelineEvent::FetchFinished {
            package_base,
            revision,
        } => match revision {
            Some(revision) => format!(
                "  {} {} at {}",
                "fetched".dimmed(),
                package_base.cyan(),
                revision.chars().take(12).collect::<String>().dimmed()
            ),
            None => format!("  {} {}", "fetched".dimmed(), package_base.cyan()),
        },
        PipelineEvent::UnitSkipped {
            package_base,
            reason,
        } => format!("  {} {}: {}", "skipped".yellow(), package_base.cyan(), reason),
        PipelineEvent::DependencyInstallStarted {
            package_base,
            packages,
        } => format!(
            "  {} {} for {}",
            "installing dependencies".magenta(),
            packages.join(" "),
            package_base.cyan()
        ),
        PipelineEvent::UnitWaiting {
            package_base,
            waiting_on,
        } => format!(
            "  {} {} waits for {}",
            "waiting".dimmed(),
            package_base.cyan(),
            waiting_on.join(", ")
        ),
        PipelineEvent::BuildStarted { package_base } => {
            format!("{} {} {}", arrow(), "Building".bold(), package_base.cyan())
        }
        PipelineEvent::BuildFinished {
            package_base,
            artifacts,
        } => format!(
            "  {} {} ({} package(s))",
            "✓".green().bold(),
            package_base.cyan(),
            artifacts.len()
        ),
        PipelineEvent::BuildFailed {
            package_base,
            error,
        } => format!("  {} {}: {}", "✗".red().bold(), package_base.cyan(), error.red()),
        PipelineEvent::InstallStarted { packages } => {
            format!("{} {} {}", arrow(), "Installing".bold(), packages.join(" "))
        }
        PipelineEvent::InstallFinished { packages } => {
            format!("  {} installed {}", "✓".green().bold(), packages.join(" "))
        }
        PipelineEvent::LogInfo { message } => message.clone(),
        PipelineEvent::LogWarn { message } => format!("{} {}", "Warning:".yellow().bold(), message),
        PipelineEvent::LogError { message } => format!("{} {}", "Error:".red().bold(), message),
        PipelineEvent::PipelineFinished {
            duration_secs,
            success_count,
            fail_count,
        } => {
            let summary = format!(
                "{} built, {} failed in {:.1}s",
                success_count, fail_count, duration_secs
            );
            if *fail_count == 0 {
                format!("{} {}", arrow(), summary.green().bold())
            } else {
                format!("{} {}", arrow(), summary.red().bold())
            }
        }
    };
    Some(line)
}

pub async fn handle_events(mut event_rx: broadcast::Receiver<PipelineEvent>) {
    let mut spinner: Option<ProgressBar> = None;

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                match &event {
                    PipelineEvent::DependencyResolutionStarted => {
                        spinner = Some(create_spinner("Resolving dependencies..."));
                    }
                    _ => {
                        if let Some(pb) = spinner.take() {
                            pb.finish_and_clear();
                        }
                    }
                }
                if let Some(line) = render(&event) {
                    println!("{line}");
                }
                if matches!(event, PipelineEvent::PipelineFinished { .. }) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Status display skipped {} event(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    if let Some(pb) = spinner.take() {
        pb.finish_and_clear();
    }
}
