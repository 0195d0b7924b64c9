use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::Pattern;
use wire::Limits;
use zonecast_tools::{
    decode_message_json, format_decode_pretty, inspect_message, InspectReport, MessageReport,
};

#[derive(Parser)]
#[command(
    name = "zonecast-tools",
    version,
    about = "zonecast message inspection and decoding tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect message structure and sizes.
    Inspect {
        /// A message file, or a directory of them.
        path: PathBuf,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Sort inspected messages.
        #[arg(long, value_enum)]
        sort: Option<InspectSort>,
        /// Limit the number of inspected messages (after sorting).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode a message into structured JSON.
    Decode {
        message_file: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = DecodeFormat::Json)]
        format: DecodeFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectSort {
    Size,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DecodeFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let limits = Limits::default();
    match cli.command {
        Command::Inspect {
            path,
            glob,
            sort,
            limit,
        } => {
            if path.is_dir() {
                let entries = collect_entries(&path, glob.as_deref())?;
                let mut entries = maybe_sort_entries(entries, sort);
                let limit = limit.or(sort.map(|InspectSort::Size| 10));
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                for entry in entries {
                    println!("== {} ({} bytes) ==", entry.path.display(), entry.size);
                    inspect_file(&entry.path, &limits)?;
                }
            } else {
                inspect_file(&path, &limits)?;
            }
        }
        Command::Decode {
            message_file,
            format,
        } => {
            let bytes = fs::read(&message_file)
                .with_context(|| format!("read message {}", message_file.display()))?;
            let output = decode_message_json(&bytes, &limits)?;
            match format {
                DecodeFormat::Json => {
                    let json = serde_json::to_string_pretty(&output).context("serialize json")?;
                    println!("{json}");
                }
                DecodeFormat::Pretty => {
                    print!("{}", format_decode_pretty(&output));
                }
            }
        }
    }
    Ok(())
}

fn inspect_file(path: &Path, limits: &Limits) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("read message {}", path.display()))?;
    let report = inspect_message(&bytes, limits)
        .with_context(|| format!("decode message {}", path.display()))?;
    match report {
        InspectReport::Ack {
            frame_id,
            sent_time,
        } => println!("ack for frame#{frame_id} (sent_time {sent_time})"),
        InspectReport::Frames(report) => print_message_report(&report),
    }
    Ok(())
}

struct MessageEntry {
    path: PathBuf,
    size: u64,
}

fn collect_entries(dir: &Path, glob: Option<&str>) -> Result<Vec<MessageEntry>> {
    let mut entries = Vec::new();
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(MessageEntry { path, size });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn maybe_sort_entries(
    mut entries: Vec<MessageEntry>,
    sort: Option<InspectSort>,
) -> Vec<MessageEntry> {
    if let Some(InspectSort::Size) = sort {
        entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
    }
    entries
}

fn print_message_report(report: &MessageReport) {
    println!(
        "frame#{} sent_time: {} size: {} bytes echoed acks: {}",
        report.id, report.sent_time, report.byte_len, report.echoed_acks
    );
    println!("frames:");
    for frame in &report.frames {
        let center = frame
            .center
            .map_or_else(|| "none".to_string(), |key| key.to_string());
        println!(
            "  time {} center {}: {} states ({} full, {} removed), <= {} bytes",
            frame.time,
            center,
            frame.states,
            frame.full_states,
            frame.removed,
            frame.bits.div_ceil(8)
        );
    }
}
