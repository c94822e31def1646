//! lens CLI: replay captured exchanges, show / clear stored metadata, resolve DOM snapshots,
//! manage profiles. Config from env (and `.env`).

use anyhow::Result;
use clap::Parser;
use lens_cli::{Cli, Commands, Lens, LensConfig, ProfileCommands, SnapshotReport};
use lens_core::{init_tracing, GenerationSettings, MetadataRecord};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = LensConfig::load()?;
    config.validate()?;
    init_tracing(&config.log_file)?;

    let lens = Lens::open(config).await?;
    let result = run(&lens, cli.command).await;
    lens.close().await;
    result
}

async fn run(lens: &Lens, command: Commands) -> Result<()> {
    match command {
        Commands::Replay {
            exchanges,
            target,
            snapshot,
        } => {
            let report = lens.replay(&exchanges, &target).await?;
            println!(
                "Exchanges: {}, skipped lines: {}, events: {}, processed: {}",
                report.exchanges, report.skipped, report.events, report.processed
            );
            if let Some(snapshot) = snapshot {
                let snapshot = lens.annotate_snapshot(report.session, &snapshot).await?;
                print_snapshot(&snapshot);
            }
        }
        Commands::Show {
            character: None, ..
        } => {
            let characters = lens.characters().await?;
            if characters.is_empty() {
                println!("No records.");
            }
            for (character, conversations) in characters {
                println!("{}: {}", character, conversations.join(", "));
            }
        }
        Commands::Show {
            character: Some(character),
            conversation,
        } => {
            let records = lens.conversation(&character, conversation.as_deref()).await?;
            print_records(&records);
        }
        Commands::Resolve { snapshot, target } => {
            let snapshot = lens.resolve(&snapshot, &target).await?;
            print_snapshot(&snapshot);
        }
        Commands::Clear => {
            lens.clear().await?;
            println!("Store cleared.");
        }
        Commands::Profile { command } => run_profile(lens, command).await?,
    }
    Ok(())
}

async fn run_profile(lens: &Lens, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::Save {
            name,
            model,
            max_tokens,
            temperature,
            top_p,
            top_k,
        } => {
            let settings = GenerationSettings {
                max_tokens,
                temperature,
                top_p,
                top_k,
            };
            let profile = lens.save_profile(name, model, settings).await?;
            println!("Saved profile {}.", profile.name);
        }
        ProfileCommands::Show { name } => {
            let profile = lens.profile(&name).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileCommands::List => {
            let profiles = lens.profiles().await?;
            if profiles.is_empty() {
                println!("No profiles.");
            }
            for profile in profiles {
                println!(
                    "{:<20} {:<36} {}",
                    profile.name,
                    profile.model.as_deref().unwrap_or("-"),
                    format_settings(&profile.settings)
                );
            }
        }
        ProfileCommands::Delete { name } => {
            if lens.delete_profile(&name).await? {
                println!("Deleted profile {}.", name);
            } else {
                println!("No profile named {}.", name);
            }
        }
    }
    Ok(())
}

fn format_timestamp(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

fn format_settings(settings: &GenerationSettings) -> String {
    let mut parts = Vec::new();
    if let Some(v) = settings.max_tokens {
        parts.push(format!("maxTokens={v}"));
    }
    if let Some(v) = settings.temperature {
        parts.push(format!("temperature={v}"));
    }
    if let Some(v) = settings.top_p {
        parts.push(format!("topP={v}"));
    }
    if let Some(v) = settings.top_k {
        parts.push(format!("topK={v}"));
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" ")
    }
}

fn print_records(records: &std::collections::BTreeMap<String, MetadataRecord>) {
    if records.is_empty() {
        println!("No records.");
        return;
    }
    println!(
        "{:<36} {:<6} {:<40} {:<20} {}",
        "message_id", "role", "model", "timestamp", "settings"
    );
    println!("{}", "-".repeat(120));
    for (message_id, record) in records {
        let role = record
            .role
            .map(|r| format!("{:?}", r).to_lowercase())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36} {:<6} {:<40} {:<20} {}",
            message_id,
            role,
            record.model.as_deref().unwrap_or("-"),
            format_timestamp(record.timestamp),
            format_settings(&record.settings())
        );
    }
}

fn print_snapshot(report: &SnapshotReport) {
    let s = &report.summary;
    println!(
        "Annotated: {}, already annotated: {}, provisional: {}, deferred: {}, detached: {}",
        s.annotated, s.already_annotated, s.provisional, s.deferred, s.detached
    );
    for annotation in &report.annotations {
        println!(
            "{:<36} {:<40} {:<20} {}",
            annotation.message_id,
            annotation.model.as_deref().unwrap_or("-"),
            format_timestamp(annotation.timestamp),
            format_settings(&annotation.settings)
        );
    }
}
