// src/main.rs

use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use paperless_curator::config::{Command, CommandLineInput, OpenAiConfig, PaperlessConfig, PromptSet};
use paperless_curator::error::AppError;
use paperless_curator::openai::{ChatClient, RetryPolicy};
use paperless_curator::resolve::FieldMapping;
use paperless_curator::{
    cleanup_json_names, merge_duplicate_correspondents, CorrespondentAssigner, MetadataExtractor,
    PaperlessClient, TaxReliefAnalyzer,
};
use std::fs;

/// Sets up logging: console at warn (debug when verbose), plus a
/// debug-level file appender in the temp dir.
fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let log_file_path = std::env::temp_dir().join("paperless_curator.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

async fn run(cli: CommandLineInput) -> Result<(), AppError> {
    let paperless_config = PaperlessConfig::from_env()?;
    let paperless = PaperlessClient::new(&paperless_config)?;

    match cli.command {
        Command::MergeDuplicates => merge_duplicate_correspondents(&paperless).await,
        Command::CleanupNames => cleanup_json_names(&paperless).await,
        Command::TaxCheck {
            document_id,
            prompts,
            field_mapping,
        } => {
            let prompt_set = PromptSet::load(&prompts)?;
            let mut mapping = FieldMapping::load(&field_mapping)?;
            let chat = ChatClient::new(&OpenAiConfig::from_env()?)?;
            let analyzer =
                TaxReliefAnalyzer::new(&paperless, &chat, &prompt_set, RetryPolicy::default());
            analyzer.run(document_id, &mut mapping).await
        }
        Command::ExtractMetadata { document_id } => {
            let chat = ChatClient::new(&OpenAiConfig::from_env()?)?;
            MetadataExtractor::new(&paperless, &chat)
                .extract(document_id)
                .await
        }
        Command::AssignCorrespondent { document_id } => {
            let chat = ChatClient::new(&OpenAiConfig::from_env()?)?;
            CorrespondentAssigner::new(&paperless, &chat)
                .assign(document_id)
                .await
        }
        Command::AssignAll => {
            let chat = ChatClient::new(&OpenAiConfig::from_env()?)?;
            CorrespondentAssigner::new(&paperless, &chat)
                .assign_all()
                .await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = CommandLineInput::parse();

    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
