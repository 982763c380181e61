use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitelens::{
    DataDir, EmbeddingConfig, OpenAiEmbeddings, VectorStore, batch,
    chunking,
    cli::{Cli, Command},
    document::{ContentSource, Document, DocumentFilter, JsonContentSource},
    error::{self, Error},
    search::{self, SearchParams},
    vector_store::{self, TimestampPrecision},
};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("SITELENS_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let model = cli.model.as_deref();

    match cli.command {
        Command::Sync(args) => {
            let config = EmbeddingConfig::from_env(model)?;
            let provider = OpenAiEmbeddings::new(&config)?;
            let store = VectorStore::open(&data_dir.records_db())?;
            let documents = load_documents(
                &args.input,
                args.after.clone(),
                args.before.clone(),
            )?;

            let report = batch::store_embeddings(
                &store,
                &provider,
                &documents,
                config.max_input_tokens,
                args.force,
            )?;
            println!("{}", report.message);
        }
        Command::Check(args) => {
            let store = VectorStore::open(&data_dir.records_db())?;
            let documents = load_documents(&args.input, None, None)?;
            let report = batch::check_embeddings(&store, &documents)?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} existing, {} missing",
                    report.existing_count, report.missing_count
                );
                for doc in &report.missing_documents {
                    println!("  {} {} ({})", doc.id, doc.title, doc.published_at);
                }
            }
        }
        Command::Search(args) => {
            let config = EmbeddingConfig::from_env(model)?;
            let provider = OpenAiEmbeddings::new(&config)?;
            let store = VectorStore::open(&data_dir.records_db())?;

            let params = SearchParams {
                query: args.query,
                limit: args.count,
                date_after: args.after,
                date_before: args.before,
            };
            let hits = search::search_similar(&store, &provider, &params)?;

            if args.json {
                println!("{}", search::format_json(&hits)?);
            } else {
                print!("{}", search::format_human(&hits));
            }
        }
        Command::Chunk(args) => {
            let documents = load_documents(&args.input, None, None)?;
            for doc in &documents {
                let chunks = chunking::chunk_document(doc, args.max_tokens);
                println!("# document {} ({} chunks)", doc.id, chunks.len());
                for chunk in &chunks {
                    println!(
                        "-- chunk {} (~{} tokens)",
                        chunk.index,
                        chunking::estimate_tokens(&chunk.text)
                    );
                    print!("{}", chunk.text);
                }
            }
        }
        Command::Stats(args) => {
            let stats = vector_store::stats(&data_dir.records_db())?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else if !stats.exists {
                println!("No store at {}", data_dir.records_db().display());
            } else {
                println!("Store: {}", data_dir.records_db().display());
                println!("Records: {}", stats.count);
                println!("Size: {} bytes", stats.size_bytes);
            }
        }
        Command::MigratePrecision(args) => {
            let precision = TimestampPrecision::parse(&args.precision)?;
            let mut store = VectorStore::open(&data_dir.records_db())?;
            let report = store.migrate_timestamp_precision(precision)?;
            if report.changed {
                println!(
                    "Migrated {} records to {} precision",
                    report.migrated,
                    precision.as_str()
                );
            } else {
                println!("Store already at {} precision", precision.as_str());
            }
        }
        Command::Purge(args) => {
            let store = VectorStore::open(&data_dir.records_db())?;
            let removed = store.purge(&args.ids)?;
            println!("Removed {removed} of {} records", args.ids.len());
        }
    }

    Ok(())
}

fn load_documents(
    path: &std::path::Path,
    after: Option<String>,
    before: Option<String>,
) -> error::Result<Vec<Document>> {
    if !path.exists() {
        return Err(Error::InvalidInput(format!(
            "input file does not exist: {}",
            path.display()
        )));
    }
    let source = JsonContentSource::load(path)?;
    let filter = DocumentFilter {
        date_after: after,
        date_before: before,
        limit: None,
    };
    source.list_documents(&filter)
}
