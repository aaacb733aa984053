use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sextant_core::{FileKey, Position};
use sextant_workspace::{Engine, EngineConfig, EngineReport, HighlightSpan, Location, Role};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sextant", version, about = "Sextant CLI (indexing and navigation queries)")]
struct Cli {
    /// Tracing filter directives; `RUST_LOG` entries are appended when set
    #[arg(long, global = true, default_value = "sextant=info")]
    log_filter: String,
    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the index from a workspace and print a report
    Index(IndexArgs),
    /// Resolve the definition of the symbol under a cursor
    Definition(QueryArgs),
    /// List every recorded occurrence of the symbol under a cursor
    References(ReferencesArgs),
    /// List occurrences of the symbol within its own file
    Highlight(QueryArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Path to the workspace root
    path: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct QueryArgs {
    /// File the cursor is in
    file: PathBuf,
    /// Cursor line (zero-based)
    #[arg(long)]
    line: u32,
    /// Cursor column in UTF-16 units (zero-based)
    #[arg(long)]
    character: u32,
    /// Workspace root (defaults to current directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReferencesArgs {
    #[command(flatten)]
    query: QueryArgs,
    /// Include the declaration site among the results
    #[arg(long)]
    include_declaration: bool,
}

impl QueryArgs {
    fn position(&self) -> Position {
        Position::new(self.line, self.character)
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter, cli.log_json);
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Installs the global subscriber once, writing to stderr so stdout stays
/// machine-readable. `RUST_LOG` directives are appended to the CLI filter.
fn init_tracing(directives: &str, json: bool) {
    let directives = match std::env::var("RUST_LOG") {
        Ok(env) if !env.trim().is_empty() => format!("{directives},{}", env.trim()),
        _ => directives.to_owned(),
    };
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("sextant=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Index(args) => {
            let (engine, root) = open_engine(&args.path)?;
            let report = engine.seed()?;
            print_report(&report, &root, args.json)?;
            Ok(0)
        }
        Command::Definition(args) => {
            let (engine, file) = seeded_query(&args)?;
            let locations: Vec<Location> = engine
                .definition(&file, args.position())
                .into_iter()
                .collect();
            print_locations(&locations, args.json)?;
            Ok(exit_for(&locations))
        }
        Command::References(args) => {
            let (engine, file) = seeded_query(&args.query)?;
            let locations =
                engine.references(&file, args.query.position(), args.include_declaration);
            print_locations(&locations, args.query.json)?;
            Ok(exit_for(&locations))
        }
        Command::Highlight(args) => {
            let (engine, file) = seeded_query(&args)?;
            let spans = engine.document_highlight(&file, args.position());
            print_highlights(&spans, args.json)?;
            Ok(exit_for(&spans))
        }
    }
}

/// Engine rooted at the canonicalized workspace path.
fn open_engine(root: &Path) -> Result<(Engine, PathBuf)> {
    let root = dunce::canonicalize(root)
        .with_context(|| format!("cannot open workspace root {}", root.display()))?;
    let engine = Engine::new(EngineConfig::new(root.clone()))?;
    Ok((engine, root))
}

/// Seeds the index, then keys the query file against the canonical root.
fn seeded_query(args: &QueryArgs) -> Result<(Engine, FileKey)> {
    let (engine, root) = open_engine(&args.path)?;
    engine.seed()?;
    Ok((engine, file_key(&root, &args.file)))
}

/// The query file need not exist on disk (the index may describe it from a
/// sidecar alone), so canonicalization gets a lexical fallback.
fn file_key(root: &Path, file: &Path) -> FileKey {
    match dunce::canonicalize(file) {
        Ok(path) => FileKey::local(path),
        Err(_) if file.is_absolute() => FileKey::local(file),
        Err(_) => FileKey::local(root.join(file)),
    }
}

/// Grep-like: success only when the query produced at least one result.
fn exit_for<T>(results: &[T]) -> i32 {
    if results.is_empty() {
        1
    } else {
        0
    }
}

fn print_report(report: &EngineReport, root: &Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("indexed: {}", root.display());
        println!("  files: {}", report.index.files);
        println!("  symbols: {}", report.index.symbols);
        println!("  definitions: {}", report.index.definitions);
        println!("  references: {}", report.index.references);
        println!("  plain_files: {}", report.plain_files);
        println!("  parse_failures: {}", report.parse_failures);
        println!("  configs_loaded: {}", report.configs_loaded);
        println!("  archives_extracted: {}", report.archives_extracted);
        println!("  archive_failures: {}", report.archive_failures);
    }
    Ok(())
}

/// Human lines are one-based `path:line:col`; JSON keeps the zero-based
/// wire coordinates.
fn print_locations(locations: &[Location], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(locations)?);
    } else {
        for location in locations {
            println!(
                "{}:{}:{}",
                location.file,
                location.range.start.line + 1,
                location.range.start.character + 1
            );
        }
    }
    Ok(())
}

fn print_highlights(spans: &[HighlightSpan], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(spans)?);
    } else {
        for span in spans {
            println!(
                "{}:{}-{}:{} {}",
                span.range.start.line + 1,
                span.range.start.character + 1,
                span.range.end.line + 1,
                span.range.end.character + 1,
                match span.role {
                    Role::Definition => "definition",
                    Role::Reference => "reference",
                }
            );
        }
    }
    Ok(())
}
