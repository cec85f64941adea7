use bookpress::config::{self, ConfigSource, PressConfig};
use bookpress::engine::{CommandEngine, LayoutEngine, PaginationEngine};
use bookpress::model::{BookStatus, Manuscript};
use bookpress::pipeline::Publisher;
use bookpress::storage::{FsObjectStore, MemoryBookStore, ObjectStore};
use bookpress::{validation, Format};
use clap::{Arg, Command};
use log::{debug, error, info, warn};
#[cfg(feature = "fetch")]
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Debug)]
enum AppError {
    FileReadError(std::io::Error),
    ManuscriptError(String),
    ConversionError(String),
    PathError(String),
    #[cfg(feature = "fetch")]
    NetworkError(String),
}

/// Verbosity level for output
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verbosity {
    Quiet,   // No output except errors
    Normal,  // Standard output
    Verbose, // Detailed output
}

const LOCAL_CONFIG: &str = "bookpressrc.toml";

fn get_manuscript_input(matches: &clap::ArgMatches) -> Result<String, AppError> {
    if let Some(file_path) = matches.get_one::<String>("path") {
        return fs::read_to_string(file_path).map_err(AppError::FileReadError);
    }

    #[cfg(feature = "fetch")]
    if let Some(url) = matches.get_one::<String>("url") {
        return Client::new()
            .get(url)
            .send()
            .map_err(|e| AppError::NetworkError(e.to_string()))?
            .text()
            .map_err(|e| AppError::NetworkError(e.to_string()));
    }

    Err(AppError::ManuscriptError("No input provided".to_string()))
}

/// Path of the configuration file to use, if any.
///
/// Priority order:
/// 1. `--config` when given
/// 2. `bookpressrc.toml` in the current directory
/// 3. `bookpress/config.toml` in the user configuration directory
fn get_config_path(matches: &clap::ArgMatches) -> Option<String> {
    if let Some(config_file) = matches.get_one::<String>("config") {
        return Some(config_file.to_string());
    }

    if Path::new(LOCAL_CONFIG).exists() {
        return Some(LOCAL_CONFIG.to_string());
    }

    dirs::config_dir()
        .map(|dir| dir.join("bookpress").join("config.toml"))
        .filter(|path| path.is_file())
        .map(|path| path.display().to_string())
}

fn get_format(matches: &clap::ArgMatches) -> Result<Format, AppError> {
    matches
        .get_one::<String>("format")
        .map(|f| f.parse::<Format>())
        .unwrap_or(Ok(Format::Pdf))
        .map_err(AppError::ConversionError)
}

fn get_output_path(matches: &clap::ArgMatches, format: Format) -> Result<PathBuf, AppError> {
    let current_dir = std::env::current_dir().map_err(|e| AppError::PathError(e.to_string()))?;

    Ok(matches
        .get_one::<String>("output")
        .map(|p| current_dir.join(p))
        .unwrap_or_else(|| current_dir.join(format!("book.{}", format.extension()))))
}

/// Writes one standalone HTML document per part into `dir`.
fn write_split_parts(
    manuscript: &Manuscript,
    config: &PressConfig,
    dir: &Path,
) -> Result<usize, AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::PathError(format!("{}: {}", dir.display(), e)))?;
    let assembler = bookpress::assemble::Assembler::new(config);
    let mut written = 0;
    for fragment in assembler.fragments(&manuscript.book, &manuscript.parts) {
        let path = dir.join(format!(
            "{:04}-{}.html",
            fragment.part_index, fragment.part_type
        ));
        let html = assembler.assemble_fragment(&manuscript.book, &fragment);
        fs::write(&path, html)
            .map_err(|e| AppError::PathError(format!("{}: {}", path.display(), e)))?;
        debug!("wrote {}", path.display());
        written += 1;
    }
    Ok(written)
}

/// Runs the publishing pipeline: per-part pagination through `engine`, artifacts kept in
/// `store`, then merge and stamp.
fn publish_through_pipeline(
    manuscript: Manuscript,
    config: &PressConfig,
    engine: &dyn PaginationEngine,
    store: &FsObjectStore,
    verbosity: Verbosity,
) -> Result<Vec<u8>, AppError> {
    let mut manuscript = manuscript;
    if manuscript.book.status == BookStatus::GeneratingContent {
        manuscript.book.status = BookStatus::ContentReady;
    }
    let book_id = manuscript.book.id.clone();
    let books = MemoryBookStore::new();
    books.insert(manuscript);

    let publisher = Publisher::new(config, &books, store, engine);
    let report = publisher
        .publish(&book_id)
        .map_err(|e| AppError::ConversionError(e.to_string()))?;
    if verbosity == Verbosity::Verbose {
        info!(
            "📄 {} part(s) rendered, {} reused, {} skipped, {} page(s)",
            report.rendered.len(),
            report.reused.len(),
            report.skipped.len(),
            report.pages
        );
    }
    let locator = report
        .locator
        .ok_or_else(|| AppError::ConversionError("no merged book was stored".to_string()))?;
    store
        .get(&locator)
        .map_err(|e| AppError::ConversionError(e.to_string()))
}

fn run(matches: clap::ArgMatches) -> Result<(), AppError> {
    // Determine verbosity level
    let verbosity = if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };

    let dry_run = matches.get_flag("dry-run");

    let input = get_manuscript_input(&matches)?;
    let manuscript =
        Manuscript::from_json(&input).map_err(|e| AppError::ManuscriptError(e.to_string()))?;
    let format = get_format(&matches)?;
    let output_path = get_output_path(&matches, format)?;
    let output_path_str = output_path
        .to_str()
        .ok_or_else(|| AppError::PathError("Invalid output path".to_string()))?;

    let warnings = validation::validate_manuscript(&manuscript);
    if verbosity != Verbosity::Quiet {
        if !warnings.is_empty() {
            if verbosity == Verbosity::Verbose {
                info!("🔍 Pre-flight validation:");
            }
            for warning in &warnings {
                warn!("{}", warning);
            }
        } else if verbosity == Verbosity::Verbose {
            info!("✓ Pre-flight validation passed");
        }
    }
    if dry_run {
        if verbosity == Verbosity::Quiet {
            if warnings.is_empty() {
                return Ok(());
            }
            return Err(AppError::ManuscriptError(format!(
                "{} validation warnings",
                warnings.len()
            )));
        }
        println!("✓ Dry-run validation complete. No document generated.");
        if warnings.is_empty() {
            println!("✓ No issues detected. Run without --dry-run to publish.");
        } else {
            println!(
                "⚠️  {} warning(s) found. Review above and run without --dry-run to publish anyway.",
                warnings.len()
            );
        }
        return Ok(());
    }

    let config_path = get_config_path(&matches);
    let config = match &config_path {
        Some(path) => {
            debug!("using configuration {}", path);
            config::load_config_from_source(ConfigSource::File(path))
        }
        None => config::load_config_from_source(ConfigSource::Default),
    };

    if let Some(dump_path) = matches.get_one::<String>("dump-model") {
        manuscript
            .save_to_json_file(dump_path)
            .map_err(|e| AppError::PathError(format!("{}: {}", dump_path, e)))?;
        if verbosity != Verbosity::Quiet {
            println!("✅ Saved content model to {}", dump_path);
        }
    }

    if let Some(split_dir) = matches.get_one::<String>("split") {
        let written = write_split_parts(&manuscript, &config, Path::new(split_dir))?;
        if verbosity != Verbosity::Quiet {
            println!("✅ Saved {} part document(s) to {}", written, split_dir);
        }
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(AppError::PathError(format!(
                "Output directory {} does not exist",
                parent.display()
            )));
        }
    }

    if verbosity == Verbosity::Verbose {
        info!(
            "📄 Publishing {:?} ({} part(s)) as {}...",
            manuscript.book.title,
            manuscript.parts.len(),
            format.extension()
        );
    }

    let engine_name = matches
        .get_one::<String>("engine")
        .map(String::as_str)
        .unwrap_or("layout");
    let store_root = matches
        .get_one::<String>("store")
        .map(PathBuf::from)
        .or_else(|| config.storage_root.clone());
    let use_pipeline = format == Format::Pdf && (engine_name == "command" || store_root.is_some());

    let bytes = if use_pipeline {
        let engine: Box<dyn PaginationEngine> = match engine_name {
            "command" => Box::new(CommandEngine::new(&config.engine)),
            _ => Box::new(LayoutEngine::new(&config)),
        };
        let scratch;
        let root = match store_root {
            Some(root) => root,
            None => {
                scratch = tempfile::tempdir().map_err(|e| AppError::PathError(e.to_string()))?;
                scratch.path().to_path_buf()
            }
        };
        let store = FsObjectStore::new(root);
        publish_through_pipeline(manuscript, &config, engine.as_ref(), &store, verbosity)?
    } else {
        bookpress::publish_into_bytes(&manuscript, format, &config)
            .map_err(|e| AppError::ConversionError(e.to_string()))?
    };

    fs::write(&output_path, &bytes)
        .map_err(|e| AppError::PathError(format!("{}: {}", output_path_str, e)))?;

    if verbosity != Verbosity::Quiet {
        println!(
            "✅ Successfully saved {} to {}",
            format.extension().to_uppercase(),
            output_path_str
        );

        // Show file size in verbose mode
        if verbosity == Verbosity::Verbose {
            let size_kb = bytes.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.2} MB", size_kb / 1024.0);
            }
        }
    }

    Ok(())
}

fn build_cli() -> Command {
    let cmd = Command::new("bookpress")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assemble generated book parts into HTML, PDF or DOCX")
        .after_help(
            "EXAMPLES:\n  \
            bookpress -p book.json -o book.pdf\n  \
            bookpress -p book.json -f docx\n  \
            bookpress -p book.json --engine command --store ./artifacts\n  \
            bookpress -p book.json --verbose --dry-run\n",
        )
        .arg({
            let arg = Arg::new("path")
                .short('p')
                .long("path")
                .value_name("FILE_PATH")
                .help("Path to the manuscript JSON file (a book record and its parts)");
            #[cfg(feature = "fetch")]
            let arg = arg.conflicts_with("url");
            arg
        });

    #[cfg(feature = "fetch")]
    let cmd = cmd.arg(
        Arg::new("url")
            .short('u')
            .long("url")
            .value_name("URL")
            .help("URL to fetch the manuscript JSON from (requires 'fetch' feature)")
            .conflicts_with("path"),
    );

    cmd.arg(
        Arg::new("format")
            .short('f')
            .long("format")
            .value_name("FORMAT")
            .value_parser(["html", "pdf", "docx"])
            .help("Output format (defaults to pdf)"),
    )
    .arg(
        Arg::new("output")
            .short('o')
            .long("output")
            .value_name("OUTPUT_PATH")
            .help("Path to the output file (defaults to ./book.<format>)"),
    )
    .arg(
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("CONFIG_FILE")
            .help("Path to configuration file (TOML format). Auto-detects bookpressrc.toml if not specified"),
    )
    .arg(
        Arg::new("engine")
            .long("engine")
            .value_name("ENGINE")
            .value_parser(["layout", "command"])
            .help("Pagination engine for PDF output: in-process layout or the [engine] command"),
    )
    .arg(
        Arg::new("store")
            .long("store")
            .value_name("DIR")
            .help(
                "Keep per-part PDF artifacts in DIR and reuse unchanged ones on later runs \
                 (overrides [storage] root)",
            ),
    )
    .arg(
        Arg::new("split")
            .long("split")
            .value_name("DIR")
            .help("Also write one standalone HTML document per part into DIR"),
    )
    .arg(
        Arg::new("dump-model")
            .long("dump-model")
            .value_name("FILE")
            .help("Write the decoded content model as JSON to FILE"),
    )
    .arg(
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("Show detailed output including validation warnings and file size")
            .action(clap::ArgAction::SetTrue)
            .conflicts_with("quiet"),
    )
    .arg(
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .help("Suppress all output except errors")
            .action(clap::ArgAction::SetTrue)
            .conflicts_with("verbose"),
    )
    .arg(
        Arg::new("dry-run")
            .long("dry-run")
            .help("Validate the manuscript without generating a document")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        Arg::new("get-default-configuration")
            .long("get-default-configuration")
            .help("Print a default bookpressrc.toml to stdout and exit")
            .action(clap::ArgAction::SetTrue),
    )
}

fn main() {
    // Initialize logger with environment variable control (RUST_LOG)
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let mut cmd = build_cli();
    let matches = cmd.clone().get_matches();

    if matches.get_flag("get-default-configuration") {
        println!("{}", config::default_config_toml());
        process::exit(0);
    }

    #[cfg(feature = "fetch")]
    let has_url = matches.contains_id("url");
    #[cfg(not(feature = "fetch"))]
    let has_url = false;

    if !matches.contains_id("path") && !has_url {
        let _ = cmd.print_help();
        println!();
        process::exit(1);
    }

    if let Err(e) = run(matches) {
        match e {
            AppError::FileReadError(e) => error!("[X] Error reading file: {}", e),
            AppError::ManuscriptError(e) => error!("[X] Manuscript error: {}", e),
            AppError::ConversionError(e) => error!("[X] Conversion error: {}", e),
            AppError::PathError(e) => error!("[X] Path error: {}", e),
            #[cfg(feature = "fetch")]
            AppError::NetworkError(e) => error!("[X] Network error: {}", e),
        }
        process::exit(1);
    }
}
