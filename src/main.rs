//! qxgen CLI
//!
//! Entry point for the `qxgen` command-line tool.

use std::path::{Path, PathBuf};
use std::process;

use chrono::Local;
use clap::{Parser, Subcommand};
use qxgen::config::{LoadedSettings, Settings};
use qxgen::fetch::{DocumentSource, FileSource};
use qxgen::pipeline::{build_preamble, generate, Pipeline, PipelineError, RunOptions};
use qxgen::store::write_atomic;
use qxgen::{load_overrides, logging};
use qxgen_merge::{merge_document, validate_mitm, Document, MergeOptions, Overrides};
use tracing::{debug, error, info};

const ENV_HELP: &str = "\
Environment (values wrapped in [] or {} are read as JSON):
  QX_MITM_PASSPHRASE=A24AB7DF
  QX_MITM_P12=MIILuwIBAzCCC4UGCSqGSIb3DQEHAaCCC3YE...
  QX_REWRITE_REMOTE='[\"https://example.com/rewrite.conf, tag=emby, enabled=true\"]'
  QX_SERVER_REMOTE='[\"https://example.com/subscribe, tag=mine, enabled=true\"]'
  QX_POLICIES='[\"static=Steam, proxy, direct\"]'
  QX_DNS=server=223.5.5.5
  QX_FILTER_LOCAL='[\"host-suffix, example.com, direct\"]'
  QX_SECTION_<NAME>='[\"line one\", \"line two\"]'
  QX_REPLACE_<ANY>='{\"search\": \"old\", \"replace\": \"new\"}'

Settings:
  QX_CONFIG_PATH, QX_BACKUP_DIR, QX_LOG_FILE, QX_CACHE_FILE, QX_REMOTE_URL,
  QX_TIMEOUT, QX_CACHE_MAX_AGE, QX_BACKUP_KEEP, QX_NOTIFY_URL, QX_HEADER";

#[derive(Parser)]
#[command(name = "qxgen")]
#[command(about = "Personalized QuantumultX configuration generator", version)]
#[command(after_help = ENV_HELP)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, merge, validate and write the configuration
    Run {
        /// Settings file (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Personal overrides file (TOML), layered under QX_* variables
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Output path (overrides QX_CONFIG_PATH)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Base document URL (overrides QX_REMOTE_URL)
        #[arg(long)]
        url: Option<String>,

        /// Fetch even when the cached document is fresh
        #[arg(long)]
        refresh: bool,

        /// Regenerate even when nothing changed
        #[arg(long)]
        force: bool,

        /// Merge and validate without writing
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge overrides into a local document
    Merge {
        /// Base document
        input: PathBuf,

        /// Settings file (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Personal overrides file (TOML), layered under QX_* variables
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Write here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Skip the certificate check
        #[arg(long)]
        no_validate: bool,
    },

    /// Check the certificate section of a configuration file
    Validate {
        file: PathBuf,
    },

    /// List the sections of a configuration file
    Sections {
        file: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            overrides,
            output,
            url,
            refresh,
            force,
            dry_run,
            json,
        } => {
            let cli_layer = cli_settings(output.as_deref(), url.as_deref());
            let loaded = build_settings(config.as_deref(), cli_layer);
            init_logging(cli.verbose, cli.quiet, loaded.settings.paths.log_file.as_deref());
            log_settings(&loaded);

            let overrides = load_personal(overrides.as_deref());
            let options = RunOptions {
                refresh,
                force,
                dry_run,
            };
            run_pipeline(&loaded.settings, &overrides, options, json);
        }
        Commands::Merge {
            input,
            config,
            overrides,
            output,
            no_validate,
        } => {
            let loaded = build_settings(config.as_deref(), None);
            init_logging(cli.verbose, cli.quiet, None);
            log_settings(&loaded);

            let overrides = load_personal(overrides.as_deref());
            run_merge(&loaded.settings, &input, &overrides, output.as_deref(), no_validate);
        }
        Commands::Validate { file } => {
            init_logging(cli.verbose, cli.quiet, None);
            run_validate(&file);
        }
        Commands::Sections { file, json } => {
            init_logging(cli.verbose, cli.quiet, None);
            run_sections(&file, json);
        }
    }
}

fn env_vars() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

fn cli_settings(output: Option<&Path>, url: Option<&str>) -> Option<serde_json::Value> {
    let mut layer = serde_json::Map::new();
    if let Some(output) = output {
        layer.insert(
            "paths".to_string(),
            serde_json::json!({ "output": output.to_string_lossy() }),
        );
    }
    if let Some(url) = url {
        layer.insert("remote_url".to_string(), serde_json::json!(url));
    }
    (!layer.is_empty()).then_some(serde_json::Value::Object(layer))
}

fn build_settings(config: Option<&Path>, cli_layer: Option<serde_json::Value>) -> LoadedSettings {
    match Settings::build(config, &env_vars(), cli_layer) {
        Ok(loaded) => loaded,
        Err(e) => {
            let e = PipelineError::from(e);
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) {
    if let Err(e) = logging::init_tracing(verbose, quiet, log_file) {
        eprintln!("Warning: {}", e);
    }
}

fn log_settings(loaded: &LoadedSettings) {
    for source in &loaded.sources {
        debug!(origin = ?source.origin, path = ?source.path, digest = ?source.digest, "settings layer");
    }
    match loaded.settings.to_redacted_json() {
        Ok(json) => debug!("effective settings:\n{}", json),
        Err(e) => debug!(error = %e, "cannot render settings"),
    }
}

fn load_personal(file: Option<&Path>) -> Overrides {
    match load_overrides(file, env_vars()) {
        Ok(overrides) => overrides,
        Err(e) => {
            let e = PipelineError::from(e);
            error!(error = %e, "cannot load personal overrides");
            process::exit(e.exit_code());
        }
    }
}

fn run_pipeline(settings: &Settings, overrides: &Overrides, options: RunOptions, json: bool) {
    let pipeline = Pipeline::from_settings(settings);
    let summary = pipeline.run(overrides, options);

    if json {
        match summary.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", summary.to_human());
    }

    process::exit(summary.exit_code);
}

fn run_merge(
    settings: &Settings,
    input: &Path,
    overrides: &Overrides,
    output: Option<&Path>,
    no_validate: bool,
) {
    let source = FileSource::new(input);
    let base = match source.fetch() {
        Ok(base) => base,
        Err(e) => exit_with(PipelineError::from(e)),
    };
    let preamble = settings
        .header
        .then(|| build_preamble(&source.describe(), Local::now()));

    let (text, report) = if no_validate {
        let outcome = merge_document(&Document::parse(&base), overrides, &MergeOptions { preamble });
        (outcome.text, outcome.report)
    } else {
        match generate(&base, overrides, preamble) {
            Ok(generated) => (generated.text, generated.report),
            Err(e) => exit_with(e),
        }
    };

    info!(
        lines_added = report.total_lines_added(),
        policies_added = report.policies_added.len(),
        skipped = report.skipped.len(),
        "merge complete"
    );

    match output {
        Some(path) => {
            if let Err(e) = write_atomic(path, &text) {
                exit_with(PipelineError::from(e));
            }
            info!(path = %path.display(), "configuration written");
        }
        None => print!("{}", text),
    }
}

fn run_validate(file: &Path) {
    let text = match FileSource::new(file).fetch() {
        Ok(text) => text,
        Err(e) => exit_with(PipelineError::from(e)),
    };

    match validate_mitm(&text) {
        Ok(lines) => {
            println!("Certificate section valid: {}", file.display());
            println!("  {}", qxgen::summary::preview(&lines.passphrase, 100));
            println!("  {}", qxgen::summary::preview(&lines.p12, 100));
        }
        Err(e) => exit_with(PipelineError::from(e)),
    }
}

fn run_sections(file: &Path, json: bool) {
    let text = match FileSource::new(file).fetch() {
        Ok(text) => text,
        Err(e) => exit_with(PipelineError::from(e)),
    };

    let doc = Document::parse(&text);
    let counts: Vec<(&str, usize)> = doc
        .sections()
        .iter()
        .map(|s| (s.name.as_str(), s.body.lines().filter(|l| !l.trim().is_empty()).count()))
        .collect();

    if json {
        let entries: Vec<serde_json::Value> = counts
            .iter()
            .map(|(name, lines)| serde_json::json!({ "name": name, "lines": lines }))
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        for (name, lines) in counts {
            println!("{:<16} {:>5}", name, lines);
        }
    }
}

fn exit_with(e: PipelineError) -> ! {
    eprintln!("Error: {}", e);
    process::exit(e.exit_code());
}
