use anyhow::{Context, Result};
use batch_renamer_core::{
    app_paths, build_plan, ensure_probe_available, load_config, run_batch, save_config,
    AppConfig, Pipeline, Placement, RenameOptions, ResolutionProber,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "batch-renamer")]
#[command(about = "Batch rename the files of a directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rename(RenameArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, Args)]
struct RenameArgs {
    /// Directory to rename files in, empty for the current directory
    #[arg(short, long)]
    path: Option<PathBuf>,
    #[arg(long, default_value = "")]
    prefix: String,
    #[arg(long, default_value = "")]
    suffix: String,
    /// Replace the base name; `<empty>` clears it when composing segments
    #[arg(long = "override", default_value = "")]
    override_name: String,
    /// Joins composed segments (default from config, `_`)
    #[arg(long)]
    separator: Option<String>,
    /// Only rename files whose name matches this regex
    #[arg(long, default_value = "")]
    include: String,
    /// Skip files whose name matches this regex
    #[arg(long, default_value = "")]
    exclude: String,
    /// Regex substitution on the base name, `old=new`
    #[arg(long, default_value = "")]
    replace: String,
    /// Add the created date, e.g. `Y-M-D`; prefix with `suffix` to append
    #[arg(long, default_value = "")]
    created_date: String,
    /// Add the media resolution before or after the name
    #[arg(long, value_enum)]
    detect_resolution: Option<PlacementArg>,
    /// Append the reduced aspect ratio to the resolution
    #[arg(long, default_value_t = false)]
    aspect_ratio: bool,
    #[arg(long, default_value_t = false)]
    allow_dir: bool,
    /// Add a random suffix to every name
    #[arg(long, default_value_t = false)]
    unique_suffix: bool,
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Skip the confirmation prompt
    #[arg(short, long, default_value_t = false)]
    yes: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlacementArg {
    Prefix,
    Suffix,
}

impl From<PlacementArg> for Placement {
    fn from(value: PlacementArg) -> Self {
        match value {
            PlacementArg::Prefix => Placement::Prefix,
            PlacementArg::Suffix => Placement::Suffix,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init => cmd_config_init(),
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;
    let prober = ResolutionProber::new(config.probe_tool.clone());
    let output_format = args.output;
    let options = rename_options(args, &config)?;

    tracing::debug!(
        path = %options.path.display(),
        dry_run = options.dry_run,
        probe_tool = %config.probe_tool,
        "resolved rename options"
    );

    ensure_probe_available(&options, &prober)?;
    let pipeline = Pipeline::new(&options, &prober)?;

    if let OutputFormat::Table = output_format {
        println!("Processing...");
    }
    let plan = build_plan(&pipeline)?;

    if let OutputFormat::Json = output_format {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        if options.dry_run {
            return Ok(());
        }
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut report = report_writer(output_format);
    run_batch(&plan, &options, &mut input, &mut report)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportStream {
    Stdout,
    Stderr,
}

/// Human-readable report text; kept off stdout when stdout carries JSON.
fn report_stream(format: OutputFormat) -> ReportStream {
    match format {
        OutputFormat::Table => ReportStream::Stdout,
        OutputFormat::Json => ReportStream::Stderr,
    }
}

fn report_writer(format: OutputFormat) -> Box<dyn Write> {
    match report_stream(format) {
        ReportStream::Stdout => Box::new(io::stdout()),
        ReportStream::Stderr => Box::new(io::stderr()),
    }
}

fn rename_options(flags: RenameArgs, config: &AppConfig) -> Result<RenameOptions> {
    let path = match flags.path {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => std::env::current_dir().context("failed to get current directory")?,
    };
    let defaults = RenameOptions::from_config(config);

    Ok(RenameOptions {
        path,
        prefix: flags.prefix,
        suffix: flags.suffix,
        override_name: flags.override_name,
        separator: flags.separator.unwrap_or_else(|| defaults.separator.clone()),
        include: flags.include,
        exclude: flags.exclude,
        replace: flags.replace,
        created_date: flags.created_date,
        detect_resolution: flags.detect_resolution.map(Into::into),
        aspect_ratio: flags.aspect_ratio || defaults.aspect_ratio,
        allow_dir: flags.allow_dir,
        unique_suffix: flags.unique_suffix,
        dry_run: flags.dry_run,
        yes: flags.yes,
        ..defaults
    })
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = save_config(&AppConfig::default())?;
    println!("wrote default config: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_keeps_report_off_stdout() {
        assert_eq!(report_stream(OutputFormat::Json), ReportStream::Stderr);
        assert_eq!(report_stream(OutputFormat::Table), ReportStream::Stdout);
    }

    #[test]
    fn rename_flags_override_config_defaults() {
        let cli = Cli::try_parse_from([
            "batch-renamer",
            "rename",
            "-p",
            "/photos",
            "--separator",
            "-",
            "--detect-resolution",
            "suffix",
            "--output",
            "json",
        ])
        .expect("valid arguments");
        let Commands::Rename(args) = cli.command else {
            panic!("expected rename command");
        };
        assert!(matches!(args.output, OutputFormat::Json));

        let config = AppConfig {
            separator: ".".to_string(),
            probe_workers: 7,
            ..AppConfig::default()
        };
        let options = rename_options(args, &config).expect("options");
        assert_eq!(options.path, PathBuf::from("/photos"));
        assert_eq!(options.separator, "-");
        assert_eq!(options.detect_resolution, Some(Placement::Suffix));
        assert_eq!(options.probe_workers, 7);
    }
}
