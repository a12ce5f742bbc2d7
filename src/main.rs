//! zenkoku - streaming tools for Japanese corporate registry CSV exports

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use zenkoku::config::{parse_delimiter, OutputFormat, ReadOptions, WriteOptions};
use zenkoku::diff::Differ;
use zenkoku::encoding::{detect_encoding, EncodingChoice, TextEncoding};
use zenkoku::error::exit_code_for;
use zenkoku::filter::{parse_date, Predicate, RowFilter};
use zenkoku::model::KeySpec;
use zenkoku::output::{
    DetectReport, DiffReport, ExtractReport, OutputFactory, OutputFormatter, PreviewReport,
    SplitReport,
};
use zenkoku::partition::{InputName, NameTemplate, Partitioner, DEFAULT_TEMPLATE};
use zenkoku::preview::preview;
use zenkoku::registry::RegistryExtractor;
use zenkoku::source::{ensure_not_input, CsvSink, CsvSource, RowSink};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Terminal,
    Json,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Terminal => OutputFormat::Terminal,
            CliOutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Split, filter and diff Japanese corporate registry CSV exports
#[derive(Parser, Debug)]
#[command(name = "zenkoku")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Report format
    #[arg(short, long, value_enum, default_value = "terminal", global = true)]
    format: CliOutputFormat,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show columns and the first rows matching optional filters; optionally export them
    Preview(PreviewArgs),
    /// Write rows added (and optionally removed) between two files, matched by key
    Diff(DiffArgs),
    /// Split a file into one file per prefecture (or any other column value)
    Split(SplitArgs),
    /// Extract a lead list from the raw national corporate-number registry
    Extract(ExtractArgs),
    /// Print the detected encoding of a file
    Detect(DetectArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Field separator (a single character, or \t)
    #[arg(long, default_value = ",")]
    sep: String,

    /// Input encoding, or 'auto' to detect it
    #[arg(long, default_value = "auto")]
    encoding: String,

    /// The input has no header row; columns are named col_1..col_N
    #[arg(long)]
    no_header: bool,
}

impl InputArgs {
    fn read_options(&self) -> Result<ReadOptions> {
        Ok(ReadOptions::new()
            .with_delimiter(parse_delimiter(&self.sep)?)
            .with_encoding(self.encoding.parse::<EncodingChoice>()?)
            .with_header(!self.no_header))
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output encoding
    #[arg(long, default_value = "utf-8-sig")]
    out_encoding: String,
}

impl OutputArgs {
    fn write_options(&self, input: &ReadOptions) -> Result<WriteOptions> {
        Ok(WriteOptions::new()
            .with_delimiter(input.delimiter)
            .with_encoding(self.out_encoding.parse::<TextEncoding>()?))
    }
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Input CSV path
    #[arg(long)]
    path: PathBuf,

    #[command(flatten)]
    input: InputArgs,

    /// Number of leading matching rows to show
    #[arg(long, default_value_t = 1)]
    head: usize,

    /// Column for --contains
    #[arg(long, requires = "contains")]
    filter_col: Option<String>,

    /// Keep rows whose --filter-col contains this text (case-insensitive)
    #[arg(long, requires = "filter_col")]
    contains: Option<String>,

    /// Keep rows dated on or after this day (YYYY-MM-DD)
    #[arg(long)]
    date_from: Option<String>,

    /// Column holding the date for --date-from
    #[arg(long, default_value = "date")]
    date_col: String,

    /// Write every matching row to this CSV
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,

    /// Columns to write, in order; missing ones are written empty
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "id,company,code,prefecture,date,homepage_url,contact_url,description"
    )]
    out_cols: Vec<String>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Previous export
    #[arg(long)]
    old: PathBuf,

    /// Current export
    #[arg(long)]
    new: PathBuf,

    /// Where to write added rows (header of --new)
    #[arg(long)]
    out_added: Option<PathBuf>,

    /// Where to write removed rows (header of --old)
    #[arg(long)]
    out_removed: Option<PathBuf>,

    /// Key column(s), comma-separated
    #[arg(long, default_value = "id")]
    key_cols: String,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// Input CSV path
    #[arg(long)]
    path: PathBuf,

    /// Output directory
    #[arg(long, default_value = "prefecture_split")]
    out_dir: PathBuf,

    /// Column to split on
    #[arg(long, default_value = "prefecture")]
    pref_col: String,

    /// Only emit these values; repeatable
    #[arg(long)]
    pref: Vec<String>,

    /// Output file name; placeholders {pref}, {partition_value}, {stem}, {base}
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    name_template: String,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Registry CSV (headerless)
    #[arg(long)]
    path: PathBuf,

    /// Output CSV path
    #[arg(long)]
    out: PathBuf,

    /// Keep corporations whose number was assigned after this day
    #[arg(long, default_value = "2015-10-05")]
    date_after: String,

    /// Keep corporations whose name contains this text
    #[arg(long, default_value = "株式会社")]
    name_contains: String,

    /// Input encoding, or 'auto' to detect it
    #[arg(long, default_value = "auto")]
    encoding: String,

    /// Output encoding
    #[arg(long, default_value = "utf-8")]
    out_encoding: String,
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// File to inspect
    #[arg(long)]
    path: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFactory::create(cli.format.into());
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    match cli.command {
        Command::Preview(args) => run_preview(args, formatter.as_ref(), &mut stdout),
        Command::Diff(args) => run_diff(args, formatter.as_ref(), &mut stdout),
        Command::Split(args) => run_split(args, formatter.as_ref(), &mut stdout),
        Command::Extract(args) => run_extract(args, formatter.as_ref(), &mut stdout),
        Command::Detect(args) => {
            let encoding = detect_encoding(&args.path)?;
            let report = DetectReport {
                path: args.path,
                encoding,
            };
            formatter.render_detect(&report, &mut stdout)
        }
    }
}

fn run_preview(
    args: PreviewArgs,
    formatter: &dyn OutputFormatter,
    stdout: &mut StandardStream,
) -> Result<()> {
    let read = args.input.read_options()?;
    let source = CsvSource::open(&args.path, &read)?;

    let mut filter = RowFilter::new();
    if let (Some(column), Some(needle)) = (&args.filter_col, &args.contains) {
        filter = filter.and(Predicate::contains(column.as_str(), needle));
    }
    if let Some(date_from) = &args.date_from {
        filter = filter.and(Predicate::date_from(args.date_col.as_str(), parse_date(date_from)?));
    }

    let mut export = match &args.out {
        Some(out) => {
            ensure_not_input(out, &[source.path()])?;
            let write = args.output.write_options(&read)?;
            Some(CsvSink::new(out, &write).with_layout(trimmed(&args.out_cols)))
        }
        None => None,
    };
    let result = preview(
        &source,
        &filter,
        args.head,
        export.as_mut().map(|sink| sink as &mut dyn RowSink),
    )
    .with_context(|| format!("Failed to preview {}", args.path.display()))?;

    let report = PreviewReport {
        path: args.path,
        encoding: source.encoding(),
        delimiter: char::from(read.delimiter),
        columns: result.columns.names().to_vec(),
        rows: result.rows.iter().map(|row| row.values().to_vec()).collect(),
        out: args.out,
        written: result.written,
    };
    formatter.render_preview(&report, stdout)
}

fn run_diff(
    args: DiffArgs,
    formatter: &dyn OutputFormatter,
    stdout: &mut StandardStream,
) -> Result<()> {
    let read = args.input.read_options()?;
    let write = args.output.write_options(&read)?;
    let old = CsvSource::open(&args.old, &read)?;
    let new = CsvSource::open(&args.new, &read)?;

    for out in args.out_added.iter().chain(&args.out_removed) {
        ensure_not_input(out, &[old.path(), new.path()])?;
    }

    let key = KeySpec::parse(&args.key_cols);
    let mut added = args.out_added.as_ref().map(|p| CsvSink::new(p, &write));
    let mut removed = args.out_removed.as_ref().map(|p| CsvSink::new(p, &write));

    let summary = Differ::new(key.clone())
        .diff(
            &old,
            &new,
            added.as_mut().map(|sink| sink as &mut dyn RowSink),
            removed.as_mut().map(|sink| sink as &mut dyn RowSink),
        )
        .with_context(|| {
            format!(
                "Failed to diff {} against {}",
                args.new.display(),
                args.old.display()
            )
        })?;

    let report = DiffReport {
        old: args.old,
        new: args.new,
        key_columns: key.columns().to_vec(),
        out_added: args.out_added,
        out_removed: args.out_removed,
        summary,
    };
    formatter.render_diff(&report, stdout)
}

fn run_split(
    args: SplitArgs,
    formatter: &dyn OutputFormatter,
    stdout: &mut StandardStream,
) -> Result<()> {
    let read = args.input.read_options()?;
    let write = args.output.write_options(&read)?;
    let source = CsvSource::open(&args.path, &read)?;

    let mut partitioner = Partitioner::new(args.pref_col.as_str(), args.out_dir.as_path())
        .with_template(NameTemplate::new(args.name_template.as_str()))
        .with_write_options(write);
    if !args.pref.is_empty() {
        partitioner = partitioner.with_include(args.pref.iter().map(|p| p.trim().to_string()));
    }

    let summary = partitioner
        .partition(&source, &InputName::from_path(source.path()))
        .with_context(|| format!("Failed to split {}", args.path.display()))?;

    let report = SplitReport {
        path: args.path,
        out_dir: args.out_dir,
        column: args.pref_col,
        summary,
    };
    formatter.render_split(&report, stdout)
}

fn run_extract(
    args: ExtractArgs,
    formatter: &dyn OutputFormatter,
    stdout: &mut StandardStream,
) -> Result<()> {
    let read = ReadOptions::new()
        .with_encoding(args.encoding.parse::<EncodingChoice>()?)
        .with_header(false);
    let write = WriteOptions::new().with_encoding(args.out_encoding.parse::<TextEncoding>()?);
    let assigned_after = parse_date(&args.date_after)?;
    let source = CsvSource::open(&args.path, &read)?;
    ensure_not_input(&args.out, &[source.path()])?;

    let mut sink = CsvSink::new(&args.out, &write);
    let summary = RegistryExtractor::new()
        .with_assigned_after(assigned_after)
        .with_name_contains(args.name_contains.as_str())
        .extract(&source, &mut sink)
        .with_context(|| format!("Failed to extract {}", args.path.display()))?;

    let report = ExtractReport {
        path: args.path,
        out: args.out,
        summary,
    };
    formatter.render_extract(&report, stdout)
}

/// Trim column names and drop blanks
fn trimmed(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
