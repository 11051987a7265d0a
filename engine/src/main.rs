//! Delimit CLI - read and convert delimited text files
//!
//! # Commands
//!
//! ```bash
//! delimit read input.csv                      # Typed rows as JSON lines
//! delimit read input.txt --delimiter Tab      # Any dialect
//! delimit convert input.csv --to json         # Convert to JSON, XML, fixed width or CSV
//! delimit pattern "dd/MM/yyyy HH:mm"          # Length range of a date/time pattern
//! ```
//!
//! Logging is configured through `RUST_LOG` (default `warn`).

use clap::{Args, Parser, Subcommand, ValueEnum};
use delimit::{
    decode_auto, decode_content, parse_punctuation, CancellationToken, ColumnCollection, CsvReader,
    DateTimeFormatInformation, DialectConfig, Diagnostics, FileWriter, OutputKind, WriterOptions,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "delimit")]
#[command(about = "Read and convert delimited, fixed-width and structured text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a file and print its typed rows as JSON, one object per line
    Read {
        /// Input file
        input: PathBuf,

        #[command(flatten)]
        dialect: DialectArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Read a file and write it in another format
    Convert {
        /// Input file
        input: PathBuf,

        #[command(flatten)]
        dialect: DialectArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "delimited")]
        to: Format,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Delimiter of delimited output (default: the input delimiter)
        #[arg(long)]
        out_delimiter: Option<String>,
    },

    /// Show the shortest and longest text of a date/time pattern
    Pattern {
        /// .NET style pattern, e.g. "dd/MM/yyyy HH:mm"
        pattern: String,

        #[arg(long, default_value = "/")]
        date_separator: String,

        #[arg(long, default_value = ":")]
        time_separator: String,
    },
}

#[derive(Args, Clone, Default)]
struct DialectArgs {
    /// Settings file with "dialect", "columns" and "writer" sections
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Field delimiter, a character or a name such as Tab or Semicolon
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Text qualifier, "None" to disable
    #[arg(long)]
    qualifier: Option<String>,

    /// Escape prefix, "None" to disable
    #[arg(long)]
    escape: Option<String>,

    /// The first row holds data, not column names
    #[arg(long)]
    no_header: bool,

    /// Prefix of comment lines
    #[arg(long)]
    comment: Option<String>,

    /// Lines to skip before the header
    #[arg(long)]
    skip_rows: Option<usize>,

    /// Input encoding (default: detected)
    #[arg(long)]
    encoding: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Delimited,
    FixedWidth,
    Json,
    Xml,
}

impl From<Format> for OutputKind {
    fn from(format: Format) -> Self {
        match format {
            Format::Delimited => OutputKind::Delimited,
            Format::FixedWidth => OutputKind::FixedWidth,
            Format::Json => OutputKind::Json,
            Format::Xml => OutputKind::Xml,
        }
    }
}

/// Contents of a `--settings` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    dialect: DialectConfig,
    columns: ColumnCollection,
    writer: WriterOptions,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Read {
            input,
            dialect,
            output,
        } => cmd_read(&input, &dialect, output.as_deref()).await,

        Commands::Convert {
            input,
            dialect,
            to,
            output,
            out_delimiter,
        } => cmd_convert(&input, &dialect, to, output.as_deref(), out_delimiter.as_deref()).await,

        Commands::Pattern {
            pattern,
            date_separator,
            time_separator,
        } => cmd_pattern(&pattern, &date_separator, &time_separator),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter);
    tracing_subscriber::registry().with(console_layer).init();
}

/// Settings file first, then command line overrides.
async fn load_settings(args: &DialectArgs) -> CliResult<Settings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&text)?
        }
        None => Settings::default(),
    };

    // Warnings about the options themselves go to the log
    let mut diagnostics = Diagnostics::new();
    let dialect = &mut settings.dialect;
    if let Some(text) = &args.delimiter {
        if let Some(c) = parse_punctuation(text, &mut diagnostics) {
            dialect.field_delimiter = c;
        }
    }
    if let Some(text) = &args.qualifier {
        dialect.field_qualifier = parse_punctuation(text, &mut diagnostics);
    }
    if let Some(text) = &args.escape {
        dialect.escape_prefix = parse_punctuation(text, &mut diagnostics);
    }
    if args.no_header {
        dialect.has_field_header = false;
    }
    if let Some(comment) = &args.comment {
        dialect.comment_line = comment.clone();
    }
    if let Some(rows) = args.skip_rows {
        dialect.skip_rows = rows;
    }
    dialect.validate()?;
    Ok(settings)
}

/// Read and decode the input file, then open a reader over the text.
async fn open_reader(
    input: &Path,
    args: &DialectArgs,
    settings: &Settings,
) -> CliResult<CsvReader<Cursor<Vec<u8>>>> {
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| delimit::ReaderError::open(input, e))?;
    let (text, encoding) = match &args.encoding {
        Some(encoding) => (decode_content(&bytes, encoding), encoding.clone()),
        None => decode_auto(&bytes),
    };
    eprintln!("📄 Reading: {}", input.display());
    eprintln!("   Encoding: {}", encoding);
    eprintln!(
        "   Delimiter: '{}'",
        format_delimiter(settings.dialect.field_delimiter)
    );

    let stream = Cursor::new(text.into_owned().into_bytes());
    Ok(CsvReader::new(
        stream,
        settings.dialect.clone(),
        settings.columns.clone(),
    )?)
}

async fn cmd_read(input: &Path, args: &DialectArgs, output: Option<&Path>) -> CliResult<()> {
    let settings = load_settings(args).await?;
    let mut reader = open_reader(input, args, &settings).await?;
    let cancel = CancellationToken::new();

    let mut lines = String::new();
    while let Some(record) = reader.read_record(&cancel).await? {
        let values = reader.convert(&record).await?;
        let mut object = Map::new();
        for (column, value) in reader.columns().iter().zip(&values) {
            if !column.ignore() {
                object.insert(column.output_name().to_string(), value.to_json());
            }
        }
        lines.push_str(&Value::Object(object).to_string());
        lines.push('\n');
    }

    eprintln!(
        "   Columns: {}",
        reader
            .columns()
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!("✅ Read {} records", reader.record_count());
    eprintln!("   {}", reader.diagnostics().report().summary());

    write_output(&lines, output).await
}

async fn cmd_convert(
    input: &Path,
    args: &DialectArgs,
    to: Format,
    output: Option<&Path>,
    out_delimiter: Option<&str>,
) -> CliResult<()> {
    let settings = load_settings(args).await?;
    let mut reader = open_reader(input, args, &settings).await?;

    let mut dialect = settings.dialect.clone();
    if let Some(text) = out_delimiter {
        if let Some(c) = parse_punctuation(text, &mut Diagnostics::new()) {
            dialect.field_delimiter = c;
        }
    }
    let options = WriterOptions {
        output: to.into(),
        ..settings.writer.clone()
    };

    let mut writer = FileWriter::new(dialect, settings.columns.clone(), options)?;
    let cancel = CancellationToken::new();
    let records = match output {
        Some(path) => writer.write_file(&mut reader, path, &cancel).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            let records = writer.write(&mut reader, &mut stdout, &cancel).await?;
            stdout.flush().await?;
            records
        }
    };

    eprintln!("✅ Wrote {} records", records);
    eprintln!("   Reader: {}", reader.diagnostics().report().summary());
    eprintln!("   Writer: {}", writer.diagnostics().report().summary());
    if let Some(path) = output {
        eprintln!("   💾 Saved to: {}", path.display());
    }
    Ok(())
}

fn cmd_pattern(pattern: &str, date_separator: &str, time_separator: &str) -> CliResult<()> {
    let info = DateTimeFormatInformation::new(pattern, date_separator, time_separator);
    println!("{}: {} to {} characters", pattern, info.min_length, info.max_length);
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

async fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            tokio::fs::write(p, content).await?;
            eprintln!("   💾 Saved to: {}", p.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
