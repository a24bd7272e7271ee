//! Command line configuration for the `trellis` binary.
//!
//! Every flag can also be supplied through the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TRELLIS_LOG_LEVEL` | warn | Log level |
//! | `TRELLIS_FORMAT` | from extension | Input format (`xml` or `json`) |
//! | `TRELLIS_PRETTY` | false | Indent re-encoded output |
//! | `TRELLIS_OMIT_DECLARATION` | false | Skip the XML declaration |
//! | `TRELLIS_DEFAULT_NAMESPACE` | none | Default XML namespace of the output |

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use trellis_serde::{Format, TreeSettings};

/// Inspect and reformat XML and JSON documents.
#[derive(Debug, Clone, Parser)]
#[command(name = "trellis")]
#[command(about = "Inspect and reformat XML and JSON documents")]
pub struct CliConfig {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TRELLIS_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse a document and encode it again.
    Fmt(FmtArgs),
    /// List every node path with its kind and value.
    Paths(PathsArgs),
}

/// Document format accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Xml,
    Json,
}

impl From<FormatArg> for Format {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Xml => Format::Xml,
            FormatArg::Json => Format::Json,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Document to read.
    pub input: PathBuf,

    /// Input format. Defaults to the file extension.
    #[arg(long, value_enum, env = "TRELLIS_FORMAT")]
    pub format: Option<FormatArg>,
}

impl InputArgs {
    /// Explicit format, else the one implied by the file extension.
    pub fn resolve_format(&self) -> Option<Format> {
        self.format
            .map(Format::from)
            .or_else(|| format_from_extension(&self.input))
    }
}

#[derive(Debug, Clone, Args)]
pub struct FmtArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Indent nested nodes.
    #[arg(long, env = "TRELLIS_PRETTY")]
    pub pretty: bool,

    /// Skip the XML declaration.
    #[arg(long, env = "TRELLIS_OMIT_DECLARATION")]
    pub omit_declaration: bool,

    /// Namespace URI written as the default XML namespace.
    #[arg(long, env = "TRELLIS_DEFAULT_NAMESPACE")]
    pub default_namespace: Option<String>,

    /// Output file. Writes to stdout when absent.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl FmtArgs {
    pub fn settings(&self) -> TreeSettings {
        TreeSettings {
            pretty_print: self.pretty,
            omit_declaration: self.omit_declaration,
            default_namespace: self.default_namespace.clone(),
            ..TreeSettings::default()
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PathsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Emit one JSON object per node instead of tab-separated text.
    #[arg(long)]
    pub json: bool,
}

impl CliConfig {
    fn input(&self) -> &InputArgs {
        match &self.command {
            Command::Fmt(args) => &args.input,
            Command::Paths(args) => &args.input,
        }
    }

    /// Validates the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let input = self.input();

        if !input.input.is_file() {
            errors.push(format!("Input file not found: {}", input.input.display()));
        }

        if input.resolve_format().is_none() {
            errors.push(format!(
                "Cannot infer the format of {}; pass --format xml or --format json",
                input.input.display()
            ));
        }

        if let Command::Fmt(args) = &self.command
            && args.default_namespace.as_deref().is_some_and(str::is_empty)
        {
            errors.push("Default namespace cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn format_from_extension(path: &Path) -> Option<Format> {
    let extension = path.extension()?.to_str()?;
    if extension.eq_ignore_ascii_case("xml") {
        Some(Format::Xml)
    } else if extension.eq_ignore_ascii_case("json") {
        Some(Format::Json)
    } else {
        None
    }
}

/// Installs the global tracing subscriber. Logs go to stderr so that
/// document output on stdout stays clean.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trellis_serde={level},trellis={level}")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(format_from_extension(Path::new("a/b.xml")), Some(Format::Xml));
        assert_eq!(format_from_extension(Path::new("b.JSON")), Some(Format::Json));
        assert_eq!(format_from_extension(Path::new("b.txt")), None);
        assert_eq!(format_from_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_explicit_format_wins() {
        let config = parse(&["trellis", "paths", "data.txt", "--format", "json"]);
        let Command::Paths(args) = &config.command else {
            panic!("expected paths command");
        };
        assert_eq!(args.input.resolve_format(), Some(Format::Json));
        assert!(!args.json);
    }

    #[test]
    fn test_fmt_flags() {
        let config = parse(&[
            "trellis",
            "fmt",
            "in.xml",
            "--pretty",
            "--default-namespace",
            "urn:x",
            "-o",
            "out.xml",
        ]);
        let Command::Fmt(args) = &config.command else {
            panic!("expected fmt command");
        };
        let settings = args.settings();
        assert!(settings.pretty_print);
        assert!(!settings.omit_declaration);
        assert_eq!(settings.default_namespace.as_deref(), Some("urn:x"));
        assert_eq!(args.output.as_deref(), Some(Path::new("out.xml")));
    }

    #[test]
    fn test_validate_missing_input() {
        let config = parse(&["trellis", "fmt", "/definitely/not/here.data"]);
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("not found")));
        assert!(errors.iter().any(|e| e.contains("--format")));
    }

    #[test]
    fn test_validate_existing_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{}").unwrap();

        let config = parse(&["trellis", "paths", path.to_str().unwrap()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        std::fs::write(&path, "<a/>").unwrap();

        let config = parse(&[
            "trellis",
            "fmt",
            path.to_str().unwrap(),
            "--default-namespace",
            "",
        ]);
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("namespace")));
    }
}
