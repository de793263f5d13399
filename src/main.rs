use clap::{Parser as ClapParser, Subcommand};
use ssc_gen::cli::{self, AstOptions, CliError, JsonSchemaOptions};
use ssc_gen::config::BuildOptions;
use ssc_gen::selector::DEFAULT_XPATH_PREFIX;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "sscgen")]
#[command(about = "ssc-gen - check schema declarations and lower them to an extractor IR")]
#[command(version)]
struct Cli {
    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and statically check a declaration module
    Check {
        /// Declaration module (reads from stdin if not provided)
        file: Option<PathBuf>,
    },

    /// Print the module IR as JSON
    Ast {
        /// Declaration module (reads from stdin if not provided)
        file: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Rewrite CSS queries into XPath
        #[arg(long, conflicts_with = "xpath_to_css")]
        css_to_xpath: bool,

        /// Rewrite XPath queries into CSS
        #[arg(long)]
        xpath_to_css: bool,

        /// Axis prepended to converted XPath queries
        #[arg(long, default_value = DEFAULT_XPATH_PREFIX)]
        xpath_prefix: String,

        /// Leave docstrings and output signatures out
        #[arg(long)]
        no_docstring: bool,
    },

    /// Infer `json` declarations from a sample document
    JsonSchema {
        /// Entry schema name
        #[arg(short, long, default_value = "Main")]
        name: String,

        /// Dotted path to the described object, e.g. `props.0.items`
        #[arg(short, long, default_value = "")]
        start: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Check { file } => run_check(file),
        Commands::Ast {
            file,
            pretty,
            css_to_xpath,
            xpath_to_css,
            xpath_prefix,
            no_docstring,
        } => {
            let build = BuildOptions::default()
                .gen_docstring(!no_docstring)
                .css_to_xpath(css_to_xpath)
                .xpath_to_css(xpath_to_css)
                .xpath_prefix(&xpath_prefix);
            run_ast(file, pretty, build)
        }
        Commands::JsonSchema { name, start, input } => run_json_schema(name, start, input),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// stderr only; stdout carries the command output
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_stdin() -> Result<Option<String>, CliError> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(Some(buffer))
}

fn read_source(file: Option<PathBuf>) -> Result<String, CliError> {
    match file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => read_stdin()?.ok_or(CliError::NoInput),
    }
}

fn run_check(file: Option<PathBuf>) -> Result<(), CliError> {
    let source = read_source(file)?;
    let report = cli::execute_check(&source)?;

    for warning in &report.warnings {
        eprintln!("{}", warning);
    }
    println!(
        "OK: {} schema(s), {} json schema(s)",
        report.schemas.len(),
        report.json_schemas
    );
    Ok(())
}

fn run_ast(file: Option<PathBuf>, pretty: bool, build: BuildOptions) -> Result<(), CliError> {
    let options = AstOptions {
        source: read_source(file)?,
        pretty,
        build,
    };
    let (json, warnings) = cli::execute_ast(&options)?;

    for warning in &warnings {
        eprintln!("{}", warning);
    }
    println!("{}", json);
    Ok(())
}

fn run_json_schema(name: String, start: String, input: Option<String>) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None => read_stdin()?,
    };
    let options = JsonSchemaOptions { input, name, start };

    print!("{}", cli::execute_json_schema(&options)?);
    Ok(())
}
