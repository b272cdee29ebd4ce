//! Catena Schema CLI
//!
//! Validates a device or parameter description against the Catena schema.

use std::io::Read;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use catena_schema::{
    load_document, parse_document, read_bytes, validate, verify_digest, Format, LoadError,
    LoaderOptions, Locator, Outcome, ParsedDocument, SchemaRegistry,
};

#[derive(Parser)]
#[command(name = "catena-validate")]
#[command(about = "Validate Catena device and parameter descriptions")]
#[command(version)]
struct Cli {
    /// Input file path or URL (http://, https://, file://), or - for stdin.
    /// The file name's first dot-separated segment names the schema,
    /// e.g. param.on_off.yaml is validated against "param"
    input: String,

    /// Expected hex SHA-256 digest of the input bytes
    digest: Option<String>,

    /// Schema definition document: file path or URL
    #[arg(long, env = "CATENA_SCHEMA", default_value = "interface/schemata/schema.json")]
    schema: String,

    /// Schema reference to apply instead of the one inferred from the file name
    #[arg(long, short)]
    reference: Option<String>,

    /// Input format (json or yaml); inferred from the extension when omitted
    #[arg(long, value_parser = parse_format)]
    format: Option<Format>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_format(s: &str) -> Result<Format, String> {
    Format::parse(s).ok_or_else(|| format!("unknown format '{}' (expected json or yaml)", s))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), u8> {
    let options = LoaderOptions::default();

    let reference = match &cli.reference {
        Some(reference) => reference.clone(),
        None => infer_reference(&cli.input).ok_or_else(|| {
            report_error(
                cli.json,
                &format!("cannot infer schema reference from '{}'; use --reference", cli.input),
            );
            2u8
        })?,
    };

    let registry = SchemaRegistry::load(&cli.schema, &options).map_err(|e| {
        report_error(cli.json, &format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;

    let document = load_input(cli, &options).map_err(|e| {
        report_error(cli.json, &e.to_string());
        e.exit_code() as u8
    })?;

    if !cli.json {
        println!("Applying schema '{}' to '{}'", reference, document.origin);
    }

    let outcome = validate(&registry, &reference, &document).map_err(|e| {
        report_error(cli.json, &e.to_string());
        e.exit_code() as u8
    })?;

    if cli.json {
        let output = serde_json::to_string(&outcome).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        print_outcome(&outcome);
    }

    match outcome.exit_code() {
        0 => Ok(()),
        code => Err(code as u8),
    }
}

/// Schema reference from the input's file name: `device.my-device.json` → `device`.
fn infer_reference(input: &str) -> Option<String> {
    if input == "-" {
        return None;
    }
    let name = Locator::parse(input).ok()?.file_name()?;
    let reference = name.split('.').next()?;
    (!reference.is_empty()).then(|| reference.to_string())
}

fn load_input(cli: &Cli, options: &LoaderOptions) -> Result<ParsedDocument, LoadError> {
    if cli.input == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|source| LoadError::ReadError {
                path: "<stdin>".into(),
                source,
            })?;
        return parse_bytes(bytes, cli.format, cli.digest.as_deref(), "<stdin>");
    }

    let locator = Locator::parse(&cli.input)?;
    match cli.format {
        None => load_document(&locator, cli.digest.as_deref(), options),
        Some(format) => {
            let bytes = read_bytes(&locator, options)?;
            parse_bytes(bytes, Some(format), cli.digest.as_deref(), &locator.to_string())
        }
    }
}

/// Verify and parse raw input bytes; without an explicit format the text is sniffed.
fn parse_bytes(
    bytes: Vec<u8>,
    format: Option<Format>,
    digest: Option<&str>,
    origin: &str,
) -> Result<ParsedDocument, LoadError> {
    if let Some(expected) = digest {
        verify_digest(&bytes, expected, origin)?;
    }
    let text = String::from_utf8(bytes).map_err(|_| LoadError::NotUtf8 {
        origin: origin.to_string(),
    })?;
    let format = format.unwrap_or_else(|| Format::sniff(&text));
    parse_document(&text, format, origin)
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Valid { .. } => println!("Validation succeeded."),
        Outcome::Invalid { diagnostics } => {
            for diagnostic in diagnostics {
                println!("  {}", diagnostic);
            }
            println!("Validation failed.");
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
