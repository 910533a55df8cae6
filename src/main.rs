use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "certgen-rust",
    version,
    about = "Write recipient names onto certificate templates"
)]
struct Cli {
    /// Certificate template image (PNG/JPEG) containing a NAME placeholder
    #[arg(short = 't', long = "template")]
    template: Option<PathBuf>,

    /// Recipient names, comma or newline separated (stdin when omitted)
    #[arg(short = 'n', long = "names")]
    names: Option<String>,

    /// CSV file with a "name" column
    #[arg(short = 'c', long = "csv")]
    csv: Option<PathBuf>,

    /// Font display name (see --list-fonts); unknown names use the default
    #[arg(short = 'f', long = "font")]
    font: Option<String>,

    /// Output directory (default from settings [output] dir)
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Also collect the certificates into one A4 PDF at this path
    #[arg(short = 'p', long = "pdf")]
    pdf: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Replace certificates that already exist
    #[arg(long = "overwrite")]
    overwrite: bool,

    /// Center names on templates without a placeholder instead of failing
    #[arg(long = "allow-missing-placeholder")]
    allow_missing_placeholder: bool,

    /// Write the OCR word boxes and token list into the output directory
    #[arg(long = "debug-ocr")]
    debug_ocr: bool,

    /// Show registered fonts and exit
    #[arg(long = "list-fonts")]
    list_fonts: bool,

    /// Show languages installed for the OCR engine and exit
    #[arg(long = "show-ocr-languages")]
    show_ocr_languages: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    certgen_rust::logging::init(cli.verbose)?;

    let needs_input = cli.names.is_none()
        && cli.csv.is_none()
        && !(cli.list_fonts || cli.show_ocr_languages)
        && !io::stdin().is_terminal();
    let input = if needs_input {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let config = certgen_rust::Config {
        template: cli.template,
        names: cli.names,
        csv: cli.csv,
        font: cli.font,
        output_dir: cli.out_dir,
        pdf: cli.pdf,
        settings_path: cli.read_settings,
        overwrite: cli.overwrite,
        allow_missing_placeholder: cli.allow_missing_placeholder,
        debug_ocr: cli.debug_ocr,
        list_fonts: cli.list_fonts,
        show_ocr_languages: cli.show_ocr_languages,
    };
    let output = certgen_rust::run(config, input)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
