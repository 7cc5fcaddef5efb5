//! ditalist - DITA map reference resolver

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use ditalist::manifest::write_manifest;
use ditalist::resolve::{ResolveOptions, resolve};

#[derive(Parser)]
#[command(name = "ditalist")]
#[command(version, about = "Resolve the reference closure of a DITA map", long_about = None)]
#[command(after_help = "EXAMPLES:
    ditalist docs/root.ditamap              Resolve and write lists to ./temp
    ditalist root.ditamap -t out/lists      Choose the output directory
    ditalist root.ditamap --json            Print the manifest as JSON")]
struct Cli {
    /// Root map (or topic) to resolve
    #[arg(value_name = "INPUT")]
    input: String,

    /// Project base directory for relative inputs
    #[arg(short, long, default_value = ".")]
    basedir: String,

    /// Directory the list files are written to
    #[arg(short, long, default_value = "temp", value_name = "DIR")]
    tempdir: String,

    /// Filter-definition file
    #[arg(long, value_name = "FILE")]
    filter: Option<String>,

    /// Transformation type
    #[arg(long, default_value = "xhtml")]
    transtype: String,

    /// Disable grammar validation
    #[arg(long)]
    no_validate: bool,

    /// Disable grammar-pool caching
    #[arg(long)]
    no_grammar_cache: bool,

    /// Do not emit system identifiers on output documents
    #[arg(long)]
    no_system_ids: bool,

    /// Print the manifest as JSON instead of writing list files
    #[arg(long)]
    json: bool,

    /// Suppress the summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let options = ResolveOptions {
        input: cli.input.clone(),
        base_dir: cli.basedir.clone(),
        temp_dir: cli.tempdir.clone(),
        filter_file: cli.filter.clone(),
        transtype: cli.transtype.clone(),
        validate: !cli.no_validate,
        grammar_cache: !cli.no_grammar_cache,
        generate_system_ids: !cli.no_system_ids,
    };

    let resolution = resolve(&options).map_err(|e| e.to_string())?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&resolution.manifest).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(());
    }

    write_manifest(&resolution.manifest, Path::new(&cli.tempdir)).map_err(|e| e.to_string())?;

    if !cli.quiet {
        let manifest = &resolution.manifest;
        println!("Input: {}{}", manifest.prefix, manifest.input_file);
        println!("Files: {}", manifest.full_set.len());
        println!("Topics: {}", manifest.topic_set.len());
        println!("Maps: {}", manifest.map_set.len());
        println!("Images: {}", manifest.image_set.len());
        println!("Keys: {}", manifest.key_defs.len());
        if manifest.uplevels > 0 {
            println!("Uplevels: {}", manifest.uplevels);
        }
        for diagnostic in &resolution.diagnostics {
            eprintln!("[{}] {}", diagnostic.code, diagnostic.message);
        }
        println!("Lists written to {}", cli.tempdir);
    }

    Ok(())
}
