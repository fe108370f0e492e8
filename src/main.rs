use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use xmlobject::PrettyPrinter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Re-indent and check XML markup", long_about = None)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print each file re-indented, one token per line
    Pretty {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<Utf8PathBuf>,
        /// Spaces per nesting level
        #[arg(long, default_value_t = 2)]
        indent: usize,
    },
    /// Check tag balance of XML files; directories are searched for *.xml
    Check {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<Utf8PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Pretty { files, indent } => {
            let printer = PrettyPrinter::new(" ".repeat(indent));
            for file in &files {
                let text = read(file)?;
                let out = printer
                    .pretty_print(&text)
                    .with_context(|| format!("Failed to pretty print {}", file))?;
                println!("{}", out);
            }
            Ok(())
        }
        Command::Check { paths } => {
            let files = collect_xml_files(&paths);
            let printer = PrettyPrinter::default();
            let failures: Vec<(Utf8PathBuf, String)> = files
                .par_iter()
                .filter_map(|file| {
                    let result = read(file).and_then(|text| {
                        printer.pretty_print(&text).map_err(anyhow::Error::from)
                    });
                    result.err().map(|e| (file.clone(), format!("{:#}", e)))
                })
                .collect();
            for (file, err) in &failures {
                eprintln!("{}: {}", file, err);
            }
            println!(
                "checked {} file(s), {} failed",
                files.len(),
                failures.len()
            );
            if !failures.is_empty() {
                bail!("{} file(s) are not well formed", failures.len());
            }
            Ok(())
        }
    }
}

fn read(path: &Utf8Path) -> Result<String> {
    std::fs::read_to_string(path.as_std_path()).with_context(|| format!("Read {}", path))
}

fn collect_xml_files(paths: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(p) if p.extension() == Some("xml") => files.push(p),
                Ok(_) => {}
                Err(p) => tracing::warn!(path = %p.display(), "skipping non UTF-8 path"),
            }
        }
    }
    files.sort();
    files
}
