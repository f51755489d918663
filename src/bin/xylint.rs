//! Command-line XML checker built on the `xylem` parser.
//!
//! Parses each input, reports positioned errors on stderr, and optionally
//! prints an indented element outline. `-` reads standard input.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use xylem::{Document, NodeKind, ParseOptions, ResourceRequest, ResourceResolver};

#[derive(Parser)]
#[command(name = "xylint", version, about = "Parse and check XML documents")]
struct Cli {
    /// Input files; '-' reads standard input.
    #[arg(required = true)]
    files: Vec<String>,

    /// Repair HTML-legacy sloppiness instead of rejecting it.
    #[arg(long)]
    tidy: bool,

    /// Fetch and parse external DTD subsets, resolved as file paths
    /// relative to each document.
    #[arg(long)]
    loaddtd: bool,

    /// Print an indented outline of each document's elements.
    #[arg(long)]
    outline: bool,

    /// Suppress all non-error output.
    #[arg(long)]
    noout: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut failed = false;

    for file in &cli.files {
        let bytes = match read_input(file) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("{file}: {err}");
                failed = true;
                continue;
            }
        };

        let source = if file == "-" { "<stdin>" } else { file.as_str() };
        let mut options = ParseOptions::new().tidy(cli.tidy).source_name(source);
        if cli.loaddtd {
            options = options.resolver(file_resolver(file));
        }

        match xylem::parse_bytes_with_options(&bytes, options) {
            Ok(doc) => {
                if cli.outline && !cli.noout {
                    print_outline(&doc);
                }
            }
            Err(err) => {
                eprintln!("{err}");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn read_input(path: &str) -> io::Result<Vec<u8>> {
    if path == "-" {
        let mut bytes = Vec::new();
        io::stdin().read_to_end(&mut bytes)?;
        return Ok(bytes);
    }
    fs::read(path)
}

/// Resolves system identifiers as file paths relative to the document.
fn file_resolver(document_path: &str) -> ResourceResolver {
    let base: PathBuf = Path::new(document_path)
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf);
    Arc::new(move |request: ResourceRequest<'_>| fs::read(base.join(request.system_id)).ok())
}

fn print_outline(doc: &Document) {
    if let Some(root) = doc.root_element() {
        print_element(doc, root, 0);
    }
}

fn print_element(doc: &Document, id: xylem::NodeId, depth: usize) {
    if let NodeKind::Element { name, prefix, .. } = &doc.node(id).kind {
        let indent = "  ".repeat(depth);
        match prefix {
            Some(prefix) => println!("{indent}{prefix}:{name}"),
            None => println!("{indent}{name}"),
        }
        for child in doc.children(id) {
            print_element(doc, child, depth + 1);
        }
    }
}
