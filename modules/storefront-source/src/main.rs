use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storefront_common::{PipelineOptions, Record};
use storefront_source::{
    AssetMaterializer, HttpFileFetcher, MemoryCache, MemoryNodeStore, NodeBuilder,
    PrefixedFactories, ProcessorRegistry,
};

/// Build storefront nodes from newline-delimited JSON records.
#[derive(Parser, Debug)]
#[command(name = "storefront-source")]
struct Cli {
    /// Input file with one JSON record per line. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Directory downloaded images are written to.
    #[arg(long, default_value = ".storefront/media")]
    media_dir: PathBuf,

    /// Skip image downloads regardless of STOREFRONT_DOWNLOAD_IMAGES.
    #[arg(long)]
    no_images: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("storefront=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut options = PipelineOptions::from_env()?;
    if cli.no_images {
        options.download_images = false;
    }

    let input = read_records(open_input(cli.input.as_deref()).await?).await?;
    info!(
        count = input.records.len(),
        skipped = input.skipped,
        "Read records"
    );
    let (line_numbers, records): (Vec<usize>, Vec<Record>) = input.records.into_iter().unzip();

    let store = Arc::new(MemoryNodeStore::new());
    let materializer = AssetMaterializer::new(
        Arc::new(MemoryCache::new()),
        store.clone(),
        Arc::new(HttpFileFetcher::new(&cli.media_dir)),
    );
    let builder = NodeBuilder::new(
        Arc::new(PrefixedFactories::new(options.type_prefix.clone())),
        ProcessorRegistry::storefront(),
        materializer,
        options,
    );

    let results = builder.build_nodes(records).await;

    let mut stdout = std::io::stdout().lock();
    let mut built = 0usize;
    let mut failed = input.skipped;
    for (line, result) in line_numbers.into_iter().zip(results) {
        match result {
            Ok(node) => {
                serde_json::to_writer(&mut stdout, &node)?;
                writeln!(stdout)?;
                built += 1;
            }
            Err(e) => {
                warn!(line, error = %e, "Failed to build node");
                failed += 1;
            }
        }
    }

    info!(
        built,
        failed,
        files = store.created_count(),
        "Storefront source finished"
    );
    Ok(())
}

async fn open_input(path: Option<&std::path::Path>) -> Result<Box<dyn AsyncRead + Unpin>> {
    Ok(match path {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    })
}

/// Records parsed from the input, each with its 1-based line number.
struct Input {
    records: Vec<(usize, Record)>,
    skipped: usize,
}

/// Read one JSON object per line. Lines that don't parse are logged and
/// skipped; blank lines are ignored.
async fn read_records<R: AsyncRead + Unpin>(reader: R) -> Result<Input> {
    let mut lines = BufReader::new(reader).lines();
    let mut input = Input {
        records: Vec::new(),
        skipped: 0,
    };
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(&line) {
            Ok(record) => input.records.push((line_no, record)),
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping line that is not a JSON object");
                input.skipped += 1;
            }
        }
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_lines_are_skipped_and_counted() {
        let data = concat!(
            "{\"id\": \"gid://shop/Product/1\"}\n",
            "not json\n",
            "\n",
            "[1, 2]\n",
            "{\"id\": \"gid://shop/Order/7\"}\n",
        );

        let input = read_records(data.as_bytes()).await.unwrap();

        assert_eq!(input.skipped, 2);
        let lines: Vec<usize> = input.records.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![1, 5]);
        assert_eq!(input.records[1].1["id"], "gid://shop/Order/7");
    }
}
