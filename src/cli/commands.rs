//! Command dispatch.

use std::io::Write;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::cancel::CancelToken;
use crate::cli::args::{Cli, Commands, TreeArgs};
use crate::config::Settings;
use crate::data::{Data, FileData, StringData};
use crate::merkle::MerkleTree;

/// Runs the selected command, writing its result to `out`.
///
/// Returns `Ok(false)` when the command ran but its answer is negative (an
/// item that is not in the tree), so the caller can pick the exit status.
pub fn execute_command<W: Write>(
    cli: &Cli,
    settings: &Settings,
    ctx: &CancelToken,
    out: &mut W,
) -> Result<bool> {
    match &cli.command {
        Commands::Build(tree) => {
            let items = tree_items(settings, tree);
            let mt = build_tree(settings, ctx, &items)?;
            if let Some(root) = mt.root_digest() {
                info!("merkle root hash: {:x}", root);
                writeln!(out, "{:x}", root)?;
            }
            Ok(true)
        }
        Commands::Verify { tree, item } => {
            let items = tree_items(settings, tree);
            let mt = build_tree(settings, ctx, &items)?;
            let found = mt
                .verify(ctx, &StringData::new(item.as_str()))
                .with_context(|| format!("verify {}", item))?;
            info!("item {} verified: {}", item, found);
            writeln!(out, "{}", found)?;
            Ok(found)
        }
        Commands::Config => {
            write!(out, "{}", settings.to_toml()?)?;
            Ok(true)
        }
    }
}

/// Process exit status for a failed command: 130 when the command was
/// interrupted, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<crate::Error>() {
        Some(crate::Error::Cancelled) => 130,
        _ => 1,
    }
}

/// Configured data items followed by the `--file` items.
fn tree_items(settings: &Settings, tree: &TreeArgs) -> Vec<Box<dyn Data>> {
    let mut items: Vec<Box<dyn Data>> = Vec::with_capacity(settings.data.len() + tree.files.len());
    for value in &settings.data {
        items.push(Box::new(StringData::new(value.as_str())));
    }
    for path in &tree.files {
        items.push(Box::new(FileData::new(path)));
    }
    items
}

fn build_tree<'a>(
    settings: &Settings,
    ctx: &CancelToken,
    items: &'a [Box<dyn Data>],
) -> Result<MerkleTree<'a, Box<dyn Data>>> {
    debug!(
        "building merkle tree: items={} hash={} sort={} max_concurrency={} reuse={}",
        items.len(),
        settings.hash,
        settings.sort,
        settings.performance.max_concurrency,
        settings.performance.reuse_buffer_allocation
    );
    settings
        .tree_builder()?
        .build(ctx, items)
        .context("unable to build the merkle tree")
}
