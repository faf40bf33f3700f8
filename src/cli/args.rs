//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::config::Overrides;

/// Build a merkle tree from a list of items and verify membership
#[derive(Parser, Debug)]
#[command(name = "pmerkle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Log verbosity level (error, warn, info, debug, trace, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a merkle tree and print its root hash
    Build(TreeArgs),

    /// Build a merkle tree and check that an item is part of it
    Verify {
        /// Tree inputs
        #[command(flatten)]
        tree: TreeArgs,

        /// Item to look up
        #[arg(long)]
        item: String,
    },

    /// Print the effective configuration
    Config,
}

/// Inputs and knobs shared by commands that build a tree.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeArgs {
    /// Data to insert into the merkle tree (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub data: Option<Vec<String>>,

    /// File whose contents are inserted after the data items (repeatable)
    #[arg(long = "file", value_hint = ValueHint::FilePath)]
    pub files: Vec<PathBuf>,

    /// Hash algorithm
    #[arg(long)]
    pub hash: Option<String>,

    /// Upper bound on concurrent hashing workers
    #[arg(long)]
    pub max_concurrency: Option<u32>,

    /// Sort leaves and digest pairs before hashing
    #[arg(long)]
    pub sort: Option<bool>,

    /// Reuse hash engines and buffers between hashing steps
    #[arg(long)]
    pub reuse_buffer_allocation: Option<bool>,
}

impl Cli {
    /// Tree inputs of the selected command, if it builds a tree.
    pub fn tree_args(&self) -> Option<&TreeArgs> {
        match &self.command {
            Commands::Build(tree) | Commands::Verify { tree, .. } => Some(tree),
            Commands::Config => None,
        }
    }

    /// Settings given explicitly on the command line.
    pub fn overrides(&self) -> Overrides {
        let tree = self.tree_args().cloned().unwrap_or_default();
        Overrides {
            hash: tree.hash,
            sort: tree.sort,
            data: tree.data,
            log_level: self.log_level.clone(),
            max_concurrency: tree.max_concurrency,
            reuse_buffer_allocation: tree.reuse_buffer_allocation,
        }
    }
}

#[cfg(test)]
mod args_test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_overrides() {
        let cli = Cli::parse_from([
            "pmerkle",
            "--log-level",
            "debug",
            "build",
            "--data",
            "value1,value2,value3",
            "--max-concurrency",
            "4",
            "--sort",
            "false",
        ]);
        let o = cli.overrides();
        assert_eq!(
            o.data,
            Some(vec!["value1".to_string(), "value2".into(), "value3".into()])
        );
        assert_eq!(o.max_concurrency, Some(4));
        assert_eq!(o.sort, Some(false));
        assert_eq!(o.reuse_buffer_allocation, None);
        assert_eq!(o.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_verify_requires_item() {
        assert!(Cli::try_parse_from(["pmerkle", "verify", "--data", "a"]).is_err());

        let cli = Cli::parse_from(["pmerkle", "verify", "--data", "a,b", "--item", "a"]);
        match cli.command {
            Commands::Verify { item, tree } => {
                assert_eq!(item, "a");
                assert_eq!(tree.data, Some(vec!["a".to_string(), "b".into()]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_config_has_no_tree_overrides() {
        let cli = Cli::parse_from(["pmerkle", "-c", "merkle.toml", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("merkle.toml")));
        assert_eq!(cli.overrides(), Overrides::default());
    }
}
