//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Process-level options can also come from environment variables; the
//! per-request options map onto [`Args`].

use crate::config::Args;
use clap::{Parser, Subcommand};

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # A single article
/// feed_handlers content https://www.example.com/2024/01/01/hello/
///
/// # The ten newest items of a category, written to ./out
/// feed_handlers feed https://www.example.com/category/news/ --max 10 -o ./out
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Optional path to config.yaml file
    #[arg(short, long, global = true, env = "FEED_HANDLERS_CONFIG")]
    pub config: Option<String>,

    /// Path to the sites.json registry (overrides the config file)
    #[arg(long, global = true, env = "FEED_HANDLERS_SITES")]
    pub sites: Option<String>,

    /// Base URL of the image/video proxy (overrides the config file)
    #[arg(long, global = true, env = "FEED_HANDLERS_SERVER")]
    pub server: Option<String>,

    /// Directory for the JSON result; stdout when absent
    #[arg(short, long, global = true)]
    pub output_dir: Option<String>,

    /// Dump intermediate payloads into the debug directory
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub options: RequestOptions,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Produce a single item from an article URL
    Content { url: String },
    /// Produce a feed from an index, category or feed URL
    Feed { url: String },
}

impl Command {
    pub fn url(&self) -> &str {
        match self {
            Command::Content { url } | Command::Feed { url } => url,
        }
    }
}

/// Options forwarded to the handlers.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RequestOptions {
    /// Maximum number of feed items
    #[arg(long, global = true)]
    pub max: Option<usize>,

    /// Only keep items newer than this many hours
    #[arg(long, global = true)]
    pub age: Option<f64>,

    /// Return a preview card instead of the full content
    #[arg(long, global = true)]
    pub embed: bool,

    /// Never add a lede image
    #[arg(long, global = true)]
    pub nolead: bool,

    /// Drop the lede image caption
    #[arg(long, global = true)]
    pub no_lede_caption: bool,

    /// Add the lede image even when the body opens with an image
    #[arg(long, global = true)]
    pub add_lede_img: bool,

    /// Put the subtitle at the top of the body
    #[arg(long, global = true)]
    pub add_subtitle: bool,

    /// Strip the leading image from the body (Next.js sites)
    #[arg(long, global = true, conflicts_with = "addledeimage")]
    pub removeimage: bool,

    /// Always add the lede image (Next.js sites)
    #[arg(long, global = true)]
    pub addledeimage: bool,

    /// Keep only items mentioning one of these terms (comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Drop items mentioning any of these terms (comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub exclude: Vec<String>,
}

impl RequestOptions {
    pub fn to_args(&self) -> Args {
        Args {
            max: self.max,
            age: self.age,
            embed: self.embed,
            nolead: self.nolead,
            no_lede_caption: self.no_lede_caption,
            add_lede_img: self.add_lede_img,
            add_subtitle: self.add_subtitle,
            removeimage: self.removeimage,
            addledeimage: self.addledeimage,
            keywords: self.keywords.clone(),
            exclude: self.exclude.clone(),
        }
    }
}
