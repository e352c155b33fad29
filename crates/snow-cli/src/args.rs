//! Process argument parsing (§6). Grounded on the plain top-level
//! option structs of earlier agent binaries in this lineage, generalized to
//! `clap::Parser` since none of them ever exposed a CLI surface of their
//! own (they only ever read a config file and bound a socket).

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "snow", about = "Interactive coding-assistant runtime", version)]
pub struct Cli {
    /// Send one message non-interactively and exit after the turn completes.
    pub prompt: Option<String>,

    /// Path to snow.toml. Defaults to `$SNOW_CONFIG` or `~/.snow-cli/snow.toml`.
    #[arg(long)]
    pub config: Option<String>,

    /// Workspace root. Defaults to the current directory.
    #[arg(long)]
    pub workspace: Option<String>,

    /// Resume a specific session id instead of starting a new one.
    #[arg(long)]
    pub session: Option<String>,

    /// Start with the basic (cheap) model selected instead of the advanced one.
    #[arg(long)]
    pub basic_model: bool,

    /// Auto-approve every tool call, bypassing the confirmation prompt.
    #[arg(long)]
    pub yolo: bool,
}
