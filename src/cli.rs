//!
//! The external-collaborator command-line surface: flag parsing only. All
//! the actual work is done by `crate::repository`; this module's job ends at
//! handing `main` a validated `Options`.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "podb",
    about = "Read-only inspector for a git-style object store"
)]
pub struct Options {
    /// Path to the repository root. Defaults to the current directory, or
    /// the REPOSITORY environment variable if set.
    #[structopt(long, env = "REPOSITORY", parse(from_os_str))]
    pub repository: Option<PathBuf>,

    /// Hash or ref name to resolve and print. May also be given
    /// positionally.
    #[structopt(long = "ref")]
    pub reference: Option<String>,

    /// Positional form of --ref.
    #[structopt(name = "REF")]
    pub reference_positional: Option<String>,

    /// Print the resolved HEAD hash and exit.
    #[structopt(long)]
    pub current: bool,

    /// Print the raw contents of HEAD (before following any symbolic
    /// redirection) and exit.
    #[structopt(long)]
    pub print_ref: bool,

    /// Enable debug-level tracing output.
    #[structopt(short, long)]
    pub verbose: bool,
}

impl Options {
    pub fn repository_path(&self) -> PathBuf {
        self.repository
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn resolved_reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .or(self.reference_positional.as_deref())
    }
}
