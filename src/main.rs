use std::process::ExitCode;

use anyhow::Result;
use structopt::StructOpt;
use tracing::debug;

use podb::cli::Options;
use podb::Repository;

fn main() -> ExitCode {
    let options = Options::from_args();

    if options.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    }

    match run(&options) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("error: {:#}", e);
            if e.downcast_ref::<podb::ReaderError>()
                .map(|e| matches!(e, podb::ReaderError::NotARepository(_)))
                .unwrap_or(false)
            {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run(options: &Options) -> Result<()> {
    let path = options.repository_path();
    debug!(path = %path.display(), "opening repository");
    let repo = Repository::open(&path)?;

    if options.print_ref {
        let head_path = path.join(".git/HEAD");
        let contents = std::fs::read_to_string(&head_path)?;
        print!("{}", contents);
        return Ok(());
    }

    if options.current {
        println!("{}", repo.head_reference()?);
        return Ok(());
    }

    if let Some(reference) = options.resolved_reference() {
        let hash = podb::Sha::from_hex_str(reference)?;
        let obj = repo.open_object(&hash)?;
        println!(
            "{} ({:?}, {} bytes)",
            hash.hex(),
            obj.object_type,
            obj.payload.len()
        );
        return Ok(());
    }

    println!("{} objects", repo.object_count());
    Ok(())
}
