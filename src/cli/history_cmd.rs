use anyhow::Result;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::AppConfig;
use crate::core::history::HistoryStore;

pub fn run(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let store = HistoryStore::new(config.history_path());

    match opts.format {
        OutputFormat::Text => {
            let (session, weekly) = store.series();
            println!("{}", renderer::render_history(&session, &weekly, opts.use_color));
            if opts.verbose {
                eprintln!("History file: {}", store.path().display());
            }
        }
        OutputFormat::Json => println!("{}", opts.to_json(&store.load())?),
    }
    Ok(())
}
