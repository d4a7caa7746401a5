use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use priority_social::core::db;
use priority_social::{config, Console, Flow, Network};

#[derive(Parser, Debug)]
#[command(name = "priority-social", about = "Console social network with close-friend priority feeds")]
struct Args {
    /// Directory holding the .dat files
    #[arg(long, env = "SOCIAL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Where imported media files are copied
    #[arg(long, env = "SOCIAL_MEDIA_DIR")]
    media_dir: Option<PathBuf>,

    /// Create the demo users when the network is empty
    #[arg(long)]
    seed: bool,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "priority_social=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(config::data_dir);
    let media_dir = args.media_dir.unwrap_or_else(config::media_dir);

    let mut network = Network::new(media_dir);
    let report = db::load(&mut network, &data_dir)?;
    if report.skipped > 0 {
        warn!(skipped = report.skipped, "some records could not be loaded");
    }
    if args.seed && db::seed_demo_data(&mut network)? {
        info!("demo users created");
    }

    let mut console = Console::new(network, data_dir);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        write!(stdout, "{}", console.prompt())?;
        stdout.flush()?;

        let Some(line) = lines.next() else {
            // EOF behaves like exit
            let outcome = console.save();
            writeln!(stdout)?;
            if !outcome.ok {
                anyhow::bail!(outcome.message);
            }
            break;
        };

        match console.handle_line(&line?) {
            Flow::Continue(text) => {
                if !text.is_empty() {
                    writeln!(stdout, "{}", text)?;
                }
            }
            Flow::Exit(text) => {
                writeln!(stdout, "{}\nGoodbye!", text)?;
                break;
            }
        }
    }
    Ok(())
}
