use anyhow::Result;
use par_markdown::cli;
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    // Process CLI arguments first (before logging init for cleaner output)
    let options = match cli::process_cli() {
        cli::CliResult::Exit(code) => {
            if code == 0 {
                return Ok(());
            }
            std::process::exit(code);
        }
        cli::CliResult::Continue(options) => options,
    };
    // Route log::info!() etc. to the debug log file; RUST_LOG also mirrors to stderr.
    par_markdown::debug::init_log_bridge(options.log_level);

    log::info!("Starting par-markdown {}", par_markdown::VERSION);

    // Diagram renders run on the runtime's blocking pool.
    let runtime = Runtime::new()?;
    let result = cli::run(options, &runtime);
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    if let Err(e) = result {
        eprintln!("par-markdown: error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
