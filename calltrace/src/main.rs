use calltrace::cli::Args;
use calltrace::summary::SummaryReport;
use calltrace::{replay, EventSummary, ParseEngine};
use clap::Parser;
use log::info;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    env_logger::init();

    let mut summary = EventSummary::new();
    let mut engine = ParseEngine::new(&args.name, args.strict);
    engine.set_event_handler(&mut summary);

    info!("Replaying {}", args.input.display());
    let stats = replay::replay_file(&args.input, &mut engine)?;
    let faulted = engine.error_occurred();
    drop(engine);

    if args.verbose {
        eprintln!(
            "Dispatched {} records ({} foreign skipped)",
            stats.dispatched, stats.skipped_foreign
        );
    }

    let report = SummaryReport::new(
        &args.name,
        &args.input.display().to_string(),
        stats.dispatched,
        stats.skipped_foreign,
        faulted,
        summary,
    );
    match args.format.as_str() {
        "json" => println!("{}", report.to_json()?),
        _ => print!("{}", report.to_table()),
    }

    if faulted {
        anyhow::bail!("parse engine latched a fault; the trace is damaged or malformed");
    }
    Ok(())
}
