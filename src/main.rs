use std::sync::Arc;

use tracing::info;

use courtside::clock;
use courtside::config::Config;
use courtside::http::HttpBackend;
use courtside::planner::DayPlanner;

const USAGE: &str = "usage: courtside <court-id> <YYYY-MM-DD> [--json]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut json = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--json" {
            json = true;
        } else {
            positional.push(arg);
        }
    }
    let [court_arg, date_arg] = positional.as_slice() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let court_id: u64 = court_arg
        .parse()
        .map_err(|_| format!("invalid court id: {court_arg}"))?;
    let date = clock::parse_calendar_day(date_arg).ok_or_else(|| format!("invalid date: {date_arg}"))?;

    let config = Config::from_env();
    courtside::observability::init(config.metrics_port)?;
    info!("booking api: {}", config.api_url);

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let planner = DayPlanner::over(backend);
    let view = planner.select(court_id, date).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view.slots)?);
        return Ok(());
    }

    println!(
        "{} ({}) on {} [{}-{}]",
        view.court.name,
        view.court.location,
        view.date,
        clock::format_hhmm(view.court.open_time),
        clock::format_hhmm(view.court.close_time),
    );
    if view.slots.is_empty() {
        println!("  no slots");
    }
    for slot in &view.slots {
        println!("  {slot}");
    }

    let free = view.free_windows();
    if !free.is_empty() {
        let windows: Vec<String> = free
            .iter()
            .filter_map(|span| {
                let start = clock::time_from_minutes(span.start)?;
                let end = clock::time_from_minutes(span.end)?;
                Some(format!("{}-{}", clock::format_hhmm(start), clock::format_hhmm(end)))
            })
            .collect();
        println!("free: {}", windows.join(", "));
    }
    for booking in &view.bookings {
        println!(
            "booking #{} {}-{} {}",
            booking.id,
            clock::format_hhmm(booking.start_time),
            clock::format_hhmm(booking.end_time),
            booking.status,
        );
    }
    Ok(())
}
