use anyhow::Context;
use chrono::{Local, NaiveDate};
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use terminplan::calendar::layout::{ViewMode, ViewState, WeekView};
use terminplan::calendar::{EventSource, EventStore, StoreEventSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv().ok();

    let now = Local::now().naive_local();

    let date = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<NaiveDate>()
            .context("expected a date in YYYY-MM-DD format")?,
        None => now.date(),
    };

    let store = EventStore::from_paths(
        Path::new("data/calendar-events.json"),
        Path::new("data/calendar-meeting.json"),
    )
    .context("failed to load the event data files")?;

    let source = StoreEventSource::new(Arc::new(store));
    let events = source
        .fetch_events()
        .await
        .context("failed to fetch calendar events")?;

    let state = ViewState {
        mode: ViewMode::Week,
        date,
    };

    println!("{}", state.title());

    let view = WeekView::build(&events, date, now);

    for row in &view.rows {
        for cell in &row.cells {
            if cell.count > 0 {
                println!(
                    "{} {:>5}: {} event(s), inline: {:?}",
                    cell.date,
                    row.label,
                    cell.count,
                    cell.inline.as_ref().map(|block| &block.summary)
                );
            }
        }
    }

    Ok(())
}
