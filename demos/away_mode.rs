use chrono::NaiveDate;
use evohome_client::{EvoClient, SystemMode};

#[tokio::main]
async fn main() -> evohome_client::Result<()> {
    tracing_subscriber::fmt::init();

    let username =
        std::env::var("EVOHOME_USERNAME").expect("usage: set EVOHOME_USERNAME and EVOHOME_PASSWORD");
    let password = std::env::var("EVOHOME_PASSWORD").expect("EVOHOME_PASSWORD not set");

    // usage: away_mode [YYYY-MM-DD]
    let until = std::env::args()
        .nth(1)
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").expect("until must be YYYY-MM-DD"));

    let mut client = EvoClient::builder(username, password).build();
    client.set_system_mode(SystemMode::Away, until).await?;

    match until {
        Some(day) => println!("away mode set until {day}"),
        None => println!("away mode set permanently"),
    }
    Ok(())
}
