use evohome_client::{ApiProfile, EvoClient};

fn fmt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}\u{00b0}C"),
        None => "-".to_string(),
    }
}

#[tokio::main]
async fn main() -> evohome_client::Result<()> {
    tracing_subscriber::fmt::init();

    let username =
        std::env::var("EVOHOME_USERNAME").expect("usage: set EVOHOME_USERNAME and EVOHOME_PASSWORD");
    let password = std::env::var("EVOHOME_PASSWORD").expect("EVOHOME_PASSWORD not set");
    let legacy = std::env::args().any(|a| a == "--legacy");

    let mut builder = EvoClient::builder(username, password);
    if legacy {
        builder = builder.profile(ApiProfile::Legacy);
    }
    let mut client = builder.build();

    for reading in client.temperatures().await? {
        println!(
            "[{:>10}] {:<20} {:>8}  setpoint {:>8}",
            reading.id,
            if reading.name.is_empty() {
                "(hot water)"
            } else {
                reading.name.as_str()
            },
            fmt(reading.temperature),
            fmt(reading.setpoint),
        );
    }

    if let Ok(weather) = client.weather().await {
        println!(
            "Outside: {:.1}\u{00b0} {} ({}), humidity {:.0}%",
            weather.temperature, weather.units, weather.phrase, weather.humidity
        );
    }

    Ok(())
}
