use evohome_client::{EvoClient, ZoneRef};

/// Run with: cargo test --test integration -- --ignored
/// Requires a real account in EVOHOME_USERNAME / EVOHOME_PASSWORD.
#[tokio::test]
#[ignore]
async fn discover_and_read_live_account() {
    let username = std::env::var("EVOHOME_USERNAME").expect("EVOHOME_USERNAME not set");
    let password = std::env::var("EVOHOME_PASSWORD").expect("EVOHOME_PASSWORD not set");

    let mut client = EvoClient::builder(username, password).build();

    let readings = client.temperatures().await.expect("discovery failed");
    assert!(
        !readings.is_empty(),
        "account should report at least one device"
    );
    for reading in &readings {
        println!(
            "[{}] {} temp={:?} setpoint={:?}",
            reading.id, reading.name, reading.temperature, reading.setpoint
        );
    }

    // Exercise schedule read + override detection on the first named zone.
    if let Some(zone) = readings.iter().find(|r| !r.name.is_empty()) {
        let schedule = client
            .schedule(ZoneRef::Id(&zone.id))
            .await
            .expect("schedule read failed");
        assert!(!schedule.days.is_empty());
        let overridden = client
            .is_overridden(ZoneRef::Id(&zone.id))
            .await
            .expect("override check failed");
        println!("{} overridden: {overridden}", zone.name);
    }
}
