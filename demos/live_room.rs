//! Live room walkthrough
//!
//! Run with: cargo run --example live_room [LIVE_ID]
//!
//! Wires the pieces of a host's live room together:
//!
//! - A process-wide `DeviceStore` behind a `SharedStore`
//! - Per-room `CoHostStore` and `BattleStore` from keyed registries, shared by
//!   two "views" that each take a reference
//! - A `DispatchQueue` standing in for the UI thread; every view callback runs
//!   there, in update order
//! - A combined stream of (connected hosts, battling flag, own score) driving
//!   the battle panel
//!
//! Set `RUST_LOG=statehub=trace` to see every update and delivery.

use statehub::facade::{AudioRoute, BattleStore, CoHostStore, DeviceStore, HostUser, Store};
use statehub::{combine_latest3, observe, DispatchQueue, SharedStore, SubscriptionBag};

static DEVICE: SharedStore<DeviceStore> = SharedStore::new(DeviceStore::new);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("statehub=debug".parse()?)
                .add_directive("live_room=info".parse()?),
        )
        .init();

    let live_id = std::env::args().nth(1).unwrap_or_else(|| "live_demo".to_string());
    let own_user = "host_me".to_string();

    let (ui, ui_task) = DispatchQueue::spawn("ui");
    let co_hosts = CoHostStore::registry();
    let battles = BattleStore::registry();

    let mut views = SubscriptionBag::new();

    // Seat view: connected hosts
    let seat_view = co_hosts.create(&live_id);
    seat_view
        .state()
        .subscribe_on(CoHostStore::connected(), ui.clone(), |hosts| {
            let names: Vec<_> = hosts.iter().map(|h: &HostUser| h.name.clone()).collect();
            tracing::info!(hosts = ?names, "Seat view: connected hosts");
        })
        .store_in(&mut views);

    // Device bar
    DEVICE
        .get()
        .state()
        .subscribe_on(
            statehub::Selector::map(|d: &statehub::facade::DeviceState| {
                (d.microphone.is_on(), d.camera.is_on())
            }),
            ui.clone(),
            |(mic, camera)| tracing::info!(mic, camera, "Device bar"),
        )
        .store_in(&mut views);

    // Battle panel: joins the co-host and battle stores of this room
    let panel_co_hosts = co_hosts.create(&live_id);
    let panel_battle = battles.create(&live_id);
    observe(
        combine_latest3(
            panel_co_hosts.watch(CoHostStore::connected()),
            panel_battle.watch(BattleStore::is_battling()),
            panel_battle.watch(BattleStore::score_of(own_user.clone())),
        ),
        ui.clone(),
        |(hosts, battling, score)| {
            tracing::info!(
                opponents = hosts.len(),
                battling,
                score = ?score,
                "Battle panel"
            );
        },
    )
    .store_in(&mut views);

    // Session script
    let device = DEVICE.get();
    device.open_microphone()?;
    device.open_camera(true)?;
    device.set_audio_route(AudioRoute::Earpiece)?;

    let opponent = HostUser::new("live_other", "host_other", "Other Host");
    seat_view.request_connection(opponent.clone())?;
    panel_co_hosts.on_connected(opponent.clone())?;
    if let Err(e) = seat_view.request_connection(opponent.clone()) {
        tracing::warn!(error = %e, "Invitation refused");
    }

    panel_battle.start_battle("battle_1", [own_user.as_str(), "host_other"])?;
    panel_battle.update_scores("battle_1", [("host_other", 12)])?;
    panel_battle.update_scores("battle_1", [(own_user.as_str(), 30)])?;
    panel_battle.end_battle("battle_1")?;

    if let Err(e) = panel_battle.update_scores("battle_1", [(own_user.as_str(), 99)]) {
        tracing::warn!(error = %e, "Late score report dropped");
    }

    // Let the UI queue catch up before leaving
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Leaving: every view gives back its reference; the last one retires the room
    views.clear();
    co_hosts.release(&live_id, &seat_view);
    co_hosts.release(&live_id, &panel_co_hosts);
    battles.release(&live_id, &panel_battle);
    DEVICE.teardown();

    tracing::info!(
        co_host_rooms = co_hosts.len(),
        battle_rooms = battles.len(),
        "Room left"
    );

    ui_task.abort();
    Ok(())
}
