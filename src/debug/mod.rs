use crate::config::GameConfig;
use crate::gameplay::race::{Race, RaceEvent};
use crate::gameplay::{RaceEventMessage, RaceSession};
use crate::states::GameState;
use bevy::prelude::*;

pub struct RaceTelemetryPlugin;

impl Plugin for RaceTelemetryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TelemetryClock>()
            .add_systems(OnEnter(GameState::Racing), reset_telemetry_clock)
            .add_systems(
                Update,
                log_race_events.run_if(resource_exists::<RaceSession>),
            )
            .add_systems(
                Update,
                log_standings
                    .run_if(in_state(GameState::Racing))
                    .run_if(resource_exists::<RaceSession>)
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Resource, Debug, Clone, Copy, Default)]
struct TelemetryClock {
    since_report_s: f32,
}

fn reset_telemetry_clock(mut clock: ResMut<TelemetryClock>) {
    clock.since_report_s = 0.0;
}

fn log_race_events(session: Res<RaceSession>, mut events: MessageReader<RaceEventMessage>) {
    let race = &session.race;
    for RaceEventMessage(event) in events.read() {
        match *event {
            RaceEvent::Started => info!("Race started."),
            RaceEvent::CheckpointPassed { racer, checkpoint } => debug!(
                "{} passed `{}`.",
                racer_name(race, racer),
                race.track()
                    .checkpoints
                    .get(checkpoint)
                    .map_or("?", |gate| gate.label.as_str())
            ),
            RaceEvent::ItemGranted { racer, item } => {
                debug!("{} picked up {}.", racer_name(race, racer), item.label())
            }
            RaceEvent::BooResolved { racer, item } => debug!(
                "{} came back from Boo holding {}.",
                racer_name(race, racer),
                item.label()
            ),
            RaceEvent::RacerHit {
                kind,
                owner,
                victim,
            } => info!(
                "{} hit {} with {}.",
                racer_name(race, owner),
                racer_name(race, victim),
                kind.label()
            ),
            RaceEvent::HazardsCollided { first, second } => {
                debug!("{} and {} destroyed each other.", first.label(), second.label())
            }
            // Logged where they happen.
            RaceEvent::ItemUsed { .. }
            | RaceEvent::LapCompleted { .. }
            | RaceEvent::RacerFinished { .. }
            | RaceEvent::Finished { .. } => {}
        }
    }
}

fn log_standings(
    time: Res<Time>,
    config: Res<GameConfig>,
    session: Res<RaceSession>,
    mut clock: ResMut<TelemetryClock>,
) {
    let interval = config.game.app.telemetry_interval_seconds;
    if interval <= 0.0 {
        return;
    }
    clock.since_report_s += time.delta_secs();
    if clock.since_report_s < interval {
        return;
    }
    clock.since_report_s = 0.0;

    let race = &session.race;
    let standings = race
        .standings()
        .iter()
        .filter_map(|index| race.racer(*index))
        .map(|racer| {
            format!(
                "{} L{} {:.2}",
                racer.name, racer.progress.lap, racer.kart.speed
            )
        })
        .collect::<Vec<_>>()
        .join(" | ");
    info!("t={:.1}s {standings}", race.elapsed());
}

fn racer_name(race: &Race, index: usize) -> &str {
    race.racer(index).map_or("?", |racer| racer.name.as_str())
}
