use crate::config::GameConfig;
use crate::gameplay::RaceSession;
use bevy::app::AppExit;
use bevy::prelude::*;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Countdown,
    Racing,
    Results,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(
                Update,
                boot_to_countdown
                    .run_if(in_state(GameState::Boot))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnEnter(GameState::Countdown), enter_countdown)
            .add_systems(
                Update,
                countdown_to_racing
                    .run_if(in_state(GameState::Countdown))
                    .run_if(resource_exists::<RaceSession>),
            )
            .add_systems(OnEnter(GameState::Racing), enter_racing)
            .add_systems(
                Update,
                racing_to_results
                    .run_if(in_state(GameState::Racing))
                    .run_if(resource_exists::<RaceSession>),
            )
            .add_systems(OnEnter(GameState::Results), enter_results);
    }
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_countdown(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::Countdown);
}

fn enter_countdown(config: Res<GameConfig>) {
    info!(
        "Entered state: Countdown ({:.1}s)",
        config.game.race.countdown_seconds
    );
}

fn countdown_to_racing(session: Res<RaceSession>, mut next_state: ResMut<NextState<GameState>>) {
    if session.race.countdown_remaining() <= 0.0 {
        next_state.set(GameState::Racing);
    }
}

fn enter_racing() {
    info!("Entered state: Racing");
}

fn racing_to_results(session: Res<RaceSession>, mut next_state: ResMut<NextState<GameState>>) {
    if session.race.is_finished() {
        next_state.set(GameState::Results);
    }
}

fn enter_results(session: Res<RaceSession>, mut exit: MessageWriter<AppExit>) {
    let race = &session.race;
    info!(
        "Entered state: Results after {:.2}s; player finished {}.",
        race.elapsed(),
        race.finishing_rank()
            .map_or_else(|| "n/a".to_string(), |rank| format!("#{rank}"))
    );

    for (place, index) in race.standings().iter().enumerate() {
        let Some(racer) = race.racer(*index) else {
            continue;
        };
        let best = racer
            .progress
            .best_lap_s
            .map_or_else(|| "--".to_string(), |best| format!("{best:.2}s"));
        info!(
            "{:>2}. {:<8} laps {:?} best {best}",
            place + 1,
            racer.name,
            racer.progress.lap_times
        );
    }

    match serde_json::to_string(&race.snapshot()) {
        Ok(json) => info!("Final snapshot: {json}"),
        Err(error) => error!("Failed to serialize final snapshot: {error}"),
    }

    exit.write(AppExit::Success);
}
