pub mod collision;
pub mod items;
pub mod kart;
pub mod race;
pub mod steering;
pub mod track;

use crate::config::GameConfig;
use crate::states::GameState;
use bevy::prelude::*;
use kart::ControlIntents;
use race::{Race, RaceEvent};
use steering::{autopilot_intents, AutopilotState};

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerIntents>()
            .add_message::<RaceEventMessage>()
            .add_systems(OnEnter(GameState::Countdown), start_race_session)
            .add_systems(
                FixedUpdate,
                (drive_player_autopilot, step_race_session)
                    .chain()
                    .run_if(resource_exists::<RaceSession>)
                    .run_if(in_state(GameState::Countdown).or(in_state(GameState::Racing))),
            );
    }
}

#[derive(Resource, Debug, Clone)]
pub struct RaceSession {
    pub race: Race,
    autopilot: AutopilotState,
}

impl RaceSession {
    pub fn new(race: Race) -> Self {
        Self {
            race,
            autopilot: AutopilotState::default(),
        }
    }
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerIntents(pub ControlIntents);

#[derive(Message, Debug, Clone, Copy)]
pub struct RaceEventMessage(pub RaceEvent);

fn start_race_session(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut fixed_time: ResMut<Time<Fixed>>,
    mut intents: ResMut<PlayerIntents>,
) {
    let hz = config.game.app.fixed_timestep_hz;
    if hz > 0.0 {
        fixed_time.set_timestep_hz(f64::from(hz));
    } else {
        warn!("Ignoring non-positive fixed timestep of {hz} Hz.");
    }

    let race = Race::new(&config);
    info!(
        "Race ready: {} racers, {} laps, {} item boxes, seed {}.",
        race.racers().len(),
        race.max_laps(),
        race.item_boxes().len(),
        config.game.app.seed
    );
    *intents = PlayerIntents::default();
    commands.insert_resource(RaceSession::new(race));
}

fn drive_player_autopilot(
    config: Res<GameConfig>,
    time: Res<Time>,
    mut session: ResMut<RaceSession>,
    mut intents: ResMut<PlayerIntents>,
) {
    if !config.game.app.demo_autopilot {
        return;
    }
    let session = &mut *session;
    let Some(player) = session.race.player() else {
        return;
    };
    intents.0 = autopilot_intents(
        &mut session.autopilot,
        &player.kart,
        &session.race.track().centerline,
        time.delta_secs(),
    );
}

fn step_race_session(
    time: Res<Time>,
    intents: Res<PlayerIntents>,
    mut session: ResMut<RaceSession>,
    mut race_events: MessageWriter<RaceEventMessage>,
) {
    let events = session.race.step(time.delta_secs(), &intents.0);
    race_events.write_batch(events.into_iter().map(RaceEventMessage));
}
