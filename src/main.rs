mod config;
mod debug;
mod gameplay;
mod states;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use config::ConfigPlugin;
use debug::RaceTelemetryPlugin;
use gameplay::GameplayPlugin;
use states::GameStatePlugin;
use std::time::Duration;

const FRAME_SECONDS: f64 = 1.0 / 60.0;

fn main() {
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                FRAME_SECONDS,
            ))),
        )
        .add_plugins(LogPlugin::default())
        .add_plugins(StatesPlugin)
        .add_plugins(ConfigPlugin)
        .add_plugins(GameplayPlugin)
        .add_plugins(GameStatePlugin)
        .add_plugins(RaceTelemetryPlugin)
        .run();
}
