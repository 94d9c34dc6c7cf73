use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";

const BUILTIN_GAME: &str = include_str!("../../config/game.toml");
const BUILTIN_KART: &str = include_str!("../../config/kart.toml");
const BUILTIN_ITEMS: &str = include_str!("../../config/items.toml");
const BUILTIN_DIFFICULTY: &str = include_str!("../../config/difficulty.toml");
const BUILTIN_TRACK: &str = include_str!("../../config/track.toml");

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ConfigReloadRequest>()
            .add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_on_request);
    }
}

/// Set by an external layer to re-read `config/` between races.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct ConfigReloadRequest {
    pub requested: bool,
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    commands.insert_resource(config);
}

fn reload_game_config_on_request(
    mut request: ResMut<ConfigReloadRequest>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !request.requested {
        return;
    }
    request.requested = false;

    let Some(mut current_config) = game_config else {
        warn!("Config reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Reloaded", &current_config);
        }
        Err(error) => {
            error!("Config reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} checkpoints, {} difficulties, {} agents at `{}`, {} laps.",
        config.track.checkpoints.len(),
        config.difficulties_by_id.len(),
        config.game.app.agent_count,
        config.game.app.difficulty,
        config.game.race.max_laps
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub kart: KartFile,
    pub items: ItemsFile,
    pub difficulties: DifficultiesFile,
    pub track: TrackFile,
    pub difficulties_by_id: HashMap<String, DifficultyConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let kart: KartFile = read_toml(&config_dir.join("kart.toml"))?;
        let items: ItemsFile = read_toml(&config_dir.join("items.toml"))?;
        let difficulties: DifficultiesFile = read_toml(&config_dir.join("difficulty.toml"))?;
        let track: TrackFile = read_toml(&config_dir.join("track.toml"))?;

        Self::assemble(game, kart, items, difficulties, track)
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        let game: GameFile = parse_toml(Path::new("game.toml"), BUILTIN_GAME)?;
        let kart: KartFile = parse_toml(Path::new("kart.toml"), BUILTIN_KART)?;
        let items: ItemsFile = parse_toml(Path::new("items.toml"), BUILTIN_ITEMS)?;
        let difficulties: DifficultiesFile =
            parse_toml(Path::new("difficulty.toml"), BUILTIN_DIFFICULTY)?;
        let track: TrackFile = parse_toml(Path::new("track.toml"), BUILTIN_TRACK)?;

        Self::assemble(game, kart, items, difficulties, track)
    }

    fn assemble(
        game: GameFile,
        kart: KartFile,
        items: ItemsFile,
        difficulties: DifficultiesFile,
        track: TrackFile,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            difficulties_by_id: to_index(
                "difficulty.toml::difficulties",
                &difficulties.difficulties,
            )?,
            game,
            kart,
            items,
            difficulties,
            track,
        };

        config.validate_references()?;
        Ok(config)
    }

    pub fn selected_difficulty(&self) -> Option<&DifficultyConfig> {
        self.difficulties_by_id.get(&self.game.app.difficulty)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if !self
            .difficulties_by_id
            .contains_key(&self.game.app.difficulty)
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.difficulty references unknown difficulty id `{}`",
                self.game.app.difficulty
            )));
        }

        if self.game.app.fixed_timestep_hz <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::app.fixed_timestep_hz must be > 0".to_string(),
            ));
        }
        if self.game.race.max_laps == 0 {
            return Err(ConfigError::Validation(
                "game.toml::race.max_laps must be >= 1".to_string(),
            ));
        }
        if self.game.race.countdown_seconds < 0.0 || self.game.race.max_race_seconds < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::race countdown_seconds and max_race_seconds must be >= 0".to_string(),
            ));
        }

        let physics = &self.kart.physics;
        for (label, value) in [
            ("max_speed", physics.max_speed),
            ("acceleration", physics.acceleration),
            ("deceleration", physics.deceleration),
            ("turn_speed", physics.turn_speed),
            ("speed_limit_smoothing", physics.speed_limit_smoothing),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "kart.toml::physics.{label} must be > 0"
                )));
            }
        }
        if self.kart.drift.gravity <= 0.0 || self.kart.drift.hop_impulse <= 0.0 {
            return Err(ConfigError::Validation(
                "kart.toml::drift hop_impulse and gravity must be > 0".to_string(),
            ));
        }
        if self.kart.collision.kart_radius <= 0.0 {
            return Err(ConfigError::Validation(
                "kart.toml::collision.kart_radius must be > 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.kart.collision.bump_decay) {
            return Err(ConfigError::Validation(
                "kart.toml::collision.bump_decay must be in [0, 1)".to_string(),
            ));
        }
        if self.kart.effects.shrink_scale <= 0.0 {
            return Err(ConfigError::Validation(
                "kart.toml::effects.shrink_scale must be > 0".to_string(),
            ));
        }

        let mini_turbo = &self.kart.mini_turbo;
        if mini_turbo.thresholds_seconds.len() != 4 {
            return Err(ConfigError::Validation(format!(
                "kart.toml::mini_turbo.thresholds_seconds must list 4 values, found {}",
                mini_turbo.thresholds_seconds.len()
            )));
        }
        if mini_turbo
            .thresholds_seconds
            .windows(2)
            .any(|pair| pair[1] <= pair[0])
        {
            return Err(ConfigError::Validation(
                "kart.toml::mini_turbo.thresholds_seconds must be strictly increasing".to_string(),
            ));
        }
        if mini_turbo.boost_durations_seconds.len() != 3 || mini_turbo.boost_multipliers.len() != 3
        {
            return Err(ConfigError::Validation(
                "kart.toml::mini_turbo boost_durations_seconds and boost_multipliers must list 3 values"
                    .to_string(),
            ));
        }

        let items = &self.items.items;
        for (label, value) in [
            ("mushroom_duration_seconds", items.mushroom_duration_seconds),
            ("mushroom_multiplier", items.mushroom_multiplier),
            ("hazard_radius", items.hazard_radius),
            ("shell_radius", items.shell_radius),
            ("green_shell_lifetime_seconds", items.green_shell_lifetime_seconds),
            ("red_shell_lifetime_seconds", items.red_shell_lifetime_seconds),
            ("boo_duration_seconds", items.boo_duration_seconds),
            ("lightning_shrink_seconds", items.lightning_shrink_seconds),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "items.toml::items.{label} must be > 0"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.items.grant.first_place_banana_chance) {
            return Err(ConfigError::Validation(
                "items.toml::grant.first_place_banana_chance must be in [0, 1]".to_string(),
            ));
        }
        if self.items.item_boxes.pickup_radius <= 0.0 {
            return Err(ConfigError::Validation(
                "items.toml::item_boxes.pickup_radius must be > 0".to_string(),
            ));
        }

        for (index, difficulty) in self.difficulties.difficulties.iter().enumerate() {
            if difficulty.max_speed_multiplier <= 0.0
                || difficulty.acceleration_multiplier <= 0.0
                || difficulty.turn_rate <= 0.0
            {
                return Err(ConfigError::Validation(format!(
                    "difficulty.toml::difficulties[{index}] multipliers and turn_rate must be > 0"
                )));
            }
            if difficulty.lane_spread < 0.0 || difficulty.stat_jitter < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "difficulty.toml::difficulties[{index}] lane_spread and stat_jitter must be >= 0"
                )));
            }
            if !(0.0..=1.0).contains(&difficulty.item_use_chance) {
                return Err(ConfigError::Validation(format!(
                    "difficulty.toml::difficulties[{index}].item_use_chance must be in [0, 1]"
                )));
            }
        }

        let bounds = &self.track.bounds;
        if bounds.inner_length <= 0.0 || bounds.inner_width <= 0.0 {
            return Err(ConfigError::Validation(
                "track.toml::bounds inner_length and inner_width must be > 0".to_string(),
            ));
        }
        if bounds.outer_length <= bounds.inner_length || bounds.outer_width <= bounds.inner_width {
            return Err(ConfigError::Validation(
                "track.toml::bounds outer ellipse must strictly contain the inner ellipse"
                    .to_string(),
            ));
        }
        if self.track.centerline.samples < 8 || self.track.walls.segments < 8 {
            return Err(ConfigError::Validation(
                "track.toml centerline.samples and walls.segments must be >= 8".to_string(),
            ));
        }
        if self.track.walls.outer_scale < 1.0 || self.track.walls.inner_scale > 1.0 {
            return Err(ConfigError::Validation(
                "track.toml::walls outer_scale must be >= 1 and inner_scale <= 1".to_string(),
            ));
        }
        if self.track.checkpoints.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "track.toml::checkpoints needs at least 2 gates, found {}",
                self.track.checkpoints.len()
            )));
        }
        for (index, checkpoint) in self.track.checkpoints.iter().enumerate() {
            if checkpoint.half_width <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "track.toml::checkpoints[{index}].half_width must be > 0"
                )));
            }
        }
        for (index, fraction) in self.track.item_boxes.row_fractions.iter().enumerate() {
            if !(0.0..1.0).contains(fraction) {
                return Err(ConfigError::Validation(format!(
                    "track.toml::item_boxes.row_fractions[{index}] must be in [0, 1)"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(path, &raw)
}

fn parse_toml<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub race: RaceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub fixed_timestep_hz: f32,
    pub seed: u64,
    pub agent_count: usize,
    pub difficulty: String,
    #[serde(default)]
    pub demo_autopilot: bool,
    #[serde(default = "default_telemetry_interval_seconds")]
    pub telemetry_interval_seconds: f32,
}

fn default_telemetry_interval_seconds() -> f32 {
    5.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceConfig {
    pub max_laps: u32,
    pub countdown_seconds: f32,
    #[serde(default)]
    pub max_race_seconds: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KartFile {
    pub physics: KartPhysicsConfig,
    pub drift: DriftConfig,
    pub mini_turbo: MiniTurboConfig,
    pub effects: EffectsConfig,
    pub collision: CollisionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KartPhysicsConfig {
    pub max_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    #[serde(default = "default_reverse_speed_ratio")]
    pub reverse_speed_ratio: f32,
    pub turn_speed: f32,
    pub speed_limit_smoothing: f32,
    pub drift_speed_penalty: f32,
    pub off_road_penalty: f32,
    pub shrink_speed_penalty: f32,
}

fn default_reverse_speed_ratio() -> f32 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriftConfig {
    pub hop_impulse: f32,
    pub gravity: f32,
    pub momentum_turn_speed: f32,
    pub counter_steer_ratio: f32,
    pub counter_steer_floor: f32,
    pub charge_rate_neutral: f32,
    pub charge_rate_counter: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiniTurboConfig {
    pub thresholds_seconds: Vec<f32>,
    pub boost_durations_seconds: Vec<f32>,
    pub boost_multipliers: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectsConfig {
    pub stun_deceleration: f32,
    pub shrink_scale: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollisionConfig {
    pub kart_radius: f32,
    pub bump_strength: f32,
    pub bump_decay: f32,
    pub bump_rest_threshold: f32,
    pub wall_speed_retention: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsFile {
    pub items: ItemTuningConfig,
    pub item_boxes: ItemBoxConfig,
    pub grant: GrantConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemTuningConfig {
    pub mushroom_multiplier: f32,
    pub mushroom_duration_seconds: f32,
    pub hazard_radius: f32,
    pub hazard_drop_distance: f32,
    pub hazard_lifetime_seconds: f32,
    pub banana_stun_seconds: f32,
    pub banana_speed_factor: f32,
    pub fake_box_stun_seconds: f32,
    pub fake_box_speed_factor: f32,
    pub shell_radius: f32,
    pub green_shell_speed_factor: f32,
    pub green_shell_bounces: u32,
    pub green_shell_lifetime_seconds: f32,
    pub green_shell_stun_seconds: f32,
    pub green_shell_hit_speed_factor: f32,
    pub red_shell_speed_factor: f32,
    pub red_shell_lifetime_seconds: f32,
    pub red_shell_stun_seconds: f32,
    pub red_shell_hit_speed_factor: f32,
    pub boo_duration_seconds: f32,
    pub lightning_shrink_seconds: f32,
    pub lightning_stun_seconds: f32,
    pub lightning_speed_factor: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemBoxConfig {
    pub pickup_radius: f32,
    pub respawn_seconds: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    pub first_place_banana_chance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DifficultiesFile {
    pub difficulties: Vec<DifficultyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DifficultyConfig {
    pub id: String,
    pub max_speed_multiplier: f32,
    pub acceleration_multiplier: f32,
    pub turn_rate: f32,
    pub lane_spread: f32,
    #[serde(default)]
    pub stat_jitter: f32,
    pub item_use_chance: f64,
    #[serde(default = "default_max_hold_seconds")]
    pub max_hold_seconds: f32,
}

fn default_max_hold_seconds() -> f32 {
    10.0
}

impl HasId for DifficultyConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackFile {
    pub bounds: TrackBoundsConfig,
    pub centerline: CenterlineConfig,
    pub walls: WallsConfig,
    pub grid: GridConfig,
    pub item_boxes: ItemBoxLayoutConfig,
    pub checkpoints: Vec<CheckpointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackBoundsConfig {
    pub outer_length: f32,
    pub outer_width: f32,
    pub inner_length: f32,
    pub inner_width: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CenterlineConfig {
    pub samples: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WallsConfig {
    pub outer_scale: f32,
    pub inner_scale: f32,
    pub segments: usize,
    #[serde(default)]
    pub extra: Vec<WallSegmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WallSegmentConfig {
    pub from: [f32; 2],
    pub to: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub start_offset: f32,
    pub row_spacing: f32,
    pub lane_spacing: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemBoxLayoutConfig {
    pub row_fractions: Vec<f32>,
    pub boxes_per_row: usize,
    pub row_spread: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    pub label: String,
    #[serde(default = "default_checkpoint_color")]
    pub color: String,
    pub position: [f32; 2],
    pub angle_degrees: f32,
    pub half_width: f32,
}

fn default_checkpoint_color() -> String {
    "#ffffff".to_string()
}
