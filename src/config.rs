// Scene configuration, loaded once at startup from an optional TOML file.
//
// Every field has a default, so an empty file (or no file) reproduces the
// hero scene exactly. Validation turns the raw file into engine parameters.

use std::path::Path;
use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::stars::StarParams;
use crate::engine::{Color, FieldParams, DEFAULT_PALETTE};
use crate::error::{Result, SceneError};

/// Environment variable naming the config file when no CLI path is given.
pub const CONFIG_ENV: &str = "SYNAPTIC_WEB_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    pub field: FieldConfig,
    pub window: WindowConfig,
    pub diagrams: DiagramConfig,
    pub stars: StarConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldConfig {
    pub count: usize,
    pub spawn_extent: [f32; 3],
    pub velocity_spread: f32,
    pub bounds: [f32; 3],
    pub connection_distance: f32,
    pub drift_amplitude: f32,
    pub radius_range: [f32; 2],
    pub phase_max: f32,
    pub palette: Vec<String>,
    pub pulse_frequency: f32,
    pub pulse_amplitude: f32,
    pub spin_speed: f32,
    pub wobble_frequency: f32,
    pub wobble_amplitude: f32,
    pub line_color: String,
    pub line_opacity: f32,
    /// Fixed RNG seed for a reproducible layout. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            count: 60,
            spawn_extent: [12.0, 7.0, 7.0],
            velocity_spread: 0.015,
            bounds: [7.0, 4.0, 5.0],
            connection_distance: 4.0,
            drift_amplitude: 0.002,
            radius_range: [0.1, 0.22],
            phase_max: 10.0,
            palette: DEFAULT_PALETTE.iter().map(|s| s.to_string()).collect(),
            pulse_frequency: 3.0,
            pulse_amplitude: 0.1,
            spin_speed: 0.03,
            wobble_frequency: 0.1,
            wobble_amplitude: 0.03,
            line_color: "#F3BAD1".to_string(),
            line_opacity: 0.15,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub show_stats: bool,
    pub show_diagrams: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Synaptic Web".to_string(),
            width: 1280,
            height: 720,
            background: "#F9F8F4".to_string(),
            show_stats: false,
            show_diagrams: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagramConfig {
    pub stage_period_secs: f32,
    pub legacy_latency_ms: f32,
    pub optimized_latency_ms: f32,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            stage_period_secs: 2.0,
            legacy_latency_ms: 1000.0,
            optimized_latency_ms: 20.0,
        }
    }
}

impl DiagramConfig {
    pub fn stage_period(&self) -> Result<Duration> {
        if !(self.stage_period_secs > 0.0) {
            return Err(invalid("diagrams.stage_period_secs must be positive"));
        }
        Duration::try_from_secs_f32(self.stage_period_secs)
            .map_err(|_| invalid("diagrams.stage_period_secs is out of range"))
    }
}

/// Static background star shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StarConfig {
    pub enabled: bool,
    pub count: usize,
    pub radius: f32,
    pub depth: f32,
    pub factor: f32,
    pub speed: f32,
}

impl Default for StarConfig {
    fn default() -> Self {
        let params = StarParams::default();
        Self {
            enabled: true,
            count: params.count,
            radius: params.radius,
            depth: params.depth,
            factor: params.factor,
            speed: params.speed,
        }
    }
}

impl SceneConfig {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("no config file given, using defaults");
            return Ok(Self::default());
        };
        info!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.check_finite()?;

        let f = &self.field;
        if f.count == 0 {
            return Err(invalid("field.count must be at least 1"));
        }
        if !(f.connection_distance > 0.0) {
            return Err(invalid("field.connection_distance must be positive"));
        }
        if f.palette.is_empty() {
            return Err(invalid("field.palette must not be empty"));
        }
        if f.radius_range[0] <= 0.0 || f.radius_range[1] < f.radius_range[0] {
            return Err(invalid("field.radius_range must be positive and ascending"));
        }
        if f.spawn_extent.iter().chain(&f.bounds).any(|v| !(*v >= 0.0)) {
            return Err(invalid("field.spawn_extent and field.bounds must be non-negative"));
        }
        if f.velocity_spread < 0.0 || f.phase_max < 0.0 {
            return Err(invalid("field.velocity_spread and field.phase_max must be non-negative"));
        }
        if !(0.0..=1.0).contains(&f.line_opacity) {
            return Err(invalid("field.line_opacity must be within [0, 1]"));
        }
        for hex in f.palette.iter().chain([&f.line_color, &self.window.background]) {
            parse_color(hex)?;
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window size must be non-zero"));
        }
        self.diagrams.stage_period()?;
        if self.diagrams.legacy_latency_ms < 0.0 || self.diagrams.optimized_latency_ms < 0.0 {
            return Err(invalid("diagrams latencies must be non-negative"));
        }
        let st = &self.stars;
        if st.radius < 0.0 || st.depth < 0.0 || !(st.factor > 0.0) {
            return Err(invalid("stars.radius and stars.depth must be non-negative, stars.factor positive"));
        }
        Ok(())
    }

    /// Every float in the file must be a real number; `inf` and `nan` parse
    /// as TOML floats but would poison sampling and timers downstream.
    fn check_finite(&self) -> Result<()> {
        let f = &self.field;
        let d = &self.diagrams;
        let st = &self.stars;
        let named: Vec<(&str, Vec<f32>)> = vec![
            ("field.spawn_extent", f.spawn_extent.to_vec()),
            ("field.velocity_spread", vec![f.velocity_spread]),
            ("field.bounds", f.bounds.to_vec()),
            ("field.connection_distance", vec![f.connection_distance]),
            ("field.drift_amplitude", vec![f.drift_amplitude]),
            ("field.radius_range", f.radius_range.to_vec()),
            ("field.phase_max", vec![f.phase_max]),
            ("field.pulse_frequency", vec![f.pulse_frequency]),
            ("field.pulse_amplitude", vec![f.pulse_amplitude]),
            ("field.spin_speed", vec![f.spin_speed]),
            ("field.wobble_frequency", vec![f.wobble_frequency]),
            ("field.wobble_amplitude", vec![f.wobble_amplitude]),
            ("field.line_opacity", vec![f.line_opacity]),
            ("diagrams.stage_period_secs", vec![d.stage_period_secs]),
            ("diagrams.legacy_latency_ms", vec![d.legacy_latency_ms]),
            ("diagrams.optimized_latency_ms", vec![d.optimized_latency_ms]),
            ("stars.radius/depth", vec![st.radius, st.depth]),
            ("stars.factor/speed", vec![st.factor, st.speed]),
        ];
        match named.iter().find(|(_, values)| values.iter().any(|v| !v.is_finite())) {
            Some((name, _)) => Err(SceneError::InvalidConfig(format!("{name} must be finite"))),
            None => Ok(()),
        }
    }

    /// Engine parameters for the particle field. Call after `validate`.
    pub fn field_params(&self) -> Result<FieldParams> {
        let f = &self.field;
        let palette = f
            .palette
            .iter()
            .map(|hex| parse_color(hex))
            .collect::<Result<Vec<_>>>()?;
        Ok(FieldParams {
            count: f.count,
            spawn_extent: Vec3::from_array(f.spawn_extent),
            velocity_spread: f.velocity_spread,
            bounds: Vec3::from_array(f.bounds),
            connection_distance: f.connection_distance,
            drift_amplitude: f.drift_amplitude,
            radius_min: f.radius_range[0],
            radius_max: f.radius_range[1],
            phase_max: f.phase_max,
            palette,
            pulse_frequency: f.pulse_frequency,
            pulse_amplitude: f.pulse_amplitude,
            spin_speed: f.spin_speed,
            wobble_frequency: f.wobble_frequency,
            wobble_amplitude: f.wobble_amplitude,
        })
    }

    /// Star shell parameters, or `None` when the shell is switched off.
    pub fn star_params(&self) -> Option<StarParams> {
        let st = &self.stars;
        st.enabled.then(|| StarParams {
            count: st.count,
            radius: st.radius,
            depth: st.depth,
            factor: st.factor,
            speed: st.speed,
        })
    }

    pub fn line_color(&self) -> Result<Color> {
        parse_color(&self.field.line_color)
    }

    pub fn background(&self) -> Result<Color> {
        parse_color(&self.window.background)
    }
}

fn parse_color(hex: &str) -> Result<Color> {
    Color::from_hex(hex).ok_or_else(|| SceneError::InvalidColor(hex.to_string()))
}

fn invalid(msg: &str) -> SceneError {
    SceneError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let config = SceneConfig::default();
        config.validate().unwrap();
        assert_eq!(config.field_params().unwrap(), FieldParams::default());
        assert_eq!(config.diagrams.stage_period().unwrap(), Duration::from_secs(2));
        assert_eq!(config.star_params(), Some(StarParams::default()));
    }

    #[test]
    fn bundled_scene_file_spells_out_defaults() {
        let config = SceneConfig::from_toml_str(include_str!("../scene.toml")).unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(SceneConfig::from_toml_str("").unwrap(), SceneConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = SceneConfig::from_toml_str(
            r##"
            [field]
            count = 12
            connection_distance = 2.5
            seed = 42

            [window]
            show_stats = true
            "##,
        )
        .unwrap();
        assert_eq!(config.field.count, 12);
        assert_eq!(config.field.seed, Some(42));
        assert_eq!(config.field.bounds, [7.0, 4.0, 5.0]);
        assert!(config.window.show_stats);
        assert_eq!(config.window.width, 1280);

        let params = config.field_params().unwrap();
        assert_eq!(params.count, 12);
        assert_eq!(params.connection_distance, 2.5);
    }

    #[test]
    fn rejects_zero_particles() {
        let err = SceneConfig::from_toml_str("[field]\ncount = 0\n").unwrap_err();
        assert!(matches!(err, SceneError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let err = SceneConfig::from_toml_str("[field]\nconnection_distance = 0.0\n").unwrap_err();
        assert!(matches!(err, SceneError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_empty_palette() {
        let err = SceneConfig::from_toml_str("[field]\npalette = []\n").unwrap_err();
        assert!(matches!(err, SceneError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_hex() {
        let err = SceneConfig::from_toml_str("[field]\npalette = [\"#12345\"]\n").unwrap_err();
        assert!(matches!(err, SceneError::InvalidColor(ref s) if s == "#12345"));
    }

    #[test]
    fn rejects_non_finite() {
        for text in [
            "[field]\nradius_range = [0.1, inf]\n",
            "[field]\nspawn_extent = [inf, 7.0, 7.0]\n",
            "[field]\nbounds = [7.0, nan, 5.0]\n",
            "[field]\nvelocity_spread = inf\n",
            "[field]\nphase_max = inf\n",
            "[field]\nspin_speed = -inf\n",
            "[diagrams]\nstage_period_secs = inf\n",
            "[diagrams]\nlegacy_latency_ms = nan\n",
            "[stars]\nradius = inf\n",
        ] {
            let err = SceneConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, SceneError::InvalidConfig(ref m) if m.contains("finite")), "{text}: {err}");
        }
    }

    #[test]
    fn rejects_stage_period_too_large_for_a_duration() {
        let err = SceneConfig::from_toml_str("[diagrams]\nstage_period_secs = 1e30\n").unwrap_err();
        assert!(matches!(err, SceneError::InvalidConfig(_)));
    }

    #[test]
    fn validated_config_spawns_without_panicking() {
        use rand::{SeedableRng, rngs::StdRng};

        let config = SceneConfig::from_toml_str(
            "[field]\nradius_range = [0.1, 3.0e38]\nspawn_extent = [3.0e38, 7.0, 7.0]\n",
        )
        .unwrap();
        let field = crate::engine::ParticleField::new(
            config.field_params().unwrap(),
            &mut StdRng::seed_from_u64(3),
        );
        assert_eq!(field.particle_count(), 60);
    }

    #[test]
    fn stars_can_be_switched_off() {
        let config = SceneConfig::from_toml_str("[stars]\nenabled = false\n").unwrap();
        assert_eq!(config.star_params(), None);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = SceneConfig::from_toml_str("[field]\nspeed = 3\n").unwrap_err();
        assert!(matches!(err, SceneError::ConfigParse(_)));
    }

    #[test]
    fn missing_path_means_defaults() {
        assert_eq!(SceneConfig::load(None).unwrap(), SceneConfig::default());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SceneConfig::load(Some(Path::new("/nonexistent/synaptic_web.toml"))).unwrap_err();
        assert!(matches!(err, SceneError::ConfigIo(_)));
    }
}
