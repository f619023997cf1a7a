use std::time::Duration;

use clap::Parser;

/// Runtime configuration. Every flag has an environment-variable fallback
/// so the daemon can run fully env-configured in containers.
#[derive(Parser, Debug, Clone)]
#[command(name = "outpost_daemon", about = "Mars Outpost Scene Daemon", allow_negative_numbers = true)]
pub struct Config {
    /// `production` lowers per-request HTTP log verbosity.
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "HTTP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Scene loaded and served by this process.
    #[arg(long, env = "SCENE_ID", default_value = "mars_outpost_min")]
    pub scene_id: String,

    /// Wall-clock seconds between energy ticks. Non-positive falls back
    /// to one second.
    #[arg(long, default_value_t = 1.0)]
    pub tick_interval_secs: f64,

    /// Logical seconds applied per tick. Non-positive means "same as the
    /// tick interval".
    #[arg(long, default_value_t = 0.0)]
    pub tick_seconds: f64,

    #[arg(long, default_value_t = outpost_core::DEFAULT_DRAIN_FACTOR)]
    pub drain_factor: f64,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn tick_interval(&self) -> Duration {
        if self.tick_interval_secs > 0.0 {
            Duration::from_secs_f64(self.tick_interval_secs)
        } else {
            Duration::from_secs(1)
        }
    }

    pub fn effective_tick_seconds(&self) -> f64 {
        if self.tick_seconds > 0.0 {
            self.tick_seconds
        } else {
            self.tick_interval().as_secs_f64()
        }
    }

    pub fn effective_drain_factor(&self) -> f64 {
        if self.drain_factor > 0.0 {
            self.drain_factor
        } else {
            outpost_core::DEFAULT_DRAIN_FACTOR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["outpost_daemon", "--database-url", "postgres://localhost/test"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = parse(&[]);
        assert_eq!(cfg.environment, "development");
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.scene_id, "mars_outpost_min");
        assert!(!cfg.is_production());
        assert_eq!(cfg.address(), "0.0.0.0:8080");
    }

    #[test]
    fn production_flag_is_recognized() {
        let cfg = parse(&["--environment", "production"]);
        assert!(cfg.is_production());
    }

    #[test]
    fn tick_knobs_normalize_non_positive_values() {
        let cfg = parse(&[]);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
        assert_eq!(cfg.effective_tick_seconds(), 1.0);
        assert_eq!(cfg.effective_drain_factor(), 1.0);

        let cfg = parse(&[
            "--tick-interval-secs",
            "0",
            "--tick-seconds",
            "-2",
            "--drain-factor",
            "0",
        ]);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
        assert_eq!(cfg.effective_tick_seconds(), 1.0);
        assert_eq!(cfg.effective_drain_factor(), 1.0);

        let cfg = parse(&["--tick-interval-secs", "0.5", "--tick-seconds", "2.0"]);
        assert_eq!(cfg.tick_interval(), Duration::from_millis(500));
        assert_eq!(cfg.effective_tick_seconds(), 2.0);
    }

    #[test]
    fn database_url_is_required() {
        assert!(Config::try_parse_from(["outpost_daemon"]).is_err() || std::env::var("DATABASE_URL").is_ok());
    }
}
