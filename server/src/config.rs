//! Server configuration and command-line arguments

use crate::lifecycle::SweepPolicy;
use crate::session_store::StoreConfig;
use crate::token::{TokenAlphabet, TokenGenerator};
use clap::{Parser, ValueEnum};
use shared::{
    MappingConfig, MotionConfig, OutlierGuard, ResponseCurve, SmoothingConfig, SmoothingPolicy,
};
use std::time::Duration;

/// Everything the HTTP facade and the sweeper need
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Staleness window for the polling endpoints
    pub read_ttl_ms: u64,
    pub mapping: MappingConfig,
    pub store: StoreConfig,
    pub sweep: SweepPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_ttl_ms: 5_000,
            mapping: MappingConfig::default(),
            sweep: SweepPolicy {
                max_sessions: store.max_sessions,
                ..SweepPolicy::default()
            },
            store,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn motion(&self) -> MotionConfig {
        MotionConfig {
            smoothing: self.store.smoothing.clone(),
            mapping: self.mapping.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlphabetArg {
    Alphanumeric,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Simple,
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CurveArg {
    Linear,
    Sqrt,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Bridges phone motion sensors to PictoBlox over HTTP")]
pub struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Seconds without updates before a session is swept
    #[arg(long, default_value = "300")]
    pub session_ttl: u64,

    /// Milliseconds without updates before polls fall back to the center value
    #[arg(long, default_value = "5000")]
    pub read_ttl_ms: u64,

    /// Seconds between expiry sweeps
    #[arg(long, default_value = "60")]
    pub sweep_interval: u64,

    /// Maximum number of live sessions
    #[arg(short = 'm', long, default_value = "500")]
    pub max_sessions: usize,

    /// Minimum milliseconds between accepted updates of one session
    #[arg(long, default_value = "20")]
    pub debounce_ms: u64,

    /// Session token length
    #[arg(long, default_value = "8")]
    pub token_length: usize,

    /// Characters tokens are drawn from
    #[arg(long, value_enum, default_value = "alphanumeric")]
    pub token_alphabet: AlphabetArg,

    /// Number of samples in the smoothing window
    #[arg(short = 'w', long, default_value = "3")]
    pub window: usize,

    /// How samples in the window are averaged
    #[arg(long, value_enum, default_value = "weighted")]
    pub smoothing: PolicyArg,

    /// Deviation that marks a spike; 0 disables the outlier guard
    #[arg(long, default_value = "5.0")]
    pub outlier_threshold: f64,

    /// Multiplier for the single-axis endpoints
    #[arg(short, long, default_value = "1.0")]
    pub sensitivity: f64,

    /// Single-axis output bound
    #[arg(long, default_value = "5")]
    pub axis_bound: i32,

    /// Input range mapped onto the 1..=9 scale
    #[arg(long, default_value = "10.0")]
    pub input_range: f64,

    /// Scale response curve
    #[arg(long, value_enum, default_value = "linear")]
    pub curve: CurveArg,

    /// Readings beyond this magnitude are treated as sensor faults
    #[arg(long, default_value = "20.0")]
    pub sanity_bound: f64,
}

impl Args {
    pub fn into_config(self) -> ServerConfig {
        let outlier_guard = (self.outlier_threshold > 0.0).then(|| OutlierGuard {
            threshold: self.outlier_threshold,
            ..OutlierGuard::default()
        });

        let store = StoreConfig {
            max_sessions: self.max_sessions,
            debounce_ms: self.debounce_ms,
            session_ttl_ms: self.session_ttl.saturating_mul(1_000),
            tokens: TokenGenerator {
                length: self.token_length.max(1),
                alphabet: match self.token_alphabet {
                    AlphabetArg::Alphanumeric => TokenAlphabet::Alphanumeric,
                    AlphabetArg::Numeric => TokenAlphabet::Numeric,
                },
            },
            smoothing: SmoothingConfig {
                window_size: self.window.max(1),
                policy: match self.smoothing {
                    PolicyArg::Simple => SmoothingPolicy::Simple,
                    PolicyArg::Weighted => SmoothingPolicy::Weighted,
                },
                outlier_guard,
            },
            ..StoreConfig::default()
        };

        ServerConfig {
            host: self.host,
            port: self.port,
            read_ttl_ms: self.read_ttl_ms,
            mapping: MappingConfig {
                sensitivity: self.sensitivity,
                axis_bound: self.axis_bound,
                input_range: self.input_range,
                curve: match self.curve {
                    CurveArg::Linear => ResponseCurve::Linear,
                    CurveArg::Sqrt => ResponseCurve::Sqrt,
                },
                sanity_bound: self.sanity_bound,
            },
            sweep: SweepPolicy {
                session_ttl: Duration::from_secs(self.session_ttl),
                interval: Duration::from_secs(self.sweep_interval.max(1)),
                max_sessions: self.max_sessions,
            },
            store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_default_config() {
        let args = Args::try_parse_from(["server"]).unwrap();
        assert_eq!(args.into_config(), ServerConfig::default());
    }

    #[test]
    fn test_custom_args() {
        let args = Args::try_parse_from([
            "server",
            "--port",
            "9000",
            "--token-alphabet",
            "numeric",
            "--smoothing",
            "simple",
            "--curve",
            "sqrt",
            "--outlier-threshold",
            "0",
            "-m",
            "3",
        ])
        .unwrap();
        let config = args.into_config();

        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.store.tokens.alphabet, TokenAlphabet::Numeric);
        assert_eq!(config.store.smoothing.policy, SmoothingPolicy::Simple);
        assert_eq!(config.store.smoothing.outlier_guard, None);
        assert_eq!(config.mapping.curve, ResponseCurve::Sqrt);
        assert_eq!(config.store.max_sessions, 3);
        assert_eq!(config.sweep.max_sessions, 3);
        assert_eq!(
            config.store.session_ttl_ms,
            config.sweep.session_ttl.as_millis() as u64
        );
    }
}
