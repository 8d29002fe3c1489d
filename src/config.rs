// Launch configuration.
// Command-line flags and environment variables for serving and cache maintenance.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use url::Url;

use crate::cache::DiskCacheStorage;
use crate::error::{NetfirstError, Result};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CACHE_NAME: &str = "netfirst-v1";

/// Network-first proxy with an offline cache fallback.
#[derive(Debug, Parser)]
#[command(name = "netfirst", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the origin through the fetch interceptor.
    Serve(ServeConfig),
    /// Inspect or populate the fallback cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Fetch paths from the origin and store the responses.
    Add {
        /// Paths (resolved against --origin) or absolute URLs.
        #[arg(required = true)]
        targets: Vec<String>,
        #[arg(long, env = "ORIGIN")]
        origin: Option<Url>,
        #[command(flatten)]
        cache: CacheConfig,
    },
    /// List stored entries.
    Ls {
        #[command(flatten)]
        cache: CacheConfig,
    },
    /// Remove stored entries.
    Rm {
        #[arg(required = true)]
        targets: Vec<String>,
        #[arg(long, env = "ORIGIN")]
        origin: Option<Url>,
        #[command(flatten)]
        cache: CacheConfig,
    },
    /// Drop the whole named cache.
    Clear {
        #[command(flatten)]
        cache: CacheConfig,
    },
}

/// Options for `netfirst serve`.
#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    /// Origin the proxy forwards to.
    #[arg(long, env = "ORIGIN")]
    pub origin: Url,

    /// Address to listen on.
    #[arg(long, env = "BIND_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Intercept requests with the network-first worker. Off forwards everything as is.
    #[arg(
        long,
        env = "WORKER_MODE",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub worker_mode: bool,

    #[command(flatten)]
    pub cache: CacheConfig,
}

impl ServeConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Where the fallback cache lives.
#[derive(Debug, Clone, Args)]
pub struct CacheConfig {
    /// Cache directory. Defaults to the platform cache dir.
    #[arg(long, env = "CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Named cache that `add` writes to.
    #[arg(long, env = "CACHE_NAME", default_value = DEFAULT_CACHE_NAME)]
    pub cache_name: String,
}

impl CacheConfig {
    pub fn storage(&self) -> Result<DiskCacheStorage> {
        match &self.cache_dir {
            Some(dir) => Ok(DiskCacheStorage::new(dir)),
            None => DiskCacheStorage::default_location(),
        }
    }
}

/// Resolve a CLI target: absolute URLs pass through, paths join the origin.
pub fn resolve_target(origin: Option<&Url>, target: &str) -> Result<Url> {
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let origin = origin.ok_or_else(|| {
                NetfirstError::Other(format!("{} is a path; pass --origin to resolve it", target))
            })?;
            Ok(origin.join(target)?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from([
            "netfirst",
            "serve",
            "--origin",
            "http://127.0.0.1:9000",
            "--port",
            "8080",
            "--worker-mode",
            "off",
            "--cache-dir",
            "/tmp/nf",
            "--cache-name",
            "v2",
        ])
        .unwrap();

        let Command::Serve(config) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(config.origin.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.port, 8080);
        assert!(!config.worker_mode);
        assert_eq!(config.cache.cache_dir, Some(PathBuf::from("/tmp/nf")));
        assert_eq!(config.cache.cache_name, "v2");
    }

    #[test]
    fn test_worker_mode_accepts_boolish_values() {
        for (value, expected) in [("true", true), ("1", true), ("yes", true), ("false", false)] {
            let cli = Cli::try_parse_from([
                "netfirst",
                "serve",
                "--origin",
                "http://localhost",
                "--worker-mode",
                value,
            ])
            .unwrap();
            let Command::Serve(config) = cli.command else {
                panic!("expected serve");
            };
            assert_eq!(config.worker_mode, expected, "value {}", value);
        }
    }

    #[test]
    fn test_addr() {
        let cli = Cli::try_parse_from([
            "netfirst",
            "serve",
            "--origin",
            "http://localhost",
            "--host",
            "127.0.0.1",
            "--port",
            "9001",
        ])
        .unwrap();
        let Command::Serve(config) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(config.addr(), "127.0.0.1:9001".parse().unwrap());
    }

    #[test]
    fn test_resolve_target() {
        let origin = Url::parse("https://example.com").unwrap();

        let url = resolve_target(Some(&origin), "/index.html").unwrap();
        assert_eq!(url.as_str(), "https://example.com/index.html");

        let url = resolve_target(None, "https://other.example/app.js").unwrap();
        assert_eq!(url.as_str(), "https://other.example/app.js");

        assert!(resolve_target(None, "/index.html").is_err());
    }
}
