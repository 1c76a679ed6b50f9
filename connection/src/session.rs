use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use mysql::prelude::*;
use mysql::{Compression, Conn, LocalInfileHandler, Opts, OptsBuilder};
use tracing::{debug, warn};

use accel_common::config::Config;
use accel_common::err::AccelError;

const MAX_CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_secs(60);

/// A single MySQL session, opened fresh per worker: no two workers ever
/// share a connection. Wraps the `mysql` crate's blocking `Conn`.
pub struct Session {
    conn: Conn,
}

impl Session {
    /// Opens a session against `cfg`'s server, retrying up to
    /// `MAX_CONNECT_ATTEMPTS` times with a 60-second backoff between
    /// attempts after the first failure.
    pub fn connect(cfg: &Config) -> Result<Self, AccelError> {
        Self::connect_with_opts(cfg, Self::build_opts(cfg))
    }

    /// Like [`Session::connect`], but without selecting `cfg.database` as
    /// the default schema. Needed to apply a stage-1 DDL file, since that
    /// file carries its own `CREATE DATABASE` / `USE` statements and the
    /// target database may not exist yet on a fresh restore.
    pub fn connect_without_database(cfg: &Config) -> Result<Self, AccelError> {
        let opts = OptsBuilder::from_opts(Self::build_opts(cfg)).db_name(None::<String>);
        Self::connect_with_opts(cfg, opts.into())
    }

    /// Like [`Session::connect`], but whitelists `fifo_path` for
    /// `LOAD DATA LOCAL INFILE`, since the `mysql` crate refuses
    /// local-infile reads from arbitrary paths by default.
    pub fn connect_allowing_local_infile(cfg: &Config, fifo_path: &Path) -> Result<Self, AccelError> {
        let allowed: PathBuf = fifo_path.to_path_buf();
        let handler = LocalInfileHandler::new(move |requested_name, writer| {
            let requested = Path::new(std::str::from_utf8(requested_name).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, e)
            })?);
            if requested != allowed.as_path() {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("local infile path {requested:?} is not whitelisted"),
                ));
            }
            let mut file = std::fs::File::open(&allowed)?;
            io::copy(&mut file, writer)?;
            Ok(())
        });
        let opts = OptsBuilder::from_opts(Self::build_opts(cfg))
            .local_infile_handler(Some(handler));
        Self::connect_with_opts(cfg, opts.into())
    }

    fn connect_with_opts(cfg: &Config, opts: Opts) -> Result<Self, AccelError> {
        let mut last_err = None;
        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            match Conn::new(opts.clone()) {
                Ok(conn) => {
                    let mut session = Session { conn };
                    session.configure()?;
                    return Ok(session);
                }
                Err(e) => {
                    warn!(attempt, host = %cfg.host, "connection attempt failed: {e}");
                    last_err = Some(e);
                    if attempt < MAX_CONNECT_ATTEMPTS {
                        thread::sleep(CONNECT_BACKOFF);
                    }
                }
            }
        }

        Err(AccelError::Connect {
            host: cfg.host.clone(),
            port: cfg.port,
            attempts: MAX_CONNECT_ATTEMPTS,
            source: last_err.expect("loop runs at least once"),
        })
    }

    fn build_opts(cfg: &Config) -> Opts {
        OptsBuilder::new()
            .ip_or_hostname(Some(cfg.host.clone()))
            .tcp_port(cfg.port)
            .user(Some(cfg.username.clone()))
            .pass(Some(cfg.password.clone()))
            .db_name(Some(cfg.database.clone()))
            .compress(Some(Compression::default()))
            .init(vec!["SET NAMES utf8mb4"])
            .into()
    }

    fn configure(&mut self) -> Result<(), AccelError> {
        debug!("session established");
        Ok(())
    }

    pub fn query_drop(&mut self, sql: &str) -> Result<(), AccelError> {
        self.conn.query_drop(sql).map_err(AccelError::from)
    }

    pub fn exec_drop<P: Into<mysql::Params>>(
        &mut self,
        stmt: &str,
        params: P,
    ) -> Result<(), AccelError> {
        self.conn.exec_drop(stmt, params).map_err(AccelError::from)
    }

    pub fn query_first<T: FromRow>(&mut self, sql: &str) -> Result<Option<T>, AccelError> {
        self.conn.query_first(sql).map_err(AccelError::from)
    }

    pub fn query<T: FromRow>(&mut self, sql: &str) -> Result<Vec<T>, AccelError> {
        self.conn.query(sql).map_err(AccelError::from)
    }

    /// Streams the result set row by row rather than buffering it, via
    /// the `mysql` crate's lazily-fetching `query_iter`.
    pub fn query_iter(&mut self, sql: &str) -> Result<mysql::QueryResult<'_, '_, '_, mysql::Text>, AccelError> {
        self.conn.query_iter(sql).map_err(AccelError::from)
    }

    pub fn affected_rows(&self) -> u64 {
        self.conn.affected_rows()
    }

    pub fn disable_key_checks(&mut self) -> Result<(), AccelError> {
        self.query_drop("SET foreign_key_checks = 0")?;
        self.query_drop("SET unique_checks = 0")
    }
}
