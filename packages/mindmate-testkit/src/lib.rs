//! Scratch Postgres databases for the storage tests.
//!
//! Each [`TestDatabase`] lives under a random name on the server named by `MINDMATE_PG_DSN` and is
//! force-dropped by [`TestDatabase::cleanup`], or by `Drop` when a test panics first.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

use mindmate_config::Postgres;

pub const DSN_ENV: &str = "MINDMATE_PG_DSN";

const MAINTENANCE_DATABASE: &str = "postgres";
const NAME_PREFIX: &str = "mindmate_test_";

pub struct TestDatabase {
	name: String,
	dsn: String,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	/// `None` when `MINDMATE_PG_DSN` is unset, so callers can skip instead of fail.
	pub async fn from_env() -> Result<Option<Self>> {
		match env::var(DSN_ENV) {
			Ok(dsn) if !dsn.trim().is_empty() => Ok(Some(Self::create(&dsn).await?)),
			_ => Ok(None),
		}
	}

	pub async fn create(server_dsn: &str) -> Result<Self> {
		let server = PgConnectOptions::from_str(server_dsn)
			.map_err(|err| Error::Message(format!("{DSN_ENV} is not a valid DSN: {err}.")))?;
		let maintenance = server.clone().database(MAINTENANCE_DATABASE);
		let name = format!("{NAME_PREFIX}{}", Uuid::new_v4().simple());
		let mut conn = PgConnection::connect_with(&maintenance).await?;

		sqlx::raw_sql(&format!(r#"CREATE DATABASE "{name}""#)).execute(&mut conn).await?;
		conn.close().await?;

		let dsn = server.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Storage config pointing at this database.
	pub fn postgres(&self, pool_max_conns: u32) -> Postgres {
		Postgres { dsn: self.dsn.clone(), pool_max_conns }
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.maintenance, &self.name).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let maintenance = self.maintenance.clone();
		let name = self.name.clone();
		// A test runtime may still be on this thread, so the drop gets a runtime of its own.
		let outcome = thread::spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(err.to_string()))
				.and_then(|runtime| runtime.block_on(drop_database(&maintenance, &name)))
		})
		.join();

		match outcome {
			Ok(Ok(())) => {},
			Ok(Err(err)) => eprintln!("Leaked test database {}: {err}.", self.name),
			Err(_) => eprintln!("Leaked test database {}: cleanup thread panicked.", self.name),
		}
	}
}

async fn drop_database(maintenance: &PgConnectOptions, name: &str) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	sqlx::raw_sql(&format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#))
		.execute(&mut conn)
		.await?;
	conn.close().await?;

	Ok(())
}
