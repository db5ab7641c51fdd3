mod config;
mod error;

use crate::prefs::PgPrefsRepo;
use crate::{err_ctx, Result};
use sqlx::postgres::PgPoolOptions;

pub(crate) use config::*;
pub(crate) use error::*;

pub(crate) struct Repo {
    pub(crate) prefs: PgPrefsRepo,
}

pub(crate) async fn init(cfg: Config) -> Result<Repo> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.pool_size)
        // Verify that the connection is working early.
        // The connection created here can also be reused by the migrations down the road.
        .connect(cfg.url.as_str())
        .await
        .map_err(err_ctx!(DbError::Connect))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(err_ctx!(DbError::Migrate))?;

    Ok(Repo {
        prefs: PgPrefsRepo::new(pool),
    })
}
