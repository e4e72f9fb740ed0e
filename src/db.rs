use actix_web::web;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, StateMachine};

use crate::config::Config;
use crate::errors::AppError;

pub(crate) const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub(crate) type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(CONNECTION_PRAGMAS)
            .map_err(r2d2::Error::QueryError)
    }
}

/// Shared handle to the database: a connection pool guarded by a circuit breaker.
#[derive(Clone)]
pub(crate) struct Storage {
    pool: DbPool,
    circuit_breaker: CircuitBreakerType,
}

impl Storage {
    /// Builds the pool and brings the schema up to date.
    pub(crate) fn connect(config: &Config) -> Result<Self, AppError> {
        let manager = ConnectionManager::<SqliteConnection>::new(&config.database_url);
        let pool = r2d2::Pool::builder()
            .max_size(config.pool_max_size)
            .connection_customizer(Box::new(SqlitePragmas))
            .build(manager)?;

        let storage = Storage {
            pool,
            circuit_breaker: failsafe::Config::new().build(),
        };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> Result<(), AppError> {
        let mut conn = self.pool.get()?;
        run_migrations(&mut conn)
    }

    /// Runs `op` with a pooled connection on the blocking thread pool.
    ///
    /// Only storage failures are reported to the circuit breaker; while it is
    /// open every call is rejected with [`AppError::Unavailable`].
    pub(crate) async fn run<F, R>(&self, op: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<R, AppError> + Send + 'static,
        R: Send + 'static,
    {
        let pool = self.pool.clone();
        let circuit_breaker = self.circuit_breaker.clone();

        web::block(move || {
            let result = circuit_breaker.call_with(
                |err: &AppError| err.is_storage_failure(),
                || {
                    let mut conn = pool.get()?;
                    op(&mut conn)
                },
            );
            match result {
                Ok(value) => Ok(value),
                Err(failsafe::Error::Inner(err)) => Err(err),
                Err(failsafe::Error::Rejected) => {
                    //rejected which means the database is not responsive
                    log::warn!("circuit breaker is open, rejecting storage call");
                    Err(AppError::Unavailable)
                }
            }
        })
        .await?
    }
}

pub(crate) fn run_migrations(conn: &mut SqliteConnection) -> Result<(), AppError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| AppError::Migration(err.to_string()))?;
    for version in applied {
        log::info!("applied migration {}", version);
    }
    Ok(())
}

/// A fresh in-memory database with the schema applied.
#[cfg(test)]
pub(crate) fn test_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    conn.batch_execute(CONNECTION_PRAGMAS).unwrap();
    run_migrations(&mut conn).unwrap();
    conn
}

/// A single-connection pool, so every checkout sees the same in-memory database.
#[cfg(test)]
pub(crate) fn test_storage() -> Storage {
    let config = Config {
        database_url: ":memory:".to_string(),
        pool_max_size: 1,
        ..Config::default()
    };
    Storage::connect(&config).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{IngredientLine, IngredientRef, RecipeInput, RecipeUpdate};
    use crate::models::RecipeChanges;
    use crate::query;
    use diesel::result::Error as DieselError;
    use diesel::sql_types::Integer;

    #[derive(QueryableByName)]
    struct Pragma {
        #[diesel(sql_type = Integer)]
        foreign_keys: i32,
    }

    #[actix_web::test]
    async fn test_pooled_connections_enforce_foreign_keys() {
        let storage = test_storage();
        let pragma = storage
            .run(|conn| Ok(diesel::sql_query("PRAGMA foreign_keys").get_result::<Pragma>(conn)?))
            .await
            .unwrap();
        assert_eq!(pragma.foreign_keys, 1);
    }

    #[actix_web::test]
    async fn test_request_errors_pass_through() {
        let storage = test_storage();
        let err = storage
            .run(|_| Err::<(), _>(AppError::not_found("recipe", 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { id: 1, .. }));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = test_connection();
        run_migrations(&mut conn).unwrap();
    }

    #[actix_web::test]
    async fn test_breaker_opens_after_storage_failures() {
        let storage = test_storage();
        for _ in 0..10 {
            let result = storage
                .run(|_| Err::<(), _>(AppError::Database(DieselError::BrokenTransactionManager)))
                .await;
            assert!(result.is_err());
        }

        let err = storage.run(|_| Ok(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Unavailable));
    }

    #[actix_web::test]
    async fn test_breaker_ignores_request_errors() {
        let storage = test_storage();
        for id in 0..50 {
            let err = storage
                .run(move |_| Err::<(), _>(AppError::not_found("recipe", id)))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound { .. }));
        }

        assert_eq!(storage.run(|_| Ok(1)).await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn test_concurrent_updates_wait_for_the_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_url: dir.path().join("recipes.db").to_string_lossy().into_owned(),
            pool_max_size: 8,
            ..Config::default()
        };
        let storage = Storage::connect(&config).unwrap();

        let input = RecipeInput {
            name: "spag bol".to_string(),
            instructions: "boil".to_string(),
            ingredients: vec![IngredientLine {
                target: IngredientRef::Named {
                    name: "spag".to_string(),
                    size: Some("100g".to_string()),
                },
                amount: 1.0,
            }],
        };
        let recipe = storage
            .run(move |conn| query::create_recipe(conn, &input))
            .await
            .unwrap();
        let recipe_id = recipe.id;

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let storage = storage.clone();
                actix_web::rt::spawn(async move {
                    let update = RecipeUpdate {
                        changes: RecipeChanges {
                            name: None,
                            instructions: Some(format!("step {}", n)),
                        },
                        ingredients: Some(vec![IngredientLine {
                            target: IngredientRef::Named {
                                name: format!("spice {}", n),
                                size: Some("1g".to_string()),
                            },
                            amount: 1.0,
                        }]),
                    };
                    storage
                        .run(move |conn| query::update_recipe(conn, recipe_id, &update))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let recipe = storage
            .run(move |conn| query::find_recipe(conn, recipe_id))
            .await
            .unwrap();
        assert_eq!(recipe.ingredients.len(), 1);
        assert!(recipe.instructions.starts_with("step "));
    }
}
