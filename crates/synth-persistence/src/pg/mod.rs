//! Postgres (Diesel) implementation of the core `RecordStore`.
//!
//! - Every trait method runs in one read-write transaction, so the multi-row
//!   writes (`create_run_with_steps`, `begin_step`, `complete_step`) commit
//!   all of their rows or none.
//! - Reads never cache: each call checks a connection out of the pool.
//! - Transient failures (pool checkout, serialization conflicts, dropped
//!   connections) are retried with a short backoff; everything else is mapped
//!   to `StoreError` and returned.
//!
//! ## Status writes
//!
//! Run and step status columns are only ever written with
//! `UPDATE ... WHERE id = $1 AND status = $expected`. Under READ COMMITTED
//! a second writer blocks on the row lock, then re-checks the `status`
//! predicate against the committed row, so of two concurrent moves away from
//! the same status exactly one updates a row. Zero rows updated is looked up
//! once more to tell a missing row (`NotFound`) from a moved one
//! (`Conflict`). The retry loop never sees that conflict: it is a
//! `Rejected` error, not a serialization failure, and retrying it could
//! only fail the same way.
//!
//! ## Batching
//!
//! Input and output links of a step are one row per node and the working
//! set has no upper bound, so a step over a large batch can carry tens of
//! thousands of links. Those rows are sent in chunks of `INSERT_BATCH`
//! inside the same transaction. The commit stays all-or-nothing and no
//! single statement comes near the protocol's bind parameter limit.

mod rows;

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use synth_core::{LinkRole, Node, NodeId, RecordStore, Run, RunId, RunStatus, Step, StepId, StepNode, StepStatus,
                 StoreError};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{nodes, runs, step_nodes, steps};
pub use rows::{NodeRow, RunRow, StepNodeRow, StepRow};

/// r2d2 pool of Postgres connections. Building one runs pending migrations.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Source of connections, so the store can be fed a real pool or something
/// narrower in tests.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // some driver errors only arrive as text
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Up to 3 retries with a 15ms, 30ms, 45ms backoff.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// `RecordStore` over Postgres.
pub struct PgRecordStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgRecordStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Runs `f` in a read-write transaction, retrying transient failures.
    fn write<T, F>(&self, mut f: F) -> Result<T, StoreError>
        where F: FnMut(&mut PgConnection) -> Result<T, PersistenceError>
    {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run(|tx| f(tx))
        }).map_err(StoreError::from)
    }

    fn read<T, F>(&self, mut f: F) -> Result<T, StoreError>
        where F: FnMut(&mut PgConnection) -> Result<T, PersistenceError>
    {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            f(&mut conn)
        }).map_err(StoreError::from)
    }
}

/// Rows per INSERT. Link and node rows bind four parameters each, which keeps
/// a statement well under the 65535 bind parameters Postgres accepts.
const INSERT_BATCH: usize = 10_000;

fn update_step_columns(conn: &mut PgConnection, step: &Step, expected: StepStatus) -> Result<(), PersistenceError> {
    let updated = diesel::update(steps::table.find(step.id).filter(steps::status.eq(expected.as_str())))
        .set((steps::status.eq(step.status.as_str()),
              steps::run_at.eq(step.run_at),
              steps::finished_at.eq(step.finished_at),
              steps::metadata.eq(step.metadata.clone())))
        .execute(conn)?;
    if updated == 0 {
        let stored: Option<String> = steps::table.find(step.id).select(steps::status).first(conn).optional()?;
        return Err(match stored {
                       Some(status) => {
                           PersistenceError::Rejected(format!("step {} is {status}, expected {expected}", step.id))
                       }
                       None => PersistenceError::Missing { entity: "step",
                                                           id: step.id },
                   });
    }
    Ok(())
}

fn insert_links(conn: &mut PgConnection, step_id: StepId, links: &[StepNode]) -> Result<usize, PersistenceError> {
    if let Some(l) = links.iter().find(|l| l.step_id != step_id) {
        return Err(PersistenceError::Rejected(format!("link for step {} passed with step {step_id}", l.step_id)));
    }
    let rows: Vec<StepNodeRow> = links.iter().map(StepNodeRow::from).collect();
    let mut inserted = 0;
    for batch in rows.chunks(INSERT_BATCH) {
        // existing links are kept as recorded
        inserted += diesel::insert_into(step_nodes::table).values(batch)
                                                          .on_conflict_do_nothing()
                                                          .execute(conn)?;
    }
    Ok(inserted)
}

fn insert_node_rows(conn: &mut PgConnection, nodes: &[Node]) -> Result<(), PersistenceError> {
    // The parent FK is checked at the end of each statement, so a child may
    // share a batch with its parent but never come in an earlier batch.
    let rows: Vec<NodeRow> = nodes.iter().map(NodeRow::from).collect();
    for batch in rows.chunks(INSERT_BATCH) {
        diesel::insert_into(nodes::table).values(batch).execute(conn)?;
    }
    Ok(())
}

impl<P: ConnectionProvider> RecordStore for PgRecordStore<P> {
    fn create_run_with_steps(&self, run: &Run, run_steps: &[Step]) -> Result<(), StoreError> {
        for (i, step) in run_steps.iter().enumerate() {
            if step.run_id != run.id {
                return Err(StoreError::Conflict(format!("step {} belongs to run {}", step.id, step.run_id)));
            }
            if step.position != i as u32 + 1 {
                return Err(StoreError::Conflict(format!("step positions must be 1..{} in order, got {} at index {i}",
                                                        run_steps.len(),
                                                        step.position)));
            }
        }
        let run_row = RunRow::from(run);
        let step_rows = run_steps.iter().map(StepRow::try_from).collect::<Result<Vec<_>, _>>()?;
        self.write(|conn| {
                diesel::insert_into(runs::table).values(&run_row).execute(conn)?;
                if !step_rows.is_empty() {
                    diesel::insert_into(steps::table).values(&step_rows).execute(conn)?;
                }
                Ok(())
            })?;
        debug!("create_run_with_steps run_id={} steps={}", run.id, run_steps.len());
        Ok(())
    }

    fn get_run(&self, id: RunId) -> Result<Run, StoreError> {
        self.read(|conn| {
                let row: Option<RunRow> = runs::table.find(id).first(conn).optional()?;
                row.ok_or(PersistenceError::Missing { entity: "run", id })?.try_into()
            })
    }

    fn list_runs(&self) -> Result<Vec<Run>, StoreError> {
        self.read(|conn| {
                let rows: Vec<RunRow> = runs::table.order((runs::created_at.asc(), runs::id.asc())).load(conn)?;
                rows.into_iter().map(Run::try_from).collect()
            })
    }

    fn update_run(&self, run: &Run, expected: RunStatus) -> Result<(), StoreError> {
        self.write(|conn| {
                let updated = diesel::update(runs::table.find(run.id).filter(runs::status.eq(expected.as_str())))
                    .set(runs::status.eq(run.status.as_str()))
                    .execute(conn)?;
                if updated == 0 {
                    let stored: Option<String> = runs::table.find(run.id).select(runs::status).first(conn).optional()?;
                    return Err(match stored {
                                   Some(status) => PersistenceError::Rejected(format!("run {} is {status}, expected {expected}",
                                                                                      run.id)),
                                   None => PersistenceError::Missing { entity: "run",
                                                                       id: run.id },
                               });
                }
                Ok(())
            })?;
        debug!("update_run run_id={} status={}", run.id, run.status);
        Ok(())
    }

    fn get_step(&self, id: StepId) -> Result<Step, StoreError> {
        self.read(|conn| {
                let row: Option<StepRow> = steps::table.find(id).first(conn).optional()?;
                row.ok_or(PersistenceError::Missing { entity: "step", id })?.try_into()
            })
    }

    fn list_steps(&self, run_id: RunId) -> Result<Vec<Step>, StoreError> {
        self.read(|conn| {
                let exists: Option<RunId> = runs::table.find(run_id).select(runs::id).first(conn).optional()?;
                if exists.is_none() {
                    return Err(PersistenceError::Missing { entity: "run",
                                                           id: run_id });
                }
                let rows: Vec<StepRow> = steps::table.filter(steps::run_id.eq(run_id))
                                                     .order(steps::position.asc())
                                                     .load(conn)?;
                rows.into_iter().map(Step::try_from).collect()
            })
    }

    fn update_step(&self, step: &Step, expected: StepStatus) -> Result<(), StoreError> {
        self.write(|conn| update_step_columns(conn, step, expected))?;
        debug!("update_step step_id={} status={}", step.id, step.status);
        Ok(())
    }

    fn begin_step(&self, step: &Step, expected: StepStatus, inputs: &[StepNode]) -> Result<(), StoreError> {
        let inserted = self.write(|conn| {
                               update_step_columns(conn, step, expected)?;
                               insert_links(conn, step.id, inputs)
                           })?;
        debug!("begin_step step_id={} links_inserted={inserted}", step.id);
        Ok(())
    }

    fn complete_step(&self,
                     step: &Step,
                     expected: StepStatus,
                     produced: &[Node],
                     outputs: &[StepNode])
                     -> Result<(), StoreError> {
        self.write(|conn| {
                // status first: a stale caller is turned away before it writes rows
                update_step_columns(conn, step, expected)?;
                insert_node_rows(conn, produced)?;
                insert_links(conn, step.id, outputs)?;
                Ok(())
            })?;
        debug!("complete_step step_id={} produced={}", step.id, produced.len());
        Ok(())
    }

    fn insert_nodes(&self, new_nodes: &[Node]) -> Result<(), StoreError> {
        self.write(|conn| insert_node_rows(conn, new_nodes))?;
        debug!("insert_nodes count={}", new_nodes.len());
        Ok(())
    }

    fn get_node(&self, id: NodeId) -> Result<Node, StoreError> {
        self.read(|conn| {
                let row: Option<NodeRow> = nodes::table.find(id).first(conn).optional()?;
                row.map(Node::from).ok_or(PersistenceError::Missing { entity: "node", id })
            })
    }

    fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<Node>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(|conn| {
                let rows: Vec<NodeRow> = nodes::table.filter(nodes::id.eq_any(ids.to_vec())).load(conn)?;
                let by_id: HashMap<NodeId, Node> = rows.into_iter().map(|r| (r.id, Node::from(r))).collect();
                ids.iter()
                   .map(|id| {
                       by_id.get(id)
                            .cloned()
                            .ok_or(PersistenceError::Missing { entity: "node", id: *id })
                   })
                   .collect()
            })
    }

    fn list_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        self.read(|conn| {
                let rows: Vec<NodeRow> = nodes::table.filter(nodes::parent_id.eq(id))
                                                     .order((nodes::created_at.asc(), nodes::id.asc()))
                                                     .load(conn)?;
                Ok(rows.into_iter().map(Node::from).collect())
            })
    }

    fn list_step_nodes(&self, step_id: StepId, role: LinkRole) -> Result<Vec<StepNode>, StoreError> {
        self.read(|conn| {
                let rows: Vec<StepNodeRow> = step_nodes::table.filter(step_nodes::step_id.eq(step_id))
                                                              .filter(step_nodes::role.eq(role.as_str()))
                                                              .order(step_nodes::ordinal.asc())
                                                              .load(conn)?;
                rows.into_iter().map(StepNode::try_from).collect()
            })
    }
}

/// Builds an r2d2 pool and runs pending migrations on its first connection.
///
/// A zero size is raised to 1; `min_size` is capped at `max_size`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), using min = max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Loads `.env`, reads `DbConfig` and builds a migrated pool.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

/// Store over a pool built from the environment.
pub fn store_from_env() -> Result<PgRecordStore<PoolProvider>, PersistenceError> {
    Ok(PgRecordStore::new(PoolProvider { pool: build_dev_pool_from_env()? }))
}
