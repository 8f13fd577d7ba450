
use diesel::prelude::*;
use diesel::sql_query;
use synth_persistence::migrations::run_pending_migrations;
use test_support::TEST_POOL;

#[test]
fn migrations_are_idempotent_and_enforce_status_values() {
    let Some(pool) = TEST_POOL.as_ref() else {
        eprintln!("DATABASE_URL not set - skipping migration smoke test");
        return;
    };
    let mut conn = pool.get().expect("connection");
    // already applied when the pool was built
    run_pending_migrations(&mut conn).expect("second run is a no-op");

    let bad = sql_query("INSERT INTO runs (id, status, config, config_hash, created_at) \
                         VALUES (gen_random_uuid(), 'PAUSED', '{}'::jsonb, 'x', now())").execute(&mut conn);
    assert!(bad.is_err(), "unknown run status accepted");

    let self_parent = sql_query("WITH id AS (SELECT gen_random_uuid() AS v) \
                                 INSERT INTO nodes (id, parent_id, value, created_at) \
                                 SELECT v, v, 'loop', now() FROM id").execute(&mut conn);
    assert!(self_parent.is_err(), "self-parented node accepted");
}
