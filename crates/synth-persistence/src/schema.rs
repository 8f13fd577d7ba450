//! Diesel schema, kept in sync with `migrations/` by hand.

diesel::table! {
    runs (id) {
        id -> Uuid,
        status -> Text,
        config -> Jsonb,
        config_hash -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    steps (id) {
        id -> Uuid,
        run_id -> Uuid,
        position -> Integer,
        step_type -> Text,
        method -> Text,
        name -> Nullable<Text>,
        parameters -> Jsonb,
        status -> Text,
        run_at -> Timestamptz,
        finished_at -> Nullable<Timestamptz>,
        metadata -> Nullable<Jsonb>,
    }
}

diesel::table! {
    nodes (id) {
        id -> Uuid,
        parent_id -> Nullable<Uuid>,
        value -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    step_nodes (step_id, node_id, role) {
        step_id -> Uuid,
        node_id -> Uuid,
        role -> Text,
        ordinal -> Integer,
    }
}

diesel::joinable!(steps -> runs (run_id));
diesel::joinable!(step_nodes -> steps (step_id));
diesel::joinable!(step_nodes -> nodes (node_id));

diesel::allow_tables_to_appear_in_same_query!(runs, steps, nodes, step_nodes,);
