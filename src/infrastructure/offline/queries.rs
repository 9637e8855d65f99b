pub(super) const UPSERT_MUTATION: &str = r#"
    INSERT INTO mutation_queue (
        id,
        entity_type,
        entity_id,
        action,
        method,
        endpoint,
        payload,
        description,
        created_at,
        status,
        retry_count,
        next_attempt_at,
        last_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        retry_count = excluded.retry_count,
        next_attempt_at = excluded.next_attempt_at,
        last_error = excluded.last_error
"#;

pub(super) const DELETE_MUTATION: &str = r#"
    DELETE FROM mutation_queue
    WHERE id = ?1
"#;

pub(super) const SELECT_MUTATIONS: &str = r#"
    SELECT id,
           entity_type,
           entity_id,
           action,
           method,
           endpoint,
           payload,
           description,
           created_at,
           status,
           retry_count,
           next_attempt_at,
           last_error
    FROM mutation_queue
    ORDER BY created_at ASC, id ASC
"#;

pub(super) const CLEAR_MUTATIONS: &str = r#"DELETE FROM mutation_queue"#;

pub(super) const UPSERT_UPLOAD: &str = r#"
    INSERT INTO upload_queue (
        id,
        local_asset_ref,
        job_id,
        category,
        status,
        retry_count,
        server_id,
        created_at,
        next_attempt_at,
        last_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        retry_count = excluded.retry_count,
        server_id = COALESCE(upload_queue.server_id, excluded.server_id),
        next_attempt_at = excluded.next_attempt_at,
        last_error = excluded.last_error
"#;

pub(super) const DELETE_UPLOAD: &str = r#"
    DELETE FROM upload_queue
    WHERE id = ?1
"#;

pub(super) const SELECT_UPLOADS: &str = r#"
    SELECT id,
           local_asset_ref,
           job_id,
           category,
           status,
           retry_count,
           server_id,
           created_at,
           next_attempt_at,
           last_error
    FROM upload_queue
    ORDER BY created_at ASC, id ASC
"#;

pub(super) const CLEAR_UPLOADS: &str = r#"DELETE FROM upload_queue"#;
