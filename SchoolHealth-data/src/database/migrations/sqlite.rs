use rusqlite::Connection;
use tracing::{debug, info};

/// Run SQLite migrations
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    info!("Running SQLite migrations");

    create_accounts_table(conn)?;
    create_doctors_table(conn)?;
    create_exam_session_tables(conn)?;
    create_physical_fitness_table(conn)?;
    create_medical_tables(conn)?;
    create_drugs_table(conn)?;
    create_news_table(conn)?;
    create_chat_tables(conn)?;
    create_backups_table(conn)?;

    info!("SQLite migrations completed successfully");
    Ok(())
}

fn apply(conn: &Connection, name: &str, sql: &str) -> Result<(), String> {
    debug!("Applying migration step: {}", name);
    conn.execute_batch(sql)
        .map_err(|e| format!("Failed to apply {}: {}", name, e))
}

/// Students and plain users share the accounts table
fn create_accounts_table(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "accounts",
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL COLLATE NOCASE UNIQUE,
            password_hash TEXT NOT NULL,
            image TEXT,
            address_line1 TEXT NOT NULL DEFAULT '',
            address_line2 TEXT NOT NULL DEFAULT '',
            gender TEXT,
            dob TEXT,
            phone TEXT,
            role TEXT NOT NULL,
            cohort TEXT,
            student_id TEXT,
            major TEXT,
            about TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_student_id
            ON accounts (student_id) WHERE student_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_accounts_role ON accounts (role);",
    )
}

fn create_doctors_table(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "doctors",
        "CREATE TABLE IF NOT EXISTS doctors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL COLLATE NOCASE UNIQUE,
            password_hash TEXT NOT NULL,
            image TEXT,
            speciality TEXT NOT NULL,
            degree TEXT NOT NULL,
            experience TEXT NOT NULL,
            about TEXT NOT NULL,
            fees REAL NOT NULL DEFAULT 0,
            address_line1 TEXT NOT NULL DEFAULT '',
            address_line2 TEXT NOT NULL DEFAULT '',
            available INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );",
    )
}

fn create_exam_session_tables(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "exam_sessions",
        "CREATE TABLE IF NOT EXISTS exam_sessions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            session_date TEXT NOT NULL,
            academic_year TEXT,
            description TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL,
            is_locked INTEGER NOT NULL DEFAULT 0,
            lock_reason TEXT,
            locked_at TEXT,
            locked_by TEXT
        );
        CREATE TABLE IF NOT EXISTS edit_requests (
            id TEXT PRIMARY KEY,
            exam_session_id TEXT NOT NULL,
            requested_by TEXT NOT NULL,
            requested_by_name TEXT NOT NULL DEFAULT '',
            reason TEXT NOT NULL,
            specific_students TEXT NOT NULL DEFAULT '[]',
            expected_completion_time TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            reviewed_by TEXT,
            admin_response TEXT,
            reviewed_at TEXT,
            temp_unlock_until TEXT,
            is_auto_locked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_edit_requests_session
            ON edit_requests (exam_session_id, requested_by, status);",
    )
}

fn create_physical_fitness_table(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "physical_fitness",
        "CREATE TABLE IF NOT EXISTS physical_fitness (
            id TEXT PRIMARY KEY,
            exam_session_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            cohort TEXT,
            gender TEXT,
            follow_date TEXT NOT NULL DEFAULT '',
            height REAL,
            weight REAL,
            z_score_height REAL,
            height_rating TEXT,
            z_score_weight REAL,
            weight_rating TEXT,
            z_score_weight_height REAL,
            bmi REAL,
            bmi_rating TEXT,
            systolic REAL,
            diastolic REAL,
            blood_pressure_rating TEXT,
            heart_rate REAL,
            heart_rate_rating TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_physical_fitness_natural_key
            ON physical_fitness (student_id, follow_date, exam_session_id);
        CREATE INDEX IF NOT EXISTS idx_physical_fitness_session
            ON physical_fitness (exam_session_id);",
    )
}

fn create_medical_tables(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "abnormalities and prescriptions",
        "CREATE TABLE IF NOT EXISTS abnormalities (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            doctor_name TEXT NOT NULL,
            exam_date TEXT NOT NULL,
            symptoms TEXT NOT NULL,
            temporary_treatment TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_abnormalities_student
            ON abnormalities (student_id, exam_date DESC);
        CREATE TABLE IF NOT EXISTS prescriptions (
            id TEXT PRIMARY KEY,
            abnormality_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            doctor_name TEXT NOT NULL,
            prescription_date TEXT NOT NULL,
            diagnosis TEXT NOT NULL,
            notes TEXT,
            medicines TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_prescriptions_student
            ON prescriptions (student_id, prescription_date DESC);",
    )
}

fn create_drugs_table(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "drugs",
        "CREATE TABLE IF NOT EXISTS drugs (
            id TEXT PRIMARY KEY,
            image TEXT,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            drug_type TEXT NOT NULL,
            unit TEXT NOT NULL,
            inventory_quantity INTEGER NOT NULL CHECK (inventory_quantity >= 0),
            expiry_date TEXT NOT NULL,
            supplier_name TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );",
    )
}

fn create_news_table(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "news",
        "CREATE TABLE IF NOT EXISTS news (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            news_date TEXT NOT NULL,
            content TEXT NOT NULL,
            file TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )
}

fn create_chat_tables(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "chat",
        "CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            participant_a TEXT NOT NULL,
            participant_b TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (participant_a, participant_b)
        );
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages (conversation_id, created_at);",
    )
}

fn create_backups_table(conn: &Connection) -> Result<(), String> {
    apply(
        conn,
        "backups",
        "CREATE TABLE IF NOT EXISTS backups (
            backup_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            backup_type TEXT NOT NULL,
            status TEXT NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            collections TEXT NOT NULL DEFAULT '[]',
            created_by TEXT NOT NULL,
            file_path TEXT,
            checksum TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT,
            duration_ms INTEGER,
            error_message TEXT,
            auto_delete_at TEXT,
            is_verified INTEGER NOT NULL DEFAULT 0,
            retention_days INTEGER NOT NULL DEFAULT 30
        );",
    )
}
