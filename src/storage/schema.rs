//! Clinic database bootstrap
//!
//! A brand-new store gets the clinic tables and a default `admin` user.
//! Stores that already contain tables are never touched.

use rusqlite::Connection;

use crate::error::VaultResult;

/// Tables exported by "export all", in export order
pub const DOMAIN_TABLES: [&str; 4] = ["patients", "appointments", "invoices", "doctors"];

const CLINIC_SCHEMA: &str = r#"
CREATE TABLE settings (
    key TEXT PRIMARY KEY,
    value TEXT
);

CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE,
    password TEXT
);

CREATE TABLE patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    age INTEGER,
    gender TEXT,
    phone TEXT,
    address TEXT,
    medical_history TEXT,
    created_at TEXT
);

CREATE TABLE doctors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    specialty TEXT,
    phone TEXT,
    email TEXT
);

CREATE TABLE appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER,
    doctor_id INTEGER,
    date TEXT,
    time TEXT,
    notes TEXT,
    status TEXT DEFAULT 'scheduled',
    created_at TEXT,
    FOREIGN KEY(patient_id) REFERENCES patients(id),
    FOREIGN KEY(doctor_id) REFERENCES doctors(id)
);

CREATE TABLE invoices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER,
    description TEXT,
    total REAL,
    paid REAL,
    created_at TEXT,
    FOREIGN KEY(patient_id) REFERENCES patients(id)
);

INSERT INTO users (username, password) VALUES ('admin', 'admin');
"#;

/// Create the clinic tables if the database is empty
///
/// Returns whether the schema was created.
pub fn init(conn: &Connection) -> VaultResult<bool> {
    let tables: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;

    if tables > 0 {
        return Ok(false);
    }

    conn.execute_batch(&format!("BEGIN;\n{}\nCOMMIT;", CLINIC_SCHEMA))?;
    Ok(true)
}
