//! Identity Store
//! Mission: Durable lookup of user and role records with SQLite

use crate::auth::models::{NewUser, Role, User};
use anyhow::{Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

/// SQLite-backed store for users, roles, and their association.
///
/// No caching layer: every call hits the store. Lookups are exact,
/// case-sensitive matches. Upserts exist for the seed/bootstrap path only;
/// the authorization path never writes.
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Open the store, initialize the schema, and seed demo accounts
    /// if the user table is empty.
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database at {}", self.db_path))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS role (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL CHECK (name <> '')
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS \"user\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL CHECK (username <> ''),
                password TEXT NOT NULL,
                email TEXT,
                credentials_non_expired INTEGER NOT NULL DEFAULT 1,
                account_non_locked INTEGER NOT NULL DEFAULT 1,
                account_non_expired INTEGER NOT NULL DEFAULT 1,
                active INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )?;

        // Association table is the sole owner of the user↔role relationship.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users_roles (
                user_id INTEGER NOT NULL REFERENCES \"user\"(id),
                role_id INTEGER NOT NULL REFERENCES role(id),
                PRIMARY KEY (user_id, role_id)
            )",
            [],
        )?;

        self.seed_demo_accounts(&conn)?;

        Ok(())
    }

    /// Seed the ADMIN/STUDENT roles and two demo accounts on first start.
    fn seed_demo_accounts(&self, conn: &Connection) -> Result<()> {
        for name in ["ADMIN", "STUDENT"] {
            conn.execute(
                "INSERT INTO role (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                params![name],
            )?;
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"user\"", [], |row| row.get(0))
            .context("Failed to count users")?;
        if count > 0 {
            return Ok(());
        }

        for (username, password, email, role) in [
            ("admin", "admin", "admin@campusgate.local", "ADMIN"),
            ("student", "student", "student@campusgate.local", "STUDENT"),
        ] {
            let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;
            let user = NewUser::active(username, &password_hash, Some(email));
            Self::upsert_user(conn, &user, &[role])?;
            info!("🔐 Seeded demo account: {} ({})", username, role);
        }
        warn!("⚠️  Demo accounts use default passwords - CHANGE THEM IN PRODUCTION!");

        Ok(())
    }

    /// Get a user by exact username
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.open()?;

        let mut stmt = conn.prepare(
            "SELECT id, username, password, email,
                    credentials_non_expired, account_non_locked, account_non_expired, active
             FROM \"user\" WHERE username = ?1",
        )?;

        let user = stmt
            .query_row(params![username], Self::row_to_user)
            .optional()
            .context("Failed to query user")?;

        Ok(user)
    }

    /// Get a role by exact name
    pub fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = self.open()?;

        let role = conn
            .query_row(
                "SELECT id, name FROM role WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Role {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query role")?;

        Ok(role)
    }

    /// Roles associated with a user, via the association table.
    pub fn roles_for_user(&self, user_id: i64) -> Result<Vec<Role>> {
        let conn = self.open()?;

        let mut stmt = conn.prepare(
            "SELECT r.id, r.name FROM role r
             JOIN users_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = ?1",
        )?;

        let roles = stmt
            .query_map(params![user_id], |row| {
                Ok(Role {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query user roles")?;

        Ok(roles)
    }

    /// Idempotent role upsert (bootstrap/administrative path).
    pub fn save_role(&self, name: &str) -> Result<Role> {
        let conn = self.open()?;

        conn.execute(
            "INSERT INTO role (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )
        .context("Failed to upsert role")?;

        let role = conn.query_row(
            "SELECT id, name FROM role WHERE name = ?1",
            params![name],
            |row| {
                Ok(Role {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )?;

        Ok(role)
    }

    /// Idempotent user upsert with its role associations rewritten
    /// (bootstrap/administrative path, never the authorization path).
    ///
    /// All named roles must already exist.
    pub fn save_user(&self, user: &NewUser, role_names: &[&str]) -> Result<User> {
        let conn = self.open()?;
        Self::upsert_user(&conn, user, role_names)?;
        self.find_user_by_username(&user.username)?
            .context("Upserted user not found")
    }

    fn upsert_user(conn: &Connection, user: &NewUser, role_names: &[&str]) -> Result<()> {
        conn.execute(
            "INSERT INTO \"user\"
                (username, password, email,
                 credentials_non_expired, account_non_locked, account_non_expired, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(username) DO UPDATE SET
                password = excluded.password,
                email = excluded.email,
                credentials_non_expired = excluded.credentials_non_expired,
                account_non_locked = excluded.account_non_locked,
                account_non_expired = excluded.account_non_expired,
                active = excluded.active",
            params![
                user.username,
                user.password_hash,
                user.email,
                user.credentials_non_expired,
                user.account_non_locked,
                user.account_non_expired,
                user.enabled,
            ],
        )
        .context("Failed to upsert user")?;

        let user_id: i64 = conn.query_row(
            "SELECT id FROM \"user\" WHERE username = ?1",
            params![user.username],
            |row| row.get(0),
        )?;

        conn.execute("DELETE FROM users_roles WHERE user_id = ?1", params![user_id])?;
        for name in role_names {
            let inserted = conn.execute(
                "INSERT INTO users_roles (user_id, role_id)
                 SELECT ?1, id FROM role WHERE name = ?2",
                params![user_id, name],
            )?;
            if inserted == 0 {
                anyhow::bail!("Unknown role '{}' for user '{}'", name, user.username);
            }
        }

        Ok(())
    }

    /// Soft-disable or re-enable an account (single-row atomic update).
    pub fn set_enabled(&self, username: &str, enabled: bool) -> Result<()> {
        self.update_flag(username, "active", enabled)
    }

    /// Lock or unlock an account (single-row atomic update).
    pub fn set_locked(&self, username: &str, locked: bool) -> Result<()> {
        self.update_flag(username, "account_non_locked", !locked)
    }

    fn update_flag(&self, username: &str, column: &str, value: bool) -> Result<()> {
        let conn = self.open()?;

        // Column name comes from a fixed internal set, never from input.
        let updated = conn.execute(
            &format!("UPDATE \"user\" SET {column} = ?1 WHERE username = ?2"),
            params![value, username],
        )?;
        if updated == 0 {
            anyhow::bail!("User '{}' not found", username);
        }

        info!("👤 Updated {} for user {}: {}", column, username, value);
        Ok(())
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            email: row.get(3)?,
            credentials_non_expired: row.get(4)?,
            account_non_locked: row.get(5)?,
            account_non_expired: row.get(6)?,
            enabled: row.get(7)?,
        })
    }
}
