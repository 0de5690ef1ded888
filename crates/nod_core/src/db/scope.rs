//! Nestable atomic scopes on a borrowed connection.
//!
//! # Invariants
//! - Every scope is a named `SAVEPOINT`; the outermost one opens the
//!   transaction and its release commits it.
//! - A scope that is not released (error or panic) is rolled back on drop.

use log::warn;
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};

static SAVEPOINT_SEQ: AtomicU64 = AtomicU64::new(0);

struct Savepoint<'conn> {
    conn: &'conn Connection,
    name: String,
    finished: bool,
}

impl<'conn> Savepoint<'conn> {
    fn begin(conn: &'conn Connection) -> rusqlite::Result<Self> {
        let name = format!("nod_sp_{}", SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed));
        conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        Ok(Self {
            conn,
            name,
            finished: false,
        })
    }

    fn release(mut self) -> rusqlite::Result<()> {
        self.conn.execute_batch(&format!("RELEASE {};", self.name))?;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self) -> rusqlite::Result<()> {
        self.finished = true;
        rollback_to(self.conn, &self.name)
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = rollback_to(self.conn, &self.name) {
            warn!(
                "event=scope_rollback module=db status=error savepoint={} error={}",
                self.name, err
            );
        }
    }
}

fn rollback_to(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};"))
}

/// Runs `body` inside one atomic scope on `conn`.
///
/// `Ok` releases the scope, `Err` rolls back every write made inside it,
/// including writes of scopes nested within `body`.
pub(crate) fn atomic<R, E>(conn: &Connection, body: impl FnOnce() -> Result<R, E>) -> Result<R, E>
where
    E: From<rusqlite::Error>,
{
    let savepoint = Savepoint::begin(conn)?;
    match body() {
        Ok(value) => {
            savepoint.release()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = savepoint.rollback() {
                warn!(
                    "event=scope_rollback module=db status=error error={}",
                    rollback_err
                );
            }
            Err(err)
        }
    }
}
