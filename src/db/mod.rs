mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use crate::breeds::{BreedValidator, RecognizedBreed};
use crate::error::{Entity, Error, Result};
use crate::models::*;

/// Limit/offset window for list operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    /// SQLite treats a negative LIMIT as "no limit".
    fn sql_limit(&self) -> i64 {
        self.limit.map(i64::from).unwrap_or(-1)
    }
}

/// The object store behind every cat, mission, and target operation.
///
/// Each public operation takes the connection lock for its whole duration and
/// runs inside one transaction, so it either commits completely or leaves no
/// trace. That serialization is also what makes assignment's
/// check-then-bind sequence atomic.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> anyhow::Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "spy-cats")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("spy-cats.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.lock();
        schema::run_migrations(&conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database lock poisoned")
    }

    // ============================================================
    // Cat operations
    // ============================================================

    pub fn get_all_cats(&self, page: Page) -> Result<Vec<Cat>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, years_of_experience, breed, salary, created_at, updated_at
             FROM cats ORDER BY name, rowid LIMIT ? OFFSET ?",
        )?;

        let cats = stmt
            .query_map((page.sql_limit(), page.offset), cat_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(cats)
    }

    pub fn get_cat(&self, id: Uuid) -> Result<Option<Cat>> {
        let conn = self.lock();
        load_cat(&conn, id)
    }

    /// Registers a cat: local field checks, then the breed catalog, then storage.
    ///
    /// The store lock is only taken after the catalog has answered.
    pub async fn register_cat(
        &self,
        breeds: &BreedValidator,
        input: CreateCatInput,
    ) -> Result<Cat> {
        input.validate()?;
        let breed = breeds.recognize(&input.breed).await?;
        self.create_cat(input, breed)
    }

    /// Stores a cat whose breed the catalog already confirmed.
    pub fn create_cat(&self, input: CreateCatInput, breed: RecognizedBreed) -> Result<Cat> {
        input.validate()?;

        let conn = self.lock();
        let now = Utc::now();
        let cat = Cat {
            id: Uuid::new_v4(),
            name: input.name,
            years_of_experience: input.years_of_experience,
            breed: breed.into_inner(),
            salary: input.salary,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO cats (id, name, years_of_experience, breed, salary, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                cat.id.to_string(),
                &cat.name,
                cat.years_of_experience,
                &cat.breed,
                cat.salary,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        tracing::info!("Registered cat {} ({}, {})", cat.id, cat.name, cat.breed);
        Ok(cat)
    }

    /// Applies a partial update. The breed is not re-checked against the catalog.
    pub fn update_cat(&self, id: Uuid, input: UpdateCatInput) -> Result<Cat> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut cat = load_cat(&tx, id)?.ok_or(Error::NotFound(Entity::Cat))?;
        cat.apply(input)?;
        cat.updated_at = Utc::now();

        tx.execute(
            "UPDATE cats SET name = ?, years_of_experience = ?, breed = ?, salary = ?, updated_at = ?
             WHERE id = ?",
            (
                &cat.name,
                cat.years_of_experience,
                &cat.breed,
                cat.salary,
                cat.updated_at.to_rfc3339(),
                id.to_string(),
            ),
        )?;
        tx.commit()?;

        Ok(cat)
    }

    /// Deletes a cat that is not engaged on any incomplete mission.
    ///
    /// Completed missions that still reference the cat lose the reference.
    pub fn delete_cat(&self, id: Uuid) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        load_cat(&tx, id)?.ok_or(Error::NotFound(Entity::Cat))?;
        if let Some(mission_id) = engaged_mission(&tx, id)? {
            return Err(Error::CatAssigned { mission_id });
        }

        tx.execute(
            "UPDATE missions SET cat_id = NULL, updated_at = ? WHERE cat_id = ?",
            (Utc::now().to_rfc3339(), id.to_string()),
        )?;
        tx.execute("DELETE FROM cats WHERE id = ?", [id.to_string()])?;
        tx.commit()?;

        tracing::info!("Deleted cat {}", id);
        Ok(())
    }

    /// Whether the cat can take on a mission, and which mission holds it if not.
    pub fn cat_availability(&self, id: Uuid) -> Result<CatAvailability> {
        let conn = self.lock();
        load_cat(&conn, id)?.ok_or(Error::NotFound(Entity::Cat))?;
        let mission_id = engaged_mission(&conn, id)?;

        Ok(CatAvailability {
            cat_id: id,
            free: mission_id.is_none(),
            mission_id,
        })
    }

    pub fn is_cat_free(&self, id: Uuid) -> Result<bool> {
        self.cat_availability(id).map(|a| a.free)
    }

    // ============================================================
    // Mission operations
    // ============================================================

    pub fn get_all_missions(&self, filter: &MissionFilter, page: Page) -> Result<Vec<Mission>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, cat_id, state, created_at, updated_at
             FROM missions
             WHERE (?1 IS NULL OR state = ?1) AND (?2 IS NULL OR cat_id = ?2)
             ORDER BY created_at, rowid LIMIT ?3 OFFSET ?4",
        )?;

        let state = filter.complete.map(|complete| {
            if complete {
                Progress::Complete.as_str()
            } else {
                Progress::Active.as_str()
            }
        });

        let mut missions = stmt
            .query_map(
                (
                    state,
                    filter.cat_id.map(|id| id.to_string()),
                    page.sql_limit(),
                    page.offset,
                ),
                mission_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for mission in &mut missions {
            mission.targets = load_targets(&conn, mission.id)?;
        }

        Ok(missions)
    }

    pub fn get_mission(&self, id: Uuid) -> Result<Option<Mission>> {
        let conn = self.lock();
        load_mission(&conn, id)
    }

    /// Attaches each mission's assigned cat record.
    pub fn with_cat_details(&self, missions: Vec<Mission>) -> Result<Vec<MissionDetails>> {
        let conn = self.lock();
        missions
            .into_iter()
            .map(|mission| {
                let cat_details = match mission.cat_id {
                    Some(cat_id) => load_cat(&conn, cat_id)?,
                    None => None,
                };
                Ok(MissionDetails {
                    mission,
                    cat_details,
                })
            })
            .collect()
    }

    pub fn mission_details(&self, mission: Mission) -> Result<MissionDetails> {
        self.with_cat_details(vec![mission])?
            .pop()
            .ok_or(Error::NotFound(Entity::Mission))
    }

    pub fn create_mission(&self, input: CreateMissionInput) -> Result<Mission> {
        let mission = Mission::new(input, Utc::now())?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        persist_mission(&tx, &mission)?;
        tx.commit()?;

        tracing::info!(
            "Created mission {} with {} target(s)",
            mission.id,
            mission.targets.len()
        );
        Ok(mission)
    }

    pub fn update_mission(&self, id: Uuid, input: UpdateMissionInput) -> Result<Mission> {
        self.mutate_mission(id, |mission, _| mission.update(input, Utc::now()))
    }

    /// Deletes an unassigned mission together with its targets.
    pub fn delete_mission(&self, id: Uuid) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mission = load_mission(&tx, id)?.ok_or(Error::NotFound(Entity::Mission))?;
        mission.ensure_deletable()?;

        tx.execute("DELETE FROM targets WHERE mission_id = ?", [id.to_string()])?;
        tx.execute(
            "DELETE FROM active_assignments WHERE mission_id = ?",
            [id.to_string()],
        )?;
        tx.execute("DELETE FROM missions WHERE id = ?", [id.to_string()])?;
        tx.commit()?;

        tracing::info!("Deleted mission {}", id);
        Ok(())
    }

    /// Binds a cat to a mission.
    ///
    /// Mission and cat must exist, the mission must be incomplete, the cat must
    /// be free, and the mission must not already run a different cat.
    /// Re-assigning the mission's own cat succeeds without changes.
    pub fn assign_cat(&self, mission_id: Uuid, cat_id: Uuid) -> Result<Mission> {
        self.mutate_mission(mission_id, |mission, tx| {
            load_cat(tx, cat_id)?.ok_or(Error::NotFound(Entity::Cat))?;
            let engaged_on = engaged_mission(tx, cat_id)?;
            if mission.assign_cat(cat_id, engaged_on, Utc::now())? {
                tracing::info!("Assigned cat {} to mission {}", cat_id, mission_id);
            }
            Ok(())
        })
    }

    /// Clears the mission's cat. Allowed even after completion.
    pub fn unassign_cat(&self, mission_id: Uuid) -> Result<Mission> {
        self.mutate_mission(mission_id, |mission, _| {
            if let Some(cat_id) = mission.unassign_cat(Utc::now()) {
                tracing::info!("Unassigned cat {} from mission {}", cat_id, mission_id);
            }
            Ok(())
        })
    }

    /// Explicit completion. Every target must already be complete.
    pub fn complete_mission(&self, id: Uuid) -> Result<Mission> {
        self.mutate_mission(id, |mission, _| {
            if mission.complete(Utc::now())? {
                tracing::info!("Mission {} marked complete", id);
            }
            Ok(())
        })
    }

    // ============================================================
    // Target operations
    // ============================================================

    pub fn add_target(&self, mission_id: Uuid, input: CreateTargetInput) -> Result<Mission> {
        self.mutate_mission(mission_id, |mission, _| {
            let target = mission.add_target(input, Utc::now())?;
            tracing::info!("Added target {} to mission {}", target.id, mission_id);
            Ok(())
        })
    }

    /// Patches a target's fields and, if asked, completes it.
    pub fn update_target(
        &self,
        mission_id: Uuid,
        target_id: Uuid,
        input: UpdateTargetInput,
    ) -> Result<Mission> {
        self.mutate_mission(mission_id, |mission, _| {
            mission.update_target(target_id, input, Utc::now())
        })
    }

    /// Completes a target; the mission completes with its last target.
    pub fn complete_target(&self, mission_id: Uuid, target_id: Uuid) -> Result<Mission> {
        self.mutate_mission(mission_id, |mission, _| {
            if mission.complete_target(target_id, Utc::now())? {
                tracing::info!("Target {} of mission {} completed", target_id, mission_id);
            }
            Ok(())
        })
    }

    pub fn remove_target(&self, mission_id: Uuid, target_id: Uuid) -> Result<Mission> {
        self.mutate_mission(mission_id, |mission, _| {
            mission.remove_target(target_id, Utc::now())?;
            tracing::info!("Removed target {} from mission {}", target_id, mission_id);
            Ok(())
        })
    }

    /// Loads a mission, applies `f`, and writes the result back in one transaction.
    ///
    /// Nothing is written when `f` fails.
    fn mutate_mission<F>(&self, id: Uuid, f: F) -> Result<Mission>
    where
        F: FnOnce(&mut Mission, &Connection) -> Result<()>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut mission = load_mission(&tx, id)?.ok_or(Error::NotFound(Entity::Mission))?;
        f(&mut mission, &*tx)?;
        persist_mission(&tx, &mission)?;
        tx.commit()?;

        Ok(mission)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

// ============================================================
// Row access
// ============================================================

fn load_cat(conn: &Connection, id: Uuid) -> Result<Option<Cat>> {
    let cat = conn
        .query_row(
            "SELECT id, name, years_of_experience, breed, salary, created_at, updated_at
             FROM cats WHERE id = ?",
            [id.to_string()],
            cat_from_row,
        )
        .optional()?;
    Ok(cat)
}

/// The incomplete mission `cat_id` is engaged on, read from the assignment index.
fn engaged_mission(conn: &Connection, cat_id: Uuid) -> Result<Option<Uuid>> {
    let mission_id = conn
        .query_row(
            "SELECT mission_id FROM active_assignments WHERE cat_id = ?",
            [cat_id.to_string()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(mission_id.map(parse_uuid))
}

fn load_mission(conn: &Connection, id: Uuid) -> Result<Option<Mission>> {
    let mission = conn
        .query_row(
            "SELECT id, name, description, cat_id, state, created_at, updated_at
             FROM missions WHERE id = ?",
            [id.to_string()],
            mission_from_row,
        )
        .optional()?;

    match mission {
        Some(mut mission) => {
            mission.targets = load_targets(conn, id)?;
            Ok(Some(mission))
        }
        None => Ok(None),
    }
}

fn load_targets(conn: &Connection, mission_id: Uuid) -> Result<TargetSet> {
    let mut stmt = conn.prepare(
        "SELECT id, mission_id, name, country, notes, state, created_at, updated_at
         FROM targets WHERE mission_id = ? ORDER BY position",
    )?;

    let targets = stmt
        .query_map([mission_id.to_string()], |row| {
            Ok(Target {
                id: parse_uuid(row.get::<_, String>(0)?),
                mission_id: parse_uuid(row.get::<_, String>(1)?),
                name: row.get(2)?,
                country: row.get(3)?,
                notes: row.get(4)?,
                state: parse_progress(row.get::<_, String>(5)?),
                created_at: parse_datetime(row.get::<_, String>(6)?),
                updated_at: parse_datetime(row.get::<_, String>(7)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(TargetSet::from_stored(targets))
}

/// Writes a mission, its targets, and its assignment index entry.
///
/// Targets are rewritten wholesale: a mission owns at most three, and this keeps
/// removed targets and positions in step with the in-memory set.
fn persist_mission(conn: &Connection, mission: &Mission) -> Result<()> {
    let id = mission.id.to_string();

    conn.execute(
        "INSERT INTO missions (id, name, description, cat_id, state, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             description = excluded.description,
             cat_id = excluded.cat_id,
             state = excluded.state,
             updated_at = excluded.updated_at",
        (
            &id,
            &mission.name,
            &mission.description,
            mission.cat_id.map(|c| c.to_string()),
            mission.state.as_str(),
            mission.created_at.to_rfc3339(),
            mission.updated_at.to_rfc3339(),
        ),
    )?;

    conn.execute("DELETE FROM targets WHERE mission_id = ?", [&id])?;
    for (position, target) in mission.targets.iter().enumerate() {
        conn.execute(
            "INSERT INTO targets (id, mission_id, position, name, country, notes, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                target.id.to_string(),
                &id,
                position as i64,
                &target.name,
                &target.country,
                &target.notes,
                target.state.as_str(),
                target.created_at.to_rfc3339(),
                target.updated_at.to_rfc3339(),
            ),
        )?;
    }

    sync_assignment(conn, mission)
}

/// Keeps the assignment index in step with the mission: one row while the
/// mission is incomplete and has a cat, none otherwise.
fn sync_assignment(conn: &Connection, mission: &Mission) -> Result<()> {
    conn.execute(
        "DELETE FROM active_assignments WHERE mission_id = ?",
        [mission.id.to_string()],
    )?;

    let Some(cat_id) = mission.engaged_cat() else {
        return Ok(());
    };

    let inserted = conn.execute(
        "INSERT INTO active_assignments (cat_id, mission_id) VALUES (?, ?)",
        (cat_id.to_string(), mission.id.to_string()),
    );
    match inserted {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            match engaged_mission(conn, cat_id)? {
                Some(mission_id) => Err(Error::CatBusy { mission_id }),
                None => Err(Error::NotFound(Entity::Cat)),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn cat_from_row(row: &Row<'_>) -> rusqlite::Result<Cat> {
    Ok(Cat {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        years_of_experience: row.get(2)?,
        breed: row.get(3)?,
        salary: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

/// Maps a mission row. Targets are loaded separately.
fn mission_from_row(row: &Row<'_>) -> rusqlite::Result<Mission> {
    Ok(Mission {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        cat_id: row.get::<_, Option<String>>(3)?.map(parse_uuid),
        state: parse_progress(row.get::<_, String>(4)?),
        targets: TargetSet::default(),
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_progress(s: String) -> Progress {
    Progress::from_str(&s).unwrap_or(Progress::Active)
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
