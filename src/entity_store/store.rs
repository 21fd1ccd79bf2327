//! SQLite-backed entity store.
//!
//! One write connection serializes all writes; reads are spread over a small
//! pool of read-only connections. Databases are opened in WAL mode so readers
//! never block the writer.

use super::schema::ENTITY_STORE_VERSIONED_SCHEMAS;
use super::trait_def::{EntityStore, StoreCounts};
use crate::catalog::{
    Album, Analysis, Artist, AudioFeatures, NewAnalysis, NewNamedEntity, NewTrack, Track,
    TrackRef,
};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Max number of bound parameters per `IN (...)` query.
const LOOKUP_CHUNK: usize = 500;

#[derive(Clone)]
pub struct SqliteEntityStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("Entity store connection lock poisoned"))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Named entity tables share one shape: (rowid, id, name).
#[derive(Clone, Copy)]
enum NamedTable {
    Artists,
    Albums,
}

impl NamedTable {
    fn name(&self) -> &'static str {
        match self {
            NamedTable::Artists => "artists",
            NamedTable::Albums => "albums",
        }
    }
}

/// (rowid, external id, name)
type NamedRow = (i64, String, String);

fn find_named(conn: &Connection, table: NamedTable, ids: &[String]) -> Result<Vec<NamedRow>> {
    let mut rows = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT rowid, id, name FROM {} WHERE id IN ({})",
            table.name(),
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let found = stmt
            .query_map(params_from_iter(chunk.iter()), |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<NamedRow>>>()?;
        rows.extend(found);
    }
    Ok(rows)
}

fn read_features(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<AudioFeatures> {
    Ok(AudioFeatures {
        acousticness: row.get(offset)?,
        danceability: row.get(offset + 1)?,
        energy: row.get(offset + 2)?,
        instrumentalness: row.get(offset + 3)?,
        liveness: row.get(offset + 4)?,
        valence: row.get(offset + 5)?,
        speechiness: row.get(offset + 6)?,
        tempo: row.get(offset + 7)?,
    })
}

fn insert_features(conn: &Connection, features: &AudioFeatures) -> Result<i64> {
    conn.execute(
        "INSERT INTO audio_features (acousticness, danceability, energy, instrumentalness,
         liveness, valence, speechiness, tempo) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            features.acousticness,
            features.danceability,
            features.energy,
            features.instrumentalness,
            features.liveness,
            features.valence,
            features.speechiness,
            features.tempo,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const FEATURE_COLUMNS: &str = "f.acousticness, f.danceability, f.energy, f.instrumentalness, \
     f.liveness, f.valence, f.speechiness, f.tempo";

fn find_tracks_inner(conn: &Connection, ids: &[String]) -> Result<Vec<Track>> {
    let mut tracks: Vec<Track> = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT t.rowid, t.id, t.name, al.rowid, al.id, al.name, {}
             FROM tracks t
             JOIN audio_features f ON f.rowid = t.audio_features_rowid
             LEFT JOIN albums al ON al.rowid = t.album_rowid
             WHERE t.id IN ({})",
            FEATURE_COLUMNS,
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let found = stmt
            .query_map(params_from_iter(chunk.iter()), |r| {
                let album = match r.get::<_, Option<i64>>(3)? {
                    Some(local_id) => Some(Album {
                        local_id,
                        external_id: r.get(4)?,
                        name: r.get(5)?,
                    }),
                    None => None,
                };
                Ok(Track {
                    local_id: r.get(0)?,
                    external_id: r.get(1)?,
                    name: r.get(2)?,
                    features: read_features(r, 6)?,
                    album,
                    artists: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<Track>>>()?;
        tracks.extend(found);
    }

    let track_rowids: Vec<i64> = tracks.iter().map(|t| t.local_id).collect();
    let mut artists_by_track: HashMap<i64, Vec<Artist>> = HashMap::new();
    for chunk in track_rowids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT ta.track_rowid, a.rowid, a.id, a.name
             FROM track_artists ta
             JOIN artists a ON a.rowid = ta.artist_rowid
             WHERE ta.track_rowid IN ({})
             ORDER BY ta.track_rowid, ta.position",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |r| {
            Ok((
                r.get::<_, i64>(0)?,
                Artist {
                    local_id: r.get(1)?,
                    external_id: r.get(2)?,
                    name: r.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (track_rowid, artist) = row?;
            artists_by_track.entry(track_rowid).or_default().push(artist);
        }
    }

    for track in &mut tracks {
        track.artists = artists_by_track.remove(&track.local_id).unwrap_or_default();
    }
    Ok(tracks)
}

/// Load analyses matching `filter` ("WHERE ..." / "ORDER BY ..." suffix) with their tracks.
fn load_analyses(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Analysis>> {
    let sql = format!(
        "SELECT a.rowid, a.user_id, a.created_at, a.songs_len, {}
         FROM analyses a
         JOIN audio_features f ON f.rowid = a.summary_rowid
         {}",
        FEATURE_COLUMNS, filter
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params, |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, i64>(3)?,
                read_features(r, 4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut analyses = Vec::with_capacity(rows.len());
    let mut track_stmt = conn.prepare_cached(
        "SELECT t.rowid, t.id, t.name
         FROM analysis_tracks at
         JOIN tracks t ON t.rowid = at.track_rowid
         WHERE at.analysis_rowid = ?1
         ORDER BY at.position",
    )?;
    for (local_id, user_id, created_at_ms, songs_len, summary) in rows {
        let tracks = track_stmt
            .query_map(params![local_id], |r| {
                Ok(TrackRef {
                    local_id: r.get(0)?,
                    external_id: r.get(1)?,
                    name: r.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let created_at = DateTime::from_timestamp_millis(created_at_ms)
            .with_context(|| {
                format!(
                    "Analysis {} has invalid timestamp {}",
                    local_id, created_at_ms
                )
            })?;
        analyses.push(Analysis {
            local_id,
            user_id,
            created_at,
            tracks,
            songs_len: songs_len as usize,
            summary,
        });
    }
    Ok(analyses)
}

impl SqliteEntityStore {
    /// Open (creating if needed) the store at `db_path`.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of read-only connections (at least 1)
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open entity store at {:?}", db_path))?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrate_if_needed(&mut write_conn, ENTITY_STORE_VERSIONED_SCHEMAS, "entity store")?;

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.busy_timeout(std::time::Duration::from_secs(5))?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        let store = SqliteEntityStore {
            read_pool,
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_index: Arc::new(AtomicUsize::new(0)),
        };

        let counts = store.counts()?;
        info!(
            "Opened entity store: {} artists, {} albums, {} tracks, {} analyses",
            counts.artists, counts.albums, counts.tracks, counts.analyses
        );
        Ok(store)
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn insert_named(&self, table: NamedTable, records: &[NewNamedEntity]) -> Result<Vec<NamedRow>> {
        if records.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = lock(&self.write_conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {} (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
                table.name()
            ))?;
            for record in records {
                inserted += stmt.execute(params![&record.external_id, &record.name])?;
            }
        }
        let ids: Vec<String> = records.iter().map(|r| r.external_id.clone()).collect();
        let rows = find_named(&tx, table, &ids)?;
        tx.commit()?;
        debug!(
            "Inserted {} of {} {} ({} already present)",
            inserted,
            records.len(),
            table.name(),
            records.len() - inserted
        );
        Ok(rows)
    }
}

impl EntityStore for SqliteEntityStore {
    fn find_artists(&self, ids: &[String]) -> Result<Vec<Artist>> {
        let read_conn = self.get_read_conn();
        let conn = lock(&read_conn)?;
        Ok(find_named(&conn, NamedTable::Artists, ids)?
            .into_iter()
            .map(|(local_id, external_id, name)| Artist {
                local_id,
                external_id,
                name,
            })
            .collect())
    }

    fn find_albums(&self, ids: &[String]) -> Result<Vec<Album>> {
        let read_conn = self.get_read_conn();
        let conn = lock(&read_conn)?;
        Ok(find_named(&conn, NamedTable::Albums, ids)?
            .into_iter()
            .map(|(local_id, external_id, name)| Album {
                local_id,
                external_id,
                name,
            })
            .collect())
    }

    fn find_tracks(&self, ids: &[String]) -> Result<Vec<Track>> {
        let read_conn = self.get_read_conn();
        let conn = lock(&read_conn)?;
        find_tracks_inner(&conn, ids)
    }

    fn insert_artists(&self, records: &[NewNamedEntity]) -> Result<Vec<Artist>> {
        Ok(self
            .insert_named(NamedTable::Artists, records)?
            .into_iter()
            .map(|(local_id, external_id, name)| Artist {
                local_id,
                external_id,
                name,
            })
            .collect())
    }

    fn insert_albums(&self, records: &[NewNamedEntity]) -> Result<Vec<Album>> {
        Ok(self
            .insert_named(NamedTable::Albums, records)?
            .into_iter()
            .map(|(local_id, external_id, name)| Album {
                local_id,
                external_id,
                name,
            })
            .collect())
    }

    fn insert_tracks(&self, records: &[NewTrack]) -> Result<Vec<Track>> {
        if records.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = lock(&self.write_conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0usize;
        for record in records {
            if record.artist_local_ids.is_empty() {
                anyhow::bail!("Track '{}' has no artists", record.external_id);
            }
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM tracks WHERE id = ?1)",
                params![&record.external_id],
                |r| r.get(0),
            )?;
            if exists {
                continue;
            }

            let features_rowid = insert_features(&tx, &record.features)?;
            tx.execute(
                "INSERT INTO tracks (id, name, album_rowid, audio_features_rowid)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    &record.external_id,
                    &record.name,
                    record.album_local_id,
                    features_rowid
                ],
            )
            .with_context(|| format!("Failed to insert track '{}'", record.external_id))?;
            let track_rowid = tx.last_insert_rowid();

            for (position, artist_rowid) in record.artist_local_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO track_artists (track_rowid, artist_rowid, position)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(track_rowid, artist_rowid) DO NOTHING",
                    params![track_rowid, artist_rowid, position as i64],
                )
                .with_context(|| {
                    format!(
                        "Failed to link artist {} to track '{}'",
                        artist_rowid, record.external_id
                    )
                })?;
            }
            inserted += 1;
        }

        let ids: Vec<String> = records.iter().map(|r| r.external_id.clone()).collect();
        let tracks = find_tracks_inner(&tx, &ids)?;
        tx.commit()?;
        debug!(
            "Inserted {} of {} tracks ({} already present)",
            inserted,
            records.len(),
            records.len() - inserted
        );
        Ok(tracks)
    }

    fn create_analysis(&self, analysis: &NewAnalysis) -> Result<Analysis> {
        let mut conn = lock(&self.write_conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let summary_rowid = insert_features(&tx, &analysis.summary)?;
        tx.execute(
            "INSERT INTO analyses (user_id, created_at, songs_len, summary_rowid)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &analysis.user_id,
                analysis.created_at.timestamp_millis(),
                analysis.track_local_ids.len() as i64,
                summary_rowid
            ],
        )?;
        let analysis_rowid = tx.last_insert_rowid();

        for (position, track_rowid) in analysis.track_local_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO analysis_tracks (analysis_rowid, track_rowid, position)
                 VALUES (?1, ?2, ?3)",
                params![analysis_rowid, track_rowid, position as i64],
            )
            .with_context(|| format!("Track {} is not stored", track_rowid))?;
        }

        let created = load_analyses(&tx, "WHERE a.rowid = ?1", &[&analysis_rowid])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Analysis {} vanished after insert", analysis_rowid))?;
        tx.commit()?;
        Ok(created)
    }

    fn get_analysis(&self, local_id: i64) -> Result<Option<Analysis>> {
        let read_conn = self.get_read_conn();
        let conn = lock(&read_conn)?;
        Ok(load_analyses(&conn, "WHERE a.rowid = ?1", &[&local_id])?
            .into_iter()
            .next())
    }

    fn list_analyses(&self, user_id: &str) -> Result<Vec<Analysis>> {
        let read_conn = self.get_read_conn();
        let conn = lock(&read_conn)?;
        load_analyses(
            &conn,
            "WHERE a.user_id = ?1 ORDER BY a.created_at ASC, a.rowid ASC",
            &[&user_id],
        )
    }

    fn latest_analysis(&self, user_id: &str) -> Result<Option<Analysis>> {
        let read_conn = self.get_read_conn();
        let conn = lock(&read_conn)?;
        Ok(load_analyses(
            &conn,
            "WHERE a.user_id = ?1 ORDER BY a.created_at DESC, a.rowid DESC LIMIT 1",
            &[&user_id],
        )?
        .into_iter()
        .next())
    }

    fn counts(&self) -> Result<StoreCounts> {
        let read_conn = self.get_read_conn();
        let conn = lock(&read_conn)?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreCounts {
            artists: count("artists")?,
            albums: count("albums")?,
            tracks: count("tracks")?,
            analyses: count("analyses")?,
        })
    }
}
