//! SQLite schema for the local entity store.
//!
//! Every remote entity table keys rows by an integer rowid and keeps the remote
//! id in a UNIQUE text column. The unique constraint is what makes concurrent
//! insert-if-absent safe.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, SqlType, Table, VersionedSchema};

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artists_id", "id")],
    unique_constraints: &[&["id"]],
};

const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_albums_id", "id")],
    unique_constraints: &[&["id"]],
};

/// Feature vectors, owned either by one track or by one analysis summary.
const AUDIO_FEATURES_TABLE: Table = Table {
    name: "audio_features",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("acousticness", &SqlType::Real, non_null = true),
        sqlite_column!("danceability", &SqlType::Real, non_null = true),
        sqlite_column!("energy", &SqlType::Real, non_null = true),
        sqlite_column!("instrumentalness", &SqlType::Real, non_null = true),
        sqlite_column!("liveness", &SqlType::Real, non_null = true),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("speechiness", &SqlType::Real, non_null = true),
        sqlite_column!("tempo", &SqlType::Real, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ALBUMS_FK: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "rowid",
};

const ARTISTS_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "rowid",
};

const TRACKS_FK: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "rowid",
};

const AUDIO_FEATURES_FK: ForeignKey = ForeignKey {
    foreign_table: "audio_features",
    foreign_column: "rowid",
};

const ANALYSES_FK: ForeignKey = ForeignKey {
    foreign_table: "analyses",
    foreign_column: "rowid",
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("album_rowid", &SqlType::Integer, references = Some(&ALBUMS_FK)),
        sqlite_column!(
            "audio_features_rowid",
            &SqlType::Integer,
            non_null = true,
            references = Some(&AUDIO_FEATURES_FK)
        ),
    ],
    indices: &[("idx_tracks_id", "id"), ("idx_tracks_album", "album_rowid")],
    unique_constraints: &[&["id"]],
};

/// Track <-> Artist, `position` keeps the remote credit order.
const TRACK_ARTISTS_TABLE: Table = Table {
    name: "track_artists",
    columns: &[
        sqlite_column!(
            "track_rowid",
            &SqlType::Integer,
            non_null = true,
            references = Some(&TRACKS_FK)
        ),
        sqlite_column!(
            "artist_rowid",
            &SqlType::Integer,
            non_null = true,
            references = Some(&ARTISTS_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_track_artists_track", "track_rowid"),
        ("idx_track_artists_artist", "artist_rowid"),
    ],
    unique_constraints: &[&["track_rowid", "artist_rowid"]],
};

const ANALYSES_TABLE: Table = Table {
    name: "analyses",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        // Unix epoch milliseconds, UTC
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("songs_len", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "summary_rowid",
            &SqlType::Integer,
            non_null = true,
            references = Some(&AUDIO_FEATURES_FK)
        ),
    ],
    indices: &[
        ("idx_analyses_user", "user_id"),
        ("idx_analyses_created_at", "created_at"),
    ],
    unique_constraints: &[],
};

const ANALYSIS_TRACKS_TABLE: Table = Table {
    name: "analysis_tracks",
    columns: &[
        sqlite_column!(
            "analysis_rowid",
            &SqlType::Integer,
            non_null = true,
            references = Some(&ANALYSES_FK)
        ),
        sqlite_column!(
            "track_rowid",
            &SqlType::Integer,
            non_null = true,
            references = Some(&TRACKS_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_analysis_tracks_analysis", "analysis_rowid")],
    unique_constraints: &[&["analysis_rowid", "position"]],
};

pub const ENTITY_STORE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ARTISTS_TABLE,
        ALBUMS_TABLE,
        AUDIO_FEATURES_TABLE,
        TRACKS_TABLE,
        TRACK_ARTISTS_TABLE,
        ANALYSES_TABLE,
        ANALYSIS_TRACKS_TABLE,
    ],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{params, Connection};

    fn create() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &ENTITY_STORE_VERSIONED_SCHEMAS[0];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_duplicate_external_id_is_ignored_on_conflict() {
        let conn = create();
        let inserted = conn
            .execute(
                "INSERT INTO artists (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
                params!["0gxyHStUsqpMadRV0Di1Qt", "Rick Astley"],
            )
            .unwrap();
        assert_eq!(inserted, 1);
        let inserted = conn
            .execute(
                "INSERT INTO artists (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
                params!["0gxyHStUsqpMadRV0Di1Qt", "Someone Else"],
            )
            .unwrap();
        assert_eq!(inserted, 0);

        let name: String = conn
            .query_row(
                "SELECT name FROM artists WHERE id = ?1",
                params!["0gxyHStUsqpMadRV0Di1Qt"],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(name, "Rick Astley");
    }

    #[test]
    fn test_track_requires_existing_features_row() {
        let conn = create();
        let result = conn.execute(
            "INSERT INTO tracks (id, name, album_rowid, audio_features_rowid)
             VALUES ('t', 'T', NULL, 42)",
            [],
        );
        assert!(result.is_err());
    }
}
