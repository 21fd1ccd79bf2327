//! Test ids. Remote ids are 22 alphanumerics, so fixtures pad a prefix with digits.

#![allow(dead_code)]

fn padded(prefix: &str, n: usize) -> String {
    format!("{prefix}{n:0>width$}", width = 22 - prefix.len())
}

pub fn artist_id(n: usize) -> String {
    padded("artist", n)
}

pub fn album_id(n: usize) -> String {
    padded("album", n)
}

pub fn track_id(n: usize) -> String {
    padded("track", n)
}

pub const USER_ID: &str = "test-user";
