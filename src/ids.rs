//! Storage name generation for uploads.
//!
//! Ids have the shape `<unix-millis>-<sanitized-name>`. When that name is
//! already taken, a counter is inserted: `<unix-millis>-<n>-<sanitized-name>`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Longest sanitized name kept in an id, leaving room for the
/// `<millis>-<n>-` prefix under the 255-byte file name limit.
pub const MAX_NAME_BYTES: usize = 200;

/// Collapse whitespace runs to `_`, then make the result a single safe path
/// component: separators, control and reserved characters become `_`, and
/// the name is capped at [`MAX_NAME_BYTES`] keeping a short extension.
pub fn sanitize_filename(name: &str) -> String {
    let mut collapsed = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                collapsed.push('_');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            collapsed.push(c);
        }
    }

    let safe = ::sanitize_filename::sanitize_with_options(
        &collapsed,
        ::sanitize_filename::Options {
            windows: true,
            truncate: true,
            replacement: "_",
        },
    );
    if safe.is_empty() {
        return "file".to_string();
    }
    truncate_name(safe, MAX_NAME_BYTES)
}

fn truncate_name(name: String, max: usize) -> String {
    if name.len() <= max {
        return name;
    }
    let ext = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= 16 => &name[dot..],
        _ => "",
    };
    let mut end = max - ext.len();
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{ext}", &name[..end])
}

/// The `attempt`-th candidate id for a file named `original_name` uploaded at
/// `at`. Attempt 0 is the plain form.
pub fn candidate_id(at: DateTime<Utc>, original_name: &str, attempt: u32) -> String {
    let millis = at.timestamp_millis();
    let name = sanitize_filename(original_name);
    match attempt {
        0 => format!("{millis}-{name}"),
        n => format!("{millis}-{n}-{name}"),
    }
}

/// Hands out ids and keeps the set of ids claimed by uploads that have not
/// reached the catalog yet.
#[derive(Clone, Default)]
pub struct IdGenerator {
    reserved: Arc<Mutex<HashSet<String>>>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` unless another in-flight upload holds it or `taken` says it
    /// is already in use. The claim lasts until the returned guard drops.
    pub fn try_reserve(
        &self,
        id: &str,
        taken: impl FnOnce(&str) -> bool,
    ) -> Option<Reservation> {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        if reserved.contains(id) || taken(id) {
            return None;
        }
        reserved.insert(id.to_string());
        Some(Reservation {
            id: id.to_string(),
            reserved: Arc::clone(&self.reserved),
        })
    }

    pub fn is_reserved(&self, id: &str) -> bool {
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

/// An id claimed by an in-flight upload. Released on drop.
#[derive(Debug)]
pub struct Reservation {
    id: String,
    reserved: Arc<Mutex<HashSet<String>>>,
}

impl Reservation {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
