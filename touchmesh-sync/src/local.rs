//! This client's active contact points.
//!
//! The tracker is the sole authority on "am I currently touching". Every
//! entry carries this client's color. Mutations set a dirty flag that the
//! session consumes when deciding what to put on the wire.

use std::collections::HashMap;

use crate::identity::Color;
use crate::touch::{ContactId, ContactPoint};

/// Result of removing a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The contact was not tracked; nothing changed.
    Absent,
    /// Removed; this many contacts remain.
    Remaining(usize),
    /// Removed the last contact; the tracker is now empty.
    Emptied,
}

/// Active local contacts keyed by contact id.
#[derive(Debug, Clone)]
pub struct LocalContacts {
    color: Color,
    contacts: HashMap<ContactId, ContactPoint>,
    dirty: bool,
}

impl LocalContacts {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            contacts: HashMap::new(),
            dirty: false,
        }
    }

    /// Insert or replace the contact at the given coordinates.
    pub fn upsert(&mut self, id: ContactId, x: f64, y: f64) {
        let point = ContactPoint {
            id: id.clone(),
            x,
            y,
            color: self.color,
        };
        self.contacts.insert(id, point);
        self.dirty = true;
    }

    /// Remove a contact if present.
    pub fn remove(&mut self, id: &ContactId) -> Removal {
        if self.contacts.remove(id).is_none() {
            return Removal::Absent;
        }
        self.dirty = true;
        match self.contacts.len() {
            0 => Removal::Emptied,
            n => Removal::Remaining(n),
        }
    }

    /// Drop every contact. Returns `true` if any were active.
    pub fn clear(&mut self) -> bool {
        if self.contacts.is_empty() {
            return false;
        }
        self.contacts.clear();
        self.dirty = true;
        true
    }

    /// Current contacts, in no particular order.
    pub fn snapshot(&self) -> Vec<ContactPoint> {
        self.contacts.values().cloned().collect()
    }

    pub fn get(&self, id: &ContactId) -> Option<&ContactPoint> {
        self.contacts.get(id)
    }

    pub fn is_active(&self) -> bool {
        !self.contacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and reset the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
