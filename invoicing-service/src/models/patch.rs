//! Sparse-update field wrapper.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field of a partial update: either absent from the request or present
/// with a value.
///
/// Used with `#[serde(default)]`, a missing JSON key deserializes to
/// [`Patch::Absent`]. For a nullable column use `Patch<Option<T>>`, where
/// an explicit `null` becomes `Present(None)` and clears the column.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Absent,
    Present(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Patch::Absent => None,
            Patch::Present(value) => Some(value),
        }
    }
}

impl<T: Clone> Patch<T> {
    /// Overwrite `target` when the field was sent.
    pub fn apply(&self, target: &mut T) {
        if let Patch::Present(value) = self {
            *target = value.clone();
        }
    }

    /// Overwrite an optional column with a required field when it was sent.
    pub fn apply_some(&self, target: &mut Option<T>) {
        if let Patch::Present(value) = self {
            *target = Some(value.clone());
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Patch::Present)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Absent => serializer.serialize_none(),
            Patch::Present(value) => value.serialize(serializer),
        }
    }
}
