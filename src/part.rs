//! Body Parts - the four fixed composite slots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// One of the four body-region slots, in stacking order (top to bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Head,
    Torso,
    Legs,
    Feet,
}

impl Part {
    pub const ALL: [Part; 4] = [Part::Head, Part::Torso, Part::Legs, Part::Feet];
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        match self {
            Part::Head => 0,
            Part::Torso => 1,
            Part::Legs => 2,
            Part::Feet => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Part::Head => "head",
            Part::Torso => "torso",
            Part::Legs => "legs",
            Part::Feet => "feet",
        }
    }

    pub fn parse(s: &str) -> Option<Part> {
        match s.trim().to_ascii_lowercase().as_str() {
            "head" => Some(Part::Head),
            "torso" => Some(Part::Torso),
            "legs" => Some(Part::Legs),
            "feet" => Some(Part::Feet),
            _ => None,
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exhaustive Part -> T mapping with one slot per Part.
///
/// Serializes as an object keyed by part name so payloads read
/// `{"head": .., "torso": .., "legs": .., "feet": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartMap<T> {
    pub head: T,
    pub torso: T,
    pub legs: T,
    pub feet: T,
}

impl<T> PartMap<T> {
    pub fn from_fn(mut f: impl FnMut(Part) -> T) -> Self {
        Self {
            head: f(Part::Head),
            torso: f(Part::Torso),
            legs: f(Part::Legs),
            feet: f(Part::Feet),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Part, &T) -> U) -> PartMap<U> {
        PartMap::from_fn(|part| f(part, &self[part]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Part, &T)> {
        Part::ALL.into_iter().map(move |part| (part, &self[part]))
    }

    pub fn values(&self) -> [&T; 4] {
        [&self.head, &self.torso, &self.legs, &self.feet]
    }
}

impl<T: Clone> PartMap<T> {
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<Part> for PartMap<T> {
    type Output = T;

    fn index(&self, part: Part) -> &T {
        match part {
            Part::Head => &self.head,
            Part::Torso => &self.torso,
            Part::Legs => &self.legs,
            Part::Feet => &self.feet,
        }
    }
}

impl<T> IndexMut<Part> for PartMap<T> {
    fn index_mut(&mut self, part: Part) -> &mut T {
        match part {
            Part::Head => &mut self.head,
            Part::Torso => &mut self.torso,
            Part::Legs => &mut self.legs,
            Part::Feet => &mut self.feet,
        }
    }
}
