//! Station state table
//!
//! Holds the last published visual intent of every station. The weather
//! pipeline writes it from its own context; the render loop copies a
//! consistent snapshot once per tick. Both sides go through a critical
//! section, so a station's (category, color) pair is never observed torn.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::{String, Vec};

use crate::color::{Rgb, parse_rgb};
use crate::config::CategoryPalette;
use crate::error::{CoreError, InvalidData};

/// Upper bound on stations a single map can address
pub const MAX_STATIONS: usize = 256;

/// Longest accepted airport identifier
pub const STATION_ID_LEN: usize = 8;

pub type StationId = String<STATION_ID_LEN>;

const CATEGORY_NAME_VFR: &str = "VFR";
const CATEGORY_NAME_MVFR: &str = "MVFR";
const CATEGORY_NAME_IFR: &str = "IFR";
const CATEGORY_NAME_LIFR: &str = "LIFR";
const CATEGORY_NAME_NONE: &str = "NONE";

/// Flight category as classified by the weather pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FlightCategory {
    Vfr,
    Mvfr,
    Ifr,
    Lifr,
    #[default]
    None,
}

impl FlightCategory {
    /// Parse a category name, ignoring ASCII case
    pub fn parse_from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        [
            (CATEGORY_NAME_VFR, Self::Vfr),
            (CATEGORY_NAME_MVFR, Self::Mvfr),
            (CATEGORY_NAME_IFR, Self::Ifr),
            (CATEGORY_NAME_LIFR, Self::Lifr),
            (CATEGORY_NAME_NONE, Self::None),
        ]
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(s))
        .map(|(_, category)| category)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vfr => CATEGORY_NAME_VFR,
            Self::Mvfr => CATEGORY_NAME_MVFR,
            Self::Ifr => CATEGORY_NAME_IFR,
            Self::Lifr => CATEGORY_NAME_LIFR,
            Self::None => CATEGORY_NAME_NONE,
        }
    }

    pub const fn color(self, palette: &CategoryPalette) -> Rgb {
        match self {
            Self::Vfr => palette.vfr,
            Self::Mvfr => palette.mvfr,
            Self::Ifr => palette.ifr,
            Self::Lifr => palette.lifr,
            Self::None => palette.no_data,
        }
    }
}

/// Optional weather flags attached to a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StationFlags {
    pub wind_alert: bool,
    pub precipitation: bool,
    pub lightning: bool,
}

impl StationFlags {
    pub const fn any(self) -> bool {
        self.wind_alert || self.precipitation || self.lightning
    }
}

/// Resolved state of one station, as read by the effect engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationState {
    pub category: FlightCategory,
    /// Base color the station shows when no effect claims it
    pub color: Rgb,
    pub flags: StationFlags,
    /// False when the last update was malformed and `color` is the fallback
    pub valid: bool,
}

impl StationState {
    const fn unknown(palette: &CategoryPalette) -> Self {
        Self {
            category: FlightCategory::None,
            color: palette.no_data,
            flags: StationFlags {
                wind_alert: false,
                precipitation: false,
                lightning: false,
            },
            valid: true,
        }
    }
}

/// Per-tick copy of every station's state, in LED order
pub type StationSnapshot<const N: usize> = Vec<StationState, N>;

struct TableState<const N: usize> {
    stations: Vec<StationState, N>,
    revision: u32,
}

/// Shared table of station states
///
/// Station ids and their LED order are fixed at construction; only the
/// states change afterwards.
pub struct StationTable<const N: usize> {
    ids: Vec<StationId, N>,
    palette: CategoryPalette,
    inner: Mutex<RefCell<TableState<N>>>,
}

impl<const N: usize> StationTable<N> {
    /// Create a table for the given stations, in LED order
    pub fn new(ids: &[&str], palette: CategoryPalette) -> Result<Self, CoreError> {
        if ids.len() > N || ids.len() > MAX_STATIONS {
            return Err(CoreError::Capacity);
        }

        let mut station_ids = Vec::new();
        let mut stations = Vec::new();
        for id in ids {
            let id = StationId::try_from(id.trim()).map_err(|()| CoreError::Capacity)?;
            station_ids.push(id).map_err(|_| CoreError::Capacity)?;
            stations
                .push(StationState::unknown(&palette))
                .map_err(|_| CoreError::Capacity)?;
        }

        Ok(Self {
            ids: station_ids,
            palette,
            inner: Mutex::new(RefCell::new(TableState {
                stations,
                revision: 0,
            })),
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub const fn palette(&self) -> &CategoryPalette {
        &self.palette
    }

    /// LED index of a station, ignoring ASCII case
    pub fn index_of(&self, id: &str) -> Option<usize> {
        let id = id.trim();
        self.ids.iter().position(|known| known.eq_ignore_ascii_case(id))
    }

    pub fn id(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(StationId::as_str)
    }

    /// Publish new weather data for a station.
    ///
    /// `color` overrides the category color when present (0xRRGGBB). A
    /// malformed category or color still updates the station, but with the
    /// fallback "no data" color, and the error is returned for diagnostics.
    pub fn set_station(
        &self,
        id: &str,
        category: &str,
        color: Option<u32>,
        flags: StationFlags,
    ) -> Result<(), CoreError> {
        let index = self.index_of(id).ok_or(CoreError::UnknownStation)?;

        let parsed_category = FlightCategory::parse_from_str(category);
        let parsed_color = match color {
            Some(raw) => parse_rgb(raw).map(Some),
            None => Some(None),
        };

        let (state, error) = match (parsed_category, parsed_color) {
            (Some(category), Some(color)) => (
                StationState {
                    category,
                    color: color.unwrap_or(category.color(&self.palette)),
                    flags,
                    valid: true,
                },
                None,
            ),
            (category, _) => {
                let reason = if category.is_none() {
                    InvalidData::Category
                } else {
                    InvalidData::Color
                };
                log::warn!(
                    "station {}: {} (category={:?}, color={:?}), using fallback color",
                    id,
                    reason,
                    category,
                    color
                );
                (
                    StationState {
                        category: FlightCategory::None,
                        color: self.palette.no_data,
                        flags,
                        valid: false,
                    },
                    Some(CoreError::InvalidStationData { reason }),
                )
            }
        };

        self.store(index, state);
        error.map_or(Ok(()), Err)
    }

    /// Publish an already classified station state
    pub fn set_classified(
        &self,
        id: &str,
        category: FlightCategory,
        color: Option<Rgb>,
        flags: StationFlags,
    ) -> Result<(), CoreError> {
        let index = self.index_of(id).ok_or(CoreError::UnknownStation)?;
        self.store(
            index,
            StationState {
                category,
                color: color.unwrap_or(category.color(&self.palette)),
                flags,
                valid: true,
            },
        );
        Ok(())
    }

    fn store(&self, index: usize, state: StationState) {
        critical_section::with(|cs| {
            let mut table = self.inner.borrow(cs).borrow_mut();
            if let Some(slot) = table.stations.get_mut(index) {
                *slot = state;
                table.revision = table.revision.wrapping_add(1);
            }
        });
    }

    /// Current state of a single station
    pub fn get(&self, id: &str) -> Option<StationState> {
        let index = self.index_of(id)?;
        critical_section::with(|cs| self.inner.borrow(cs).borrow().stations.get(index).copied())
    }

    /// Copy every station's state in one critical section
    pub fn snapshot(&self) -> StationSnapshot<N> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().stations.clone())
    }

    /// Number of updates applied so far (wraps)
    pub fn revision(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().revision)
    }

    /// Resolve station ids into a [`StationSet`]
    pub fn station_set(&self, ids: &[&str]) -> Result<StationSet, CoreError> {
        let mut set = StationSet::new();
        for id in ids {
            let index = self.index_of(id).ok_or(CoreError::UnknownStation)?;
            set.insert(index);
        }
        Ok(set)
    }

    /// Set containing every station of the table
    pub fn all(&self) -> StationSet {
        let mut set = StationSet::new();
        for index in 0..self.len() {
            set.insert(index);
        }
        set
    }
}

const SET_WORDS: usize = MAX_STATIONS / 64;

/// Fixed-size set of station indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StationSet {
    bits: [u64; SET_WORDS],
}

impl StationSet {
    pub const fn new() -> Self {
        Self {
            bits: [0; SET_WORDS],
        }
    }

    /// Insert a station index. Indices past [`MAX_STATIONS`] are ignored.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= MAX_STATIONS {
            return false;
        }
        let (word, bit) = (index / 64, index % 64);
        let was_set = self.bits[word] & (1 << bit) != 0;
        self.bits[word] |= 1 << bit;
        !was_set
    }

    pub fn remove(&mut self, index: usize) {
        if index < MAX_STATIONS {
            self.bits[index / 64] &= !(1 << (index % 64));
        }
    }

    pub const fn contains(&self, index: usize) -> bool {
        index < MAX_STATIONS && self.bits[index / 64] & (1 << (index % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Remove every member of `other` from this set
    pub fn subtract(&mut self, other: &Self) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a &= !b;
        }
    }

    /// Number of members with a smaller index than `index`
    pub fn rank(&self, index: usize) -> usize {
        let index = index.min(MAX_STATIONS);
        let (word, bit) = (index / 64, index % 64);
        let full: usize = self.bits[..word]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        if word == SET_WORDS {
            return full;
        }
        let partial = self.bits[word] & ((1u64 << bit) - 1);
        full + partial.count_ones() as usize
    }

    /// Member indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_STATIONS).filter(|index| self.contains(*index))
    }
}

impl FromIterator<usize> for StationSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}
