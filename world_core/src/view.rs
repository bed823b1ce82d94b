//! Lazy, composable views over the classification index.
//!
//! A view is a set of borrowed index range segments (or shared owned units
//! after a mutating operation) plus an optional predicate chain. Composing
//! with [`UnitsView::choose`] never scans; only terminal operations walk the
//! backing units. Borrowed views hold a shared borrow of the index, so the
//! borrow checker rejects any use across a reindex.

use std::fmt;
use std::rc::Rc;

use glam::Vec2;

use crate::unit::Unit;

type Predicate<'a> = Rc<dyn Fn(&Unit) -> bool + 'a>;

#[derive(Clone)]
enum Storage<'a> {
    /// Read-only aliases of ranges owned by the classification index.
    Borrowed(Vec<&'a [Unit]>),
    /// Materialized units, shared between views until one of them writes.
    Owned(Rc<Vec<Unit>>),
}

/// A filtered, lazily-evaluated set of units valid for the current tick.
#[derive(Clone)]
pub struct UnitsView<'a> {
    storage: Storage<'a>,
    predicate: Option<Predicate<'a>>,
}

impl<'a> UnitsView<'a> {
    pub fn empty() -> Self {
        Self {
            storage: Storage::Borrowed(Vec::new()),
            predicate: None,
        }
    }

    pub(crate) fn from_segments(segments: Vec<&'a [Unit]>) -> Self {
        Self {
            storage: Storage::Borrowed(segments),
            predicate: None,
        }
    }

    /// Build an isolated view from owned units.
    pub fn from_units(units: Vec<Unit>) -> Self {
        Self {
            storage: Storage::Owned(Rc::new(units)),
            predicate: None,
        }
    }

    /// Narrow the view with an additional predicate; the result's predicate
    /// is the logical AND of the receiver's chain and `pred`. No scan occurs.
    pub fn choose<F>(&self, pred: F) -> UnitsView<'a>
    where
        F: Fn(&Unit) -> bool + 'a,
    {
        let predicate: Predicate<'a> = match &self.predicate {
            Some(prev) => {
                let prev = Rc::clone(prev);
                Rc::new(move |u: &Unit| prev(u) && pred(u))
            }
            None => Rc::new(pred),
        };
        UnitsView {
            storage: self.storage.clone(),
            predicate: Some(predicate),
        }
    }

    /// Walk the backing ranges, applying the residual predicate per element.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Unit> + '_> {
        let predicate = self.predicate.clone();
        let base: Box<dyn Iterator<Item = &Unit> + '_> = match &self.storage {
            Storage::Borrowed(segments) => Box::new(segments.iter().copied().flatten()),
            Storage::Owned(units) => Box::new(units.iter()),
        };
        Box::new(base.filter(move |u| predicate.as_ref().map_or(true, |p| p(u))))
    }

    pub fn first(&self) -> Option<&Unit> {
        self.iter().next()
    }

    pub fn each<F: FnMut(&Unit)>(&self, f: F) {
        self.iter().for_each(f);
    }

    /// Materialize references to every unit passing the predicate chain.
    pub fn all(&self) -> Vec<&Unit> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        match (&self.storage, &self.predicate) {
            (Storage::Borrowed(segments), None) => segments.iter().map(|s| s.len()).sum(),
            (Storage::Owned(units), None) => units.len(),
            _ => self.iter().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// The unit nearest to `pos` by squared distance.
    pub fn closest_to(&self, pos: Vec2) -> Option<&Unit> {
        self.iter()
            .min_by(|a, b| a.distance_squared(pos).total_cmp(&b.distance_squared(pos)))
    }

    /// Mean position of the view's units; `None` when empty.
    pub fn center(&self) -> Option<Vec2> {
        let mut sum = Vec2::ZERO;
        let mut count = 0u32;
        for u in self.iter() {
            sum += u.pos;
            count += 1;
        }
        (count > 0).then(|| sum / count as f32)
    }

    /// Transfer ownership of the units passing the predicate chain.
    pub fn into_units(self) -> Vec<Unit> {
        match (self.storage, self.predicate) {
            (Storage::Owned(units), None) => {
                Rc::try_unwrap(units).unwrap_or_else(|shared| (*shared).clone())
            }
            (Storage::Owned(units), Some(p)) => {
                units.iter().filter(|u| p(u)).cloned().collect()
            }
            (Storage::Borrowed(segments), predicate) => segments
                .iter()
                .copied()
                .flatten()
                .filter(|u| predicate.as_ref().map_or(true, |p| p(u)))
                .cloned()
                .collect(),
        }
    }

    /// A new owned view holding this view's units followed by `other`'s.
    pub fn concat(&self, other: &UnitsView<'a>) -> UnitsView<'a> {
        let mut units: Vec<Unit> = self.iter().cloned().collect();
        units.extend(other.iter().cloned());
        UnitsView::from_units(units)
    }

    /// Append a unit. The view copies out of index-owned storage first, and
    /// unshares storage it still holds in common with sibling views, so the
    /// canonical array is never written through.
    pub fn push(&mut self, unit: Unit) {
        self.materialize();
        if let Storage::Owned(units) = &mut self.storage {
            Rc::make_mut(units).push(unit);
        }
    }

    /// Force owned storage, folding the predicate chain in.
    fn materialize(&mut self) {
        if matches!(self.storage, Storage::Owned(_)) && self.predicate.is_none() {
            return;
        }
        let units: Vec<Unit> = self.iter().cloned().collect();
        self.storage = Storage::Owned(Rc::new(units));
        self.predicate = None;
    }
}

impl Default for UnitsView<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for UnitsView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitsView")
            .field("len", &self.len())
            .field("filtered", &self.predicate.is_some())
            .finish()
    }
}
