use std::fmt::{Debug, Error, Formatter};
use std::iter::{Enumerate, FromIterator};
use std::slice::Iter;

/// Elements with a logical "width" (eg. when stored in an [`OffsetVec`])
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector whose elements are addressed by the running sum of the widths of the preceding
/// elements instead of by their position.
///
/// Class files lean on this indexing scheme in two places we care about:
///
///   - the constant pool, where `Long` and `Double` entries consume two indices and the pool
///     itself starts counting at 1
///   - method frames, where `long` and `double` locals consume two slots
///
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, each paired with its offset
    entries: Vec<(Offset, T)>,

    /// Offset at which the next element would land
    offset_len: Offset,
}

/// Offset into an [`OffsetVec`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    pub fn new() -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: Offset(0),
        }
    }

    /// New empty vector whose first element sits at `initial_offset`
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
        }
    }

    /// Number of entries (not the summed width)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the next element to be added
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Append an entry and return the offset it was assigned
    pub fn push(&mut self, elem: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += elem.width();
        self.entries.push((offset, elem));
        offset
    }

    /// Look up an entry (and its index) by offset
    ///
    /// Offsets falling in the middle of a wide element are invalid, as are offsets past the end.
    pub fn get_offset(&self, offset: Offset) -> OffsetResult<T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at) if insert_at == self.entries.len() => OffsetResult::TooLarge,
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at),
            Ok(found_idx) => OffsetResult::Ok(found_idx, &self.entries[found_idx].1),
        }
    }

    pub fn iter(&self) -> OffsetVecIter<T> {
        self.into_iter()
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

pub enum OffsetResult<'a, T> {
    /// Element found at this index
    Ok(usize, &'a T),

    /// Offset falls in the middle of the element at this index
    InvalidOffset(usize),

    /// Offset is past the end
    TooLarge,
}

impl<'a, T> OffsetResult<'a, T> {
    pub fn ok(&self) -> Option<&'a T> {
        match self {
            OffsetResult::Ok(_, found) => Some(found),
            OffsetResult::InvalidOffset(_) | OffsetResult::TooLarge => None,
        }
    }
}

/// Iterator for a borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        for elem in elems {
            offset_vec.push(elem);
        }
        offset_vec
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow(_) => 1,
                Slot::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_account_for_widths() {
        let slots: OffsetVec<Slot> = vec![
            Slot::Narrow(1),
            Slot::Wide(2),
            Slot::Narrow(3),
            Slot::Wide(4),
        ]
        .into_iter()
        .collect();

        assert_eq!(slots.len(), 4);
        assert_eq!(slots.offset_len(), Offset(6));
        assert_eq!(
            slots.iter().collect::<Vec<_>>(),
            vec![
                (Offset(0), 0, &Slot::Narrow(1)),
                (Offset(1), 1, &Slot::Wide(2)),
                (Offset(3), 2, &Slot::Narrow(3)),
                (Offset(4), 3, &Slot::Wide(4)),
            ]
        );
    }

    #[test]
    fn lookup_by_offset() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        slots.push(Slot::Wide(1));
        slots.push(Slot::Narrow(2));

        assert_eq!(slots.get_offset(Offset(1)).ok(), Some(&Slot::Wide(1)));
        // The second index of a wide entry is unusable
        assert!(slots.get_offset(Offset(2)).ok().is_none());
        assert_eq!(slots.get_offset(Offset(3)).ok(), Some(&Slot::Narrow(2)));
        assert!(slots.get_offset(Offset(4)).ok().is_none());
    }
}
