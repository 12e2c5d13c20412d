//! Sequence sets for addressing messages.
//!
//! A [`SequenceSet`] addresses messages either by sequence number or by UID,
//! never both. Sets are immutable; combining or chunking produces new sets.

use std::fmt;
use std::num::NonZeroU32;

use crate::{Error, Result};

/// Shape of a sequence set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetKind {
    /// A single number.
    Number(NonZeroU32),
    /// Inclusive range, `from <= to`.
    Range {
        /// Lower bound.
        from: NonZeroU32,
        /// Upper bound.
        to: NonZeroU32,
    },
    /// `n:*`, from `n` to the largest number in the mailbox.
    From(NonZeroU32),
    /// `*:n`, from the largest number in the mailbox down to `n`.
    To(NonZeroU32),
    /// `*`.
    All,
    /// Explicit list, in construction order.
    Set(Vec<NonZeroU32>),
    /// Union of other sets, flattened.
    Combined(Vec<SetKind>),
    /// `$`, the result saved by the last `SEARCH ... RETURN (SAVE)`.
    SavedResult,
}

impl SetKind {
    fn is_empty(&self) -> bool {
        match self {
            Self::Set(numbers) => numbers.is_empty(),
            Self::Combined(members) => members.iter().all(Self::is_empty),
            _ => false,
        }
    }

    fn is_enumerable(&self) -> bool {
        match self {
            Self::Number(_) | Self::Range { .. } | Self::Set(_) => true,
            Self::Combined(members) => members.iter().all(Self::is_enumerable),
            Self::From(_) | Self::To(_) | Self::All | Self::SavedResult => false,
        }
    }

    fn numbers(&self) -> Box<dyn Iterator<Item = NonZeroU32> + '_> {
        match self {
            Self::Number(n) => Box::new(std::iter::once(*n)),
            Self::Range { from, to } => {
                Box::new((from.get()..=to.get()).filter_map(NonZeroU32::new))
            }
            Self::Set(numbers) => Box::new(numbers.iter().copied()),
            Self::Combined(members) => Box::new(members.iter().flat_map(Self::numbers)),
            Self::From(_) | Self::To(_) | Self::All | Self::SavedResult => {
                Box::new(std::iter::empty())
            }
        }
    }

    fn single_number(&self) -> Option<u32> {
        match self {
            Self::Number(n) => Some(n.get()),
            Self::Set(numbers) if numbers.len() == 1 => numbers.first().map(|n| n.get()),
            Self::Combined(members) if members.len() == 1 => {
                members.first().and_then(Self::single_number)
            }
            _ => None,
        }
    }

    fn flatten_into(&self, out: &mut Vec<Self>) {
        match self {
            Self::Combined(members) => {
                for member in members {
                    member.flatten_into(out);
                }
            }
            kind if kind.is_empty() => {}
            kind => out.push(kind.clone()),
        }
    }

    fn run(from: NonZeroU32, to: NonZeroU32) -> Self {
        if from == to {
            Self::Number(from)
        } else {
            Self::Range { from, to }
        }
    }

    /// Collapses each ascending contiguous run into a range.
    fn compact(numbers: &[NonZeroU32]) -> Self {
        let mut iter = numbers.iter().copied();
        let Some(first) = iter.next() else {
            return Self::Set(Vec::new());
        };

        let mut runs = Vec::new();
        let (mut start, mut end) = (first, first);
        for n in iter {
            if end.checked_add(1) == Some(n) {
                end = n;
            } else {
                runs.push(Self::run(start, end));
                start = n;
                end = n;
            }
        }
        runs.push(Self::run(start, end));

        if runs.len() == 1 {
            runs.swap_remove(0)
        } else {
            Self::Combined(runs)
        }
    }
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Range { from, to } => write!(f, "{from}:{to}"),
            Self::From(n) => write!(f, "{n}:*"),
            Self::To(n) => write!(f, "*:{n}"),
            Self::All => f.write_str("*"),
            Self::Set(numbers) => write_joined(f, numbers),
            Self::Combined(members) => write_joined(f, members),
            Self::SavedResult => f.write_str("$"),
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Message set addressed by sequence number or by UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet {
    uid: bool,
    kind: SetKind,
}

fn non_zero(n: u32) -> Result<NonZeroU32> {
    NonZeroU32::new(n)
        .ok_or_else(|| Error::InvalidArgument("message numbers start at 1".to_string()))
}

impl SequenceSet {
    const fn with(uid: bool, kind: SetKind) -> Self {
        Self { uid, kind }
    }

    fn single_with(uid: bool, n: u32) -> Result<Self> {
        Ok(Self::with(uid, SetKind::Number(non_zero(n)?)))
    }

    fn range_with(uid: bool, from: u32, to: u32) -> Result<Self> {
        let (from, to) = (non_zero(from.min(to))?, non_zero(from.max(to))?);
        Ok(Self::with(uid, SetKind::run(from, to)))
    }

    fn set_with(uid: bool, numbers: impl IntoIterator<Item = u32>) -> Result<Self> {
        let numbers = numbers
            .into_iter()
            .map(non_zero)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with(uid, SetKind::Set(numbers)))
    }

    /// Single sequence number.
    pub fn single(n: u32) -> Result<Self> {
        Self::single_with(false, n)
    }

    /// Single UID.
    pub fn uid_single(uid: u32) -> Result<Self> {
        Self::single_with(true, uid)
    }

    /// Inclusive range of sequence numbers; collapses to [`single`](Self::single)
    /// when both ends are equal.
    pub fn range(from: u32, to: u32) -> Result<Self> {
        Self::range_with(false, from, to)
    }

    /// Inclusive range of UIDs.
    pub fn uid_range(from: u32, to: u32) -> Result<Self> {
        Self::range_with(true, from, to)
    }

    /// `n:*` over sequence numbers.
    pub fn all_from(n: u32) -> Result<Self> {
        Ok(Self::with(false, SetKind::From(non_zero(n)?)))
    }

    /// `n:*` over UIDs.
    pub fn uid_all_from(uid: u32) -> Result<Self> {
        Ok(Self::with(true, SetKind::From(non_zero(uid)?)))
    }

    /// `*:n` over sequence numbers.
    pub fn all_to(n: u32) -> Result<Self> {
        Ok(Self::with(false, SetKind::To(non_zero(n)?)))
    }

    /// `*:n` over UIDs.
    pub fn uid_all_to(uid: u32) -> Result<Self> {
        Ok(Self::with(true, SetKind::To(non_zero(uid)?)))
    }

    /// Every message, by sequence number.
    #[must_use]
    pub const fn all() -> Self {
        Self::with(false, SetKind::All)
    }

    /// Every message, by UID.
    #[must_use]
    pub const fn uid_all() -> Self {
        Self::with(true, SetKind::All)
    }

    /// Explicit list of sequence numbers, kept in the given order.
    pub fn set(numbers: impl IntoIterator<Item = u32>) -> Result<Self> {
        Self::set_with(false, numbers)
    }

    /// Explicit list of UIDs, kept in the given order.
    pub fn uid_set(uids: impl IntoIterator<Item = u32>) -> Result<Self> {
        Self::set_with(true, uids)
    }

    /// `$` in a sequence-number command.
    #[must_use]
    pub const fn saved_result() -> Self {
        Self::with(false, SetKind::SavedResult)
    }

    /// `$` in a UID command.
    #[must_use]
    pub const fn uid_saved_result() -> Self {
        Self::with(true, SetKind::SavedResult)
    }

    /// Returns true if this set addresses UIDs.
    #[must_use]
    pub const fn is_uid(&self) -> bool {
        self.uid
    }

    /// Returns the shape of this set.
    #[must_use]
    pub const fn kind(&self) -> &SetKind {
        &self.kind
    }

    /// Returns true for `$`.
    #[must_use]
    pub const fn is_saved_result(&self) -> bool {
        matches!(self.kind, SetKind::SavedResult)
    }

    /// Returns true if the set addresses no message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }

    /// Union of two sets.
    ///
    /// Nested unions are flattened, empty members dropped, and a union
    /// containing `*` becomes `*`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when one set addresses UIDs and the other
    /// sequence numbers; [`Error::Unsupported`] when `$` meets any other set.
    pub fn combine(&self, other: &Self) -> Result<Self> {
        if self.uid != other.uid {
            return Err(Error::InvalidArgument(
                "cannot combine UID and sequence-number sets".to_string(),
            ));
        }

        match (&self.kind, &other.kind) {
            (SetKind::SavedResult, SetKind::SavedResult) => return Ok(self.clone()),
            (SetKind::SavedResult, _) | (_, SetKind::SavedResult) => {
                return Err(Error::Unsupported(
                    "the saved search result cannot be combined".to_string(),
                ));
            }
            _ => {}
        }

        let mut members = Vec::new();
        self.kind.flatten_into(&mut members);
        other.kind.flatten_into(&mut members);

        if members.iter().any(|m| matches!(m, SetKind::All)) {
            return Ok(Self::with(self.uid, SetKind::All));
        }

        let kind = match members.len() {
            0 => SetKind::Set(Vec::new()),
            1 => members.swap_remove(0),
            _ => SetKind::Combined(members),
        };
        Ok(Self::with(self.uid, kind))
    }

    /// Folds [`combine`](Self::combine) over several sets.
    ///
    /// # Errors
    ///
    /// As for [`combine`](Self::combine); also [`Error::InvalidArgument`]
    /// when `sets` is empty.
    pub fn combine_all<'a>(sets: impl IntoIterator<Item = &'a Self>) -> Result<Self> {
        let mut iter = sets.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::InvalidArgument("no sets to combine".to_string()))?;
        iter.try_fold(first.clone(), |acc, set| acc.combine(set))
    }

    /// The one number this set denotes.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] unless the set denotes exactly one number.
    pub fn to_number(&self) -> Result<u32> {
        self.kind.single_number().ok_or_else(|| {
            Error::Unsupported(format!("'{self}' does not denote exactly one number"))
        })
    }

    /// Lazily yields the numbers in construction order.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] for sets containing `n:*`, `*:n`, `*` or `$`,
    /// whose extent only the server knows.
    pub fn enumerate(&self) -> Result<impl Iterator<Item = u32> + '_> {
        if !self.kind.is_enumerable() {
            return Err(Error::Unsupported(format!(
                "'{self}' cannot be enumerated on the client"
            )));
        }
        Ok(self.kind.numbers().map(NonZeroU32::get))
    }

    /// Materialises [`enumerate`](Self::enumerate).
    ///
    /// # Errors
    ///
    /// As for [`enumerate`](Self::enumerate).
    pub fn to_array(&self) -> Result<Vec<u32>> {
        Ok(self.enumerate()?.collect())
    }

    /// Partitions the set into groups of at most `count` numbers.
    ///
    /// Each group is rendered compactly: ascending contiguous runs become
    /// `from:to`. Enumeration order is preserved. `$` is returned whole.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `count` is zero;
    /// [`Error::Unsupported`] when the set cannot be enumerated.
    pub fn split_into_chunks(&self, count: usize) -> Result<Vec<Self>> {
        if count == 0 {
            return Err(Error::InvalidArgument("chunk size must be positive".to_string()));
        }
        if self.is_saved_result() {
            return Ok(vec![self.clone()]);
        }
        if !self.kind.is_enumerable() {
            return Err(Error::Unsupported(format!(
                "'{self}' cannot be split on the client"
            )));
        }

        let numbers: Vec<NonZeroU32> = self.kind.numbers().collect();
        Ok(numbers
            .chunks(count)
            .map(|chunk| Self::with(self.uid, SetKind::compact(chunk)))
            .collect())
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    mod construction_tests {
        use super::*;

        #[test]
        fn single_renders_number() {
            assert_eq!(SequenceSet::single(7).unwrap().to_string(), "7");
        }

        #[test]
        fn zero_is_rejected() {
            let err = SequenceSet::single(0).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert!(SequenceSet::uid_set([1, 0, 3]).is_err());
        }

        #[test]
        fn range_collapses_when_equal() {
            let set = SequenceSet::range(4, 4).unwrap();
            assert_eq!(set, SequenceSet::single(4).unwrap());
        }

        #[test]
        fn range_is_normalised() {
            assert_eq!(SequenceSet::uid_range(9, 3).unwrap().to_string(), "3:9");
        }

        #[test]
        fn open_sets_render() {
            assert_eq!(SequenceSet::all_from(5).unwrap().to_string(), "5:*");
            assert_eq!(SequenceSet::all_to(5).unwrap().to_string(), "*:5");
            assert_eq!(SequenceSet::all().to_string(), "*");
            assert_eq!(SequenceSet::saved_result().to_string(), "$");
        }

        #[test]
        fn set_keeps_order() {
            assert_eq!(SequenceSet::set([3, 1, 2]).unwrap().to_string(), "3,1,2");
        }
    }

    mod combine_tests {
        use super::*;

        #[test]
        fn flattens_nested() {
            let a = SequenceSet::single(1).unwrap();
            let b = SequenceSet::range(3, 5).unwrap();
            let c = SequenceSet::set([9, 11]).unwrap();
            let ab = a.combine(&b).unwrap();
            let abc = ab.combine(&c).unwrap();
            assert_eq!(abc.to_string(), "1,3:5,9,11");
            match abc.kind() {
                SetKind::Combined(members) => {
                    assert_eq!(members.len(), 3);
                    assert!(!members.iter().any(|m| matches!(m, SetKind::Combined(_))));
                }
                other => panic!("expected combined set, got {other:?}"),
            }
        }

        #[test]
        fn absorbs_all() {
            let a = SequenceSet::uid_range(1, 3).unwrap();
            let all = SequenceSet::uid_all();
            assert_eq!(a.combine(&all).unwrap(), SequenceSet::uid_all());
        }

        #[test]
        fn drops_empty_members() {
            let a = SequenceSet::set(Vec::new()).unwrap();
            let b = SequenceSet::single(2).unwrap();
            assert_eq!(a.combine(&b).unwrap(), b);
        }

        #[test]
        fn mixed_tagging_is_invalid() {
            let seq = SequenceSet::single(1).unwrap();
            let uid = SequenceSet::uid_single(1).unwrap();
            assert_eq!(seq.combine(&uid).unwrap_err().kind(), ErrorKind::InvalidArgument);
        }

        #[test]
        fn saved_result_does_not_combine() {
            let saved = SequenceSet::saved_result();
            let other = SequenceSet::single(1).unwrap();
            assert_eq!(saved.combine(&other).unwrap_err().kind(), ErrorKind::Unsupported);
            assert_eq!(saved.combine(&saved).unwrap(), saved);
        }

        #[test]
        fn combine_all_folds() {
            let sets = [
                SequenceSet::single(1).unwrap(),
                SequenceSet::single(2).unwrap(),
                SequenceSet::single(3).unwrap(),
            ];
            assert_eq!(SequenceSet::combine_all(&sets).unwrap().to_string(), "1,2,3");
            assert!(SequenceSet::combine_all(&[]).is_err());
        }
    }

    mod enumeration_tests {
        use super::*;

        #[test]
        fn to_number() {
            assert_eq!(SequenceSet::single(5).unwrap().to_number().unwrap(), 5);
            assert_eq!(SequenceSet::set([8]).unwrap().to_number().unwrap(), 8);
            let err = SequenceSet::range(1, 2).unwrap().to_number().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unsupported);
            assert!(SequenceSet::all().to_number().is_err());
        }

        #[test]
        fn enumerate_in_construction_order() {
            let set = SequenceSet::set([5, 1])
                .unwrap()
                .combine(&SequenceSet::range(2, 4).unwrap())
                .unwrap();
            assert_eq!(set.to_array().unwrap(), vec![5, 1, 2, 3, 4]);
        }

        #[test]
        fn open_sets_cannot_enumerate() {
            for set in [
                SequenceSet::all_from(1).unwrap(),
                SequenceSet::all_to(1).unwrap(),
                SequenceSet::all(),
                SequenceSet::saved_result(),
            ] {
                assert_eq!(set.to_array().unwrap_err().kind(), ErrorKind::Unsupported);
            }
        }
    }

    mod chunk_tests {
        use super::*;

        #[test]
        fn contiguous_run_becomes_range() {
            let set = SequenceSet::uid_set(1..=10).unwrap();
            let chunks = set.split_into_chunks(4).unwrap();
            let rendered: Vec<_> = chunks.iter().map(ToString::to_string).collect();
            assert_eq!(rendered, vec!["1:4", "5:8", "9:10"]);
            assert!(chunks.iter().all(SequenceSet::is_uid));
        }

        #[test]
        fn gaps_become_separate_runs() {
            let set = SequenceSet::set([1, 2, 3, 7, 9, 10]).unwrap();
            let chunks = set.split_into_chunks(10).unwrap();
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].to_string(), "1:3,7,9:10");
        }

        #[test]
        fn single_leftover_is_a_number() {
            let chunks = SequenceSet::range(1, 5).unwrap().split_into_chunks(2).unwrap();
            assert_eq!(chunks[2], SequenceSet::single(5).unwrap());
        }

        #[test]
        fn saved_result_is_one_chunk() {
            let saved = SequenceSet::uid_saved_result();
            assert_eq!(saved.split_into_chunks(3).unwrap(), vec![saved]);
        }

        #[test]
        fn zero_count_is_invalid() {
            let set = SequenceSet::single(1).unwrap();
            assert_eq!(
                set.split_into_chunks(0).unwrap_err().kind(),
                ErrorKind::InvalidArgument
            );
        }
    }
}
