//! Region arithmetic over array indices
//!
//! Regions model areas of arrays and the behavior of those areas as items are
//! inserted into or cut from the underlying array. The main use case is
//! splice-style mutations; see [`MatchSet::mutate_regions`](crate::MatchSet::mutate_regions).
//!
//! A zero-length region is meaningful: it marks an insertion seam (for example
//! the position "start of an empty array") and is deliberately preserved by
//! the set operations that would otherwise absorb it.

use serde_json::Value;

/// A half-open interval `[start, end)` of array indices
///
/// `end >= start` always holds for regions produced by this module. A region
/// with `start == end` covers no items but still marks a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: i64,
    pub end: i64,
}

impl Region {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of items covered by the region
    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    /// True if the region covers no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the provided index is covered by the region
    pub fn contains_index(&self, index: i64) -> bool {
        index >= self.start && index < self.end
    }

    /// True if the index is before the start of the region
    pub fn is_before(&self, index: i64) -> bool {
        index < self.start
    }

    /// True if the region starts at or after the index
    pub fn is_after(&self, index: i64) -> bool {
        self.start >= index
    }

    /// Extend the region to the right by `count` items
    pub fn grow(&self, count: i64) -> Region {
        Region::new(self.start, self.end + count)
    }

    /// Retract the end by `count` items, but never below the start
    pub fn shrink(&self, count: i64) -> Region {
        if count >= self.len() {
            return Region::new(self.start, self.start);
        }
        Region::new(self.start, self.end - count)
    }

    /// Translate the entire region by `diff` indices
    pub fn shift(&self, diff: i64) -> Region {
        Region::new(self.start + diff, self.end + diff)
    }

    /// True if the regions touch end-to-start in either order
    pub fn adjacent(&self, other: Region) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// True if the receiver covers the entire other region (or more)
    pub fn contains_region(&self, other: Region) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// True if the two regions share at least one index
    ///
    /// Zero-length regions never overlap anything when they are the receiver,
    /// but a zero-length region strictly inside another region does count as
    /// overlapped by it.
    pub fn overlap(&self, other: Region) -> bool {
        (other.start >= self.start && other.start < self.end)
            || (other.end > self.start && other.end < self.end)
            || (other.start < self.start && other.end > self.start)
            || (self.start < other.start && self.end > other.start)
    }

    /// True if the two regions are adjacent or overlapping
    pub fn overlap_or_adjacent(&self, other: Region) -> bool {
        self.adjacent(other) || self.overlap(other)
    }

    /// Smallest region covering both regions, spanning any gap between them
    pub fn join(&self, other: Region) -> Region {
        Region::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// The new position and size of this region as if `other` was cut from the
    /// underlying array
    pub fn cut(&self, other: Region) -> Region {
        if other.end < self.start {
            // Cut entirely before this region, it just moves down
            return self.shift(-other.len());
        } else if other.start >= self.end {
            // Cut entirely after this region, no change
            return *self;
        }
        if other.start >= self.start && other.end >= self.end {
            return Region::new(self.start, other.start);
        }
        if other.start <= self.start && other.end > self.end {
            return Region::new(other.start, other.start);
        }
        if other.start <= self.start && other.end > self.start {
            return Region::new(
                other.start,
                other.start + self.len() - (other.end - self.start),
            );
        }
        // Other is fully inside this region, so it just shrinks
        self.shrink(other.len())
    }

    /// The portion of the receiver that remains after carving out `other`
    ///
    /// A cut from the middle splits the receiver, so the result is a region
    /// set holding zero, one or two regions.
    pub fn intersect(&self, other: Region) -> Regions {
        if other.contains_region(*self) {
            // Completely obliterated
            return Regions::new();
        }
        if !self.overlap(other) {
            return Regions::from(vec![*self]);
        }
        if other.start <= self.start {
            // The cut is from the left
            return Regions::from(vec![Region::new(other.end, self.end)]);
        }
        if other.end >= self.end {
            // The cut is from the right
            return Regions::from(vec![Region::new(self.start, other.start)]);
        }
        // The cut is in the middle
        Regions::from(vec![
            Region::new(self.start, other.start),
            Region::new(other.end, self.end),
        ])
    }
}

/// Error produced when parsing a slice selector string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionsError {
    pub message: String,
}

impl std::fmt::Display for RegionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RegionsError {}

/// An ordered set of regions of array indices
///
/// Most operations require or promise sorted-by-start order; see the
/// individual methods. Zero-length regions are allowed and preserved as
/// insertion seams.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Regions(Vec<Region>);

impl From<Vec<Region>> for Regions {
    fn from(regions: Vec<Region>) -> Self {
        Regions(regions)
    }
}

impl FromIterator<Region> for Regions {
    fn from_iter<T: IntoIterator<Item = Region>>(iter: T) -> Self {
        Regions(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Regions {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Regions {
    /// An empty region set
    pub fn new() -> Self {
        Regions(Vec::new())
    }

    /// A set holding a single region
    pub fn single(region: Region) -> Self {
        Regions(vec![region])
    }

    /// Build a set from a list of indices, describing any contiguous series of
    /// indices as single regions. The indices are sorted first.
    pub fn from_indicies(mut indicies: Vec<i64>) -> Self {
        let mut result = Vec::new();
        let mut next = Region::new(0, 0);
        indicies.sort_unstable();
        for index in indicies {
            if next.is_empty() {
                next = Region::new(index, index + 1);
                continue;
            }
            if next.end == index {
                next.end = index + 1;
                continue;
            }
            result.push(next);
            next = Region::new(index, index + 1);
        }
        if !next.is_empty() {
            result.push(next);
        }
        Regions(result)
    }

    /// Build a set with one individual region per index, preserving order
    pub fn region_for_each_index(indicies: &[i64]) -> Self {
        Regions(
            indicies
                .iter()
                .map(|&index| Region::new(index, index + 1))
                .collect(),
        )
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Move regions as if `other` was inserted into the underlying array
    ///
    /// Regions starting at or after the insertion point shift up, regions
    /// containing the insertion point grow. The provided region itself is not
    /// added to the set.
    pub fn insert_at(&self, other: Region) -> Regions {
        assert!(
            other.len() >= 0,
            "insert only makes sense for a positive amount of items"
        );
        Regions(
            self.0
                .iter()
                .map(|r| {
                    if r.is_after(other.start) {
                        r.shift(other.len())
                    } else if r.contains_index(other.start) {
                        r.grow(other.len())
                    } else {
                        *r
                    }
                })
                .collect(),
        )
    }

    /// Cut one region from every region in the set, shrinking or shifting each
    /// correspondingly. The number of regions never changes; regions that end
    /// up empty keep a length of 0. Call [`compact`](Regions::compact) to have
    /// them removed.
    pub fn cut(&self, other: Region) -> Regions {
        Regions(self.0.iter().map(|r| r.cut(other)).collect())
    }

    /// Remove any empty regions from the set
    pub fn compact(&self) -> Regions {
        Regions(self.0.iter().filter(|r| !r.is_empty()).copied().collect())
    }

    /// Remove empty regions and join overlapping ones. Requires sorted input.
    pub fn simplify(&self) -> Regions {
        assert!(self.check_sorted(), "simplify requires sorted regions");
        let mut result: Vec<Region> = Vec::with_capacity(self.0.len());
        for r in self.compact().0 {
            if let Some(last) = result.last_mut() {
                if last.overlap(r) {
                    *last = last.join(r);
                    continue;
                }
            }
            if r.len() > 0 {
                result.push(r);
            }
        }
        Regions(result)
    }

    /// Turn a jumble of unsorted, potentially overlapping regions into a
    /// sorted set of non-overlapping regions without joining anything, so any
    /// split-points and zero-length regions in the selection are preserved.
    pub fn clean(&self) -> Regions {
        let sorted = self.sort();
        let mut result = Vec::with_capacity(sorted.0.len());
        let mut next: Option<Region> = None;
        for r in sorted.0 {
            let Some(cur) = next else {
                next = Some(r);
                continue;
            };
            if r == cur {
                // Duplicate, discard
                continue;
            }
            if r.start >= cur.end {
                result.push(cur);
                next = Some(r);
                continue;
            }
            if r.end > cur.end {
                // r overlaps cur, starting inside it and ending beyond it
                result.push(Region::new(cur.start, r.start));
                result.push(Region::new(r.start, cur.end));
                next = Some(Region::new(cur.end, r.end));
            } else {
                // r is inside cur
                result.push(Region::new(cur.start, r.start));
                result.push(r);
                next = Some(Region::new(r.end, cur.end));
            }
        }
        if let Some(cur) = next {
            result.push(cur);
        }
        Regions(result)
    }

    /// Union of two sorted, non-overlapping region sets
    ///
    /// Overlapping regions are joined. Adjacent regions are kept separate, and
    /// zero-length regions adjacent to non-zero-length ones survive (they are
    /// insertion seams and must not be absorbed). Duplicate zero-length
    /// regions collapse to one.
    pub fn union(&self, other: &Regions) -> Regions {
        if self.0.is_empty() {
            return other.clone();
        }
        if other.0.is_empty() {
            return self.clone();
        }

        let mut left = &self.0[..];
        let mut right = &other.0[..];
        let mut result = Vec::with_capacity(left.len() + right.len());
        // The region we are building, the next to be added to the result
        let mut next: Option<Region> = None;

        while !left.is_empty() || !right.is_empty() {
            let Some(cur) = next.as_mut() else {
                if left.is_empty() {
                    result.extend_from_slice(right);
                    break;
                }
                if right.is_empty() {
                    result.extend_from_slice(left);
                    break;
                }
                if left[0].start < right[0].start {
                    next = Some(left[0]);
                    left = &left[1..];
                } else {
                    next = Some(right[0]);
                    right = &right[1..];
                }
                continue;
            };
            if let Some(&l) = left.first() {
                if cur.overlap(l) {
                    *cur = cur.join(l);
                    left = &left[1..];
                    continue;
                }
                // Zero-length regions never overlap, but must not be
                // represented more than once
                if *cur == l {
                    left = &left[1..];
                    continue;
                }
            }
            if let Some(&r) = right.first() {
                if cur.overlap(r) {
                    *cur = cur.join(r);
                    right = &right[1..];
                    continue;
                }
                if *cur == r {
                    right = &right[1..];
                    continue;
                }
            }
            // Neither side can extend the current region any further
            result.push(*cur);
            next = None;
        }
        if let Some(cur) = next {
            result.push(cur);
        }
        Regions(result)
    }

    /// Remove the portions of the receiver covered by `other`
    ///
    /// Both sets must be sorted; the result is sorted.
    pub fn intersect(&self, other: &Regions) -> Regions {
        if other.0.is_empty() || self.0.is_empty() {
            return self.clone();
        }
        let mut left = &self.0[..];
        let mut right = &other.0[..];
        let mut result = Vec::with_capacity(left.len());
        let mut next: Option<Region> = None;

        loop {
            if left.is_empty() && next.is_none() {
                break;
            }
            let cur = match next.take() {
                Some(r) => r,
                None => {
                    let r = left[0];
                    left = &left[1..];
                    r
                }
            };
            // Skip regions on the right that end before the current region
            while !right.is_empty() && right[0].end <= cur.start {
                right = &right[1..];
            }
            if right.is_empty() {
                // Nothing more to intersect away, flush the rest of the left set
                result.push(cur);
                result.extend_from_slice(left);
                return Regions(result);
            }
            let r0 = right[0];
            if r0.overlap(cur) {
                let pieces = cur.intersect(r0);
                match pieces.0.len() {
                    // The current region was consumed completely
                    0 => {}
                    1 => next = Some(pieces.0[0]),
                    // A cut from the middle: the leftmost piece is final, the
                    // rightmost may still be cut further
                    _ => {
                        result.push(pieces.0[0]);
                        next = Some(pieces.0[1]);
                    }
                }
            } else {
                result.push(cur);
            }
        }
        Regions(result)
    }

    /// A copy of the set sorted by region start
    pub fn sort(&self) -> Regions {
        let mut result = self.0.clone();
        result.sort_by(|a, b| a.start.cmp(&b.start));
        Regions(result)
    }

    /// True if the set is sorted and non-overlapping
    pub fn check(&self) -> bool {
        let mut watermark = 0;
        for r in &self.0 {
            if r.start < watermark {
                return false;
            }
            watermark = r.end;
        }
        true
    }

    /// True if the set is sorted by start
    pub fn check_sorted(&self) -> bool {
        let mut watermark = 0;
        for r in &self.0 {
            if r.start < watermark {
                return false;
            }
            watermark = r.start;
        }
        true
    }

    /// Flatten the set to the individual indices it covers
    pub fn to_indicies(&self) -> Vec<i64> {
        let mut result = Vec::new();
        for r in &self.0 {
            for i in r.start..r.end {
                result.push(i);
            }
        }
        result
    }

    /// Call the callback for each index in the set. The callback returns true
    /// as long as it wants the iteration to continue; an error aborts.
    pub fn for_each_index<E>(
        &self,
        mut callback: impl FnMut(i64) -> Result<bool, E>,
    ) -> Result<(), E> {
        for r in &self.0 {
            for i in r.start..r.end {
                if !callback(i)? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// True if any region in the set contains the index. Exploits sorted order.
    pub fn contains_index(&self, index: i64) -> bool {
        for r in &self.0 {
            // Short circuit: regions are sorted by start
            if r.start > index {
                return false;
            }
            if r.contains_index(index) {
                return true;
            }
        }
        false
    }

    /// Total number of indices covered by the regions in this set
    pub fn indicies_count(&self) -> i64 {
        self.0.iter().map(|r| r.len()).sum()
    }

    /// Extract the items covered by each region from `source`, one sub-list
    /// per region. Regions beyond the source bounds contribute nothing.
    pub fn extract_items(&self, source: &[Value]) -> Vec<Vec<Value>> {
        self.0
            .iter()
            .map(|r| {
                let start = r.start.max(0);
                let end = r.end.min(source.len() as i64);
                (start..end)
                    .map(|i| source[i as usize].clone())
                    .collect()
            })
            .collect()
    }

    /// Companion to [`extract_items`](Regions::extract_items): substitute each
    /// region of `source` with the corresponding sub-list of `replace`
    /// (padding with an empty list if `replace` is shorter), returning the
    /// merged array together with regions describing where each replacement
    /// landed in it.
    pub fn merge_items(&self, source: &[Value], replace: Vec<Vec<Value>>) -> (Vec<Value>, Regions) {
        let mut merged: Vec<Value> = Vec::with_capacity(source.len());
        let mut out_regions = Vec::with_capacity(self.0.len());
        let mut replacements = replace.into_iter();
        let mut source_index = 0usize;
        for r in &self.0 {
            // Copy source items up to the next replacement region
            while (source_index as i64) < r.start && source_index < source.len() {
                merged.push(source[source_index].clone());
                source_index += 1;
            }
            // Continue after the region being replaced
            source_index = r.end.max(0) as usize;
            let insert = replacements.next().unwrap_or_default();
            out_regions.push(Region::new(
                merged.len() as i64,
                (merged.len() + insert.len()) as i64,
            ));
            merged.extend(insert);
        }
        // Items beyond the end of the regions are kept as they are
        if source_index < source.len() {
            merged.extend_from_slice(&source[source_index..]);
        }
        (merged, Regions(out_regions))
    }

    /// Render the set as a slice selector like `"2:5,7:9"`, fit for a path
    /// expression like `my.array[2:5,7:9]`. Single-element regions render as a
    /// bare index; zero-length regions as `a:a`.
    pub fn to_slice_selector(&self) -> String {
        let selectors: Vec<String> = self
            .0
            .iter()
            .map(|r| {
                if r.len() == 1 {
                    format!("{}", r.start)
                } else {
                    format!("{}:{}", r.start, r.end)
                }
            })
            .collect();
        selectors.join(",")
    }

    /// Parse a slice selector produced by
    /// [`to_slice_selector`](Regions::to_slice_selector). Only literal indices
    /// are supported. Whitespace around items is accepted. The result is
    /// cleaned.
    pub fn from_slice_selector(selector: &str) -> Result<Regions, RegionsError> {
        if selector.trim() == "" {
            return Ok(Regions::new());
        }
        let mut result = Vec::new();
        for spec in selector.split(',') {
            let parts: Vec<&str> = spec.split(':').collect();
            let invalid = || RegionsError {
                message: format!("Invalid slice spec {:?}", spec),
            };
            match parts.as_slice() {
                [index] => {
                    let start: i64 = index.trim().parse().map_err(|_| invalid())?;
                    result.push(Region::new(start, start + 1));
                }
                [start, end] => {
                    let start: i64 = start.trim().parse().map_err(|_| invalid())?;
                    let end: i64 = end.trim().parse().map_err(|_| invalid())?;
                    result.push(Region::new(start, end));
                }
                _ => return Err(invalid()),
            }
        }
        Ok(Regions(result).clean())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn r(start: i64, end: i64) -> Region {
        Region::new(start, end)
    }

    fn rs(regions: &[Region]) -> Regions {
        Regions::from(regions.to_vec())
    }

    fn parse_rs(selector: &str) -> Regions {
        Regions::from_slice_selector(selector).unwrap()
    }

    #[test]
    fn test_empty_region() {
        let empty = r(5, 5);
        assert_eq!(0, empty.len());
        assert!(empty.is_empty());
        assert!(empty.adjacent(r(5, 8)));
        assert!(empty.adjacent(r(5, 5)));

        assert!(!empty.contains_index(5));
        assert!(!empty.is_before(5));
        assert!(empty.is_before(4));
        assert!(empty.is_after(5));
        assert!(empty.is_after(4));
        assert!(!empty.is_after(6));

        let grown = empty.grow(3);
        assert_eq!(3, grown.len());
        assert_eq!(5, grown.start);
        assert_eq!(8, grown.end);

        let shrunk = empty.shrink(3);
        assert_eq!(5, shrunk.start);
        assert_eq!(5, shrunk.end);

        let shifted = empty.shift(3);
        assert_eq!(0, shifted.len());
        assert_eq!(8, shifted.start);
        assert_eq!(8, shifted.end);
    }

    #[test]
    fn test_overlap() {
        assert!(!r(2, 3).overlap(r(3, 4)));
        assert!(!r(3, 4).overlap(r(2, 3)));
        assert!(r(2, 4).overlap(r(3, 4)));
        assert!(r(3, 4).overlap(r(2, 4)));
        assert!(r(1, 8).overlap(r(3, 4)));
        assert!(r(3, 4).overlap(r(1, 8)));
        assert!(!r(5, 5).overlap(r(5, 6)));
        assert!(!r(5, 5).overlap(r(5, 5)));
        assert!(r(4, 6).overlap(r(5, 5)));
        assert!(!r(0, 5).overlap(r(5, 5)));
        assert!(!r(1, 1).overlap(r(4, 8)));
    }

    #[test]
    fn test_join() {
        let joined = r(2, 5).join(r(5, 7));
        assert_eq!(2, joined.start);
        assert_eq!(7, joined.end);

        let joined = r(2, 2).join(r(7, 7));
        assert_eq!(2, joined.start);
        assert_eq!(7, joined.end);
    }

    #[test]
    fn test_cut() {
        let master = r(5, 8);
        // Cut from start
        assert_eq!(master.cut(r(2, 7)), r(2, 3));
        // Cut from end
        assert_eq!(master.cut(r(7, 12)), r(5, 7));
        // Cut inside
        assert_eq!(master.cut(r(6, 7)), r(5, 7));
        // Cut to the bone
        assert_eq!(master.cut(r(5, 8)), r(5, 5));
        // Cut to the left
        assert_eq!(master.cut(r(1, 3)), r(3, 6));
        // Cut to the right
        assert_eq!(master.cut(r(12, 36)), r(5, 8));
    }

    #[test]
    fn test_to_slice_selector() {
        assert_eq!(
            "1,4:9,12:12",
            rs(&[r(1, 2), r(4, 9), r(12, 12)]).to_slice_selector()
        );
        assert_eq!("", Regions::new().to_slice_selector());
    }

    #[test]
    fn test_from_slice_selector() {
        let regions = Regions::from_slice_selector("1,4:9").unwrap();
        assert_eq!("1,4:9", regions.to_slice_selector());

        let regions = Regions::from_slice_selector("7:13 ,1:6  , 4:9").unwrap();
        assert_eq!("1:4,4:6,6,7:9,9:13", regions.to_slice_selector());

        let regions = Regions::from_slice_selector("1,2, 3, 4,7, 8,9").unwrap();
        assert_eq!("1,2,3,4,7,8,9", regions.to_slice_selector());

        let regions = Regions::from_slice_selector("").unwrap();
        assert_eq!("", regions.to_slice_selector());

        assert!(Regions::from_slice_selector("1,2,invalid:selector").is_err());
        assert!(Regions::from_slice_selector("@").is_err());

        let regions = Regions::from_slice_selector("2,3,4:6,7").unwrap();
        assert_eq!("2,3,4:6,7", regions.to_slice_selector());

        let regions = Regions::from_slice_selector("1:5,5:8").unwrap();
        assert_eq!("1:5,5:8", regions.to_slice_selector());

        assert_eq!(
            parse_rs("1,3,5,7,9"),
            rs(&[r(1, 2), r(3, 4), r(5, 6), r(7, 8), r(9, 10)])
        );

        let regions = Regions::from_slice_selector("5:5").unwrap();
        assert_eq!("5:5", regions.to_slice_selector());
    }

    #[test]
    fn test_contains_index() {
        assert!(!r(3, 4).contains_index(1));
        assert!(!r(3, 4).contains_index(4));
        assert!(r(3, 4).contains_index(3));
        assert!(!r(3, 3).contains_index(3));
    }

    #[test]
    fn test_is_after() {
        assert!(r(3, 4).is_after(1));
        assert!(r(3, 4).is_after(3));
        assert!(!r(3, 4).is_after(4));
    }

    #[test]
    fn test_insert_at() {
        let regions = parse_rs("1,4:9,12:16").insert_at(r(5, 6));
        assert_eq!("1,4:10,13:17", regions.to_slice_selector());

        let regions = parse_rs("1,4:9,12:16").insert_at(r(4, 14));
        assert_eq!("1,14:19,22:26", regions.to_slice_selector());

        let regions = parse_rs("1,4:9,12:16").insert_at(r(0, 2));
        assert_eq!("3,6:11,14:18", regions.to_slice_selector());

        let regions = parse_rs("1,4:9,12:16").insert_at(r(20, 22));
        assert_eq!("1,4:9,12:16", regions.to_slice_selector());
    }

    #[test]
    fn test_regions_cut() {
        let regions = parse_rs("1,4:9,12:16").cut(r(5, 6));
        assert_eq!("1,4:8,11:15", regions.to_slice_selector());

        let regions = parse_rs("1,4:9,12:16").cut(r(4, 14));
        assert_eq!("1,4:4,4:6", regions.to_slice_selector());

        let regions = parse_rs("1,4:9,12:16").cut(r(0, 2));
        assert_eq!("0:0,2:7,10:14", regions.to_slice_selector());

        let regions = parse_rs("1,4:9,12:16").cut(r(20, 22));
        assert_eq!("1,4:9,12:16", regions.to_slice_selector());
    }

    #[test]
    fn test_to_indicies() {
        let regions = parse_rs("1,4:9,12:16");
        assert_eq!(
            vec![1, 4, 5, 6, 7, 8, 12, 13, 14, 15],
            regions.to_indicies()
        );
    }

    #[test]
    fn test_from_indicies() {
        let regions = Regions::from_indicies(vec![1, 4, 5, 6, 7, 8, 12, 13, 14, 15]);
        assert_eq!("1,4:9,12:16", regions.to_slice_selector());
    }

    #[test]
    fn test_extract_items() {
        let regions = parse_rs("1,4:9");
        let data: Vec<Value> = (0..11).map(|i| json!(i)).collect();
        let extract = regions.extract_items(&data);
        assert_eq!(
            vec![
                vec![json!(1)],
                vec![json!(4), json!(5), json!(6), json!(7), json!(8)]
            ],
            extract
        );
    }

    #[test]
    fn test_merge_items() {
        let data: Vec<Value> = (0..11).map(|i| json!(i)).collect();

        let (merged, regions) = parse_rs("1,4:9").merge_items(
            &data,
            vec![vec![json!("huba"), json!("hopp")], vec![json!("foo")]],
        );
        assert_eq!(
            vec![
                json!(0),
                json!("huba"),
                json!("hopp"),
                json!(2),
                json!(3),
                json!("foo"),
                json!(9),
                json!(10)
            ],
            merged
        );
        assert_eq!("1:3,5", regions.to_slice_selector());

        let (merged, regions) = parse_rs("1,4:9").merge_items(&data, vec![vec![], vec![]]);
        assert_eq!(
            vec![json!(0), json!(2), json!(3), json!(9), json!(10)],
            merged
        );
        assert_eq!("", regions.simplify().to_slice_selector());

        let (merged, regions) = parse_rs("0:100").merge_items(&data, vec![vec![]]);
        assert_eq!(Vec::<Value>::new(), merged);
        assert_eq!("", regions.simplify().to_slice_selector());

        let (merged, regions) =
            parse_rs("0:10").merge_items(&data, vec![vec![json!("hello"), json!("mutant")]]);
        assert_eq!(vec![json!("hello"), json!("mutant"), json!(10)], merged);
        assert_eq!("0:2", regions.to_slice_selector());

        let (merged, regions) =
            parse_rs("0:0").merge_items(&[], vec![vec![json!("hello"), json!("mutant")]]);
        assert_eq!(vec![json!("hello"), json!("mutant")], merged);
        assert_eq!("0:2", regions.to_slice_selector());
    }

    #[test]
    fn test_merge_of_own_extract_is_identity() {
        let data: Vec<Value> = (0..11).map(|i| json!(i)).collect();
        let regions = parse_rs("1,4:9");
        let extract = regions.extract_items(&data);
        let (merged, out_regions) = regions.merge_items(&data, extract);
        assert_eq!(data, merged);
        assert_eq!("1,4:9", out_regions.to_slice_selector());
    }

    fn run_clean_scenario(jumble: Regions, expect: Regions, description: &str) {
        assert_eq!(expect, jumble.clean(), "{}", description);
    }

    #[test]
    fn test_clean() {
        run_clean_scenario(
            rs(&[r(2, 3), r(1, 10)]),
            rs(&[r(1, 2), r(2, 3), r(3, 10)]),
            "A region interrupted by another region",
        );
        run_clean_scenario(
            rs(&[r(1, 10), r(2, 2)]),
            rs(&[r(1, 2), r(2, 2), r(2, 10)]),
            "A region interrupted by a zero-length region",
        );
        run_clean_scenario(
            rs(&[r(20, 30), r(1, 10)]),
            rs(&[r(1, 10), r(20, 30)]),
            "Non-overlapping gets sorted",
        );
        run_clean_scenario(rs(&[r(20, 30), r(20, 30)]), rs(&[r(20, 30)]), "De-dupe");
    }

    fn assert_union(l: &str, r: &str, expect: &str, description: &str) {
        let left = parse_rs(l);
        let right = parse_rs(r);
        assert_eq!(
            expect,
            left.union(&right).to_slice_selector(),
            "{}",
            description
        );
        assert_eq!(
            expect,
            right.union(&left).to_slice_selector(),
            "{} (reverse)",
            description
        );
    }

    #[test]
    fn test_union() {
        assert_union(
            "1, 4:9",
            "2",
            "1,2,4:9",
            "Non overlapping, but adjacent must not be joined",
        );
        assert_union("12:20", "15:25", "12:25", "Partially overlapping must be joined");
        assert_union("12:20", "0:25", "0:25", "Totally overlapping must be joined");
        assert_union("1:5", "0:3,3:5", "0:5", "Serially overlapping must be joined");
        assert_union(
            "1,3,4,5,6",
            "2,3,4:6",
            "1,2,3,4:6,6",
            "Adjacent multiple must not be joined",
        );
        assert_union("1:9, 15", "", "1:9,15", "Empty sets are no problem");
    }

    #[test]
    fn test_union_infinitesimals() {
        let union = rs(&[r(5, 5)]).union(&rs(&[r(5, 5), r(5, 6)]));
        assert_eq!(
            rs(&[r(5, 5), r(5, 6)]),
            union,
            "Infinitesimal slices must be preserved when adjacent in a union"
        );

        let union = rs(&[r(6, 6)]).union(&rs(&[r(5, 5), r(5, 6)]));
        assert_eq!(
            rs(&[r(5, 5), r(5, 6), r(6, 6)]),
            union,
            "Infinitesimal slices must be preserved when adjacent in a union"
        );

        let union = rs(&[r(5, 5)]).union(&rs(&[r(3, 6)]));
        assert_eq!(
            rs(&[r(3, 6)]),
            union,
            "Infinitesimal slices must be merged when overlapping"
        );
    }

    #[test]
    fn test_intersect_region_vs_region() {
        assert_eq!(rs(&[r(3, 4)]), r(3, 5).intersect(r(4, 9)));
        assert_eq!(rs(&[r(4, 5)]), r(3, 5).intersect(r(1, 4)));
        assert_eq!(Regions::new(), r(3, 5).intersect(r(3, 5)));
        assert_eq!(Regions::new(), r(3, 5).intersect(r(1, 10)));
        assert_eq!(rs(&[r(3, 4), r(6, 10)]), r(3, 10).intersect(r(4, 6)));
        assert_eq!(rs(&[r(1, 10)]), r(1, 10).intersect(r(100, 1000)));
    }

    fn run_intersection_scenario(l: &str, r: &str, expect: &str, description: &str) {
        let left = parse_rs(l);
        let right = parse_rs(r);
        assert_eq!(
            expect,
            left.intersect(&right).to_slice_selector(),
            "{}",
            description
        );
    }

    #[test]
    fn test_intersect_regions_vs_regions() {
        run_intersection_scenario("0:50", "25:30", "0:25,30:50", "A cut from the middle should work");
        run_intersection_scenario(
            "0:50",
            "0:5, 25:30",
            "5:25,30:50",
            "Two cuts in the same chunk, one from the left, one in the middle should work",
        );
        run_intersection_scenario(
            "0:25,30:50",
            "20:40",
            "0:20,40:50",
            "One cut from the middle of two chunks should work",
        );
        run_intersection_scenario(
            "0:10",
            "1,3,5,7,9",
            "0,2,4,6,8",
            "Several single item cuts in a single chunk should work",
        );
        run_intersection_scenario("", "1,3,5,7,9", "", "Slicing through thin air should work fine");
        run_intersection_scenario(
            "0:10",
            "5:5",
            "0:5,5:10",
            "Slicing with infinitesimals should work",
        );
    }

    #[test]
    fn test_sortedness_invariants() {
        let cleaned = rs(&[r(12, 16), r(1, 2), r(4, 9), r(5, 5)]).clean();
        assert!(cleaned.check_sorted());

        let simplified = parse_rs("1,2,4:9,9:12").simplify();
        assert!(simplified.check_sorted());
        assert!(simplified.check());

        let union = parse_rs("1,4:9").union(&parse_rs("2,5:12"));
        assert!(union.check_sorted());

        let intersection = parse_rs("0:50").intersect(&parse_rs("25:30"));
        assert!(intersection.check_sorted());
    }

    #[test]
    fn test_selector_round_trip() {
        for selector in ["1,4:9,12:16", "5:5", "0", "2,3,4:6,7"] {
            let regions = parse_rs(selector);
            assert_eq!(
                regions,
                Regions::from_slice_selector(&regions.to_slice_selector()).unwrap(),
                "round-tripping {:?}",
                selector
            );
        }
    }

    #[test]
    fn test_for_each_index_early_exit() {
        let mut seen = Vec::new();
        parse_rs("1,4:9")
            .for_each_index(|i| {
                seen.push(i);
                Ok::<bool, std::convert::Infallible>(i < 5)
            })
            .unwrap();
        assert_eq!(vec![1, 4, 5], seen);
    }
}
