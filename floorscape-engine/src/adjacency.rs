//! 同一楼层区域之间的共边关系。只作为派生数据存在，随区域变化整体重算。

use floorscape_core::geometry::Bounds2D;
use floorscape_core::plan::Zone;
use serde::Serialize;

pub const DEFAULT_EPSILON: f64 = 0.1;

/// 矩形的四条边。`North` 对应画布坐标中 `maxY` 一侧。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    North,
    South,
    East,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::South, Side::East, Side::West];

    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::South => Side::North,
            Side::East => Side::West,
            Side::West => Side::East,
        }
    }
}

/// 单个区域四个方向上的相邻区域下标（楼层内顺序）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeContacts {
    pub north: Vec<usize>,
    pub south: Vec<usize>,
    pub east: Vec<usize>,
    pub west: Vec<usize>,
}

impl EdgeContacts {
    #[inline]
    pub fn side(&self, side: Side) -> &[usize] {
        match side {
            Side::North => &self.north,
            Side::South => &self.south,
            Side::East => &self.east,
            Side::West => &self.west,
        }
    }

    #[inline]
    pub fn is_adjacent(&self, side: Side) -> bool {
        !self.side(side).is_empty()
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<usize> {
        match side {
            Side::North => &mut self.north,
            Side::South => &mut self.south,
            Side::East => &mut self.east,
            Side::West => &mut self.west,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub side: Side,
    pub neighbor: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdjacencyIndex {
    entries: Vec<EdgeContacts>,
    epsilon: f64,
}

impl AdjacencyIndex {
    /// 两两比较（O(n²)），楼层内区域数量通常只有几十个。
    pub fn recompute<'a, I>(zones: I, epsilon: f64) -> Self
    where
        I: IntoIterator<Item = &'a Zone>,
    {
        let bounds: Vec<Bounds2D> = zones.into_iter().map(Zone::bounds).collect();
        let epsilon = if epsilon.is_finite() && epsilon >= 0.0 {
            epsilon
        } else {
            DEFAULT_EPSILON
        };
        let mut entries = vec![EdgeContacts::default(); bounds.len()];

        for (index, this) in bounds.iter().enumerate() {
            for (other_index, other) in bounds.iter().enumerate() {
                if index == other_index {
                    continue;
                }
                for side in Side::ALL {
                    if touches(this, other, side, epsilon) {
                        entries[index].side_mut(side).push(other_index);
                    }
                }
            }
        }

        Self { entries, epsilon }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&EdgeContacts> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn contacts(&self, index: usize) -> impl Iterator<Item = Contact> + '_ {
        self.entries.get(index).into_iter().flat_map(|entry| {
            Side::ALL.into_iter().flat_map(move |side| {
                entry
                    .side(side)
                    .iter()
                    .map(move |&neighbor| Contact { side, neighbor })
            })
        })
    }

    /// 校验 A 在某方向与 B 相邻时，B 在反方向上也记录了 A。
    pub fn is_symmetric(&self) -> bool {
        self.entries.iter().enumerate().all(|(index, entry)| {
            Side::ALL.into_iter().all(|side| {
                entry.side(side).iter().all(|&neighbor| {
                    self.entries
                        .get(neighbor)
                        .map(|other| other.side(side.opposite()).contains(&index))
                        .unwrap_or(false)
                })
            })
        })
    }
}

fn touches(this: &Bounds2D, other: &Bounds2D, side: Side, epsilon: f64) -> bool {
    let (edge_gap, overlap) = match side {
        Side::North => (other.min_y() - this.max_y(), x_overlap(this, other)),
        Side::South => (other.max_y() - this.min_y(), x_overlap(this, other)),
        Side::East => (other.min_x() - this.max_x(), y_overlap(this, other)),
        Side::West => (other.max_x() - this.min_x(), y_overlap(this, other)),
    };
    edge_gap.abs() <= epsilon && overlap > epsilon
}

#[inline]
fn x_overlap(a: &Bounds2D, b: &Bounds2D) -> f64 {
    a.max_x().min(b.max_x()) - a.min_x().max(b.min_x())
}

#[inline]
fn y_overlap(a: &Bounds2D, b: &Bounds2D) -> f64 {
    a.max_y().min(b.max_y()) - a.min_y().max(b.min_y())
}

#[cfg(test)]
mod tests {
    use floorscape_core::plan::FloorId;

    use super::*;

    fn zone(id: &str, x: f64, y: f64, w: f64, h: f64) -> Zone {
        Zone::new(id, FloorId(0), x, y, w, h)
    }

    #[test]
    fn side_by_side_rooms_share_one_edge() {
        let zones = vec![
            zone("a", 0.0, 0.0, 100.0, 100.0),
            zone("b", 100.0, 0.0, 100.0, 100.0),
        ];
        let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
        let a = index.get(0).expect("a");
        let b = index.get(1).expect("b");
        assert_eq!(a.east, vec![1]);
        assert_eq!(b.west, vec![0]);
        assert!(a.north.is_empty() && a.south.is_empty() && a.west.is_empty());
        assert!(b.north.is_empty() && b.south.is_empty() && b.east.is_empty());
        assert!(index.is_symmetric());
    }

    #[test]
    fn stacked_rooms_use_max_y_as_north() {
        let zones = vec![
            zone("low", 0.0, 0.0, 50.0, 40.0),
            zone("high", 10.0, 40.05, 50.0, 40.0),
        ];
        let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
        assert_eq!(index.get(0).map(|e| e.north.clone()), Some(vec![1]));
        assert_eq!(index.get(1).map(|e| e.south.clone()), Some(vec![0]));
    }

    #[test]
    fn corner_touch_is_not_adjacency() {
        let zones = vec![
            zone("a", 0.0, 0.0, 10.0, 10.0),
            zone("b", 10.0, 10.0, 10.0, 10.0),
        ];
        let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
        assert_eq!(index.contacts(0).count(), 0);
        assert_eq!(index.contacts(1).count(), 0);
    }

    #[test]
    fn gap_larger_than_epsilon_breaks_adjacency() {
        let zones = vec![
            zone("a", 0.0, 0.0, 10.0, 10.0),
            zone("b", 10.5, 0.0, 10.0, 10.0),
        ];
        let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
        assert!(!index.get(0).map(|e| e.is_adjacent(Side::East)).unwrap_or(true));
    }

    #[test]
    fn contacts_iterate_all_sides() {
        let zones = vec![
            zone("center", 10.0, 10.0, 10.0, 10.0),
            zone("north", 10.0, 20.0, 10.0, 10.0),
            zone("east", 20.0, 10.0, 10.0, 10.0),
        ];
        let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
        let contacts: Vec<Contact> = index.contacts(0).collect();
        assert_eq!(
            contacts,
            vec![
                Contact {
                    side: Side::North,
                    neighbor: 1
                },
                Contact {
                    side: Side::East,
                    neighbor: 2
                },
            ]
        );
    }
}
