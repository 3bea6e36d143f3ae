//! 8-connected A* over a [`WeightMap`].

use super::weight_map::WeightMap;
use shared::Point;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

#[derive(Clone, Copy, Debug)]
struct SearchNode {
    index: usize,
    f_score: f64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the lowest f-score first
        other
            .f_score
            .partial_cmp(&self.f_score)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Octile distance, exact for an unobstructed map of minimum-cost cells.
pub(super) fn octile(a: Point, b: Point) -> f64 {
    let dx = (f64::from(a.x) - f64::from(b.x)).abs();
    let dy = (f64::from(a.y) - f64::from(b.y)).abs();
    let (short, long) = if dx < dy { (dx, dy) } else { (dy, dx) };
    (long - short) + SQRT_2 * short
}

/// Finds the cheapest route from `start` to the first cell satisfying
/// `is_goal`. Moving onto a cell costs the step length times that cell's
/// weight; diagonal moves may not cut past an impassable corner.
///
/// `heuristic` must never overestimate the remaining cost.
pub(super) fn astar<G, H>(map: &WeightMap, start: Point, is_goal: G, heuristic: H) -> Vec<Point>
where
    G: Fn(Point) -> bool,
    H: Fn(Point) -> f64,
{
    if !map.is_passable(start) {
        return Vec::new();
    }

    let cells = map.cell_count();
    let mut g_score = vec![f64::INFINITY; cells];
    let mut parent: Vec<Option<usize>> = vec![None; cells];
    let mut closed = vec![false; cells];
    let mut open_set = BinaryHeap::new();

    let start_index = map.index_of(start);
    g_score[start_index] = 0.0;
    open_set.push(SearchNode {
        index: start_index,
        f_score: heuristic(start),
    });

    while let Some(SearchNode { index, .. }) = open_set.pop() {
        if closed[index] {
            continue;
        }
        closed[index] = true;

        let current = map.point_at(index);
        if is_goal(current) {
            return reconstruct_path(map, &parent, index);
        }

        for (dx, dy) in NEIGHBOURS {
            let Some(next) = map.offset(current, dx, dy) else {
                continue;
            };
            if !map.is_passable(next) {
                continue;
            }

            let diagonal = dx != 0 && dy != 0;
            if diagonal
                && (!map.is_passable(Point::new(next.x, current.y))
                    || !map.is_passable(Point::new(current.x, next.y)))
            {
                continue;
            }

            let next_index = map.index_of(next);
            if closed[next_index] {
                continue;
            }

            let step = if diagonal { SQRT_2 } else { 1.0 };
            let tentative = g_score[index] + step * f64::from(map.cost(next));
            if tentative < g_score[next_index] {
                g_score[next_index] = tentative;
                parent[next_index] = Some(index);
                open_set.push(SearchNode {
                    index: next_index,
                    f_score: tentative + heuristic(next),
                });
            }
        }
    }

    Vec::new()
}

fn reconstruct_path(map: &WeightMap, parent: &[Option<usize>], goal: usize) -> Vec<Point> {
    let mut path = vec![map.point_at(goal)];
    let mut current = goal;
    while let Some(previous) = parent[current] {
        path.push(map.point_at(previous));
        current = previous;
    }
    path.reverse();
    path
}
