//! Turtle state and the set of turtles a program drives.

use std::collections::BTreeMap;

use kurbo::{Point, Vec2};

use crate::cmd::Command;

/// Number of entries in the pen palette.
pub const NUM_COLORS: usize = 16;
/// Number of turtle images a host is expected to provide.
pub const NUM_SHAPES: usize = 8;

/// One turtle's pose and pen.
///
/// The heading is in radians: 0 faces along +x and positive angles turn counter-clockwise
/// (with +y pointing up).
#[derive(Clone, Debug, PartialEq)]
pub struct Turtle {
    id: usize,
    pub position: Point,
    pub heading: f64,
    pub pen_down: bool,
    pub visible: bool,
    /// Index of the image the host draws for this turtle.
    pub shape: usize,
    /// Palette index of the pen.
    pub pen_color: usize,
    moved: bool,
}

impl Turtle {
    pub fn new(id: usize) -> Turtle {
        Turtle {
            id,
            position: Point::ORIGIN,
            heading: 0.0,
            pen_down: true,
            visible: true,
            shape: 0,
            pen_color: 0,
            moved: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether this turtle has been moved since the flag was last cleared. A zero-length move
    /// still counts.
    pub fn moved(&self) -> bool {
        self.moved
    }

    pub fn clear_moved(&mut self) {
        self.moved = false;
    }

    pub fn heading_degrees(&self) -> f64 {
        self.heading.to_degrees()
    }

    /// Moves `dist` along the current heading.
    pub fn advance(&mut self, dist: f64) {
        self.position += Vec2::from_angle(self.heading) * dist;
        self.moved = true;
    }

    pub fn move_to(&mut self, p: Point) {
        self.position = p;
        self.moved = true;
    }

    /// Turns counter-clockwise by `degrees`.
    pub fn turn(&mut self, degrees: f64) {
        self.heading += degrees.to_radians();
    }
}

/// Owns every turtle and knows which of them commands currently apply to.
#[derive(Clone, Debug)]
pub struct TurtleManager {
    turtles: BTreeMap<usize, Turtle>,
    // Invariant: non-empty, and every id in it has a turtle.
    active: Vec<usize>,
}

impl Default for TurtleManager {
    fn default() -> Self {
        TurtleManager::new(1)
    }
}

impl TurtleManager {
    /// Creates turtles `1..=count` (at least one) and makes all of them active.
    pub fn new(count: usize) -> TurtleManager {
        let ids: Vec<usize> = (1..=count.max(1)).collect();
        TurtleManager {
            turtles: ids.iter().map(|&id| (id, Turtle::new(id))).collect(),
            active: ids,
        }
    }

    pub fn get(&self, id: usize) -> Option<&Turtle> {
        self.turtles.get(&id)
    }

    /// All turtles, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Turtle> {
        self.turtles.values()
    }

    pub fn ids(&self) -> Vec<usize> {
        self.turtles.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.turtles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turtles.is_empty()
    }

    /// The ids that commands currently apply to.
    pub fn selection(&self) -> &[usize] {
        &self.active
    }

    /// Makes `ids` the active selection, creating turtles that don't exist yet. An empty list
    /// leaves the selection alone.
    pub fn tell(&mut self, ids: &[usize]) {
        if ids.is_empty() {
            return;
        }
        for &id in ids {
            self.turtles.entry(id).or_insert_with(|| {
                log::debug!("creating turtle {id}");
                Turtle::new(id)
            });
        }
        self.active = ids.to_vec();
    }

    /// Applies `cmd` to every active turtle in selection order, returning what the last one
    /// returned.
    pub fn apply(&mut self, cmd: &dyn Command) -> Option<f64> {
        let mut ret = None;
        for id in &self.active {
            if let Some(turtle) = self.turtles.get_mut(id) {
                ret = cmd.update(turtle);
            }
        }
        ret
    }

    pub fn clear_moved(&mut self) {
        for turtle in self.turtles.values_mut() {
            turtle.clear_moved();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::TurtleCmd;

    #[test]
    fn tell_creates_turtles() {
        let mut turtles = TurtleManager::default();
        assert_eq!(turtles.len(), 1);
        turtles.tell(&[3, 2]);
        assert_eq!(turtles.ids(), [1, 2, 3]);
        assert_eq!(turtles.selection(), [3, 2]);

        turtles.tell(&[]);
        assert_eq!(turtles.selection(), [3, 2]);
    }

    #[test]
    fn apply_fans_out() {
        let mut turtles = TurtleManager::new(3);
        turtles.tell(&[1, 3]);
        turtles.apply(&TurtleCmd::Forward(10.0));
        assert_eq!(turtles.get(1).unwrap().position, Point::new(10.0, 0.0));
        assert_eq!(turtles.get(2).unwrap().position, Point::ORIGIN);
        assert!(!turtles.get(2).unwrap().moved());
        assert_eq!(turtles.get(3).unwrap().position, Point::new(10.0, 0.0));
        assert_eq!(turtles.apply(&TurtleCmd::Id), Some(3.0));
    }

    #[test]
    fn zero_length_move_counts() {
        let mut t = Turtle::new(1);
        assert!(!t.moved());
        t.advance(0.0);
        assert!(t.moved());
        assert_eq!(t.position, Point::ORIGIN);
        t.clear_moved();
        assert!(!t.moved());
    }
}
