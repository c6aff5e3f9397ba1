//! Commands that act on a single turtle.

use kurbo::Point;

use crate::turtle::Turtle;

pub trait Command {
    /// Applies this command to `turtle`. Queries return their answer and leave the turtle alone;
    /// everything else changes the turtle and returns `None`.
    fn update(&self, turtle: &mut Turtle) -> Option<f64>;
}

/// A turtle command together with its (already evaluated) inputs. Angles are in degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum TurtleCmd {
    Forward(f64),
    Back(f64),
    Left(f64),
    Right(f64),
    SetHeading(f64),
    Towards(f64, f64),
    SetPosition(f64, f64),
    PenDown,
    PenUp,
    Show,
    Hide,
    Home,
    ClearScreen,
    SetPenColor(usize),
    SetShape(usize),
    XCor,
    YCor,
    Heading,
    IsPenDown,
    IsShowing,
    PenColor,
    Shape,
    Id,
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl TurtleCmd {
    /// The value a program sees for a command that doesn't answer a question.
    pub fn echo(&self) -> f64 {
        match self {
            TurtleCmd::Forward(x)
            | TurtleCmd::Back(x)
            | TurtleCmd::Left(x)
            | TurtleCmd::Right(x)
            | TurtleCmd::SetHeading(x) => *x,
            TurtleCmd::PenDown | TurtleCmd::Show => 1.0,
            TurtleCmd::SetPenColor(i) | TurtleCmd::SetShape(i) => *i as f64,
            _ => 0.0,
        }
    }
}

impl Command for TurtleCmd {
    fn update(&self, turtle: &mut Turtle) -> Option<f64> {
        match self {
            TurtleCmd::Forward(dist) => turtle.advance(*dist),
            TurtleCmd::Back(dist) => turtle.advance(-dist),
            TurtleCmd::Left(degrees) => turtle.turn(*degrees),
            TurtleCmd::Right(degrees) => turtle.turn(-degrees),
            TurtleCmd::SetHeading(degrees) => turtle.heading = degrees.to_radians(),
            TurtleCmd::Towards(x, y) => {
                let d = Point::new(*x, *y) - turtle.position;
                // Facing a point we're already on keeps the old heading.
                if d.hypot() > 0.0 {
                    turtle.heading = d.atan2();
                }
            }
            TurtleCmd::SetPosition(x, y) => turtle.move_to(Point::new(*x, *y)),
            TurtleCmd::PenDown => turtle.pen_down = true,
            TurtleCmd::PenUp => turtle.pen_down = false,
            TurtleCmd::Show => turtle.visible = true,
            TurtleCmd::Hide => turtle.visible = false,
            TurtleCmd::Home | TurtleCmd::ClearScreen => {
                turtle.move_to(Point::ORIGIN);
                turtle.heading = 0.0;
            }
            TurtleCmd::SetPenColor(i) => turtle.pen_color = *i,
            TurtleCmd::SetShape(i) => turtle.shape = *i,
            TurtleCmd::XCor => return Some(turtle.position.x),
            TurtleCmd::YCor => return Some(turtle.position.y),
            TurtleCmd::Heading => return Some(turtle.heading_degrees()),
            TurtleCmd::IsPenDown => return Some(flag(turtle.pen_down)),
            TurtleCmd::IsShowing => return Some(flag(turtle.visible)),
            TurtleCmd::PenColor => return Some(turtle.pen_color as f64),
            TurtleCmd::Shape => return Some(turtle.shape as f64),
            TurtleCmd::Id => return Some(turtle.id() as f64),
        }
        log::trace!("turtle {} {:?}", turtle.id(), self);
        None
    }
}
