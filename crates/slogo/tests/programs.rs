use std::path::Path;

use slogo::{Config, Interpreter, Turtle};

#[derive(Default, Clone)]
pub struct TestCase {
    input: String,
    expected: String,
}

/// What a finished program leaves behind, rounded so that programs taking different routes to
/// the same place compare equal.
#[derive(Debug, PartialEq)]
struct Snapshot {
    value: i64,
    turtles: Vec<(usize, i64, i64, i64, bool, bool, usize, usize)>,
}

fn round(x: f64) -> i64 {
    (x * 1e6).round() as i64
}

fn pose(t: &Turtle) -> (usize, i64, i64, i64, bool, bool, usize, usize) {
    let heading = round(t.heading_degrees()).rem_euclid(round(360.0));
    (
        t.id(),
        round(t.position.x),
        round(t.position.y),
        heading,
        t.pen_down,
        t.visible,
        t.pen_color,
        t.shape,
    )
}

fn exec_one(s: &str) -> Result<Snapshot, slogo::Error> {
    let mut interp = Interpreter::new(Config::default()).unwrap();
    let value = interp.run(dbg!(s))?;
    Ok(Snapshot {
        value: round(value),
        turtles: interp.turtles.iter().map(pose).collect(),
    })
}

/// Expected failures are written as `line:column token`.
fn parse_loc(s: &str) -> (&str, &str) {
    let mut split = s.trim().splitn(2, ' ');
    let pos = split.next().unwrap();
    let token = split.next().unwrap_or("");
    (pos, token)
}

impl TestCase {
    fn exec(&self) {
        let a = exec_one(&self.input).unwrap();
        let b = exec_one(&self.expected).unwrap();
        assert_eq!(a, b);
    }

    fn exec_failure(&self) {
        let a = exec_one(&self.input).unwrap_err();
        let pos = a.pos().map(|p| p.to_string()).unwrap_or_default();
        assert_eq!(parse_loc(&self.expected), (pos.as_str(), a.token().unwrap_or("")));
    }
}

pub fn read_tests(path: impl AsRef<Path>) -> Vec<TestCase> {
    let text = std::fs::read_to_string(path).unwrap();
    let mut ret = Vec::new();
    let mut in_input = true;
    let mut cur = TestCase::default();

    fn separator_line(line: &str, ch: u8) -> bool {
        line.trim().len() >= 2 && line.trim().bytes().all(|c| c == ch)
    }

    for line in text.split_inclusive('\n') {
        if in_input {
            if separator_line(line, b'-') {
                in_input = false;
            } else {
                cur.input += line;
            }
        } else if separator_line(line, b'=') {
            in_input = true;
            ret.push(std::mem::take(&mut cur));
        } else {
            cur.expected += line;
        }
    }
    ret
}

#[test]
fn text_tests() {
    let tests = read_tests("tests/programs.txt");
    assert!(!tests.is_empty());
    for test in tests {
        test.exec();
    }
}

#[test]
fn exec_failures() {
    let tests = read_tests("tests/exec-failures.txt");
    assert!(!tests.is_empty());
    for test in tests {
        test.exec_failure();
    }
}
