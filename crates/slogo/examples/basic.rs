use slogo::{Config, Interpreter};

fn main() {
    let mut interp = Interpreter::new(Config::default()).unwrap();
    interp
        .run("to square [ :n ] [ repeat 4 [ fd :n rt 90 ] ] square 90 tell [ 1 2 ] fd 10")
        .unwrap();
    for turtle in interp.turtles.iter() {
        dbg!(turtle);
    }
    print!("{}", interp.symbols);
}
