use timelog::timed;

#[timed(rotate = true, rotate = false)]
fn undecided() -> u8 {
    1
}

fn main() {}
