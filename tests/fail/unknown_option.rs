use timelog::timed;

#[timed(colour = "red")]
fn painted() -> u8 {
    1
}

fn main() {}
